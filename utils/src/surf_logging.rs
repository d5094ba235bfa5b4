use crate::redact::redact_url;
use std::time::Instant;
use surf::middleware::{Middleware, Next};
use surf::{Client, Request, Response};

/// Logs every outgoing request with its status and latency.
///
/// Secret query parameters are redacted before the URL is written.
#[derive(Debug, Default, Clone, Copy)]
pub struct SurfLogging;

#[surf::utils::async_trait]
impl Middleware for SurfLogging {
    async fn handle(&self, req: Request, client: Client, next: Next<'_>) -> surf::Result<Response> {
        let method = req.method();
        let url = redact_url(req.url());
        let start = Instant::now();

        log::debug!("{} {}", method, url);

        match next.run(req, client).await {
            Ok(res) => {
                log::debug!(
                    "{} {} -> {} ({}ms)",
                    method,
                    url,
                    res.status(),
                    start.elapsed().as_millis()
                );
                Ok(res)
            }
            Err(err) => {
                log::warn!(
                    "{} {} failed after {}ms: {}",
                    method,
                    url,
                    start.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}
