use url::Url;

/// Query parameters whose values never reach the logs.
pub const SECRET_PARAMS: &[&str] = &["apikey", "api_key", "token"];

/// Returns `url` with the values of [`SECRET_PARAMS`] replaced by `***`.
pub fn redact_url(url: &Url) -> String {
    if url.query().is_none() {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            if SECRET_PARAMS.contains(&key.as_ref()) {
                (key.into_owned(), "***".to_string())
            } else {
                (key.into_owned(), value.into_owned())
            }
        })
        .collect();

    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_api_key() {
        let url = Url::parse("http://www.omdbapi.com/?apikey=secret&s=batman&page=1").unwrap();
        let redacted = redact_url(&url);
        assert!(!redacted.contains("secret"));
        assert!(redacted.contains("apikey=***"));
        assert!(redacted.contains("s=batman"));
    }

    #[test]
    fn test_url_without_query_is_untouched() {
        let url = Url::parse("http://www.omdbapi.com/").unwrap();
        assert_eq!(redact_url(&url), "http://www.omdbapi.com/");
    }
}
