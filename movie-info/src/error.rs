use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Transport failure or timeout while talking to the provider.
    #[error("failed to reach movie provider: {0}")]
    Request(String),
    /// The provider answered with something that is not its JSON envelope.
    #[error("failed to parse movie provider response: {0}")]
    Parse(String),
    /// The provider answered `Response: "False"` for a reason other than "nothing found".
    #[error("movie provider rejected the request: {0}")]
    Provider(String),
    /// The provider has no record for the requested identifier.
    #[error("movie not found: {0}")]
    NotFound(String),
    #[error("invalid movie provider configuration: {0}")]
    Config(String),
}

