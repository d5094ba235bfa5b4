use crate::favorites::FavoriteError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The provider found nothing for the term or id. Not retried.
    #[error("no movies found: {0}")]
    NoResultsFound(String),
    /// Network, timeout or unparseable provider response. The caller may retry.
    #[error("movie provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
    #[error("invalid movie id '{0}'")]
    InvalidId(String),
    #[error("search term is required")]
    MissingSearchTerm,
    #[error("operation requires an admin caller")]
    Forbidden,
    #[error(transparent)]
    Favorites(#[from] FavoriteError),
}

impl CatalogError {
    /// Stable machine-readable code for the presentation layer.
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::NoResultsFound(_) => "NO_RESULTS",
            CatalogError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            CatalogError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            CatalogError::InvalidId(_) => "INVALID_ID",
            CatalogError::MissingSearchTerm => "MISSING_SEARCH_TERM",
            CatalogError::Forbidden => "FORBIDDEN",
            CatalogError::Favorites(_) => "FAVORITES",
        }
    }
}

impl From<movie_info::Error> for CatalogError {
    fn from(error: movie_info::Error) -> Self {
        match error {
            movie_info::Error::NotFound(message) => CatalogError::NoResultsFound(message),
            other => CatalogError::ProviderUnavailable(other.to_string()),
        }
    }
}

#[cfg(feature = "graphql")]
impl async_graphql::ErrorExtensions for CatalogError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", self.code()))
    }
}
