use movie_cache::lifecycle::LifecycleError;
use movie_cache::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] figment::Error),
    #[error("failed to set up logging: {0}")]
    Logging(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("record store could not be opened: {0}")]
    Store(#[from] StoreError),
    #[error("movie provider could not be configured: {0}")]
    Provider(#[from] movie_info::Error),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("server failed: {0}")]
    Rocket(#[from] rocket::Error),
}
