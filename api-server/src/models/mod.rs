pub mod caller;
pub mod config;
pub mod context;
pub mod error;
