pub mod redact;
pub mod surf_logging;
