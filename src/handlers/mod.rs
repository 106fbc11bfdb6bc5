pub mod health_handlers;
pub mod transcode_handlers;
