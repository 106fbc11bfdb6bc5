//! Compress and decompress objects in place in a metadata-tagged object
//! store, recording what was done in the objects' own attributes.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use services::pipeline::{
    Action, IntegrityPolicy, LeaseConfig, TranscodeError, TranscodeOutcome, TranscodeState,
    Transcoder,
};
