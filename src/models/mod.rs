//! Core data models for the transcoder.
//!
//! Attributes arrive from the store as untyped triplets; these types give them
//! meaning (typed values, the compression state) and describe where an object
//! is staged while its content is being replaced.

pub mod attribute;
pub mod compression;
pub mod metadata;
pub mod object;
pub mod staging;
