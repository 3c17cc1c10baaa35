//! SYMBIONT Core Types
//!
//! This crate contains pure types and logic with no I/O.
//! Field paths, content digests and the shared error type live here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod digest;
pub mod error;
pub mod path;

// Re-exports
pub use digest::Digest;
pub use error::CoreError;
pub use path::{FieldPath, PathSegment, PATH_SEPARATOR};
