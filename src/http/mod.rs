//! HTTP protocol layer module
//!
//! Content-type detection and response builders, independent of how
//! request paths are resolved.

pub mod mime;
pub mod response;

pub use response::{
    build_404_response, build_405_response, build_file_response, build_options_response,
    ALLOWED_METHODS,
};
