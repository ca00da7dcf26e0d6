//! rootserve: serve `index.html` at `/` and every other path as a static
//! file from a single directory.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
pub mod startup;
