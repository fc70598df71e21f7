//! Fetches domain blocklists published as hosts files or plain domain lists,
//! normalizes every line to a bare domain and writes one deduplicated list.

pub mod config;
pub mod engine;
pub mod error;
pub mod init;
pub mod stats;
