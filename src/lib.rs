//! Library crate for dirbuster-rs: wordlist-driven path discovery over HTTP.
pub mod config;
pub mod generator;
pub mod progress;
pub mod report;
pub mod scanner;
pub mod templates;
pub mod types;
pub mod wordlist;
