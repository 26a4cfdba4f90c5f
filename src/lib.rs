pub mod config;
pub mod errors;
pub mod jobs;
pub mod progress;
pub mod separator;
pub mod server;
