pub mod client;
pub mod config;
pub mod types;

pub use client::GeminiAdapter;
pub use config::GeminiConfig;
