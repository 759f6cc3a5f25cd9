pub mod client;
pub mod config;
pub mod types;

pub use client::OllamaAdapter;
pub use config::OllamaConfig;
