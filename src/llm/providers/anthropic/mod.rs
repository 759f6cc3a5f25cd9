pub mod client;
pub mod config;
pub mod types;

pub use client::AnthropicAdapter;
pub use config::AnthropicConfig;
