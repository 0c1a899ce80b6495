mod client;

pub use client::AnthropicNarrator;
