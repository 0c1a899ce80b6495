//! Credential-injecting [`HttpClient`](crate::fetch::HttpClient) wrappers.

mod api_key;

pub use api_key::ApiKey;
