//! HTTP implementation of the Linkweave [`CreationClient`](linkweave_core::CreationClient).
//!
//! Records are created with `POST /v2/resources` and stashed values are
//! attached with `POST /v2/values`. Every failure is classified into a
//! [`ClientError`](linkweave_core::ClientError) so the orchestrator can
//! decide whether to retry.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Client configuration
pub mod config;

/// The reqwest based client
pub mod http_client;

pub use config::HttpClientConfig;
pub use http_client::HttpCreationClient;
