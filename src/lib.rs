//! # courier
//!
//! HTTP client factory: build timeout-bound clients with configurable TLS
//! verification, optional transparent NTLM negotiation, User-Agent stamping,
//! and Basic-Auth credential injection.
//!
//! ```rust,ignore
//! use courier::{Client, ClientConfig};
//!
//! let client = Client::new(ClientConfig {
//!     user_agent: "probe/1.0".into(),
//!     timeout: "30s".into(),
//!     username: "CORP\\alice".into(),
//!     password: "hunter2".into(),
//!     use_ntlm: true,
//!     ..Default::default()
//! })?;
//!
//! let resp = client.get("https://intranet.example/status").send().await?;
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod ntlm;
pub mod transport;

pub use client::{Client, RequestBuilder};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use transport::Transport;
