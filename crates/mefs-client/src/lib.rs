//! # MEFS Client SDK
//!
//! A client SDK for the MEFS decentralized storage gateway with an
//! S3-compatible API.
//!
//! ## Features
//!
//! - **Retries**: Transient failures are retried with capped, jittered backoff
//! - **Region correction**: Region-mismatch errors update the bucket location cache
//! - **Command API**: Typed wrappers for the gateway's `/api/v0` commands
//! - **Pluggable**: Custom transport, signer and credential providers
//!
//! ## Example
//!
//! ```rust,ignore
//! use mefs_client::{Client, Config, Credentials, LfsOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Client::new(
//!         Config::new("/ip4/127.0.0.1/tcp/4608"),
//!         Credentials::new_static_v4("0x39051EECB105f203fA5613deb5ee33b35a07834a", "123456", ""),
//!     )?;
//!
//!     client.make_bucket("bucket01", &LfsOptions::new()).await?;
//!     client.put_object("bucket01", "hello.txt", b"Hello, MEFS!".to_vec(), &LfsOptions::new()).await?;
//!
//!     let info = client.stat_object("bucket01", "hello.txt").await?;
//!     println!("{} is {} bytes", info.key, info.size);
//!
//!     Ok(())
//! }
//! ```

mod body;
mod bucket_cache;
mod client;
mod config;
mod context;
mod credentials;
mod error;
mod execute;
mod lfs;
mod location;
mod metadata;
mod node;
mod request;
pub mod retry;
pub mod s3utils;
mod signer;
mod stat;
mod transport;
mod types;

pub use body::{FormFile, RequestBody, Response, SeekableReader};
pub use bucket_cache::{
    location_from_error, parse_location_constraint, BucketLocationCache, DEFAULT_REGION,
};
pub use client::{Client, API_PREFIX};
pub use config::{
    endpoint_from_api_dir, normalize_endpoint, BucketLookup, Config, DEFAULT_API_FILE,
    DEFAULT_PATH_ROOT, ENV_MEFS_PATH, LOCAL_REGION,
};
pub use context::Context;
pub use credentials::{Credentials, EnvProvider, Provider, SignatureType, StaticProvider, Value};
pub use error::{ClientError, ErrorResponse, Result};
pub use lfs::LfsOptions;
pub use metadata::RequestMetadata;
pub use request::RequestBuilder;
pub use signer::{redact_signature, resolve_signer_type, AddressSigner, AnonymousSigner, Signer};
pub use transport::{
    BodyStream, HttpBody, HttpRequest, ReqwestTransport, Transport, TransportError, TransportResponse,
};
pub use types::*;

// Re-exported so callers can build contexts and methods without extra deps
pub use reqwest::Method;
pub use tokio_util::sync::CancellationToken;
