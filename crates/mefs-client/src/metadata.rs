//! Everything needed to issue one request

use crate::body::RequestBody;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Inputs of a single [`Client::execute`](crate::Client::execute) call
#[derive(Debug, Default)]
pub struct RequestMetadata {
    /// Bucket the request addresses
    pub bucket_name: String,
    /// Object the request addresses
    pub object_name: String,
    /// Command API path below `/api/v0/`, e.g. `lfs/head_object`
    pub command: Option<String>,
    /// Query parameters in send order
    pub query: Vec<(String, String)>,
    /// Extra request headers
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    /// Bytes of the body to send; the whole body when unset
    pub content_length: Option<u64>,
    pub content_md5_base64: Option<String>,
    pub content_sha256_hex: Option<String>,
    /// Region for this call, overridden by a configured or cached region
    pub bucket_location: String,
}

impl RequestMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for a command API call
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Default::default()
        }
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket_name = bucket.into();
        self
    }

    pub fn object(mut self, object: impl Into<String>) -> Self {
        self.object_name = object.into();
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn content_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    pub fn location(mut self, region: impl Into<String>) -> Self {
        self.bucket_location = region.into();
        self
    }

    /// Whether a failed attempt may be sent again
    pub(crate) fn is_replayable(&self) -> bool {
        self.body.as_ref().map_or(true, RequestBody::is_retryable)
    }
}
