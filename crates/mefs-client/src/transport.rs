//! HTTP transport boundary
//!
//! The executor only needs "send one request, get one response". Anything
//! that implements [`Transport`] can stand in for the default reqwest client,
//! which is how tests script gateway behaviour.

use crate::body::FormFile;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method, StatusCode};
use std::error::Error as _;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Streaming response body
pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Payload of an outgoing request
pub enum HttpBody {
    Empty,
    Bytes(Bytes),
    /// Chunks read from the caller's reader as the transport sends them
    Stream(BoxStream<'static, std::io::Result<Bytes>>),
    /// Encoded as `multipart/form-data` by the transport
    Form(FormFile),
}

impl HttpBody {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Bytes(b) => b.is_empty(),
            Self::Stream(_) | Self::Form(_) => false,
        }
    }

    /// Collect the payload; a form yields its file content
    #[cfg(test)]
    pub(crate) async fn into_bytes(self) -> std::io::Result<Bytes> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Bytes(b) => Ok(b),
            Self::Stream(stream) => {
                let chunks: Vec<Bytes> = stream.try_collect().await?;
                Ok(chunks.concat().into())
            }
            Self::Form(file) => Ok(file.data),
        }
    }
}

impl std::fmt::Debug for HttpBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
            Self::Form(file) => f.debug_tuple("Form").field(&file.field).finish(),
        }
    }
}

/// A fully built, signed request ready to go on the wire
#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: HttpBody,
}

impl HttpRequest {
    /// Method, URL and headers only
    pub fn head(&self) -> HttpRequest {
        HttpRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: HttpBody::Empty,
        }
    }
}

/// Response as handed back by a [`Transport`]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl TransportResponse {
    /// Response with an in-memory body
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            headers,
            body: futures::stream::once(async move { Ok(body) }).boxed(),
        }
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Network level failures
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Could not reach the gateway
    #[error("connection failed: {0}")]
    Connect(String),

    /// Connect or read timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The peer dropped the connection mid-exchange
    #[error("connection closed by foreign host {0}, retry again")]
    ConnectionClosed(String),

    /// Redirects are never followed
    #[error("unexpected redirect: {0}")]
    Redirect(String),

    /// The request could not be built
    #[error("invalid request: {0}")]
    Builder(String),

    /// Response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),

    /// Any other request failure
    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Whether re-sending the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connect(_) | Self::Timeout(_) | Self::ConnectionClosed(_)
        )
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_redirect() {
            TransportError::Redirect(err.to_string())
        } else if err.is_builder() {
            TransportError::Builder(err.to_string())
        } else if is_connection_closed(&err) {
            let url = err.url().map(Url::to_string).unwrap_or_default();
            TransportError::ConnectionClosed(url)
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Walks the source chain looking for an EOF or reset from the peer
fn is_connection_closed(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        let msg = cause.to_string();
        if msg.contains("connection closed") || msg.contains("EOF") {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Sends one HTTP request and returns the raw response
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<TransportResponse, TransportError>;
}

/// Default transport backed by `reqwest`
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport with the given timeout.
    ///
    /// Redirects are disabled; a 3xx surfaces as an error response. With
    /// `keep_alive` off no idle connections are pooled.
    pub fn new(timeout: Duration, keep_alive: bool) -> Result<Self, TransportError> {
        let mut builder = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none());
        if !keep_alive {
            builder = builder.pool_max_idle_per_host(0);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Builder(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an already configured reqwest client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<TransportResponse, TransportError> {
        let mut req = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        match request.body {
            HttpBody::Empty => {}
            HttpBody::Bytes(bytes) => req = req.body(bytes),
            HttpBody::Stream(stream) => req = req.body(Body::wrap_stream(stream)),
            HttpBody::Form(file) => {
                let part = Part::bytes(file.data.to_vec())
                    .file_name(file.file_name)
                    .mime_str(&file.content_type)
                    .map_err(|e| TransportError::Builder(e.to_string()))?;
                req = req.multipart(Form::new().part(file.field, part));
            }
        }

        let response = req.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes_stream().map_err(TransportError::from).boxed();

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
