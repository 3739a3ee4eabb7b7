//! Request and response bodies

use crate::transport::{BodyStream, HttpBody, TransportResponse};
use crate::{ClientError, Result};
use base64::Engine;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use md5::{Digest, Md5};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::fmt;
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, ReadBuf};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::io::ReaderStream;

const DIGEST_CHUNK: usize = 64 * 1024;

/// Readers that can be rewound to their start
pub trait SeekableReader: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> SeekableReader for T {}

type SharedReader = Arc<Mutex<Box<dyn SeekableReader>>>;

/// A single file field of a `multipart/form-data` body
#[derive(Clone, Debug)]
pub struct FormFile {
    /// Form field name
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl FormFile {
    pub fn new(field: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            field: field.into(),
            file_name: "data".to_string(),
            content_type: "application/octet-stream".to_string(),
            data: data.into(),
        }
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }
}

/// Body of an outgoing request.
///
/// Only bodies that can be replayed from the start are retried; a plain
/// stream (stdin, a socket) gets exactly one attempt. Readers are streamed
/// to the transport, never buffered whole.
pub enum RequestBody {
    /// In-memory payload
    Bytes(Bytes),
    /// File or cursor, rewound before every attempt
    Seekable(SharedReader),
    /// Single-pass reader
    Stream(Box<dyn AsyncRead + Send + Unpin>),
    /// `multipart/form-data` upload with one file
    Form(FormFile),
}

impl RequestBody {
    /// Wrap a seekable reader such as `tokio::fs::File`
    pub fn seekable<R>(reader: R) -> Self
    where
        R: AsyncRead + AsyncSeek + Send + Unpin + 'static,
    {
        Self::Seekable(Arc::new(Mutex::new(Box::new(reader))))
    }

    /// Wrap a single-pass reader
    pub fn stream<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Stream(Box::new(reader))
    }

    /// Whether the body can be sent again after a failed attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Stream(_))
    }

    /// Transport body for one attempt, with its length when known.
    ///
    /// A seekable reader is rewound to offset zero and stays locked until
    /// the transport drops the stream. A single-pass reader is handed over
    /// whole, leaving an empty reader behind.
    pub(crate) async fn open(&mut self, limit: Option<u64>) -> io::Result<(HttpBody, Option<u64>)> {
        match self {
            Self::Bytes(bytes) => {
                let bytes = limited(bytes, limit);
                let len = bytes.len() as u64;
                Ok((HttpBody::Bytes(bytes), Some(len)))
            }
            Self::Seekable(shared) => {
                let mut reader = shared.clone().lock_owned().await;
                let end = reader.seek(SeekFrom::End(0)).await?;
                reader.seek(SeekFrom::Start(0)).await?;
                let len = limit.map_or(end, |n| n.min(end));
                let stream = ReaderStream::new(LockedReader(reader).take(len));
                Ok((HttpBody::Stream(stream.boxed()), Some(len)))
            }
            Self::Stream(reader) => {
                let reader = std::mem::replace(reader, Box::new(tokio::io::empty()));
                let stream = match limit {
                    Some(n) => ReaderStream::new(reader.take(n)).boxed(),
                    None => ReaderStream::new(reader).boxed(),
                };
                Ok((HttpBody::Stream(stream), limit))
            }
            Self::Form(file) => Ok((HttpBody::Form(file.clone()), None)),
        }
    }

    /// Digest the payload without keeping it in memory.
    ///
    /// Single-pass and form bodies cannot be read ahead and yield no digests.
    pub(crate) async fn digest(&mut self, limit: Option<u64>, md5: bool, sha256: bool) -> io::Result<Digests> {
        let mut hashers = Hashers::new(md5, sha256);
        match self {
            Self::Bytes(bytes) => hashers.update(&limited(bytes, limit)),
            Self::Seekable(shared) => {
                let mut reader = shared.lock().await;
                reader.seek(SeekFrom::Start(0)).await?;
                let mut buf = vec![0u8; DIGEST_CHUNK];
                let mut remaining = limit.unwrap_or(u64::MAX);
                while remaining > 0 {
                    let want = usize::try_from(remaining).unwrap_or(usize::MAX).min(buf.len());
                    let n = reader.read(&mut buf[..want]).await?;
                    if n == 0 {
                        break;
                    }
                    hashers.update(&buf[..n]);
                    remaining -= n as u64;
                }
            }
            Self::Stream(_) | Self::Form(_) => return Ok(Digests::default()),
        }
        Ok(hashers.finish())
    }
}

fn limited(bytes: &Bytes, limit: Option<u64>) -> Bytes {
    match limit {
        Some(n) => bytes.slice(..usize::try_from(n).unwrap_or(usize::MAX).min(bytes.len())),
        None => bytes.clone(),
    }
}

/// Reader that holds the body lock for the lifetime of one attempt
struct LockedReader(OwnedMutexGuard<Box<dyn SeekableReader>>);

impl AsyncRead for LockedReader {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut **this.0).poll_read(cx, buf)
    }
}

/// Payload digests: base64 MD5 and hex SHA-256
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Digests {
    pub md5: Option<String>,
    pub sha256: Option<String>,
}

struct Hashers {
    md5: Option<Md5>,
    sha256: Option<Sha256>,
}

impl Hashers {
    fn new(md5: bool, sha256: bool) -> Self {
        Self {
            md5: md5.then(Md5::new),
            sha256: sha256.then(Sha256::new),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        if let Some(h) = self.md5.as_mut() {
            h.update(chunk);
        }
        if let Some(h) = self.sha256.as_mut() {
            h.update(chunk);
        }
    }

    fn finish(self) -> Digests {
        Digests {
            md5: self
                .md5
                .map(|h| base64::engine::general_purpose::STANDARD.encode(h.finalize())),
            sha256: self.sha256.map(|h| hex::encode(h.finalize())),
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Seekable(_) => f.write_str("Seekable"),
            Self::Stream(_) => f.write_str("Stream"),
            Self::Form(file) => f.debug_tuple("Form").field(&file.field).field(&file.data.len()).finish(),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(data: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(data))
    }
}

impl From<&'static [u8]> for RequestBody {
    fn from(data: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(data))
    }
}

impl From<String> for RequestBody {
    fn from(data: String) -> Self {
        Self::Bytes(Bytes::from(data))
    }
}

impl From<FormFile> for RequestBody {
    fn from(file: FormFile) -> Self {
        Self::Form(file)
    }
}

/// Gateway response handed to callers.
///
/// For successful requests the body is the live transport stream and is
/// owned by the caller from here on.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: BodyStream,
}

impl Response {
    pub(crate) fn from_transport(response: TransportResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
        }
    }

    /// HTTP status
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Take the body as a stream of chunks
    pub fn into_stream(self) -> BodyStream {
        self.body
    }

    /// Read the whole body
    pub async fn bytes(self) -> Result<Bytes> {
        drain(self.body).await
    }

    /// Read the whole body as UTF-8 text
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| ClientError::InvalidResponse(format!("body is not UTF-8: {}", e)))
    }

    /// Decode the body as JSON
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Read and discard the body
    pub async fn discard(self) -> Result<()> {
        let mut body = self.body;
        while let Some(chunk) = body.next().await {
            chunk?;
        }
        Ok(())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Read a body stream to the end into one buffer
pub(crate) async fn drain(mut body: BodyStream) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}
