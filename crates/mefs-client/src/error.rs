//! Client error types

use crate::transport::TransportError;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The gateway answered with an error status
    #[error("gateway error ({}): {}", .0.code, .0.message)]
    Gateway(Box<ErrorResponse>),

    /// IO error, including failure to rewind a request body
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid argument supplied by the caller
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Bucket name failed validation
    #[error("invalid bucket name {name:?}: {reason}")]
    InvalidBucketName { name: String, reason: String },

    /// Object name failed validation
    #[error("invalid object name {name:?}: {reason}")]
    InvalidObjectName { name: String, reason: String },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Credentials could not be retrieved
    #[error("credentials error: {0}")]
    Credentials(String),

    /// The caller cancelled the request context
    #[error("request cancelled")]
    Cancelled,

    /// The request context deadline passed
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// No response and no error came out of the executor
    #[error("response is empty, please report this issue at https://github.com/memoio/mefs-client-rs/issues")]
    EmptyResponse,

    /// The gateway replied with something we could not interpret
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML parsing error
    #[error("XML parsing error: {0}")]
    XmlParse(String),
}

impl ClientError {
    /// The decoded gateway error, if this is one
    pub fn error_response(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Gateway(resp) => Some(resp),
            _ => None,
        }
    }

    /// Error code reported by the gateway, if any
    pub fn code(&self) -> Option<&str> {
        self.error_response().map(|resp| resp.code.as_str())
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self.code(), Some("NoSuchKey" | "NoSuchBucket"))
    }

    /// Check if this is an access denied error
    pub fn is_access_denied(&self) -> bool {
        self.code() == Some("AccessDenied")
    }

    /// Check if the request was cancelled or timed out by its context
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

impl From<quick_xml::DeError> for ClientError {
    fn from(err: quick_xml::DeError) -> Self {
        ClientError::XmlParse(err.to_string())
    }
}

/// Decoded gateway error.
///
/// Built once per failed attempt from the buffered response. The raw body is
/// kept so callers can re-read what the gateway sent.
#[derive(Clone, Debug, Default)]
pub struct ErrorResponse {
    /// HTTP status of the failed response
    pub status: u16,
    /// Gateway error code, e.g. `NoSuchKey`
    pub code: String,
    /// Human readable message
    pub message: String,
    /// Bucket the request addressed
    pub bucket_name: String,
    /// Object the request addressed
    pub key: String,
    /// Gateway request id
    pub request_id: String,
    /// Gateway host id
    pub host_id: String,
    /// Region hint, set on region mismatch errors
    pub region: String,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw response body
    pub body: Bytes,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct XmlErrorBody {
    code: String,
    message: String,
    bucket_name: String,
    key: String,
    request_id: String,
    host_id: String,
    region: String,
}

/// Error shape of the command API (`/api/v0/...`)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommandErrorBody {
    message: String,
    #[serde(default)]
    code: serde_json::Value,
}

impl ErrorResponse {
    /// Decode an error from a buffered HTTP response.
    ///
    /// The body may be an S3 XML `<Error>` document or a command API JSON
    /// error. When it carries no code, one is derived from the status.
    pub fn from_http(
        status: StatusCode,
        headers: &HeaderMap,
        body: Bytes,
        bucket_name: &str,
        object_name: &str,
    ) -> Self {
        let mut resp = ErrorResponse {
            status: status.as_u16(),
            headers: headers.clone(),
            ..Default::default()
        };

        let text = String::from_utf8_lossy(&body).trim().to_string();
        if !text.is_empty() {
            if is_json(headers, &text) {
                match serde_json::from_str::<CommandErrorBody>(&text) {
                    Ok(err) => {
                        resp.message = err.message;
                        if let serde_json::Value::String(code) = err.code {
                            resp.code = code;
                        }
                    }
                    Err(_) => resp.message = text,
                }
            } else if !text.starts_with('<') {
                resp.message = text;
            } else {
                match quick_xml::de::from_str::<XmlErrorBody>(&text) {
                    Ok(err) => {
                        resp.code = err.code;
                        resp.message = err.message;
                        resp.bucket_name = err.bucket_name;
                        resp.key = err.key;
                        resp.request_id = err.request_id;
                        resp.host_id = err.host_id;
                        resp.region = err.region;
                    }
                    Err(_) => resp.message = text,
                }
            }
        }
        resp.body = body;

        if resp.code.is_empty() {
            let (code, message) = status_error(status, object_name);
            resp.code = code;
            if resp.message.is_empty() {
                resp.message = message;
            }
        }
        if resp.bucket_name.is_empty() {
            resp.bucket_name = bucket_name.to_string();
        }
        if resp.key.is_empty() {
            resp.key = object_name.to_string();
        }
        fill_from_header(&mut resp.region, headers, "x-amz-bucket-region");
        fill_from_header(&mut resp.request_id, headers, "x-amz-request-id");
        fill_from_header(&mut resp.host_id, headers, "x-amz-id-2");

        resp
    }
}

fn is_json(headers: &HeaderMap, text: &str) -> bool {
    let json_content_type = headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"));
    json_content_type || text.starts_with('{')
}

fn fill_from_header(field: &mut String, headers: &HeaderMap, name: &str) {
    if field.is_empty() {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            *field = value.to_string();
        }
    }
}

/// Code and message for an error response that carried no body
fn status_error(status: StatusCode, object_name: &str) -> (String, String) {
    let (code, message) = match status {
        StatusCode::NOT_FOUND if object_name.is_empty() => {
            ("NoSuchBucket", "The specified bucket does not exist.")
        }
        StatusCode::NOT_FOUND => ("NoSuchKey", "The specified key does not exist."),
        StatusCode::FORBIDDEN => ("AccessDenied", "Access Denied."),
        StatusCode::CONFLICT => ("Conflict", "Bucket not empty."),
        StatusCode::PRECONDITION_FAILED => (
            "PreconditionFailed",
            "At least one of the pre-conditions you specified did not hold.",
        ),
        StatusCode::NOT_IMPLEMENTED => (
            "NotImplemented",
            "A header you provided implies functionality that is not implemented.",
        ),
        _ => {
            let reason = status.canonical_reason().unwrap_or("Unknown error");
            return (reason.to_string(), reason.to_string());
        }
    };
    (code.to_string(), message.to_string())
}
