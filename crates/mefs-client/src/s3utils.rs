//! Bucket and object name checks

use crate::{ClientError, Result};
use std::net::Ipv4Addr;
use url::Url;

const MIN_BUCKET_NAME_LEN: usize = 3;
const MAX_BUCKET_NAME_LEN: usize = 63;
const MAX_OBJECT_NAME_BYTES: usize = 1024;

fn invalid_bucket(name: &str, reason: &str) -> ClientError {
    ClientError::InvalidBucketName {
        name: name.to_owned(),
        reason: reason.to_owned(),
    }
}

/// Check a bucket name before it goes on the wire.
///
/// 3 to 63 characters of lowercase letters, digits, dots and hyphens,
/// starting and ending with a letter or digit, without `..`, and not
/// shaped like an IPv4 address.
pub fn check_valid_bucket_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(invalid_bucket(name, "bucket name cannot be empty"));
    }

    let len = name.len();
    if !(MIN_BUCKET_NAME_LEN..=MAX_BUCKET_NAME_LEN).contains(&len) {
        return Err(invalid_bucket(
            name,
            &format!("bucket name must be between {MIN_BUCKET_NAME_LEN} and {MAX_BUCKET_NAME_LEN} characters long"),
        ));
    }

    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return Err(invalid_bucket(
            name,
            "bucket name contains invalid characters",
        ));
    }

    let bytes = name.as_bytes();
    let (first, last) = (bytes[0], bytes[len - 1]);
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return Err(invalid_bucket(
            name,
            "bucket name must start and end with a letter or number",
        ));
    }

    if name.contains("..") {
        return Err(invalid_bucket(name, "bucket name contains consecutive dots"));
    }

    if name.parse::<Ipv4Addr>().is_ok() {
        return Err(invalid_bucket(name, "bucket name cannot be an ip address"));
    }

    Ok(())
}

/// Check an object name before it goes on the wire
pub fn check_valid_object_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ClientError::InvalidObjectName {
            name: name.to_owned(),
            reason: "object name cannot be empty".to_owned(),
        });
    }
    if name.len() > MAX_OBJECT_NAME_BYTES {
        return Err(ClientError::InvalidObjectName {
            name: name.to_owned(),
            reason: format!("object name cannot be longer than {MAX_OBJECT_NAME_BYTES} bytes"),
        });
    }
    Ok(())
}

/// Amazon S3 endpoint
pub fn is_amazon_endpoint(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|host| host == "s3.amazonaws.com" || host.ends_with(".amazonaws.com"))
}

/// Google Cloud Storage endpoint
pub fn is_google_endpoint(url: &Url) -> bool {
    url.host_str() == Some("storage.googleapis.com")
}

/// Whether `bucket.host` addressing works for this endpoint and bucket.
///
/// Dotted bucket names break TLS wildcard certificates, so they fall back
/// to path style over https.
pub fn is_virtual_host_supported(url: &Url, bucket: &str) -> bool {
    if bucket.is_empty() {
        return false;
    }
    if url.scheme() == "https" && bucket.contains('.') {
        return false;
    }
    is_amazon_endpoint(url) || is_google_endpoint(url)
}
