//! Main client implementation

use crate::bucket_cache::{BucketLocationCache, DEFAULT_REGION};
use crate::config::BucketLookup;
use crate::credentials::{Credentials, SignatureType};
use crate::error::ErrorResponse;
use crate::metadata::RequestMetadata;
use crate::retry::{Delay, TokioDelay};
use crate::s3utils::is_virtual_host_supported;
use crate::signer::{redact_signature, resolve_signer_type, AddressSigner, Signer};
use crate::transport::{HttpBody, HttpRequest, ReqwestTransport, Transport};
use crate::{ClientError, Config, Result};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Prefix of the gateway's command API
pub const API_PREFIX: &str = "api/v0";

pub(crate) const CONTENT_MD5: &str = "content-md5";
pub(crate) const CONTENT_SHA256: &str = "x-amz-content-sha256";
const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
/// Digest placeholder for bodies that cannot be read ahead
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

const TRACE_OFF: u8 = 0;
const TRACE_ALL: u8 = 1;
const TRACE_ERRORS_ONLY: u8 = 2;

/// Digests to attach to outgoing payloads
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct HashMaterials {
    pub md5: bool,
    pub sha256: bool,
}

/// MEFS gateway client.
///
/// Cheap to clone; clones share the credentials, the transport and the
/// bucket location cache.
#[derive(Clone)]
pub struct Client {
    pub(crate) config: Config,
    pub(crate) base_url: Url,
    user_agent: String,
    pub(crate) credentials: Arc<Credentials>,
    override_signer_type: SignatureType,
    pub(crate) transport: Arc<dyn Transport>,
    custom_transport: bool,
    signer: Arc<dyn Signer>,
    pub(crate) delay: Arc<dyn Delay>,
    pub(crate) location_cache: Arc<BucketLocationCache>,
    trace: Arc<AtomicU8>,
}

impl Client {
    /// Create a new client with the given configuration
    pub fn new(config: Config, credentials: Credentials) -> Result<Self> {
        let config = config.resolve_local()?;
        let base_url = config.base_url()?;
        let transport = ReqwestTransport::new(config.timeout, config.keep_alive)?;
        Ok(Self {
            user_agent: config.user_agent(),
            config,
            base_url,
            credentials: Arc::new(credentials),
            override_signer_type: SignatureType::Default,
            transport: Arc::new(transport),
            custom_transport: false,
            signer: Arc::new(AddressSigner),
            delay: Arc::new(TokioDelay),
            location_cache: Arc::new(BucketLocationCache::new()),
            trace: Arc::new(AtomicU8::new(TRACE_OFF)),
        })
    }

    /// Client that signs with V2 semantics
    pub fn new_v2(endpoint: &str, access_key_id: &str, secret_access_key: &str, secure: bool) -> Result<Self> {
        let config = Config::new(endpoint).with_secure(secure);
        let mut client = Self::new(config, Credentials::new_static_v2(access_key_id, secret_access_key))?;
        client.override_signer_type = SignatureType::V2;
        Ok(client)
    }

    /// Client that signs with V4 semantics
    pub fn new_v4(endpoint: &str, access_key_id: &str, secret_access_key: &str, secure: bool) -> Result<Self> {
        let config = Config::new(endpoint).with_secure(secure);
        let mut client = Self::new(config, Credentials::new_static_v4(access_key_id, secret_access_key, ""))?;
        client.override_signer_type = SignatureType::V4;
        Ok(client)
    }

    /// Client pinned to a region; `"local"` reads the endpoint from the local node
    pub fn with_region(
        endpoint: &str,
        access_key_id: &str,
        secret_access_key: &str,
        secure: bool,
        region: &str,
    ) -> Result<Self> {
        let config = Config::new(endpoint).with_secure(secure).with_region(region);
        Self::new(config, Credentials::new_static_v4(access_key_id, secret_access_key, ""))
    }

    /// Replace the HTTP transport
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self.custom_transport = true;
        self
    }

    /// Replace the request signer
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = signer;
        self
    }

    /// Replace the timer used between retries
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gateway base URL
    pub fn endpoint_url(&self) -> &Url {
        &self.base_url
    }

    /// Shared bucket location cache
    pub fn location_cache(&self) -> &BucketLocationCache {
        &self.location_cache
    }

    /// Add application details to the user agent
    pub fn set_app_info(&mut self, name: &str, version: &str) {
        self.config = self.config.clone().with_app_info(name, version);
        self.user_agent = self.config.user_agent();
    }

    /// Change the request timeout.
    ///
    /// A custom transport keeps its own timeout.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.config.timeout = timeout;
        if !self.custom_transport {
            self.transport = Arc::new(ReqwestTransport::new(timeout, self.config.keep_alive)?);
        }
        Ok(())
    }

    /// Log every request and response on the `mefs_client::trace` target
    pub fn trace_on(&self) {
        self.trace.store(TRACE_ALL, Ordering::Relaxed);
    }

    /// Log only failed exchanges
    pub fn trace_errors_only_on(&self) {
        self.trace.store(TRACE_ERRORS_ONLY, Ordering::Relaxed);
    }

    /// Go back from errors-only to full tracing
    pub fn trace_errors_only_off(&self) {
        let _ = self.trace.compare_exchange(
            TRACE_ERRORS_ONLY,
            TRACE_ALL,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }

    /// Stop tracing
    pub fn trace_off(&self) {
        self.trace.store(TRACE_OFF, Ordering::Relaxed);
    }

    pub(crate) fn is_tracing(&self) -> bool {
        self.trace.load(Ordering::Relaxed) != TRACE_OFF
    }

    /// Region for the next attempt: configured, cached, per-call, default
    pub(crate) fn region_for(&self, metadata: &RequestMetadata) -> String {
        if let Some(region) = &self.config.region {
            return region.clone();
        }
        if !metadata.bucket_name.is_empty() {
            if let Some(region) = self.location_cache.get(&metadata.bucket_name) {
                return region;
            }
        }
        if !metadata.bucket_location.is_empty() {
            return metadata.bucket_location.clone();
        }
        DEFAULT_REGION.to_string()
    }

    fn is_virtual_host_style(&self, bucket: &str) -> bool {
        if bucket.is_empty() {
            return false;
        }
        match self.config.bucket_lookup {
            BucketLookup::Dns => true,
            BucketLookup::Path => false,
            BucketLookup::Auto => is_virtual_host_supported(&self.base_url, bucket),
        }
    }

    /// URL for a request.
    ///
    /// Command API calls go to `/api/v0/<command>`; everything else is
    /// addressed S3 style by bucket and object.
    pub(crate) fn target_url(&self, metadata: &RequestMetadata) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ClientError::Config(format!("endpoint {} cannot be a base", self.base_url)))?;
            segments.pop_if_empty();
            if let Some(command) = &metadata.command {
                segments.extend(API_PREFIX.split('/'));
                segments.extend(command.split('/').filter(|s| !s.is_empty()));
            } else {
                if !metadata.bucket_name.is_empty() && !self.is_virtual_host_style(&metadata.bucket_name) {
                    segments.push(&metadata.bucket_name);
                }
                if !metadata.object_name.is_empty() {
                    segments.extend(metadata.object_name.split('/'));
                } else if !metadata.bucket_name.is_empty() {
                    segments.push("");
                }
            }
        }

        if metadata.command.is_none() && self.is_virtual_host_style(&metadata.bucket_name) {
            let host = self.base_url.host_str().unwrap_or_default();
            let vhost = format!("{}.{}", metadata.bucket_name, host);
            url.set_host(Some(&vhost))
                .map_err(|e| ClientError::InvalidArgument(format!("bucket {:?} as host: {}", metadata.bucket_name, e)))?;
        }

        if !metadata.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &metadata.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Which payload digests the signer expects
    pub(crate) fn hash_materials(&self) -> HashMaterials {
        if self.override_signer_type.is_v4() {
            if self.config.secure {
                HashMaterials { md5: true, sha256: false }
            } else {
                HashMaterials { md5: false, sha256: true }
            }
        } else if self.override_signer_type.is_anonymous() {
            HashMaterials { md5: true, sha256: false }
        } else {
            HashMaterials::default()
        }
    }

    /// Build and sign the request for one attempt
    pub(crate) async fn build_request(
        &self,
        method: &Method,
        metadata: &mut RequestMetadata,
        region: &str,
    ) -> Result<HttpRequest> {
        let url = self.target_url(metadata)?;

        let hashes = self.hash_materials();
        let (body, length) = match metadata.body.as_mut() {
            Some(body) => {
                let want_md5 = hashes.md5 && metadata.content_md5_base64.is_none();
                let want_sha256 = hashes.sha256 && metadata.content_sha256_hex.is_none();
                if want_md5 || want_sha256 {
                    let digests = body.digest(metadata.content_length, want_md5, want_sha256).await?;
                    if want_md5 {
                        metadata.content_md5_base64 = digests.md5;
                    }
                    if want_sha256 {
                        metadata.content_sha256_hex = digests.sha256;
                    }
                }
                body.open(metadata.content_length).await?
            }
            None => (HttpBody::Empty, None),
        };

        let mut headers = metadata.headers.clone();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|_| ClientError::Config("user agent is not a valid header value".into()))?,
        );
        if let (HttpBody::Stream(_), Some(length)) = (&body, length) {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        }

        if let Some(md5) = &metadata.content_md5_base64 {
            headers.insert(CONTENT_MD5, header_value(md5)?);
        }
        let sha256 = match &metadata.content_sha256_hex {
            Some(sha256) => Some(sha256.as_str()),
            None if hashes.sha256 && metadata.body.is_none() => Some(EMPTY_SHA256),
            None if hashes.sha256 => Some(UNSIGNED_PAYLOAD),
            None => None,
        };
        if let Some(sha256) = sha256 {
            headers.insert(CONTENT_SHA256, header_value(sha256)?);
        }

        let mut request = HttpRequest {
            method: method.clone(),
            url,
            headers,
            body,
        };

        let value = self.credentials.get()?;
        let signer_type = resolve_signer_type(value.signer_type, self.override_signer_type);
        if !signer_type.is_anonymous() {
            self.signer.sign(&mut request, &value, region)?;
        }
        Ok(request)
    }

    /// Emit one request/response exchange on the trace target
    pub(crate) fn trace_exchange(
        &self,
        request: &HttpRequest,
        status: StatusCode,
        response_headers: &HeaderMap,
        error: Option<&ErrorResponse>,
    ) {
        let mode = self.trace.load(Ordering::Relaxed);
        if mode == TRACE_OFF || (mode == TRACE_ERRORS_ONLY && error.is_none()) {
            return;
        }
        info!(
            target: "mefs_client::trace",
            method = %request.method,
            url = %request.url,
            request_headers = %format_headers(&request.headers),
            status = status.as_u16(),
            response_headers = %format_headers(response_headers),
            error_body = %error.map(|e| String::from_utf8_lossy(&e.body).into_owned()).unwrap_or_default(),
            "http exchange"
        );
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| ClientError::InvalidArgument(format!("invalid header value {:?}", value)))
}

fn format_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            let value = value.to_str().unwrap_or("<binary>");
            if name == header::AUTHORIZATION {
                format!("{}: {}", name, redact_signature(value))
            } else {
                format!("{}: {}", name, value)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.base_url.as_str())
            .field("region", &self.config.region)
            .field("override_signer_type", &self.override_signer_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> Client {
        Client::new(Config::new(endpoint), Credentials::new_static_v4("0xabc", "secret", "")).unwrap()
    }

    #[test]
    fn test_command_url() {
        let c = client("127.0.0.1:4608");
        let md = RequestMetadata::command("lfs/head_object")
            .query("arg", "photos")
            .query("arg", "cat png");
        let url = c.target_url(&md).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:4608/api/v0/lfs/head_object?arg=photos&arg=cat+png"
        );
    }

    #[test]
    fn test_path_style_url() {
        let c = client("127.0.0.1:4608");
        let md = RequestMetadata::new().bucket("photos").object("2024/cat.png");
        assert_eq!(c.target_url(&md).unwrap().as_str(), "http://127.0.0.1:4608/photos/2024/cat.png");

        let md = RequestMetadata::new().bucket("photos").query("location", "");
        assert_eq!(c.target_url(&md).unwrap().as_str(), "http://127.0.0.1:4608/photos/?location=");
    }

    #[test]
    fn test_virtual_host_url() {
        let c = Client::new(
            Config::new("s3.amazonaws.com").with_secure(true),
            Credentials::anonymous(),
        )
        .unwrap();
        let md = RequestMetadata::new().bucket("photos").object("cat.png");
        assert_eq!(c.target_url(&md).unwrap().as_str(), "https://photos.s3.amazonaws.com/cat.png");
    }

    #[test]
    fn test_region_resolution_order() {
        let c = client("127.0.0.1:4608");
        let md = RequestMetadata::new().bucket("photos");
        assert_eq!(c.region_for(&md), DEFAULT_REGION);

        let md = md.location("ap-east-1");
        assert_eq!(c.region_for(&md), "ap-east-1");

        c.location_cache.set("photos", "eu-west-1");
        assert_eq!(c.region_for(&md), "eu-west-1");

        let pinned = Client::new(
            Config::new("127.0.0.1:4608").with_region("us-west-2"),
            Credentials::anonymous(),
        )
        .unwrap();
        pinned.location_cache.set("photos", "eu-west-1");
        assert_eq!(pinned.region_for(&md), "us-west-2");
    }

    #[test]
    fn test_hash_materials() {
        let v4 = Client::new_v4("127.0.0.1:4608", "0xabc", "secret", false).unwrap();
        assert_eq!(v4.hash_materials(), HashMaterials { md5: false, sha256: true });
        let v4_tls = Client::new_v4("127.0.0.1:4608", "0xabc", "secret", true).unwrap();
        assert_eq!(v4_tls.hash_materials(), HashMaterials { md5: true, sha256: false });
        let v2 = Client::new_v2("127.0.0.1:4608", "0xabc", "secret", false).unwrap();
        assert_eq!(v2.hash_materials(), HashMaterials::default());
    }

    #[tokio::test]
    async fn test_build_request_signs_and_sets_agent() {
        let mut c = client("127.0.0.1:4608");
        c.set_app_info("backup", "1.0");
        let mut md = RequestMetadata::command("version");
        let req = c.build_request(&Method::POST, &mut md, DEFAULT_REGION).await.unwrap();
        let ua = req.headers.get(header::USER_AGENT).unwrap().to_str().unwrap();
        assert!(ua.ends_with("backup/1.0"));
        assert_eq!(req.url.query(), Some("address=0xabc"));
    }

    #[tokio::test]
    async fn test_anonymous_requests_are_unsigned() {
        let c = Client::new(Config::default(), Credentials::anonymous()).unwrap();
        let mut md = RequestMetadata::command("version");
        let req = c.build_request(&Method::POST, &mut md, DEFAULT_REGION).await.unwrap();
        assert_eq!(req.url.query(), None);
    }

    #[tokio::test]
    async fn test_v4_plain_http_adds_sha256() {
        let c = Client::new_v4("127.0.0.1:4608", "0xabc", "secret", false).unwrap();
        let mut md = RequestMetadata::new().bucket("photos").object("a").body(b"hello".to_vec());
        let req = c.build_request(&Method::PUT, &mut md, DEFAULT_REGION).await.unwrap();
        assert_eq!(
            req.headers.get(CONTENT_SHA256).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(req.headers.get(CONTENT_MD5).is_none());
    }

    #[tokio::test]
    async fn test_file_body_is_digested_once_and_streamed() {
        let c = Client::new_v4("127.0.0.1:4608", "0xabc", "secret", false).unwrap();
        let mut md = RequestMetadata::new()
            .bucket("photos")
            .object("a")
            .body(crate::body::RequestBody::seekable(std::io::Cursor::new(b"hello".to_vec())));

        let req = c.build_request(&Method::PUT, &mut md, DEFAULT_REGION).await.unwrap();
        assert!(matches!(req.body, HttpBody::Stream(_)));
        assert_eq!(req.headers.get(header::CONTENT_LENGTH).unwrap(), "5");
        assert_eq!(
            md.content_sha256_hex.as_deref(),
            Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
        assert_eq!(req.body.into_bytes().await.unwrap(), &b"hello"[..]);
    }

    #[tokio::test]
    async fn test_stream_body_is_unsigned_payload() {
        let c = Client::new_v4("127.0.0.1:4608", "0xabc", "secret", false).unwrap();
        let mut md = RequestMetadata::new()
            .bucket("photos")
            .object("a")
            .body(crate::body::RequestBody::stream(std::io::Cursor::new(b"hello".to_vec())));

        let req = c.build_request(&Method::PUT, &mut md, DEFAULT_REGION).await.unwrap();
        assert_eq!(req.headers.get(CONTENT_SHA256).unwrap(), UNSIGNED_PAYLOAD);
        assert!(req.headers.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(req.body.into_bytes().await.unwrap(), &b"hello"[..]);
    }

    #[test]
    fn test_trace_mode_toggles() {
        let c = client("127.0.0.1:4608");
        assert!(!c.is_tracing());
        c.trace_errors_only_on();
        assert_eq!(c.trace.load(Ordering::Relaxed), TRACE_ERRORS_ONLY);
        c.trace_errors_only_off();
        assert_eq!(c.trace.load(Ordering::Relaxed), TRACE_ALL);
        c.trace_off();
        c.trace_errors_only_off();
        assert!(!c.is_tracing());
    }

    #[test]
    fn test_format_headers_redacts_authorization() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("AWS key:sig"));
        let shown = format_headers(&headers);
        assert!(!shown.contains("key:sig"));
    }
}
