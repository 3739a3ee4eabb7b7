//! Client configuration

use crate::retry::{RetryTimer, DEFAULT_RETRY_CAP, DEFAULT_RETRY_UNIT, MAX_JITTER, MAX_RETRY};
use crate::{ClientError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable naming the node's data directory
pub const ENV_MEFS_PATH: &str = "MEFS_PATH";

/// Data directory used when `MEFS_PATH` is unset
pub const DEFAULT_PATH_ROOT: &str = "~/.mefs";

/// File inside the data directory holding the node's API address
pub const DEFAULT_API_FILE: &str = "api";

/// Region value that means "read the endpoint from the local node"
pub const LOCAL_REGION: &str = "local";

const LIBRARY_NAME: &str = "mefs-client";

/// How bucket names are placed in request URLs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BucketLookup {
    /// Virtual-host style for hosts known to support it, path style otherwise
    #[default]
    Auto,
    /// Always `bucket.host`
    Dns,
    /// Always `host/bucket`
    Path,
}

/// Client configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Gateway address: `host:port`, a URL, or a multiaddr such as
    /// `/ip4/127.0.0.1/tcp/4608`
    pub endpoint: String,
    /// Use https
    pub secure: bool,
    /// Fixed region; disables region correction when set
    pub region: Option<String>,
    pub bucket_lookup: BucketLookup,
    /// Per-request timeout
    pub timeout: Duration,
    /// Reuse connections between requests
    pub keep_alive: bool,
    /// Attempts per request, the first included
    pub max_retries: u32,
    /// Base backoff delay
    pub retry_unit: Duration,
    /// Upper bound on a single backoff delay
    pub retry_cap: Duration,
    /// Jitter factor in `[0, 1]`
    pub jitter: f64,
    /// Application name and version appended to the user agent
    pub app_info: Option<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:4608".to_string(),
            secure: false,
            region: None,
            bucket_lookup: BucketLookup::Auto,
            timeout: Duration::from_secs(60),
            keep_alive: false,
            max_retries: MAX_RETRY,
            retry_unit: DEFAULT_RETRY_UNIT,
            retry_cap: DEFAULT_RETRY_CAP,
            jitter: MAX_JITTER,
            app_info: None,
        }
    }
}

impl Config {
    /// Create a new config with the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Fix the region; `"local"` reads the endpoint from the local node
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        let region = region.into();
        self.region = if region.is_empty() { None } else { Some(region) };
        self
    }

    pub fn with_bucket_lookup(mut self, lookup: BucketLookup) -> Self {
        self.bucket_lookup = lookup;
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Backoff unit and cap
    pub fn with_retry_backoff(mut self, unit: Duration, cap: Duration) -> Self {
        self.retry_unit = unit;
        self.retry_cap = cap;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Ignored unless both parts are non-empty
    pub fn with_app_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        let (name, version) = (name.into(), version.into());
        if !name.is_empty() && !version.is_empty() {
            self.app_info = Some((name, version));
        }
        self
    }

    /// Retry schedule for one call
    pub fn retry_timer(&self) -> RetryTimer {
        RetryTimer::new(self.retry_unit, self.retry_cap, self.jitter).with_max_attempts(self.max_retries)
    }

    /// `User-Agent` header value
    pub fn user_agent(&self) -> String {
        let base = format!(
            "Mefs ({}; {}) {}/{}",
            std::env::consts::OS,
            std::env::consts::ARCH,
            LIBRARY_NAME,
            env!("CARGO_PKG_VERSION")
        );
        match &self.app_info {
            Some((name, version)) => format!("{} {}/{}", base, name, version),
            None => base,
        }
    }

    /// Swap a `"local"` region for the endpoint published by the local node
    pub(crate) fn resolve_local(mut self) -> Result<Self> {
        if self.region.as_deref() == Some(LOCAL_REGION) {
            let dir = std::env::var(ENV_MEFS_PATH)
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_PATH_ROOT.to_string());
            self.endpoint = endpoint_from_api_dir(&expand_home(&dir)?)?;
            self.region = None;
        }
        Ok(self)
    }

    /// Base URL of the gateway
    pub fn base_url(&self) -> Result<Url> {
        let endpoint = self.endpoint.trim();
        if endpoint.contains("://") {
            return Url::parse(endpoint)
                .map_err(|e| ClientError::Config(format!("invalid endpoint {:?}: {}", endpoint, e)));
        }
        let host = normalize_endpoint(endpoint)?;
        let scheme = if self.secure { "https" } else { "http" };
        Url::parse(&format!("{}://{}/", scheme, host))
            .map_err(|e| ClientError::Config(format!("invalid endpoint {:?}: {}", endpoint, e)))
    }
}

/// Turn a multiaddr into `host:port`; anything else passes through trimmed
pub fn normalize_endpoint(endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(ClientError::Config("endpoint is empty".into()));
    }
    if !endpoint.starts_with('/') {
        return Ok(endpoint.trim_end_matches('/').to_string());
    }

    let parts: Vec<&str> = endpoint.trim_matches('/').split('/').collect();
    match parts.as_slice() {
        [proto, host, "tcp", port, ..] if is_host_proto(proto) => {
            port.parse::<u16>()
                .map_err(|_| ClientError::Config(format!("invalid port in multiaddr {:?}", endpoint)))?;
            if *proto == "ip6" {
                Ok(format!("[{}]:{}", host, port))
            } else {
                Ok(format!("{}:{}", host, port))
            }
        }
        _ => Err(ClientError::Config(format!(
            "unsupported multiaddr {:?}, expected /ip4|ip6|dns4|dns6|dns/<host>/tcp/<port>",
            endpoint
        ))),
    }
}

fn is_host_proto(proto: &str) -> bool {
    matches!(proto, "ip4" | "ip6" | "dns" | "dns4" | "dns6")
}

/// Read the API address a node wrote into its data directory
pub fn endpoint_from_api_dir(dir: &Path) -> Result<String> {
    let path = dir.join(DEFAULT_API_FILE);
    let api = std::fs::read_to_string(&path)
        .map_err(|e| ClientError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let api = api.trim();
    if api.is_empty() {
        return Err(ClientError::Config(format!("{} is empty", path.display())));
    }
    Ok(api.to_string())
}

fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            let home = std::env::var("HOME")
                .map_err(|_| ClientError::Config("cannot expand ~: HOME is not set".into()))?;
            Ok(PathBuf::from(home).join(rest.trim_start_matches('/')))
        }
        _ => Ok(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/ip4/127.0.0.1/tcp/4608", "127.0.0.1:4608")]
    #[case("/ip6/::1/tcp/4608", "[::1]:4608")]
    #[case("/dns4/gateway.example.com/tcp/80", "gateway.example.com:80")]
    #[case("127.0.0.1:4608", "127.0.0.1:4608")]
    #[case(" localhost:9000/ ", "localhost:9000")]
    fn test_normalize_endpoint(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_endpoint(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("/ip4/127.0.0.1/udp/4608")]
    #[case("/ip4/127.0.0.1/tcp/notaport")]
    fn test_normalize_endpoint_rejects(#[case] input: &str) {
        assert!(matches!(normalize_endpoint(input), Err(ClientError::Config(_))));
    }

    #[test]
    fn test_base_url() {
        let url = Config::new("/ip4/10.0.0.2/tcp/4608").base_url().unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.2:4608/");

        let url = Config::new("gw.example.com").with_secure(true).base_url().unwrap();
        assert_eq!(url.as_str(), "https://gw.example.com/");

        let url = Config::new("http://127.0.0.1:9000").base_url().unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/");
    }

    #[test]
    fn test_user_agent_with_app_info() {
        let config = Config::default();
        let ua = config.user_agent();
        assert!(ua.starts_with("Mefs ("));
        assert!(ua.contains("mefs-client/"));

        let ua = config.with_app_info("backup", "2.1").user_agent();
        assert!(ua.ends_with(" backup/2.1"));

        let ua = Config::default().with_app_info("backup", "").user_agent();
        assert!(!ua.contains("backup"));
    }

    #[test]
    fn test_endpoint_from_api_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_API_FILE), "/ip4/127.0.0.1/tcp/5001\n").unwrap();
        assert_eq!(endpoint_from_api_dir(dir.path()).unwrap(), "/ip4/127.0.0.1/tcp/5001");

        let empty = tempfile::tempdir().unwrap();
        assert!(endpoint_from_api_dir(empty.path()).is_err());
    }

    #[test]
    fn test_retry_timer_from_config() {
        let timer = Config::default()
            .with_max_retries(3)
            .with_retry_backoff(Duration::from_millis(10), Duration::from_millis(40))
            .with_jitter(0.0)
            .retry_timer();
        assert_eq!(timer.max_attempts, 3);
        assert_eq!(timer.backoff(4), Duration::from_millis(40));
    }

    #[test]
    fn test_empty_region_is_unset() {
        assert_eq!(Config::default().with_region("").region, None);
        assert_eq!(Config::default().with_region("eu-west-1").region.as_deref(), Some("eu-west-1"));
    }
}
