//! Access credentials and their providers

use crate::{ClientError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// How requests are authenticated
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SignatureType {
    /// Whatever the signer defaults to (V4)
    #[default]
    Default,
    V2,
    V4,
    /// No authentication at all
    Anonymous,
}

impl SignatureType {
    pub fn is_v2(self) -> bool {
        self == Self::V2
    }

    /// V4 is also what `Default` means
    pub fn is_v4(self) -> bool {
        matches!(self, Self::V4 | Self::Default)
    }

    pub fn is_anonymous(self) -> bool {
        self == Self::Anonymous
    }
}

/// One set of credentials
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Value {
    /// Access key, which the gateway also treats as the account address
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Session token for temporary credentials
    pub session_token: String,
    pub signer_type: SignatureType,
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[redacted]")
            .field("session_token", &(!self.session_token.is_empty()))
            .field("signer_type", &self.signer_type)
            .finish()
    }
}

/// Source of credentials
pub trait Provider: Send + Sync {
    /// Fetch a fresh value
    fn retrieve(&self) -> Result<Value>;

    /// Whether the last retrieved value should be fetched again
    fn is_expired(&self) -> bool;
}

/// Fixed credentials
#[derive(Clone, Debug)]
pub struct StaticProvider {
    value: Value,
}

impl StaticProvider {
    /// Credentials with an explicit signature type.
    ///
    /// An empty access key or secret makes the credentials anonymous.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
        signer_type: SignatureType,
    ) -> Self {
        let access_key_id = access_key_id.into();
        let secret_access_key = secret_access_key.into();
        let signer_type = if access_key_id.is_empty() || secret_access_key.is_empty() {
            SignatureType::Anonymous
        } else {
            signer_type
        };
        Self {
            value: Value {
                access_key_id,
                secret_access_key,
                session_token: session_token.into(),
                signer_type,
            },
        }
    }

    pub fn v2(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self::new(access_key_id, secret_access_key, "", SignatureType::V2)
    }

    pub fn v4(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self::new(access_key_id, secret_access_key, session_token, SignatureType::V4)
    }

    pub fn anonymous() -> Self {
        Self::new("", "", "", SignatureType::Anonymous)
    }
}

impl Provider for StaticProvider {
    fn retrieve(&self) -> Result<Value> {
        Ok(self.value.clone())
    }

    fn is_expired(&self) -> bool {
        false
    }
}

/// Credentials from the process environment.
///
/// `MEFS_ACCESS_KEY`, `MEFS_SECRET_KEY` and `MEFS_SESSION_TOKEN` take
/// precedence over the `AWS_*` equivalents.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvProvider;

impl EnvProvider {
    fn lookup(primary: &str, fallback: &str) -> String {
        std::env::var(primary)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| std::env::var(fallback).ok())
            .unwrap_or_default()
    }
}

impl Provider for EnvProvider {
    fn retrieve(&self) -> Result<Value> {
        let provider = StaticProvider::new(
            Self::lookup("MEFS_ACCESS_KEY", "AWS_ACCESS_KEY_ID"),
            Self::lookup("MEFS_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"),
            Self::lookup("MEFS_SESSION_TOKEN", "AWS_SESSION_TOKEN"),
            SignatureType::V4,
        );
        provider.retrieve()
    }

    fn is_expired(&self) -> bool {
        false
    }
}

/// Caching wrapper around a [`Provider`]
pub struct Credentials {
    provider: Arc<dyn Provider>,
    cached: Mutex<Option<Value>>,
}

impl Credentials {
    pub fn new(provider: impl Provider + 'static) -> Self {
        Self::from_arc(Arc::new(provider))
    }

    pub fn from_arc(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            cached: Mutex::new(None),
        }
    }

    pub fn new_static_v2(access_key_id: &str, secret_access_key: &str) -> Self {
        Self::new(StaticProvider::v2(access_key_id, secret_access_key))
    }

    pub fn new_static_v4(access_key_id: &str, secret_access_key: &str, session_token: &str) -> Self {
        Self::new(StaticProvider::v4(access_key_id, secret_access_key, session_token))
    }

    pub fn anonymous() -> Self {
        Self::new(StaticProvider::anonymous())
    }

    /// Current value, fetched again when expired
    pub fn get(&self) -> Result<Value> {
        let mut cached = self.cached.lock();
        if let Some(value) = cached.as_ref() {
            if !self.provider.is_expired() {
                return Ok(value.clone());
            }
        }
        let value = self.provider.retrieve().map_err(|e| match e {
            ClientError::Credentials(_) => e,
            other => ClientError::Credentials(other.to_string()),
        })?;
        *cached = Some(value.clone());
        Ok(value)
    }

    /// Force the next [`get`](Self::get) to hit the provider
    pub fn expire(&self) {
        *self.cached.lock() = None;
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl Provider for CountingProvider {
        fn retrieve(&self) -> Result<Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value {
                access_key_id: format!("key-{}", n),
                secret_access_key: "secret".into(),
                ..Default::default()
            })
        }

        fn is_expired(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_empty_keys_are_anonymous() {
        let value = StaticProvider::v4("", "secret", "").retrieve().unwrap();
        assert!(value.signer_type.is_anonymous());
        let value = StaticProvider::v2("0xabc", "secret").retrieve().unwrap();
        assert!(value.signer_type.is_v2());
    }

    #[test]
    fn test_signature_type_predicates() {
        assert!(SignatureType::Default.is_v4());
        assert!(SignatureType::V4.is_v4());
        assert!(!SignatureType::V2.is_v4());
        assert!(!SignatureType::Default.is_anonymous());
    }

    #[test]
    fn test_credentials_cache_until_expired() {
        let creds = Credentials::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        assert_eq!(creds.get().unwrap().access_key_id, "key-0");
        assert_eq!(creds.get().unwrap().access_key_id, "key-0");
        creds.expire();
        assert_eq!(creds.get().unwrap().access_key_id, "key-1");
    }

    #[test]
    fn test_debug_hides_secret() {
        let value = StaticProvider::v4("0xabc", "topsecret", "tok").retrieve().unwrap();
        let shown = format!("{:?}", value);
        assert!(shown.contains("0xabc"));
        assert!(!shown.contains("topsecret"));
        assert!(!shown.contains("tok\""));
    }
}
