//! Request signing

use crate::credentials::{SignatureType, Value};
use crate::transport::HttpRequest;
use crate::Result;
use reqwest::header::HeaderValue;

/// Header carrying a temporary session token
pub const SECURITY_TOKEN_HEADER: &str = "x-amz-security-token";

const REDACTED: &str = "**REDACTED**";

/// Authenticates a built request in place
pub trait Signer: Send + Sync {
    fn sign(&self, request: &mut HttpRequest, credentials: &Value, region: &str) -> Result<()>;
}

/// Leaves requests untouched
#[derive(Clone, Copy, Debug, Default)]
pub struct AnonymousSigner;

impl Signer for AnonymousSigner {
    fn sign(&self, _request: &mut HttpRequest, _credentials: &Value, _region: &str) -> Result<()> {
        Ok(())
    }
}

/// Scopes requests to an account by its address.
///
/// The gateway identifies the caller by the `address` query option, which
/// is the access key. An explicit `address` already on the request wins.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddressSigner;

impl Signer for AddressSigner {
    fn sign(&self, request: &mut HttpRequest, credentials: &Value, _region: &str) -> Result<()> {
        if credentials.signer_type.is_anonymous() {
            return Ok(());
        }

        let has_address = request.url.query_pairs().any(|(k, _)| k == "address");
        if !has_address && !credentials.access_key_id.is_empty() {
            request
                .url
                .query_pairs_mut()
                .append_pair("address", &credentials.access_key_id);
        }

        if !credentials.session_token.is_empty() {
            let value = HeaderValue::from_str(&credentials.session_token).map_err(|_| {
                crate::ClientError::Credentials("session token is not a valid header value".into())
            })?;
            request.headers.insert(SECURITY_TOKEN_HEADER, value);
        }
        Ok(())
    }
}

/// Signature type actually used for a request.
///
/// A client override replaces the credential's own type, except that
/// anonymous credentials are never signed.
pub fn resolve_signer_type(credential_type: SignatureType, override_type: SignatureType) -> SignatureType {
    if credential_type.is_anonymous() {
        return SignatureType::Anonymous;
    }
    if override_type != SignatureType::Default {
        return override_type;
    }
    credential_type
}

/// Hide key material in an `Authorization` header value
pub fn redact_signature(auth: &str) -> String {
    if let Some(rest) = auth.strip_prefix("AWS4-HMAC-SHA256 ") {
        let parts: Vec<String> = rest
            .split(',')
            .map(|part| {
                let part = part.trim();
                if let Some(cred) = part.strip_prefix("Credential=") {
                    // keep the scope, drop the key
                    match cred.split_once('/') {
                        Some((_, scope)) => format!("Credential={}/{}", REDACTED, scope),
                        None => format!("Credential={}", REDACTED),
                    }
                } else if part.starts_with("Signature=") {
                    format!("Signature={}", REDACTED)
                } else {
                    part.to_string()
                }
            })
            .collect();
        return format!("AWS4-HMAC-SHA256 {}", parts.join(", "));
    }
    if auth.starts_with("AWS ") {
        return format!("AWS {}:{}", REDACTED, REDACTED);
    }
    auth.to_string()
}
