//! Decide whether a failed attempt is worth repeating

use reqwest::StatusCode;

/// Gateway error codes that signal a transient condition
const RETRYABLE_S3_CODES: &[&str] = &[
    "RequestError",
    "RequestTimeout",
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "RequestThrottled",
    "InternalError",
    "ExpiredToken",
    "ExpiredTokenException",
    "SlowDown",
    "ServiceUnavailable",
];

/// HTTP statuses that signal a transient condition
const RETRYABLE_HTTP_STATUSES: &[u16] = &[
    408, // Request Timeout
    429, // Too Many Requests
    499, // Client Closed Request (nginx)
    500, // Internal Server Error
    502, // Bad Gateway
    503, // Service Unavailable
    504, // Gateway Timeout
    520, // Web server returned an unknown error (Cloudflare)
];

/// Error codes that may carry a corrected region
const REGION_ERROR_CODES: &[&str] = &["AuthorizationHeaderMalformed", "InvalidRegion", "AccessDenied"];

/// Whether the gateway error code is transient
pub fn is_s3_code_retryable(code: &str) -> bool {
    RETRYABLE_S3_CODES.contains(&code)
}

/// Whether the HTTP status is transient
pub fn is_http_status_retryable(status: StatusCode) -> bool {
    RETRYABLE_HTTP_STATUSES.contains(&status.as_u16())
}

/// Whether the error code can be fixed by switching region
pub fn is_region_error(code: &str) -> bool {
    REGION_ERROR_CODES.contains(&code)
}
