//! Retry timing and error classification.
//!
//! The executor asks [`RetryTimer`] how long to wait before the next attempt
//! and the classifier functions whether a failed attempt is worth repeating.

mod classify;
mod timer;

pub use classify::{is_http_status_retryable, is_region_error, is_s3_code_retryable};
pub use timer::{
    Delay, RetryTimer, TokioDelay, DEFAULT_RETRY_CAP, DEFAULT_RETRY_UNIT, MAX_JITTER, MAX_RETRY,
    NO_JITTER,
};
