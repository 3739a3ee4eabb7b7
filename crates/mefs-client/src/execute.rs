//! Request execution with retries

use crate::body::{drain, Response};
use crate::context::Context;
use crate::error::ErrorResponse;
use crate::metadata::RequestMetadata;
use crate::retry::{is_http_status_retryable, is_region_error, is_s3_code_retryable};
use crate::{Client, ClientError, Result};
use reqwest::{Method, StatusCode};
use tracing::{debug, instrument, warn};

/// Statuses returned to the caller without reading the body
const SUCCESS_STATUS: [StatusCode; 3] = [StatusCode::OK, StatusCode::NO_CONTENT, StatusCode::PARTIAL_CONTENT];

impl Client {
    /// Send a request, retrying transient failures.
    ///
    /// Up to `max_retries` attempts are made, waiting an exponentially
    /// growing, jittered delay between them. Each attempt streams the body
    /// from offset zero; a body that cannot be rewound gets a single attempt. While no region is configured, one
    /// region-mismatch error per call is corrected and retried. A successful
    /// response is handed back with its body unread; a failed one comes back
    /// as [`ClientError::Gateway`] holding the buffered body.
    #[instrument(
        level = "debug",
        skip(self, ctx, metadata),
        fields(bucket = %metadata.bucket_name, object = %metadata.object_name)
    )]
    pub async fn execute(&self, ctx: &Context, method: Method, mut metadata: RequestMetadata) -> Result<Response> {
        let timer = self.config.retry_timer();
        let replayable = metadata.is_replayable();
        let budget = if replayable { timer.max_attempts } else { 1 };

        let mut last_err: Option<ClientError> = None;
        let mut region_corrected = false;

        for attempt in 1..=budget {
            if attempt > 1 {
                let wait = timer.delay(attempt);
                debug!(attempt, ?wait, "waiting before retry");
                tokio::select! {
                    biased;
                    err = ctx.done() => return Err(err),
                    _ = self.delay.sleep(wait) => {}
                }
            }

            let region = self.region_for(&metadata);
            let request = self.build_request(&method, &mut metadata, &region).await?;
            let traced = self.is_tracing().then(|| request.head());
            debug!(attempt, %method, url = %request.url, %region, "sending request");

            let sent = tokio::select! {
                biased;
                err = ctx.done() => return Err(err),
                sent = self.transport.send(request) => sent,
            };

            let response = match sent {
                Ok(response) => response,
                Err(e) if e.is_retryable() => {
                    warn!(attempt, error = %e, "transport error, will retry");
                    last_err = Some(e.into());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status;
            if SUCCESS_STATUS.contains(&status) {
                if let Some(req) = &traced {
                    self.trace_exchange(req, status, &response.headers, None);
                }
                return Ok(Response::from_transport(response));
            }

            let headers = response.headers;
            let drained = tokio::select! {
                biased;
                err = ctx.done() => return Err(err),
                body = drain(response.body) => body,
            };
            let body = match drained {
                Ok(body) => body,
                Err(ClientError::Transport(e)) if e.is_retryable() => {
                    warn!(attempt, error = %e, "error body cut short, will retry");
                    last_err = Some(e.into());
                    continue;
                }
                Err(e) => return Err(e),
            };

            let err = ErrorResponse::from_http(
                status,
                &headers,
                body,
                &metadata.bucket_name,
                &metadata.object_name,
            );
            if let Some(req) = &traced {
                self.trace_exchange(req, status, &headers, Some(&err));
            }

            if !region_corrected && self.correct_region(&mut metadata, &err, &region) {
                region_corrected = true;
                warn!(attempt, code = %err.code, region = %err.region, "region mismatch, will retry");
                last_err = Some(ClientError::Gateway(Box::new(err)));
                continue;
            }

            let retry = is_s3_code_retryable(&err.code) || is_http_status_retryable(status);
            let error = ClientError::Gateway(Box::new(err));
            if retry {
                warn!(attempt, status = status.as_u16(), error = %error, "gateway error, will retry");
                last_err = Some(error);
                continue;
            }
            return Err(error);
        }

        Err(last_err.unwrap_or(ClientError::EmptyResponse))
    }

    /// Apply a region hint from a failed attempt.
    ///
    /// Returns true when the next attempt will go to a different region.
    fn correct_region(&self, metadata: &mut RequestMetadata, err: &ErrorResponse, used: &str) -> bool {
        if self.config.region.is_some() || !is_region_error(&err.code) || err.region.is_empty() {
            return false;
        }

        if !metadata.bucket_name.is_empty() {
            if let Some(cached) = self.location_cache.get(&metadata.bucket_name) {
                if cached == err.region {
                    return false;
                }
                self.location_cache.set(metadata.bucket_name.clone(), err.region.clone());
                return true;
            }
        }

        if err.region != used {
            metadata.bucket_location = err.region.clone();
            return true;
        }
        false
    }
}
