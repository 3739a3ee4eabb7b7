//! Per-call cancellation and deadline

use crate::ClientError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation scope for one or more requests.
///
/// Cloning shares the token, so cancelling any clone cancels them all.
#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// A context driven by an existing token
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Same token, with a deadline `timeout` from now
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Same token, with the earlier of the current and the given deadline
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            token: self.token.clone(),
            deadline: Some(deadline),
        }
    }

    /// The underlying token
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.token
    }

    /// The deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every clone of it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The error this context currently reports, if it is done
    pub fn err(&self) -> Option<ClientError> {
        if self.token.is_cancelled() {
            return Some(ClientError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ClientError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn done(&self) -> ClientError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => ClientError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => ClientError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ClientError::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_is_never_done() {
        assert!(Context::background().err().is_none());
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_clones() {
        let ctx = Context::background();
        let child = ctx.with_timeout(Duration::from_secs(60));
        ctx.cancel();
        assert!(matches!(child.err(), Some(ClientError::Cancelled)));
        assert!(matches!(child.done().await, ClientError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        assert!(ctx.err().is_none());
        let err = ctx.done().await;
        assert!(matches!(err, ClientError::DeadlineExceeded));
        assert!(matches!(ctx.err(), Some(ClientError::DeadlineExceeded)));
    }

    #[test]
    fn test_with_deadline_keeps_earlier() {
        let now = Instant::now();
        let ctx = Context::background().with_deadline(now + Duration::from_secs(1));
        let later = ctx.with_deadline(now + Duration::from_secs(10));
        assert_eq!(later.deadline(), Some(now + Duration::from_secs(1)));
    }
}
