//! Single-fire completion signal for the capture flow

use crate::token::CapturedToken;
use crate::AuthError;
use std::sync::Arc;
use tokio::sync::watch;

/// Why the redirect round trip failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackFailure {
    /// Provider sent `error` / `error_description`
    Provider { code: String, description: String },
    /// Neither a token nor an error was received
    MissingToken,
}

impl From<CallbackFailure> for AuthError {
    fn from(failure: CallbackFailure) -> Self {
        match failure {
            CallbackFailure::Provider { code, description } => {
                AuthError::ProviderError { code, description }
            }
            CallbackFailure::MissingToken => AuthError::MissingToken,
        }
    }
}

/// How the flow finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The completion page was reached with a captured token
    Captured(CapturedToken),
    /// The completion page was reached without a token
    Closed,
    Failed(CallbackFailure),
}

/// Broadcast that fires at most once
///
/// The first `fire` wins; later calls return `false` and change nothing.
/// Every waiter, including one that subscribes after the fire, sees the
/// same completion.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    tx: Arc<watch::Sender<Option<Completion>>>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Record the completion; `false` when it had already fired
    pub fn fire(&self, completion: Completion) -> bool {
        let mut completion = Some(completion);
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = completion.take();
            true
        })
    }

    pub fn is_fired(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait for the first fire
    pub async fn wait(&self) -> Completion {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting
        let completion = match rx.wait_for(Option::is_some).await {
            Ok(slot) => slot.clone().unwrap_or(Completion::Closed),
            Err(_) => Completion::Closed,
        };
        completion
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_fire_wins() {
        let signal = CompletionSignal::new();
        assert!(!signal.is_fired());
        assert!(signal.fire(Completion::Failed(CallbackFailure::MissingToken)));
        assert!(!signal.fire(Completion::Closed));
        assert!(signal.is_fired());

        assert_eq!(
            signal.wait().await,
            Completion::Failed(CallbackFailure::MissingToken)
        );
        // Waiting again returns immediately with the same value
        assert_eq!(
            signal.wait().await,
            Completion::Failed(CallbackFailure::MissingToken)
        );
    }

    #[tokio::test]
    async fn test_waiter_released_by_later_fire() {
        let signal = CompletionSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        signal.fire(Completion::Closed);
        let completion = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(completion, Completion::Closed);
    }

    #[tokio::test]
    async fn test_concurrent_fires() {
        let signal = CompletionSignal::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let signal = signal.clone();
            handles.push(tokio::spawn(async move { signal.fire(Completion::Closed) }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_failure_into_error() {
        let err: AuthError = CallbackFailure::Provider {
            code: "access_denied".into(),
            description: "user cancelled".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Authorization failed: access_denied: user cancelled"
        );
    }
}
