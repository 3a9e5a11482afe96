//! Aggregation of streamed IMAP results
//!
//! A producer pushes items into a bounded channel and reports its terminal
//! status on a single-slot channel. The consumer drains the items until the
//! producer drops its sender, then reads the status. Both halves run on the
//! calling task, so a producer may borrow the IMAP session.

use crate::{ImapError, ImapResult};
use futures::channel::{mpsc, oneshot};
use futures::StreamExt;
use std::future::Future;

/// Default capacity of the result channel
pub const DEFAULT_CAPACITY: usize = 10;

/// Sending half handed to a producer
pub type ItemSender<T> = mpsc::Sender<T>;

/// Collects the items of one streamed operation
#[derive(Debug, Clone, Copy)]
pub struct StreamCollector {
    capacity: usize,
}

impl StreamCollector {
    /// Create a collector whose result channel buffers `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }

    /// Run `produce` and gather everything it sends
    ///
    /// Returns every item in emission order when the producer finishes with
    /// `Ok(())`. When it finishes with an error the items gathered so far are
    /// dropped and only the error is returned.
    pub async fn collect<T, F, Fut>(&self, produce: F) -> ImapResult<Vec<T>>
    where
        F: FnOnce(ItemSender<T>) -> Fut,
        Fut: Future<Output = ImapResult<()>>,
    {
        let (items_tx, mut items_rx) = mpsc::channel(self.capacity);
        let (status_tx, status_rx) = oneshot::channel();

        let producer = async move {
            // The sender moves into the producer future and is dropped with it,
            // which closes the item stream.
            let status = produce(items_tx).await;
            let _ = status_tx.send(status);
        };

        let capacity = self.capacity;
        let consumer = async move {
            let mut items = Vec::with_capacity(capacity);
            while let Some(item) = items_rx.next().await {
                items.push(item);
            }

            match status_rx.await {
                Ok(Ok(())) => Ok(items),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(ImapError::StreamClosed(
                    "producer exited without a status".to_string(),
                )),
            }
        };

        let ((), result) = futures::join!(producer, consumer);
        result
    }
}

impl Default for StreamCollector {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;

    async fn produce_n(mut tx: ItemSender<u32>, n: u32, fail_at: Option<u32>) -> ImapResult<()> {
        for i in 0..n {
            if fail_at == Some(i) {
                return Err(ImapError::ListFailed(format!("broke at {}", i)));
            }
            tx.send(i)
                .await
                .map_err(|e| ImapError::StreamClosed(e.to_string()))?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_collects_all_items_in_order() {
        let collector = StreamCollector::new(2);
        let items = collector
            .collect(|tx| produce_n(tx, 25, None))
            .await
            .unwrap();
        assert_eq!(items, (0..25).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_empty_producer() {
        let items: Vec<u32> = StreamCollector::default()
            .collect(|_tx| async { Ok(()) })
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_error_discards_partial_items() {
        // Fail before, within and after the channel capacity
        for fail_at in [0, 1, 5, 10, 11, 24] {
            let result = StreamCollector::new(10)
                .collect(|tx| produce_n(tx, 25, Some(fail_at)))
                .await;
            match result {
                Err(ImapError::ListFailed(msg)) => assert_eq!(msg, format!("broke at {}", fail_at)),
                other => panic!("expected ListFailed, got {:?}", other.map(|v| v.len())),
            }
        }
    }

    #[tokio::test]
    async fn test_error_after_all_items_sent() {
        let result: ImapResult<Vec<u32>> = StreamCollector::new(4)
            .collect(|mut tx| async move {
                for i in 0..3 {
                    tx.send(i).await.map_err(|e| ImapError::StreamClosed(e.to_string()))?;
                }
                drop(tx);
                Err(ImapError::FetchFailed {
                    target: "1:3".to_string(),
                    reason: "connection reset".to_string(),
                })
            })
            .await;
        assert!(matches!(result, Err(ImapError::FetchFailed { .. })));
    }

    #[tokio::test]
    async fn test_zero_capacity_is_clamped() {
        let items = StreamCollector::new(0)
            .collect(|tx| produce_n(tx, 3, None))
            .await
            .unwrap();
        assert_eq!(items, vec![0, 1, 2]);
    }
}
