//! Ordered command channel between recognition and injection contexts.
//!
//! Multi-producer, single-consumer, unbounded. `enqueue` never blocks and
//! never fails; `dequeue` suspends until a command is available or the
//! channel is finished. FIFO order is absolute — reordering would corrupt
//! the typed output.

use crate::typing::command::TypingCommand;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<TypingCommand>,
    /// Set by `complete`: intake refused, consumer drains then gets None.
    closed: bool,
}

/// FIFO hand-off between the recognition context and the injector.
#[derive(Debug, Default)]
pub struct CommandChannel {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl CommandChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a producer panicked mid-push; the
        // queue itself is still structurally sound.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a command. Non-blocking; silently dropped after `complete`.
    pub fn enqueue(&self, command: TypingCommand) {
        {
            let mut inner = self.lock();
            if inner.closed {
                debug!(?command, "command dropped: channel completed");
                return;
            }
            inner.queue.push_back(command);
        }
        self.notify.notify_one();
    }

    /// Wait for the next command.
    ///
    /// Returns `None` once the channel is completed and drained.
    pub async fn dequeue(&self) -> Option<TypingCommand> {
        loop {
            // Register interest before checking, so a notify between the
            // check and the await is not lost.
            let notified = self.notify.notified();
            {
                let mut inner = self.lock();
                if let Some(command) = inner.queue.pop_front() {
                    return Some(command);
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Discard all pending commands without executing them.
    ///
    /// Returns the number discarded. Used on session abort.
    pub fn clear(&self) -> usize {
        let discarded = {
            let mut inner = self.lock();
            let n = inner.queue.len();
            inner.queue.clear();
            n
        };
        if discarded > 0 {
            debug!(discarded, "cleared pending typing commands");
        }
        discarded
    }

    /// Close intake. Pending commands remain dequeueable; after the queue
    /// drains, `dequeue` returns `None`.
    pub fn complete(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    /// Clear pending commands and re-enable intake after a `complete`.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.queue.clear();
        inner.closed = false;
    }

    /// Number of commands waiting.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// True if no commands are waiting.
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// True once `complete` has been called (and not `reset`).
    pub fn is_completed(&self) -> bool {
        self.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn word(w: &str) -> TypingCommand {
        TypingCommand::TypeWord {
            word: w.to_string(),
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let channel = CommandChannel::new();

        channel.enqueue(word("a"));
        channel.enqueue(word("b"));
        channel.enqueue(word("c"));

        assert_eq!(channel.dequeue().await, Some(word("a")));
        assert_eq!(channel.dequeue().await, Some(word("b")));
        assert_eq!(channel.dequeue().await, Some(word("c")));
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_producer() {
        let channel = Arc::new(CommandChannel::new());

        let consumer = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.dequeue().await })
        };

        // Give the consumer a chance to park first.
        tokio::time::sleep(Duration::from_millis(20)).await;
        channel.enqueue(word("late"));

        assert_eq!(consumer.await.unwrap(), Some(word("late")));
    }

    #[tokio::test]
    async fn test_complete_drains_then_none() {
        let channel = CommandChannel::new();

        channel.enqueue(word("a"));
        channel.complete();

        // Pending command still delivered, then closed.
        assert_eq!(channel.dequeue().await, Some(word("a")));
        assert_eq!(channel.dequeue().await, None);
    }

    #[tokio::test]
    async fn test_complete_wakes_parked_consumer() {
        let channel = Arc::new(CommandChannel::new());

        let consumer = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        channel.complete();

        assert_eq!(consumer.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_enqueue_after_complete_is_dropped() {
        let channel = CommandChannel::new();

        channel.complete();
        channel.enqueue(word("ghost"));

        assert!(channel.is_empty());
        assert_eq!(channel.dequeue().await, None);
    }

    #[tokio::test]
    async fn test_clear_discards_without_executing() {
        let channel = CommandChannel::new();

        channel.enqueue(word("a"));
        channel.enqueue(word("b"));

        assert_eq!(channel.clear(), 2);
        assert!(channel.is_empty());
        assert!(!channel.is_completed());
    }

    #[tokio::test]
    async fn test_reset_reenables_intake() {
        let channel = CommandChannel::new();

        channel.enqueue(word("stale"));
        channel.complete();
        channel.reset();

        assert!(channel.is_empty());
        assert!(!channel.is_completed());

        channel.enqueue(word("fresh"));
        assert_eq!(channel.dequeue().await, Some(word("fresh")));
    }

    #[tokio::test]
    async fn test_multi_producer_order_within_producer() {
        let channel = Arc::new(CommandChannel::new());

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let channel = channel.clone();
                tokio::spawn(async move {
                    for i in 0..25 {
                        channel.enqueue(word(&format!("{}-{}", p, i)));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }
        channel.complete();

        // Per-producer order must be preserved even under interleaving.
        let mut last_index = [None::<u32>; 4];
        while let Some(TypingCommand::TypeWord { word }) = channel.dequeue().await {
            let (p, i) = word.split_once('-').unwrap();
            let p: usize = p.parse().unwrap();
            let i: u32 = i.parse().unwrap();
            if let Some(prev) = last_index[p] {
                assert!(i > prev, "producer {} reordered: {} after {}", p, i, prev);
            }
            last_index[p] = Some(i);
        }
        assert_eq!(last_index, [Some(24), Some(24), Some(24), Some(24)]);
    }
}
