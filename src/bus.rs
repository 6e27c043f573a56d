use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Broadcast topic for one kind of planner output.
///
/// Messages are shared behind an `Arc`, so a large path list is not copied per
/// subscriber. Slow subscribers lose the oldest messages once `capacity` is
/// exceeded.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    name: &'static str,
    tx: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { name, tx }
    }

    /// Publishes `msg`, returning how many subscribers received it.
    pub fn publish(&self, msg: T) -> usize {
        match self.tx.send(Arc::new(msg)) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!(topic = self.name, "No subscribers, dropping message");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let topic: Topic<u32> = Topic::new("numbers", 4);
        assert_eq!(topic.publish(1), 0);

        let mut first = topic.subscribe();
        let mut second = topic.subscribe();
        assert_eq!(topic.publish(7), 2);
        assert_eq!(*first.recv().await.unwrap(), 7);
        assert_eq!(*second.recv().await.unwrap(), 7);
    }
}
