//! Latest-snapshot fan-out of the session document.

use std::sync::Arc;

use tokio::sync::watch;

use crate::state::session::SessionDocument;

/// Publishing side of the session snapshot channel.
#[derive(Debug)]
pub struct SessionFeed {
    sender: watch::Sender<Arc<SessionDocument>>,
}

impl SessionFeed {
    /// Create a feed seeded with `initial`.
    pub fn new(initial: SessionDocument) -> Self {
        let (sender, _rx) = watch::channel(Arc::new(initial));
        Self { sender }
    }

    /// Publish a new snapshot, replacing the previous one for every observer.
    pub fn publish(&self, document: Arc<SessionDocument>) {
        self.sender.send_replace(document);
    }

    /// Latest published snapshot.
    pub fn latest(&self) -> Arc<SessionDocument> {
        self.sender.borrow().clone()
    }

    /// Observe future snapshots.
    pub fn subscribe(&self) -> SessionObserver {
        SessionObserver {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Subscriber handle; intermediate snapshots may be skipped, stale ones are never returned.
#[derive(Debug, Clone)]
pub struct SessionObserver {
    receiver: watch::Receiver<Arc<SessionDocument>>,
}

impl SessionObserver {
    /// Latest snapshot, marking it as seen.
    pub fn latest(&mut self) -> Arc<SessionDocument> {
        self.receiver.borrow_and_update().clone()
    }

    /// Wait for the next snapshot. `None` once the feed is gone.
    pub async fn changed(&mut self) -> Option<Arc<SessionDocument>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::RoundConfig;

    fn doc(revision: u64) -> Arc<SessionDocument> {
        let mut doc = SessionDocument::new("0420", RoundConfig::default());
        doc.revision = revision;
        Arc::new(doc)
    }

    #[tokio::test]
    async fn slow_observer_only_sees_newest_snapshot() {
        let feed = SessionFeed::new(SessionDocument::new("0420", RoundConfig::default()));
        let mut observer = feed.subscribe();
        assert_eq!(observer.latest().revision, 0);

        feed.publish(doc(1));
        feed.publish(doc(2));
        feed.publish(doc(3));

        let seen = observer.changed().await.unwrap();
        assert_eq!(seen.revision, 3);
        assert_eq!(feed.latest().revision, 3);
    }

    #[tokio::test]
    async fn publishing_without_observers_still_updates_latest() {
        let feed = SessionFeed::new(SessionDocument::new("0420", RoundConfig::default()));
        feed.publish(doc(5));
        assert_eq!(feed.latest().revision, 5);
        assert_eq!(feed.subscribe().latest().revision, 5);
    }
}
