use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::{auth::Session, message::message_repository::MessageRepository};

enum Job {
    Mark { fingerprint: u64, ids: Vec<Uuid> },
    Flush(oneshot::Sender<()>),
}

/// Background queue for read receipts.
///
/// Views hand over the unread ids they just displayed and move on without
/// waiting. A batch identical to one still in flight is dropped, and ids
/// already marked are never sent again. A failed batch is logged and
/// forgotten so that a later render may submit it again.
#[derive(Clone)]
pub struct ReadMarker {
    tx: mpsc::UnboundedSender<Job>,
    in_flight: Arc<DashSet<u64>>,
    marked: Arc<DashSet<Uuid>>,
}

impl ReadMarker {
    pub fn spawn(repository: MessageRepository, session: Session) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let in_flight = Arc::new(DashSet::new());
        let marked = Arc::new(DashSet::new());
        let worker_in_flight = in_flight.clone();
        let worker_marked = marked.clone();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    Job::Mark { fingerprint, ids } => {
                        match repository
                            .mark_messages_as_read(Some(&session), &ids)
                            .await
                        {
                            Ok(_) => {
                                for id in ids {
                                    worker_marked.insert(id);
                                }
                            }
                            Err(e) => tracing::warn!(
                                "Failed to mark {} messages read for {}: {}",
                                ids.len(),
                                session.user_id,
                                e
                            ),
                        }
                        worker_in_flight.remove(&fingerprint);
                    }
                    Job::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            tracing::debug!("Read marker for {} stopped", session.user_id);
        });

        Self {
            tx,
            in_flight,
            marked,
        }
    }

    /// Queues the ids not yet marked. Returns false when nothing is left to
    /// send or the same batch is already in flight.
    pub fn enqueue(&self, message_ids: &[Uuid]) -> bool {
        let mut ids: Vec<Uuid> = message_ids
            .iter()
            .copied()
            .filter(|id| !self.marked.contains(id))
            .collect();
        if ids.is_empty() {
            return false;
        }
        ids.sort();
        ids.dedup();
        let fingerprint = fingerprint(&ids);

        if !self.in_flight.insert(fingerprint) {
            return false;
        }

        if self.tx.send(Job::Mark { fingerprint, ids }).is_err() {
            tracing::warn!("Read marker worker is gone; dropping batch");
            self.in_flight.remove(&fingerprint);
            return false;
        }
        true
    }

    /// Resolves once every batch queued before the call has been processed.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Job::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

fn fingerprint(sorted_ids: &[Uuid]) -> u64 {
    let mut hasher = DefaultHasher::new();
    sorted_ids.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;

    fn setup() -> (Arc<MemoryBackend>, ReadMarker, Uuid, Uuid) {
        let backend = Arc::new(MemoryBackend::new());
        let me = backend.add_profile("Ana");
        let other = backend.add_profile("Mark");
        let conversation = backend.add_conversation(me, other);
        let marker = ReadMarker::spawn(
            MessageRepository::new(backend.clone()),
            Session::new(me),
        );
        (backend, marker, conversation, other)
    }

    #[tokio::test]
    async fn test_same_set_is_sent_once() {
        let (backend, marker, conversation, other) = setup();
        let a = backend.add_message(conversation, other, "a");
        let b = backend.add_message(conversation, other, "b");

        assert!(marker.enqueue(&[a, b]));
        assert!(!marker.enqueue(&[b, a]));
        assert!(!marker.enqueue(&[a, b, a]));
        marker.flush().await;

        assert_eq!(backend.mark_read_batches().len(), 1);
        assert!(backend.message(a).unwrap().is_read);
        assert!(backend.message(b).unwrap().is_read);
    }

    #[tokio::test]
    async fn test_empty_set_is_ignored() {
        let (backend, marker, _, _) = setup();
        assert!(!marker.enqueue(&[]));
        marker.flush().await;
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_can_be_retried() {
        let (backend, marker, conversation, other) = setup();
        let a = backend.add_message(conversation, other, "a");
        backend.fail("mark_read");

        assert!(marker.enqueue(&[a]));
        marker.flush().await;
        assert!(!backend.message(a).unwrap().is_read);

        backend.recover("mark_read");
        assert!(marker.enqueue(&[a]));
        marker.flush().await;

        assert_eq!(backend.call_count("mark_read"), 2);
        assert!(backend.message(a).unwrap().is_read);
    }

    #[tokio::test]
    async fn test_completed_batches_are_not_retained() {
        let (backend, marker, conversation, other) = setup();
        let a = backend.add_message(conversation, other, "a");
        let b = backend.add_message(conversation, other, "b");

        assert!(marker.enqueue(&[a]));
        marker.flush().await;
        assert!(marker.in_flight.is_empty());

        // Only the id not yet marked goes out.
        assert!(marker.enqueue(&[a, b]));
        marker.flush().await;
        assert!(!marker.enqueue(&[b, a]));

        assert_eq!(backend.mark_read_batches(), vec![vec![a], vec![b]]);
        assert!(marker.in_flight.is_empty());
    }
}
