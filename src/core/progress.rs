/*!
 * Progress event publisher for batch monitoring
 *
 * The orchestrator publishes one event when a job starts and one when it ends,
 * plus a final batch summary. Subscribers render them (console) or log them.
 */

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Direction;

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    JobStart {
        index: usize,
        total: usize,
        direction: Direction,
        local_path: PathBuf,
        remote_name: String,
        timestamp: u64,
    },

    JobComplete {
        index: usize,
        remote_name: String,
        file_bytes: usize,
        transmitted_bytes: usize,
        duration_ms: u64,
        simulated: bool,
        timestamp: u64,
    },

    JobFailed {
        index: usize,
        remote_name: String,
        kind: &'static str,
        error: String,
        bytes_transferred: usize,
        timestamp: u64,
    },

    BatchComplete {
        jobs_succeeded: usize,
        jobs_failed: usize,
        total_bytes: usize,
        duration_ms: u64,
        timestamp: u64,
    },
}

impl ProgressEvent {
    fn current_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    pub fn job_start(
        index: usize,
        total: usize,
        direction: Direction,
        local_path: PathBuf,
        remote_name: String,
    ) -> Self {
        ProgressEvent::JobStart {
            index,
            total,
            direction,
            local_path,
            remote_name,
            timestamp: Self::current_timestamp(),
        }
    }

    pub fn job_complete(
        index: usize,
        remote_name: String,
        file_bytes: usize,
        transmitted_bytes: usize,
        duration_ms: u64,
        simulated: bool,
    ) -> Self {
        ProgressEvent::JobComplete {
            index,
            remote_name,
            file_bytes,
            transmitted_bytes,
            duration_ms,
            simulated,
            timestamp: Self::current_timestamp(),
        }
    }

    pub fn job_failed(
        index: usize,
        remote_name: String,
        kind: &'static str,
        error: String,
        bytes_transferred: usize,
    ) -> Self {
        ProgressEvent::JobFailed {
            index,
            remote_name,
            kind,
            error,
            bytes_transferred,
            timestamp: Self::current_timestamp(),
        }
    }

    pub fn batch_complete(
        jobs_succeeded: usize,
        jobs_failed: usize,
        total_bytes: usize,
        duration_ms: u64,
    ) -> Self {
        ProgressEvent::BatchComplete {
            jobs_succeeded,
            jobs_failed,
            total_bytes,
            duration_ms,
            timestamp: Self::current_timestamp(),
        }
    }
}

/// Progress publisher - sends events to subscribers
#[derive(Clone)]
pub struct ProgressPublisher {
    sender: Option<Sender<ProgressEvent>>,
}

impl ProgressPublisher {
    /// Create a new publisher with bounded channel
    pub fn new(buffer_size: usize) -> (Self, ProgressSubscriber) {
        let (tx, rx) = bounded(buffer_size);
        (
            ProgressPublisher { sender: Some(tx) },
            ProgressSubscriber { receiver: rx },
        )
    }

    pub fn unbounded() -> (Self, ProgressSubscriber) {
        let (tx, rx) = unbounded();
        (
            ProgressPublisher { sender: Some(tx) },
            ProgressSubscriber { receiver: rx },
        )
    }

    /// Publisher that drops every event
    pub fn noop() -> Self {
        ProgressPublisher { sender: None }
    }

    pub fn publish(&self, event: ProgressEvent) {
        if let Some(ref tx) = self.sender {
            let _ = tx.send(event); // subscriber may have gone away
        }
    }
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::noop()
    }
}

pub struct ProgressSubscriber {
    receiver: Receiver<ProgressEvent>,
}

impl ProgressSubscriber {
    pub fn receiver(&self) -> &Receiver<ProgressEvent> {
        &self.receiver
    }

    /// Non-blocking receive
    pub fn try_recv(&self) -> Option<ProgressEvent> {
        self.receiver.try_recv().ok()
    }

    /// Blocks until an event arrives or every publisher is dropped
    pub fn recv(&self) -> Option<ProgressEvent> {
        self.receiver.recv().ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = ProgressEvent> + '_ {
        self.receiver.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_subscriber() {
        let (publisher, subscriber) = ProgressPublisher::new(10);
        publisher.publish(ProgressEvent::job_start(
            1,
            2,
            Direction::Send,
            PathBuf::from("hello.bas"),
            "HELLO.BAS".to_string(),
        ));

        match subscriber.try_recv().unwrap() {
            ProgressEvent::JobStart {
                index,
                total,
                remote_name,
                ..
            } => {
                assert_eq!(index, 1);
                assert_eq!(total, 2);
                assert_eq!(remote_name, "HELLO.BAS");
            }
            other => panic!("Expected JobStart, got {:?}", other),
        }
    }

    #[test]
    fn test_noop_publisher() {
        let publisher = ProgressPublisher::noop();
        publisher.publish(ProgressEvent::batch_complete(0, 0, 0, 0));
    }

    #[test]
    fn test_event_sequence() {
        let (publisher, subscriber) = ProgressPublisher::unbounded();
        publisher.publish(ProgressEvent::job_start(
            1,
            1,
            Direction::Receive,
            PathBuf::from("X.TXT"),
            "X.TXT".to_string(),
        ));
        publisher.publish(ProgressEvent::job_failed(
            1,
            "X.TXT".to_string(),
            "RemoteNotFound",
            "Remote file not found: X.TXT".to_string(),
            12,
        ));
        publisher.publish(ProgressEvent::batch_complete(0, 1, 0, 5));
        drop(publisher);

        let events: Vec<_> = subscriber.iter().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ProgressEvent::JobStart { .. }));
        assert!(matches!(events[1], ProgressEvent::JobFailed { .. }));
        assert!(matches!(events[2], ProgressEvent::BatchComplete { .. }));
    }
}
