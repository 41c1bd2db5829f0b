//! Latest-only snapshot mailbox
//!
//! Snapshots arrive on the message path and are consumed on the tick path.
//! Only the newest one matters, so a push replaces whatever is pending.

use crate::net::protocol::GameStateData;

#[derive(Debug, Clone)]
pub struct ReceivedSnapshot {
    pub state: GameStateData,
    /// Clock time at which the snapshot arrived
    pub received_at_ms: u64,
}

#[derive(Debug, Default)]
pub struct SnapshotMailbox {
    pending: Option<ReceivedSnapshot>,
    superseded: u64,
}

impl SnapshotMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot, discarding any unconsumed one
    ///
    /// Returns true if a pending snapshot was replaced.
    pub fn push(&mut self, state: GameStateData, received_at_ms: u64) -> bool {
        let replaced = self
            .pending
            .replace(ReceivedSnapshot {
                state,
                received_at_ms,
            })
            .is_some();
        if replaced {
            self.superseded += 1;
        }
        replaced
    }

    /// Take the newest snapshot for this tick
    #[inline]
    pub fn take(&mut self) -> Option<ReceivedSnapshot> {
        self.pending.take()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    /// Snapshots dropped because a newer one arrived first
    pub fn superseded(&self) -> u64 {
        self.superseded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::PelletSnapshot;

    fn state(pellets: usize) -> GameStateData {
        GameStateData {
            players: Vec::new(),
            pellets: (0..pellets)
                .map(|i| PelletSnapshot {
                    id: format!("p{}", i),
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn test_empty() {
        let mut mailbox = SnapshotMailbox::new();
        assert!(mailbox.is_empty());
        assert!(mailbox.take().is_none());
    }

    #[test]
    fn test_newest_wins() {
        let mut mailbox = SnapshotMailbox::new();
        assert!(!mailbox.push(state(1), 10));
        assert!(mailbox.push(state(2), 20));
        assert!(mailbox.push(state(3), 30));

        let taken = mailbox.take().unwrap();
        assert_eq!(taken.state.pellets.len(), 3);
        assert_eq!(taken.received_at_ms, 30);
        assert_eq!(mailbox.superseded(), 2);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_take_then_push_is_not_superseded() {
        let mut mailbox = SnapshotMailbox::new();
        mailbox.push(state(1), 10);
        mailbox.take();
        assert!(!mailbox.push(state(1), 20));
        assert_eq!(mailbox.superseded(), 0);
    }

    #[test]
    fn test_clear() {
        let mut mailbox = SnapshotMailbox::new();
        mailbox.push(state(1), 10);
        mailbox.clear();
        assert!(mailbox.take().is_none());
    }
}
