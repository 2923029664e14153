//! Unranked matchmaking queue

use std::collections::VecDeque;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::game::MAX_SEATS;
use crate::ws::hub::PlayerHandle;

/// Connection waiting for an opponent
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub handle: PlayerHandle,
    pub queued_at: Instant,
}

impl QueuedPlayer {
    pub fn new(handle: PlayerHandle) -> Self {
        Self {
            handle,
            queued_at: Instant::now(),
        }
    }

    /// How long this player has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

/// FIFO of waiting connections, at most one entry per connection
pub struct MatchmakingQueue {
    queue: VecDeque<QueuedPlayer>,
    /// Players drained into each new session
    seats: usize,
}

impl MatchmakingQueue {
    pub fn new(seats: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            seats,
        }
    }

    /// Append a connection. Returns false if it is already queued.
    pub fn enqueue(&mut self, player: QueuedPlayer) -> bool {
        if self.contains(&player.handle.conn_id) {
            return false;
        }
        self.queue.push_back(player);
        true
    }

    /// Remove a connection from the queue
    pub fn dequeue(&mut self, conn_id: Uuid) -> Option<QueuedPlayer> {
        let pos = self.queue.iter().position(|p| p.handle.conn_id == conn_id)?;
        self.queue.remove(pos)
    }

    /// Check if a connection is in the queue
    pub fn contains(&self, conn_id: &Uuid) -> bool {
        self.queue.iter().any(|p| &p.handle.conn_id == conn_id)
    }

    /// Get queue length
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Drain exactly one session's worth of players, oldest first,
    /// or nothing if not enough are waiting
    pub fn try_form_match(&mut self) -> Option<Vec<QueuedPlayer>> {
        if self.queue.len() < self.seats {
            return None;
        }
        Some(self.queue.drain(..self.seats).collect())
    }

    /// Longest current wait
    pub fn oldest_wait(&self) -> Option<Duration> {
        self.queue.front().map(|p| p.wait_time())
    }
}

impl Default for MatchmakingQueue {
    fn default() -> Self {
        Self::new(MAX_SEATS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(name: &str) -> QueuedPlayer {
        let (handle, _rx) = PlayerHandle::new(Uuid::new_v4(), name.to_string());
        QueuedPlayer::new(handle)
    }

    #[tokio::test]
    async fn test_enqueue_is_deduplicated() {
        let mut queue = MatchmakingQueue::default();
        let a = player("a");

        assert!(queue.enqueue(a.clone()));
        assert!(!queue.enqueue(a.clone()));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_forms_match_fifo_and_leaves_remainder() {
        let mut queue = MatchmakingQueue::new(2);
        let (a, b, c) = (player("a"), player("b"), player("c"));
        queue.enqueue(a.clone());
        assert!(queue.try_form_match().is_none());

        queue.enqueue(b.clone());
        queue.enqueue(c.clone());
        let drained = queue.try_form_match().unwrap();

        let ids: Vec<Uuid> = drained.iter().map(|p| p.handle.conn_id).collect();
        assert_eq!(ids, vec![a.handle.conn_id, b.handle.conn_id]);
        assert_eq!(queue.len(), 1);
        assert!(queue.contains(&c.handle.conn_id));
    }

    #[tokio::test]
    async fn test_dequeue() {
        let mut queue = MatchmakingQueue::default();
        let a = player("a");
        queue.enqueue(a.clone());

        assert!(queue.dequeue(a.handle.conn_id).is_some());
        assert!(queue.dequeue(a.handle.conn_id).is_none());
        assert_eq!(queue.len(), 0);
        assert!(queue.oldest_wait().is_none());
    }
}
