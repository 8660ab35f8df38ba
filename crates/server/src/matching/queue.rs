// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mode-partitioned waiting queues.
//!
//! Two insertion-ordered partitions (`global`, `buddies_first`) keyed by
//! user id. Every entry carries a monotonic enqueue serial; candidate
//! selection is pure FIFO on that serial across partitions, which makes
//! tie-breaks deterministic even after a buddies-first entry is promoted
//! into `global` (it keeps its seniority).

use std::time::{Duration, Instant};

use indexmap::IndexMap;

use crate::protocol::MatchMode;

/// A waiting user.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub user_id: String,
    pub mode: MatchMode,
    pub buddy_ids: Vec<String>,
    pub seq: u64,
    pub enqueued_at: Instant,
}

impl QueueEntry {
    /// The symmetric buddy relation: either side naming the other is enough.
    fn is_buddy_of(&self, user_id: &str, buddy_ids: &[String]) -> bool {
        buddy_ids.iter().any(|b| b == &self.user_id)
            || self.buddy_ids.iter().any(|b| b == user_id)
    }
}

#[derive(Default)]
pub struct WaitQueue {
    global: IndexMap<String, QueueEntry>,
    buddies: IndexMap<String, QueueEntry>,
    next_seq: u64,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.global.contains_key(user_id) || self.buddies.contains_key(user_id)
    }

    pub fn get(&self, user_id: &str) -> Option<&QueueEntry> {
        self.global.get(user_id).or_else(|| self.buddies.get(user_id))
    }

    /// Append to the partition for `mode`. Returns the 1-based queue
    /// position within that partition.
    pub fn insert(&mut self, user_id: &str, mode: MatchMode, buddy_ids: Vec<String>) -> usize {
        self.next_seq += 1;
        let entry = QueueEntry {
            user_id: user_id.to_owned(),
            mode,
            buddy_ids,
            seq: self.next_seq,
            enqueued_at: Instant::now(),
        };
        let partition = self.partition_mut(mode);
        partition.insert(user_id.to_owned(), entry);
        partition.len()
    }

    /// Remove a waiting entry, preserving FIFO order of the rest.
    pub fn remove(&mut self, user_id: &str) -> Option<QueueEntry> {
        self.global.shift_remove(user_id).or_else(|| self.buddies.shift_remove(user_id))
    }

    /// Best candidate for a joining user, FIFO by enqueue serial.
    ///
    /// `buddies_first` joiners see every waiting entry the buddy relation
    /// connects them to, in either partition. `global` joiners see the whole
    /// global partition plus any buddies-first waiter that explicitly lists
    /// them — a buddies-first waiter is never handed a stranger before
    /// promotion.
    pub fn find_candidate(
        &self,
        user_id: &str,
        mode: MatchMode,
        buddy_ids: &[String],
    ) -> Option<&QueueEntry> {
        let eligible = |entry: &&QueueEntry| -> bool {
            if entry.user_id == user_id {
                return false;
            }
            match (mode, entry.mode) {
                (MatchMode::BuddiesFirst, _) => entry.is_buddy_of(user_id, buddy_ids),
                (MatchMode::Global, MatchMode::Global) => true,
                (MatchMode::Global, MatchMode::BuddiesFirst) => {
                    entry.is_buddy_of(user_id, buddy_ids)
                }
            }
        };

        self.global
            .values()
            .chain(self.buddies.values())
            .filter(eligible)
            .min_by_key(|entry| entry.seq)
    }

    /// 1-based position within the entry's partition.
    pub fn position(&self, user_id: &str) -> Option<usize> {
        self.global
            .get_index_of(user_id)
            .or_else(|| self.buddies.get_index_of(user_id))
            .map(|i| i + 1)
    }

    /// User ids whose wait exceeds `timeout`.
    pub fn expired(&self, now: Instant, timeout: Duration) -> Vec<String> {
        self.global
            .values()
            .chain(self.buddies.values())
            .filter(|e| now.duration_since(e.enqueued_at) > timeout)
            .map(|e| e.user_id.clone())
            .collect()
    }

    /// Buddies-first user ids that have waited past the promotion delay.
    pub fn promotable(&self, now: Instant, delay: Duration) -> Vec<String> {
        self.buddies
            .values()
            .filter(|e| now.duration_since(e.enqueued_at) > delay)
            .map(|e| e.user_id.clone())
            .collect()
    }

    /// Move a buddies-first entry into the global partition, keeping its
    /// enqueue serial (queue seniority) and buddy list.
    pub fn promote(&mut self, user_id: &str) -> bool {
        match self.buddies.shift_remove(user_id) {
            Some(mut entry) => {
                entry.mode = MatchMode::Global;
                self.global.insert(user_id.to_owned(), entry);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.buddies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn partition_mut(&mut self, mode: MatchMode) -> &mut IndexMap<String, QueueEntry> {
        match mode {
            MatchMode::Global => &mut self.global,
            MatchMode::BuddiesFirst => &mut self.buddies,
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
