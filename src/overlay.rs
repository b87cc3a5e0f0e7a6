//! Optimistic vote overlay.
//!
//! A submitted vote shows up in the caller's own result bars immediately,
//! before any acknowledgment. The overlay is a single pending [`Vote`]
//! layered over the authoritative vote list, never a second copy of the
//! whole poll, and one merge function reconciles the two. Because the
//! merge replaces by `user_id`, an authoritative list that already
//! contains the caller's vote makes the merge a no-op rather than a
//! duplicate.

use crate::model::Vote;

/// Insert `vote` into `votes` with set semantics: an existing entry with
/// the same `user_id` is replaced in place, otherwise the vote is
/// appended.
pub fn apply_vote(votes: &mut Vec<Vote>, vote: Vote) {
    match votes.iter_mut().find(|v| v.user_id == vote.user_id) {
        Some(existing) => *existing = vote,
        None => votes.push(vote),
    }
}

/// The not-yet-confirmed local vote, if any.
#[derive(Debug, Default, Clone)]
pub struct VoteOverlay {
    pending: Option<Vote>,
}

impl VoteOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a speculative vote. A second stage replaces the first.
    pub fn stage(&mut self, vote: Vote) {
        self.pending = Some(vote);
    }

    /// Drop the speculative vote (an authoritative list has landed).
    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Reconcile the authoritative vote list with the overlay.
    ///
    /// This is the only place the two layers meet; callers render the
    /// returned list and never mutate the server copy directly.
    pub fn merged(&self, server_votes: &[Vote]) -> Vec<Vote> {
        let mut votes = server_votes.to_vec();
        if let Some(pending) = &self.pending {
            apply_vote(&mut votes, pending.clone());
        }
        votes
    }
}
