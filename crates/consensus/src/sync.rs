//! Accumulates per-key votes from group peers until a quorum agrees.
//!
//! A round is identified by the key, the action's [`ActionId`] and the
//! [`MessageId`] of the request behind it. Two kinds of mutation on the same
//! key are agreed independently, and so is the same mutation requested twice.
//! Within a round each peer holds at most one vote: a later submission
//! from the same peer replaces its earlier one.
//!
//! Once a round resolves it is kept as a marker holding the agreed action.
//! The marker absorbs the late and retransmitted votes of that round
//! without emitting again, until it ages out in
//! [`SyncAccumulator::get_unresolved_actions`].

#[cfg(test)]
#[path = "tests/sync.rs"]
mod tests;

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use vault_config::ConsensusConfig;
use vault_primitives::{Action, ActionId, Key, MessageId, NodeId};

use crate::resolution::quorum;
use crate::unresolved::UnresolvedEntry;

/// An action a quorum of the group agreed on, ready to be committed.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct Resolved<K, A> {
    pub key: K,
    pub action: A,
}

#[derive(Debug)]
struct Round<A> {
    votes: BTreeMap<NodeId, A>,
    attempts: u32,
    resolved: Option<A>,
}

impl<A: PartialEq> Round<A> {
    const fn new() -> Self {
        Self {
            votes: BTreeMap::new(),
            attempts: 0,
            resolved: None,
        }
    }

    /// The action with the most votes, and its vote count.
    fn leading(&self) -> Option<(&A, usize)> {
        let mut leading: Option<(&A, usize)> = None;

        for candidate in self.votes.values() {
            let count = self.votes.values().filter(|vote| *vote == candidate).count();

            if leading.map_or(true, |(_, best)| count > best) {
                leading = Some((candidate, count));
            }
        }

        leading
    }
}

type RoundId<K> = (K, ActionId, MessageId);

/// Per-node vote accumulator for one persona's actions.
///
/// Rounds, resolved markers included, are only evicted by
/// [`get_unresolved_actions`](Self::get_unresolved_actions). The embedding
/// calls it on every sync tick to re-broadcast its own proposals; that call
/// is also what bounds the memory held here.
#[derive(Debug)]
pub struct SyncAccumulator<K, A> {
    this_node: NodeId,
    group_size: usize,
    quorum: usize,
    max_sync_attempts: u32,
    rounds: Mutex<BTreeMap<RoundId<K>, Round<A>>>,
}

impl<K: Key, A: Action> SyncAccumulator<K, A> {
    #[must_use]
    pub fn new(this_node: NodeId, config: &ConsensusConfig) -> Self {
        Self {
            this_node,
            group_size: config.group_size,
            quorum: quorum(config.group_size),
            max_sync_attempts: config.max_sync_attempts,
            rounds: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub const fn this_node(&self) -> NodeId {
        self.this_node
    }

    /// Records this node's own proposal for the request `message_id`.
    pub fn add_local_action(
        &self,
        key: K,
        action: A,
        message_id: MessageId,
    ) -> Option<Resolved<K, A>> {
        self.add_unresolved_action(UnresolvedEntry::new(
            key,
            action,
            message_id,
            self.this_node,
        ))
    }

    /// Records `entry.peer`'s vote and returns the agreed action if this vote
    /// completed the quorum.
    pub fn add_unresolved_action(&self, entry: UnresolvedEntry<K, A>) -> Option<Resolved<K, A>> {
        let UnresolvedEntry {
            key,
            action,
            message_id,
            peer,
        } = entry;
        let id = action.action_id();

        let mut rounds = self.rounds.lock();
        let round = rounds
            .entry((key.clone(), id, message_id))
            .or_insert_with(Round::new);

        if round.resolved.is_some() {
            drop(round.votes.insert(peer, action));

            debug!(
                ?key,
                action_id = %id,
                %message_id,
                %peer,
                "Absorbed vote for resolved round"
            );

            return None;
        }

        drop(round.votes.insert(peer, action));

        let voters = round.votes.len();
        let agreed = round
            .leading()
            .filter(|(_, count)| *count >= self.quorum)
            .map(|(action, _)| action.clone());

        if let Some(action) = agreed {
            info!(
                ?key,
                action_id = %id,
                %message_id,
                voters,
                quorum = self.quorum,
                "Quorum reached"
            );

            round.resolved = Some(action.clone());

            return Some(Resolved { key, action });
        }

        if voters >= self.group_size {
            warn!(
                ?key,
                action_id = %id,
                %message_id,
                voters,
                "Every member voted without agreement, discarding round"
            );

            drop(rounds.remove(&(key, id, message_id)));

            return None;
        }

        debug!(
            ?key,
            action_id = %id,
            %message_id,
            %peer,
            voters,
            quorum = self.quorum,
            "Recorded vote"
        );

        None
    }

    /// This node's own proposals that have not resolved yet, for
    /// re-broadcast.
    ///
    /// Every call ages each round by one sync attempt; rounds past
    /// `max_sync_attempts` are dropped, unresolved ones without ever
    /// emitting.
    pub fn get_unresolved_actions(&self) -> Vec<UnresolvedEntry<K, A>> {
        let mut rounds = self.rounds.lock();
        let mut own = Vec::new();
        let mut pruned = 0_usize;

        rounds.retain(|(key, _, message_id), round| {
            round.attempts = round.attempts.saturating_add(1);

            if round.attempts > self.max_sync_attempts {
                pruned = pruned.saturating_add(1);
                return false;
            }

            if round.resolved.is_none() {
                if let Some(action) = round.votes.get(&self.this_node) {
                    own.push(UnresolvedEntry::new(
                        key.clone(),
                        action.clone(),
                        *message_id,
                        self.this_node,
                    ));
                }
            }

            true
        });

        if pruned > 0 {
            debug!(pruned, remaining = rounds.len(), "Pruned aged sync rounds");
        }

        own
    }

    /// Rounds still waiting for a quorum.
    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.rounds
            .lock()
            .values()
            .filter(|round| round.resolved.is_none())
            .count()
    }

    /// Moves every vote cast by `old` over to `new` after a membership
    /// change. If `new` already voted in a round, its own vote stands.
    ///
    /// A peer holds one vote per round, so moving a vote never raises the
    /// count of any action: a replacement cannot complete a quorum, and the
    /// round resolves on the next vote that does.
    pub fn replace_node(&self, old: NodeId, new: NodeId) {
        let mut rounds = self.rounds.lock();
        let mut rewritten = 0_usize;

        for round in rounds.values_mut() {
            let Some(vote) = round.votes.remove(&old) else {
                continue;
            };

            rewritten = rewritten.saturating_add(1);

            if !round.votes.contains_key(&new) {
                drop(round.votes.insert(new, vote));
            }
        }

        info!(%old, %new, rewritten, "Replaced node in sync rounds");
    }
}
