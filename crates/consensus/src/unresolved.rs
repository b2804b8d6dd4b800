use borsh::{BorshDeserialize, BorshSerialize};
use vault_primitives::{MessageId, NodeId};

/// One peer's proposal for a key, as carried by a sync message.
///
/// `message_id` names the request the mutation answers, so every member
/// voting on the same mutation carries the same id. `peer` is the
/// authenticated sender of the message; it is filled in by the
/// message-validation layer, never taken from the payload on trust.
#[derive(Clone, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
#[non_exhaustive]
pub struct UnresolvedEntry<K, A> {
    pub key: K,
    pub action: A,
    pub message_id: MessageId,
    pub peer: NodeId,
}

impl<K, A> UnresolvedEntry<K, A> {
    #[must_use]
    pub const fn new(key: K, action: A, message_id: MessageId, peer: NodeId) -> Self {
        Self {
            key,
            action,
            message_id,
            peer,
        }
    }
}
