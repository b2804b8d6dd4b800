use core::time::Duration;

use claims::{assert_matches, assert_none, assert_ok, assert_ok_eq, assert_some};
use rand::seq::SliceRandom;
use rand::thread_rng;
use vault_config::{AccountTransferConfig, ConsensusConfig};
use vault_consensus::{AddResult, UnresolvedEntry};
use vault_group_db::GroupDbError;
use vault_personas::pmid_manager::{
    PmidGroupService, PmidManagerAction, PmidManagerKey, PmidManagerMetadata, PmidManagerValue,
};
use vault_personas::GroupService;
use vault_primitives::{DataName, DataTag, GroupName, MessageId, NodeId};
use vault_store::db::InMemoryDB;
use vault_store::Store;

const PUT: PmidManagerAction = PmidManagerAction::Put { size: 1024 };

const MSG: MessageId = MessageId::new(1);

fn node(n: u8) -> NodeId {
    NodeId::from_bytes([n; 32])
}

fn config() -> ConsensusConfig {
    ConsensusConfig::new(
        5,
        10,
        AccountTransferConfig::new(100, Duration::from_secs(60)),
    )
}

fn key(chunk: u8) -> PmidManagerKey {
    PmidManagerKey::new(
        GroupName::from_bytes([9; 32]),
        DataName::from_bytes([chunk; 32]),
        DataTag::ImmutableData,
    )
}

fn service(this_node: u8) -> PmidGroupService {
    GroupService::new(node(this_node), &config(), Store::new(InMemoryDB::new()))
        .expect("service should start")
}

#[test]
fn test_put_resolves_once_and_commits() {
    let service = service(0);

    for peer in 1..=2 {
        assert_none!(assert_ok!(
            service.handle_sync(UnresolvedEntry::new(key(1), PUT, MSG, node(peer)))
        ));
        assert_matches!(
            service.db().get_value(&key(1)),
            Err(GroupDbError::NoSuchAccount)
        );
    }

    let resolved = assert_some!(assert_ok!(
        service.handle_sync(UnresolvedEntry::new(key(1), PUT, MSG, node(3)))
    ));

    assert_eq!(resolved.key, key(1), "the voted key resolved");
    assert_eq!(resolved.action, PUT, "the voted action resolved");
    assert_ok_eq!(service.db().get_value(&key(1)), PmidManagerValue { size: 1024 });

    for peer in 4..=5 {
        assert_none!(assert_ok!(
            service.handle_sync(UnresolvedEntry::new(key(1), PUT, MSG, node(peer)))
        ));
    }

    assert_ok_eq!(
        service.db().get_metadata(key(1).pmid_node),
        PmidManagerMetadata {
            stored_count: 1,
            stored_total_size: 1024,
            ..PmidManagerMetadata::default()
        }
    );
}

#[test]
fn test_vote_order_does_not_matter() {
    let mut votes: Vec<_> = (1..=5)
        .flat_map(|peer| [(1, peer), (2, peer)])
        .map(|(chunk, peer)| UnresolvedEntry::new(key(chunk), PUT, MSG, node(peer)))
        .collect();

    votes.shuffle(&mut thread_rng());

    let service = service(0);

    let mut resolved = 0_usize;

    for vote in votes {
        if assert_ok!(service.handle_sync(vote)).is_some() {
            resolved = resolved.saturating_add(1);
        }
    }

    assert_eq!(resolved, 2, "each key resolved exactly once");
    assert_ok_eq!(
        service.db().get_metadata(key(1).pmid_node),
        PmidManagerMetadata {
            stored_count: 2,
            stored_total_size: 2048,
            ..PmidManagerMetadata::default()
        }
    );
}

#[test]
fn test_account_moves_to_new_holder() {
    let holders: Vec<PmidGroupService> = (1..=3).map(service).collect();

    for holder in &holders {
        for peer in 1..=3 {
            let _resolved = assert_ok!(
                holder.handle_sync(UnresolvedEntry::new(key(1), PUT, MSG, node(peer)))
            );
        }
    }

    let newcomer = service(6);
    let group = key(1).pmid_node;

    for (source, holder) in (1..=3).zip(&holders) {
        let snapshot = assert_ok!(holder.account_snapshot(group));

        for (key, value) in snapshot.values {
            let _result = assert_ok!(newcomer.handle_value_transfer(key, value, node(source)));
        }

        let result = assert_ok!(newcomer.handle_metadata_transfer(
            group,
            snapshot.metadata,
            node(source)
        ));

        if source < 3 {
            assert_eq!(result, AddResult::Waiting, "quorum not reached yet");
        } else {
            assert_eq!(
                result,
                AddResult::Success(snapshot.metadata),
                "third snapshot completes the quorum"
            );
        }
    }

    assert_ok_eq!(newcomer.db().get_value(&key(1)), PmidManagerValue { size: 1024 });
    assert_ok_eq!(
        newcomer.db().get_metadata(group),
        assert_ok!(holders[0].db().get_metadata(group))
    );
}
