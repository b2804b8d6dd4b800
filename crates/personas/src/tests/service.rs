use core::time::Duration;

use claims::{assert_matches, assert_none, assert_ok, assert_ok_eq, assert_some};
use vault_config::AccountTransferConfig;
use vault_primitives::{serialise, DataName, DataTag, MessageId};
use vault_store::db::InMemoryDB;

use super::*;
use crate::data_manager::{
    DataManagerAction, DataManagerKey, DataManagerService, DataManagerValue,
};
use crate::maid_manager::{
    MaidManagerAction, MaidManagerKey, MaidManagerMetadata, MaidManagerService, MaidManagerValue,
};
use crate::pmid_manager::{
    PmidManagerAction, PmidManagerKey, PmidManagerMetadata, PmidManagerMetadataAction,
    PmidManagerService,
};

fn node(n: u8) -> NodeId {
    NodeId::from_bytes([n; 32])
}

fn group(n: u8) -> GroupName {
    GroupName::from_bytes([n; 32])
}

fn config(group_size: usize) -> ConsensusConfig {
    ConsensusConfig::new(
        group_size,
        10,
        AccountTransferConfig::new(100, Duration::from_secs(60)),
    )
}

fn maid_key(client: u8, chunk: u8) -> MaidManagerKey {
    MaidManagerKey::new(
        group(client),
        DataName::from_bytes([chunk; 32]),
        DataTag::ImmutableData,
    )
}

fn maid_service(group_size: usize) -> MaidManagerService {
    GroupService::new(node(0), &config(group_size), Store::new(InMemoryDB::new()))
        .expect("service should start")
}

const PUT: MaidManagerAction = MaidManagerAction::Put { cost: 8 };

const MSG: MessageId = MessageId::new(1);

#[test]
fn test_own_proposal_counts_towards_quorum() {
    let service = maid_service(3);

    assert_none!(assert_ok!(service.propose(maid_key(1, 1), PUT, MSG)));

    let resolved = assert_some!(assert_ok!(
        service.handle_sync(UnresolvedEntry::new(maid_key(1, 1), PUT, MSG, node(1)))
    ));

    assert_eq!(resolved.action, PUT, "agreed action reported");
    assert_ok_eq!(
        service.db().get_value(&maid_key(1, 1)),
        MaidManagerValue {
            count: 1,
            total_cost: 8
        }
    );
    assert!(
        service.unresolved_for_rebroadcast().is_empty(),
        "a resolved proposal is not rebroadcast"
    );
}

#[test]
fn test_unresolved_proposal_is_rebroadcast() {
    let service = maid_service(5);

    assert_none!(assert_ok!(service.propose(maid_key(1, 1), PUT, MSG)));

    let pending = service.unresolved_for_rebroadcast();

    assert_eq!(pending.len(), 1, "own proposal is pending");
    assert_eq!(pending[0].peer, node(0), "signed as this node");
}

#[test]
fn test_sync_message_is_attributed_to_its_sender() {
    let service = maid_service(3);

    for claimed in [7, 8] {
        let payload = serialise(&UnresolvedEntry::new(
            maid_key(1, 1),
            PUT,
            MSG,
            node(claimed),
        ))
        .expect("entry should encode");

        assert_none!(assert_ok!(service.handle_sync_message(&payload, node(2))));
    }

    let other_request = serialise(&UnresolvedEntry::new(
        maid_key(1, 1),
        PUT,
        MessageId::new(2),
        node(2),
    ))
    .expect("entry should encode");

    assert_none!(assert_ok!(service.handle_sync_message(&other_request, node(3))));

    let payload = serialise(&UnresolvedEntry::new(maid_key(1, 1), PUT, MSG, node(2)))
        .expect("entry should encode");

    let resolved = assert_some!(assert_ok!(service.handle_sync_message(&payload, node(3))));
    assert_eq!(resolved.action, PUT, "senders 2 and 3 agreed on the first request");
}

#[test]
fn test_malformed_sync_message() {
    let service = maid_service(3);

    assert_matches!(
        service.handle_sync_message(&[0xff, 0x01], node(1)),
        Err(ServiceError::Malformed(err)) if err.is_parsing()
    );
    assert_eq!(service.sync().unresolved_count(), 0, "nothing was recorded");
}

#[test]
fn test_rejected_action_still_resolves() {
    let service = maid_service(3);
    let delete = MaidManagerAction::Delete;

    assert_none!(assert_ok!(
        service.handle_sync(UnresolvedEntry::new(maid_key(1, 1), delete, MSG, node(1)))
    ));
    assert_some!(assert_ok!(
        service.handle_sync(UnresolvedEntry::new(maid_key(1, 1), delete, MSG, node(2)))
    ));

    assert!(service.db().group_names().is_empty(), "nothing was stored");
}

#[test]
fn test_node_replacement_carries_votes() {
    let service = maid_service(5);

    for peer in [1, 2] {
        assert_none!(assert_ok!(
            service.handle_sync(UnresolvedEntry::new(maid_key(1, 1), PUT, MSG, node(peer)))
        ));
    }

    service.handle_node_replaced(node(2), node(3));

    assert_none!(assert_ok!(
        service.handle_sync(UnresolvedEntry::new(maid_key(1, 1), PUT, MSG, node(3)))
    ));
    assert_some!(assert_ok!(
        service.handle_sync(UnresolvedEntry::new(maid_key(1, 1), PUT, MSG, node(4)))
    ));
}

#[test]
fn test_value_transfer_keeps_metadata_consistent() {
    let service = maid_service(3);
    let value = MaidManagerValue {
        count: 2,
        total_cost: 50,
    };

    assert_ok_eq!(
        service.handle_value_transfer(maid_key(1, 1), value, node(1)),
        AddResult::Waiting
    );
    assert_ok_eq!(
        service.handle_value_transfer(maid_key(1, 1), value, node(2)),
        AddResult::Success(value)
    );

    assert_ok_eq!(service.db().get_value(&maid_key(1, 1)), value);
    assert_ok_eq!(
        service.db().get_metadata(group(1)),
        MaidManagerMetadata {
            data_count: 1,
            total_put_data: 50
        }
    );

    let snapshot = assert_ok!(service.account_snapshot(group(1)));
    assert_eq!(snapshot.values, vec![(maid_key(1, 1), value)], "transferred value listed");
}

#[test]
fn test_metadata_transfer() {
    let service = maid_service(3);
    let metadata = MaidManagerMetadata {
        data_count: 1,
        total_put_data: 99,
    };

    assert_ok_eq!(
        service.handle_metadata_transfer(group(1), metadata, node(1)),
        AddResult::Waiting
    );
    assert_matches!(
        service.handle_metadata_transfer(group(1), metadata, node(2)),
        Err(ServiceError::Store(GroupDbError::NoSuchAccount))
    );

    assert_ok!(service.db().commit(&maid_key(1, 1), &PUT));

    assert_ok_eq!(
        service.handle_metadata_transfer(group(1), metadata, node(1)),
        AddResult::Waiting
    );
    assert_ok_eq!(
        service.handle_metadata_transfer(group(1), metadata, node(2)),
        AddResult::Success(metadata)
    );
    assert_ok_eq!(service.db().get_metadata(group(1)), metadata);
}

fn data_key(chunk: u8) -> DataManagerKey {
    DataManagerKey::new(DataName::from_bytes([chunk; 32]), DataTag::ImmutableData)
}

#[test]
fn test_data_service_commits_and_transfers() {
    let service = DataManagerService::new(node(0), &config(3), Store::new(InMemoryDB::new()));

    assert_none!(assert_ok!(
        service.propose(data_key(1), DataManagerAction::Put { size: 64 }, MSG)
    ));
    assert_some!(assert_ok!(service.handle_sync(UnresolvedEntry::new(
        data_key(1),
        DataManagerAction::Put { size: 64 },
        MSG,
        node(1)
    ))));
    assert_ok_eq!(service.db().get(&data_key(1)), DataManagerValue::new(64));

    let mut held = DataManagerValue::new(32);
    let _inserted = held.online_pmids.insert(node(4));

    for source in [1, 2] {
        let _result = assert_ok!(service.handle_value_transfer(
            data_key(2),
            held.clone(),
            node(source)
        ));
    }

    assert_ok_eq!(service.db().get(&data_key(2)), held);
    assert_eq!(service.prune_transfers(), 0, "nothing was left pending");
}

#[test]
fn test_repeated_client_requests_each_commit() {
    let service = maid_service(3);
    let requests = [
        (PUT, Some(1)),
        (MaidManagerAction::Delete, None),
        (PUT, Some(1)),
        (PUT, Some(2)),
    ];

    for (message_id, (action, count)) in (1..).zip(requests) {
        let message_id = MessageId::new(message_id);

        for peer in [1, 2] {
            let _resolved = assert_ok!(service.handle_sync(UnresolvedEntry::new(
                maid_key(1, 1),
                action,
                message_id,
                node(peer)
            )));
        }

        match count {
            Some(count) => {
                let _value = assert_ok_eq!(
                    service.db().get_value(&maid_key(1, 1)),
                    MaidManagerValue {
                        count,
                        total_cost: count.saturating_mul(8)
                    }
                );
            }
            None => assert_matches!(
                service.db().get_value(&maid_key(1, 1)),
                Err(GroupDbError::NoSuchAccount)
            ),
        }
    }
}

#[test]
fn test_pmid_going_down_twice_is_recorded_twice() {
    let service = DataManagerService::new(node(0), &config(3), Store::new(InMemoryDB::new()));
    let pmid = node(7);
    let requests = [
        DataManagerAction::Put { size: 16 },
        DataManagerAction::AddPmid { pmid },
        DataManagerAction::NodeDown { pmid },
        DataManagerAction::NodeUp { pmid },
        DataManagerAction::NodeDown { pmid },
    ];

    for (message_id, action) in (1..).zip(requests) {
        assert_none!(assert_ok!(service.handle_sync(UnresolvedEntry::new(
            data_key(1),
            action,
            MessageId::new(message_id),
            node(1)
        ))));

        let resolved = assert_some!(assert_ok!(service.handle_sync(UnresolvedEntry::new(
            data_key(1),
            action,
            MessageId::new(message_id),
            node(2)
        ))));
        assert_eq!(resolved.action, action, "every request resolves");
    }

    let held = assert_ok!(service.db().get(&data_key(1)));

    assert!(held.online_pmids.is_empty(), "the pmid went down last");
    assert_eq!(
        held.offline_pmids.into_iter().collect::<Vec<_>>(),
        vec![pmid],
        "the pmid still holds its replica"
    );
}

fn pmid_key(pmid_node: u8, chunk: u8) -> PmidManagerKey {
    PmidManagerKey::new(
        group(pmid_node),
        DataName::from_bytes([chunk; 32]),
        DataTag::ImmutableData,
    )
}

#[test]
fn test_pmid_account_update() {
    let service = assert_ok!(PmidManagerService::new(
        node(0),
        &config(3),
        Store::new(InMemoryDB::new())
    ));
    let claim = PmidManagerMetadataAction::SetAvailableSize { size: 1 << 20 };

    assert_none!(assert_ok!(service.propose_metadata(group(5), claim, MSG)));
    assert_some!(assert_ok!(
        service.handle_metadata_sync(UnresolvedEntry::new(group(5), claim, MSG, node(1)))
    ));
    assert!(
        service.group().db().group_names().is_empty(),
        "an update for an unknown account is dropped"
    );

    assert_ok!(service
        .group()
        .db()
        .commit(&pmid_key(5, 1), &PmidManagerAction::Put { size: 10 }));

    let reclaim = PmidManagerMetadataAction::SetAvailableSize { size: 1 << 21 };

    assert_none!(assert_ok!(service.propose_metadata(
        group(5),
        reclaim,
        MessageId::new(2)
    )));
    assert_some!(assert_ok!(
        service.handle_metadata_sync(UnresolvedEntry::new(
            group(5),
            reclaim,
            MessageId::new(2),
            node(1)
        ))
    ));

    assert_ok_eq!(
        service.group().db().get_metadata(group(5)),
        PmidManagerMetadata {
            stored_count: 1,
            stored_total_size: 10,
            claimed_available_size: 1 << 21,
            ..PmidManagerMetadata::default()
        }
    );
    assert!(
        service.unresolved_metadata_for_rebroadcast().is_empty(),
        "nothing of ours is pending"
    );
}
