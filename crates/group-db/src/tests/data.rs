use borsh::{BorshDeserialize, BorshSerialize};
use claims::{assert_matches, assert_ok, assert_ok_eq};
use vault_primitives::{Action, ActionId};
use vault_store::db::InMemoryDB;

use super::*;

#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
enum Subscription {
    Add,
    Remove,
}

impl Action for Subscription {
    fn action_id(&self) -> ActionId {
        ActionId::new(match self {
            Self::Add => 0,
            Self::Remove => 1,
        })
    }
}

impl DataAction<u32> for Subscription {
    fn apply(&self, value: &mut Option<u32>) -> Result<Disposition, ActionError> {
        match self {
            Self::Add => {
                *value = Some(value.unwrap_or(0).saturating_add(1));
                Ok(Disposition::Put)
            }
            Self::Remove => {
                let subscribers = value.ok_or(ActionError::NoSuchElement)?.saturating_sub(1);

                if subscribers == 0 {
                    *value = None;
                    return Ok(Disposition::Delete);
                }

                *value = Some(subscribers);
                Ok(Disposition::Put)
            }
        }
    }
}

#[test]
fn test_commit_and_get() {
    let db: Db<u64, u32> = Db::new(Store::new(InMemoryDB::new()));

    assert_matches!(db.get(&1), Err(GroupDbError::NoSuchElement));

    assert_ok!(db.commit(&1, &Subscription::Add));
    assert_ok!(db.commit(&1, &Subscription::Add));
    assert_ok_eq!(db.get(&1), 2);

    assert_ok!(db.commit(&1, &Subscription::Remove));
    assert_ok_eq!(db.get(&1), 1);

    assert_ok!(db.commit(&1, &Subscription::Remove));
    assert_matches!(db.get(&1), Err(GroupDbError::NoSuchElement));
}

#[test]
fn test_rejected_action_surfaces() {
    let db: Db<u64, u32> = Db::new(Store::new(InMemoryDB::new()));

    assert_matches!(
        db.commit(&9, &Subscription::Remove),
        Err(GroupDbError::Action(ActionError::NoSuchElement))
    );
}

#[test]
fn test_entries() {
    let db: Db<u64, u32> = Db::new(Store::new(InMemoryDB::new()));

    for key in [3, 1, 2] {
        assert_ok!(db.commit(&key, &Subscription::Add));
    }

    let mut entries = db.entries().expect("scan should succeed");
    entries.sort_unstable();

    assert_eq!(entries, vec![(1, 1), (2, 1), (3, 1)], "every record is listed");
}

#[test]
fn test_shares_store_with_groups_without_collision() {
    let store = Store::new(InMemoryDB::new());

    assert_ok!(store.put(Column::Group, &[0; 8], &[1]));

    let db: Db<u64, u32> = Db::new(store);

    assert_matches!(db.get(&0), Err(GroupDbError::NoSuchElement));
    assert!(db.entries().expect("scan should succeed").is_empty(), "columns are separate");
}
