use borsh::{BorshDeserialize, BorshSerialize};
use claims::{assert_matches, assert_ok, assert_ok_eq};
use tempdir::TempDir;
use vault_group_db::{GroupDb, GroupDbError};
use vault_primitives::{
    Action, ActionError, ActionId, Disposition, GroupAction, GroupKey, GroupName, Metadata,
};
use vault_store::config::StoreConfig;
use vault_store::Store;
use vault_store_rocksdb::RocksDB;

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, BorshSerialize, BorshDeserialize)]
struct Account {
    owner: GroupName,
    slot: u16,
}

impl GroupKey for Account {
    fn group_name(&self) -> GroupName {
        self.owner
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
struct Usage {
    entries: u64,
}

impl Metadata for Usage {
    fn new(_group_name: GroupName) -> Self {
        Self::default()
    }

    fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
struct Set(Option<u64>);

impl Action for Set {
    fn action_id(&self) -> ActionId {
        ActionId::new(0)
    }
}

impl GroupAction<Usage, u64> for Set {
    fn apply(&self, metadata: &mut Usage, value: &mut Option<u64>) -> Result<Disposition, ActionError> {
        match (value.is_some(), self.0) {
            (false, Some(_)) => metadata.entries = metadata.entries.saturating_add(1),
            (true, None) => metadata.entries = metadata.entries.saturating_sub(1),
            _ => {}
        }

        *value = self.0;

        Ok(if value.is_some() {
            Disposition::Put
        } else {
            Disposition::Delete
        })
    }
}

fn owner(n: u8) -> GroupName {
    GroupName::from_bytes([n; 32])
}

fn account(n: u8, slot: u16) -> Account {
    Account {
        owner: owner(n),
        slot,
    }
}

fn open(config: &StoreConfig) -> GroupDb<Account, u64, Usage> {
    let store = Store::open::<RocksDB>(config).expect("store should open");

    GroupDb::open(store).expect("group db should open")
}

#[test]
fn test_groups_survive_restart() {
    let dir = TempDir::new("_vault_group_db").expect("tempdir should be created");
    let config = StoreConfig::new(
        dir.path()
            .to_owned()
            .try_into()
            .expect("path conversion should succeed"),
    );

    {
        let db = open(&config);

        assert_ok!(db.commit(&account(1, 1), &Set(Some(10))));
        assert_ok!(db.commit(&account(1, 2), &Set(Some(20))));
        assert_ok!(db.commit(&account(2, 1), &Set(Some(30))));
        assert_ok!(db.commit(&account(2, 1), &Set(None)));
    }

    let db = open(&config);

    assert_eq!(db.group_names(), vec![owner(1)], "only the live group is restored");
    assert_ok_eq!(db.get_metadata(owner(1)), Usage { entries: 2 });
    assert_ok_eq!(db.get_value(&account(1, 2)), 20);
    assert_matches!(db.get_metadata(owner(2)), Err(GroupDbError::NoSuchAccount));

    let contents = db.get_contents(owner(1)).expect("contents should load");
    assert_eq!(
        contents.values,
        vec![(account(1, 1), 10), (account(1, 2), 20)],
        "values are read back in key order"
    );

    assert_ok!(db.delete_group(owner(1)));
    drop(db);

    let db = open(&config);
    assert!(db.group_names().is_empty(), "the deletion was persisted");
}
