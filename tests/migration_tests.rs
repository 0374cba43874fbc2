use rowbind::{BindError, ErrorKind, SchemaVersion, Store, StoreConfig};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

mod v1 {
    rowbind::store_object! {
        pub struct Person {
            first_name: String,
            last_name: String,
            age: i64,
        }
    }
}

mod v2 {
    rowbind::store_object! {
        pub struct Person {
            full_name: String,
            age: i64,
        }
    }
}

fn v1_config(path: &Path, version: u64) -> StoreConfig {
    StoreConfig::new(path)
        .schema_version(version)
        .add_type::<v1::Person>()
}

fn v2_config(path: &Path, version: u64) -> StoreConfig {
    StoreConfig::new(path)
        .schema_version(version)
        .add_type::<v2::Person>()
}

fn seed(path: &Path, version: u64) {
    let store = Store::open(v1_config(path, version)).unwrap();
    store
        .write(|s| {
            let mut person: v1::Person = s.create_object()?;
            person.set_first_name("Ada".to_string())?;
            person.set_last_name("Lovelace".to_string())?;
            person.set_age(36)?;
            Ok(())
        })
        .unwrap();
}

fn counting_callback(
    calls: &Arc<AtomicUsize>,
) -> impl Fn(&Store, &Store) -> rowbind::Result<()> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move |_, _| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_fresh_store_takes_declared_version_without_callback() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fresh.store");
    let calls = Arc::new(AtomicUsize::new(0));

    let store =
        Store::open(v1_config(&path, 99).migration_callback(counting_callback(&calls))).unwrap();

    assert_eq!(store.schema_version().unwrap(), SchemaVersion::new(99));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.object_types(), vec!["Person".to_string()]);
}

#[test]
fn test_data_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("persist.store");
    seed(&path, 1);

    let store = Store::open(v1_config(&path, 1)).unwrap();
    let people = store.all::<v1::Person>().unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].first_name().unwrap(), "Ada");
    assert_eq!(people[0].age().unwrap(), 36);
}

#[test]
fn test_same_version_reopen_skips_callback() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("same.store");
    seed(&path, 99);
    let calls = Arc::new(AtomicUsize::new(0));

    let store =
        Store::open(v1_config(&path, 99).migration_callback(counting_callback(&calls))).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.schema_version().unwrap(), SchemaVersion::new(99));
}

#[test]
fn test_version_bump_runs_callback_exactly_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bump.store");
    seed(&path, 99);

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let config = v2_config(&path, 100).migration_callback(move |old, new| {
        seen.fetch_add(1, Ordering::SeqCst);
        if old.schema_version()? != SchemaVersion::new(99) {
            return Err(BindError::Migration("old view has the wrong version".to_string()));
        }
        let before = old.all_dynamic("Person")?;
        let after = new.all::<v2::Person>()?;
        for (old_person, mut new_person) in before.iter().zip(after) {
            let first: String = old_person.get("first_name")?;
            let last: String = old_person.get("last_name")?;
            new_person.set_full_name(format!("{} {}", first, last))?;
        }
        Ok(())
    });

    let store = Store::open(config).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.schema_version().unwrap(), SchemaVersion::new(100));

    let people = store.all::<v2::Person>().unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].full_name().unwrap(), "Ada Lovelace");
    assert_eq!(people[0].age().unwrap(), 36);
    drop(people);
    drop(store);

    let calls_after = Arc::new(AtomicUsize::new(0));
    Store::open(v2_config(&path, 100).migration_callback(counting_callback(&calls_after)))
        .unwrap();
    assert_eq!(calls_after.load(Ordering::SeqCst), 0);
}

#[test]
fn test_upgrade_without_callback_keeps_shared_columns() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("upgrade.store");
    seed(&path, 1);

    let store = Store::open(v2_config(&path, 2)).unwrap();
    assert_eq!(store.schema_version().unwrap(), SchemaVersion::new(2));

    let people = store.all::<v2::Person>().unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].age().unwrap(), 36);
    assert_eq!(people[0].full_name().unwrap(), "");
}

#[test]
fn test_downgrade_fails_and_leaves_store_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("downgrade.store");
    seed(&path, 2);

    match Store::open(v1_config(&path, 1)) {
        Err(BindError::Downgrade { stored, declared }) => {
            assert_eq!(stored, SchemaVersion::new(2));
            assert_eq!(declared, SchemaVersion::new(1));
        }
        other => panic!("expected downgrade error, got {:?}", other),
    }

    let store = Store::open(v1_config(&path, 2)).unwrap();
    assert_eq!(store.schema_version().unwrap(), SchemaVersion::new(2));
    assert_eq!(store.all::<v1::Person>().unwrap().len(), 1);
}

#[test]
fn test_unversioned_open_of_versioned_store_is_a_downgrade() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("unversioned.store");
    seed(&path, 3);

    let config = StoreConfig::new(&path).add_type::<v1::Person>();
    let err = Store::open(config).unwrap_err();
    assert!(matches!(err, BindError::Downgrade { .. }));
    assert_eq!(err.kind(), ErrorKind::Migration);
}

#[test]
fn test_failed_callback_keeps_old_version() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("failed.store");
    seed(&path, 1);

    let config = v2_config(&path, 2)
        .migration_callback(|_, _| Err(BindError::Migration("cannot convert".to_string())));
    match Store::open(config) {
        Err(BindError::MigrationFailed(source)) => {
            assert!(matches!(*source, BindError::Migration(_)));
        }
        other => panic!("expected migration failure, got {:?}", other),
    }

    let store = Store::open(v1_config(&path, 1)).unwrap();
    assert_eq!(store.schema_version().unwrap(), SchemaVersion::new(1));
    let people = store.all::<v1::Person>().unwrap();
    assert_eq!(people[0].last_name().unwrap(), "Lovelace");
}

#[test]
fn test_schema_change_without_version_bump_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no_bump.store");
    seed(&path, 4);

    let err = Store::open(v2_config(&path, 4)).unwrap_err();
    assert!(matches!(err, BindError::MigrationRequired(_)));
}

#[test]
fn test_delete_if_migration_needed_recreates_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("recreate.store");
    seed(&path, 1);

    let store = Store::open(v2_config(&path, 2).delete_if_migration_needed(true)).unwrap();
    assert_eq!(store.schema_version().unwrap(), SchemaVersion::new(2));
    assert!(store.all::<v2::Person>().unwrap().is_empty());
}

#[test]
fn test_registered_callback_prevents_recreate_at_same_version() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keep.store");
    seed(&path, 1);
    let calls = Arc::new(AtomicUsize::new(0));

    let config = v2_config(&path, 1)
        .migration_callback(counting_callback(&calls))
        .delete_if_migration_needed(true);
    let err = Store::open(config).unwrap_err();
    assert!(matches!(err, BindError::MigrationRequired(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let store = Store::open(v1_config(&path, 1)).unwrap();
    let people = store.all::<v1::Person>().unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].first_name().unwrap(), "Ada");
}

#[test]
fn test_read_only_open_cannot_migrate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("read_only.store");
    seed(&path, 1);

    let err = Store::open(v2_config(&path, 2).read_only(true)).unwrap_err();
    assert!(matches!(err, BindError::ReadOnly(_)));

    let missing = dir.path().join("missing.store");
    let err = Store::open(v1_config(&missing, 1).read_only(true)).unwrap_err();
    assert!(matches!(err, BindError::ReadOnly(_)));
}

#[test]
fn test_dynamic_open_reads_stored_schema() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dynamic.store");
    seed(&path, 5);

    let store = Store::open(StoreConfig::new(&path).read_only(true)).unwrap();
    assert_eq!(store.schema_version().unwrap(), SchemaVersion::new(5));
    let people = store.all_dynamic("Person").unwrap();
    assert_eq!(people[0].get::<String>("first_name").unwrap(), "Ada");
    assert!(matches!(
        store.all_dynamic("Dog"),
        Err(BindError::UnknownObjectType(_))
    ));
}

#[test]
fn test_encryption_key_must_match() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("encrypted.store");
    let key = vec![7u8; 64];

    Store::open(v1_config(&path, 1).encryption_key(key.clone()).unwrap()).unwrap();

    let wrong = v1_config(&path, 1).encryption_key(vec![8u8; 64]).unwrap();
    assert!(matches!(Store::open(wrong), Err(BindError::InvalidConfig(_))));
    assert!(matches!(
        Store::open(v1_config(&path, 1)),
        Err(BindError::InvalidConfig(_))
    ));

    let store = Store::open(v1_config(&path, 1).encryption_key(key).unwrap()).unwrap();
    assert_eq!(store.schema_version().unwrap(), SchemaVersion::new(1));
}

#[test]
fn test_short_encryption_key_is_rejected() {
    let err = StoreConfig::new("short_key").encryption_key(vec![1u8; 10]).unwrap_err();
    assert!(matches!(err, BindError::InvalidConfig(_)));
}

#[test]
fn test_delete_files_requires_closed_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("delete.store");
    let config = v1_config(&path, 1);

    let store = Store::open(config.clone()).unwrap();
    assert!(Store::delete_files(&config).is_err());
    drop(store);

    Store::delete_files(&config).unwrap();
    assert!(!path.exists());

    let reopened = Store::open(config).unwrap();
    assert!(reopened.all::<v1::Person>().unwrap().is_empty());
}
