use rowbind::{store_object, BindError, MemoryEngine, Model, Store, StoreConfig};
use std::sync::Arc;

store_object! {
    pub struct Dog {
        name: String,
        age: i64,
    }
}

store_object! {
    pub struct Owner {
        #[primary_key]
        id: i64,
        name: String,
        nickname: Option<String>,
    }
    links { dog: Dog }
    lists { dogs: Dog }
}

fn open_store() -> Store {
    let config = StoreConfig::new("standalone")
        .in_memory(true)
        .engine(Arc::new(MemoryEngine::new()))
        .schema_version(1)
        .add_type::<Dog>()
        .add_type::<Owner>();
    Store::open(config).unwrap()
}

#[test]
fn test_standalone_object_holds_defaults() {
    let owner = Owner::new();
    assert!(!owner.is_managed());
    assert!(owner.is_valid());
    assert_eq!(owner.id().unwrap(), 0);
    assert_eq!(owner.name().unwrap(), "");
    assert_eq!(owner.nickname().unwrap(), None);
    assert!(owner.dog().unwrap().is_none());
}

#[test]
fn test_standalone_setters_work_without_store() {
    let mut owner = Owner::default();
    owner.set_id(10).unwrap();
    owner.set_name("Ann".to_string()).unwrap();
    owner.set_nickname(Some("A".to_string())).unwrap();

    assert_eq!(owner.id().unwrap(), 10);
    assert_eq!(owner.name().unwrap(), "Ann");
    assert_eq!(owner.nickname().unwrap(), Some("A".to_string()));
}

#[test]
fn test_store_only_operations_fail_on_standalone() {
    let owner = Owner::new();
    assert!(owner.store().is_none());
    assert!(matches!(owner.row_index(), Err(BindError::NotManaged)));
    assert!(matches!(owner.dogs(), Err(BindError::NotManaged)));
}

#[test]
fn test_standalone_link_keeps_a_copy() {
    let mut dog = Dog::new();
    dog.set_name("Rex".to_string()).unwrap();

    let mut owner = Owner::new();
    owner.set_dog(Some(&mut dog)).unwrap();
    dog.set_name("Max".to_string()).unwrap();

    let linked = owner.dog().unwrap().unwrap();
    assert_eq!(linked.name().unwrap(), "Rex");
    assert!(!dog.is_managed());

    owner.set_dog(None).unwrap();
    assert!(owner.dog().unwrap().is_none());
}

#[test]
fn test_manage_copies_field_values() {
    let store = open_store();
    let mut owner = Owner::new();
    owner.set_id(5).unwrap();
    owner.set_name("Ben".to_string()).unwrap();

    store.write(|s| s.manage(&mut owner)).unwrap();

    assert!(owner.is_managed());
    assert_eq!(owner.row_index().unwrap(), 0);
    assert!(owner.store().unwrap().is_same_instance(&store).unwrap());

    let found: Owner = store.find(5i64).unwrap().unwrap();
    assert_eq!(found.name().unwrap(), "Ben");
    assert_eq!(found.nickname().unwrap(), None);
}

#[test]
fn test_manage_skips_relations() {
    let store = open_store();
    let mut dog = Dog::new();
    dog.set_name("Rex".to_string()).unwrap();
    let mut owner = Owner::new();
    owner.set_dog(Some(&mut dog)).unwrap();

    store.write(|s| s.manage(&mut owner)).unwrap();

    assert!(owner.dog().unwrap().is_none());
    assert!(owner.dogs().unwrap().is_empty().unwrap());
    assert!(store.all::<Dog>().unwrap().is_empty());
}

#[test]
fn test_manage_twice_fails() {
    let store = open_store();
    let mut owner = Owner::new();
    let transaction = store.begin_write().unwrap();
    store.manage(&mut owner).unwrap();
    assert!(matches!(
        store.manage(&mut owner),
        Err(BindError::AlreadyManaged)
    ));
    transaction.commit().unwrap();
    assert_eq!(store.all::<Owner>().unwrap().len(), 1);
}

#[test]
fn test_standalone_equality_is_identity() {
    let mut first = Owner::new();
    first.set_name("Same".to_string()).unwrap();
    let mut second = Owner::new();
    second.set_name("Same".to_string()).unwrap();

    assert_eq!(first, first);
    assert_ne!(first, second);
}

#[test]
fn test_managed_never_equals_standalone() {
    let store = open_store();
    let managed = store
        .write(|s| {
            let mut owner: Owner = s.create_object()?;
            owner.set_name("Cat".to_string())?;
            Ok(owner)
        })
        .unwrap();

    let mut standalone = Owner::new();
    standalone.set_name("Cat".to_string()).unwrap();
    assert_ne!(managed, standalone);
    assert_ne!(standalone, managed);
}

#[test]
fn test_independently_fetched_objects_are_equal() {
    let store = open_store();
    store
        .write(|s| {
            let mut owner: Owner = s.create_object()?;
            owner.set_id(9)?;
            Ok(())
        })
        .unwrap();

    let from_all = store.all::<Owner>().unwrap().remove(0);
    let from_find: Owner = store.find(9i64).unwrap().unwrap();
    let cloned = from_find.try_clone().unwrap();
    assert_eq!(from_all, from_find);
    assert_eq!(from_find, cloned);
}

#[test]
fn test_standalone_clone_is_independent() {
    let mut original = Owner::new();
    original.set_name("One".to_string()).unwrap();
    let mut copy = original.try_clone().unwrap();
    copy.set_name("Two".to_string()).unwrap();

    assert_eq!(original.name().unwrap(), "One");
    assert_eq!(copy.name().unwrap(), "Two");
}
