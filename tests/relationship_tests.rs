use rowbind::{store_object, BindError, ErrorKind, MemoryEngine, Model, Store, StoreConfig};
use std::sync::Arc;

store_object! {
    pub struct Dog {
        name: String,
    }
}

store_object! {
    pub struct Cat {
        name: String,
    }
}

store_object! {
    pub struct Person {
        name: String,
    }
    links { dog: Dog }
    lists { dogs: Dog }
}

fn open_store(name: &str) -> Store {
    let config = StoreConfig::new(name)
        .in_memory(true)
        .engine(Arc::new(MemoryEngine::new()))
        .schema_version(1)
        .add_type::<Dog>()
        .add_type::<Cat>()
        .add_type::<Person>();
    Store::open(config).unwrap()
}

fn dog(name: &str) -> Dog {
    let mut dog = Dog::new();
    dog.set_name(name.to_string()).unwrap();
    dog
}

#[test]
fn test_linking_standalone_object_manages_it() {
    let store = open_store("links");
    let transaction = store.begin_write().unwrap();
    let mut person: Person = store.create_object().unwrap();
    let mut rex = dog("Rex");

    person.set_dog(Some(&mut rex)).unwrap();
    transaction.commit().unwrap();

    assert!(rex.is_managed());
    assert!(rex.store().unwrap().is_same_instance(&store).unwrap());
    let linked = person.dog().unwrap().unwrap();
    assert_eq!(linked, rex);
    assert_eq!(linked.name().unwrap(), "Rex");
    assert_eq!(store.all::<Dog>().unwrap().len(), 1);
}

#[test]
fn test_linking_managed_object_reuses_row() {
    let store = open_store("reuse");
    let transaction = store.begin_write().unwrap();
    let mut rex: Dog = store.create_object().unwrap();
    rex.set_name("Rex".to_string()).unwrap();
    let mut first: Person = store.create_object().unwrap();
    let mut second: Person = store.create_object().unwrap();
    first.set_dog(Some(&mut rex)).unwrap();
    second.set_dog(Some(&mut rex)).unwrap();
    transaction.commit().unwrap();

    assert_eq!(store.all::<Dog>().unwrap().len(), 1);
    assert_eq!(first.dog().unwrap().unwrap(), second.dog().unwrap().unwrap());
}

#[test]
fn test_clearing_link_reads_back_none() {
    let store = open_store("clear");
    let transaction = store.begin_write().unwrap();
    let mut person: Person = store.create_object().unwrap();
    person.set_dog(Some(&mut dog("Rex"))).unwrap();
    person.set_dog(None).unwrap();
    transaction.commit().unwrap();

    assert!(person.dog().unwrap().is_none());
    assert_eq!(store.all::<Dog>().unwrap().len(), 1);
}

#[test]
fn test_link_to_removed_object_reads_none() {
    let store = open_store("removed");
    let transaction = store.begin_write().unwrap();
    let mut person: Person = store.create_object().unwrap();
    let mut rex = dog("Rex");
    person.set_dog(Some(&mut rex)).unwrap();
    store.remove(&rex).unwrap();
    transaction.commit().unwrap();

    assert!(person.dog().unwrap().is_none());
}

#[test]
fn test_link_outside_transaction_fails() {
    let store = open_store("outside");
    let mut person = store
        .write(|s| s.create_object::<Person>())
        .unwrap();
    let mut rex = dog("Rex");

    let err = person.set_dog(Some(&mut rex)).unwrap_err();
    assert!(matches!(err, BindError::NotInTransaction));
    assert!(!rex.is_managed());
    assert!(person.dog().unwrap().is_none());
}

#[test]
fn test_link_across_stores_fails() {
    let home = open_store("home");
    let away = open_store("away");

    let mut stranger = away
        .write(|s| {
            let mut dog: Dog = s.create_object()?;
            dog.set_name("Stray".to_string())?;
            Ok(dog)
        })
        .unwrap();

    let transaction = home.begin_write().unwrap();
    let mut person: Person = home.create_object().unwrap();
    let err = person.set_dog(Some(&mut stranger)).unwrap_err();
    assert!(matches!(err, BindError::AlreadyManaged));
    transaction.commit().unwrap();
}

#[test]
fn test_link_with_wrong_target_type_writes_nothing() {
    let store = open_store("wrong_type");
    let transaction = store.begin_write().unwrap();
    let mut person: Person = store.create_object().unwrap();
    let mut cat = Cat::new();
    cat.set_name("Tom".to_string()).unwrap();

    let err = person
        .core_mut()
        .set_link::<Cat>("dog", Some(&mut cat))
        .unwrap_err();
    assert!(matches!(err, BindError::TypeMismatch(_)));
    assert!(!cat.is_managed());
    transaction.commit().unwrap();

    assert!(store.all::<Cat>().unwrap().is_empty());
    assert!(person.dog().unwrap().is_none());
}

#[test]
fn test_remove_object_of_other_store_fails() {
    let home = open_store("remove_home");
    let away = open_store("remove_away");
    let stray = away
        .write(|s| {
            let mut dog: Dog = s.create_object()?;
            dog.set_name("Stray".to_string())?;
            Ok(dog)
        })
        .unwrap();

    let transaction = home.begin_write().unwrap();
    let err = home.remove(&stray).unwrap_err();
    assert!(matches!(err, BindError::AlreadyManaged));
    assert_eq!(err.kind(), ErrorKind::Usage);
    transaction.commit().unwrap();

    assert!(stray.is_valid());
    assert_eq!(away.all::<Dog>().unwrap().len(), 1);
}

#[test]
fn test_list_push_insert_and_remove() {
    let store = open_store("lists");
    let transaction = store.begin_write().unwrap();
    let person: Person = store.create_object().unwrap();
    let dogs = person.dogs().unwrap();
    assert!(dogs.is_empty().unwrap());

    let mut rex = dog("Rex");
    let mut fido = dog("Fido");
    let mut max = dog("Max");
    dogs.push(&mut rex).unwrap();
    dogs.push(&mut fido).unwrap();
    dogs.insert(0, &mut max).unwrap();
    transaction.commit().unwrap();

    assert!(rex.is_managed() && fido.is_managed() && max.is_managed());
    let names: Vec<String> = dogs
        .to_vec()
        .unwrap()
        .iter()
        .map(|d| d.name().unwrap())
        .collect();
    assert_eq!(names, vec!["Max", "Rex", "Fido"]);
    assert_eq!(dogs.get(1).unwrap(), rex);

    let transaction = store.begin_write().unwrap();
    dogs.remove(0).unwrap();
    transaction.commit().unwrap();
    assert_eq!(dogs.len().unwrap(), 2);
    // The target row survives removal from the list.
    assert_eq!(store.all::<Dog>().unwrap().len(), 3);

    let transaction = store.begin_write().unwrap();
    dogs.clear().unwrap();
    transaction.commit().unwrap();
    assert!(person.dogs().unwrap().is_empty().unwrap());
}

#[test]
fn test_list_mutation_outside_transaction_fails() {
    let store = open_store("list_outside");
    let person = store
        .write(|s| s.create_object::<Person>())
        .unwrap();
    let dogs = person.dogs().unwrap();

    let mut rex = dog("Rex");
    assert!(matches!(dogs.push(&mut rex), Err(BindError::NotInTransaction)));
    assert!(matches!(dogs.clear(), Err(BindError::NotInTransaction)));
    assert!(!rex.is_managed());
}

#[test]
fn test_dynamic_access_follows_relations() {
    let store = open_store("dynamic");
    store
        .write(|s| {
            let mut person: Person = s.create_object()?;
            person.set_name("Owner".to_string())?;
            person.set_dog(Some(&mut dog("Rex")))?;
            person.dogs()?.push(&mut dog("Fido"))?;
            Ok(())
        })
        .unwrap();

    let person = store.all_dynamic("Person").unwrap().remove(0);
    assert_eq!(person.object_type(), "Person");
    let linked = person.get_link("dog").unwrap().unwrap();
    assert_eq!(linked.get::<String>("name").unwrap(), "Rex");
    let listed = person.get_list("dogs").unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].get::<String>("name").unwrap(), "Fido");
}
