use serde_json::{json, Map};
use websession::{create_session_store, SessionBackendConfig, SessionId};

#[test]
fn factory_returns_inmemory_store() {
    let store = create_session_store(SessionBackendConfig::InMemory)
        .expect("factory should build in-memory store");
    let id = SessionId::new("factory");
    store.create(&id).expect("create succeeds");

    let mut data = Map::new();
    data.insert("user".into(), json!("oz"));
    let stamped = store.update(&id, &data).expect("update succeeds");

    let fetched = store.get(&id).expect("get succeeds").expect("present");
    assert_eq!(fetched.data, data);
    assert_eq!(fetched.updated_at, Some(stamped));

    let listed: Vec<_> = store
        .list()
        .expect("list")
        .collect::<Result<_, _>>()
        .expect("entries");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);

    store.delete(&id).expect("delete");
    store.delete(&id).expect("delete again");
    assert!(store.get(&id).expect("get").is_none());
}
