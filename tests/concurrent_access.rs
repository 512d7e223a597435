mod common;

use common::{harness, persisted_session};
use serde_json::json;
use std::thread;
use time::Duration;
use websession::{SessionConfig, SessionStore};

#[test]
fn concurrent_opens_on_a_cold_cache_share_one_session() {
    let h = harness(SessionConfig::default());
    let id = persisted_session(&h.manager, "user", json!("max"));
    h.manager.cache().remove(&id);

    let handles: Vec<_> = thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| h.manager.open(Some(id.as_str())).expect("open")))
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().expect("join"))
            .collect()
    });

    let first = &handles[0];
    assert!(handles.iter().all(|handle| handle.ptr_eq(first)));
}

#[test]
fn save_racing_reaper_never_splits_store_and_cache() {
    let h = harness(SessionConfig::default().with_expiration_delta_minutes(30));
    let ids: Vec<_> = (0..16)
        .map(|n| persisted_session(&h.manager, "n", json!(n)))
        .collect();
    // Every record is stale from the reaper's point of view.
    h.clock.advance(Duration::minutes(45));

    thread::scope(|scope| {
        for id in &ids {
            let manager = h.manager.clone();
            scope.spawn(move || {
                for round in 0..20 {
                    let handle = manager.open(Some(id.as_str())).expect("open");
                    handle.lock().insert("round", round);
                    manager.save(&handle).expect("save");
                }
            });
        }
        let reaper = h.manager.reaper();
        scope.spawn(move || {
            for _ in 0..20 {
                reaper.sweep();
            }
        });
    });

    for id in &ids {
        let in_store = h.store.get(id).expect("get").is_some();
        let in_cache = h.manager.cache().contains(id);
        assert_eq!(in_store, in_cache, "store/cache disagree for {id}");
    }
}

#[test]
fn concurrent_deletes_are_idempotent() {
    let h = harness(SessionConfig::default());
    let id = persisted_session(&h.manager, "user", json!("nia"));

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| h.manager.delete(&id).expect("delete"));
        }
    });

    assert!(h.store.get(&id).expect("get").is_none());
    assert!(!h.manager.cache().contains(&id));
}
