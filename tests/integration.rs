//! End-to-end behaviour of the local store, subscriptions and bindings.

use collection_store::{
    Binding, CollectionEvent, CollectionStore, Post, Snapshot, SubscriptionHandle, Version,
};
use proptest::prelude::*;
use std::time::Duration;

fn drain<R: collection_store::Record>(handle: &SubscriptionHandle<R>) -> Vec<Snapshot<R>> {
    let mut out = Vec::new();
    while let Some(event) = handle.try_recv().unwrap() {
        match event {
            CollectionEvent::Snapshot(snapshot) => out.push(snapshot),
            CollectionEvent::Dropped { reason } => panic!("unexpected drop: {:?}", reason),
        }
    }
    out
}

fn titles(snapshot: &Snapshot<Post>) -> Vec<String> {
    snapshot.iter().map(|p| p.title.clone()).collect()
}

#[test]
fn test_post_list_workflow() {
    let store = CollectionStore::new();

    store.add(Post::new("A", "a"));
    assert_eq!(titles(&store.list()), vec!["A"]);

    let handle = store.subscribe();
    store.add(Post::new("B", "b"));
    store.remove_where(|p| p.title == "A");

    let received = drain(&handle);
    assert_eq!(received.len(), 2);
    assert_eq!(titles(&received[0]), vec!["A", "B"]);
    assert_eq!(titles(&received[1]), vec!["B"]);
    assert_eq!(titles(&store.list()), vec!["B"]);
}

#[test]
fn test_product_list_workflow() {
    let store = CollectionStore::with_records(vec!["A book".to_string()]);
    let mut view = Binding::attach(&store);

    store.add("A tree".to_string());
    store.remove_value(&"A book".to_string());
    view.sync();

    assert_eq!(view.current().to_vec(), vec!["A tree".to_string()]);
    drop(view);
    assert_eq!(store.subscription_count(), 0);
}

#[test]
fn test_each_subscriber_gets_each_mutation_once() {
    let store = CollectionStore::new();
    let handles: Vec<_> = (0..4).map(|_| store.subscribe()).collect();

    for i in 0..10 {
        store.add(Post::new(format!("Post {}", i), "x"));
    }

    for handle in &handles {
        let received = drain(handle);
        assert_eq!(received.len(), 10);
        let versions: Vec<Version> = received.iter().map(|s| s.version()).collect();
        let expected: Vec<Version> = (1..=10).map(Version).collect();
        assert_eq!(versions, expected);
    }
}

#[test]
fn test_late_subscriber_gets_no_history() {
    let store = CollectionStore::new();
    store.add(Post::new("Early", "x"));
    store.add(Post::new("Earlier", "x"));

    let late = store.subscribe();
    assert!(drain(&late).is_empty());

    store.add(Post::new("Now", "x"));
    let received = drain(&late);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].len(), 3);
}

#[test]
fn test_owned_copy_does_not_leak_back() {
    let store = CollectionStore::new();
    store.add(Post::new("Original", "x"));
    let held = store.list();

    let mut copy = store.list().to_vec();
    copy[0].title = "Changed".to_string();
    copy.clear();

    assert_eq!(titles(&store.list()), vec!["Original"]);
    assert_eq!(titles(&held), vec!["Original"]);
}

#[test]
fn test_bindings_do_not_leak() {
    let store = CollectionStore::<Post>::new();

    let mut views: Vec<_> = (0..3).map(|_| Binding::attach(&store)).collect();
    assert_eq!(store.stats().subscribers, 3);

    views[0].release();
    assert_eq!(store.stats().subscribers, 2);

    views.clear();
    assert_eq!(store.stats().subscribers, 0);
}

#[test]
fn test_binding_wait_for_delivery() {
    let store = CollectionStore::new();
    let mut view = Binding::attach(&store);

    std::thread::scope(|s| {
        s.spawn(|| {
            std::thread::sleep(Duration::from_millis(20));
            store.add(Post::new("Later", "x"));
        });
        assert!(view.wait(Duration::from_secs(2)));
    });

    assert_eq!(titles(view.current()), vec!["Later"]);
}

#[derive(Clone, Debug)]
enum Op {
    Add(u8),
    Remove(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6).prop_map(Op::Add),
        (0u8..6).prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn prop_list_reflects_net_effect(ops in proptest::collection::vec(op_strategy(), 0..40)) {
        let store = CollectionStore::<String>::new();
        let handle = store.subscribe();
        let mut model: Vec<String> = Vec::new();

        for op in &ops {
            match op {
                Op::Add(n) => {
                    let name = format!("item-{}", n);
                    model.push(name.clone());
                    store.add(name);
                }
                Op::Remove(n) => {
                    let name = format!("item-{}", n);
                    model.retain(|m| m != &name);
                    store.remove_value(&name);
                }
            }
        }

        prop_assert_eq!(store.list().to_vec(), model.clone());

        let received = drain(&handle);
        prop_assert_eq!(received.len(), ops.len());
        if let Some(last) = received.last() {
            prop_assert_eq!(last.to_vec(), model);
        }
    }
}
