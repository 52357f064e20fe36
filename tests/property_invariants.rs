use proptest::prelude::*;
use serde_json::json;

use herdsync::{
    cache::store::CacheStore,
    doc::Document,
    queue::{
        MemoryStore,
        ops::{MarkFailed, OperationQueue},
    },
    types::OpKind,
};

#[derive(Debug, Clone)]
enum CacheAction {
    PushTemp,
    EditRow { target: u8 },
    RemoveRow { target: u8 },
    Clear,
}

fn cache_action_strategy() -> impl Strategy<Value = CacheAction> {
    prop_oneof![
        Just(CacheAction::PushTemp),
        (0u8..32).prop_map(|target| CacheAction::EditRow { target }),
        (0u8..32).prop_map(|target| CacheAction::RemoveRow { target }),
        Just(CacheAction::Clear),
    ]
}

#[derive(Debug, Clone)]
enum QueueAction {
    Enqueue { key_idx: u8 },
    Fail { target: u8 },
    Remove { target: u8 },
}

fn queue_action_strategy() -> impl Strategy<Value = QueueAction> {
    prop_oneof![
        3 => (0u8..3).prop_map(|key_idx| QueueAction::Enqueue { key_idx }),
        3 => (0u8..32).prop_map(|target| QueueAction::Fail { target }),
        1 => (0u8..32).prop_map(|target| QueueAction::Remove { target }),
    ]
}

fn docs_from(values: &[u16], prefix: &str) -> Vec<Document> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| Document::new(format!("{prefix}{i}"), json!({"v": v})))
        .collect()
}

proptest! {
    #[test]
    fn rollback_restores_any_entry(
        values in prop::collection::vec(0u16..1000, 0..12),
        actions in prop::collection::vec(cache_action_strategy(), 1..8),
    ) {
        let mut cache = CacheStore::new();
        cache.merge_snapshot("production:farm1", docs_from(&values, "r"));
        let before = cache.get_cloned("production:farm1").expect("entry");

        let record = cache.apply_optimistic("production:farm1", |rows, temp_id| {
            for action in &actions {
                match action {
                    CacheAction::PushTemp => {
                        if !rows.iter().any(|d| d.id == *temp_id) {
                            rows.push(Document::new(temp_id.clone(), json!({"v": "draft"})));
                        }
                    }
                    CacheAction::EditRow { target } => {
                        let len = rows.len();
                        if len > 0 {
                            let i = usize::from(*target) % len;
                            rows[i].body = json!({"v": "edited"});
                        }
                    }
                    CacheAction::RemoveRow { target } => {
                        let len = rows.len();
                        if len > 0 {
                            let i = usize::from(*target) % len;
                            rows.remove(i);
                        }
                    }
                    CacheAction::Clear => rows.clear(),
                }
            }
        });

        cache.rollback(&record);
        prop_assert_eq!(cache.get_cloned("production:farm1").expect("entry"), before);
    }

    #[test]
    fn merge_replaces_everything_but_the_pending_overlay(
        base in prop::collection::vec(0u16..1000, 0..8),
        incoming in prop::collection::vec(0u16..1000, 0..8),
    ) {
        let mut cache = CacheStore::new();
        cache.merge_snapshot("health:farm1", docs_from(&base, "r"));

        let record = cache.apply_optimistic("health:farm1", |rows, temp_id| {
            rows.push(Document::new(temp_id.clone(), json!({"v": "pending"})));
        });

        let incoming_rows = docs_from(&incoming, "s");
        cache.merge_snapshot("health:farm1", incoming_rows.clone());

        let mut expected = incoming_rows.clone();
        expected.push(Document::new(record.temp_id.clone(), json!({"v": "pending"})));
        prop_assert_eq!(cache.get_cloned("health:farm1").expect("entry"), expected);

        // Once committed, the next snapshot replaces the entry outright.
        let temp = record.temp_id.clone();
        cache.commit(&record, move |rows| {
            if let Some(row) = rows.iter_mut().find(|d| d.id == temp) {
                row.id = "confirmed".to_string();
            }
        });
        cache.merge_snapshot("health:farm1", incoming_rows.clone());
        prop_assert_eq!(cache.get_cloned("health:farm1").expect("entry"), incoming_rows);
    }

    #[test]
    fn queue_preserves_fifo_and_retry_ceiling(
        actions in prop::collection::vec(queue_action_strategy(), 1..60),
    ) {
        let mut queue = OperationQueue::new(Box::new(MemoryStore::new()));
        let mut model: Vec<(String, u32)> = Vec::new();

        for action in actions {
            match action {
                QueueAction::Enqueue { key_idx } => {
                    let key = format!("tasks:pen{key_idx}");
                    let op = queue
                        .enqueue(OpKind::Update, key, json!({"id": "t1"}))
                        .expect("enqueue");
                    model.push((op.id, 0));
                }
                QueueAction::Fail { target } => {
                    if model.is_empty() {
                        continue;
                    }
                    let i = usize::from(target) % model.len();
                    let id = model[i].0.clone();
                    match queue.mark_failed(&id).expect("mark") {
                        MarkFailed::Requeued(kept) => {
                            model[i].1 += 1;
                            prop_assert_eq!(kept.retry_count, model[i].1);
                            prop_assert!(kept.retry_count <= kept.max_retries);
                        }
                        MarkFailed::Dropped(_) => {
                            prop_assert_eq!(model[i].1, 3);
                            model.remove(i);
                        }
                    }
                }
                QueueAction::Remove { target } => {
                    if model.is_empty() {
                        continue;
                    }
                    let i = usize::from(target) % model.len();
                    let id = model.remove(i).0;
                    queue.remove(&id).expect("remove");
                }
            }

            let ids: Vec<String> = queue
                .list_pending()
                .expect("list")
                .into_iter()
                .map(|o| o.id)
                .collect();
            let expected: Vec<String> = model.iter().map(|(id, _)| id.clone()).collect();
            prop_assert_eq!(ids, expected);
        }
    }
}
