use herdsync::{cache::store::CacheStore, doc::Document};
use serde_json::json;

fn seed_tasks(cache: &mut CacheStore) {
    cache.merge_snapshot(
        "tasks:barn",
        vec![
            Document::new("t1", json!({"title": "muck stalls", "status": "open"})),
            Document::new("t2", json!({"title": "order feed", "status": "open"})),
        ],
    );
}

#[test]
fn rollback_restores_exact_value() {
    let mut cache = CacheStore::new();
    seed_tasks(&mut cache);
    let before = cache.get_cloned("tasks:barn").expect("seeded");

    let record = cache.apply_optimistic("tasks:barn", |rows, temp_id| {
        rows.retain(|d| d.id != "t2");
        rows.push(Document::new(temp_id.clone(), json!({"title": "new"})));
        if let Some(row) = rows.iter_mut().find(|d| d.id == "t1") {
            row.body = json!({"title": "muck stalls", "status": "done"});
        }
    });
    assert_ne!(cache.get_cloned("tasks:barn").expect("entry"), before);

    assert!(cache.rollback(&record));
    assert_eq!(cache.get_cloned("tasks:barn").expect("entry"), before);
}

#[test]
fn rollback_is_idempotent() {
    let mut cache = CacheStore::new();
    seed_tasks(&mut cache);
    let before = cache.get_cloned("tasks:barn").expect("seeded");

    let record = cache.apply_optimistic("tasks:barn", |rows, _| {
        rows.clear();
    });

    assert!(cache.rollback(&record));
    let version_after_first = cache.version("tasks:barn");
    assert!(!cache.rollback(&record));

    assert_eq!(cache.get_cloned("tasks:barn").expect("entry"), before);
    assert_eq!(cache.version("tasks:barn"), version_after_first);
}

#[test]
fn commit_swaps_temp_id_in_place() {
    let mut cache = CacheStore::new();
    seed_tasks(&mut cache);

    let record = cache.apply_optimistic("tasks:barn", |rows, temp_id| {
        rows.push(Document::new(temp_id.clone(), json!({"title": "shear sheep"})));
    });
    assert_eq!(cache.pending_len("tasks:barn"), 1);

    let temp = record.temp_id.clone();
    assert!(cache.commit(&record, move |rows| {
        if let Some(row) = rows.iter_mut().find(|d| d.id == temp) {
            row.id = "t9".to_string();
        }
    }));

    let rows = cache.get_cloned("tasks:barn").expect("entry");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().filter(|d| d.id == "t9").count(), 1);
    assert!(!rows.iter().any(|d| d.id.starts_with("temp-")));
    assert_eq!(cache.pending_len("tasks:barn"), 0);
}

#[test]
fn commit_is_idempotent() {
    let mut cache = CacheStore::new();
    seed_tasks(&mut cache);

    let record = cache.apply_optimistic("tasks:barn", |rows, temp_id| {
        rows.push(Document::new(temp_id.clone(), json!({"title": "shear sheep"})));
    });

    let temp = record.temp_id.clone();
    assert!(cache.commit(&record, move |rows| {
        if let Some(row) = rows.iter_mut().find(|d| d.id == temp) {
            row.id = "t9".to_string();
        }
    }));
    let after_first = cache.get_cloned("tasks:barn").expect("entry");

    // A second commit must not re-run its finalize.
    assert!(!cache.commit(&record, |rows| {
        rows.push(Document::new("t10", json!({"title": "should not appear"})));
    }));
    assert_eq!(cache.get_cloned("tasks:barn").expect("entry"), after_first);
}

#[test]
fn merge_preserves_outstanding_temp_rows() {
    let mut cache = CacheStore::new();
    seed_tasks(&mut cache);

    let record = cache.apply_optimistic("tasks:barn", |rows, temp_id| {
        rows.push(Document::new(temp_id.clone(), json!({"title": "shear sheep"})));
    });

    // Push computed before the pending create reached the server.
    cache.merge_snapshot(
        "tasks:barn",
        vec![
            Document::new("t1", json!({"title": "muck stalls", "status": "done"})),
            Document::new("t3", json!({"title": "fix fence", "status": "open"})),
        ],
    );

    let rows = cache.get_cloned("tasks:barn").expect("entry");
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().any(|d| d.id == record.temp_id));
    assert!(rows.iter().any(|d| d.id == "t3"));
    assert!(!rows.iter().any(|d| d.id == "t2"));

    // After commit the exception no longer applies.
    let temp = record.temp_id.clone();
    assert!(cache.commit(&record, move |rows| {
        if let Some(row) = rows.iter_mut().find(|d| d.id == temp) {
            row.id = "t9".to_string();
        }
    }));
    cache.merge_snapshot(
        "tasks:barn",
        vec![Document::new("t9", json!({"title": "shear sheep"}))],
    );
    let rows = cache.get_cloned("tasks:barn").expect("entry");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "t9");
}

#[test]
fn late_commit_after_newer_merge_only_clears_bookkeeping() {
    let mut cache = CacheStore::new();
    seed_tasks(&mut cache);

    // Update-shaped apply: no speculative row is created.
    let record = cache.apply_optimistic("tasks:barn", |rows, _| {
        if let Some(row) = rows.iter_mut().find(|d| d.id == "t1") {
            row.body = json!({"title": "muck stalls", "status": "done"});
        }
    });

    // A newer authoritative snapshot lands before the completion does.
    cache.merge_snapshot(
        "tasks:barn",
        vec![Document::new(
            "t1",
            json!({"title": "muck stalls", "status": "open"}),
        )],
    );
    let merged = cache.get_cloned("tasks:barn").expect("entry");

    // The late completion captured an older version; its finalize is a
    // no-op against the newer merged value.
    assert!(cache.commit(&record, |rows| {
        rows.push(Document::new("ghost", json!({})));
    }));
    assert_eq!(cache.get_cloned("tasks:barn").expect("entry"), merged);
}

#[test]
fn invalidate_marks_stale_until_next_merge() {
    let mut cache = CacheStore::new();
    seed_tasks(&mut cache);
    assert!(!cache.is_stale("tasks:barn"));

    cache.invalidate("tasks:barn");
    assert!(cache.is_stale("tasks:barn"));

    cache.merge_snapshot("tasks:barn", vec![Document::new("t1", json!({}))]);
    assert!(!cache.is_stale("tasks:barn"));
}
