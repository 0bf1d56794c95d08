//! Integration tests for PgStore.
//! Uses DATABASE_TEST_URL when set, otherwise a Postgres container. Skipped
//! when neither is available.

use chrono::Utc;
use hazard_common::{Hazard, IncidentDraft, NewComment, NewPost};
use hazard_store::testutil::postgres_container;
use hazard_store::PgStore;
use testcontainers::{ContainerAsync, GenericImage};

struct TestDb {
    store: PgStore,
    _container: Option<ContainerAsync<GenericImage>>,
}

/// Get a migrated store, or skip if no test database is available.
async fn test_db() -> Option<TestDb> {
    if let Ok(url) = std::env::var("DATABASE_TEST_URL") {
        let store = PgStore::connect(&url).await.ok()?;
        store.migrate().await.ok()?;
        return Some(TestDb {
            store,
            _container: None,
        });
    }
    let (container, store) = postgres_container().await?;
    Some(TestDb {
        store,
        _container: Some(container),
    })
}

/// Tests may share one database, so every row they create is namespaced.
fn unique(prefix: &str) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{prefix}-{}-{nanos}", std::process::id())
}

fn new_post(location: &str, url: &str) -> NewPost {
    NewPost {
        external_id: unique("ext"),
        url: url.to_string(),
        title: "Huge waves hitting the promenade".into(),
        body: "Water over the sea wall right now".into(),
        location: location.to_string(),
        hazard: Hazard::HighWaves,
    }
}

fn draft() -> IncidentDraft {
    IncidentDraft {
        life_loss: "unknown".into(),
        infra_lost: "sea wall breached".into(),
        hazard_type: Hazard::HighWaves,
        intensity: 7,
        emotion: "fear".into(),
        description: "High waves overtopping the promenade".into(),
        keywords: "waves, promenade".into(),
    }
}

// =========================================================================
// Posts
// =========================================================================

#[tokio::test]
async fn insert_post_is_noop_on_duplicate_url() {
    let Some(db) = test_db().await else {
        return;
    };
    let location = unique("loc");
    let url = format!("https://reddit.com/{}", unique("p"));

    let first = db.store.insert_post(&new_post(&location, &url)).await.unwrap();
    let second = db.store.insert_post(&new_post(&location, &url)).await.unwrap();

    let first = first.expect("first insert creates a row");
    assert!(!first.tested);
    assert!(!first.verified);
    assert!(second.is_none());

    let found = db.store.find_post_by_url(&url).await.unwrap().unwrap();
    assert_eq!(found.id, first.id);
    assert_eq!(found.hazard, Hazard::HighWaves);
}

#[tokio::test]
async fn record_verdict_sets_both_flags_once() {
    let Some(db) = test_db().await else {
        return;
    };
    let location = unique("loc");
    let url = format!("https://reddit.com/{}", unique("p"));
    let post = db
        .store
        .insert_post(&new_post(&location, &url))
        .await
        .unwrap()
        .unwrap();

    let untested = db.store.untested_posts().await.unwrap();
    assert!(untested.iter().any(|p| p.id == post.id));

    assert!(db.store.record_verdict(post.id, true).await.unwrap());
    // A second verdict for the same post is ignored.
    assert!(!db.store.record_verdict(post.id, false).await.unwrap());

    let stored = db.store.get_post(post.id).await.unwrap().unwrap();
    assert!(stored.tested);
    assert!(stored.verified);

    let untested = db.store.untested_posts().await.unwrap();
    assert!(untested.iter().all(|p| p.id != post.id));

    let verified = db.store.verified_posts(Some(&location)).await.unwrap();
    assert_eq!(verified.len(), 1);
}

#[tokio::test]
async fn verified_without_tested_is_rejected_by_schema() {
    let Some(db) = test_db().await else {
        return;
    };
    let url = format!("https://reddit.com/{}", unique("p"));
    let post = db
        .store
        .insert_post(&new_post(&unique("loc"), &url))
        .await
        .unwrap()
        .unwrap();

    let result = sqlx::query("UPDATE posts SET verified = true WHERE id = $1")
        .bind(post.id)
        .execute(db.store.pool())
        .await;
    assert!(result.is_err());
}

// =========================================================================
// Comments
// =========================================================================

#[tokio::test]
async fn comments_require_verified_post_and_dedup() {
    let Some(db) = test_db().await else {
        return;
    };
    let location = unique("loc");
    let url = format!("https://reddit.com/{}", unique("p"));
    let post = db
        .store
        .insert_post(&new_post(&location, &url))
        .await
        .unwrap()
        .unwrap();

    let comment = NewComment {
        post_id: post.id,
        external_id: "c1".into(),
        text: "Stay safe everyone".into(),
        score: 12,
        parent_id: None,
    };

    // Untested post: guarded insert does nothing.
    assert!(db.store.insert_comment(&comment).await.unwrap().is_none());
    assert!(!db.store.comment_exists(post.id, "c1").await.unwrap());

    db.store.record_verdict(post.id, true).await.unwrap();
    let created = db.store.insert_comment(&comment).await.unwrap().unwrap();
    assert_eq!(created.parent_id, None);
    assert!(db.store.comment_exists(post.id, "c1").await.unwrap());

    // Same (post, external_id) again is a no-op.
    assert!(db.store.insert_comment(&comment).await.unwrap().is_none());
    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM comments WHERE post_id = $1")
        .bind(post.id)
        .fetch_one(db.store.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

// =========================================================================
// Evidence & incidents
// =========================================================================

#[tokio::test]
async fn evidence_is_verified_only_and_capped() {
    let Some(db) = test_db().await else {
        return;
    };
    let location = unique("loc");

    let mut verified_ids = Vec::new();
    for i in 0..3 {
        let url = format!("https://reddit.com/{}", unique(&format!("p{i}")));
        let post = db
            .store
            .insert_post(&new_post(&location, &url))
            .await
            .unwrap()
            .unwrap();
        let verified = i != 1;
        db.store.record_verdict(post.id, verified).await.unwrap();
        if verified {
            verified_ids.push(post.id);
            for (n, score) in [5, 50, 20].into_iter().enumerate() {
                db.store
                    .insert_comment(&NewComment {
                        post_id: post.id,
                        external_id: format!("c{n}"),
                        text: format!("comment {n}"),
                        score,
                        parent_id: None,
                    })
                    .await
                    .unwrap();
            }
        }
    }

    let evidence = db.store.evidence_for_location(&location, 5, 2).await.unwrap();
    assert_eq!(evidence.len(), 2);
    for item in &evidence {
        assert!(verified_ids.contains(&item.post.id));
        let scores: Vec<i64> = item.comments.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![50, 20]);
    }

    let capped = db.store.evidence_for_location(&location, 1, 10).await.unwrap();
    assert_eq!(capped.len(), 1);

    let empty = db
        .store
        .evidence_for_location(&unique("nowhere"), 5, 10)
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn incident_outlives_deleted_evidence() {
    let Some(db) = test_db().await else {
        return;
    };
    let location = unique("loc");
    let mut ids = Vec::new();
    for i in 0..2 {
        let url = format!("https://reddit.com/{}", unique(&format!("p{i}")));
        let post = db
            .store
            .insert_post(&new_post(&location, &url))
            .await
            .unwrap()
            .unwrap();
        db.store.record_verdict(post.id, true).await.unwrap();
        ids.push(post.id);
    }

    let incident = db.store.create_incident(&location, &draft(), &ids).await.unwrap();
    assert_eq!(incident.post_ids.len(), 2);
    assert_eq!(incident.intensity, 7);

    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(ids[0])
        .execute(db.store.pool())
        .await
        .unwrap();

    let recent = db.store.recent_incidents(50).await.unwrap();
    let stored = recent.iter().find(|i| i.id == incident.id).unwrap();
    assert_eq!(stored.post_ids, vec![ids[1]]);
    assert_eq!(stored.location, location);
    assert_eq!(stored.hazard_type, Hazard::HighWaves);
}
