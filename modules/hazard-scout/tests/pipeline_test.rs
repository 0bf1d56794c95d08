//! Stage behavior against in-memory mocks: no network, no database.

use std::sync::Arc;

use hazard_common::{ErrorKind, Hazard, PipelineConfig, Query};
use hazard_scout::aggregator::{aggregate_location, AggregateOutcome, EvidenceLimits};
use hazard_scout::classifier::{classify_untested, Verdict};
use hazard_scout::expander::{expand_post, expand_verified};
use hazard_scout::fetcher::{fetch_queries, fetch_query, FetchBounds};
use hazard_scout::fixtures::{seed_scenario, SCENARIO_LOCATION, SCENARIO_POSTS};
use hazard_scout::testing::{
    sample_incident, source_comment, source_post, MemoryStore, MockClassifier, MockExtractor,
    MockSource,
};
use hazard_scout::{HazardPipeline, Stage};

fn bounds() -> FetchBounds {
    FetchBounds::from(&PipelineConfig::default())
}

fn limits() -> EvidenceLimits {
    EvidenceLimits::from(&PipelineConfig::default())
}

// =========================================================================
// Fetcher
// =========================================================================

#[tokio::test]
async fn fetching_twice_stores_each_url_once() {
    let query = Query::new(Hazard::HighTide, "Mumbai");
    let mut repeat = source_post("b", "High tide floods Marine Drive (crosspost)");
    repeat.url = source_post("a", "").url;
    let source = MockSource::new().on_search(
        "high tide Mumbai",
        vec![
            source_post("a", "High tide floods Marine Drive"),
            repeat,
            source_post("c", "Waves at Juhu"),
        ],
    );
    let store = MemoryStore::new();

    let first = fetch_query(&source, &store, &query, bounds()).await.unwrap();
    assert_eq!(first.created.len(), 2);
    assert_eq!(first.skipped_duplicate, 1);

    let second = fetch_query(&source, &store, &query, bounds()).await.unwrap();
    assert!(second.created.is_empty());
    assert_eq!(second.skipped_duplicate, 3);

    let posts = store.all_posts();
    assert_eq!(posts.len(), 2);
    let mut urls: Vec<&str> = posts.iter().map(|p| p.url.as_str()).collect();
    urls.dedup();
    assert_eq!(urls.len(), 2);
}

#[tokio::test]
async fn duplicate_skip_leaves_existing_post_untouched() {
    let store = MemoryStore::new();
    let hit = source_post("a", "Cyclone near Paradip");
    let id = store.seed_post("Paradip", Hazard::Cyclone, "original title", &hit.url);
    store.set_verdict(id, true);

    let source = MockSource::new().on_search("storm surge Paradip", vec![hit]);
    let query = Query::new(Hazard::StormSurge, "Paradip");
    let summary = fetch_queries(&source, &store, [query], bounds()).await;

    assert_eq!(summary.skipped_duplicate, 1);
    let post = store.post(id).unwrap();
    assert_eq!(post.title, "original title");
    assert_eq!(post.hazard, Hazard::Cyclone);
    assert!(post.is_verified());
}

// =========================================================================
// Classifier
// =========================================================================

#[tokio::test]
async fn malformed_middle_page_is_isolated() {
    let store = MemoryStore::new();
    let ids: Vec<i64> = (0..6)
        .map(|i| {
            store.seed_post(
                "Chennai",
                Hazard::CoastalFlooding,
                &format!("post {i}"),
                &format!("https://r/{i}"),
            )
        })
        .collect();

    let classifier = MockClassifier::new()
        .reply(vec![
            Verdict { id: ids[0], is_hazard: true },
            Verdict { id: ids[1], is_hazard: false },
        ])
        .malformed()
        .reply(vec![
            Verdict { id: ids[4], is_hazard: false },
            Verdict { id: ids[5], is_hazard: true },
        ]);

    let summary = classify_untested(&classifier, &store, 2).await;

    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].kind, ErrorKind::Schema);
    assert!(summary.failed[0].unit.starts_with("page 2"));

    for id in [ids[0], ids[1], ids[4], ids[5]] {
        assert!(store.post(id).unwrap().tested);
    }
    for id in [ids[2], ids[3]] {
        let post = store.post(id).unwrap();
        assert!(!post.tested);
        assert!(!post.verified);
    }

    let pages: Vec<Vec<i64>> = classifier
        .calls()
        .iter()
        .map(|items| items.iter().map(|i| i.id).collect())
        .collect();
    assert_eq!(pages, vec![ids[0..2].to_vec(), ids[2..4].to_vec(), ids[4..6].to_vec()]);
}

#[tokio::test]
async fn failed_page_is_retried_on_next_run() {
    let store = MemoryStore::new();
    let id = store.seed_post("Kandla", Hazard::Cyclone, "Cyclone warning", "https://r/k");

    let first = MockClassifier::new().malformed();
    classify_untested(&first, &store, 5).await;
    assert!(!store.post(id).unwrap().tested);

    let second = MockClassifier::new().reply(vec![Verdict { id, is_hazard: true }]);
    let summary = classify_untested(&second, &store, 5).await;
    assert_eq!(summary.succeeded, 1);
    assert!(store.post(id).unwrap().is_verified());
}

#[tokio::test]
async fn verified_is_never_set_without_tested() {
    let store = MemoryStore::new();
    for i in 0..5 {
        store.seed_post("Puri", Hazard::RoughSea, &format!("p{i}"), &format!("https://r/{i}"));
    }
    let classifier = MockClassifier::new()
        .reply(vec![Verdict { id: 1, is_hazard: true }, Verdict { id: 2, is_hazard: true }])
        .reply(vec![Verdict { id: 3, is_hazard: true }, Verdict { id: 99, is_hazard: true }])
        .fail(hazard_common::HazardError::Transport("timeout".into()));

    classify_untested(&classifier, &store, 2).await;

    for post in store.all_posts() {
        assert!(post.tested || !post.verified, "post {} verified but untested", post.id);
    }
}

// =========================================================================
// Expander
// =========================================================================

#[tokio::test]
async fn expanding_twice_creates_no_duplicates() {
    let store = MemoryStore::new();
    let id = store.seed_post("Kochi", Hazard::HighWaves, "Waves over the wall", "https://r/k");
    store.set_verdict(id, true);
    let external = store.post(id).unwrap().external_id;

    let source = MockSource::new().on_thread(
        &external,
        vec![source_comment("c1", 50), source_comment("c2", 20), source_comment("c3", 5)],
    );

    let first = expand_post(&source, &store, id, 10).await.unwrap();
    assert_eq!(first.created, 3);

    let second = expand_post(&source, &store, id, 10).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped_duplicate, 3);
    assert_eq!(store.comments(id).len(), 3);
}

#[tokio::test]
async fn comments_only_ever_belong_to_verified_posts() {
    let store = MemoryStore::new();
    let yes = store.seed_post("Puri", Hazard::Cyclone, "Cyclone now", "https://r/y");
    let no = store.seed_post("Puri", Hazard::Cyclone, "Cyclone 1999", "https://r/n");
    let pending = store.seed_post("Puri", Hazard::Cyclone, "Cyclone?", "https://r/p");
    store.set_verdict(yes, true);
    store.set_verdict(no, false);

    let mut source = MockSource::new();
    for id in [yes, no, pending] {
        let ext = store.post(id).unwrap().external_id;
        source = source.on_thread(&ext, vec![source_comment(&format!("c{id}"), 1)]);
    }

    let summary = expand_verified(&source, &store, None, 10).await;
    assert_eq!(summary.succeeded, 1);

    for comment in store.all_comments() {
        assert!(store.post(comment.post_id).unwrap().is_verified());
    }
    assert_eq!(source.thread_requests().len(), 1);
}

#[tokio::test]
async fn thread_fetch_failure_is_isolated_per_post() {
    let store = MemoryStore::new();
    let a = store.seed_post("Dwarka", Hazard::HighTide, "Tide a", "https://r/a");
    let b = store.seed_post("Dwarka", Hazard::HighTide, "Tide b", "https://r/b");
    store.set_verdict(a, true);
    store.set_verdict(b, true);
    let ext_b = store.post(b).unwrap().external_id;

    let source = MockSource::new().on_thread(&ext_b, vec![source_comment("c1", 9)]);
    let summary = expand_verified(&source, &store, Some("Dwarka"), 10).await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].kind, ErrorKind::Transport);
    assert_eq!(summary.failed[0].unit, format!("post {a}"));
}

// =========================================================================
// Aggregator
// =========================================================================

#[tokio::test]
async fn location_without_verified_posts_is_no_signal() {
    let store = MemoryStore::new();
    let id = store.seed_post("Agatti", Hazard::RoughSea, "Rough sea?", "https://r/a");
    store.set_verdict(id, false);
    store.seed_post("Agatti", Hazard::RoughSea, "Unclassified", "https://r/b");

    let extractor = MockExtractor::new().always(sample_incident("rough_sea"));
    let outcome = aggregate_location(&extractor, &store, "Agatti", limits())
        .await
        .unwrap();

    assert_eq!(outcome, AggregateOutcome::NoSignal);
    assert!(store.incidents().is_empty());
    assert!(extractor.calls().is_empty());
}

#[tokio::test]
async fn invalid_extraction_writes_nothing() {
    let store = MemoryStore::new();
    let id = store.seed_post("Kavaratti", Hazard::HighWaves, "Waves", "https://r/a");
    store.set_verdict(id, true);

    let extractor = MockExtractor::new().reply(sample_incident("volcano"));
    let err = aggregate_location(&extractor, &store, "Kavaratti", limits())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Schema);
    assert!(store.incidents().is_empty());
}

#[tokio::test]
async fn evidence_is_capped_to_most_recent_posts() {
    let store = MemoryStore::new();
    seed_scenario(&store).await.unwrap();

    let extractor = MockExtractor::new().always(sample_incident("tsunami"));
    let limits = EvidenceLimits { posts: 5, comments: 10 };
    let outcome = aggregate_location(&extractor, &store, SCENARIO_LOCATION, limits)
        .await
        .unwrap();

    let AggregateOutcome::Created(incident) = outcome else {
        panic!("expected an incident");
    };
    assert_eq!(incident.post_ids.len(), 5);
    assert_eq!(extractor.calls()[0].len(), 5);
    // Most recent first: the oldest seeded post is left out.
    assert!(!incident.post_ids.contains(&1));
    assert!(SCENARIO_POSTS > 5);
}

#[tokio::test]
async fn each_aggregation_creates_a_new_incident() {
    let store = MemoryStore::new();
    seed_scenario(&store).await.unwrap();
    let extractor = MockExtractor::new().always(sample_incident("tsunami"));

    for _ in 0..2 {
        aggregate_location(&extractor, &store, SCENARIO_LOCATION, limits())
            .await
            .unwrap();
    }
    let incidents = store.incidents();
    assert_eq!(incidents.len(), 2);
    assert_ne!(incidents[0].id, incidents[1].id);
}

// =========================================================================
// End to end
// =========================================================================

#[tokio::test]
async fn digha_scenario_end_to_end() {
    let store = Arc::new(MemoryStore::new());
    let a = store.seed_post(
        "Digha",
        Hazard::Tsunami,
        "Massive tsunami wave hits Digha now",
        "https://r/digha-a",
    );
    let b = store.seed_post(
        "Digha",
        Hazard::Tsunami,
        "Remembering the 2004 tsunami",
        "https://r/digha-b",
    );
    let ext_a = store.post(a).unwrap().external_id;
    let ext_b = store.post(b).unwrap().external_id;

    let source = Arc::new(
        MockSource::new()
            .on_thread(&ext_a, vec![source_comment("a1", 40), source_comment("a2", 12)])
            .on_thread(&ext_b, vec![source_comment("b1", 99)]),
    );
    let classifier = Arc::new(MockClassifier::new().reply(vec![
        Verdict { id: a, is_hazard: true },
        Verdict { id: b, is_hazard: false },
    ]));
    let extractor = Arc::new(MockExtractor::new().always(sample_incident("tsunami")));

    let pipeline = HazardPipeline::builder()
        .source(source.clone())
        .classifier(classifier.clone())
        .extractor(extractor.clone())
        .store(store.clone())
        .build();

    let classified = pipeline.classify().await;
    assert_eq!(classified.succeeded, 2);
    assert!(store.post(a).unwrap().is_verified());
    let post_b = store.post(b).unwrap();
    assert!(post_b.tested);
    assert!(!post_b.verified);

    let expanded = pipeline.expand(Some("Digha")).await;
    assert_eq!(expanded.succeeded, 2);
    assert_eq!(source.thread_requests(), vec![(ext_a, 10)]);
    assert!(store.comments(b).is_empty());

    let aggregated = pipeline.aggregate(["Digha"]).await;
    assert_eq!(aggregated.succeeded, 1);

    let incidents = store.incidents();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].post_ids, vec![a]);
    assert_eq!(incidents[0].location, "Digha");
    assert_eq!(incidents[0].hazard_type, Hazard::Tsunami);
    assert_eq!(extractor.calls(), vec![vec![a]]);
}

#[tokio::test]
async fn run_all_reports_every_stage_in_order() {
    let store = Arc::new(MemoryStore::new());
    let mut source = MockSource::new();
    for hazard in hazard_common::HAZARDS {
        let text = Query::new(hazard, "Digha").text;
        let hits = if hazard == Hazard::Tsunami {
            vec![source_post("t1", "Tsunami alert issued for Digha coast")]
        } else {
            Vec::new()
        };
        source = source.on_search(&text, hits);
    }
    let source = Arc::new(source.on_thread("t1", vec![source_comment("c1", 7)]));
    let classifier = Arc::new(MockClassifier::new().reply(vec![Verdict { id: 1, is_hazard: true }]));
    let extractor = Arc::new(MockExtractor::new().always(sample_incident("tsunami")));

    let pipeline = HazardPipeline::builder()
        .source(source)
        .classifier(classifier)
        .extractor(extractor)
        .store(store.clone())
        .build();

    let report = pipeline.run_all(&["Digha".to_string()]).await;

    let stages: Vec<Stage> = report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(stages, vec![Stage::Fetch, Stage::Classify, Stage::Expand, Stage::Aggregate]);
    assert!(!report.is_partial(), "{report}");
    assert_eq!(report.stage(Stage::Fetch).unwrap().succeeded, 1);
    assert_eq!(report.stage(Stage::Expand).unwrap().succeeded, 1);
    assert_eq!(report.stage(Stage::Aggregate).unwrap().succeeded, 1);
    assert_eq!(store.incidents()[0].post_ids, vec![1]);
}
