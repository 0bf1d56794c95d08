pub mod stats;

use std::sync::Arc;

use hazard_common::{PipelineConfig, Query, Result, HAZARDS, LOCATIONS};
use tracing::{info, info_span, Instrument};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::aggregator::{self, AggregateOutcome, EvidenceLimits};
use crate::classifier;
use crate::expander::{self, ExpandOutcome};
use crate::fetcher::{self, FetchBounds};
use crate::queries::generate_queries;
use crate::traits::{ContentSource, HazardStore, IncidentExtractor, RelevanceClassifier};

use self::stats::{RunReport, Stage, StageSummary};

/// The injected capabilities plus run configuration. Each stage can be run on
/// its own; `run_all` runs them in order.
#[derive(Clone, TypedBuilder)]
pub struct HazardPipeline {
    source: Arc<dyn ContentSource>,
    classifier: Arc<dyn RelevanceClassifier>,
    extractor: Arc<dyn IncidentExtractor>,
    store: Arc<dyn HazardStore>,
    #[builder(default)]
    config: PipelineConfig,
}

impl HazardPipeline {
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn HazardStore> {
        &self.store
    }

    pub async fn fetch<I>(&self, queries: I) -> StageSummary
    where
        I: IntoIterator<Item = Query>,
    {
        fetcher::fetch_queries(
            self.source.as_ref(),
            self.store.as_ref(),
            queries,
            FetchBounds::from(&self.config),
        )
        .await
    }

    pub async fn classify(&self) -> StageSummary {
        classifier::classify_untested(
            self.classifier.as_ref(),
            self.store.as_ref(),
            self.config.page_size(),
        )
        .await
    }

    pub async fn expand(&self, location: Option<&str>) -> StageSummary {
        expander::expand_verified(
            self.source.as_ref(),
            self.store.as_ref(),
            location,
            self.config.comment_cap,
        )
        .await
    }

    pub async fn expand_post(&self, post_id: i64) -> Result<ExpandOutcome> {
        expander::expand_post(
            self.source.as_ref(),
            self.store.as_ref(),
            post_id,
            self.config.comment_cap,
        )
        .await
    }

    pub async fn aggregate<I, S>(&self, locations: I) -> StageSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        aggregator::aggregate_locations(
            self.extractor.as_ref(),
            self.store.as_ref(),
            locations,
            EvidenceLimits::from(&self.config),
        )
        .await
    }

    pub async fn aggregate_location(&self, location: &str) -> Result<AggregateOutcome> {
        aggregator::aggregate_location(
            self.extractor.as_ref(),
            self.store.as_ref(),
            location,
            EvidenceLimits::from(&self.config),
        )
        .await
    }

    /// Fetch, classify, expand, aggregate, strictly in that order, over
    /// `locations` (the full coastal list when empty).
    pub async fn run_all(&self, locations: &[String]) -> RunReport {
        let locations: Vec<String> = if locations.is_empty() {
            LOCATIONS.iter().map(|l| l.to_string()).collect()
        } else {
            locations.to_vec()
        };

        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);

        async {
            info!(locations = locations.len(), config = ?self.config, "Run started");
            let mut report = RunReport::new(run_id);

            report.push(self.fetch(generate_queries(&HAZARDS, &locations)).await);
            report.push(self.classify().await);

            let mut expanded = StageSummary::new(Stage::Expand);
            for location in &locations {
                expanded.merge(self.expand(Some(location)).await);
            }
            report.push(expanded);

            report.push(self.aggregate(&locations).await);

            info!(failures = report.total_failures(), "Run finished");
            report
        }
        .instrument(span)
        .await
    }
}
