use std::sync::Arc;

use ai_client::Claude;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hazard_common::{Config, PipelineConfig, RecencyWindow, LOCATIONS};
use hazard_scout::aggregator::AggregateOutcome;
use hazard_scout::fixtures::{seed_scenario, SCENARIO_LOCATION};
use hazard_scout::llm::{ClaudeClassifier, ClaudeExtractor};
use hazard_scout::queries::default_queries;
use hazard_scout::traits::HazardStore;
use hazard_scout::HazardPipeline;
use hazard_store::PgStore;
use reddit_client::{RedditClient, RedditCredentials};

#[derive(Parser)]
#[command(name = "hazard-scout", about = "Ocean-hazard social signal pipeline")]
struct Cli {
    #[command(flatten)]
    knobs: Knobs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Knobs {
    /// Posts per classification request
    #[arg(long, global = true, default_value_t = 5)]
    batch_size: usize,

    /// Max search hits per query
    #[arg(long, global = true, default_value_t = 5)]
    result_limit: u32,

    /// hour | day | week | month | year | all
    #[arg(long, global = true, default_value = "day")]
    recency_window: RecencyWindow,

    /// Max top-level comments per verified post
    #[arg(long, global = true, default_value_t = 10)]
    comment_cap: u32,
}

impl Knobs {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::builder()
            .batch_size(self.batch_size)
            .result_limit(self.result_limit)
            .recency_window(self.recency_window)
            .comment_cap(self.comment_cap)
            .build()
    }
}

#[derive(Subcommand)]
enum Command {
    /// Search every hazard x location query and store new posts
    Fetch {
        /// Only run the first N queries
        #[arg(long)]
        limit_queries: Option<usize>,
    },
    /// Classify all untested posts
    Classify,
    /// Pull top comments for verified posts
    Expand {
        #[arg(long)]
        location: Option<String>,
    },
    /// Extract one incident per location
    Aggregate {
        #[arg(long, required = true)]
        location: Vec<String>,
    },
    /// All stages in order
    Run {
        /// Defaults to every coastal location
        #[arg(long)]
        location: Vec<String>,
    },
    /// Seed the offline disaster scenario
    Seed,
    /// List recent incidents
    Incidents {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Check content-source and LLM credentials
    Probe,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("hazard=info".parse()?)
                .add_directive("reddit_client=info".parse()?)
                .add_directive("ai_client=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Seed => {
            let store = connect_store(&Config::store_from_env()?).await?;
            let summary = seed_scenario(&store).await?;
            println!(
                "Seeded location {SCENARIO_LOCATION:?}: {} posts, {} comments created",
                summary.posts_created, summary.comments_created
            );
        }
        Command::Incidents { limit } => {
            let store = connect_store(&Config::store_from_env()?).await?;
            for incident in HazardStore::recent_incidents(&store, limit).await? {
                println!(
                    "#{} {} [{}] intensity {}/10, {} | life loss: {} | posts {:?}\n    {}\n    keywords: {}",
                    incident.id,
                    incident.location,
                    incident.hazard_type,
                    incident.intensity,
                    incident.emotion,
                    incident.life_loss,
                    incident.post_ids,
                    incident.description,
                    incident.keyword_list().join(" | "),
                );
            }
        }
        command => {
            let config = Config::from_env()?;
            config.log_redacted();
            run_command(command, &config, cli.knobs.pipeline_config()).await?;
        }
    }

    Ok(())
}

async fn run_command(command: Command, config: &Config, pipeline_config: PipelineConfig) -> Result<()> {
    let reddit = Arc::new(RedditClient::new(RedditCredentials {
        client_id: config.reddit_client_id.clone(),
        client_secret: config.reddit_client_secret.clone(),
        username: config.reddit_username.clone(),
        platform: config.reddit_platform.clone(),
    }));
    let claude = Claude::new(&config.anthropic_api_key, &config.anthropic_model);

    if let Command::Probe = command {
        reddit.probe().await?;
        let reply = claude
            .chat_completion("Reply with the single word OK.", "ping")
            .await?;
        info!(model = claude.model(), reply = %reply.trim(), "LLM reachable");
        println!("Content source and LLM credentials OK");
        return Ok(());
    }

    let store = Arc::new(connect_store(&config.database_url).await?);
    let pipeline = HazardPipeline::builder()
        .source(reddit)
        .classifier(Arc::new(ClaudeClassifier::new(claude.clone())))
        .extractor(Arc::new(ClaudeExtractor::new(claude)))
        .store(store)
        .config(pipeline_config)
        .build();

    match command {
        Command::Fetch { limit_queries } => {
            let limit = limit_queries.unwrap_or(usize::MAX);
            println!("{}", pipeline.fetch(default_queries().take(limit)).await);
        }
        Command::Classify => println!("{}", pipeline.classify().await),
        Command::Expand { location } => {
            println!("{}", pipeline.expand(location.as_deref()).await)
        }
        Command::Aggregate { location } => {
            for loc in &location {
                match pipeline.aggregate_location(loc).await {
                    Ok(AggregateOutcome::Created(incident)) => println!(
                        "{loc}: incident #{} ({}, intensity {}) from posts {:?}",
                        incident.id, incident.hazard_type, incident.intensity, incident.post_ids
                    ),
                    Ok(AggregateOutcome::NoSignal) => println!("{loc}: no signal"),
                    Err(e) => println!("{loc}: failed ({}): {e}", e.kind()),
                }
            }
        }
        Command::Run { location } => {
            let report = pipeline.run_all(&location).await;
            println!("{report}");
            if report.is_partial() {
                info!(
                    locations = if location.is_empty() { LOCATIONS.len() } else { location.len() },
                    "Run finished with failed units; rerun to retry them"
                );
            }
        }
        Command::Seed | Command::Incidents { .. } | Command::Probe => {}
    }

    Ok(())
}

async fn connect_store(database_url: &str) -> Result<PgStore> {
    let store = PgStore::connect(database_url).await?;
    store.migrate().await?;
    Ok(store)
}
