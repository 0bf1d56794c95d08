//! A seeded disaster scenario for exercising aggregation offline.
//!
//! Six verified tsunami posts for the synthetic location `dummy`, each with
//! seven or eight comments. Re-seeding is a no-op: posts dedup on url and
//! comments on `(post, external_id)`.

use hazard_common::{Hazard, NewComment, NewPost, Result};
use tracing::info;

use crate::traits::HazardStore;

pub const SCENARIO_LOCATION: &str = "dummy";
pub const SCENARIO_POSTS: usize = 6;

const POST_TEMPLATES: [&str; 8] = [
    "Massive waves spotted approaching the coast. Local authorities urging people to move to higher ground immediately. Many fishing boats are still at sea!",
    "Reports coming in of strong tremors followed by a huge wave hitting coastal villages. Power lines are down and people are trying to evacuate.",
    "Several villages near the coast are completely flooded. Families are stuck on rooftops waiting for rescue teams. Water levels are still rising!",
    "Emergency sirens are blaring. Witnesses report boats being thrown onto the roads by powerful waves. This looks worse than anything we've seen in years.",
    "Chaos in coastal markets as people rush to evacuate. Supplies are running out quickly. No clear information on the number of casualties yet.",
    "Local news showing harrowing scenes: homes destroyed, families searching for loved ones. Rescuers are having difficulty reaching some areas due to submerged roads.",
    "Hospitals are overflowing with injured people. Volunteers are being asked to donate blood. Entire neighborhoods have lost communication due to the storm surge.",
    "Authorities are struggling to coordinate relief efforts. Evacuation centers are packed and there are reports of missing children.",
];

const COMMENT_TEMPLATES: [&str; 10] = [
    "Praying for everyone affected. Stay strong!",
    "My cousin lives near the coast, still can't reach him on phone.",
    "The government should have warned earlier, this is a disaster!",
    "Just saw live footage on TV, absolutely terrifying.",
    "Fishermen are the most vulnerable, many still haven't returned.",
    "Hearing rumors of another wave coming, is this true?",
    "Rescue teams are doing their best but the situation is chaotic.",
    "Stay safe everyone, don't take chances!",
    "Shocking to see so many people displaced overnight.",
    "Relief camps are overcrowded, urgent help needed!",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub posts_created: usize,
    pub comments_created: usize,
}

pub async fn seed_scenario(store: &dyn HazardStore) -> Result<SeedSummary> {
    let hazard = Hazard::Tsunami;
    let mut summary = SeedSummary::default();

    for i in 0..SCENARIO_POSTS {
        let n = i + 1;
        let new_post = NewPost {
            external_id: format!("dummy_post_{n}"),
            url: format!("https://reddit.com/r/oceanhazards/post_{n}"),
            title: format!("[URGENT] {} update - Situation worsening", capitalize(hazard.label())),
            body: POST_TEMPLATES[(i * 3) % POST_TEMPLATES.len()].to_string(),
            location: SCENARIO_LOCATION.to_string(),
            hazard,
        };

        let post = match store.insert_post(&new_post).await? {
            Some(post) => {
                summary.posts_created += 1;
                post
            }
            None => match store.find_post_by_url(&new_post.url).await? {
                Some(post) => post,
                None => continue,
            },
        };
        store.record_verdict(post.id, true).await?;

        let comment_count = 7 + (i % 2);
        for j in 0..comment_count {
            let comment = NewComment {
                post_id: post.id,
                external_id: format!("dummy_comment_{n}_{}", j + 1),
                text: COMMENT_TEMPLATES[(i + j * 3) % COMMENT_TEMPLATES.len()].to_string(),
                score: ((n * 37 + j * 53) % 200 + 1) as i64,
                parent_id: None,
            };
            if store.insert_comment(&comment).await?.is_some() {
                summary.comments_created += 1;
            }
        }
    }

    info!(
        location = SCENARIO_LOCATION,
        posts = summary.posts_created,
        comments = summary.comments_created,
        "Scenario seeded"
    );
    Ok(summary)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
