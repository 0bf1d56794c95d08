// Row shapes as they come out of Postgres, and their mapping into domain types.

use chrono::{DateTime, Utc};
use hazard_common::{Comment, Hazard, IncidentExtraction, Post};

use crate::error::StoreError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub id: i64,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub body: String,
    pub location: String,
    pub hazard: String,
    pub fetched_at: DateTime<Utc>,
    pub tested: bool,
    pub verified: bool,
}

impl TryFrom<PostRow> for Post {
    type Error = StoreError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        Ok(Post {
            id: row.id,
            external_id: row.external_id,
            url: row.url,
            title: row.title,
            body: row.body,
            location: row.location,
            hazard: parse_hazard(&row.hazard, "posts", row.id)?,
            fetched_at: row.fetched_at,
            tested: row.tested,
            verified: row.verified,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub external_id: String,
    pub text: String,
    pub score: i64,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            post_id: row.post_id,
            external_id: row.external_id,
            text: row.text,
            score: row.score,
            parent_id: row.parent_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct IncidentRow {
    pub id: i64,
    pub location: String,
    pub life_loss: String,
    pub infra_lost: String,
    pub hazard_type: String,
    pub intensity: i16,
    pub emotion: String,
    pub description: String,
    pub keywords: String,
    pub post_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<IncidentRow> for IncidentExtraction {
    type Error = StoreError;

    fn try_from(row: IncidentRow) -> Result<Self, Self::Error> {
        let intensity = u8::try_from(row.intensity)
            .ok()
            .filter(|i| (1..=10).contains(i))
            .ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "incidents.{} has intensity {} outside 1..=10",
                    row.id, row.intensity
                ))
            })?;

        Ok(IncidentExtraction {
            id: row.id,
            location: row.location,
            life_loss: row.life_loss,
            infra_lost: row.infra_lost,
            hazard_type: parse_hazard(&row.hazard_type, "incidents", row.id)?,
            intensity,
            emotion: row.emotion,
            description: row.description,
            keywords: row.keywords,
            post_ids: row.post_ids,
            created_at: row.created_at,
        })
    }
}

fn parse_hazard(raw: &str, table: &str, id: i64) -> Result<Hazard, StoreError> {
    raw.parse::<Hazard>()
        .map_err(|_| StoreError::Corrupt(format!("{table}.{id} has unknown hazard {raw:?}")))
}
