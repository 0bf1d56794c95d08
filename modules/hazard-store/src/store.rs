use std::collections::HashMap;

use hazard_common::{
    Comment, EvidencePost, IncidentDraft, IncidentExtraction, NewComment, NewPost, Post,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::Result;
use crate::rows::{CommentRow, IncidentRow, PostRow};

const POST_COLUMNS: &str =
    "id, external_id, url, title, body, location, hazard, fetched_at, tested, verified";

const COMMENT_COLUMNS: &str = "id, post_id, external_id, text, score, parent_id, created_at";

/// Postgres-backed store for posts, comments and incident extractions.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Store migrations applied");
        Ok(())
    }

    // --- Posts ---

    pub async fn find_post_by_url(&self, url: &str) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE url = $1"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Post::try_from).transpose()
    }

    /// Insert a fresh, untested post. Returns `None` when the url is already stored.
    pub async fn insert_post(&self, post: &NewPost) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            INSERT INTO posts (external_id, url, title, body, location, hazard)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (url) DO NOTHING
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(&post.external_id)
        .bind(&post.url)
        .bind(&post.title)
        .bind(&post.body)
        .bind(&post.location)
        .bind(post.hazard.slug())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Post::try_from).transpose()
    }

    pub async fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Post::try_from).transpose()
    }

    /// Every post still awaiting classification, oldest first.
    pub async fn untested_posts(&self) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE NOT tested ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Post::try_from).collect()
    }

    /// Verified posts, optionally restricted to one location, oldest first.
    pub async fn verified_posts(&self, location: Option<&str>) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            SELECT {POST_COLUMNS} FROM posts
            WHERE tested AND verified
              AND ($1::TEXT IS NULL OR location = $1)
            ORDER BY id
            "#
        ))
        .bind(location)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Post::try_from).collect()
    }

    /// Set `tested` and `verified` together in one statement. Only posts that
    /// are still untested are touched; returns whether a row changed.
    pub async fn record_verdict(&self, post_id: i64, verified: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE posts SET tested = true, verified = $2 WHERE id = $1 AND NOT tested",
        )
        .bind(post_id)
        .bind(verified)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // --- Comments ---

    pub async fn comment_exists(&self, post_id: i64, external_id: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM comments WHERE post_id = $1 AND external_id = $2)",
        )
        .bind(post_id)
        .bind(external_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Insert a comment only if its post is verified. Returns `None` when the
    /// post is not eligible or `(post, external_id)` already exists.
    pub async fn insert_comment(&self, comment: &NewComment) -> Result<Option<Comment>> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            r#"
            INSERT INTO comments (post_id, external_id, text, score, parent_id)
            SELECT p.id, $2, $3, $4, $5
            FROM posts p
            WHERE p.id = $1 AND p.tested AND p.verified
            ON CONFLICT (post_id, external_id) DO NOTHING
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(comment.post_id)
        .bind(&comment.external_id)
        .bind(&comment.text)
        .bind(comment.score)
        .bind(comment.parent_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Comment::from))
    }

    // --- Evidence & incidents ---

    /// Up to `post_limit` most recent verified posts for a location, each with
    /// its `comment_limit` highest-scored comments.
    pub async fn evidence_for_location(
        &self,
        location: &str,
        post_limit: usize,
        comment_limit: usize,
    ) -> Result<Vec<EvidencePost>> {
        let post_rows = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            SELECT {POST_COLUMNS} FROM posts
            WHERE location = $1 AND tested AND verified
            ORDER BY fetched_at DESC, id DESC
            LIMIT $2
            "#
        ))
        .bind(location)
        .bind(post_limit as i64)
        .fetch_all(&self.pool)
        .await?;

        if post_rows.is_empty() {
            return Ok(Vec::new());
        }

        let posts: Vec<Post> = post_rows
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_>>()?;
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();

        let comment_rows = sqlx::query_as::<_, CommentRow>(&format!(
            r#"
            SELECT {COMMENT_COLUMNS} FROM (
                SELECT c.*,
                       row_number() OVER (PARTITION BY c.post_id ORDER BY c.score DESC, c.id) AS rn
                FROM comments c
                WHERE c.post_id = ANY($1)
            ) ranked
            WHERE rn <= $2
            ORDER BY post_id, score DESC, id
            "#
        ))
        .bind(&ids)
        .bind(comment_limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut by_post: HashMap<i64, Vec<Comment>> = HashMap::new();
        for row in comment_rows {
            by_post.entry(row.post_id).or_default().push(row.into());
        }

        debug!(location, posts = posts.len(), "Loaded evidence");
        Ok(posts
            .into_iter()
            .map(|post| {
                let comments = by_post.remove(&post.id).unwrap_or_default();
                EvidencePost { post, comments }
            })
            .collect())
    }

    /// Persist one incident and its evidence links atomically.
    pub async fn create_incident(
        &self,
        location: &str,
        draft: &IncidentDraft,
        post_ids: &[i64],
    ) -> Result<IncidentExtraction> {
        let mut tx = self.pool.begin().await?;

        let (id, created_at) = sqlx::query_as::<_, (i64, chrono::DateTime<chrono::Utc>)>(
            r#"
            INSERT INTO incidents
                (location, life_loss, infra_lost, hazard_type, intensity,
                 emotion, description, keywords)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, created_at
            "#,
        )
        .bind(location)
        .bind(&draft.life_loss)
        .bind(&draft.infra_lost)
        .bind(draft.hazard_type.slug())
        .bind(i16::from(draft.intensity))
        .bind(&draft.emotion)
        .bind(&draft.description)
        .bind(&draft.keywords)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO incident_posts (incident_id, post_id)
            SELECT $1, unnest($2::BIGINT[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id)
        .bind(post_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut post_ids = post_ids.to_vec();
        post_ids.sort_unstable();
        post_ids.dedup();

        info!(incident_id = id, location, evidence = post_ids.len(), "Incident stored");
        Ok(IncidentExtraction {
            id,
            location: location.to_string(),
            life_loss: draft.life_loss.clone(),
            infra_lost: draft.infra_lost.clone(),
            hazard_type: draft.hazard_type,
            intensity: draft.intensity,
            emotion: draft.emotion.clone(),
            description: draft.description.clone(),
            keywords: draft.keywords.clone(),
            post_ids,
            created_at,
        })
    }

    /// Most recent incidents first, with their surviving evidence links.
    pub async fn recent_incidents(&self, limit: usize) -> Result<Vec<IncidentExtraction>> {
        let rows = sqlx::query_as::<_, IncidentRow>(
            r#"
            SELECT i.id, i.location, i.life_loss, i.infra_lost, i.hazard_type,
                   i.intensity, i.emotion, i.description, i.keywords, i.created_at,
                   COALESCE(
                       array_agg(ip.post_id ORDER BY ip.post_id)
                           FILTER (WHERE ip.post_id IS NOT NULL),
                       '{}'
                   ) AS post_ids
            FROM incidents i
            LEFT JOIN incident_posts ip ON ip.incident_id = i.id
            GROUP BY i.id
            ORDER BY i.created_at DESC, i.id DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(IncidentExtraction::try_from).collect()
    }
}
