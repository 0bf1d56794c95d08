// Test mocks for the hazard pipeline.
//
// Four mocks matching the four trait boundaries:
// - MockSource (ContentSource): query -> hits, external id -> thread
// - MockClassifier (RelevanceClassifier): scripted replies, one per call
// - MockExtractor (IncidentExtractor): scripted or fixed incident replies
// - MemoryStore (HazardStore): stateful in-memory store with the same
//   record rules as Postgres
//
// Plus helpers for building source hits, comments and posts.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use hazard_common::{
    Comment, EvidencePost, Hazard, HazardError, IncidentDraft, IncidentExtraction, NewComment,
    NewPost, Post, RecencyWindow, Result, SourceComment, SourcePost,
};

use crate::aggregator::RawIncident;
use crate::classifier::{ClassificationItem, Verdict};
use crate::traits::{ContentSource, HazardStore, IncidentExtractor, RelevanceClassifier};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn source_post(external_id: &str, title: &str) -> SourcePost {
    SourcePost {
        external_id: external_id.to_string(),
        title: title.to_string(),
        body: format!("{title} (body)"),
        url: format!("https://www.reddit.com/r/india/comments/{external_id}/"),
        score: 10,
        subcommunity: "india".to_string(),
    }
}

pub fn source_comment(external_id: &str, score: i64) -> SourceComment {
    SourceComment {
        external_id: external_id.to_string(),
        text: format!("comment {external_id}"),
        score,
    }
}

pub fn untested_post(id: i64, location: &str, hazard: Hazard, title: &str) -> Post {
    Post {
        id,
        external_id: format!("ext{id}"),
        url: format!("https://www.reddit.com/r/india/comments/ext{id}/"),
        title: title.to_string(),
        body: String::new(),
        location: location.to_string(),
        hazard,
        fetched_at: Utc::now(),
        tested: false,
        verified: false,
    }
}

pub fn sample_incident(hazard_type: &str) -> RawIncident {
    RawIncident {
        life_loss: "unknown".into(),
        infra_lost: "sea front roads flooded".into(),
        hazard_type: hazard_type.into(),
        intensity: 8,
        emotion: "fear".into(),
        description: "A large wave struck the shore and flooded the promenade".into(),
        keywords: "wave, flooding, evacuation".into(),
    }
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// HashMap-based content source. Unregistered queries and threads fail with
/// a transport error. Builder pattern: `.on_search()`, `.on_thread()`.
pub struct MockSource {
    searches: HashMap<String, Vec<SourcePost>>,
    threads: HashMap<String, Vec<SourceComment>>,
    search_log: Mutex<Vec<(String, RecencyWindow, u32)>>,
    thread_log: Mutex<Vec<(String, u32)>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            searches: HashMap::new(),
            threads: HashMap::new(),
            search_log: Mutex::new(Vec::new()),
            thread_log: Mutex::new(Vec::new()),
        }
    }

    pub fn on_search(mut self, query: &str, hits: Vec<SourcePost>) -> Self {
        self.searches.insert(query.to_string(), hits);
        self
    }

    pub fn on_thread(mut self, external_id: &str, comments: Vec<SourceComment>) -> Self {
        self.threads.insert(external_id.to_string(), comments);
        self
    }

    pub fn searches(&self) -> Vec<(String, RecencyWindow, u32)> {
        self.search_log.lock().unwrap().clone()
    }

    pub fn thread_requests(&self) -> Vec<(String, u32)> {
        self.thread_log.lock().unwrap().clone()
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentSource for MockSource {
    async fn search(
        &self,
        query: &str,
        window: RecencyWindow,
        limit: u32,
    ) -> Result<Vec<SourcePost>> {
        self.search_log
            .lock()
            .unwrap()
            .push((query.to_string(), window, limit));
        self.searches.get(query).cloned().ok_or_else(|| {
            HazardError::Transport(format!("MockSource: no search registered for {query}"))
        })
    }

    async fn top_comments(&self, external_id: &str, limit: u32) -> Result<Vec<SourceComment>> {
        self.thread_log
            .lock()
            .unwrap()
            .push((external_id.to_string(), limit));
        self.threads.get(external_id).cloned().ok_or_else(|| {
            HazardError::Transport(format!("MockSource: no thread registered for {external_id}"))
        })
    }
}

// ---------------------------------------------------------------------------
// MockClassifier
// ---------------------------------------------------------------------------

/// Replies are consumed in call order. Running out is a transport error.
pub struct MockClassifier {
    replies: Mutex<VecDeque<Result<Vec<Verdict>>>>,
    calls: Mutex<Vec<Vec<ClassificationItem>>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(self, verdicts: Vec<Verdict>) -> Self {
        self.replies.lock().unwrap().push_back(Ok(verdicts));
        self
    }

    /// A reply that could not be parsed into verdicts.
    pub fn malformed(self) -> Self {
        self.fail(HazardError::Schema("MockClassifier: malformed reply".into()))
    }

    pub fn fail(self, err: HazardError) -> Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    /// Items submitted on each call, in order.
    pub fn calls(&self) -> Vec<Vec<ClassificationItem>> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelevanceClassifier for MockClassifier {
    async fn classify(&self, items: &[ClassificationItem]) -> Result<Vec<Verdict>> {
        self.calls.lock().unwrap().push(items.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(HazardError::Transport("MockClassifier: no reply left".into())))
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Scripted replies first, then the fixed fallback if one is set.
pub struct MockExtractor {
    replies: Mutex<VecDeque<Result<RawIncident>>>,
    fallback: Option<RawIncident>,
    calls: Mutex<Vec<Vec<i64>>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(mut self, incident: RawIncident) -> Self {
        self.fallback = Some(incident);
        self
    }

    pub fn reply(self, incident: RawIncident) -> Self {
        self.replies.lock().unwrap().push_back(Ok(incident));
        self
    }

    pub fn fail(self, err: HazardError) -> Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    /// Evidence post ids passed on each call, in order.
    pub fn calls(&self) -> Vec<Vec<i64>> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IncidentExtractor for MockExtractor {
    async fn extract(&self, evidence: &[EvidencePost]) -> Result<RawIncident> {
        self.calls
            .lock()
            .unwrap()
            .push(evidence.iter().map(|e| e.post.id).collect());
        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return reply;
        }
        self.fallback
            .clone()
            .ok_or_else(|| HazardError::Transport("MockExtractor: no reply left".into()))
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Comment>,
    incidents: Vec<IncidentExtraction>,
    /// Posts whose verdict write fails with a store error.
    broken_verdicts: HashSet<i64>,
    next_post: i64,
    next_comment: i64,
    next_incident: i64,
}

impl Inner {
    fn add_post(&mut self, new: &NewPost) -> Post {
        self.next_post += 1;
        let post = Post {
            id: self.next_post,
            external_id: new.external_id.clone(),
            url: new.url.clone(),
            title: new.title.clone(),
            body: new.body.clone(),
            location: new.location.clone(),
            hazard: new.hazard,
            fetched_at: Utc::now(),
            tested: false,
            verified: false,
        };
        self.posts.insert(post.id, post.clone());
        post
    }

    fn top_comments(&self, post_id: i64, limit: usize) -> Vec<Comment> {
        let mut comments: Vec<Comment> = self
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        comments.truncate(limit);
        comments
    }
}

/// In-memory store. Urls are unique, verdicts are written once with both
/// flags together, and comments only attach to verified posts.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Insert an untested post directly, returning its id.
    pub fn seed_post(&self, location: &str, hazard: Hazard, title: &str, url: &str) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let external_id = format!("seed{}", inner.next_post + 1);
        inner
            .add_post(&NewPost {
                external_id,
                url: url.to_string(),
                title: title.to_string(),
                body: String::new(),
                location: location.to_string(),
                hazard,
            })
            .id
    }

    /// Classify a post directly, bypassing the once-only guard.
    pub fn set_verdict(&self, post_id: i64, verified: bool) {
        if let Some(post) = self.inner.lock().unwrap().posts.get_mut(&post_id) {
            post.tested = true;
            post.verified = verified;
        }
    }

    /// Make every verdict write for `post_id` fail.
    pub fn fail_verdict_for(&self, post_id: i64) {
        self.inner.lock().unwrap().broken_verdicts.insert(post_id);
    }

    pub fn post(&self, id: i64) -> Option<Post> {
        self.inner.lock().unwrap().posts.get(&id).cloned()
    }

    pub fn all_posts(&self) -> Vec<Post> {
        self.inner.lock().unwrap().posts.values().cloned().collect()
    }

    pub fn comments(&self, post_id: i64) -> Vec<Comment> {
        self.inner
            .lock()
            .unwrap()
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect()
    }

    pub fn all_comments(&self) -> Vec<Comment> {
        self.inner.lock().unwrap().comments.values().cloned().collect()
    }

    pub fn incidents(&self) -> Vec<IncidentExtraction> {
        self.inner.lock().unwrap().incidents.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HazardStore for MemoryStore {
    async fn find_post_by_url(&self, url: &str) -> Result<Option<Post>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.posts.values().find(|p| p.url == url).cloned())
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Option<Post>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.posts.values().any(|p| p.url == post.url) {
            return Ok(None);
        }
        Ok(Some(inner.add_post(post)))
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>> {
        Ok(self.post(id))
    }

    async fn untested_posts(&self) -> Result<Vec<Post>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.posts.values().filter(|p| !p.tested).cloned().collect())
    }

    async fn verified_posts(&self, location: Option<&str>) -> Result<Vec<Post>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .posts
            .values()
            .filter(|p| p.is_verified())
            .filter(|p| location.map_or(true, |l| p.location == l))
            .cloned()
            .collect())
    }

    async fn record_verdict(&self, post_id: i64, verified: bool) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        if inner.broken_verdicts.contains(&post_id) {
            return Err(HazardError::Store(format!("verdict write for post {post_id} failed")));
        }
        match inner.posts.get_mut(&post_id) {
            Some(post) if !post.tested => {
                post.tested = true;
                post.verified = verified;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn comment_exists(&self, post_id: i64, external_id: &str) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .comments
            .values()
            .any(|c| c.post_id == post_id && c.external_id == external_id))
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<Option<Comment>> {
        let mut inner = self.inner.lock().unwrap();
        let eligible = inner
            .posts
            .get(&comment.post_id)
            .is_some_and(Post::is_verified);
        let duplicate = inner
            .comments
            .values()
            .any(|c| c.post_id == comment.post_id && c.external_id == comment.external_id);
        if !eligible || duplicate {
            return Ok(None);
        }

        inner.next_comment += 1;
        let stored = Comment {
            id: inner.next_comment,
            post_id: comment.post_id,
            external_id: comment.external_id.clone(),
            text: comment.text.clone(),
            score: comment.score,
            parent_id: comment.parent_id,
            created_at: Utc::now(),
        };
        inner.comments.insert(stored.id, stored.clone());
        Ok(Some(stored))
    }

    async fn evidence_for_location(
        &self,
        location: &str,
        post_limit: usize,
        comment_limit: usize,
    ) -> Result<Vec<EvidencePost>> {
        let inner = self.inner.lock().unwrap();
        let mut posts: Vec<&Post> = inner
            .posts
            .values()
            .filter(|p| p.location == location && p.is_verified())
            .collect();
        posts.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at).then(b.id.cmp(&a.id)));
        posts.truncate(post_limit);

        Ok(posts
            .into_iter()
            .map(|post| EvidencePost {
                post: post.clone(),
                comments: inner.top_comments(post.id, comment_limit),
            })
            .collect())
    }

    async fn create_incident(
        &self,
        location: &str,
        draft: &IncidentDraft,
        post_ids: &[i64],
    ) -> Result<IncidentExtraction> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(missing) = post_ids.iter().find(|&&id| !inner.posts.contains_key(&id)) {
            return Err(HazardError::Store(format!("post {missing} does not exist")));
        }

        let mut post_ids = post_ids.to_vec();
        post_ids.sort_unstable();
        post_ids.dedup();

        inner.next_incident += 1;
        let incident = IncidentExtraction {
            id: inner.next_incident,
            location: location.to_string(),
            life_loss: draft.life_loss.clone(),
            infra_lost: draft.infra_lost.clone(),
            hazard_type: draft.hazard_type,
            intensity: draft.intensity,
            emotion: draft.emotion.clone(),
            description: draft.description.clone(),
            keywords: draft.keywords.clone(),
            post_ids,
            created_at: Utc::now(),
        };
        inner.incidents.push(incident.clone());
        Ok(incident)
    }

    async fn recent_incidents(&self, limit: usize) -> Result<Vec<IncidentExtraction>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.incidents.iter().rev().take(limit).cloned().collect())
    }
}
