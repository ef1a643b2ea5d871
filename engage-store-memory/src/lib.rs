#![deny(missing_docs)]
//! In-memory implementations of the `engage-core` store traits.
//!
//! Each store is a `RwLock`-guarded collection keyed by issue (or, for
//! [`MemoryLearningStore`], by workspace), mirroring the `HashMap` behind
//! an `RwLock` approach used for in-memory state elsewhere in this
//! workspace's ancestry. No persistence, no semantic search — these exist
//! to back deterministic tests for `engage-exec`, `engage-planner`,
//! `engage-specgen`, and `engage-orchestrator`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use engage_core::{
    CallContext, EventLogStore, FindingsTransaction, FollowUpEvent, GapStore, Integration,
    IntegrationStore, IssueStore, LearningStore, NewFinding, NewGap, NewLearning, OpenGapCounts,
    QueueError, QueueProducer,
};
use engage_types::{
    CloseReason, CodeFinding, EventLogEntry, Gap, GapRef, GapStatus, Issue, Learning, SpecStatus,
    StoreError,
};

fn not_found(kind: &str, id: impl std::fmt::Display) -> StoreError {
    StoreError::NotFound(format!("{kind} {id}"))
}

/// In-memory [`IssueStore`] and [`FindingsTransaction`], backed by a single
/// `RwLock<HashMap<i64, Issue>>`.
#[derive(Default)]
pub struct MemoryIssueStore {
    issues: RwLock<HashMap<i64, Issue>>,
}

impl MemoryIssueStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an issue, for test setup.
    pub async fn seed(&self, issue: Issue) {
        self.issues.write().await.insert(issue.id, issue);
    }
}

#[async_trait]
impl IssueStore for MemoryIssueStore {
    async fn get_by_id(&self, id: i64, _ctx: &CallContext) -> Result<Issue, StoreError> {
        self.issues
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("issue", id))
    }

    async fn claim_queued(&self, id: i64, _ctx: &CallContext) -> Result<bool, StoreError> {
        let mut issues = self.issues.write().await;
        let issue = issues.get_mut(&id).ok_or_else(|| not_found("issue", id))?;
        if issue.state == engage_types::IssueState::Queued {
            issue.state = engage_types::IssueState::Processing;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn queue_if_idle(&self, id: i64, _ctx: &CallContext) -> Result<bool, StoreError> {
        let mut issues = self.issues.write().await;
        let issue = issues.get_mut(&id).ok_or_else(|| not_found("issue", id))?;
        if issue.state == engage_types::IssueState::Idle {
            issue.state = engage_types::IssueState::Queued;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn reset_queued_to_idle(&self, id: i64, _ctx: &CallContext) -> Result<(), StoreError> {
        let mut issues = self.issues.write().await;
        let issue = issues.get_mut(&id).ok_or_else(|| not_found("issue", id))?;
        issue.state = engage_types::IssueState::Idle;
        Ok(())
    }

    async fn set_idle(&self, id: i64, _ctx: &CallContext) -> Result<(), StoreError> {
        let mut issues = self.issues.write().await;
        let issue = issues.get_mut(&id).ok_or_else(|| not_found("issue", id))?;
        issue.state = engage_types::IssueState::Idle;
        Ok(())
    }

    async fn update_spec(
        &self,
        id: i64,
        spec: String,
        _ctx: &CallContext,
    ) -> Result<(), StoreError> {
        let mut issues = self.issues.write().await;
        let issue = issues.get_mut(&id).ok_or_else(|| not_found("issue", id))?;
        issue.spec = Some(spec);
        Ok(())
    }

    async fn update_spec_status(
        &self,
        id: i64,
        status: SpecStatus,
        _ctx: &CallContext,
    ) -> Result<(), StoreError> {
        let mut issues = self.issues.write().await;
        let issue = issues.get_mut(&id).ok_or_else(|| not_found("issue", id))?;
        issue.spec_status = Some(status);
        Ok(())
    }
}

#[async_trait]
impl FindingsTransaction for MemoryIssueStore {
    async fn apply_findings_delta(
        &self,
        issue_id: i64,
        add: Vec<NewFinding>,
        remove: Vec<i64>,
        _ctx: &CallContext,
    ) -> Result<Issue, StoreError> {
        let mut issues = self.issues.write().await;
        let issue = issues
            .get_mut(&issue_id)
            .ok_or_else(|| not_found("issue", issue_id))?;
        let mut next_id = issue.code_findings.iter().map(|f| f.id).max().unwrap_or(0) + 1;
        let assigned: Vec<CodeFinding> = add
            .into_iter()
            .map(|finding| {
                let id = next_id;
                next_id += 1;
                CodeFinding { id, synthesis: finding.synthesis, sources: finding.sources }
            })
            .collect();
        issue.apply_findings_delta(assigned, &remove);
        Ok(issue.clone())
    }
}

/// In-memory [`GapStore`], keyed by `(issue_id, gap_id)`.
pub struct MemoryGapStore {
    gaps: RwLock<HashMap<(i64, i64), Gap>>,
    next_id: AtomicI64,
}

impl Default for MemoryGapStore {
    fn default() -> Self {
        Self {
            gaps: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl MemoryGapStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Directly insert a fully-formed gap, for test setup.
    pub async fn seed(&self, issue_id: i64, gap: Gap) {
        self.gaps.write().await.insert((issue_id, gap.id), gap);
    }
}

#[async_trait]
impl GapStore for MemoryGapStore {
    async fn add_gaps(
        &self,
        issue_id: i64,
        gaps: Vec<NewGap>,
        _ctx: &CallContext,
    ) -> Result<Vec<i64>, StoreError> {
        let mut store = self.gaps.write().await;
        let mut ids = Vec::with_capacity(gaps.len());
        for new in gaps {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let gap = Gap {
                id,
                short_id: id,
                question: new.question,
                evidence: new.evidence,
                severity: new.severity,
                respondent: new.respondent,
                status: if new.pending {
                    GapStatus::Pending
                } else {
                    GapStatus::Open
                },
                closed_reason: None,
                closed_note: None,
                resolved_at: None,
            };
            store.insert((issue_id, id), gap);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn get_by_id(
        &self,
        issue_id: i64,
        gap_id: i64,
        _ctx: &CallContext,
    ) -> Result<Gap, StoreError> {
        self.gaps
            .read()
            .await
            .get(&(issue_id, gap_id))
            .cloned()
            .ok_or_else(|| not_found("gap", gap_id))
    }

    async fn get_by_short_id(
        &self,
        issue_id: i64,
        short_id: i64,
        _ctx: &CallContext,
    ) -> Result<Gap, StoreError> {
        self.gaps
            .read()
            .await
            .iter()
            .find(|((issue, _), gap)| *issue == issue_id && gap.short_id == short_id)
            .map(|(_, gap)| gap.clone())
            .ok_or_else(|| not_found("gap (short id)", short_id))
    }

    async fn resolve_gap_id(
        &self,
        issue_id: i64,
        gap_ref: &GapRef,
        _ctx: &CallContext,
    ) -> Result<Option<i64>, StoreError> {
        let store = self.gaps.read().await;
        let candidate = gap_ref.as_i64();
        if store.contains_key(&(issue_id, candidate)) {
            return Ok(Some(candidate));
        }
        let by_short = store
            .iter()
            .find(|((issue, _), gap)| *issue == issue_id && gap.short_id == candidate)
            .map(|(_, gap)| gap.id);
        Ok(by_short)
    }

    async fn close_gap(
        &self,
        issue_id: i64,
        gap_id: i64,
        reason: CloseReason,
        note: Option<String>,
        _ctx: &CallContext,
    ) -> Result<(), StoreError> {
        let mut store = self.gaps.write().await;
        let gap = store
            .get_mut(&(issue_id, gap_id))
            .ok_or_else(|| not_found("gap", gap_id))?;
        gap.status = reason.resulting_status();
        gap.closed_reason = Some(reason);
        gap.closed_note = note;
        gap.resolved_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn ask_gap(
        &self,
        issue_id: i64,
        gap_id: i64,
        _ctx: &CallContext,
    ) -> Result<(), StoreError> {
        let mut store = self.gaps.write().await;
        let gap = store
            .get_mut(&(issue_id, gap_id))
            .ok_or_else(|| not_found("gap", gap_id))?;
        gap.status = GapStatus::Open;
        Ok(())
    }

    async fn open_gap_counts(
        &self,
        issue_id: i64,
        _ctx: &CallContext,
    ) -> Result<OpenGapCounts, StoreError> {
        let store = self.gaps.read().await;
        let mut counts = OpenGapCounts::default();
        for ((issue, _), gap) in store.iter() {
            if *issue == issue_id && gap.status == GapStatus::Open {
                counts.total += 1;
                if gap.severity == engage_types::Severity::Blocking {
                    counts.blocking += 1;
                }
            }
        }
        Ok(counts)
    }

    async fn list_open_by_issue(
        &self,
        issue_id: i64,
        _ctx: &CallContext,
    ) -> Result<Vec<Gap>, StoreError> {
        let store = self.gaps.read().await;
        Ok(store
            .iter()
            .filter(|((issue, _), gap)| *issue == issue_id && gap.status == GapStatus::Open)
            .map(|(_, gap)| gap.clone())
            .collect())
    }

    async fn list_pending_by_issue(
        &self,
        issue_id: i64,
        _ctx: &CallContext,
    ) -> Result<Vec<Gap>, StoreError> {
        let store = self.gaps.read().await;
        Ok(store
            .iter()
            .filter(|((issue, _), gap)| *issue == issue_id && gap.status == GapStatus::Pending)
            .map(|(_, gap)| gap.clone())
            .collect())
    }

    async fn list_closed_by_issue(
        &self,
        issue_id: i64,
        limit: usize,
        _ctx: &CallContext,
    ) -> Result<Vec<Gap>, StoreError> {
        let store = self.gaps.read().await;
        let mut closed: Vec<Gap> = store
            .iter()
            .filter(|((issue, _), gap)| {
                *issue == issue_id
                    && matches!(gap.status, GapStatus::Resolved | GapStatus::Skipped)
            })
            .map(|(_, gap)| gap.clone())
            .collect();
        closed.sort_by(|a, b| b.resolved_at.cmp(&a.resolved_at));
        closed.truncate(limit);
        Ok(closed)
    }
}

/// In-memory [`LearningStore`], deduplicated on `(workspace, content)`.
pub struct MemoryLearningStore {
    learnings: RwLock<HashMap<i64, Learning>>,
    index: RwLock<HashMap<(String, String), i64>>,
    next_id: AtomicI64,
}

impl Default for MemoryLearningStore {
    fn default() -> Self {
        Self {
            learnings: RwLock::new(HashMap::new()),
            index: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl MemoryLearningStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LearningStore for MemoryLearningStore {
    async fn propose(&self, new: NewLearning, _ctx: &CallContext) -> Result<String, StoreError> {
        let key = (new.workspace.clone(), new.content.clone());
        let mut index = self.index.write().await;
        if let Some(existing_id) = index.get(&key) {
            return Ok(existing_id.to_string());
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let learning = Learning {
            id,
            workspace_id: new.workspace.parse().unwrap_or_default(),
            learning_type: new.learning_type,
            content: new.content,
            issue_id: 0,
        };
        self.learnings.write().await.insert(id, learning);
        index.insert(key, id);
        Ok(id.to_string())
    }

    async fn get_many(
        &self,
        ids: &[String],
        _ctx: &CallContext,
    ) -> Result<Vec<Learning>, StoreError> {
        let learnings = self.learnings.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| id.parse::<i64>().ok())
            .filter_map(|id| learnings.get(&id).cloned())
            .collect())
    }

    async fn list_by_workspace(
        &self,
        workspace: &str,
        _ctx: &CallContext,
    ) -> Result<Vec<Learning>, StoreError> {
        let Ok(workspace_id) = workspace.parse::<i64>() else {
            return Ok(Vec::new());
        };
        let learnings = self.learnings.read().await;
        Ok(learnings
            .values()
            .filter(|l| l.workspace_id == workspace_id)
            .cloned()
            .collect())
    }
}

/// In-memory [`IntegrationStore`].
#[derive(Default)]
pub struct MemoryIntegrationStore {
    integrations: RwLock<HashMap<String, Integration>>,
}

impl MemoryIntegrationStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an integration, for test setup.
    pub async fn seed(&self, integration: Integration) {
        self.integrations
            .write()
            .await
            .insert(integration.workspace.clone(), integration);
    }
}

#[async_trait]
impl IntegrationStore for MemoryIntegrationStore {
    async fn get(
        &self,
        workspace: &str,
        _ctx: &CallContext,
    ) -> Result<Option<Integration>, StoreError> {
        Ok(self.integrations.read().await.get(workspace).cloned())
    }
}

/// In-memory [`EventLogStore`], append-only.
#[derive(Default)]
pub struct MemoryEventLogStore {
    entries: RwLock<Vec<EventLogEntry>>,
}

impl MemoryEventLogStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current entries, for test assertions.
    pub async fn entries(&self) -> Vec<EventLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl EventLogStore for MemoryEventLogStore {
    async fn append(
        &self,
        entry: EventLogEntry,
        _ctx: &CallContext,
    ) -> Result<(), StoreError> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn list_unprocessed_by_issue(
        &self,
        issue_id: i64,
        _ctx: &CallContext,
    ) -> Result<Vec<EventLogEntry>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.issue_id == issue_id && e.processed_at.is_none())
            .cloned()
            .collect())
    }

    async fn mark_batch_processed(
        &self,
        ids: &[i64],
        _ctx: &CallContext,
    ) -> Result<(), StoreError> {
        let now = chrono::Utc::now();
        let mut entries = self.entries.write().await;
        for entry in entries.iter_mut() {
            if ids.contains(&entry.id) {
                entry.processed_at = Some(now);
            }
        }
        Ok(())
    }
}

/// In-memory [`QueueProducer`], recording events for test assertions.
#[derive(Default)]
pub struct MemoryQueueProducer {
    events: RwLock<Vec<FollowUpEvent>>,
}

impl MemoryQueueProducer {
    /// An empty producer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the enqueued events so far.
    pub async fn events(&self) -> Vec<FollowUpEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl QueueProducer for MemoryQueueProducer {
    async fn enqueue(&self, event: FollowUpEvent, _ctx: &CallContext) -> Result<(), QueueError> {
        self.events.write().await.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engage_types::{IssueState, Participant, Respondent, Severity, TrackerProvider};

    fn bare_issue(id: i64) -> Issue {
        Issue {
            id,
            integration_id: 1,
            external_issue_id: id.to_string(),
            state: IssueState::Idle,
            title: "t".into(),
            description: "d".into(),
            reporter: Participant {
                user_id: "u1".into(),
                username: "alice".into(),
            },
            assignees: vec![],
            members: vec![],
            discussions: vec![],
            code_findings: vec![],
            spec: None,
            spec_status: None,
            provider: TrackerProvider::GitHub,
        }
    }

    #[tokio::test]
    async fn claim_queued_is_exclusive() {
        let store = MemoryIssueStore::new();
        let mut issue = bare_issue(1);
        issue.state = IssueState::Queued;
        store.seed(issue).await;
        let ctx = CallContext::background();

        assert!(store.claim_queued(1, &ctx).await.unwrap());
        assert!(!store.claim_queued(1, &ctx).await.unwrap());
    }

    #[tokio::test]
    async fn gap_resolves_by_primary_then_short_id() {
        let store = MemoryGapStore::new();
        let ctx = CallContext::background();
        store
            .seed(
                1,
                Gap {
                    id: 100,
                    short_id: 7,
                    question: "q".into(),
                    evidence: None,
                    severity: Severity::Medium,
                    respondent: Respondent::Reporter,
                    status: GapStatus::Open,
                    closed_reason: None,
                    closed_note: None,
                    resolved_at: None,
                },
            )
            .await;

        let by_primary = store
            .resolve_gap_id(1, &GapRef::parse("100").unwrap(), &ctx)
            .await
            .unwrap();
        assert_eq!(by_primary, Some(100));

        let by_short = store
            .resolve_gap_id(1, &GapRef::parse("gap 7").unwrap(), &ctx)
            .await
            .unwrap();
        assert_eq!(by_short, Some(100));

        let missing = store
            .resolve_gap_id(1, &GapRef::parse("999").unwrap(), &ctx)
            .await
            .unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn learning_propose_is_idempotent() {
        let store = MemoryLearningStore::new();
        let ctx = CallContext::background();
        let new = NewLearning {
            workspace: "1".into(),
            learning_type: engage_types::LearningType::CodeLearnings,
            content: "uses sqlx".into(),
        };
        let id1 = store.propose(new.clone(), &ctx).await.unwrap();
        let id2 = store.propose(new, &ctx).await.unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.get_many(&[id1], &ctx).await.unwrap().len(), 1);
    }
}
