#![deny(missing_docs)]
//! Assembles the LLM message thread handed to the planner driver.
//!
//! Builds a system message (bot identity), one structured "context dump"
//! user message, and then maps every prior discussion to an
//! assistant/user turn — grounded in the teacher's `neuron-turn::convert`
//! layer0-to-provider-message mapping, generalized here from a single
//! content conversion into a full context-dump renderer plus
//! thread-to-message mapping.

use std::collections::HashMap;

use engage_types::{Discussion, Gap, GapStatus, Issue, Learning, Message, Severity, SpecStatus};

/// Hint that this planner turn was triggered by a reply within a specific
/// thread, so the context dump can call it out explicitly.
#[derive(Debug, Clone)]
pub struct ReplyHint {
    /// The thread/discussion ID the triggering event replied within.
    pub thread_id: String,
}

/// Everything the context builder needs beyond the issue itself.
#[derive(Debug, Clone, Default)]
pub struct ContextInput {
    /// Workspace-scoped learnings to surface.
    pub learnings: Vec<Learning>,
    /// This issue's currently-`open` gaps.
    pub open_gaps: Vec<Gap>,
    /// This issue's currently-`pending` gaps.
    pub pending_gaps: Vec<Gap>,
    /// This issue's most-recently-closed gaps (already capped upstream,
    /// e.g. to the latest 10 by the caller).
    pub recently_closed_gaps: Vec<Gap>,
    /// A reply-thread hint, if this cycle was triggered by a reply.
    pub reply_hint: Option<ReplyHint>,
}

/// Sanitize a human display name for use as an LLM message `name` field:
/// strip characters invalid in downstream provider APIs (most providers
/// restrict `name` to `[A-Za-z0-9_-]`).
pub fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "user".to_string()
    } else {
        cleaned
    }
}

fn severity_order() -> [Severity; 4] {
    [Severity::Blocking, Severity::High, Severity::Medium, Severity::Low]
}

fn render_gaps_by_severity(heading: &str, gaps: &[Gap], trailer: Option<&str>) -> String {
    let mut out = format!("## {heading}\n");
    if gaps.is_empty() {
        out.push_str("(none)\n");
        return out;
    }
    for severity in severity_order() {
        let bucket: Vec<&Gap> = gaps.iter().filter(|g| g.severity == severity).collect();
        if bucket.is_empty() {
            continue;
        }
        out.push_str(&format!("### {severity}\n"));
        for gap in bucket {
            out.push_str(&format!(
                "- [gap {short}] {question} (respondent: {respondent:?})\n",
                short = gap.short_id,
                question = gap.question,
                respondent = gap.respondent,
            ));
        }
    }
    if let Some(trailer) = trailer {
        out.push_str(trailer);
        out.push('\n');
    }
    out
}

fn render_closed_gaps(gaps: &[Gap]) -> String {
    let mut out = String::from("## Recently Closed Gaps\n");
    if gaps.is_empty() {
        out.push_str("(none)\n");
        return out;
    }
    for gap in gaps {
        let status = match gap.status {
            GapStatus::Resolved => "resolved",
            GapStatus::Skipped => "skipped",
            GapStatus::Open | GapStatus::Pending => "open",
        };
        let reason = gap
            .closed_reason
            .map(|r| format!("{r:?}"))
            .unwrap_or_else(|| "-".into());
        let note = gap.closed_note.as_deref().unwrap_or("-");
        let closed_at = gap
            .resolved_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".into());
        out.push_str(&format!(
            "- [gap {short}] {question} — status: {status}, reason: {reason}, note: {note}, closed_at: {closed_at}\n",
            short = gap.short_id,
            question = gap.question,
        ));
    }
    out
}

fn render_context_dump(issue: &Issue, input: &ContextInput) -> String {
    let mut out = String::new();

    out.push_str(&format!("# Issue: {}\n\n", issue.title));
    out.push_str(&format!("{}\n\n", issue.description));

    out.push_str("## Participants\n");
    out.push_str(&format!(
        "- Reporter: @{}\n",
        issue.reporter.username
    ));
    for a in &issue.assignees {
        out.push_str(&format!("- Assignee: @{}\n", a.username));
    }
    for m in &issue.members {
        out.push_str(&format!("- Member: @{}\n", m.username));
    }
    out.push('\n');

    out.push_str("## Workspace Learnings\n");
    if input.learnings.is_empty() {
        out.push_str("(none)\n");
    } else {
        for l in &input.learnings {
            out.push_str(&format!("- [{:?}] {}\n", l.learning_type, l.content));
        }
    }
    out.push('\n');

    out.push_str(&render_gaps_by_severity("Open Gaps", &input.open_gaps, None));
    out.push('\n');

    out.push_str(&render_gaps_by_severity(
        "Pending Gaps",
        &input.pending_gaps,
        Some("(pending gaps are not yet asked; use the `ask` action to promote one to open)"),
    ));
    out.push('\n');

    out.push_str(&render_closed_gaps(&input.recently_closed_gaps));
    out.push('\n');

    out.push_str("## Code Findings\n");
    if issue.code_findings.is_empty() {
        out.push_str("(none)\n");
    } else {
        for finding in &issue.code_findings {
            let locations: Vec<&str> = finding.sources.iter().map(|s| s.location.as_str()).collect();
            out.push_str(&format!(
                "- [{}] {}\n",
                locations.join(", "),
                finding.synthesis
            ));
        }
    }
    out.push('\n');

    if let Some(spec) = &issue.spec {
        out.push_str("## Current Spec\n");
        let status = match issue.spec_status {
            Some(SpecStatus::Approved) => "approved",
            Some(SpecStatus::Rejected) => "rejected",
            None => "pending review",
        };
        out.push_str(&format!("Review status: {status}\n\n{spec}\n\n"));
    }

    if let Some(hint) = &input.reply_hint {
        out.push_str("## Reply Context\n");
        out.push_str(&format!(
            "This cycle was triggered by a reply within thread `{}`.\n",
            hint.thread_id
        ));
    }

    out
}

/// The author of the earliest discussion in each thread, used to prefix
/// later replies within that thread.
fn thread_root_authors(discussions: &[Discussion]) -> HashMap<String, (chrono::DateTime<chrono::Utc>, String)> {
    let mut roots: HashMap<String, (chrono::DateTime<chrono::Utc>, String)> = HashMap::new();
    for d in discussions {
        let Some(thread_id) = &d.thread_id else {
            continue;
        };
        roots
            .entry(thread_id.clone())
            .and_modify(|(ts, author)| {
                if d.created_at < *ts {
                    *ts = d.created_at;
                    *author = d.author_username.clone();
                }
            })
            .or_insert((d.created_at, d.author_username.clone()));
    }
    roots
}

/// Build the full message thread for one planner turn.
///
/// `bot_username` establishes the bot's identity in the system message.
/// Discussions are sorted oldest-first and truncated to the newest
/// `max_discussions`; within a thread, every message after the earliest
/// one is prefixed `"(replying to @<root_author>) "`.
pub fn build_planner_messages(
    bot_username: &str,
    issue: &Issue,
    input: &ContextInput,
    max_discussions: usize,
) -> Vec<Message> {
    let mut messages = Vec::new();
    messages.push(Message::system(format!(
        "You are @{bot_username}, an autonomous issue-engagement bot. Explore the \
         repository, ask clarifying questions of the right human, record durable \
         knowledge, and produce an implementation spec when the gaps are closed."
    )));

    messages.push(Message::user(render_context_dump(issue, input), None));

    let mut sorted: Vec<&Discussion> = issue.discussions.iter().collect();
    sorted.sort_by_key(|d| d.created_at);
    let roots = thread_root_authors(&issue.discussions);

    let start = sorted.len().saturating_sub(max_discussions);
    for d in &sorted[start..] {
        let mut content = d.body.clone();
        if let Some(thread_id) = &d.thread_id {
            if let Some((root_ts, root_author)) = roots.get(thread_id) {
                if d.created_at > *root_ts {
                    content = format!("(replying to @{root_author}) {content}");
                }
            }
        }
        if d.authored_by_bot {
            messages.push(Message::assistant(content));
        } else {
            messages.push(Message::user(content, Some(sanitize_name(&d.author_username))));
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use engage_types::{CloseReason, Participant, Respondent, TrackerProvider};

    fn bare_issue() -> Issue {
        Issue {
            id: 1,
            integration_id: 1,
            external_issue_id: "1".into(),
            state: engage_types::IssueState::Idle,
            title: "Flaky upload".into(),
            description: "Uploads time out intermittently.".into(),
            reporter: Participant { user_id: "u1".into(), username: "alice".into() },
            assignees: vec![Participant { user_id: "u2".into(), username: "bob".into() }],
            members: vec![],
            discussions: vec![],
            code_findings: vec![],
            spec: None,
            spec_status: None,
            provider: TrackerProvider::GitHub,
        }
    }

    fn gap(short_id: i64, severity: Severity, status: GapStatus) -> Gap {
        Gap {
            id: short_id,
            short_id,
            question: format!("q{short_id}"),
            evidence: None,
            severity,
            respondent: Respondent::Reporter,
            status,
            closed_reason: None,
            closed_note: None,
            resolved_at: None,
        }
    }

    #[test]
    fn system_message_carries_bot_identity() {
        let issue = bare_issue();
        let input = ContextInput::default();
        let messages = build_planner_messages("shipit-bot", &issue, &input, 100);
        assert!(messages[0].content.contains("@shipit-bot"));
    }

    #[test]
    fn context_dump_groups_gaps_by_severity() {
        let issue = bare_issue();
        let mut input = ContextInput::default();
        input.open_gaps = vec![
            gap(1, Severity::Low, GapStatus::Open),
            gap(2, Severity::Blocking, GapStatus::Open),
        ];
        let messages = build_planner_messages("bot", &issue, &input, 100);
        let dump = &messages[1].content;
        let blocking_idx = dump.find("### blocking").unwrap();
        let low_idx = dump.find("### low").unwrap();
        assert!(blocking_idx < low_idx);
    }

    #[test]
    fn discussions_truncated_to_newest_n() {
        let mut issue = bare_issue();
        for i in 0..150 {
            issue.discussions.push(Discussion {
                id: i,
                author_user_id: "u1".into(),
                author_username: "alice".into(),
                authored_by_bot: false,
                body: format!("msg {i}"),
                thread_id: None,
                created_at: chrono::Utc::now() + chrono::Duration::seconds(i),
            });
        }
        let input = ContextInput::default();
        let messages = build_planner_messages("bot", &issue, &input, 100);
        // 2 header messages + 100 discussions
        assert_eq!(messages.len(), 102);
        assert!(messages.last().unwrap().content.contains("msg 149"));
        assert!(!messages.iter().any(|m| m.content.contains("msg 49")));
    }

    #[test]
    fn thread_replies_prefixed_with_root_author() {
        let mut issue = bare_issue();
        let t0 = chrono::Utc::now();
        issue.discussions.push(Discussion {
            id: 1,
            author_user_id: "u1".into(),
            author_username: "alice".into(),
            authored_by_bot: false,
            body: "What's the SLA?".into(),
            thread_id: Some("t-1".into()),
            created_at: t0,
        });
        issue.discussions.push(Discussion {
            id: 2,
            author_user_id: "u2".into(),
            author_username: "bob".into(),
            authored_by_bot: false,
            body: "99.9%".into(),
            thread_id: Some("t-1".into()),
            created_at: t0 + chrono::Duration::seconds(1),
        });
        let input = ContextInput::default();
        let messages = build_planner_messages("bot", &issue, &input, 100);
        let reply = messages.last().unwrap();
        assert!(reply.content.starts_with("(replying to @alice)"));
    }

    #[test]
    fn bot_authored_discussion_maps_to_assistant_role() {
        let mut issue = bare_issue();
        issue.discussions.push(Discussion {
            id: 1,
            author_user_id: "bot1".into(),
            author_username: "shipit-bot".into(),
            authored_by_bot: true,
            body: "Got it.".into(),
            thread_id: None,
            created_at: chrono::Utc::now(),
        });
        let input = ContextInput::default();
        let messages = build_planner_messages("shipit-bot", &issue, &input, 100);
        assert_eq!(messages.last().unwrap().role, engage_types::Role::Assistant);
    }

    #[test]
    fn name_sanitization_strips_invalid_chars() {
        assert_eq!(sanitize_name("bob the builder!"), "bob_the_builder_");
        assert_eq!(sanitize_name(""), "user");
    }

    #[test]
    fn closed_gaps_render_reason_and_note() {
        let mut g = gap(3, Severity::Medium, GapStatus::Resolved);
        g.closed_reason = Some(CloseReason::Answered);
        g.closed_note = Some("99.9%".into());
        g.resolved_at = Some(chrono::Utc::now());
        let rendered = render_closed_gaps(&[g]);
        assert!(rendered.contains("resolved"));
        assert!(rendered.contains("99.9%"));
    }
}
