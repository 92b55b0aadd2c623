//! Pull-request webhook analysis.
//!
//! Accepts a GitHub-style payload, asks the Architect about the change,
//! and records the answer in the event log. No document is ingested: the
//! request relies on whatever cache an earlier `/analyze` created, and
//! otherwise goes inline with an empty document.

use serde_json::Value;
use tracing::info;

use contextmesh_analysis::CacheCoordinator;

use crate::events::{Event, EventDetails, EventKind, EventLog};

pub const WEBHOOK_INSTRUCTION: &str = "You are The Architect. Analyze this PR.";

/// The fields of a webhook payload the analysis uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub action: String,
    pub title: String,
    pub user: String,
    pub diff: String,
}

impl WebhookEvent {
    /// Extract an event from a raw payload. Missing fields get defaults.
    ///
    /// The diff is the top-level `diff` string when present, otherwise a
    /// description built from the pull request's title and body.
    pub fn from_payload(payload: &Value) -> Self {
        let action = str_field(payload, "action").unwrap_or("unknown").to_string();

        let pr = payload
            .get("pull_request")
            .and_then(Value::as_object)
            .filter(|pr| !pr.is_empty());

        let title = pr
            .and_then(|pr| pr.get("title"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown PR")
            .to_string();

        let user = pr
            .and_then(|pr| pr.get("user"))
            .and_then(|u| str_field(u, "login"))
            .unwrap_or("unknown_user")
            .to_string();

        let diff = match (str_field(payload, "diff").unwrap_or_default(), pr) {
            ("", Some(pr)) => {
                let body = pr.get("body").and_then(Value::as_str).unwrap_or_default();
                format!("PR Title: {title}\nDescription: {body}")
            }
            (diff, _) => diff.to_string(),
        };

        Self {
            action,
            title,
            user,
            diff,
        }
    }

    /// The question sent to the backend.
    pub fn analysis_prompt(&self) -> String {
        format!(
            "A new Pull Request has been opened/updated:\n\
             Title: {}\n\
             Author: {}\n\
             \n\
             Diff/Context:\n\
             {}\n\
             \n\
             Analyze the potential architectural impact of these changes.\n\
             Do they introduce new dependencies?\n\
             Do they follow existing patterns?\n",
            self.title, self.user, self.diff
        )
    }

    fn details(&self) -> EventDetails {
        EventDetails {
            title: self.title.clone(),
            user: self.user.clone(),
            action: self.action.clone(),
        }
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Analyze a webhook payload and record the result.
pub async fn process(payload: &Value, coordinator: &CacheCoordinator, events: &EventLog) -> Event {
    let event = WebhookEvent::from_payload(payload);
    info!(
        action = %event.action,
        title = %event.title,
        user = %event.user,
        "Processing webhook"
    );

    let analysis = coordinator
        .analyze("", &event.analysis_prompt(), WEBHOOK_INSTRUCTION)
        .await;

    events
        .record(EventKind::WebhookPr, event.details(), analysis)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn extracts_pull_request_fields() {
        let payload = json!({
            "action": "opened",
            "pull_request": {
                "title": "Add caching",
                "body": "Caches the codebase.",
                "user": {"login": "octocat"}
            }
        });

        let event = WebhookEvent::from_payload(&payload);
        assert_eq!(event.action, "opened");
        assert_eq!(event.title, "Add caching");
        assert_eq!(event.user, "octocat");
        assert_eq!(event.diff, "PR Title: Add caching\nDescription: Caches the codebase.");
    }

    #[test]
    fn explicit_diff_wins() {
        let payload = json!({
            "action": "synchronize",
            "pull_request": {"title": "Fix", "user": {"login": "dev"}},
            "diff": "- old\n+ new"
        });
        assert_eq!(WebhookEvent::from_payload(&payload).diff, "- old\n+ new");
    }

    #[test]
    fn empty_payload_uses_defaults() {
        let event = WebhookEvent::from_payload(&json!({}));
        assert_eq!(
            event,
            WebhookEvent {
                action: "unknown".into(),
                title: "Unknown PR".into(),
                user: "unknown_user".into(),
                diff: String::new(),
            }
        );
    }

    #[test]
    fn null_body_becomes_empty_description() {
        let payload = json!({"pull_request": {"title": "T", "body": null}});
        assert_eq!(
            WebhookEvent::from_payload(&payload).diff,
            "PR Title: T\nDescription: "
        );
    }

    #[test]
    fn prompt_mentions_title_author_and_diff() {
        let event = WebhookEvent {
            action: "opened".into(),
            title: "Add caching".into(),
            user: "octocat".into(),
            diff: "+ cache()".into(),
        };
        let prompt = event.analysis_prompt();
        assert!(prompt.starts_with("A new Pull Request has been opened/updated:\nTitle: Add caching\nAuthor: octocat\n"));
        assert!(prompt.contains("Diff/Context:\n+ cache()\n"));
        assert!(prompt.contains("Do they introduce new dependencies?"));
    }

    #[tokio::test]
    async fn process_records_event() {
        let coordinator = CacheCoordinator::new(None, "gemini-1.5-flash-001", Duration::from_secs(60));
        let events = EventLog::default();

        let event = process(
            &json!({"action": "opened", "pull_request": {"title": "X", "user": {"login": "u"}}}),
            &coordinator,
            &events,
        )
        .await;

        assert_eq!(event.id, 1);
        assert_eq!(event.details.title, "X");
        // No backend and no JSON marker in the instruction.
        assert_eq!(event.analysis, "Error: GOOGLE_API_KEY not set.");
        assert_eq!(events.len().await, 1);
    }
}
