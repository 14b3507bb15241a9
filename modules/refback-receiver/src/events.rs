use serde::Serialize;
use tracing::{debug, info};

/// Lifecycle notifications mirroring the pipeline's observable outcomes.
/// Fire-and-forget: no notifier return value is ever consumed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RefbackEvent {
    /// A qualifying signal was captured and queued.
    SignalAccepted {
        source_url: String,
        target_url: String,
    },
    /// A signal stopped moving, at capture time or during deferred
    /// processing. `reason` is the display form of the abort.
    SignalRejected {
        source_url: String,
        target_url: String,
        reason: String,
    },
    CommentCreated {
        comment_id: u64,
        post_id: u64,
    },
    CommentUpdated {
        comment_id: u64,
        post_id: u64,
        visit_count: u64,
    },
}

/// Observer for pipeline events. Implementations must not block; they run
/// inline on the emitting path.
pub trait RefbackNotifier: Send + Sync {
    fn notify(&self, event: RefbackEvent);
}

/// Default notifier: structured log lines, nothing else.
pub struct LogNotifier;

impl RefbackNotifier for LogNotifier {
    fn notify(&self, event: RefbackEvent) {
        match event {
            RefbackEvent::SignalAccepted {
                source_url,
                target_url,
            } => {
                debug!(source_url, target_url, "Refback signal accepted");
            }
            RefbackEvent::SignalRejected {
                source_url,
                target_url,
                reason,
            } => {
                debug!(source_url, target_url, reason, "Refback signal rejected");
            }
            RefbackEvent::CommentCreated {
                comment_id,
                post_id,
            } => {
                info!(comment_id, post_id, "Refback comment created");
            }
            RefbackEvent::CommentUpdated {
                comment_id,
                post_id,
                visit_count,
            } => {
                info!(comment_id, post_id, visit_count, "Refback comment updated");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_a_type_tag() {
        let event = RefbackEvent::SignalRejected {
            source_url: "http://a.test/".to_string(),
            target_url: "http://b.test/post".to_string(),
            reason: "Source page does not link to the target".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "signal_rejected");
        assert_eq!(json["source_url"], "http://a.test/");

        let event = RefbackEvent::CommentUpdated {
            comment_id: 4,
            post_id: 9,
            visit_count: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "comment_updated");
        assert_eq!(json["visit_count"], 2);
    }
}
