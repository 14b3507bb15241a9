use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use refback_common::{RefbackError, RefbackSignal};

use crate::events::{RefbackEvent, RefbackNotifier};
use crate::normalize::normalize_url;

/// Everything but hex digits, separators and spaces is stripped from a
/// client address. Covers IPv4, IPv6 and comma-joined proxy chains while
/// discarding header junk.
static DISALLOWED_IP_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9a-fA-F:., ]").unwrap());

/// What the serving layer knows about one inbound page view.
#[derive(Debug, Clone)]
pub struct PageView {
    /// Canonical URL of the page being served.
    pub url: String,
    pub referer: Option<String>,
    pub client_ip: String,
    pub user_agent: String,
}

/// Request-time half of the pipeline. Owns the queue sender; `accept` is
/// synchronous and O(1) so it can sit directly on the page-serving path.
pub struct RefbackReceiver {
    signal_tx: mpsc::Sender<RefbackSignal>,
    notifier: Arc<dyn RefbackNotifier>,
    force_ssl: bool,
}

impl RefbackReceiver {
    pub fn new(
        signal_tx: mpsc::Sender<RefbackSignal>,
        notifier: Arc<dyn RefbackNotifier>,
        force_ssl: bool,
    ) -> Self {
        Self {
            signal_tx,
            notifier,
            force_ssl,
        }
    }

    /// Inspect one page view and queue a refback signal if it carries a
    /// qualifying referer. Never blocks and never surfaces an error; page
    /// serving continues identically whatever happens here.
    pub fn accept(&self, view: PageView) {
        // Ordinary direct traffic. Not an event, not even worth a log line.
        let Some(referer) = view.referer.as_deref() else {
            return;
        };

        let source = match normalize_url(referer, self.force_ssl) {
            Ok(url) => url,
            Err(e) => return self.reject(referer, &view.url, &e),
        };
        let target = match normalize_url(&view.url, self.force_ssl) {
            Ok(url) => url,
            Err(e) => return self.reject(referer, &view.url, &e),
        };

        if source.host_str() == target.host_str() {
            return self.reject(source.as_str(), target.as_str(), &RefbackError::SelfReferral);
        }

        let signal = RefbackSignal {
            source_url: source.to_string(),
            target_url: target.to_string(),
            received_at: Utc::now(),
            client_ip: sanitize_client_ip(&view.client_ip),
            user_agent: view.user_agent,
        };

        match self.signal_tx.try_send(signal) {
            Ok(()) => {
                self.notifier.notify(RefbackEvent::SignalAccepted {
                    source_url: source.into(),
                    target_url: target.into(),
                });
            }
            Err(TrySendError::Full(signal)) => {
                // Drop rather than block: the page response comes first.
                warn!(source_url = %signal.source_url, "Refback queue full, dropping signal");
                self.notifier.notify(RefbackEvent::SignalRejected {
                    source_url: signal.source_url,
                    target_url: signal.target_url,
                    reason: "deferred queue full".to_string(),
                });
            }
            Err(TrySendError::Closed(signal)) => {
                warn!(source_url = %signal.source_url, "Refback worker gone, dropping signal");
            }
        }
    }

    fn reject(&self, source_url: &str, target_url: &str, error: &RefbackError) {
        debug!(source_url, target_url, error = %error, "Refback signal rejected at capture");
        self.notifier.notify(RefbackEvent::SignalRejected {
            source_url: source_url.to_string(),
            target_url: target_url.to_string(),
            reason: error.to_string(),
        });
    }
}

/// Strip everything but address characters from a remote IP. Captured
/// values may come from spoofable forwarding headers, so they are treated
/// as hostile text.
pub fn sanitize_client_ip(raw: &str) -> String {
    DISALLOWED_IP_CHARS.replace_all(raw, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CollectingNotifier;

    fn receiver_with(
        capacity: usize,
        force_ssl: bool,
    ) -> (
        RefbackReceiver,
        mpsc::Receiver<RefbackSignal>,
        Arc<CollectingNotifier>,
    ) {
        let (tx, rx) = mpsc::channel(capacity);
        let notifier = Arc::new(CollectingNotifier::new());
        (
            RefbackReceiver::new(tx, notifier.clone(), force_ssl),
            rx,
            notifier,
        )
    }

    fn view(url: &str, referer: Option<&str>) -> PageView {
        PageView {
            url: url.to_string(),
            referer: referer.map(String::from),
            client_ip: "203.0.113.7".to_string(),
            user_agent: "test/1.0".to_string(),
        }
    }

    #[test]
    fn missing_referer_is_not_an_event() {
        let (receiver, mut rx, notifier) = receiver_with(4, false);
        receiver.accept(view("http://site.test/posts/a", None));

        assert!(rx.try_recv().is_err());
        assert!(notifier.events().is_empty());
    }

    #[test]
    fn same_host_referer_is_rejected_before_queueing() {
        let (receiver, mut rx, notifier) = receiver_with(4, false);
        receiver.accept(view(
            "http://site.test/posts/a",
            Some("http://site.test/posts/b"),
        ));

        assert!(rx.try_recv().is_err());
        let reasons = notifier.rejection_reasons();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("share a host"));
    }

    #[test]
    fn invalid_referer_is_rejected() {
        let (receiver, mut rx, notifier) = receiver_with(4, false);
        receiver.accept(view("http://site.test/posts/a", Some("ftp://blog.example/")));

        assert!(rx.try_recv().is_err());
        assert!(notifier.rejection_reasons()[0].contains("Invalid URL"));
    }

    #[test]
    fn qualifying_referer_queues_a_normalized_signal() {
        let (receiver, mut rx, notifier) = receiver_with(4, false);
        receiver.accept(view("http://site.test/posts/a", Some("blog.example")));

        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.source_url, "http://blog.example/");
        assert_eq!(signal.target_url, "http://site.test/posts/a");
        assert_eq!(signal.client_ip, "203.0.113.7");
        assert_eq!(notifier.events().len(), 1);
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (receiver, mut rx, notifier) = receiver_with(1, false);
        receiver.accept(view("http://site.test/posts/a", Some("http://one.example/")));
        receiver.accept(view("http://site.test/posts/a", Some("http://two.example/")));

        assert_eq!(rx.try_recv().unwrap().source_url, "http://one.example/");
        assert!(rx.try_recv().is_err());
        let reasons = notifier.rejection_reasons();
        assert_eq!(reasons, vec!["deferred queue full".to_string()]);
    }

    #[test]
    fn client_ip_is_reduced_to_address_characters() {
        assert_eq!(sanitize_client_ip("203.0.113.7"), "203.0.113.7");
        assert_eq!(
            sanitize_client_ip("2001:db8::1, 203.0.113.7"),
            "2001:db8::1, 203.0.113.7"
        );
        assert_eq!(sanitize_client_ip("{203.0.113.7};()"), "203.0.113.7");
        assert_eq!(sanitize_client_ip("::ffff:203.0.113.7"), "::ffff:203.0.113.7");
    }
}
