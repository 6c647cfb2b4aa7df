//! Push notification fan-out.
//!
//! Delivers alert messages to mobile-app end users through an external push
//! relay. The relay is a collaborator, not part of this service's
//! durability guarantees: the service fires a notification *after* alert
//! persistence and a delivery failure is logged and swallowed — it must
//! never roll back or block an alert write.

use std::time::Duration;

use serde_json::json;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum NotifyError {
    /// The relay could not be constructed or reached.
    Transport(String),
    /// Non-2xx response from the relay.
    Http(u16),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Transport(msg) => write!(f, "push transport error: {}", msg),
            NotifyError::Http(code) => write!(f, "push relay returned HTTP {}", code),
        }
    }
}

impl std::error::Error for NotifyError {}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Client for the push relay. One instance per service, reused across
/// deliveries.
pub struct Notifier {
    client: reqwest::blocking::Client,
    push_url: String,
}

impl Notifier {
    /// Build a notifier with a short request timeout — delivery must fail
    /// fast rather than hold up whoever triggered the evaluation.
    pub fn new(push_url: String, timeout: Duration) -> Result<Notifier, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Notifier { client, push_url })
    }

    /// Deliver `message` to the given recipients. An empty recipient list
    /// is a successful no-op.
    pub fn send_alert(&self, recipient_ids: &[String], message: &str) -> Result<(), NotifyError> {
        if recipient_ids.is_empty() {
            return Ok(());
        }

        let body = json!({
            "recipients": recipient_ids,
            "message": message,
        });

        let response = self
            .client
            .post(&self.push_url)
            .json(&body)
            .send()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Http(response.status().as_u16()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_recipient_list_is_a_no_op() {
        // Unroutable URL on purpose: with no recipients the notifier must
        // return before touching the network.
        let notifier = Notifier::new(
            "http://127.0.0.1:1/push".to_string(),
            Duration::from_millis(100),
        )
        .unwrap();
        assert!(notifier.send_alert(&[], "Danger: High Water Level!").is_ok());
    }

    #[test]
    fn test_unreachable_relay_is_a_transport_error() {
        let notifier = Notifier::new(
            "http://127.0.0.1:1/push".to_string(),
            Duration::from_millis(100),
        )
        .unwrap();
        let err = notifier
            .send_alert(&["device-a".to_string()], "Danger: High Water Level!")
            .unwrap_err();
        assert!(matches!(err, NotifyError::Transport(_)));
    }
}
