//! Schedule notification emails and the Resend delivery transport.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::Schedule;
use crate::ports::{MailReceipt, MailTransport, OutgoingMail, PortError};
use crate::retry::RetryPolicy;
use crate::service::ScheduleResponse;

const RESEND_URL: &str = "https://api.resend.com/emails";

/// Sends resolved schedules to users by email.
pub struct Notifier {
    transport: Arc<dyn MailTransport>,
    retry: RetryPolicy,
}

impl Notifier {
    /// Create a notifier over the given transport.
    #[must_use]
    pub fn new(transport: Arc<dyn MailTransport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Email `response` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::InvalidInput`] for a blank recipient, [`PortError::NoSchedule`]
    /// when there is nothing to send, and transport errors otherwise.
    pub async fn send_schedule(
        &self,
        to: &str,
        response: &ScheduleResponse,
    ) -> Result<MailReceipt, PortError> {
        let recipient = to.trim();
        if recipient.is_empty() {
            return Err(PortError::InvalidInput("email is required".to_owned()));
        }
        if response.schedule.is_empty() {
            return Err(PortError::NoSchedule);
        }

        let mail = render_schedule_email(recipient, response);
        let transport = &self.transport;
        let mail_ref = &mail;
        let receipt = self
            .retry
            .run("send schedule email", || async move {
                transport.send(mail_ref).await
            })
            .await?;
        info!(id = ?receipt.id, "schedule email sent");
        Ok(receipt)
    }
}

/// Render the notification for a resolved schedule.
#[must_use]
pub fn render_schedule_email(to: &str, response: &ScheduleResponse) -> OutgoingMail {
    let address = escape_html(&response.address);
    let location = format!(
        "{}, {}",
        escape_html(response.city.as_deref().unwrap_or("Unknown")),
        escape_html(response.state.as_deref().unwrap_or("Unknown"))
    );

    let mut parts = vec![
        "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">".to_owned(),
        format!(
            "<h2>Waste Collection Schedule</h2><p><strong>Address:</strong> {address}</p><p><strong>Location:</strong> {location}</p>"
        ),
    ];
    match &response.schedule {
        Schedule::Events(events) if events.is_empty() => {
            parts.push("<p>No upcoming collection dates found.</p>".to_owned());
        }
        Schedule::Events(events) => {
            parts.push("<h3>Upcoming Collections:</h3>".to_owned());
            parts.extend(events.iter().map(|event| {
                format!(
                    "<div style=\"padding: 12px; margin: 8px 0; background: #f5f5f5; border-radius: 6px;\"><strong>{}</strong> - {}</div>",
                    event.date.format("%Y-%m-%d"),
                    escape_html(&event.kind)
                )
            }));
            parts.push("<p>Please place bins out by 6 AM on collection day.</p>".to_owned());
        }
        Schedule::ReferenceLink(url) => {
            let url = escape_html(url);
            parts.push(format!(
                "<p>Your collection schedule can be found here: <a href=\"{url}\">{url}</a></p>"
            ));
        }
    }
    parts.push("</div>".to_owned());

    OutgoingMail {
        to: to.to_owned(),
        subject: format!("Waste Collection Schedule for {}", response.address),
        html: parts.concat(),
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[derive(Debug, Serialize)]
struct ResendRequest<'mail> {
    from: &'mail str,
    to: &'mail str,
    subject: &'mail str,
    html: &'mail str,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    #[serde(default)]
    id: Option<String>,
}

/// [`MailTransport`] backed by the Resend HTTP API.
pub struct ResendTransport {
    client: Client,
    api_key: String,
    from: String,
}

impl ResendTransport {
    /// Create a transport bound to the given HTTP client and credentials.
    #[must_use]
    pub fn new(client: Client, api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl MailTransport for ResendTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<MailReceipt, PortError> {
        let response = self
            .client
            .post(RESEND_URL)
            .bearer_auth(&self.api_key)
            .json(&ResendRequest {
                from: &self.from,
                to: &mail.to,
                subject: &mail.subject,
                html: &mail.html,
            })
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
        ) {
            return Err(PortError::RateLimited);
        }

        let body: ResendResponse = response.error_for_status()?.json().await?;
        Ok(MailReceipt { id: body.id })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::NaiveDate;

    use super::*;
    use crate::model::CollectionEvent;

    struct FlakyTransport {
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl MailTransport for FlakyTransport {
        async fn send(&self, mail: &OutgoingMail) -> Result<MailReceipt, PortError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(PortError::RateLimited);
            }
            Ok(MailReceipt {
                id: Some(format!("sent-to-{}", mail.to)),
            })
        }
    }

    fn events_response() -> ScheduleResponse {
        ScheduleResponse {
            address: "200 E Santa Clara St".to_owned(),
            schedule: Schedule::Events(vec![CollectionEvent {
                date: NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date"),
                kind: "Garbage, Recycling".to_owned(),
            }]),
            city: Some("San Jose".to_owned()),
            state: Some("CA".to_owned()),
        }
    }

    #[test]
    fn renders_events_and_escapes_text() {
        let mut response = events_response();
        response.address = "1 <Main> St".to_owned();
        let mail = render_schedule_email("a@example.org", &response);
        assert_eq!(mail.subject, "Waste Collection Schedule for 1 <Main> St");
        assert!(mail.html.contains("1 &lt;Main&gt; St"));
        assert!(mail.html.contains("<strong>2025-03-14</strong> - Garbage, Recycling"));
        assert!(mail.html.contains("San Jose, CA"));
    }

    #[test]
    fn renders_reference_links() {
        let mut response = events_response();
        response.schedule = Schedule::ReferenceLink("https://example.org/cal?a=1&b=2".to_owned());
        let mail = render_schedule_email("a@example.org", &response);
        assert!(mail.html.contains("href=\"https://example.org/cal?a=1&amp;b=2\""));
    }

    #[test]
    fn renders_every_section_in_order() {
        let mut response = events_response();
        let full = render_schedule_email("a@example.org", &response).html;
        assert!(full.starts_with("<div style="));
        assert!(full.ends_with("</div>"));
        let heading = full.find("<h3>Upcoming Collections:</h3>").expect("heading");
        let event = full.find("<strong>2025-03-14</strong>").expect("event");
        let reminder = full.find("Please place bins out").expect("reminder");
        assert!(heading < event && event < reminder);

        response.schedule = Schedule::Events(Vec::new());
        let empty = render_schedule_email("a@example.org", &response).html;
        assert!(empty.contains("<p>No upcoming collection dates found.</p>"));
        assert!(!empty.contains("Upcoming Collections"));
    }

    #[tokio::test]
    async fn retries_rate_limited_sends() {
        let notifier = Notifier::new(
            Arc::new(FlakyTransport {
                failures_left: AtomicU32::new(2),
            }),
            RetryPolicy::immediate(3),
        );
        let receipt = notifier
            .send_schedule("a@example.org", &events_response())
            .await
            .expect("sent on third attempt");
        assert_eq!(receipt.id.as_deref(), Some("sent-to-a@example.org"));
    }

    #[tokio::test]
    async fn rejects_blank_recipient_and_empty_schedule() {
        let notifier = Notifier::new(
            Arc::new(FlakyTransport {
                failures_left: AtomicU32::new(0),
            }),
            RetryPolicy::immediate(1),
        );
        assert!(matches!(
            notifier.send_schedule("  ", &events_response()).await,
            Err(PortError::InvalidInput(_))
        ));

        let mut empty = events_response();
        empty.schedule = Schedule::Events(Vec::new());
        assert!(matches!(
            notifier.send_schedule("a@example.org", &empty).await,
            Err(PortError::NoSchedule)
        ));
    }
}
