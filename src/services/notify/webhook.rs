use anyhow::Context;
use async_trait::async_trait;

use super::Notifier;
use crate::models::Appointment;

pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deadline_expired(&self, appointment: &Appointment) -> anyhow::Result<()> {
        let payload = serde_json::json!({
            "event": "caregiver_response_expired",
            "appointmentId": appointment.id,
            "bookingCode": appointment.booking_code,
            "caregiverId": appointment.caregiver_id,
            "deadline": appointment.caregiver_response_deadline,
        });

        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("failed to send expiry webhook")?
            .error_for_status()
            .context("expiry webhook returned error")?;

        Ok(())
    }
}
