pub mod webhook;

use async_trait::async_trait;

use crate::models::Appointment;

/// Outbound signal for appointments whose caregiver response window closed
/// locally. Delivery is best effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deadline_expired(&self, appointment: &Appointment) -> anyhow::Result<()>;
}

/// Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deadline_expired(&self, appointment: &Appointment) -> anyhow::Result<()> {
        tracing::info!(
            appointment_id = %appointment.id,
            booking_code = %appointment.booking_code,
            caregiver_id = %appointment.caregiver_id,
            "caregiver did not respond before the deadline"
        );
        Ok(())
    }
}
