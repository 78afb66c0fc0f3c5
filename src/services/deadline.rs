use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::models::AppointmentStatus;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Whole minutes left until `deadline`, floored and never negative.
pub fn remaining_minutes(deadline: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let seconds = (deadline - now).num_seconds();
    if seconds <= 0 {
        0
    } else {
        (seconds / 60) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeadlineSnapshot {
    pub deadline: DateTime<Utc>,
    pub remaining_minutes: u64,
    pub expired: bool,
}

impl DeadlineSnapshot {
    pub fn at(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining_minutes = remaining_minutes(deadline, now);
        Self {
            deadline,
            remaining_minutes,
            expired: remaining_minutes == 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineTick {
    Remaining(u64),
    Expired,
    Idle,
}

/// Countdown for one response deadline. Reports `Expired` exactly once and
/// `Idle` afterwards, or whenever the appointment is no longer pending.
#[derive(Debug, Clone)]
pub struct DeadlineMonitor {
    deadline: DateTime<Utc>,
    fired: bool,
}

impl DeadlineMonitor {
    pub fn new(deadline: DateTime<Utc>) -> Self {
        Self {
            deadline,
            fired: false,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn tick(&mut self, status: AppointmentStatus, now: DateTime<Utc>) -> DeadlineTick {
        if self.fired || status != AppointmentStatus::PendingCaregiver {
            return DeadlineTick::Idle;
        }
        match remaining_minutes(self.deadline, now) {
            0 => {
                self.fired = true;
                DeadlineTick::Expired
            }
            n => DeadlineTick::Remaining(n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadlineEvent {
    pub appointment_id: String,
    pub remaining_minutes: u64,
    pub expired: bool,
    pub at: DateTime<Utc>,
}

/// Owns a running countdown task. Stopping or dropping the handle aborts the
/// task, so no tick runs after release.
#[derive(Debug)]
pub struct DeadlineHandle {
    appointment_id: String,
    deadline: DateTime<Utc>,
    task: JoinHandle<()>,
}

impl DeadlineHandle {
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for DeadlineHandle {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            tracing::debug!(appointment_id = %self.appointment_id, "stopping deadline monitor");
        }
        self.task.abort();
    }
}

/// Starts counting down to `deadline`, publishing one event immediately and
/// one per `period`. The task ends on its own after the expiry event.
pub fn spawn_monitor(
    appointment_id: String,
    deadline: DateTime<Utc>,
    clock: Arc<dyn Clock>,
    period: Duration,
    sink: broadcast::Sender<DeadlineEvent>,
) -> DeadlineHandle {
    let id = appointment_id.clone();
    let task = tokio::spawn(async move {
        let mut monitor = DeadlineMonitor::new(deadline);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let now = clock.now();
            let (remaining_minutes, expired) =
                match monitor.tick(AppointmentStatus::PendingCaregiver, now) {
                    DeadlineTick::Remaining(n) => (n, false),
                    DeadlineTick::Expired => (0, true),
                    DeadlineTick::Idle => break,
                };

            if expired {
                tracing::info!(appointment_id = %id, "caregiver response deadline elapsed");
            }
            // No subscribers is fine; the countdown is still tracked.
            let _ = sink.send(DeadlineEvent {
                appointment_id: id.clone(),
                remaining_minutes,
                expired,
                at: now,
            });
            if expired {
                break;
            }
        }
    });

    tracing::debug!(%appointment_id, %deadline, "deadline monitor started");
    DeadlineHandle {
        appointment_id,
        deadline,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tokio::sync::broadcast::error::TryRecvError;

    /// Wall clock that follows tokio's (pausable) time.
    struct TokioClock {
        origin: DateTime<Utc>,
        started: tokio::time::Instant,
    }

    impl TokioClock {
        fn new(origin: DateTime<Utc>) -> Self {
            Self {
                origin,
                started: tokio::time::Instant::now(),
            }
        }
    }

    impl Clock for TokioClock {
        fn now(&self) -> DateTime<Utc> {
            let elapsed = ChronoDuration::from_std(self.started.elapsed())
                .unwrap_or_else(|_| ChronoDuration::zero());
            self.origin + elapsed
        }
    }

    fn origin() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-02-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_remaining_minutes_floors_and_clamps() {
        let now = origin();
        assert_eq!(remaining_minutes(now + ChronoDuration::seconds(299), now), 4);
        assert_eq!(remaining_minutes(now + ChronoDuration::minutes(5), now), 5);
        assert_eq!(remaining_minutes(now + ChronoDuration::seconds(59), now), 0);
        assert_eq!(remaining_minutes(now - ChronoDuration::hours(1), now), 0);
    }

    #[test]
    fn test_remaining_is_non_increasing() {
        let deadline = origin() + ChronoDuration::minutes(30);
        let mut previous = u64::MAX;
        for step in 0..4000 {
            let now = origin() + ChronoDuration::seconds(step);
            let remaining = remaining_minutes(deadline, now);
            assert!(remaining <= previous);
            previous = remaining;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn test_monitor_fires_once() {
        let deadline = origin() + ChronoDuration::minutes(2);
        let mut monitor = DeadlineMonitor::new(deadline);
        let pending = AppointmentStatus::PendingCaregiver;

        assert_eq!(monitor.tick(pending, origin()), DeadlineTick::Remaining(2));
        assert_eq!(
            monitor.tick(pending, origin() + ChronoDuration::minutes(1)),
            DeadlineTick::Remaining(1)
        );
        assert_eq!(monitor.tick(pending, deadline), DeadlineTick::Expired);
        assert_eq!(
            monitor.tick(pending, deadline + ChronoDuration::minutes(1)),
            DeadlineTick::Idle
        );
        assert!(monitor.has_fired());
    }

    #[test]
    fn test_monitor_idle_when_not_pending() {
        let deadline = origin() + ChronoDuration::minutes(2);
        let mut monitor = DeadlineMonitor::new(deadline);
        assert_eq!(
            monitor.tick(AppointmentStatus::CaregiverApproved, deadline),
            DeadlineTick::Idle
        );
        assert!(!monitor.has_fired());
    }

    #[test]
    fn test_snapshot() {
        let snap = DeadlineSnapshot::at(origin() + ChronoDuration::minutes(3), origin());
        assert_eq!(snap.remaining_minutes, 3);
        assert!(!snap.expired);
        let late = DeadlineSnapshot::at(origin(), origin() + ChronoDuration::minutes(3));
        assert!(late.expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_from_five_minutes_expires_once() {
        let clock = Arc::new(TokioClock::new(origin()));
        let (tx, mut rx) = broadcast::channel(16);
        let handle = spawn_monitor(
            "apt-1".to_string(),
            origin() + ChronoDuration::minutes(5),
            clock,
            Duration::from_secs(60),
            tx,
        );

        let mut seen = Vec::new();
        loop {
            let event = rx.recv().await.unwrap();
            let expired = event.expired;
            seen.push((event.remaining_minutes, expired));
            if expired {
                break;
            }
        }
        assert_eq!(
            seen,
            vec![
                (5, false),
                (4, false),
                (3, false),
                (2, false),
                (1, false),
                (0, true)
            ]
        );

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(matches!(
            rx.try_recv(),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed)
        ));
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopping_handle_halts_ticks() {
        let clock = Arc::new(TokioClock::new(origin()));
        let (tx, mut rx) = broadcast::channel(16);
        let handle = spawn_monitor(
            "apt-2".to_string(),
            origin() + ChronoDuration::minutes(5),
            clock,
            Duration::from_secs(60),
            tx.clone(),
        );

        let first = rx.recv().await.unwrap();
        assert_eq!(first.remaining_minutes, 5);

        handle.stop();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_deadline_expires_immediately() {
        let clock = Arc::new(TokioClock::new(origin()));
        let (tx, mut rx) = broadcast::channel(4);
        let _handle = spawn_monitor(
            "apt-3".to_string(),
            origin() - ChronoDuration::minutes(1),
            clock,
            Duration::from_secs(60),
            tx,
        );
        let event = rx.recv().await.unwrap();
        assert!(event.expired);
        assert_eq!(event.remaining_minutes, 0);
    }
}
