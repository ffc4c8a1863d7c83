//! Periodic housekeeping.
//!
//! One loop runs every `SAMS_JOB_INTERVAL_SECS` and, in order:
//!
//! 1. marks issued invoices past due as OVERDUE
//! 2. completes confirmed bookings whose end date passed
//! 3. starts and finishes maintenance windows and posts reminders
//! 4. activates and expires announcements
//! 5. generates the month's invoices on the configured day
//!
//! A failing step is logged and the others still run.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use crate::services::{
    AnnouncementService, BookingService, InvoiceService, MaintenanceService, ServiceError,
};
use crate::state::AppState;

/// Counts from one pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub invoices_overdue: u64,
    pub bookings_completed: u64,
    pub maintenance_started: usize,
    pub maintenance_finished: usize,
    pub maintenance_reminders: usize,
    pub announcements_activated: u64,
    pub announcements_expired: u64,
    pub invoices_generated: usize,
    pub failed_steps: Vec<&'static str>,
}

impl JobReport {
    fn is_quiet(&self) -> bool {
        *self == Self::default()
    }

    fn record_failure(&mut self, step: &'static str, error: &ServiceError) {
        tracing::error!(step, error = %error, "Background job step failed");
        self.failed_steps.push(step);
    }
}

/// Spawn the job loop. The first pass runs immediately.
pub fn spawn(state: AppState) -> JoinHandle<()> {
    let period = Duration::from_secs(state.config().job_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let report = run_once(&state)
                .instrument(tracing::info_span!("background_jobs"))
                .await;
            if !report.is_quiet() {
                tracing::info!(?report, "Background jobs finished");
            }
        }
    })
}

/// Run every job once.
pub async fn run_once(state: &AppState) -> JobReport {
    let pool = state.pool();
    let clock = state.clock();
    let mut report = JobReport::default();

    let invoices = InvoiceService::new(pool, state.email(), clock);
    match invoices.mark_overdue().await {
        Ok(n) => report.invoices_overdue = n,
        Err(e) => report.record_failure("invoices_overdue", &e),
    }

    match BookingService::new(pool, state.email(), clock)
        .complete_expired()
        .await
    {
        Ok(n) => report.bookings_completed = n,
        Err(e) => report.record_failure("bookings_completed", &e),
    }

    match MaintenanceService::new(pool, clock).run_due().await {
        Ok(run) => {
            report.maintenance_started = run.started;
            report.maintenance_finished = run.finished;
            report.maintenance_reminders = run.reminders;
        }
        Err(e) => report.record_failure("maintenance", &e),
    }

    match AnnouncementService::new(pool, clock).refresh_statuses().await {
        Ok((activated, expired)) => {
            report.announcements_activated = activated;
            report.announcements_expired = expired;
        }
        Err(e) => report.record_failure("announcements", &e),
    }

    match invoices.run_scheduled_generation(clock.today()).await {
        Ok(Some(generated)) => report.invoices_generated = generated.created.len(),
        Ok(None) => {}
        Err(e) => report.record_failure("invoice_generation", &e),
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_report() {
        assert!(JobReport::default().is_quiet());

        let busy = JobReport {
            bookings_completed: 2,
            ..JobReport::default()
        };
        assert!(!busy.is_quiet());

        let mut failed = JobReport::default();
        failed.record_failure("maintenance", &ServiceError::Validation("x".to_string()));
        assert!(!failed.is_quiet());
        assert_eq!(failed.failed_steps, vec!["maintenance"]);
    }
}
