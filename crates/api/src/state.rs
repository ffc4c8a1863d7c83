//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::clock::BuildingClock;
use crate::config::ApiConfig;
use crate::services::{EmailError, EmailService};

/// Cheaply cloneable handle to the pool, config and notification mailer.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    clock: BuildingClock,
    email: Option<EmailService>,
}

impl AppState {
    /// Build the state; the mailer is created only when SMTP is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP transport cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, EmailError> {
        let email = config.email.as_ref().map(EmailService::new).transpose()?;
        let clock = BuildingClock::new(config.utc_offset);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                clock,
                email,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Building-time clock.
    #[must_use]
    pub fn clock(&self) -> BuildingClock {
        self.inner.clock
    }

    /// Notification mailer, `None` when SMTP is not configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }
}
