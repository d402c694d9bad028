//! Assemble the pull request service from configuration.

use std::sync::Arc;

use mockable::DefaultClock;
use tracing::info;

use crate::config::ServiceSettings;
use crate::domain::ports::UnitOfWork;
use crate::domain::{PullRequestService, RandomReviewerSelector, RequestContext, ReviewerSelector};
use crate::outbound::memory::InMemoryUnitOfWork;
use crate::outbound::persistence::{
    DbPool, DieselUnitOfWork, MigrationError, PoolError, run_migrations,
};

/// Service type produced by [`build_service`].
pub type ReviewService = PullRequestService<dyn UnitOfWork>;

/// Errors raised while assembling the service.
#[derive(Debug, thiserror::Error)]
pub enum WiringError {
    /// Schema migrations failed.
    #[error(transparent)]
    Migration(#[from] MigrationError),
    /// The connection pool could not be built.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// The blocking migration task did not complete.
    #[error("migration task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn selector(settings: &ServiceSettings) -> Arc<dyn ReviewerSelector> {
    match settings.reviewer_seed {
        Some(seed) => Arc::new(RandomReviewerSelector::with_seed(seed)),
        None => Arc::new(RandomReviewerSelector::new()),
    }
}

/// Build the unit of work named by `settings`.
///
/// With a database URL the embedded migrations run first and a pooled
/// PostgreSQL unit of work is returned; otherwise a fresh in-memory store.
pub async fn build_unit_of_work(
    settings: &ServiceSettings,
) -> Result<Arc<dyn UnitOfWork>, WiringError> {
    let Some(pool_config) = settings.pool_config() else {
        info!("no database configured; using in-memory store");
        return Ok(Arc::new(InMemoryUnitOfWork::new()));
    };

    let url = pool_config.database_url().to_owned();
    tokio::task::spawn_blocking(move || run_migrations(&url)).await??;
    let pool = DbPool::new(pool_config).await?;
    info!("connected to PostgreSQL");
    Ok(Arc::new(DieselUnitOfWork::new(pool, Arc::new(DefaultClock))))
}

/// Build the pull request service over the configured storage.
///
/// # Examples
/// ```rust,no_run
/// # use std::ffi::OsString;
/// # use ortho_config::OrthoConfig;
/// # use backend::ServiceSettings;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = ServiceSettings::load_from_iter([OsString::from("review")])?;
/// let service = backend::wiring::build_service(&settings).await?;
/// # let _ = service;
/// # Ok(())
/// # }
/// ```
pub async fn build_service(settings: &ServiceSettings) -> Result<ReviewService, WiringError> {
    let unit_of_work = build_unit_of_work(settings).await?;
    Ok(PullRequestService::new(
        unit_of_work,
        selector(settings),
        Arc::new(DefaultClock),
    ))
}

/// Fresh request context carrying the configured operation deadline.
pub fn request_context(settings: &ServiceSettings) -> RequestContext {
    RequestContext::new().with_timeout(settings.operation_timeout())
}
