//! Scheduled Jobs
//!
//! Background jobs for periodic maintenance tasks.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::time::interval;

use crate::store::SessionStore;

// =========================================================================
// Expired Session Purge
// =========================================================================

/// Delete sessions whose expiry has passed. Expired sessions are already
/// rejected on resolve; this only keeps the table from growing.
pub async fn purge_expired_sessions(pool: &SqlitePool) -> Result<u64, JobError> {
    let rows_deleted = SessionStore::new(pool.clone())
        .purge_expired(Utc::now())
        .await?;

    if rows_deleted > 0 {
        tracing::info!(rows_deleted, "Purged expired sessions");
    }

    Ok(rows_deleted)
}

// =========================================================================
// Query Planner Maintenance
// =========================================================================

/// Let SQLite refresh planner statistics for tables that need it
pub async fn optimize_database(pool: &SqlitePool) -> Result<(), JobError> {
    sqlx::query("PRAGMA optimize").execute(pool).await?;
    tracing::debug!("Ran PRAGMA optimize");
    Ok(())
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval for expired session purge (default: 5 minutes)
    pub session_purge_interval: Duration,
    /// Interval for planner maintenance (default: 1 hour)
    pub optimize_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            session_purge_interval: Duration::from_secs(300),
            optimize_interval: Duration::from_secs(3600),
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    pool: SqlitePool,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    /// Create a new job scheduler
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            config: JobSchedulerConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(pool: SqlitePool, config: JobSchedulerConfig) -> Self {
        Self { pool, config }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the scheduler loop
    async fn run(&self) {
        tracing::info!("Job scheduler started");

        let mut session_interval = interval(self.config.session_purge_interval);
        let mut optimize_interval = interval(self.config.optimize_interval);

        loop {
            tokio::select! {
                _ = session_interval.tick() => {
                    if let Err(e) = purge_expired_sessions(&self.pool).await {
                        tracing::error!(error = %e, "Session purge failed");
                    }
                }
                _ = optimize_interval.tick() => {
                    if let Err(e) = optimize_database(&self.pool).await {
                        tracing::error!(error = %e, "Database optimize failed");
                    }
                }
            }
        }
    }

    /// Run all maintenance jobs once (for manual trigger or testing)
    pub async fn run_all_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match purge_expired_sessions(&self.pool).await {
            Ok(count) => report.sessions_purged = count,
            Err(e) => report.errors.push(format!("Session purge: {}", e)),
        }

        if let Err(e) = optimize_database(&self.pool).await {
            report.errors.push(format!("Optimize: {}", e));
        }

        report.completed_at = Utc::now();
        report
    }
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub sessions_purged: u64,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Store(#[from] crate::error::AppError),
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db;
    use chrono::Duration as ChronoDuration;

    async fn memory_pool() -> SqlitePool {
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            ..Config::default()
        };
        let pool = db::connect(&config).await.unwrap();
        db::init_schema(&pool).await.unwrap();
        sqlx::query(
            "INSERT INTO users (login, password_hash, full_name, role, created_at) \
             VALUES ('manager1', 'h', 'Manager One', 'manager', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    #[test]
    fn test_job_scheduler_config_default() {
        let config = JobSchedulerConfig::default();
        assert_eq!(config.session_purge_interval, Duration::from_secs(300));
        assert_eq!(config.optimize_interval, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_purge_removes_only_expired_sessions() {
        let pool = memory_pool().await;
        let sessions = SessionStore::new(pool.clone());
        sessions
            .insert("expired", 1, Utc::now() - ChronoDuration::minutes(1))
            .await
            .unwrap();
        sessions
            .insert("live", 1, Utc::now() + ChronoDuration::hours(1))
            .await
            .unwrap();

        let scheduler = JobScheduler::new(pool.clone());
        let report = scheduler.run_all_once().await;

        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(report.sessions_purged, 1);
        assert_eq!(sessions.count_for(1).await.unwrap(), 1);
    }
}
