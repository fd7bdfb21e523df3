//! Long-running background task that re-checks the stored ledger against
//! its invariants and logs anything that does not add up.

use std::time::Duration;

use fund_ledger::invariants::{self, InvariantViolation};
use fund_ledger::{Donation, Project};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::db;
use crate::errors::Result;

#[derive(Debug, Default)]
pub struct AuditReport {
    pub projects: usize,
    pub donations: usize,
    pub violations: Vec<InvariantViolation>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Audit every `interval` until `shutdown` fires.
pub async fn run(pool: SqlitePool, interval: Duration, shutdown: CancellationToken) {
    info!("Ledger auditor starting — interval: {}s", interval.as_secs());

    loop {
        match audit_once(&pool).await {
            Ok(report) if report.is_clean() => {
                debug!(
                    "Ledger consistent: {} projects, {} donations",
                    report.projects, report.donations
                );
            }
            Ok(report) => {
                for violation in &report.violations {
                    error!("Ledger invariant violated: {violation}");
                }
            }
            Err(e) => {
                error!("Ledger audit error: {e}");
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Ledger auditor stopped");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Perform a single audit pass over both ledger sides.
///
/// Both sides are read inside one transaction so an allocation pass
/// committing in between cannot show up as a conservation break.
pub async fn audit_once(pool: &SqlitePool) -> Result<AuditReport> {
    let mut tx = pool.begin().await?;
    let projects: Vec<Project> = db::fetch_all(&mut *tx).await?;
    let donations: Vec<Donation> = db::fetch_all(&mut *tx).await?;
    tx.commit().await?;

    let mut violations = invariants::check_all(&projects);
    violations.extend(invariants::check_all(&donations));
    if let Err(v) = invariants::check_conservation(
        invariants::total_invested(&projects),
        invariants::total_invested(&donations),
    ) {
        violations.push(v);
    }

    Ok(AuditReport {
        projects: projects.len(),
        donations: donations.len(),
        violations,
    })
}
