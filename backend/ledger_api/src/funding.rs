//! Orchestration of ledger writes.
//!
//! Every write that can touch amounts (creating a project or donation,
//! editing or deleting a project) runs under one process-wide lock and inside
//! one SQLite transaction. The backlog read, the allocation pass and the
//! write-back of the changed set therefore see a consistent snapshot, and a
//! failure anywhere drops the transaction so nothing of the request persists.

use chrono::Utc;
use fund_ledger::{allocate_at, Allocation, Donation, Fundable, Project};
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::db::{self, LedgerRecord};
use crate::dto::{DonationCreate, ProjectCreate, ProjectUpdate};
use crate::errors::{LedgerError, Result};

pub struct Ledger {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl Ledger {
    pub fn new(pool: SqlitePool) -> Self {
        Ledger {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Register a project and fund it from the open donations.
    pub async fn open_project(&self, new: ProjectCreate) -> Result<Project> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        if db::find_project_by_name(&mut tx, &new.name).await?.is_some() {
            return Err(LedgerError::BadRequest(format!(
                "A project named '{}' already exists",
                new.name
            )));
        }

        let mut project = Project::new(new.name, new.description, new.full_amount, Utc::now());
        project.id = db::insert_project(&mut tx, &project).await?;

        let outcome = run_pass::<_, Donation>(&mut tx, &mut project).await?;
        tx.commit().await?;

        info!(
            "Project #{} '{}' opened: {} of {} funded from {} donation(s)",
            project.id,
            project.name,
            project.invested_amount,
            project.full_amount,
            outcome.transfers.len()
        );
        Ok(project)
    }

    /// Record a donation and spread it over the open projects.
    pub async fn accept_donation(&self, user_id: i64, new: DonationCreate) -> Result<Donation> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let mut donation = Donation::new(user_id, new.full_amount, new.comment, Utc::now());
        donation.id = db::insert_donation(&mut tx, &donation).await?;

        let outcome = run_pass::<_, Project>(&mut tx, &mut donation).await?;
        tx.commit().await?;

        info!(
            "Donation #{} of {} from user {}: {} invested into {} project(s)",
            donation.id,
            donation.full_amount,
            user_id,
            donation.invested_amount,
            outcome.transfers.len()
        );
        Ok(donation)
    }

    /// Edit a project's name, description or goal.
    pub async fn update_project(&self, id: i64, update: ProjectUpdate) -> Result<Project> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let mut project = load_project(&mut tx, id).await?;
        project.ensure_editable()?;

        if let Some(name) = update.name {
            if name != project.name {
                if db::find_project_by_name(&mut tx, &name).await?.is_some() {
                    return Err(LedgerError::BadRequest(format!(
                        "A project named '{name}' already exists"
                    )));
                }
                project.name = name;
            }
        }
        if let Some(description) = update.description {
            project.description = description;
        }
        if let Some(amount) = update.full_amount {
            project.ensure_required_amount(amount)?;
            project.set_required_amount(amount, Utc::now());
        }

        db::update_project(&mut tx, &project).await?;
        tx.commit().await?;

        info!("Project #{} updated", project.id);
        Ok(project)
    }

    /// Remove a project that never received money.
    pub async fn delete_project(&self, id: i64) -> Result<Project> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let project = load_project(&mut tx, id).await?;
        project.ensure_deletable()?;
        db::delete_project(&mut tx, id).await?;
        tx.commit().await?;

        info!("Project #{} '{}' deleted", project.id, project.name);
        Ok(project)
    }
}

async fn load_project(conn: &mut SqliteConnection, id: i64) -> Result<Project> {
    db::get_project(conn, id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("Project #{id} does not exist")))
}

/// Match `anchor` against the open backlog of kind `B` and write back every
/// record the pass changed, the anchor included.
async fn run_pass<A, B>(conn: &mut SqliteConnection, anchor: &mut A) -> Result<Allocation>
where
    A: LedgerRecord,
    B: LedgerRecord,
{
    let mut backlog: Vec<B> = db::fetch_open(conn).await?;
    let outcome = allocate_at(anchor, &mut backlog, Utc::now());

    for transfer in &outcome.transfers {
        debug!(
            "Moved {} between {} #{} and {} #{}",
            transfer.amount,
            A::TABLE,
            anchor.id(),
            B::TABLE,
            transfer.counterparty_id
        );
    }
    for record in outcome.changed(&backlog) {
        db::save_funding(conn, record).await?;
    }
    db::save_funding(conn, anchor).await?;

    if outcome.anchor_closed {
        debug!("{} #{} fully funded in one pass", A::TABLE, anchor.id());
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    fn project(name: &str, amount: i64) -> ProjectCreate {
        ProjectCreate {
            name: name.into(),
            description: "help".into(),
            full_amount: amount,
        }
    }

    fn donation(amount: i64) -> DonationCreate {
        DonationCreate {
            full_amount: amount,
            comment: None,
        }
    }

    #[tokio::test]
    async fn donation_funds_waiting_projects_in_order() {
        let ledger = Ledger::new(memory_pool().await);
        let first = ledger.open_project(project("first", 30)).await.unwrap();
        let second = ledger.open_project(project("second", 50)).await.unwrap();

        let d = ledger.accept_donation(1, donation(60)).await.unwrap();
        assert_eq!(d.invested_amount, 60);
        assert!(d.fully_invested);

        let mut conn = ledger.pool().acquire().await.unwrap();
        let first = db::get_project(&mut conn, first.id).await.unwrap().unwrap();
        let second = db::get_project(&mut conn, second.id).await.unwrap().unwrap();
        assert!(first.fully_invested);
        assert_eq!(first.close_date, d.close_date);
        assert_eq!(second.invested_amount, 30);
        assert!(!second.fully_invested);
    }

    #[tokio::test]
    async fn project_drains_open_donations() {
        let ledger = Ledger::new(memory_pool().await);
        ledger.accept_donation(1, donation(50)).await.unwrap();
        ledger.accept_donation(2, donation(80)).await.unwrap();

        let p = ledger.open_project(project("shelter", 100)).await.unwrap();
        assert_eq!(p.invested_amount, 100);
        assert!(p.fully_invested);

        let donations: Vec<Donation> = db::fetch_all(ledger.pool()).await.unwrap();
        assert_eq!(donations[0].invested_amount, 50);
        assert!(donations[0].fully_invested);
        assert_eq!(donations[1].invested_amount, 50);
        assert!(!donations[1].fully_invested);
    }

    #[tokio::test]
    async fn funded_project_cannot_be_deleted_or_shrunk() {
        let ledger = Ledger::new(memory_pool().await);
        let p = ledger.open_project(project("shelter", 100)).await.unwrap();
        ledger.accept_donation(1, donation(40)).await.unwrap();

        let err = ledger.delete_project(p.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rule(_)));

        let shrink = ProjectUpdate {
            full_amount: Some(39),
            ..Default::default()
        };
        let err = ledger.update_project(p.id, shrink).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rule(_)));

        let close = ProjectUpdate {
            full_amount: Some(40),
            ..Default::default()
        };
        let closed = ledger.update_project(p.id, close).await.unwrap();
        assert!(closed.fully_invested);
        assert!(closed.close_date.is_some());

        let rename = ProjectUpdate {
            name: Some("renamed".into()),
            ..Default::default()
        };
        let err = ledger.update_project(p.id, rename).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rule(_)));
    }

    #[tokio::test]
    async fn untouched_project_can_be_deleted() {
        let ledger = Ledger::new(memory_pool().await);
        let p = ledger.open_project(project("shelter", 100)).await.unwrap();
        let deleted = ledger.delete_project(p.id).await.unwrap();
        assert_eq!(deleted.id, p.id);
        assert!(matches!(
            ledger.delete_project(p.id).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_write_back_leaves_no_trace() {
        let ledger = Ledger::new(memory_pool().await);
        let first = ledger.accept_donation(1, donation(50)).await.unwrap();
        let second = ledger.accept_donation(2, donation(80)).await.unwrap();

        // Refuse any write to the second donation so the pass dies midway,
        // after the first donation was already updated.
        sqlx::query(&format!(
            "CREATE TRIGGER refuse_write BEFORE UPDATE ON donation
             WHEN NEW.id = {} BEGIN SELECT RAISE(ABORT, 'refused'); END",
            second.id
        ))
        .execute(ledger.pool())
        .await
        .unwrap();

        let err = ledger.open_project(project("shelter", 100)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Database(_)));

        let projects: Vec<Project> = db::fetch_all(ledger.pool()).await.unwrap();
        assert!(projects.is_empty());
        let donations: Vec<Donation> = db::fetch_all(ledger.pool()).await.unwrap();
        assert_eq!(donations.len(), 2);
        assert_eq!(donations[0].id, first.id);
        assert!(donations.iter().all(|d| d.invested_amount == 0));
        assert!(donations.iter().all(|d| !d.fully_invested && d.close_date.is_none()));
    }

    #[tokio::test]
    async fn duplicate_name_is_refused() {
        let ledger = Ledger::new(memory_pool().await);
        ledger.open_project(project("shelter", 100)).await.unwrap();
        let other = ledger.open_project(project("clinic", 10)).await.unwrap();

        assert!(matches!(
            ledger.open_project(project("shelter", 5)).await,
            Err(LedgerError::BadRequest(_))
        ));
        let rename = ProjectUpdate {
            name: Some("shelter".into()),
            ..Default::default()
        };
        assert!(matches!(
            ledger.update_project(other.id, rename).await,
            Err(LedgerError::BadRequest(_))
        ));
    }
}
