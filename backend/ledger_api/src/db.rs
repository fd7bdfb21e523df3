//! Database layer — migrations, ledger queries and write-back of allocation results.
//!
//! Functions that take a [`SqliteConnection`] are meant to run inside the
//! caller's transaction (`&mut *tx`); functions that take the pool are
//! stand-alone reads.

use std::str::FromStr;

use fund_ledger::{Donation, Fundable, Project};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::errors::{LedgerError, Result};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    // Make sure the file is created if it doesn't exist yet.
    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Storage contract shared by both ledger sides
// ─────────────────────────────────────────────────────────

/// A fundable record with its own table.
pub trait LedgerRecord: Fundable + for<'r> FromRow<'r, SqliteRow> + Send + Unpin {
    const TABLE: &'static str;
}

impl LedgerRecord for Project {
    const TABLE: &'static str = "charity_project";
}

impl LedgerRecord for Donation {
    const TABLE: &'static str = "donation";
}

/// Open records of kind `K`, oldest first. This is the backlog handed to the
/// allocation engine.
pub async fn fetch_open<K: LedgerRecord>(conn: &mut SqliteConnection) -> Result<Vec<K>> {
    let sql = format!(
        "SELECT * FROM {} WHERE fully_invested = 0 ORDER BY create_date ASC, id ASC",
        K::TABLE
    );
    let rows = sqlx::query_as::<_, K>(&sql).fetch_all(&mut *conn).await?;
    Ok(rows)
}

/// Every record of kind `K`, oldest first. Pass `&mut *tx` to read both
/// ledger sides from one snapshot.
pub async fn fetch_all<'c, K: LedgerRecord>(
    executor: impl Executor<'c, Database = Sqlite>,
) -> Result<Vec<K>> {
    let sql = format!("SELECT * FROM {} ORDER BY create_date ASC, id ASC", K::TABLE);
    let rows = sqlx::query_as::<_, K>(&sql).fetch_all(executor).await?;
    Ok(rows)
}

/// Write back the bookkeeping columns mutated by an allocation pass.
pub async fn save_funding<K: LedgerRecord>(conn: &mut SqliteConnection, record: &K) -> Result<()> {
    let sql = format!(
        "UPDATE {} SET invested_amount = ?1, fully_invested = ?2, close_date = ?3 WHERE id = ?4",
        K::TABLE
    );
    let affected = sqlx::query(&sql)
        .bind(record.satisfied_amount())
        .bind(record.is_fully_satisfied())
        .bind(record.closed_at())
        .bind(record.id())
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(LedgerError::NotFound(format!(
            "{} #{} vanished during allocation",
            K::TABLE,
            record.id()
        )));
    }
    debug!(
        "🗃️ {} #{} now {}/{}",
        K::TABLE,
        record.id(),
        record.satisfied_amount(),
        record.required_amount()
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Projects
// ─────────────────────────────────────────────────────────

/// Insert a new project and return its id.
pub async fn insert_project(conn: &mut SqliteConnection, project: &Project) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO charity_project
            (name, description, full_amount, invested_amount, fully_invested, create_date, close_date)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.full_amount)
    .bind(project.invested_amount)
    .bind(project.fully_invested)
    .bind(project.create_date)
    .bind(project.close_date)
    .execute(&mut *conn)
    .await
    .map_err(|e| duplicate_name_or(e, &project.name))?
    .last_insert_rowid();
    Ok(id)
}

pub async fn get_project(conn: &mut SqliteConnection, id: i64) -> Result<Option<Project>> {
    let project = sqlx::query_as::<_, Project>("SELECT * FROM charity_project WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(project)
}

pub async fn find_project_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<Project>> {
    let project = sqlx::query_as::<_, Project>("SELECT * FROM charity_project WHERE name = ?1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(project)
}

/// Persist an edited project (name, description, goal and any closing it caused).
pub async fn update_project(conn: &mut SqliteConnection, project: &Project) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE charity_project
        SET    name = ?1, description = ?2, full_amount = ?3,
               fully_invested = ?4, close_date = ?5
        WHERE  id = ?6
        "#,
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.full_amount)
    .bind(project.fully_invested)
    .bind(project.close_date)
    .bind(project.id)
    .execute(&mut *conn)
    .await
    .map_err(|e| duplicate_name_or(e, &project.name))?;
    Ok(())
}

pub async fn delete_project(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM charity_project WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn duplicate_name_or(e: sqlx::Error, name: &str) -> LedgerError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            LedgerError::BadRequest(format!("A project named '{name}' already exists"))
        }
        _ => LedgerError::Database(e),
    }
}

// ─────────────────────────────────────────────────────────
// Donations
// ─────────────────────────────────────────────────────────

/// Insert a new donation and return its id.
pub async fn insert_donation(conn: &mut SqliteConnection, donation: &Donation) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO donation
            (user_id, comment, full_amount, invested_amount, fully_invested, create_date, close_date)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(donation.user_id)
    .bind(&donation.comment)
    .bind(donation.full_amount)
    .bind(donation.invested_amount)
    .bind(donation.fully_invested)
    .bind(donation.create_date)
    .bind(donation.close_date)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn get_donation(pool: &SqlitePool, id: i64) -> Result<Option<Donation>> {
    let donation = sqlx::query_as::<_, Donation>("SELECT * FROM donation WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(donation)
}

/// Donations owned by `user_id`, oldest first.
pub async fn donations_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Donation>> {
    let rows = sqlx::query_as::<_, Donation>(
        r#"
        SELECT *
        FROM   donation
        WHERE  user_id = ?1
        ORDER  BY create_date ASC, id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    // A single long-lived connection, otherwise every connection would see
    // its own empty in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
