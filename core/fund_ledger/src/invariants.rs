//! Ledger invariants.
//!
//! Per-record checks hold for every [`Fundable`] at every point in time;
//! [`check_conservation`] holds across the whole ledger. The allocation
//! engine never breaks them for well-formed input, so a violation means the
//! store was edited behind the ledger's back.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::Fundable;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("record {id}: full amount {full} is not positive")]
    NonPositiveRequired { id: i64, full: i64 },

    #[error("record {id}: invested {invested} is outside 0..={full}")]
    OutOfBounds { id: i64, invested: i64, full: i64 },

    #[error("record {id}: fully_invested={flag} but invested {invested} of {full}")]
    FlagMismatch {
        id: i64,
        flag: bool,
        invested: i64,
        full: i64,
    },

    #[error("record {id}: close date present={has_close_date} while fully_invested={flag}")]
    CloseDateMismatch {
        id: i64,
        flag: bool,
        has_close_date: bool,
    },

    #[error("record {id}: closed at {closed} before it was created at {created}")]
    ClosedBeforeCreated {
        id: i64,
        created: DateTime<Utc>,
        closed: DateTime<Utc>,
    },

    #[error("invested totals differ: projects {projects}, donations {donations}")]
    Conservation { projects: i128, donations: i128 },
}

/// Run every per-record invariant, reporting the first one broken.
pub fn check_record<F: Fundable + ?Sized>(record: &F) -> Result<(), InvariantViolation> {
    let id = record.id();
    let full = record.required_amount();
    let invested = record.satisfied_amount();
    let flag = record.is_fully_satisfied();

    if full <= 0 {
        return Err(InvariantViolation::NonPositiveRequired { id, full });
    }
    if invested < 0 || invested > full {
        return Err(InvariantViolation::OutOfBounds { id, invested, full });
    }
    if flag != (invested == full) {
        return Err(InvariantViolation::FlagMismatch {
            id,
            flag,
            invested,
            full,
        });
    }
    match record.closed_at() {
        Some(_) if !flag => Err(InvariantViolation::CloseDateMismatch {
            id,
            flag,
            has_close_date: true,
        }),
        None if flag => Err(InvariantViolation::CloseDateMismatch {
            id,
            flag,
            has_close_date: false,
        }),
        Some(closed) if closed < record.created_at() => {
            Err(InvariantViolation::ClosedBeforeCreated {
                id,
                created: record.created_at(),
                closed,
            })
        }
        _ => Ok(()),
    }
}

/// Check every record, collecting all violations.
pub fn check_all<'a, F, I>(records: I) -> Vec<InvariantViolation>
where
    F: Fundable + 'a,
    I: IntoIterator<Item = &'a F>,
{
    records
        .into_iter()
        .filter_map(|r| check_record(r).err())
        .collect()
}

/// Every unit invested into a project came out of exactly one donation.
pub fn check_conservation(
    projects_invested: i128,
    donations_invested: i128,
) -> Result<(), InvariantViolation> {
    if projects_invested != donations_invested {
        return Err(InvariantViolation::Conservation {
            projects: projects_invested,
            donations: donations_invested,
        });
    }
    Ok(())
}

/// Sum of `satisfied_amount` over a set of records.
///
/// Widened to `i128`: each record fits in `i64`, their sum need not.
pub fn total_invested<'a, F, I>(records: I) -> i128
where
    F: Fundable + 'a,
    I: IntoIterator<Item = &'a F>,
{
    records
        .into_iter()
        .map(|r| i128::from(r.satisfied_amount()))
        .sum()
}
