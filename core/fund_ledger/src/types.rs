//! # Types
//!
//! Ledger records shared by the allocation engine and the storage layer.
//!
//! ## Design decisions
//!
//! ### Fundable as a capability
//!
//! Both sides of the ledger carry the same bookkeeping columns
//! (`full_amount`, `invested_amount`, `fully_invested`, `create_date`,
//! `close_date`) but are otherwise unrelated records. Instead of a shared
//! base struct, each record implements [`Fundable`], which is all the
//! allocation engine ever sees.
//!
//! ### Open / closed as a one-way transition
//!
//! ```text
//! Open (invested < full) ──► Closed (invested == full, close_date set)
//! ```
//!
//! [`Fundable::close`] is idempotent: the first call stamps `close_date`,
//! later calls leave it untouched. Nothing moves a record back to open.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest project name accepted by the ledger.
pub const MAX_PROJECT_NAME_LEN: usize = 100;

/// Anything that can give or receive money through the allocation engine.
pub trait Fundable {
    /// Storage identity.
    fn id(&self) -> i64;

    /// Total amount needed (project) or offered (donation). Never changes.
    fn required_amount(&self) -> i64;

    /// Amount already matched against the other side of the ledger.
    fn satisfied_amount(&self) -> i64;

    /// Add `amount` to the satisfied total. Only the engine calls this.
    fn add_satisfied(&mut self, amount: i64);

    fn is_fully_satisfied(&self) -> bool;

    fn closed_at(&self) -> Option<DateTime<Utc>>;

    /// Mark the record fully satisfied. The first call wins; `closed_at`
    /// is never overwritten.
    fn close(&mut self, at: DateTime<Utc>);

    fn created_at(&self) -> DateTime<Utc>;

    /// Capacity left on this record. Negative values only appear when the
    /// record itself is corrupt; callers treat them as zero.
    fn remaining(&self) -> i64 {
        self.required_amount() - self.satisfied_amount()
    }
}

/// A charity project asking for money (demand side).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Project {
    pub id: i64,
    /// Unique, non-empty display name.
    pub name: String,
    pub description: String,
    pub full_amount: i64,
    pub invested_amount: i64,
    pub fully_invested: bool,
    pub create_date: DateTime<Utc>,
    pub close_date: Option<DateTime<Utc>>,
}

/// Money offered by a user (supply side).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Donation {
    pub id: i64,
    /// Owner of the donation.
    pub user_id: i64,
    pub comment: Option<String>,
    pub full_amount: i64,
    pub invested_amount: i64,
    pub fully_invested: bool,
    pub create_date: DateTime<Utc>,
    pub close_date: Option<DateTime<Utc>>,
}

macro_rules! impl_fundable {
    ($record:ty) => {
        impl Fundable for $record {
            fn id(&self) -> i64 {
                self.id
            }

            fn required_amount(&self) -> i64 {
                self.full_amount
            }

            fn satisfied_amount(&self) -> i64 {
                self.invested_amount
            }

            fn add_satisfied(&mut self, amount: i64) {
                self.invested_amount += amount;
            }

            fn is_fully_satisfied(&self) -> bool {
                self.fully_invested
            }

            fn closed_at(&self) -> Option<DateTime<Utc>> {
                self.close_date
            }

            fn close(&mut self, at: DateTime<Utc>) {
                self.fully_invested = true;
                if self.close_date.is_none() {
                    self.close_date = Some(at);
                }
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.create_date
            }
        }
    };
}

impl_fundable!(Project);
impl_fundable!(Donation);

impl Project {
    /// A brand-new, untouched project.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        full_amount: i64,
        create_date: DateTime<Utc>,
    ) -> Self {
        Project {
            id: 0,
            name: name.into(),
            description: description.into(),
            full_amount,
            invested_amount: 0,
            fully_invested: false,
            create_date,
            close_date: None,
        }
    }

    /// Closed projects are frozen.
    pub fn ensure_editable(&self) -> Result<(), RuleViolation> {
        if self.fully_invested {
            return Err(RuleViolation::ProjectClosed(self.id));
        }
        Ok(())
    }

    /// `full_amount` may grow, or shrink down to what has already been invested.
    pub fn ensure_required_amount(&self, new_amount: i64) -> Result<(), RuleViolation> {
        if new_amount <= 0 {
            return Err(RuleViolation::NonPositiveAmount(new_amount));
        }
        if new_amount < self.invested_amount {
            return Err(RuleViolation::BelowInvested {
                requested: new_amount,
                invested: self.invested_amount,
            });
        }
        Ok(())
    }

    /// Only projects that never received money may be removed.
    pub fn ensure_deletable(&self) -> Result<(), RuleViolation> {
        if self.invested_amount > 0 || self.fully_invested {
            return Err(RuleViolation::ProjectFunded(self.id));
        }
        Ok(())
    }

    /// Apply a new `full_amount` that already passed [`Project::ensure_required_amount`].
    /// Shrinking the goal to exactly what is invested closes the project.
    pub fn set_required_amount(&mut self, new_amount: i64, now: DateTime<Utc>) {
        self.full_amount = new_amount;
        if self.invested_amount == self.full_amount {
            self.close(now);
        }
    }
}

impl Donation {
    /// A brand-new, unallocated donation owned by `user_id`.
    pub fn new(
        user_id: i64,
        full_amount: i64,
        comment: Option<String>,
        create_date: DateTime<Utc>,
    ) -> Self {
        Donation {
            id: 0,
            user_id,
            comment,
            full_amount,
            invested_amount: 0,
            fully_invested: false,
            create_date,
            close_date: None,
        }
    }

    /// Owners and administrators see the full record.
    pub fn visible_in_full_to(&self, viewer_id: i64, is_admin: bool) -> bool {
        is_admin || viewer_id == self.user_id
    }
}

/// Record-level edit rules for projects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("project {0} is fully invested and can no longer be edited")]
    ProjectClosed(i64),

    #[error("project {0} has already received donations and cannot be deleted")]
    ProjectFunded(i64),

    #[error("full amount {requested} is below the already invested {invested}")]
    BelowInvested { requested: i64, invested: i64 },

    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn close_keeps_first_timestamp() {
        let mut project = Project::new("Cats", "Feed the cats", 100, at(0));
        project.close(at(10));
        project.close(at(20));
        assert!(project.fully_invested);
        assert_eq!(project.close_date, Some(at(10)));
    }

    #[test]
    fn fresh_records_are_open() {
        let project = Project::new("Cats", "Feed the cats", 100, at(0));
        let donation = Donation::new(7, 50, None, at(1));
        assert!(!project.is_fully_satisfied());
        assert!(!donation.is_fully_satisfied());
        assert_eq!(project.remaining(), 100);
        assert_eq!(donation.remaining(), 50);
    }

    #[test]
    fn funded_project_cannot_be_deleted() {
        let mut project = Project::new("Cats", "Feed the cats", 100, at(0));
        assert!(project.ensure_deletable().is_ok());
        project.add_satisfied(1);
        assert_eq!(
            project.ensure_deletable(),
            Err(RuleViolation::ProjectFunded(0))
        );
    }

    #[test]
    fn required_amount_cannot_drop_below_invested() {
        let mut project = Project::new("Cats", "Feed the cats", 100, at(0));
        project.add_satisfied(40);
        assert_eq!(
            project.ensure_required_amount(39),
            Err(RuleViolation::BelowInvested {
                requested: 39,
                invested: 40
            })
        );
        assert!(project.ensure_required_amount(40).is_ok());
        assert_eq!(
            project.ensure_required_amount(0),
            Err(RuleViolation::NonPositiveAmount(0))
        );
    }

    #[test]
    fn shrinking_to_invested_closes_project() {
        let mut project = Project::new("Cats", "Feed the cats", 100, at(0));
        project.add_satisfied(40);
        project.set_required_amount(40, at(5));
        assert!(project.fully_invested);
        assert_eq!(project.close_date, Some(at(5)));
        assert_eq!(
            project.ensure_editable(),
            Err(RuleViolation::ProjectClosed(0))
        );
    }

    #[test]
    fn donation_visibility() {
        let donation = Donation::new(7, 50, Some("for cats".into()), at(1));
        assert!(donation.visible_in_full_to(7, false));
        assert!(donation.visible_in_full_to(8, true));
        assert!(!donation.visible_in_full_to(8, false));
    }
}
