//! # Fund Ledger
//!
//! Core of the charity fund ledger: money donated by users is matched
//! against money requested by projects, strictly in arrival order.
//!
//! | Module         | Contents                                                   |
//! |----------------|------------------------------------------------------------|
//! | [`types`]      | [`Fundable`] capability, [`Project`], [`Donation`], edit rules |
//! | [`allocation`] | The FIFO-greedy allocation engine                          |
//! | [`invariants`] | Record-level and ledger-wide consistency checks            |
//!
//! ## Usage
//!
//! ```
//! use chrono::Utc;
//! use fund_ledger::{allocate, Donation, Project};
//!
//! let mut open_donations = vec![
//!     Donation::new(1, 50, None, Utc::now()),
//!     Donation::new(2, 80, None, Utc::now()),
//! ];
//! let mut project = Project::new("Shelter", "Winter shelter for cats", 100, Utc::now());
//!
//! let outcome = allocate(&mut project, &mut open_donations);
//!
//! assert!(project.fully_invested);
//! assert_eq!(outcome.total(), 100);
//! assert_eq!(open_donations[1].invested_amount, 50);
//! ```
//!
//! This crate performs no I/O. Loading the backlog and persisting the
//! changed set atomically is the caller's job.

pub mod allocation;
pub mod invariants;
pub mod types;

pub use allocation::{allocate, allocate_at, Allocation, Transfer};
pub use invariants::InvariantViolation;
pub use types::{Donation, Fundable, Project, RuleViolation, MAX_PROJECT_NAME_LEN};
