//! # Allocation
//!
//! FIFO-greedy matching of one freshly created record (the *anchor*) against
//! the open backlog of the opposite ledger side.
//!
//! The engine is side-agnostic: a new project is matched against open
//! donations and a new donation against open projects, through the same
//! function. Preconditions owned by the caller:
//!
//! * the backlog contains only open records, oldest first;
//! * nobody else mutates those records until the changed set is persisted.
//!
//! Neither precondition is re-checked here. The engine only mutates the
//! amounts and closing fields of the records it is handed.

use chrono::{DateTime, Utc};

use crate::types::Fundable;

/// One matching step: `amount` moved between the anchor and `backlog[index]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub index: usize,
    pub counterparty_id: i64,
    pub amount: i64,
}

/// Outcome of a single allocation pass.
///
/// The changed set is the anchor (always) plus every backlog record listed in
/// [`Allocation::transfers`]. Each backlog record appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    pub transfers: Vec<Transfer>,
    /// The anchor closed during this pass.
    pub anchor_closed: bool,
}

impl Allocation {
    /// Total amount moved into (or out of) the anchor.
    pub fn total(&self) -> i64 {
        self.transfers.iter().map(|t| t.amount).sum()
    }

    /// Backlog positions that were mutated, in backlog order.
    pub fn touched(&self) -> impl Iterator<Item = usize> + '_ {
        self.transfers.iter().map(|t| t.index)
    }

    /// The mutated backlog records, ready to be written back.
    ///
    /// `backlog` must be the slice this pass ran against; positions past its
    /// end are skipped.
    pub fn changed<'a, B>(&'a self, backlog: &'a [B]) -> impl Iterator<Item = &'a B> + 'a {
        self.touched().filter_map(move |i| backlog.get(i))
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }
}

/// Run an allocation pass stamped with the current time.
pub fn allocate<A, B>(anchor: &mut A, backlog: &mut [B]) -> Allocation
where
    A: Fundable + ?Sized,
    B: Fundable,
{
    allocate_at(anchor, backlog, Utc::now())
}

/// Run an allocation pass; every record closed in this pass gets `now` as
/// its closing time.
pub fn allocate_at<A, B>(anchor: &mut A, backlog: &mut [B], now: DateTime<Utc>) -> Allocation
where
    A: Fundable + ?Sized,
    B: Fundable,
{
    let mut outcome = Allocation::default();
    let mut need = anchor.remaining();
    if need <= 0 {
        return outcome;
    }

    for (index, counterparty) in backlog.iter_mut().enumerate() {
        if need <= 0 {
            break;
        }
        let available = counterparty.remaining();
        if available <= 0 {
            continue;
        }

        let amount = need.min(available);
        anchor.add_satisfied(amount);
        counterparty.add_satisfied(amount);

        if counterparty.remaining() <= 0 {
            counterparty.close(now);
        }
        if anchor.remaining() <= 0 && !anchor.is_fully_satisfied() {
            anchor.close(now);
            outcome.anchor_closed = true;
        }

        outcome.transfers.push(Transfer {
            index,
            counterparty_id: counterparty.id(),
            amount,
        });
        need -= amount;
    }

    outcome
}
