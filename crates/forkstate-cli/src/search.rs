//! N-queens by backtracking through nested transactions.

use forkstate_core::{ForkError, Root, RootConfig, Slot};
use forkstate_types::{Owner, Position};
use serde::Serialize;
use tracing::debug;

/// Why a placement attempt was abandoned.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("no column fits")]
    Backtrack,

    #[error(transparent)]
    Fork(#[from] ForkError<usize>),
}

/// A full board, one column per row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub columns: Vec<usize>,
    /// Transactions opened while searching.
    pub attempts: usize,
}

/// Place `size` queens so that none attacks another.
///
/// Each row is a slot; each candidate column is tried in its own
/// transaction, so a failed branch leaves no trace in the slots.
pub fn solve_queens(size: usize, config: RootConfig) -> Result<Option<Placement>, ForkError<usize>> {
    let root: Root<usize> = Root::with_config(config, Some(Owner::from("queens")));
    let rows = (0..size)
        .map(|row| root.slot(Some(Owner::new(format!("row-{row}"))), None, None))
        .collect::<Result<Vec<Slot<usize>>, _>>()?;

    let mut attempts = 0;
    let solved = match place(&root, &rows, 0, &mut attempts) {
        Ok(()) => true,
        Err(SearchError::Backtrack) => false,
        Err(SearchError::Fork(e)) => return Err(e),
    };
    let summary = root.finish()?;
    debug!(size, attempts, frozen = summary.frozen, solved, "queens search finished");

    if !solved {
        return Ok(None);
    }
    let columns = rows.iter().map(Slot::value).collect::<Result<Vec<_>, _>>()?;
    Ok(Some(Placement { columns, attempts }))
}

fn place(root: &Root<usize>, rows: &[Slot<usize>], row: usize, attempts: &mut usize) -> Result<(), SearchError> {
    if row == rows.len() {
        return Ok(());
    }
    for column in 0..rows.len() {
        if !is_safe(rows, row, column)? {
            continue;
        }
        *attempts += 1;
        let owner = Owner::new(format!("row-{row}@{column}"));
        let attempt = root.transaction(Some(owner), |root| {
            rows[row].set_value(column, Some(Position::new(format!("row {row}"))))?;
            place(root, rows, row + 1, attempts)
        });
        match attempt {
            Ok(()) => return Ok(()),
            Err(SearchError::Backtrack) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(SearchError::Backtrack)
}

fn is_safe(rows: &[Slot<usize>], row: usize, column: usize) -> Result<bool, ForkError<usize>> {
    for (earlier, slot) in rows[..row].iter().enumerate() {
        let placed = slot.value()?;
        if placed == column || placed.abs_diff(column) == row - earlier {
            return Ok(false);
        }
    }
    Ok(true)
}
