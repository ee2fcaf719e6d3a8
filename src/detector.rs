//! Line-completion win detection.
//!
//! [`detect`] is pure: the same board, called set and grid size always give
//! the same [`LineReport`].

use std::collections::BTreeSet;

use crate::board::Board;

/// Completed lines on one board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineReport {
    /// Rows + columns + full diagonals that are complete.
    pub line_count: usize,
    /// Union of the cell indices belonging to complete lines.
    pub completed_cells: BTreeSet<usize>,
}

impl LineReport {
    pub fn is_win(&self, lines_to_win: usize) -> bool {
        self.line_count >= lines_to_win
    }
}

/// Count complete rows, columns and the two full diagonals of `board`.
///
/// A line is complete when every number placed on it has been called.
pub fn detect(board: &Board, called: &[u32]) -> LineReport {
    let size = board.grid_size().get();
    let ticked = |index: usize| board.cell(index).is_some_and(|n| called.contains(&n));

    let rows = (0..size).map(|r| (0..size).map(|c| r * size + c).collect::<Vec<_>>());
    let cols = (0..size).map(|c| (0..size).map(|r| r * size + c).collect::<Vec<_>>());
    let diagonals = [
        (0..size).map(|i| i * size + i).collect::<Vec<_>>(),
        (0..size).map(|i| i * size + (size - 1 - i)).collect::<Vec<_>>(),
    ];

    let mut report = LineReport::default();
    for line in rows.chain(cols).chain(diagonals) {
        if line.iter().all(|&index| ticked(index)) {
            report.line_count += 1;
            report.completed_cells.extend(line);
        }
    }
    report
}
