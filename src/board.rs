//! Board entry and validation.
//!
//! A [`Board`] is private to its owner and never sent over the wire. The only
//! way to get one is [`validate`] (from raw cell input) or [`Board::random`].

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::ValidationError;
use crate::protocol::GridSize;

/// A validated board: `n²` distinct numbers in `1..=n²`, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    grid_size: GridSize,
    numbers: Vec<u32>,
}

impl Board {
    /// A board holding a uniformly shuffled permutation of `1..=n²`.
    pub fn random<R: Rng + ?Sized>(grid_size: GridSize, rng: &mut R) -> Self {
        let mut numbers: Vec<u32> = (1..=grid_size.max_number()).collect();
        numbers.shuffle(rng);
        Self { grid_size, numbers }
    }

    pub fn grid_size(&self) -> GridSize {
        self.grid_size
    }

    /// Cell values in row-major order.
    pub fn numbers(&self) -> &[u32] {
        &self.numbers
    }

    /// Value at a row-major cell index.
    pub fn cell(&self, index: usize) -> Option<u32> {
        self.numbers.get(index).copied()
    }

    pub fn contains(&self, number: u32) -> bool {
        self.numbers.contains(&number)
    }

    /// Row-major index of `number`, if it is on the board.
    pub fn position(&self, number: u32) -> Option<usize> {
        self.numbers.iter().position(|&n| n == number)
    }
}

/// Validate raw cell input into a [`Board`].
///
/// Cells are checked in order, and within a cell the checks run as
/// parse → range → uniqueness. The first failure is returned. Surrounding
/// whitespace is ignored, but the rest of the cell must be a whole integer.
///
/// # Errors
///
/// - [`ValidationError::WrongCellCount`] if more than `n²` cells are given.
/// - [`ValidationError::IncompleteInput`] for a missing, empty or non-integer cell.
/// - [`ValidationError::OutOfRange`] for a value outside `1..=n²`.
/// - [`ValidationError::DuplicateValue`] for a repeated value.
pub fn validate<S: AsRef<str>>(cells: &[S], grid_size: GridSize) -> Result<Board, ValidationError> {
    let expected = grid_size.cells();
    if cells.len() > expected {
        return Err(ValidationError::WrongCellCount {
            expected,
            actual: cells.len(),
        });
    }

    let max = grid_size.max_number();
    let mut seen = HashSet::with_capacity(expected);
    let mut numbers = Vec::with_capacity(expected);

    for index in 0..expected {
        let value = cells
            .get(index)
            .and_then(|raw| raw.as_ref().trim().parse::<i64>().ok())
            .ok_or(ValidationError::IncompleteInput { index })?;

        let number = u32::try_from(value)
            .ok()
            .filter(|n| (1..=max).contains(n))
            .ok_or(ValidationError::OutOfRange { index, value, max })?;

        if !seen.insert(number) {
            return Err(ValidationError::DuplicateValue {
                index,
                value: number,
            });
        }
        numbers.push(number);
    }

    Ok(Board { grid_size, numbers })
}
