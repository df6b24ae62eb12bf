//! FILENAME: core/engine/src/coord.rs
//! PURPOSE: Cell coordinates and conversion to/from the address form formulas use.
//! CONTEXT: Formulas name cells as `COL:ROW` variables ("A:1", "$AA:$100").
//! Columns are bijective base-26 letters, "A" = 1 ... "Z" = 26, "AA" = 27.
//! Rows and columns are 1-based; there is no row or column 0.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::EngineError;

/// A cell position. The absolute markers only affect how the address is
/// written back out; two coordinates naming the same row and column are equal
/// whatever their markers.
#[derive(Debug, Clone, Copy)]
pub struct CellCoordinate {
    row: u64,
    col: u64,
    row_absolute: bool,
    col_absolute: bool,
}

impl CellCoordinate {
    pub const fn new(row: u64, col: u64) -> Self {
        CellCoordinate {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    pub const fn with_absolute(row: u64, col: u64, row_absolute: bool, col_absolute: bool) -> Self {
        CellCoordinate {
            row,
            col,
            row_absolute,
            col_absolute,
        }
    }

    pub fn row(&self) -> u64 {
        self.row
    }

    pub fn col(&self) -> u64 {
        self.col
    }

    pub fn is_row_absolute(&self) -> bool {
        self.row_absolute
    }

    pub fn is_col_absolute(&self) -> bool {
        self.col_absolute
    }

    /// Parses "A:1", "$A:1", "A:$1" or "$A:$1" (letters in any case).
    /// Returns None for anything else, including row or column 0.
    pub fn parse_address(address: &str) -> Option<CellCoordinate> {
        let (col_part, row_part) = address.trim().split_once(':')?;

        let (col_absolute, letters) = strip_dollar(col_part);
        let (row_absolute, digits) = strip_dollar(row_part);

        let col = col_to_index(letters)?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let row: u64 = digits.parse().ok()?;
        if row == 0 {
            return None;
        }

        Some(CellCoordinate::with_absolute(row, col, row_absolute, col_absolute))
    }

    /// Writes the coordinate in the same form `parse_address` reads.
    pub fn to_address(&self) -> String {
        format!(
            "{}{}:{}{}",
            if self.col_absolute { "$" } else { "" },
            index_to_col(self.col),
            if self.row_absolute { "$" } else { "" },
            self.row
        )
    }
}

fn strip_dollar(part: &str) -> (bool, &str) {
    match part.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, part),
    }
}

impl PartialEq for CellCoordinate {
    fn eq(&self, other: &Self) -> bool {
        self.row == other.row && self.col == other.col
    }
}

impl Eq for CellCoordinate {}

impl Hash for CellCoordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.row.hash(state);
        self.col.hash(state);
    }
}

/// Row-major (reading) order.
impl Ord for CellCoordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.row, self.col).cmp(&(other.row, other.col))
    }
}

impl PartialOrd for CellCoordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CellCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_address())
    }
}

impl FromStr for CellCoordinate {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CellCoordinate::parse_address(s).ok_or_else(|| EngineError::InvalidAddress(s.to_string()))
    }
}

/// Converts a column string (e.g., "A", "AA", "abc") to a 1-based column index.
/// "A" -> 1, "Z" -> 26, "AA" -> 27.
/// Returns None for an empty string, non-letters, or overflow.
pub fn col_to_index(col_str: &str) -> Option<u64> {
    if col_str.is_empty() {
        return None;
    }
    let mut result: u64 = 0;
    for c in col_str.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u64) - ('A' as u64) + 1;
        result = result.checked_mul(26)?.checked_add(digit)?;
    }
    Some(result)
}

/// Converts a 1-based column index to a column string.
/// 1 -> "A", 26 -> "Z", 27 -> "AA". Index 0 has no letters and yields "".
pub fn index_to_col(col_index: u64) -> String {
    let mut letters = Vec::new();
    let mut n = col_index;
    while n > 0 {
        let remainder = ((n - 1) % 26) as u8;
        letters.push((b'A' + remainder) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}
