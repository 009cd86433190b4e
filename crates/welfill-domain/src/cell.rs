//! Spreadsheet cell addressing
//!
//! Templates address cells either by A1 coordinate (`B3`, `$B$3`) or by a
//! workbook defined name (`UserName`). Coordinates are 1-based.

use std::fmt;

/// Largest column index in the OOXML grid (`XFD`)
pub const MAX_COLUMN: u32 = 16_384;

/// Largest row index in the OOXML grid
pub const MAX_ROW: u32 = 1_048_576;

/// A single cell coordinate, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    /// Row number (1-based)
    pub row: u32,
    /// Column number (1-based, `A` = 1)
    pub col: u32,
}

impl CellRef {
    /// Create a cell reference from 1-based row and column numbers
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse an A1-style coordinate, accepting `$` anchors and lowercase letters
    ///
    /// # Examples
    ///
    /// ```
    /// use welfill_domain::CellRef;
    ///
    /// let cell = CellRef::parse("$C$12").unwrap();
    /// assert_eq!(cell, CellRef::new(12, 3));
    /// assert_eq!(cell.to_string(), "C12");
    /// ```
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        let rest = s.strip_prefix('$').unwrap_or(s);
        let letters_len = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        if letters_len == 0 || letters_len > 3 {
            return Err(format!("Invalid cell reference: '{}'", s));
        }
        let (letters, digits) = rest.split_at(letters_len);
        let digits = digits.strip_prefix('$').unwrap_or(digits);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("Invalid cell reference: '{}'", s));
        }

        let col = column_from_letters(letters)
            .ok_or_else(|| format!("Column out of range in '{}'", s))?;
        let row: u32 = digits
            .parse()
            .map_err(|_| format!("Row out of range in '{}'", s))?;
        if row == 0 || row > MAX_ROW {
            return Err(format!("Row out of range in '{}'", s));
        }

        Ok(Self { row, col })
    }

    /// Column letters for this cell (`1` → `A`, `27` → `AA`)
    pub fn column_letters(&self) -> String {
        column_letters(self.col)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column_letters(), self.row)
    }
}

fn column_from_letters(letters: &str) -> Option<u32> {
    let mut col: u32 = 0;
    for c in letters.chars() {
        let digit = c.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
        col = col * 26 + digit;
    }
    (1..=MAX_COLUMN).contains(&col).then_some(col)
}

fn column_letters(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Where a mapped value lands in the workbook
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellTarget {
    /// A direct coordinate on the template's target sheet
    Cell(CellRef),
    /// A workbook defined name pointing at a single cell
    Named(String),
}

impl CellTarget {
    /// Parse a configured cell reference
    ///
    /// Anything that parses as a coordinate is a coordinate; otherwise the
    /// string must be a plausible defined name (letter, `_` or `\` first, no
    /// whitespace, no sheet qualifier).
    pub fn parse(s: &str) -> Result<Self, String> {
        let trimmed = s.trim();
        if let Ok(cell) = CellRef::parse(trimmed) {
            return Ok(CellTarget::Cell(cell));
        }

        let mut chars = trimmed.chars();
        let valid_start = chars
            .next()
            .map(|c| c.is_alphabetic() || c == '_' || c == '\\')
            .unwrap_or(false);
        let valid_rest = trimmed
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '\\'));

        if valid_start && valid_rest {
            Ok(CellTarget::Named(trimmed.to_string()))
        } else {
            Err(format!("Invalid cell reference or defined name: '{}'", s))
        }
    }
}

impl fmt::Display for CellTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellTarget::Cell(cell) => write!(f, "{}", cell),
            CellTarget::Named(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_simple() {
        assert_eq!(CellRef::parse("A1").unwrap(), CellRef::new(1, 1));
        assert_eq!(CellRef::parse("b7").unwrap(), CellRef::new(7, 2));
        assert_eq!(CellRef::parse("AA10").unwrap(), CellRef::new(10, 27));
        assert_eq!(CellRef::parse("$XFD$1048576").unwrap(), CellRef::new(MAX_ROW, MAX_COLUMN));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(CellRef::parse("").is_err());
        assert!(CellRef::parse("A0").is_err());
        assert!(CellRef::parse("1A").is_err());
        assert!(CellRef::parse("XFE1").is_err());
        assert!(CellRef::parse("ABCD1").is_err());
        assert!(CellRef::parse("A1:B2").is_err());
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(CellRef::new(1, 26).column_letters(), "Z");
        assert_eq!(CellRef::new(1, 28).column_letters(), "AB");
        assert_eq!(CellRef::new(1, 703).column_letters(), "AAA");
    }

    #[test]
    fn test_target_named() {
        assert_eq!(
            CellTarget::parse("UserName").unwrap(),
            CellTarget::Named("UserName".to_string())
        );
        assert_eq!(
            CellTarget::parse("$D$4").unwrap(),
            CellTarget::Cell(CellRef::new(4, 4))
        );
        assert!(CellTarget::parse("Sheet1!A1").is_err());
        assert!(CellTarget::parse("two words").is_err());
    }

    proptest! {
        #[test]
        fn prop_display_parses_back(row in 1u32..=MAX_ROW, col in 1u32..=MAX_COLUMN) {
            let cell = CellRef::new(row, col);
            prop_assert_eq!(CellRef::parse(&cell.to_string()).unwrap(), cell);
        }
    }
}
