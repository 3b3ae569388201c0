//! Conversions between A1-style cell references and zero-based indexes.
//!
//! Indexes past the last row or column a worksheet can hold are rejected.

/// Zero-based index of column `XFD`.
pub(crate) const MAX_COL: usize = 16_383;
/// Zero-based index of row 1048576.
pub(crate) const MAX_ROW: usize = 1_048_575;

/// Converts a column name such as `"AB"` to its zero-based index.
pub(crate) fn col_to_index(col: &str) -> Option<usize> {
    if col.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for character in col.chars() {
        if !character.is_ascii_alphabetic() {
            return None;
        }
        let digit = (character.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
        if index > MAX_COL + 1 {
            return None;
        }
    }
    Some(index - 1)
}

/// Converts a one-based row number such as `"12"` to its zero-based index.
pub(crate) fn row_to_index(row: &str) -> Option<usize> {
    row.parse::<usize>()
        .ok()?
        .checked_sub(1)
        .filter(|&row| row <= MAX_ROW)
}

/// Splits `"B12"` into `(11, 1)`.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (col, row) = reference.split_at(split);
    Some((row_to_index(row)?, col_to_index(col)?))
}

fn col_to_name(col: usize) -> String {
    let mut name = Vec::new();
    let mut col = col + 1;
    while col > 0 {
        name.push(b'A' + ((col - 1) % 26) as u8);
        col = (col - 1) / 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Builds the A1-style reference of a zero-based `(row, col)` pair.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", col_to_name(col), row.saturating_add(1))
}
