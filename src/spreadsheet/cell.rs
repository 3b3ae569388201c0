use crate::error::DecodeError;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::SpreadsheetError;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::TimeDelta;
use chrono::Timelike;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Which day serial number zero refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Epoch {
    /// Day 1 is 1900-01-01, with the phantom 1900-02-29 at day 60.
    Excel1900,
    /// Day 0 is 1904-01-01, used by old Mac workbooks.
    Excel1904,
}

impl Epoch {
    pub(crate) fn from_1904_flag(is_1904: bool) -> Self {
        if is_1904 { Epoch::Excel1904 } else { Epoch::Excel1900 }
    }

    fn date_of(self, day: i64) -> Option<NaiveDate> {
        let shift = match self {
            Epoch::Excel1904 => 1462,
            Epoch::Excel1900 if day < 60 => 1,
            Epoch::Excel1900 => 0,
        };
        let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
        base.checked_add_signed(TimeDelta::try_days(day + shift)?)
    }
}

/// What part of a date serial a number format displays.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SerialKind {
    Date,
    DateTime,
    /// Time of day only; kept as `HH:MM:SS` text.
    Time,
}

/// How the raw string of a decoded cell must be interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// `1`/`0` or `TRUE`/`FALSE`
    Boolean,
    Number,
    /// A number formatted as a date, time or both.
    Serial(SerialKind, Epoch),
    /// `t="d"` cells hold ISO 8601 text.
    IsoDateTime,
    InlineString,
    /// Index into the shared string table
    SharedString,
    /// Literal error code such as `#DIV/0!`, kept as text.
    Error,
}

impl CellType {
    /// Cell type implied by one of the reserved `numFmtId`s, if it is a date or time.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        let kind = match id.parse::<u16>().ok()? {
            14..=17 => SerialKind::Date,
            22 => SerialKind::DateTime,
            18..=21 | 45..=47 => SerialKind::Time,
            _ => return None,
        };
        Some(CellType::Serial(kind, Epoch::from_1904_flag(is_1904)))
    }

    /// Classifies a custom format code by the date and time tokens outside
    /// quoted literals, `[...]` sections and escaped characters.
    pub(crate) fn parse_custom_number_format(code: &str, is_1904: bool) -> Self {
        let mut has_date = false;
        let mut has_time = false;
        let mut chars = code.chars();
        while let Some(token) = chars.next() {
            match token {
                '\\' | '_' => {
                    chars.next();
                }
                '"' => {
                    chars.by_ref().find(|&c| c == '"');
                }
                '[' => {
                    chars.by_ref().find(|&c| c == ']');
                }
                'y' | 'Y' | 'd' | 'D' => has_date = true,
                'h' | 'H' | 's' | 'S' => has_time = true,
                _ => (),
            }
        }

        let kind = match (has_date, has_time) {
            (true, true) => SerialKind::DateTime,
            (true, false) => SerialKind::Date,
            (false, true) => SerialKind::Time,
            (false, false) => return CellType::Number,
        };
        CellType::Serial(kind, Epoch::from_1904_flag(is_1904))
    }
}

/// Text shown for a BIFF8 error code.
pub(crate) fn to_error_value(code: u8) -> &'static str {
    match code {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => "#ERROR!",
    }
}

/// The natively typed value of a decoded spreadsheet cell.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Empty cells and empty strings both count as blank.
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty) || matches!(self, CellValue::Text(text) if text.is_empty())
    }

    /// Numeric view of the value; text is parsed leniently after trimming.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(number) => Some(*number),
            CellValue::Text(text) => text.trim().parse::<f64>().ok().filter(|number| number.is_finite()),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(value) => write!(f, "{value}"),
            // Integral values drop the decimal point.
            CellValue::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => write!(f, "{}", *number as i64),
            CellValue::Number(number) => write!(f, "{number}"),
            CellValue::Text(text) => f.write_str(text),
            CellValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            CellValue::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// A decoded cell before its raw text is interpreted.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    pub(crate) row: usize,
    pub(crate) col: usize,
    pub(crate) kind: CellType,
    pub(crate) value: String,
}

impl Cell {
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Resolves the raw value into a [`CellValue`].
    ///
    /// `mappings` translates shared string indexes into positions of
    /// `shared_strings` when only a subset of the table was loaded.
    pub(crate) fn to_value(&self, shared_strings: &[String], mappings: &HashMap<usize, usize>) -> Result<CellValue, DecodeError> {
        Ok(match self.kind {
            CellType::Empty => CellValue::Empty,
            CellType::Boolean => CellValue::Bool(self.value == "1" || self.value.eq_ignore_ascii_case("true")),
            CellType::Number => CellValue::Number(self.value.trim().parse::<f64>()?),
            CellType::Serial(kind, epoch) => {
                let datetime = self.serial_datetime(epoch)?;
                match kind {
                    SerialKind::Date => CellValue::Date(datetime.date()),
                    SerialKind::DateTime => CellValue::DateTime(datetime),
                    SerialKind::Time => CellValue::Text(time_text(datetime.time())),
                }
            }
            CellType::IsoDateTime => parse_iso(&self.value),
            CellType::InlineString | CellType::Error => CellValue::Text(self.value.clone()),
            CellType::SharedString => {
                let id = self.value.parse::<usize>()?;
                let slot = if mappings.is_empty() { Some(id) } else { mappings.get(&id).copied() };
                let text = slot.and_then(|slot| shared_strings.get(slot)).ok_or_else(|| self.invalid())?;
                CellValue::Text(text.clone())
            }
        })
    }

    /// Interprets the raw value as a day serial, rounded to the millisecond.
    fn serial_datetime(&self, epoch: Epoch) -> Result<NaiveDateTime, DecodeError> {
        let serial = self.value.trim().parse::<f64>()?;
        let millis = (serial * MILLIS_PER_DAY as f64).round();
        if !millis.is_finite() || millis.abs() > (i64::MAX / 2) as f64 {
            return Err(self.invalid().into());
        }
        let millis = millis as i64;
        let date = epoch.date_of(millis.div_euclid(MILLIS_PER_DAY)).ok_or_else(|| self.invalid())?;
        let of_day = millis.rem_euclid(MILLIS_PER_DAY) as u32;
        let time = NaiveTime::from_num_seconds_from_midnight_opt(of_day / 1000, (of_day % 1000) * 1_000_000)
            .ok_or_else(|| self.invalid())?;
        Ok(date.and_time(time))
    }

    fn invalid(&self) -> SpreadsheetError {
        SpreadsheetError::CellValueError(self.reference(), self.value.clone())
    }
}

fn time_text(time: NaiveTime) -> String {
    let pattern = if time.nanosecond() == 0 { "%H:%M:%S" } else { "%H:%M:%S%.3f" };
    time.format(pattern).to_string()
}

fn parse_iso(text: &str) -> CellValue {
    if let Ok(datetime) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        CellValue::DateTime(datetime)
    } else if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        CellValue::Date(date)
    } else {
        CellValue::Text(text.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATE_1900: CellType = CellType::Serial(SerialKind::Date, Epoch::Excel1900);

    fn cell(kind: CellType, value: &str) -> Cell {
        Cell { row: 0, col: 0, kind, value: value.to_owned() }
    }

    fn value(kind: CellType, raw: &str) -> CellValue {
        cell(kind, raw).to_value(&[], &HashMap::new()).unwrap()
    }

    #[test]
    fn classifies_custom_formats() {
        let classify = |code| CellType::parse_custom_number_format(code, false);
        assert_eq!(classify("yyyy-mm-dd"), DATE_1900);
        assert_eq!(classify("hh:mm:ss"), CellType::Serial(SerialKind::Time, Epoch::Excel1900));
        assert_eq!(classify("#,##0.00"), CellType::Number);
        assert_eq!(classify("[Red]\"days\"0"), CellType::Number);
        assert_eq!(classify("0\\d"), CellType::Number);
        assert_eq!(
            CellType::parse_custom_number_format("dd/mm/yyyy hh:mm", true),
            CellType::Serial(SerialKind::DateTime, Epoch::Excel1904)
        );
    }

    #[test]
    fn classifies_builtin_formats() {
        assert_eq!(CellType::parse_builtin_number_format_id("14", false), Some(DATE_1900));
        assert_eq!(
            CellType::parse_builtin_number_format_id("22", true),
            Some(CellType::Serial(SerialKind::DateTime, Epoch::Excel1904))
        );
        assert_eq!(CellType::parse_builtin_number_format_id("4", false), None);
        assert_eq!(CellType::parse_builtin_number_format_id("abc", false), None);
    }

    #[test]
    fn converts_serial_dates() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(value(DATE_1900, "45306"), CellValue::Date(date));
        assert_eq!(value(CellType::Serial(SerialKind::Date, Epoch::Excel1904), "43844"), CellValue::Date(date));
        assert_eq!(value(DATE_1900, "1"), CellValue::Date(NaiveDate::from_ymd_opt(1900, 1, 1).unwrap()));
        assert_eq!(value(DATE_1900, "61"), CellValue::Date(NaiveDate::from_ymd_opt(1900, 3, 1).unwrap()));
    }

    #[test]
    fn converts_serial_datetimes_and_times() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(
            value(CellType::Serial(SerialKind::DateTime, Epoch::Excel1900), "45306.5"),
            CellValue::DateTime(expected)
        );
        assert_eq!(
            value(CellType::Serial(SerialKind::Time, Epoch::Excel1900), "0.75"),
            CellValue::Text("18:00:00".to_owned())
        );
    }

    #[test]
    fn iso_cells_fall_back_to_text() {
        assert_eq!(
            value(CellType::IsoDateTime, "2024-01-15"),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
        assert_eq!(value(CellType::IsoDateTime, "soon"), CellValue::Text("soon".to_owned()));
    }

    #[test]
    fn malformed_values_are_errors_not_panics() {
        assert!(cell(CellType::Number, "abc").to_value(&[], &HashMap::new()).is_err());
        assert!(cell(DATE_1900, "1e300").to_value(&[], &HashMap::new()).is_err());
        assert!(cell(CellType::SharedString, "3").to_value(&[], &HashMap::new()).is_err());
    }

    #[test]
    fn resolves_shared_strings_through_mappings() {
        let strings = vec!["Product 1".to_owned()];
        let mappings = HashMap::from([(7usize, 0usize)]);
        let resolved = cell(CellType::SharedString, "7").to_value(&strings, &mappings).unwrap();
        assert_eq!(resolved, CellValue::Text("Product 1".to_owned()));
    }

    #[test]
    fn keeps_error_codes_as_text() {
        assert_eq!(value(CellType::Error, "#DIV/0!"), CellValue::Text("#DIV/0!".to_owned()));
        assert_eq!(to_error_value(0x07), "#DIV/0!");
    }

    #[test]
    fn displays_integral_numbers_without_decimals() {
        assert_eq!(CellValue::Number(10.0).to_string(), "10");
        assert_eq!(CellValue::Number(10.5).to_string(), "10.5");
        assert_eq!(CellValue::Bool(true).to_string(), "true");
        assert_eq!(CellValue::Empty.to_string(), "");
    }
}
