//! Column declarations: how a row is read and how its value is rendered.

use crate::table::TableError;
use std::collections::HashSet;
use std::fmt;
use std::fmt::Display;

/// A cell value as produced by a column accessor.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DisplayValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Integer(i64),
    Bool(bool),
}

impl Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayValue::Empty => Ok(()),
            DisplayValue::Text(text) => f.write_str(text),
            // Integral numbers render without a decimal point.
            DisplayValue::Number(number) if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 => {
                write!(f, "{}", *number as i64)
            }
            DisplayValue::Number(number) => write!(f, "{}", number),
            DisplayValue::Integer(integer) => write!(f, "{}", integer),
            DisplayValue::Bool(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for DisplayValue {
    fn from(value: &str) -> Self {
        DisplayValue::Text(value.to_owned())
    }
}

impl From<String> for DisplayValue {
    fn from(value: String) -> Self {
        DisplayValue::Text(value)
    }
}

impl From<f64> for DisplayValue {
    fn from(value: f64) -> Self {
        DisplayValue::Number(value)
    }
}

impl From<i64> for DisplayValue {
    fn from(value: i64) -> Self {
        DisplayValue::Integer(value)
    }
}

impl From<bool> for DisplayValue {
    fn from(value: bool) -> Self {
        DisplayValue::Bool(value)
    }
}

impl<V: Into<DisplayValue>> From<Option<V>> for DisplayValue {
    fn from(value: Option<V>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Width bounds applied to columns that leave them unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSizing {
    pub size: u16,
    pub min: u16,
    pub max: u16,
}

impl Default for ColumnSizing {
    fn default() -> Self {
        Self { size: 50, min: 50, max: 500 }
    }
}

type Accessor<T> = Box<dyn Fn(&T) -> DisplayValue>;
type Renderer = Box<dyn Fn(&DisplayValue) -> String>;

/// Declares one column of a table over rows of type `T`.
pub struct Column<T> {
    id: String,
    header: String,
    accessor: Accessor<T>,
    renderer: Option<Renderer>,
    min_width: Option<u16>,
    max_width: Option<u16>,
    default_width: Option<u16>,
}

impl<T> Column<T> {
    /// `accessor` must be a pure read of the row.
    pub fn new<F>(id: impl Into<String>, header: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(&T) -> DisplayValue + 'static,
    {
        Self {
            id: id.into(),
            header: header.into(),
            accessor: Box::new(accessor),
            renderer: None,
            min_width: None,
            max_width: None,
            default_width: None,
        }
    }

    pub fn with_renderer<F>(mut self, renderer: F) -> Self
    where
        F: Fn(&DisplayValue) -> String + 'static,
    {
        self.renderer = Some(Box::new(renderer));
        self
    }

    pub fn with_min_width(mut self, width: u16) -> Self {
        self.min_width = Some(width);
        self
    }

    pub fn with_max_width(mut self, width: u16) -> Self {
        self.max_width = Some(width);
        self
    }

    pub fn with_default_width(mut self, width: u16) -> Self {
        self.default_width = Some(width);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn value(&self, row: &T) -> DisplayValue {
        (self.accessor)(row)
    }

    /// Renders a row's cell through the renderer, or the value's display form.
    pub fn render(&self, row: &T) -> String {
        let value = self.value(row);
        match &self.renderer {
            Some(renderer) => renderer(&value),
            None => value.to_string(),
        }
    }

    /// Resolved width: `clamp(default, min, max)` with unset bounds taken from `sizing`.
    pub fn width(&self, sizing: &ColumnSizing) -> u16 {
        let min = self.min_width.unwrap_or(sizing.min);
        let max = self.max_width.unwrap_or(sizing.max).max(min);
        self.default_width.unwrap_or(sizing.size).clamp(min, max)
    }

    fn validate_widths(&self) -> Result<(), TableError> {
        let invalid = self.min_width.zip(self.default_width).is_some_and(|(min, default)| min > default)
            || self.default_width.zip(self.max_width).is_some_and(|(default, max)| default > max)
            || self.min_width.zip(self.max_width).is_some_and(|(min, max)| min > max);
        if invalid {
            return Err(TableError::InvalidColumnWidth {
                id: self.id.to_owned(),
                min: self.min_width,
                default: self.default_width,
                max: self.max_width,
            });
        }
        Ok(())
    }
}

impl<T> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("id", &self.id)
            .field("header", &self.header)
            .field("min_width", &self.min_width)
            .field("max_width", &self.max_width)
            .field("default_width", &self.default_width)
            .finish_non_exhaustive()
    }
}

/// A validated, ordered column set: ids are unique and widths are consistent.
#[derive(Debug)]
pub struct Columns<T> {
    columns: Vec<Column<T>>,
    sizing: ColumnSizing,
}

impl<T> Columns<T> {
    pub fn new(columns: Vec<Column<T>>) -> Result<Self, TableError> {
        Self::with_sizing(columns, ColumnSizing::default())
    }

    pub fn with_sizing(columns: Vec<Column<T>>, sizing: ColumnSizing) -> Result<Self, TableError> {
        let mut ids = HashSet::new();
        for column in &columns {
            if !ids.insert(column.id.as_str()) {
                return Err(TableError::DuplicateColumnId(column.id.to_owned()));
            }
            column.validate_widths()?;
        }
        Ok(Self { columns, sizing })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column<T>> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn sizing(&self) -> &ColumnSizing {
        &self.sizing
    }
}
