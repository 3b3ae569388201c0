//! Catalog rows decoded from an import file.

use crate::spreadsheet::CellValue;
use crate::table::Column;
use crate::table::Columns;
use crate::table::DisplayValue;
use crate::table::TableError;
use serde::Serialize;
use std::collections::BTreeMap;

/// One data row of an import file.
///
/// Every field is optional and keeps the cell's native type: the file is
/// untrusted, so nothing here is validated beyond decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportRecord {
    pub id: Option<CellValue>,
    pub code: Option<CellValue>,
    pub description: Option<CellValue>,
    pub price: Option<CellValue>,
    /// Values under headers that are not catalog fields
    pub extra: BTreeMap<String, CellValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Code,
    Description,
    Price,
}

impl Field {
    fn from_header(header: &str) -> Option<Field> {
        match header.trim().to_lowercase().as_str() {
            "id" => Some(Field::Id),
            "code" | "codigo" | "código" => Some(Field::Code),
            "description" | "descripcion" | "descripción" => Some(Field::Description),
            "price" | "precio" => Some(Field::Price),
            _ => None,
        }
    }
}

impl ImportRecord {
    /// Builds a record from header-keyed cells. The first header matching a
    /// field wins; later duplicates land in `extra`.
    pub fn from_fields<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a CellValue)>,
    {
        let mut record = ImportRecord::default();
        for (header, value) in fields {
            let slot = match Field::from_header(header) {
                Some(Field::Id) => &mut record.id,
                Some(Field::Code) => &mut record.code,
                Some(Field::Description) => &mut record.description,
                Some(Field::Price) => &mut record.price,
                None => {
                    record.extra.insert(header.to_owned(), value.clone());
                    continue;
                }
            };
            if slot.is_none() {
                *slot = Some(value.clone());
            } else {
                record.extra.insert(header.to_owned(), value.clone());
            }
        }
        record
    }

    /// The price when the cell holds a number or numeric text.
    pub fn price_amount(&self) -> Option<f64> {
        self.price.as_ref().and_then(CellValue::as_f64)
    }
}

impl From<&CellValue> for DisplayValue {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Empty => DisplayValue::Empty,
            CellValue::Bool(value) => DisplayValue::Bool(*value),
            CellValue::Number(number) => DisplayValue::Number(*number),
            CellValue::Text(text) => DisplayValue::Text(text.to_owned()),
            date => DisplayValue::Text(date.to_string()),
        }
    }
}

fn display(value: &Option<CellValue>) -> DisplayValue {
    value.as_ref().map(DisplayValue::from).unwrap_or_default()
}

/// Columns of the import preview: id, description, price and an action column keyed by id.
pub fn preview_columns() -> Result<Columns<ImportRecord>, TableError> {
    Columns::new(vec![
        Column::new("id", "ID", |record: &ImportRecord| display(&record.id)),
        Column::new("descripcion", "Descripción", |record: &ImportRecord| display(&record.description))
            .with_min_width(700)
            .with_max_width(700),
        Column::new("precio", "Precio", |record: &ImportRecord| display(&record.price)),
        Column::new("action", "Acción", |record: &ImportRecord| display(&record.id)),
    ])
}
