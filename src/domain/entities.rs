//! Reference-data entities mirrored from persistent storage.

use serde::Serialize;

use crate::application::repos::{Entity, FieldValue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CountryRecord {
    /// ISO 3166-1 alpha-2 code.
    pub code: String,
    pub alpha3: String,
    pub numeric_code: i32,
    pub name: String,
    pub active: bool,
}

impl Entity for CountryRecord {
    const TABLE: &'static str = "countries";
    const COLUMNS: &'static [&'static str] = &["code", "alpha3", "numeric_code", "name", "active"];

    fn field(&self, column: &str) -> Option<FieldValue> {
        match column {
            "code" => Some(self.code.as_str().into()),
            "alpha3" => Some(self.alpha3.as_str().into()),
            "numeric_code" => Some(self.numeric_code.into()),
            "name" => Some(self.name.as_str().into()),
            "active" => Some(self.active.into()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CurrencyRecord {
    /// ISO 4217 alphabetic code.
    pub code: String,
    pub name: String,
    /// Digits after the decimal separator.
    pub minor_units: i32,
    pub active: bool,
}

impl Entity for CurrencyRecord {
    const TABLE: &'static str = "currencies";
    const COLUMNS: &'static [&'static str] = &["code", "name", "minor_units", "active"];

    fn field(&self, column: &str) -> Option<FieldValue> {
        match column {
            "code" => Some(self.code.as_str().into()),
            "name" => Some(self.name.as_str().into()),
            "minor_units" => Some(self.minor_units.into()),
            "active" => Some(self.active.into()),
            _ => None,
        }
    }
}
