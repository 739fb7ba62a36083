use std::fmt;

use serde::{Deserialize, Serialize};

/// A city/country pair. Equality is exact, case-sensitive string match on
/// both fields, everywhere locations are compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub country: String,
}

impl Location {
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            country: country.into(),
        }
    }

    /// An unresolved placeholder for the natural-language trip path, filled
    /// in once intent extraction has run.
    pub fn pending() -> Self {
        Self {
            city: String::new(),
            country: String::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.city.trim().is_empty() && !self.country.trim().is_empty()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.city, self.country)
    }
}
