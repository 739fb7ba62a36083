#![allow(dead_code)]

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, models::location::Location};

/// Practical caps on trip shape, mirrored from the form limits.
pub const MAX_TRIP_DAYS: u32 = 30;
pub const MAX_ADULTS: u32 = 10;
pub const MAX_CHILDREN: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, AppError> {
        if end_date < start_date {
            return Err(AppError::Validation(
                "end date must not be before start date".into(),
            ));
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }

    /// Inclusive span in days; a same-day trip is 1 day long.
    pub fn duration_days(&self) -> u32 {
        (self.end_date - self.start_date).num_days() as u32 + 1
    }

    /// Calendar date of the 1-indexed itinerary day.
    pub fn date_for_day(&self, day_number: u32) -> NaiveDate {
        self.start_date + Duration::days(i64::from(day_number) - 1)
    }

    /// Creation-time checks only; refinements never re-check the past.
    pub fn validate_for_creation(&self, today: NaiveDate) -> Result<(), AppError> {
        if self.start_date < today {
            return Err(AppError::Validation(
                "trip must not start in the past".into(),
            ));
        }
        if self.duration_days() > MAX_TRIP_DAYS {
            return Err(AppError::Validation(format!(
                "trips are capped at {MAX_TRIP_DAYS} days"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Travelers {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
}

impl Default for Travelers {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            infants: 0,
        }
    }
}

impl Travelers {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.adults < 1 {
            return Err(AppError::Validation(
                "at least one adult traveler is required".into(),
            ));
        }
        if self.adults > MAX_ADULTS || self.children > MAX_CHILDREN {
            return Err(AppError::Validation(format!(
                "traveler counts are capped at {MAX_ADULTS} adults and {MAX_CHILDREN} children"
            )));
        }
        if self.infants > self.adults {
            return Err(AppError::Validation(
                "each infant requires an accompanying adult".into(),
            ));
        }
        Ok(())
    }

    pub fn total(&self) -> u32 {
        self.adults + self.children + self.infants
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetLevel {
    Budget,
    Moderate,
    Luxury,
}

impl BudgetLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetLevel::Budget => "budget",
            BudgetLevel::Moderate => "moderate",
            BudgetLevel::Luxury => "luxury",
        }
    }
}

impl fmt::Display for BudgetLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    Air,
    Road,
}

impl TransportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Air => "air",
            TransportType::Road => "road",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stop on the trip, optionally with an allocated share of the days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    #[serde(flatten)]
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
}

impl Destination {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            days: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub accommodations: Vec<String>,
    #[serde(default)]
    pub dining_preferences: Vec<String>,
    #[serde(default)]
    pub activities_preferences: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_requirements: Option<String>,
}

impl Preferences {
    /// Structured-path preferences must carry at least one interest tag.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.interests.iter().all(|tag| tag.trim().is_empty()) {
            return Err(AppError::Validation(
                "preferences must include at least one interest".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    pub origin: Location,
    pub destinations: Vec<Destination>,
    #[serde(flatten)]
    pub date_range: DateRange,
    pub travelers: Travelers,
    pub budget_level: BudgetLevel,
    pub transport_type: TransportType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natural_language_input: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    /// Structured creation path. All invariants are checked here, before
    /// anything is persisted or any external call is made.
    pub fn from_structured(
        origin: Location,
        destinations: Vec<Destination>,
        date_range: DateRange,
        travelers: Travelers,
        budget_level: BudgetLevel,
        transport_type: TransportType,
        preferences: Option<Preferences>,
    ) -> Result<Self, AppError> {
        if !origin.is_complete() {
            return Err(AppError::Validation(
                "origin requires a city and a country".into(),
            ));
        }
        if destinations.is_empty() {
            return Err(AppError::Validation(
                "at least one destination is required".into(),
            ));
        }
        if let Some(dest) = destinations.iter().find(|d| !d.location.is_complete()) {
            return Err(AppError::Validation(format!(
                "destination \"{}\" requires a city and a country",
                dest.location
            )));
        }
        travelers.validate()?;
        date_range.validate_for_creation(Utc::now().date_naive())?;
        if let Some(prefs) = &preferences {
            prefs.validate()?;
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            origin,
            destinations,
            date_range,
            travelers,
            budget_level,
            transport_type,
            preferences,
            natural_language_input: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Natural-language creation path: the description is authoritative and
    /// every structured field gets a conservative default until intent
    /// extraction fills it in.
    pub fn from_natural_language(
        description: &str,
        date_range: DateRange,
    ) -> Result<Self, AppError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(AppError::Validation(
                "trip description must not be empty".into(),
            ));
        }
        date_range.validate_for_creation(Utc::now().date_naive())?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            origin: Location::pending(),
            destinations: Vec::new(),
            date_range,
            travelers: Travelers::default(),
            budget_level: BudgetLevel::Moderate,
            transport_type: TransportType::Air,
            preferences: None,
            natural_language_input: Some(description.to_string()),
            created_at: now,
            updated_at: now,
        })
    }

    /// One-time preference attachment on the structured path.
    pub fn attach_preferences(&mut self, preferences: Preferences) -> Result<(), AppError> {
        if self.preferences.is_some() {
            return Err(AppError::Validation(
                "preferences are already attached to this trip".into(),
            ));
        }
        preferences.validate()?;
        self.preferences = Some(preferences);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// True while the structured fields are still placeholders awaiting
    /// extraction from the free-text description.
    pub fn needs_intent_extraction(&self) -> bool {
        self.natural_language_input.is_some() && self.destinations.is_empty()
    }

    pub fn duration_days(&self) -> u32 {
        self.date_range.duration_days()
    }

    pub fn interests_summary(&self) -> String {
        let interests: Vec<&str> = self
            .preferences
            .iter()
            .flat_map(|p| p.interests.iter())
            .map(String::as_str)
            .filter(|tag| !tag.trim().is_empty())
            .collect();
        if interests.is_empty() {
            "general tourism".to_string()
        } else {
            interests.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn future_range() -> DateRange {
        DateRange::new(date(2030, 5, 1), date(2030, 5, 3)).unwrap()
    }

    #[test]
    fn inclusive_duration() {
        let range = future_range();
        assert_eq!(range.duration_days(), 3);
        let single = DateRange::new(date(2030, 5, 1), date(2030, 5, 1)).unwrap();
        assert_eq!(single.duration_days(), 1);
    }

    #[test]
    fn date_for_day_offsets_from_start() {
        let range = future_range();
        assert_eq!(range.date_for_day(1), date(2030, 5, 1));
        assert_eq!(range.date_for_day(3), date(2030, 5, 3));
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(DateRange::new(date(2030, 5, 3), date(2030, 5, 1)).is_err());
    }

    #[test]
    fn infants_require_accompanying_adults() {
        let travelers = Travelers {
            adults: 1,
            children: 0,
            infants: 2,
        };
        assert!(travelers.validate().is_err());
    }

    #[test]
    fn traveler_caps_apply() {
        let travelers = Travelers {
            adults: 11,
            children: 0,
            infants: 0,
        };
        assert!(travelers.validate().is_err());
    }

    #[test]
    fn structured_trip_requires_destinations() {
        let result = Trip::from_structured(
            Location::new("New York", "USA"),
            Vec::new(),
            future_range(),
            Travelers::default(),
            BudgetLevel::Moderate,
            TransportType::Air,
            None,
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn preferences_attach_once() {
        let mut trip = Trip::from_structured(
            Location::new("New York", "USA"),
            vec![Destination::new(Location::new("Paris", "France"))],
            future_range(),
            Travelers::default(),
            BudgetLevel::Moderate,
            TransportType::Air,
            None,
        )
        .unwrap();

        let prefs = Preferences {
            interests: vec!["food".into()],
            ..Preferences::default()
        };
        trip.attach_preferences(prefs.clone()).unwrap();
        assert!(trip.attach_preferences(prefs).is_err());
    }

    #[test]
    fn natural_language_trip_uses_conservative_defaults() {
        let trip =
            Trip::from_natural_language("a week of food and museums in Lisbon", future_range())
                .unwrap();
        assert!(trip.needs_intent_extraction());
        assert_eq!(trip.travelers, Travelers::default());
        assert_eq!(trip.budget_level, BudgetLevel::Moderate);
        assert_eq!(trip.transport_type, TransportType::Air);
        assert!(trip.destinations.is_empty());
    }

    #[test]
    fn budget_and_transport_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&BudgetLevel::Luxury).unwrap(),
            "\"luxury\""
        );
        assert_eq!(serde_json::to_string(&TransportType::Air).unwrap(), "\"air\"");
    }

    #[test]
    fn destination_flattens_location_on_the_wire() {
        let dest = Destination {
            location: Location::new("Kyoto", "Japan"),
            days: Some(2),
        };
        let json = serde_json::to_value(&dest).unwrap();
        assert_eq!(json["city"], "Kyoto");
        assert_eq!(json["days"], 2);

        let parsed: Destination =
            serde_json::from_str(r#"{"city":"Kyoto","country":"Japan"}"#).unwrap();
        assert_eq!(parsed.location, Location::new("Kyoto", "Japan"));
        assert_eq!(parsed.days, None);
    }
}
