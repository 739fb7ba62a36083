//! Initial itinerary generation and free-text trip-intent extraction.
//!
//! Owns version 1 of every itinerary. Model output is parsed into the
//! itinerary shapes, then repaired against the trip before acceptance.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    error::AppError,
    models::{
        itinerary::{Day, Itinerary},
        location::Location,
        trip::{BudgetLevel, DateRange, Destination, Travelers, TransportType, Trip},
    },
    services::llm::{parse_json_payload, CompletionClient, CompletionRequest},
    validation,
};

/// Shape the model is asked to produce for a full itinerary.
#[derive(Debug, Deserialize)]
pub(crate) struct ItineraryDraft {
    #[serde(default)]
    pub days: Vec<Day>,
    #[serde(default)]
    pub total_cost_estimate: Option<f64>,
}

/// Structured travel intent pulled out of a free-text trip description.
/// Every field is optional; whatever the model could not identify keeps
/// the trip's conservative defaults.
#[derive(Debug, Default, Deserialize)]
pub struct TripIntent {
    #[serde(default)]
    pub origin: Option<Location>,
    #[serde(default)]
    pub destinations: Vec<Destination>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub travelers: Option<Travelers>,
    #[serde(default)]
    pub budget_level: Option<BudgetLevel>,
    #[serde(default)]
    pub transport_type: Option<TransportType>,
    #[serde(default)]
    pub interests: Vec<String>,
}

impl TripIntent {
    /// Fold extracted fields into a natural-language trip draft. Extraction
    /// output is untrusted: invalid pieces are skipped rather than applied,
    /// but a draft that still has no usable destinations afterwards is an
    /// error — there is nothing to plan.
    pub fn apply(self, trip: &mut Trip) -> Result<(), AppError> {
        if let Some(origin) = self.origin {
            if origin.is_complete() {
                trip.origin = origin;
            }
        }

        let destinations: Vec<Destination> = self
            .destinations
            .into_iter()
            .filter(|dest| dest.location.is_complete())
            .collect();
        if !destinations.is_empty() {
            trip.destinations = destinations;
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            match DateRange::new(start, end) {
                Ok(range) => trip.date_range = range,
                Err(_) => warn!("extracted date range is inverted; keeping trip dates"),
            }
        }

        if let Some(travelers) = self.travelers {
            match travelers.validate() {
                Ok(()) => trip.travelers = travelers,
                Err(err) => warn!(%err, "extracted traveler composition rejected"),
            }
        }

        if let Some(budget) = self.budget_level {
            trip.budget_level = budget;
        }
        if let Some(transport) = self.transport_type {
            trip.transport_type = transport;
        }

        let interests: Vec<String> = self
            .interests
            .into_iter()
            .filter(|tag| !tag.trim().is_empty())
            .collect();
        if !interests.is_empty() {
            trip.preferences.get_or_insert_with(Default::default).interests = interests;
        }

        if trip.destinations.is_empty() {
            return Err(AppError::Validation(
                "could not extract any destination from the trip description".into(),
            ));
        }
        trip.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Clone)]
pub struct GenerationService {
    llm: Arc<dyn CompletionClient>,
}

impl GenerationService {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    /// Produce the version-1 itinerary for a trip. The caller persists it;
    /// nothing is stored here.
    pub async fn generate(&self, trip: &Trip) -> Result<Itinerary, AppError> {
        let prompt = generation_prompt(trip);
        let raw = self
            .llm
            .complete(CompletionRequest::creative(prompt))
            .await?;
        let draft: ItineraryDraft = parse_json_payload(&raw)?;
        debug!(
            trip_id = %trip.id,
            drafted_days = draft.days.len(),
            "parsed generated itinerary draft"
        );

        let now = Utc::now();
        let candidate = Itinerary {
            trip_id: trip.id.clone(),
            ai_generated: true,
            total_cost_estimate: draft.total_cost_estimate.unwrap_or(0.0),
            days: draft.days,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let violations = validation::validate(&candidate, trip);
        if !violations.is_empty() {
            debug!(
                trip_id = %trip.id,
                violations = violations.len(),
                "repairing generated itinerary"
            );
        }
        let itinerary = validation::repair(&candidate, trip);
        info!(trip_id = %trip.id, days = itinerary.days.len(), "itinerary generated");
        Ok(itinerary)
    }

    /// Extract structured travel intent from a free-text description.
    pub async fn extract_intent(&self, text: &str) -> Result<TripIntent, AppError> {
        let raw = self
            .llm
            .complete(CompletionRequest::precise(intent_prompt(text)))
            .await?;
        let intent = parse_json_payload(&raw)?;
        debug!(input_len = text.len(), "extracted trip intent");
        Ok(intent)
    }
}

fn describe_destinations(trip: &Trip) -> String {
    trip.destinations
        .iter()
        .map(|dest| match dest.days {
            Some(days) => format!("{} ({days} days)", dest.location),
            None => dest.location.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn generation_prompt(trip: &Trip) -> String {
    let duration = trip.duration_days();
    let destinations = describe_destinations(trip);
    let travelers = trip.travelers;
    let interests = trip.interests_summary();

    format!(
        "Create a detailed {duration}-day travel itinerary for a trip from {origin} \
         to {destinations} for {adults} adults, {children} children and {infants} infants.\n\
         \n\
         Trip details:\n\
         - Budget level: {budget}\n\
         - Transport type: {transport}\n\
         - Travel dates: {start} to {end}\n\
         - Interests: {interests}\n\
         \n\
         For each day provide 3-5 activities, meal suggestions and an accommodation \
         recommendation, with approximate costs. Day numbers start at 1 and dates run \
         from {start}. Return ONLY valid JSON, no explanations, matching exactly:\n\
         {{\"days\":[{{\"day_number\":1,\"date\":\"YYYY-MM-DD\",\
         \"activities\":[{{\"name\":\"...\",\"description\":\"...\",\
         \"location\":{{\"city\":\"...\",\"country\":\"...\"}},\
         \"start_time\":\"HH:MM\",\"end_time\":\"HH:MM\",\"cost_estimate\":0.0}}],\
         \"meals\":[{{\"name\":\"...\",\"description\":\"...\",\"cost_estimate\":0.0}}],\
         \"accommodation\":{{\"name\":\"...\",\
         \"location\":{{\"city\":\"...\",\"country\":\"...\"}},\
         \"check_in_date\":\"YYYY-MM-DD\",\"check_out_date\":\"YYYY-MM-DD\",\
         \"cost_estimate\":0.0}}}}],\"total_cost_estimate\":0.0}}",
        origin = trip.origin,
        adults = travelers.adults,
        children = travelers.children,
        infants = travelers.infants,
        budget = trip.budget_level,
        transport = trip.transport_type,
        start = trip.date_range.start_date,
        end = trip.date_range.end_date,
    )
}

fn intent_prompt(text: &str) -> String {
    format!(
        "Extract structured travel intent from the following text. Return a JSON object with \
         these keys (omit anything the text does not state): \
         \"origin\" ({{\"city\",\"country\"}}), \
         \"destinations\" (list of {{\"city\",\"country\"}}), \
         \"start_date\" and \"end_date\" (YYYY-MM-DD), \
         \"travelers\" ({{\"adults\",\"children\",\"infants\"}}), \
         \"budget_level\" (budget|moderate|luxury), \
         \"transport_type\" (air|road), \
         \"interests\" (list of strings).\n\
         \n\
         Text: {text}\n\
         \n\
         Return ONLY valid JSON without any explanations or additional text."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nl_trip() -> Trip {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2030, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2030, 5, 3).unwrap(),
        )
        .unwrap();
        Trip::from_natural_language("three days of art and food in Paris", range).unwrap()
    }

    #[test]
    fn intent_fills_in_structured_fields() {
        let mut trip = nl_trip();
        let intent: TripIntent = serde_json::from_str(
            r#"{
                "origin": {"city": "New York", "country": "USA"},
                "destinations": [{"city": "Paris", "country": "France"}],
                "budget_level": "luxury",
                "interests": ["art", "food"]
            }"#,
        )
        .unwrap();
        intent.apply(&mut trip).unwrap();
        assert!(!trip.needs_intent_extraction());
        assert_eq!(trip.budget_level, BudgetLevel::Luxury);
        assert_eq!(trip.origin, Location::new("New York", "USA"));
        assert_eq!(
            trip.preferences.as_ref().unwrap().interests,
            vec!["art".to_string(), "food".to_string()]
        );
    }

    #[test]
    fn intent_without_destinations_is_rejected() {
        let mut trip = nl_trip();
        let intent = TripIntent::default();
        assert!(matches!(
            intent.apply(&mut trip),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn invalid_extracted_travelers_keep_defaults() {
        let mut trip = nl_trip();
        let intent: TripIntent = serde_json::from_str(
            r#"{
                "destinations": [{"city": "Paris", "country": "France"}],
                "travelers": {"adults": 1, "children": 0, "infants": 4}
            }"#,
        )
        .unwrap();
        intent.apply(&mut trip).unwrap();
        assert_eq!(trip.travelers, Travelers::default());
    }

    #[test]
    fn incomplete_extracted_destinations_are_skipped() {
        let mut trip = nl_trip();
        let intent: TripIntent = serde_json::from_str(
            r#"{"destinations": [{"city": "", "country": ""}]}"#,
        )
        .unwrap();
        assert!(intent.apply(&mut trip).is_err());
    }

    #[test]
    fn generation_prompt_names_the_day_count_and_dates() {
        let mut trip = nl_trip();
        trip.destinations = vec![Destination::new(Location::new("Paris", "France"))];
        let prompt = generation_prompt(&trip);
        assert!(prompt.contains("3-day"));
        assert!(prompt.contains("2030-05-01"));
        assert!(prompt.contains("Paris, France"));
        assert!(prompt.contains("total_cost_estimate"));
    }
}
