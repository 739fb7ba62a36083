//! Scoped-merge itinerary refinement.
//!
//! A refinement replaces only the days a request targets and copies every
//! other day through untouched. The merged result becomes the next version;
//! the engine never mutates the current one, so a rejected or conflicted
//! refinement leaves the stored itinerary exactly where it was.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    error::AppError,
    models::{
        itinerary::{Day, Itinerary},
        trip::Trip,
    },
    services::{
        generation::ItineraryDraft,
        llm::{parse_json_payload, CompletionClient, CompletionRequest},
    },
    validation,
};

#[derive(Debug, Clone, Deserialize)]
pub struct RefinementRequest {
    pub text: String,
    #[serde(default)]
    pub target_day: Option<u32>,
}

/// Which days a request is allowed to touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Days(BTreeSet<u32>),
    /// No identifiable day: regenerate everything, with a soft
    /// preserve-what-you-can constraint in the prompt.
    Whole,
}

#[derive(Debug, Deserialize)]
struct ReplacementDraft {
    #[serde(default)]
    days: Vec<Day>,
}

#[derive(Clone)]
pub struct RefinementEngine {
    llm: Arc<dyn CompletionClient>,
}

impl RefinementEngine {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    /// Compute the next itinerary version for `request` against `current`.
    /// Pure with respect to storage: committing (and the optimistic version
    /// check that goes with it) is the caller's move.
    pub async fn refine(
        &self,
        trip: &Trip,
        current: &Itinerary,
        request: &RefinementRequest,
    ) -> Result<Itinerary, AppError> {
        if request.text.trim().is_empty() {
            return Err(AppError::Validation(
                "refinement request must not be empty".into(),
            ));
        }

        let scope = resolve_scope(current, request)?;
        debug!(trip_id = %trip.id, version = current.version, ?scope, "resolved refinement scope");

        let refined = match &scope {
            Scope::Days(days) => self.refine_days(trip, current, request, days).await?,
            Scope::Whole => self.refine_whole(trip, current, request).await?,
        };

        info!(
            trip_id = %trip.id,
            from_version = current.version,
            to_version = refined.version,
            "itinerary refined"
        );
        Ok(refined)
    }

    async fn refine_days(
        &self,
        trip: &Trip,
        current: &Itinerary,
        request: &RefinementRequest,
        scope: &BTreeSet<u32>,
    ) -> Result<Itinerary, AppError> {
        let in_scope: Vec<&Day> = current
            .days
            .iter()
            .filter(|day| scope.contains(&day.day_number))
            .collect();
        let context = serde_json::to_string(&in_scope).map_err(|err| AppError::Other(err.into()))?;

        let prompt = scoped_prompt(trip, request, scope, &context);
        let raw = self
            .llm
            .complete(CompletionRequest::creative(prompt))
            .await?;
        let draft: ReplacementDraft = parse_json_payload(&raw)?;

        let returned: BTreeSet<u32> = draft.days.iter().map(|day| day.day_number).collect();
        if returned != *scope || draft.days.len() != scope.len() {
            return Err(AppError::RefinementRejected(format!(
                "replacement covered days {returned:?} instead of the requested {scope:?}"
            )));
        }

        let mut replacements = Vec::with_capacity(draft.days.len());
        for day in draft.days {
            let slot = day.day_number;
            let (repaired, dropped) =
                validation::repair_day(&day, slot, trip.date_range.date_for_day(slot));
            if dropped {
                return Err(AppError::RefinementRejected(format!(
                    "replacement for day {slot} contains events with inverted times"
                )));
            }
            replacements.push(repaired);
        }

        let merged = merge_replacements(current, replacements);
        let leftover = validation::validate(&merged, trip);
        if !leftover.is_empty() {
            return Err(AppError::RefinementRejected(format!(
                "merged itinerary still violates {} invariant(s)",
                leftover.len()
            )));
        }
        Ok(merged)
    }

    async fn refine_whole(
        &self,
        trip: &Trip,
        current: &Itinerary,
        request: &RefinementRequest,
    ) -> Result<Itinerary, AppError> {
        let context =
            serde_json::to_string(&current.days).map_err(|err| AppError::Other(err.into()))?;
        let prompt = whole_prompt(trip, request, &context);
        let raw = self
            .llm
            .complete(CompletionRequest::creative(prompt))
            .await?;
        let draft: ItineraryDraft = parse_json_payload(&raw)?;

        let now = Utc::now();
        let candidate = Itinerary {
            trip_id: current.trip_id.clone(),
            ai_generated: true,
            total_cost_estimate: draft.total_cost_estimate.unwrap_or(0.0),
            days: draft.days,
            version: current.version + 1,
            created_at: current.created_at,
            updated_at: now,
        };
        // Whole-itinerary scope is a regeneration; the generation repair
        // policy (lossy where needed) applies.
        Ok(validation::repair(&candidate, trip))
    }
}

/// Target day wins; otherwise explicit day references in the text; absent
/// both, the whole itinerary is in scope.
pub fn resolve_scope(
    current: &Itinerary,
    request: &RefinementRequest,
) -> Result<Scope, AppError> {
    let day_count = current.days.len() as u32;

    if let Some(target) = request.target_day {
        if target < 1 || target > day_count {
            return Err(AppError::Validation(format!(
                "target day {target} is outside 1..={day_count}"
            )));
        }
        return Ok(Scope::Days(BTreeSet::from([target])));
    }

    let referenced: BTreeSet<u32> = day_references(&request.text)
        .into_iter()
        .filter(|day| (1..=day_count).contains(day))
        .collect();
    if referenced.is_empty() {
        Ok(Scope::Whole)
    } else {
        Ok(Scope::Days(referenced))
    }
}

/// Explicit day references in free text: "day 2", "days 2 and 4",
/// "days 1-3". Anything fancier deliberately falls through to whole-scope.
pub fn day_references(text: &str) -> BTreeSet<u32> {
    static SINGLE: OnceLock<Regex> = OnceLock::new();
    static LIST: OnceLock<Regex> = OnceLock::new();
    static NUMBER: OnceLock<Regex> = OnceLock::new();

    let single = SINGLE.get_or_init(|| {
        Regex::new(r"(?i)\bday\s*#?\s*(\d{1,3})\b").expect("day reference pattern compiles")
    });
    let list = LIST.get_or_init(|| {
        Regex::new(r"(?i)\bdays\s+(\d{1,3}(?:\s*(?:,|and|&|or|to|through|-)\s*\d{1,3})+)")
            .expect("day list pattern compiles")
    });
    let number = NUMBER.get_or_init(|| Regex::new(r"\d{1,3}").expect("number pattern compiles"));

    let mut days = BTreeSet::new();
    for capture in single.captures_iter(text) {
        if let Ok(day) = capture[1].parse::<u32>() {
            days.insert(day);
        }
    }
    for capture in list.captures_iter(text) {
        let body = &capture[1];
        let numbers: Vec<u32> = number
            .find_iter(body)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        let is_range = body.contains('-') || body.contains("to") || body.contains("through");
        if is_range && numbers.len() == 2 && numbers[0] <= numbers[1] {
            days.extend(numbers[0]..=numbers[1]);
        } else {
            days.extend(numbers);
        }
    }
    days
}

/// Swap the replacement days into place; everything else is copied through
/// unchanged, then the total is recomputed and the version bumped.
fn merge_replacements(current: &Itinerary, replacements: Vec<Day>) -> Itinerary {
    let mut merged = current.clone();
    for replacement in replacements {
        if let Some(slot) = merged
            .days
            .iter_mut()
            .find(|day| day.day_number == replacement.day_number)
        {
            *slot = replacement;
        }
    }
    merged.ai_generated = true;
    merged.version = current.version + 1;
    merged.updated_at = Utc::now();
    merged.recompute_total_cost();
    merged
}

fn scoped_prompt(
    trip: &Trip,
    request: &RefinementRequest,
    scope: &BTreeSet<u32>,
    context: &str,
) -> String {
    let days: Vec<String> = scope.iter().map(u32::to_string).collect();
    format!(
        "I have an existing travel itinerary and need to change day(s) {days} based on this \
         request:\n\
         \n\
         \"{text}\"\n\
         \n\
         Current content of the day(s) to change:\n\
         {context}\n\
         \n\
         Trip constraints: budget level {budget}, interests: {interests}.\n\
         Return replacements for exactly day(s) {days} and nothing else, keeping each \
         day_number and date unchanged. Return ONLY valid JSON shaped as \
         {{\"days\":[{{\"day_number\":N,\"date\":\"YYYY-MM-DD\",\"activities\":[...],\
         \"meals\":[...],\"accommodation\":{{...}}}}]}}.",
        days = days.join(", "),
        text = request.text.trim(),
        budget = trip.budget_level,
        interests = trip.interests_summary(),
    )
}

fn whole_prompt(trip: &Trip, request: &RefinementRequest, context: &str) -> String {
    format!(
        "I have an existing travel itinerary and need to refine it based on this request:\n\
         \n\
         \"{text}\"\n\
         \n\
         Current itinerary days:\n\
         {context}\n\
         \n\
         Trip constraints: budget level {budget}, interests: {interests}.\n\
         Preserve the traveler's already-approved structure as much as possible: only \
         change what the request implies and keep every other day as it is. Return the \
         complete updated day list as ONLY valid JSON shaped as \
         {{\"days\":[...],\"total_cost_estimate\":0.0}}.",
        text = request.text.trim(),
        budget = trip.budget_level,
        interests = trip.interests_summary(),
    )
}
