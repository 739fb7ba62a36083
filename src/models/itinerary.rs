#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::location::Location;

/// Wire format for event times.
pub(crate) mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S>(value: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(time) => serializer.serialize_some(&time.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        let Some(raw) = raw else { return Ok(None) };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        NaiveTime::parse_from_str(trimmed, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

/// An activity or a meal inside a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, with = "hhmm", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub cost_estimate: f64,
}

impl Event {
    /// True unless both times are present and inverted.
    pub fn times_ordered(&self) -> bool {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accommodation {
    pub name: String,
    pub location: Location,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    #[serde(default)]
    pub cost_estimate: f64,
}

impl Accommodation {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.check_in_date <= date && date <= self.check_out_date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    pub day_number: u32,
    pub date: NaiveDate,
    #[serde(default)]
    pub activities: Vec<Event>,
    #[serde(default)]
    pub meals: Vec<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accommodation: Option<Accommodation>,
}

impl Day {
    pub fn empty(day_number: u32, date: NaiveDate) -> Self {
        Self {
            day_number,
            date,
            activities: Vec::new(),
            meals: Vec::new(),
            accommodation: None,
        }
    }

    /// Sum of event and accommodation cost estimates for this day.
    pub fn cost(&self) -> f64 {
        let events: f64 = self
            .activities
            .iter()
            .chain(self.meals.iter())
            .map(|event| event.cost_estimate)
            .sum();
        events
            + self
                .accommodation
                .as_ref()
                .map(|a| a.cost_estimate)
                .unwrap_or(0.0)
    }

    /// Timed events ascending by start time; timeless events last, stably,
    /// in their original insertion order.
    pub fn sort_events(&mut self) {
        self.activities
            .sort_by_key(|event| (event.start_time.is_none(), event.start_time));
        self.meals
            .sort_by_key(|event| (event.start_time.is_none(), event.start_time));
    }

    pub fn event_count(&self) -> usize {
        self.activities.len() + self.meals.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub trip_id: String,
    #[serde(default = "default_true")]
    pub ai_generated: bool,
    #[serde(default)]
    pub total_cost_estimate: f64,
    pub days: Vec<Day>,
    #[serde(default = "default_version")]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_version() -> i64 {
    1
}

impl Itinerary {
    pub fn day(&self, day_number: u32) -> Option<&Day> {
        self.days.iter().find(|day| day.day_number == day_number)
    }

    /// Recomputed cost over all days; the stored total is never trusted.
    pub fn computed_cost(&self) -> f64 {
        round_currency(self.days.iter().map(Day::cost).sum())
    }

    pub fn recompute_total_cost(&mut self) {
        self.total_cost_estimate = self.computed_cost();
    }
}

/// Cost estimates are currency amounts; keep them at cent precision so the
/// recomputation law stays idempotent.
pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 5, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn event(name: &str, start: Option<NaiveTime>, cost: f64) -> Event {
        Event {
            name: name.into(),
            description: String::new(),
            location: None,
            start_time: start,
            end_time: None,
            cost_estimate: cost,
        }
    }

    #[test]
    fn timeless_events_sort_last_in_insertion_order() {
        let mut day = Day::empty(1, date(1));
        day.activities = vec![
            event("b-untimed", None, 0.0),
            event("evening", Some(time(18, 0)), 0.0),
            event("a-untimed", None, 0.0),
            event("morning", Some(time(9, 0)), 0.0),
        ];
        day.sort_events();
        let names: Vec<&str> = day.activities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["morning", "evening", "b-untimed", "a-untimed"]);
    }

    #[test]
    fn inverted_times_are_detected() {
        let mut bad = event("late", Some(time(18, 0)), 0.0);
        bad.end_time = Some(time(9, 0));
        assert!(!bad.times_ordered());

        let mut fine = event("early", Some(time(9, 0)), 0.0);
        fine.end_time = Some(time(18, 0));
        assert!(fine.times_ordered());
        assert!(event("open-ended", Some(time(9, 0)), 0.0).times_ordered());
    }

    #[test]
    fn day_cost_includes_meals_and_accommodation() {
        let mut day = Day::empty(1, date(1));
        day.activities = vec![event("louvre", Some(time(10, 0)), 25.0)];
        day.meals = vec![event("bistro", Some(time(13, 0)), 40.0)];
        day.accommodation = Some(Accommodation {
            name: "Hotel du Nord".into(),
            location: Location::new("Paris", "France"),
            check_in_date: date(1),
            check_out_date: date(3),
            cost_estimate: 120.0,
        });
        assert_eq!(day.cost(), 185.0);
    }

    #[test]
    fn cost_recomputation_is_idempotent() {
        let mut itinerary = Itinerary {
            trip_id: "t".into(),
            ai_generated: true,
            total_cost_estimate: 9999.0,
            days: vec![Day::empty(1, date(1))],
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        itinerary.days[0].activities = vec![event("walk", None, 10.555)];
        itinerary.recompute_total_cost();
        let first = itinerary.total_cost_estimate;
        itinerary.recompute_total_cost();
        assert_eq!(first, itinerary.total_cost_estimate);
        assert_eq!(first, itinerary.computed_cost());
    }

    #[test]
    fn times_round_trip_as_hhmm() {
        let mut e = event("louvre", Some(time(10, 30)), 25.0);
        e.end_time = Some(time(12, 0));
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["start_time"], "10:30");
        assert_eq!(json["end_time"], "12:00");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn seconds_and_blank_times_are_tolerated_on_input() {
        let parsed: Event =
            serde_json::from_str(r#"{"name":"walk","start_time":"09:15:00","end_time":""}"#)
                .unwrap();
        assert_eq!(parsed.start_time, Some(time(9, 15)));
        assert_eq!(parsed.end_time, None);
    }

    #[test]
    fn itinerary_round_trips_structurally() {
        let mut day = Day::empty(1, date(1));
        day.activities = vec![
            event("louvre", Some(time(10, 0)), 25.0),
            event("stroll", None, 0.0),
        ];
        let mut itinerary = Itinerary {
            trip_id: "trip-1".into(),
            ai_generated: true,
            total_cost_estimate: 0.0,
            days: vec![day, Day::empty(2, date(2))],
            version: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        itinerary.recompute_total_cost();

        let json = serde_json::to_string(&itinerary).unwrap();
        let back: Itinerary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, itinerary);
        assert_eq!(back.computed_cost(), itinerary.total_cost_estimate);
    }
}
