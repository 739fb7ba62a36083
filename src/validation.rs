//! Pure structural checks and deterministic repair for itineraries.
//!
//! Generated and refined content is untrusted input: everything that comes
//! back from the model passes through `repair` before it is accepted, and
//! `validate` is the oracle the tests and the refinement engine share.

use chrono::NaiveDate;

use crate::models::{
    itinerary::{Day, Itinerary},
    trip::Trip,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    DayCountMismatch { expected: u32, found: u32 },
    DayNumberDuplicate { day_number: u32 },
    DayNumberGap { expected: u32, found: u32 },
    DateMismatch { day_number: u32 },
    TimeOrdering { day_number: u32, event: String },
    NegativeCost { day_number: u32, event: String },
    AccommodationGap { day_number: u32 },
    TotalCostDrift { stored: f64, computed: f64 },
}

/// Enumerate every invariant violation without changing anything.
pub fn validate(itinerary: &Itinerary, trip: &Trip) -> Vec<Violation> {
    let mut violations = Vec::new();
    let expected_days = trip.date_range.duration_days();

    if itinerary.days.len() != expected_days as usize {
        violations.push(Violation::DayCountMismatch {
            expected: expected_days,
            found: itinerary.days.len() as u32,
        });
    }

    let mut seen = Vec::new();
    for (index, day) in itinerary.days.iter().enumerate() {
        let expected_number = index as u32 + 1;
        if seen.contains(&day.day_number) {
            violations.push(Violation::DayNumberDuplicate {
                day_number: day.day_number,
            });
        } else if day.day_number != expected_number {
            violations.push(Violation::DayNumberGap {
                expected: expected_number,
                found: day.day_number,
            });
        }
        seen.push(day.day_number);

        if day.day_number >= 1
            && day.day_number <= expected_days
            && day.date != trip.date_range.date_for_day(day.day_number)
        {
            violations.push(Violation::DateMismatch {
                day_number: day.day_number,
            });
        }

        for event in day.activities.iter().chain(day.meals.iter()) {
            if !event.times_ordered() {
                violations.push(Violation::TimeOrdering {
                    day_number: day.day_number,
                    event: event.name.clone(),
                });
            }
            if event.cost_estimate < 0.0 {
                violations.push(Violation::NegativeCost {
                    day_number: day.day_number,
                    event: event.name.clone(),
                });
            }
        }

        if let Some(accommodation) = &day.accommodation {
            if accommodation.cost_estimate < 0.0 {
                violations.push(Violation::NegativeCost {
                    day_number: day.day_number,
                    event: accommodation.name.clone(),
                });
            }
            if accommodation.check_in_date > accommodation.check_out_date
                || !accommodation.covers(day.date)
            {
                violations.push(Violation::AccommodationGap {
                    day_number: day.day_number,
                });
            }
        }
    }

    let computed = itinerary.computed_cost();
    if (itinerary.total_cost_estimate - computed).abs() > 0.005 {
        violations.push(Violation::TotalCostDrift {
            stored: itinerary.total_cost_estimate,
            computed,
        });
    }

    violations
}

/// Deterministic, total repair: the result always satisfies the structural
/// invariants, possibly at the price of empty-content days. Day slots are
/// reassigned positionally after a stable sort by claimed day number; extra
/// days are discarded and missing days padded.
pub fn repair(itinerary: &Itinerary, trip: &Trip) -> Itinerary {
    let expected_days = trip.date_range.duration_days();

    let mut days = itinerary.days.clone();
    days.sort_by_key(|day| day.day_number);
    days.truncate(expected_days as usize);

    let mut repaired_days = Vec::with_capacity(expected_days as usize);
    for slot in 1..=expected_days {
        let date = trip.date_range.date_for_day(slot);
        let repaired = match days.get(slot as usize - 1) {
            Some(day) => repair_day(day, slot, date).0,
            None => Day::empty(slot, date),
        };
        repaired_days.push(repaired);
    }

    let mut repaired = Itinerary {
        trip_id: trip.id.clone(),
        ai_generated: itinerary.ai_generated,
        total_cost_estimate: 0.0,
        days: repaired_days,
        version: itinerary.version,
        created_at: itinerary.created_at,
        updated_at: itinerary.updated_at,
    };
    repaired.recompute_total_cost();
    repaired
}

/// Repair a single day against its slot. Returns the repaired day and
/// whether any event content had to be dropped to get there — the
/// refinement engine rejects lossy repairs instead of applying them.
pub fn repair_day(day: &Day, day_number: u32, date: NaiveDate) -> (Day, bool) {
    let mut repaired = day.clone();
    repaired.day_number = day_number;
    repaired.date = date;

    let before = repaired.event_count();
    repaired.activities.retain(|event| event.times_ordered());
    repaired.meals.retain(|event| event.times_ordered());
    let dropped = repaired.event_count() < before;

    for event in repaired
        .activities
        .iter_mut()
        .chain(repaired.meals.iter_mut())
    {
        if event.cost_estimate < 0.0 {
            event.cost_estimate = 0.0;
        }
    }

    if let Some(accommodation) = repaired.accommodation.as_mut() {
        if accommodation.cost_estimate < 0.0 {
            accommodation.cost_estimate = 0.0;
        }
        if accommodation.check_in_date > accommodation.check_out_date {
            std::mem::swap(
                &mut accommodation.check_in_date,
                &mut accommodation.check_out_date,
            );
        }
        // Widen the span rather than drop the booking when it misses the day.
        if accommodation.check_in_date > date {
            accommodation.check_in_date = date;
        }
        if accommodation.check_out_date < date {
            accommodation.check_out_date = date;
        }
    }

    repaired.sort_events();
    (repaired, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        itinerary::{Accommodation, Event},
        location::Location,
        trip::{BudgetLevel, DateRange, Destination, Travelers, TransportType, Trip},
    };
    use chrono::{NaiveTime, Utc};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 5, d).unwrap()
    }

    fn time(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn trip() -> Trip {
        Trip {
            id: "trip-1".into(),
            origin: Location::new("New York", "USA"),
            destinations: vec![Destination::new(Location::new("Paris", "France"))],
            date_range: DateRange::new(date(1), date(3)).unwrap(),
            travelers: Travelers::default(),
            budget_level: BudgetLevel::Moderate,
            transport_type: TransportType::Air,
            preferences: None,
            natural_language_input: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn itinerary(days: Vec<Day>) -> Itinerary {
        let mut itinerary = Itinerary {
            trip_id: "trip-1".into(),
            ai_generated: true,
            total_cost_estimate: 0.0,
            days,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        itinerary.recompute_total_cost();
        itinerary
    }

    fn event(name: &str, cost: f64) -> Event {
        Event {
            name: name.into(),
            description: String::new(),
            location: None,
            start_time: None,
            end_time: None,
            cost_estimate: cost,
        }
    }

    #[test]
    fn valid_itinerary_has_no_violations() {
        let days = vec![
            Day::empty(1, date(1)),
            Day::empty(2, date(2)),
            Day::empty(3, date(3)),
        ];
        assert!(validate(&itinerary(days), &trip()).is_empty());
    }

    #[test]
    fn detects_count_gap_and_date_violations() {
        let days = vec![Day::empty(1, date(1)), Day::empty(3, date(1))];
        let violations = validate(&itinerary(days), &trip());
        assert!(violations.contains(&Violation::DayCountMismatch {
            expected: 3,
            found: 2
        }));
        assert!(violations.contains(&Violation::DayNumberGap {
            expected: 2,
            found: 3
        }));
        assert!(violations.contains(&Violation::DateMismatch { day_number: 3 }));
    }

    #[test]
    fn detects_duplicates_and_cost_drift() {
        let days = vec![
            Day::empty(1, date(1)),
            Day::empty(1, date(1)),
            Day::empty(3, date(3)),
        ];
        let mut itin = itinerary(days);
        itin.total_cost_estimate = 42.0;
        let violations = validate(&itin, &trip());
        assert!(violations.contains(&Violation::DayNumberDuplicate { day_number: 1 }));
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::TotalCostDrift { .. })));
    }

    #[test]
    fn repair_reindexes_pads_and_truncates() {
        // Mislabeled, out of order, and one day too many.
        let days = vec![
            Day::empty(7, date(2)),
            Day::empty(2, date(1)),
            Day::empty(9, date(3)),
            Day::empty(11, date(3)),
        ];
        let repaired = repair(&itinerary(days), &trip());
        assert_eq!(repaired.days.len(), 3);
        for (index, day) in repaired.days.iter().enumerate() {
            assert_eq!(day.day_number, index as u32 + 1);
            assert_eq!(day.date, date(index as u32 + 1));
        }
        assert!(validate(&repaired, &trip()).is_empty());

        // Too few days pad out with empty ones.
        let repaired = repair(&itinerary(vec![Day::empty(1, date(1))]), &trip());
        assert_eq!(repaired.days.len(), 3);
        assert!(repaired.days[2].activities.is_empty());
    }

    #[test]
    fn repair_drops_inverted_events_and_clamps_costs() {
        let mut day = Day::empty(1, date(1));
        let mut inverted = event("inverted", 10.0);
        inverted.start_time = Some(time(18));
        inverted.end_time = Some(time(9));
        day.activities = vec![inverted, event("negative", -5.0)];

        let (repaired, dropped) = repair_day(&day, 1, date(1));
        assert!(dropped);
        assert_eq!(repaired.activities.len(), 1);
        assert_eq!(repaired.activities[0].cost_estimate, 0.0);

        let (kept, dropped) = repair_day(&Day::empty(2, date(1)), 2, date(2));
        assert!(!dropped);
        assert_eq!(kept.day_number, 2);
        assert_eq!(kept.date, date(2));
    }

    #[test]
    fn repair_widens_accommodation_to_cover_the_day() {
        let mut day = Day::empty(2, date(2));
        day.accommodation = Some(Accommodation {
            name: "Hotel".into(),
            location: Location::new("Paris", "France"),
            check_in_date: date(3),
            check_out_date: date(1),
            cost_estimate: -80.0,
        });
        let (repaired, dropped) = repair_day(&day, 2, date(2));
        assert!(!dropped);
        let accommodation = repaired.accommodation.unwrap();
        assert!(accommodation.check_in_date <= accommodation.check_out_date);
        assert!(accommodation.covers(date(2)));
        assert_eq!(accommodation.cost_estimate, 0.0);
    }

    #[test]
    fn repaired_total_matches_computed_cost() {
        let mut day = Day::empty(1, date(1));
        day.activities = vec![event("louvre", 25.0)];
        day.meals = vec![event("bistro", 35.0)];
        let mut itin = itinerary(vec![day]);
        itin.total_cost_estimate = 10_000.0;

        let repaired = repair(&itin, &trip());
        assert_eq!(repaired.total_cost_estimate, 60.0);
        assert_eq!(repaired.total_cost_estimate, repaired.computed_cost());
    }
}
