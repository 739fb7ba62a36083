use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    models::{
        itinerary::{Day, Itinerary},
        location::Location,
        trip::{BudgetLevel, DateRange, Destination, Preferences, Travelers, TransportType, Trip},
    },
    services::refinement::RefinementRequest,
    state::AppState,
    validation,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_trip))
        .route("/natural", post(create_trip_natural))
        .route("/:id", get(get_trip))
        .route("/:id/preferences", post(attach_preferences))
        .route("/:id/generate-itinerary", post(generate_itinerary))
        .route("/:id/itinerary", get(get_itinerary).put(update_itinerary))
        .route("/:id/itinerary/refine", post(refine_itinerary))
}

#[derive(Deserialize)]
struct TripCreateBody {
    origin: Location,
    destinations: Vec<Destination>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default)]
    travelers: Travelers,
    budget_level: BudgetLevel,
    transport_type: TransportType,
    #[serde(default)]
    preferences: Option<Preferences>,
}

#[derive(Deserialize)]
struct NaturalTripBody {
    description: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

#[derive(Deserialize)]
struct RefineBody {
    text: String,
    #[serde(default)]
    day: Option<u32>,
}

#[derive(Deserialize)]
struct ItineraryUpdateBody {
    days: Vec<Day>,
}

#[derive(Serialize)]
struct TripResponse {
    #[serde(flatten)]
    trip: Trip,
    has_itinerary: bool,
}

async fn trip_response(state: &AppState, trip: Trip) -> Result<TripResponse, AppError> {
    let has_itinerary = state.storage.has_itinerary(&trip.id).await?;
    Ok(TripResponse {
        trip,
        has_itinerary,
    })
}

async fn create_trip(
    State(state): State<AppState>,
    Json(body): Json<TripCreateBody>,
) -> Result<impl IntoResponse, AppError> {
    let date_range = DateRange::new(body.start_date, body.end_date)?;
    let trip = Trip::from_structured(
        body.origin,
        body.destinations,
        date_range,
        body.travelers,
        body.budget_level,
        body.transport_type,
        body.preferences,
    )?;
    state.storage.save_trip(&trip).await?;
    Ok((
        StatusCode::CREATED,
        Json(TripResponse {
            trip,
            has_itinerary: false,
        }),
    ))
}

async fn create_trip_natural(
    State(state): State<AppState>,
    Json(body): Json<NaturalTripBody>,
) -> Result<impl IntoResponse, AppError> {
    let date_range = DateRange::new(body.start_date, body.end_date)?;
    let trip = Trip::from_natural_language(&body.description, date_range)?;
    state.storage.save_trip(&trip).await?;
    Ok((
        StatusCode::CREATED,
        Json(TripResponse {
            trip,
            has_itinerary: false,
        }),
    ))
}

async fn get_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Json<TripResponse>, AppError> {
    let trip = state.storage.load_trip(&trip_id).await?;
    Ok(Json(trip_response(&state, trip).await?))
}

async fn attach_preferences(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Json(preferences): Json<Preferences>,
) -> Result<Json<TripResponse>, AppError> {
    let mut trip = state.storage.load_trip(&trip_id).await?;
    trip.attach_preferences(preferences)?;
    state.storage.update_trip(&trip).await?;
    Ok(Json(trip_response(&state, trip).await?))
}

async fn generate_itinerary(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Itinerary>, AppError> {
    let mut trip = state.storage.load_trip(&trip_id).await?;
    if state.storage.has_itinerary(&trip.id).await? {
        return Err(AppError::Validation(
            "this trip already has an itinerary; refine it instead".into(),
        ));
    }

    // Natural-language trips get their structured fields filled in here,
    // right before the itinerary prompt needs them.
    if trip.needs_intent_extraction() {
        let text = trip
            .natural_language_input
            .clone()
            .unwrap_or_default();
        let intent = state.generation.extract_intent(&text).await?;
        intent.apply(&mut trip)?;
        state.storage.update_trip(&trip).await?;
    }

    let itinerary = state.generation.generate(&trip).await?;
    state.storage.save_itinerary(&itinerary).await?;
    Ok(Json(itinerary))
}

async fn get_itinerary(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Itinerary>, AppError> {
    let itinerary = state.storage.load_itinerary(&trip_id).await?;
    Ok(Json(itinerary))
}

async fn update_itinerary(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Json(body): Json<ItineraryUpdateBody>,
) -> Result<Json<Itinerary>, AppError> {
    let trip = state.storage.load_trip(&trip_id).await?;
    let current = state.storage.load_itinerary(&trip_id).await?;

    let mut candidate = current.clone();
    candidate.days = body.days;
    candidate.version = current.version + 1;
    candidate.ai_generated = false;
    candidate.updated_at = Utc::now();
    let repaired = validation::repair(&candidate, &trip);

    state.storage.save_itinerary(&repaired).await?;
    Ok(Json(repaired))
}

async fn refine_itinerary(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Json(body): Json<RefineBody>,
) -> Result<Json<Itinerary>, AppError> {
    let trip = state.storage.load_trip(&trip_id).await?;
    let current = state.storage.load_itinerary(&trip_id).await?;

    let request = RefinementRequest {
        text: body.text,
        target_day: body.day,
    };
    let refined = state.refinement.refine(&trip, &current, &request).await?;

    // Commit-or-nothing: losing the version race surfaces as a conflict
    // and the head itinerary stays whatever won it.
    state.storage.save_itinerary(&refined).await?;
    Ok(Json(refined))
}
