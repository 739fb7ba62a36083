//! Persistence for trips and itinerary versions over SQLite.
//!
//! Aggregates are stored as JSON documents; itinerary versions are
//! append-only and the `(trip_id, version)` primary key is what makes a
//! refinement commit at-most-once per version.

use sqlx::Row;

use crate::{
    db::DbPool,
    error::AppError,
    models::{itinerary::Itinerary, trip::Trip},
};

#[derive(Clone)]
pub struct StorageService {
    db: DbPool,
}

impl StorageService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn save_trip(&self, trip: &Trip) -> Result<(), AppError> {
        let data = serde_json::to_string(trip).map_err(|err| AppError::Other(err.into()))?;
        sqlx::query("INSERT INTO trips (id, data, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(&trip.id)
            .bind(data)
            .bind(trip.created_at.to_rfc3339())
            .bind(trip.updated_at.to_rfc3339())
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn update_trip(&self, trip: &Trip) -> Result<(), AppError> {
        let data = serde_json::to_string(trip).map_err(|err| AppError::Other(err.into()))?;
        let result = sqlx::query("UPDATE trips SET data = ?, updated_at = ? WHERE id = ?")
            .bind(data)
            .bind(trip.updated_at.to_rfc3339())
            .bind(&trip.id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    pub async fn load_trip(&self, trip_id: &str) -> Result<Trip, AppError> {
        let row = sqlx::query("SELECT data FROM trips WHERE id = ?")
            .bind(trip_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;
        let data: String = row.get("data");
        serde_json::from_str(&data).map_err(|err| AppError::Other(err.into()))
    }

    /// Append a new itinerary version. The primary key on
    /// `(trip_id, version)` turns a lost commit race into a
    /// `ConcurrencyConflict` instead of a silent overwrite.
    pub async fn save_itinerary(&self, itinerary: &Itinerary) -> Result<(), AppError> {
        let data = serde_json::to_string(itinerary).map_err(|err| AppError::Other(err.into()))?;
        let result = sqlx::query(
            "INSERT INTO itineraries (trip_id, version, data, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&itinerary.trip_id)
        .bind(itinerary.version)
        .bind(data)
        .bind(itinerary.created_at.to_rfc3339())
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AppError::ConcurrencyConflict {
                    expected: itinerary.version - 1,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Head (highest) version for a trip.
    pub async fn load_itinerary(&self, trip_id: &str) -> Result<Itinerary, AppError> {
        let row = sqlx::query(
            "SELECT data FROM itineraries WHERE trip_id = ? ORDER BY version DESC LIMIT 1",
        )
        .bind(trip_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound)?;
        let data: String = row.get("data");
        serde_json::from_str(&data).map_err(|err| AppError::Other(err.into()))
    }

    pub async fn load_itinerary_version(
        &self,
        trip_id: &str,
        version: i64,
    ) -> Result<Itinerary, AppError> {
        let row = sqlx::query("SELECT data FROM itineraries WHERE trip_id = ? AND version = ?")
            .bind(trip_id)
            .bind(version)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;
        let data: String = row.get("data");
        serde_json::from_str(&data).map_err(|err| AppError::Other(err.into()))
    }

    pub async fn has_itinerary(&self, trip_id: &str) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM itineraries WHERE trip_id = ?")
            .bind(trip_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count > 0)
    }
}
