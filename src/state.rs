use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::models::BookingRow;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub events: broadcast::Sender<ServerEvent>,
}

/// Broadcast payload for booking changes. Every dashboard holds an SSE
/// subscription and redraws its snapshot when one of these arrives.
#[derive(Clone, Debug, Serialize)]
pub struct ServerEvent {
    pub kind: String,
    pub booking_id: Option<String>,
    pub status: Option<String>,
    pub passenger_id: Option<String>,
    pub passenger_name: Option<String>,
    pub porter_id: Option<String>,
    pub porter_name: Option<String>,
    pub service_type: Option<String>,
    pub platform_number: Option<String>,
    pub coach_number: Option<String>,
    pub price: Option<i64>,
    pub rating: Option<i64>,
}

impl ServerEvent {
    pub fn from_row(kind: &str, row: BookingRow) -> Self {
        Self {
            kind: kind.to_string(),
            booking_id: Some(row.id),
            status: Some(row.status),
            passenger_id: Some(row.passenger_id),
            passenger_name: Some(row.passenger_name),
            porter_id: row.porter_id,
            porter_name: row.porter_name,
            service_type: Some(row.service_type),
            platform_number: Some(row.platform_number),
            coach_number: Some(row.coach_number),
            price: Some(row.price),
            rating: row.rating,
        }
    }

    /// Deletions have no row left to describe; only the id survives.
    pub fn removed(kind: &str, booking_id: &str) -> Self {
        Self {
            kind: kind.to_string(),
            booking_id: Some(booking_id.to_string()),
            status: None,
            passenger_id: None,
            passenger_name: None,
            porter_id: None,
            porter_name: None,
            service_type: None,
            platform_number: None,
            coach_number: None,
            price: None,
            rating: None,
        }
    }
}
