use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub const MIN_SEATS_PER_RESERVATION: i32 = 1;
pub const MAX_SEATS_PER_RESERVATION: i32 = 10;

/// Seat inventory for a single event.
///
/// `available_seats` stays within `[0, capacity]` and `version` grows by one
/// on every committed seat adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub available_seats: i32,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub partner_id: Uuid,
    pub seats: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReservation {
    pub reservation_id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub partner_id: Uuid,
    pub seats: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("not enough seats left: requested {requested}, available {available}")]
    InsufficientInventory { requested: i32, available: i32 },

    #[error("{0}")]
    StaleVersion(String),

    #[error("inventory integrity violation: {0}")]
    Integrity(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] anyhow::Error),
}

pub type BookingResult<T> = Result<T, BookingError>;

impl Event {
    pub fn reserved_seats(&self) -> i32 {
        self.capacity - self.available_seats
    }

    pub fn can_fit(&self, seats: i32) -> bool {
        self.available_seats >= seats
    }
}

impl NewReservation {
    pub fn new(event_id: Uuid, user_id: Uuid, partner_id: Uuid, seats: i32) -> Self {
        Self {
            reservation_id: Uuid::new_v4(),
            event_id,
            user_id,
            partner_id,
            seats,
            created_at: Utc::now(),
        }
    }
}

impl From<NewReservation> for Reservation {
    fn from(new: NewReservation) -> Self {
        Self {
            reservation_id: new.reservation_id,
            event_id: new.event_id,
            user_id: new.user_id,
            partner_id: new.partner_id,
            seats: new.seats,
            created_at: new.created_at,
        }
    }
}

/// Rejects seat counts outside `[MIN_SEATS_PER_RESERVATION, MAX_SEATS_PER_RESERVATION]`.
pub fn validate_seat_count(seats: i32) -> BookingResult<()> {
    if !(MIN_SEATS_PER_RESERVATION..=MAX_SEATS_PER_RESERVATION).contains(&seats) {
        return Err(BookingError::InvalidRequest(format!(
            "invalid seat count {}, expected {}..={}",
            seats, MIN_SEATS_PER_RESERVATION, MAX_SEATS_PER_RESERVATION
        )));
    }
    Ok(())
}

impl BookingError {
    pub fn event_not_found(event_id: Uuid) -> Self {
        Self::NotFound(format!("event {}", event_id))
    }

    pub fn reservation_not_found(reservation_id: Uuid) -> Self {
        Self::NotFound(format!("reservation {}", reservation_id))
    }

    /// Whether the caller may re-issue the same request after re-reading state.
    pub fn is_client_retriable(&self) -> bool {
        matches!(self, Self::StaleVersion(_))
    }
}
