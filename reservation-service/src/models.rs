use diesel::prelude::*;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use shared::{Event, NewReservation, Reservation};

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::events)]
#[diesel(primary_key(event_id))]
pub struct EventRow {
    pub event_id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub available_seats: i32,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::reservations)]
#[diesel(primary_key(reservation_id))]
pub struct ReservationRow {
    pub reservation_id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub partner_id: Uuid,
    pub seats: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::reservations)]
pub struct NewReservationRow {
    pub reservation_id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub partner_id: Uuid,
    pub seats: i32,
    pub created_at: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.event_id,
            name: row.name,
            capacity: row.capacity,
            available_seats: row.available_seats,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<ReservationRow> for Reservation {
    fn from(row: ReservationRow) -> Self {
        Self {
            reservation_id: row.reservation_id,
            event_id: row.event_id,
            user_id: row.user_id,
            partner_id: row.partner_id,
            seats: row.seats,
            created_at: row.created_at,
        }
    }
}

impl From<&NewReservation> for NewReservationRow {
    fn from(new: &NewReservation) -> Self {
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
