use anyhow::Result;
use async_trait::async_trait;
use shared::{Event, NewReservation, Reservation};
use uuid::Uuid;

/// A seat adjustment guarded by the event version the caller last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatAdjustment {
    pub event_id: Uuid,
    pub delta: i32,
    pub expected_version: i64,
}

/// Ledger write committed together with a seat adjustment.
#[derive(Debug, Clone)]
pub enum LedgerChange {
    Insert(NewReservation),
    Remove(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdjustOutcome {
    /// Seat update and ledger change committed. `reservation` is the inserted
    /// or removed row.
    Applied { event: Event, reservation: Reservation },
    /// The event moved past `expected_version`; nothing was written.
    StaleVersion { current_version: i64 },
    /// Version matched but the seat count would leave `[0, capacity]`.
    OutOfBounds { available_seats: i32 },
    EventMissing,
    /// Removal found no reservation row; the seat update was rolled back.
    ReservationMissing,
}

impl SeatAdjustment {
    pub fn release(event: &Event, seats: i32) -> Self {
        Self { event_id: event.event_id, delta: seats, expected_version: event.version }
    }

    pub fn claim(event: &Event, seats: i32) -> Self {
        Self { event_id: event.event_id, delta: -seats, expected_version: event.version }
    }

    /// Whether `event` can absorb this delta without leaving `[0, capacity]`.
    pub fn within_bounds(&self, event: &Event) -> bool {
        let next = i64::from(event.available_seats) + i64::from(self.delta);
        next >= 0 && next <= i64::from(event.capacity)
    }
}

/// Explains why a guarded adjustment was not applied.
///
/// `current` is the committed event row and `ledger_row_present` says whether
/// the reservation a removal targets still exists (always true for inserts).
/// A vanished ledger row outranks the seat bound: releasing seats for a
/// reservation someone else already cancelled is a lost race, not corruption.
pub fn classify_rejection(
    current: Option<&Event>,
    adjustment: &SeatAdjustment,
    ledger_row_present: bool,
) -> AdjustOutcome {
    match current {
        None => AdjustOutcome::EventMissing,
        Some(event) if event.version != adjustment.expected_version => AdjustOutcome::StaleVersion {
            current_version: event.version,
        },
        Some(_) if !ledger_row_present => AdjustOutcome::ReservationMissing,
        Some(event) => AdjustOutcome::OutOfBounds {
            available_seats: event.available_seats,
        },
    }
}

/// Persistence boundary for seat inventory.
///
/// `conditional_adjust_seats` is a compare-and-swap over `(version,
/// available_seats)`: it re-checks the guard against the latest committed
/// row, applies the ledger change in the same transaction, and never retries.
#[async_trait]
pub trait ConcurrencyGuardedStore: Send + Sync {
    async fn fetch_event(&self, event_id: Uuid) -> Result<Option<Event>>;

    async fn list_events(&self) -> Result<Vec<Event>>;

    async fn fetch_reservation(&self, reservation_id: Uuid) -> Result<Option<Reservation>>;

    async fn reservations_for_user(&self, user_id: Uuid) -> Result<Vec<Reservation>>;

    async fn conditional_adjust_seats(
        &self,
        adjustment: SeatAdjustment,
        ledger: LedgerChange,
    ) -> Result<AdjustOutcome>;
}
