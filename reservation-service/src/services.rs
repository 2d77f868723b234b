use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use shared::*;
use crate::store::{AdjustOutcome, ConcurrencyGuardedStore, LedgerChange, SeatAdjustment};

type SharedStore = Arc<dyn ConcurrencyGuardedStore>;

const STALE_RESERVE: &str = "Event already updated by another request";
const STALE_CANCEL: &str = "Conflict: event updated concurrently";

/// Claims seats on an event and records the reservation.
pub struct ReservationService {
    store: SharedStore,
}

impl ReservationService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn reserve(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        partner_id: Uuid,
        seats: i32,
    ) -> BookingResult<Reservation> {
        let event = self
            .store
            .fetch_event(event_id)
            .await?
            .ok_or_else(|| BookingError::event_not_found(event_id))?;

        validate_seat_count(seats)?;

        // Fast path only; the guarded write re-checks against committed state.
        if !event.can_fit(seats) {
            return Err(BookingError::InsufficientInventory {
                requested: seats,
                available: event.available_seats,
            });
        }

        let new_reservation = NewReservation::new(event_id, user_id, partner_id, seats);
        let outcome = self
            .store
            .conditional_adjust_seats(
                SeatAdjustment::claim(&event, seats),
                LedgerChange::Insert(new_reservation),
            )
            .await?;

        match outcome {
            AdjustOutcome::Applied { event, reservation } => {
                info!(
                    "Reserved {} seats on event {} (reservation {}, {} left, version {})",
                    seats, event.event_id, reservation.reservation_id, event.available_seats, event.version
                );
                Ok(reservation)
            }
            AdjustOutcome::StaleVersion { current_version } => {
                warn!(
                    "Reserve on event {} lost race: expected version {}, found {}",
                    event_id, event.version, current_version
                );
                Err(BookingError::StaleVersion(STALE_RESERVE.to_string()))
            }
            AdjustOutcome::OutOfBounds { available_seats } => Err(BookingError::InsufficientInventory {
                requested: seats,
                available: available_seats,
            }),
            AdjustOutcome::EventMissing => Err(BookingError::event_not_found(event_id)),
            AdjustOutcome::ReservationMissing => Err(BookingError::Integrity(format!(
                "ledger insert on event {} reported a missing reservation",
                event_id
            ))),
        }
    }
}

/// Deletes a reservation and returns its seats to the event.
pub struct CancellationService {
    store: SharedStore,
}

impl CancellationService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn cancel(&self, reservation_id: Uuid) -> BookingResult<Reservation> {
        let reservation = self
            .store
            .fetch_reservation(reservation_id)
            .await?
            .ok_or_else(|| BookingError::reservation_not_found(reservation_id))?;

        let event = match self.store.fetch_event(reservation.event_id).await? {
            Some(event) => event,
            None => {
                error!(
                    "Reservation {} references missing event {}",
                    reservation_id, reservation.event_id
                );
                return Err(BookingError::event_not_found(reservation.event_id));
            }
        };

        let outcome = self
            .store
            .conditional_adjust_seats(
                SeatAdjustment::release(&event, reservation.seats),
                LedgerChange::Remove(reservation_id),
            )
            .await?;

        match outcome {
            AdjustOutcome::Applied { event, reservation } => {
                info!(
                    "Cancelled reservation {} on event {} ({} seats returned, version {})",
                    reservation.reservation_id, event.event_id, reservation.seats, event.version
                );
                Ok(reservation)
            }
            AdjustOutcome::StaleVersion { current_version } => {
                warn!(
                    "Cancel of reservation {} lost race: expected version {}, found {}",
                    reservation_id, event.version, current_version
                );
                Err(BookingError::StaleVersion(STALE_CANCEL.to_string()))
            }
            AdjustOutcome::OutOfBounds { available_seats } => {
                error!(
                    "Returning {} seats to event {} would exceed capacity {} ({} available)",
                    reservation.seats, event.event_id, event.capacity, available_seats
                );
                Err(BookingError::Integrity(format!(
                    "event {} cannot take back {} seats",
                    event.event_id, reservation.seats
                )))
            }
            AdjustOutcome::EventMissing => Err(BookingError::event_not_found(reservation.event_id)),
            AdjustOutcome::ReservationMissing => Err(BookingError::reservation_not_found(reservation_id)),
        }
    }
}

/// Entry point used by the transport layer.
pub struct BookingCore {
    store: SharedStore,
    reservations: ReservationService,
    cancellations: CancellationService,
}

impl BookingCore {
    pub fn new(store: SharedStore) -> Self {
        Self {
            reservations: ReservationService::new(store.clone()),
            cancellations: CancellationService::new(store.clone()),
            store,
        }
    }

    pub async fn reserve_seats(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        partner_id: Uuid,
        seats: i32,
    ) -> BookingResult<Reservation> {
        self.reservations.reserve(event_id, user_id, partner_id, seats).await
    }

    pub async fn cancel_reservation(&self, reservation_id: Uuid) -> BookingResult<Reservation> {
        self.cancellations.cancel(reservation_id).await
    }

    pub async fn get_event(&self, event_id: Uuid) -> BookingResult<Event> {
        self.store
            .fetch_event(event_id)
            .await?
            .ok_or_else(|| BookingError::event_not_found(event_id))
    }

    pub async fn list_events(&self) -> BookingResult<Vec<Event>> {
        Ok(self.store.list_events().await?)
    }

    pub async fn list_reservations_for_user(&self, user_id: Uuid) -> BookingResult<Vec<Reservation>> {
        Ok(self.store.reservations_for_user(user_id).await?)
    }
}
