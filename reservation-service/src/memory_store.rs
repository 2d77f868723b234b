use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;
use shared::{Event, Reservation};
use crate::store::{classify_rejection, AdjustOutcome, ConcurrencyGuardedStore, LedgerChange, SeatAdjustment};

#[derive(Default)]
struct Tables {
    events: HashMap<Uuid, Event>,
    reservations: Vec<Reservation>,
}

/// In-process store with the same guard semantics as the Postgres store.
///
/// One mutex covers both tables, so a guarded adjustment and its ledger change
/// commit or fail together.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        let events = events.into_iter().map(|event| (event.event_id, event)).collect();
        Self {
            tables: Mutex::new(Tables {
                events,
                reservations: Vec::new(),
            }),
        }
    }

    pub async fn insert_event(&self, event: Event) {
        self.tables.lock().await.events.insert(event.event_id, event);
    }

    /// Drops an event row without touching its reservations.
    pub async fn remove_event(&self, event_id: Uuid) -> Option<Event> {
        self.tables.lock().await.events.remove(&event_id)
    }

    pub async fn reservations_for_event(&self, event_id: Uuid) -> Vec<Reservation> {
        self.tables
            .lock()
            .await
            .reservations
            .iter()
            .filter(|reservation| reservation.event_id == event_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ConcurrencyGuardedStore for MemoryStore {
    async fn fetch_event(&self, event_id: Uuid) -> Result<Option<Event>> {
        Ok(self.tables.lock().await.events.get(&event_id).cloned())
    }

    async fn list_events(&self) -> Result<Vec<Event>> {
        let mut events: Vec<Event> = self.tables.lock().await.events.values().cloned().collect();
        events.sort_by(|a, b| a.name.cmp(&b.name).then(a.event_id.cmp(&b.event_id)));
        Ok(events)
    }

    async fn fetch_reservation(&self, reservation_id: Uuid) -> Result<Option<Reservation>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reservations
            .iter()
            .find(|reservation| reservation.reservation_id == reservation_id)
            .cloned())
    }

    async fn reservations_for_user(&self, user_id: Uuid) -> Result<Vec<Reservation>> {
        let tables = self.tables.lock().await;
        let mut reservations: Vec<Reservation> = tables
            .reservations
            .iter()
            .filter(|reservation| reservation.user_id == user_id)
            .cloned()
            .collect();
        reservations.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.reservation_id.cmp(&b.reservation_id))
        });
        Ok(reservations)
    }

    async fn conditional_adjust_seats(
        &self,
        adjustment: SeatAdjustment,
        ledger: LedgerChange,
    ) -> Result<AdjustOutcome> {
        let mut guard = self.tables.lock().await;
        let tables = &mut *guard;

        let removal_index = match &ledger {
            LedgerChange::Remove(reservation_id) => tables
                .reservations
                .iter()
                .position(|reservation| reservation.reservation_id == *reservation_id),
            LedgerChange::Insert(_) => None,
        };
        let ledger_row_present = matches!(ledger, LedgerChange::Insert(_)) || removal_index.is_some();

        let Some(event) = tables.events.get_mut(&adjustment.event_id) else {
            return Ok(AdjustOutcome::EventMissing);
        };
        if event.version != adjustment.expected_version
            || !ledger_row_present
            || !adjustment.within_bounds(event)
        {
            return Ok(classify_rejection(Some(&*event), &adjustment, ledger_row_present));
        }

        let reservation = match (ledger, removal_index) {
            (LedgerChange::Insert(new_reservation), _) => {
                let reservation = Reservation::from(new_reservation);
                tables.reservations.push(reservation.clone());
                reservation
            }
            (LedgerChange::Remove(_), Some(index)) => tables.reservations.remove(index),
            (LedgerChange::Remove(_), None) => return Ok(AdjustOutcome::ReservationMissing),
        };

        event.available_seats += adjustment.delta;
        event.version += 1;
        event.updated_at = Utc::now();

        Ok(AdjustOutcome::Applied {
            event: event.clone(),
            reservation,
        })
    }
}
