use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;
use shared::{Event, Reservation};
use crate::models::*;
use crate::schema::*;
use crate::store::{classify_rejection, AdjustOutcome, ConcurrencyGuardedStore, LedgerChange, SeatAdjustment};

pub type DbPool = bb8::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

#[derive(Debug, Error)]
enum TxError {
    #[error("reservation {0} was already removed")]
    ReservationGone(Uuid),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_size: u32, connection_timeout: Duration) -> Result<Self> {
        let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = bb8::Pool::builder()
            .max_size(max_size)
            .connection_timeout(connection_timeout)
            .build(config)
            .await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl ConcurrencyGuardedStore for PgStore {
    async fn fetch_event(&self, event_id: Uuid) -> Result<Option<Event>> {
        let mut conn = self.pool.get().await?;
        let row = events::table
            .find(event_id)
            .first::<EventRow>(&mut conn)
            .await
            .optional()?;
        Ok(row.map(Event::from))
    }

    async fn list_events(&self) -> Result<Vec<Event>> {
        let mut conn = self.pool.get().await?;
        let rows = events::table
            .order((events::name.asc(), events::event_id.asc()))
            .load::<EventRow>(&mut conn)
            .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn fetch_reservation(&self, reservation_id: Uuid) -> Result<Option<Reservation>> {
        let mut conn = self.pool.get().await?;
        let row = reservations::table
            .find(reservation_id)
            .first::<ReservationRow>(&mut conn)
            .await
            .optional()?;
        Ok(row.map(Reservation::from))
    }

    async fn reservations_for_user(&self, user_id: Uuid) -> Result<Vec<Reservation>> {
        let mut conn = self.pool.get().await?;
        let rows = reservations::table
            .filter(reservations::user_id.eq(user_id))
            .order((reservations::created_at.asc(), reservations::reservation_id.asc()))
            .load::<ReservationRow>(&mut conn)
            .await?;
        Ok(rows.into_iter().map(Reservation::from).collect())
    }

    async fn conditional_adjust_seats(
        &self,
        adjustment: SeatAdjustment,
        ledger: LedgerChange,
    ) -> Result<AdjustOutcome> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let result = conn.transaction::<_, TxError, _>(|conn| {
            Box::pin(async move {
                let SeatAdjustment { event_id, delta, expected_version } = adjustment;
                let removal = match &ledger {
                    LedgerChange::Remove(reservation_id) => Some(*reservation_id),
                    LedgerChange::Insert(_) => None,
                };

                // Zero rows means the version moved or the bound would break.
                let updated = diesel::update(
                    events::table
                        .filter(events::event_id.eq(event_id))
                        .filter(events::version.eq(expected_version))
                        .filter((events::available_seats + delta).ge(0))
                        .filter((events::available_seats + delta).le(events::capacity)),
                )
                .set((
                    events::available_seats.eq(events::available_seats + delta),
                    events::version.eq(events::version + 1),
                    events::updated_at.eq(Utc::now()),
                ))
                .get_result::<EventRow>(conn)
                .await
                .optional()?;

                let Some(updated) = updated else {
                    return Ok(explain_rejection(conn, adjustment, removal).await?);
                };

                let reservation = match ledger {
                    LedgerChange::Insert(new_reservation) => {
                        diesel::insert_into(reservations::table)
                            .values(NewReservationRow::from(&new_reservation))
                            .get_result::<ReservationRow>(conn)
                            .await?
                    }
                    LedgerChange::Remove(reservation_id) => {
                        diesel::delete(reservations::table.filter(reservations::reservation_id.eq(reservation_id)))
                            .get_result::<ReservationRow>(conn)
                            .await
                            .optional()?
                            .ok_or(TxError::ReservationGone(reservation_id))?
                    }
                };

                Ok(AdjustOutcome::Applied {
                    event: updated.into(),
                    reservation: reservation.into(),
                })
            })
        }).await;

        match result {
            Ok(outcome) => Ok(outcome),
            Err(TxError::ReservationGone(reservation_id)) => {
                warn!("Reservation {} removed concurrently, seat release rolled back", reservation_id);
                Ok(AdjustOutcome::ReservationMissing)
            }
            Err(TxError::Database(e)) => Err(e.into()),
        }
    }
}

async fn explain_rejection(
    conn: &mut AsyncPgConnection,
    adjustment: SeatAdjustment,
    removal: Option<Uuid>,
) -> QueryResult<AdjustOutcome> {
    let current = events::table
        .find(adjustment.event_id)
        .first::<EventRow>(conn)
        .await
        .optional()?
        .map(Event::from);

    let ledger_row_present = match removal {
        Some(reservation_id) => reservations::table
            .find(reservation_id)
            .first::<ReservationRow>(conn)
            .await
            .optional()?
            .is_some(),
        None => true,
    };

    Ok(classify_rejection(current.as_ref(), &adjustment, ledger_row_present))
}
