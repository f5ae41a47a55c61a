use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinelock_core::repository::{AcquireOutcome, AcquireRequest, CommitOutcome, ReleaseOutcome};
use cinelock_core::{Booking, CoreError, CoreResult, LockStatus, LockStore, RefreshPolicy, SeatKey, SeatLock};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Lock store on a single Postgres table keyed by the seat.
///
/// Consumed rows stay in the table and are never re-acquired, so the row
/// itself records that the seat is sold for that showing.
pub struct PgLockStore {
    pool: PgPool,
}

impl PgLockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct GrantedRow {
    owner_id: String,
    acquired_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    renewed: bool,
}

#[derive(sqlx::FromRow)]
struct LockRow {
    schedule_id: String,
    cinema_room_id: String,
    seat_id: String,
    owner_id: String,
    acquired_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    status: String,
}

impl LockRow {
    fn into_lock(self) -> CoreResult<SeatLock> {
        let status = LockStatus::parse(&self.status)
            .ok_or_else(|| CoreError::CorruptRecord(format!("unknown lock status {}", self.status)))?;
        Ok(SeatLock {
            key: SeatKey::new(self.schedule_id, self.cinema_room_id, self.seat_id),
            owner_id: self.owner_id,
            acquired_at: self.acquired_at,
            expires_at: self.expires_at,
            status,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    schedule_id: String,
    cinema_room_id: String,
    owner_id: String,
    seat_ids: Vec<String>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SeatKeyRow {
    schedule_id: String,
    cinema_room_id: String,
    seat_id: String,
}

fn unavailable(e: sqlx::Error) -> CoreError {
    CoreError::StoreUnavailable(e.to_string())
}

const ACQUIRE_SQL: &str = r#"
    INSERT INTO seat_locks AS l (schedule_id, cinema_room_id, seat_id, owner_id, acquired_at, expires_at, status)
    VALUES ($1, $2, $3, $4, $5, $6, 'ACTIVE')
    ON CONFLICT (schedule_id, cinema_room_id, seat_id) DO UPDATE
    SET owner_id = EXCLUDED.owner_id,
        acquired_at = CASE
            WHEN l.status = 'ACTIVE' AND l.expires_at > $5 THEN l.acquired_at
            ELSE EXCLUDED.acquired_at
        END,
        expires_at = CASE
            WHEN l.status = 'ACTIVE' AND l.expires_at > $5 AND $7 THEN GREATEST(l.expires_at, EXCLUDED.expires_at)
            WHEN l.status = 'ACTIVE' AND l.expires_at > $5 THEN l.expires_at
            ELSE EXCLUDED.expires_at
        END,
        status = 'ACTIVE',
        booking_id = NULL
    WHERE l.status IN ('RELEASED', 'EXPIRED')
       OR (l.status = 'ACTIVE' AND (l.expires_at <= $5 OR l.owner_id = EXCLUDED.owner_id))
    RETURNING owner_id, acquired_at, expires_at, (acquired_at <> $5) AS renewed
"#;

const RELEASE_SQL: &str = r#"
    UPDATE seat_locks
    SET status = 'RELEASED'
    WHERE schedule_id = $1 AND cinema_room_id = $2 AND seat_id = $3
      AND owner_id = $4 AND status = 'ACTIVE' AND expires_at > $5
    RETURNING schedule_id, cinema_room_id, seat_id, owner_id, acquired_at, expires_at, status
"#;

const SELECT_LOCK_SQL: &str = r#"
    SELECT schedule_id, cinema_room_id, seat_id, owner_id, acquired_at, expires_at, status
    FROM seat_locks
    WHERE schedule_id = $1 AND cinema_room_id = $2 AND seat_id = $3
"#;

#[async_trait]
impl LockStore for PgLockStore {
    async fn acquire(&self, req: AcquireRequest<'_>) -> CoreResult<AcquireOutcome> {
        let granted = sqlx::query_as::<_, GrantedRow>(ACQUIRE_SQL)
            .bind(&req.key.schedule_id)
            .bind(&req.key.cinema_room_id)
            .bind(&req.key.seat_id)
            .bind(req.owner_id)
            .bind(req.now)
            .bind(req.expires_at)
            .bind(req.refresh == RefreshPolicy::Sliding)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        if let Some(row) = granted {
            return Ok(AcquireOutcome::Granted {
                lock: SeatLock {
                    key: req.key.clone(),
                    owner_id: row.owner_id,
                    acquired_at: row.acquired_at,
                    expires_at: row.expires_at,
                    status: LockStatus::Active,
                },
                renewed: row.renewed,
            });
        }

        // The conditional upsert declined; this read only explains why.
        let holder = sqlx::query_as::<_, LockRow>(SELECT_LOCK_SQL)
            .bind(&req.key.schedule_id)
            .bind(&req.key.cinema_room_id)
            .bind(&req.key.seat_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        match holder {
            Some(row) if row.status == LockStatus::Consumed.as_str() => Ok(AcquireOutcome::Booked),
            Some(row) => Ok(AcquireOutcome::Conflict { held_until: row.expires_at }),
            None => Ok(AcquireOutcome::Conflict { held_until: req.now }),
        }
    }

    async fn release(&self, key: &SeatKey, owner_id: &str, now: DateTime<Utc>) -> CoreResult<ReleaseOutcome> {
        let released = sqlx::query_as::<_, LockRow>(RELEASE_SQL)
            .bind(&key.schedule_id)
            .bind(&key.cinema_room_id)
            .bind(&key.seat_id)
            .bind(owner_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        if let Some(row) = released {
            return Ok(ReleaseOutcome::Released(row.into_lock()?));
        }

        let current = sqlx::query_as::<_, LockRow>(SELECT_LOCK_SQL)
            .bind(&key.schedule_id)
            .bind(&key.cinema_room_id)
            .bind(&key.seat_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        match current {
            Some(row) => {
                let lock = row.into_lock()?;
                if lock.is_live(now) && lock.owner_id != owner_id {
                    Ok(ReleaseOutcome::NotOwner)
                } else {
                    Ok(ReleaseOutcome::NotFound)
                }
            }
            None => Ok(ReleaseOutcome::NotFound),
        }
    }

    async fn active_locks(
        &self,
        schedule_id: &str,
        cinema_room_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<SeatLock>> {
        let rows = sqlx::query_as::<_, LockRow>(
            r#"
            SELECT schedule_id, cinema_room_id, seat_id, owner_id, acquired_at, expires_at, status
            FROM seat_locks
            WHERE schedule_id = $1 AND cinema_room_id = $2 AND status = 'ACTIVE' AND expires_at > $3
            ORDER BY seat_id
            "#,
        )
        .bind(schedule_id)
        .bind(cinema_room_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.into_iter().map(LockRow::into_lock).collect()
    }

    async fn commit_booking(&self, booking: &Booking, now: DateTime<Utc>) -> CoreResult<CommitOutcome> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        // Row locks in seat order so overlapping finalizes cannot deadlock.
        let rows = sqlx::query_as::<_, LockRow>(
            r#"
            SELECT schedule_id, cinema_room_id, seat_id, owner_id, acquired_at, expires_at, status
            FROM seat_locks
            WHERE schedule_id = $1 AND cinema_room_id = $2 AND seat_id = ANY($3)
            ORDER BY seat_id
            FOR UPDATE
            "#,
        )
        .bind(&booking.schedule_id)
        .bind(&booking.cinema_room_id)
        .bind(&booking.seat_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(unavailable)?;

        let mut held: HashMap<String, SeatLock> = HashMap::new();
        for row in rows {
            let lock = row.into_lock()?;
            held.insert(lock.key.seat_id.clone(), lock);
        }

        let invalid_seats: Vec<String> = booking
            .seat_ids
            .iter()
            .filter(|seat| !held.get(*seat).is_some_and(|lock| lock.is_held_by(&booking.owner_id, now)))
            .cloned()
            .collect();

        if !invalid_seats.is_empty() {
            tx.rollback().await.map_err(unavailable)?;
            return Ok(CommitOutcome::Rejected { invalid_seats });
        }

        sqlx::query(
            r#"
            INSERT INTO bookings (id, schedule_id, cinema_room_id, owner_id, seat_ids, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.schedule_id)
        .bind(&booking.cinema_room_id)
        .bind(&booking.owner_id)
        .bind(&booking.seat_ids)
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        sqlx::query(
            r#"
            UPDATE seat_locks
            SET status = 'CONSUMED', booking_id = $4
            WHERE schedule_id = $1 AND cinema_room_id = $2 AND seat_id = ANY($3)
            "#,
        )
        .bind(&booking.schedule_id)
        .bind(&booking.cinema_room_id)
        .bind(&booking.seat_ids)
        .bind(booking.id)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)?;
        debug!(booking_id = %booking.id, "Booking committed to Postgres");
        Ok(CommitOutcome::Committed(booking.clone()))
    }

    async fn get_booking(&self, booking_id: Uuid) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(
            "SELECT id, schedule_id, cinema_room_id, owner_id, seat_ids, created_at FROM bookings WHERE id = $1",
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(row.map(|r| Booking {
            id: r.id,
            schedule_id: r.schedule_id,
            cinema_room_id: r.cinema_room_id,
            owner_id: r.owner_id,
            seat_ids: r.seat_ids,
            created_at: r.created_at,
        }))
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<SeatKey>> {
        let rows = sqlx::query_as::<_, SeatKeyRow>(
            r#"
            UPDATE seat_locks
            SET status = 'EXPIRED'
            WHERE status = 'ACTIVE' AND expires_at <= $1
            RETURNING schedule_id, cinema_room_id, seat_id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(rows
            .into_iter()
            .map(|r| SeatKey::new(r.schedule_id, r.cinema_room_id, r.seat_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbClient;
    use chrono::Duration;
    use cinelock_core::manager::{LockManager, LockPolicy, LockResult};
    use cinelock_core::{BookingFinalizer, EventBus, FinalizeResult, ManualClock};
    use std::sync::Arc;

    #[test]
    fn test_unknown_status_is_corrupt() {
        let row = LockRow {
            schedule_id: "S1".into(),
            cinema_room_id: "R1".into(),
            seat_id: "A5".into(),
            owner_id: "alice".into(),
            acquired_at: Utc::now(),
            expires_at: Utc::now() + Duration::minutes(5),
            status: "HELD".into(),
        };
        assert!(matches!(row.into_lock(), Err(CoreError::CorruptRecord(_))));
    }

    // Needs a scratch database: CINELOCK_TEST_DATABASE_URL=postgres://... cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_postgres_lock_and_finalize_flow() {
        let url = std::env::var("CINELOCK_TEST_DATABASE_URL").expect("CINELOCK_TEST_DATABASE_URL not set");
        let db = DbClient::new(&url).await.unwrap();
        db.migrate().await.unwrap();

        let store = Arc::new(PgLockStore::new(db.pool.clone()));
        let clock = Arc::new(ManualClock::default());
        let bus = EventBus::default();
        let manager = LockManager::new(store.clone(), clock.clone(), LockPolicy::default(), bus.clone());
        let finalizer = BookingFinalizer::new(store, clock.clone(), bus, 10);

        let schedule = format!("S-{}", Uuid::new_v4());
        let seat = SeatKey::new(&schedule, "R1", "A5");

        assert!(manager.lock(&seat, "alice").await.unwrap().is_granted());
        assert!(matches!(manager.lock(&seat, "bob").await.unwrap(), LockResult::Conflict { .. }));

        let result = finalizer.finalize(&schedule, "R1", &["A5".to_string()], "alice").await.unwrap();
        assert!(matches!(result, FinalizeResult::Booked(_)));

        clock.advance(Duration::hours(1));
        assert_eq!(manager.lock(&seat, "bob").await.unwrap(), LockResult::Booked);
    }
}
