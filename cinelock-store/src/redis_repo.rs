use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cinelock_core::repository::{AcquireOutcome, AcquireRequest, CommitOutcome, ReleaseOutcome};
use cinelock_core::{Booking, CoreError, CoreResult, LockStatus, LockStore, RefreshPolicy, SeatKey, SeatLock};
use redis::AsyncCommands;
use tracing::{info, warn};
use uuid::Uuid;

/// How long Redis keeps a lapsed lock hash around before evicting it. Expiry
/// decisions always compare against the caller's clock; this margin only
/// keeps a Redis clock running ahead from dropping a hold early.
fn eviction_grace() -> Duration {
    Duration::seconds(60)
}

// KEYS: lock hash, booked marker, showing index
// ARGV: owner, now_ms, expires_ms, sliding (1/0), seat_id, evict_at_ms
const ACQUIRE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[2]) == 1 then
    return {'BOOKED'}
end
local now = tonumber(ARGV[2])
local owner = redis.call('HGET', KEYS[1], 'owner')
if owner then
    local expires_raw = redis.call('HGET', KEYS[1], 'expires_at')
    if tonumber(expires_raw) > now then
        if owner ~= ARGV[1] then
            return {'CONFLICT', expires_raw}
        end
        local acquired_raw = redis.call('HGET', KEYS[1], 'acquired_at')
        if ARGV[4] == '1' and tonumber(ARGV[3]) > tonumber(expires_raw) then
            expires_raw = ARGV[3]
            redis.call('HSET', KEYS[1], 'expires_at', expires_raw)
            redis.call('PEXPIREAT', KEYS[1], ARGV[6])
        end
        return {'RENEWED', acquired_raw, expires_raw}
    end
end
redis.call('DEL', KEYS[1])
redis.call('HSET', KEYS[1], 'owner', ARGV[1], 'acquired_at', ARGV[2], 'expires_at', ARGV[3])
redis.call('PEXPIREAT', KEYS[1], ARGV[6])
redis.call('SADD', KEYS[3], ARGV[5])
return {'GRANTED', ARGV[2], ARGV[3]}
"#;

// KEYS: lock hash, showing index
// ARGV: owner, now_ms, seat_id
const RELEASE_SCRIPT: &str = r#"
local owner = redis.call('HGET', KEYS[1], 'owner')
if not owner then
    return {'NOT_FOUND'}
end
local expires_raw = redis.call('HGET', KEYS[1], 'expires_at')
if tonumber(expires_raw) <= tonumber(ARGV[2]) then
    return {'NOT_FOUND'}
end
if owner ~= ARGV[1] then
    return {'NOT_OWNER'}
end
local acquired_raw = redis.call('HGET', KEYS[1], 'acquired_at')
redis.call('DEL', KEYS[1])
redis.call('SREM', KEYS[2], ARGV[3])
return {'RELEASED', acquired_raw, expires_raw}
"#;

// KEYS: n lock hashes, n booked markers, showing index, booking record
// ARGV: owner, now_ms, booking_id, booking_json, n, seat_1 .. seat_n
const COMMIT_SCRIPT: &str = r#"
local n = tonumber(ARGV[5])
local now = tonumber(ARGV[2])
local invalid = {}
for i = 1, n do
    local owner = redis.call('HGET', KEYS[i], 'owner')
    local expires_raw = redis.call('HGET', KEYS[i], 'expires_at')
    if (not owner) or owner ~= ARGV[1] or tonumber(expires_raw) <= now
        or redis.call('EXISTS', KEYS[n + i]) == 1 then
        table.insert(invalid, ARGV[5 + i])
    end
end
if #invalid > 0 then
    table.insert(invalid, 1, 'INVALID')
    return invalid
end
redis.call('SET', KEYS[2 * n + 2], ARGV[4])
for i = 1, n do
    redis.call('SET', KEYS[n + i], ARGV[3])
    redis.call('DEL', KEYS[i])
    redis.call('SREM', KEYS[2 * n + 1], ARGV[5 + i])
end
return {'COMMITTED'}
"#;

// KEYS: showing index
// ARGV: now_ms, lock key prefix of the showing
const SWEEP_SCRIPT: &str = r#"
local expired = {}
for _, seat in ipairs(redis.call('SMEMBERS', KEYS[1])) do
    local key = ARGV[2] .. seat
    local expires_raw = redis.call('HGET', key, 'expires_at')
    if (not expires_raw) or tonumber(expires_raw) <= tonumber(ARGV[1]) then
        redis.call('DEL', key)
        redis.call('SREM', KEYS[1], seat)
        table.insert(expired, seat)
    end
end
return expired
"#;

/// Key layout. Every key of one showing shares a hash tag that starts with
/// the showing, so a multi-seat commit touches a single cluster slot.
///
/// Both ids are length-prefixed (`{2:S1:2:R1}`), which keeps two different
/// showings from ever rendering the same key, whatever characters the ids hold.
#[derive(Debug, Clone)]
struct KeySpace {
    prefix: String,
}

impl KeySpace {
    fn showing(&self, schedule_id: &str, cinema_room_id: &str) -> String {
        format!(
            "{}:{{{}:{}:{}:{}}}",
            self.prefix,
            schedule_id.len(),
            schedule_id,
            cinema_room_id.len(),
            cinema_room_id
        )
    }

    fn lock_prefix(&self, schedule_id: &str, cinema_room_id: &str) -> String {
        format!("{}:lock:", self.showing(schedule_id, cinema_room_id))
    }

    fn lock(&self, key: &SeatKey) -> String {
        format!("{}{}", self.lock_prefix(&key.schedule_id, &key.cinema_room_id), key.seat_id)
    }

    fn booked(&self, key: &SeatKey) -> String {
        format!("{}:booked:{}", self.showing(&key.schedule_id, &key.cinema_room_id), key.seat_id)
    }

    fn index(&self, schedule_id: &str, cinema_room_id: &str) -> String {
        format!("{}:locks", self.showing(schedule_id, cinema_room_id))
    }

    fn booking_record(&self, booking: &Booking) -> String {
        format!("{}:booking:{}", self.showing(&booking.schedule_id, &booking.cinema_room_id), booking.id)
    }

    /// Global pointer from booking id to its record key
    fn booking_pointer(&self, booking_id: Uuid) -> String {
        format!("{}:booking:{}", self.prefix, booking_id)
    }

    /// Set of showings that may still have lock records, for the sweep
    fn showings(&self) -> String {
        format!("{}:showings", self.prefix)
    }
}

fn unavailable(e: redis::RedisError) -> CoreError {
    CoreError::StoreUnavailable(e.to_string())
}

fn millis_to_time(raw: &str) -> CoreResult<DateTime<Utc>> {
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| CoreError::CorruptRecord(format!("bad timestamp {:?}", raw)))
}

fn malformed(reply: &[String]) -> CoreError {
    CoreError::CorruptRecord(format!("unexpected script reply {:?}", reply))
}

fn parse_acquire_reply(reply: &[String], key: &SeatKey, owner_id: &str) -> CoreResult<AcquireOutcome> {
    match reply {
        [tag] if tag == "BOOKED" => Ok(AcquireOutcome::Booked),
        [tag, expires] if tag == "CONFLICT" => Ok(AcquireOutcome::Conflict {
            held_until: millis_to_time(expires)?,
        }),
        [tag, acquired, expires] if tag == "GRANTED" || tag == "RENEWED" => Ok(AcquireOutcome::Granted {
            lock: SeatLock {
                key: key.clone(),
                owner_id: owner_id.to_string(),
                acquired_at: millis_to_time(acquired)?,
                expires_at: millis_to_time(expires)?,
                status: LockStatus::Active,
            },
            renewed: tag == "RENEWED",
        }),
        _ => Err(malformed(reply)),
    }
}

fn parse_release_reply(reply: &[String], key: &SeatKey, owner_id: &str) -> CoreResult<ReleaseOutcome> {
    match reply {
        [tag] if tag == "NOT_FOUND" => Ok(ReleaseOutcome::NotFound),
        [tag] if tag == "NOT_OWNER" => Ok(ReleaseOutcome::NotOwner),
        [tag, acquired, expires] if tag == "RELEASED" => Ok(ReleaseOutcome::Released(SeatLock {
            key: key.clone(),
            owner_id: owner_id.to_string(),
            acquired_at: millis_to_time(acquired)?,
            expires_at: millis_to_time(expires)?,
            status: LockStatus::Released,
        })),
        _ => Err(malformed(reply)),
    }
}

fn parse_commit_reply(reply: &[String], booking: &Booking) -> CoreResult<CommitOutcome> {
    match reply.split_first() {
        Some((tag, [])) if tag == "COMMITTED" => Ok(CommitOutcome::Committed(booking.clone())),
        Some((tag, seats)) if tag == "INVALID" && !seats.is_empty() => Ok(CommitOutcome::Rejected {
            invalid_seats: seats.to_vec(),
        }),
        _ => Err(malformed(reply)),
    }
}

/// Lock store on Redis. Each mutation is one Lua script, which Redis runs
/// without interleaving any other command.
#[derive(Clone)]
pub struct RedisLockStore {
    client: redis::Client,
    keys: KeySpace,
}

impl RedisLockStore {
    pub async fn new(connection_string: &str, prefix: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        // Fail at start-up rather than on the first customer request.
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Connected to Redis lock store");
        Ok(Self {
            client,
            keys: KeySpace { prefix: prefix.to_string() },
        })
    }

    async fn conn(&self) -> CoreResult<redis::aio::MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await.map_err(unavailable)
    }

    async fn register_showing(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        schedule_id: &str,
        cinema_room_id: &str,
    ) -> CoreResult<()> {
        let showing = serde_json::to_string(&(schedule_id, cinema_room_id))
            .map_err(|e| CoreError::CorruptRecord(e.to_string()))?;
        conn.sadd::<_, _, ()>(self.keys.showings(), showing)
            .await
            .map_err(unavailable)
    }

    /// Drop a showing from the sweep set once its index is empty. The index
    /// is checked again after the removal: an acquire that landed in between
    /// found the showing still registered and skipped its own SADD, so the
    /// entry is put back.
    async fn retire_showing_if_idle(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        showing: &str,
        index: &str,
    ) -> CoreResult<bool> {
        let remaining: usize = conn.scard(index).await.map_err(unavailable)?;
        if remaining > 0 {
            return Ok(false);
        }
        conn.srem::<_, _, ()>(self.keys.showings(), showing)
            .await
            .map_err(unavailable)?;

        let raced: usize = conn.scard(index).await.map_err(unavailable)?;
        if raced > 0 {
            conn.sadd::<_, _, ()>(self.keys.showings(), showing)
                .await
                .map_err(unavailable)?;
            return Ok(false);
        }
        Ok(true)
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn acquire(&self, req: AcquireRequest<'_>) -> CoreResult<AcquireOutcome> {
        let mut conn = self.conn().await?;
        let key = req.key;
        let evict_at = req.expires_at + eviction_grace();

        let reply: Vec<String> = redis::Script::new(ACQUIRE_SCRIPT)
            .key(self.keys.lock(key))
            .key(self.keys.booked(key))
            .key(self.keys.index(&key.schedule_id, &key.cinema_room_id))
            .arg(req.owner_id)
            .arg(req.now.timestamp_millis())
            .arg(req.expires_at.timestamp_millis())
            .arg(if req.refresh == RefreshPolicy::Sliding { 1 } else { 0 })
            .arg(&key.seat_id)
            .arg(evict_at.timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;

        let outcome = parse_acquire_reply(&reply, key, req.owner_id)?;
        if matches!(outcome, AcquireOutcome::Granted { renewed: false, .. }) {
            // The hold is already granted; the showings set only steers the sweep.
            if let Err(e) = self.register_showing(&mut conn, &key.schedule_id, &key.cinema_room_id).await {
                warn!(seat = %key, "Failed to register showing for sweeping: {}", e);
            }
        }
        Ok(outcome)
    }

    async fn release(&self, key: &SeatKey, owner_id: &str, now: DateTime<Utc>) -> CoreResult<ReleaseOutcome> {
        let mut conn = self.conn().await?;
        let reply: Vec<String> = redis::Script::new(RELEASE_SCRIPT)
            .key(self.keys.lock(key))
            .key(self.keys.index(&key.schedule_id, &key.cinema_room_id))
            .arg(owner_id)
            .arg(now.timestamp_millis())
            .arg(&key.seat_id)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;

        parse_release_reply(&reply, key, owner_id)
    }

    async fn active_locks(
        &self,
        schedule_id: &str,
        cinema_room_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<SeatLock>> {
        let mut conn = self.conn().await?;
        let mut seats: Vec<String> = conn
            .smembers(self.keys.index(schedule_id, cinema_room_id))
            .await
            .map_err(unavailable)?;
        if seats.is_empty() {
            return Ok(Vec::new());
        }
        seats.sort();

        let mut pipe = redis::pipe();
        for seat in &seats {
            let key = SeatKey::new(schedule_id, cinema_room_id, seat);
            pipe.cmd("HMGET")
                .arg(self.keys.lock(&key))
                .arg("owner")
                .arg("acquired_at")
                .arg("expires_at");
        }
        let fields: Vec<(Option<String>, Option<String>, Option<String>)> =
            pipe.query_async(&mut conn).await.map_err(unavailable)?;

        let mut locks = Vec::new();
        for (seat, row) in seats.into_iter().zip(fields) {
            // Index entries can outlive evicted hashes until the next sweep.
            let (Some(owner_id), Some(acquired), Some(expires)) = row else {
                continue;
            };
            let lock = SeatLock {
                key: SeatKey::new(schedule_id, cinema_room_id, seat),
                owner_id,
                acquired_at: millis_to_time(&acquired)?,
                expires_at: millis_to_time(&expires)?,
                status: LockStatus::Active,
            };
            if lock.is_live(now) {
                locks.push(lock);
            }
        }
        Ok(locks)
    }

    async fn commit_booking(&self, booking: &Booking, now: DateTime<Utc>) -> CoreResult<CommitOutcome> {
        let mut conn = self.conn().await?;
        let record_key = self.keys.booking_record(booking);
        let payload = serde_json::to_string(booking).map_err(|e| CoreError::CorruptRecord(e.to_string()))?;

        let commit = redis::Script::new(COMMIT_SCRIPT);
        let mut script = commit.prepare_invoke();
        for key in booking.seat_keys() {
            script.key(self.keys.lock(&key));
        }
        for key in booking.seat_keys() {
            script.key(self.keys.booked(&key));
        }
        script
            .key(self.keys.index(&booking.schedule_id, &booking.cinema_room_id))
            .key(&record_key)
            .arg(&booking.owner_id)
            .arg(now.timestamp_millis())
            .arg(booking.id.to_string())
            .arg(payload)
            .arg(booking.seat_ids.len());
        for seat in &booking.seat_ids {
            script.arg(seat);
        }

        let reply: Vec<String> = script.invoke_async(&mut conn).await.map_err(unavailable)?;
        let outcome = parse_commit_reply(&reply, booking)?;

        if matches!(outcome, CommitOutcome::Committed(_)) {
            // The booking and its seat markers are already durable at this point;
            // the pointer only serves lookups by id.
            if let Err(e) = conn
                .set::<_, _, ()>(self.keys.booking_pointer(booking.id), &record_key)
                .await
            {
                warn!(booking_id = %booking.id, "Failed to index booking by id: {}", e);
            }
        }
        Ok(outcome)
    }

    async fn get_booking(&self, booking_id: Uuid) -> CoreResult<Option<Booking>> {
        let mut conn = self.conn().await?;
        let record_key: Option<String> = conn
            .get(self.keys.booking_pointer(booking_id))
            .await
            .map_err(unavailable)?;
        let Some(record_key) = record_key else {
            return Ok(None);
        };

        let payload: Option<String> = conn.get(record_key).await.map_err(unavailable)?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(|e| CoreError::CorruptRecord(e.to_string())))
            .transpose()
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<SeatKey>> {
        let mut conn = self.conn().await?;
        let showings: Vec<String> = conn.smembers(self.keys.showings()).await.map_err(unavailable)?;

        let mut expired = Vec::new();
        for showing in showings {
            let Ok((schedule_id, cinema_room_id)) = serde_json::from_str::<(String, String)>(&showing) else {
                warn!("Dropping malformed showing entry {:?}", showing);
                conn.srem::<_, _, ()>(self.keys.showings(), &showing).await.map_err(unavailable)?;
                continue;
            };

            let index = self.keys.index(&schedule_id, &cinema_room_id);
            let seats: Vec<String> = redis::Script::new(SWEEP_SCRIPT)
                .key(&index)
                .arg(now.timestamp_millis())
                .arg(self.keys.lock_prefix(&schedule_id, &cinema_room_id))
                .invoke_async(&mut conn)
                .await
                .map_err(unavailable)?;

            expired.extend(
                seats
                    .into_iter()
                    .map(|seat| SeatKey::new(&schedule_id, &cinema_room_id, seat)),
            );

            self.retire_showing_if_idle(&mut conn, &showing, &index).await?;
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> KeySpace {
        KeySpace { prefix: "cinelock".to_string() }
    }

    fn strings(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_showing_keys_share_hash_tag() {
        let seat = SeatKey::new("S1", "R1", "A5");
        let ks = keys();
        assert_eq!(ks.lock(&seat), "cinelock:{2:S1:2:R1}:lock:A5");
        assert_eq!(ks.booked(&seat), "cinelock:{2:S1:2:R1}:booked:A5");
        assert_eq!(ks.index("S1", "R1"), "cinelock:{2:S1:2:R1}:locks");
        assert!(ks.lock(&seat).starts_with(&ks.lock_prefix("S1", "R1")));
    }

    #[test]
    fn test_separator_in_ids_does_not_merge_showings() {
        let ks = keys();
        let left = SeatKey::new("S1:R", "1", "A5");
        let right = SeatKey::new("S1", "R:1", "A5");
        assert_ne!(ks.lock(&left), ks.lock(&right));
        assert_ne!(ks.booked(&left), ks.booked(&right));
        assert_ne!(ks.index("S1:R", "1"), ks.index("S1", "R:1"));

        // A room id that mimics the key suffix cannot shadow another seat.
        let spoofed = SeatKey::new("S1", "R1}:lock:X", "Y");
        let plain = SeatKey::new("S1", "R1", "X}:lock:Y");
        assert_ne!(ks.lock(&spoofed), ks.lock(&plain));
    }

    #[test]
    fn test_brace_in_ids_keeps_showing_in_one_slot() {
        let ks = keys();
        let seat = SeatKey::new("S}1", "R{1", "A5");
        let tag_of = |key: String| {
            let open = key.find('{').unwrap();
            let close = open + key[open..].find('}').unwrap();
            key[open + 1..close].to_string()
        };

        let tag = tag_of(ks.lock(&seat));
        assert!(!tag.is_empty());
        assert_eq!(tag_of(ks.booked(&seat)), tag);
        assert_eq!(tag_of(ks.index("S}1", "R{1")), tag);
    }

    #[test]
    fn test_acquire_reply_decoding() {
        let seat = SeatKey::new("S1", "R1", "A5");
        let granted = parse_acquire_reply(&strings(&["GRANTED", "1700000000000", "1700000300000"]), &seat, "alice").unwrap();
        match granted {
            AcquireOutcome::Granted { lock, renewed } => {
                assert!(!renewed);
                assert_eq!(lock.expires_at - lock.acquired_at, Duration::seconds(300));
                assert_eq!(lock.owner_id, "alice");
            }
            other => panic!("expected grant, got {:?}", other),
        }

        let conflict = parse_acquire_reply(&strings(&["CONFLICT", "1700000300000"]), &seat, "bob").unwrap();
        assert!(matches!(conflict, AcquireOutcome::Conflict { .. }));
        assert_eq!(parse_acquire_reply(&strings(&["BOOKED"]), &seat, "bob").unwrap(), AcquireOutcome::Booked);
        assert!(parse_acquire_reply(&strings(&["GRANTED", "soon", "later"]), &seat, "bob").is_err());
    }

    #[test]
    fn test_commit_reply_decoding() {
        let booking = Booking::new("S1".into(), "R1".into(), "alice".into(), strings(&["A1", "A2"]), Utc::now());
        assert_eq!(
            parse_commit_reply(&strings(&["INVALID", "A2"]), &booking).unwrap(),
            CommitOutcome::Rejected { invalid_seats: strings(&["A2"]) }
        );
        assert!(matches!(
            parse_commit_reply(&strings(&["COMMITTED"]), &booking).unwrap(),
            CommitOutcome::Committed(_)
        ));
        assert!(parse_commit_reply(&strings(&["INVALID"]), &booking).is_err());
    }

    // Needs a scratch Redis: CINELOCK_TEST_REDIS_URL=redis://... cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_redis_lock_conflict_and_release() {
        let url = std::env::var("CINELOCK_TEST_REDIS_URL").expect("CINELOCK_TEST_REDIS_URL not set");
        let store = RedisLockStore::new(&url, &format!("cinelock-test-{}", Uuid::new_v4())).await.unwrap();
        let seat = SeatKey::new("S1", "R1", "A5");
        let now = Utc::now();
        let req = |owner: &'static str| AcquireRequest {
            key: &seat,
            owner_id: owner,
            now,
            expires_at: now + Duration::seconds(300),
            refresh: RefreshPolicy::Sliding,
        };

        assert!(matches!(store.acquire(req("alice")).await.unwrap(), AcquireOutcome::Granted { .. }));
        assert!(matches!(store.acquire(req("bob")).await.unwrap(), AcquireOutcome::Conflict { .. }));
        assert_eq!(store.active_locks("S1", "R1", now).await.unwrap().len(), 1);
        assert!(matches!(store.release(&seat, "alice", now).await.unwrap(), ReleaseOutcome::Released(_)));
        assert_eq!(store.release(&seat, "alice", now).await.unwrap(), ReleaseOutcome::NotFound);
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_sweep_keeps_showing_while_index_has_seats() {
        let url = std::env::var("CINELOCK_TEST_REDIS_URL").expect("CINELOCK_TEST_REDIS_URL not set");
        let store = RedisLockStore::new(&url, &format!("cinelock-test-{}", Uuid::new_v4())).await.unwrap();
        let mut conn = store.conn().await.unwrap();
        let seat = SeatKey::new("S1", "R1", "A5");
        let showing = serde_json::to_string(&("S1", "R1")).unwrap();
        let index = store.keys.index("S1", "R1");
        let t0 = Utc::now();

        store
            .acquire(AcquireRequest {
                key: &seat,
                owner_id: "alice",
                now: t0,
                expires_at: t0 + Duration::seconds(300),
                refresh: RefreshPolicy::Sliding,
            })
            .await
            .unwrap();
        assert!(!store.retire_showing_if_idle(&mut conn, &showing, &index).await.unwrap());
        let registered: bool = conn.sismember(store.keys.showings(), &showing).await.unwrap();
        assert!(registered);

        let swept = store.sweep_expired(t0 + Duration::seconds(301)).await.unwrap();
        assert_eq!(swept, vec![seat]);
        let registered: bool = conn.sismember(store.keys.showings(), &showing).await.unwrap();
        assert!(!registered);
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_showings_with_separator_ids_stay_apart() {
        let url = std::env::var("CINELOCK_TEST_REDIS_URL").expect("CINELOCK_TEST_REDIS_URL not set");
        let store = RedisLockStore::new(&url, &format!("cinelock-test-{}", Uuid::new_v4())).await.unwrap();
        let now = Utc::now();
        let left = SeatKey::new("S1:R", "1", "A5");
        let right = SeatKey::new("S1", "R:1", "A5");
        fn req<'a>(seat: &'a SeatKey, owner_id: &'a str, now: DateTime<Utc>) -> AcquireRequest<'a> {
            AcquireRequest {
                key: seat,
                owner_id,
                now,
                expires_at: now + Duration::seconds(300),
                refresh: RefreshPolicy::Sliding,
            }
        }

        assert!(matches!(store.acquire(req(&left, "alice", now)).await.unwrap(), AcquireOutcome::Granted { .. }));
        assert!(matches!(store.acquire(req(&right, "bob", now)).await.unwrap(), AcquireOutcome::Granted { .. }));
        assert_eq!(store.active_locks("S1:R", "1", now).await.unwrap().len(), 1);
    }
}
