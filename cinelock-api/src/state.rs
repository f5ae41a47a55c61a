use std::sync::Arc;
use cinelock_core::{
    BookingFinalizer, Clock, CoreResult, EventBus, ExpiryReaper, LockManager, LockPolicy, LockStore,
};
use cinelock_store::app_config::LockRules;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub lock_manager: Arc<LockManager>,
    pub finalizer: Arc<BookingFinalizer>,
    pub reaper: ExpiryReaper,
    pub events: EventBus,
    pub auth: AuthConfig,
}

impl AppState {
    /// Wire every component to the same store, clock and event bus.
    pub fn new(
        store: Arc<dyn LockStore>,
        clock: Arc<dyn Clock>,
        rules: &LockRules,
        auth: AuthConfig,
    ) -> CoreResult<Self> {
        let events = EventBus::default();
        let policy = LockPolicy::from_seconds(rules.hold_seconds, rules.refresh_policy)?;

        Ok(Self {
            lock_manager: Arc::new(LockManager::new(store.clone(), clock.clone(), policy, events.clone())),
            finalizer: Arc::new(BookingFinalizer::new(
                store.clone(),
                clock.clone(),
                events.clone(),
                rules.max_seats_per_finalize,
            )),
            reaper: ExpiryReaper::new(store, clock, events.clone()),
            events,
            auth,
        })
    }
}
