pub mod clock;
pub mod events;
pub mod models;
pub mod repository;
pub mod memory;
pub mod manager;
pub mod reaper;
pub mod finalizer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::EventBus;
pub use finalizer::{BookingFinalizer, FinalizeResult};
pub use manager::{LockManager, LockPolicy, LockResult, RefreshPolicy, UnlockResult, MAX_HOLD_SECONDS};
pub use memory::MemoryLockStore;
pub use models::{Booking, LockStatus, SeatKey, SeatLock};
pub use reaper::ExpiryReaper;
pub use repository::LockStore;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Lock store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Corrupt lock store record: {0}")]
    CorruptRecord(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
