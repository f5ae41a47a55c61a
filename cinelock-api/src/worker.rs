use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::state::AppState;

/// Start the periodic expiry sweep. An interval of zero leaves expiry to the
/// lazy checks alone and starts nothing.
pub fn start_expiry_reaper(
    state: &AppState,
    interval_seconds: u64,
    shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    if interval_seconds == 0 {
        info!("Active lock sweep disabled; relying on lazy expiry");
        return None;
    }

    Some(state.reaper.clone().spawn(Duration::from_secs(interval_seconds), shutdown))
}
