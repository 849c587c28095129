use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::manager::SeatInventoryManager;

/// Starts the periodic expiry pass. Abort the handle to stop it.
/// A zero period falls back to one second.
pub fn spawn_expiry_sweeper(manager: Arc<SeatInventoryManager>, every: Duration) -> JoinHandle<()> {
    let every = if every.is_zero() {
        warn!("Expiry sweep interval is zero, using 1s");
        Duration::from_secs(1)
    } else {
        every
    };

    tokio::spawn(async move {
        info!("Expiry sweeper started, running every {:?}", every);

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match manager.sweep_expired_holds().await {
                Ok(0) => debug!("Expiry sweep found nothing to free"),
                Ok(_) => {}
                Err(e) => error!("Expiry sweep failed: {}", e),
            }
        }
    })
}
