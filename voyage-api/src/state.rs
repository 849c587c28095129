use std::sync::Arc;
use tokio::sync::broadcast;
use voyage_core::{Clock, InventoryStore, SeatEvent, SeatEventPublisher};
use voyage_inventory::SeatInventoryManager;
use voyage_order::ReservationManager;
use voyage_store::{InventoryRules, RedisClient};

use crate::stream::BroadcastPublisher;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub inventory: Arc<SeatInventoryManager>,
    pub reservations: Arc<ReservationManager>,
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit_per_minute: i64,
    pub sse_tx: broadcast::Sender<SeatEvent>,
    pub auth: AuthConfig,
    pub rules: InventoryRules,
}

impl AppState {
    /// Wires the inventory core. SSE subscribers always receive seat events;
    /// `extra_publishers` (Kafka) are added behind it.
    pub fn new(
        store: Arc<dyn InventoryStore>,
        clock: Arc<dyn Clock>,
        extra_publishers: Vec<Arc<dyn SeatEventPublisher>>,
        auth: AuthConfig,
        rules: InventoryRules,
    ) -> Self {
        let (sse_tx, _) = broadcast::channel(256);

        let mut inventory = SeatInventoryManager::new(store, clock)
            .with_publisher(Arc::new(BroadcastPublisher::new(sse_tx.clone())));
        for publisher in extra_publishers {
            inventory = inventory.with_publisher(publisher);
        }
        let inventory = Arc::new(inventory);

        Self {
            reservations: Arc::new(ReservationManager::new(inventory.clone())),
            inventory,
            redis: None,
            rate_limit_per_minute: 100,
            sse_tx,
            auth,
            rules,
        }
    }

    pub fn with_rate_limit(mut self, redis: Arc<RedisClient>, per_minute: i64) -> Self {
        self.redis = Some(redis);
        self.rate_limit_per_minute = per_minute;
        self
    }
}
