use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};

use crate::app_config::InventoryRules;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Operator overrides stored as `{"value": <number>}` rows win over file config.
    pub async fn fetch_inventory_rules(
        &self,
        defaults: InventoryRules,
    ) -> Result<InventoryRules, sqlx::Error> {
        let rows: Vec<(String, Value)> =
            sqlx::query_as("SELECT rule_key, rule_value FROM inventory_rules")
                .fetch_all(&self.pool)
                .await?;

        let mut rules = defaults;
        for (key, value) in rows {
            if !apply_rule(&mut rules, &key, &value) {
                warn!("Ignoring inventory rule {} = {}", key, value);
            }
        }
        Ok(rules)
    }
}

fn apply_rule(rules: &mut InventoryRules, key: &str, value: &Value) -> bool {
    let Some(n) = value.get("value").and_then(Value::as_u64) else {
        return false;
    };

    match key {
        "seat_hold_seconds" if n > 0 => rules.seat_hold_seconds = n,
        "max_hold_seconds" if n > 0 => rules.max_hold_seconds = n,
        "sweep_interval_seconds" if n > 0 => rules.sweep_interval_seconds = n,
        "default_seat_count" => match u32::try_from(n) {
            Ok(count) if count > 0 => rules.default_seat_count = count,
            _ => return false,
        },
        _ => return false,
    }
    true
}
