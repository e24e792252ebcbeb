//! Restaurant registry

use async_trait::async_trait;
use dashmap::DashMap;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::RestaurantRecord;
use std::collections::HashMap;

/// Read/write access to restaurant records
#[async_trait]
pub trait RestaurantDirectory: Send + Sync {
    async fn get(&self, id: &str) -> AppResult<RestaurantRecord>;
    async fn upsert(&self, record: RestaurantRecord) -> AppResult<()>;
    /// Full snapshot, keyed by id, for merge-gate checks
    async fn snapshot(&self) -> AppResult<HashMap<String, RestaurantRecord>>;
}

/// Single-node registry backed by a `DashMap`
#[derive(Debug, Default)]
pub struct InMemoryRestaurantDirectory {
    restaurants: DashMap<String, RestaurantRecord>,
}

impl InMemoryRestaurantDirectory {
    pub fn new() -> Self {
        Self {
            restaurants: DashMap::new(),
        }
    }
}

#[async_trait]
impl RestaurantDirectory for InMemoryRestaurantDirectory {
    async fn get(&self, id: &str) -> AppResult<RestaurantRecord> {
        self.restaurants
            .get(id)
            .map(|r| r.clone())
            .ok_or_else(|| AppError::new(ErrorCode::RestaurantNotFound))
    }

    async fn upsert(&self, record: RestaurantRecord) -> AppResult<()> {
        record.location.validate()?;
        self.restaurants.insert(record.id.clone(), record);
        Ok(())
    }

    async fn snapshot(&self) -> AppResult<HashMap<String, RestaurantRecord>> {
        Ok(self
            .restaurants
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect())
    }
}
