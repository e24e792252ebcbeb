//! Delivery partner registry
//!
//! Reservation is a compare-and-set on the `busy` flag under the entry
//! lock: at most one dispatch attempt holds a given partner at a time.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::geo::GeoPoint;
use shared::models::PartnerRecord;

/// Read/write access to partner records plus the reservation CAS
#[async_trait]
pub trait PartnerDirectory: Send + Sync {
    async fn get(&self, id: &str) -> AppResult<PartnerRecord>;
    async fn upsert(&self, record: PartnerRecord) -> AppResult<()>;
    /// Mark a partner busy; `Ok(false)` means someone else got there first.
    async fn reserve(&self, id: &str) -> AppResult<bool>;
    /// Release a reservation (offer declined, timed out, or delivery done)
    async fn release(&self, id: &str) -> AppResult<PartnerRecord>;
    async fn update_location(&self, id: &str, location: GeoPoint) -> AppResult<PartnerRecord>;
    /// Full snapshot, for startup index rebuild
    async fn snapshot(&self) -> AppResult<Vec<PartnerRecord>>;
}

/// Single-node registry backed by a `DashMap`
#[derive(Debug, Default)]
pub struct InMemoryPartnerDirectory {
    partners: DashMap<String, PartnerRecord>,
}

impl InMemoryPartnerDirectory {
    pub fn new() -> Self {
        Self {
            partners: DashMap::new(),
        }
    }
}

#[async_trait]
impl PartnerDirectory for InMemoryPartnerDirectory {
    async fn get(&self, id: &str) -> AppResult<PartnerRecord> {
        self.partners
            .get(id)
            .map(|p| p.clone())
            .ok_or_else(|| AppError::new(ErrorCode::PartnerNotFound))
    }

    async fn upsert(&self, record: PartnerRecord) -> AppResult<()> {
        record.current_location.validate()?;
        self.partners.insert(record.id.clone(), record);
        Ok(())
    }

    async fn reserve(&self, id: &str) -> AppResult<bool> {
        let mut entry = self
            .partners
            .get_mut(id)
            .ok_or_else(|| AppError::new(ErrorCode::PartnerNotFound))?;
        let partner = entry.value_mut();
        if !partner.is_offerable() {
            return Ok(false);
        }
        partner.busy = true;
        partner.updated_at = Utc::now();
        Ok(true)
    }

    async fn release(&self, id: &str) -> AppResult<PartnerRecord> {
        let mut entry = self
            .partners
            .get_mut(id)
            .ok_or_else(|| AppError::new(ErrorCode::PartnerNotFound))?;
        let partner = entry.value_mut();
        partner.busy = false;
        let now = Utc::now();
        partner.available_since = now;
        partner.updated_at = now;
        Ok(partner.clone())
    }

    async fn update_location(&self, id: &str, location: GeoPoint) -> AppResult<PartnerRecord> {
        location.validate()?;
        let mut entry = self
            .partners
            .get_mut(id)
            .ok_or_else(|| AppError::new(ErrorCode::PartnerNotFound))?;
        let partner = entry.value_mut();
        partner.current_location = location;
        partner.updated_at = Utc::now();
        Ok(partner.clone())
    }

    async fn snapshot(&self) -> AppResult<Vec<PartnerRecord>> {
        Ok(self.partners.iter().map(|p| p.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str) -> PartnerRecord {
        PartnerRecord {
            id: id.to_string(),
            name: format!("Partner {id}"),
            current_location: GeoPoint::new(40.41, -3.70),
            capacity: 4,
            busy: false,
            available_since: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_reserve_is_exclusive() {
        let dir = InMemoryPartnerDirectory::new();
        dir.upsert(sample("p-1")).await.unwrap();

        assert!(dir.reserve("p-1").await.unwrap());
        assert!(!dir.reserve("p-1").await.unwrap());

        dir.release("p-1").await.unwrap();
        assert!(dir.reserve("p-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_capacity_never_reserved() {
        let dir = InMemoryPartnerDirectory::new();
        let mut partner = sample("p-1");
        partner.capacity = 0;
        dir.upsert(partner).await.unwrap();
        assert!(!dir.reserve("p-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_location_rejects_bad_coordinates() {
        let dir = InMemoryPartnerDirectory::new();
        dir.upsert(sample("p-1")).await.unwrap();
        let err = dir
            .update_location("p-1", GeoPoint::new(95.0, 0.0))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCoordinates);
    }
}
