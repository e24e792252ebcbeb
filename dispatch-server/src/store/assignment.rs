//! Delivery assignment store

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{AssignmentStatus, DeliveryAssignment, DispatchSubject};

/// Versioned assignment store
///
/// Assignments are keyed by their own id; the scheduler additionally
/// looks them up by subject when deciding whether a dispatch is still
/// outstanding.
#[derive(Debug, Default)]
pub struct AssignmentStore {
    assignments: DashMap<String, DeliveryAssignment>,
}

impl AssignmentStore {
    pub fn new() -> Self {
        Self {
            assignments: DashMap::new(),
        }
    }

    pub fn insert_new(&self, assignment: DeliveryAssignment) -> AppResult<()> {
        use dashmap::mapref::entry::Entry;
        match self.assignments.entry(assignment.id.clone()) {
            Entry::Occupied(_) => Err(AppError::already_exists(format!(
                "assignment {}",
                assignment.id
            ))),
            Entry::Vacant(v) => {
                v.insert(assignment);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<DeliveryAssignment> {
        self.assignments.get(id).map(|a| a.clone())
    }

    /// Apply a mutation and bump the version.
    pub fn update(
        &self,
        id: &str,
        f: impl FnOnce(&mut DeliveryAssignment) -> AppResult<()>,
    ) -> AppResult<DeliveryAssignment> {
        let mut entry = self
            .assignments
            .get_mut(id)
            .ok_or_else(|| AppError::new(ErrorCode::AssignmentNotFound))?;
        let assignment = entry.value_mut();
        f(assignment)?;
        assignment.version += 1;
        Ok(assignment.clone())
    }

    /// The non-terminal assignment for a subject, if any.
    ///
    /// At most one exists at a time: the scheduler's in-flight guard
    /// prevents concurrent dispatches for the same subject.
    pub fn active_for(&self, subject: &DispatchSubject) -> Option<DeliveryAssignment> {
        let key = subject.key();
        self.assignments
            .iter()
            .find(|a| a.subject.key() == key && !a.status.is_terminal())
            .map(|a| a.clone())
    }

    /// Offered assignments older than `ttl` (crash-recovery sweep scan)
    pub fn stale_offered(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<DeliveryAssignment> {
        self.assignments
            .iter()
            .filter(|a| a.status == AssignmentStatus::Offered && a.offered_at + ttl <= now)
            .map(|a| a.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}
