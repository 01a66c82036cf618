use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use availability_cell::AvailabilityError;
use shared_database::StoreError;
use shared_models::TimeSlot;

// ==============================================================================
// SCHEDULE SUMMARY MODELS
// ==============================================================================

/// Per-day occupancy view of a doctor's materialized schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayScheduleSummary {
    pub date: NaiveDate,
    pub day_of_week: u8,
    pub total_slots: usize,
    pub available_slots: usize,
    pub booked_slots: usize,
    pub slots: Vec<SlotSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotSummary {
    pub id: Uuid,
    pub start_time: chrono::NaiveTime,
    pub end_time: chrono::NaiveTime,
    pub is_available: bool,
    pub is_booked: bool,
    pub appointment_id: Option<Uuid>,
}

impl SlotSummary {
    pub fn from_slot(slot: &TimeSlot, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            id: slot.id,
            start_time: slot.start_time,
            end_time: slot.end_time,
            is_available: slot.is_free(now),
            is_booked: slot.is_booked(),
            appointment_id: slot.appointment_id,
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("time slot not found")]
    NotFound,

    #[error("time slot is no longer available")]
    SlotUnavailable,

    #[error("time slot does not belong to the requested doctor")]
    SlotOwnershipMismatch,

    #[error(transparent)]
    Availability(#[from] AvailabilityError),

    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for SchedulingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => SchedulingError::NotFound,
            other => SchedulingError::Store(other),
        }
    }
}
