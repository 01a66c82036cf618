use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scheduling_cell::SchedulingError;
use shared_models::AppointmentStatus;

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// A patient booking a chosen slot with a chosen doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleAppointmentRequest {
    pub doctor_id: Uuid,
    pub slot_id: Uuid,
}

/// The clinical outcome a doctor records when closing a consultation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishAppointmentRequest {
    pub notes: String,
    pub prescription: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("appointment not found")]
    NotFound,

    #[error("actor is not allowed to act on this appointment")]
    Forbidden,

    #[error("time slot is no longer available")]
    SlotUnavailable,

    #[error("time slot does not belong to the selected doctor")]
    SlotOwnershipMismatch,

    #[error("appointment cannot be modified in current status: {0}")]
    InvalidStateTransition(AppointmentStatus),

    #[error("scheduling error: {0}")]
    Scheduling(SchedulingError),

    #[error("records delivery failed: {0}")]
    RecordsDelivery(String),
}

impl From<SchedulingError> for AppointmentError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::NotFound => AppointmentError::NotFound,
            SchedulingError::SlotUnavailable => AppointmentError::SlotUnavailable,
            SchedulingError::SlotOwnershipMismatch => AppointmentError::SlotOwnershipMismatch,
            other => AppointmentError::Scheduling(other),
        }
    }
}

impl From<shared_database::StoreError> for AppointmentError {
    fn from(err: shared_database::StoreError) -> Self {
        match err {
            shared_database::StoreError::NotFound => AppointmentError::NotFound,
            other => AppointmentError::Scheduling(SchedulingError::Store(other)),
        }
    }
}
