use tracing::{debug, warn};

use shared_models::AppointmentStatus;

use crate::models::AppointmentError;

/// The appointment state machine, in one place.
///
/// pending -> approved -> in_progress -> completed
/// pending -> rejected
///
/// Cancellation is not a status: a pending appointment a patient cancels is
/// deleted outright, so it never appears here.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Fails with the current status when the transition is not in the
    /// table; callers must perform no mutation on failure.
    pub fn validate_status_transition(
        &self,
        current: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if !self.valid_transitions(current).contains(&next) {
            warn!(%current, %next, "invalid status transition attempted");
            return Err(AppointmentError::InvalidStateTransition(current));
        }
        debug!(%current, %next, "status transition validated");
        Ok(())
    }

    pub fn valid_transitions(&self, current: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Approved,
                AppointmentStatus::Rejected,
            ],
            AppointmentStatus::Approved => vec![AppointmentStatus::InProgress],
            AppointmentStatus::InProgress => vec![AppointmentStatus::Completed],
            // Terminal states accept nothing further.
            AppointmentStatus::Rejected | AppointmentStatus::Completed => vec![],
        }
    }

    /// Only a pending appointment may be cancelled by its patient.
    pub fn can_cancel(&self, current: AppointmentStatus) -> bool {
        current == AppointmentStatus::Pending
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
