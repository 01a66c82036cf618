use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Delivery failure toward the records collaborator. The workflow surfaces
/// this and aborts the transition rather than completing half an outcome.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct RecordsDeliveryError(pub String);

/// Outbound seam to the medical-record and prescription collaborators.
///
/// The engine does not own their storage; it only guarantees that closing
/// a consultation emits exactly one medical-record creation and exactly one
/// prescription creation through this gateway.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordsGateway: Send + Sync {
    async fn create_medical_record(
        &self,
        patient_id: Uuid,
        notes: &str,
    ) -> Result<(), RecordsDeliveryError>;

    async fn create_prescription(
        &self,
        appointment_id: Uuid,
        doctor_id: Uuid,
        details: &str,
    ) -> Result<(), RecordsDeliveryError>;
}
