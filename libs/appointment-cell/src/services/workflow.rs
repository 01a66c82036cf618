use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use scheduling_cell::SlotLifecycleManager;
use shared_config::AppConfig;
use shared_database::Database;
use shared_models::{ActorContext, Appointment, AppointmentStatus, TimeSlot};

use crate::models::{AppointmentError, FinishAppointmentRequest, ScheduleAppointmentRequest};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::records::RecordsGateway;

const NO_SHOW_NOTES: &str = "Patient did not show up for the appointment.";
const NO_SHOW_PRESCRIPTION: &str = "No prescription issued. Patient was absent.";

/// The appointment workflow: the only writer of the slot/appointment link.
///
/// Booking, cancellation and the doctor's approve/start/finish path all run
/// through here; slot transitions are delegated to the lifecycle manager
/// and appointment status changes are conditional updates, so concurrent
/// callers cannot double-apply a transition.
pub struct AppointmentWorkflowService {
    db: Database,
    slots: SlotLifecycleManager,
    lifecycle: AppointmentLifecycleService,
    records: Arc<dyn RecordsGateway>,
}

impl AppointmentWorkflowService {
    pub fn new(db: Database, config: AppConfig, records: Arc<dyn RecordsGateway>) -> Self {
        Self {
            slots: SlotLifecycleManager::new(db.clone(), config),
            lifecycle: AppointmentLifecycleService::new(),
            db,
            records,
        }
    }

    /// What a patient sees when picking a time: the doctor's Free slots for
    /// the date, reservations already swept.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, AppointmentError> {
        let now = Utc::now();
        Ok(self.slots.get_available_slots(doctor_id, date, now).await?)
    }

    /// Patient books a chosen slot: a pending appointment is created and
    /// the slot is booked against it. Losing the book race rolls the
    /// appointment row back and surfaces the slot failure.
    pub async fn schedule(
        &self,
        actor: ActorContext,
        request: ScheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        require_patient(actor)?;
        let now = Utc::now();

        let slot = self.slots.get_slot(request.slot_id)?;
        if slot.doctor_id != request.doctor_id {
            return Err(AppointmentError::SlotOwnershipMismatch);
        }
        if !slot.is_free(now) {
            return Err(AppointmentError::SlotUnavailable);
        }

        let appointment = self.db.insert_appointment(Appointment {
            id: Uuid::new_v4(),
            patient_id: actor.actor_id,
            doctor_id: request.doctor_id,
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            status: AppointmentStatus::Pending,
            created_at: now,
            updated_at: now,
        });

        if let Err(err) = self.slots.book(slot.id, appointment.id, now).await {
            warn!(slot_id = %slot.id, "lost booking race, rolling appointment back");
            let _ = self.db.delete_appointment(appointment.id);
            return Err(err.into());
        }

        info!(appointment_id = %appointment.id, slot_id = %slot.id, "appointment scheduled");
        Ok(appointment)
    }

    /// Patient cancels their own pending appointment: the row is deleted
    /// and the slot returns to the pool.
    pub async fn cancel(&self, actor: ActorContext, appointment_id: Uuid) -> Result<(), AppointmentError> {
        require_patient(actor)?;

        let appointment = self.db.get_appointment(appointment_id)?;
        if appointment.patient_id != actor.actor_id {
            return Err(AppointmentError::Forbidden);
        }
        if !self.lifecycle.can_cancel(appointment.status) {
            return Err(AppointmentError::InvalidStateTransition(appointment.status));
        }

        // Claim the row first; releasing the slot only once the delete is
        // ours keeps a concurrent approval from seeing a freed slot under a
        // live appointment.
        let deleted = self
            .db
            .delete_appointment_if(appointment_id, |current| {
                current.status == AppointmentStatus::Pending
            })?;
        match deleted {
            Some(_) => {
                if let Some(slot) = self.slots.find_slot_by_appointment(appointment_id) {
                    self.slots.release(slot.id).await?;
                }
                info!(%appointment_id, "appointment cancelled");
                Ok(())
            }
            None => {
                let latest = self.db.get_appointment(appointment_id)?;
                Err(AppointmentError::InvalidStateTransition(latest.status))
            }
        }
    }

    pub async fn approve(
        &self,
        actor: ActorContext,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load_for_doctor(actor, appointment_id)?;
        self.transition(&appointment, AppointmentStatus::Approved)
    }

    /// Rejection is terminal and immediately returns the slot to the pool.
    pub async fn reject(
        &self,
        actor: ActorContext,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load_for_doctor(actor, appointment_id)?;
        let rejected = self.transition(&appointment, AppointmentStatus::Rejected)?;
        if let Some(slot) = self.slots.find_slot_by_appointment(appointment_id) {
            self.slots.release(slot.id).await?;
        }
        Ok(rejected)
    }

    pub async fn start(
        &self,
        actor: ActorContext,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load_for_doctor(actor, appointment_id)?;
        self.transition(&appointment, AppointmentStatus::InProgress)
    }

    /// Close the consultation with its clinical outcome. Exactly one
    /// medical record and one prescription are emitted to the collaborators
    /// before the appointment completes; a delivery failure aborts the
    /// transition.
    pub async fn finish(
        &self,
        actor: ActorContext,
        appointment_id: Uuid,
        request: FinishAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load_for_doctor(actor, appointment_id)?;
        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Completed)?;

        self.emit_outcome(&appointment, &request.notes, &request.prescription)
            .await?;
        self.transition(&appointment, AppointmentStatus::Completed)
    }

    /// Same terminal path as `finish`, with the fixed absence outcome.
    pub async fn mark_no_show(
        &self,
        actor: ActorContext,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load_for_doctor(actor, appointment_id)?;
        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Completed)?;

        self.emit_outcome(&appointment, NO_SHOW_NOTES, NO_SHOW_PRESCRIPTION)
            .await?;
        self.transition(&appointment, AppointmentStatus::Completed)
    }

    pub async fn patient_appointments(
        &self,
        actor: ActorContext,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        require_patient(actor)?;
        Ok(self.db.list_appointments_by_patient(actor.actor_id))
    }

    pub async fn doctor_appointments(
        &self,
        actor: ActorContext,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if !actor.is_doctor() {
            return Err(AppointmentError::Forbidden);
        }
        Ok(self.db.list_appointments_by_doctor(actor.actor_id))
    }

    pub async fn get_appointment(
        &self,
        actor: ActorContext,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.db.get_appointment(appointment_id)?;
        if appointment.patient_id != actor.actor_id && appointment.doctor_id != actor.actor_id {
            return Err(AppointmentError::Forbidden);
        }
        Ok(appointment)
    }

    fn load_for_doctor(
        &self,
        actor: ActorContext,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        if !actor.is_doctor() {
            return Err(AppointmentError::Forbidden);
        }
        let appointment = self.db.get_appointment(appointment_id)?;
        if appointment.doctor_id != actor.actor_id {
            return Err(AppointmentError::Forbidden);
        }
        Ok(appointment)
    }

    /// Guarded status move: validated against the transition table, then
    /// applied only if the row still holds the status we read. A lost race
    /// reports the other writer's status, with nothing mutated here.
    fn transition(
        &self,
        appointment: &Appointment,
        next: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        self.lifecycle
            .validate_status_transition(appointment.status, next)?;

        let observed = appointment.status;
        let updated = self.db.update_appointment_if(
            appointment.id,
            |current| current.status == observed,
            |current| current.status = next,
        )?;

        match updated {
            Some(updated) => {
                debug!(appointment_id = %updated.id, status = %updated.status, "appointment transitioned");
                Ok(updated)
            }
            None => {
                let latest = self.db.get_appointment(appointment.id)?;
                Err(AppointmentError::InvalidStateTransition(latest.status))
            }
        }
    }

    async fn emit_outcome(
        &self,
        appointment: &Appointment,
        notes: &str,
        prescription: &str,
    ) -> Result<(), AppointmentError> {
        self.records
            .create_medical_record(appointment.patient_id, notes)
            .await
            .map_err(|err| AppointmentError::RecordsDelivery(err.to_string()))?;
        self.records
            .create_prescription(appointment.id, appointment.doctor_id, prescription)
            .await
            .map_err(|err| AppointmentError::RecordsDelivery(err.to_string()))?;
        Ok(())
    }
}

fn require_patient(actor: ActorContext) -> Result<(), AppointmentError> {
    if !actor.is_patient() {
        return Err(AppointmentError::Forbidden);
    }
    Ok(())
}
