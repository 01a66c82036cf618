use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, NaiveTime, Utc};
use uuid::Uuid;

use appointment_cell::{
    AppointmentError, AppointmentWorkflowService, FinishAppointmentRequest,
    RecordsGateway, ScheduleAppointmentRequest,
};
use appointment_cell::services::records::RecordsDeliveryError;
use shared_config::AppConfig;
use shared_database::Database;
use shared_models::{ActorContext, AppointmentStatus, TimeSlot};

#[derive(Default)]
struct RecordingGateway {
    medical_records: AtomicUsize,
    prescriptions: AtomicUsize,
}

#[async_trait::async_trait]
impl RecordsGateway for RecordingGateway {
    async fn create_medical_record(
        &self,
        _patient_id: Uuid,
        _notes: &str,
    ) -> Result<(), RecordsDeliveryError> {
        self.medical_records.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_prescription(
        &self,
        _appointment_id: Uuid,
        _doctor_id: Uuid,
        _details: &str,
    ) -> Result<(), RecordsDeliveryError> {
        self.prescriptions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    db: Database,
    workflow: AppointmentWorkflowService,
    gateway: Arc<RecordingGateway>,
    doctor: ActorContext,
    patient: ActorContext,
}

fn harness() -> Harness {
    let db = Database::new();
    let gateway = Arc::new(RecordingGateway::default());
    let workflow = AppointmentWorkflowService::new(
        db.clone(),
        AppConfig::default(),
        Arc::clone(&gateway) as Arc<dyn RecordsGateway>,
    );
    Harness {
        db,
        workflow,
        gateway,
        doctor: ActorContext::doctor(Uuid::new_v4()),
        patient: ActorContext::patient(Uuid::new_v4()),
    }
}

fn seed_slot(harness: &Harness, hour: u32) -> TimeSlot {
    let now = Utc::now();
    let start = NaiveTime::from_hms_opt(hour, 0, 0).unwrap();
    harness
        .db
        .insert_slot(TimeSlot {
            id: Uuid::new_v4(),
            doctor_id: harness.doctor.actor_id,
            date: (now + Duration::days(7)).date_naive(),
            start_time: start,
            end_time: start + Duration::minutes(60),
            is_available: true,
            appointment_id: None,
            reserved_until: None,
            created_at: now,
            updated_at: now,
        })
        .unwrap()
}

async fn schedule(harness: &Harness, slot: &TimeSlot) -> shared_models::Appointment {
    harness
        .workflow
        .schedule(
            harness.patient,
            ScheduleAppointmentRequest {
                doctor_id: harness.doctor.actor_id,
                slot_id: slot.id,
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn scheduling_books_the_slot_and_creates_a_pending_appointment() {
    let harness = harness();
    let slot = seed_slot(&harness, 10);

    let appointment = schedule(&harness, &slot).await;
    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.patient_id, harness.patient.actor_id);
    assert_eq!(appointment.start_time, slot.start_time);

    let booked = harness.db.get_slot(slot.id).unwrap();
    assert_eq!(booked.appointment_id, Some(appointment.id));
    assert!(!booked.is_available);
}

#[tokio::test]
async fn scheduling_a_taken_slot_fails_and_leaves_no_orphan_appointment() {
    let harness = harness();
    let slot = seed_slot(&harness, 10);
    schedule(&harness, &slot).await;

    let second_patient = ActorContext::patient(Uuid::new_v4());
    let result = harness
        .workflow
        .schedule(
            second_patient,
            ScheduleAppointmentRequest {
                doctor_id: harness.doctor.actor_id,
                slot_id: slot.id,
            },
        )
        .await;
    assert_matches!(result, Err(AppointmentError::SlotUnavailable));

    let theirs = harness
        .workflow
        .patient_appointments(second_patient)
        .await
        .unwrap();
    assert!(theirs.is_empty());
}

#[tokio::test]
async fn slot_must_belong_to_the_selected_doctor() {
    let harness = harness();
    let slot = seed_slot(&harness, 10);

    let result = harness
        .workflow
        .schedule(
            harness.patient,
            ScheduleAppointmentRequest {
                doctor_id: Uuid::new_v4(),
                slot_id: slot.id,
            },
        )
        .await;
    assert_matches!(result, Err(AppointmentError::SlotOwnershipMismatch));

    // Nothing was booked.
    assert!(harness.db.get_slot(slot.id).unwrap().is_available);
}

#[tokio::test]
async fn starting_a_pending_appointment_is_rejected_without_mutation() {
    let harness = harness();
    let slot = seed_slot(&harness, 10);
    let appointment = schedule(&harness, &slot).await;

    let result = harness.workflow.start(harness.doctor, appointment.id).await;
    assert_matches!(
        result,
        Err(AppointmentError::InvalidStateTransition(
            AppointmentStatus::Pending
        ))
    );

    let unchanged = harness.db.get_appointment(appointment.id).unwrap();
    assert_eq!(unchanged.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn full_consultation_path_emits_one_record_and_one_prescription() {
    let harness = harness();
    let slot = seed_slot(&harness, 10);
    let appointment = schedule(&harness, &slot).await;

    harness
        .workflow
        .approve(harness.doctor, appointment.id)
        .await
        .unwrap();
    harness
        .workflow
        .start(harness.doctor, appointment.id)
        .await
        .unwrap();
    let finished = harness
        .workflow
        .finish(
            harness.doctor,
            appointment.id,
            FinishAppointmentRequest {
                notes: "responding well to treatment".to_string(),
                prescription: "amoxicillin 500mg, 7 days".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(finished.status, AppointmentStatus::Completed);
    assert_eq!(harness.gateway.medical_records.load(Ordering::SeqCst), 1);
    assert_eq!(harness.gateway.prescriptions.load(Ordering::SeqCst), 1);

    // Terminal: nothing further is accepted.
    let again = harness.workflow.start(harness.doctor, appointment.id).await;
    assert_matches!(
        again,
        Err(AppointmentError::InvalidStateTransition(
            AppointmentStatus::Completed
        ))
    );
}

#[tokio::test]
async fn no_show_completes_with_the_absence_outcome() {
    let harness = harness();
    let slot = seed_slot(&harness, 10);
    let appointment = schedule(&harness, &slot).await;

    harness
        .workflow
        .approve(harness.doctor, appointment.id)
        .await
        .unwrap();
    harness
        .workflow
        .start(harness.doctor, appointment.id)
        .await
        .unwrap();
    let completed = harness
        .workflow
        .mark_no_show(harness.doctor, appointment.id)
        .await
        .unwrap();

    assert_eq!(completed.status, AppointmentStatus::Completed);
    assert_eq!(harness.gateway.medical_records.load(Ordering::SeqCst), 1);
    assert_eq!(harness.gateway.prescriptions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejection_is_terminal_and_frees_the_slot() {
    let harness = harness();
    let slot = seed_slot(&harness, 10);
    let appointment = schedule(&harness, &slot).await;

    let rejected = harness
        .workflow
        .reject(harness.doctor, appointment.id)
        .await
        .unwrap();
    assert_eq!(rejected.status, AppointmentStatus::Rejected);

    let freed = harness.db.get_slot(slot.id).unwrap();
    assert!(freed.is_available);
    assert_eq!(freed.appointment_id, None);

    let approve = harness.workflow.approve(harness.doctor, appointment.id).await;
    assert_matches!(
        approve,
        Err(AppointmentError::InvalidStateTransition(
            AppointmentStatus::Rejected
        ))
    );
}

#[tokio::test]
async fn cancellation_deletes_the_appointment_and_frees_the_slot() {
    let harness = harness();
    let slot = seed_slot(&harness, 10);
    let appointment = schedule(&harness, &slot).await;

    harness
        .workflow
        .cancel(harness.patient, appointment.id)
        .await
        .unwrap();

    assert_matches!(
        harness.db.get_appointment(appointment.id),
        Err(shared_database::StoreError::NotFound)
    );
    assert!(harness.db.get_slot(slot.id).unwrap().is_available);
}

#[tokio::test]
async fn only_the_owning_patient_may_cancel_and_only_while_pending() {
    let harness = harness();
    let slot = seed_slot(&harness, 10);
    let appointment = schedule(&harness, &slot).await;

    let stranger = ActorContext::patient(Uuid::new_v4());
    let result = harness.workflow.cancel(stranger, appointment.id).await;
    assert_matches!(result, Err(AppointmentError::Forbidden));

    harness
        .workflow
        .approve(harness.doctor, appointment.id)
        .await
        .unwrap();
    let late_cancel = harness.workflow.cancel(harness.patient, appointment.id).await;
    assert_matches!(
        late_cancel,
        Err(AppointmentError::InvalidStateTransition(
            AppointmentStatus::Approved
        ))
    );
}

#[tokio::test]
async fn doctors_only_act_on_their_own_appointments() {
    let harness = harness();
    let slot = seed_slot(&harness, 10);
    let appointment = schedule(&harness, &slot).await;

    let other_doctor = ActorContext::doctor(Uuid::new_v4());
    let result = harness.workflow.approve(other_doctor, appointment.id).await;
    assert_matches!(result, Err(AppointmentError::Forbidden));

    let as_patient = harness.workflow.approve(harness.patient, appointment.id).await;
    assert_matches!(as_patient, Err(AppointmentError::Forbidden));
}

#[tokio::test]
async fn listings_are_scoped_to_the_caller() {
    let harness = harness();
    let first = seed_slot(&harness, 9);
    let second = seed_slot(&harness, 10);
    schedule(&harness, &first).await;
    schedule(&harness, &second).await;

    let mine = harness
        .workflow
        .patient_appointments(harness.patient)
        .await
        .unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine[0].start_time < mine[1].start_time);

    let doctors = harness
        .workflow
        .doctor_appointments(harness.doctor)
        .await
        .unwrap();
    assert_eq!(doctors.len(), 2);

    let stranger = ActorContext::patient(Uuid::new_v4());
    assert!(harness
        .workflow
        .patient_appointments(stranger)
        .await
        .unwrap()
        .is_empty());
}
