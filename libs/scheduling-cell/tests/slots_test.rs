use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use scheduling_cell::{SchedulingError, SlotLifecycleManager};
use shared_config::AppConfig;
use shared_database::Database;
use shared_models::TimeSlot;

fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
}

fn seed_slot(db: &Database, doctor_id: Uuid, start: NaiveTime) -> TimeSlot {
    let now = Utc::now();
    db.insert_slot(TimeSlot {
        id: Uuid::new_v4(),
        doctor_id,
        date: date(),
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

#[tokio::test]
async fn reservation_withholds_slot_until_it_decays() {
    let db = Database::new();
    let doctor_id = Uuid::new_v4();
    let slot = seed_slot(&db, doctor_id, time(9, 0));
    let manager = SlotLifecycleManager::new(db, AppConfig::default());

    let now = Utc::now();
    manager.reserve(slot.id, 15, now).await.unwrap();

    // Held: not listed while the hold is live.
    let visible = manager
        .get_available_slots(doctor_id, date(), now + Duration::minutes(1))
        .await
        .unwrap();
    assert!(visible.is_empty());

    // No release call needed: past the deadline the slot is back.
    let later = now + Duration::minutes(16);
    let visible = manager
        .get_available_slots(doctor_id, date(), later)
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, slot.id);
}

#[tokio::test]
async fn a_live_hold_blocks_reserve_and_book() {
    let db = Database::new();
    let doctor_id = Uuid::new_v4();
    let slot = seed_slot(&db, doctor_id, time(9, 0));
    let manager = SlotLifecycleManager::new(db, AppConfig::default());

    let now = Utc::now();
    manager.reserve(slot.id, 15, now).await.unwrap();

    let again = manager.reserve(slot.id, 15, now + Duration::minutes(1)).await;
    assert_matches!(again, Err(SchedulingError::SlotUnavailable));

    let book = manager
        .book(slot.id, Uuid::new_v4(), now + Duration::minutes(1))
        .await;
    assert_matches!(book, Err(SchedulingError::SlotUnavailable));
}

#[tokio::test]
async fn booking_succeeds_once_a_reservation_has_lapsed() {
    let db = Database::new();
    let doctor_id = Uuid::new_v4();
    let slot = seed_slot(&db, doctor_id, time(9, 0));
    let manager = SlotLifecycleManager::new(db, AppConfig::default());

    let now = Utc::now();
    manager.reserve(slot.id, 15, now).await.unwrap();

    let booked = manager
        .book(slot.id, Uuid::new_v4(), now + Duration::minutes(20))
        .await
        .unwrap();
    assert!(booked.is_booked());
    assert!(!booked.is_available);
    assert_eq!(booked.reserved_until, None);
}

#[tokio::test]
async fn double_booking_always_fails() {
    let db = Database::new();
    let doctor_id = Uuid::new_v4();
    let slot = seed_slot(&db, doctor_id, time(9, 0));
    let manager = SlotLifecycleManager::new(db.clone(), AppConfig::default());

    let now = Utc::now();
    let winner = Uuid::new_v4();
    manager.book(slot.id, winner, now).await.unwrap();

    let second = manager.book(slot.id, Uuid::new_v4(), now).await;
    assert_matches!(second, Err(SchedulingError::SlotUnavailable));

    // The original binding is never overwritten.
    assert_eq!(db.get_slot(slot.id).unwrap().appointment_id, Some(winner));
}

#[tokio::test]
async fn concurrent_booking_has_exactly_one_winner() {
    let db = Database::new();
    let doctor_id = Uuid::new_v4();
    let slot = seed_slot(&db, doctor_id, time(9, 0));
    let manager = Arc::new(SlotLifecycleManager::new(db, AppConfig::default()));

    let now = Utc::now();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        let slot_id = slot.id;
        handles.push(tokio::spawn(async move {
            manager.book(slot_id, Uuid::new_v4(), now).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn release_returns_slot_to_pool_and_is_idempotent() {
    let db = Database::new();
    let doctor_id = Uuid::new_v4();
    let slot = seed_slot(&db, doctor_id, time(9, 0));
    let manager = SlotLifecycleManager::new(db, AppConfig::default());

    let now = Utc::now();
    manager.book(slot.id, Uuid::new_v4(), now).await.unwrap();

    let released = manager.release(slot.id).await.unwrap();
    assert!(released.is_available);
    assert_eq!(released.appointment_id, None);

    // Releasing a free slot is a no-op, not an error.
    manager.release(slot.id).await.unwrap();

    let visible = manager
        .get_available_slots(doctor_id, date(), now)
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
}

#[tokio::test]
async fn unknown_slot_is_reported_as_not_found() {
    let db = Database::new();
    let manager = SlotLifecycleManager::new(db, AppConfig::default());

    let missing = manager.reserve(Uuid::new_v4(), 15, Utc::now()).await;
    assert_matches!(missing, Err(SchedulingError::NotFound));
}

#[tokio::test]
async fn sweep_clears_only_lapsed_reservations() {
    let db = Database::new();
    let doctor_id = Uuid::new_v4();
    let lapsed = seed_slot(&db, doctor_id, time(9, 0));
    let live = seed_slot(&db, doctor_id, time(10, 0));
    let manager = SlotLifecycleManager::new(db.clone(), AppConfig::default());

    let now = Utc::now();
    manager.reserve(lapsed.id, 5, now).await.unwrap();
    manager.reserve(live.id, 60, now).await.unwrap();

    let swept = manager
        .sweep_expired_reservations(now + Duration::minutes(10))
        .await;
    assert_eq!(swept, 1);

    assert_eq!(db.get_slot(lapsed.id).unwrap().reserved_until, None);
    assert!(db.get_slot(live.id).unwrap().reserved_until.is_some());
}

#[tokio::test]
async fn schedule_summary_reports_occupancy() {
    let db = Database::new();
    let doctor_id = Uuid::new_v4();
    let first = seed_slot(&db, doctor_id, time(9, 0));
    let _second = seed_slot(&db, doctor_id, time(10, 0));
    let manager = SlotLifecycleManager::new(db, AppConfig::default());

    let now = Utc::now();
    manager.book(first.id, Uuid::new_v4(), now).await.unwrap();

    let summary = manager
        .schedule_summary(doctor_id, date(), date(), now)
        .await
        .unwrap();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].total_slots, 2);
    assert_eq!(summary[0].booked_slots, 1);
    assert_eq!(summary[0].available_slots, 1);
}
