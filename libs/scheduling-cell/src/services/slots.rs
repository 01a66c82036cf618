use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use availability_cell::day_of_week;
use shared_config::AppConfig;
use shared_database::Database;
use shared_models::TimeSlot;

use crate::models::{DayScheduleSummary, SchedulingError, SlotSummary};
use crate::services::generator::SlotGenerator;

/// Owns every state transition of a materialized slot.
///
/// All transitions are conditional updates keyed on the slot's current
/// state, executed atomically by the store: at most one caller can move a
/// given slot out of Free. Reservations expire lazily; nothing here runs on
/// a timer, and every read path sweeps before trusting availability. The
/// caller supplies `now` so expiry is a pure function of it.
pub struct SlotLifecycleManager {
    db: Database,
    generator: SlotGenerator,
}

impl SlotLifecycleManager {
    pub fn new(db: Database, config: AppConfig) -> Self {
        Self {
            generator: SlotGenerator::new(db.clone(), config),
            db,
        }
    }

    /// Place a soft, time-boxed hold on a Free slot. The hold withholds the
    /// slot from the visible pool until it lapses or is released; it blocks
    /// nothing else.
    pub async fn reserve(
        &self,
        slot_id: Uuid,
        ttl_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<TimeSlot, SchedulingError> {
        let reserved = self.db.update_slot_if(
            slot_id,
            |slot| slot.is_free(now),
            |slot| slot.reserved_until = Some(now + Duration::minutes(ttl_minutes)),
        )?;

        match reserved {
            Some(slot) => {
                debug!(%slot_id, until = ?slot.reserved_until, "slot reserved");
                Ok(slot)
            }
            None => Err(SchedulingError::SlotUnavailable),
        }
    }

    /// Bind a slot to an appointment. Valid from Free, including a slot
    /// whose own reservation already lapsed; a live hold or an existing
    /// booking refuses the transition.
    pub async fn book(
        &self,
        slot_id: Uuid,
        appointment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TimeSlot, SchedulingError> {
        let booked = self.db.update_slot_if(
            slot_id,
            |slot| slot.is_free(now),
            |slot| {
                slot.appointment_id = Some(appointment_id);
                slot.is_available = false;
                slot.reserved_until = None;
            },
        )?;

        match booked {
            Some(slot) => {
                info!(%slot_id, %appointment_id, "slot booked");
                Ok(slot)
            }
            None => Err(SchedulingError::SlotUnavailable),
        }
    }

    /// Return a slot to the Free pool, undoing a booking or a reservation.
    /// Releasing an already-free slot is a no-op, not an error.
    pub async fn release(&self, slot_id: Uuid) -> Result<TimeSlot, SchedulingError> {
        let released = self.db.update_slot_if(
            slot_id,
            |_| true,
            |slot| {
                slot.appointment_id = None;
                slot.is_available = true;
                slot.reserved_until = None;
            },
        )?;

        match released {
            Some(slot) => {
                debug!(%slot_id, "slot released");
                Ok(slot)
            }
            None => Err(SchedulingError::SlotUnavailable),
        }
    }

    /// Clear every reservation whose window has elapsed, returning the
    /// count of slots swept back into the Free pool.
    pub async fn sweep_expired_reservations(&self, now: DateTime<Utc>) -> usize {
        let swept = self.db.clear_reservations_before(now);
        if swept > 0 {
            debug!(swept, "expired reservations cleared");
        }
        swept
    }

    /// The availability query: sweep, materialize, then filter to slots
    /// that are Free as of `now`, ordered by start time.
    pub async fn get_available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        self.sweep_expired_reservations(now).await;
        self.generator.ensure_slots(doctor_id, date).await?;

        let slots = self
            .db
            .list_slots(doctor_id, date)
            .into_iter()
            .filter(|slot| slot.is_free(now))
            .collect();
        Ok(slots)
    }

    /// Occupancy summary over an inclusive date range.
    pub async fn schedule_summary(
        &self,
        doctor_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<DayScheduleSummary>, SchedulingError> {
        let mut summary = Vec::new();
        let mut date = start;
        while date <= end {
            let slots = self.db.list_slots(doctor_id, date);
            summary.push(DayScheduleSummary {
                date,
                day_of_week: day_of_week(date),
                total_slots: slots.len(),
                available_slots: slots.iter().filter(|slot| slot.is_free(now)).count(),
                booked_slots: slots.iter().filter(|slot| slot.is_booked()).count(),
                slots: slots
                    .iter()
                    .map(|slot| SlotSummary::from_slot(slot, now))
                    .collect(),
            });
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        Ok(summary)
    }

    pub fn get_slot(&self, slot_id: Uuid) -> Result<TimeSlot, SchedulingError> {
        Ok(self.db.get_slot(slot_id)?)
    }

    pub fn find_slot_by_appointment(&self, appointment_id: Uuid) -> Option<TimeSlot> {
        self.db.find_slot_by_appointment(appointment_id)
    }
}
