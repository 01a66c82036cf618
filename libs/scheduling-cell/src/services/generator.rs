use chrono::{Duration, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use availability_cell::RuleResolver;
use shared_config::AppConfig;
use shared_database::{Database, StoreError};
use shared_models::TimeSlot;

use crate::models::SchedulingError;

/// Expands resolved availability periods into persistent slot rows.
///
/// Generation is idempotent and runs redundantly under concurrent read
/// traffic: two patients browsing the same doctor and date may both drive
/// it for the same tuples. The (doctor, date, start) uniqueness constraint
/// arbitrates; the loser of an insert race re-fetches the winning row
/// instead of failing.
pub struct SlotGenerator {
    db: Database,
    resolver: RuleResolver,
    config: AppConfig,
}

impl SlotGenerator {
    pub fn new(db: Database, config: AppConfig) -> Self {
        Self {
            resolver: RuleResolver::new(db.clone()),
            db,
            config,
        }
    }

    /// Materialize the date's slots, returning them ordered by start time.
    /// Safe to call any number of times for the same date.
    pub async fn ensure_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        let periods = self.resolver.resolve(doctor_id, date).await;

        let mut slots = Vec::new();
        for period in &periods {
            // Blocked periods are carried by the resolver so callers can
            // distinguish "blocked" from "no rule", but they never yield
            // bookable slots.
            if !period.is_available || period.slot_duration <= 0 {
                continue;
            }

            let step = Duration::minutes(period.slot_duration);
            let mut cursor = period.start_time;
            // Only increments that fit entirely inside the period become
            // slots; a trailing remainder shorter than the duration is
            // dropped rather than truncated. overflowing_add keeps a period
            // ending near midnight from wrapping the cursor back around.
            loop {
                let (slot_end, wrapped) = cursor.overflowing_add_signed(step);
                if wrapped != 0 || slot_end > period.end_time {
                    break;
                }
                if let Some(slot) = self.fetch_or_create(doctor_id, date, cursor, slot_end)? {
                    slots.push(slot);
                }
                cursor = slot_end;
            }
        }

        slots.sort_by_key(|slot| slot.start_time);
        debug!(%doctor_id, %date, count = slots.len(), "slots ensured");
        Ok(slots)
    }

    /// Day-by-day variant over an inclusive date range.
    pub async fn ensure_slots_for_range(
        &self,
        doctor_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        let mut slots = Vec::new();
        let mut date = start;
        while date <= end {
            slots.extend(self.ensure_slots(doctor_id, date).await?);
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        Ok(slots)
    }

    /// Rebuild a doctor's future schedule after a rule change: unbooked
    /// slots dated `from_date` onward are purged and regenerated over the
    /// configured horizon. Booked slots are never touched, so in-flight
    /// appointments survive any schedule edit.
    pub async fn regenerate(
        &self,
        doctor_id: Uuid,
        from_date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        let purged = self.db.delete_unbooked_slots_from(doctor_id, from_date);
        let to_date = from_date + Duration::days(self.config.slot_horizon_days);
        let slots = self
            .ensure_slots_for_range(doctor_id, from_date, to_date)
            .await?;
        info!(%doctor_id, %from_date, purged, generated = slots.len(), "schedule regenerated");
        Ok(slots)
    }

    /// Fetch-else-insert for one (doctor, date, start) tuple. A uniqueness
    /// conflict here means a concurrent caller created the row between our
    /// fetch and insert; recover by re-fetching it.
    fn fetch_or_create(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: chrono::NaiveTime,
        end_time: chrono::NaiveTime,
    ) -> Result<Option<TimeSlot>, SchedulingError> {
        if let Some(existing) = self.db.find_slot(doctor_id, date, start_time) {
            return Ok(Some(existing));
        }

        let now = Utc::now();
        let candidate = TimeSlot {
            id: Uuid::new_v4(),
            doctor_id,
            date,
            start_time,
            end_time,
            is_available: true,
            appointment_id: None,
            reserved_until: None,
            created_at: now,
            updated_at: now,
        };

        match self.db.insert_slot(candidate) {
            Ok(slot) => Ok(Some(slot)),
            Err(StoreError::UniqueViolation { .. }) => {
                debug!(%doctor_id, %date, %start_time, "lost slot insert race, re-fetching");
                Ok(self.db.find_slot(doctor_id, date, start_time))
            }
            Err(other) => Err(other.into()),
        }
    }
}
