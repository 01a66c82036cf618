use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::debug;
use uuid::Uuid;

use shared_models::{Appointment, AvailabilityRule, RuleKind, TimeSlot};

use crate::error::StoreError;

const RULES_UNIQUE: &str = "availability_rules_doctor_kind_key_start";
const SLOTS_UNIQUE: &str = "time_slots_doctor_date_start";

/// The single shared database. One mutex over all tables is the transaction
/// boundary: every method below runs atomically with respect to every other,
/// which is what gives the conditional updates their compare-and-set
/// semantics. No lock is ever held across an await point.
#[derive(Debug, Clone, Default)]
pub struct Database {
    inner: Arc<Mutex<Tables>>,
}

#[derive(Debug, Default)]
struct Tables {
    availability_rules: HashMap<Uuid, AvailabilityRule>,
    time_slots: HashMap<Uuid, TimeSlot>,
    appointments: HashMap<Uuid, Appointment>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.inner.lock().unwrap()
    }

    // ==========================================================================
    // availability_rules
    // ==========================================================================

    /// Insert a rule, enforcing uniqueness per
    /// (doctor, kind, day_of_week | specific_date, start_time).
    pub fn insert_rule(&self, rule: AvailabilityRule) -> Result<AvailabilityRule, StoreError> {
        let mut tables = self.tables();
        if tables
            .availability_rules
            .values()
            .any(|existing| rule_key_matches(existing, &rule))
        {
            return Err(StoreError::UniqueViolation {
                constraint: RULES_UNIQUE,
            });
        }
        tables.availability_rules.insert(rule.id, rule.clone());
        debug!(rule_id = %rule.id, doctor_id = %rule.doctor_id, "rule inserted");
        Ok(rule)
    }

    /// Insert-or-update keyed on (doctor, day_of_week, start_time). An
    /// existing template with the same key is rewritten in place, keeping
    /// its id and creation timestamp.
    pub fn upsert_template_rule(&self, rule: AvailabilityRule) -> AvailabilityRule {
        let mut tables = self.tables();
        let existing_id = tables
            .availability_rules
            .values()
            .find(|existing| {
                existing.kind == RuleKind::Template
                    && existing.doctor_id == rule.doctor_id
                    && existing.day_of_week == rule.day_of_week
                    && existing.start_time == rule.start_time
            })
            .map(|existing| existing.id);

        if let Some(id) = existing_id {
            if let Some(current) = tables.availability_rules.get_mut(&id) {
                current.end_time = rule.end_time;
                current.is_available = rule.is_available;
                current.slot_duration = rule.slot_duration;
                current.reason = rule.reason;
                current.updated_at = Utc::now();
                return current.clone();
            }
        }

        tables.availability_rules.insert(rule.id, rule.clone());
        rule
    }

    pub fn get_rule(&self, rule_id: Uuid) -> Result<AvailabilityRule, StoreError> {
        self.tables()
            .availability_rules
            .get(&rule_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    pub fn update_rule(
        &self,
        rule_id: Uuid,
        apply: impl FnOnce(&mut AvailabilityRule),
    ) -> Result<AvailabilityRule, StoreError> {
        let mut tables = self.tables();
        let rule = tables
            .availability_rules
            .get_mut(&rule_id)
            .ok_or(StoreError::NotFound)?;
        apply(rule);
        rule.updated_at = Utc::now();
        Ok(rule.clone())
    }

    pub fn delete_rule(&self, rule_id: Uuid) -> Result<(), StoreError> {
        self.tables()
            .availability_rules
            .remove(&rule_id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    pub fn list_template_rules(&self, doctor_id: Uuid, day_of_week: u8) -> Vec<AvailabilityRule> {
        let mut rules: Vec<AvailabilityRule> = self
            .tables()
            .availability_rules
            .values()
            .filter(|rule| {
                rule.kind == RuleKind::Template
                    && rule.doctor_id == doctor_id
                    && rule.day_of_week == Some(day_of_week)
            })
            .cloned()
            .collect();
        rules.sort_by_key(|rule| rule.start_time);
        rules
    }

    pub fn list_exception_rules(&self, doctor_id: Uuid, date: NaiveDate) -> Vec<AvailabilityRule> {
        let mut rules: Vec<AvailabilityRule> = self
            .tables()
            .availability_rules
            .values()
            .filter(|rule| {
                rule.kind == RuleKind::Exception
                    && rule.doctor_id == doctor_id
                    && rule.specific_date == Some(date)
            })
            .cloned()
            .collect();
        rules.sort_by_key(|rule| rule.start_time);
        rules
    }

    pub fn list_rules(&self, doctor_id: Uuid) -> Vec<AvailabilityRule> {
        let mut rules: Vec<AvailabilityRule> = self
            .tables()
            .availability_rules
            .values()
            .filter(|rule| rule.doctor_id == doctor_id)
            .cloned()
            .collect();
        rules.sort_by_key(|rule| {
            (
                rule.kind == RuleKind::Exception,
                rule.day_of_week,
                rule.specific_date,
                rule.start_time,
            )
        });
        rules
    }

    /// Atomically swap all templates a doctor has for one weekday.
    pub fn replace_template_rules_for_day(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
        rules: Vec<AvailabilityRule>,
    ) -> Result<Vec<AvailabilityRule>, StoreError> {
        let mut tables = self.tables();
        ensure_distinct_starts(&rules)?;
        tables.availability_rules.retain(|_, rule| {
            !(rule.kind == RuleKind::Template
                && rule.doctor_id == doctor_id
                && rule.day_of_week == Some(day_of_week))
        });
        for rule in &rules {
            tables.availability_rules.insert(rule.id, rule.clone());
        }
        debug!(%doctor_id, day_of_week, count = rules.len(), "weekday templates replaced");
        Ok(rules)
    }

    /// Atomically swap the exception set a doctor has for one date.
    pub fn replace_exception_rules_for_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        rules: Vec<AvailabilityRule>,
    ) -> Result<Vec<AvailabilityRule>, StoreError> {
        let mut tables = self.tables();
        ensure_distinct_starts(&rules)?;
        tables.availability_rules.retain(|_, rule| {
            !(rule.kind == RuleKind::Exception
                && rule.doctor_id == doctor_id
                && rule.specific_date == Some(date))
        });
        for rule in &rules {
            tables.availability_rules.insert(rule.id, rule.clone());
        }
        debug!(%doctor_id, %date, count = rules.len(), "exception set replaced");
        Ok(rules)
    }

    // ==========================================================================
    // time_slots
    // ==========================================================================

    /// Insert a slot. The (doctor_id, date, start_time) uniqueness enforced
    /// here is the materialization compare-and-set: of two concurrent
    /// generators, exactly one insert wins and the loser re-fetches.
    pub fn insert_slot(&self, slot: TimeSlot) -> Result<TimeSlot, StoreError> {
        let mut tables = self.tables();
        if tables.time_slots.values().any(|existing| {
            existing.doctor_id == slot.doctor_id
                && existing.date == slot.date
                && existing.start_time == slot.start_time
        }) {
            return Err(StoreError::UniqueViolation {
                constraint: SLOTS_UNIQUE,
            });
        }
        tables.time_slots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    pub fn get_slot(&self, slot_id: Uuid) -> Result<TimeSlot, StoreError> {
        self.tables()
            .time_slots
            .get(&slot_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    pub fn find_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
    ) -> Option<TimeSlot> {
        self.tables()
            .time_slots
            .values()
            .find(|slot| {
                slot.doctor_id == doctor_id && slot.date == date && slot.start_time == start_time
            })
            .cloned()
    }

    pub fn list_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Vec<TimeSlot> {
        let mut slots: Vec<TimeSlot> = self
            .tables()
            .time_slots
            .values()
            .filter(|slot| slot.doctor_id == doctor_id && slot.date == date)
            .cloned()
            .collect();
        slots.sort_by_key(|slot| slot.start_time);
        slots
    }

    /// Conditional update: `apply` runs only while `predicate` holds, under
    /// the table lock. `Ok(None)` is the zero-rows-affected outcome a lost
    /// race produces; the row untouched.
    pub fn update_slot_if(
        &self,
        slot_id: Uuid,
        predicate: impl FnOnce(&TimeSlot) -> bool,
        apply: impl FnOnce(&mut TimeSlot),
    ) -> Result<Option<TimeSlot>, StoreError> {
        let mut tables = self.tables();
        let slot = tables
            .time_slots
            .get_mut(&slot_id)
            .ok_or(StoreError::NotFound)?;
        if !predicate(slot) {
            return Ok(None);
        }
        apply(slot);
        slot.updated_at = Utc::now();
        Ok(Some(slot.clone()))
    }

    /// Bulk-clear reservations whose deadline already passed. Returns how
    /// many rows changed.
    pub fn clear_reservations_before(&self, now: DateTime<Utc>) -> usize {
        let mut cleared = 0;
        for slot in self.tables().time_slots.values_mut() {
            if slot.reserved_until.is_some_and(|until| until < now) {
                slot.reserved_until = None;
                slot.updated_at = Utc::now();
                cleared += 1;
            }
        }
        cleared
    }

    /// Remove future unbooked slots so they can be rebuilt from edited
    /// rules. Slots bound to an appointment are untouchable here.
    pub fn delete_unbooked_slots_from(&self, doctor_id: Uuid, from_date: NaiveDate) -> usize {
        let mut tables = self.tables();
        let before = tables.time_slots.len();
        tables.time_slots.retain(|_, slot| {
            !(slot.doctor_id == doctor_id
                && slot.date >= from_date
                && slot.appointment_id.is_none())
        });
        before - tables.time_slots.len()
    }

    // ==========================================================================
    // appointments
    // ==========================================================================

    pub fn insert_appointment(&self, appointment: Appointment) -> Appointment {
        self.tables()
            .appointments
            .insert(appointment.id, appointment.clone());
        appointment
    }

    pub fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, StoreError> {
        self.tables()
            .appointments
            .get(&appointment_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    /// Same zero-rows-affected contract as `update_slot_if`, for the
    /// appointment state machine.
    pub fn update_appointment_if(
        &self,
        appointment_id: Uuid,
        predicate: impl FnOnce(&Appointment) -> bool,
        apply: impl FnOnce(&mut Appointment),
    ) -> Result<Option<Appointment>, StoreError> {
        let mut tables = self.tables();
        let appointment = tables
            .appointments
            .get_mut(&appointment_id)
            .ok_or(StoreError::NotFound)?;
        if !predicate(appointment) {
            return Ok(None);
        }
        apply(appointment);
        appointment.updated_at = Utc::now();
        Ok(Some(appointment.clone()))
    }

    pub fn delete_appointment(&self, appointment_id: Uuid) -> Result<(), StoreError> {
        self.tables()
            .appointments
            .remove(&appointment_id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    /// Conditional delete with the same zero-rows-affected contract as the
    /// conditional updates: `Ok(None)` means the predicate no longer held.
    pub fn delete_appointment_if(
        &self,
        appointment_id: Uuid,
        predicate: impl FnOnce(&Appointment) -> bool,
    ) -> Result<Option<Appointment>, StoreError> {
        let mut tables = self.tables();
        let appointment = tables
            .appointments
            .get(&appointment_id)
            .ok_or(StoreError::NotFound)?;
        if !predicate(appointment) {
            return Ok(None);
        }
        Ok(tables.appointments.remove(&appointment_id))
    }

    pub fn list_appointments_by_patient(&self, patient_id: Uuid) -> Vec<Appointment> {
        let mut appointments: Vec<Appointment> = self
            .tables()
            .appointments
            .values()
            .filter(|appointment| appointment.patient_id == patient_id)
            .cloned()
            .collect();
        appointments.sort_by_key(|appointment| (appointment.date, appointment.start_time));
        appointments
    }

    pub fn list_appointments_by_doctor(&self, doctor_id: Uuid) -> Vec<Appointment> {
        let mut appointments: Vec<Appointment> = self
            .tables()
            .appointments
            .values()
            .filter(|appointment| appointment.doctor_id == doctor_id)
            .cloned()
            .collect();
        appointments.sort_by_key(|appointment| (appointment.date, appointment.start_time));
        appointments
    }

    pub fn find_slot_by_appointment(&self, appointment_id: Uuid) -> Option<TimeSlot> {
        self.tables()
            .time_slots
            .values()
            .find(|slot| slot.appointment_id == Some(appointment_id))
            .cloned()
    }
}

fn rule_key_matches(existing: &AvailabilityRule, candidate: &AvailabilityRule) -> bool {
    existing.kind == candidate.kind
        && existing.doctor_id == candidate.doctor_id
        && existing.day_of_week == candidate.day_of_week
        && existing.specific_date == candidate.specific_date
        && existing.start_time == candidate.start_time
}

fn ensure_distinct_starts(rules: &[AvailabilityRule]) -> Result<(), StoreError> {
    for (index, rule) in rules.iter().enumerate() {
        if rules[..index]
            .iter()
            .any(|other| other.start_time == rule.start_time)
        {
            return Err(StoreError::UniqueViolation {
                constraint: RULES_UNIQUE,
            });
        }
    }
    Ok(())
}
