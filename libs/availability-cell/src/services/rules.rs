use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::Database;
use shared_models::{ActorContext, AvailabilityRule, RuleKind};

use crate::models::{
    AvailabilityError, AvailabilityOverview, CreateExceptionRequest, UpdateRuleRequest,
    UpsertTemplateRequest, WeeklyScheduleUpdate,
};

/// Doctor-facing management of availability rules. Every operation is
/// scoped to the calling doctor's own schedule.
pub struct AvailabilityRuleService {
    db: Database,
    config: AppConfig,
}

impl AvailabilityRuleService {
    pub fn new(db: Database, config: AppConfig) -> Self {
        Self { db, config }
    }

    /// All weekly templates plus exceptions dated `today` or later.
    /// Past exceptions stay in storage as an audit trail but are not part
    /// of the working schedule a doctor edits.
    pub async fn get_availability(
        &self,
        actor: ActorContext,
        today: NaiveDate,
    ) -> Result<AvailabilityOverview, AvailabilityError> {
        let doctor_id = require_doctor(actor)?;

        let rules = self.db.list_rules(doctor_id);
        let (templates, exceptions): (Vec<AvailabilityRule>, Vec<AvailabilityRule>) = rules
            .into_iter()
            .partition(|rule| rule.kind == RuleKind::Template);

        let exceptions = exceptions
            .into_iter()
            .filter(|rule| rule.specific_date.is_some_and(|date| date >= today))
            .collect();

        Ok(AvailabilityOverview {
            templates,
            exceptions,
        })
    }

    /// Templates for one weekday, ordered by start time.
    pub async fn day_template(
        &self,
        actor: ActorContext,
        day_of_week: u8,
    ) -> Result<Vec<AvailabilityRule>, AvailabilityError> {
        let doctor_id = require_doctor(actor)?;
        validate_day_of_week(day_of_week)?;
        Ok(self.db.list_template_rules(doctor_id, day_of_week))
    }

    /// Create or update a weekly template period. The upsert key is
    /// (doctor, day_of_week, start_time); a different start time that
    /// overlaps an existing period on the same day is rejected.
    pub async fn upsert_template(
        &self,
        actor: ActorContext,
        request: UpsertTemplateRequest,
    ) -> Result<AvailabilityRule, AvailabilityError> {
        let doctor_id = require_doctor(actor)?;
        validate_day_of_week(request.day_of_week)?;
        validate_time_range(request.start_time, request.end_time)?;
        self.validate_slot_duration(request.slot_duration)?;

        let siblings = self.db.list_template_rules(doctor_id, request.day_of_week);
        if siblings
            .iter()
            .filter(|rule| rule.start_time != request.start_time)
            .any(|rule| rule.overlaps(request.start_time, request.end_time))
        {
            return Err(AvailabilityError::RuleConflict);
        }

        let now = Utc::now();
        let rule = self.db.upsert_template_rule(AvailabilityRule {
            id: Uuid::new_v4(),
            doctor_id,
            kind: RuleKind::Template,
            day_of_week: Some(request.day_of_week),
            specific_date: None,
            start_time: request.start_time,
            end_time: request.end_time,
            is_available: request.is_available,
            slot_duration: request.slot_duration,
            reason: request.reason,
            created_at: now,
            updated_at: now,
        });

        info!(%doctor_id, day_of_week = request.day_of_week, rule_id = %rule.id, "template saved");
        Ok(rule)
    }

    /// Declare the exception set for one date, atomically replacing any
    /// set already present for that date.
    pub async fn create_exception(
        &self,
        actor: ActorContext,
        request: CreateExceptionRequest,
    ) -> Result<Vec<AvailabilityRule>, AvailabilityError> {
        let doctor_id = require_doctor(actor)?;

        if request.periods.is_empty() {
            return Err(AvailabilityError::InvalidRule(
                "an exception needs at least one period".to_string(),
            ));
        }

        let now = Utc::now();
        let mut rules = Vec::with_capacity(request.periods.len());
        for period in &request.periods {
            validate_time_range(period.start_time, period.end_time)?;
            if period.reason.trim().is_empty() {
                return Err(AvailabilityError::InvalidRule(
                    "an exception period needs a reason".to_string(),
                ));
            }
            let slot_duration = match (period.is_available, period.slot_duration) {
                (true, Some(duration)) => {
                    self.validate_slot_duration(duration)?;
                    duration
                }
                (true, None) => {
                    return Err(AvailabilityError::InvalidRule(
                        "an available period needs a slot duration".to_string(),
                    ))
                }
                (false, _) => period.slot_duration.unwrap_or(0),
            };

            rules.push(AvailabilityRule {
                id: Uuid::new_v4(),
                doctor_id,
                kind: RuleKind::Exception,
                day_of_week: None,
                specific_date: Some(request.specific_date),
                start_time: period.start_time,
                end_time: period.end_time,
                is_available: period.is_available,
                slot_duration,
                reason: Some(period.reason.clone()),
                created_at: now,
                updated_at: now,
            });
        }
        reject_overlapping(&rules)?;

        let rules =
            self.db
                .replace_exception_rules_for_date(doctor_id, request.specific_date, rules)?;
        info!(%doctor_id, date = %request.specific_date, count = rules.len(), "exception set saved");
        Ok(rules)
    }

    /// Rewrite one rule in place. Template edits re-validate overlap
    /// against the other templates of the same day.
    pub async fn update_rule(
        &self,
        actor: ActorContext,
        rule_id: Uuid,
        request: UpdateRuleRequest,
    ) -> Result<AvailabilityRule, AvailabilityError> {
        let doctor_id = require_doctor(actor)?;
        validate_time_range(request.start_time, request.end_time)?;
        self.validate_slot_duration(request.slot_duration)?;

        let current = self.db.get_rule(rule_id)?;
        if current.doctor_id != doctor_id {
            return Err(AvailabilityError::Forbidden);
        }

        if let Some(day) = current.day_of_week {
            let siblings = self.db.list_template_rules(doctor_id, day);
            if siblings
                .iter()
                .filter(|rule| rule.id != rule_id)
                .any(|rule| rule.overlaps(request.start_time, request.end_time))
            {
                return Err(AvailabilityError::RuleConflict);
            }
        }

        let updated = self.db.update_rule(rule_id, |rule| {
            rule.start_time = request.start_time;
            rule.end_time = request.end_time;
            rule.is_available = request.is_available;
            rule.slot_duration = request.slot_duration;
            rule.reason = request.reason.clone();
        })?;

        debug!(%doctor_id, %rule_id, "rule updated");
        Ok(updated)
    }

    pub async fn delete_rule(
        &self,
        actor: ActorContext,
        rule_id: Uuid,
    ) -> Result<(), AvailabilityError> {
        let doctor_id = require_doctor(actor)?;
        let rule = self.db.get_rule(rule_id)?;
        if rule.doctor_id != doctor_id {
            return Err(AvailabilityError::Forbidden);
        }
        self.db.delete_rule(rule_id)?;
        debug!(%doctor_id, %rule_id, "rule deleted");
        Ok(())
    }

    /// Bulk rewrite: for every listed day, the submitted periods atomically
    /// replace whatever templates existed for that day.
    pub async fn update_weekly_schedule(
        &self,
        actor: ActorContext,
        update: WeeklyScheduleUpdate,
    ) -> Result<(), AvailabilityError> {
        let doctor_id = require_doctor(actor)?;

        for day in &update.days {
            validate_day_of_week(day.day_of_week)?;

            let now = Utc::now();
            let mut rules = Vec::with_capacity(day.periods.len());
            for period in &day.periods {
                validate_time_range(period.start_time, period.end_time)?;
                self.validate_slot_duration(period.slot_duration)?;
                rules.push(AvailabilityRule {
                    id: Uuid::new_v4(),
                    doctor_id,
                    kind: RuleKind::Template,
                    day_of_week: Some(day.day_of_week),
                    specific_date: None,
                    start_time: period.start_time,
                    end_time: period.end_time,
                    is_available: period.is_available,
                    slot_duration: period.slot_duration,
                    reason: None,
                    created_at: now,
                    updated_at: now,
                });
            }
            reject_overlapping(&rules)?;

            self.db
                .replace_template_rules_for_day(doctor_id, day.day_of_week, rules)?;
        }

        info!(%doctor_id, days = update.days.len(), "weekly schedule replaced");
        Ok(())
    }

    fn validate_slot_duration(&self, duration: i64) -> Result<(), AvailabilityError> {
        if duration < self.config.min_slot_duration_minutes
            || duration > self.config.max_slot_duration_minutes
        {
            return Err(AvailabilityError::InvalidRule(format!(
                "slot duration must be between {} and {} minutes",
                self.config.min_slot_duration_minutes, self.config.max_slot_duration_minutes
            )));
        }
        Ok(())
    }
}

fn require_doctor(actor: ActorContext) -> Result<Uuid, AvailabilityError> {
    if !actor.is_doctor() {
        return Err(AvailabilityError::Forbidden);
    }
    Ok(actor.actor_id)
}

fn validate_day_of_week(day_of_week: u8) -> Result<(), AvailabilityError> {
    if day_of_week > 6 {
        return Err(AvailabilityError::InvalidRule(
            "day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }
    Ok(())
}

fn validate_time_range(start: NaiveTime, end: NaiveTime) -> Result<(), AvailabilityError> {
    if start >= end {
        return Err(AvailabilityError::InvalidRule(
            "start time must be before end time".to_string(),
        ));
    }
    Ok(())
}

fn reject_overlapping(rules: &[AvailabilityRule]) -> Result<(), AvailabilityError> {
    for (index, rule) in rules.iter().enumerate() {
        if rules[..index]
            .iter()
            .any(|other| other.overlaps(rule.start_time, rule.end_time))
        {
            return Err(AvailabilityError::RuleConflict);
        }
    }
    Ok(())
}
