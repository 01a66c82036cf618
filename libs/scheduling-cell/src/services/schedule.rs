use chrono::NaiveDate;
use uuid::Uuid;

use availability_cell::{
    AvailabilityOverview, AvailabilityRuleService, CreateExceptionRequest, UpdateRuleRequest,
    UpsertTemplateRequest, WeeklyScheduleUpdate,
};
use shared_config::AppConfig;
use shared_database::Database;
use shared_models::{ActorContext, AvailabilityRule};

use crate::models::SchedulingError;
use crate::services::generator::SlotGenerator;

/// The doctor-facing schedule surface: every rule edit flows through here
/// so the materialized slot table is regenerated in the same operation.
/// Unbooked future slots always mirror the current rules; booked slots are
/// left alone no matter how the rules change.
pub struct DoctorScheduleService {
    rules: AvailabilityRuleService,
    generator: SlotGenerator,
}

impl DoctorScheduleService {
    pub fn new(db: Database, config: AppConfig) -> Self {
        Self {
            rules: AvailabilityRuleService::new(db.clone(), config.clone()),
            generator: SlotGenerator::new(db, config),
        }
    }

    pub async fn get_availability(
        &self,
        actor: ActorContext,
        today: NaiveDate,
    ) -> Result<AvailabilityOverview, SchedulingError> {
        Ok(self.rules.get_availability(actor, today).await?)
    }

    pub async fn day_template(
        &self,
        actor: ActorContext,
        day: u8,
    ) -> Result<Vec<AvailabilityRule>, SchedulingError> {
        Ok(self.rules.day_template(actor, day).await?)
    }

    pub async fn upsert_template(
        &self,
        actor: ActorContext,
        request: UpsertTemplateRequest,
        today: NaiveDate,
    ) -> Result<AvailabilityRule, SchedulingError> {
        let rule = self.rules.upsert_template(actor, request).await?;
        self.generator.regenerate(actor.actor_id, today).await?;
        Ok(rule)
    }

    pub async fn create_exception(
        &self,
        actor: ActorContext,
        request: CreateExceptionRequest,
        today: NaiveDate,
    ) -> Result<Vec<AvailabilityRule>, SchedulingError> {
        let rules = self.rules.create_exception(actor, request).await?;
        self.generator.regenerate(actor.actor_id, today).await?;
        Ok(rules)
    }

    pub async fn update_rule(
        &self,
        actor: ActorContext,
        rule_id: Uuid,
        request: UpdateRuleRequest,
        today: NaiveDate,
    ) -> Result<AvailabilityRule, SchedulingError> {
        let rule = self.rules.update_rule(actor, rule_id, request).await?;
        self.generator.regenerate(actor.actor_id, today).await?;
        Ok(rule)
    }

    pub async fn delete_rule(
        &self,
        actor: ActorContext,
        rule_id: Uuid,
        today: NaiveDate,
    ) -> Result<(), SchedulingError> {
        self.rules.delete_rule(actor, rule_id).await?;
        self.generator.regenerate(actor.actor_id, today).await?;
        Ok(())
    }

    pub async fn update_weekly_schedule(
        &self,
        actor: ActorContext,
        update: WeeklyScheduleUpdate,
        today: NaiveDate,
    ) -> Result<(), SchedulingError> {
        self.rules.update_weekly_schedule(actor, update).await?;
        self.generator.regenerate(actor.actor_id, today).await?;
        Ok(())
    }
}
