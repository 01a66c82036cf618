use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use shared_database::StoreError;
use shared_models::AvailabilityRule;

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertTemplateRequest {
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub slot_duration: i64,
    pub reason: Option<String>,
}

/// Replaces the whole exception set a doctor holds for one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExceptionRequest {
    pub specific_date: NaiveDate,
    pub periods: Vec<ExceptionPeriod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionPeriod {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub slot_duration: Option<i64>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRuleRequest {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub slot_duration: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyScheduleUpdate {
    pub days: Vec<DaySchedule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day_of_week: u8,
    pub periods: Vec<TemplatePeriod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatePeriod {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub slot_duration: i64,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

/// A doctor's declared schedule: all weekly templates plus the exceptions
/// that still lie ahead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityOverview {
    pub templates: Vec<AvailabilityRule>,
    pub exceptions: Vec<AvailabilityRule>,
}

/// One governed period of a resolved day, in resolution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPeriod {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub slot_duration: i64,
}

impl ResolvedPeriod {
    pub fn from_rule(rule: &AvailabilityRule) -> Self {
        Self {
            start_time: rule.start_time,
            end_time: rule.end_time,
            is_available: rule.is_available,
            slot_duration: rule.slot_duration,
        }
    }
}

/// Day-of-week on the 0 = Sunday .. 6 = Saturday scale rules are keyed by.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AvailabilityError {
    #[error("availability rule not found")]
    NotFound,

    #[error("time period overlaps an existing template for this day")]
    RuleConflict,

    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("only the owning doctor may manage this schedule")]
    Forbidden,

    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for AvailabilityError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AvailabilityError::NotFound,
            other => AvailabilityError::Store(other),
        }
    }
}
