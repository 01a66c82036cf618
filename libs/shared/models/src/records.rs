use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// AVAILABILITY RULES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Weekly recurring declaration keyed by day-of-week.
    Template,
    /// Declaration for one specific calendar date, overriding templates.
    Exception,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Template => write!(f, "template"),
            RuleKind::Exception => write!(f, "exception"),
        }
    }
}

/// A doctor's declarative availability rule. Templates carry `day_of_week`
/// (0 = Sunday .. 6 = Saturday); exceptions carry `specific_date`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub kind: RuleKind,
    pub day_of_week: Option<u8>,
    pub specific_date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub slot_duration: i64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilityRule {
    /// True when [start, end) of `self` intersects [start, end) of `other`.
    pub fn overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.start_time < end && self.end_time > start
    }
}

// ==============================================================================
// TIME SLOTS
// ==============================================================================

/// A materialized bookable interval. Identity is (doctor_id, date,
/// start_time); the store enforces that uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub appointment_id: Option<Uuid>,
    pub reserved_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeSlot {
    /// A reservation only counts while its deadline is still ahead of `now`;
    /// the stored timestamp is never trusted on its own.
    pub fn is_reserved(&self, now: DateTime<Utc>) -> bool {
        self.reserved_until.is_some_and(|until| until > now)
    }

    pub fn is_booked(&self) -> bool {
        self.appointment_id.is_some()
    }

    /// Free means bookable right now: flagged available, bound to no
    /// appointment, and not under a live reservation.
    pub fn is_free(&self, now: DateTime<Utc>) -> bool {
        self.is_available && self.appointment_id.is_none() && !self.is_reserved(now)
    }
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    InProgress,
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Approved => write!(f, "approved"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

impl AppointmentStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Rejected | AppointmentStatus::Completed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
