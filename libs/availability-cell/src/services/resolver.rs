use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use shared_database::Database;

use crate::models::{day_of_week, ResolvedPeriod};

/// Decides which rules govern a doctor's calendar date.
///
/// Precedence is a single rule applied in one place: any exception set for
/// the exact date completely replaces the weekly template for that date,
/// even when the set holds nothing but blocked periods. Only when no
/// exception exists does the day-of-week template apply.
pub struct RuleResolver {
    db: Database,
}

impl RuleResolver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the governed periods for the date, ordered by start time.
    /// An empty result means the doctor has no schedule that day at all.
    pub async fn resolve(&self, doctor_id: Uuid, date: NaiveDate) -> Vec<ResolvedPeriod> {
        let exceptions = self.db.list_exception_rules(doctor_id, date);
        if !exceptions.is_empty() {
            debug!(%doctor_id, %date, count = exceptions.len(), "date governed by exceptions");
            return exceptions.iter().map(ResolvedPeriod::from_rule).collect();
        }

        let templates = self.db.list_template_rules(doctor_id, day_of_week(date));
        debug!(%doctor_id, %date, count = templates.len(), "date governed by weekly template");
        templates.iter().map(ResolvedPeriod::from_rule).collect()
    }
}
