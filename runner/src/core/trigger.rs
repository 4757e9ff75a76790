//! Trigger sources and schedule arithmetic.
//!
//! Three independent sources start a run: a push to the configured branch, a
//! fixed daily schedule, and manual dispatch (`banner-runner run`). This
//! module is pure; the `watch` loop owns the clock and the remote polling.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;

/// What caused a run to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The remote branch head moved.
    Push,
    /// The daily schedule came due.
    Schedule,
    /// Explicit `run` invocation.
    Manual,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Push => "push",
            Trigger::Schedule => "schedule",
            Trigger::Manual => "manual",
        }
    }
}

/// A fixed daily fire time parsed from a restricted cron expression.
///
/// Only the `"M H * * *"` shape is accepted: one fixed minute and hour, every
/// day. Ranges, steps, and lists are rejected at parse time so a config typo
/// surfaces as a validation error instead of a silently-wrong schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
}

impl DailySchedule {
    /// Parse a `"M H * * *"` cron expression.
    pub fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(anyhow!(
                "schedule '{expr}' must have 5 cron fields (got {})",
                fields.len()
            ));
        }
        if fields[2..] != ["*", "*", "*"] {
            return Err(anyhow!(
                "schedule '{expr}' must be daily: day/month/weekday fields must all be '*'"
            ));
        }
        let minute: u32 = fields[0]
            .parse()
            .map_err(|_| anyhow!("schedule '{expr}': minute field is not a number"))?;
        let hour: u32 = fields[1]
            .parse()
            .map_err(|_| anyhow!("schedule '{expr}': hour field is not a number"))?;
        let at = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| anyhow!("schedule '{expr}': minute must be 0-59 and hour 0-23"))?;
        Ok(Self { at })
    }

    /// The next UTC instant strictly after `after` at which the schedule fires.
    pub fn next_fire(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let candidate = after.date_naive().and_time(self.at).and_utc();
        if candidate > after {
            candidate
        } else {
            candidate + Duration::days(1)
        }
    }
}
