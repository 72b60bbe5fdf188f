use anyhow::Result;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Policy configuration
///
/// A single process-wide value, replaced wholesale on update. Updates go
/// through [`ConfigPatch`] so omitted fields keep their current values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PolicyConfig {
    /// Weekday blocking window (Monday-Friday)
    pub weekday_schedule: WeekdaySchedule,

    /// Weekend blocking (Saturday-Sunday, all day when enabled)
    #[serde(default)]
    pub weekend_schedule: WeekendSchedule,

    /// A continuous session longer than this is auto-closed (minutes)
    pub max_session_minutes: u32,

    /// Lifetime of an educational override grant (minutes)
    #[serde(default = "default_override_minutes")]
    pub override_minutes: u32,

    /// Valid educational override codes
    pub educational_codes: BTreeSet<String>,

    /// Sites subject to schedule blocking
    pub blocked_sites: BTreeSet<String>,

    /// Weekly minute budgets per site (absence = no budget enforcement)
    #[serde(default)]
    pub site_budgets: BTreeMap<String, u64>,
}

fn default_override_minutes() -> u32 {
    30
}

/// Weekday schedule window, inclusive, local time
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WeekdaySchedule {
    pub enabled: bool,

    /// Window start, zero-padded "HH:MM"
    pub start: String,

    /// Window end, zero-padded "HH:MM"
    pub end: String,
}

/// Weekend schedule, no time-of-day window
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct WeekendSchedule {
    #[serde(default)]
    pub enabled: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            weekday_schedule: WeekdaySchedule {
                enabled: true,
                start: "09:00".to_string(),
                end: "17:00".to_string(),
            },
            weekend_schedule: WeekendSchedule { enabled: false },
            max_session_minutes: 30,
            override_minutes: 30,
            educational_codes: ["EDU2024", "LEARN123", "STUDY456"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            blocked_sites: ["youtube.com", "reddit.com", "facebook.com"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            site_budgets: [("youtube.com", 120), ("reddit.com", 120), ("facebook.com", 120)]
                .iter()
                .map(|(s, m)| (s.to_string(), *m))
                .collect(),
        }
    }
}

impl PolicyConfig {
    /// Validate the configuration, rejecting it wholesale on any problem
    pub fn validate(&self) -> Result<()> {
        if self.weekday_schedule.enabled {
            validate_clock_time(&self.weekday_schedule.start)?;
            validate_clock_time(&self.weekday_schedule.end)?;

            if self.weekday_schedule.start >= self.weekday_schedule.end {
                anyhow::bail!(
                    "Weekday schedule start ({}) must be before end ({})",
                    self.weekday_schedule.start,
                    self.weekday_schedule.end
                );
            }
        }

        if !(1..=1440).contains(&self.max_session_minutes) {
            anyhow::bail!(
                "max_session_minutes must be between 1 and 1440, got {}",
                self.max_session_minutes
            );
        }

        if !(1..=1440).contains(&self.override_minutes) {
            anyhow::bail!(
                "override_minutes must be between 1 and 1440, got {}",
                self.override_minutes
            );
        }

        if self.educational_codes.is_empty() {
            anyhow::bail!("educational_codes must contain at least one code");
        }

        Ok(())
    }

    /// Apply a patch, producing the candidate configuration
    ///
    /// Supplied fields replace current values; omitted fields are kept.
    /// Nested schedule sub-objects merge field by field.
    pub fn merged(&self, patch: &ConfigPatch) -> PolicyConfig {
        let mut config = self.clone();

        if let Some(weekday) = &patch.weekday_schedule {
            if let Some(enabled) = weekday.enabled {
                config.weekday_schedule.enabled = enabled;
            }
            if let Some(start) = &weekday.start {
                config.weekday_schedule.start = start.clone();
            }
            if let Some(end) = &weekday.end {
                config.weekday_schedule.end = end.clone();
            }
        }

        if let Some(weekend) = &patch.weekend_schedule {
            if let Some(enabled) = weekend.enabled {
                config.weekend_schedule.enabled = enabled;
            }
        }

        if let Some(minutes) = patch.max_session_minutes {
            config.max_session_minutes = minutes;
        }
        if let Some(minutes) = patch.override_minutes {
            config.override_minutes = minutes;
        }
        if let Some(codes) = &patch.educational_codes {
            config.educational_codes = codes.clone();
        }
        if let Some(sites) = &patch.blocked_sites {
            config.blocked_sites = sites.clone();
        }
        if let Some(budgets) = &patch.site_budgets {
            config.site_budgets = budgets.clone();
        }

        config
    }
}

/// Validate a zero-padded 24-hour "HH:MM" string
fn validate_clock_time(value: &str) -> Result<()> {
    if value.len() != 5 || NaiveTime::parse_from_str(value, "%H:%M").is_err() {
        anyhow::bail!("Invalid time of day (expected zero-padded HH:MM): {}", value);
    }
    Ok(())
}

/// Partial configuration update with explicit optional fields
///
/// Replaces the object-spread merging of settings forms: each field is
/// applied only when supplied, and schedule sub-objects are merged at
/// field level rather than replaced.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigPatch {
    pub weekday_schedule: Option<WeekdaySchedulePatch>,
    pub weekend_schedule: Option<WeekendSchedulePatch>,
    pub max_session_minutes: Option<u32>,
    pub override_minutes: Option<u32>,
    pub educational_codes: Option<BTreeSet<String>>,
    pub blocked_sites: Option<BTreeSet<String>>,
    pub site_budgets: Option<BTreeMap<String, u64>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WeekdaySchedulePatch {
    pub enabled: Option<bool>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WeekendSchedulePatch {
    pub enabled: Option<bool>,
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = include_str!("../../example-config.yaml");
