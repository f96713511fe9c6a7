use std::{io::BufReader, path::Path, time::Duration};

use anyhow::{Context, Error};
use chrono_tz::Tz;
use serde::Deserialize;

use super::projection::NextShiftPolicy;

/// Screen settings, read from a JSON file. Missing fields take their defaults.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PlannerConfig {
    /// How long the pull-to-refresh indicator stays up, even when the
    /// backend answers at once.
    pub refresh_min_visible_ms: u64,
    pub next_shift_policy: NextShiftPolicy,
    /// Zone used to turn shift instants into calendar dates and clock times.
    pub timezone: Tz,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            refresh_min_visible_ms: 1000,
            next_shift_policy: NextShiftPolicy::FirstArrived,
            timezone: chrono_tz::Europe::Amsterdam,
        }
    }
}

impl PlannerConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open config: {}", path.to_string_lossy()))?;

        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("invalid planner config in {}", path.to_string_lossy()))
    }

    pub fn refresh_min_visible(&self) -> Duration {
        Duration::from_millis(self.refresh_min_visible_ms)
    }
}
