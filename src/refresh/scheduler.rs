use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::RefreshService;
use crate::models::JobStart;

/// Parse the refresh schedule; an empty or `off` expression disables it
pub fn parse_schedule(expression: &str) -> Result<Option<Schedule>> {
    let trimmed = expression.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    Schedule::from_str(trimmed)
        .map(Some)
        .map_err(|e| anyhow!("invalid refresh schedule '{}': {}", trimmed, e))
}

/// Next fire time strictly after `after`
pub fn next_run(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

/// Starts a non-forced refresh-all on every tick of a cron schedule
///
/// Channels that are not yet due are skipped by the job itself, so a tight
/// schedule only costs a pass over the channel list.
pub struct RefreshScheduler {
    service: RefreshService,
    schedule: Schedule,
}

impl RefreshScheduler {
    pub fn new(service: RefreshService, schedule: Schedule) -> Self {
        Self { service, schedule }
    }

    /// Build from a config expression; `None` when scheduling is disabled
    pub fn from_expression(service: RefreshService, expression: &str) -> Result<Option<Self>> {
        Ok(parse_schedule(expression)?.map(|schedule| Self::new(service, schedule)))
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting refresh scheduler");

        loop {
            let now = Utc::now();
            let Some(next) = next_run(&self.schedule, now) else {
                warn!("Refresh schedule has no upcoming runs, scheduler stopping");
                return;
            };
            debug!(next_run = %next, "Next scheduled refresh");
            let wait = (next - now).to_std().unwrap_or_default();

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Refresh scheduler shutting down");
                    return;
                }
                _ = tokio::time::sleep(wait) => {
                    match self.service.start_refresh_all(false).await {
                        JobStart::Started(job_id) => {
                            info!(%job_id, "Scheduled refresh started");
                        }
                        JobStart::AlreadyRunning(job_id) => {
                            debug!(%job_id, "Scheduled refresh skipped, job already running");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_disabled_schedule() {
        assert!(parse_schedule("").unwrap().is_none());
        assert!(parse_schedule("off").unwrap().is_none());
    }

    #[test]
    fn test_invalid_schedule() {
        assert!(parse_schedule("every hour please").is_err());
    }

    #[test]
    fn test_hourly_next_run() {
        let schedule = parse_schedule("0 0 * * * *").unwrap().unwrap();
        let after = Utc.with_ymd_and_hms(2024, 6, 1, 10, 15, 0).unwrap();
        let next = next_run(&schedule, after).unwrap();
        assert_eq!((next.hour(), next.minute(), next.second()), (11, 0, 0));
    }
}
