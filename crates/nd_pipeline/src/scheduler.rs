use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use nd_core::{NewsletterConfig, Result, TriggerKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::orchestrator::{PipelineOrchestrator, RunStatus};

/// When scheduled runs fire. Daily times are UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleSpec {
    Daily(NaiveTime),
    Every(Duration),
}

impl ScheduleSpec {
    /// The daily schedule from the config, or `None` when scheduling is off.
    pub fn from_config(config: &NewsletterConfig) -> Result<Option<Self>> {
        if !config.schedule_enabled {
            return Ok(None);
        }
        Ok(Some(Self::Daily(config.schedule_time()?)))
    }

    /// First fire time strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            // Intervals beyond what a timestamp can hold fall back to a day.
            ScheduleSpec::Every(interval) => chrono::Duration::from_std(interval)
                .ok()
                .and_then(|step| now.checked_add_signed(step))
                .unwrap_or_else(|| now + chrono::Duration::days(1)),
            ScheduleSpec::Daily(time) => {
                let today = now.date_naive().and_time(time).and_utc();
                if today > now {
                    today
                } else {
                    today + chrono::Duration::days(1)
                }
            }
        }
    }
}

impl fmt::Display for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleSpec::Daily(time) => write!(f, "daily at {} UTC", time.format("%H:%M")),
            ScheduleSpec::Every(interval) => write!(f, "every {}s", interval.as_secs()),
        }
    }
}

/// Longest interval accepted for periodic runs.
pub const MAX_INTERVAL: Duration = Duration::from_secs(366 * 86_400);

/// Durations like `90`, `45s`, `1h30m` or `2d`. A bare number is seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub Duration);

fn segment_seconds(digits: &str, unit: u64) -> std::result::Result<u64, String> {
    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(unit))
        .ok_or_else(|| format!("Duration too large: {}", digits))
}

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let too_large = || format!("Duration too large: {}", s);
        let mut total = 0u64;
        let mut digits = String::new();
        let mut seen = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            if digits.is_empty() {
                if c.is_whitespace() {
                    continue;
                }
                return Err(format!("Invalid character in duration: {}", c));
            }
            let unit = match c {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                'd' => 86_400,
                _ => return Err(format!("Invalid duration unit: {}", c)),
            };
            total = total.checked_add(segment_seconds(&digits, unit)?).ok_or_else(too_large)?;
            digits.clear();
            seen = true;
        }

        if !digits.is_empty() {
            total = total.checked_add(segment_seconds(&digits, 1)?).ok_or_else(too_large)?;
            seen = true;
        }

        if !seen {
            return Err("Duration must include a number".to_string());
        }
        if total == 0 {
            return Err("Duration must be positive".to_string());
        }
        let duration = Duration::from_secs(total);
        if duration > MAX_INTERVAL {
            return Err(format!("Duration must be at most {} days", MAX_INTERVAL.as_secs() / 86_400));
        }
        Ok(HumanDuration(duration))
    }
}

/// Fires scheduled runs through the orchestrator, and so through the same
/// gate as manual runs.
#[derive(Debug)]
pub struct Scheduler {
    orchestrator: Arc<PipelineOrchestrator>,
    spec: ScheduleSpec,
    next_run: watch::Sender<Option<DateTime<Utc>>>,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>, spec: ScheduleSpec) -> Self {
        let (next_run, _) = watch::channel(None);
        Self {
            orchestrator,
            spec,
            next_run,
        }
    }

    pub fn spec(&self) -> ScheduleSpec {
        self.spec
    }

    /// `None` until the loop starts and after it stops.
    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        *self.next_run.borrow()
    }

    /// Run until `stop` turns true or its sender is dropped.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        info!(schedule = %self.spec, "⏰ Scheduler started");
        while !*stop.borrow() {
            let now = Utc::now();
            let next = self.spec.next_after(now);
            self.next_run.send_replace(Some(next));
            info!(next = %next, "Next scheduled run");

            let wait = (next - now).to_std().unwrap_or_default();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    let run = self.orchestrator.run(TriggerKind::Scheduled).await;
                    match run.status() {
                        Some(RunStatus::SkippedLocked) => {
                            warn!("Scheduled run skipped: another run is in progress")
                        }
                        Some(RunStatus::Failed) => warn!(run = %run.id, "Scheduled run failed"),
                        _ => info!(run = %run.id, stories = run.story_count, "Scheduled run complete"),
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        self.next_run.send_replace(None);
        info!("Scheduler stopped");
    }

    /// Spawn the loop on the runtime. Send `true` (or drop the sender) to stop it.
    pub fn spawn(self: Arc<Self>) -> (JoinHandle<()>, watch::Sender<bool>) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { self.run(stop_rx).await });
        (handle, stop_tx)
    }
}
