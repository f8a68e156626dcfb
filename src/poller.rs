//! Submit-and-wait driver for asynchronous image generation tasks.
//!
//! The poller only observes task state: it calls
//! [`ModelScopeService::get_task_status`] until the task reaches a terminal
//! status or the poll budget runs out, sleeping with capped exponential
//! backoff between observations.

use crate::ai::{ModelScopeService, TaskStatus, TaskStatusResponse};
use crate::constants::{
    DEFAULT_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS, POLL_ATTEMPTS_PER_MINUTE,
    POLL_INTERVAL_MULTIPLIER,
};
use crate::{Error, Result};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// What ends a poll loop that never sees a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BudgetMode {
    /// `timeout_minutes × attempts_per_minute` observations.
    #[default]
    Attempts,
    /// Wall-clock time since submission reaches `timeout_minutes`.
    WallClock,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSettings {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    pub attempts_per_minute: u32,
    pub budget_mode: BudgetMode,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_interval: Duration::from_millis(MAX_POLL_INTERVAL_MS),
            multiplier: POLL_INTERVAL_MULTIPLIER,
            attempts_per_minute: POLL_ATTEMPTS_PER_MINUTE,
            budget_mode: BudgetMode::Attempts,
        }
    }
}

impl PollSettings {
    pub fn with_budget_mode(mut self, budget_mode: BudgetMode) -> Self {
        self.budget_mode = budget_mode;
        self
    }

    pub fn max_attempts(&self, timeout_minutes: u32) -> u32 {
        timeout_minutes.saturating_mul(self.attempts_per_minute)
    }
}

/// Current wait between two observations. Each poll loop threads its own value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    interval_ms: u64,
}

impl Backoff {
    pub fn new(settings: &PollSettings) -> Self {
        Self {
            interval_ms: settings.initial_interval.as_millis() as u64,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// `min(max, round(interval × multiplier))`
    pub fn next(self, settings: &PollSettings) -> Self {
        let grown = (self.interval_ms as f64 * settings.multiplier).round() as u64;
        Self {
            interval_ms: grown.min(settings.max_interval.as_millis() as u64),
        }
    }
}

/// One status observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollAttempt {
    pub index: u32,
    /// Wait that preceded this observation (zero for the first).
    pub interval: Duration,
    pub elapsed: Duration,
    pub status: TaskStatus,
}

/// Successful end of a poll loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub task_id: String,
    pub response: TaskStatusResponse,
    /// Non-terminal observations plus the terminal one.
    pub attempts_used: u32,
    pub elapsed: Duration,
    pub attempts: Vec<PollAttempt>,
}

impl PollOutcome {
    pub fn images(&self) -> &[String] {
        self.response.images()
    }
}

pub struct TaskPoller<'a> {
    service: &'a dyn ModelScopeService,
    settings: PollSettings,
}

impl<'a> TaskPoller<'a> {
    pub fn new(service: &'a dyn ModelScopeService, settings: PollSettings) -> Self {
        Self { service, settings }
    }

    /// Polls `task_id` until it succeeds, fails, or the budget for
    /// `timeout_minutes` is spent.
    ///
    /// `started` is the submission instant that elapsed times are measured from.
    pub async fn wait_for_completion(
        &self,
        task_id: &str,
        timeout_minutes: u32,
        started: Instant,
    ) -> Result<PollOutcome> {
        let max_attempts = self.settings.max_attempts(timeout_minutes);
        let deadline = Duration::from_secs(u64::from(timeout_minutes) * 60);
        let mut backoff = Backoff::new(&self.settings);
        let mut attempts: u32 = 0;
        let mut waited = Duration::ZERO;
        let mut history = Vec::new();

        while self.has_budget(attempts, max_attempts, started.elapsed(), deadline) {
            let response = self.service.get_task_status(task_id).await?;
            let elapsed = started.elapsed();
            history.push(PollAttempt {
                index: attempts,
                interval: waited,
                elapsed,
                status: response.task_status,
            });

            let progress = progress_percent(attempts, max_attempts);
            info!(
                "Image generation progress: {}% - status: {} (attempt {}/{}, elapsed: {}s)",
                progress,
                response.task_status.as_str(),
                attempts + 1,
                max_attempts,
                elapsed.as_secs()
            );

            match response.task_status {
                TaskStatus::Succeeded => {
                    return Ok(PollOutcome {
                        task_id: task_id.to_string(),
                        response,
                        attempts_used: attempts + 1,
                        elapsed,
                        attempts: history,
                    });
                }
                TaskStatus::Failed => {
                    let message = response
                        .error_message
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| "Internal server error".to_string());
                    warn!("Task {} reported failure: {}", task_id, message);
                    return Err(Error::TaskFailed(message));
                }
                TaskStatus::Running => {
                    info!("Task is processing... {}%, elapsed: {}s", progress, elapsed.as_secs())
                }
                TaskStatus::Pending => {
                    info!("Task is queued... {}%, elapsed: {}s", progress, elapsed.as_secs())
                }
                TaskStatus::Unknown => warn!(
                    "Task {} reported an unrecognized status, polling again ({}%, elapsed: {}s)",
                    task_id,
                    progress,
                    elapsed.as_secs()
                ),
            }

            waited = self.next_wait(backoff, started.elapsed(), deadline);
            tokio::time::sleep(waited).await;
            attempts += 1;
            backoff = backoff.next(&self.settings);
        }

        Err(Error::PollTimeout {
            task_id: task_id.to_string(),
            timeout_minutes,
            elapsed_secs: started.elapsed().as_secs(),
        })
    }

    fn has_budget(
        &self,
        attempts: u32,
        max_attempts: u32,
        elapsed: Duration,
        deadline: Duration,
    ) -> bool {
        match self.settings.budget_mode {
            BudgetMode::Attempts => attempts < max_attempts,
            BudgetMode::WallClock => elapsed < deadline,
        }
    }

    fn next_wait(&self, backoff: Backoff, elapsed: Duration, deadline: Duration) -> Duration {
        match self.settings.budget_mode {
            BudgetMode::Attempts => backoff.interval(),
            BudgetMode::WallClock => backoff.interval().min(deadline.saturating_sub(elapsed)),
        }
    }
}

fn progress_percent(attempts: u32, max_attempts: u32) -> u32 {
    if max_attempts == 0 {
        return 0;
    }
    (f64::from(attempts) / f64::from(max_attempts) * 100.0).round() as u32
}
