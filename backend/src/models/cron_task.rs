//! Scheduled maintenance tasks and their execution log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const HOUR_SECS: i64 = 3600;
pub const DAY_SECS: i64 = 24 * HOUR_SECS;
pub const MONTH_SECS: i64 = 30 * DAY_SECS;

/// Outcome of one cron run. Codes are the historical `0` / `1` / `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CronStatus {
    NothingToDo,
    Done,
    /// More work remained than the per-run limit allowed.
    Partial,
}

impl CronStatus {
    pub fn code(&self) -> i32 {
        match self {
            CronStatus::NothingToDo => 0,
            CronStatus::Done => 1,
            CronStatus::Partial => -1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CronStatus::NothingToDo => "nothing_to_do",
            CronStatus::Done => "done",
            CronStatus::Partial => "partial",
        }
    }

    /// Keep the "strongest" of two partial results: partial > done > nothing.
    pub fn merge(self, other: CronStatus) -> CronStatus {
        match (self, other) {
            (CronStatus::Partial, _) | (_, CronStatus::Partial) => CronStatus::Partial,
            (CronStatus::Done, _) | (_, CronStatus::Done) => CronStatus::Done,
            _ => CronStatus::NothingToDo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CronState {
    Disabled,
    Waiting,
    Running,
}

impl CronState {
    pub fn code(&self) -> i32 {
        match self {
            CronState::Disabled => 0,
            CronState::Waiting => 1,
            CronState::Running => 2,
        }
    }
}

impl TryFrom<i32> for CronState {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CronState::Disabled),
            1 => Ok(CronState::Waiting),
            2 => Ok(CronState::Running),
            other => Err(format!("Unknown cron state {}", other)),
        }
    }
}

/// Who triggers the task: the in-process scheduler or the `cron` CLI command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CronMode {
    Internal,
    External,
}

impl CronMode {
    pub fn code(&self) -> i32 {
        match self {
            CronMode::Internal => 1,
            CronMode::External => 2,
        }
    }

    /// Whether `allowmode` (a bit set, 1 = internal, 2 = external) permits this mode.
    pub fn allowed_by(&self, allowmode: i32) -> bool {
        allowmode & self.code() != 0
    }
}

impl TryFrom<i32> for CronMode {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CronMode::Internal),
            2 => Ok(CronMode::External),
            other => Err(format!("Unknown cron mode {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct CronTask {
    pub id: i64,
    /// Component owning the task, e.g. `User`.
    pub itemtype: String,
    pub name: String,
    /// Seconds between two runs.
    pub frequency: i64,
    /// Per-run item limit.
    pub param: Option<i32>,
    #[sqlx(try_from = "i32")]
    pub state: CronState,
    #[sqlx(try_from = "i32")]
    pub mode: CronMode,
    pub allowmode: i32,
    /// Days of logs to keep.
    pub logs_lifetime: i32,
    pub lastrun: Option<DateTime<Utc>>,
}

impl CronTask {
    /// Whether the task should run at `now` under the internal scheduler.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.state != CronState::Waiting || self.mode != CronMode::Internal {
            return false;
        }
        match self.lastrun {
            None => true,
            Some(last) => (now - last).num_seconds() >= self.frequency,
        }
    }
}

/// Definition used to register a task when it does not exist yet.
#[derive(Debug, Clone)]
pub struct CronTaskDefinition {
    pub itemtype: &'static str,
    pub name: &'static str,
    pub frequency: i64,
    pub param: Option<i32>,
    pub state: CronState,
    pub mode: CronMode,
    pub allowmode: i32,
    pub logs_lifetime: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct CronTaskLog {
    pub id: i64,
    pub crontasks_id: i64,
    pub date: DateTime<Utc>,
    /// `CronStatus` code of the run.
    pub state: i32,
    /// Seconds spent in the run.
    pub elapsed: f64,
    pub volume: i64,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateCronTaskRequest {
    pub frequency: Option<i64>,
    pub param: Option<i32>,
    pub state: Option<CronState>,
    pub mode: Option<CronMode>,
    pub logs_lifetime: Option<i32>,
}
