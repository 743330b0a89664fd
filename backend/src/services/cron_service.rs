//! Built-in maintenance tasks and their bookkeeping.
//!
//! A run claims the task (`Running`), executes it, writes a log row and
//! stores `lastrun`. Runs come from the background scheduler
//! (`run_due`), the `cron` CLI command, or the admin API.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{AppError, Result};
use crate::models::alert::{AlertKind, USER_ALERT_ITEMTYPE};
use crate::models::cron_task::{
    CronMode, CronState, CronStatus, CronTask, CronTaskDefinition, CronTaskLog,
    UpdateCronTaskRequest, DAY_SECS, MONTH_SECS,
};
use crate::services::metrics_service;
use crate::services::notification_service::{
    NotificationDetail, NotificationEvent, NotificationService,
};
use crate::services::password_expiration::{expiration_time, DISABLED, MAX_DELAY_DAYS};
use crate::services::settings_service::SettingsService;
use crate::services::software_service::SoftwareService;
use crate::store::{AlertStore, CronStore, Store, UserStore};

pub const PASSWORD_EXPIRATION_TASK: &str = "passwordexpiration";
pub const CLEAN_SOFTWARE_TASK: &str = "cleansoftware";

/// Both modes allowed.
const ALLOW_ALL_MODES: i32 = 3;

/// Tasks registered at startup when missing.
pub fn builtin_tasks() -> [CronTaskDefinition; 2] {
    [
        CronTaskDefinition {
            itemtype: "User",
            name: PASSWORD_EXPIRATION_TASK,
            frequency: DAY_SECS,
            param: Some(100),
            state: CronState::Waiting,
            mode: CronMode::Internal,
            allowmode: ALLOW_ALL_MODES,
            logs_lifetime: 30,
        },
        CronTaskDefinition {
            itemtype: "CleanSoftwareCron",
            name: CLEAN_SOFTWARE_TASK,
            frequency: MONTH_SECS,
            param: Some(1000),
            state: CronState::Disabled,
            mode: CronMode::External,
            allowmode: ALLOW_ALL_MODES,
            logs_lifetime: 300,
        },
    ]
}

/// What a task body reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronOutcome {
    pub status: CronStatus,
    pub volume: i64,
    pub content: String,
}

impl CronOutcome {
    fn nothing_to_do() -> Self {
        Self {
            status: CronStatus::NothingToDo,
            volume: 0,
            content: String::new(),
        }
    }
}

/// Result of one logged run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CronRun {
    pub task: String,
    pub status: CronStatus,
    pub volume: i64,
    /// Seconds
    pub elapsed: f64,
    pub content: String,
}

pub struct CronService {
    store: Arc<dyn Store>,
    settings: Arc<SettingsService>,
    notifications: Arc<NotificationService>,
    software: Arc<SoftwareService>,
}

impl CronService {
    pub fn new(
        store: Arc<dyn Store>,
        settings: Arc<SettingsService>,
        notifications: Arc<NotificationService>,
        software: Arc<SoftwareService>,
    ) -> Self {
        Self {
            store,
            settings,
            notifications,
            software,
        }
    }

    pub async fn register_builtin(&self) -> Result<usize> {
        let mut registered = 0;
        for definition in builtin_tasks() {
            if self.store.register_cron_task(&definition).await? {
                tracing::info!(
                    "Registered cron task {}/{}",
                    definition.itemtype,
                    definition.name
                );
                registered += 1;
            }
        }
        Ok(registered)
    }

    pub async fn list(&self) -> Result<Vec<CronTask>> {
        self.store.list_cron_tasks().await
    }

    pub async fn get(&self, name: &str) -> Result<CronTask> {
        self.store
            .get_cron_task(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Cron task '{}' not found", name)))
    }

    pub async fn update(&self, name: &str, input: UpdateCronTaskRequest) -> Result<CronTask> {
        let mut task = self.get(name).await?;

        if let Some(frequency) = input.frequency {
            if frequency <= 0 {
                return Err(AppError::Validation(
                    "Frequency must be a positive number of seconds".to_string(),
                ));
            }
            task.frequency = frequency;
        }
        if let Some(param) = input.param {
            if param < 0 {
                return Err(AppError::Validation(
                    "Limit must not be negative".to_string(),
                ));
            }
            task.param = Some(param);
        }
        if let Some(state) = input.state {
            if state == CronState::Running {
                return Err(AppError::Validation(
                    "A task cannot be set to running".to_string(),
                ));
            }
            task.state = state;
        }
        if let Some(mode) = input.mode {
            if !mode.allowed_by(task.allowmode) {
                return Err(AppError::Validation(format!(
                    "Mode {:?} is not allowed for task '{}'",
                    mode, task.name
                )));
            }
            task.mode = mode;
        }
        if let Some(logs_lifetime) = input.logs_lifetime {
            if !(0..=MAX_DELAY_DAYS).contains(&logs_lifetime) {
                return Err(AppError::Validation(format!(
                    "Log lifetime must be between 0 and {} days",
                    MAX_DELAY_DAYS
                )));
            }
            task.logs_lifetime = logs_lifetime;
        }

        self.store.update_cron_task(&task).await?;
        Ok(task)
    }

    pub async fn logs(&self, name: &str, limit: i64) -> Result<Vec<CronTaskLog>> {
        let task = self.get(name).await?;
        self.store.list_cron_logs(task.id, limit).await
    }

    /// Run one task now, whatever its state and mode.
    pub async fn run_task(&self, name: &str) -> Result<CronRun> {
        let task = self.get(name).await?;
        self.run(task, Utc::now()).await
    }

    async fn run(&self, task: CronTask, now: DateTime<Utc>) -> Result<CronRun> {
        if !self.store.claim_cron_task(task.id).await? {
            return Err(AppError::Conflict(format!(
                "Cron task '{}' is already running",
                task.name
            )));
        }

        let started = Instant::now();
        let limit = i64::from(task.param.unwrap_or(0));
        let result = self.execute(&task.name, limit, now).await;
        let elapsed = started.elapsed().as_secs_f64();

        let (outcome, error) = match result {
            Ok(outcome) => (outcome, None),
            Err(e) => {
                let outcome = CronOutcome {
                    content: format!("Error: {}", e),
                    ..CronOutcome::nothing_to_do()
                };
                (outcome, Some(e))
            }
        };

        let logged = self
            .store
            .insert_cron_log(
                task.id,
                outcome.status.code(),
                elapsed,
                outcome.volume,
                &outcome.content,
            )
            .await;
        // Manual runs of a disabled task leave it disabled.
        let state = if task.state == CronState::Disabled {
            CronState::Disabled
        } else {
            CronState::Waiting
        };
        self.store
            .release_cron_task(task.id, state, Utc::now())
            .await?;

        if let Some(e) = error {
            if let Err(log_err) = logged {
                tracing::warn!("Failed to log cron task '{}': {}", task.name, log_err);
            }
            return Err(e);
        }
        logged?;

        metrics_service::record_cron_run(&task.name, outcome.status, outcome.volume);
        tracing::info!(
            task = %task.name,
            status = outcome.status.as_str(),
            volume = outcome.volume,
            "Cron task finished in {:.3}s",
            elapsed
        );
        Ok(CronRun {
            task: task.name,
            status: outcome.status,
            volume: outcome.volume,
            elapsed,
            content: outcome.content,
        })
    }

    async fn execute(&self, name: &str, limit: i64, now: DateTime<Utc>) -> Result<CronOutcome> {
        match name {
            PASSWORD_EXPIRATION_TASK => self.password_expiration(limit, now).await,
            CLEAN_SOFTWARE_TASK => self.clean_software(limit).await,
            other => Err(AppError::Internal(format!(
                "No implementation for cron task '{}'",
                other
            ))),
        }
    }

    /// Run every waiting internal task whose frequency has elapsed.
    /// Returns the number of tasks run; failures are logged.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut ran = 0;
        for task in self.store.list_cron_tasks().await? {
            if !task.is_due(now) {
                continue;
            }
            let name = task.name.clone();
            match self.run(task, now).await {
                Ok(_) => ran += 1,
                Err(e) => tracing::warn!("Cron task '{}' failed: {}", name, e),
            }
        }
        Ok(ran)
    }

    /// Drop log rows older than each task's `logs_lifetime` days.
    pub async fn prune_logs(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut pruned = 0;
        for task in self.store.list_cron_tasks().await? {
            if task.logs_lifetime <= 0 {
                continue;
            }
            let Some(before) = Duration::try_days(i64::from(task.logs_lifetime))
                .and_then(|lifetime| now.checked_sub_signed(lifetime))
            else {
                continue;
            };
            pruned += self.store.prune_cron_logs(task.id, before).await?;
        }
        if pruned > 0 {
            tracing::debug!("Pruned {} cron log row(s)", pruned);
        }
        Ok(pruned)
    }

    /// Lock accounts past the lock delay, then warn up to `limit` users
    /// whose password enters the notice window.
    pub async fn password_expiration(
        &self,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<CronOutcome> {
        let core = self.settings.core_settings().await?;
        let expiration = core.password_expiration;
        if !expiration.is_enabled()
            || (expiration.notice == DISABLED && expiration.lock_delay == DISABLED)
        {
            return Ok(CronOutcome::nothing_to_do());
        }

        let mut outcome = CronOutcome::nothing_to_do();
        let mut messages = Vec::new();

        if let Some(cutoff) = expiration.lock_cutoff(now) {
            let locked = self.store.lock_users_with_password_before(cutoff).await?;
            if !locked.is_empty() {
                metrics_service::record_users_locked(locked.len() as u64);
                tracing::info!(
                    "Deactivated {} user(s) with an expired password",
                    locked.len()
                );
            }
            if core.use_notifications {
                for user in &locked {
                    if let Err(e) = self
                        .notifications
                        .notify_user(NotificationEvent::UserLocked, user, NotificationDetail::None)
                        .await
                    {
                        tracing::warn!("Lock notice for user {} failed: {}", user.id, e);
                    }
                }
            }
            outcome.status = CronStatus::Done;
            outcome.volume += locked.len() as i64;
            messages.push(format!("{} user(s) locked", locked.len()));
        }

        let notice_cutoff = match expiration.notice_cutoff(now) {
            Some(cutoff) if core.use_notifications => cutoff,
            _ => {
                outcome.content = messages.join(", ");
                return Ok(outcome);
            }
        };

        let eligible = self
            .store
            .count_users_with_password_before(notice_cutoff, AlertKind::PasswordExpiration)
            .await?;
        let users = self
            .store
            .list_users_with_password_before(
                notice_cutoff,
                AlertKind::PasswordExpiration,
                limit,
            )
            .await?;

        let mut notified = 0;
        for user in &users {
            let expires_at = expiration_time(user.password_last_update, &expiration);
            match self
                .notifications
                .notify_user(
                    NotificationEvent::PasswordExpires,
                    user,
                    NotificationDetail::ExpiresAt(expires_at),
                )
                .await
            {
                Ok(_) => {
                    self.store
                        .insert_alert(USER_ALERT_ITEMTYPE, user.id, AlertKind::PasswordExpiration)
                        .await?;
                    notified += 1;
                }
                Err(e) => tracing::warn!(
                    "Password expiration notice for user {} failed: {}",
                    user.id,
                    e
                ),
            }
        }

        if notified > 0 {
            outcome.status = outcome.status.merge(CronStatus::Done);
        }
        if eligible > limit {
            outcome.status = CronStatus::Partial;
        }
        outcome.volume += notified;
        messages.push(format!("{} user(s) notified", notified));
        outcome.content = messages.join(", ");
        Ok(outcome)
    }

    pub async fn clean_software(&self, limit: i64) -> Result<CronOutcome> {
        let cleanup = self.software.clean_orphans(limit).await?;
        let status = if cleanup.limit_reached {
            CronStatus::Partial
        } else if cleanup.total() > 0 {
            CronStatus::Done
        } else {
            CronStatus::NothingToDo
        };
        Ok(CronOutcome {
            status,
            volume: cleanup.total(),
            content: format!(
                "{} version(s) purged, {} software trashed",
                cleanup.versions_purged, cleanup.software_trashed
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::models::itemtype::ItemType;
    use crate::models::user::{AuthType, NewUser};
    use crate::services::asset_service::test_support::create_asset;
    use crate::services::encryption::SecretBox;
    use crate::services::notification_service::RecordingNotifier;
    use crate::store::memory::MemoryStore;
    use crate::store::ConfigStore;

    struct Fixture {
        memory: Arc<MemoryStore>,
        store: Arc<dyn Store>,
        settings: Arc<SettingsService>,
        recorder: Arc<RecordingNotifier>,
        cron: CronService,
    }

    fn fixture() -> Fixture {
        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn Store> = memory.clone();
        let settings = Arc::new(SettingsService::new(store.clone(), SecretBox::generate()));
        let recorder = Arc::new(RecordingNotifier::default());
        let notifications = Arc::new(NotificationService::new(store.clone(), recorder.clone()));
        let software = Arc::new(SoftwareService::new(store.clone()));
        let cron = CronService::new(store.clone(), settings.clone(), notifications, software);
        Fixture {
            memory,
            store,
            settings,
            recorder,
            cron,
        }
    }

    /// Ten local users whose passwords were set 1, 11, ..., 91 days ago.
    async fn seed_users(store: &Arc<dyn Store>, now: DateTime<Utc>) {
        for i in 0..10 {
            let user = store
                .insert_user(&NewUser {
                    name: format!("expiring_{}", i),
                    realname: None,
                    firstname: None,
                    phone: None,
                    password: String::new(),
                    password_last_update: Some(now - Duration::days(1 + 10 * i)),
                    authtype: AuthType::Local,
                    auths_id: 0,
                    is_active: true,
                    is_deleted: false,
                    entities_id: 0,
                    profiles_id: 0,
                    timezone: None,
                })
                .await
                .unwrap();
            if i % 2 == 0 {
                store
                    .add_user_email(user.id, &format!("expiring_{}@example.com", i), true)
                    .await
                    .unwrap();
            }
        }
    }

    async fn configure(settings: &SettingsService, delay: i32, notice: i32, lock: i32) {
        let values: BTreeMap<String, serde_json::Value> = serde_json::from_value(json!({
            "password_expiration_delay": delay,
            "password_expiration_notice": notice,
            "password_expiration_lock_delay": lock,
            "use_notifications": true,
        }))
        .unwrap();
        settings.update("core", &values).await.unwrap();
    }

    async fn locked_users(store: &Arc<dyn Store>) -> usize {
        store
            .list_users()
            .await
            .unwrap()
            .iter()
            .filter(|u| u.authtype == AuthType::Local && !u.is_active)
            .count()
    }

    async fn check_password_expiration(
        delay: i32,
        notice: i32,
        lock: i32,
        limit: i64,
        expected_status: CronStatus,
        expected_notified: i64,
        expected_locked: usize,
    ) {
        let f = fixture();
        let now = Utc::now();
        seed_users(&f.store, now).await;
        configure(&f.settings, delay, notice, lock).await;

        let outcome = f.cron.password_expiration(limit, now).await.unwrap();
        assert_eq!(outcome.status, expected_status);
        assert_eq!(
            f.store
                .count_alerts(USER_ALERT_ITEMTYPE, AlertKind::PasswordExpiration)
                .await
                .unwrap(),
            expected_notified
        );
        assert_eq!(locked_users(&f.store).await, expected_locked);
    }

    #[tokio::test]
    async fn test_disabled_expiration_does_nothing() {
        check_password_expiration(-1, -1, -1, 100, CronStatus::NothingToDo, 0, 0).await;
    }

    #[tokio::test]
    async fn test_no_notice_no_lock_does_nothing() {
        check_password_expiration(15, -1, -1, 100, CronStatus::NothingToDo, 0, 0).await;
    }

    #[tokio::test]
    async fn test_notice_zero_notifies_expired_passwords() {
        check_password_expiration(50, 0, -1, 100, CronStatus::Done, 5, 0).await;
    }

    #[tokio::test]
    async fn test_notice_before_expiration() {
        check_password_expiration(50, 20, -1, 100, CronStatus::Done, 7, 0).await;
    }

    #[tokio::test]
    async fn test_notice_limit_gives_partial() {
        check_password_expiration(50, 20, -1, 5, CronStatus::Partial, 5, 0).await;
    }

    #[tokio::test]
    async fn test_lock_delay_zero_locks_expired_passwords() {
        check_password_expiration(50, -1, 0, 100, CronStatus::Done, 0, 5).await;
    }

    #[tokio::test]
    async fn test_lock_after_delay() {
        check_password_expiration(20, -1, 10, 100, CronStatus::Done, 0, 7).await;
    }

    #[tokio::test]
    async fn test_locked_users_are_notified() {
        let f = fixture();
        let now = Utc::now();
        seed_users(&f.store, now).await;
        configure(&f.settings, 20, -1, 10).await;

        let outcome = f.cron.password_expiration(100, now).await.unwrap();
        assert_eq!(outcome.volume, 7);
        // Locked users with an address: expiring_4, expiring_6, expiring_8.
        let sent = f.recorder.sent.lock().await;
        let notified: Vec<i64> = sent
            .iter()
            .filter(|n| n.event == NotificationEvent::UserLocked)
            .map(|n| n.users_id)
            .collect();
        assert_eq!(notified.len(), 3);
        for users_id in notified {
            let user = f.store.get_user(users_id).await.unwrap().unwrap();
            assert!(!user.is_active);
        }
    }

    #[tokio::test]
    async fn test_out_of_range_delays_lock_nobody() {
        let f = fixture();
        let now = Utc::now();
        seed_users(&f.store, now).await;
        // Written below the settings service, which rejects such values.
        for (name, value) in [
            ("password_expiration_delay", "2147483647"),
            ("password_expiration_notice", "-1"),
            ("password_expiration_lock_delay", "2147483647"),
        ] {
            f.store.set_config_value("core", name, value).await.unwrap();
        }
        f.cron.register_builtin().await.unwrap();

        let outcome = f.cron.password_expiration(100, now).await.unwrap();
        assert_eq!(outcome.status, CronStatus::NothingToDo);
        assert_eq!(locked_users(&f.store).await, 0);

        assert_eq!(f.cron.run_due(now).await.unwrap(), 1);
        let task = f.cron.get(PASSWORD_EXPIRATION_TASK).await.unwrap();
        assert_eq!(task.state, CronState::Waiting);
    }

    #[tokio::test]
    async fn test_failed_log_write_releases_task() {
        let f = fixture();
        f.cron.register_builtin().await.unwrap();

        f.memory.fail_cron_logs(true);
        let err = f.cron.run_task(PASSWORD_EXPIRATION_TASK).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        let task = f.cron.get(PASSWORD_EXPIRATION_TASK).await.unwrap();
        assert_eq!(task.state, CronState::Waiting);

        f.memory.fail_cron_logs(false);
        f.cron.run_task(PASSWORD_EXPIRATION_TASK).await.unwrap();
        assert_eq!(f.cron.logs(PASSWORD_EXPIRATION_TASK, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_users_are_notified_once() {
        let f = fixture();
        let now = Utc::now();
        seed_users(&f.store, now).await;
        configure(&f.settings, 50, 0, -1).await;

        f.cron.password_expiration(100, now).await.unwrap();
        // Only users with an address get a message; all get an alert.
        assert_eq!(f.recorder.sent.lock().await.len(), 2);

        let again = f.cron.password_expiration(100, now).await.unwrap();
        assert_eq!(again.status, CronStatus::NothingToDo);
        assert_eq!(f.recorder.sent.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_notifications_disabled_skip_notice() {
        let f = fixture();
        let now = Utc::now();
        seed_users(&f.store, now).await;
        configure(&f.settings, 50, 0, -1).await;
        let values: BTreeMap<String, serde_json::Value> =
            serde_json::from_value(json!({"use_notifications": false})).unwrap();
        f.settings.update("core", &values).await.unwrap();

        let outcome = f.cron.password_expiration(100, now).await.unwrap();
        assert_eq!(outcome.status, CronStatus::NothingToDo);
        assert!(f.recorder.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_register_builtin_is_idempotent() {
        let f = fixture();
        assert_eq!(f.cron.register_builtin().await.unwrap(), 2);
        assert_eq!(f.cron.register_builtin().await.unwrap(), 0);

        let expiration = f.cron.get(PASSWORD_EXPIRATION_TASK).await.unwrap();
        assert_eq!(expiration.itemtype, "User");
        assert_eq!(expiration.frequency, DAY_SECS);
        assert_eq!(expiration.param, Some(100));
        assert_eq!(expiration.state, CronState::Waiting);

        let software = f.cron.get(CLEAN_SOFTWARE_TASK).await.unwrap();
        assert_eq!(software.state, CronState::Disabled);
        assert_eq!(software.mode, CronMode::External);
        assert_eq!(software.logs_lifetime, 300);
    }

    #[tokio::test]
    async fn test_run_task_logs_and_releases() {
        let f = fixture();
        f.cron.register_builtin().await.unwrap();

        let run = f.cron.run_task(PASSWORD_EXPIRATION_TASK).await.unwrap();
        assert_eq!(run.status, CronStatus::NothingToDo);

        let task = f.cron.get(PASSWORD_EXPIRATION_TASK).await.unwrap();
        assert_eq!(task.state, CronState::Waiting);
        assert!(task.lastrun.is_some());
        let logs = f.cron.logs(PASSWORD_EXPIRATION_TASK, 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].state, 0);

        // A manual run keeps a disabled task disabled.
        f.cron.run_task(CLEAN_SOFTWARE_TASK).await.unwrap();
        let task = f.cron.get(CLEAN_SOFTWARE_TASK).await.unwrap();
        assert_eq!(task.state, CronState::Disabled);
    }

    #[tokio::test]
    async fn test_running_task_cannot_be_claimed_twice() {
        let f = fixture();
        f.cron.register_builtin().await.unwrap();
        let task = f.cron.get(PASSWORD_EXPIRATION_TASK).await.unwrap();
        assert!(f.store.claim_cron_task(task.id).await.unwrap());

        assert!(matches!(
            f.cron.run_task(PASSWORD_EXPIRATION_TASK).await.unwrap_err(),
            AppError::Conflict(_)
        ));
        // Running tasks are not due either.
        assert_eq!(f.cron.run_due(Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_due() {
        let f = fixture();
        f.cron.register_builtin().await.unwrap();
        let now = Utc::now();

        // Only the waiting internal task runs.
        assert_eq!(f.cron.run_due(now).await.unwrap(), 1);
        assert_eq!(f.cron.run_due(now).await.unwrap(), 0);
        assert_eq!(
            f.cron
                .run_due(now + Duration::seconds(DAY_SECS + 60))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_prune_logs() {
        let f = fixture();
        f.cron.register_builtin().await.unwrap();
        f.cron.run_task(PASSWORD_EXPIRATION_TASK).await.unwrap();

        assert_eq!(f.cron.prune_logs(Utc::now()).await.unwrap(), 0);
        let later = Utc::now() + Duration::days(31);
        assert_eq!(f.cron.prune_logs(later).await.unwrap(), 1);
        assert!(f
            .cron
            .logs(PASSWORD_EXPIRATION_TASK, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_logs_lifetime_is_bounded() {
        let f = fixture();
        f.cron.register_builtin().await.unwrap();
        let err = f
            .cron
            .update(
                PASSWORD_EXPIRATION_TASK,
                UpdateCronTaskRequest {
                    logs_lifetime: Some(i32::MAX),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // A lifetime stored out of range keeps every log instead of panicking.
        let mut task = f.cron.get(PASSWORD_EXPIRATION_TASK).await.unwrap();
        task.logs_lifetime = i32::MAX;
        f.store.update_cron_task(&task).await.unwrap();
        f.cron.run_task(PASSWORD_EXPIRATION_TASK).await.unwrap();
        assert_eq!(f.cron.prune_logs(Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_checks_allowed_mode() {
        let f = fixture();
        f.cron.register_builtin().await.unwrap();
        let mut task = f.cron.get(PASSWORD_EXPIRATION_TASK).await.unwrap();
        task.allowmode = CronMode::Internal.code();
        f.store.update_cron_task(&task).await.unwrap();

        let err = f
            .cron
            .update(
                PASSWORD_EXPIRATION_TASK,
                UpdateCronTaskRequest {
                    mode: Some(CronMode::External),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let updated = f
            .cron
            .update(
                PASSWORD_EXPIRATION_TASK,
                UpdateCronTaskRequest {
                    param: Some(5),
                    state: Some(CronState::Disabled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.param, Some(5));
        assert_eq!(updated.state, CronState::Disabled);
    }

    #[tokio::test]
    async fn test_clean_software_task() {
        let f = fixture();
        let software = create_asset(&f.store, ItemType::Software, "orphan").await;
        f.store
            .insert_software_version(software.id, "1.0", None)
            .await
            .unwrap();
        f.store
            .insert_software_version(software.id, "2.0", None)
            .await
            .unwrap();

        let partial = f.cron.clean_software(1).await.unwrap();
        assert_eq!(partial.status, CronStatus::Partial);
        assert_eq!(partial.volume, 1);

        let done = f.cron.clean_software(1000).await.unwrap();
        assert_eq!(done.status, CronStatus::Done);
        assert_eq!(done.volume, 2);

        let idle = f.cron.clean_software(1000).await.unwrap();
        assert_eq!(idle.status, CronStatus::NothingToDo);
    }
}
