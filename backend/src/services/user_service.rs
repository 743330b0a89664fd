//! User accounts: input rules, passwords, tokens and the lost-password flow.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::api::validation::is_valid_login;
use crate::error::{AppError, Result};
use crate::models::alert::{AlertKind, USER_ALERT_ITEMTYPE};
use crate::models::user::{
    AuthType, CreateUserRequest, NewUser, TokenField, UpdateUserRequest, User, UserLookupField,
};
use crate::services::notification_service::{
    NotificationDetail, NotificationEvent, NotificationService,
};
use crate::services::password_expiration::has_password_expired;
use crate::services::password_policy::PasswordPolicy;
use crate::services::settings_service::SettingsService;
use crate::store::{AlertStore, Store, UserStore};

/// Length of personal, API and lost-password tokens.
pub const TOKEN_LENGTH: usize = 40;

/// Hours a lost-password token stays valid.
const FORGET_TOKEN_LIFETIME_HOURS: i64 = 24;

const PASSWORD_MISMATCH: &str = "Error: the two passwords do not match";
const INVALID_CREDENTIALS: &str = "Incorrect username or password";

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// `"0"` and blank both clear the timezone.
fn normalize_timezone(timezone: Option<String>) -> Option<String> {
    timezone
        .map(|tz| tz.trim().to_string())
        .filter(|tz| !tz.is_empty() && tz != "0")
}

pub struct UserService {
    store: Arc<dyn Store>,
    settings: Arc<SettingsService>,
    notifications: Arc<NotificationService>,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(
        store: Arc<dyn Store>,
        settings: Arc<SettingsService>,
        notifications: Arc<NotificationService>,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            store,
            settings,
            notifications,
            bcrypt_cost,
        }
    }

    async fn password_policy(&self) -> Result<PasswordPolicy> {
        Ok(self.settings.core_settings().await?.password_policy)
    }

    fn hash(&self, password: &str) -> Result<String> {
        Ok(bcrypt::hash(password, self.bcrypt_cost)?)
    }

    /// Apply the add rules to a creation request without touching the store.
    pub async fn prepare_input_for_add(&self, input: &CreateUserRequest) -> Result<NewUser> {
        if input.stop_import {
            return Err(AppError::Validation(format!(
                "Import of user '{}' was stopped",
                input.name
            )));
        }
        let name = input.name.trim().to_string();
        if !is_valid_login(&name) {
            return Err(AppError::Validation(
                "The login is not valid. Unable to add the user.".to_string(),
            ));
        }

        let now = Utc::now();
        let password = input.password.as_deref().unwrap_or_default();
        let (password, password_last_update) = if input.extauth {
            (String::new(), Some(now))
        } else if password.is_empty() {
            (String::new(), None)
        } else {
            if input.password2.as_deref() != Some(password) {
                return Err(AppError::Validation(PASSWORD_MISMATCH.to_string()));
            }
            self.password_policy().await?.validate(password)?;
            (self.hash(password)?, Some(now))
        };

        Ok(NewUser {
            name,
            realname: input.realname.clone(),
            firstname: input.firstname.clone(),
            phone: input.phone.clone(),
            password,
            password_last_update,
            authtype: input.authtype.unwrap_or(AuthType::Local),
            auths_id: input.auths_id.unwrap_or(0),
            is_active: input.is_active.unwrap_or(true),
            is_deleted: false,
            entities_id: input.entities_id.unwrap_or(0),
            profiles_id: input.profiles_id.unwrap_or(0),
            timezone: normalize_timezone(input.timezone.clone()),
        })
    }

    pub async fn create(&self, input: CreateUserRequest) -> Result<User> {
        let new_user = self.prepare_input_for_add(&input).await?;
        if self.store.get_user_by_name(&new_user.name).await?.is_some() {
            return Err(AppError::Conflict(
                "Unable to add. The user already exists.".to_string(),
            ));
        }
        let user = self.store.insert_user(&new_user).await?;

        let default_index = input.default_email.unwrap_or(0);
        for (i, email) in input.emails.iter().enumerate() {
            let email = email.trim();
            if !email.is_empty() {
                self.store
                    .add_user_email(user.id, email, i == default_index)
                    .await?;
            }
        }

        tracing::info!("Created user '{}' ({})", user.name, user.id);
        Ok(user)
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<User>> {
        self.store.get_user_by_name(name).await
    }

    /// User with this login, provided it authenticates through `authtype`/`auths_id`.
    pub async fn get_by_name_and_auth(
        &self,
        name: &str,
        authtype: AuthType,
        auths_id: i64,
    ) -> Result<Option<User>> {
        Ok(self
            .store
            .get_user_by_name(name)
            .await?
            .filter(|u| u.authtype == authtype && u.auths_id == auths_id))
    }

    pub async fn id_by_name(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.store.get_user_by_name(name).await?.map(|u| u.id))
    }

    /// Id of the only user whose `field` equals `value`; `None` when zero or several match.
    pub async fn id_by_field(&self, field: UserLookupField, value: &str) -> Result<Option<i64>> {
        let ids = self.store.find_user_ids_by_field(field, value).await?;
        Ok(match ids.as_slice() {
            [id] => Some(*id),
            _ => None,
        })
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        self.store.list_users().await
    }

    /// Change a password held in `user`. Returns false when it is unchanged.
    async fn apply_password(
        &self,
        user: &mut User,
        password: &str,
        password2: Option<&str>,
    ) -> Result<bool> {
        if password2 != Some(password) {
            return Err(AppError::Validation(PASSWORD_MISMATCH.to_string()));
        }
        if user.has_password() && bcrypt::verify(password, &user.password)? {
            return Ok(false);
        }
        self.password_policy().await?.validate(password)?;
        user.password = self.hash(password)?;
        user.password_last_update = Some(Utc::now());
        Ok(true)
    }

    async fn clear_expiration_alerts(&self, users_id: i64) -> Result<()> {
        let cleared = self
            .store
            .delete_alerts(USER_ALERT_ITEMTYPE, users_id, AlertKind::PasswordExpiration)
            .await?;
        if cleared > 0 {
            tracing::debug!("Cleared {} expiration alert(s) of user {}", cleared, users_id);
        }
        Ok(())
    }

    pub async fn update(&self, id: i64, input: UpdateUserRequest) -> Result<User> {
        let mut user = self.get(id).await?;

        if let Some(name) = input.name.as_deref().map(str::trim) {
            if name != user.name {
                if !is_valid_login(name) {
                    return Err(AppError::Validation(
                        "The login is not valid. Unable to update login.".to_string(),
                    ));
                }
                if let Some(other) = self.store.get_user_by_name(name).await? {
                    if other.id != id {
                        return Err(AppError::Conflict(
                            "Unable to update login. A user already exists.".to_string(),
                        ));
                    }
                }
                user.name = name.to_string();
            }
        }

        let mut password_changed = false;
        if let Some(password) = input.password.as_deref().filter(|p| !p.is_empty()) {
            password_changed = self
                .apply_password(&mut user, password, input.password2.as_deref())
                .await?;
        }
        if !password_changed {
            if let Some(last_update) = input.password_last_update {
                user.password_last_update = Some(last_update);
            }
        }

        if let Some(realname) = input.realname {
            user.realname = Some(realname);
        }
        if let Some(firstname) = input.firstname {
            user.firstname = Some(firstname);
        }
        if let Some(phone) = input.phone {
            user.phone = Some(phone);
        }
        if let Some(is_active) = input.is_active {
            user.is_active = is_active;
        }
        if let Some(profiles_id) = input.profiles_id {
            user.profiles_id = profiles_id;
        }
        if let Some(entities_id) = input.entities_id {
            user.entities_id = entities_id;
        }
        if input.timezone.is_some() {
            user.timezone = normalize_timezone(input.timezone);
        }

        self.store.update_user(&user).await?;
        if password_changed {
            self.clear_expiration_alerts(id).await?;
        }

        if let Some(emails) = input.emails {
            for (i, email) in emails.iter().enumerate() {
                let email = email.trim();
                if !email.is_empty() {
                    self.store
                        .add_user_email(id, email, input.default_email == Some(i))
                        .await?;
                }
            }
        }

        self.get(id).await
    }

    /// Copy a user under a new login (`<name> (copy)`, then `(copy 2)`, ...).
    /// Everything but the id, login, tokens and dates is kept.
    pub async fn clone_user(&self, id: i64) -> Result<User> {
        let source = self.get(id).await?;
        let mut name = format!("{} (copy)", source.name);
        let mut n = 1;
        while self.store.get_user_by_name(&name).await?.is_some() {
            n += 1;
            name = format!("{} (copy {})", source.name, n);
        }

        let copy = self
            .store
            .insert_user(&NewUser {
                name,
                realname: source.realname.clone(),
                firstname: source.firstname.clone(),
                phone: source.phone.clone(),
                password: source.password.clone(),
                password_last_update: source.password_last_update,
                authtype: source.authtype,
                auths_id: source.auths_id,
                is_active: source.is_active,
                is_deleted: source.is_deleted,
                entities_id: source.entities_id,
                profiles_id: source.profiles_id,
                timezone: source.timezone.clone(),
            })
            .await?;
        tracing::info!("Cloned user {} into '{}' ({})", id, copy.name, copy.id);
        Ok(copy)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.store.delete_user(id).await? {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }
        tracing::info!("Deleted user {}", id);
        Ok(())
    }

    /// Default address, or the first one when none is flagged.
    pub async fn default_email(&self, id: i64) -> Result<Option<String>> {
        let emails = self.store.list_user_emails(id).await?;
        Ok(emails
            .iter()
            .find(|e| e.is_default)
            .or_else(|| emails.first())
            .map(|e| e.email.clone()))
    }

    pub async fn all_emails(&self, id: i64) -> Result<Vec<String>> {
        Ok(self
            .store
            .list_user_emails(id)
            .await?
            .into_iter()
            .map(|e| e.email)
            .collect())
    }

    pub async fn is_email(&self, id: i64, email: &str) -> Result<bool> {
        Ok(self
            .store
            .list_user_emails(id)
            .await?
            .iter()
            .any(|e| e.email.eq_ignore_ascii_case(email)))
    }

    /// Personal token of the user, generated on first use.
    pub async fn get_auth_token(&self, id: i64) -> Result<String> {
        let user = self.get(id).await?;
        match user.personal_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => self.regenerate_token(id, TokenField::PersonalToken).await,
        }
    }

    pub async fn regenerate_token(&self, id: i64, field: TokenField) -> Result<String> {
        let mut user = self.get(id).await?;
        let token = generate_token();
        let now = Utc::now();
        match field {
            TokenField::PersonalToken => {
                user.personal_token = Some(token.clone());
                user.personal_token_date = Some(now);
            }
            TokenField::ApiToken => {
                user.api_token = Some(token.clone());
                user.api_token_date = Some(now);
            }
        }
        self.store.update_user(&user).await?;
        tracing::info!("Regenerated {} of user {}", field.column(), id);
        Ok(token)
    }

    /// Look a user up by one of its tokens. `field` must name a token column.
    pub async fn get_by_token(&self, token: &str, field: &str) -> Result<Option<User>> {
        let field = field.parse::<TokenField>().map_err(|other| {
            AppError::Validation(format!(
                "Users can only be looked up by 'personal_token' or 'api_token', not '{}'",
                other
            ))
        })?;
        if token.is_empty() {
            return Ok(None);
        }
        self.store.find_user_by_token(field, token).await
    }

    /// Start the lost-password flow for the only active local user owning `email`.
    pub async fn forget_password(&self, email: &str) -> Result<()> {
        let candidates: Vec<User> = self
            .store
            .find_users_by_email(email)
            .await?
            .into_iter()
            .filter(|u| u.is_active && !u.is_deleted && u.is_local())
            .collect();
        let mut user = match <[User; 1]>::try_from(candidates) {
            Ok([user]) => user,
            Err(candidates) => {
                return Err(AppError::NotFound(format!(
                    "Failed to find a single user for '{}', {} user(s) found.",
                    email,
                    candidates.len()
                )))
            }
        };

        let token = generate_token();
        user.password_forget_token = Some(token.clone());
        user.password_forget_token_date = Some(Utc::now());
        self.store.update_user(&user).await?;

        let delivered = self
            .notifications
            .notify_user(
                NotificationEvent::PasswordForget,
                &user,
                NotificationDetail::ForgetToken(token),
            )
            .await;
        if let Err(e) = delivered {
            // An undelivered token must not stay usable.
            user.password_forget_token = None;
            user.password_forget_token_date = None;
            self.store.update_user(&user).await?;
            return Err(e);
        }
        tracing::info!("Password reset requested for user {}", user.id);
        Ok(())
    }

    pub async fn update_forgotten_password(
        &self,
        token: &str,
        password: &str,
        password2: &str,
    ) -> Result<User> {
        let invalid = || {
            AppError::Validation(
                "Your password reset request has expired or is invalid. Please renew it."
                    .to_string(),
            )
        };
        if token.is_empty() {
            return Err(invalid());
        }
        let mut user = self
            .store
            .find_user_by_forget_token(token)
            .await?
            .ok_or_else(invalid)?;
        let issued = user.password_forget_token_date.ok_or_else(invalid)?;
        if Utc::now() - issued >= Duration::hours(FORGET_TOKEN_LIFETIME_HOURS) {
            return Err(invalid());
        }
        if password.is_empty() {
            return Err(AppError::Validation("A new password is required".to_string()));
        }

        let changed = self
            .apply_password(&mut user, password, Some(password2))
            .await?;
        user.password_forget_token = None;
        user.password_forget_token_date = None;
        self.store.update_user(&user).await?;
        if changed {
            self.clear_expiration_alerts(user.id).await?;
        }
        tracing::info!("Password reset completed for user {}", user.id);
        Ok(user)
    }

    pub async fn blank_password(&self, id: i64) -> Result<()> {
        let mut user = self.get(id).await?;
        user.password = String::new();
        self.store.update_user(&user).await?;
        tracing::info!("Blanked password of user {}", id);
        Ok(())
    }

    /// Active local user matching `login` and `password`, expiry not checked.
    async fn verify_credentials(&self, login: &str, password: &str) -> Result<User> {
        let user = self
            .store
            .get_user_by_name(login)
            .await?
            .filter(|u| u.is_active && !u.is_deleted && u.is_local() && u.has_password())
            .ok_or_else(|| AppError::Authentication(INVALID_CREDENTIALS.to_string()))?;
        if !bcrypt::verify(password, &user.password)? {
            return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
        }
        Ok(user)
    }

    pub async fn authenticate(&self, login: &str, password: &str) -> Result<User> {
        let user = self.verify_credentials(login, password).await?;
        let expiration = self.settings.core_settings().await?.password_expiration;
        if has_password_expired(&user, &expiration, Utc::now()) {
            return Err(AppError::Authentication(
                "Your password has expired. You must change it to be able to login.".to_string(),
            ));
        }
        Ok(user)
    }

    /// Replace an expired password. The current one must still be correct.
    pub async fn change_expired_password(
        &self,
        login: &str,
        current: &str,
        password: &str,
        password2: &str,
    ) -> Result<User> {
        let mut user = self.verify_credentials(login, current).await?;
        if !self
            .apply_password(&mut user, password, Some(password2))
            .await?
        {
            return Err(AppError::Validation(
                "The new password must be different from the current one".to_string(),
            ));
        }
        self.store.update_user(&user).await?;
        self.clear_expiration_alerts(user.id).await?;
        tracing::info!("User {} changed an expired password", user.id);
        Ok(user)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::services::encryption::SecretBox;
    use crate::services::notification_service::RecordingNotifier;

    pub fn user_service(
        store: Arc<dyn Store>,
    ) -> (UserService, Arc<SettingsService>, Arc<RecordingNotifier>) {
        let settings = Arc::new(SettingsService::new(store.clone(), SecretBox::generate()));
        let recorder = Arc::new(RecordingNotifier::default());
        let notifications = Arc::new(NotificationService::new(store.clone(), recorder.clone()));
        let service = UserService::new(store, settings.clone(), notifications, 4);
        (service, settings, recorder)
    }

    pub fn named(name: &str) -> CreateUserRequest {
        CreateUserRequest {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_password(name: &str, password: &str) -> CreateUserRequest {
        CreateUserRequest {
            name: name.to_string(),
            password: Some(password.to_string()),
            password2: Some(password.to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::services::notification_service::{Notification, Notifier};
    use crate::store::memory::MemoryStore;
    use crate::store::ConfigStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn deliver(&self, _: &Notification) -> Result<()> {
            Err(AppError::Notification("smtp.example:587 refused".to_string()))
        }
    }

    fn setup() -> (Arc<dyn Store>, UserService, Arc<SettingsService>) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let (service, settings, _) = user_service(store.clone());
        (store, service, settings)
    }

    async fn set_core(settings: &SettingsService, values: serde_json::Value) {
        let values: BTreeMap<String, serde_json::Value> = serde_json::from_value(values).unwrap();
        settings.update("core", &values).await.unwrap();
    }

    #[tokio::test]
    async fn test_prepare_input_for_add_defaults() {
        let (_, service, _) = setup();
        let prepared = service
            .prepare_input_for_add(&named("prepare_for_add"))
            .await
            .unwrap();
        assert_eq!(prepared.name, "prepare_for_add");
        assert_eq!(prepared.authtype, AuthType::Local);
        assert_eq!(prepared.auths_id, 0);
        assert!(prepared.is_active);
        assert!(!prepared.is_deleted);
        assert_eq!(prepared.entities_id, 0);
        assert_eq!(prepared.profiles_id, 0);
        assert!(prepared.password.is_empty());
        assert_eq!(prepared.password_last_update, None);
    }

    #[tokio::test]
    async fn test_prepare_input_for_add_rejections() {
        let (_, service, _) = setup();

        let mut stopped = named("prepare_for_add");
        stopped.stop_import = true;
        assert!(service.prepare_input_for_add(&stopped).await.is_err());

        match service
            .prepare_input_for_add(&named("invalid+login"))
            .await
            .unwrap_err()
        {
            AppError::Validation(msg) => {
                assert_eq!(msg, "The login is not valid. Unable to add the user.")
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let mismatch = CreateUserRequest {
            name: "user_pass".into(),
            password: Some("password".into()),
            password2: Some("nomatch".into()),
            ..Default::default()
        };
        match service.prepare_input_for_add(&mismatch).await.unwrap_err() {
            AppError::Validation(msg) => assert_eq!(msg, "Error: the two passwords do not match"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_prepare_input_for_add_passwords() {
        let (_, service, _) = setup();

        // An empty password ignores password2.
        let empty = CreateUserRequest {
            name: "user_pass".into(),
            password: Some(String::new()),
            password2: Some("nomatch".into()),
            ..Default::default()
        };
        let prepared = service.prepare_input_for_add(&empty).await.unwrap();
        assert!(prepared.password.is_empty());

        let prepared = service
            .prepare_input_for_add(&with_password("user_pass", "nomatch"))
            .await
            .unwrap();
        assert_eq!(prepared.password.len(), 60);
        assert!(prepared.password.starts_with("$2"));
        assert!(prepared.password_last_update.is_some());

        let mut ext = with_password("user_pass", "mypass");
        ext.extauth = true;
        let prepared = service.prepare_input_for_add(&ext).await.unwrap();
        assert_eq!(prepared.password, "");
        assert!(prepared.password_last_update.is_some());
    }

    #[tokio::test]
    async fn test_add_same_user_twice() {
        let (_, service, _) = setup();
        service.create(named("new_user")).await.unwrap();
        match service.create(named("new_user")).await.unwrap_err() {
            AppError::Conflict(msg) => assert_eq!(msg, "Unable to add. The user already exists."),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_password_policy_applies_on_add() {
        let (_, service, settings) = setup();
        set_core(
            &settings,
            json!({"use_password_security": true, "password_min_length": 8}),
        )
        .await;
        assert!(matches!(
            service
                .create(with_password("weak", "abc"))
                .await
                .unwrap_err(),
            AppError::Validation(_)
        ));
        service
            .create(with_password("strong", "Str0ng!Pass"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_login() {
        let (_, service, _) = setup();
        let user = service.create(named("preupdate_user")).await.unwrap();

        let renamed = UpdateUserRequest {
            name: Some("preupdate_user_edited".into()),
            ..Default::default()
        };
        service.update(user.id, renamed.clone()).await.unwrap();
        // Same login as its own is fine.
        service.update(user.id, renamed).await.unwrap();

        service.create(named("do_exist")).await.unwrap();
        let taken = UpdateUserRequest {
            name: Some("do_exist".into()),
            ..Default::default()
        };
        match service.update(user.id, taken).await.unwrap_err() {
            AppError::Conflict(msg) => {
                assert_eq!(msg, "Unable to update login. A user already exists.")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            service.get(user.id).await.unwrap().name,
            "preupdate_user_edited"
        );

        let invalid = UpdateUserRequest {
            name: Some("in+valid".into()),
            ..Default::default()
        };
        match service.update(user.id, invalid).await.unwrap_err() {
            AppError::Validation(msg) => {
                assert_eq!(msg, "The login is not valid. Unable to update login.")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_password() {
        let (store, service, _) = setup();
        let user = service
            .create(with_password("prepare_for_update", "initial_pass"))
            .await
            .unwrap();
        let initial_hash = user.password.clone();

        // Same password: nothing changes.
        let same = UpdateUserRequest {
            password: Some("initial_pass".into()),
            password2: Some("initial_pass".into()),
            ..Default::default()
        };
        let unchanged = service.update(user.id, same).await.unwrap();
        assert_eq!(unchanged.password, initial_hash);

        let mismatch = UpdateUserRequest {
            password: Some("new_pass".into()),
            password2: Some("new_pass_not_match".into()),
            ..Default::default()
        };
        assert!(matches!(
            service.update(user.id, mismatch).await.unwrap_err(),
            AppError::Validation(_)
        ));

        store
            .insert_alert(USER_ALERT_ITEMTYPE, user.id, AlertKind::PasswordExpiration)
            .await
            .unwrap();
        let changed = UpdateUserRequest {
            password: Some("new_pass".into()),
            password2: Some("new_pass".into()),
            ..Default::default()
        };
        let updated = service.update(user.id, changed).await.unwrap();
        assert_ne!(updated.password, initial_hash);
        assert!(updated.password_last_update >= user.password_last_update);
        assert_eq!(
            store
                .count_alerts(USER_ALERT_ITEMTYPE, AlertKind::PasswordExpiration)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_update_timezone() {
        let (_, service, _) = setup();
        let user = service.create(named("tz_user")).await.unwrap();
        let paris = UpdateUserRequest {
            timezone: Some("Europe/Paris".into()),
            ..Default::default()
        };
        let updated = service.update(user.id, paris).await.unwrap();
        assert_eq!(updated.timezone.as_deref(), Some("Europe/Paris"));

        // Unrelated updates keep it.
        let phone = UpdateUserRequest {
            phone: Some("no.1".into()),
            ..Default::default()
        };
        let updated = service.update(user.id, phone).await.unwrap();
        assert_eq!(updated.timezone.as_deref(), Some("Europe/Paris"));

        let reset = UpdateUserRequest {
            timezone: Some("0".into()),
            ..Default::default()
        };
        assert_eq!(service.update(user.id, reset).await.unwrap().timezone, None);
    }

    #[tokio::test]
    async fn test_default_email() {
        let (_, service, _) = setup();
        let anyone = service.create(named("someone_else")).await.unwrap();
        assert_eq!(service.default_email(anyone.id).await.unwrap(), None);
        assert!(service.all_emails(anyone.id).await.unwrap().is_empty());

        let mut input = named("test_email");
        input.emails = vec!["one@test.com".into()];
        let user = service.create(input).await.unwrap();
        assert_eq!(
            service.default_email(user.id).await.unwrap().as_deref(),
            Some("one@test.com")
        );

        let update = UpdateUserRequest {
            emails: Some(vec!["two@test.com".into()]),
            default_email: Some(0),
            ..Default::default()
        };
        service.update(user.id, update).await.unwrap();
        assert_eq!(
            service.default_email(user.id).await.unwrap().as_deref(),
            Some("two@test.com")
        );
        assert_eq!(service.all_emails(user.id).await.unwrap().len(), 2);
        assert!(service.is_email(user.id, "one@test.com").await.unwrap());
        assert!(!service.is_email(anyone.id, "one@test.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_generate_user_token() {
        let (_, service, _) = setup();
        let user = service.create(named("token_user")).await.unwrap();
        assert_eq!(user.personal_token, None);
        assert_eq!(user.personal_token_date, None);

        let token = service.get_auth_token(user.id).await.unwrap();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));

        let stored = service.get(user.id).await.unwrap();
        assert_eq!(stored.personal_token.as_deref(), Some(token.as_str()));
        assert!(stored.personal_token_date.is_some());
        // Existing token is reused.
        assert_eq!(service.get_auth_token(user.id).await.unwrap(), token);
    }

    #[tokio::test]
    async fn test_get_by_token() {
        let (_, service, _) = setup();
        let user = service.create(named("test_token")).await.unwrap();
        let token = service
            .regenerate_token(user.id, TokenField::ApiToken)
            .await
            .unwrap();

        let found = service
            .get_by_token(&token, "api_token")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
        assert!(service
            .get_by_token(&token, "personal_token")
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            service.get_by_token(&token, "my_field").await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_lost_password() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let (service, _, recorder) = user_service(store.clone());
        let mut input = with_password("tu_user", "tu_pass");
        input.emails = vec!["tu_user@example.com".into()];
        let user = service.create(input).await.unwrap();

        match service
            .forget_password("this-email-does-not-exists@example.com")
            .await
            .unwrap_err()
        {
            AppError::NotFound(msg) => assert_eq!(
                msg,
                "Failed to find a single user for 'this-email-does-not-exists@example.com', 0 user(s) found."
            ),
            other => panic!("unexpected error: {other:?}"),
        }

        service.forget_password("tu_user@example.com").await.unwrap();
        let token = service
            .get(user.id)
            .await
            .unwrap()
            .password_forget_token
            .unwrap();
        assert_eq!(token.len(), TOKEN_LENGTH);
        {
            let sent = recorder.sent.lock().await;
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].event, NotificationEvent::PasswordForget);
            assert!(sent[0].body.contains(&token));
        }

        let bad = format!("{}bad", token);
        assert!(matches!(
            service
                .update_forgotten_password(&bad, "tu_pass", "tu_pass")
                .await
                .unwrap_err(),
            AppError::Validation(_)
        ));

        let updated = service
            .update_forgotten_password(&token, "NewPassword", "NewPassword")
            .await
            .unwrap();
        assert!(bcrypt::verify("NewPassword", &updated.password).unwrap());
        assert_eq!(updated.password_forget_token, None);
        service.authenticate("tu_user", "NewPassword").await.unwrap();
    }

    #[tokio::test]
    async fn test_forget_token_expires_after_a_day() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let (service, _, _) = user_service(store.clone());
        let mut input = with_password("late", "old_pass");
        input.emails = vec!["late@example.com".into()];
        let user = service.create(input).await.unwrap();
        service.forget_password("late@example.com").await.unwrap();

        let mut stored = service.get(user.id).await.unwrap();
        let token = stored.password_forget_token.clone().unwrap();
        stored.password_forget_token_date = Some(Utc::now() - Duration::days(2));
        store.update_user(&stored).await.unwrap();

        assert!(matches!(
            service
                .update_forgotten_password(&token, "new_pass", "new_pass")
                .await
                .unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_blank_password() {
        let (_, service, _) = setup();
        let user = service
            .create(with_password("myname", "mypass"))
            .await
            .unwrap();
        assert_eq!(user.password.len(), 60);

        service.blank_password(user.id).await.unwrap();
        let stored = service.get(user.id).await.unwrap();
        assert_eq!(stored.name, "myname");
        assert_eq!(stored.password, "");
    }

    #[tokio::test]
    async fn test_id_by_name_and_field() {
        let (_, service, _) = setup();
        let user = service.create(named("id_by_name")).await.unwrap();
        assert_eq!(
            service.id_by_name("id_by_name").await.unwrap(),
            Some(user.id)
        );

        let mut input = named("id_by_field");
        input.phone = Some("+33123456789".into());
        let first = service.create(input).await.unwrap();
        assert_eq!(
            service
                .id_by_field(UserLookupField::Phone, "+33123456789")
                .await
                .unwrap(),
            Some(first.id)
        );

        let mut input = named("id_by_field2");
        input.phone = Some("+33123456789".into());
        service.create(input).await.unwrap();
        assert_eq!(
            service
                .id_by_field(UserLookupField::Phone, "+33123456789")
                .await
                .unwrap(),
            None
        );
        assert_eq!(
            service
                .id_by_field(UserLookupField::Phone, "donotexists")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_authenticate_and_expired_password() {
        let (store, service, settings) = setup();
        let user = service
            .create(with_password("expiring", "secret_pass"))
            .await
            .unwrap();
        service.authenticate("expiring", "secret_pass").await.unwrap();
        assert!(matches!(
            service
                .authenticate("expiring", "wrong")
                .await
                .unwrap_err(),
            AppError::Authentication(_)
        ));

        set_core(&settings, json!({"password_expiration_delay": 15})).await;
        let mut stored = service.get(user.id).await.unwrap();
        stored.password_last_update = Some(Utc::now() - Duration::days(20));
        store.update_user(&stored).await.unwrap();

        match service
            .authenticate("expiring", "secret_pass")
            .await
            .unwrap_err()
        {
            AppError::Authentication(msg) => assert!(msg.starts_with("Your password has expired")),
            other => panic!("unexpected error: {other:?}"),
        }

        service
            .change_expired_password("expiring", "secret_pass", "fresh_pass", "fresh_pass")
            .await
            .unwrap();
        service.authenticate("expiring", "fresh_pass").await.unwrap();
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_authenticate() {
        let (_, service, _) = setup();
        let mut input = with_password("sleeping", "secret_pass");
        input.is_active = Some(false);
        service.create(input).await.unwrap();
        assert!(matches!(
            service
                .authenticate("sleeping", "secret_pass")
                .await
                .unwrap_err(),
            AppError::Authentication(_)
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_delay_does_not_block_login() {
        let (store, service, _) = setup();
        service
            .create(with_password("alice", "secret_pass"))
            .await
            .unwrap();
        // Stored below the settings service, which rejects such values.
        store
            .set_config_value("core", "password_expiration_delay", "2147483647")
            .await
            .unwrap();
        store
            .set_config_value("core", "password_expiration_notice", "2147483647")
            .await
            .unwrap();
        service.authenticate("alice", "secret_pass").await.unwrap();
    }

    #[tokio::test]
    async fn test_undelivered_forget_token_is_cleared() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let settings = Arc::new(SettingsService::new(
            store.clone(),
            crate::services::encryption::SecretBox::generate(),
        ));
        let notifications = Arc::new(NotificationService::new(
            store.clone(),
            Arc::new(FailingNotifier),
        ));
        let service = UserService::new(store.clone(), settings, notifications, 4);
        let mut input = with_password("unlucky", "secret_pass");
        input.emails = vec!["unlucky@example.com".into()];
        let user = service.create(input).await.unwrap();

        assert!(matches!(
            service
                .forget_password("unlucky@example.com")
                .await
                .unwrap_err(),
            AppError::Notification(_)
        ));
        let stored = service.get(user.id).await.unwrap();
        assert_eq!(stored.password_forget_token, None);
        assert_eq!(stored.password_forget_token_date, None);
    }

    #[tokio::test]
    async fn test_get_by_name_and_auth() {
        let (_, service, _) = setup();
        let mut input = named("user_with_auth");
        input.authtype = Some(AuthType::Local);
        input.auths_id = Some(12);
        let user = service.create(input).await.unwrap();

        let found = service
            .get_by_name_and_auth("user_with_auth", AuthType::Local, 12)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.name, "user_with_auth");

        assert!(service
            .get_by_name_and_auth("user_with_auth", AuthType::Local, 3)
            .await
            .unwrap()
            .is_none());
        assert!(service
            .get_by_name_and_auth("user_with_auth", AuthType::Ldap, 12)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_friendly_name() {
        let (_, service, _) = setup();
        let cases = [
            ("myname", None, None, "myname"),
            ("anothername", Some("real name"), None, "real name"),
            ("yet another name", None, Some("first name"), "yet another name"),
            (
                "yet another one",
                Some("real name"),
                Some("first name"),
                "real name first name",
            ),
        ];
        for (name, realname, firstname, expected) in cases {
            let mut input = named(name);
            input.realname = realname.map(str::to_string);
            input.firstname = firstname.map(str::to_string);
            let user = service.create(input).await.unwrap();
            let stored = service.get(user.id).await.unwrap();
            assert_eq!(stored.friendly_name(), expected);
        }
    }

    #[tokio::test]
    async fn test_clone_user() {
        let (_, service, _) = setup();
        let mut input = with_password("original", "secret_pass");
        input.realname = Some("Doe".into());
        input.firstname = Some("Jane".into());
        input.profiles_id = Some(4);
        input.entities_id = Some(2);
        input.timezone = Some("Europe/Paris".into());
        let source = service.create(input).await.unwrap();
        service
            .regenerate_token(source.id, TokenField::ApiToken)
            .await
            .unwrap();

        let before = Utc::now();
        let copy = service.clone_user(source.id).await.unwrap();
        assert_ne!(copy.id, source.id);
        assert_eq!(copy.name, "original (copy)");
        assert!(copy.date_creation >= before);
        assert!(copy.date_mod >= before);
        assert_eq!(copy.realname, source.realname);
        assert_eq!(copy.firstname, source.firstname);
        assert_eq!(copy.password, source.password);
        assert_eq!(copy.password_last_update, source.password_last_update);
        assert_eq!(copy.authtype, source.authtype);
        assert_eq!(copy.profiles_id, 4);
        assert_eq!(copy.entities_id, 2);
        assert_eq!(copy.timezone, source.timezone);
        assert_eq!(copy.api_token, None);

        let second = service.clone_user(source.id).await.unwrap();
        assert_eq!(second.name, "original (copy 2)");
    }
}
