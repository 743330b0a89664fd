//! User accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How a user authenticates. Values match the persisted `authtype` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// Password stored and managed locally.
    Local,
    Mail,
    Ldap,
    External,
    Cas,
    X509,
    Api,
    Cookie,
}

impl AuthType {
    pub fn code(&self) -> i32 {
        match self {
            AuthType::Local => 1,
            AuthType::Mail => 2,
            AuthType::Ldap => 3,
            AuthType::External => 4,
            AuthType::Cas => 5,
            AuthType::X509 => 6,
            AuthType::Api => 7,
            AuthType::Cookie => 8,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown authentication type {0}")]
pub struct UnknownAuthType(pub i32);

impl TryFrom<i32> for AuthType {
    type Error = UnknownAuthType;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => AuthType::Local,
            2 => AuthType::Mail,
            3 => AuthType::Ldap,
            4 => AuthType::External,
            5 => AuthType::Cas,
            6 => AuthType::X509,
            7 => AuthType::Api,
            8 => AuthType::Cookie,
            other => return Err(UnknownAuthType(other)),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct User {
    pub id: i64,
    /// Login
    pub name: String,
    pub realname: Option<String>,
    pub firstname: Option<String>,
    pub phone: Option<String>,
    /// bcrypt hash, or empty when no local password is set
    #[serde(skip_serializing, default)]
    pub password: String,
    pub password_last_update: Option<DateTime<Utc>>,
    #[serde(skip_serializing, default)]
    pub password_forget_token: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_forget_token_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing, default)]
    pub personal_token: Option<String>,
    pub personal_token_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing, default)]
    pub api_token: Option<String>,
    pub api_token_date: Option<DateTime<Utc>>,
    #[sqlx(try_from = "i32")]
    pub authtype: AuthType,
    pub auths_id: i64,
    pub is_active: bool,
    pub is_deleted: bool,
    pub entities_id: i64,
    pub profiles_id: i64,
    pub timezone: Option<String>,
    pub date_creation: DateTime<Utc>,
    pub date_mod: DateTime<Utc>,
}

impl User {
    pub fn is_local(&self) -> bool {
        self.authtype == AuthType::Local
    }

    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    /// `realname firstname` when a real name is known, the login otherwise.
    pub fn friendly_name(&self) -> String {
        let realname = self.realname.as_deref().map(str::trim).unwrap_or_default();
        if realname.is_empty() {
            return self.name.clone();
        }
        match self.firstname.as_deref().map(str::trim) {
            Some(firstname) if !firstname.is_empty() => format!("{} {}", realname, firstname),
            _ => realname.to_string(),
        }
    }
}

/// Validated row ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub realname: Option<String>,
    pub firstname: Option<String>,
    pub phone: Option<String>,
    pub password: String,
    pub password_last_update: Option<DateTime<Utc>>,
    pub authtype: AuthType,
    pub auths_id: i64,
    pub is_active: bool,
    pub is_deleted: bool,
    pub entities_id: i64,
    pub profiles_id: i64,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct UserEmail {
    pub id: i64,
    pub users_id: i64,
    pub email: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub name: String,
    pub password: Option<String>,
    pub password2: Option<String>,
    pub realname: Option<String>,
    pub firstname: Option<String>,
    pub phone: Option<String>,
    pub authtype: Option<AuthType>,
    pub auths_id: Option<i64>,
    pub is_active: Option<bool>,
    pub entities_id: Option<i64>,
    pub profiles_id: Option<i64>,
    pub timezone: Option<String>,
    #[serde(default)]
    pub emails: Vec<String>,
    /// Index into `emails` of the default address.
    pub default_email: Option<usize>,
    /// Set by importers to abort the creation.
    #[serde(default)]
    pub stop_import: bool,
    /// Password is managed by an external authentication source.
    #[serde(default)]
    pub extauth: bool,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub password: Option<String>,
    pub password2: Option<String>,
    pub realname: Option<String>,
    pub firstname: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
    pub profiles_id: Option<i64>,
    pub entities_id: Option<i64>,
    pub timezone: Option<String>,
    pub password_last_update: Option<DateTime<Utc>>,
    /// Addresses to add to the user.
    pub emails: Option<Vec<String>>,
    /// Index into `emails` of the new default address.
    pub default_email: Option<usize>,
}

/// Lookup fields accepted by token authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TokenField {
    PersonalToken,
    ApiToken,
}

impl TokenField {
    pub fn column(&self) -> &'static str {
        match self {
            TokenField::PersonalToken => "personal_token",
            TokenField::ApiToken => "api_token",
        }
    }
}

impl std::str::FromStr for TokenField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal_token" => Ok(TokenField::PersonalToken),
            "api_token" => Ok(TokenField::ApiToken),
            other => Err(other.to_string()),
        }
    }
}

/// Columns usable with `id_by_field`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserLookupField {
    Phone,
    Realname,
    Firstname,
}

impl UserLookupField {
    pub fn column(&self) -> &'static str {
        match self {
            UserLookupField::Phone => "phone",
            UserLookupField::Realname => "realname",
            UserLookupField::Firstname => "firstname",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_type_codes_roundtrip() {
        for code in 1..=8 {
            let t = AuthType::try_from(code).unwrap();
            assert_eq!(t.code(), code);
        }
        assert!(AuthType::try_from(0).is_err());
    }

    #[test]
    fn test_token_field_parse() {
        assert_eq!(
            "api_token".parse::<TokenField>().unwrap(),
            TokenField::ApiToken
        );
        assert!("my_field".parse::<TokenField>().is_err());
    }

    #[test]
    fn test_user_json_hides_secrets() {
        let now = Utc::now();
        let user = User {
            id: 1,
            name: "glpi".into(),
            realname: None,
            firstname: None,
            phone: None,
            password: "$2b$04$hash".into(),
            password_last_update: Some(now),
            password_forget_token: Some("forget".into()),
            password_forget_token_date: None,
            personal_token: Some("personal".into()),
            personal_token_date: None,
            api_token: Some("api".into()),
            api_token_date: None,
            authtype: AuthType::Local,
            auths_id: 0,
            is_active: true,
            is_deleted: false,
            entities_id: 0,
            profiles_id: 4,
            timezone: None,
            date_creation: now,
            date_mod: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("personal_token").is_none());
        assert!(json.get("api_token").is_none());
        assert!(json.get("password_forget_token").is_none());
        assert_eq!(json["authtype"], "local");
    }
}
