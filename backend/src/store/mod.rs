//! Repository layer.
//!
//! Services never talk to SQL directly: they go through the per-aggregate
//! traits below. `postgres::PgStore` backs production, `memory::MemoryStore`
//! backs tests and database-less demo runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::Result;
use crate::models::alert::AlertKind;
use crate::models::appliance::ApplianceItem;
use crate::models::asset::{Asset, CreateAssetRequest, UpdateAssetRequest};
use crate::models::cron_task::{CronState, CronTask, CronTaskDefinition, CronTaskLog};
use crate::models::document_type::{CreateDocumentTypeRequest, DocumentType};
use crate::models::impact_relation::ImpactRelation;
use crate::models::itemtype::{ItemRef, ItemType};
use crate::models::line_operator::LineOperator;
use crate::models::network_port::{NetworkPort, NewNetworkPort};
use crate::models::software::{SoftwareInstallation, SoftwareVersion};
use crate::models::user::{NewUser, TokenField, User, UserEmail, UserLookupField};

/// Rows removed alongside a purged asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PurgeSummary {
    pub network_ports: u64,
    pub impact_relations: u64,
    pub appliance_items: u64,
    pub software_installations: u64,
    pub software_versions: u64,
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn insert_asset(&self, input: &CreateAssetRequest) -> Result<Asset>;
    async fn get_asset(&self, id: i64) -> Result<Option<Asset>>;
    /// Asset with the given id *and* type.
    async fn find_asset(&self, item: ItemRef) -> Result<Option<Asset>>;
    async fn list_assets(
        &self,
        itemtype: Option<ItemType>,
        include_deleted: bool,
    ) -> Result<Vec<Asset>>;
    async fn update_asset(&self, id: i64, input: &UpdateAssetRequest) -> Result<Option<Asset>>;
    async fn set_asset_deleted(&self, id: i64, is_deleted: bool) -> Result<bool>;
    /// Hard-delete the asset and every relation row pointing at it, atomically.
    async fn purge_asset(&self, item: ItemRef) -> Result<PurgeSummary>;
    /// Non-deleted asset count per type.
    async fn count_assets_by_type(&self) -> Result<Vec<(ItemType, i64)>>;
}

#[async_trait]
pub trait LineOperatorStore: Send + Sync {
    async fn count_line_operators_with_codes(
        &self,
        mcc: i32,
        mnc: i32,
        exclude_id: Option<i64>,
    ) -> Result<i64>;
    async fn insert_line_operator(
        &self,
        name: &str,
        comment: Option<&str>,
        mcc: i32,
        mnc: i32,
        entities_id: i64,
    ) -> Result<LineOperator>;
    async fn update_line_operator(&self, operator: &LineOperator) -> Result<()>;
    async fn get_line_operator(&self, id: i64) -> Result<Option<LineOperator>>;
    async fn list_line_operators(&self) -> Result<Vec<LineOperator>>;
    async fn delete_line_operator(&self, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait NetworkPortStore: Send + Sync {
    async fn insert_network_port(&self, port: &NewNetworkPort) -> Result<NetworkPort>;
    async fn get_network_port(&self, id: i64) -> Result<Option<NetworkPort>>;
    async fn list_network_ports_for_item(&self, item: ItemRef) -> Result<Vec<NetworkPort>>;
    async fn count_network_ports_for_item(&self, item: ItemRef) -> Result<i64>;
    async fn delete_network_port(&self, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait ImpactStore: Send + Sync {
    async fn find_impact_relation(&self, source: ItemRef, impacted: ItemRef)
        -> Result<Option<i64>>;
    async fn insert_impact_relation(
        &self,
        source: ItemRef,
        impacted: ItemRef,
    ) -> Result<ImpactRelation>;
    /// Relations where the item is either the source or the impacted side.
    async fn list_impact_relations_for_item(&self, item: ItemRef) -> Result<Vec<ImpactRelation>>;
    async fn delete_impact_relation(&self, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait ApplianceStore: Send + Sync {
    async fn find_appliance_item(&self, appliances_id: i64, item: ItemRef) -> Result<Option<i64>>;
    async fn insert_appliance_item(&self, appliances_id: i64, item: ItemRef)
        -> Result<ApplianceItem>;
    async fn list_appliance_items(&self, appliances_id: i64) -> Result<Vec<ApplianceItem>>;
    async fn count_appliance_items(&self, appliances_id: i64, itemtypes: &[ItemType])
        -> Result<i64>;
    async fn delete_appliance_item(&self, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait SoftwareStore: Send + Sync {
    async fn insert_software_version(
        &self,
        softwares_id: i64,
        name: &str,
        arch: Option<&str>,
    ) -> Result<SoftwareVersion>;
    async fn get_software_version(&self, id: i64) -> Result<Option<SoftwareVersion>>;
    async fn list_software_versions(&self, softwares_id: i64) -> Result<Vec<SoftwareVersion>>;
    async fn insert_software_installation(
        &self,
        softwareversions_id: i64,
        item: ItemRef,
    ) -> Result<SoftwareInstallation>;
    async fn list_software_installations(
        &self,
        softwareversions_id: i64,
    ) -> Result<Vec<SoftwareInstallation>>;
    /// Versions no asset has installed, oldest first.
    async fn list_versions_without_installation(&self, limit: i64)
        -> Result<Vec<SoftwareVersion>>;
    async fn delete_software_version(&self, id: i64) -> Result<bool>;
    /// Non-deleted software assets with no version at all, oldest first.
    async fn list_software_without_versions(&self, limit: i64) -> Result<Vec<Asset>>;
}

#[async_trait]
pub trait DocumentTypeStore: Send + Sync {
    async fn insert_document_type(&self, input: &CreateDocumentTypeRequest)
        -> Result<DocumentType>;
    async fn list_document_types(&self) -> Result<Vec<DocumentType>>;
    async fn delete_all_document_types(&self) -> Result<u64>;
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Raw `(name, value)` pairs of a context, as stored.
    async fn get_config_values(&self, context: &str) -> Result<Vec<(String, String)>>;
    async fn set_config_value(&self, context: &str, name: &str, value: &str) -> Result<()>;
}

#[async_trait]
pub trait CronStore: Send + Sync {
    /// Insert the task unless one with the same name exists. Returns true when inserted.
    async fn register_cron_task(&self, definition: &CronTaskDefinition) -> Result<bool>;
    async fn get_cron_task(&self, name: &str) -> Result<Option<CronTask>>;
    async fn list_cron_tasks(&self) -> Result<Vec<CronTask>>;
    async fn update_cron_task(&self, task: &CronTask) -> Result<()>;
    /// Move a task to `Running` unless it already is. Returns false when it was running.
    async fn claim_cron_task(&self, id: i64) -> Result<bool>;
    async fn release_cron_task(
        &self,
        id: i64,
        state: CronState,
        lastrun: DateTime<Utc>,
    ) -> Result<()>;
    async fn insert_cron_log(
        &self,
        crontasks_id: i64,
        status: i32,
        elapsed: f64,
        volume: i64,
        content: &str,
    ) -> Result<()>;
    async fn list_cron_logs(&self, crontasks_id: i64, limit: i64) -> Result<Vec<CronTaskLog>>;
    async fn prune_cron_logs(&self, crontasks_id: i64, before: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn insert_alert(&self, itemtype: &str, items_id: i64, kind: AlertKind) -> Result<()>;
    async fn delete_alerts(&self, itemtype: &str, items_id: i64, kind: AlertKind) -> Result<u64>;
    async fn count_alerts(&self, itemtype: &str, kind: AlertKind) -> Result<i64>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &NewUser) -> Result<User>;
    async fn get_user(&self, id: i64) -> Result<Option<User>>;
    async fn get_user_by_name(&self, name: &str) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    /// Persist every mutable column of the user and bump `date_mod`.
    async fn update_user(&self, user: &User) -> Result<()>;
    async fn delete_user(&self, id: i64) -> Result<bool>;
    async fn find_user_ids_by_field(&self, field: UserLookupField, value: &str)
        -> Result<Vec<i64>>;
    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>>;
    async fn find_user_by_token(&self, field: TokenField, token: &str) -> Result<Option<User>>;
    async fn find_user_by_forget_token(&self, token: &str) -> Result<Option<User>>;
    async fn add_user_email(&self, users_id: i64, email: &str, is_default: bool)
        -> Result<UserEmail>;
    async fn list_user_emails(&self, users_id: i64) -> Result<Vec<UserEmail>>;
    async fn set_default_user_email(&self, users_id: i64, email_id: i64) -> Result<()>;
    /// Deactivate active local users whose password was last set before `cutoff`.
    /// Returns the deactivated users.
    async fn lock_users_with_password_before(&self, cutoff: DateTime<Utc>)
        -> Result<Vec<User>>;
    /// Active local users whose password was last set before `cutoff` and who
    /// have no alert of `kind` yet, oldest password first.
    async fn list_users_with_password_before(
        &self,
        cutoff: DateTime<Utc>,
        without_alert: AlertKind,
        limit: i64,
    ) -> Result<Vec<User>>;
    async fn count_users_with_password_before(
        &self,
        cutoff: DateTime<Utc>,
        without_alert: AlertKind,
    ) -> Result<i64>;
    async fn count_users(&self) -> Result<i64>;
}

/// Everything the services need from persistence.
pub trait Store:
    AssetStore
    + LineOperatorStore
    + NetworkPortStore
    + ImpactStore
    + ApplianceStore
    + SoftwareStore
    + DocumentTypeStore
    + ConfigStore
    + CronStore
    + AlertStore
    + UserStore
{
}

impl<T> Store for T where
    T: AssetStore
        + LineOperatorStore
        + NetworkPortStore
        + ImpactStore
        + ApplianceStore
        + SoftwareStore
        + DocumentTypeStore
        + ConfigStore
        + CronStore
        + AlertStore
        + UserStore
{
}
