//! In-process store backed by plain collections behind a `RwLock`.
//!
//! Mirrors the PostgreSQL store's semantics (including cascade purges and
//! unique indexes) so services can be tested without a database, and so the
//! binary can run with `STORE_BACKEND=memory`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    AlertStore, ApplianceStore, AssetStore, ConfigStore, CronStore, DocumentTypeStore,
    ImpactStore, LineOperatorStore, NetworkPortStore, PurgeSummary, SoftwareStore, UserStore,
};
use crate::error::{AppError, Result};
use crate::models::alert::{AlertKind, USER_ALERT_ITEMTYPE};
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

#[derive(Debug, Clone)]
struct AlertRow {
    itemtype: String,
    items_id: i64,
    kind: i32,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    assets: BTreeMap<i64, Asset>,
    line_operators: BTreeMap<i64, LineOperator>,
    network_ports: BTreeMap<i64, NetworkPort>,
    impact_relations: BTreeMap<i64, ImpactRelation>,
    appliance_items: BTreeMap<i64, ApplianceItem>,
    software_versions: BTreeMap<i64, SoftwareVersion>,
    software_installations: BTreeMap<i64, SoftwareInstallation>,
    document_types: BTreeMap<i64, DocumentType>,
    configs: BTreeMap<(String, String), String>,
    cron_tasks: BTreeMap<i64, CronTask>,
    cron_logs: BTreeMap<i64, CronTaskLog>,
    alerts: BTreeMap<i64, AlertRow>,
    users: BTreeMap<i64, User>,
    user_emails: BTreeMap<i64, UserEmail>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn is_expiring_user(user: &User, cutoff: DateTime<Utc>) -> bool {
        user.is_local()
            && user.is_active
            && !user.is_deleted
            && user.password_last_update.map(|d| d < cutoff).unwrap_or(false)
    }

    fn has_alert(&self, itemtype: &str, items_id: i64, kind: AlertKind) -> bool {
        self.alerts
            .values()
            .any(|a| a.itemtype == itemtype && a.items_id == items_id && a.kind == kind.code())
    }
}

/// Store keeping every table in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    /// Makes `insert_cron_log` fail, to exercise error paths.
    #[cfg(test)]
    fail_cron_logs: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn fail_cron_logs(&self, fail: bool) {
        self.fail_cron_logs
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl AssetStore for MemoryStore {
    async fn insert_asset(&self, input: &CreateAssetRequest) -> Result<Asset> {
        let mut t = self.tables.write().await;
        let id = t.next_id();
        let now = Utc::now();
        let asset = Asset {
            id,
            itemtype: input.itemtype,
            name: input.name.clone(),
            entities_id: input.entities_id,
            serial: input.serial.clone(),
            otherserial: input.otherserial.clone(),
            comment: input.comment.clone(),
            is_deleted: false,
            date_creation: now,
            date_mod: now,
        };
        t.assets.insert(id, asset.clone());
        Ok(asset)
    }

    async fn get_asset(&self, id: i64) -> Result<Option<Asset>> {
        Ok(self.tables.read().await.assets.get(&id).cloned())
    }

    async fn find_asset(&self, item: ItemRef) -> Result<Option<Asset>> {
        Ok(self
            .tables
            .read()
            .await
            .assets
            .get(&item.items_id)
            .filter(|a| a.itemtype == item.itemtype)
            .cloned())
    }

    async fn list_assets(
        &self,
        itemtype: Option<ItemType>,
        include_deleted: bool,
    ) -> Result<Vec<Asset>> {
        let t = self.tables.read().await;
        let mut assets: Vec<Asset> = t
            .assets
            .values()
            .filter(|a| itemtype.map(|it| a.itemtype == it).unwrap_or(true))
            .filter(|a| include_deleted || !a.is_deleted)
            .cloned()
            .collect();
        assets.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(assets)
    }

    async fn update_asset(&self, id: i64, input: &UpdateAssetRequest) -> Result<Option<Asset>> {
        let mut t = self.tables.write().await;
        let Some(asset) = t.assets.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &input.name {
            asset.name = name.clone();
        }
        if let Some(entities_id) = input.entities_id {
            asset.entities_id = entities_id;
        }
        if input.serial.is_some() {
            asset.serial = input.serial.clone();
        }
        if input.otherserial.is_some() {
            asset.otherserial = input.otherserial.clone();
        }
        if input.comment.is_some() {
            asset.comment = input.comment.clone();
        }
        asset.date_mod = Utc::now();
        Ok(Some(asset.clone()))
    }

    async fn set_asset_deleted(&self, id: i64, is_deleted: bool) -> Result<bool> {
        let mut t = self.tables.write().await;
        match t.assets.get_mut(&id) {
            Some(asset) => {
                asset.is_deleted = is_deleted;
                asset.date_mod = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge_asset(&self, item: ItemRef) -> Result<PurgeSummary> {
        let mut t = self.tables.write().await;
        let exists = t
            .assets
            .get(&item.items_id)
            .map(|a| a.itemtype == item.itemtype)
            .unwrap_or(false);
        if !exists {
            return Err(AppError::NotFound(format!("{} not found", item)));
        }
        let mut summary = PurgeSummary::default();

        let before = t.network_ports.len();
        t.network_ports.retain(|_, p| p.owner() != item);
        summary.network_ports = (before - t.network_ports.len()) as u64;

        let before = t.impact_relations.len();
        t.impact_relations
            .retain(|_, r| r.source() != item && r.impacted() != item);
        summary.impact_relations = (before - t.impact_relations.len()) as u64;

        let before = t.appliance_items.len();
        t.appliance_items.retain(|_, ai| {
            ai.item() != item
                && !(item.itemtype == ItemType::Appliance && ai.appliances_id == item.items_id)
        });
        summary.appliance_items = (before - t.appliance_items.len()) as u64;

        if item.itemtype == ItemType::Software {
            let versions: Vec<i64> = t
                .software_versions
                .values()
                .filter(|v| v.softwares_id == item.items_id)
                .map(|v| v.id)
                .collect();
            let before = t.software_installations.len();
            t.software_installations
                .retain(|_, i| !versions.contains(&i.softwareversions_id));
            summary.software_installations += (before - t.software_installations.len()) as u64;
            for id in &versions {
                t.software_versions.remove(id);
            }
            summary.software_versions = versions.len() as u64;
        }

        let before = t.software_installations.len();
        t.software_installations
            .retain(|_, i| !(i.itemtype == item.itemtype && i.items_id == item.items_id));
        summary.software_installations += (before - t.software_installations.len()) as u64;

        t.assets.remove(&item.items_id);
        Ok(summary)
    }

    async fn count_assets_by_type(&self) -> Result<Vec<(ItemType, i64)>> {
        let t = self.tables.read().await;
        let mut counts: BTreeMap<ItemType, i64> = BTreeMap::new();
        for asset in t.assets.values().filter(|a| !a.is_deleted) {
            *counts.entry(asset.itemtype).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[async_trait]
impl LineOperatorStore for MemoryStore {
    async fn count_line_operators_with_codes(
        &self,
        mcc: i32,
        mnc: i32,
        exclude_id: Option<i64>,
    ) -> Result<i64> {
        let t = self.tables.read().await;
        Ok(t.line_operators
            .values()
            .filter(|o| o.mcc == mcc && o.mnc == mnc && Some(o.id) != exclude_id)
            .count() as i64)
    }

    async fn insert_line_operator(
        &self,
        name: &str,
        comment: Option<&str>,
        mcc: i32,
        mnc: i32,
        entities_id: i64,
    ) -> Result<LineOperator> {
        let mut t = self.tables.write().await;
        if t.line_operators.values().any(|o| o.mcc == mcc && o.mnc == mnc) {
            return Err(AppError::Conflict(
                "Mobile country code and network code combination must be unique!".to_string(),
            ));
        }
        let id = t.next_id();
        let operator = LineOperator {
            id,
            name: name.to_string(),
            comment: comment.map(str::to_string),
            mcc,
            mnc,
            entities_id,
        };
        t.line_operators.insert(id, operator.clone());
        Ok(operator)
    }

    async fn update_line_operator(&self, operator: &LineOperator) -> Result<()> {
        let mut t = self.tables.write().await;
        if !t.line_operators.contains_key(&operator.id) {
            return Err(AppError::NotFound(format!(
                "Line operator {} not found",
                operator.id
            )));
        }
        t.line_operators.insert(operator.id, operator.clone());
        Ok(())
    }

    async fn get_line_operator(&self, id: i64) -> Result<Option<LineOperator>> {
        Ok(self.tables.read().await.line_operators.get(&id).cloned())
    }

    async fn list_line_operators(&self) -> Result<Vec<LineOperator>> {
        let t = self.tables.read().await;
        let mut operators: Vec<LineOperator> = t.line_operators.values().cloned().collect();
        operators.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(operators)
    }

    async fn delete_line_operator(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.line_operators.remove(&id).is_some())
    }
}

#[async_trait]
impl NetworkPortStore for MemoryStore {
    async fn insert_network_port(&self, port: &NewNetworkPort) -> Result<NetworkPort> {
        let mut t = self.tables.write().await;
        let id = t.next_id();
        let row = NetworkPort {
            id,
            itemtype: port.owner.itemtype,
            items_id: port.owner.items_id,
            entities_id: port.entities_id,
            logical_number: port.logical_number,
            name: port.name.clone(),
            instantiation_type: port.instantiation_type,
            mac: port.mac.clone(),
        };
        t.network_ports.insert(id, row.clone());
        Ok(row)
    }

    async fn get_network_port(&self, id: i64) -> Result<Option<NetworkPort>> {
        Ok(self.tables.read().await.network_ports.get(&id).cloned())
    }

    async fn list_network_ports_for_item(&self, item: ItemRef) -> Result<Vec<NetworkPort>> {
        let t = self.tables.read().await;
        let mut ports: Vec<NetworkPort> = t
            .network_ports
            .values()
            .filter(|p| p.owner() == item)
            .cloned()
            .collect();
        ports.sort_by_key(|p| (p.logical_number, p.id));
        Ok(ports)
    }

    async fn count_network_ports_for_item(&self, item: ItemRef) -> Result<i64> {
        let t = self.tables.read().await;
        Ok(t.network_ports.values().filter(|p| p.owner() == item).count() as i64)
    }

    async fn delete_network_port(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.network_ports.remove(&id).is_some())
    }
}

#[async_trait]
impl ImpactStore for MemoryStore {
    async fn find_impact_relation(
        &self,
        source: ItemRef,
        impacted: ItemRef,
    ) -> Result<Option<i64>> {
        let t = self.tables.read().await;
        Ok(t.impact_relations
            .values()
            .find(|r| r.source() == source && r.impacted() == impacted)
            .map(|r| r.id))
    }

    async fn insert_impact_relation(
        &self,
        source: ItemRef,
        impacted: ItemRef,
    ) -> Result<ImpactRelation> {
        let mut t = self.tables.write().await;
        if t.impact_relations
            .values()
            .any(|r| r.source() == source && r.impacted() == impacted)
        {
            return Err(AppError::Conflict(
                "This impact relation already exists".to_string(),
            ));
        }
        let id = t.next_id();
        let relation = ImpactRelation {
            id,
            itemtype_source: source.itemtype,
            items_id_source: source.items_id,
            itemtype_impacted: impacted.itemtype,
            items_id_impacted: impacted.items_id,
        };
        t.impact_relations.insert(id, relation.clone());
        Ok(relation)
    }

    async fn list_impact_relations_for_item(&self, item: ItemRef) -> Result<Vec<ImpactRelation>> {
        let t = self.tables.read().await;
        Ok(t.impact_relations
            .values()
            .filter(|r| r.source() == item || r.impacted() == item)
            .cloned()
            .collect())
    }

    async fn delete_impact_relation(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.impact_relations.remove(&id).is_some())
    }
}

#[async_trait]
impl ApplianceStore for MemoryStore {
    async fn find_appliance_item(&self, appliances_id: i64, item: ItemRef) -> Result<Option<i64>> {
        let t = self.tables.read().await;
        Ok(t.appliance_items
            .values()
            .find(|ai| ai.appliances_id == appliances_id && ai.item() == item)
            .map(|ai| ai.id))
    }

    async fn insert_appliance_item(
        &self,
        appliances_id: i64,
        item: ItemRef,
    ) -> Result<ApplianceItem> {
        let mut t = self.tables.write().await;
        if t.appliance_items
            .values()
            .any(|ai| ai.appliances_id == appliances_id && ai.item() == item)
        {
            return Err(AppError::Conflict(
                "This item is already attached to the appliance".to_string(),
            ));
        }
        let id = t.next_id();
        let row = ApplianceItem {
            id,
            appliances_id,
            itemtype: item.itemtype,
            items_id: item.items_id,
        };
        t.appliance_items.insert(id, row.clone());
        Ok(row)
    }

    async fn list_appliance_items(&self, appliances_id: i64) -> Result<Vec<ApplianceItem>> {
        let t = self.tables.read().await;
        Ok(t.appliance_items
            .values()
            .filter(|ai| ai.appliances_id == appliances_id)
            .cloned()
            .collect())
    }

    async fn count_appliance_items(
        &self,
        appliances_id: i64,
        itemtypes: &[ItemType],
    ) -> Result<i64> {
        let t = self.tables.read().await;
        Ok(t.appliance_items
            .values()
            .filter(|ai| ai.appliances_id == appliances_id && itemtypes.contains(&ai.itemtype))
            .count() as i64)
    }

    async fn delete_appliance_item(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.appliance_items.remove(&id).is_some())
    }
}

#[async_trait]
impl SoftwareStore for MemoryStore {
    async fn insert_software_version(
        &self,
        softwares_id: i64,
        name: &str,
        arch: Option<&str>,
    ) -> Result<SoftwareVersion> {
        let mut t = self.tables.write().await;
        let id = t.next_id();
        let version = SoftwareVersion {
            id,
            softwares_id,
            name: name.to_string(),
            arch: arch.map(str::to_string),
        };
        t.software_versions.insert(id, version.clone());
        Ok(version)
    }

    async fn get_software_version(&self, id: i64) -> Result<Option<SoftwareVersion>> {
        Ok(self.tables.read().await.software_versions.get(&id).cloned())
    }

    async fn list_software_versions(&self, softwares_id: i64) -> Result<Vec<SoftwareVersion>> {
        let t = self.tables.read().await;
        Ok(t.software_versions
            .values()
            .filter(|v| v.softwares_id == softwares_id)
            .cloned()
            .collect())
    }

    async fn insert_software_installation(
        &self,
        softwareversions_id: i64,
        item: ItemRef,
    ) -> Result<SoftwareInstallation> {
        let mut t = self.tables.write().await;
        if t.software_installations.values().any(|i| {
            i.softwareversions_id == softwareversions_id
                && i.itemtype == item.itemtype
                && i.items_id == item.items_id
        }) {
            return Err(AppError::Conflict(
                "This version is already installed on the item".to_string(),
            ));
        }
        let id = t.next_id();
        let row = SoftwareInstallation {
            id,
            itemtype: item.itemtype,
            items_id: item.items_id,
            softwareversions_id,
        };
        t.software_installations.insert(id, row.clone());
        Ok(row)
    }

    async fn list_software_installations(
        &self,
        softwareversions_id: i64,
    ) -> Result<Vec<SoftwareInstallation>> {
        let t = self.tables.read().await;
        Ok(t.software_installations
            .values()
            .filter(|i| i.softwareversions_id == softwareversions_id)
            .cloned()
            .collect())
    }

    async fn list_versions_without_installation(
        &self,
        limit: i64,
    ) -> Result<Vec<SoftwareVersion>> {
        let t = self.tables.read().await;
        Ok(t.software_versions
            .values()
            .filter(|v| {
                !t.software_installations
                    .values()
                    .any(|i| i.softwareversions_id == v.id)
            })
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn delete_software_version(&self, id: i64) -> Result<bool> {
        let mut t = self.tables.write().await;
        t.software_installations
            .retain(|_, i| i.softwareversions_id != id);
        Ok(t.software_versions.remove(&id).is_some())
    }

    async fn list_software_without_versions(&self, limit: i64) -> Result<Vec<Asset>> {
        let t = self.tables.read().await;
        Ok(t.assets
            .values()
            .filter(|a| a.itemtype == ItemType::Software && !a.is_deleted)
            .filter(|a| !t.software_versions.values().any(|v| v.softwares_id == a.id))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DocumentTypeStore for MemoryStore {
    async fn insert_document_type(
        &self,
        input: &CreateDocumentTypeRequest,
    ) -> Result<DocumentType> {
        let mut t = self.tables.write().await;
        if t.document_types.values().any(|d| d.name == input.name) {
            return Err(AppError::Conflict(format!(
                "Document type '{}' already exists",
                input.name
            )));
        }
        let id = t.next_id();
        let row = DocumentType {
            id,
            name: input.name.clone(),
            ext: input.ext.clone(),
            is_uploadable: input.is_uploadable,
        };
        t.document_types.insert(id, row.clone());
        Ok(row)
    }

    async fn list_document_types(&self) -> Result<Vec<DocumentType>> {
        Ok(self.tables.read().await.document_types.values().cloned().collect())
    }

    async fn delete_all_document_types(&self) -> Result<u64> {
        let mut t = self.tables.write().await;
        let count = t.document_types.len() as u64;
        t.document_types.clear();
        Ok(count)
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_config_values(&self, context: &str) -> Result<Vec<(String, String)>> {
        let t = self.tables.read().await;
        Ok(t.configs
            .iter()
            .filter(|((ctx, _), _)| ctx == context)
            .map(|((_, name), value)| (name.clone(), value.clone()))
            .collect())
    }

    async fn set_config_value(&self, context: &str, name: &str, value: &str) -> Result<()> {
        self.tables
            .write()
            .await
            .configs
            .insert((context.to_string(), name.to_string()), value.to_string());
        Ok(())
    }
}

#[async_trait]
impl CronStore for MemoryStore {
    async fn register_cron_task(&self, definition: &CronTaskDefinition) -> Result<bool> {
        let mut t = self.tables.write().await;
        if t.cron_tasks.values().any(|c| c.name == definition.name) {
            return Ok(false);
        }
        let id = t.next_id();
        t.cron_tasks.insert(
            id,
            CronTask {
                id,
                itemtype: definition.itemtype.to_string(),
                name: definition.name.to_string(),
                frequency: definition.frequency,
                param: definition.param,
                state: definition.state,
                mode: definition.mode,
                allowmode: definition.allowmode,
                logs_lifetime: definition.logs_lifetime,
                lastrun: None,
            },
        );
        Ok(true)
    }

    async fn get_cron_task(&self, name: &str) -> Result<Option<CronTask>> {
        let t = self.tables.read().await;
        Ok(t.cron_tasks.values().find(|c| c.name == name).cloned())
    }

    async fn list_cron_tasks(&self) -> Result<Vec<CronTask>> {
        Ok(self.tables.read().await.cron_tasks.values().cloned().collect())
    }

    async fn update_cron_task(&self, task: &CronTask) -> Result<()> {
        let mut t = self.tables.write().await;
        if !t.cron_tasks.contains_key(&task.id) {
            return Err(AppError::NotFound(format!("Cron task {} not found", task.name)));
        }
        t.cron_tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn claim_cron_task(&self, id: i64) -> Result<bool> {
        let mut t = self.tables.write().await;
        match t.cron_tasks.get_mut(&id) {
            Some(task) if task.state != CronState::Running => {
                task.state = CronState::Running;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_cron_task(
        &self,
        id: i64,
        state: CronState,
        lastrun: DateTime<Utc>,
    ) -> Result<()> {
        let mut t = self.tables.write().await;
        if let Some(task) = t.cron_tasks.get_mut(&id) {
            task.state = state;
            task.lastrun = Some(lastrun);
        }
        Ok(())
    }

    async fn insert_cron_log(
        &self,
        crontasks_id: i64,
        status: i32,
        elapsed: f64,
        volume: i64,
        content: &str,
    ) -> Result<()> {
        #[cfg(test)]
        if self.fail_cron_logs.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AppError::Database("cron log insert failed".to_string()));
        }
        let mut t = self.tables.write().await;
        let id = t.next_id();
        t.cron_logs.insert(
            id,
            CronTaskLog {
                id,
                crontasks_id,
                date: Utc::now(),
                state: status,
                elapsed,
                volume,
                content: content.to_string(),
            },
        );
        Ok(())
    }

    async fn list_cron_logs(&self, crontasks_id: i64, limit: i64) -> Result<Vec<CronTaskLog>> {
        let t = self.tables.read().await;
        Ok(t.cron_logs
            .values()
            .rev()
            .filter(|l| l.crontasks_id == crontasks_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn prune_cron_logs(&self, crontasks_id: i64, before: DateTime<Utc>) -> Result<u64> {
        let mut t = self.tables.write().await;
        let count = t.cron_logs.len();
        t.cron_logs
            .retain(|_, l| !(l.crontasks_id == crontasks_id && l.date < before));
        Ok((count - t.cron_logs.len()) as u64)
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn insert_alert(&self, itemtype: &str, items_id: i64, kind: AlertKind) -> Result<()> {
        let mut t = self.tables.write().await;
        if t.has_alert(itemtype, items_id, kind) {
            return Ok(());
        }
        let id = t.next_id();
        t.alerts.insert(
            id,
            AlertRow {
                itemtype: itemtype.to_string(),
                items_id,
                kind: kind.code(),
            },
        );
        Ok(())
    }

    async fn delete_alerts(&self, itemtype: &str, items_id: i64, kind: AlertKind) -> Result<u64> {
        let mut t = self.tables.write().await;
        let count = t.alerts.len();
        t.alerts.retain(|_, a| {
            !(a.itemtype == itemtype && a.items_id == items_id && a.kind == kind.code())
        });
        Ok((count - t.alerts.len()) as u64)
    }

    async fn count_alerts(&self, itemtype: &str, kind: AlertKind) -> Result<i64> {
        let t = self.tables.read().await;
        Ok(t.alerts
            .values()
            .filter(|a| a.itemtype == itemtype && a.kind == kind.code())
            .count() as i64)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.name == user.name) {
            return Err(AppError::Conflict(
                "Unable to add. The user already exists.".to_string(),
            ));
        }
        let id = t.next_id();
        let now = Utc::now();
        let row = User {
            id,
            name: user.name.clone(),
            realname: user.realname.clone(),
            firstname: user.firstname.clone(),
            phone: user.phone.clone(),
            password: user.password.clone(),
            password_last_update: user.password_last_update,
            password_forget_token: None,
            password_forget_token_date: None,
            personal_token: None,
            personal_token_date: None,
            api_token: None,
            api_token_date: None,
            authtype: user.authtype,
            auths_id: user.auths_id,
            is_active: user.is_active,
            is_deleted: user.is_deleted,
            entities_id: user.entities_id,
            profiles_id: user.profiles_id,
            timezone: user.timezone.clone(),
            date_creation: now,
            date_mod: now,
        };
        t.users.insert(id, row.clone());
        Ok(row)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.name == name).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.name == user.name && u.id != user.id) {
            return Err(AppError::Conflict(
                "Unable to update login. A user already exists.".to_string(),
            ));
        }
        let Some(row) = t.users.get_mut(&user.id) else {
            return Err(AppError::NotFound(format!("User {} not found", user.id)));
        };
        *row = user.clone();
        row.date_mod = Utc::now();
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> Result<bool> {
        let mut t = self.tables.write().await;
        t.user_emails.retain(|_, e| e.users_id != id);
        t.alerts
            .retain(|_, a| !(a.itemtype == USER_ALERT_ITEMTYPE && a.items_id == id));
        Ok(t.users.remove(&id).is_some())
    }

    async fn find_user_ids_by_field(
        &self,
        field: UserLookupField,
        value: &str,
    ) -> Result<Vec<i64>> {
        let t = self.tables.read().await;
        Ok(t.users
            .values()
            .filter(|u| {
                let column = match field {
                    UserLookupField::Phone => &u.phone,
                    UserLookupField::Realname => &u.realname,
                    UserLookupField::Firstname => &u.firstname,
                };
                column.as_deref() == Some(value)
            })
            .map(|u| u.id)
            .collect())
    }

    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>> {
        let t = self.tables.read().await;
        let ids: Vec<i64> = t
            .user_emails
            .values()
            .filter(|e| e.email.eq_ignore_ascii_case(email))
            .map(|e| e.users_id)
            .collect();
        Ok(t.users
            .values()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn find_user_by_token(&self, field: TokenField, token: &str) -> Result<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users
            .values()
            .find(|u| {
                let stored = match field {
                    TokenField::PersonalToken => &u.personal_token,
                    TokenField::ApiToken => &u.api_token,
                };
                stored.as_deref() == Some(token)
            })
            .cloned())
    }

    async fn find_user_by_forget_token(&self, token: &str) -> Result<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users
            .values()
            .find(|u| u.password_forget_token.as_deref() == Some(token))
            .cloned())
    }

    async fn add_user_email(
        &self,
        users_id: i64,
        email: &str,
        is_default: bool,
    ) -> Result<UserEmail> {
        let mut t = self.tables.write().await;
        let existing = t
            .user_emails
            .values()
            .find(|e| e.users_id == users_id && e.email == email)
            .map(|e| e.id);
        if is_default {
            for e in t.user_emails.values_mut().filter(|e| e.users_id == users_id) {
                e.is_default = Some(e.id) == existing;
            }
        }
        if let Some(id) = existing {
            if let Some(row) = t.user_emails.get(&id) {
                return Ok(row.clone());
            }
        }
        let id = t.next_id();
        let row = UserEmail {
            id,
            users_id,
            email: email.to_string(),
            is_default,
        };
        t.user_emails.insert(id, row.clone());
        Ok(row)
    }

    async fn list_user_emails(&self, users_id: i64) -> Result<Vec<UserEmail>> {
        let t = self.tables.read().await;
        Ok(t.user_emails
            .values()
            .filter(|e| e.users_id == users_id)
            .cloned()
            .collect())
    }

    async fn set_default_user_email(&self, users_id: i64, email_id: i64) -> Result<()> {
        let mut t = self.tables.write().await;
        for e in t.user_emails.values_mut().filter(|e| e.users_id == users_id) {
            e.is_default = e.id == email_id;
        }
        Ok(())
    }

    async fn lock_users_with_password_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<User>> {
        let mut t = self.tables.write().await;
        let mut locked = Vec::new();
        for user in t.users.values_mut() {
            if Tables::is_expiring_user(user, cutoff) {
                user.is_active = false;
                user.date_mod = Utc::now();
                locked.push(user.clone());
            }
        }
        Ok(locked)
    }

    async fn list_users_with_password_before(
        &self,
        cutoff: DateTime<Utc>,
        without_alert: AlertKind,
        limit: i64,
    ) -> Result<Vec<User>> {
        let t = self.tables.read().await;
        let mut users: Vec<User> = t
            .users
            .values()
            .filter(|u| Tables::is_expiring_user(u, cutoff))
            .filter(|u| !t.has_alert(USER_ALERT_ITEMTYPE, u.id, without_alert))
            .cloned()
            .collect();
        users.sort_by_key(|u| (u.password_last_update, u.id));
        users.truncate(limit.max(0) as usize);
        Ok(users)
    }

    async fn count_users_with_password_before(
        &self,
        cutoff: DateTime<Utc>,
        without_alert: AlertKind,
    ) -> Result<i64> {
        let t = self.tables.read().await;
        Ok(t.users
            .values()
            .filter(|u| Tables::is_expiring_user(u, cutoff))
            .filter(|u| !t.has_alert(USER_ALERT_ITEMTYPE, u.id, without_alert))
            .count() as i64)
    }

    async fn count_users(&self) -> Result<i64> {
        Ok(self.tables.read().await.users.len() as i64)
    }
}
