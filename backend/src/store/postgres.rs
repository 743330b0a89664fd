//! PostgreSQL store (SQLx).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

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

const ASSET_COLUMNS: &str = "id, itemtype, name, entities_id, serial, otherserial, comment, \
                             is_deleted, date_creation, date_mod";

const USER_COLUMNS: &str = "id, name, realname, firstname, phone, password, password_last_update, \
                            password_forget_token, password_forget_token_date, personal_token, \
                            personal_token_date, api_token, api_token_date, authtype, auths_id, \
                            is_active, is_deleted, entities_id, profiles_id, timezone, \
                            date_creation, date_mod";

const CRON_COLUMNS: &str =
    "id, itemtype, name, frequency, param, state, mode, allowmode, logs_lifetime, lastrun";

/// Condition shared by the password-expiration queries ($1 = cutoff).
const EXPIRING_USERS_CONDITION: &str = "authtype = 1 AND is_active = true AND is_deleted = false \
                                        AND password_last_update < $1";

fn db_err(e: sqlx::Error) -> AppError {
    AppError::Database(e.to_string())
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
fn conflict_or_db(e: sqlx::Error, message: &str) -> AppError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => AppError::Conflict(message.to_string()),
        _ => AppError::Database(e.to_string()),
    }
}

/// Store backed by a PostgreSQL pool.
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl AssetStore for PgStore {
    async fn insert_asset(&self, input: &CreateAssetRequest) -> Result<Asset> {
        let sql = format!(
            "INSERT INTO assets (itemtype, name, entities_id, serial, otherserial, comment) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            ASSET_COLUMNS
        );
        sqlx::query_as::<_, Asset>(&sql)
            .bind(input.itemtype.as_str())
            .bind(&input.name)
            .bind(input.entities_id)
            .bind(&input.serial)
            .bind(&input.otherserial)
            .bind(&input.comment)
            .fetch_one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn get_asset(&self, id: i64) -> Result<Option<Asset>> {
        let sql = format!("SELECT {} FROM assets WHERE id = $1", ASSET_COLUMNS);
        sqlx::query_as::<_, Asset>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)
    }

    async fn find_asset(&self, item: ItemRef) -> Result<Option<Asset>> {
        let sql = format!(
            "SELECT {} FROM assets WHERE id = $1 AND itemtype = $2",
            ASSET_COLUMNS
        );
        sqlx::query_as::<_, Asset>(&sql)
            .bind(item.items_id)
            .bind(item.itemtype.as_str())
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)
    }

    async fn list_assets(
        &self,
        itemtype: Option<ItemType>,
        include_deleted: bool,
    ) -> Result<Vec<Asset>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM assets
            WHERE ($1::text IS NULL OR itemtype = $1)
              AND ($2 OR is_deleted = false)
            ORDER BY name, id
            "#,
            ASSET_COLUMNS
        );
        sqlx::query_as::<_, Asset>(&sql)
            .bind(itemtype.map(|t| t.as_str()))
            .bind(include_deleted)
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn update_asset(&self, id: i64, input: &UpdateAssetRequest) -> Result<Option<Asset>> {
        let sql = format!(
            r#"
            UPDATE assets SET
                name = COALESCE($2, name),
                entities_id = COALESCE($3, entities_id),
                serial = COALESCE($4, serial),
                otherserial = COALESCE($5, otherserial),
                comment = COALESCE($6, comment),
                date_mod = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ASSET_COLUMNS
        );
        sqlx::query_as::<_, Asset>(&sql)
            .bind(id)
            .bind(&input.name)
            .bind(input.entities_id)
            .bind(&input.serial)
            .bind(&input.otherserial)
            .bind(&input.comment)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)
    }

    async fn set_asset_deleted(&self, id: i64, is_deleted: bool) -> Result<bool> {
        let result =
            sqlx::query("UPDATE assets SET is_deleted = $2, date_mod = NOW() WHERE id = $1")
                .bind(id)
                .bind(is_deleted)
                .execute(&self.db)
                .await
                .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_asset(&self, item: ItemRef) -> Result<PurgeSummary> {
        let mut tx = self.db.begin().await?;
        let itemtype = item.itemtype.as_str();
        let mut summary = PurgeSummary::default();

        summary.network_ports =
            sqlx::query("DELETE FROM network_ports WHERE itemtype = $1 AND items_id = $2")
                .bind(itemtype)
                .bind(item.items_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?
                .rows_affected();

        summary.impact_relations = sqlx::query(
            r#"
            DELETE FROM impact_relations
            WHERE (itemtype_source = $1 AND items_id_source = $2)
               OR (itemtype_impacted = $1 AND items_id_impacted = $2)
            "#,
        )
        .bind(itemtype)
        .bind(item.items_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        summary.appliance_items = sqlx::query(
            r#"
            DELETE FROM appliance_items
            WHERE (itemtype = $1 AND items_id = $2)
               OR ($1 = 'Appliance' AND appliances_id = $2)
            "#,
        )
        .bind(itemtype)
        .bind(item.items_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        summary.software_installations =
            sqlx::query("DELETE FROM item_software_versions WHERE itemtype = $1 AND items_id = $2")
                .bind(itemtype)
                .bind(item.items_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?
                .rows_affected();

        if item.itemtype == ItemType::Software {
            summary.software_installations += sqlx::query(
                r#"
                DELETE FROM item_software_versions
                WHERE softwareversions_id IN (
                    SELECT id FROM software_versions WHERE softwares_id = $1
                )
                "#,
            )
            .bind(item.items_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

            summary.software_versions =
                sqlx::query("DELETE FROM software_versions WHERE softwares_id = $1")
                    .bind(item.items_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?
                    .rows_affected();
        }

        let deleted = sqlx::query("DELETE FROM assets WHERE id = $1 AND itemtype = $2")
            .bind(item.items_id)
            .bind(itemtype)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();
        if deleted == 0 {
            tx.rollback().await?;
            return Err(AppError::NotFound(format!("{} not found", item)));
        }

        tx.commit().await?;
        Ok(summary)
    }

    async fn count_assets_by_type(&self) -> Result<Vec<(ItemType, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT itemtype, COUNT(*) FROM assets WHERE is_deleted = false GROUP BY itemtype",
        )
        .fetch_all(&self.db)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .filter_map(|(t, n)| t.parse::<ItemType>().ok().map(|t| (t, n)))
            .collect())
    }
}

#[async_trait]
impl LineOperatorStore for PgStore {
    async fn count_line_operators_with_codes(
        &self,
        mcc: i32,
        mnc: i32,
        exclude_id: Option<i64>,
    ) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM line_operators
            WHERE mcc = $1 AND mnc = $2 AND ($3::bigint IS NULL OR id <> $3)
            "#,
        )
        .bind(mcc)
        .bind(mnc)
        .bind(exclude_id)
        .fetch_one(&self.db)
        .await
        .map_err(db_err)
    }

    async fn insert_line_operator(
        &self,
        name: &str,
        comment: Option<&str>,
        mcc: i32,
        mnc: i32,
        entities_id: i64,
    ) -> Result<LineOperator> {
        sqlx::query_as(
            r#"
            INSERT INTO line_operators (name, comment, mcc, mnc, entities_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, comment, mcc, mnc, entities_id
            "#,
        )
        .bind(name)
        .bind(comment)
        .bind(mcc)
        .bind(mnc)
        .bind(entities_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            conflict_or_db(
                e,
                "Mobile country code and network code combination must be unique!",
            )
        })
    }

    async fn update_line_operator(&self, operator: &LineOperator) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE line_operators
            SET name = $2, comment = $3, mcc = $4, mnc = $5, entities_id = $6
            WHERE id = $1
            "#,
        )
        .bind(operator.id)
        .bind(&operator.name)
        .bind(&operator.comment)
        .bind(operator.mcc)
        .bind(operator.mnc)
        .bind(operator.entities_id)
        .execute(&self.db)
        .await
        .map_err(|e| {
            conflict_or_db(
                e,
                "Mobile country code and network code combination must be unique!",
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Line operator {} not found",
                operator.id
            )));
        }
        Ok(())
    }

    async fn get_line_operator(&self, id: i64) -> Result<Option<LineOperator>> {
        sqlx::query_as(
            "SELECT id, name, comment, mcc, mnc, entities_id FROM line_operators WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(db_err)
    }

    async fn list_line_operators(&self) -> Result<Vec<LineOperator>> {
        sqlx::query_as(
            "SELECT id, name, comment, mcc, mnc, entities_id FROM line_operators ORDER BY name",
        )
        .fetch_all(&self.db)
        .await
        .map_err(db_err)
    }

    async fn delete_line_operator(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM line_operators WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl NetworkPortStore for PgStore {
    async fn insert_network_port(&self, port: &NewNetworkPort) -> Result<NetworkPort> {
        sqlx::query_as(
            r#"
            INSERT INTO network_ports
                (itemtype, items_id, entities_id, logical_number, name, instantiation_type, mac)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, itemtype, items_id, entities_id, logical_number, name,
                      instantiation_type, mac
            "#,
        )
        .bind(port.owner.itemtype.as_str())
        .bind(port.owner.items_id)
        .bind(port.entities_id)
        .bind(port.logical_number)
        .bind(&port.name)
        .bind(port.instantiation_type.as_str())
        .bind(&port.mac)
        .fetch_one(&self.db)
        .await
        .map_err(db_err)
    }

    async fn get_network_port(&self, id: i64) -> Result<Option<NetworkPort>> {
        sqlx::query_as(
            r#"
            SELECT id, itemtype, items_id, entities_id, logical_number, name,
                   instantiation_type, mac
            FROM network_ports WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(db_err)
    }

    async fn list_network_ports_for_item(&self, item: ItemRef) -> Result<Vec<NetworkPort>> {
        sqlx::query_as(
            r#"
            SELECT id, itemtype, items_id, entities_id, logical_number, name,
                   instantiation_type, mac
            FROM network_ports
            WHERE itemtype = $1 AND items_id = $2
            ORDER BY logical_number, id
            "#,
        )
        .bind(item.itemtype.as_str())
        .bind(item.items_id)
        .fetch_all(&self.db)
        .await
        .map_err(db_err)
    }

    async fn count_network_ports_for_item(&self, item: ItemRef) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM network_ports WHERE itemtype = $1 AND items_id = $2",
        )
        .bind(item.itemtype.as_str())
        .bind(item.items_id)
        .fetch_one(&self.db)
        .await
        .map_err(db_err)
    }

    async fn delete_network_port(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM network_ports WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ImpactStore for PgStore {
    async fn find_impact_relation(
        &self,
        source: ItemRef,
        impacted: ItemRef,
    ) -> Result<Option<i64>> {
        sqlx::query_scalar(
            r#"
            SELECT id FROM impact_relations
            WHERE itemtype_source = $1 AND items_id_source = $2
              AND itemtype_impacted = $3 AND items_id_impacted = $4
            "#,
        )
        .bind(source.itemtype.as_str())
        .bind(source.items_id)
        .bind(impacted.itemtype.as_str())
        .bind(impacted.items_id)
        .fetch_optional(&self.db)
        .await
        .map_err(db_err)
    }

    async fn insert_impact_relation(
        &self,
        source: ItemRef,
        impacted: ItemRef,
    ) -> Result<ImpactRelation> {
        sqlx::query_as(
            r#"
            INSERT INTO impact_relations
                (itemtype_source, items_id_source, itemtype_impacted, items_id_impacted)
            VALUES ($1, $2, $3, $4)
            RETURNING id, itemtype_source, items_id_source, itemtype_impacted, items_id_impacted
            "#,
        )
        .bind(source.itemtype.as_str())
        .bind(source.items_id)
        .bind(impacted.itemtype.as_str())
        .bind(impacted.items_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| conflict_or_db(e, "This impact relation already exists"))
    }

    async fn list_impact_relations_for_item(&self, item: ItemRef) -> Result<Vec<ImpactRelation>> {
        sqlx::query_as(
            r#"
            SELECT id, itemtype_source, items_id_source, itemtype_impacted, items_id_impacted
            FROM impact_relations
            WHERE (itemtype_source = $1 AND items_id_source = $2)
               OR (itemtype_impacted = $1 AND items_id_impacted = $2)
            ORDER BY id
            "#,
        )
        .bind(item.itemtype.as_str())
        .bind(item.items_id)
        .fetch_all(&self.db)
        .await
        .map_err(db_err)
    }

    async fn delete_impact_relation(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM impact_relations WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ApplianceStore for PgStore {
    async fn find_appliance_item(&self, appliances_id: i64, item: ItemRef) -> Result<Option<i64>> {
        sqlx::query_scalar(
            r#"
            SELECT id FROM appliance_items
            WHERE appliances_id = $1 AND itemtype = $2 AND items_id = $3
            "#,
        )
        .bind(appliances_id)
        .bind(item.itemtype.as_str())
        .bind(item.items_id)
        .fetch_optional(&self.db)
        .await
        .map_err(db_err)
    }

    async fn insert_appliance_item(
        &self,
        appliances_id: i64,
        item: ItemRef,
    ) -> Result<ApplianceItem> {
        sqlx::query_as(
            r#"
            INSERT INTO appliance_items (appliances_id, itemtype, items_id)
            VALUES ($1, $2, $3)
            RETURNING id, appliances_id, itemtype, items_id
            "#,
        )
        .bind(appliances_id)
        .bind(item.itemtype.as_str())
        .bind(item.items_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| conflict_or_db(e, "This item is already attached to the appliance"))
    }

    async fn list_appliance_items(&self, appliances_id: i64) -> Result<Vec<ApplianceItem>> {
        sqlx::query_as(
            r#"
            SELECT id, appliances_id, itemtype, items_id
            FROM appliance_items WHERE appliances_id = $1
            ORDER BY itemtype, items_id
            "#,
        )
        .bind(appliances_id)
        .fetch_all(&self.db)
        .await
        .map_err(db_err)
    }

    async fn count_appliance_items(
        &self,
        appliances_id: i64,
        itemtypes: &[ItemType],
    ) -> Result<i64> {
        let types: Vec<String> = itemtypes.iter().map(|t| t.as_str().to_string()).collect();
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM appliance_items WHERE appliances_id = $1 AND itemtype = ANY($2)",
        )
        .bind(appliances_id)
        .bind(&types)
        .fetch_one(&self.db)
        .await
        .map_err(db_err)
    }

    async fn delete_appliance_item(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM appliance_items WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SoftwareStore for PgStore {
    async fn insert_software_version(
        &self,
        softwares_id: i64,
        name: &str,
        arch: Option<&str>,
    ) -> Result<SoftwareVersion> {
        sqlx::query_as(
            r#"
            INSERT INTO software_versions (softwares_id, name, arch)
            VALUES ($1, $2, $3)
            RETURNING id, softwares_id, name, arch
            "#,
        )
        .bind(softwares_id)
        .bind(name)
        .bind(arch)
        .fetch_one(&self.db)
        .await
        .map_err(db_err)
    }

    async fn get_software_version(&self, id: i64) -> Result<Option<SoftwareVersion>> {
        sqlx::query_as("SELECT id, softwares_id, name, arch FROM software_versions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)
    }

    async fn list_software_versions(&self, softwares_id: i64) -> Result<Vec<SoftwareVersion>> {
        sqlx::query_as(
            "SELECT id, softwares_id, name, arch FROM software_versions \
             WHERE softwares_id = $1 ORDER BY name",
        )
        .bind(softwares_id)
        .fetch_all(&self.db)
        .await
        .map_err(db_err)
    }

    async fn insert_software_installation(
        &self,
        softwareversions_id: i64,
        item: ItemRef,
    ) -> Result<SoftwareInstallation> {
        sqlx::query_as(
            r#"
            INSERT INTO item_software_versions (itemtype, items_id, softwareversions_id)
            VALUES ($1, $2, $3)
            RETURNING id, itemtype, items_id, softwareversions_id
            "#,
        )
        .bind(item.itemtype.as_str())
        .bind(item.items_id)
        .bind(softwareversions_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| conflict_or_db(e, "This version is already installed on the item"))
    }

    async fn list_software_installations(
        &self,
        softwareversions_id: i64,
    ) -> Result<Vec<SoftwareInstallation>> {
        sqlx::query_as(
            "SELECT id, itemtype, items_id, softwareversions_id FROM item_software_versions \
             WHERE softwareversions_id = $1 ORDER BY id",
        )
        .bind(softwareversions_id)
        .fetch_all(&self.db)
        .await
        .map_err(db_err)
    }

    async fn list_versions_without_installation(
        &self,
        limit: i64,
    ) -> Result<Vec<SoftwareVersion>> {
        sqlx::query_as(
            r#"
            SELECT v.id, v.softwares_id, v.name, v.arch
            FROM software_versions v
            WHERE NOT EXISTS (
                SELECT 1 FROM item_software_versions i WHERE i.softwareversions_id = v.id
            )
            ORDER BY v.id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(db_err)
    }

    async fn delete_software_version(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM software_versions WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_software_without_versions(&self, limit: i64) -> Result<Vec<Asset>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM assets a
            WHERE a.itemtype = 'Software' AND a.is_deleted = false
              AND NOT EXISTS (SELECT 1 FROM software_versions v WHERE v.softwares_id = a.id)
            ORDER BY a.id
            LIMIT $1
            "#,
            ASSET_COLUMNS
        );
        sqlx::query_as::<_, Asset>(&sql)
            .bind(limit)
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl DocumentTypeStore for PgStore {
    async fn insert_document_type(
        &self,
        input: &CreateDocumentTypeRequest,
    ) -> Result<DocumentType> {
        sqlx::query_as(
            r#"
            INSERT INTO document_types (name, ext, is_uploadable)
            VALUES ($1, $2, $3)
            RETURNING id, name, ext, is_uploadable
            "#,
        )
        .bind(&input.name)
        .bind(&input.ext)
        .bind(input.is_uploadable)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            conflict_or_db(
                e,
                &format!("Document type '{}' already exists", input.name),
            )
        })
    }

    async fn list_document_types(&self) -> Result<Vec<DocumentType>> {
        sqlx::query_as("SELECT id, name, ext, is_uploadable FROM document_types ORDER BY id")
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn delete_all_document_types(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM document_types")
            .execute(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ConfigStore for PgStore {
    async fn get_config_values(&self, context: &str) -> Result<Vec<(String, String)>> {
        sqlx::query_as("SELECT name, value FROM configs WHERE context = $1 ORDER BY name")
            .bind(context)
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn set_config_value(&self, context: &str, name: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO configs (context, name, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (context, name) DO UPDATE SET value = $3
            "#,
        )
        .bind(context)
        .bind(name)
        .bind(value)
        .execute(&self.db)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl CronStore for PgStore {
    async fn register_cron_task(&self, definition: &CronTaskDefinition) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO cron_tasks
                (itemtype, name, frequency, param, state, mode, allowmode, logs_lifetime)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(definition.itemtype)
        .bind(definition.name)
        .bind(definition.frequency)
        .bind(definition.param)
        .bind(definition.state.code())
        .bind(definition.mode.code())
        .bind(definition.allowmode)
        .bind(definition.logs_lifetime)
        .execute(&self.db)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_cron_task(&self, name: &str) -> Result<Option<CronTask>> {
        let sql = format!("SELECT {} FROM cron_tasks WHERE name = $1", CRON_COLUMNS);
        sqlx::query_as::<_, CronTask>(&sql)
            .bind(name)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)
    }

    async fn list_cron_tasks(&self) -> Result<Vec<CronTask>> {
        let sql = format!("SELECT {} FROM cron_tasks ORDER BY itemtype, name", CRON_COLUMNS);
        sqlx::query_as::<_, CronTask>(&sql)
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn update_cron_task(&self, task: &CronTask) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE cron_tasks
            SET frequency = $2, param = $3, state = $4, mode = $5, logs_lifetime = $6
            WHERE id = $1
            "#,
        )
        .bind(task.id)
        .bind(task.frequency)
        .bind(task.param)
        .bind(task.state.code())
        .bind(task.mode.code())
        .bind(task.logs_lifetime)
        .execute(&self.db)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn claim_cron_task(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE cron_tasks SET state = $2 WHERE id = $1 AND state <> $2")
            .bind(id)
            .bind(CronState::Running.code())
            .execute(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn release_cron_task(
        &self,
        id: i64,
        state: CronState,
        lastrun: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE cron_tasks SET state = $2, lastrun = $3 WHERE id = $1")
            .bind(id)
            .bind(state.code())
            .bind(lastrun)
            .execute(&self.db)
            .await
            .map_err(db_err)?;
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
        sqlx::query(
            r#"
            INSERT INTO cron_task_logs (crontasks_id, state, elapsed, volume, content)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(crontasks_id)
        .bind(status)
        .bind(elapsed)
        .bind(volume)
        .bind(content)
        .execute(&self.db)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_cron_logs(&self, crontasks_id: i64, limit: i64) -> Result<Vec<CronTaskLog>> {
        sqlx::query_as(
            r#"
            SELECT id, crontasks_id, date, state, elapsed, volume, content
            FROM cron_task_logs
            WHERE crontasks_id = $1
            ORDER BY date DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(crontasks_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(db_err)
    }

    async fn prune_cron_logs(&self, crontasks_id: i64, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cron_task_logs WHERE crontasks_id = $1 AND date < $2")
            .bind(crontasks_id)
            .bind(before)
            .execute(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AlertStore for PgStore {
    async fn insert_alert(&self, itemtype: &str, items_id: i64, kind: AlertKind) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts (itemtype, items_id, type)
            VALUES ($1, $2, $3)
            ON CONFLICT (itemtype, items_id, type) DO UPDATE SET date = NOW()
            "#,
        )
        .bind(itemtype)
        .bind(items_id)
        .bind(kind.code())
        .execute(&self.db)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn delete_alerts(&self, itemtype: &str, items_id: i64, kind: AlertKind) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM alerts WHERE itemtype = $1 AND items_id = $2 AND type = $3")
                .bind(itemtype)
                .bind(items_id)
                .bind(kind.code())
                .execute(&self.db)
                .await
                .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn count_alerts(&self, itemtype: &str, kind: AlertKind) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM alerts WHERE itemtype = $1 AND type = $2")
            .bind(itemtype)
            .bind(kind.code())
            .fetch_one(&self.db)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users
                (name, realname, firstname, phone, password, password_last_update, authtype,
                 auths_id, is_active, is_deleted, entities_id, profiles_id, timezone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.name)
            .bind(&user.realname)
            .bind(&user.firstname)
            .bind(&user.phone)
            .bind(&user.password)
            .bind(user.password_last_update)
            .bind(user.authtype.code())
            .bind(user.auths_id)
            .bind(user.is_active)
            .bind(user.is_deleted)
            .bind(user.entities_id)
            .bind(user.profiles_id)
            .bind(&user.timezone)
            .fetch_one(&self.db)
            .await
            .map_err(|e| conflict_or_db(e, "Unable to add. The user already exists."))
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)
    }

    async fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE name = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(name)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY name", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = $2, realname = $3, firstname = $4, phone = $5, password = $6,
                password_last_update = $7, password_forget_token = $8,
                password_forget_token_date = $9, personal_token = $10,
                personal_token_date = $11, api_token = $12, api_token_date = $13,
                authtype = $14, auths_id = $15, is_active = $16, is_deleted = $17,
                entities_id = $18, profiles_id = $19, timezone = $20, date_mod = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.realname)
        .bind(&user.firstname)
        .bind(&user.phone)
        .bind(&user.password)
        .bind(user.password_last_update)
        .bind(&user.password_forget_token)
        .bind(user.password_forget_token_date)
        .bind(&user.personal_token)
        .bind(user.personal_token_date)
        .bind(&user.api_token)
        .bind(user.api_token_date)
        .bind(user.authtype.code())
        .bind(user.auths_id)
        .bind(user.is_active)
        .bind(user.is_deleted)
        .bind(user.entities_id)
        .bind(user.profiles_id)
        .bind(&user.timezone)
        .execute(&self.db)
        .await
        .map_err(|e| conflict_or_db(e, "Unable to update login. A user already exists."))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", user.id)));
        }
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> Result<bool> {
        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM alerts WHERE itemtype = $1 AND items_id = $2")
            .bind(USER_ALERT_ITEMTYPE)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_user_ids_by_field(
        &self,
        field: UserLookupField,
        value: &str,
    ) -> Result<Vec<i64>> {
        // Column names come from a closed enum, never from the request.
        let sql = format!("SELECT id FROM users WHERE {} = $1", field.column());
        sqlx::query_scalar(&sql)
            .bind(value)
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM users
            WHERE id IN (SELECT users_id FROM user_emails WHERE LOWER(email) = LOWER($1))
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn find_user_by_token(&self, field: TokenField, token: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE {} = $1",
            USER_COLUMNS,
            field.column()
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)
    }

    async fn find_user_by_forget_token(&self, token: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE password_forget_token = $1",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)
    }

    async fn add_user_email(
        &self,
        users_id: i64,
        email: &str,
        is_default: bool,
    ) -> Result<UserEmail> {
        let mut tx = self.db.begin().await?;
        if is_default {
            sqlx::query("UPDATE user_emails SET is_default = false WHERE users_id = $1")
                .bind(users_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        let row: UserEmail = sqlx::query_as(
            r#"
            INSERT INTO user_emails (users_id, email, is_default)
            VALUES ($1, $2, $3)
            ON CONFLICT (users_id, email) DO UPDATE SET is_default = user_emails.is_default OR $3
            RETURNING id, users_id, email, is_default
            "#,
        )
        .bind(users_id)
        .bind(email)
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await?;
        Ok(row)
    }

    async fn list_user_emails(&self, users_id: i64) -> Result<Vec<UserEmail>> {
        sqlx::query_as(
            "SELECT id, users_id, email, is_default FROM user_emails WHERE users_id = $1 ORDER BY id",
        )
        .bind(users_id)
        .fetch_all(&self.db)
        .await
        .map_err(db_err)
    }

    async fn set_default_user_email(&self, users_id: i64, email_id: i64) -> Result<()> {
        sqlx::query("UPDATE user_emails SET is_default = (id = $2) WHERE users_id = $1")
            .bind(users_id)
            .bind(email_id)
            .execute(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn lock_users_with_password_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<User>> {
        let sql = format!(
            "UPDATE users SET is_active = false, date_mod = NOW() WHERE {} RETURNING {}",
            EXPIRING_USERS_CONDITION, USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(cutoff)
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn list_users_with_password_before(
        &self,
        cutoff: DateTime<Utc>,
        without_alert: AlertKind,
        limit: i64,
    ) -> Result<Vec<User>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM users u
            WHERE {}
              AND NOT EXISTS (
                SELECT 1 FROM alerts a
                WHERE a.itemtype = $2 AND a.items_id = u.id AND a.type = $3
              )
            ORDER BY password_last_update, id
            LIMIT $4
            "#,
            USER_COLUMNS, EXPIRING_USERS_CONDITION
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(cutoff)
            .bind(USER_ALERT_ITEMTYPE)
            .bind(without_alert.code())
            .bind(limit)
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn count_users_with_password_before(
        &self,
        cutoff: DateTime<Utc>,
        without_alert: AlertKind,
    ) -> Result<i64> {
        let sql = format!(
            r#"
            SELECT COUNT(*)
            FROM users u
            WHERE {}
              AND NOT EXISTS (
                SELECT 1 FROM alerts a
                WHERE a.itemtype = $2 AND a.items_id = u.id AND a.type = $3
              )
            "#,
            EXPIRING_USERS_CONDITION
        );
        sqlx::query_scalar(&sql)
            .bind(cutoff)
            .bind(USER_ALERT_ITEMTYPE)
            .bind(without_alert.code())
            .fetch_one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn count_users(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await
            .map_err(db_err)
    }
}
