//! Network ports attached to assets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::itemtype::{ItemRef, ItemType};

/// Concrete kind of a network port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum InstantiationType {
    NetworkPortEthernet,
    NetworkPortWifi,
    NetworkPortAggregate,
    NetworkPortAlias,
    NetworkPortDialup,
    NetworkPortLocal,
    NetworkPortFiberchannel,
}

impl InstantiationType {
    const ALL: [InstantiationType; 7] = [
        InstantiationType::NetworkPortEthernet,
        InstantiationType::NetworkPortWifi,
        InstantiationType::NetworkPortAggregate,
        InstantiationType::NetworkPortAlias,
        InstantiationType::NetworkPortDialup,
        InstantiationType::NetworkPortLocal,
        InstantiationType::NetworkPortFiberchannel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InstantiationType::NetworkPortEthernet => "NetworkPortEthernet",
            InstantiationType::NetworkPortWifi => "NetworkPortWifi",
            InstantiationType::NetworkPortAggregate => "NetworkPortAggregate",
            InstantiationType::NetworkPortAlias => "NetworkPortAlias",
            InstantiationType::NetworkPortDialup => "NetworkPortDialup",
            InstantiationType::NetworkPortLocal => "NetworkPortLocal",
            InstantiationType::NetworkPortFiberchannel => "NetworkPortFiberchannel",
        }
    }
}

impl fmt::Display for InstantiationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown port instantiation type '{0}'")]
pub struct UnknownInstantiationType(pub String);

impl FromStr for InstantiationType {
    type Err = UnknownInstantiationType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownInstantiationType(s.to_string()))
    }
}

impl TryFrom<String> for InstantiationType {
    type Error = UnknownInstantiationType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct NetworkPort {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub itemtype: ItemType,
    pub items_id: i64,
    pub entities_id: i64,
    pub logical_number: i32,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub instantiation_type: InstantiationType,
    pub mac: Option<String>,
}

impl NetworkPort {
    pub fn owner(&self) -> ItemRef {
        ItemRef::new(self.itemtype, self.items_id)
    }
}

/// Validated row ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewNetworkPort {
    pub owner: ItemRef,
    pub entities_id: i64,
    pub logical_number: i32,
    pub name: String,
    pub instantiation_type: InstantiationType,
    pub mac: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateNetworkPortRequest {
    pub itemtype: ItemType,
    pub items_id: i64,
    #[serde(default)]
    pub entities_id: i64,
    #[serde(default)]
    pub logical_number: i32,
    #[serde(default)]
    pub name: String,
    pub instantiation_type: String,
    pub mac: Option<String>,
}
