//! Polymorphic item references.
//!
//! Every relation table points at an asset through an `(itemtype, items_id)`
//! pair. The set of item types is closed; unknown names are rejected when a
//! request is parsed rather than when a row is written.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
#[error("Unknown item type '{0}'")]
pub struct UnknownItemType(pub String);

/// Asset types tracked by the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum ItemType {
    Computer,
    Monitor,
    NetworkEquipment,
    Peripheral,
    Phone,
    Printer,
    Software,
    Appliance,
}

impl ItemType {
    pub const ALL: [ItemType; 8] = [
        ItemType::Computer,
        ItemType::Monitor,
        ItemType::NetworkEquipment,
        ItemType::Peripheral,
        ItemType::Phone,
        ItemType::Printer,
        ItemType::Software,
        ItemType::Appliance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Computer => "Computer",
            ItemType::Monitor => "Monitor",
            ItemType::NetworkEquipment => "NetworkEquipment",
            ItemType::Peripheral => "Peripheral",
            ItemType::Phone => "Phone",
            ItemType::Printer => "Printer",
            ItemType::Software => "Software",
            ItemType::Appliance => "Appliance",
        }
    }

    /// Types that may be attached to an appliance.
    pub fn appliance_types() -> &'static [ItemType] {
        &Self::ALL
    }

    /// Whether items of this type can carry network ports.
    pub fn has_network_ports(&self) -> bool {
        !matches!(self, ItemType::Software | ItemType::Appliance)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = UnknownItemType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownItemType(s.to_string()))
    }
}

impl TryFrom<String> for ItemType {
    type Error = UnknownItemType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// `(itemtype, items_id)` pair identifying one asset row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct ItemRef {
    pub itemtype: ItemType,
    pub items_id: i64,
}

impl ItemRef {
    pub fn new(itemtype: ItemType, items_id: i64) -> Self {
        Self { itemtype, items_id }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.itemtype, self.items_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_types() {
        assert_eq!("Computer".parse::<ItemType>().unwrap(), ItemType::Computer);
        assert_eq!(
            "networkequipment".parse::<ItemType>().unwrap(),
            ItemType::NetworkEquipment
        );
    }

    #[test]
    fn test_parse_unknown_type_fails() {
        let err = "Toaster".parse::<ItemType>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown item type 'Toaster'");
    }

    #[test]
    fn test_as_str_roundtrips_for_every_type() {
        for t in ItemType::ALL {
            assert_eq!(t.as_str().parse::<ItemType>().unwrap(), t);
        }
    }

    #[test]
    fn test_item_ref_json_shape() {
        let item = ItemRef::new(ItemType::Printer, 7);
        let json = serde_json::to_value(item).unwrap();
        assert_eq!(json["itemtype"], "Printer");
        assert_eq!(json["items_id"], 7);
    }

    #[test]
    fn test_software_has_no_ports() {
        assert!(!ItemType::Software.has_network_ports());
        assert!(ItemType::NetworkEquipment.has_network_ports());
    }
}
