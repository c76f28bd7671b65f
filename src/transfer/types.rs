//! Core types for the stock transfer workflow
//!
//! Wire shapes follow the REST backend: camelCase JSON, nested
//! `{id, name}` references for the product and both warehouses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::transfer::state::TransferStatus;

/// Opaque transfer identity assigned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(String);

impl TransferId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransferId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TransferId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Reference to another entity with its display name denormalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl EntityRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Name for display, falling back to the id when the backend sent none
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// A stock-transfer order moving a product between two warehouses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: TransferId,
    pub product: EntityRef,
    pub from_warehouse: EntityRef,
    pub to_warehouse: EntityRef,
    /// Fixed at creation, no partial receipt
    pub quantity: u32,
    pub status: TransferStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency counter, bumped on every mutation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl Transfer {
    pub fn is_pending(&self) -> bool {
        self.status == TransferStatus::Pending
    }
}

/// Raw create request as entered by a user
///
/// Fields may be blank and quantity may be non-positive; see
/// [`crate::transfer::validator::validate_create_request`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransfer {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub from_warehouse_id: String,
    #[serde(default)]
    pub to_warehouse_id: String,
    #[serde(default)]
    pub quantity: i64,
}

impl CreateTransfer {
    pub fn new(
        product_id: impl Into<String>,
        from_warehouse_id: impl Into<String>,
        to_warehouse_id: impl Into<String>,
        quantity: i64,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            from_warehouse_id: from_warehouse_id.into(),
            to_warehouse_id: to_warehouse_id.into(),
            quantity,
        }
    }
}

/// Validated create request, ready to submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransfer {
    /// Idempotency key, sent out of band (header) rather than in the body
    #[serde(skip)]
    pub request_id: Uuid,
    pub product_id: String,
    pub from_warehouse_id: String,
    pub to_warehouse_id: String,
    pub quantity: u32,
}

/// Inventory item (read-only reference data)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    /// On-hand quantity as reported by the backend
    #[serde(default)]
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<String>,
}

/// Storage location (read-only reference data)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warehouse {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Reference data bundle, used to seed a local store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub warehouses: Vec<Warehouse>,
}
