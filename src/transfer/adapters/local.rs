//! Embedded backend on sled
//!
//! Trees:
//! - `transfers`: transfer id -> JSON record
//! - `requests`: idempotency key -> transfer id
//! - `products` / `warehouses`: id -> JSON reference data
//!
//! Receive is a compare-and-swap on the stored record, so two concurrent
//! receivers cannot both succeed.

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionResult, TransactionError, TransactionResult};
use sled::{Batch, Db, IVec, Transactional, Tree};
use std::path::Path;

use super::traits::TransferBackend;
use crate::transfer::errors::TransferError;
use crate::transfer::state::{can_apply, transition, TransferEvent, TransferStatus};
use crate::transfer::types::{
    Catalog, EntityRef, NewTransfer, Product, Transfer, TransferId, Warehouse,
};

const TRANSFERS_TREE: &str = "transfers";
const REQUESTS_TREE: &str = "requests";
const PRODUCTS_TREE: &str = "products";
const WAREHOUSES_TREE: &str = "warehouses";

pub struct LocalBackend {
    db: Db,
    transfers: Tree,
    requests: Tree,
    products: Tree,
    warehouses: Tree,
}

impl LocalBackend {
    /// Open (or create) a store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        log::info!("Opening local transfer store at {}", path.display());
        Self::from_db(sled::open(path)?)
    }

    /// Store that is deleted when dropped
    pub fn temporary() -> Result<Self, TransferError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, TransferError> {
        Ok(Self {
            transfers: db.open_tree(TRANSFERS_TREE)?,
            requests: db.open_tree(REQUESTS_TREE)?,
            products: db.open_tree(PRODUCTS_TREE)?,
            warehouses: db.open_tree(WAREHOUSES_TREE)?,
            db,
        })
    }

    /// Load reference data; existing entries with the same id are replaced.
    /// Returns (products, warehouses) written.
    ///
    /// Everything is encoded up front and written in one transaction over
    /// both trees, so a bad entry leaves the catalog as it was.
    pub async fn import_catalog(&self, catalog: &Catalog) -> Result<(usize, usize), TransferError> {
        let mut product_batch = Batch::default();
        for product in &catalog.products {
            product_batch.insert(catalog_key("product", &product.id)?, to_ivec(product)?);
        }
        let mut warehouse_batch = Batch::default();
        for warehouse in &catalog.warehouses {
            warehouse_batch.insert(catalog_key("warehouse", &warehouse.id)?, to_ivec(warehouse)?);
        }

        let outcome: TransactionResult<(), ()> = (&self.products, &self.warehouses).transaction(
            |(products, warehouses)| -> ConflictableTransactionResult<(), ()> {
                products.apply_batch(&product_batch)?;
                warehouses.apply_batch(&warehouse_batch)?;
                Ok(())
            },
        );
        outcome.map_err(|e| tx_error("catalog import", e))?;
        self.db.flush_async().await?;

        log::info!(
            "Imported catalog: {} products, {} warehouses",
            catalog.products.len(),
            catalog.warehouses.len()
        );
        Ok((catalog.products.len(), catalog.warehouses.len()))
    }

    /// Monotonic, zero-padded so key order is creation order
    fn next_id(&self) -> Result<TransferId, TransferError> {
        Ok(TransferId::new(format!("TR-{:016}", self.db.generate_id()?)))
    }

    fn get_transfer(&self, id: &TransferId) -> Result<Option<Transfer>, TransferError> {
        get_json(&self.transfers, id.as_str())
    }

    fn product_ref(&self, id: &str) -> Result<EntityRef, TransferError> {
        let product: Product = get_json(&self.products, id)?
            .ok_or_else(|| TransferError::operation_failed(format!("unknown product {}", id)))?;
        Ok(EntityRef::new(product.id, product.name))
    }

    fn warehouse_ref(&self, id: &str) -> Result<EntityRef, TransferError> {
        let warehouse: Warehouse = get_json(&self.warehouses, id)?
            .ok_or_else(|| TransferError::operation_failed(format!("unknown warehouse {}", id)))?;
        Ok(EntityRef::new(warehouse.id, warehouse.name))
    }
}

fn get_json<T: DeserializeOwned>(tree: &Tree, key: &str) -> Result<Option<T>, TransferError> {
    match tree.get(key.as_bytes())? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn scan_json<T: DeserializeOwned>(tree: &Tree) -> Result<Vec<T>, TransferError> {
    tree.iter()
        .values()
        .map(|value| -> Result<T, TransferError> { Ok(serde_json::from_slice(&value?)?) })
        .collect()
}

fn catalog_key(kind: &str, id: &str) -> Result<IVec, TransferError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(TransferError::Storage(format!("{} with a blank id", kind)));
    }
    Ok(IVec::from(id.as_bytes()))
}

fn tx_error(what: &str, err: TransactionError<()>) -> TransferError {
    match err {
        TransactionError::Storage(e) => e.into(),
        TransactionError::Abort(()) => TransferError::Storage(format!("{} transaction aborted", what)),
    }
}

fn to_ivec<T: Serialize>(value: &T) -> Result<IVec, TransferError> {
    Ok(IVec::from(serde_json::to_vec(value)?))
}

#[async_trait]
impl TransferBackend for LocalBackend {
    async fn list_transfers(&self) -> Result<Vec<Transfer>, TransferError> {
        scan_json(&self.transfers)
    }

    async fn create_transfer(&self, req: &NewTransfer) -> Result<Transfer, TransferError> {
        let request_key = req.request_id.to_string();

        // Replayed request: hand back the original
        if let Some(existing) = self.requests.get(request_key.as_bytes())? {
            let id = TransferId::new(String::from_utf8_lossy(&existing).into_owned());
            log::info!("Replayed create request {} -> transfer {}", request_key, id);
            return self
                .get_transfer(&id)?
                .ok_or(TransferError::NotFound(id));
        }

        let transfer = Transfer {
            id: self.next_id()?,
            product: self.product_ref(&req.product_id)?,
            from_warehouse: self.warehouse_ref(&req.from_warehouse_id)?,
            to_warehouse: self.warehouse_ref(&req.to_warehouse_id)?,
            quantity: req.quantity,
            status: TransferStatus::Pending,
            created_at: Some(Utc::now()),
            received_at: None,
            version: Some(1),
        };
        let encoded = to_ivec(&transfer)?;
        let id_bytes = IVec::from(transfer.id.as_str().as_bytes());

        // Record the request key and the transfer together; a racing replay
        // of the same key wins or loses as a whole.
        let outcome: TransactionResult<Option<IVec>, ()> = (&self.transfers, &self.requests)
            .transaction(|(transfers, requests)| -> ConflictableTransactionResult<Option<IVec>, ()> {
                if let Some(existing) = requests.get(request_key.as_bytes())? {
                    return Ok(Some(existing));
                }
                requests.insert(request_key.as_bytes(), id_bytes.clone())?;
                transfers.insert(id_bytes.clone(), encoded.clone())?;
                Ok(None)
            });

        let existing = outcome.map_err(|e| tx_error("create", e))?;
        self.db.flush_async().await?;

        match existing {
            Some(id) => {
                let id = TransferId::new(String::from_utf8_lossy(&id).into_owned());
                self.get_transfer(&id)?.ok_or(TransferError::NotFound(id))
            }
            None => Ok(transfer),
        }
    }

    async fn receive_transfer(&self, id: &TransferId) -> Result<Transfer, TransferError> {
        loop {
            let current = self
                .transfers
                .get(id.as_str().as_bytes())?
                .ok_or_else(|| TransferError::NotFound(id.clone()))?;
            let mut transfer: Transfer = serde_json::from_slice(&current)?;

            if !can_apply(transfer.status, TransferEvent::Receive) {
                return Err(TransferError::AlreadyReceived(id.clone()));
            }
            transfer.status = transition(transfer.status, TransferEvent::Receive);
            transfer.received_at = Some(Utc::now());
            transfer.version = Some(transfer.version.unwrap_or(0) + 1);

            let swapped = self.transfers.compare_and_swap(
                id.as_str().as_bytes(),
                Some(current),
                Some(to_ivec(&transfer)?),
            )?;
            match swapped {
                Ok(()) => {
                    self.db.flush_async().await?;
                    return Ok(transfer);
                }
                // Record changed underneath us; re-read and re-check
                Err(_) => log::warn!("Concurrent update on transfer {}, re-checking", id),
            }
        }
    }

    async fn list_inventory(&self) -> Result<Vec<Product>, TransferError> {
        scan_json(&self.products)
    }

    async fn list_warehouses(&self) -> Result<Vec<Warehouse>, TransferError> {
        scan_json(&self.warehouses)
    }

    fn name(&self) -> &str {
        "local"
    }
}
