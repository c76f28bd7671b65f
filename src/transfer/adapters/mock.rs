//! Mock backend for testing
//!
//! Keeps transfers in memory and lets tests script failures.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::traits::TransferBackend;
use crate::transfer::errors::TransferError;
use crate::transfer::state::TransferStatus;
use crate::transfer::types::{
    Catalog, EntityRef, NewTransfer, Product, Transfer, TransferId, Warehouse,
};

#[derive(Default)]
struct MockState {
    transfers: Vec<Transfer>,
    catalog: Catalog,
    /// Fails the next call only
    next_failure: Option<String>,
    /// Fails every call until cleared
    failure: Option<String>,
    calls: usize,
    seq: u64,
}

/// Mock backend for testing
pub struct MockBackend {
    name: String,
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Mock preloaded with reference data used to denormalize names
    pub fn with_catalog(name: &str, catalog: Catalog) -> Self {
        let mock = Self::new(name);
        mock.lock().catalog = catalog;
        mock
    }

    /// Make the next call fail with `message`
    pub fn fail_next(&self, message: &str) {
        self.lock().next_failure = Some(message.to_string());
    }

    /// Make every call fail with `message` (None clears it)
    pub fn set_failure(&self, message: Option<&str>) {
        self.lock().failure = message.map(str::to_string);
    }

    /// Number of backend calls made so far
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    /// Snapshot of stored transfers
    pub fn transfers(&self) -> Vec<Transfer> {
        self.lock().transfers.clone()
    }

    /// Replace stored transfers, e.g. to simulate another client
    pub fn set_transfers(&self, transfers: Vec<Transfer>) {
        self.lock().transfers = transfers;
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and apply any scripted failure
    fn begin(&self, op: &str) -> Result<MutexGuard<'_, MockState>, TransferError> {
        let mut state = self.lock();
        state.calls += 1;
        log::debug!("[{}] {} (call #{})", self.name, op, state.calls);

        if let Some(message) = state.next_failure.take() {
            return Err(TransferError::operation_failed(message));
        }
        if let Some(message) = &state.failure {
            return Err(TransferError::operation_failed(message.clone()));
        }
        Ok(state)
    }
}

fn product_ref(catalog: &Catalog, id: &str) -> EntityRef {
    let name = catalog
        .products
        .iter()
        .find(|p| p.id == id)
        .map(|p| p.name.clone())
        .unwrap_or_default();
    EntityRef::new(id, name)
}

fn warehouse_ref(catalog: &Catalog, id: &str) -> EntityRef {
    let name = catalog
        .warehouses
        .iter()
        .find(|w| w.id == id)
        .map(|w| w.name.clone())
        .unwrap_or_default();
    EntityRef::new(id, name)
}

#[async_trait]
impl TransferBackend for MockBackend {
    async fn list_transfers(&self) -> Result<Vec<Transfer>, TransferError> {
        let state = self.begin("list_transfers")?;
        Ok(state.transfers.clone())
    }

    async fn create_transfer(&self, req: &NewTransfer) -> Result<Transfer, TransferError> {
        let mut state = self.begin("create_transfer")?;
        state.seq += 1;

        let transfer = Transfer {
            id: TransferId::new(format!("M{}", state.seq)),
            product: product_ref(&state.catalog, &req.product_id),
            from_warehouse: warehouse_ref(&state.catalog, &req.from_warehouse_id),
            to_warehouse: warehouse_ref(&state.catalog, &req.to_warehouse_id),
            quantity: req.quantity,
            status: TransferStatus::Pending,
            created_at: Some(Utc::now()),
            received_at: None,
            version: Some(1),
        };
        state.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn receive_transfer(&self, id: &TransferId) -> Result<Transfer, TransferError> {
        let mut state = self.begin("receive_transfer")?;
        let transfer = state
            .transfers
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| TransferError::NotFound(id.clone()))?;

        if transfer.status.is_terminal() {
            return Err(TransferError::AlreadyReceived(id.clone()));
        }
        transfer.status = TransferStatus::Received;
        transfer.received_at = Some(Utc::now());
        transfer.version = transfer.version.map(|v| v + 1);
        Ok(transfer.clone())
    }

    async fn list_inventory(&self) -> Result<Vec<Product>, TransferError> {
        let state = self.begin("list_inventory")?;
        Ok(state.catalog.products.clone())
    }

    async fn list_warehouses(&self) -> Result<Vec<Warehouse>, TransferError> {
        let state = self.begin("list_warehouses")?;
        Ok(state.catalog.warehouses.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
