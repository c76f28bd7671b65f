//! Backend trait
//!
//! Defines the contract the coordinator needs from whatever holds the
//! transfers (REST service, embedded store, test double).

use async_trait::async_trait;

use crate::transfer::errors::TransferError;
use crate::transfer::types::{NewTransfer, Product, Transfer, TransferId, Warehouse};

/// Transfer backend - implemented by each storage/transport
///
/// Every call is a single round trip. Implementations never retry.
#[async_trait]
pub trait TransferBackend: Send + Sync {
    /// All transfers, in backend order
    async fn list_transfers(&self) -> Result<Vec<Transfer>, TransferError>;

    /// Create a Pending transfer
    ///
    /// `req.request_id` is an idempotency key: backends that honor it must
    /// return the original transfer when the same key is submitted again.
    async fn create_transfer(&self, req: &NewTransfer) -> Result<Transfer, TransferError>;

    /// Mark a Pending transfer as Received
    ///
    /// Returns:
    /// - `NotFound` when the id is unknown
    /// - `AlreadyReceived` when the transfer is already terminal
    async fn receive_transfer(&self, id: &TransferId) -> Result<Transfer, TransferError>;

    /// Inventory reference data
    async fn list_inventory(&self) -> Result<Vec<Product>, TransferError>;

    /// Warehouse reference data
    async fn list_warehouses(&self) -> Result<Vec<Warehouse>, TransferError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
