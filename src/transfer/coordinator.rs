//! Transfer Coordinator
//!
//! Drives the create -> receive lifecycle against a backend and keeps the
//! board: the in-memory view of transfers this coordinator has fetched.
//! The board only changes after a backend call succeeds.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::transfer::adapters::TransferBackend;
use crate::transfer::errors::TransferError;
use crate::transfer::state::{can_apply, TransferEvent, TransferStatus};
use crate::transfer::types::{CreateTransfer, Product, Transfer, TransferId, Warehouse};
use crate::transfer::validator::validate_create_request;

pub struct TransferCoordinator {
    backend: Arc<dyn TransferBackend>,
    board: Mutex<Vec<Transfer>>,
}

impl TransferCoordinator {
    pub fn new(backend: Arc<dyn TransferBackend>) -> Self {
        Self {
            backend,
            board: Mutex::new(Vec::new()),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    // Never held across an await
    fn board(&self) -> MutexGuard<'_, Vec<Transfer>> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch all transfers and replace the board with them
    pub async fn list_transfers(&self) -> Result<Vec<Transfer>, TransferError> {
        let transfers = self.backend.list_transfers().await.map_err(|e| {
            log::error!("[{}] list transfers failed: {}", self.backend.name(), e);
            e
        })?;

        *self.board() = transfers.clone();
        log::debug!("Board refreshed: {} transfers", transfers.len());
        Ok(transfers)
    }

    /// Validate and submit a new transfer
    pub async fn create_transfer(&self, req: CreateTransfer) -> Result<Transfer, TransferError> {
        let validated = validate_create_request(&req).map_err(|e| {
            log::warn!("Rejected transfer request: {}", e);
            e
        })?;

        let transfer = self.backend.create_transfer(&validated).await.map_err(|e| {
            log::error!(
                "[{}] create transfer {} -> {} failed: {}",
                self.backend.name(),
                validated.from_warehouse_id,
                validated.to_warehouse_id,
                e
            );
            e
        })?;

        if transfer.status != TransferStatus::Pending || transfer.quantity != validated.quantity {
            return Err(TransferError::operation_failed(format!(
                "backend returned transfer {} as {} x{} (expected Pending x{})",
                transfer.id, transfer.status, transfer.quantity, validated.quantity
            )));
        }

        self.upsert(&transfer);
        log::info!(
            "Created transfer {}: {} x{} ({} -> {})",
            transfer.id,
            transfer.product.label(),
            transfer.quantity,
            transfer.from_warehouse.label(),
            transfer.to_warehouse.label()
        );
        Ok(transfer)
    }

    /// Confirm receipt of a Pending transfer
    pub async fn receive_transfer(&self, id: &TransferId) -> Result<Transfer, TransferError> {
        // Known terminal: reject without a round trip
        let known = self.get_transfer(id).map(|t| t.status);
        if let Some(status) = known {
            if !can_apply(status, TransferEvent::Receive) {
                log::warn!("Transfer {} is already {}", id, status);
                return Err(TransferError::AlreadyReceived(id.clone()));
            }
        }

        let transfer = self.backend.receive_transfer(id).await.map_err(|e| {
            log::error!("[{}] receive transfer {} failed: {}", self.backend.name(), id, e);
            e
        })?;

        if &transfer.id != id {
            return Err(TransferError::operation_failed(format!(
                "backend answered receive of {} with transfer {}",
                id, transfer.id
            )));
        }
        if transfer.status != TransferStatus::Received {
            return Err(TransferError::operation_failed(format!(
                "backend left transfer {} as {}",
                transfer.id, transfer.status
            )));
        }

        self.upsert(&transfer);
        log::info!("Received transfer {}", transfer.id);
        Ok(transfer)
    }

    /// Board lookup
    pub fn get_transfer(&self, id: &TransferId) -> Option<Transfer> {
        self.board().iter().find(|t| &t.id == id).cloned()
    }

    /// Board entries still awaiting receipt, in board order
    pub fn pending_transfers(&self) -> Vec<Transfer> {
        self.board().iter().filter(|t| t.is_pending()).cloned().collect()
    }

    pub async fn list_inventory(&self) -> Result<Vec<Product>, TransferError> {
        self.backend.list_inventory().await
    }

    pub async fn list_warehouses(&self) -> Result<Vec<Warehouse>, TransferError> {
        self.backend.list_warehouses().await
    }

    /// Replace the board entry with the same id, or append
    fn upsert(&self, transfer: &Transfer) {
        let mut board = self.board();
        match board.iter_mut().find(|t| t.id == transfer.id) {
            Some(slot) => *slot = transfer.clone(),
            None => board.push(transfer.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::adapters::MockBackend;
    use crate::transfer::types::NewTransfer;
    use async_trait::async_trait;

    /// Delegates to a mock but answers every receive with another transfer
    struct MisroutedReceive {
        inner: Arc<MockBackend>,
        answer: Transfer,
    }

    #[async_trait]
    impl TransferBackend for MisroutedReceive {
        async fn list_transfers(&self) -> Result<Vec<Transfer>, TransferError> {
            self.inner.list_transfers().await
        }

        async fn create_transfer(&self, req: &NewTransfer) -> Result<Transfer, TransferError> {
            self.inner.create_transfer(req).await
        }

        async fn receive_transfer(&self, _id: &TransferId) -> Result<Transfer, TransferError> {
            Ok(self.answer.clone())
        }

        async fn list_inventory(&self) -> Result<Vec<Product>, TransferError> {
            self.inner.list_inventory().await
        }

        async fn list_warehouses(&self) -> Result<Vec<Warehouse>, TransferError> {
            self.inner.list_warehouses().await
        }

        fn name(&self) -> &str {
            "misrouted"
        }
    }

    fn setup() -> (Arc<MockBackend>, TransferCoordinator) {
        let mock = Arc::new(MockBackend::new("mock"));
        let coordinator = TransferCoordinator::new(mock.clone());
        (mock, coordinator)
    }

    #[tokio::test]
    async fn test_create_then_receive() {
        let (_, coordinator) = setup();

        let created = coordinator
            .create_transfer(CreateTransfer::new("P1", "W1", "W2", 50))
            .await
            .unwrap();
        assert_eq!(created.status, TransferStatus::Pending);
        assert_eq!(created.quantity, 50);

        let received = coordinator.receive_transfer(&created.id).await.unwrap();
        assert_eq!(received.status, TransferStatus::Received);

        let listed = coordinator.list_transfers().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, TransferStatus::Received);
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_backend() {
        let (mock, coordinator) = setup();

        let bad = [
            CreateTransfer::new("P1", "W1", "W2", 0),
            CreateTransfer::new("P1", "W1", "W2", -4),
            CreateTransfer::new("", "W1", "W2", 5),
            CreateTransfer::new("P1", "", "W2", 5),
            CreateTransfer::new("P1", "W1", "", 5),
            CreateTransfer::new("P1", "W1", "W1", 5),
        ];
        for req in bad {
            let err = coordinator.create_transfer(req).await.unwrap_err();
            assert!(err.is_validation(), "unexpected error: {}", err);
        }

        assert_eq!(mock.calls(), 0);
        assert!(coordinator.pending_transfers().is_empty());
    }

    #[tokio::test]
    async fn test_failed_create_leaves_board_unchanged() {
        let (mock, coordinator) = setup();
        coordinator
            .create_transfer(CreateTransfer::new("P1", "W1", "W2", 10))
            .await
            .unwrap();
        let before = coordinator.pending_transfers();

        mock.fail_next("warehouse W2 is closed");
        let err = coordinator
            .create_transfer(CreateTransfer::new("P2", "W1", "W2", 3))
            .await
            .unwrap_err();

        assert_eq!(err, TransferError::operation_failed("warehouse W2 is closed"));
        assert_eq!(coordinator.pending_transfers(), before);
        assert_eq!(mock.transfers().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_receive_leaves_board_unchanged() {
        let (mock, coordinator) = setup();
        let created = coordinator
            .create_transfer(CreateTransfer::new("P1", "W1", "W2", 10))
            .await
            .unwrap();

        mock.fail_next("timeout");
        assert!(coordinator.receive_transfer(&created.id).await.is_err());

        let on_board = coordinator.get_transfer(&created.id).unwrap();
        assert_eq!(on_board.status, TransferStatus::Pending);
    }

    #[tokio::test]
    async fn test_second_receive_is_conflict_without_round_trip() {
        let (mock, coordinator) = setup();
        let created = coordinator
            .create_transfer(CreateTransfer::new("P1", "W1", "W2", 10))
            .await
            .unwrap();
        coordinator.receive_transfer(&created.id).await.unwrap();
        let calls = mock.calls();

        let err = coordinator.receive_transfer(&created.id).await.unwrap_err();
        assert_eq!(err, TransferError::AlreadyReceived(created.id.clone()));
        assert_eq!(mock.calls(), calls);
    }

    #[tokio::test]
    async fn test_receive_unlisted_transfer_goes_to_backend() {
        let (mock, coordinator) = setup();
        let created = coordinator
            .create_transfer(CreateTransfer::new("P1", "W1", "W2", 10))
            .await
            .unwrap();

        // Another coordinator, fresh board
        let other = TransferCoordinator::new(mock.clone());
        let received = other.receive_transfer(&created.id).await.unwrap();
        assert_eq!(received.status, TransferStatus::Received);
        assert!(other.get_transfer(&created.id).is_some());

        // Stale board on the first coordinator; the backend reports the conflict
        let err = coordinator.receive_transfer(&created.id).await.unwrap_err();
        assert_eq!(err, TransferError::AlreadyReceived(created.id.clone()));
    }

    #[tokio::test]
    async fn test_failed_list_keeps_previous_board() {
        let (mock, coordinator) = setup();
        coordinator
            .create_transfer(CreateTransfer::new("P1", "W1", "W2", 1))
            .await
            .unwrap();

        mock.fail_next("network down");
        assert!(coordinator.list_transfers().await.is_err());
        assert_eq!(coordinator.pending_transfers().len(), 1);
    }

    #[tokio::test]
    async fn test_pending_transfers_filters_received() {
        let (_, coordinator) = setup();
        let a = coordinator
            .create_transfer(CreateTransfer::new("P1", "W1", "W2", 1))
            .await
            .unwrap();
        let b = coordinator
            .create_transfer(CreateTransfer::new("P2", "W2", "W3", 2))
            .await
            .unwrap();
        coordinator.receive_transfer(&a.id).await.unwrap();

        let pending = coordinator.pending_transfers();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);
    }

    #[tokio::test]
    async fn test_receive_answer_for_other_transfer_is_rejected() {
        let mock = Arc::new(MockBackend::new("mock"));
        let other = validate_create_request(&CreateTransfer::new("P9", "W8", "W9", 3)).unwrap();
        let mut answer = mock.create_transfer(&other).await.unwrap();
        answer.status = TransferStatus::Received;

        let coordinator = TransferCoordinator::new(Arc::new(MisroutedReceive {
            inner: mock.clone(),
            answer: answer.clone(),
        }));
        let created = coordinator
            .create_transfer(CreateTransfer::new("P1", "W1", "W2", 10))
            .await
            .unwrap();
        assert_ne!(created.id, answer.id);

        let err = coordinator.receive_transfer(&created.id).await.unwrap_err();
        assert_eq!(err.error_code(), "OPERATION_FAILED");

        // The requested transfer is still Pending and nothing else was added
        let board = coordinator.pending_transfers();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].id, created.id);
        assert!(coordinator.get_transfer(&answer.id).is_none());
    }

    #[tokio::test]
    async fn test_stale_board_receive_reports_conflict() {
        let (mock, coordinator) = setup();
        let created = coordinator
            .create_transfer(CreateTransfer::new("P1", "W1", "W2", 10))
            .await
            .unwrap();
        coordinator.list_transfers().await.unwrap();

        // Another client receives it behind this coordinator's back
        let mut elsewhere = created.clone();
        elsewhere.status = TransferStatus::Received;
        mock.set_transfers(vec![elsewhere]);

        assert!(coordinator.get_transfer(&created.id).unwrap().is_pending());
        let err = coordinator.receive_transfer(&created.id).await.unwrap_err();
        assert_eq!(err, TransferError::AlreadyReceived(created.id.clone()));
        assert!(coordinator.get_transfer(&created.id).unwrap().is_pending());

        let listed = coordinator.list_transfers().await.unwrap();
        assert_eq!(listed[0].status, TransferStatus::Received);
        assert!(coordinator.pending_transfers().is_empty());
    }
}
