//! Transfer module - main module file
//!
//! Inter-warehouse stock transfers: lifecycle FSM, request validation,
//! backends, and the coordinator that ties them together.

pub mod state;
pub mod types;
pub mod errors;
pub mod validator;
pub mod coordinator;
pub mod adapters;

// Re-export commonly used types
pub use state::{TransferEvent, TransferStatus};
pub use types::{
    Catalog, CreateTransfer, EntityRef, NewTransfer, Product, Transfer, TransferId, Warehouse,
};
pub use errors::TransferError;
pub use coordinator::TransferCoordinator;
pub use adapters::{HttpBackend, LocalBackend, MockBackend, TransferBackend};
