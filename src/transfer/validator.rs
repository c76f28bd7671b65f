use uuid::Uuid;

use crate::transfer::errors::TransferError;
use crate::transfer::types::{CreateTransfer, NewTransfer};

/// Validate a create request before it leaves the process
///
/// Ids are trimmed. Checks run in form order: product, source, destination,
/// quantity, then source != destination.
pub fn validate_create_request(req: &CreateTransfer) -> Result<NewTransfer, TransferError> {
    // 1. All references present
    let product_id = required("productId", &req.product_id)?;
    let from_warehouse_id = required("fromWarehouseId", &req.from_warehouse_id)?;
    let to_warehouse_id = required("toWarehouseId", &req.to_warehouse_id)?;

    // 2. Quantity must be a positive integer that fits the wire type
    let quantity = u32::try_from(req.quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or(TransferError::InvalidQuantity(req.quantity))?;

    // 3. Cannot transfer into the same warehouse
    if from_warehouse_id == to_warehouse_id {
        return Err(TransferError::SameWarehouse(from_warehouse_id));
    }

    Ok(NewTransfer {
        request_id: Uuid::new_v4(),
        product_id,
        from_warehouse_id,
        to_warehouse_id,
        quantity,
    })
}

fn required(field: &'static str, value: &str) -> Result<String, TransferError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TransferError::MissingField(field));
    }
    Ok(value.to_string())
}
