//! Plain-text tables for the command line

use comfy_table::presets::NOTHING;
use comfy_table::{CellAlignment, Table};

use crate::transfer::{Product, Transfer, Warehouse};

fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING).set_header(headers.to_vec());
    table
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

pub fn transfer_table(transfers: &[Transfer]) -> String {
    let mut table = table(&["ID", "PRODUCT", "FROM", "TO", "QTY", "STATUS"]);
    for t in transfers {
        table.add_row(vec![
            t.id.to_string(),
            t.product.label().to_string(),
            t.from_warehouse.label().to_string(),
            t.to_warehouse.label().to_string(),
            t.quantity.to_string(),
            t.status.to_string(),
        ]);
    }
    align_column(&mut table, 4, CellAlignment::Right);
    table.to_string()
}

pub fn inventory_table(products: &[Product]) -> String {
    let mut table = table(&["ID", "NAME", "SKU", "QTY", "WAREHOUSE"]);
    for p in products {
        table.add_row(vec![
            p.id.clone(),
            p.name.clone(),
            p.sku.clone().unwrap_or_default(),
            p.quantity.to_string(),
            p.warehouse_id.clone().unwrap_or_default(),
        ]);
    }
    align_column(&mut table, 3, CellAlignment::Right);
    table.to_string()
}

pub fn warehouse_table(warehouses: &[Warehouse]) -> String {
    let mut table = table(&["ID", "NAME", "LOCATION"]);
    for w in warehouses {
        table.add_row(vec![
            w.id.clone(),
            w.name.clone(),
            w.location.clone().unwrap_or_default(),
        ]);
    }
    table.to_string()
}
