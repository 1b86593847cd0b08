use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// One row of the order ledger.
///
/// All fields arrive as strings from the agent's tool call; the ledger
/// stores them verbatim plus a server-generated timestamp.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    /// Customer first name
    pub first_name: String,
    /// Customer last name
    pub last_name: String,
    /// Delivery address
    pub address: String,
    /// Contact phone number
    pub phone: String,
    /// Purchased product title
    pub product: String,
    /// Quoted price
    pub price: String,
    /// Ordered quantity
    pub quantity: String,
    /// Server timestamp (`%Y-%m-%d %H:%M:%S`, local time)
    pub date: String,
}

/// Order fields supplied by the agent, before the timestamp is added
#[derive(Debug, Deserialize, Clone)]
pub struct NewOrder {
    /// Customer first name
    pub first_name: String,
    /// Customer last name
    pub last_name: String,
    /// Delivery address
    pub address: String,
    /// Contact phone number
    pub phone: String,
    /// Purchased product title
    pub product: String,
    /// Quoted price
    pub price: String,
    /// Ordered quantity
    pub quantity: String,
}

/// Flat JSON-backed order table.
///
/// Appends are read-modify-write over the whole file; there is no locking,
/// so concurrent sessions can race on the ledger.
#[derive(Debug, Clone)]
pub struct OrderLedger {
    path: PathBuf,
}

impl OrderLedger {
    /// Create a ledger handle for the given file path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read all rows; a missing file is an empty table
    pub fn load(&self) -> Result<Vec<OrderRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Append one row with a server timestamp and overwrite the file.
    ///
    /// Returns the updated table, which is also what gets reported back
    /// to the agent as the tool output.
    pub fn append(&self, order: NewOrder) -> Result<Vec<OrderRecord>> {
        let mut rows = self.load()?;

        let date = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        rows.push(OrderRecord {
            first_name: order.first_name,
            last_name: order.last_name,
            address: order.address,
            phone: order.phone,
            product: order.product,
            price: order.price,
            quantity: order.quantity,
            date,
        });

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string(&rows)?)?;

        tracing::info!("Order added to {}", self.path.display());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn sample_order(product: &str) -> NewOrder {
        NewOrder {
            first_name: "Sara".to_string(),
            last_name: "Ahmadi".to_string(),
            address: "12 Vali Asr".to_string(),
            phone: "0912000000".to_string(),
            product: product.to_string(),
            price: "250000".to_string(),
            quantity: "2".to_string(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_table() {
        let dir = assert_fs::TempDir::new().unwrap();
        let ledger = OrderLedger::new(dir.path().join("orders.json"));
        assert!(ledger.load().unwrap().is_empty());
    }

    #[test]
    fn test_append_and_reload() {
        let dir = assert_fs::TempDir::new().unwrap();
        let ledger = OrderLedger::new(dir.path().join("orders.json"));

        let rows = ledger.append(sample_order("red shoe")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].product, "red shoe");
        assert!(!rows[0].date.is_empty());

        let rows = ledger.append(sample_order("blue bag")).unwrap();
        assert_eq!(rows.len(), 2);

        // Reload from disk and compare
        let reloaded = ledger.load().unwrap();
        assert_eq!(reloaded, rows);
    }

    #[test]
    fn test_append_creates_parent_dir() {
        let dir = assert_fs::TempDir::new().unwrap();
        let ledger = OrderLedger::new(dir.path().join("nested/orders.json"));

        ledger.append(sample_order("green hat")).unwrap();
        dir.child("nested/orders.json").assert(predicates::path::exists());
    }
}
