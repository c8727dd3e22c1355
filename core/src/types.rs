//! Payload DTOs for the demo store.
//!
//! # Design
//! These mirror the mock-server's JSON schema but are defined independently;
//! the scenario tests catch any drift between the two crates.

use serde::{Deserialize, Serialize};

/// A catalog entry returned by `GET /products`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub category: String,
    pub price_cents: u64,
}

/// One line of a cart, priced at the time it was added.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartItem {
    pub product_id: u32,
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: u64,
}

/// Contents of the session's cart as returned by `GET /cart`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub total_cents: u64,
}

impl Cart {
    /// Total quantity of `product_id` across all lines.
    pub fn quantity_of(&self, product_id: u32) -> u32 {
        self.items
            .iter()
            .filter(|item| item.product_id == product_id)
            .fold(0u32, |total, item| total.saturating_add(item.quantity))
    }
}

/// Body of a successful `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub token: String,
}
