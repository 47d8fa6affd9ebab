//! Haveli Commerce
//!
//! Self-hosted furniture e-commerce service.
//!
//! ## Features
//! - Furniture catalog with categories and merchandising flags
//! - Shopping cart and checkout with GST-inclusive pricing
//! - Distance-based shipping quotes with admin zone overrides
//! - Order tracking and return handling

use thiserror::Error;

pub mod domain;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Insufficient inventory for {sku}")]
    InsufficientInventory { sku: String },

    #[error("Invalid quantity")]
    InvalidQuantity,

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
