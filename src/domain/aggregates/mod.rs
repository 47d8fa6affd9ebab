//! Aggregates module
pub mod cart;
pub mod order;
pub mod product;
pub mod returns;

pub use cart::{Cart, CartError, CartItem};
pub use order::{Address, LineItem, Order, OrderError, OrderStatus};
pub use product::{Product, ProductError, ProductStatus};
pub use returns::{RefundStatus, ReturnError, ReturnRequest, ReturnStatus};
