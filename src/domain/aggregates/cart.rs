//! Cart Aggregate

use crate::domain::value_objects::Money;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct Cart {
    id: String,
    customer_id: Option<String>,
    session_id: Option<String>,
    items: Vec<CartItem>,
    subtotal: Money,
    currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct CartItem {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub name: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

impl Cart {
    pub fn new(currency: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            customer_id: None,
            session_id: None,
            items: vec![],
            subtotal: Money::zero(currency),
            currency: currency.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Guest cart keyed by the storefront session.
    pub fn for_session(session_id: impl Into<String>, currency: &str) -> Self {
        let mut cart = Self::new(currency);
        cart.session_id = Some(session_id.into());
        cart
    }

    pub fn for_customer(customer_id: impl Into<String>, currency: &str) -> Self {
        let mut cart = Self::new(currency);
        cart.customer_id = Some(customer_id.into());
        cart
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }
    pub fn subtotal(&self) -> &Money {
        &self.subtotal
    }
    /// Number of distinct lines.
    pub fn line_count(&self) -> usize {
        self.items.len()
    }
    /// Total units across all lines, the storefront's cart badge count.
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    pub fn is_in_cart(&self, product_id: &str) -> bool {
        self.items.iter().any(|i| i.product_id == product_id)
    }

    pub fn add_item(&mut self, item: CartItem) {
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|i| i.product_id == item.product_id && i.variant_id == item.variant_id)
        {
            existing.quantity += item.quantity;
        } else {
            self.items.push(item);
        }
        self.recalculate();
    }

    /// Set a line's quantity; zero or less removes the line.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> Result<(), CartError> {
        if !self.is_in_cart(product_id) {
            return Err(CartError::ItemNotFound);
        }
        if quantity <= 0 {
            self.items.retain(|i| i.product_id != product_id);
        } else if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            item.quantity = quantity as u32;
        }
        self.recalculate();
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: &str) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() == before {
            return Err(CartError::ItemNotFound);
        }
        self.recalculate();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.recalculate();
    }

    fn recalculate(&mut self) {
        self.subtotal = self
            .items
            .iter()
            .fold(Money::zero(&self.currency), |acc, i| {
                acc.add(&i.line_total()).unwrap_or(acc)
            });
        self.updated_at = Utc::now();
    }
}

#[derive(Error, Debug, Clone)]
pub enum CartError {
    #[error("Item not found")]
    ItemNotFound,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn item(product_id: &str, quantity: u32, price: i64) -> CartItem {
        CartItem {
            product_id: product_id.into(),
            variant_id: None,
            name: "Nordic Oak Dining Set".into(),
            sku: "HVL-DIN-01".into(),
            quantity,
            unit_price: Money::inr(Decimal::new(price, 0)),
        }
    }

    #[test]
    fn add_merges_same_product() {
        let mut cart = Cart::for_session("sess-1", "INR");
        cart.add_item(item("P1", 2, 10_000));
        cart.add_item(item("P1", 1, 10_000));
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.subtotal().amount(), Decimal::new(30_000, 0));
    }

    #[test]
    fn unit_count_sums_quantities() {
        let mut cart = Cart::new("INR");
        cart.add_item(item("P1", 2, 5_000));
        cart.add_item(item("P2", 3, 1_000));
        assert_eq!(cart.line_count(), 2);
        assert_eq!(cart.unit_count(), 5);
    }

    #[test]
    fn zero_quantity_update_removes_the_line() {
        let mut cart = Cart::new("INR");
        cart.add_item(item("P1", 2, 5_000));
        cart.update_quantity("P1", 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal().amount(), Decimal::ZERO);
    }

    #[test]
    fn update_of_missing_line_errors() {
        let mut cart = Cart::new("INR");
        assert!(cart.update_quantity("P1", 2).is_err());
    }

    #[test]
    fn membership_check_matches_storefront() {
        let mut cart = Cart::new("INR");
        cart.add_item(item("P1", 1, 5_000));
        assert!(cart.is_in_cart("P1"));
        assert!(!cart.is_in_cart("P2"));
        cart.remove_item("P1").unwrap();
        assert!(!cart.is_in_cart("P1"));
    }
}
