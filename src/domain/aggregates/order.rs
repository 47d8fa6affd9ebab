//! Order Aggregate

use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::Money;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct Order {
    id: String,
    order_number: u64,
    customer_id: String,
    email: String,
    status: OrderStatus,
    fulfillment: FulfillmentStatus,
    payment: PaymentStatus,
    items: Vec<LineItem>,
    subtotal: Money,
    shipping: Money,
    tax: Money,
    discount: Money,
    total: Money,
    shipping_address: Option<Address>,
    billing_address: Option<Address>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug)]
pub struct LineItem {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total: Money,
}

#[derive(Clone, Debug, Default)]
pub struct Address {
    pub name: String,
    pub street1: String,
    pub street2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub zip: String,
    pub country: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FulfillmentStatus {
    #[default]
    Unfulfilled,
    Partial,
    Fulfilled,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Authorized,
    Paid,
    Refunded,
    Voided,
}

impl Order {
    pub fn create(
        order_number: u64,
        customer_id: impl Into<String>,
        email: impl Into<String>,
        currency: &str,
    ) -> Self {
        let now = Utc::now();
        let mut order = Self {
            id: Uuid::new_v4().to_string(),
            order_number,
            customer_id: customer_id.into(),
            email: email.into(),
            status: OrderStatus::Pending,
            fulfillment: FulfillmentStatus::Unfulfilled,
            payment: PaymentStatus::Pending,
            items: vec![],
            subtotal: Money::zero(currency),
            shipping: Money::zero(currency),
            tax: Money::zero(currency),
            discount: Money::zero(currency),
            total: Money::zero(currency),
            shipping_address: None,
            billing_address: None,
            notes: None,
            created_at: now,
            updated_at: now,
            events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Created {
            order_id: order.id.clone(),
            customer_id: order.customer_id.clone(),
        }));
        order
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn order_number(&self) -> u64 {
        self.order_number
    }
    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }
    pub fn email(&self) -> &str {
        &self.email
    }
    pub fn status(&self) -> &OrderStatus {
        &self.status
    }
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }
    pub fn subtotal(&self) -> &Money {
        &self.subtotal
    }
    pub fn shipping(&self) -> &Money {
        &self.shipping
    }
    pub fn tax(&self) -> &Money {
        &self.tax
    }
    pub fn discount(&self) -> &Money {
        &self.discount
    }
    pub fn total(&self) -> &Money {
        &self.total
    }

    pub fn add_item(&mut self, item: LineItem) {
        self.items.push(item);
        self.recalculate();
    }

    pub fn set_shipping_address(&mut self, address: Address) {
        self.shipping_address = Some(address);
        self.touch();
    }

    /// Shipping charge from the quote engine.
    pub fn set_shipping_charge(&mut self, shipping: Money) {
        self.shipping = shipping;
        self.recalculate();
    }

    /// GST portion extracted from the goods value. Catalog prices are
    /// GST-inclusive, so tax is informational and never added to the total.
    pub fn set_tax(&mut self, tax: Money) {
        self.tax = tax;
        self.touch();
    }

    pub fn set_discount(&mut self, discount: Money) {
        self.discount = discount;
        self.recalculate();
    }

    pub fn confirm(&mut self) -> Result<(), OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        self.status = OrderStatus::Confirmed;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Confirmed {
            order_id: self.id.clone(),
            total: self.total.amount(),
        }));
        Ok(())
    }

    pub fn mark_paid(&mut self) {
        self.payment = PaymentStatus::Paid;
        self.status = OrderStatus::Processing;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Paid {
            order_id: self.id.clone(),
        }));
    }

    pub fn ship(&mut self, tracking: Option<String>) {
        self.status = OrderStatus::Shipped;
        self.fulfillment = FulfillmentStatus::Fulfilled;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Shipped {
            order_id: self.id.clone(),
            tracking,
        }));
    }

    pub fn deliver(&mut self) {
        self.status = OrderStatus::Delivered;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Delivered {
            order_id: self.id.clone(),
        }));
    }

    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if self.status == OrderStatus::Delivered {
            return Err(OrderError::CannotCancel);
        }
        self.status = OrderStatus::Cancelled;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Cancelled {
            order_id: self.id.clone(),
        }));
        Ok(())
    }

    fn recalculate(&mut self) {
        self.subtotal = self
            .items
            .iter()
            .fold(Money::zero(self.subtotal.currency()), |acc, i| {
                acc.add(&i.total).unwrap_or(acc)
            });
        let after_discount = self
            .subtotal
            .subtract(&self.discount)
            .unwrap_or_else(|_| self.subtotal.clone());
        self.total = after_discount
            .add(&self.shipping)
            .unwrap_or(after_discount);
        self.touch();
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }
    fn raise_event(&mut self, e: DomainEvent) {
        self.events.push(e);
    }
    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Error, Debug, Clone)]
pub enum OrderError {
    #[error("No items")]
    NoItems,
    #[error("Cannot cancel")]
    CannotCancel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn line(product_id: &str, quantity: u32, unit: i64) -> LineItem {
        LineItem {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.into(),
            name: "Terracotta Modern Sofa".into(),
            sku: "HVL-SOF-02".into(),
            quantity,
            unit_price: Money::inr(Decimal::new(unit, 0)),
            total: Money::inr(Decimal::new(unit * quantity as i64, 0)),
        }
    }

    #[test]
    fn order_workflow() {
        let mut order = Order::create(1001, "CUST001", "asha@example.com", "INR");
        order.add_item(line("P1", 2, 10_000));
        order.confirm().unwrap();
        assert_eq!(order.status(), &OrderStatus::Confirmed);
        order.mark_paid();
        order.ship(Some("TRK-42".into()));
        assert_eq!(order.status(), &OrderStatus::Shipped);
        let events = order.take_events();
        assert_eq!(events.len(), 4); // created, confirmed, paid, shipped
    }

    #[test]
    fn totals_subtract_discount_and_add_shipping() {
        let mut order = Order::create(1002, "CUST002", "ravi@example.com", "INR");
        order.add_item(line("P1", 1, 64_999));
        order.set_discount(Money::inr(Decimal::new(5_000, 0)));
        order.set_shipping_charge(Money::inr(Decimal::new(650, 0)));
        // GST is informational, already inside the goods value.
        order.set_tax(Money::inr(Decimal::new(9_152, 0)));
        assert_eq!(order.subtotal().amount(), Decimal::new(64_999, 0));
        assert_eq!(order.total().amount(), Decimal::new(60_649, 0));
    }

    #[test]
    fn empty_order_cannot_confirm() {
        let mut order = Order::create(1003, "CUST003", "meera@example.com", "INR");
        assert!(order.confirm().is_err());
    }

    #[test]
    fn delivered_order_cannot_cancel() {
        let mut order = Order::create(1004, "CUST004", "arjun@example.com", "INR");
        order.add_item(line("P1", 1, 5_000));
        order.confirm().unwrap();
        order.mark_paid();
        order.ship(None);
        order.deliver();
        assert!(order.cancel().is_err());
    }
}
