//! Product Aggregate

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Money, Quantity, Sku};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct Product {
    id: String,
    sku: Sku,
    name: String,
    slug: String,
    description: String,
    price: Money,
    compare_at_price: Option<Money>,
    material: Option<String>,
    room_type: Option<String>,
    specifications: Specifications,
    inventory: Quantity,
    status: ProductStatus,
    categories: Vec<String>,
    tags: Vec<String>,
    images: Vec<ProductImage>,
    rating: Decimal,
    review_count: u32,
    is_featured: bool,
    is_new: bool,
    is_bestseller: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

/// Furniture spec sheet shown on the product page.
#[derive(Clone, Debug, Default)]
pub struct Specifications {
    pub dimensions: Option<String>,
    pub weight: Option<String>,
    pub material: Option<String>,
    pub color: Option<String>,
    pub warranty: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ProductImage {
    pub url: String,
    pub alt: Option<String>,
    pub position: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ProductStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

impl Product {
    pub fn create(sku: Sku, name: impl Into<String>, price: Money) -> Self {
        let id = Uuid::new_v4().to_string();
        let name = name.into();
        let slug = slugify(&name);
        let now = Utc::now();
        let mut product = Self {
            id: id.clone(),
            sku: sku.clone(),
            name,
            slug,
            description: String::new(),
            price,
            compare_at_price: None,
            material: None,
            room_type: None,
            specifications: Specifications::default(),
            inventory: Quantity::default(),
            status: ProductStatus::Draft,
            categories: vec![],
            tags: vec![],
            images: vec![],
            rating: Decimal::ZERO,
            review_count: 0,
            is_featured: false,
            is_new: false,
            is_bestseller: false,
            created_at: now,
            updated_at: now,
            events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created {
            product_id: id,
            sku,
        }));
        product
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn sku(&self) -> &Sku {
        &self.sku
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn slug(&self) -> &str {
        &self.slug
    }
    pub fn price(&self) -> &Money {
        &self.price
    }
    pub fn compare_at_price(&self) -> Option<&Money> {
        self.compare_at_price.as_ref()
    }
    pub fn specifications(&self) -> &Specifications {
        &self.specifications
    }
    pub fn material(&self) -> Option<&str> {
        self.material.as_deref()
    }
    pub fn room_type(&self) -> Option<&str> {
        self.room_type.as_deref()
    }
    pub fn is_featured(&self) -> bool {
        self.is_featured
    }
    pub fn is_new(&self) -> bool {
        self.is_new
    }
    pub fn is_bestseller(&self) -> bool {
        self.is_bestseller
    }
    pub fn inventory(&self) -> &Quantity {
        &self.inventory
    }
    pub fn status(&self) -> &ProductStatus {
        &self.status
    }
    pub fn rating(&self) -> Decimal {
        self.rating
    }
    pub fn review_count(&self) -> u32 {
        self.review_count
    }
    pub fn is_in_stock(&self) -> bool {
        !self.inventory.is_zero()
    }

    pub fn set_catalog_details(
        &mut self,
        material: Option<String>,
        room_type: Option<String>,
        specifications: Specifications,
    ) {
        self.material = material;
        self.room_type = room_type;
        self.specifications = specifications;
        self.touch();
    }

    /// Strike-through price. Must exceed the selling price to show a discount.
    pub fn set_compare_at_price(&mut self, compare_at: Option<Money>) {
        self.compare_at_price = compare_at;
        self.touch();
    }

    /// Percentage off the compare-at price, rounded to whole percent.
    /// None when there is no compare-at price or no actual markdown.
    pub fn discount_percent(&self) -> Option<Decimal> {
        let compare_at = self.compare_at_price.as_ref()?;
        if compare_at.amount() <= self.price.amount() || compare_at.amount().is_zero() {
            return None;
        }
        let fraction = (compare_at.amount() - self.price.amount()) / compare_at.amount();
        Some(
            (fraction * Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    pub fn set_merchandising(&mut self, is_featured: bool, is_new: bool, is_bestseller: bool) {
        self.is_featured = is_featured;
        self.is_new = is_new;
        self.is_bestseller = is_bestseller;
        self.touch();
    }

    /// Fold a new review score into the running average.
    pub fn record_review(&mut self, score: Decimal) {
        let count = Decimal::from(self.review_count);
        self.rating = ((self.rating * count) + score) / (count + Decimal::ONE);
        self.review_count += 1;
        self.touch();
    }

    pub fn publish(&mut self) -> Result<(), ProductError> {
        if self.name.is_empty() {
            return Err(ProductError::MissingName);
        }
        self.status = ProductStatus::Active;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Published {
            product_id: self.id.clone(),
        }));
        Ok(())
    }

    pub fn archive(&mut self) {
        self.status = ProductStatus::Archived;
        self.touch();
    }

    pub fn update_price(&mut self, new_price: Money) {
        self.price = new_price;
        self.touch();
    }

    pub fn add_inventory(&mut self, qty: u32) {
        self.inventory = self.inventory.add(qty);
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::InventoryAdded {
            product_id: self.id.clone(),
            quantity: qty,
        }));
    }

    pub fn remove_inventory(&mut self, qty: u32) -> Result<(), ProductError> {
        self.inventory = self
            .inventory
            .subtract(qty)
            .ok_or(ProductError::InsufficientInventory)?;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::InventoryRemoved {
            product_id: self.id.clone(),
            quantity: qty,
        }));
        Ok(())
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

/// URL slug from the display name, storefront style.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[derive(Error, Debug, Clone)]
pub enum ProductError {
    #[error("Missing name")]
    MissingName,
    #[error("Insufficient inventory")]
    InsufficientInventory,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sofa() -> Product {
        Product::create(
            Sku::new("HVL-SOF-02").unwrap(),
            "Terracotta Modern Sofa",
            Money::inr(Decimal::new(64_999, 0)),
        )
    }

    #[test]
    fn create_slugs_the_name() {
        let p = sofa();
        assert_eq!(p.slug(), "terracotta-modern-sofa");
        assert_eq!(p.status(), &ProductStatus::Draft);
    }

    #[test]
    fn discount_percent_from_compare_at() {
        let mut p = sofa();
        p.set_compare_at_price(Some(Money::inr(Decimal::new(79_999, 0))));
        // (79999 - 64999) / 79999 = 18.75% -> 19
        assert_eq!(p.discount_percent(), Some(Decimal::new(19, 0)));
    }

    #[test]
    fn no_discount_when_compare_at_is_not_higher() {
        let mut p = sofa();
        assert_eq!(p.discount_percent(), None);
        p.set_compare_at_price(Some(Money::inr(Decimal::new(64_999, 0))));
        assert_eq!(p.discount_percent(), None);
    }

    #[test]
    fn review_average_is_running() {
        let mut p = sofa();
        p.record_review(Decimal::new(5, 0));
        p.record_review(Decimal::new(4, 0));
        assert_eq!(p.review_count(), 2);
        assert_eq!(p.rating(), Decimal::new(45, 1));
    }

    #[test]
    fn catalog_details_and_merchandising() {
        let mut p = sofa();
        p.set_catalog_details(
            Some("Cotton-Linen Blend Upholstery".into()),
            Some("Living Room".into()),
            Specifications {
                dimensions: Some("210cm x 88cm x 82cm".into()),
                warranty: Some("5 Years".into()),
                ..Specifications::default()
            },
        );
        p.set_merchandising(true, false, true);
        assert_eq!(p.room_type(), Some("Living Room"));
        assert!(p.is_featured());
        assert!(!p.is_new());
        assert!(p.is_bestseller());
        assert_eq!(p.specifications().warranty.as_deref(), Some("5 Years"));
    }

    #[test]
    fn inventory_flow() {
        let mut p = sofa();
        p.add_inventory(10);
        assert!(p.is_in_stock());
        p.remove_inventory(5).unwrap();
        assert_eq!(p.inventory().value(), 5);
        assert!(p.remove_inventory(6).is_err());
    }

    #[test]
    fn publish_requires_a_name() {
        let mut p = sofa();
        p.publish().unwrap();
        assert_eq!(p.status(), &ProductStatus::Active);
    }
}
