//! Haveli Commerce - Self-hosted Furniture E-commerce Service

use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::{get, post, put}, Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use validator::Validate;

use haveli_commerce::domain::aggregates::cart::{Cart, CartItem};
use haveli_commerce::domain::aggregates::order::{LineItem, Order};
use haveli_commerce::domain::aggregates::product::slugify;
use haveli_commerce::domain::aggregates::returns::ReturnRequest;
use haveli_commerce::domain::events::{DomainEvent, OrderEvent};
use haveli_commerce::domain::shipping::{self, ShippingQuote, ShippingSettings, ShippingZone};
use haveli_commerce::domain::tax;
use haveli_commerce::domain::value_objects::{Money, Sku};
use haveli_commerce::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid, pub sku: String, pub name: String, pub slug: String, pub description: Option<String>,
    pub price: i64, pub compare_at_price: Option<i64>, pub currency: String,
    pub category_id: Option<Uuid>, pub material: Option<String>, pub room_type: Option<String>,
    pub specifications: serde_json::Value, pub inventory_quantity: i32, pub status: String,
    pub images: Vec<String>, pub tags: Vec<String>, pub rating: f64, pub review_count: i32,
    pub is_featured: bool, pub is_new: bool, pub is_bestseller: bool,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryRow { pub id: Uuid, pub name: String, pub slug: String, pub description: Option<String>, pub parent_id: Option<Uuid>, pub image_url: Option<String>, pub created_at: DateTime<Utc> }

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid, pub order_number: String, pub customer_id: Option<Uuid>, pub customer_email: String,
    pub status: String, pub subtotal: i64, pub tax: i64, pub shipping: i64, pub discount: i64, pub total: i64,
    pub currency: String, pub distance_km: i64, pub shipping_address: serde_json::Value, pub billing_address: serde_json::Value,
    pub payment_status: String, pub fulfillment_status: String,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItemRow { pub id: Uuid, pub order_id: Uuid, pub product_id: Uuid, pub sku: String, pub name: String, pub quantity: i32, pub unit_price: i64, pub total: i64 }

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReturnRow { pub id: Uuid, pub order_id: Uuid, pub reason: String, pub status: String, pub refund_amount: Option<i64>, pub refund_status: Option<String>, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc> }

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SettingsRow { pub free_shipping_threshold: i64, pub distance_free_radius: i64, pub shipping_per_km_rate: i64, pub base_shipping_rate: i64, pub tax_rate: Option<String> }

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ZoneRow {
    pub id: Uuid, pub name: String, pub regions: Vec<String>,
    pub base_rate: Option<i64>, pub free_shipping_threshold: Option<i64>, pub distance_free_radius: Option<i64>,
    pub per_km_rate: Option<i64>, pub max_shipping_distance: Option<i64>,
    pub estimated_days_min: Option<i32>, pub estimated_days_max: Option<i32>, pub is_active: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartLineRow { pub product_id: Uuid, pub quantity: i32, pub name: String, pub sku: String, pub price: i64, pub currency: String }

impl From<SettingsRow> for ShippingSettings {
    fn from(r: SettingsRow) -> Self {
        Self {
            free_shipping_threshold: Decimal::from(r.free_shipping_threshold),
            distance_free_radius: Decimal::from(r.distance_free_radius),
            shipping_per_km_rate: Decimal::from(r.shipping_per_km_rate),
            base_shipping_rate: Decimal::from(r.base_shipping_rate),
        }
    }
}

impl From<ZoneRow> for ShippingZone {
    fn from(r: ZoneRow) -> Self {
        Self {
            id: Some(r.id),
            name: Some(r.name),
            regions: r.regions,
            base_rate: r.base_rate.map(Decimal::from),
            free_shipping_threshold: r.free_shipping_threshold.map(Decimal::from),
            distance_free_radius: r.distance_free_radius.map(Decimal::from),
            per_km_rate: r.per_km_rate.map(Decimal::from),
            max_shipping_distance: r.max_shipping_distance.map(Decimal::from),
            estimated_days_min: r.estimated_days_min,
            estimated_days_max: r.estimated_days_max,
            is_active: r.is_active,
        }
    }
}

#[derive(Clone)] pub struct AppState { pub db: sqlx::PgPool, pub nats: Option<async_nats::Client> }

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let db = PgPoolOptions::new().max_connections(10).connect(&std::env::var("DATABASE_URL")?).await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    let nats = match std::env::var("NATS_URL") {
        Ok(url) => async_nats::connect(&url).await.ok(),
        Err(_) => None,
    };
    let state = AppState { db, nats };

    let app = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "haveli-commerce"})) }))
        .route("/api/v1/products", get(list_products).post(create_product))
        .route("/api/v1/products/:id", get(get_product).put(update_product).delete(delete_product))
        .route("/api/v1/categories", get(list_categories).post(create_category))
        .route("/api/v1/categories/:id", get(get_category))
        .route("/api/v1/cart/:session", get(get_cart).post(add_to_cart).delete(clear_cart))
        .route("/api/v1/cart/:session/items/:product_id", put(update_cart_item))
        .route("/api/v1/shipping/quote", post(shipping_quote))
        .route("/api/v1/shipping/zones", get(list_shipping_zones))
        .route("/api/v1/settings/shipping", get(get_shipping_settings))
        .route("/api/v1/checkout", post(checkout))
        .route("/api/v1/orders", get(list_orders))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/orders/:id/items", get(list_order_items))
        .route("/api/v1/orders/:id/return", post(request_return))
        .route("/api/v1/orders/track/:number", get(track_order))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8084".to_string());
    tracing::info!("Haveli Commerce listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}

#[derive(Debug, Deserialize)] pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32>, pub category: Option<Uuid>, pub search: Option<String> }
#[derive(Debug, Serialize)] pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: i64, pub page: u32 }

// The orders ledger stores whole units (rupees, km).
fn round_whole(v: Decimal) -> i64 {
    v.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero).to_i64().unwrap_or(0)
}

fn error_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::ProductNotFound | StoreError::OrderNotFound => StatusCode::NOT_FOUND,
        StoreError::EmptyCart | StoreError::InvalidQuantity => StatusCode::UNPROCESSABLE_ENTITY,
        StoreError::InsufficientInventory { .. } => StatusCode::CONFLICT,
        StoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<ProductRow>>, (StatusCode, String)> {
    let page = p.page.unwrap_or(1).max(1); let per_page = p.per_page.unwrap_or(20).min(100);
    let products = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE status = 'active' AND ($1::uuid IS NULL OR category_id = $1) AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%') ORDER BY created_at DESC LIMIT $3 OFFSET $4")
        .bind(p.category).bind(&p.search).bind(per_page as i64).bind(((page-1)*per_page) as i64).fetch_all(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE status = 'active' AND ($1::uuid IS NULL OR category_id = $1) AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%')")
        .bind(p.category).bind(&p.search).fetch_one(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(PaginatedResponse { data: products, total: total.0, page }))
}

async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ProductRow>, (StatusCode, String)> {
    sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?.map(Json).ok_or((StatusCode::NOT_FOUND, "Not found".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String, pub description: Option<String>, pub price: i64, pub compare_at_price: Option<i64>,
    pub category_id: Option<Uuid>, pub material: Option<String>, pub room_type: Option<String>,
    pub inventory_quantity: Option<i32>, pub sku: Option<String>,
}

async fn create_product(State(s): State<AppState>, Json(r): Json<CreateProductRequest>) -> Result<(StatusCode, Json<ProductRow>), (StatusCode, String)> {
    let sku = match r.sku {
        Some(raw) => Sku::new(raw).map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?,
        None => Sku::new(format!("HVL-{:08}", rand::random::<u32>())).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?,
    };
    let slug = slugify(&r.name);
    let p = sqlx::query_as::<_, ProductRow>("INSERT INTO products (id, sku, name, slug, description, price, compare_at_price, currency, category_id, material, room_type, inventory_quantity, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, 'INR', $8, $9, $10, $11, 'active', NOW(), NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(sku.as_str()).bind(&r.name).bind(&slug).bind(&r.description).bind(r.price).bind(r.compare_at_price).bind(r.category_id).bind(&r.material).bind(&r.room_type).bind(r.inventory_quantity.unwrap_or(0))
        .fetch_one(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok((StatusCode::CREATED, Json(p)))
}

async fn update_product(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<CreateProductRequest>) -> Result<Json<ProductRow>, (StatusCode, String)> {
    let p = sqlx::query_as::<_, ProductRow>("UPDATE products SET name = $2, description = $3, price = $4, compare_at_price = $5, category_id = $6, material = $7, room_type = $8, inventory_quantity = $9, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(&r.name).bind(&r.description).bind(r.price).bind(r.compare_at_price).bind(r.category_id).bind(&r.material).bind(&r.room_type).bind(r.inventory_quantity.unwrap_or(0))
        .fetch_optional(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?.ok_or((StatusCode::NOT_FOUND, "Not found".to_string()))?;
    Ok(Json(p))
}

async fn delete_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, (StatusCode, String)> {
    sqlx::query("UPDATE products SET status = 'archived', updated_at = NOW() WHERE id = $1").bind(id).execute(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_categories(State(s): State<AppState>) -> Result<Json<Vec<CategoryRow>>, (StatusCode, String)> {
    let cats = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories ORDER BY name").fetch_all(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(cats))
}

async fn get_category(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CategoryRow>, (StatusCode, String)> {
    sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE id = $1").bind(id).fetch_optional(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?.map(Json).ok_or((StatusCode::NOT_FOUND, "Not found".to_string()))
}

#[derive(Debug, Deserialize)] pub struct CreateCategoryRequest { pub name: String, pub description: Option<String>, pub parent_id: Option<Uuid> }

async fn create_category(State(s): State<AppState>, Json(r): Json<CreateCategoryRequest>) -> Result<(StatusCode, Json<CategoryRow>), (StatusCode, String)> {
    let slug = slugify(&r.name);
    let c = sqlx::query_as::<_, CategoryRow>("INSERT INTO categories (id, name, slug, description, parent_id, created_at) VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING *")
        .bind(Uuid::now_v7()).bind(&r.name).bind(&slug).bind(&r.description).bind(r.parent_id)
        .fetch_one(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok((StatusCode::CREATED, Json(c)))
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Serialize)] pub struct CartLineView { pub product_id: String, pub name: String, pub sku: String, pub quantity: u32, pub unit_price: Decimal, pub line_total: Decimal }
#[derive(Debug, Serialize)] pub struct CartView { pub session_id: String, pub items: Vec<CartLineView>, pub subtotal: Decimal, pub unit_count: u32 }

fn build_cart(session: &str, rows: Vec<CartLineRow>) -> Cart {
    let mut cart = Cart::for_session(session, "INR");
    for row in rows {
        cart.add_item(CartItem {
            product_id: row.product_id.to_string(),
            variant_id: None,
            name: row.name,
            sku: row.sku,
            quantity: row.quantity.max(0) as u32,
            unit_price: Money::new(Decimal::from(row.price), &row.currency),
        });
    }
    cart
}

fn cart_view(cart: &Cart) -> CartView {
    CartView {
        session_id: cart.session_id().unwrap_or_default().to_string(),
        items: cart.items().iter().map(|i| CartLineView {
            product_id: i.product_id.clone(), name: i.name.clone(), sku: i.sku.clone(),
            quantity: i.quantity, unit_price: i.unit_price.amount(), line_total: i.line_total().amount(),
        }).collect(),
        subtotal: cart.subtotal().amount(),
        unit_count: cart.unit_count(),
    }
}

async fn load_cart_lines(db: &sqlx::PgPool, session: &str) -> Result<Vec<CartLineRow>, sqlx::Error> {
    sqlx::query_as::<_, CartLineRow>("SELECT c.product_id, c.quantity, p.name, p.sku, p.price, p.currency FROM cart_items c JOIN products p ON p.id = c.product_id WHERE c.session_id = $1 ORDER BY c.created_at")
        .bind(session).fetch_all(db).await
}

async fn get_cart(State(s): State<AppState>, Path(session): Path<String>) -> Result<Json<CartView>, (StatusCode, String)> {
    let rows = load_cart_lines(&s.db, &session).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(cart_view(&build_cart(&session, rows))))
}

#[derive(Debug, Deserialize)] pub struct AddToCartRequest { pub product_id: Uuid, pub quantity: i32 }

async fn add_to_cart(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<AddToCartRequest>) -> Result<(StatusCode, Json<CartView>), (StatusCode, String)> {
    if r.quantity < 1 {
        let e = StoreError::InvalidQuantity;
        return Err((error_status(&e), e.to_string()));
    }
    let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1 AND status = 'active'").bind(r.product_id).fetch_optional(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if exists.is_none() {
        let e = StoreError::ProductNotFound;
        return Err((error_status(&e), e.to_string()));
    }
    sqlx::query("INSERT INTO cart_items (id, session_id, product_id, quantity, created_at) VALUES ($1, $2, $3, $4, NOW()) ON CONFLICT (session_id, product_id) DO UPDATE SET quantity = cart_items.quantity + $4")
        .bind(Uuid::now_v7()).bind(&session).bind(r.product_id).bind(r.quantity)
        .execute(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let rows = load_cart_lines(&s.db, &session).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok((StatusCode::CREATED, Json(cart_view(&build_cart(&session, rows)))))
}

#[derive(Debug, Deserialize)] pub struct UpdateCartItemRequest { pub quantity: i64 }

async fn update_cart_item(State(s): State<AppState>, Path((session, product_id)): Path<(String, Uuid)>, Json(r): Json<UpdateCartItemRequest>) -> Result<Json<CartView>, (StatusCode, String)> {
    // Zero or negative clears the line, storefront semantics.
    let result = if r.quantity <= 0 {
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1 AND product_id = $2").bind(&session).bind(product_id).execute(&s.db).await
    } else {
        sqlx::query("UPDATE cart_items SET quantity = $3 WHERE session_id = $1 AND product_id = $2").bind(&session).bind(product_id).bind(r.quantity as i32).execute(&s.db).await
    };
    let affected = result.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?.rows_affected();
    if affected == 0 {
        return Err((StatusCode::NOT_FOUND, "Not in cart".to_string()));
    }
    let rows = load_cart_lines(&s.db, &session).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(cart_view(&build_cart(&session, rows))))
}

async fn clear_cart(State(s): State<AppState>, Path(session): Path<String>) -> Result<StatusCode, (StatusCode, String)> {
    sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(&session).execute(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Shipping
// =============================================================================

async fn load_settings_row(db: &sqlx::PgPool) -> Result<Option<SettingsRow>, sqlx::Error> {
    sqlx::query_as::<_, SettingsRow>("SELECT free_shipping_threshold, distance_free_radius, shipping_per_km_rate, base_shipping_rate, tax_rate FROM store_settings LIMIT 1").fetch_optional(db).await
}

async fn load_zones(db: &sqlx::PgPool) -> Result<Vec<ShippingZone>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ZoneRow>("SELECT id, name, regions, base_rate, free_shipping_threshold, distance_free_radius, per_km_rate, max_shipping_distance, estimated_days_min, estimated_days_max, is_active FROM shipping_zones ORDER BY created_at").fetch_all(db).await?;
    Ok(rows.into_iter().map(ShippingZone::from).collect())
}

#[derive(Debug, Deserialize)] pub struct QuoteRequest { pub cart_total: Decimal, pub distance_km: Option<Decimal> }

async fn shipping_quote(State(s): State<AppState>, Json(r): Json<QuoteRequest>) -> Result<Json<ShippingQuote>, (StatusCode, String)> {
    let settings = load_settings_row(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?.map(ShippingSettings::from);
    let zones = load_zones(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(shipping::quote(r.cart_total, r.distance_km.unwrap_or(Decimal::ZERO), &zones, settings.as_ref())))
}

async fn list_shipping_zones(State(s): State<AppState>) -> Result<Json<Vec<ShippingZone>>, (StatusCode, String)> {
    let zones = load_zones(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(zones))
}

async fn get_shipping_settings(State(s): State<AppState>) -> Result<Json<ShippingSettings>, (StatusCode, String)> {
    let settings = load_settings_row(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?.map(ShippingSettings::from).unwrap_or_default();
    Ok(Json(settings))
}

// =============================================================================
// Checkout and orders
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    pub session_id: String,
    #[validate(email)]
    pub customer_email: String,
    pub distance_km: Option<Decimal>,
    pub shipping_address: serde_json::Value,
    pub notes: Option<String>,
}

async fn checkout(State(s): State<AppState>, Json(r): Json<CheckoutRequest>) -> Result<(StatusCode, Json<OrderRow>), (StatusCode, String)> {
    r.validate().map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    let row = place_order(&s, r).await.map_err(|e| (error_status(&e), e.to_string()))?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// Cart to order: subtotal from the cart aggregate, shipping from the quote
/// engine, GST extracted from the GST-inclusive goods value, inventory
/// decremented, everything persisted in one transaction.
async fn place_order(s: &AppState, r: CheckoutRequest) -> haveli_commerce::Result<OrderRow> {
    let distance_km = r.distance_km.unwrap_or(Decimal::ZERO);
    let mut tx = s.db.begin().await?;

    let lines = sqlx::query_as::<_, CartLineRow>("SELECT c.product_id, c.quantity, p.name, p.sku, p.price, p.currency FROM cart_items c JOIN products p ON p.id = c.product_id WHERE c.session_id = $1 ORDER BY c.created_at FOR UPDATE")
        .bind(&r.session_id).fetch_all(&mut *tx).await?;
    if lines.is_empty() {
        return Err(StoreError::EmptyCart);
    }
    let cart = build_cart(&r.session_id, lines);
    let subtotal = cart.subtotal().amount();

    let settings_row = sqlx::query_as::<_, SettingsRow>("SELECT free_shipping_threshold, distance_free_radius, shipping_per_km_rate, base_shipping_rate, tax_rate FROM store_settings LIMIT 1").fetch_optional(&mut *tx).await?;
    let zone_rows = sqlx::query_as::<_, ZoneRow>("SELECT id, name, regions, base_rate, free_shipping_threshold, distance_free_radius, per_km_rate, max_shipping_distance, estimated_days_min, estimated_days_max, is_active FROM shipping_zones ORDER BY created_at").fetch_all(&mut *tx).await?;
    let zones: Vec<ShippingZone> = zone_rows.into_iter().map(ShippingZone::from).collect();
    let tax_rate = tax::gst_rate(settings_row.as_ref().and_then(|row| row.tax_rate.as_deref()));
    let settings = settings_row.map(ShippingSettings::from);

    let quote = shipping::quote(subtotal, distance_km, &zones, settings.as_ref());
    let gst = tax::price_breakdown(subtotal, tax_rate).gst_amount;

    let order_number: u32 = rand::random();
    let mut order = Order::create(u64::from(order_number), r.session_id.as_str(), r.customer_email.as_str(), "INR");
    for item in cart.items() {
        order.add_item(LineItem {
            id: Uuid::now_v7().to_string(),
            product_id: item.product_id.clone(),
            name: item.name.clone(),
            sku: item.sku.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price.clone(),
            total: item.line_total(),
        });
    }
    order.set_shipping_charge(Money::inr(quote.amount));
    order.set_tax(Money::inr(gst));

    for item in cart.items() {
        let affected = sqlx::query("UPDATE products SET inventory_quantity = inventory_quantity - $2, updated_at = NOW() WHERE id = $1::uuid AND inventory_quantity >= $2")
            .bind(&item.product_id).bind(item.quantity as i32).execute(&mut *tx).await?.rows_affected();
        if affected == 0 {
            return Err(StoreError::InsufficientInventory { sku: item.sku.clone() });
        }
    }

    let row = sqlx::query_as::<_, OrderRow>("INSERT INTO orders (id, order_number, customer_email, status, subtotal, tax, shipping, discount, total, currency, distance_km, shipping_address, billing_address, payment_status, fulfillment_status, notes, created_at, updated_at) VALUES ($1::uuid, $2, $3, 'pending', $4, $5, $6, $7, $8, 'INR', $9, $10, '{}', 'pending', 'unfulfilled', $11, NOW(), NOW()) RETURNING *")
        .bind(order.id()).bind(format!("ORD-{:08}", order_number)).bind(order.email())
        .bind(round_whole(order.subtotal().amount())).bind(round_whole(order.tax().amount()))
        .bind(round_whole(order.shipping().amount())).bind(round_whole(order.discount().amount()))
        .bind(round_whole(order.total().amount())).bind(round_whole(quote.breakdown.distance_km))
        .bind(&r.shipping_address).bind(&r.notes)
        .fetch_one(&mut *tx).await?;

    for item in order.items() {
        sqlx::query("INSERT INTO order_items (id, order_id, product_id, sku, name, quantity, unit_price, total) VALUES ($1, $2, $3::uuid, $4, $5, $6, $7, $8)")
            .bind(Uuid::now_v7()).bind(row.id).bind(&item.product_id).bind(&item.sku).bind(&item.name)
            .bind(item.quantity as i32).bind(round_whole(item.unit_price.amount())).bind(round_whole(item.total.amount()))
            .execute(&mut *tx).await?;
    }
    sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(&r.session_id).execute(&mut *tx).await?;
    tx.commit().await?;

    if let Some(nats) = &s.nats {
        for event in order.take_events() {
            if let DomainEvent::Order(OrderEvent::Created { order_id, .. }) = event {
                let payload = serde_json::json!({
                    "order_id": order_id,
                    "order_number": row.order_number,
                    "customer_email": row.customer_email,
                    "total": row.total,
                }).to_string();
                if let Err(e) = nats.publish("orders.created".to_string(), payload.into()).await {
                    tracing::warn!("order event publish failed: {}", e);
                }
            }
        }
    }
    Ok(row)
}

async fn list_orders(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<OrderRow>>, (StatusCode, String)> {
    let page = p.page.unwrap_or(1).max(1); let per_page = p.per_page.unwrap_or(20).min(100);
    let orders = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2")
        .bind(per_page as i64).bind(((page-1)*per_page) as i64).fetch_all(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders").fetch_one(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(PaginatedResponse { data: orders, total: total.0, page }))
}

async fn get_order(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<OrderRow>, (StatusCode, String)> {
    sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?.map(Json).ok_or((StatusCode::NOT_FOUND, "Not found".to_string()))
}

async fn list_order_items(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<OrderItemRow>>, (StatusCode, String)> {
    let items = sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE order_id = $1").bind(id).fetch_all(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(items))
}

async fn track_order(State(s): State<AppState>, Path(number): Path<String>) -> Result<Json<OrderRow>, (StatusCode, String)> {
    sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE order_number = $1").bind(&number).fetch_optional(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?.map(Json).ok_or((StatusCode::NOT_FOUND, "Not found".to_string()))
}

#[derive(Debug, Deserialize)] pub struct ReturnRequestBody { pub reason: String }

async fn request_return(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<ReturnRequestBody>) -> Result<(StatusCode, Json<ReturnRow>), (StatusCode, String)> {
    let order: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1").bind(id).fetch_optional(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if order.is_none() {
        let e = StoreError::OrderNotFound;
        return Err((error_status(&e), e.to_string()));
    }
    let request = ReturnRequest::open(id.to_string(), r.reason);
    let row = sqlx::query_as::<_, ReturnRow>("INSERT INTO returns (id, order_id, reason, status, created_at, updated_at) VALUES ($1::uuid, $2, $3, 'pending', NOW(), NOW()) RETURNING *")
        .bind(request.id()).bind(id).bind(request.reason())
        .fetch_one(&s.db).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok((StatusCode::CREATED, Json(row)))
}
