// Response shapes with references populated
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::models::{Category, Order, OrderItem, Product, User};

/// A populated reference, or the bare id when the target no longer exists
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reference<T> {
    Resolved(T),
    Dangling(Uuid),
}

impl<T: Clone> Reference<T> {
    fn lookup(id: Uuid, known: &HashMap<Uuid, T>) -> Self {
        known
            .get(&id)
            .cloned()
            .map(Reference::Resolved)
            .unwrap_or(Reference::Dangling(id))
    }
}

/// A user without the password hash
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub is_admin: bool,
    pub street: String,
    pub apartment: String,
    pub zip: String,
    pub city: String,
    pub country: String,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            is_admin: user.is_admin,
            street: user.street,
            apartment: user.apartment,
            zip: user.zip,
            city: user.city,
            country: user.country,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub rich_description: String,
    pub image: String,
    pub images: Vec<String>,
    pub brand: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub category: Reference<Category>,
    pub count_in_stock: u32,
    pub rating: f64,
    pub num_reviews: u32,
    pub is_featured: bool,
    pub date_created: DateTime<Utc>,
}

impl ProductView {
    pub fn new(product: Product, categories: &HashMap<Uuid, Category>) -> Self {
        Self {
            category: Reference::lookup(product.category, categories),
            id: product.id,
            name: product.name,
            description: product.description,
            rich_description: product.rich_description,
            image: product.image,
            images: product.images,
            brand: product.brand,
            price: product.price,
            count_in_stock: product.count_in_stock,
            rating: product.rating,
            num_reviews: product.num_reviews,
            is_featured: product.is_featured,
            date_created: product.date_created,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItemView {
    pub id: Uuid,
    pub quantity: u32,
    pub product: Reference<ProductView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub order_items: Vec<Reference<OrderItemView>>,
    pub shipping_address1: String,
    pub shipping_address2: String,
    pub city: String,
    pub zip: String,
    pub country: String,
    pub phone: String,
    pub status: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub user: Reference<UserSummary>,
    pub date_ordered: DateTime<Utc>,
}

/// An order as written: line items stay bare ids
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: Uuid,
    pub order_items: Vec<Uuid>,
    pub shipping_address1: String,
    pub shipping_address2: String,
    pub city: String,
    pub zip: String,
    pub country: String,
    pub phone: String,
    pub status: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub user: Uuid,
    pub date_ordered: DateTime<Utc>,
}

impl From<Order> for OrderRecord {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            order_items: order.order_items,
            shipping_address1: order.shipping_address1,
            shipping_address2: order.shipping_address2,
            city: order.city,
            zip: order.zip,
            country: order.country,
            phone: order.phone,
            status: order.status,
            total_price: order.total_price,
            user: order.user,
            date_ordered: order.date_ordered,
        }
    }
}

/// Everything an order references, fetched in bulk
#[derive(Debug, Default)]
pub struct OrderGraph {
    pub items: HashMap<Uuid, OrderItem>,
    pub products: HashMap<Uuid, ProductView>,
    pub users: HashMap<Uuid, UserSummary>,
}

impl OrderView {
    pub fn new(order: Order, graph: &OrderGraph) -> Self {
        let order_items = order
            .order_items
            .iter()
            .map(|id| match graph.items.get(id) {
                Some(item) => Reference::Resolved(OrderItemView {
                    id: item.id,
                    quantity: item.quantity,
                    product: Reference::lookup(item.product, &graph.products),
                }),
                None => Reference::Dangling(*id),
            })
            .collect();

        Self {
            order_items,
            user: Reference::lookup(order.user, &graph.users),
            id: order.id,
            shipping_address1: order.shipping_address1,
            shipping_address2: order.shipping_address2,
            city: order.city,
            zip: order.zip,
            country: order.country,
            phone: order.phone,
            status: order.status,
            total_price: order.total_price,
            date_ordered: order.date_ordered,
        }
    }
}
