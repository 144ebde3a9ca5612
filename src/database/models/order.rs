use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::repository::Document;
use crate::database::store::Collection;

pub const DEFAULT_ORDER_STATUS: &str = "Pending";

/// A line item. Written only together with its order and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub quantity: u32,
    pub product: Uuid,
}

impl Document for OrderItem {
    const COLLECTION: Collection = Collection::OrderItems;
    const LABEL: &'static str = "order item";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    /// Owned line items, in the order they were submitted
    pub order_items: Vec<Uuid>,
    pub shipping_address1: String,
    #[serde(default)]
    pub shipping_address2: String,
    pub city: String,
    pub zip: String,
    pub country: String,
    pub phone: String,
    pub status: String,
    pub total_price: Decimal,
    pub user: Uuid,
    pub date_ordered: DateTime<Utc>,
}

impl Document for Order {
    const COLLECTION: Collection = Collection::Orders;
    const LABEL: &'static str = "order";

    fn id(&self) -> Uuid {
        self.id
    }
}
