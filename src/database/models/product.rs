use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::repository::Document;
use crate::database::store::Collection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rich_description: String,
    /// Public URL of the main image
    #[serde(default)]
    pub image: String,
    /// Public URLs of the gallery images
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub brand: String,
    /// Stored in its exact string form; views render it as a number
    #[serde(default)]
    pub price: Decimal,
    /// Checked against the categories collection on every write; may dangle
    /// after the category is deleted.
    pub category: Uuid,
    pub count_in_stock: u32,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub num_reviews: u32,
    #[serde(default)]
    pub is_featured: bool,
    pub date_created: DateTime<Utc>,
}

impl Document for Product {
    const COLLECTION: Collection = Collection::Products;
    const LABEL: &'static str = "product";

    fn id(&self) -> Uuid {
        self.id
    }
}
