// Request payloads. Unknown fields are rejected at deserialization and
// `Validate` covers the rules serde cannot express.
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;

use crate::database::models::{Category, Product, User};

/// field name -> problem
pub type FieldErrors = HashMap<String, String>;

pub trait Validate {
    fn validate(&self) -> Result<(), FieldErrors>;
}

#[derive(Default)]
struct Checks(FieldErrors);

impl Checks {
    fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.fail(field, "is required");
        }
    }

    fn require_some(&mut self, field: &str, value: Option<&String>) {
        if let Some(value) = value {
            self.require(field, value);
        }
    }

    fn check(&mut self, field: &str, ok: bool, problem: &str) {
        if !ok {
            self.fail(field, problem);
        }
    }

    fn fail(&mut self, field: &str, problem: &str) {
        self.0.entry(field.to_string()).or_insert_with(|| problem.to_string());
    }

    fn finish(self) -> Result<(), FieldErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self.0)
        }
    }
}

fn valid_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

/// Largest accepted product price. Order totals multiply it by quantities,
/// so it stays far below `Decimal::MAX`.
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

fn valid_price(price: Decimal) -> bool {
    price >= Decimal::ZERO && price <= MAX_PRICE
}

fn valid_rating(rating: f64) -> bool {
    rating.is_finite() && (0.0..=5.0).contains(&rating)
}

// Categories

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
}

impl Validate for NewCategory {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checks = Checks::default();
        checks.require("name", &self.name);
        checks.finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

impl Validate for CategoryPatch {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checks = Checks::default();
        checks.require_some("name", self.name.as_ref());
        checks.finish()
    }
}

impl CategoryPatch {
    pub fn apply(self, category: &mut Category) {
        if let Some(name) = self.name {
            category.name = name;
        }
        if let Some(icon) = self.icon {
            category.icon = icon;
        }
        if let Some(color) = self.color {
            category.color = color;
        }
    }
}

// Products

/// Text fields of the product-creation form. The image arrives separately.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub rich_description: String,
    pub brand: String,
    pub price: Decimal,
    pub category: String,
    pub count_in_stock: u32,
    pub rating: f64,
    pub num_reviews: u32,
    pub is_featured: bool,
}

impl NewProduct {
    /// Build from multipart text fields, which carry no type information
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, FieldErrors> {
        let mut checks = Checks::default();

        for key in fields.keys() {
            if !PRODUCT_FORM_FIELDS.contains(&key.as_str()) {
                checks.fail(key, "unknown field");
            }
        }

        let text = |name: &str| fields.get(name).map(|v| v.trim().to_string()).unwrap_or_default();

        let price = parse_field::<Decimal>(&mut checks, fields, "price", "must be a decimal number")
            .unwrap_or_default();
        let count_in_stock =
            parse_field::<u32>(&mut checks, fields, "countInStock", "must be a non-negative integer");
        let rating = parse_field::<f64>(&mut checks, fields, "rating", "must be a number").unwrap_or_default();
        let num_reviews = parse_field::<u32>(&mut checks, fields, "numReviews", "must be a non-negative integer")
            .unwrap_or_default();
        let is_featured = parse_field::<bool>(&mut checks, fields, "isFeatured", "must be true or false")
            .unwrap_or_default();

        if count_in_stock.is_none() && !fields.contains_key("countInStock") {
            checks.fail("countInStock", "is required");
        }

        let product = NewProduct {
            name: text("name"),
            description: text("description"),
            rich_description: text("richDescription"),
            brand: text("brand"),
            price,
            category: text("category"),
            count_in_stock: count_in_stock.unwrap_or_default(),
            rating,
            num_reviews,
            is_featured,
        };

        if let Err(errors) = product.validate() {
            for (field, problem) in errors {
                checks.fail(&field, &problem);
            }
        }
        checks.finish().map(|_| product)
    }
}

const PRODUCT_FORM_FIELDS: &[&str] = &[
    "name",
    "description",
    "richDescription",
    "brand",
    "price",
    "category",
    "countInStock",
    "rating",
    "numReviews",
    "isFeatured",
];

fn parse_field<T: FromStr>(
    checks: &mut Checks,
    fields: &HashMap<String, String>,
    name: &str,
    problem: &str,
) -> Option<T> {
    let raw = fields.get(name)?.trim();
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            checks.fail(name, problem);
            None
        }
    }
}

impl Validate for NewProduct {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checks = Checks::default();
        checks.require("name", &self.name);
        checks.require("category", &self.category);
        checks.check("price", valid_price(self.price), "must be between 0 and 1000000000");
        checks.check("rating", valid_rating(self.rating), "must be between 0 and 5");
        checks.finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rich_description: Option<String>,
    pub image: Option<String>,
    pub brand: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    /// Resolved against the categories collection by the handler
    pub category: Option<String>,
    pub count_in_stock: Option<u32>,
    pub rating: Option<f64>,
    pub num_reviews: Option<u32>,
    pub is_featured: Option<bool>,
}

impl Validate for ProductPatch {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checks = Checks::default();
        checks.require_some("name", self.name.as_ref());
        checks.require_some("category", self.category.as_ref());
        if let Some(price) = self.price {
            checks.check("price", valid_price(price), "must be between 0 and 1000000000");
        }
        if let Some(rating) = self.rating {
            checks.check("rating", valid_rating(rating), "must be between 0 and 5");
        }
        checks.finish()
    }
}

impl ProductPatch {
    /// Copy every supplied field except `category`
    pub fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(rich_description) = self.rich_description {
            product.rich_description = rich_description;
        }
        if let Some(image) = self.image {
            product.image = image;
        }
        if let Some(brand) = self.brand {
            product.brand = brand;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(count_in_stock) = self.count_in_stock {
            product.count_in_stock = count_in_stock;
        }
        if let Some(rating) = self.rating {
            product.rating = rating;
        }
        if let Some(num_reviews) = self.num_reviews {
            product.num_reviews = num_reviews;
        }
        if let Some(is_featured) = self.is_featured {
            product.is_featured = is_featured;
        }
    }
}

// Orders

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewOrderItem {
    pub quantity: u32,
    pub product: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NewOrder {
    pub order_items: Vec<NewOrderItem>,
    pub shipping_address1: String,
    #[serde(default)]
    pub shipping_address2: String,
    pub city: String,
    pub zip: String,
    pub country: String,
    pub phone: String,
    pub status: Option<String>,
    /// Defaults to the authenticated user
    pub user: Option<String>,
    /// Accepted for client compatibility and ignored; the total is recomputed
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub total_price: Option<Decimal>,
}

impl Validate for NewOrder {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checks = Checks::default();
        checks.check("orderItems", !self.order_items.is_empty(), "must contain at least one item");
        for (index, item) in self.order_items.iter().enumerate() {
            checks.check(
                &format!("orderItems[{}].quantity", index),
                item.quantity >= 1,
                "must be at least 1",
            );
            checks.require(&format!("orderItems[{}].product", index), &item.product);
        }
        checks.require("shippingAddress1", &self.shipping_address1);
        checks.require("city", &self.city);
        checks.require("zip", &self.zip);
        checks.require("country", &self.country);
        checks.require("phone", &self.phone);
        checks.require_some("status", self.status.as_ref());
        checks.finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderStatusPatch {
    pub status: String,
}

impl Validate for OrderStatusPatch {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checks = Checks::default();
        checks.require("status", &self.status);
        checks.finish()
    }
}

// Users

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: String,
    /// Honoured by the authenticated create endpoint only
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub apartment: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
}

impl Validate for NewUser {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checks = Checks::default();
        checks.require("name", &self.name);
        checks.check("email", valid_email(&self.email), "must be a valid email address");
        checks.require("password", &self.password);
        checks.finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Re-hashed when present
    pub password: Option<String>,
    pub phone: Option<String>,
    pub is_admin: Option<bool>,
    pub street: Option<String>,
    pub apartment: Option<String>,
    pub zip: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl Validate for UserPatch {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checks = Checks::default();
        checks.require_some("name", self.name.as_ref());
        checks.require_some("password", self.password.as_ref());
        if let Some(email) = &self.email {
            checks.check("email", valid_email(email), "must be a valid email address");
        }
        checks.finish()
    }
}

impl UserPatch {
    /// Copy the plain profile fields; email and password need handler work
    pub fn apply_profile(&mut self, user: &mut User) {
        if let Some(name) = self.name.take() {
            user.name = name;
        }
        if let Some(phone) = self.phone.take() {
            user.phone = phone;
        }
        if let Some(is_admin) = self.is_admin.take() {
            user.is_admin = is_admin;
        }
        if let Some(street) = self.street.take() {
            user.street = street;
        }
        if let Some(apartment) = self.apartment.take() {
            user.apartment = apartment;
        }
        if let Some(zip) = self.zip.take() {
            user.zip = zip;
        }
        if let Some(city) = self.city.take() {
            user.city = city;
        }
        if let Some(country) = self.country.take() {
            user.country = country;
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Login {
    pub email: String,
    pub password: String,
}

impl Validate for Login {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checks = Checks::default();
        checks.require("email", &self.email);
        checks.require("password", &self.password);
        checks.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn new_category_requires_a_name() {
        let ok: NewCategory = serde_json::from_value(json!({"name": "Shoes", "icon": "i.png", "color": "#fff"})).unwrap();
        assert!(ok.validate().is_ok());

        let blank: NewCategory = serde_json::from_value(json!({"name": "  "})).unwrap();
        assert!(blank.validate().unwrap_err().contains_key("name"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_value::<NewCategory>(json!({"name": "x", "owner": "me"})).is_err());
        assert!(serde_json::from_value::<OrderStatusPatch>(json!({"status": "Shipped", "totalPrice": 1})).is_err());
        assert!(serde_json::from_value::<ProductPatch>(json!({"colour": "red"})).is_err());
    }

    #[test]
    fn product_form_parses_typed_fields() {
        let product = NewProduct::from_fields(&form(&[
            ("name", "Runner"),
            ("category", "7d9f0c4e-8a55-4d59-9a2b-3f1c2e8d9b10"),
            ("countInStock", "5"),
            ("price", "19.99"),
            ("isFeatured", "true"),
        ]))
        .unwrap();

        assert_eq!(product.count_in_stock, 5);
        assert_eq!(product.price, Decimal::new(1999, 2));
        assert!(product.is_featured);
        assert_eq!(product.rating, 0.0);
    }

    #[test]
    fn product_form_reports_every_bad_field() {
        let errors = NewProduct::from_fields(&form(&[
            ("name", ""),
            ("countInStock", "-1"),
            ("price", "cheap"),
            ("sku", "X1"),
        ]))
        .unwrap_err();

        for field in ["name", "countInStock", "price", "sku", "category"] {
            assert!(errors.contains_key(field), "missing error for {}", field);
        }
    }

    #[test]
    fn prices_are_bounded() {
        let errors = NewProduct::from_fields(&form(&[
            ("name", "Runner"),
            ("category", "c"),
            ("countInStock", "1"),
            ("price", "79228162514264337593543950335"),
        ]))
        .unwrap_err();
        assert!(errors.contains_key("price"));

        let at_limit: ProductPatch = serde_json::from_value(json!({"price": 1000000000})).unwrap();
        assert!(at_limit.validate().is_ok());
        let above: ProductPatch = serde_json::from_value(json!({"price": 1000000000.01})).unwrap();
        assert!(above.validate().unwrap_err().contains_key("price"));
        let negative: ProductPatch = serde_json::from_value(json!({"price": -1})).unwrap();
        assert!(negative.validate().unwrap_err().contains_key("price"));
    }

    #[test]
    fn product_form_requires_stock_count() {
        let errors = NewProduct::from_fields(&form(&[("name", "Runner"), ("category", "c")])).unwrap_err();
        assert_eq!(errors["countInStock"], "is required");
    }

    #[test]
    fn product_patch_applies_only_supplied_fields() {
        let patch: ProductPatch = serde_json::from_value(json!({"countInStock": 9, "price": 12.5})).unwrap();
        assert!(patch.validate().is_ok());

        let mut product = Product {
            id: uuid::Uuid::new_v4(),
            name: "Runner".into(),
            description: String::new(),
            rich_description: String::new(),
            image: String::new(),
            images: vec![],
            brand: "Acme".into(),
            price: Decimal::ONE,
            category: uuid::Uuid::new_v4(),
            count_in_stock: 1,
            rating: 4.0,
            num_reviews: 0,
            is_featured: false,
            date_created: chrono::Utc::now(),
        };
        patch.apply(&mut product);

        assert_eq!(product.count_in_stock, 9);
        assert_eq!(product.price, Decimal::new(125, 1));
        assert_eq!(product.brand, "Acme");
    }

    #[test]
    fn orders_need_items_with_positive_quantities() {
        let order: NewOrder = serde_json::from_value(json!({
            "orderItems": [{"quantity": 0, "product": "p"}],
            "shippingAddress1": "1 Main St",
            "city": "Paris",
            "zip": "75001",
            "country": "FR",
            "phone": "+33 1"
        }))
        .unwrap();
        let errors = order.validate().unwrap_err();
        assert!(errors.contains_key("orderItems[0].quantity"));

        let empty: NewOrder = serde_json::from_value(json!({
            "orderItems": [],
            "shippingAddress1": "1 Main St",
            "city": "Paris",
            "zip": "75001",
            "country": "FR",
            "phone": "+33 1",
            "totalPrice": 10
        }))
        .unwrap();
        assert!(empty.validate().unwrap_err().contains_key("orderItems"));
    }

    #[test]
    fn users_need_a_plausible_email() {
        let user: NewUser =
            serde_json::from_value(json!({"name": "Ada", "email": "ada.example.com", "password": "pw"})).unwrap();
        assert!(user.validate().unwrap_err().contains_key("email"));

        let user: NewUser =
            serde_json::from_value(json!({"name": "Ada", "email": "ada@example.com", "password": "pw"})).unwrap();
        assert!(user.validate().is_ok());
        assert!(!user.is_admin);
    }
}
