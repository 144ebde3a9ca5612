use axum::{
    extract::{Multipart, Path, Query, State},
    response::{Json, Response},
    routing::{get, put},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use super::deletion;
use crate::api::payloads::{NewProduct, ProductPatch};
use crate::api::views::ProductView;
use crate::api::{parse_id, ApiResult, RequestOrigin, ValidJson};
use crate::app::AppState;
use crate::database::models::{Category, Product};
use crate::error::ApiError;
use crate::filter::Filter;
use crate::uploads::MultipartForm;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list).post(create))
        .route("/products/get/count", get(count))
        .route("/products/get/featured/:count", get(featured))
        .route("/products/gallery-images/:id", put(gallery))
        .route("/products/:id", get(show).put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    /// Comma separated category ids
    pub categories: Option<String>,
}

/// Attach each product's category, or its bare id if the category is gone
pub(crate) async fn product_views(state: &AppState, products: Vec<Product>) -> Result<Vec<ProductView>, ApiError> {
    let mut category_ids: Vec<Uuid> = products.iter().map(|p| p.category).collect();
    category_ids.sort_unstable();
    category_ids.dedup();

    let categories: HashMap<Uuid, Category> = state
        .repo::<Category>()
        .select_ids(&category_ids)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    Ok(products
        .into_iter()
        .map(|p| ProductView::new(p, &categories))
        .collect())
}

async fn product_view(state: &AppState, product: Product) -> ApiResult<ProductView> {
    product_views(state, vec![product])
        .await?
        .pop()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("The product with the given ID was not found"))
}

/// Any malformed or unknown category id is reported the same way
async fn resolve_category(state: &AppState, raw: &str) -> Result<Category, ApiError> {
    let id = Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request("Invalid Category"))?;
    state
        .repo::<Category>()
        .select_id(id)
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid Category"))
}

/// GET /products?categories=<id>,<id>
async fn list(State(state): State<AppState>, Query(query): Query<ProductQuery>) -> ApiResult<Vec<ProductView>> {
    let mut filter = Filter::new();

    if let Some(raw) = query.categories.as_deref() {
        let ids = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| parse_id(s, "Category").map(|id| id.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        if !ids.is_empty() {
            filter = filter.within("category", ids);
        }
    }

    let products = state.repo::<Product>().select_any(&filter).await?;
    Ok(Json(product_views(&state, products).await?))
}

/// GET /products/:id
async fn show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<ProductView> {
    let id = parse_id(&id, "Product")?;
    let product = state.repo::<Product>().select_404(id).await?;
    product_view(&state, product).await
}

/// POST /products (multipart: text fields plus a single `image` file)
async fn create(
    State(state): State<AppState>,
    origin: RequestOrigin,
    multipart: Multipart,
) -> ApiResult<ProductView> {
    // Rejects disallowed image types while the body is still streaming
    let mut form = MultipartForm::read(multipart, "image", 1).await?;

    let payload = NewProduct::from_fields(form.fields())
        .map_err(|errors| ApiError::validation_error("Invalid request payload", Some(errors)))?;
    let category = resolve_category(&state, &payload.category).await?;

    let image = form
        .take_files()
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::bad_request("No image in the request"))?;
    let stored = state.uploads.save(&image).await?;

    let product = Product {
        id: Uuid::new_v4(),
        name: payload.name,
        description: payload.description,
        rich_description: payload.rich_description,
        image: state.uploads.public_url(&origin.base_url(), &stored),
        images: Vec::new(),
        brand: payload.brand,
        price: payload.price,
        category: category.id,
        count_in_stock: payload.count_in_stock,
        rating: payload.rating,
        num_reviews: payload.num_reviews,
        is_featured: payload.is_featured,
        date_created: Utc::now(),
    };

    if let Err(e) = state.repo::<Product>().insert(&product).await {
        state.uploads.discard(std::slice::from_ref(&stored)).await;
        return Err(e.into());
    }

    tracing::info!("Created product {} ({})", product.name, product.id);
    let categories = HashMap::from([(category.id, category)]);
    Ok(Json(ProductView::new(product, &categories)))
}

/// PUT /products/:id
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(mut patch): ValidJson<ProductPatch>,
) -> ApiResult<ProductView> {
    let id = parse_id(&id, "Product")?;
    let repo = state.repo::<Product>();
    let mut product = repo.select_404(id).await?;

    let mut categories = HashMap::new();
    if let Some(raw) = patch.category.take() {
        let category = resolve_category(&state, &raw).await?;
        product.category = category.id;
        categories.insert(category.id, category);
    }
    patch.apply(&mut product);

    if !repo.update(&product).await? {
        return Err(ApiError::not_found("The product with the given ID was not found"));
    }

    if categories.is_empty() {
        return product_view(&state, product).await;
    }
    Ok(Json(ProductView::new(product, &categories)))
}

/// DELETE /products/:id (its image files go with it)
async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let id = parse_id(&id, "Product")?;
    let repo = state.repo::<Product>();

    let Some(product) = repo.select_id(id).await? else {
        return Ok(deletion(false, "product"));
    };
    let found = repo.delete(id).await?;
    if found {
        state
            .uploads
            .discard_urls(std::iter::once(&product.image).chain(&product.images))
            .await;
    }
    Ok(deletion(found, "product"))
}

/// GET /products/get/count
async fn count(State(state): State<AppState>) -> ApiResult<Value> {
    let total = state.repo::<Product>().count(&Filter::new()).await?;
    Ok(Json(json!({ "productCount": total })))
}

/// GET /products/get/featured/:count (`0` returns every featured product)
async fn featured(State(state): State<AppState>, Path(count): Path<String>) -> ApiResult<Vec<ProductView>> {
    let limit: u32 = count
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid featured count"))?;

    let filter = Filter::new().eq("isFeatured", true).limit(limit);
    let products = state.repo::<Product>().select_any(&filter).await?;
    Ok(Json(product_views(&state, products).await?))
}

/// PUT /products/gallery-images/:id (multipart, `images` files replace the gallery)
async fn gallery(
    State(state): State<AppState>,
    Path(id): Path<String>,
    origin: RequestOrigin,
    multipart: Multipart,
) -> ApiResult<ProductView> {
    let id = parse_id(&id, "Product")?;
    let repo = state.repo::<Product>();
    let mut product = repo.select_404(id).await?;

    let mut form = MultipartForm::read(multipart, "images", state.uploads.max_gallery_images()).await?;
    if let Some(field) = form.fields().keys().next() {
        return Err(ApiError::invalid_field(field, "unknown field"));
    }

    let files = form.take_files();
    if files.is_empty() {
        return Err(ApiError::bad_request("No images in the request"));
    }

    let stored = state.uploads.save_all(&files).await?;
    let base_url = origin.base_url();
    let replaced = std::mem::replace(
        &mut product.images,
        stored
            .iter()
            .map(|file| state.uploads.public_url(&base_url, file))
            .collect(),
    );

    match repo.update(&product).await {
        Ok(true) => {}
        Ok(false) => {
            state.uploads.discard(&stored).await;
            return Err(ApiError::not_found("The product with the given ID was not found"));
        }
        Err(e) => {
            state.uploads.discard(&stored).await;
            return Err(e.into());
        }
    }

    let unreferenced: Vec<&String> = replaced.iter().filter(|url| **url != product.image).collect();
    state.uploads.discard_urls(unreferenced).await;

    tracing::info!("Replaced {} gallery images of product {}", stored.len(), product.id);
    product_view(&state, product).await
}
