use axum::{
    extract::{Path, State},
    response::{Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use super::deletion;
use super::products::product_views;
use crate::api::payloads::{NewOrder, OrderStatusPatch};
use crate::api::views::{OrderGraph, OrderRecord, OrderView, UserSummary};
use crate::api::{parse_id, ApiResult, ValidJson};
use crate::app::AppState;
use crate::database::models::order::DEFAULT_ORDER_STATUS;
use crate::database::models::{Order, OrderItem, Product, User};
use crate::database::{DatabaseError, Repository, WriteOp};
use crate::error::ApiError;
use crate::filter::Filter;
use crate::middleware::AuthUser;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list).post(create))
        .route("/orders/get/count", get(count))
        .route("/orders/get/totalsales", get(total_sales))
        .route("/orders/get/userorders/:userid", get(user_orders))
        .route("/orders/:id", get(show).put(update).delete(remove))
}

/// Sum of `price * quantity` over the lines; `None` when it leaves the decimal range
pub(crate) fn order_total<'a>(lines: impl IntoIterator<Item = (&'a Decimal, u32)>) -> Option<Decimal> {
    lines.into_iter().try_fold(Decimal::ZERO, |total, (price, quantity)| {
        price
            .checked_mul(Decimal::from(quantity))
            .and_then(|line| total.checked_add(line))
    })
}

#[derive(Debug, Serialize)]
struct TotalSales {
    #[serde(with = "rust_decimal::serde::float")]
    totalsales: Decimal,
}

/// Fetch items, their products (with categories) and users in bulk
async fn order_views(state: &AppState, orders: Vec<Order>) -> Result<Vec<OrderView>, ApiError> {
    let item_ids: Vec<Uuid> = orders.iter().flat_map(|o| o.order_items.iter().copied()).collect();
    let items: HashMap<Uuid, OrderItem> = state
        .repo::<OrderItem>()
        .select_ids(&item_ids)
        .await?
        .into_iter()
        .map(|i| (i.id, i))
        .collect();

    let mut product_ids: Vec<Uuid> = items.values().map(|i| i.product).collect();
    product_ids.sort_unstable();
    product_ids.dedup();
    let products = state.repo::<Product>().select_ids(&product_ids).await?;
    let products = product_views(state, products)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut user_ids: Vec<Uuid> = orders.iter().map(|o| o.user).collect();
    user_ids.sort_unstable();
    user_ids.dedup();
    let users = state
        .repo::<User>()
        .select_ids(&user_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, UserSummary { id: u.id, name: u.name }))
        .collect();

    let graph = OrderGraph { items, products, users };
    Ok(orders.into_iter().map(|o| OrderView::new(o, &graph)).collect())
}

/// GET /orders (newest first)
async fn list(State(state): State<AppState>) -> ApiResult<Vec<OrderView>> {
    let orders = state.repo::<Order>().select_any(&Filter::new().newest_first()).await?;
    Ok(Json(order_views(&state, orders).await?))
}

/// GET /orders/:id
async fn show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<OrderView> {
    let id = parse_id(&id, "Order")?;
    let order = state.repo::<Order>().select_404(id).await?;
    order_views(&state, vec![order])
        .await?
        .pop()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("The order with the given ID was not found"))
}

/// POST /orders
///
/// Line items and the order are written in one atomic batch, and the total
/// is computed here from current product prices.
async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(payload): ValidJson<NewOrder>,
) -> ApiResult<OrderRecord> {
    let user_id = match payload.user.as_deref() {
        Some(raw) => Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request("Invalid User"))?,
        None => auth.user_id,
    };
    // Only administrators place orders on behalf of someone else
    if user_id != auth.user_id && !auth.is_admin {
        tracing::debug!("User {} tried to order for {}", auth.user_id, user_id);
        return Err(ApiError::unauthorized());
    }
    if state.repo::<User>().select_id(user_id).await?.is_none() {
        return Err(ApiError::bad_request("Invalid User"));
    }

    let requested = payload
        .order_items
        .iter()
        .map(|item| {
            Uuid::parse_str(item.product.trim())
                .map(|product| (product, item.quantity))
                .map_err(|_| ApiError::bad_request("Invalid Product"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let product_ids: Vec<Uuid> = requested.iter().map(|(id, _)| *id).collect();
    let prices: HashMap<Uuid, Decimal> = state
        .repo::<Product>()
        .select_ids(&product_ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p.price))
        .collect();

    let lines = requested
        .iter()
        .map(|(product, quantity)| {
            prices
                .get(product)
                .map(|price| (price, *quantity))
                .ok_or_else(|| ApiError::bad_request("Invalid Product"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let total_price = order_total(lines).ok_or_else(|| ApiError::bad_request("Order total is out of range"))?;

    let items: Vec<OrderItem> = requested
        .into_iter()
        .map(|(product, quantity)| OrderItem {
            id: Uuid::new_v4(),
            quantity,
            product,
        })
        .collect();

    if let Some(claimed) = payload.total_price {
        if claimed != total_price {
            tracing::debug!("Ignoring client total {} (computed {})", claimed, total_price);
        }
    }

    let order = Order {
        id: Uuid::new_v4(),
        order_items: items.iter().map(|i| i.id).collect(),
        shipping_address1: payload.shipping_address1,
        shipping_address2: payload.shipping_address2,
        city: payload.city,
        zip: payload.zip,
        country: payload.country,
        phone: payload.phone,
        status: payload
            .status
            .unwrap_or_else(|| DEFAULT_ORDER_STATUS.to_string()),
        total_price,
        user: user_id,
        date_ordered: Utc::now(),
    };

    let mut ops = items
        .iter()
        .map(Repository::<OrderItem>::insert_op)
        .collect::<Result<Vec<WriteOp>, DatabaseError>>()?;
    ops.push(Repository::<Order>::insert_op(&order)?);
    state.store.apply(ops).await?;

    tracing::info!("Created order {} with {} items for user {}", order.id, items.len(), user_id);
    Ok(Json(order.into()))
}

/// PUT /orders/:id (status only)
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(patch): ValidJson<OrderStatusPatch>,
) -> ApiResult<OrderRecord> {
    let id = parse_id(&id, "Order")?;
    let repo = state.repo::<Order>();

    let mut order = repo.select_404(id).await?;
    order.status = patch.status.trim().to_string();

    if !repo.update(&order).await? {
        return Err(ApiError::not_found("The order with the given ID was not found"));
    }
    Ok(Json(order.into()))
}

/// DELETE /orders/:id (the order's items go with it)
async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let id = parse_id(&id, "Order")?;

    let Some(order) = state.repo::<Order>().select_id(id).await? else {
        return Ok(deletion(false, "order"));
    };

    let mut ops: Vec<WriteOp> = order
        .order_items
        .iter()
        .map(|item| Repository::<OrderItem>::delete_op(*item))
        .collect();
    ops.push(Repository::<Order>::delete_op(order.id));

    let touched = state.store.apply(ops).await?;
    Ok(deletion(touched.last().copied().unwrap_or(false), "order"))
}

/// GET /orders/get/count
async fn count(State(state): State<AppState>) -> ApiResult<Value> {
    let total = state.repo::<Order>().count(&Filter::new()).await?;
    Ok(Json(json!({ "orderCount": total })))
}

/// GET /orders/get/totalsales
async fn total_sales(State(state): State<AppState>) -> ApiResult<TotalSales> {
    let orders = state.repo::<Order>().select_any(&Filter::new()).await?;
    let totalsales = orders
        .iter()
        .try_fold(Decimal::ZERO, |sum, o| sum.checked_add(o.total_price))
        .ok_or_else(|| ApiError::internal_server_error("Total sales could not be computed", "decimal overflow"))?;
    Ok(Json(TotalSales { totalsales }))
}

/// GET /orders/get/userorders/:userid (newest first)
async fn user_orders(State(state): State<AppState>, Path(user_id): Path<String>) -> ApiResult<Vec<OrderView>> {
    let user_id = parse_id(&user_id, "User")?;
    let filter = Filter::new().eq("user", user_id.to_string()).newest_first();
    let orders = state.repo::<Order>().select_any(&filter).await?;
    Ok(Json(order_views(&state, orders).await?))
}
