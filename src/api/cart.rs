use axum::extract::{Path, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResult, AppState};
use crate::domain::aggregates::{CartLineItem, CartState};
use crate::services::CartStore;
use crate::views::cart_drawer::{self, CartDrawerView, OrderAcknowledgement};

/// Either a catalog slug (the line is snapshotted from the current product)
/// or an explicit line as the detail page rendered it.
#[derive(Debug, Deserialize)]
pub(super) struct AddItemRequest {
    slug: Option<String>,
    item: Option<LineInput>,
    quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LineInput {
    id: String,
    title_bg: String,
    #[serde(default)]
    price: Decimal,
    image: Option<String>,
    slug: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct QuantityRequest {
    quantity: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderResponse {
    acknowledgement: OrderAcknowledgement,
    cart: CartDrawerView,
}

/// Applies `mutate` to the session's cart. Unknown sessions get an empty
/// cart back without registering one; only adding an item opens a session.
fn existing(state: &AppState, session: &str, mutate: impl FnOnce(&CartStore) -> CartState) -> CartState {
    state.carts.get(session).map(|store| mutate(store.as_ref())).unwrap_or_default()
}

pub(super) async fn get_cart(State(state): State<AppState>, Path(session): Path<String>) -> Json<CartDrawerView> {
    let cart = state.carts.get(&session).map(|store| store.state()).unwrap_or_default();
    Json(CartDrawerView::from_state(&cart))
}

pub(super) async fn clear_cart(State(state): State<AppState>, Path(session): Path<String>) -> Json<CartDrawerView> {
    let cleared = match state.carts.get(&session) {
        Some(store) => store.clear(),
        None => Default::default(),
    };
    Json(CartDrawerView::from_state(&cleared))
}

pub(super) async fn add_item(
    State(state): State<AppState>,
    Path(session): Path<String>,
    Json(request): Json<AddItemRequest>,
) -> ApiResult<Json<CartDrawerView>> {
    let candidate = match (request.slug, request.item) {
        (Some(slug), _) => {
            let detail = state
                .catalog
                .detail(&slug)
                .await?
                .ok_or_else(|| ApiError::not_found(format!("Продуктът „{slug}“ не е намерен.")))?;
            CartLineItem::from_product(&detail.product)
        }
        (None, Some(line)) => {
            let item = CartLineItem::new(line.id, line.title_bg, line.price, line.slug);
            match line.image {
                Some(image) => item.with_image(image),
                None => item,
            }
        }
        (None, None) => return Err(ApiError::bad_request("either slug or item is required")),
    };
    let cart = state.carts.get_or_create(&session).add_item(candidate, request.quantity.unwrap_or(1));
    Ok(Json(CartDrawerView::from_state(&cart)))
}

pub(super) async fn update_quantity(
    State(state): State<AppState>,
    Path((session, product_id)): Path<(String, String)>,
    Json(request): Json<QuantityRequest>,
) -> Json<CartDrawerView> {
    let cart = existing(&state, &session, |store| store.update_quantity(&product_id, request.quantity));
    Json(CartDrawerView::from_state(&cart))
}

pub(super) async fn remove_item(
    State(state): State<AppState>,
    Path((session, product_id)): Path<(String, String)>,
) -> Json<CartDrawerView> {
    let cart = existing(&state, &session, |store| store.remove_item(&product_id));
    Json(CartDrawerView::from_state(&cart))
}

pub(super) async fn open_cart(State(state): State<AppState>, Path(session): Path<String>) -> Json<CartDrawerView> {
    Json(CartDrawerView::from_state(&existing(&state, &session, CartStore::open)))
}

pub(super) async fn close_cart(State(state): State<AppState>, Path(session): Path<String>) -> Json<CartDrawerView> {
    Json(CartDrawerView::from_state(&existing(&state, &session, CartStore::close)))
}

pub(super) async fn order_now(State(state): State<AppState>, Path(session): Path<String>) -> Json<OrderResponse> {
    let cart = state.carts.get(&session).map(|store| store.state()).unwrap_or_default();
    Json(OrderResponse { acknowledgement: cart_drawer::order_now(&cart), cart: CartDrawerView::from_state(&cart) })
}
