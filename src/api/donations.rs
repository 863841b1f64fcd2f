use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::OptionalCaller;
use crate::api::response::{ApiResponse, Pagination};
use crate::api::{json_body, path_param, query_params, AppState};
use crate::error::AppResult;
use crate::ledger::donations::{
    clamp_limit, CreateDonation, DonationCheckout, DonationStatusView, PublicDonation,
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

pub async fn create_donation(
    State(state): State<AppState>,
    OptionalCaller(caller): OptionalCaller,
    payload: Result<Json<CreateDonation>, JsonRejection>,
) -> AppResult<(StatusCode, ApiResponse<DonationCheckout>)> {
    let request = json_body(payload)?;
    let checkout = state
        .ledger
        .create_donation(request, caller.map(|c| c.user_id))
        .await?;
    let (status, body) = ApiResponse::created(checkout);
    Ok((status, body.with_message("Donation created, continue to payment")))
}

pub async fn get_donation(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<ApiResponse<DonationStatusView>> {
    Ok(ApiResponse::ok(state.ledger.find_donation(&order_id).await?))
}

pub async fn list_campaign_donations(
    State(state): State<AppState>,
    campaign_id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<ApiResponse<Vec<PublicDonation>>> {
    let campaign_id = path_param(campaign_id)?;
    let query = query_params(query)?;
    let donations = state
        .ledger
        .get_campaign_donations(campaign_id, query.limit)
        .await?;
    Ok(listing(donations, query.limit))
}

pub async fn list_campaign_prayers(
    State(state): State<AppState>,
    campaign_id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<ApiResponse<Vec<PublicDonation>>> {
    let campaign_id = path_param(campaign_id)?;
    let query = query_params(query)?;
    let prayers = state
        .ledger
        .get_campaign_prayers(campaign_id, query.limit)
        .await?;
    Ok(listing(prayers, query.limit))
}

fn listing(items: Vec<PublicDonation>, limit: Option<i64>) -> ApiResponse<Vec<PublicDonation>> {
    let pagination = Pagination {
        limit: clamp_limit(limit),
        count: items.len(),
    };
    ApiResponse::ok(items).with_pagination(pagination)
}
