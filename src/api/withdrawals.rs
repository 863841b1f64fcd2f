use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::Caller;
use crate::api::response::ApiResponse;
use crate::api::{json_body, path_param, AppState};
use crate::database::withdrawal_repository::{Withdrawal, WithdrawalStatus};
use crate::error::AppResult;
use crate::ledger::balance::CampaignBalance;
use crate::ledger::withdrawals::CreateWithdrawal;

#[derive(Debug, Deserialize)]
pub struct UpdateWithdrawalStatus {
    pub status: WithdrawalStatus,
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<CreateWithdrawal>, JsonRejection>,
) -> AppResult<(StatusCode, ApiResponse<Withdrawal>)> {
    let request = json_body(payload)?;
    let withdrawal = state.withdrawals.request_withdrawal(&caller, request).await?;
    let (status, body) = ApiResponse::created(withdrawal);
    Ok((status, body.with_message("Withdrawal requested")))
}

pub async fn update_withdrawal_status(
    State(state): State<AppState>,
    Caller(caller): Caller,
    withdrawal_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateWithdrawalStatus>, JsonRejection>,
) -> AppResult<ApiResponse<Withdrawal>> {
    let withdrawal_id = path_param(withdrawal_id)?;
    let UpdateWithdrawalStatus { status } = json_body(payload)?;
    let withdrawal = state
        .withdrawals
        .update_withdrawal_status(&caller, withdrawal_id, status)
        .await?;
    Ok(ApiResponse::ok(withdrawal))
}

pub async fn campaign_balance(
    State(state): State<AppState>,
    Caller(caller): Caller,
    campaign_id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<ApiResponse<CampaignBalance>> {
    let campaign_id = path_param(campaign_id)?;
    Ok(ApiResponse::ok(
        state.withdrawals.get_available(&caller, campaign_id).await?,
    ))
}

pub async fn campaign_withdrawals(
    State(state): State<AppState>,
    Caller(caller): Caller,
    campaign_id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<ApiResponse<Vec<Withdrawal>>> {
    let campaign_id = path_param(campaign_id)?;
    Ok(ApiResponse::ok(
        state
            .withdrawals
            .list_campaign_withdrawals(&caller, campaign_id)
            .await?,
    ))
}
