use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::api::auth::Caller;
use crate::api::response::ApiResponse;
use crate::api::{json_body, path_param, AppState};
use crate::database::report_repository::Report;
use crate::error::AppResult;
use crate::ledger::reports::ReviewReport;

#[derive(Debug, Serialize)]
pub struct RecalculatedAll {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculatedCampaign {
    pub campaign_id: Uuid,
    pub collected_amount: i64,
}

pub async fn recalculate_all(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> AppResult<ApiResponse<RecalculatedAll>> {
    caller.require_admin()?;
    let updated = state.ledger.recalculate_collected_amounts().await?;
    Ok(ApiResponse::ok(RecalculatedAll { updated }))
}

pub async fn recalculate_campaign(
    State(state): State<AppState>,
    Caller(caller): Caller,
    campaign_id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<ApiResponse<RecalculatedCampaign>> {
    caller.require_admin()?;
    let campaign_id = path_param(campaign_id)?;
    let collected_amount = state.ledger.recalculate_single_campaign(campaign_id).await?;
    Ok(ApiResponse::ok(RecalculatedCampaign {
        campaign_id,
        collected_amount,
    }))
}

pub async fn review_report(
    State(state): State<AppState>,
    Caller(caller): Caller,
    report_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ReviewReport>, JsonRejection>,
) -> AppResult<ApiResponse<Report>> {
    let report_id = path_param(report_id)?;
    let ReviewReport { action } = json_body(payload)?;
    let report = state.reports.review_report(&caller, report_id, action).await?;
    Ok(ApiResponse::ok(report))
}
