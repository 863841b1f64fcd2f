//! Gateway notification endpoint and the browser redirect targets

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::Redirect,
    Json,
};
use reqwest::Url;
use serde::Deserialize;
use tracing::{info, warn};

use crate::api::response::ApiResponse;
use crate::api::{json_body, AppState};
use crate::database::donation_repository::DonationStatus;
use crate::error::AppResult;
use crate::ledger::reconciler::NotificationOutcome;

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandingPage {
    Success,
    Pending,
    Error,
}

impl LandingPage {
    fn segment(&self) -> &'static str {
        match self {
            LandingPage::Success => "success",
            LandingPage::Pending => "pending",
            LandingPage::Error => "error",
        }
    }

    fn for_status(status: DonationStatus) -> Self {
        match status {
            DonationStatus::Success => LandingPage::Success,
            DonationStatus::Pending => LandingPage::Pending,
            DonationStatus::Failed => LandingPage::Error,
        }
    }
}

/// `{frontend}/donation/{page}?order_id=…`, with the order id query-encoded
pub fn landing_url(frontend_url: &str, page: LandingPage, order_id: Option<&str>) -> String {
    let base = format!("{}/donation/{}", frontend_url.trim_end_matches('/'), page.segment());
    match Url::parse(&base) {
        Ok(mut url) => {
            if let Some(order_id) = order_id {
                url.query_pairs_mut().append_pair("order_id", order_id);
            }
            url.to_string()
        }
        Err(_) => base,
    }
}

pub async fn payment_notification(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> AppResult<ApiResponse<()>> {
    let raw = json_body(payload)?;
    match state.reconciler.handle_notification(raw).await? {
        NotificationOutcome::Applied(outcome) => {
            info!(
                order_id = %outcome.donation.order_id,
                status = %outcome.donation.status,
                "Notification processed"
            );
        }
        NotificationOutcome::UnknownOrder { order_id } => {
            info!(%order_id, "Notification for unknown order ignored");
        }
    }
    Ok(ApiResponse::message("OK"))
}

/// Checkout finished: settle from the gateway's own status, never from the query string
pub async fn payment_finish(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
) -> Redirect {
    let Some(order_id) = query.order_id.filter(|id| !id.trim().is_empty()) else {
        return Redirect::to(&landing_url(&state.frontend_url, LandingPage::Error, None));
    };

    let page = match state.reconciler.confirm_redirect(&order_id).await {
        Ok(status) => LandingPage::for_status(status),
        Err(e) => {
            warn!(%order_id, "Could not confirm payment on redirect: {}", e);
            LandingPage::Error
        }
    };

    Redirect::to(&landing_url(&state.frontend_url, page, Some(&order_id)))
}

pub async fn payment_unfinish(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
) -> Redirect {
    Redirect::to(&landing_url(
        &state.frontend_url,
        LandingPage::Pending,
        query.order_id.as_deref(),
    ))
}

pub async fn payment_error(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
) -> Redirect {
    Redirect::to(&landing_url(
        &state.frontend_url,
        LandingPage::Error,
        query.order_id.as_deref(),
    ))
}
