//! HTTP surface: router, shared state and handlers

pub mod admin;
pub mod auth;
pub mod donations;
pub mod health;
pub mod response;
pub mod webhooks;
pub mod withdrawals;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    routing::{get, patch, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::error::{AppResult, ValidationError};
use crate::ledger::donations::{DonationLedger, DonationSettings};
use crate::ledger::notify::Notifier;
use crate::ledger::reconciler::WebhookReconciler;
use crate::ledger::reports::ReportService;
use crate::ledger::withdrawals::WithdrawalService;
use crate::payments::PaymentGateway;
use crate::store::LedgerStore;

use self::auth::JwtVerifier;

/// Non-service inputs to [`AppState::new`]
#[derive(Debug, Clone)]
pub struct StateSettings {
    pub donations: DonationSettings,
    pub jwt_secret: String,
    pub frontend_url: String,
    pub environment: String,
}

/// Shared handler state; every field is cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub ledger: Arc<DonationLedger>,
    pub reconciler: Arc<WebhookReconciler>,
    pub withdrawals: Arc<WithdrawalService>,
    pub reports: Arc<ReportService>,
    pub auth: Arc<JwtVerifier>,
    pub frontend_url: Arc<str>,
    pub environment: Arc<str>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        settings: StateSettings,
    ) -> Self {
        let ledger = Arc::new(DonationLedger::new(
            store.clone(),
            gateway.clone(),
            settings.donations,
        ));
        let reconciler = Arc::new(WebhookReconciler::new(store.clone(), gateway, ledger.clone()));

        Self {
            withdrawals: Arc::new(WithdrawalService::new(store.clone())),
            reports: Arc::new(ReportService::new(store.clone(), notifier)),
            auth: Arc::new(JwtVerifier::new(&settings.jwt_secret)),
            frontend_url: settings.frontend_url.trim_end_matches('/').into(),
            environment: settings.environment.into(),
            store,
            ledger,
            reconciler,
        }
    }
}

/// Unwrap a JSON body, turning axum's rejection into our error envelope
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        ValidationError::MalformedPayload {
            message: rejection.body_text(),
        }
        .into()
    })
}

/// Path parameters, rejecting unparseable ids with the standard error envelope
pub(crate) fn path_param<T>(path: Result<Path<T>, PathRejection>) -> AppResult<T> {
    path.map(|Path(value)| value).map_err(|rejection| {
        ValidationError::MalformedPayload {
            message: rejection.body_text(),
        }
        .into()
    })
}

pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    query.map(|Query(value)| value).map_err(|rejection| {
        ValidationError::MalformedPayload {
            message: rejection.body_text(),
        }
        .into()
    })
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/donations", post(donations::create_donation))
        .route("/donations/:order_id", get(donations::get_donation))
        .route("/campaigns/:id/donations", get(donations::list_campaign_donations))
        .route("/campaigns/:id/prayers", get(donations::list_campaign_prayers))
        .route("/campaigns/:id/balance", get(withdrawals::campaign_balance))
        .route("/campaigns/:id/withdrawals", get(withdrawals::campaign_withdrawals))
        .route("/payments/notification", post(webhooks::payment_notification))
        .route("/payments/finish", get(webhooks::payment_finish))
        .route("/payments/unfinish", get(webhooks::payment_unfinish))
        .route("/payments/error", get(webhooks::payment_error))
        .route("/withdrawals", post(withdrawals::request_withdrawal))
        .route("/admin/withdrawals/:id", patch(withdrawals::update_withdrawal_status))
        .route("/admin/campaigns/recalculate", post(admin::recalculate_all))
        .route("/admin/campaigns/:id/recalculate", post(admin::recalculate_campaign))
        .route("/admin/reports/:id/review", post(admin::review_report));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

#[cfg(test)]
mod tests {
    use super::auth::tests::{issue, TEST_SECRET};
    use super::*;
    use crate::database::campaign_repository::{Campaign, CampaignStatus};
    use crate::database::report_repository::NewReport;
    use crate::ledger::notify::TracingNotifier;
    use crate::ledger::Role;
    use crate::store::{CampaignStore, InMemoryStore};
    use crate::testing::{notification, seed_campaign, seed_settled_donation, FakeGateway};
    use axum::body::Body;
    use http::{header, HeaderMap, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    const FRONTEND: &str = "https://donate.example.org";

    struct TestApp {
        app: Router,
        store: Arc<InMemoryStore>,
        gateway: Arc<FakeGateway>,
    }

    fn test_app() -> TestApp {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let state = AppState::new(
            store.clone(),
            gateway.clone(),
            Arc::new(TracingNotifier),
            StateSettings {
                donations: DonationSettings::default(),
                jwt_secret: TEST_SECRET.to_string(),
                frontend_url: FRONTEND.to_string(),
                environment: "development".to_string(),
            },
        );
        TestApp {
            app: router(state),
            store,
            gateway,
        }
    }

    fn token(user_id: Uuid, role: Role) -> String {
        issue(user_id, role, TEST_SECRET, chrono::Duration::hours(1))
    }

    impl TestApp {
        async fn send(
            &self,
            method: Method,
            uri: &str,
            bearer: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value, HeaderMap) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = bearer {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let headers = response.headers().clone();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, json, headers)
        }

        async fn collected(&self, campaign: &Campaign) -> i64 {
            self.store
                .find_campaign(campaign.id)
                .await
                .unwrap()
                .unwrap()
                .collected_amount
        }
    }

    fn donation_body(campaign_id: Uuid, amount: i64, anonymous: bool) -> Value {
        json!({
            "campaignId": campaign_id,
            "donorName": "Rina",
            "donorEmail": "rina@example.com",
            "donorPhone": "08123456789",
            "amount": amount,
            "prayer": "Semoga lekas sembuh",
            "isAnonymous": anonymous,
        })
    }

    // Donation of 100000 settles by webhook; a replayed webhook does not credit twice
    #[tokio::test]
    async fn test_donation_settles_once_over_http() {
        let t = test_app();
        let campaign = seed_campaign(&t.store, CampaignStatus::Active).await;

        let (status, body, _) = t
            .send(
                Method::POST,
                "/api/donations",
                None,
                Some(donation_body(campaign.id, 100_000, false)),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let order_id = body["data"]["orderId"].as_str().unwrap().to_string();
        assert!(body["data"]["redirectUrl"].as_str().is_some());

        let (_, body, _) = t
            .send(Method::GET, &format!("/api/donations/{}", order_id), None, None)
            .await;
        assert_eq!(body["data"]["status"], json!("PENDING"));
        assert_eq!(t.collected(&campaign).await, 0);

        let webhook = notification(&t.gateway, &order_id, "settlement", None, "100000.00");
        for _ in 0..2 {
            let (status, body, _) = t
                .send(Method::POST, "/api/payments/notification", None, Some(webhook.clone()))
                .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], json!(true));
        }

        let (_, body, _) = t
            .send(Method::GET, &format!("/api/donations/{}", order_id), None, None)
            .await;
        assert_eq!(body["data"]["status"], json!("SUCCESS"));
        assert_eq!(t.collected(&campaign).await, 100_000);
    }

    #[tokio::test]
    async fn test_public_listings_hide_donor_contact() {
        let t = test_app();
        let campaign = seed_campaign(&t.store, CampaignStatus::Active).await;

        let (_, body, _) = t
            .send(
                Method::POST,
                "/api/donations",
                None,
                Some(donation_body(campaign.id, 25_000, true)),
            )
            .await;
        let order_id = body["data"]["orderId"].as_str().unwrap().to_string();
        let webhook = notification(&t.gateway, &order_id, "capture", Some("accept"), "25000.00");
        t.send(Method::POST, "/api/payments/notification", None, Some(webhook))
            .await;

        for path in ["donations", "prayers"] {
            let (status, body, _) = t
                .send(
                    Method::GET,
                    &format!("/api/campaigns/{}/{}?limit=5", campaign.id, path),
                    None,
                    None,
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            let items = body["data"].as_array().unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0]["donorName"], json!("Anonymous"));
            assert!(items[0].get("donorEmail").is_none());
            assert!(items[0].get("donorPhone").is_none());
            assert_eq!(body["pagination"]["limit"], json!(5));
        }
    }

    // Collected 50000: 60000 rejected, 30000 accepted, a second 30000 rejected
    #[tokio::test]
    async fn test_withdrawal_admission_over_http() {
        let t = test_app();
        let campaign = seed_campaign(&t.store, CampaignStatus::Active).await;
        seed_settled_donation(&t.store, campaign.id, "DON-9-aaaaaaaaaaaa", 50_000).await;
        let owner = token(campaign.creator_id, Role::User);

        let request = |amount: i64| json!({ "campaign_id": campaign.id, "amount": amount });

        let (status, body, _) = t
            .send(Method::POST, "/api/withdrawals", Some(&owner), Some(request(60_000)))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], json!("WITHDRAWAL_002"));
        assert_eq!(t.collected(&campaign).await, 50_000);

        let (status, body, _) = t
            .send(Method::POST, "/api/withdrawals", Some(&owner), Some(request(30_000)))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], json!("PROCESSING"));

        let (status, body, _) = t
            .send(Method::POST, "/api/withdrawals", Some(&owner), Some(request(30_000)))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["available"], json!(20_000));

        let (status, body, _) = t
            .send(
                Method::GET,
                &format!("/api/campaigns/{}/withdrawals", campaign.id),
                Some(&owner),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (_, body, _) = t
            .send(
                Method::GET,
                &format!("/api/campaigns/{}/balance", campaign.id),
                Some(&owner),
                None,
            )
            .await;
        assert_eq!(body["data"]["availableAmount"], json!(20_000));
    }

    #[tokio::test]
    async fn test_forged_and_malformed_notifications() {
        let t = test_app();

        let mut forged = notification(&t.gateway, "DON-1-bbbbbbbbbbbb", "settlement", None, "10000.00");
        forged["signature_key"] = json!("0".repeat(128));
        let (status, body, _) = t
            .send(Method::POST, "/api/payments/notification", None, Some(forged))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], json!("WEBHOOK_001"));

        let (status, body, _) = t
            .send(
                Method::POST,
                "/api/payments/notification",
                None,
                Some(json!({ "order_id": "DON-1" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], json!("VALIDATION_001"));
    }

    #[tokio::test]
    async fn test_auth_boundaries() {
        let t = test_app();
        let campaign = seed_campaign(&t.store, CampaignStatus::Active).await;

        let (status, body, _) = t
            .send(
                Method::GET,
                &format!("/api/campaigns/{}/balance", campaign.id),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], json!("AUTH_001"));

        let stranger = token(Uuid::new_v4(), Role::User);
        let (status, _, _) = t
            .send(
                Method::GET,
                &format!("/api/campaigns/{}/balance", campaign.id),
                Some(&stranger),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = t
            .send(Method::POST, "/api/admin/campaigns/recalculate", Some(&stranger), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_malformed_path_and_query_use_error_envelope() {
        let t = test_app();
        let campaign = seed_campaign(&t.store, CampaignStatus::Active).await;
        let admin = token(Uuid::new_v4(), Role::Admin);

        let cases = [
            (Method::GET, "/api/campaigns/not-a-uuid/donations".to_string(), None),
            (Method::GET, "/api/campaigns/not-a-uuid/prayers".to_string(), None),
            (
                Method::GET,
                format!("/api/campaigns/{}/donations?limit=abc", campaign.id),
                None,
            ),
            (Method::GET, "/api/campaigns/not-a-uuid/balance".to_string(), Some(&admin)),
            (
                Method::POST,
                "/api/admin/campaigns/not-a-uuid/recalculate".to_string(),
                Some(&admin),
            ),
        ];

        for (method, uri, bearer) in cases {
            let (status, body, _) = t.send(method, &uri, bearer.map(String::as_str), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["success"], json!(false), "{}", uri);
            assert_eq!(body["error"]["code"], json!("VALIDATION_001"), "{}", uri);
        }

        let (status, body, _) = t
            .send(
                Method::PATCH,
                "/api/admin/withdrawals/42",
                Some(&admin),
                Some(json!({ "status": "COMPLETED" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], json!("VALIDATION_001"));
    }

    #[tokio::test]
    async fn test_admin_recalculation_and_review() {
        let t = test_app();
        let campaign = seed_campaign(&t.store, CampaignStatus::Active).await;
        seed_settled_donation(&t.store, campaign.id, "DON-7-cccccccccccc", 40_000).await;
        t.store.set_collected_amount(campaign.id, 999).await;
        let admin = token(Uuid::new_v4(), Role::Admin);

        let (status, body, _) = t
            .send(
                Method::POST,
                &format!("/api/admin/campaigns/{}/recalculate", campaign.id),
                Some(&admin),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["collectedAmount"], json!(40_000));

        let report = t
            .store
            .seed_report(NewReport {
                campaign_id: campaign.id,
                reporter_name: "Dewi".to_string(),
                reporter_email: "dewi@example.com".to_string(),
                reason: "Fake documents".to_string(),
                description: None,
            })
            .await;

        let path = format!("/api/admin/reports/{}/review", report.id);
        let (status, body, _) = t
            .send(Method::POST, &path, Some(&admin), Some(json!({ "action": "SUSPEND" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], json!("REVIEWED"));

        let (status, body, _) = t
            .send(Method::POST, &path, Some(&admin), Some(json!({ "action": "DISMISS" })))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], json!("REPORT_002"));

        let campaign = t.store.find_campaign(campaign.id).await.unwrap().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Suspended);
    }

    #[tokio::test]
    async fn test_finish_redirect_uses_gateway_status() {
        let t = test_app();
        let campaign = seed_campaign(&t.store, CampaignStatus::Active).await;
        let (_, body, _) = t
            .send(
                Method::POST,
                "/api/donations",
                None,
                Some(donation_body(campaign.id, 15_000, false)),
            )
            .await;
        let order_id = body["data"]["orderId"].as_str().unwrap().to_string();
        t.gateway.set_remote_status(&order_id, "settlement", None);

        let (status, _, headers) = t
            .send(
                Method::GET,
                &format!("/api/payments/finish?order_id={}&transaction_status=deny", order_id),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(
            headers[header::LOCATION],
            format!("{}/donation/success?order_id={}", FRONTEND, order_id).as_str()
        );
        assert_eq!(t.collected(&campaign).await, 15_000);

        let (_, _, headers) = t
            .send(Method::GET, "/api/payments/finish?order_id=DON-0-unknown", None, None)
            .await;
        assert!(headers[header::LOCATION]
            .to_str()
            .unwrap()
            .starts_with(&format!("{}/donation/error", FRONTEND)));
    }

    #[tokio::test]
    async fn test_health_and_request_id() {
        let t = test_app();
        let (status, body, headers) = t.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("healthy"));
        assert!(headers.contains_key("x-request-id"));
    }
}
