//! Midtrans gateway implementation
//!
//! Checkout sessions come from the Snap API, authoritative statuses from the
//! Core API status endpoint. Notifications are authenticated with
//! `SHA-512(order_id + status_code + gross_amount + server_key)`.

use crate::error::{AppError, AppResult, ExternalError, InfrastructureError};
use crate::payments::traits::PaymentGateway;
use crate::payments::types::{
    CheckoutSession, GatewayTransactionStatus, TransactionRequest,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::{Digest, Sha512};
use std::time::Duration;
use tracing::{error, info, warn};

const PROVIDER: &str = "Midtrans";

#[derive(Debug, Clone)]
pub struct MidtransConfig {
    pub server_key: String,
    /// Snap host, e.g. `https://app.sandbox.midtrans.com`
    pub snap_url: String,
    /// Core API host, e.g. `https://api.sandbox.midtrans.com`
    pub api_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// First retry delay; doubles on every further attempt
    pub retry_backoff: Duration,
}

impl Default for MidtransConfig {
    fn default() -> Self {
        Self {
            server_key: String::new(),
            snap_url: "https://app.sandbox.midtrans.com".to_string(),
            api_url: "https://api.sandbox.midtrans.com".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl MidtransConfig {
    pub fn from_env() -> AppResult<Self> {
        let server_key = std::env::var("MIDTRANS_SERVER_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AppError::from(InfrastructureError::Configuration {
                    message: "MIDTRANS_SERVER_KEY environment variable is required".to_string(),
                })
            })?;

        let defaults = Self::default();

        Ok(Self {
            server_key,
            snap_url: std::env::var("MIDTRANS_SNAP_URL").unwrap_or(defaults.snap_url),
            api_url: std::env::var("MIDTRANS_API_URL").unwrap_or(defaults.api_url),
            timeout_secs: std::env::var("MIDTRANS_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            max_retries: std::env::var("MIDTRANS_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_backoff: defaults.retry_backoff,
        })
    }
}

/// `hex(SHA-512(order_id ‖ status_code ‖ gross_amount ‖ server_key))`, lowercase
pub fn compute_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn provider_error(message: impl Into<String>, is_retryable: bool) -> AppError {
    ExternalError::PaymentProvider {
        provider: PROVIDER.to_string(),
        message: message.into(),
        is_retryable,
    }
    .into()
}

/// Core API status endpoint, with the order id encoded as a single path segment
fn status_url(api_url: &str, order_id: &str) -> AppResult<String> {
    let invalid = || {
        AppError::from(InfrastructureError::Configuration {
            message: format!("MIDTRANS_API_URL is not a valid base URL: {}", api_url),
        })
    };

    let mut url = Url::parse(api_url).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .extend(["v2", order_id, "status"]);
    Ok(url.into())
}

pub struct MidtransGateway {
    config: MidtransConfig,
    client: Client,
    auth_header: String,
}

impl MidtransGateway {
    pub fn new(config: MidtransConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AppError::from(InfrastructureError::Configuration {
                    message: format!("Failed to build HTTP client: {}", e),
                })
            })?;

        // Basic auth with the server key as user name and an empty password
        let auth_header = format!("Basic {}", STANDARD.encode(format!("{}:", config.server_key)));

        Ok(Self {
            config,
            client,
            auth_header,
        })
    }

    pub fn from_env() -> AppResult<Self> {
        Self::new(MidtransConfig::from_env()?)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.config.retry_backoff * 2_u32.saturating_pow(attempt)
    }

    /// Send an authenticated request, retrying on 429, 5xx and transport errors
    async fn make_request<T>(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let mut last_error = String::from("no attempt made");

        for attempt in 0..=self.config.max_retries {
            let mut request = self
                .client
                .request(method.clone(), url)
                .header("Authorization", &self.auth_header)
                .header("Accept", "application/json");
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < self.config.max_retries {
                        let delay = self.backoff(attempt);
                        warn!(attempt = attempt + 1, ?delay, "Midtrans request error, retrying: {}", e);
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.is_success() {
                return serde_json::from_str::<T>(&text).map_err(|e| {
                    error!("Failed to parse Midtrans response: {}", e);
                    provider_error(format!("Invalid response format: {}", e), false)
                });
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < self.config.max_retries {
                let delay = self.backoff(attempt);
                warn!(attempt = attempt + 1, %status, ?delay, "Midtrans returned retryable status");
                tokio::time::sleep(delay).await;
                last_error = format!("HTTP {}", status);
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(ExternalError::RateLimit {
                    service: PROVIDER.to_string(),
                    retry_after: None,
                }
                .into());
            }

            let message = serde_json::from_str::<MidtransErrorBody>(&text)
                .ok()
                .and_then(|body| body.error_messages)
                .map(|messages| messages.join("; "))
                .unwrap_or(text);
            error!(%status, "Midtrans API error: {}", message);
            return Err(provider_error(
                format!("HTTP {}: {}", status, message),
                status.is_server_error(),
            ));
        }

        Err(provider_error(
            format!(
                "Request failed after {} retries: {}",
                self.config.max_retries, last_error
            ),
            true,
        ))
    }
}

#[async_trait]
impl PaymentGateway for MidtransGateway {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn create_transaction(&self, request: TransactionRequest) -> AppResult<CheckoutSession> {
        if request.amount <= 0 {
            return Err(provider_error(
                format!("gross amount must be positive, got {}", request.amount),
                false,
            ));
        }

        info!(order_id = %request.order_id, amount = request.amount, "Creating Midtrans transaction");

        let mut payload = serde_json::json!({
            "transaction_details": {
                "order_id": request.order_id,
                "gross_amount": request.amount,
            },
            "customer_details": {
                "first_name": request.customer.first_name,
                "email": request.customer.email,
            },
            "item_details": request.items.iter().map(|item| serde_json::json!({
                "id": item.id,
                "name": item.name,
                "price": item.price,
                "quantity": item.quantity,
            })).collect::<Vec<_>>(),
        });

        if let Some(phone) = &request.customer.phone {
            payload["customer_details"]["phone"] = serde_json::Value::String(phone.clone());
        }
        if let Some(finish_url) = &request.finish_url {
            payload["callbacks"] = serde_json::json!({ "finish": finish_url });
        }

        let url = format!("{}/snap/v1/transactions", self.config.snap_url);
        let response: SnapTransactionResponse =
            self.make_request(Method::POST, &url, Some(&payload)).await?;

        info!(order_id = %request.order_id, "Midtrans transaction created");

        Ok(CheckoutSession {
            token: response.token,
            redirect_url: response.redirect_url,
        })
    }

    fn verify_signature(
        &self,
        order_id: &str,
        status_code: &str,
        gross_amount: &str,
        signature: &str,
    ) -> bool {
        let expected = compute_signature(order_id, status_code, gross_amount, &self.config.server_key);
        constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }

    async fn get_transaction_status(&self, order_id: &str) -> AppResult<GatewayTransactionStatus> {
        let url = status_url(&self.config.api_url, order_id)?;
        let response: CoreStatusResponse = self.make_request(Method::GET, &url, None).await?;

        // The Core API answers unknown orders with HTTP 200 and a 404 body
        let Some(transaction_status) = response.transaction_status else {
            return Err(provider_error(
                format!(
                    "status {} for order {}: {}",
                    response.status_code,
                    order_id,
                    response.status_message.unwrap_or_default()
                ),
                false,
            ));
        };

        info!(order_id, transaction_status = %transaction_status, "Fetched Midtrans transaction status");

        Ok(GatewayTransactionStatus {
            order_id: response.order_id.unwrap_or_else(|| order_id.to_string()),
            transaction_status,
            fraud_status: response.fraud_status,
            status_code: response.status_code,
            gross_amount: response.gross_amount.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SnapTransactionResponse {
    token: String,
    redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct MidtransErrorBody {
    error_messages: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CoreStatusResponse {
    status_code: String,
    #[serde(default)]
    status_message: Option<String>,
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    transaction_status: Option<String>,
    #[serde(default)]
    fraud_status: Option<String>,
    #[serde(default)]
    gross_amount: Option<String>,
}
