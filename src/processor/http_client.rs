use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::model::{HealthView, Payment, ProcessorType, ServiceHealthResponse};

use super::{ProcessorClient, SubmitOutcome};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const PROBE_TIMEOUT: Duration = Duration::from_secs(4);
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

const ACCEPTED_PHRASE: &str = "payment processed successfully";
const IDEMPOTENT_PHRASE: &str = "correlationid already exists";

#[derive(Debug, Serialize)]
struct PaymentRequest {
    #[serde(rename = "correlationId")]
    correlation_id: Uuid,
    amount: Decimal,
    #[serde(rename = "requestedAt")]
    requested_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentRequest {
    fn from(payment: &Payment) -> Self {
        Self {
            correlation_id: payment.correlation_id,
            amount: payment.amount,
            requested_at: payment.requested_at,
        }
    }
}

/// `ProcessorClient` backed by a shared connection-pooled `reqwest`
/// client, one base URL per processor identity.
pub struct HttpProcessorClient {
    client: Client,
    default_base_url: String,
    fallback_base_url: String,
}

impl HttpProcessorClient {
    pub fn new(default_base_url: String, fallback_base_url: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            client,
            default_base_url,
            fallback_base_url,
        })
    }

    fn base_url(&self, kind: ProcessorType) -> &str {
        match kind {
            ProcessorType::Default => &self.default_base_url,
            ProcessorType::Fallback => &self.fallback_base_url,
        }
    }
}

#[async_trait]
impl ProcessorClient for HttpProcessorClient {
    async fn probe(&self, kind: ProcessorType) -> Option<HealthView> {
        let url = format!("{}/payments/service-health", self.base_url(kind));

        let call = self.client.get(&url).send();
        let response = match tokio::time::timeout(PROBE_TIMEOUT, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                tracing::warn!(%kind, %error, "health probe transport error");
                return None;
            }
            Err(_) => {
                tracing::warn!(%kind, "health probe timed out");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(%kind, status = %response.status(), "health probe non-2xx");
            return None;
        }

        match response.json::<ServiceHealthResponse>().await {
            Ok(body) => Some(HealthView::new(body.failing, body.min_response_time)),
            Err(error) => {
                tracing::warn!(%kind, %error, "health probe response did not decode");
                None
            }
        }
    }

    async fn submit(&self, kind: ProcessorType, payment: &Payment) -> SubmitOutcome {
        let url = format!("{}/payments", self.base_url(kind));
        let body = PaymentRequest::from(payment);

        let call = self.client.post(&url).json(&body).send();
        let response = match tokio::time::timeout(SUBMIT_TIMEOUT, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                tracing::warn!(%kind, correlation_id = %payment.correlation_id, %error, "submit transport error");
                return SubmitOutcome::Rejected;
            }
            Err(_) => {
                tracing::warn!(%kind, correlation_id = %payment.correlation_id, "submit timed out");
                return SubmitOutcome::Rejected;
            }
        };

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let outcome = classify_submit_response(status, &text);

        if outcome == SubmitOutcome::Accepted && status == 422 {
            tracing::info!(
                %kind,
                correlation_id = %payment.correlation_id,
                "treating idempotent replay as success"
            );
        } else if outcome == SubmitOutcome::Rejected {
            tracing::debug!(%kind, correlation_id = %payment.correlation_id, status, "submit rejected");
        }

        outcome
    }
}

/// Pure classification of a `POST /payments` response, isolated from
/// the network call so the acceptance rules can be tested directly.
fn classify_submit_response(status: u16, body: &str) -> SubmitOutcome {
    let lowercase_body = body.to_lowercase();

    if status == 200 && lowercase_body.contains(ACCEPTED_PHRASE) {
        return SubmitOutcome::Accepted;
    }

    if status == 422 && lowercase_body.contains(IDEMPOTENT_PHRASE) {
        return SubmitOutcome::Accepted;
    }

    SubmitOutcome::Rejected
}
