use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::processor_type::ProcessorType;

/// In-memory lifecycle marker for a single dispatch attempt. Not a
/// global invariant: nothing reads `status` across process restarts,
/// it only exists to drive the state machine within one `dispatch_one`
/// call and is carried along on re-enqueue so readers can see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "PROCESSING")]
    Processing,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "RETRY")]
    Retry,
}

/// The unit of work. `correlation_id`, `amount`, and `requested_at` are
/// set once at construction and never change; `payment_processor_type`
/// is set exactly once, only on a successful dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "correlationId")]
    pub correlation_id: Uuid,
    pub amount: Decimal,
    #[serde(rename = "requestedAt")]
    pub requested_at: DateTime<Utc>,
    #[serde(rename = "paymentProcessorType", skip_serializing_if = "Option::is_none")]
    pub payment_processor_type: Option<ProcessorType>,
    pub status: PaymentStatus,
    #[serde(rename = "retryCount")]
    pub retry_count: u32,
}

impl Payment {
    pub fn new(correlation_id: Uuid, amount: Decimal, requested_at: DateTime<Utc>) -> Self {
        Self {
            correlation_id,
            amount,
            requested_at,
            payment_processor_type: None,
            status: PaymentStatus::Pending,
            retry_count: 0,
        }
    }

    pub fn mark_processing(&mut self) {
        self.status = PaymentStatus::Processing;
    }

    pub fn mark_succeeded(&mut self, processor: ProcessorType) {
        self.payment_processor_type = Some(processor);
        self.status = PaymentStatus::Success;
    }

    pub fn mark_retry(&mut self) {
        self.retry_count += 1;
        self.status = PaymentStatus::Retry;
    }

    pub fn mark_failed(&mut self) {
        self.status = PaymentStatus::Failed;
    }
}
