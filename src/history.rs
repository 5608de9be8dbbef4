use std::sync::Arc;

use crate::error::HistoryError;
use crate::model::Payment;
use crate::store::Store;

fn history_key(processor: &str) -> String {
    format!("payments:history:{processor}")
}

/// Appends completed payments onto their processor's history list. This
/// is an append-only log consumed by an external reader; callers must
/// not let a failure here back-propagate, the processor has already
/// accepted the payment by the time this runs.
pub struct HistoryRecorder {
    store: Arc<dyn Store>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn record(&self, payment: &Payment) -> Result<(), HistoryError> {
        let processor = payment
            .payment_processor_type
            .ok_or(HistoryError::MissingProcessor)?;

        let json = serde_json::to_string(payment)?;
        self.store
            .list_push_head(&history_key(processor.as_str()), json)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProcessorType;
    use crate::store::MockStore;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use uuid::Uuid;

    #[tokio::test]
    async fn records_onto_the_processor_specific_list() {
        let store = Arc::new(MockStore::new());
        let recorder = HistoryRecorder::new(store.clone());

        let mut payment = Payment::new(Uuid::new_v4(), Decimal::from_str("10.00").unwrap(), Utc::now());
        payment.mark_succeeded(ProcessorType::Default);

        recorder.record(&payment).await.unwrap();

        let history = store.list_snapshot("payments:history:default");
        assert_eq!(history.len(), 1);
        let recorded: Payment = serde_json::from_str(&history[0]).unwrap();
        assert_eq!(recorded.correlation_id, payment.correlation_id);
        assert_eq!(recorded.payment_processor_type, Some(ProcessorType::Default));
    }
}
