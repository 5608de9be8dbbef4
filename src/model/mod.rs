pub mod health;
pub mod payment;
pub mod processor_type;

pub use health::{HealthView, ServiceHealthResponse};
pub use payment::{Payment, PaymentStatus};
pub use processor_type::ProcessorType;
