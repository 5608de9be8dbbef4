use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one of the two external payment processors. `Default` is
/// preferred for its lower fee; `Fallback` is tried only when `Default`
/// is unhealthy or rejects the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessorType {
    #[serde(rename = "DEFAULT")]
    Default,
    #[serde(rename = "FALLBACK")]
    Fallback,
}

impl ProcessorType {
    pub const ALL: [ProcessorType; 2] = [ProcessorType::Default, ProcessorType::Fallback];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ProcessorType::Default => "default",
            ProcessorType::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ProcessorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
