pub mod config;

pub mod counters;

pub mod error;

pub mod priority;

pub mod scheduler;

pub mod slots;

pub mod telemetry;

mod queue;

pub use config::QosConfig;
pub use counters::{RollingAverageCounter, RollingRateCounter};
pub use error::{AdmissionError, QosError};
pub use priority::{Priority, PriorityExtractor, BYPASS, MAX_URGENCY};
pub use scheduler::{admission_middleware, AdmissionScheduler};
pub use slots::SlotPool;
pub use telemetry::{QosTelemetry, SAMPLE_WINDOW};
