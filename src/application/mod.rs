//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases of the application.

mod analytics;
mod engine;
mod intake;
mod lifecycle;
mod queue;

pub use analytics::{AnalyticsService, BenchmarkReport, LabelledIntake, VisitStatistics};
pub use engine::HybridRiskEngine;
pub use intake::IntakeService;
pub use lifecycle::ModelRegistry;
pub use queue::TriageQueue;
