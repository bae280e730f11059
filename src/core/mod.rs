// src/core/mod.rs — Conversion engine

pub mod analysis;
pub mod orchestrator;
pub mod resume;
pub mod types;

pub use analysis::{analyze, Analysis};
pub use orchestrator::ConversionOrchestrator;
pub use types::{ConversionEvent, ConversionOutcome, ConversionPhase};
