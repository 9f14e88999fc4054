//! Suppression decisions for incoming alerts

pub mod evaluator;

pub use evaluator::{evaluate, Suppression, SuppressionEvaluator};
