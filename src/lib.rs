pub mod balances;
pub mod chains;
pub mod config;
pub mod engine;      // Consolidation loop and per-token state machine
pub mod error;
pub mod metrics;
pub mod protocols;   // Smart account bindings and the swap aggregator
pub mod types;
pub mod utils;
