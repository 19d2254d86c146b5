//! Application layer - services and command handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! The domain stays synchronous and pure; everything that awaits (storage,
//! text generation, classification) happens here.

pub mod handlers;
mod knowledge_builder;
mod plan_service;

pub use handlers::{
    ProcessTurnCommand, ProcessTurnError, ProcessTurnHandler, TurnPolicy, TurnResult,
};
pub use knowledge_builder::{scope_key, RuntimeKnowledgeBuilder, MAX_CACHED_SCOPES};
pub use plan_service::PlanService;
