//! Application handlers.
//!
//! Command handlers that orchestrate domain operations.

pub mod interview;

pub use interview::{
    ProcessTurnCommand, ProcessTurnError, ProcessTurnHandler, TurnPolicy, TurnResult,
};
