//! Interview command handlers.

mod process_turn;

pub use process_turn::{
    ProcessTurnCommand, ProcessTurnError, ProcessTurnHandler, TurnPolicy, TurnResult,
};
