//! Domain layer containing the interview logic and its vocabulary.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, language, timestamps, errors)
//! - `interview` - Signal scoring, planning, micro-planning and the phase engine

pub mod foundation;
pub mod interview;
