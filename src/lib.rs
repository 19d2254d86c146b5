//! Interview Conductor - adaptive pacing for AI-led interviews
//!
//! Decides, turn by turn, which topic to ask about next, how many questions
//! each topic gets, when to dig deeper, when to offer more time and when to
//! close. Question phrasing is left to the caller; this crate produces the
//! supervisor insight and question plan that drive it.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
