//! Storage Adapters
//!
//! Implementations of the PlanRepository port.
//!
//! ## Available Adapters
//!
//! - **FilePlanRepository** - One YAML file per bot
//! - **InMemoryPlanRepository** - HashMap behind a tokio RwLock (testing/development)
//!
//! ## Usage
//!
//! ```ignore
//! use adapters::storage::{FilePlanRepository, InMemoryPlanRepository};
//!
//! let plans = FilePlanRepository::new("./data/plans");
//! let plans = InMemoryPlanRepository::new();
//! ```

mod file_plan_repository;
mod in_memory_plan_repository;

pub use file_plan_repository::FilePlanRepository;
pub use in_memory_plan_repository::InMemoryPlanRepository;
