//! Admission control
//!
//! Every request passes, in order:
//!
//! 1. the block list (blocked clients are denied, no counters touched)
//! 2. the minute window request count
//! 3. the hour window request count
//! 4. the minute cost budget
//!
//! The first failing check decides. Only an admitted request increments the
//! minute, hour and cost counters, each exactly once. Every quota denial
//! is recorded as a violation; repeat offenders are blocked automatically.
//!
//! Counters live in fixed windows in the shared store and are updated with
//! a non-atomic read-modify-write, trading a little precision under
//! contention for O(1) state and no cross-instance coordination.
//!
//! # Example
//!
//! ```rust,no_run
//! use gatekeeper::clock::SystemClock;
//! use gatekeeper::config::GatekeeperConfig;
//! use gatekeeper::rate_limit::AdmissionService;
//! use gatekeeper::store::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let clock = Arc::new(SystemClock);
//!     let store = Arc::new(MemoryStore::new(clock.clone()));
//!     let service = AdmissionService::new(store, clock, &GatekeeperConfig::default());
//!
//!     let result = service.check("1.2.3.4", "skills").await;
//!     assert!(result.allowed);
//! }
//! ```

pub mod counter;
pub mod middleware;
pub mod policy;
pub mod response;
pub mod service;
pub mod types;
pub mod window;

// Re-export commonly used types
pub use counter::CounterStore;
pub use middleware::{admission_middleware, AdmissionState};
pub use policy::{QuotaLimits, QuotaPolicy};
pub use response::{add_rate_limit_headers, advisory_headers, Rejection, RpcError};
pub use service::AdmissionService;
pub use types::{AdmissionResult, Decision};
pub use window::{CounterKind, Horizon, WindowKey};
