//! The standard interceptor set: tracing, auth, budget, depth, timeout,
//! human-in-the-loop approval, and adaptive recovery.
//!
//! Register them on a [`crate::Dispatcher`] in the order policy should
//! apply; the chain is immutable after startup.

mod adaptive;
mod auth;
mod budget;
mod depth;
mod hitl;
mod timeout;
mod trace;

pub use adaptive::{AdaptiveConfig, AdaptiveInterceptor};
pub use auth::AuthInterceptor;
pub use budget::BudgetInterceptor;
pub use depth::DepthInterceptor;
pub use hitl::HitlInterceptor;
pub use timeout::TimeoutInterceptor;
pub use trace::TraceInterceptor;
