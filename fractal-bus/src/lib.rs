#![deny(missing_docs)]
//! Event bus and dispatcher for fractal.
//!
//! A topic-routed pub/sub substrate ([`EventBus`]) with a bounded
//! diagnostic ring buffer, wrapped by a [`Dispatcher`] that runs an
//! ordered [`Interceptor`] chain around every publication:
//!
//! 1. Pre hooks run in registration order; any may rewrite the event
//!    (the rewrite flows downstream), block it, or fail the dispatch.
//! 2. The (possibly rewritten) event is published under a deadline.
//! 3. Post hooks run in reverse order for the pre-succeeded prefix.
//!
//! The standard interceptor set lives in [`interceptors`]: tracing,
//! auth, budget, depth, timeout, human-in-the-loop, and adaptive
//! recovery.

pub mod bus;
pub mod dispatcher;
pub mod interceptors;
pub mod pattern;

pub use bus::{EventBus, EventHandler, EventRecord, HandlerError, SubscriptionId, DEFAULT_RING_CAPACITY};
pub use dispatcher::{Dispatcher, DispatcherBuilder, DispatchOutcome, Interceptor, DEFAULT_DISPATCH_TIMEOUT};
pub use pattern::TopicPattern;
