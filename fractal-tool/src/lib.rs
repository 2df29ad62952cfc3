#![deny(missing_docs)]
//! Tool registry, router, and executors for fractal.
//!
//! | Piece | What it does |
//! |-------|--------------|
//! | [`ToolRegistry`] | name → (definition, executor), with filtering and suggestions |
//! | [`ToolRouter`] | permission check → arg parsing → dispatch order over executor families |
//! | [`SandboxManager`] | file tools jailed to a root dir, op allowlist, timeout |
//! | [`DynamicToolExecutor`] | model-defined tools on a restricted expression runtime |
//! | [`builtin`] | `done`, delegation definitions, unified memory/event tools |
//!
//! SYSTEM-scoped tools run with the process's own access; SANDBOXED
//! tools only ever see paths resolved through their
//! [`SandboxDescriptor`], and escape attempts come back as structured
//! errors without performing the operation.

pub mod builtin;
pub mod dynamic;
pub mod registry;
pub mod router;
pub mod sandbox;

pub use builtin::{DELEGATE_TOOL, DONE_TOOL};
pub use dynamic::{DynamicToolExecutor, DEFAULT_DYNAMIC_TIMEOUT};
pub use registry::{ExecutorFn, ToolExecutor, ToolRegistry};
pub use router::{ToolPolicy, ToolRouter};
pub use sandbox::{SandboxDescriptor, SandboxManager, SandboxOp};
