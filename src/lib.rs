//! Hookgate - per-provider request/response rewrite hooks
//!
//! Operators attach a small JavaScript hook to an upstream provider. The hook
//! can rewrite each outbound request (`onRequest`) and each inbound response
//! (`onResponse`) of an exchange:
//!
//! - **Sandboxed execution**: fresh QuickJS runtime per call with memory,
//!   stack and time limits, no ambient clock or randomness, frozen context
//! - **Contract checks**: the returned value must have the view's shape;
//!   a missing `return` is an error, never a silent pass-through
//! - **Dry runs**: unsaved code can be tested against synthetic input
//! - **Editor harness**: the state machine behind a hook editing surface
//!
//! # Architecture
//!
//! - [`core`]: configuration, errors, logging
//! - [`scripting`]: object model, sandbox and execution engine
//! - [`services`]: provider registry, hook store, dry runs, live pipeline
//! - [`api`]: admin HTTP API
//! - [`editor`]: editor harness and engine client seam
//!
//! # Configuration
//!
//! - `HOOKGATE_CONFIG`: optional YAML config file
//! - `ADMIN_KEY`: Admin API authentication key (required)
//! - `HOST` / `PORT`: bind address (default: 0.0.0.0:18100)
//! - `HOOK_TIMEOUT_MS`: default per-invocation budget (default: 3000)
//! - `HOOK_STORE_PATH`: JSON file the hook store persists to

pub mod api;
pub mod core;
pub mod editor;
pub mod scripting;
pub mod services;

// Re-export commonly used types for convenience
pub use api::{router, HookApiDoc, HookApiState};
pub use core::{AppConfig, AppError, Result};
pub use editor::{HookEditor, HookTestClient, HttpHookTestClient};
pub use scripting::{HookConfig, HookEngine, HookError, HookErrorKind};
pub use services::{HookPipeline, HookStore, HookTestService, ProviderService};
