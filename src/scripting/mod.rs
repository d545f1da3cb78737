//! JavaScript hook engine for per-provider request/response rewriting.
//!
//! A hook script evaluates to an object with optional entry points:
//! - `onRequest(context, request)`: rewrite the request before it goes upstream
//! - `onResponse(context, response)`: rewrite the response before it reaches the client
//!
//! Both must return the (possibly replaced) view object.

pub mod engine;
pub mod error;
pub mod headers;
pub mod model;
pub mod sandbox;

pub use engine::{HookEngine, HookPhase};
pub use error::{HookError, HookErrorKind};
pub use model::{
    HookConfig, HookContext, HookLanguage, HookRequest, HookResponse, HookTestRequest,
    HookTestResult, ProviderInfo,
};
pub use sandbox::{HookFlags, SandboxLimits};
