//! Service layer: provider registry, hook storage, dry runs and live-traffic
//! hook application.

pub mod hook_pipeline;
pub mod hook_store;
pub mod hook_test_service;
pub mod provider_service;

pub use hook_pipeline::{HookPipeline, OutboundRequest};
pub use hook_store::{HookKey, HookStore, StoredHook};
pub use hook_test_service::HookTestService;
pub use provider_service::ProviderService;
