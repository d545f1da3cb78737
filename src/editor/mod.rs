//! Hook editor harness: configuration editing state and dry-run coordination.

pub mod client;
pub mod harness;
pub mod notify;
pub mod template;

pub use client::{HookTestClient, HttpHookTestClient};
pub use harness::{
    parse_test_body, parse_test_headers, ConfigChangeFn, EditorView, HookEditor, HookTarget,
    TestRunOutcome,
};
pub use notify::{Notice, NoticeLevel, Notifier, TracingNotifier};
pub use template::{DEFAULT_TEST_BODY, DEFAULT_TEST_HEADERS, REQUEST_HOOK_TEMPLATE, TEST_ENDPOINT};
