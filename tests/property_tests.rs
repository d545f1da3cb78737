//! Property-based tests for dry-run input validation and header handling.
//!
//! These tests use proptest to verify properties that should hold
//! for all inputs, particularly that invalid test input never reaches the engine.

use async_trait::async_trait;
use hookgate::{
    editor::{
        parse_test_headers, HookEditor, HookTarget, HookTestClient, Notice, Notifier,
        TestRunOutcome,
    },
    scripting::{
        headers::{forwardable_headers, is_header_blacklisted},
        HookConfig, HookError, HookTestRequest, HookTestResult,
    },
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CountingClient(AtomicUsize);

#[async_trait]
impl HookTestClient for CountingClient {
    async fn test_request_hook_script(
        &self,
        request: HookTestRequest,
    ) -> Result<HookTestResult, HookError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(HookTestResult {
            url: request.endpoint,
            headers: request.headers,
            body: request.body,
        })
    }
}

struct Silent;

impl Notifier for Silent {
    fn notify(&self, _notice: Notice) {}
}

/// Any JSON value that is not a string
fn non_string_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(|n| json!(n)),
        any::<bool>().prop_map(|b| json!(b)),
        Just(Value::Null),
        prop::collection::vec(any::<u8>(), 0..3).prop_map(|v| json!(v)),
        "[a-z]{1,5}".prop_map(|k| {
            let mut object = serde_json::Map::new();
            object.insert(k, json!("v"));
            Value::Object(object)
        }),
    ]
}

fn headers_with_bad_value() -> impl Strategy<Value = (String, String)> {
    (
        prop::collection::hash_map("[a-z][a-z-]{0,10}", "[ -~]{0,12}", 0..4),
        "x-[a-z]{1,8}",
        non_string_value(),
    )
        .prop_map(|(good, bad_key, bad_value)| {
            let mut map: serde_json::Map<String, Value> =
                good.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
            map.insert(bad_key.clone(), bad_value);
            (Value::Object(map).to_string(), bad_key)
        })
}

fn run(editor: &HookEditor) -> TestRunOutcome {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(editor.run_test())
}

fn editor(client: Arc<CountingClient>) -> HookEditor {
    let editor = HookEditor::new(
        HookConfig {
            enabled: true,
            code: "({onRequest:function(c,r){return r;}})".to_string(),
            ..HookConfig::default()
        },
        client,
        Arc::new(Silent),
        Arc::new(|_: HookConfig| {}),
    );
    editor.bind_target(Some(HookTarget::new("codex", "p1")));
    editor
}

proptest! {
    /// Property: a non-string header value is rejected, names its key, and
    /// never reaches the engine
    #[test]
    fn prop_non_string_header_never_reaches_engine((input, bad_key) in headers_with_bad_value()) {
        let client = Arc::new(CountingClient(AtomicUsize::new(0)));
        let editor = editor(client.clone());
        editor.set_test_headers(input);

        match run(&editor) {
            TestRunOutcome::Rejected(HookError::InvalidHeaders(msg)) => {
                prop_assert!(msg.contains(&bad_key), "message {} lacks key {}", msg, bad_key);
            }
            other => prop_assert!(false, "unexpected outcome: {:?}", other),
        }
        prop_assert_eq!(client.0.load(Ordering::SeqCst), 0);
        prop_assert!(!editor.is_testing());
    }

    /// Property: malformed body JSON is rejected before any engine call
    #[test]
    fn prop_malformed_body_never_reaches_engine(prefix in "[{\\[]{1,3}[a-z0-9\":,]{0,8}") {
        prop_assume!(serde_json::from_str::<Value>(&prefix).is_err());
        let client = Arc::new(CountingClient(AtomicUsize::new(0)));
        let editor = editor(client.clone());
        editor.set_test_body(prefix);

        let outcome = run(&editor);
        prop_assert!(matches!(outcome, TestRunOutcome::Rejected(HookError::InvalidBody(_))));
        prop_assert_eq!(client.0.load(Ordering::SeqCst), 0);
    }

    /// Property: string-valued header objects always parse to the same map
    #[test]
    fn prop_string_headers_parse(map in prop::collection::hash_map("[a-z][a-z-]{0,10}", "[ -~]{0,12}", 0..6)) {
        let input = serde_json::to_string(&map).unwrap();
        prop_assert_eq!(parse_test_headers(&input).unwrap(), map);
    }

    /// Property: forwardable headers never contain blacklisted names
    #[test]
    fn prop_forwardable_headers_drop_blacklist(
        extra in prop::collection::hash_map("[a-z][a-z-]{0,10}", "[a-z]{0,5}", 0..6)
    ) {
        let mut incoming: HashMap<String, String> = extra;
        incoming.insert("authorization".to_string(), "Bearer x".to_string());
        incoming.insert("host".to_string(), "localhost".to_string());

        let forwarded = forwardable_headers(&incoming);
        for key in forwarded.keys() {
            prop_assert!(!is_header_blacklisted(key));
        }
        prop_assert!(!forwarded.contains_key("authorization"));
    }
}
