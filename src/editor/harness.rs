//! State machine binding one [`HookConfig`] to an editing surface.
//!
//! The harness never owns the configuration. It keeps a read snapshot that
//! the parent refreshes with [`HookEditor::sync_config`], and every change is
//! requested through the `on_config_change` callback. Dry-run results are
//! render-only state and are never written back into the configuration.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::client::HookTestClient;
use super::notify::{Notice, Notifier};
use super::template::{DEFAULT_TEST_BODY, DEFAULT_TEST_HEADERS, REQUEST_HOOK_TEMPLATE, TEST_ENDPOINT};
use crate::scripting::headers::string_header_map;
use crate::scripting::{HookConfig, HookError, HookTestRequest, HookTestResult};

/// Callback through which the harness asks the parent to change the config.
pub type ConfigChangeFn = Arc<dyn Fn(HookConfig) + Send + Sync>;

/// Persisted identity a dry run executes against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookTarget {
    pub app_id: String,
    pub provider_id: String,
}

impl HookTarget {
    pub fn new(app_id: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            provider_id: provider_id.into(),
        }
    }
}

/// What the editing surface shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorView {
    Collapsed,
    /// Expanded, but the hook is disabled so the code editor stays hidden.
    ExpandedHidden,
    Editing,
}

/// How a `run_test` call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TestRunOutcome {
    /// The engine returned a result, now stored as the last result.
    Completed(HookTestResult),
    /// Another dry run was already in flight; nothing happened.
    Skipped,
    /// Input validation failed before any engine call.
    Rejected(HookError),
    /// The engine call failed; the previous result is kept.
    Failed(HookError),
    /// The harness was torn down before the call resolved.
    Discarded,
}

struct EditorState {
    config: HookConfig,
    target: Option<HookTarget>,
    expanded: bool,
    test_panel_open: bool,
    testing: bool,
    test_headers: String,
    test_body: String,
    last_result: Option<HookTestResult>,
    alive: bool,
}

fn lock(state: &Mutex<EditorState>) -> MutexGuard<'_, EditorState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resets `testing` on every exit path of a dry run.
struct TestingGuard(Arc<Mutex<EditorState>>);

impl Drop for TestingGuard {
    fn drop(&mut self) {
        lock(&self.0).testing = false;
    }
}

/// Parse the header input: a JSON object whose values are all strings.
/// Blank input means no headers.
pub fn parse_test_headers(input: &str) -> Result<HashMap<String, String>, HookError> {
    if input.trim().is_empty() {
        return Ok(HashMap::new());
    }

    let value: Value = serde_json::from_str(input)
        .map_err(|e| HookError::InvalidHeaders(format!("not valid JSON: {e}")))?;
    string_header_map(&value)
}

/// Parse the body input as any JSON value. Blank input means `null`.
pub fn parse_test_body(input: &str) -> Result<Value, HookError> {
    if input.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(input).map_err(|e| HookError::InvalidBody(e.to_string()))
}

/// Editor harness handle. Clones share the same state.
#[derive(Clone)]
pub struct HookEditor {
    state: Arc<Mutex<EditorState>>,
    client: Arc<dyn HookTestClient>,
    notifier: Arc<dyn Notifier>,
    on_config_change: ConfigChangeFn,
}

impl HookEditor {
    pub fn new(
        config: HookConfig,
        client: Arc<dyn HookTestClient>,
        notifier: Arc<dyn Notifier>,
        on_config_change: ConfigChangeFn,
    ) -> Self {
        let expanded = config.enabled;
        Self {
            state: Arc::new(Mutex::new(EditorState {
                config,
                target: None,
                expanded,
                test_panel_open: false,
                testing: false,
                test_headers: DEFAULT_TEST_HEADERS.to_string(),
                test_body: DEFAULT_TEST_BODY.to_string(),
                last_result: None,
                alive: true,
            })),
            client,
            notifier,
            on_config_change,
        }
    }

    fn state(&self) -> MutexGuard<'_, EditorState> {
        lock(&self.state)
    }

    /// Send a modified copy of the current snapshot to the parent.
    fn request_change(&self, change: impl FnOnce(&mut HookConfig)) {
        let mut config = self.state().config.clone();
        change(&mut config);
        (self.on_config_change)(config);
    }

    /// Replace the snapshot with the parent's current config.
    pub fn sync_config(&self, config: HookConfig) {
        self.state().config = config;
    }

    /// Bind (or clear) the persisted identity dry runs execute against.
    pub fn bind_target(&self, target: Option<HookTarget>) {
        self.state().target = target;
    }

    pub fn view(&self) -> EditorView {
        let state = self.state();
        match (state.expanded, state.config.enabled) {
            (false, _) => EditorView::Collapsed,
            (true, false) => EditorView::ExpandedHidden,
            (true, true) => EditorView::Editing,
        }
    }

    pub fn toggle_expanded(&self) {
        let mut state = self.state();
        state.expanded = !state.expanded;
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.request_change(|config| config.enabled = enabled);
    }

    pub fn set_code(&self, code: impl Into<String>) {
        let code = code.into();
        self.request_change(|config| config.code = code);
    }

    pub fn set_timeout_ms(&self, timeout_ms: Option<u64>) {
        self.request_change(|config| config.timeout_ms = timeout_ms);
    }

    /// Replace the code with the built-in example and enable the hook.
    pub fn insert_template(&self) {
        self.state().expanded = true;
        self.request_change(|config| {
            config.code = REQUEST_HOOK_TEMPLATE.to_string();
            config.enabled = true;
        });
    }

    pub fn open_test_panel(&self) {
        self.state().test_panel_open = true;
    }

    pub fn close_test_panel(&self) {
        self.state().test_panel_open = false;
    }

    pub fn toggle_test_panel(&self) {
        let mut state = self.state();
        state.test_panel_open = !state.test_panel_open;
    }

    pub fn set_test_headers(&self, input: impl Into<String>) {
        self.state().test_headers = input.into();
    }

    pub fn set_test_body(&self, input: impl Into<String>) {
        self.state().test_body = input.into();
    }

    /// Mark the harness dead. Results of calls still in flight are dropped.
    pub fn teardown(&self) {
        self.state().alive = false;
    }

    pub fn config(&self) -> HookConfig {
        self.state().config.clone()
    }

    pub fn target(&self) -> Option<HookTarget> {
        self.state().target.clone()
    }

    pub fn is_expanded(&self) -> bool {
        self.state().expanded
    }

    pub fn is_test_panel_open(&self) -> bool {
        self.state().test_panel_open
    }

    pub fn is_testing(&self) -> bool {
        self.state().testing
    }

    pub fn test_headers(&self) -> String {
        self.state().test_headers.clone()
    }

    pub fn test_body(&self) -> String {
        self.state().test_body.clone()
    }

    pub fn last_result(&self) -> Option<HookTestResult> {
        self.state().last_result.clone()
    }

    pub fn is_alive(&self) -> bool {
        self.state().alive
    }

    /// Validate the current inputs into an engine request.
    fn prepare(state: &EditorState) -> Result<HookTestRequest, HookError> {
        let target = state.target.as_ref().ok_or_else(|| {
            HookError::Config("save the provider before testing its hook".to_string())
        })?;
        if !state.config.has_code() {
            return Err(HookError::ScriptEmpty);
        }
        let headers = parse_test_headers(&state.test_headers)?;
        let body = parse_test_body(&state.test_body)?;

        Ok(HookTestRequest {
            provider_id: target.provider_id.clone(),
            app_id: target.app_id.clone(),
            code: state.config.code.clone(),
            headers,
            body,
            endpoint: TEST_ENDPOINT.to_string(),
            timeout_ms: state.config.timeout_ms,
        })
    }

    /// Dry-run the request hook against the current test inputs.
    ///
    /// At most one call is in flight per harness; a trigger while one is
    /// pending returns [`TestRunOutcome::Skipped`] without touching the engine.
    pub async fn run_test(&self) -> TestRunOutcome {
        let request = {
            let mut state = self.state();
            if !state.alive {
                return TestRunOutcome::Discarded;
            }
            if state.testing {
                tracing::debug!("Dry run already in flight, ignoring trigger");
                return TestRunOutcome::Skipped;
            }
            match Self::prepare(&state) {
                Ok(request) => {
                    state.testing = true;
                    request
                }
                Err(e) => {
                    drop(state);
                    self.notifier.notify(Notice::error(e.to_string()));
                    return TestRunOutcome::Rejected(e);
                }
            }
        };
        let _guard = TestingGuard(self.state.clone());

        tracing::debug!(
            app = %request.app_id,
            provider = %request.provider_id,
            endpoint = %request.endpoint,
            "Running hook dry run"
        );
        let result = self.client.test_request_hook_script(request).await;

        let mut state = self.state();
        if !state.alive {
            tracing::debug!("Hook editor torn down, discarding dry-run result");
            return TestRunOutcome::Discarded;
        }
        match result {
            Ok(result) => {
                state.last_result = Some(result.clone());
                drop(state);
                self.notifier.notify(Notice::success("Hook test succeeded"));
                TestRunOutcome::Completed(result)
            }
            Err(e) => {
                drop(state);
                self.notifier.notify(Notice::error(e.to_string()));
                TestRunOutcome::Failed(e)
            }
        }
    }
}
