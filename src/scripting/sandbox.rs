//! Sandboxed QuickJS runtime creation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rquickjs::{context::EvalOptions, Context, Ctx, Function, Object, Runtime, Value};

use super::error::HookError;

pub const DEFAULT_MEMORY_LIMIT: usize = 16 * 1024 * 1024; // 16 MB
pub const DEFAULT_MAX_STACK_SIZE: usize = 512 * 1024;

/// Maximum script source size in bytes (1 MB).
pub const MAX_SCRIPT_SIZE: usize = 1024 * 1024;

/// Replaces ambient sources of nondeterminism before any user code runs.
const PRELUDE: &str = r#"
(function (g) {
  function deny(name) {
    return function () {
      throw new Error(name + " is not available in hooks; read it from context instead");
    };
  }
  g.Math.random = deny("Math.random");
  var date = deny("Date");
  date.now = deny("Date.now");
  g.Date = date;
})(globalThis);
"#;

const DEEP_FREEZE: &str = r#"
(function deepFreeze(value) {
  if (value !== null && typeof value === "object" && !Object.isFrozen(value)) {
    Object.getOwnPropertyNames(value).forEach(function (key) {
      deepFreeze(value[key]);
    });
    Object.freeze(value);
  }
  return value;
})
"#;

/// Resource limits applied to every sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    pub memory_limit: usize,
    pub max_stack_size: usize,
    pub max_script_size: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            memory_limit: DEFAULT_MEMORY_LIMIT,
            max_stack_size: DEFAULT_MAX_STACK_SIZE,
            max_script_size: MAX_SCRIPT_SIZE,
        }
    }
}

impl SandboxLimits {
    pub fn check_size(&self, source: &str) -> Result<(), HookError> {
        if source.len() > self.max_script_size {
            return Err(HookError::Config(format!(
                "Script size ({} bytes) exceeds maximum ({} bytes)",
                source.len(),
                self.max_script_size
            )));
        }
        Ok(())
    }
}

/// One isolated runtime + context, used for exactly one invocation.
///
/// The interrupt handler aborts execution once `budget` has elapsed since
/// creation; `timed_out()` reports whether that happened.
pub struct Sandbox {
    // Field order matters: the context must be dropped before its runtime.
    context: Context,
    _runtime: Runtime,
    timed_out: Arc<AtomicBool>,
    budget: Duration,
}

impl Sandbox {
    pub fn new(limits: &SandboxLimits, budget: Duration) -> Result<Self, HookError> {
        let runtime = Runtime::new()
            .map_err(|e| HookError::Execution(format!("Failed to create JS runtime: {e}")))?;
        runtime.set_memory_limit(limits.memory_limit);
        runtime.set_max_stack_size(limits.max_stack_size);

        let timed_out = Arc::new(AtomicBool::new(false));
        let flag = timed_out.clone();
        let deadline = Instant::now() + budget;
        runtime.set_interrupt_handler(Some(Box::new(move || {
            if Instant::now() >= deadline {
                flag.store(true, Ordering::Relaxed);
                return true;
            }
            false
        })));

        let context = Context::full(&runtime)
            .map_err(|e| HookError::Execution(format!("Failed to create JS context: {e}")))?;

        let sandbox = Self {
            context,
            _runtime: runtime,
            timed_out,
            budget,
        };
        sandbox.context.with(|ctx| {
            ctx.eval::<Value, _>(PRELUDE)
                .map(|_| ())
                .map_err(|e| sandbox.failure(&ctx, e))
        })?;
        Ok(sandbox)
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Convert an interpreter error into the hook taxonomy, pulling the
    /// pending exception out of `ctx` when there is one.
    pub fn failure(&self, ctx: &Ctx<'_>, err: rquickjs::Error) -> HookError {
        let message = describe_error(ctx, err);
        if self.timed_out() {
            return HookError::Timeout(format!(
                "hook exceeded its {} ms execution budget",
                self.budget.as_millis()
            ));
        }
        HookError::Execution(message)
    }
}

fn describe_error(ctx: &Ctx<'_>, err: rquickjs::Error) -> String {
    if !err.is_exception() {
        return err.to_string();
    }

    let caught = ctx.catch();
    if let Some(exception) = caught.as_exception() {
        let message = exception.message().unwrap_or_default();
        let name: Option<String> = exception.as_object().get("name").ok();
        return match name {
            Some(name) if !name.is_empty() => format!("{name}: {message}"),
            _ => message,
        };
    }

    let rendered = ctx
        .json_stringify(caught)
        .ok()
        .flatten()
        .and_then(|s| s.to_string().ok())
        .unwrap_or_else(|| "undefined".to_string());
    format!("uncaught exception: {rendered}")
}

/// Evaluate the hook source; it must produce an object literal.
///
/// The source runs in sloppy mode: writes to frozen `context` are dropped
/// unless a hook opts into `"use strict"`, in which case they throw.
pub fn load_module<'js>(
    sandbox: &Sandbox,
    ctx: &Ctx<'js>,
    source: &str,
) -> Result<Object<'js>, HookError> {
    let mut options = EvalOptions::default();
    options.strict = false;
    let value: Value = ctx
        .eval_with_options(source, options)
        .map_err(|e| sandbox.failure(ctx, e))?;
    value.into_object().ok_or_else(|| {
        HookError::Execution(
            "Script must evaluate to an object, e.g. ({ onRequest: function (context, request) { return request; } })"
                .to_string(),
        )
    })
}

/// Look up an optional hook function on the module object.
pub fn hook_function<'js>(
    sandbox: &Sandbox,
    ctx: &Ctx<'js>,
    module: &Object<'js>,
    name: &str,
) -> Result<Option<Function<'js>>, HookError> {
    let value: Value = module.get(name).map_err(|e| sandbox.failure(ctx, e))?;
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    value
        .into_function()
        .map(Some)
        .ok_or_else(|| HookError::Execution(format!("{name} must be a function")))
}

/// Recursively freeze `value` so script writes to it have no effect.
pub fn freeze<'js>(
    sandbox: &Sandbox,
    ctx: &Ctx<'js>,
    value: Value<'js>,
) -> Result<Value<'js>, HookError> {
    let deep_freeze: Function = ctx
        .eval(DEEP_FREEZE)
        .map_err(|e| sandbox.failure(ctx, e))?;
    deep_freeze
        .call((value,))
        .map_err(|e| sandbox.failure(ctx, e))
}

/// Flags indicating which hooks a script defines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookFlags {
    pub on_request: bool,
    pub on_response: bool,
}

impl HookFlags {
    pub fn has_any(&self) -> bool {
        self.on_request || self.on_response
    }
}

/// Validate a hook script by evaluating it in a sandbox.
///
/// Blank source is accepted (a no-op hook). Anything else must evaluate to an
/// object defining at least one of `onRequest` / `onResponse`.
pub fn validate_script(
    source: &str,
    limits: &SandboxLimits,
    budget: Duration,
) -> Result<HookFlags, HookError> {
    if source.trim().is_empty() {
        return Ok(HookFlags::default());
    }
    limits.check_size(source)?;

    let sandbox = Sandbox::new(limits, budget)?;
    let hooks = sandbox.context().with(|ctx| -> Result<HookFlags, HookError> {
        let module = load_module(&sandbox, &ctx, source)?;
        Ok(HookFlags {
            on_request: hook_function(&sandbox, &ctx, &module, "onRequest")?.is_some(),
            on_response: hook_function(&sandbox, &ctx, &module, "onResponse")?.is_some(),
        })
    })?;

    if !hooks.has_any() {
        return Err(HookError::Config(
            "Script must define at least one hook: onRequest or onResponse".to_string(),
        ));
    }
    Ok(hooks)
}
