//! Behavioural tests for flag, environment and default precedence.

use std::cell::RefCell;
use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use loom_config::{Config, default_log_filter, default_queue_capacity};

static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

struct Harness {
    cli_args: RefCell<Vec<OsString>>,
    env_overrides: RefCell<Vec<(String, Option<OsString>)>>,
    loaded: RefCell<Option<Config>>,
    error: RefCell<Option<String>>,
    _env_guard: MutexGuard<'static, ()>,
}

impl Harness {
    fn new() -> Self {
        let guard = ENV_MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Self {
            cli_args: RefCell::new(vec![OsString::from("loomd")]),
            env_overrides: RefCell::new(Vec::new()),
            loaded: RefCell::new(None),
            error: RefCell::new(None),
            _env_guard: guard,
        }
    }

    fn set_env(&self, key: &str, value: &str) {
        let previous = std::env::var_os(key);
        // Environment mutation is `unsafe` in edition 2024; `ENV_MUTEX`
        // serialises the scenarios and `Drop` restores the previous value.
        unsafe { std::env::set_var(key, value) };
        self.env_overrides
            .borrow_mut()
            .push((key.to_owned(), previous));
    }

    fn push_cli_arg(&self, arg: impl Into<OsString>) {
        self.cli_args.borrow_mut().push(arg.into());
    }

    fn load(&self) {
        let args = self.cli_args.borrow().clone();
        match Config::load_from_iter(args) {
            Ok(config) => *self.loaded.borrow_mut() = Some(config),
            Err(error) => *self.error.borrow_mut() = Some(error.to_string()),
        }
    }

    fn loaded_config(&self) -> Config {
        if let Some(error) = self.error.borrow().as_ref() {
            panic!("configuration failed to load: {error}");
        }
        match self.loaded.borrow().as_ref() {
            Some(config) => config.clone(),
            None => panic!("configuration was not loaded"),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let mut overrides = self.env_overrides.borrow_mut();
        while let Some((key, value)) = overrides.pop() {
            if let Some(os_value) = value {
                unsafe { std::env::set_var(&key, os_value) };
            } else {
                unsafe { std::env::remove_var(&key) };
            }
        }
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("the environment sets the log filter to \"{filter}\"")]
fn given_environment_filter(harness: &Harness, filter: String) {
    harness.set_env("LOOM_LOG_FILTER", &filter);
}

#[given("the command line sets the log filter to \"{filter}\"")]
fn given_cli_filter(harness: &Harness, filter: String) {
    harness.push_cli_arg("--log-filter");
    harness.push_cli_arg(filter);
}

#[given("the command line sets the queue capacity to {capacity}")]
fn given_cli_capacity(harness: &Harness, capacity: String) {
    harness.push_cli_arg("--queue-capacity");
    harness.push_cli_arg(capacity);
}

#[when("the configuration is loaded")]
fn when_loaded(harness: &Harness) {
    harness.load();
}

#[then("the log filter is \"{filter}\"")]
fn then_log_filter(harness: &Harness, filter: String) {
    assert_eq!(harness.loaded_config().log_filter(), filter);
}

#[then("the queue capacity is {capacity}")]
fn then_queue_capacity(harness: &Harness, capacity: usize) {
    let config = harness.loaded_config();
    assert_eq!(config.queue_capacity(), capacity);
    assert_eq!(config.queue_capacity(), default_queue_capacity());
    assert_eq!(config.log_filter(), default_log_filter());
}

#[then("loading fails")]
fn then_loading_fails(harness: &Harness) {
    assert!(
        harness.error.borrow().is_some(),
        "expected configuration loading to fail"
    );
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Defaults apply when nothing is configured"
)]
fn defaults_apply(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Environment overrides defaults"
)]
fn environment_overrides_defaults(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Flags override the environment"
)]
fn flags_override_environment(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Invalid queue capacity fails fast"
)]
fn invalid_queue_capacity(#[from(harness)] harness: Harness) {
    let _ = harness;
}
