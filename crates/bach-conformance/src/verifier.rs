//! Comparison of execution output against declared expectations
//!
//! Checks run in a fixed order and only when the fixture declares the
//! corresponding expectation. Each evaluated check becomes an [`Assertion`]
//! pushed into an [`AssertionSink`]. A sink returning `ControlFlow::Break`
//! cancels the stream: no later check is evaluated.

use crate::collaborator::{logs_hash, ExecutionResult, LogEntry, StateStore};
use crate::fixture::{ExceptionRule, Expectations, GasRule};
use crate::types::{parse_address, parse_word, to_hex, u256_to_h256, AccountState};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::ControlFlow;

/// One kind of comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Check {
    /// Best block hash after a block import
    HeadHash,
    /// Return data, byte-exact
    ReturnData,
    /// Declared log list
    Logs,
    /// Gas rule
    Gas,
    /// Hash of the emitted logs
    LogsHash,
    /// State root after execution
    StateRoot,
    /// Exceptional termination
    Exception,
    /// Declared post-execution accounts
    PostState,
}

impl Check {
    /// Evaluation order
    pub const ORDER: [Check; 8] = [
        Check::HeadHash,
        Check::ReturnData,
        Check::Logs,
        Check::Gas,
        Check::LogsHash,
        Check::StateRoot,
        Check::Exception,
        Check::PostState,
    ];
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Check::HeadHash => "valid last block hash",
            Check::ReturnData => "valid return value",
            Check::Logs => "valid logs",
            Check::Gas => "valid gas usage",
            Check::LogsHash => "valid logs hash",
            Check::StateRoot => "valid state root",
            Check::Exception => "valid exception behaviour",
            Check::PostState => "valid post state",
        };
        f.write_str(label)
    }
}

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    /// Fixture (file-level test) name
    pub fixture: String,
    /// Sub-test name
    pub sub_test: String,
    /// Which comparison
    pub check: Check,
    /// Whether it matched
    pub passed: bool,
    /// Human-readable difference when it did not
    pub diff: Option<String>,
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed { "ok" } else { "not ok" };
        write!(f, "{} {}/{}: {}", status, self.fixture, self.sub_test, self.check)?;
        if let Some(diff) = &self.diff {
            write!(f, " ({})", diff)?;
        }
        Ok(())
    }
}

/// Consumer of the assertion stream
pub trait AssertionSink {
    /// Take one assertion; `Break` stops the stream
    fn record(&mut self, assertion: Assertion) -> ControlFlow<()>;
}

/// Keeps every assertion
#[derive(Debug, Default)]
pub struct CollectingSink {
    assertions: Vec<Assertion>,
}

impl CollectingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Assertions received so far
    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }
}

impl AssertionSink for CollectingSink {
    fn record(&mut self, assertion: Assertion) -> ControlFlow<()> {
        tracing::debug!("{}", assertion);
        self.assertions.push(assertion);
        ControlFlow::Continue(())
    }
}

/// Stops at the first failing assertion
#[derive(Debug, Default)]
pub struct FailFastSink {
    received: usize,
    first_failure: Option<Assertion>,
}

impl FailFastSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of assertions received
    pub fn received(&self) -> usize {
        self.received
    }

    /// First failure, if any
    pub fn first_failure(&self) -> Option<&Assertion> {
        self.first_failure.as_ref()
    }
}

impl AssertionSink for FailFastSink {
    fn record(&mut self, assertion: Assertion) -> ControlFlow<()> {
        self.received += 1;
        if assertion.passed {
            return ControlFlow::Continue(());
        }
        self.first_failure = Some(assertion);
        ControlFlow::Break(())
    }
}

/// Logs every assertion and keeps counts; never cancels
#[derive(Debug, Default)]
pub struct ReportingSink {
    passed: usize,
    failed: usize,
}

impl ReportingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Passing assertions seen
    pub fn passed(&self) -> usize {
        self.passed
    }

    /// Failing assertions seen
    pub fn failed(&self) -> usize {
        self.failed
    }
}

impl AssertionSink for ReportingSink {
    fn record(&mut self, assertion: Assertion) -> ControlFlow<()> {
        if assertion.passed {
            self.passed += 1;
            tracing::debug!("{}", assertion);
        } else {
            self.failed += 1;
            tracing::warn!("{}", assertion);
        }
        ControlFlow::Continue(())
    }
}

/// Summary of one verification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    /// Checks evaluated
    pub evaluated: usize,
    /// Failed assertions
    pub failures: Vec<Assertion>,
    /// Whether the sink cancelled the stream
    pub cancelled: bool,
}

impl Verification {
    /// Whether every evaluated check passed
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Verifier for one sub-test
#[derive(Debug, Clone, Copy)]
pub struct Verifier<'a> {
    fixture: &'a str,
    sub_test: &'a str,
}

impl<'a> Verifier<'a> {
    /// Verifier labelling assertions with fixture and sub-test names
    pub fn new(fixture: &'a str, sub_test: &'a str) -> Self {
        Self { fixture, sub_test }
    }

    /// Run every applicable check, pushing assertions into `sink`
    pub fn verify(
        &self,
        expected: &Expectations,
        result: &ExecutionResult,
        state: &dyn StateStore,
        sink: &mut dyn AssertionSink,
    ) -> Verification {
        let mut verification = Verification::default();

        for check in Check::ORDER {
            let Some(outcome) = evaluate(check, expected, result, state) else {
                continue;
            };
            verification.evaluated += 1;

            let assertion = Assertion {
                fixture: self.fixture.to_string(),
                sub_test: self.sub_test.to_string(),
                check,
                passed: outcome.is_ok(),
                diff: outcome.err(),
            };
            if !assertion.passed {
                verification.failures.push(assertion.clone());
            }
            if sink.record(assertion).is_break() {
                verification.cancelled = true;
                break;
            }
        }

        verification
    }
}

/// `None` when the expectation is not declared
fn evaluate(
    check: Check,
    expected: &Expectations,
    result: &ExecutionResult,
    state: &dyn StateStore,
) -> Option<Result<(), String>> {
    match check {
        Check::HeadHash => expected.head_hash.map(|want| match result.head_hash {
            Some(got) if got == want => Ok(()),
            Some(got) => Err(format!("expected last block hash {:?}, got {:?}", want, got)),
            None => Err("no block hash reported".to_string()),
        }),
        Check::ReturnData => expected
            .return_data
            .as_ref()
            .map(|want| check_return_data(want, &result.return_data)),
        Check::Logs => {
            if expected.logs.is_empty() {
                None
            } else {
                Some(check_logs(&expected.logs, &result.logs))
            }
        }
        Check::Gas => expected.gas.as_ref().map(|rule| check_gas(rule, result)),
        Check::LogsHash => expected.logs_hash.map(|want| {
            let got = logs_hash(&result.logs);
            if got == want {
                Ok(())
            } else {
                Err(format!("expected logs hash {:?}, got {:?}", want, got))
            }
        }),
        Check::StateRoot => expected.state_root.map(|want| {
            let got = match result.state_root {
                Some(root) => root,
                None => state.state_root().map_err(|e| e.to_string())?,
            };
            if got == want {
                Ok(())
            } else {
                Err(format!("expected state root {:?}, got {:?}", want, got))
            }
        }),
        Check::Exception => expected
            .exception
            .as_ref()
            .map(|rule| check_exception(rule, result)),
        Check::PostState => expected
            .post_accounts
            .as_ref()
            .map(|accounts| check_post_state(accounts, state)),
    }
}

fn check_return_data(want: &[u8], got: &[u8]) -> Result<(), String> {
    if want == got {
        Ok(())
    } else {
        Err(format!("expected {}, got {}", to_hex(want), to_hex(got)))
    }
}

fn check_logs(want: &[LogEntry], got: &[LogEntry]) -> Result<(), String> {
    if want.len() != got.len() {
        return Err(format!("expected {} logs, got {}", want.len(), got.len()));
    }
    for (i, (w, g)) in want.iter().zip(got).enumerate() {
        if w.address != g.address {
            return Err(format!("log {}: expected address {:?}, got {:?}", i, w.address, g.address));
        }
        if w.topics != g.topics {
            return Err(format!("log {}: expected topics {:?}, got {:?}", i, w.topics, g.topics));
        }
        if w.data != g.data {
            return Err(format!(
                "log {}: expected data {}, got {}",
                i,
                to_hex(&w.data),
                to_hex(&g.data)
            ));
        }
    }
    Ok(())
}

fn check_gas(rule: &GasRule, result: &ExecutionResult) -> Result<(), String> {
    match rule {
        GasRule::Declared { expected: Some(want), .. } if !result.exception_occurred() => {
            let got = result.reported_gas();
            if got == *want {
                Ok(())
            } else {
                Err(format!("expected gas {}, got {}", want, got))
            }
        }
        GasRule::Declared { limit, .. } => {
            if result.gas_used == *limit {
                Ok(())
            } else {
                Err(format!(
                    "expected the whole gas limit {} to be used, got {}",
                    limit, result.gas_used
                ))
            }
        }
        GasRule::Remaining(want) => {
            let got = result.reported_gas();
            if got == *want {
                Ok(())
            } else {
                Err(format!("expected remaining gas {}, got {}", want, got))
            }
        }
    }
}

fn check_exception(rule: &ExceptionRule, result: &ExecutionResult) -> Result<(), String> {
    match (rule, &result.exception) {
        (ExceptionRule::Raise(_), Some(_)) | (ExceptionRule::NoRaise, None) => Ok(()),
        (ExceptionRule::Raise(name), None) => Err(format!(
            "expected exception {} but execution succeeded",
            name.as_deref().unwrap_or("(any)")
        )),
        (ExceptionRule::NoRaise, Some(exception)) => {
            Err(format!("unexpected exception: {}", exception))
        }
    }
}

fn check_post_state(
    accounts: &BTreeMap<String, AccountState>,
    state: &dyn StateStore,
) -> Result<(), String> {
    for (address_text, want) in accounts {
        let address = parse_address(address_text)?;
        let got = state
            .get_account(&address)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("{}: account missing", address_text))?;

        if got.nonce != want.nonce.0 {
            return Err(format!("{}: expected nonce {}, got {}", address_text, want.nonce, got.nonce));
        }
        if got.balance != want.balance.0 {
            return Err(format!(
                "{}: expected balance {}, got {}",
                address_text, want.balance, got.balance
            ));
        }
        let code = state.get_code(&address).map_err(|e| e.to_string())?;
        if code != want.code.0 {
            return Err(format!(
                "{}: expected code {}, got {}",
                address_text,
                to_hex(&want.code.0),
                to_hex(&code)
            ));
        }
        for (key_text, value) in &want.storage {
            let key = parse_word(key_text)?;
            let got = state.get_storage(&address, &key).map_err(|e| e.to_string())?;
            if got != u256_to_h256(value.0) {
                return Err(format!(
                    "{}: storage {}: expected {}, got {:?}",
                    address_text, key_text, value, got
                ));
            }
        }
    }
    Ok(())
}
