//! Randomized single-fixture mode
//!
//! Used as a boolean oracle by fuzzers: one fixture document in, exactly one
//! character out. `'0'` means every evaluated assertion passed, `'1'` means
//! the document did not parse, could not be prepared or executed, or an
//! assertion failed. The first failure stops everything.

use crate::config::RunConfig;
use crate::fixture::{parse_entries, ExecCase, StateFixture};
use crate::outcome::OutcomeKind;
use crate::pipeline::{run_case, Collaborators};
use crate::verifier::FailFastSink;
use std::fmt;
use std::io::{self, Write};

/// Single-character result of a randomized run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// Every assertion passed
    Pass,
    /// Anything went wrong
    Fail,
}

impl Sentinel {
    /// Character written to the output
    pub fn as_char(self) -> char {
        match self {
            Sentinel::Pass => '0',
            Sentinel::Fail => '1',
        }
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Cases of the first top-level fixture, or `None` if there are none
fn first_cases(text: &str, config: &RunConfig) -> Option<(String, Vec<ExecCase>)> {
    let entries = match parse_entries(text) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("randomized fixture does not parse: {}", e);
            return None;
        }
    };
    let (name, value) = entries.into_iter().next()?;

    let cases = match StateFixture::from_value(value) {
        Ok(StateFixture::Exec(fixture)) => vec![fixture.state_case(&name)],
        Ok(StateFixture::Transaction(fixture)) => {
            let mut cases = Vec::new();
            for case in fixture.cases(&name, config.fork()) {
                match case {
                    Ok(case) => cases.push(case),
                    Err(e) => {
                        tracing::debug!("{}: {}", name, e);
                        return None;
                    }
                }
            }
            cases
        }
        Err(e) => {
            tracing::debug!("{}: malformed fixture: {}", name, e);
            return None;
        }
    };

    if cases.is_empty() {
        return None;
    }
    Some((name, cases))
}

/// Run one ad hoc fixture and write its sentinel to `out`
///
/// Only I/O errors on `out` are returned; everything else is folded into the
/// sentinel. Callers terminate right after.
pub fn run_randomized(
    text: &str,
    config: &RunConfig,
    collaborators: &mut Collaborators,
    out: &mut dyn Write,
) -> io::Result<Sentinel> {
    let sentinel = evaluate(text, config, collaborators);
    write!(out, "{}", sentinel)?;
    out.flush()?;
    Ok(sentinel)
}

fn evaluate(text: &str, config: &RunConfig, collaborators: &mut Collaborators) -> Sentinel {
    let Some((name, cases)) = first_cases(text, config) else {
        return Sentinel::Fail;
    };

    let mut sink = FailFastSink::new();
    for case in cases {
        let outcome = run_case(&name, case, config, collaborators, &mut sink);
        match outcome.kind {
            OutcomeKind::Passed => {}
            _ => {
                tracing::debug!("{}: {}", outcome.label(), outcome.message());
                return Sentinel::Fail;
            }
        }
    }
    Sentinel::Pass
}
