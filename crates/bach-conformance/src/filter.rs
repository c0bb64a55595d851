//! Skip and include-only filtering of the fixture corpus
//!
//! Three standing sets name fixtures that are excluded by policy. A run picks
//! which of them to skip (`skip=`) and may instead restrict itself to exactly
//! the named sets (`runSkipped=`), which is how the normally skipped fixtures
//! get triaged.

use std::collections::BTreeSet;
use std::fmt;

/// Fixtures that should pass but currently do not
pub const BROKEN: &[&str] = &[
    "CreateHashCollision",
    "RecursiveCreateContracts",
    "createJS_ExampleContract",
    "CreateCollisionToEmpty",
    "TransactionCollisionToEmptyButCode",
    "TransactionCollisionToEmptyButNonce",
    "RevertDepthCreateAddressCollision",
    "randomStatetest642",
];

/// Fixtures whose expectations conflict with how the harness runs them
pub const PERMANENT: &[&str] = &[
    "SuicidesMixingCoinbase",
    "static_SuicidesMixingCoinbase",
    "ForkUncle",
    "UncleFromSideChain",
];

/// Fixtures too slow for every run
pub const SLOW: &[&str] = &[
    "Call50000",
    "Call50000_ecrec",
    "Call50000_identity",
    "Call50000_identity2",
    "Call50000_sha256",
    "Call50000_rip160",
    "Call50000bytesContract50_1",
    "Call50000bytesContract50_2",
    "Call1MB1024Calldepth",
    "Callcode50000",
    "Return50000",
    "Return50000_2",
    "static_Call50000",
    "static_Call50000_ecrec",
    "static_Call50000_identity",
    "static_Call50000_identity2",
    "static_Call50000_sha256",
    "static_Call50000_rip160",
    "static_Call50000bytesContract50_1",
    "static_Call50000bytesContract50_2",
    "static_Call1MB1024Calldepth",
    "static_Callcode50000",
    "static_Return50000",
    "static_Return50000_2",
];

/// Opcode fixtures never run: loop benchmarks, and cases that only pass when
/// CALL/CREATE are not actually executed
pub const OPCODE_SKIP: &[&str] = &[
    "loop-mul",
    "loop-add-10M",
    "loop-divadd-10M",
    "loop-divadd-unr100-10M",
    "loop-exp-16b-100k",
    "loop-exp-1b-1M",
    "loop-exp-2b-100k",
    "loop-exp-32b-100k",
    "loop-exp-4b-100k",
    "loop-exp-8b-100k",
    "loop-exp-nop-1M",
    "loop-mulmod-2M",
    "ABAcalls0",
    "ABAcallsSuicide0",
    "ABAcallsSuicide1",
    "sha3_bigSize",
    "CallRecursiveBomb0",
    "CallToNameRegistrator0",
    "CallToPrecompiledContract",
    "CallToReturn1",
    "PostToNameRegistrator0",
    "PostToReturn1",
    "callcodeToNameRegistrator0",
    "callcodeToReturn1",
    "callstatelessToNameRegistrator0",
    "callstatelessToReturn1",
    "createNameRegistrator",
    "randomTest643",
];

/// Standing exclusion set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SkipCategory {
    /// Known broken
    Broken,
    /// Excluded permanently
    Permanent,
    /// Slow
    Slow,
}

impl SkipCategory {
    /// All standing sets
    pub const ALL: [SkipCategory; 3] = [SkipCategory::Broken, SkipCategory::Permanent, SkipCategory::Slow];

    /// Names in this set
    pub fn names(self) -> &'static [&'static str] {
        match self {
            SkipCategory::Broken => BROKEN,
            SkipCategory::Permanent => PERMANENT,
            SkipCategory::Slow => SLOW,
        }
    }

    /// Configuration token
    pub fn token(self) -> &'static str {
        match self {
            SkipCategory::Broken => "broken",
            SkipCategory::Permanent => "permanent",
            SkipCategory::Slow => "slow",
        }
    }
}

/// Immutable set of fixture names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipSet {
    names: BTreeSet<String>,
}

impl SkipSet {
    /// Empty set
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set of explicit names
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// One standing set
    pub fn standing(category: SkipCategory) -> Self {
        Self::from_names(category.names().iter().copied())
    }

    /// Union of the standing sets selected by a configuration string
    ///
    /// Tokens are comma-separated and case-insensitive: `broken`, `permanent`,
    /// `slow`, `all` or `none`. A missing string means `default`.
    pub fn parse(choices: Option<&str>, default: &str) -> Self {
        let choices = choices.unwrap_or(default).to_lowercase();
        let tokens: Vec<&str> = choices
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.contains(&"none") {
            return Self::empty();
        }
        let all = tokens.contains(&"all");

        for token in &tokens {
            let known = *token == "all" || SkipCategory::ALL.iter().any(|c| c.token() == *token);
            if !known {
                tracing::warn!("Ignoring unknown skip token: {}", token);
            }
        }

        SkipCategory::ALL
            .iter()
            .filter(|c| all || tokens.contains(&c.token()))
            .fold(Self::empty(), |acc, c| acc.union(&Self::standing(*c)))
    }

    /// Union of two sets
    pub fn union(&self, other: &SkipSet) -> SkipSet {
        Self {
            names: self.names.union(&other.names).cloned().collect(),
        }
    }

    /// Whether every name of `other` is in this set
    pub fn is_superset(&self, other: &SkipSet) -> bool {
        self.names.is_superset(&other.names)
    }

    /// Membership test
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Why a fixture was filtered out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not named by the include-only sets
    NotIncluded,
    /// Named by a skipped standing set
    Skipped,
    /// Named by the opcode skip list
    OpcodeSkipped,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotIncluded => write!(f, "not in run-skipped set"),
            SkipReason::Skipped => write!(f, "in skip set"),
            SkipReason::OpcodeSkipped => write!(f, "in opcode skip set"),
        }
    }
}

/// Effective filter of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureFilter {
    skip: SkipSet,
    include_only: SkipSet,
    opcode_skip: SkipSet,
}

impl Default for FixtureFilter {
    fn default() -> Self {
        Self::from_config(None, None)
    }
}

impl FixtureFilter {
    /// Build from the `skip` and `runSkipped` configuration strings
    ///
    /// `skip` defaults to `all`, or to `none` when `runSkipped` is given;
    /// `runSkipped` defaults to `none`.
    pub fn from_config(skip: Option<&str>, run_skipped: Option<&str>) -> Self {
        let skip_default = if run_skipped.is_some() { "none" } else { "all" };
        Self {
            skip: SkipSet::parse(skip, skip_default),
            include_only: SkipSet::parse(run_skipped, "none"),
            opcode_skip: SkipSet::from_names(OPCODE_SKIP.iter().copied()),
        }
    }

    /// Filter that admits everything
    pub fn allow_all() -> Self {
        Self {
            skip: SkipSet::empty(),
            include_only: SkipSet::empty(),
            opcode_skip: SkipSet::empty(),
        }
    }

    /// Names to exclude
    pub fn skip(&self) -> &SkipSet {
        &self.skip
    }

    /// Names that are the only ones eligible, when non-empty
    pub fn include_only(&self) -> &SkipSet {
        &self.include_only
    }

    /// Why a fixture must not run, or `None` if it may
    ///
    /// A fixture is named by a set if its own name or its file's stem is in it.
    pub fn skip_reason(&self, file_stem: &str, fixture: &str, opcode: bool) -> Option<SkipReason> {
        let named = |set: &SkipSet| set.contains(fixture) || set.contains(file_stem);

        if !self.include_only.is_empty() {
            return if named(&self.include_only) {
                None
            } else {
                Some(SkipReason::NotIncluded)
            };
        }
        if named(&self.skip) {
            return Some(SkipReason::Skipped);
        }
        if opcode && named(&self.opcode_skip) {
            return Some(SkipReason::OpcodeSkipped);
        }
        None
    }

    /// Whether a fixture may run
    pub fn admits(&self, file_stem: &str, fixture: &str, opcode: bool) -> bool {
        self.skip_reason(file_stem, fixture, opcode).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_superset_of_broken() {
        let all = SkipSet::parse(Some("all"), "none");
        let broken = SkipSet::parse(Some("broken"), "none");
        assert!(all.is_superset(&broken));
        assert!(all.contains("ForkUncle"));
        assert!(all.contains("Call50000"));
    }

    #[test]
    fn test_none_is_empty() {
        assert!(SkipSet::parse(Some("none"), "all").is_empty());
        assert!(SkipSet::parse(Some("broken,none"), "all").is_empty());
    }

    #[test]
    fn test_tokens_are_case_insensitive() {
        let set = SkipSet::parse(Some("Broken, SLOW"), "none");
        assert!(set.contains("CreateHashCollision"));
        assert!(set.contains("Return50000"));
        assert!(!set.contains("ForkUncle"));
    }

    #[test]
    fn test_missing_uses_default() {
        assert_eq!(SkipSet::parse(None, "all"), SkipSet::parse(Some("all"), "none"));
        assert!(SkipSet::parse(None, "NONE").is_empty());
    }

    #[test]
    fn test_unknown_token_ignored() {
        let set = SkipSet::parse(Some("bogus,permanent"), "none");
        assert_eq!(set, SkipSet::standing(SkipCategory::Permanent));
    }

    #[test]
    fn test_default_filter_skips_all_standing_sets() {
        let filter = FixtureFilter::default();
        assert!(!filter.admits("stSystemOperationsTest", "CreateHashCollision", false));
        assert!(!filter.admits("stCallCreateCallCodeTest", "Call1MB1024Calldepth", false));
        assert!(filter.admits("stExample", "add11", false));
    }

    #[test]
    fn test_run_skipped_runs_exactly_named_sets() {
        let filter = FixtureFilter::from_config(None, Some("slow"));
        assert!(filter.skip().is_empty());
        assert!(filter.admits("x", "Call50000", false));
        assert!(!filter.admits("x", "add11", false));
        assert_eq!(filter.skip_reason("x", "ForkUncle", false), Some(SkipReason::NotIncluded));
    }

    #[test]
    fn test_include_only_overrides_skip() {
        let filter = FixtureFilter::from_config(Some("all"), Some("broken"));
        assert!(filter.admits("x", "CreateHashCollision", false));
    }

    #[test]
    fn test_file_stem_matches() {
        let filter = FixtureFilter::from_config(Some("slow"), None);
        assert_eq!(filter.skip_reason("Call50000", "Call50000_d0g0v0", false), Some(SkipReason::Skipped));
    }

    #[test]
    fn test_opcode_skip_only_for_opcode() {
        let filter = FixtureFilter::from_config(Some("none"), None);
        assert!(filter.admits("vmPerformance", "loop-mul", false));
        assert_eq!(
            filter.skip_reason("vmPerformance", "loop-mul", true),
            Some(SkipReason::OpcodeSkipped)
        );
    }

    #[test]
    fn test_allow_all() {
        let filter = FixtureFilter::allow_all();
        assert!(filter.admits("x", "CreateHashCollision", true));
        assert!(filter.admits("x", "loop-mul", true));
    }
}
