//! Category dispatch
//!
//! The category set is closed: each [`Category`] maps to exactly one runner
//! through a `match`, and an unknown category name is a dispatch error.

use crate::block_test::BlockTestRunner;
use crate::config::RunConfig;
use crate::discovery::find_fixture_files;
use crate::error::{ConformanceError, ConformanceResult};
use crate::fixture::{file_stem, FixtureFile};
use crate::outcome::{FileResults, Outcome, OutcomeKind};
use crate::pipeline::Collaborators;
use crate::state_test::StateTestRunner;
use crate::verifier::AssertionSink;
use crate::vm_test::VmTestRunner;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Fixture category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// State transition fixtures
    State,
    /// Block-level fixtures
    Block,
    /// Single-opcode fixtures
    Opcode,
    /// One operator-supplied fixture file
    CustomFile,
}

impl Category {
    /// Categories of a full run, in run order
    pub fn session_order(opcode_enabled: bool) -> Vec<Category> {
        let mut order = vec![Category::State, Category::Block];
        if opcode_enabled {
            order.push(Category::Opcode);
        }
        order
    }

    /// Corpus directory holding the category's fixtures
    pub fn directory(self) -> Option<&'static str> {
        match self {
            Category::State => Some("GeneralStateTests"),
            Category::Block => Some("BlockchainTests"),
            Category::Opcode => Some("VMTests"),
            Category::CustomFile => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::State => "state",
            Category::Block => "block",
            Category::Opcode => "opcode",
            Category::CustomFile => "custom-file",
        };
        f.write_str(name)
    }
}

impl FromStr for Category {
    type Err = ConformanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "state" | "GeneralStateTests" | "StateTests" => Ok(Category::State),
            "block" | "blockchain" | "BlockchainTests" => Ok(Category::Block),
            "opcode" | "vm" | "VMTests" => Ok(Category::Opcode),
            "custom-file" | "customStateTest" => Ok(Category::CustomFile),
            other => Err(ConformanceError::Dispatch(format!("unknown test category: {}", other))),
        }
    }
}

/// What to do with one entry of a fixture file
#[derive(Debug)]
pub enum Selection<'f> {
    /// Run the named fixture
    Run(&'f str, &'f Value),
    /// Report it as skipped
    Skip(Outcome),
}

/// Apply the `test` name and the skip/include filter to a file's entries
///
/// Entries not matching `test` are dropped silently; filtered ones become
/// skipped outcomes.
pub fn select_entries<'f>(file: &'f FixtureFile, config: &RunConfig, opcode: bool) -> Vec<Selection<'f>> {
    let stem = file.stem();
    let wanted = config.discovery().test.as_deref();

    file.entries
        .iter()
        .filter(|(name, _)| wanted.map_or(true, |w| name.as_str() == w))
        .map(|(name, value)| match config.filter().skip_reason(&stem, name, opcode) {
            Some(reason) => Selection::Skip(Outcome::skipped(name.as_str(), name.as_str(), reason)),
            None => Selection::Run(name.as_str(), value),
        })
        .collect()
}

/// Routes fixture files to their category runner
pub struct Dispatcher<'a> {
    config: &'a RunConfig,
}

impl<'a> Dispatcher<'a> {
    /// Create a dispatcher over a session configuration
    pub fn new(config: &'a RunConfig) -> Self {
        Self { config }
    }

    /// Run one loaded file with the category's runner
    pub fn dispatch_file(
        &self,
        category: Category,
        file: &FixtureFile,
        collaborators: &mut Collaborators,
        sink: &mut dyn AssertionSink,
    ) -> FileResults {
        match category {
            Category::State => StateTestRunner::new(self.config).run_file(file, collaborators, sink),
            Category::Block => BlockTestRunner::new(self.config).run_file(file, collaborators, sink),
            Category::Opcode => VmTestRunner::new(self.config).run_file(file, collaborators, sink),
            Category::CustomFile => self.run_custom_file(file, collaborators, sink),
        }
    }

    /// Discover and run every file of a category
    ///
    /// A file that cannot be read or parsed yields one setup-failed outcome
    /// named after its stem; the remaining files still run.
    pub fn run_category(
        &self,
        category: Category,
        collaborators: &mut Collaborators,
        sink: &mut dyn AssertionSink,
    ) -> ConformanceResult<Vec<FileResults>> {
        if category == Category::CustomFile {
            let path = self.config.custom_fixture_path().ok_or_else(|| {
                ConformanceError::Dispatch("custom-file category needs a fixture path".to_string())
            })?;
            let file = FixtureFile::load(path)?;
            return Ok(vec![self.run_custom_file(&file, collaborators, sink)]);
        }

        let directory = category
            .directory()
            .ok_or_else(|| ConformanceError::Dispatch(format!("no corpus directory for {}", category)))?;
        let root = self.config.discovery().tests_path.join(directory);
        tracing::info!("Running {} tests from: {:?}", category, root);

        let files = find_fixture_files(&root, self.config.discovery());
        let mut results = Vec::with_capacity(files.len());
        for path in files {
            let file_results = match FixtureFile::load(&path) {
                Ok(file) => self.dispatch_file(category, &file, collaborators, sink),
                Err(e) => unreadable(&path, e),
            };
            if file_results.failed() > 0 {
                tracing::info!(
                    "File: {:?} - {} passed, {} failed, {} skipped",
                    path,
                    file_results.passed(),
                    file_results.failed(),
                    file_results.skipped()
                );
            }
            results.push(file_results);
        }
        Ok(results)
    }

    /// Run one sub-test of a custom file through the state path
    ///
    /// The sub-test is the one named by `test`, or the first. The skip filter
    /// does not apply.
    fn run_custom_file(
        &self,
        file: &FixtureFile,
        collaborators: &mut Collaborators,
        sink: &mut dyn AssertionSink,
    ) -> FileResults {
        let mut results = FileResults::new(file.path.to_string_lossy().to_string());
        let wanted = self.config.discovery().test.as_deref();
        let entry = match wanted {
            Some(name) => file.entries.iter().find(|(n, _)| n.as_str() == name),
            None => file.entries.first(),
        };

        match entry {
            Some((name, value)) => {
                let outcomes = StateTestRunner::new(self.config).run_fixture(name, value.clone(), collaborators, sink);
                results.outcomes.extend(outcomes);
            }
            None => {
                let stem = file.stem();
                let reason = match wanted {
                    Some(name) => format!("no sub-test named {}", name),
                    None => "file has no sub-tests".to_string(),
                };
                results.outcomes.push(Outcome::new(&stem, &stem, OutcomeKind::SetupFailed(reason)));
            }
        }
        results
    }
}

fn unreadable(path: &Path, error: ConformanceError) -> FileResults {
    tracing::warn!("Cannot load {:?}: {}", path, error);
    let stem = file_stem(path);
    let mut results = FileResults::new(path.to_string_lossy().to_string());
    results
        .outcomes
        .push(Outcome::new(&stem, &stem, OutcomeKind::SetupFailed(error.to_string())));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Discovery;
    use crate::filter::FixtureFilter;
    use crate::fixture::parse_entries;
    use std::path::PathBuf;

    #[test]
    fn test_category_parse() {
        assert_eq!("state".parse::<Category>().unwrap(), Category::State);
        assert_eq!("BlockchainTests".parse::<Category>().unwrap(), Category::Block);
        assert_eq!("VMTests".parse::<Category>().unwrap(), Category::Opcode);
        assert_eq!("custom-file".parse::<Category>().unwrap(), Category::CustomFile);
        assert!(matches!("bogus".parse::<Category>(), Err(ConformanceError::Dispatch(_))));
    }

    #[test]
    fn test_session_order() {
        assert_eq!(Category::session_order(false), vec![Category::State, Category::Block]);
        assert_eq!(
            Category::session_order(true),
            vec![Category::State, Category::Block, Category::Opcode]
        );
    }

    fn file() -> FixtureFile {
        FixtureFile {
            path: PathBuf::from("stExample/example.json"),
            entries: parse_entries(r#"{"ForkUncle": {}, "add11": {}, "mul": {}}"#).unwrap(),
        }
    }

    #[test]
    fn test_select_entries_applies_filter() {
        let config = RunConfig::default();
        let file = file();
        let selections = select_entries(&file, &config, false);
        assert!(matches!(selections[0], Selection::Skip(_)));
        assert!(matches!(selections[1], Selection::Run("add11", _)));
        assert!(matches!(selections[2], Selection::Run("mul", _)));
    }

    #[test]
    fn test_select_entries_by_test_name() {
        let config = RunConfig::builder()
            .filter(FixtureFilter::allow_all())
            .discovery(Discovery {
                test: Some("mul".into()),
                ..Default::default()
            })
            .build();
        let file = file();
        let selections = select_entries(&file, &config, false);
        assert_eq!(selections.len(), 1);
        assert!(matches!(selections[0], Selection::Run("mul", _)));
    }

    #[test]
    fn test_custom_file_category_needs_path() {
        struct NoVm;
        impl crate::collaborator::Vm for NoVm {
            fn run_code(
                &mut self,
                _request: &crate::collaborator::CodeRequest,
                _state: &mut dyn crate::collaborator::StateStore,
                _chain: &dyn crate::fake_chain::BlockHashProvider,
            ) -> crate::error::CollaboratorResult<crate::collaborator::ExecutionResult> {
                Ok(Default::default())
            }
        }
        let config = RunConfig::default();
        let mut collaborators = Collaborators::in_memory(Box::new(NoVm));
        let mut sink = crate::verifier::CollectingSink::new();
        let err = Dispatcher::new(&config)
            .run_category(Category::CustomFile, &mut collaborators, &mut sink)
            .unwrap_err();
        assert!(matches!(err, ConformanceError::Dispatch(_)));
    }
}
