use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// Criteria dimension selected by `$filter: "ENVIRONMENT"` nodes.
pub const ENVIRONMENT: &str = "ENVIRONMENT";
/// Process variable read for the `ENVIRONMENT` criteria value.
pub const ENVIRONMENT_VAR: &str = "THERMO_ENV";
/// Used whenever the operating mode is not declared.
pub const DEFAULT_ENVIRONMENT: &str = "production";

/// Snapshot of criteria name to value, fixed for the life of the process.
pub type Criteria = BTreeMap<String, String>;

pub type CriteriaSource = Box<dyn Fn() -> Criteria + Send + Sync + 'static>;

static PROCESS_CRITERIA: OnceLock<CriteriaResolver> = OnceLock::new();

/// Supplies the criteria snapshot. The source runs at most once; every later
/// call observes the first computed value.
pub struct CriteriaResolver {
    source: CriteriaSource,
    snapshot: OnceLock<Arc<Criteria>>,
}

impl CriteriaResolver {
    pub fn from_env() -> Self {
        Self::with_source(|| environment_criteria(std::env::var(ENVIRONMENT_VAR).ok()))
    }

    /// Pins `ENVIRONMENT` to `name`, ignoring the process environment.
    pub fn with_environment(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::with_source(move || environment_criteria(Some(name.clone())))
    }

    pub fn with_source<F>(source: F) -> Self
    where
        F: Fn() -> Criteria + Send + Sync + 'static,
    {
        Self {
            source: Box::new(source),
            snapshot: OnceLock::new(),
        }
    }

    pub fn snapshot(&self) -> Arc<Criteria> {
        self.snapshot
            .get_or_init(|| Arc::new((self.source)()))
            .clone()
    }

    pub fn is_computed(&self) -> bool {
        self.snapshot.get().is_some()
    }
}

impl std::fmt::Debug for CriteriaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CriteriaResolver")
            .field("snapshot", &self.snapshot.get())
            .finish_non_exhaustive()
    }
}

/// Process-wide resolver backed by `THERMO_ENV`.
pub fn process_criteria() -> &'static CriteriaResolver {
    PROCESS_CRITERIA.get_or_init(CriteriaResolver::from_env)
}

fn environment_criteria(declared: Option<String>) -> Criteria {
    let environment = declared
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

    let mut criteria = Criteria::new();
    criteria.insert(ENVIRONMENT.to_string(), environment);
    criteria
}
