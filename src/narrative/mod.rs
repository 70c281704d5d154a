//! Plain-language bug reports and recommendations.
//!
//! Both tasks follow the same shape: build a bounded context, ask the
//! [`TextGenerator`] for a JSON array, decode it leniently, and repair every
//! field. Any failure along the way is a [`NarrativeError`] that is logged and
//! answered by the deterministic templates in [`fallback`]. Nothing in this
//! module returns an error to the pipeline.

pub mod bugs;
pub mod context;
pub mod fallback;
pub mod recommendations;
pub mod schema;

use uuid::Uuid;

use crate::generator::{GenerateError, TextGenerator};
use crate::report::RunStats;
use crate::script::ScriptProfile;
use crate::types::{Bug, Failure, PageSnapshot, Recommendation};

pub use bugs::generate_bugs;
pub use recommendations::generate_recommendations;

/// Upper bound on bugs per run
pub const MAX_BUGS: usize = 5;

/// Upper bound on recommendations per run
pub const MAX_RECOMMENDATIONS: usize = 5;

/// Result type for narrative requests
pub type NarrativeResult<T> = Result<T, NarrativeError>;

/// Why a generated narrative could not be used
#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    /// The generative call itself failed
    #[error("Generative call failed: {0}")]
    Call(#[from] GenerateError),
    /// The response did not match the expected JSON schema
    #[error("Unusable response: {0}")]
    Decode(String),
}

/// Everything the narrative tasks know about one run
#[derive(Debug, Clone, Copy)]
pub struct NarrativeInput<'a> {
    /// Target URL as given by the caller
    pub url: &'a str,
    pub page: Option<&'a PageSnapshot>,
    pub profile: &'a ScriptProfile,
    pub failures: &'a [Failure],
    /// Counts from the structured report, when one was parsed
    pub stats: Option<RunStats>,
}

impl<'a> NarrativeInput<'a> {
    pub fn new(url: &'a str, profile: &'a ScriptProfile, failures: &'a [Failure]) -> Self {
        Self {
            url,
            page: None,
            profile,
            failures,
            stats: None,
        }
    }

    pub fn page(mut self, page: Option<&'a PageSnapshot>) -> Self {
        self.page = page;
        self
    }

    pub fn stats(mut self, stats: Option<RunStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Page title, or `default` when there is none
    pub(crate) fn page_title_or(&self, default: &'a str) -> &'a str {
        self.page
            .map(|page| page.title.as_str())
            .filter(|title| !title.trim().is_empty())
            .unwrap_or(default)
    }
}

/// Bug and recommendation generation bound to one generator
pub struct NarrativeGenerator<'a> {
    generator: &'a dyn TextGenerator,
}

impl<'a> NarrativeGenerator<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self { generator }
    }

    /// At most one bug per failure, capped at [`MAX_BUGS`]
    pub fn bugs(&self, input: &NarrativeInput<'_>) -> Vec<Bug> {
        generate_bugs(self.generator, input)
    }

    /// Between one and [`MAX_RECOMMENDATIONS`] recommendations
    pub fn recommendations(&self, input: &NarrativeInput<'_>) -> Vec<Recommendation> {
        generate_recommendations(self.generator, input)
    }
}

/// Fresh identifier such as `bug_1a2b3c4d5e6f`
pub(crate) fn new_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &hex[..12])
}

/// First `max` characters of `text`
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
