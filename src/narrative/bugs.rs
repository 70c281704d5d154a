use tracing::{debug, info, warn};

use super::context::bug_prompt;
use super::fallback::fallback_bugs;
use super::schema::{RawBug, decode_records};
use super::{MAX_BUGS, NarrativeError, NarrativeInput, NarrativeResult};
use crate::generator::TextGenerator;
use crate::types::Bug;

/// Turn failures into plain-language bug reports.
///
/// No failures means no bugs and no generative call. Otherwise the model's
/// answer is paired with failures in order, so there are never more bugs
/// than failures. Any unusable answer falls back to templates.
pub fn generate_bugs(generator: &dyn TextGenerator, input: &NarrativeInput<'_>) -> Vec<Bug> {
    if input.failures.is_empty() {
        return Vec::new();
    }

    match request_bugs(generator, input) {
        Ok(bugs) => {
            info!(count = bugs.len(), "generated bug reports");
            bugs
        }
        Err(e) => {
            warn!(error = %e, "bug generation failed, using templates");
            fallback_bugs(input)
        }
    }
}

fn request_bugs(generator: &dyn TextGenerator, input: &NarrativeInput<'_>) -> NarrativeResult<Vec<Bug>> {
    let response = generator.generate(&bug_prompt(input))?;
    let records: Vec<RawBug> = decode_records(&response)?;

    let bugs: Vec<Bug> = records
        .into_iter()
        .zip(input.failures)
        .take(MAX_BUGS)
        .map(|(raw, failure)| raw.repair(failure, input.url))
        .inspect(|bug| debug!(title = %bug.title, severity = %bug.severity, "accepted bug"))
        .collect();

    if bugs.is_empty() {
        return Err(NarrativeError::Decode("response contained no bugs".to_string()));
    }
    Ok(bugs)
}
