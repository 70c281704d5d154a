use tracing::{debug, info, warn};

use super::context::recommendation_prompt;
use super::fallback::fallback_recommendation;
use super::schema::{RawRecommendation, decode_records};
use super::{MAX_RECOMMENDATIONS, NarrativeInput, NarrativeResult};
use crate::generator::TextGenerator;
use crate::types::Recommendation;

/// Page elements of each kind that count as references
const REFERENCE_ITEMS: usize = 5;

/// References this short are too generic to prove relevance
const MIN_REFERENCE_CHARS: usize = 4;

/// Produce recommendations for a run. Never returns an empty list.
///
/// When the run had no failures, a candidate must mention the target URL or
/// one of the page's headings, buttons, or the script's test names to be
/// kept. Abstractly worded advice is dropped even if it is sound.
pub fn generate_recommendations(
    generator: &dyn TextGenerator,
    input: &NarrativeInput<'_>,
) -> Vec<Recommendation> {
    let candidates = match request_recommendations(generator, input) {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(error = %e, "recommendation generation failed, using template");
            return vec![fallback_recommendation(input)];
        }
    };

    let accepted: Vec<Recommendation> = candidates
        .into_iter()
        .filter(|rec| {
            let relevant = is_relevant(rec, input);
            if relevant {
                debug!(title = %rec.title, "accepted recommendation");
            } else {
                debug!(title = %rec.title, "rejected generic recommendation");
            }
            relevant
        })
        .collect();

    if accepted.is_empty() {
        warn!("no generated recommendation referenced the run, using template");
        return vec![fallback_recommendation(input)];
    }

    info!(count = accepted.len(), "generated recommendations");
    accepted
}

fn request_recommendations(
    generator: &dyn TextGenerator,
    input: &NarrativeInput<'_>,
) -> NarrativeResult<Vec<Recommendation>> {
    let response = generator.generate(&recommendation_prompt(input))?;
    let records: Vec<RawRecommendation> = decode_records(&response)?;

    Ok(records
        .into_iter()
        .take(MAX_RECOMMENDATIONS)
        .map(RawRecommendation::repair)
        .collect())
}

/// Whether a recommendation plausibly speaks about this run
fn is_relevant(rec: &Recommendation, input: &NarrativeInput<'_>) -> bool {
    if !input.failures.is_empty() {
        return true;
    }

    let title = rec.title.to_lowercase();
    let description = rec.description.to_lowercase();
    let mentions = |needle: &str| {
        let needle = needle.to_lowercase();
        title.contains(&needle) || description.contains(&needle)
    };

    if !input.url.trim().is_empty() && mentions(input.url) {
        return true;
    }

    let Some(page) = input.page else {
        return false;
    };

    page.headings
        .iter()
        .take(REFERENCE_ITEMS)
        .chain(page.buttons.iter().take(REFERENCE_ITEMS))
        .chain(input.profile.test_names.iter().take(REFERENCE_ITEMS))
        .filter(|element| element.chars().count() >= MIN_REFERENCE_CHARS)
        .any(|element| mentions(element.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{GenerateResult, Unavailable};
    use crate::script::ScriptProfile;
    use crate::types::{Category, Failure, Impact, PageSnapshot};
    use pretty_assertions::assert_eq;

    const URL: &str = "https://acme.test";

    fn page() -> PageSnapshot {
        PageSnapshot {
            title: "Acme".into(),
            headings: vec!["Pricing plans".into()],
            buttons: vec!["Sign Up".into(), "Go".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_prose_response_falls_back() {
        let generator =
            |_: &str| -> GenerateResult<String> { Ok("Sorry, I can't help with that".to_string()) };
        let profile = ScriptProfile::default();
        let recs = generate_recommendations(&generator, &NarrativeInput::new(URL, &profile, &[]));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].title, format!("Continue improving {URL}"));
    }

    #[test]
    fn test_unavailable_generator_yields_one() {
        let profile = ScriptProfile::default();
        let failures = vec![Failure::new("checkout", "boom")];
        let recs = generate_recommendations(
            &Unavailable::new("no key"),
            &NarrativeInput::new(URL, &profile, &failures),
        );
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].impact, Impact::High);
    }

    #[test]
    fn test_generic_candidates_are_dropped() {
        let generator = |_: &str| -> GenerateResult<String> {
            Ok(r#"[
                {"title": "Improve the Sign Up flow", "description": "Make it shorter", "impact": "high", "category": "ux"},
                {"title": "Add alt text", "description": "Images need descriptions", "category": "accessibility"},
                {"title": "Go faster", "description": "Speed matters"}
            ]"#
            .to_string())
        };
        let profile = ScriptProfile::default();
        let page = page();
        let recs = generate_recommendations(
            &generator,
            &NarrativeInput::new(URL, &profile, &[]).page(Some(&page)),
        );
        let titles: Vec<&str> = recs.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Improve the Sign Up flow"]);
        assert_eq!(recs[0].category, Category::Ux);
    }

    #[test]
    fn test_url_and_test_names_count_as_references() {
        let generator = |_: &str| -> GenerateResult<String> {
            Ok(r#"[
                {"title": "Monitor uptime", "description": "Watch https://ACME.test around the clock"},
                {"title": "Extend checkout coverage", "description": "Cover more checkout paths"}
            ]"#
            .to_string())
        };
        let profile = ScriptProfile {
            test_names: vec!["checkout coverage".into()],
            ..Default::default()
        };
        let page = page();
        let recs = generate_recommendations(
            &generator,
            &NarrativeInput::new(URL, &profile, &[]).page(Some(&page)),
        );
        assert_eq!(recs.len(), 2);
    }

    #[test]
    fn test_all_rejected_substitutes_fallback() {
        let generator = |_: &str| -> GenerateResult<String> {
            Ok(r#"[{"title": "Be better", "description": "In general"}]"#.to_string())
        };
        let profile = ScriptProfile {
            element_texts: vec!["Go".into()],
            ..Default::default()
        };
        let page = page();
        let recs = generate_recommendations(
            &generator,
            &NarrativeInput::new(URL, &profile, &[]).page(Some(&page)),
        );
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].title, "Test additional buttons on Acme");
        assert!(recs[0].description.contains("'Sign Up'"));
    }

    #[test]
    fn test_failures_accept_everything_up_to_cap() {
        let generator = |_: &str| -> GenerateResult<String> {
            let items: Vec<String> = (0..8).map(|i| format!(r#"{{"title": "tip {i}"}}"#)).collect();
            Ok(format!("[{}]", items.join(",")))
        };
        let profile = ScriptProfile::default();
        let failures = vec![Failure::new("login", "boom")];
        let recs =
            generate_recommendations(&generator, &NarrativeInput::new(URL, &profile, &failures));
        assert_eq!(recs.len(), MAX_RECOMMENDATIONS);
    }

    #[test]
    fn test_array_of_strings_falls_back() {
        let generator = |_: &str| -> GenerateResult<String> {
            Ok(r#"["The signup button is broken", "Fix it soon", "Users cannot register"]"#.to_string())
        };
        let profile = ScriptProfile::default();
        let failures = vec![Failure::new("signup", "boom")];
        let recs =
            generate_recommendations(&generator, &NarrativeInput::new(URL, &profile, &failures));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].title, "Fix an issue with 'signup' on your website");
        assert!(recs[0].id.starts_with("rec_"));
    }
}
