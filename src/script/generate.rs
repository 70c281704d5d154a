//! Test script authoring through the generative model.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::generator::{GenerateError, GenerateResult, TextGenerator};
use crate::script::normalize_script;
use crate::types::PageSnapshot;

const AUTHORING_INSTRUCTIONS: &str = "You are a QA automation engineer.
Generate a Playwright test suite using @playwright/test for the given URL.
Include meaningful assertions, not just navigation.
Use clear, readable names for each test.
Return only raw JavaScript code (no markdown).";

const DEFAULT_REQUIREMENTS: &str =
    "Generate UI interaction tests with validation for the elements found above.";

/// Number of headings, buttons, and links included in the prompt
const CONTEXT_ITEMS: usize = 5;

/// A freshly authored test script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedScript {
    pub url: String,
    /// Normalized, executable script text
    pub script: String,
    pub model: String,
    /// RFC 3339 timestamp
    pub generated_at: String,
    pub logs: Vec<String>,
}

/// Build the authoring prompt for a page
pub fn build_authoring_prompt(
    url: &str,
    page: &PageSnapshot,
    requirements: Option<&str>,
) -> String {
    let first = |items: &[String]| {
        items
            .iter()
            .take(CONTEXT_ITEMS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "{AUTHORING_INSTRUCTIONS}\n\n\
         URL: {url}\n\
         Title: {title}\n\
         Headings: {headings}\n\
         Buttons: {buttons}\n\
         Key Links: {links}\n\
         Forms: {forms}\n\
         Inputs: {inputs}\n\n\
         Requirements: {requirements}\n\n\
         Output valid Playwright test code only.",
        title = page.title,
        headings = first(&page.headings),
        buttons = first(&page.buttons),
        links = first(&page.links),
        forms = page.forms,
        inputs = page.inputs.len(),
        requirements = requirements
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(DEFAULT_REQUIREMENTS),
    )
}

/// Ask the model for a test script covering the given page
pub fn generate_test_script(
    generator: &dyn TextGenerator,
    url: &str,
    page: &PageSnapshot,
    requirements: Option<&str>,
) -> GenerateResult<GeneratedScript> {
    let prompt = build_authoring_prompt(url, page, requirements);
    let raw = generator.generate(&prompt)?;
    let script = normalize_script(&raw);

    if script.is_empty() {
        return Err(GenerateError::InvalidResponse(
            "model returned an empty script".to_string(),
        ));
    }

    info!(url, model = generator.model_name(), chars = script.len(), "generated test script");

    Ok(GeneratedScript {
        url: url.to_string(),
        script,
        model: generator.model_name().to_string(),
        generated_at: Utc::now().to_rfc3339(),
        logs: vec!["AI generated Playwright test script.".to_string()],
    })
}
