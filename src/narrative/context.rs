//! Prompt assembly for the narrative tasks.
//!
//! Context is always bounded: a handful of page elements, failures, and
//! script-derived names, with error text cut to a fixed prefix.

use super::{NarrativeInput, truncate_chars};

/// Page elements of each kind included in a prompt
const PAGE_ITEMS: usize = 5;

/// Failures described in a bug prompt
const BUG_FAILURES: usize = 5;

/// Error text kept per failure in a bug prompt
const BUG_ERROR_CHARS: usize = 300;

/// Failures described in a recommendation prompt
const RECOMMENDATION_FAILURES: usize = 3;

/// Error text kept per failure in a recommendation prompt
const RECOMMENDATION_ERROR_CHARS: usize = 150;

/// Element texts listed in a bug prompt
const BUG_ELEMENT_TEXTS: usize = 5;

/// Element texts listed in a recommendation prompt
const RECOMMENDATION_ELEMENT_TEXTS: usize = 6;

/// Test names listed in a recommendation prompt
const TEST_NAMES: usize = 5;

const BUG_INSTRUCTIONS: &str = r#"For each failed test, write one bug report for a non-technical reader such as a product manager or business owner.

Rules:
1. No technical jargon. Never use words like "locator", "selector", "DOM", "timeout", "assertion", or "element".
2. Use simple language, as if talking to someone who does not write code.
3. Explain what the problem means for real visitors of the website.
4. Name the actual buttons, links, and features from the page.
5. Say what needs fixing, not how to code the fix.

Good title: "The 'Sign Up' button can't be found"
Bad title: "Locator timeout at line 45"

Respond with a JSON array containing one object per failed test:

[
  {
    "bugId": "bug_unique_id",
    "title": "Short title naming the broken feature",
    "description": "What is wrong, what it means for visitors, and what to fix. At most 400 characters.",
    "severity": "critical|high|medium|low",
    "steps_to_reproduce": ["Step 1: Go to [page]", "Step 2: Click [button]", "Step 3: Observe [issue]"],
    "expected_result": "What should happen, in user terms",
    "actual_result": "What actually happened, in user terms",
    "user_impact": "How this affects real visitors"
  }
]

Severity guide:
- critical: the page does not load, the site crashes, nothing works
- high: a core feature is broken (login, checkout, forms)
- medium: the feature works but has problems (hard to find, slow)
- low: minor cosmetic issues

Return only the JSON array, no markdown."#;

const PASSED_INSTRUCTIONS: &str = r#"All automated tests passed. Give 2-3 concrete recommendations to improve this website.

Rules:
1. Use simple language for a reader who is not a developer.
2. No technical jargon. Never use words like "selector", "ARIA", "DOM", "attribute", "locator", "assertion", "viewport", or "getByRole".
3. Mention the actual button and link text from the page.
4. Explain why each recommendation matters for the business.
5. Say what to do, not how to code it.

Good example: "Test whether the 'Contact Us' form works on mobile phones. Most visitors use phones, and a broken form loses customers.""#;

const FAILED_INSTRUCTIONS: &str = r#"Some automated tests failed. Give 2-3 recommendations that would prevent these problems.

Use simple language with no technical jargon, focus on the business impact, and name the features that failed."#;

const RECOMMENDATION_FORMAT: &str = r#"Respond with a JSON array of objects with the fields recommendationId, title, description, impact (low|medium|high), and category (performance|security|accessibility|seo|ux).

Return only the JSON array."#;

/// Prompt asking for one plain-language bug per failure
pub fn bug_prompt(input: &NarrativeInput<'_>) -> String {
    let mut lines = vec![
        format!("WEBSITE: {} ({})", input.url, input.page_title_or("Unknown")),
        String::new(),
        "FAILED TESTS:".to_string(),
    ];

    for (i, failure) in input.failures.iter().take(BUG_FAILURES).enumerate() {
        lines.push(format!("{}. Test: '{}'", i + 1, failure.title));
        lines.push(format!(
            "   Error: {}",
            truncate_chars(&failure.error, BUG_ERROR_CHARS)
        ));
        lines.push(String::new());
    }

    if let Some(page) = input.page {
        lines.push("PAGE ELEMENTS:".to_string());
        push_quoted(&mut lines, "  Buttons", &page.buttons);
        push_quoted(&mut lines, "  Links", &page.links);
        lines.push(String::new());
    }

    if !input.profile.element_texts.is_empty() {
        lines.push("WHAT WAS BEING TESTED:".to_string());
        for text in input.profile.element_texts.iter().take(BUG_ELEMENT_TEXTS) {
            lines.push(format!("  - '{text}'"));
        }
        lines.push(String::new());
    }

    format!(
        "You are explaining website bugs to non-technical business users.\n\n{}\n\n{BUG_INSTRUCTIONS}",
        lines.join("\n")
    )
}

/// Prompt asking for recommendations, shaped by whether anything failed
pub fn recommendation_prompt(input: &NarrativeInput<'_>) -> String {
    let mut lines = vec![
        format!("WEBSITE: {}", input.url),
        format!("PAGE: {}", input.page_title_or("Unknown")),
        String::new(),
    ];

    if let Some(page) = input.page {
        lines.push("PAGE ELEMENTS:".to_string());
        push_quoted(&mut lines, "  Headings", &page.headings);
        push_quoted(&mut lines, "  Buttons", &page.buttons);
        push_quoted(&mut lines, "  Links", &page.links);
        lines.push(String::new());
    }

    if let Some(stats) = input.stats {
        lines.push(format!(
            "TESTS: {} passed, {} failed",
            stats.passed, stats.failed
        ));
        lines.push(String::new());
    }

    if !input.profile.test_names.is_empty() {
        lines.push("WHAT WAS TESTED:".to_string());
        for name in input.profile.test_names.iter().take(TEST_NAMES) {
            lines.push(format!("  - {name}"));
        }
        lines.push(String::new());
    }

    if !input.profile.element_texts.is_empty() {
        lines.push("ELEMENTS CHECKED:".to_string());
        for text in input
            .profile
            .element_texts
            .iter()
            .take(RECOMMENDATION_ELEMENT_TEXTS)
        {
            lines.push(format!("  - '{text}'"));
        }
        lines.push(String::new());
    }

    if !input.failures.is_empty() {
        lines.push("ISSUES FOUND:".to_string());
        for (i, failure) in input
            .failures
            .iter()
            .take(RECOMMENDATION_FAILURES)
            .enumerate()
        {
            lines.push(format!("  {}. {}", i + 1, failure.title));
            lines.push(format!(
                "     Problem: {}",
                truncate_chars(&failure.error, RECOMMENDATION_ERROR_CHARS)
            ));
        }
        lines.push(String::new());
    }

    let instructions = if input.failures.is_empty() {
        PASSED_INSTRUCTIONS
    } else {
        FAILED_INSTRUCTIONS
    };

    format!(
        "You are a website quality advisor speaking to non-technical business users.\n\n{}\n\n{instructions}\n\n{RECOMMENDATION_FORMAT}",
        lines.join("\n")
    )
}

fn push_quoted(lines: &mut Vec<String>, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let quoted: Vec<String> = items
        .iter()
        .take(PAGE_ITEMS)
        .map(|item| format!("'{item}'"))
        .collect();
    lines.push(format!("{label}: {}", quoted.join(", ")));
}
