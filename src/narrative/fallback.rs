//! Deterministic, template-based narratives.
//!
//! Used whenever the generative call is unusable, and for the canned bugs of
//! runs that never produced a report.

use once_cell::sync::Lazy;
use regex::Regex;

use super::schema::{MAX_DESCRIPTION_CHARS, MAX_TITLE_CHARS};
use super::{MAX_BUGS, NarrativeInput, new_id, truncate_chars};
use crate::severity;
use crate::types::{Bug, Category, Failure, Impact, Recommendation, Severity};

/// First single-quoted span of a test title
static QUOTED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'([^']+)'").expect("static name pattern must compile"));

/// Error text kept when a template quotes the error
const QUOTED_ERROR_CHARS: usize = 150;

/// Error text kept in the canned technical-issue bug
const CANNED_ERROR_CHARS: usize = 200;

/// Page buttons checked for test coverage
const COVERAGE_BUTTONS: usize = 10;

/// Headings and buttons matched against what the script touched
const VERIFIED_CANDIDATES: usize = 3;

/// Script element texts matched against the page
const VERIFIED_TEXTS: usize = 5;

/// One templated bug per failure, up to [`MAX_BUGS`]
pub fn fallback_bugs(input: &NarrativeInput<'_>) -> Vec<Bug> {
    let page_title = input.page_title_or("the website");

    input
        .failures
        .iter()
        .take(MAX_BUGS)
        .map(|failure| failure_bug(failure, input.url, page_title))
        .collect()
}

fn failure_bug(failure: &Failure, url: &str, page_title: &str) -> Bug {
    let test_name = non_blank(&failure.title, "A test");
    let error = non_blank(&failure.error, "An unknown error occurred");
    let error_lower = error.to_lowercase();
    let element = QUOTED_NAME
        .captures(test_name)
        .and_then(|caps| caps.get(1))
        .map_or("a page element", |m| m.as_str());

    let (title, description, user_impact, actual_result) = if error_lower.contains("timeout") {
        (
            format!("'{test_name}' is taking too long to respond"),
            format!(
                "When testing '{test_name}' on {page_title}, the page took longer than expected (over 30 seconds). \
                 This might mean the feature is very slow for real users. \
                 Check if there are performance issues or if the page is loading correctly."
            ),
            "Users may experience slow loading times or give up waiting".to_string(),
            "Page or element took too long to load (timeout)".to_string(),
        )
    } else if error_lower.contains("not found") || error_lower.contains("locator") {
        (
            format!("Can't find '{element}' on {page_title}"),
            format!(
                "The automated test couldn't find '{element}' on the page. \
                 It may have been removed or renamed, it may be hidden from view, or the page structure may have changed. \
                 Users might not be able to access this feature."
            ),
            "Users may not be able to use this feature if it's missing or hard to find".to_string(),
            format!("'{element}' was not found on the page"),
        )
    } else {
        (
            format!("Issue with '{test_name}' on {page_title}"),
            format!(
                "The test '{test_name}' failed on {url}. Error: {}. \
                 This needs investigation to ensure the feature works correctly for users.",
                truncate_chars(error, QUOTED_ERROR_CHARS)
            ),
            "Users may encounter errors when using this feature".to_string(),
            "Test failed with an error".to_string(),
        )
    };

    Bug {
        id: new_id("bug"),
        title: truncate_chars(&title, MAX_TITLE_CHARS),
        description: truncate_chars(&description, MAX_DESCRIPTION_CHARS),
        severity: severity::classify(error, test_name),
        steps_to_reproduce: vec![
            format!("1. Visit {url}"),
            format!("2. Try to use the '{element}' feature"),
            "3. Observe the issue".to_string(),
        ],
        expected_result: format!("The '{element}' should work correctly"),
        actual_result,
        user_impact: user_impact.to_string(),
    }
}

/// Canned critical bug for a run that exceeded its time limit
pub fn timeout_bug(url: &str) -> Bug {
    Bug {
        id: new_id("bug"),
        title: "Website is taking too long to respond".to_string(),
        description: "The automated tests couldn't finish because the website took too long to respond. \
                      The server may be very slow, the page may carry heavy content, or a technical problem may be \
                      keeping the page from loading. Visitors will likely see very slow loading or no page at all. \
                      Check server performance and page load speed."
            .to_string(),
        severity: Severity::Critical,
        steps_to_reproduce: vec![
            format!("1. Visit {url}"),
            "2. Wait for page to load".to_string(),
            "3. Page takes minutes or doesn't load".to_string(),
        ],
        expected_result: "Page should load in under 3-5 seconds".to_string(),
        actual_result: "Page did not finish loading within the test time limit".to_string(),
        user_impact: "Users cannot access your website due to extreme slowness".to_string(),
    }
}

/// Canned medium bug for a run the testing system could not complete
pub fn technical_issue_bug(error: &str) -> Bug {
    Bug {
        id: new_id("bug"),
        title: "Automated testing encountered a technical issue".to_string(),
        description: truncate_chars(
            &format!(
                "The automated testing system ran into an unexpected problem: {}. \
                 This might be a temporary issue with the testing setup rather than your website. \
                 Try running the test again. If the problem persists, contact support.",
                truncate_chars(error, CANNED_ERROR_CHARS)
            ),
            MAX_DESCRIPTION_CHARS,
        ),
        severity: Severity::Medium,
        steps_to_reproduce: vec![
            "1. Run automated test".to_string(),
            "2. System encounters error".to_string(),
            "3. Test cannot complete".to_string(),
        ],
        expected_result: "Tests should run successfully".to_string(),
        actual_result: "Testing system error".to_string(),
        user_impact: "Unable to verify website quality automatically".to_string(),
    }
}

/// A single recommendation built from the run's own facts
pub fn fallback_recommendation(input: &NarrativeInput<'_>) -> Recommendation {
    let page_name = input.page_title_or(input.url);
    let url = input.url;

    if let Some(failure) = input.failures.first() {
        let test_name = non_blank(&failure.title, "A test");
        let error = truncate_chars(
            non_blank(&failure.error, "An unexpected error occurred"),
            QUOTED_ERROR_CHARS,
        );
        return recommendation(
            format!("Fix an issue with '{test_name}' on your website"),
            format!(
                "One of our automated tests ('{test_name}') found an issue on {page_name}. The problem: {error}. \
                 We recommend having a developer review this to ensure all features work properly for your visitors."
            ),
            Impact::High,
            Category::Ux,
        );
    }

    let (verified, untested) = match input.page {
        Some(page) => coverage(
            &page.headings,
            &page.buttons,
            &input.profile.element_texts,
        ),
        None => (Vec::new(), Vec::new()),
    };

    if !untested.is_empty() {
        let untested_list = untested
            .iter()
            .take(3)
            .map(|button| format!("'{button}'"))
            .collect::<Vec<_>>()
            .join(", ");
        let checked = if verified.is_empty() {
            "several elements".to_string()
        } else {
            verified.iter().take(2).cloned().collect::<Vec<_>>().join(", ")
        };
        return recommendation(
            format!("Test additional buttons on {page_name}"),
            format!(
                "Good news! All our tests passed on {url}. We checked {checked} and they work great. \
                 However, these buttons haven't been tested yet: {untested_list}. \
                 Adding tests for them will make sure every clickable part of the page works for your users."
            ),
            Impact::Medium,
            Category::Ux,
        );
    }

    if let Some(first) = verified.first() {
        let verified_list = if verified.len() <= 3 {
            verified.join(", ")
        } else {
            format!("{}, {}, and others", verified[0], verified[1])
        };
        return recommendation(
            format!("Expand testing for {page_name}"),
            format!(
                "All tests passed on {url}! We successfully verified {verified_list}. \
                 To make your website even more reliable, consider testing what happens when someone uses \
                 {first} with invalid information, how the page looks and works on mobile phones, \
                 and whether keyboard users can navigate easily."
            ),
            Impact::Low,
            Category::Accessibility,
        );
    }

    recommendation(
        format!("Continue improving {page_name}"),
        format!(
            "Your website ({page_name}) passed our initial automated tests. \
             To maintain high quality, we recommend regularly testing key features like forms, buttons, and user workflows. \
             This helps catch issues before your customers do and keeps the experience smooth for everyone visiting {url}."
        ),
        Impact::Medium,
        Category::Ux,
    )
}

/// Split page elements into those the script verified and buttons it never touched
fn coverage(
    headings: &[String],
    buttons: &[String],
    element_texts: &[String],
) -> (Vec<String>, Vec<String>) {
    let headings = &headings[..headings.len().min(VERIFIED_CANDIDATES)];
    let candidate_buttons = &buttons[..buttons.len().min(VERIFIED_CANDIDATES)];
    let overlaps = |a: &str, b: &str| {
        let (a, b) = (a.to_lowercase(), b.to_lowercase());
        a.contains(&b) || b.contains(&a)
    };

    let mut verified = Vec::new();
    for tested in element_texts.iter().take(VERIFIED_TEXTS) {
        if let Some(heading) = headings.iter().find(|h| overlaps(h, tested)) {
            verified.push(format!("the '{heading}' heading"));
        }
        if let Some(button) = candidate_buttons.iter().find(|b| overlaps(b, tested)) {
            verified.push(format!("the '{button}' button"));
        }
    }

    if verified.is_empty() {
        verified = headings
            .iter()
            .filter(|h| !h.is_empty())
            .map(|h| format!("the '{h}' heading"))
            .chain(
                candidate_buttons
                    .iter()
                    .filter(|b| !b.is_empty())
                    .map(|b| format!("the '{b}' button")),
            )
            .take(VERIFIED_CANDIDATES)
            .collect();
    }

    let tested_text = element_texts
        .iter()
        .map(|text| text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    let untested = buttons
        .iter()
        .take(COVERAGE_BUTTONS)
        .filter(|button| !button.is_empty() && !tested_text.contains(&button.to_lowercase()))
        .cloned()
        .collect();

    (verified, untested)
}

fn recommendation(
    title: String,
    description: String,
    impact: Impact,
    category: Category,
) -> Recommendation {
    Recommendation {
        id: new_id("rec"),
        title: truncate_chars(&title, MAX_TITLE_CHARS),
        description,
        impact,
        category,
    }
}

fn non_blank<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() { default } else { value }
}
