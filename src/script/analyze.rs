//! Best-effort static scan of a test script.
//!
//! The scan is purely lexical. A selector showing up here says nothing about
//! whether the element exists on the page or was ever exercised; the profile
//! only enriches the context handed to the narrative generator.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Maximum number of test names kept in a profile
pub const MAX_TEST_NAMES: usize = 10;

/// A string literal in any of the three JavaScript quote styles.
/// Occupies three capture groups; exactly one participates in a match.
const QUOTED: &str = r#"(?:'([^']*)'|"([^"]*)"|`([^`]*)`)"#;

static TEST_DECLARATION: Lazy<Regex> = Lazy::new(|| compile(&format!(r"\btest\(\s*{QUOTED}\s*,")));

static ROLE_SELECTOR: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"getByRole\(\s*{QUOTED}(?:\s*,\s*\{{\s*name\s*:\s*{QUOTED})?"
    ))
});

static ARGUMENT_SELECTORS: Lazy<Vec<(SelectorKind, Regex)>> = Lazy::new(|| {
    [
        (SelectorKind::Text, "getByText"),
        (SelectorKind::Label, "getByLabel"),
        (SelectorKind::Placeholder, "getByPlaceholder"),
        (SelectorKind::Title, "getByTitle"),
        (SelectorKind::Css, "locator"),
    ]
    .into_iter()
    .map(|(kind, call)| (kind, compile(&format!(r"\b{call}\(\s*{QUOTED}"))))
    .collect()
});

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static script pattern must compile")
}

/// Syntactic family a selector expression belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Role,
    Text,
    Label,
    Placeholder,
    Title,
    Css,
}

impl SelectorKind {
    /// Whether the selector argument is human-readable text
    fn carries_text(&self) -> bool {
        !matches!(self, SelectorKind::Css | SelectorKind::Role)
    }
}

/// One selector expression found in the script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorRef {
    pub kind: SelectorKind,
    /// The selector argument; for roles, the role and accessible name joined by a space
    pub expression: String,
}

/// Lossy summary of what a script declares and touches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptProfile {
    /// Declared test titles, first [`MAX_TEST_NAMES`]
    pub test_names: Vec<String>,
    pub selectors: Vec<SelectorRef>,
    /// Human-readable selector arguments (button names, labels, visible text)
    pub element_texts: Vec<String>,
}

/// Scan normalized script text for test declarations and selector calls
pub fn analyze_script(script: &str) -> ScriptProfile {
    let mut profile = ScriptProfile {
        test_names: TEST_DECLARATION
            .captures_iter(script)
            .filter_map(|caps| quoted(&caps, 1))
            .take(MAX_TEST_NAMES)
            .collect(),
        ..Default::default()
    };

    for caps in ROLE_SELECTOR.captures_iter(script) {
        let Some(role) = quoted(&caps, 1) else { continue };
        let name = quoted(&caps, 4).filter(|name| !name.is_empty());
        let expression = match &name {
            Some(name) => format!("{role} {name}"),
            None => role,
        };
        profile.selectors.push(SelectorRef {
            kind: SelectorKind::Role,
            expression,
        });
        if let Some(name) = name {
            profile.element_texts.push(name);
        }
    }

    for (kind, pattern) in ARGUMENT_SELECTORS.iter() {
        for caps in pattern.captures_iter(script) {
            let Some(argument) = quoted(&caps, 1) else { continue };
            if kind.carries_text() && !argument.is_empty() {
                profile.element_texts.push(argument.clone());
            }
            profile.selectors.push(SelectorRef {
                kind: *kind,
                expression: argument,
            });
        }
    }

    profile
}

/// Value of the [`QUOTED`] group set starting at capture index `first`
fn quoted(caps: &Captures<'_>, first: usize) -> Option<String> {
    (first..first + 3)
        .find_map(|i| caps.get(i))
        .map(|m| m.as_str().to_string())
}
