//! Removal of incidental Markdown fencing around generated text.

const FENCE: &str = "```";

/// Language tags a model sometimes emits on their own line after a bare fence
const LANGUAGE_TAGS: &[&str] = &[
    "js",
    "javascript",
    "mjs",
    "jsx",
    "ts",
    "typescript",
    "tsx",
    "json",
];

/// Strip a fenced code-block wrapper from generated text.
///
/// When the text opens with a fence, every fence line (with or without a
/// language tag) is dropped, along with a lone language-tag line directly
/// after the opening fence. All other lines are kept verbatim. The result,
/// fenced or not, is trimmed of surrounding whitespace, so applying this
/// twice gives the same text as applying it once.
pub fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with(FENCE) {
        return trimmed.to_string();
    }

    let mut lines = trimmed
        .lines()
        .filter(|line| !line.trim_start().starts_with(FENCE))
        .peekable();

    if lines
        .peek()
        .is_some_and(|first| LANGUAGE_TAGS.contains(&first.trim().to_lowercase().as_str()))
    {
        lines.next();
    }

    lines.collect::<Vec<_>>().join("\n").trim().to_string()
}

/// Turn a raw generated test script into executable source.
///
/// No syntax checking happens here; broken scripts surface as runner errors.
pub fn normalize_script(raw: &str) -> String {
    strip_fences(raw)
}
