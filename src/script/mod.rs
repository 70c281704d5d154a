pub mod analyze;
pub mod generate;
pub mod normalize;

pub use analyze::{ScriptProfile, SelectorKind, SelectorRef, analyze_script};
pub use generate::{GeneratedScript, build_authoring_prompt, generate_test_script};
pub use normalize::{normalize_script, strip_fences};
