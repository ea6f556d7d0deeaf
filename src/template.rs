//! Placeholder substitution for prompt and value templates.
//!
//! Recognised placeholders:
//!
//! - `{{input}}`: the current data value
//! - `{{line}}`: the current line inside a `ForEachLine` body
//! - `{{getVar("name")}}` and the older `{{get:name}}`: a variable's value
//!
//! All placeholders are resolved in one left-to-right pass, so replacement text
//! is never scanned again. Placeholders that cannot be resolved are left as-is.

use crate::data::VariableStore;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\{\{(?:(?P<input>input)|(?P<line>line)|getVar\("(?P<var>[A-Za-z_][A-Za-z0-9_]*)"\)|get:(?P<legacy>[A-Za-z_][A-Za-z0-9_]*))\}\}"#,
    )
    .expect("placeholder pattern is valid")
});

/// Substitutes every placeholder in `template`.
///
/// `line` is `None` outside of loops, in which case `{{line}}` stays in the text.
pub fn substitute(
    template: &str,
    current_data: &str,
    variables: &VariableStore,
    line: Option<&str>,
) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            if caps.name("input").is_some() {
                return current_data.to_string();
            }
            if caps.name("line").is_some() {
                return match line {
                    Some(line) => line.to_string(),
                    None => caps[0].to_string(),
                };
            }
            let name = caps
                .name("var")
                .or_else(|| caps.name("legacy"))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match variables.get(name) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Names of all variables referenced by placeholders in `template`, in order of appearance.
pub fn placeholder_variables(template: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|caps| {
            caps.name("var")
                .or_else(|| caps.name("legacy"))
                .map(|m| m.as_str().to_string())
        })
        .collect()
}
