//! Template interpolation: substitutes `{{ path }}` placeholders in policy
//! resource strings against a request context, with an explicit excluded
//! outcome (rather than a partial substitution) when a variable is missing
//! or resolves to an unsafe value.

use std::sync::OnceLock;

use regex::Regex;

use crate::context::RequestContext;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("valid regex"))
}

fn safe_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-.]+$").expect("valid regex"))
}

/// Cheap pre-check for whether a string contains at least one well-formed
/// `{{ path }}` placeholder, so callers can skip interpolation entirely for
/// literal resource strings.
#[must_use]
pub fn contains_variables(s: &str) -> bool {
    s.contains("{{") && placeholder_re().is_match(s)
}

/// Outcome of interpolating a template string against a request context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpolationOutcome {
    /// Every placeholder resolved to a safe value; carries the fully
    /// substituted string.
    Ok(String),
    /// At least one placeholder could not be resolved, or resolved to a
    /// value outside the safe charset; carries a human-readable reason.
    Excluded(String),
}

/// Interpolate all `{{ path }}` placeholders in `template` against `ctx`.
///
/// Resolution is all-or-nothing: the first unresolved or unsafe placeholder
/// excludes the whole template rather than producing a partially substituted
/// string.
#[must_use]
pub fn interpolate_with_context(template: &str, ctx: &RequestContext) -> InterpolationOutcome {
    let re = placeholder_re();
    let mut failure: Option<String> = None;

    let replaced = re
        .replace_all(template, |caps: &regex::Captures<'_>| {
            if failure.is_some() {
                return String::new();
            }
            let path = caps[1].trim();
            match ctx.resolve(path) {
                Some(value) if !value.is_empty() && safe_value_re().is_match(&value) => value,
                Some(value) => {
                    failure = Some(format!("unsafe value for variable: {path} = {value:?}"));
                    String::new()
                }
                None => {
                    failure = Some(format!("unresolved variable: {path}"));
                    String::new()
                }
            }
        })
        .into_owned();

    match failure {
        Some(reason) => InterpolationOutcome::Excluded(reason),
        None => InterpolationOutcome::Ok(replaced),
    }
}
