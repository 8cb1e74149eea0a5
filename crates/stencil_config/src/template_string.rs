//! `${...}` template string resolution.
//!
//! Expressions are one or more alternatives separated by `||`. An alternative
//! is a dotted key path (`inputs.foo`), a quoted string, a number, `true`,
//! `false` or `null`. `$${` escapes a literal `${`.
//!
//! Resolution runs in one of two modes:
//!
//! - [`ResolveMode::Strict`]: the first alternative that resolves wins, and an
//!   expression where nothing resolves is an error.
//! - [`ResolveMode::Partial`]: alternatives are tried in order until one
//!   resolves. Reaching a key missing from the context first leaves the whole
//!   expression in place verbatim, so a later stage with more context can
//!   resolve it.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::context::ConfigContext;
use crate::error::{ConfigError, ConfigResult};

/// How unresolvable expressions are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    Strict,
    Partial,
}

fn template_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // A leading `$` marks an escaped expression.
    PATTERN.get_or_init(|| Regex::new(r"\$?\$\{([^{}]*)\}").expect("valid template pattern"))
}

fn key_segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("valid key pattern"))
}

#[derive(Debug, Clone, PartialEq)]
enum Operand<'a> {
    Key(Vec<&'a str>),
    Literal(Value),
}

/// Outcome of evaluating a single expression.
enum Evaluated {
    Resolved(Value),
    Deferred,
}

/// Resolve every string value in `value`, recursing into objects and arrays.
///
/// Object keys are left untouched.
pub fn resolve_template_strings(
    value: &Value,
    context: &dyn ConfigContext,
    mode: ResolveMode,
) -> ConfigResult<Value> {
    match value {
        Value::String(s) => resolve_template_string(s, context, mode),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_template_strings(item, context, mode))
            .collect::<ConfigResult<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), resolve_template_strings(v, context, mode)?)))
            .collect::<ConfigResult<Map<String, Value>>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}

/// Resolve a single string.
///
/// A string made of exactly one expression resolves to the expression's value
/// with its type preserved. Otherwise the result is a string with every
/// expression interpolated.
pub fn resolve_template_string(
    input: &str,
    context: &dyn ConfigContext,
    mode: ResolveMode,
) -> ConfigResult<Value> {
    let pattern = template_pattern();

    if let Some(caps) = pattern.captures(input) {
        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        if whole.len() == input.len() && !whole.starts_with("$$") {
            return match evaluate(input, &caps[1], context, mode)? {
                Evaluated::Resolved(value) => Ok(value),
                Evaluated::Deferred => Ok(Value::String(input.to_string())),
            };
        }
    } else {
        return Ok(Value::String(input.to_string()));
    }

    let mut error = None;
    let rendered = pattern.replace_all(input, |caps: &Captures| {
        let whole = &caps[0];
        if whole.starts_with("$$") {
            // Escapes survive a partial pass so the final pass still sees them.
            return match mode {
                ResolveMode::Strict => format!("${{{}}}", &caps[1]),
                ResolveMode::Partial => whole.to_string(),
            };
        }
        match evaluate(input, &caps[1], context, mode) {
            Ok(Evaluated::Resolved(value)) => stringify(&value),
            Ok(Evaluated::Deferred) => whole.to_string(),
            Err(e) => {
                error.get_or_insert(e);
                String::new()
            }
        }
    });

    match error {
        Some(e) => Err(e),
        None => Ok(Value::String(rendered.into_owned())),
    }
}

fn evaluate(
    template: &str,
    expression: &str,
    context: &dyn ConfigContext,
    mode: ResolveMode,
) -> ConfigResult<Evaluated> {
    let operands = parse_expression(expression).map_err(|message| ConfigError::TemplateString {
        template: template.to_string(),
        message,
    })?;

    let mut first_missing = None;
    for operand in &operands {
        match operand {
            Operand::Literal(value) => return Ok(Evaluated::Resolved(value.clone())),
            Operand::Key(path) => match context.lookup(path) {
                Some(value) => return Ok(Evaluated::Resolved(value.clone())),
                // A later stage may know this key, and it takes precedence
                // over the alternatives after it.
                None if mode == ResolveMode::Partial => return Ok(Evaluated::Deferred),
                None => {
                    first_missing.get_or_insert_with(|| path.join("."));
                }
            },
        }
    }

    Err(ConfigError::TemplateString {
        template: template.to_string(),
        message: format!(
            "Could not find key {}. Available keys: {}",
            first_missing.unwrap_or_default(),
            context.available_keys().join(", ")
        ),
    })
}

fn parse_expression(expression: &str) -> Result<Vec<Operand<'_>>, String> {
    let operands = split_alternatives(expression)
        .into_iter()
        .map(parse_operand)
        .collect::<Result<Vec<_>, _>>()?;

    if operands.is_empty() {
        return Err("Empty template expression".to_string());
    }
    Ok(operands)
}

/// Split on `||` outside of quoted strings.
fn split_alternatives(expression: &str) -> Vec<&str> {
    let bytes = expression.as_bytes();
    let mut parts = Vec::new();
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'|' && bytes.get(i + 1) == Some(&b'|') => {
                parts.push(&expression[start..i]);
                i += 2;
                start = i;
                continue;
            }
            None => {}
        }
        i += 1;
    }
    parts.push(&expression[start..]);
    parts
}

fn parse_operand(raw: &str) -> Result<Operand<'_>, String> {
    let s = raw.trim();
    if s.is_empty() {
        return Err("Empty operand in template expression".to_string());
    }

    let first = s.as_bytes()[0];
    if (first == b'"' || first == b'\'') && s.len() >= 2 && s.as_bytes()[s.len() - 1] == first {
        return Ok(Operand::Literal(Value::String(s[1..s.len() - 1].to_string())));
    }

    match s {
        "true" => return Ok(Operand::Literal(Value::Bool(true))),
        "false" => return Ok(Operand::Literal(Value::Bool(false))),
        "null" => return Ok(Operand::Literal(Value::Null)),
        _ => {}
    }

    if first.is_ascii_digit() || first == b'-' {
        return serde_json::from_str::<Value>(s)
            .ok()
            .filter(Value::is_number)
            .map(Operand::Literal)
            .ok_or_else(|| format!("Invalid number {}", s));
    }

    let path: Vec<&str> = s.split('.').collect();
    if path.iter().all(|segment| key_segment_pattern().is_match(segment)) {
        Ok(Operand::Key(path))
    } else {
        Err(format!("Invalid key {}", s))
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{BundleConfigContext, ProjectConfigContext};
    use serde_json::json;
    use std::path::PathBuf;

    fn project() -> ProjectConfigContext {
        ProjectConfigContext::new("bundles", &PathBuf::from("/project"))
    }

    fn bundle() -> BundleConfigContext {
        let inputs = json!({ "foo": "bar", "count": 3 });
        BundleConfigContext::new("test", "tpl", inputs.as_object().unwrap())
    }

    #[test]
    fn test_plain_string_untouched() {
        let v = resolve_template_string("hello", &project(), ResolveMode::Strict).unwrap();
        assert_eq!(v, json!("hello"));
    }

    #[test]
    fn test_interpolation() {
        let v = resolve_template_string("${project.name}.json", &project(), ResolveMode::Strict)
            .unwrap();
        assert_eq!(v, json!("bundles.json"));
    }

    #[test]
    fn test_whole_expression_keeps_type() {
        let v = resolve_template_string("${inputs.count}", &bundle(), ResolveMode::Strict).unwrap();
        assert_eq!(v, json!(3));

        let v = resolve_template_string("n-${inputs.count}", &bundle(), ResolveMode::Strict)
            .unwrap();
        assert_eq!(v, json!("n-3"));
    }

    #[test]
    fn test_strict_missing_key_fails() {
        let err = resolve_template_string("${project.nope}", &project(), ResolveMode::Strict)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid template string (${project.nope}): Could not find key project.nope. \
             Available keys: local, project, var"
        );
    }

    #[test]
    fn test_strict_alternatives() {
        let v = resolve_template_string("${var.missing || 'fallback'}", &project(), ResolveMode::Strict)
            .unwrap();
        assert_eq!(v, json!("fallback"));

        let v = resolve_template_string("${var.missing || project.name}", &project(), ResolveMode::Strict)
            .unwrap();
        assert_eq!(v, json!("bundles"));
    }

    #[test]
    fn test_partial_leaves_unresolved_expressions() {
        let ctx = bundle();
        let v = resolve_template_string(
            "${bundle.name}-${bundle.templateName}-${inputs.foo}",
            &ctx,
            ResolveMode::Partial,
        )
        .unwrap();
        assert_eq!(v, json!("test-tpl-bar"));

        let raw = "${modules.foo.outputs.bar || inputs.foo}";
        let v = resolve_template_string(raw, &ctx, ResolveMode::Partial).unwrap();
        assert_eq!(v, json!(raw));

        let v = resolve_template_string("a-${runtime.x}-${inputs.foo}", &ctx, ResolveMode::Partial)
            .unwrap();
        assert_eq!(v, json!("a-${runtime.x}-bar"));
    }

    #[test]
    fn test_partial_uses_leading_resolved_alternative() {
        let ctx = bundle();
        let v = resolve_template_string(
            "${inputs.foo || modules.x.outputs.y}",
            &ctx,
            ResolveMode::Partial,
        )
        .unwrap();
        assert_eq!(v, json!("bar"));

        let v = resolve_template_string("${inputs.count || 'x'}", &ctx, ResolveMode::Partial)
            .unwrap();
        assert_eq!(v, json!(3));

        let v = resolve_template_string("${'lit' || modules.x}", &ctx, ResolveMode::Partial)
            .unwrap();
        assert_eq!(v, json!("lit"));

        let raw = "${inputs.nope || inputs.foo}";
        let v = resolve_template_string(raw, &ctx, ResolveMode::Partial).unwrap();
        assert_eq!(v, json!(raw));
    }

    #[test]
    fn test_escapes() {
        let v = resolve_template_string("$${inputs.foo}", &bundle(), ResolveMode::Strict).unwrap();
        assert_eq!(v, json!("${inputs.foo}"));

        let v = resolve_template_string("$${inputs.foo}", &bundle(), ResolveMode::Partial).unwrap();
        assert_eq!(v, json!("$${inputs.foo}"));
    }

    #[test]
    fn test_resolve_nested_structure() {
        let raw = json!({
            "name": "${inputs.foo}",
            "list": ["${bundle.name}", 1, true],
            "${inputs.foo}": "key untouched",
        });
        let v = resolve_template_strings(&raw, &bundle(), ResolveMode::Partial).unwrap();
        assert_eq!(
            v,
            json!({
                "name": "bar",
                "list": ["test", 1, true],
                "${inputs.foo}": "key untouched",
            })
        );
    }

    #[test]
    fn test_split_alternatives_respects_quotes() {
        assert_eq!(split_alternatives("a || 'x||y'"), vec!["a ", " 'x||y'"]);
    }

    #[test]
    fn test_invalid_expression() {
        assert!(resolve_template_string("${foo bar}", &project(), ResolveMode::Strict).is_err());
        assert!(resolve_template_string("${}", &project(), ResolveMode::Partial).is_err());
    }
}
