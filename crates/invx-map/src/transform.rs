//! Rule transform execution.
//!
//! Pure functions from named source values to one target value. A source
//! value of `None` is a field that is present but empty; it renders as an
//! empty string wherever text is assembled.

use std::collections::BTreeMap;

use invx_model::{MappingRule, Transform};

use crate::error::TransformError;

/// Source values keyed by field name.
pub type SourceValues = BTreeMap<String, Option<String>>;

/// Executes mapping rules against source values.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformExecutor;

impl TransformExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Build the rule's transform and apply it.
    ///
    /// The authoring contract is checked again here, so a malformed rule
    /// fails only its own field.
    pub fn execute(
        &self,
        values: &SourceValues,
        rule: &MappingRule,
    ) -> Result<Option<String>, TransformError> {
        let transform = rule.transform()?;
        self.apply(&transform, values, rule)
    }

    /// Apply an already-built transform using `rule` for its source fields.
    pub fn apply(
        &self,
        transform: &Transform,
        values: &SourceValues,
        rule: &MappingRule,
    ) -> Result<Option<String>, TransformError> {
        let sources = rule
            .source_fields
            .iter()
            .map(|field| {
                values
                    .get(field)
                    .map(Option::as_deref)
                    .ok_or_else(|| TransformError::MissingSource {
                        rule_id: rule.id.clone(),
                        field: field.clone(),
                    })
            })
            .collect::<Result<Vec<Option<&str>>, _>>()?;
        let first = sources.first().copied().flatten();

        match transform {
            Transform::Direct => Ok(first.map(str::to_string)),
            Transform::Concat { separator } => Ok(Some(
                sources
                    .iter()
                    .map(|v| v.unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(separator.as_str()),
            )),
            Transform::Split { delimiter, index } => Ok(Some(
                first
                    .unwrap_or_default()
                    .split(delimiter.as_str())
                    .nth(*index)
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string(),
            )),
            Transform::Lookup {
                table,
                case_sensitive,
                default_value,
            } => Ok(Some(lookup(
                table,
                *case_sensitive,
                default_value,
                first.unwrap_or_default(),
            ))),
            Transform::Custom { expression } => render_template(expression, values, rule).map(Some),
        }
    }
}

fn lookup(
    table: &BTreeMap<String, String>,
    case_sensitive: bool,
    default_value: &str,
    key: &str,
) -> String {
    let found = if case_sensitive {
        table.get(key)
    } else {
        let wanted = key.trim().to_lowercase();
        table
            .iter()
            .find(|(k, _)| k.trim().to_lowercase() == wanted)
            .map(|(_, v)| v)
    };
    found.map_or_else(|| default_value.to_string(), Clone::clone)
}

/// Substitute `${field}` placeholders. No expression evaluation.
fn render_template(
    expression: &str,
    values: &SourceValues,
    rule: &MappingRule,
) -> Result<String, TransformError> {
    let malformed = |detail: String| TransformError::MalformedTemplate {
        rule_id: rule.id.clone(),
        detail,
    };

    let mut out = String::with_capacity(expression.len());
    let mut rest = expression;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            let offset = expression.len() - rest.len() + start;
            return Err(malformed(format!("unterminated placeholder at byte {offset}")));
        };
        let name = after[..end].trim();
        if !rule.source_fields.iter().any(|f| f == name) {
            return Err(malformed(format!(
                "placeholder '{name}' is not a source field"
            )));
        }
        let value = values.get(name).and_then(Option::as_deref).unwrap_or_default();
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
