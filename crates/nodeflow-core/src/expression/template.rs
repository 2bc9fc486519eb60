//! `{{ expr }}` interpolation inside plain strings.

use serde_json::{Map, Value};

use super::{to_display_string, ExpressionError, WorkflowEvaluator};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Replace each `{{ expr }}` with the string form of its value.
///
/// Null renders as an empty string. Text without placeholders is returned
/// unchanged; an unclosed `{{` is an error.
pub fn render(
    evaluator: &WorkflowEvaluator,
    input: &str,
    context: &Map<String, Value>,
) -> Result<String, ExpressionError> {
    if !input.contains(OPEN) {
        return Ok(input.to_string());
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut consumed = 0;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let end = after_open
            .find(CLOSE)
            .ok_or(ExpressionError::UnclosedPlaceholder(consumed + start))?;
        let value = evaluator.evaluate_value(&after_open[..end], context)?;
        out.push_str(&to_display_string(&value));

        let advance = start + OPEN.len() + end + CLOSE.len();
        consumed += advance;
        rest = &rest[advance..];
    }
    out.push_str(rest);
    Ok(out)
}
