//! JEXL expressions used by node handlers and routing.
//!
//! Wraps `jexl_eval::Evaluator` with a fixed whitelist of transforms (see
//! [`transforms`]). The evaluator only reads the context; there is no
//! assignment and no method invocation on live objects.
//!
//! ```text
//! amount * 1.18
//! (status == 'PAID' && fees|len > 0) ? 'done' : 'pending'
//! 'INR ' + (amount|round(2)|str)
//! ctx['studentName']
//! ```
//!
//! **Security note:** context values are always passed as the evaluation
//! context, never spliced into expression text.

pub mod template;
mod transforms;

use serde_json::{Map, Value};

/// Identifier that refers to the whole context (`ctx.name`, `ctx['name']`).
pub const CONTEXT_ROOT: &str = "ctx";

/// Deepest bracket nesting accepted before handing a source to the parser.
pub const MAX_NESTING: usize = 32;

/// Most tokens accepted in one expression. Bounds the depth of the operator
/// tree the evaluator recurses over.
pub const MAX_TOKENS: usize = 512;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors raised while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("expression evaluation failed: {0}")]
    EvalFailed(String),

    #[error("expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("expression has more than {limit} tokens")]
    TooLarge { limit: usize },

    #[error("unclosed '{{{{' placeholder at offset {0}")]
    UnclosedPlaceholder(usize),
}

// ---------------------------------------------------------------------------
// WorkflowEvaluator
// ---------------------------------------------------------------------------

/// JEXL evaluator with the workflow transforms registered.
///
/// Shared across concurrent runs; the registered transforms are pure.
pub struct WorkflowEvaluator {
    evaluator: jexl_eval::Evaluator<'static>,
}

impl WorkflowEvaluator {
    pub fn new() -> Self {
        Self {
            evaluator: transforms::register(jexl_eval::Evaluator::new()),
        }
    }

    /// Evaluate an expression and return the raw JSON value.
    pub fn evaluate_value(
        &self,
        source: &str,
        context: &Map<String, Value>,
    ) -> Result<Value, ExpressionError> {
        let source = source.trim();
        check_limits(source)?;
        let scope = scope(source, context);
        self.evaluator
            .eval_in_context(source, &scope)
            .map_err(|e| ExpressionError::EvalFailed(e.to_string()))
    }

    /// Evaluate an expression and coerce the result with [`truthy`].
    pub fn evaluate_bool(
        &self,
        source: &str,
        context: &Map<String, Value>,
    ) -> Result<bool, ExpressionError> {
        self.evaluate_value(source, context).map(|v| truthy(&v))
    }

    /// Replace every `{{ expr }}` placeholder in `input`.
    pub fn render(
        &self,
        input: &str,
        context: &Map<String, Value>,
    ) -> Result<String, ExpressionError> {
        template::render(self, input, context)
    }
}

impl Default for WorkflowEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorkflowEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEvaluator").finish_non_exhaustive()
    }
}

/// The JSON object an expression is evaluated against. `ctx` always names
/// the whole context and shadows a context key of the same name.
fn scope(source: &str, context: &Map<String, Value>) -> Value {
    let mut scope = context.clone();
    if source.contains(CONTEXT_ROOT) {
        scope.insert(CONTEXT_ROOT.to_string(), Value::Object(context.clone()));
    }
    Value::Object(scope)
}

/// Reject sources whose nesting or size would make the recursive evaluator
/// run out of stack. String literals count as one token.
fn check_limits(source: &str) -> Result<(), ExpressionError> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    let mut depth = 0usize;
    let mut tokens = 0usize;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                while let Some(next) = chars.next() {
                    if next == '\\' {
                        chars.next();
                    } else if next == c {
                        break;
                    }
                }
            }
            '(' | '[' | '{' => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Err(ExpressionError::TooDeep { limit: MAX_NESTING });
                }
            }
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() => continue,
            c if is_word(c) => {
                while chars.peek().is_some_and(|n| is_word(*n)) {
                    chars.next();
                }
            }
            _ => {}
        }
        tokens += 1;
        if tokens > MAX_TOKENS {
            return Err(ExpressionError::TooLarge { limit: MAX_TOKENS });
        }
    }
    Ok(())
}

/// JavaScript-like truthiness.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// The "string form" of a value: strings unquoted, null empty, whole floats
/// without a fraction, everything else as compact JSON.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
