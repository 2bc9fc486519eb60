//! The transform whitelist: the only callables an expression can reach.
//!
//! Transforms are applied with JEXL pipe syntax; the subject is the first
//! argument: `name|lower`, `phone|startsWith('+91')`, `fees|join(', ')`,
//! `amount|round(2)`, `[a, b]|max` or `a|max(b)`.

use std::cmp::Ordering;

use anyhow::{anyhow, bail};
use jexl_eval::Evaluator;
use serde_json::{Number, Value};

use super::{to_display_string, truthy};

pub(super) fn register(evaluator: Evaluator<'static>) -> Evaluator<'static> {
    evaluator
        .with_transform("len", len)
        .with_transform("lower", lower)
        .with_transform("upper", upper)
        .with_transform("trim", trim)
        .with_transform("contains", contains)
        .with_transform("startsWith", starts_with)
        .with_transform("endsWith", ends_with)
        .with_transform("isEmpty", is_empty)
        .with_transform("str", to_str)
        .with_transform("num", num)
        .with_transform("round", round)
        .with_transform("abs", abs)
        .with_transform("min", min)
        .with_transform("max", max)
        .with_transform("join", join)
        .with_transform("not", not)
}

static NULL: Value = Value::Null;

fn subject(args: &[Value]) -> &Value {
    args.first().unwrap_or(&NULL)
}

fn arg<'a>(name: &str, args: &'a [Value], index: usize) -> anyhow::Result<&'a Value> {
    args.get(index)
        .ok_or_else(|| anyhow!("{name}: missing argument {index}"))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn float(f: f64) -> anyhow::Result<Value> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| anyhow!("result {f} is not a finite number"))
}

/// Whole results become JSON integers when they fit.
fn whole(f: f64) -> anyhow::Result<Value> {
    if f.abs() < 9e15 {
        Ok(Value::from(f as i64))
    } else {
        float(f)
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Strings and collections
// ---------------------------------------------------------------------------

fn len(args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::from(match subject(args) {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::Null => 0,
        other => to_display_string(other).chars().count(),
    }))
}

fn lower(args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::String(to_display_string(subject(args)).to_lowercase()))
}

fn upper(args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::String(to_display_string(subject(args)).to_uppercase()))
}

fn trim(args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::String(to_display_string(subject(args)).trim().to_string()))
}

/// Substring for strings, element for lists, key for objects.
fn contains(args: &[Value]) -> anyhow::Result<Value> {
    let needle = arg("contains", args, 1)?;
    let found = match subject(args) {
        Value::String(s) => s.contains(to_display_string(needle).as_str()),
        Value::Array(items) => items.iter().any(|item| loose_eq(item, needle)),
        Value::Object(map) => map.contains_key(to_display_string(needle).as_str()),
        Value::Null => false,
        other => bail!("contains: cannot search a {}", type_name(other)),
    };
    Ok(Value::Bool(found))
}

fn starts_with(args: &[Value]) -> anyhow::Result<Value> {
    let prefix = to_display_string(arg("startsWith", args, 1)?);
    Ok(Value::Bool(to_display_string(subject(args)).starts_with(prefix.as_str())))
}

fn ends_with(args: &[Value]) -> anyhow::Result<Value> {
    let suffix = to_display_string(arg("endsWith", args, 1)?);
    Ok(Value::Bool(to_display_string(subject(args)).ends_with(suffix.as_str())))
}

fn is_empty(args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::Bool(match subject(args) {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }))
}

fn to_str(args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::String(to_display_string(subject(args))))
}

/// `list|join` uses `,`; `list|join(sep)` uses `sep`. Null joins to "".
fn join(args: &[Value]) -> anyhow::Result<Value> {
    let separator = args.get(1).map(to_display_string).unwrap_or_else(|| ",".to_string());
    Ok(Value::String(match subject(args) {
        Value::Array(items) => items
            .iter()
            .map(to_display_string)
            .collect::<Vec<_>>()
            .join(&separator),
        other => to_display_string(other),
    }))
}

fn not(args: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::Bool(!truthy(subject(args))))
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

fn num(args: &[Value]) -> anyhow::Result<Value> {
    match subject(args) {
        value @ (Value::Number(_) | Value::Null) => Ok(value.clone()),
        Value::Bool(b) => Ok(Value::from(i64::from(*b))),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Value::from(i));
            }
            let f = s
                .parse::<f64>()
                .map_err(|_| anyhow!("num: '{s}' is not a number"))?;
            float(f)
        }
        other => bail!("num: cannot convert a {}", type_name(other)),
    }
}

/// `x|round` rounds to a whole number; `x|round(d)` keeps `d` decimals, and
/// a negative `d` rounds to tens, hundreds and so on.
fn round(args: &[Value]) -> anyhow::Result<Value> {
    let value = subject(args);
    let Some(x) = value.as_f64() else {
        bail!("round: expected a number, got {}", type_name(value));
    };
    let digits = match args.get(1) {
        None => 0,
        Some(d) => match d.as_f64() {
            Some(d) if d.fract() == 0.0 => d.clamp(-15.0, 15.0) as i32,
            _ => bail!("round: digits must be a whole number, got {d}"),
        },
    };

    let factor = 10f64.powi(digits.abs());
    if digits > 0 {
        float((x * factor).round() / factor)
    } else {
        whole((x / factor).round() * factor)
    }
}

fn abs(args: &[Value]) -> anyhow::Result<Value> {
    match subject(args) {
        Value::Number(n) => match n.as_i64() {
            Some(i) => match i.checked_abs() {
                Some(a) => Ok(Value::from(a)),
                None => float((i as f64).abs()),
            },
            None => float(n.as_f64().unwrap_or(0.0).abs()),
        },
        other => bail!("abs: expected a number, got {}", type_name(other)),
    }
}

fn min(args: &[Value]) -> anyhow::Result<Value> {
    extremum("min", args, Ordering::Less)
}

fn max(args: &[Value]) -> anyhow::Result<Value> {
    extremum("max", args, Ordering::Greater)
}

/// Over the subject list (`xs|min`) or the subject and arguments
/// (`a|min(b, c)`). Nulls are ignored.
fn extremum(name: &str, args: &[Value], want: Ordering) -> anyhow::Result<Value> {
    let items: &[Value] = match args {
        [Value::Array(items)] => items,
        _ => args,
    };
    let mut best: Option<&Value> = None;
    for item in items.iter().filter(|v| !v.is_null()) {
        best = match best {
            None => Some(item),
            Some(current) => match compare(item, current) {
                Some(ordering) if ordering == want => Some(item),
                Some(_) => Some(current),
                None => bail!(
                    "{name}: cannot compare {} with {}",
                    type_name(item),
                    type_name(current)
                ),
            },
        };
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}
