//! Leaf keyword checks that need nothing but the node and its schema.

use serde_json::Value;

use super::problem::{ProblemCode, ValidationProblem};
use crate::document::{NodeId, NodeKind, ParsedNode, ParsedTree};
use crate::schema::{ExclusiveBound, PrimitiveType, SchemaNode};

/// Decimal places kept when scaling fractional operands of `multipleOf`.
const MAX_SCALE: usize = 18;
/// Scaled operands at or beyond this use the float remainder instead.
const SCALED_LIMIT: f64 = 1e18;

pub(super) fn check_type(node: &ParsedNode, types: &[PrimitiveType]) -> Option<ValidationProblem> {
    if types.iter().any(|ty| matches_type(node, *ty)) {
        return None;
    }
    if node.kind == NodeKind::Number && types.contains(&PrimitiveType::Integer) {
        return Some(ValidationProblem::error(
            node.offset,
            node.end(),
            ProblemCode::Integer,
            "Value is not an integer.",
        ));
    }
    let expected = types.iter().map(|ty| ty.name()).collect::<Vec<_>>().join(", ");
    Some(ValidationProblem::error(
        node.offset,
        node.end(),
        ProblemCode::Type,
        format!("Incorrect type. Expected \"{expected}\"."),
    ))
}

pub(crate) fn matches_type(node: &ParsedNode, ty: PrimitiveType) -> bool {
    match ty {
        PrimitiveType::String => node.kind == NodeKind::String,
        PrimitiveType::Number => node.kind == NodeKind::Number,
        PrimitiveType::Integer => node.as_f64().is_some_and(|n| n.fract() == 0.0),
        PrimitiveType::Boolean => node.kind == NodeKind::Boolean,
        PrimitiveType::Object => node.kind == NodeKind::Object,
        PrimitiveType::Array => node.kind == NodeKind::Array,
        PrimitiveType::Null => node.kind == NodeKind::Null,
        PrimitiveType::Molang => matches!(
            node.kind,
            NodeKind::String | NodeKind::Number | NodeKind::Boolean
        ),
    }
}

pub(super) fn check_enum(tree: &ParsedTree, id: NodeId, allowed: &[Value]) -> Option<ValidationProblem> {
    let value = tree.to_value(id);
    if allowed.iter().any(|candidate| values_equal(candidate, &value)) {
        return None;
    }
    let node = tree.node(id);
    let listed = allowed
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Some(ValidationProblem::error(
        node.offset,
        node.end(),
        ProblemCode::Enum,
        format!("Value is not accepted. Valid values: {listed}."),
    ))
}

pub(super) fn check_const(tree: &ParsedTree, id: NodeId, expected: &Value) -> Option<ValidationProblem> {
    if values_equal(expected, &tree.to_value(id)) {
        return None;
    }
    let node = tree.node(id);
    Some(ValidationProblem::error(
        node.offset,
        node.end(),
        ProblemCode::Const,
        format!("Value must be {expected}."),
    ))
}

pub(super) fn check_string(node: &ParsedNode, schema: &SchemaNode, out: &mut Vec<ValidationProblem>) {
    let value = node.as_str().unwrap_or_default();
    let length = value.chars().count();

    if let Some(min) = schema.min_length.filter(|min| length < *min) {
        out.push(ValidationProblem::error(
            node.offset,
            node.end(),
            ProblemCode::MinLength,
            format!("String is shorter than the minimum length of {min}."),
        ));
    }
    if let Some(max) = schema.max_length.filter(|max| length > *max) {
        out.push(ValidationProblem::error(
            node.offset,
            node.end(),
            ProblemCode::MaxLength,
            format!("String is longer than the maximum length of {max}."),
        ));
    }
    if let Some(pattern) = &schema.pattern {
        if !pattern.regex.is_match(value) {
            out.push(ValidationProblem::error(
                node.offset,
                node.end(),
                ProblemCode::Pattern,
                format!("String does not match the pattern of \"{}\".", pattern.source),
            ));
        }
    }
}

pub(super) fn check_number(node: &ParsedNode, schema: &SchemaNode, out: &mut Vec<ValidationProblem>) {
    let Some(value) = node.as_f64() else {
        return;
    };
    let mut push = |code, message: String| {
        out.push(ValidationProblem::error(node.offset, node.end(), code, message));
    };

    // a boolean flag turns the inclusive bound into an exclusive one
    let (minimum, exclusive_minimum) = bounds(schema.minimum, schema.exclusive_minimum);
    let (maximum, exclusive_maximum) = bounds(schema.maximum, schema.exclusive_maximum);

    if let Some(limit) = exclusive_minimum.filter(|limit| value <= *limit) {
        push(
            ProblemCode::ExclusiveMinimum,
            format!("Value is below the exclusive minimum of {limit}."),
        );
    }
    if let Some(limit) = minimum.filter(|limit| value < *limit) {
        push(
            ProblemCode::Minimum,
            format!("Value is below the minimum of {limit}."),
        );
    }
    if let Some(limit) = exclusive_maximum.filter(|limit| value >= *limit) {
        push(
            ProblemCode::ExclusiveMaximum,
            format!("Value is above the exclusive maximum of {limit}."),
        );
    }
    if let Some(limit) = maximum.filter(|limit| value > *limit) {
        push(
            ProblemCode::Maximum,
            format!("Value is above the maximum of {limit}."),
        );
    }
    if let Some(divisor) = schema.multiple_of {
        if !is_multiple_of(value, divisor) {
            push(
                ProblemCode::MultipleOf,
                format!("Value is not divisible by {divisor}."),
            );
        }
    }
}

/// `(inclusive, exclusive)` limits from a bound and its exclusive keyword.
fn bounds(inclusive: Option<f64>, exclusive: Option<ExclusiveBound>) -> (Option<f64>, Option<f64>) {
    match exclusive {
        Some(ExclusiveBound::Flag(true)) => (None, inclusive),
        Some(ExclusiveBound::Limit(limit)) => (inclusive, Some(limit)),
        Some(ExclusiveBound::Flag(false)) | None => (inclusive, None),
    }
}

/// Divisibility that survives binary fractions: `0.3` is a multiple of `0.1`.
pub(crate) fn is_multiple_of(value: f64, divisor: f64) -> bool {
    if divisor <= 0.0 {
        return true;
    }
    if divisor.fract() == 0.0 {
        return value % divisor == 0.0;
    }
    let scale = decimal_places(value).max(decimal_places(divisor));
    if scale <= MAX_SCALE {
        let factor = 10f64.powi(scale as i32);
        let scaled_value = (value * factor).round();
        let scaled_divisor = (divisor * factor).round();
        if scaled_value.abs() < SCALED_LIMIT && scaled_divisor.abs() < SCALED_LIMIT {
            let scaled_divisor = scaled_divisor as i128;
            return scaled_divisor != 0 && (scaled_value as i128) % scaled_divisor == 0;
        }
    }
    // out of exact range: accept a remainder within the value's rounding error
    let remainder = (value % divisor).abs();
    let tolerance = value.abs() * f64::EPSILON * 4.0;
    remainder <= tolerance || divisor - remainder <= tolerance
}

/// Digits after the decimal point in the shortest round-trip rendering.
fn decimal_places(n: f64) -> usize {
    let rendered = n.to_string();
    rendered
        .split_once('.')
        .map(|(_, fraction)| fraction.len())
        .unwrap_or(0)
}

/// JSON equality where `1` and `1.0` are the same number.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}
