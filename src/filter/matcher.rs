use serde_json::Value;

use super::{FilterOp, FilterWhereInfo};

/// In-process evaluation of one condition. A missing field never matches.
pub(super) fn matches(condition: &FilterWhereInfo, document: &Value) -> bool {
    let Some(actual) = document.get(&condition.field) else {
        return false;
    };

    match &condition.op {
        FilterOp::Eq(expected) => values_equal(actual, expected),
        FilterOp::In(candidates) => candidates.iter().any(|c| values_equal(actual, c)),
    }
}

// Numbers compare by value so 5 and 5.0 are the same, like jsonb equality
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}
