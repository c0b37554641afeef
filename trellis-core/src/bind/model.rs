//! Two-way value bindings.
//!
//! The signal's value is written into a node property on every change, and
//! the node's own edit events write the property back into the signal. The
//! value read from the node is coerced to the runtime type of the signal's
//! current value, so a numeric field keeps holding numbers.

use std::sync::Arc;

use serde_json::{Number, Value};
use tracing::{debug, trace};

use super::text::TextContent;
use crate::host::{Event, ListenerId, NodeId, SharedTree};
use crate::reactive::{Signal, Subscription};

/// Coerce a value read from the host to the shape of `like`.
///
/// Returns `None` when `input` cannot be read as a number for a numeric
/// target; the signal is then left untouched.
pub fn coerce(input: &Value, like: &Value) -> Option<Value> {
    match like {
        Value::Number(_) => to_number(input),
        Value::Bool(_) => Some(Value::Bool(truthy(input))),
        Value::String(_) => Some(Value::String(input.to_text())),
        _ => Some(input.clone()),
    }
}

fn to_number(input: &Value) -> Option<Value> {
    match input {
        Value::Number(_) => Some(input.clone()),
        Value::Bool(b) => Some(Value::from(u8::from(*b))),
        Value::Null => Some(Value::from(0)),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Some(Value::from(0));
            }
            if let Ok(n) = s.parse::<i64>() {
                return Some(Value::from(n));
            }
            let n = s.parse::<f64>().ok().filter(|n| n.is_finite())?;
            if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                Some(Value::from(n as i64))
            } else {
                Number::from_f64(n).map(Value::Number)
            }
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn truthy(input: &Value) -> bool {
    match input {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !matches!(s.trim(), "" | "false" | "0" | "off"),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Bind `signal` two-way onto `property` of `node`.
///
/// Returns the subscription writing the signal into the node and the
/// listeners reading it back, one per event in `events`.
pub(crate) fn bind_model(
    tree: &SharedTree,
    node: NodeId,
    property: &str,
    signal: &Signal<Value>,
    events: &[String],
) -> (Subscription, Vec<ListenerId>) {
    let target = SharedTree::clone(tree);
    let name = property.to_string();
    let subscription = signal.observe(move |value: &Value| {
        if value.is_null() {
            target.remove_property(node, &name);
        } else {
            target.set_property(node, &name, value.clone());
        }
    });

    let listeners = events
        .iter()
        .map(|event| {
            let weak = Arc::downgrade(tree);
            let signal = signal.clone();
            let name = property.to_string();
            let listener = move |_: &Event| {
                let Some(tree) = weak.upgrade() else {
                    return;
                };
                let input = tree.property(node, &name).unwrap_or(Value::Null);
                match coerce(&input, &signal.get()) {
                    Some(value) => {
                        trace!(%node, property = %name, "model write-back");
                        signal.set(value);
                    }
                    None => debug!(%node, property = %name, %input, "model input not coercible, ignored"),
                }
            };
            tree.add_event_listener(node, event, Arc::new(listener))
        })
        .collect();

    (subscription, listeners)
}
