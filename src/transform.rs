//! Pure payload transformations applied between the order fetch and the
//! order push. No I/O happens here; callers log around these functions.

use serde_json::{Map, Value};
use thiserror::Error;

/// Keys that must never be sent back upstream, at any nesting depth.
pub const REDACTED_KEYS: [&str; 4] = [
    "planning",
    "order_planning2",
    "order_planning3",
    "order_planning4",
];

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("no movements found in payload (top-level keys: {keys:?})")]
    MovementsNotFound { keys: Vec<String> },
}

#[derive(Debug, Clone, Copy)]
enum StopTarget {
    First,
    Last,
}

#[derive(Debug, Clone, Copy)]
enum StopTimestamp {
    Arrival,
    Departure,
}

#[derive(Debug, Clone, Copy)]
struct StopWrite {
    target: StopTarget,
    status: &'static str,
    timestamp: StopTimestamp,
}

/// One row of the brokerage-status mapping table. `None` fields are left
/// untouched in the payload.
#[derive(Debug, Clone, Copy)]
struct StatusRule {
    message_status: Option<&'static str>,
    movement_brokerage_status: &'static str,
    movement_status: Option<&'static str>,
    stop: Option<StopWrite>,
}

fn rule_for(code: &str) -> Option<StatusRule> {
    match code {
        "ARVDSHPPER" | "ARVDSHPR" => Some(StatusRule {
            message_status: Some("P"),
            movement_brokerage_status: "ARVDSHPR",
            movement_status: Some("P"),
            stop: Some(StopWrite {
                target: StopTarget::First,
                status: "A",
                timestamp: StopTimestamp::Arrival,
            }),
        }),
        "ENROUTE" => Some(StatusRule {
            message_status: Some("P"),
            movement_brokerage_status: "ENROUTE",
            movement_status: Some("P"),
            stop: Some(StopWrite {
                target: StopTarget::First,
                status: "D",
                timestamp: StopTimestamp::Departure,
            }),
        }),
        "ARVDCNSG" => Some(StatusRule {
            message_status: Some("P"),
            movement_brokerage_status: "ARVDCNSG",
            movement_status: Some("P"),
            stop: Some(StopWrite {
                target: StopTarget::Last,
                status: "A",
                timestamp: StopTimestamp::Arrival,
            }),
        }),
        "DELIVER" => Some(StatusRule {
            message_status: Some("D"),
            movement_brokerage_status: "DELIVER",
            movement_status: Some("D"),
            stop: Some(StopWrite {
                target: StopTarget::Last,
                status: "D",
                timestamp: StopTimestamp::Departure,
            }),
        }),
        // Breakdown only normalizes the reported code; order and movement
        // statuses keep whatever the upstream last wrote.
        "BREAKDWN" => Some(StatusRule {
            message_status: None,
            movement_brokerage_status: "BREAKDWN",
            movement_status: None,
            stop: None,
        }),
        _ => None,
    }
}

/// The normalized (trimmed, uppercased) brokerage status of the first
/// movement under `message`, if the payload has one.
pub fn first_movement_code(payload: &Value) -> Option<String> {
    let code = payload
        .get("message")?
        .as_object()?
        .get("movements")?
        .as_array()?
        .first()?
        .as_object()?
        .get("brokerage_status")?
        .as_str()?;
    Some(code.trim().to_uppercase())
}

/// Derives the payload to push upstream from a freshly fetched order.
///
/// The input is never mutated; all writes land in a clone. Rule selection
/// hinges entirely on the first movement's `brokerage_status`: no movement,
/// no rule, no status or stop writes. Redaction is applied on every path,
/// including unrecognized codes and payloads with no `message` at all.
pub fn apply_status_mapping(
    payload: &Value,
    arrival: Option<&str>,
    departure: Option<&str>,
) -> Value {
    let mut updated = payload.clone();

    if let Some(rule) = first_movement_code(&updated).and_then(|code| rule_for(&code)) {
        apply_rule(&mut updated, &rule, arrival, departure);
    }

    strip_planning_fields(&mut updated);
    updated
}

fn apply_rule(payload: &mut Value, rule: &StatusRule, arrival: Option<&str>, departure: Option<&str>) {
    let Some(message) = payload.get_mut("message").and_then(Value::as_object_mut) else {
        return;
    };

    if let Some(status) = rule.message_status {
        message.insert("status".to_string(), Value::from(status));
    }

    if let Some(movement) = message
        .get_mut("movements")
        .and_then(Value::as_array_mut)
        .and_then(|movements| movements.first_mut())
        .and_then(Value::as_object_mut)
    {
        movement.insert(
            "brokerage_status".to_string(),
            Value::from(rule.movement_brokerage_status),
        );
        if let Some(status) = rule.movement_status {
            movement.insert("status".to_string(), Value::from(status));
        }
    }

    let Some(stop_write) = rule.stop else {
        return;
    };

    // Empty or missing stops skips only the stop writes; the message and
    // movement writes above stand.
    let stop = message
        .get_mut("stops")
        .and_then(Value::as_array_mut)
        .and_then(|stops| match stop_write.target {
            StopTarget::First => stops.first_mut(),
            StopTarget::Last => stops.last_mut(),
        })
        .and_then(Value::as_object_mut);
    let Some(stop) = stop else {
        return;
    };

    stop.insert("status".to_string(), Value::from(stop_write.status));

    let (field, value) = match stop_write.timestamp {
        StopTimestamp::Arrival => ("actual_arrival", arrival),
        StopTimestamp::Departure => ("actual_departure", departure),
    };
    if let Some(value) = value {
        stop.insert(field.to_string(), Value::from(value));
    }
}

/// Overwrites `movements[0].brokerage_status` with an explicit value, in a
/// clone. `movements` is located at the payload top level first, then under
/// `message`; its first element must be a mapping.
pub fn overwrite_brokerage_status(
    payload: &Value,
    new_status: &str,
) -> Result<Value, TransformError> {
    let mut updated = payload.clone();

    let target = if has_first_movement(&updated) {
        Some(&mut updated)
    } else if updated.get("message").is_some_and(has_first_movement) {
        updated.get_mut("message")
    } else {
        None
    };

    match target.and_then(first_movement_slot) {
        Some(movement) => {
            movement.insert("brokerage_status".to_string(), Value::from(new_status));
        }
        None => {
            return Err(TransformError::MovementsNotFound {
                keys: top_level_keys(payload),
            });
        }
    }

    strip_planning_fields(&mut updated);
    Ok(updated)
}

fn has_first_movement(container: &Value) -> bool {
    container
        .get("movements")
        .and_then(Value::as_array)
        .and_then(|movements| movements.first())
        .is_some_and(Value::is_object)
}

fn first_movement_slot(container: &mut Value) -> Option<&mut Map<String, Value>> {
    container
        .get_mut("movements")?
        .as_array_mut()?
        .first_mut()?
        .as_object_mut()
}

fn top_level_keys(payload: &Value) -> Vec<String> {
    payload
        .as_object()
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

/// Removes every occurrence of the redacted keys, recursively. Mappings are
/// filtered; sequences are walked but not filtered themselves. Idempotent.
pub fn strip_planning_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !REDACTED_KEYS.contains(&key.as_str()));
            for child in map.values_mut() {
                strip_planning_fields(child);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                strip_planning_fields(item);
            }
        }
        _ => {}
    }
}
