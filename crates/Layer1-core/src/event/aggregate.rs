//! Result Aggregator - 핸들러 결과의 축약
//!
//! (priority, sequence) 순으로 정렬된 `Outcome` 목록을 옵션에 따라
//! 호출자에게 보이는 단일 값으로 축약합니다.
//!
//! - single: 첫 번째 유효(truthy) 값
//! - list:   유효 값의 순서 보존 목록
//! - merge:  dict는 deep-merge, list는 이어붙이기 + 중복 제거

use serde_json::map::Entry;
use serde_json::{Map, Value};
use tracing::debug;

use super::sink::ErrorSink;
use super::types::{is_truthy, FireOptions, Outcome};

/// 정렬된 Outcome 목록을 옵션에 따라 축약
///
/// 실패한 Outcome은 집계 중 한 번씩 sink에 보고됩니다 (호출 시점 보고와
/// 중복 허용). 핸들러가 정확히 하나였고 single/merge가 모두 꺼져 있으면
/// 원본 값을 감싸지 않고 그대로 반환합니다.
pub(crate) fn aggregate(
    name: &str,
    outcomes: Vec<Outcome>,
    options: &FireOptions,
    sink: &dyn ErrorSink,
) -> Option<Value> {
    // Error reporting pass
    for outcome in &outcomes {
        if let Err(e) = &outcome.result {
            sink.report(name, e);
        }
    }

    if options.single && !options.merge {
        // 첫 번째 유효 값에서 멈춤. 성공했지만 falsy면 "비활성 핸들러"로 간주.
        for outcome in outcomes {
            if let Ok(value) = outcome.result {
                if is_truthy(&value) {
                    return Some(value);
                }
                debug!(event = name, "Assume disabled event handler");
            }
        }
        return None;
    }

    // 단일 핸들러 fast path - 성공이면 원본 값 그대로, 실패면 빈 목록
    // (핸들러 없음의 no-op과 구분되어야 함)
    if outcomes.len() == 1 && !options.single && !options.merge {
        return match outcomes.into_iter().next() {
            Some(Outcome { result: Ok(value), .. }) => Some(value),
            _ => Some(Value::Array(Vec::new())),
        };
    }

    let values: Vec<Value> = outcomes
        .into_iter()
        .filter_map(|o| o.result.ok())
        .filter(is_truthy)
        .collect();

    if options.merge && !values.is_empty() {
        return Some(merge_values(name, values));
    }

    Some(Value::Array(values))
}

/// 유효 값 목록의 merge 축약
///
/// 첫 번째 원소의 타입이 규칙을 결정합니다. dict도 list도 아니면
/// merge는 정의되지 않으며 목록이 그대로 반환됩니다.
fn merge_values(name: &str, values: Vec<Value>) -> Value {
    match values.first() {
        Some(Value::Object(_)) => {
            let mut merged = Map::new();
            for value in values {
                match value {
                    Value::Object(map) => merge_objects(&mut merged, map),
                    other => {
                        debug!(event = name, "Skipping non-dict result in dict merge: {}", other);
                    }
                }
            }
            Value::Object(merged)
        }
        Some(Value::Array(_)) => {
            let mut merged = Vec::new();
            for value in values {
                match value {
                    Value::Array(items) => merge_arrays(&mut merged, items),
                    other => {
                        debug!(event = name, "Skipping non-list result in list merge: {}", other);
                    }
                }
            }
            Value::Array(merged)
        }
        _ => Value::Array(values),
    }
}

/// dict deep-merge
///
/// `into`는 우선순위가 더 낮은(먼저 실행된) 핸들러들의 누적 결과이므로
/// 스칼라 충돌에서는 `into` 쪽이 이깁니다.
fn merge_objects(into: &mut Map<String, Value>, from: Map<String, Value>) {
    for (key, value) in from {
        match into.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => match (slot.get_mut(), value) {
                (Value::Object(existing), Value::Object(map)) => merge_objects(existing, map),
                (Value::Array(existing), Value::Array(items)) => merge_arrays(existing, items),
                // 타입 불일치/스칼라 충돌 - 낮은 priority가 이김 (덮어쓰지 않음)
                _ => {}
            },
        }
    }
}

/// list 이어붙이기 - 중복 원소는 첫 등장만 유지
fn merge_arrays(into: &mut Vec<Value>, from: Vec<Value>) {
    for item in from {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}
