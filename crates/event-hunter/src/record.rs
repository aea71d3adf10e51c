//! 이벤트 레코드 -- 로그 변환 도구 출력을 매칭 가능한 형태로 정규화합니다.
//!
//! 변환 도구는 이벤트 하나를 중첩된 JSON 객체로 내보냅니다.
//! 매칭에 필요한 것은 정수 이벤트 ID와 모든 스칼라 필드를 이어 붙인 텍스트뿐입니다.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 변환 도구가 이벤트 목록을 감싸는 데 쓰는 키
const WRAPPER_KEYS: &[&str] = &["events", "records", "results", "data"];

/// 이벤트 ID 래퍼 객체에서 값을 담는 키
const ID_VALUE_KEYS: &[&str] = &["#text", "Value", "value"];

/// 로그 이벤트 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// 이벤트 ID
    pub event_id: u32,
    /// 구조화 필드를 공백으로 이어 붙인 텍스트
    pub text: String,
}

impl EventRecord {
    pub fn new(event_id: u32, text: impl Into<String>) -> Self {
        Self {
            event_id,
            text: text.into(),
        }
    }

    /// JSON 이벤트 하나를 레코드로 변환합니다.
    ///
    /// 이벤트 ID를 찾을 수 없으면 `None`을 반환합니다.
    pub fn from_json(value: &Value) -> Option<Self> {
        let event_id = find_event_id(value)?;
        let mut parts = Vec::new();
        collect_scalars(value, &mut parts);
        Some(Self {
            event_id,
            text: parts.join(" "),
        })
    }
}

/// 변환 도구의 출력 전체를 레코드 목록으로 변환합니다.
///
/// 지원 형식 (순서대로 시도):
/// 1. JSON 배열
/// 2. `events` / `records` 등 목록을 담은 JSON 객체, 또는 단일 이벤트 객체
/// 3. JSON Lines (해석 불가능한 줄은 건너뜀)
pub fn parse_records(output: &str) -> Vec<EventRecord> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        match value {
            Value::Array(items) => return items.iter().filter_map(EventRecord::from_json).collect(),
            Value::Object(ref map) => {
                for key in WRAPPER_KEYS {
                    if let Some(Value::Array(items)) = map.get(*key) {
                        return items.iter().filter_map(EventRecord::from_json).collect();
                    }
                }
                return EventRecord::from_json(&value).into_iter().collect();
            }
            _ => return Vec::new(),
        }
    }

    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|value| EventRecord::from_json(&value))
        .collect()
}

/// 깊이 우선, 필드 순서대로 첫 번째 `EventID` 키를 찾아 정수로 변환합니다.
fn find_event_id(value: &Value) -> Option<u32> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key.eq_ignore_ascii_case("eventid") {
                    if let Some(id) = event_id_value(child) {
                        return Some(id);
                    }
                }
            }
            map.values().find_map(find_event_id)
        }
        Value::Array(items) => items.iter().find_map(find_event_id),
        _ => None,
    }
}

fn event_id_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => parse_digits(s),
        Value::Object(map) => ID_VALUE_KEYS
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(event_id_value),
        _ => None,
    }
}

/// 숫자로만 이루어진 문자열을 `u32`로 변환합니다.
pub(crate) fn parse_digits(s: &str) -> Option<u32> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn collect_scalars(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.is_empty() => out.push(s.clone()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(b) => out.push(b.to_string()),
        Value::Array(items) => items.iter().for_each(|v| collect_scalars(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_scalars(v, out)),
        _ => {}
    }
}
