//! 규칙 매칭 로직
//!
//! 레코드가 규칙에 매칭되려면 다음 두 조건을 모두 만족해야 합니다.
//! - 이벤트 ID 집합이 비어 있거나 레코드 ID가 집합에 포함됨
//! - 키워드 집합이 비어 있거나 레코드 텍스트가 키워드 하나 이상을 포함함 (대소문자 무시)
//!
//! 두 집합이 모두 빈 규칙은 매칭하지 않습니다.

use crate::record::EventRecord;

use super::types::RuleDefinition;

/// 소문자로 정규화된 이벤트 목록
///
/// 규칙마다 텍스트를 다시 소문자화하지 않도록 스캔당 한 번만 준비합니다.
pub struct PreparedEvents<'a> {
    records: &'a [EventRecord],
    lowered: Vec<String>,
}

impl<'a> PreparedEvents<'a> {
    pub fn new(records: &'a [EventRecord]) -> Self {
        Self {
            records,
            lowered: records.iter().map(|r| r.text.to_lowercase()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 규칙에 처음으로 매칭되는 레코드를 찾습니다.
    pub fn first_match(&self, rule: &RuleDefinition) -> Option<&'a EventRecord> {
        if rule.is_degenerate() {
            return None;
        }
        self.records
            .iter()
            .zip(&self.lowered)
            .find(|(record, text)| matches_fields(rule, record.event_id, text))
            .map(|(record, _)| record)
    }
}

/// 레코드 하나가 규칙에 매칭되는지 판단합니다.
pub fn matches(rule: &RuleDefinition, record: &EventRecord) -> bool {
    !rule.is_degenerate() && matches_fields(rule, record.event_id, &record.text.to_lowercase())
}

fn matches_fields(rule: &RuleDefinition, event_id: u32, lowered_text: &str) -> bool {
    let id_ok = rule.event_ids.is_empty() || rule.event_ids.contains(&event_id);
    id_ok
        && (rule.keywords.is_empty()
            || rule
                .keywords
                .iter()
                .any(|keyword| lowered_text.contains(keyword.as_str())))
}
