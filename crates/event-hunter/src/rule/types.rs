//! 탐지 규칙 데이터 타입
//!
//! Sigma 문서는 스키마가 일정하지 않으므로 YAML 트리를 [`RuleNode`]로 옮긴 뒤
//! 일반적인 트리 탐색으로 이벤트 ID와 키워드를 추출합니다.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use maltrace_core::types::Severity;
use serde::Serialize;
use serde_yaml::Value;

use crate::record::parse_digits;

/// 선택 절로 취급하는 `detection` 키 접두어
const SELECTION_PREFIX: &str = "selection";

/// 키워드 목록 절
const KEYWORDS_KEY: &str = "keywords";

/// 이벤트 ID 필드 식별자 (소문자 비교)
const EVENT_ID_MARKER: &str = "eventid";

/// 규칙 문서의 트리 노드
#[derive(Debug, Clone, PartialEq)]
pub enum RuleNode {
    /// 문자열 리프
    Text(String),
    /// 숫자 / 불리언 리프 (텍스트 표현)
    Scalar(String),
    /// 시퀀스
    Sequence(Vec<RuleNode>),
    /// 매핑 (키 순서 유지)
    Mapping(Vec<(String, RuleNode)>),
    /// null
    Empty,
}

impl RuleNode {
    /// YAML 값을 트리 노드로 변환합니다.
    pub fn from_yaml(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s.clone()),
            Value::Number(n) => Self::Scalar(n.to_string()),
            Value::Bool(b) => Self::Scalar(b.to_string()),
            Value::Sequence(items) => Self::Sequence(items.iter().map(Self::from_yaml).collect()),
            Value::Mapping(map) => Self::Mapping(
                map.iter()
                    .map(|(k, v)| (key_text(k), Self::from_yaml(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Self::from_yaml(&tagged.value),
            Value::Null => Self::Empty,
        }
    }

    /// 모든 문자열 리프를 순서대로 수집합니다.
    pub fn collect_text<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Text(s) => out.push(s),
            Self::Sequence(items) => items.iter().for_each(|n| n.collect_text(out)),
            Self::Mapping(entries) => entries.iter().for_each(|(_, n)| n.collect_text(out)),
            Self::Scalar(_) | Self::Empty => {}
        }
    }

    /// `eventid`를 포함하는 키(대소문자 무시)의 숫자 값을 수집합니다.
    pub fn collect_event_ids(&self, out: &mut BTreeSet<u32>) {
        match self {
            Self::Mapping(entries) => {
                for (key, node) in entries {
                    if key.to_lowercase().contains(EVENT_ID_MARKER) {
                        node.collect_id_values(out);
                    }
                    node.collect_event_ids(out);
                }
            }
            Self::Sequence(items) => items.iter().for_each(|n| n.collect_event_ids(out)),
            Self::Text(_) | Self::Scalar(_) | Self::Empty => {}
        }
    }

    fn collect_id_values(&self, out: &mut BTreeSet<u32>) {
        match self {
            Self::Text(s) | Self::Scalar(s) => {
                if let Some(id) = parse_digits(s) {
                    out.insert(id);
                }
            }
            Self::Sequence(items) => items.iter().for_each(|n| n.collect_id_values(out)),
            Self::Mapping(_) | Self::Empty => {}
        }
    }

    /// 매핑에서 키로 자식 노드를 찾습니다.
    pub fn get(&self, key: &str) -> Option<&RuleNode> {
        match self {
            Self::Mapping(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, n)| n),
            _ => None,
        }
    }

    /// 문자열 / 스칼라 리프의 텍스트
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// 로딩이 끝난 탐지 규칙
///
/// 한 번 만들어지면 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleDefinition {
    /// 규칙 ID (문서에 없으면 파일 이름)
    pub id: String,
    /// 규칙 제목 (문서에 없으면 ID)
    pub title: String,
    /// 심각도 (`level` 필드)
    pub severity: Option<Severity>,
    /// 대상 이벤트 ID 집합 (비어 있을 수 있음)
    pub event_ids: BTreeSet<u32>,
    /// 소문자 키워드 집합 (비어 있을 수 있음, 처음 등장한 순서)
    pub keywords: Vec<String>,
    /// 원본 파일
    pub source: PathBuf,
}

impl RuleDefinition {
    /// 규칙 문서에서 정의를 만듭니다.
    ///
    /// 문서가 매핑이 아니면 `None`.
    pub fn from_document(doc: &RuleNode, source: &Path) -> Option<Self> {
        if !matches!(doc, RuleNode::Mapping(_)) {
            return None;
        }

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id = doc
            .get("id")
            .and_then(RuleNode::as_text)
            .filter(|s| !s.trim().is_empty())
            .map_or(stem, str::to_owned);
        let title = doc
            .get("title")
            .and_then(RuleNode::as_text)
            .filter(|s| !s.trim().is_empty())
            .map_or_else(|| id.clone(), str::to_owned);
        let severity = doc
            .get("level")
            .or_else(|| doc.get("severity"))
            .and_then(RuleNode::as_text)
            .and_then(Severity::from_str_loose);

        let mut event_ids = BTreeSet::new();
        let mut texts = Vec::new();
        for clause in selection_clauses(doc) {
            clause.collect_event_ids(&mut event_ids);
            clause.collect_text(&mut texts);
        }

        let mut keywords: Vec<String> = Vec::new();
        for text in texts {
            let lowered = text.to_lowercase();
            if !lowered.is_empty() && !keywords.contains(&lowered) {
                keywords.push(lowered);
            }
        }

        Some(Self {
            id,
            title,
            severity,
            event_ids,
            keywords,
            source: source.to_path_buf(),
        })
    }

    /// 이벤트 ID도 키워드도 없는 규칙
    ///
    /// 두 조건이 모두 공허하게 참이 되어 모든 이벤트에 매칭되므로 매칭에서 제외합니다.
    pub fn is_degenerate(&self) -> bool {
        self.event_ids.is_empty() && self.keywords.is_empty()
    }
}

/// `detection` 아래의 선택 절 (`selection*`, `keywords`)
fn selection_clauses(doc: &RuleNode) -> Vec<&RuleNode> {
    match doc.get("detection") {
        Some(RuleNode::Mapping(entries)) => entries
            .iter()
            .filter(|(key, _)| {
                let key = key.to_lowercase();
                key.starts_with(SELECTION_PREFIX) || key == KEYWORDS_KEY
            })
            .map(|(_, node)| node)
            .collect(),
        _ => Vec::new(),
    }
}

/// 규칙이 대상 플랫폼을 참조하는지 판단합니다.
///
/// `logsource.product` / `logsource.service`에 플랫폼 이름이 들어 있거나,
/// 파일 이름이 플랫폼 이름을 포함하거나 접두어 규칙을 따르면 참입니다.
pub fn targets_platform(doc: &RuleNode, source: &Path, platform: &str, prefixes: &[String]) -> bool {
    if let Some(logsource) = doc.get("logsource") {
        let declared = ["product", "service"]
            .iter()
            .filter_map(|field| logsource.get(field).and_then(RuleNode::as_text))
            .any(|value| value.to_lowercase().contains(platform));
        if declared {
            return true;
        }
    }

    let filename = source
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    filename.contains(platform) || prefixes.iter().any(|p| filename.starts_with(p.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> RuleNode {
        RuleNode::from_yaml(&serde_yaml::from_str::<Value>(yaml).unwrap())
    }

    const PROCESS_RULE: &str = r#"
title: Suspicious PowerShell Launch
id: 3b6ab547-8ec2-4991-b9d2-2b06702a48d7
level: high
logsource:
  product: windows
  category: process_creation
detection:
  selection_img:
    EventID: 4688
    NewProcessName|endswith:
      - '\powershell.exe'
      - '\pwsh.exe'
  selection_cli:
    CommandLine|contains: '-EncodedCommand'
  filter:
    User: SYSTEM
  condition: all of selection_* and not filter
"#;

    #[test]
    fn extracts_event_ids_and_keywords_from_selection_only() {
        let rule = RuleDefinition::from_document(&doc(PROCESS_RULE), Path::new("win_ps.yml")).unwrap();
        assert_eq!(rule.id, "3b6ab547-8ec2-4991-b9d2-2b06702a48d7");
        assert_eq!(rule.title, "Suspicious PowerShell Launch");
        assert_eq!(rule.severity, Some(Severity::High));
        assert_eq!(rule.event_ids.iter().copied().collect::<Vec<_>>(), vec![4688]);
        assert_eq!(
            rule.keywords,
            vec!["\\powershell.exe", "\\pwsh.exe", "-encodedcommand"]
        );
        // filter / condition은 선택 절이 아님
        assert!(!rule.keywords.iter().any(|k| k == "system"));
    }

    #[test]
    fn event_id_key_is_case_insensitive_and_accepts_lists() {
        let rule = RuleDefinition::from_document(
            &doc(
                r#"
title: Service Install
detection:
  selection:
    eventId|contains:
      - 7045
      - '4697'
      - 'n/a'
  condition: selection
"#,
            ),
            Path::new("win_service.yml"),
        )
        .unwrap();
        assert_eq!(
            rule.event_ids.iter().copied().collect::<Vec<_>>(),
            vec![4697, 7045]
        );
        // 문자열 리프는 이벤트 ID 필드 안에 있어도 키워드로 수집됨
        assert_eq!(rule.keywords, vec!["4697", "n/a"]);
    }

    #[test]
    fn keywords_clause_is_a_selection() {
        let rule = RuleDefinition::from_document(
            &doc(
                r#"
title: Mimikatz Strings
detection:
  keywords:
    - 'sekurlsa::logonpasswords'
    - 'MIMIKATZ'
  condition: keywords
"#,
            ),
            Path::new("win_mimikatz.yml"),
        )
        .unwrap();
        assert!(rule.event_ids.is_empty());
        assert_eq!(rule.keywords, vec!["sekurlsa::logonpasswords", "mimikatz"]);
    }

    #[test]
    fn missing_id_and_title_fall_back_to_file_stem() {
        let rule = RuleDefinition::from_document(
            &doc("detection:\n  selection:\n    EventID: 1102\n"),
            Path::new("rules/win_log_cleared.yml"),
        )
        .unwrap();
        assert_eq!(rule.id, "win_log_cleared");
        assert_eq!(rule.title, "win_log_cleared");
        assert_eq!(rule.severity, None);
        assert!(rule.keywords.is_empty());
    }

    #[test]
    fn rule_without_selection_is_degenerate() {
        let rule = RuleDefinition::from_document(
            &doc("title: Empty\ndetection:\n  condition: selection\n"),
            Path::new("win_empty.yml"),
        )
        .unwrap();
        assert!(rule.is_degenerate());
    }

    #[test]
    fn non_mapping_document_is_rejected() {
        assert!(RuleDefinition::from_document(&doc("- a\n- b\n"), Path::new("x.yml")).is_none());
    }

    #[test]
    fn platform_from_logsource() {
        let node = doc("logsource:\n  product: Windows\n");
        assert!(targets_platform(&node, Path::new("proc.yml"), "windows", &[]));

        let node = doc("logsource:\n  product: linux\n");
        assert!(!targets_platform(&node, Path::new("proc.yml"), "windows", &[]));
    }

    #[test]
    fn platform_from_service_field() {
        let node = doc("logsource:\n  service: windows-defender\n");
        assert!(targets_platform(&node, Path::new("av.yml"), "windows", &[]));
    }

    #[test]
    fn platform_from_filename_convention() {
        let node = doc("title: x\n");
        let prefixes = vec!["win_".to_owned()];
        assert!(targets_platform(&node, Path::new("WIN_susp.yml"), "windows", &prefixes));
        assert!(targets_platform(&node, Path::new("proc_windows_x.yml"), "windows", &[]));
        assert!(!targets_platform(&node, Path::new("lnx_susp.yml"), "windows", &prefixes));
    }
}
