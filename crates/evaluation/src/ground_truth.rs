//! 정답 레이블 로더
//!
//! 업로드된 정답 레이블을 `이름 → 레이블(1 = 악성, 0 = 정상)` 맵으로 정규화합니다.
//! 아래 파서를 순서대로 시도하며, 각 파서는 독립적으로 테스트 가능한 순수 함수입니다.
//!
//! 1. [`parse_map`]: JSON 객체 `{"a.exe": 1, "b.exe": "0"}`
//! 2. [`parse_records`]: JSON 레코드 배열 `[{"filename": "a.exe", "label": "malicious"}]`
//! 3. [`parse_tabular`]: 헤더가 있는 CSV
//!
//! 해석할 수 없는 입력은 에러가 아니라 빈 맵이 됩니다.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::EvaluationError;

/// 이름 → 레이블 (1 = 악성, 0 = 정상)
pub type GroundTruthMap = BTreeMap<String, u8>;

const NAME_KEYS: [&str; 4] = ["name", "filename", "file", "sample"];
const LABEL_KEYS: [&str; 6] = ["label", "gt", "truth", "is_mal", "ismal", "is_malicious"];
const MALICIOUS_WORDS: [&str; 6] = ["1", "true", "malicious", "malware", "yes", "y"];
const BENIGN_WORDS: [&str; 6] = ["0", "false", "benign", "clean", "no", "n"];

/// 레이블 문자열을 0/1로 정규화합니다.
///
/// 알려진 단어가 아니면 숫자로 해석해 소수점 이하를 버린 값이 0보다 크면 1입니다.
/// 숫자도 아니면 `None`.
pub fn normalize_label(raw: &str) -> Option<u8> {
    let text = raw.trim().to_lowercase();
    if MALICIOUS_WORDS.contains(&text.as_str()) {
        return Some(1);
    }
    if BENIGN_WORDS.contains(&text.as_str()) {
        return Some(0);
    }
    let number: f64 = text.parse().ok()?;
    if !number.is_finite() {
        return None;
    }
    Some(u8::from(number.trunc() > 0.0))
}

fn is_name_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    NAME_KEYS.contains(&lower.as_str()) || lower.contains("file")
}

fn is_label_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    LABEL_KEYS.contains(&lower.as_str())
        || lower.contains("label")
        || lower.contains("mal")
        || key.contains("恶意")
}

fn label_of(value: &Value) -> Option<u8> {
    match value {
        Value::String(s) => normalize_label(s),
        Value::Bool(b) => Some(u8::from(*b)),
        Value::Number(n) => normalize_label(&n.to_string()),
        _ => None,
    }
}

fn name_of(value: &Value) -> Option<String> {
    let name = match value {
        Value::String(s) => s.trim().to_owned(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!name.is_empty()).then_some(name)
}

/// JSON 객체를 이름 → 레이블 맵으로 읽습니다.
///
/// 값의 문자열 표현이 숫자로만 이루어진 항목만 남기며, 0이 아닌 값은 1이 됩니다.
/// 객체가 아니면 `None`.
pub fn parse_map(value: &Value) -> Option<GroundTruthMap> {
    let object = value.as_object()?;
    let map = object
        .iter()
        .filter_map(|(name, label)| {
            let text = match label {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let label = u8::from(text.bytes().any(|b| b != b'0'));
            Some((name.clone(), label))
        })
        .collect();
    Some(map)
}

/// JSON 레코드 배열을 읽습니다.
///
/// 레코드마다 이름 필드와 레이블 필드를 키 이름으로 추정합니다.
/// 후보 키가 여럿이면 문서에 먼저 나온 키를 씁니다.
/// 배열이 아니면 `None`.
pub fn parse_records(value: &Value) -> Option<GroundTruthMap> {
    let items = value.as_array()?;
    let mut map = GroundTruthMap::new();
    for item in items {
        let Some(record) = item.as_object() else {
            continue;
        };
        let name_key = record.keys().find(|k| is_name_key(k));
        let label_key = record.keys().find(|k| is_label_key(k));
        let (Some(name_key), Some(label_key)) = (name_key, label_key) else {
            continue;
        };
        if let (Some(name), Some(label)) = (name_of(&record[name_key]), label_of(&record[label_key]))
        {
            map.insert(name, label);
        }
    }
    Some(map)
}

/// 헤더 행이 있는 CSV를 읽습니다.
///
/// 헤더에서 이름 / 레이블 열을 찾지 못하거나 CSV가 손상되었으면 `None`.
pub fn parse_tabular(text: &str) -> Option<GroundTruthMap> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers().ok()?.clone();
    let name_idx = headers.iter().position(is_name_key)?;
    let label_idx = headers.iter().position(is_label_key)?;

    let mut map = GroundTruthMap::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "malformed ground-truth table");
                return None;
            }
        };
        let (Some(name), Some(label)) = (record.get(name_idx), record.get(label_idx)) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        if let Some(label) = normalize_label(label) {
            map.insert(name.to_owned(), label);
        }
    }
    Some(map)
}

/// 정답 레이블 페이로드를 읽습니다. 실패하지 않습니다.
pub fn load_ground_truth(bytes: &[u8]) -> GroundTruthMap {
    if bytes.is_empty() {
        return GroundTruthMap::new();
    }
    let Ok(text) = std::str::from_utf8(bytes) else {
        debug!("ground truth is not valid utf-8");
        return GroundTruthMap::new();
    };
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let parsed = match serde_json::from_str::<Value>(text) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => {
            parse_map(&value).or_else(|| parse_records(&value))
        }
        _ => parse_tabular(text),
    };

    let map = parsed.unwrap_or_default();
    debug!(labels = map.len(), "ground truth loaded");
    map
}

/// 파일에서 정답 레이블을 읽습니다.
///
/// # Errors
/// 파일을 읽을 수 없으면 `EvaluationError::Io`. 내용 해석은 실패하지 않습니다.
pub async fn read_ground_truth_file(
    path: impl AsRef<Path>,
) -> Result<GroundTruthMap, EvaluationError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| EvaluationError::Io {
            path: path.display().to_string(),
            source,
        })?;
    Ok(load_ground_truth(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn normalize_known_words() {
        for word in ["1", "true", "Malicious", "MALWARE", " yes ", "y"] {
            assert_eq!(normalize_label(word), Some(1), "{word}");
        }
        for word in ["0", "false", "benign", "Clean", "no", "N"] {
            assert_eq!(normalize_label(word), Some(0), "{word}");
        }
    }

    #[test]
    fn normalize_numeric_fallback_truncates() {
        assert_eq!(normalize_label("2"), Some(1));
        assert_eq!(normalize_label("2.5"), Some(1));
        assert_eq!(normalize_label("0.7"), Some(0));
        assert_eq!(normalize_label("-3"), Some(0));
        assert_eq!(normalize_label("1e2"), Some(1));
    }

    #[test]
    fn normalize_rejects_other_text() {
        assert_eq!(normalize_label("suspicious"), None);
        assert_eq!(normalize_label(""), None);
        assert_eq!(normalize_label("nan"), None);
        assert_eq!(normalize_label("inf"), None);
    }

    #[test]
    fn map_keeps_only_digit_values() {
        let value = json!({"a.exe": 1, "b.exe": "0", "c.exe": "yes", "d.exe": true, "e.exe": 7, "f.exe": -1, "g.exe": 1.0});
        let map = parse_map(&value).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map["a.exe"], 1);
        assert_eq!(map["b.exe"], 0);
        assert_eq!(map["e.exe"], 1);
    }

    #[test]
    fn map_parser_ignores_arrays() {
        assert!(parse_map(&json!([1, 2])).is_none());
    }

    #[test]
    fn records_detect_name_and_label_keys() {
        let value = json!([
            {"FileName": "a.exe", "Label": "malicious"},
            {"sample": "b.exe", "is_mal": false},
            {"sample_file": "c.exe", "mal_flag": 1},
            {"name": "d.exe", "note": "no label"},
            {"name": "", "label": 1},
            {"name": "e.exe", "label": "unknown"},
            "not a record"
        ]);
        let map = parse_records(&value).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map["a.exe"], 1);
        assert_eq!(map["b.exe"], 0);
        assert_eq!(map["c.exe"], 1);
    }

    #[test]
    fn records_use_first_name_key_in_document_order() {
        let map = load_ground_truth(br#"[{"name":"a.exe","filepath":"/s/a.exe","label":1}]"#);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a.exe"), Some(&1));
        assert!(!map.contains_key("/s/a.exe"));
    }

    #[test]
    fn records_use_first_label_key_in_document_order() {
        // "malicious"가 "label"보다 먼저 나오므로 레이블은 "yes"
        let map = load_ground_truth(br#"[{"file":"a.exe","malicious":"yes","label":"0"}]"#);
        assert_eq!(map.get("a.exe"), Some(&1));

        let map = load_ground_truth(br#"[{"label":"0","malicious":"yes","file":"a.exe"}]"#);
        assert_eq!(map.get("a.exe"), Some(&0));
    }

    #[test]
    fn records_accept_domain_keyword_label() {
        let value = json!([{"file": "a.exe", "是否恶意": "是"}, {"file": "b.exe", "是否恶意": "1"}]);
        let map = parse_records(&value).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["b.exe"], 1);
    }

    #[test]
    fn tabular_with_header_detection() {
        let text = "sample,truth,comment\na.exe,malicious,x\nb.exe , benign ,y\nc.exe,??,z\nshort\n";
        let map = parse_tabular(text).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a.exe"], 1);
        assert_eq!(map["b.exe"], 0);
    }

    #[test]
    fn tabular_without_recognizable_header_is_none() {
        assert!(parse_tabular("a,b\n1,2\n").is_none());
    }

    #[test]
    fn load_tries_parsers_in_order() {
        let map = load_ground_truth(br#"{"a.exe": 1}"#);
        assert_eq!(map["a.exe"], 1);

        let map = load_ground_truth(br#"[{"filename": "a.exe", "label": "yes"}]"#);
        assert_eq!(map["a.exe"], 1);

        let map = load_ground_truth(b"filename,label\na.exe,0\n");
        assert_eq!(map["a.exe"], 0);
    }

    #[test]
    fn load_strips_byte_order_mark() {
        let map = load_ground_truth("\u{feff}filename,label\na.exe,1\n".as_bytes());
        assert_eq!(map["a.exe"], 1);
    }

    #[test]
    fn malformed_payloads_yield_empty_map() {
        assert!(load_ground_truth(b"").is_empty());
        assert!(load_ground_truth(&[0xff, 0xfe, 0x00]).is_empty());
        assert!(load_ground_truth(b"{not json").is_empty());
        assert!(load_ground_truth(b"42").is_empty());
        assert!(load_ground_truth(b"just some words").is_empty());
    }

    #[tokio::test]
    async fn read_missing_file_is_io_error() {
        let err = read_ground_truth_file("/nonexistent/maltrace/labels.csv")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("labels.csv"));
    }

    proptest! {
        #[test]
        fn integer_labels_follow_sign(n in -1_000_000i64..1_000_000) {
            let expected = u8::from(n > 0);
            prop_assert_eq!(normalize_label(&n.to_string()), Some(expected));
        }

        #[test]
        fn normalize_never_panics(s in ".*") {
            let label = normalize_label(&s);
            prop_assert!(label.is_none() || label == Some(0) || label == Some(1));
        }

        #[test]
        fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let map = load_ground_truth(&bytes);
            prop_assert!(map.values().all(|v| *v <= 1));
        }
    }
}
