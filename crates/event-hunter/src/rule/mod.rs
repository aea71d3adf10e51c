//! 헌팅 규칙 엔진 -- Sigma YAML 규칙 로딩 및 이벤트 매칭
//!
//! # 규칙 형식
//! ```yaml
//! title: Suspicious PowerShell Launch
//! id: 3b6ab547-8ec2-4991-b9d2-2b06702a48d7
//! level: high
//! logsource:
//!   product: windows
//! detection:
//!   selection:
//!     EventID: 4688
//!     NewProcessName|endswith: '\powershell.exe'
//!   condition: selection
//! ```
//!
//! `condition`은 해석하지 않습니다. 선택 절에서 이벤트 ID 집합과 키워드 집합만 추출하며,
//! 규칙마다 첫 번째로 매칭되는 이벤트 하나만 보고합니다.
//!
//! # 아키텍처
//! - [`HuntEngine`]: 로딩된 규칙 보관 및 스캔
//! - [`loader`]: 디렉토리 로딩, 상한 적용, 플랫폼 필터
//! - [`matcher`]: 이벤트 ID / 키워드 매칭
//! - [`types`]: 규칙 트리와 정의

pub mod loader;
pub mod matcher;
pub mod types;

pub use loader::{LoadSummary, RuleLoader};
pub use matcher::PreparedEvents;
pub use types::{RuleDefinition, RuleNode};

use std::path::PathBuf;

use maltrace_core::metrics as m;
use maltrace_core::outcome::MatchRecord;
use serde::Serialize;

use crate::config::HuntConfig;
use crate::error::HuntError;
use crate::record::EventRecord;

/// 스캔 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HuntReport {
    /// 매칭된 규칙 (규칙 로딩 순서)
    pub matches: Vec<MatchRecord>,
    /// 검사한 이벤트 수
    pub events_scanned: usize,
}

impl HuntReport {
    pub fn is_malicious(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// 헌팅 엔진
///
/// 규칙은 생성 시점에 한 번 로드되며 이후 변경되지 않습니다.
/// 규칙이 하나도 없으면 생성은 성공하고, 첫 [`scan`](Self::scan) 호출에서 에러를 반환합니다.
#[derive(Debug, Clone)]
pub struct HuntEngine {
    rules: Vec<RuleDefinition>,
    source: PathBuf,
    platform: String,
}

impl HuntEngine {
    /// 규칙 목록으로 엔진을 생성합니다.
    pub fn new(rules: Vec<RuleDefinition>) -> Self {
        Self {
            rules,
            source: PathBuf::new(),
            platform: String::new(),
        }
    }

    /// 규칙 디렉토리에서 엔진을 생성합니다.
    ///
    /// # Errors
    /// - 규칙 디렉토리를 읽을 수 없는 경우
    pub async fn load(config: &HuntConfig) -> Result<Self, HuntError> {
        let (rules, _) = RuleLoader::load_directory(config).await?;
        Ok(Self {
            rules,
            source: config.rule_dir.clone(),
            platform: config.platform.clone(),
        })
    }

    /// 로드된 규칙
    pub fn rules(&self) -> &[RuleDefinition] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// 이벤트 목록에 모든 규칙을 적용합니다.
    ///
    /// 규칙마다 첫 번째로 매칭되는 레코드만 보고합니다.
    ///
    /// # Errors
    /// - 로드된 규칙이 없는 경우 `HuntError::NoRules`
    pub fn scan(&self, events: &[EventRecord]) -> Result<HuntReport, HuntError> {
        if self.rules.is_empty() {
            return Err(HuntError::NoRules {
                path: self.source.display().to_string(),
                platform: self.platform.clone(),
            });
        }

        let prepared = PreparedEvents::new(events);
        let matches: Vec<MatchRecord> = self
            .rules
            .iter()
            .filter_map(|rule| {
                prepared.first_match(rule).map(|record| MatchRecord {
                    rule_id: rule.id.clone(),
                    title: rule.title.clone(),
                    severity: rule.severity,
                    event_id: Some(record.event_id),
                })
            })
            .collect();

        metrics::counter!(m::HUNT_EVENTS_SCANNED_TOTAL).increment(events.len() as u64);
        for hit in &matches {
            let severity = hit
                .severity
                .map_or_else(|| "none".to_owned(), |s| s.to_string().to_lowercase());
            metrics::counter!(m::HUNT_RULE_MATCHES_TOTAL, m::LABEL_SEVERITY => severity)
                .increment(1);
        }

        tracing::debug!(
            rules = self.rules.len(),
            events = events.len(),
            matched = matches.len(),
            "hunt scan finished"
        );

        Ok(HuntReport {
            matches,
            events_scanned: prepared.len(),
        })
    }
}
