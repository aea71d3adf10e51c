//! 규칙 파일 로더 -- Sigma YAML 규칙을 디스크에서 로드합니다.
//!
//! 규칙 디렉토리의 `.yml`/`.yaml` 파일을 이름순으로 정렬하여 최대 `max_rules`개를 읽습니다.
//! 파싱에 실패한 파일과 다른 플랫폼용 규칙은 에러 없이 건너뜁니다.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::config::HuntConfig;
use crate::error::HuntError;

use super::types::{RuleDefinition, RuleNode, targets_platform};

/// 규칙 파일 최대 크기
const MAX_RULE_FILE_SIZE: u64 = 1024 * 1024; // 1MB

/// 로딩 결과 요약
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    /// 읽기 대상 후보 파일 수 (상한 적용 후)
    pub candidates: usize,
    /// 파싱 실패 / 크기 초과로 건너뛴 파일 수
    pub unparsable: usize,
    /// 플랫폼 필터로 제외된 파일 수
    pub filtered: usize,
    /// 중복 ID로 제외된 파일 수
    pub duplicates: usize,
    /// 이벤트 ID와 키워드가 모두 없는 규칙 수 (매칭에서 제외)
    pub degenerate: usize,
}

/// 규칙 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// 설정에 따라 규칙 디렉토리를 로드합니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    pub async fn load_directory(
        config: &HuntConfig,
    ) -> Result<(Vec<RuleDefinition>, LoadSummary), HuntError> {
        let dir = config.rule_dir.as_path();
        let candidates = Self::candidates(dir, config.max_rules).await?;

        let mut summary = LoadSummary {
            candidates: candidates.len(),
            ..LoadSummary::default()
        };
        let mut rules = Vec::new();
        let mut seen_ids = HashSet::new();

        for path in candidates {
            let Some(doc) = Self::read_document(&path).await else {
                summary.unparsable += 1;
                continue;
            };

            if !targets_platform(&doc, &path, &config.platform, &config.filename_prefixes) {
                summary.filtered += 1;
                continue;
            }

            let Some(rule) = RuleDefinition::from_document(&doc, &path) else {
                summary.unparsable += 1;
                continue;
            };

            if !seen_ids.insert(rule.id.clone()) {
                tracing::warn!(
                    rule_id = %rule.id,
                    path = %path.display(),
                    "duplicate rule id, skipping"
                );
                summary.duplicates += 1;
                continue;
            }

            if rule.is_degenerate() {
                tracing::warn!(
                    rule_id = %rule.id,
                    path = %path.display(),
                    "rule has neither event ids nor keywords, it will never match"
                );
                summary.degenerate += 1;
            }

            rules.push(rule);
        }

        tracing::info!(
            dir = %dir.display(),
            count = rules.len(),
            candidates = summary.candidates,
            unparsable = summary.unparsable,
            filtered = summary.filtered,
            "loaded hunt rules"
        );

        Ok((rules, summary))
    }

    /// 이름순으로 정렬된 YAML 후보 파일 (최대 `cap`개)
    async fn candidates(dir: &Path, cap: usize) -> Result<Vec<PathBuf>, HuntError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| HuntError::RuleLoad {
                path: dir.display().to_string(),
                reason: format!("failed to read directory: {e}"),
            })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| HuntError::RuleLoad {
                path: dir.display().to_string(),
                reason: format!("failed to read directory entry: {e}"),
            })?
        {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if is_yaml {
                paths.push(path);
            }
        }

        paths.sort();
        paths.truncate(cap);
        Ok(paths)
    }

    /// 파일 하나를 YAML 트리로 읽습니다. 실패하면 `None`.
    async fn read_document(path: &Path) -> Option<RuleNode> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() && meta.len() <= MAX_RULE_FILE_SIZE => {}
            Ok(meta) => {
                tracing::debug!(
                    path = %path.display(),
                    size = meta.len(),
                    "rule file is not a regular file or too large, skipping"
                );
                return None;
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "failed to stat rule file, skipping");
                return None;
            }
        }

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "failed to read rule file, skipping");
                return None;
            }
        };

        Self::parse_yaml(&content)
    }

    /// YAML 문자열을 트리 노드로 파싱합니다. 실패하면 `None`.
    pub fn parse_yaml(yaml_str: &str) -> Option<RuleNode> {
        match serde_yaml::from_str::<Value>(yaml_str) {
            Ok(value) => Some(RuleNode::from_yaml(&value)),
            Err(e) => {
                tracing::debug!(error = %e, "failed to parse rule yaml, skipping");
                None
            }
        }
    }
}
