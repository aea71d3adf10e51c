//! 도메인 타입: 파일 메타데이터와 공통 열거형
//!
//! 배치 오케스트레이터와 탐지 모듈이 주고받는 파일 정보를 정의합니다.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::InputError;

/// 파일 유형 판별에 사용하는 선두 바이트 수
const HEADER_LEN: usize = 8;

/// 스크립트로 분류하는 확장자
const SCRIPT_EXTENSIONS: &[&str] = &["ps1", "bat", "cmd", "sh", "py", "js", "vbs"];

/// 심각도 레벨
///
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Info < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 정보성 이벤트
    #[default]
    Info,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다. Sigma의 `informational`도 허용합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "info" | "informational" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "Info"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// 파일 유형
///
/// 디스패처가 모듈 적용 여부를 결정하는 기준입니다.
/// 직렬화 시 `PE`, `EVTX`, `SCRIPT`, 대문자 확장자, `UNKNOWN` 문자열을 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileType {
    /// Windows 실행 파일 (`MZ` 헤더)
    Pe,
    /// Windows 이벤트 로그 (로그 유형 아티팩트)
    Evtx,
    /// 스크립트 파일
    Script,
    /// 기타 확장자 (대문자)
    Other(String),
    /// 확장자도 매직도 없음
    Unknown,
}

impl FileType {
    /// 선두 바이트와 확장자로 파일 유형을 판별합니다.
    pub fn detect(path: &Path, header: &[u8]) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if header.starts_with(b"MZ") {
            Self::Pe
        } else if header.starts_with(b"ElfFile") || ext == "evtx" {
            Self::Evtx
        } else if SCRIPT_EXTENSIONS.contains(&ext.as_str()) {
            Self::Script
        } else if !ext.is_empty() {
            Self::Other(ext.to_uppercase())
        } else {
            Self::Unknown
        }
    }

    /// 로그 유형 아티팩트 여부 (`dynamic` 모듈만 적용 가능)
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Evtx)
    }

    /// 표시용 레이블
    pub fn label(&self) -> &str {
        match self {
            Self::Pe => "PE",
            Self::Evtx => "EVTX",
            Self::Script => "SCRIPT",
            Self::Other(ext) => ext,
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for FileType {
    fn from(label: String) -> Self {
        match label.as_str() {
            "PE" => Self::Pe,
            "EVTX" => Self::Evtx,
            "SCRIPT" => Self::Script,
            "UNKNOWN" | "" => Self::Unknown,
            _ => Self::Other(label),
        }
    }
}

impl From<FileType> for String {
    fn from(file_type: FileType) -> Self {
        file_type.label().to_owned()
    }
}

/// 분석 대상 파일의 메타데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    /// 파일 ID (UUID v4)
    pub file_id: String,
    /// 파일 이름 (경로 제외)
    pub filename: String,
    /// 파일 경로
    pub path: PathBuf,
    /// 파일 유형
    pub file_type: FileType,
    /// 파일 크기 (바이트)
    pub size: u64,
    /// SHA-256 다이제스트 (hex)
    pub sha256: String,
}

impl FileMeta {
    /// 파일을 검사하여 메타데이터를 생성합니다.
    ///
    /// 존재하지 않거나, 읽을 수 없거나, `max_size`를 초과하는 파일은
    /// 디스패치 전에 [`InputError`]로 거부됩니다.
    pub async fn inspect(path: impl AsRef<Path>, max_size: u64) -> Result<Self, InputError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InputError::NotFound {
                    path: display.clone(),
                }
            } else {
                InputError::Unreadable {
                    path: display.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        if !metadata.is_file() {
            return Err(InputError::Unreadable {
                path: display,
                reason: "not a regular file".to_owned(),
            });
        }

        let size = metadata.len();
        if size > max_size {
            return Err(InputError::TooLarge {
                size,
                max: max_size,
            });
        }

        let unreadable = |e: std::io::Error| InputError::Unreadable {
            path: display.clone(),
            reason: e.to_string(),
        };

        let mut file = tokio::fs::File::open(path).await.map_err(unreadable)?;
        let mut hasher = Sha256::new();
        let mut header = Vec::with_capacity(HEADER_LEN);
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).await.map_err(unreadable)?;
            if n == 0 {
                break;
            }
            if header.len() < HEADER_LEN {
                let take = (HEADER_LEN - header.len()).min(n);
                header.extend_from_slice(&buf[..take]);
            }
            hasher.update(&buf[..n]);
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| display.clone());

        Ok(Self {
            file_id: uuid::Uuid::new_v4().to_string(),
            filename,
            path: path.to_path_buf(),
            file_type: FileType::detect(path, &header),
            size,
            sha256: hex::encode(hasher.finalize()),
        })
    }
}

/// 소수점 `places` 자리로 반올림합니다.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
