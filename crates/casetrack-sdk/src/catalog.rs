//! 阶段目录 - 案件 15 个阶段及各阶段讲解视频的静态描述
//!
//! 目录是不可变配置数据，由宿主应用注入（或使用内置默认目录）。
//! 已观看集合的"视频属于其所在阶段"约束依赖此目录做成员校验。

use serde::{Deserialize, Serialize};

use crate::error::{CasetrackSDKError, Result};
use crate::i18n::Language;

/// 案件阶段号的合法区间
pub const PHASE_MIN: u8 = 1;
pub const PHASE_MAX: u8 = 15;

/// 阶段号是否在 1..=15 内
pub fn is_valid_phase(phase_number: u8) -> bool {
    (PHASE_MIN..=PHASE_MAX).contains(&phase_number)
}

/// 目录校验错误
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("阶段号越界: {0}")]
    PhaseOutOfRange(u8),

    #[error("阶段号重复: {0}")]
    DuplicatePhase(u8),
}

impl From<CatalogError> for CasetrackSDKError {
    fn from(error: CatalogError) -> Self {
        CasetrackSDKError::Config(error.to_string())
    }
}

/// 双语文案（en/es）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Localized {
    pub en: String,
    pub es: String,
}

impl Localized {
    pub fn new(en: impl Into<String>, es: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            es: es.into(),
        }
    }

    pub fn get(&self, language: Language) -> &str {
        match language {
            Language::En => &self.en,
            Language::Es => &self.es,
        }
    }
}

/// 讲解视频条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoItem {
    /// 视频 ID（进度记录的主键，跨端一致）
    pub id: String,
    pub title: Localized,
    /// 嵌入播放地址（Loom embed URL）
    pub embed_url: Localized,
    pub summary: Localized,
}

/// 阶段描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseInfo {
    /// 阶段号（1..=15）
    pub number: u8,
    pub title: Localized,
    /// 进度条用的短标题
    pub short_title: Localized,
    /// 抽屉导航的图标名
    pub icon: String,
    pub description: Localized,
    /// 本阶段的讲解视频（内容由宿主应用按需配置，可为空）
    pub videos: Vec<VideoItem>,
}

/// 阶段目录
#[derive(Debug, Clone)]
pub struct PhaseCatalog {
    phases: Vec<PhaseInfo>,
}

impl PhaseCatalog {
    /// 从阶段列表构造目录；校验阶段号在区间内且不重复
    pub fn new(phases: Vec<PhaseInfo>) -> Result<Self> {
        let mut seen = [false; (PHASE_MAX as usize) + 1];
        for phase in &phases {
            if !is_valid_phase(phase.number) {
                return Err(CatalogError::PhaseOutOfRange(phase.number).into());
            }
            if seen[phase.number as usize] {
                return Err(CatalogError::DuplicatePhase(phase.number).into());
            }
            seen[phase.number as usize] = true;
        }
        Ok(Self { phases })
    }

    /// 按阶段号查找
    pub fn phase(&self, phase_number: u8) -> Option<&PhaseInfo> {
        self.phases.iter().find(|p| p.number == phase_number)
    }

    /// 所有阶段（按配置顺序）
    pub fn phases(&self) -> &[PhaseInfo] {
        &self.phases
    }

    /// 某阶段的视频总数；阶段未配置时为 0
    pub fn total_videos(&self, phase_number: u8) -> usize {
        self.phase(phase_number)
            .map(|p| p.videos.len())
            .unwrap_or(0)
    }

    /// 视频是否属于该阶段的已知视频列表
    pub fn contains_video(&self, phase_number: u8, video_id: &str) -> bool {
        self.phase(phase_number)
            .map(|p| p.videos.iter().any(|v| v.id == video_id))
            .unwrap_or(false)
    }
}

impl Default for PhaseCatalog {
    /// 门户默认目录：15 个阶段的标题/短标题/图标，阶段 1 附带
    /// 两条入案介绍视频；其余阶段的视频内容由宿主应用配置。
    fn default() -> Self {
        // (号, en 标题, es 标题, en 短标题, es 短标题, 图标)
        const PHASES: &[(u8, &str, &str, &str, &str, &str)] = &[
            (1, "Phase 1: Investigation", "Fase 1: Investigación", "Investigation", "Investigación", "search-outline"),
            (2, "Phase 2: Property Damage", "Fase 2: Daños a la Propiedad", "Property Damage", "Daños Propiedad", "car-outline"),
            (3, "Phase 3: Treatment", "Fase 3: Tratamiento", "Treatment", "Tratamiento", "medical-outline"),
            (4, "Phase 4: Demand Preparation", "Fase 4: Preparación de Demanda", "Demand Prep", "Prep Demanda", "document-text-outline"),
            (5, "Phase 5: Negotiation and Insurance", "Fase 5: Negociación y Seguro", "Negotiation", "Negociación", "cash-outline"),
            (6, "Phase 6: Case Transfer to Litigation", "Fase 6: Transferencia del Caso a Litigio", "Litigation", "Litigio", "swap-horizontal-outline"),
            (7, "Phase 7: Lawsuit Filed", "Fase 7: Demanda Presentada", "Lawsuit Filed", "Demanda", "document-attach-outline"),
            (8, "Phase 8: Discovery", "Fase 8: Descubrimiento", "Discovery", "Descubrimiento", "document-attach-outline"),
            (9, "Phase 9: Depositions", "Fase 9: Deposiciones", "Depositions", "Deposiciones", "mic-outline"),
            (10, "Phase 10: Mediation", "Fase 10: Mediación", "Mediation", "Mediación", "people-outline"),
            (11, "Phase 11: Trial Preparation", "Fase 11: Preparación del Juicio", "Trial Prep", "Prep Juicio", "briefcase-outline"),
            (12, "Phase 12: Appeal", "Fase 12: Apelación", "Appeal", "Apelación", "arrow-up-circle-outline"),
            (13, "Phase 13: Subrogations and Liens", "Fase 13: Subrogaciones y Gravámenes", "Subrogations", "Subrogaciones", "link-outline"),
            (14, "Phase 14: Payoff", "Fase 14: Liquidación", "Payoff", "Liquidación", "card-outline"),
            (15, "Phase 15: Closing the File", "Fase 15: Cierre del Expediente", "Closing", "Cierre", "checkmark-done-outline"),
        ];

        let phases = PHASES
            .iter()
            .map(|&(number, en, es, short_en, short_es, icon)| PhaseInfo {
                number,
                title: Localized::new(en, es),
                short_title: Localized::new(short_en, short_es),
                icon: icon.to_string(),
                description: Localized::new(
                    format!(
                        "Watch these videos to understand the {} phase of your case.",
                        short_en
                    ),
                    format!(
                        "Vea estos videos para comprender la fase de {} de su caso.",
                        short_es
                    ),
                ),
                videos: if number == 1 {
                    intake_videos()
                } else {
                    Vec::new()
                },
            })
            .collect();

        Self { phases }
    }
}

/// 阶段 1（入案）的讲解视频
fn intake_videos() -> Vec<VideoItem> {
    vec![
        VideoItem {
            id: "phase1_video_1".to_string(),
            title: Localized::new(
                "Understanding the Intake Process",
                "Comprendiendo el Proceso de Admisión",
            ),
            embed_url: Localized::new(
                "https://www.loom.com/embed/7f1c9f9542f74288b49ac530f1656869?sid=e29cf8c0-76a1-479d-8908-0d1b0b8cd75c",
                "https://www.loom.com/embed/SPANISH_VIDEO_ID?sid=SESSION_ID",
            ),
            summary: Localized::new(
                "In this video, we cover the initial intake process, what documents you'll need to prepare, and what to expect during your first consultation with our legal team.",
                "En este video, cubrimos el proceso inicial de admisión, qué documentos necesitará preparar y qué esperar durante su primera consulta con nuestro equipo legal.",
            ),
        },
        VideoItem {
            id: "phase1_video_2".to_string(),
            title: Localized::new("Required Documentation", "Documentación Requerida"),
            embed_url: Localized::new(
                "https://www.loom.com/embed/ENGLISH_VIDEO_ID_2?sid=SESSION_ID",
                "https://www.loom.com/embed/SPANISH_VIDEO_ID_2?sid=SESSION_ID",
            ),
            summary: Localized::new(
                "Learn about all the essential documents required for your case, including identification, financial records, and relevant correspondence.",
                "Aprenda sobre todos los documentos esenciales requeridos para su caso, incluyendo identificación, registros financieros y correspondencia relevante.",
            ),
        },
    ]
}
