//! 本地化模块
//!
//! 翻译表作为不可变配置数据注入 [`Localizer`]，不做模块级全局状态。
//! 查找失败时回退为键本身，便于界面直接显示缺失的键。

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// 界面语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
}

impl Default for Language {
    fn default() -> Self {
        Language::En
    }
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 语言 → (键 → 译文)
pub type TranslationTable = HashMap<Language, HashMap<String, String>>;

/// 本地化器
///
/// 当前语言可在运行时切换；翻译表构造后不可变。
pub struct Localizer {
    language: RwLock<Language>,
    tables: TranslationTable,
}

impl Localizer {
    pub fn new(tables: TranslationTable, language: Language) -> Self {
        Self {
            language: RwLock::new(language),
            tables,
        }
    }

    /// 当前语言
    pub fn language(&self) -> Language {
        *self.language.read()
    }

    /// 切换语言；返回旧语言
    pub fn set_language(&self, language: Language) -> Language {
        let mut current = self.language.write();
        std::mem::replace(&mut *current, language)
    }

    /// 按当前语言查找译文；找不到时回退为键本身
    pub fn t(&self, key: &str) -> String {
        let language = self.language();
        self.tables
            .get(&language)
            .and_then(|table| table.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

/// 门户默认翻译表（en/es）
///
/// 键空间：`phase.dashboard`、`phase.<N>`、`phase.short.<N>`、
/// `progress.of`、`video.summary`。
pub fn default_tables() -> TranslationTable {
    // (键, en, es)
    const ENTRIES: &[(&str, &str, &str)] = &[
        ("phase.dashboard", "Dashboard", "Panel de Control"),
        ("phase.1", "Phase 1: Investigation", "Fase 1: Investigación"),
        ("phase.2", "Phase 2: Property Damage", "Fase 2: Daños a la Propiedad"),
        ("phase.3", "Phase 3: Treatment", "Fase 3: Tratamiento"),
        ("phase.4", "Phase 4: Demand Preparation", "Fase 4: Preparación de Demanda"),
        ("phase.5", "Phase 5: Negotiation and Insurance", "Fase 5: Negociación y Seguro"),
        ("phase.6", "Phase 6: Case Transfer to Litigation", "Fase 6: Transferencia del Caso a Litigio"),
        ("phase.7", "Phase 7: Lawsuit Filed", "Fase 7: Demanda Presentada"),
        ("phase.8", "Phase 8: Discovery", "Fase 8: Descubrimiento"),
        ("phase.9", "Phase 9: Depositions", "Fase 9: Deposiciones"),
        ("phase.10", "Phase 10: Mediation", "Fase 10: Mediación"),
        ("phase.11", "Phase 11: Trial Preparation", "Fase 11: Preparación del Juicio"),
        ("phase.12", "Phase 12: Appeal", "Fase 12: Apelación"),
        ("phase.13", "Phase 13: Subrogations and Liens", "Fase 13: Subrogaciones y Gravámenes"),
        ("phase.14", "Phase 14: Payoff", "Fase 14: Liquidación"),
        ("phase.15", "Phase 15: Closing the File", "Fase 15: Cierre del Expediente"),
        ("phase.short.1", "Investigation", "Investigación"),
        ("phase.short.2", "Property Damage", "Daños Propiedad"),
        ("phase.short.3", "Treatment", "Tratamiento"),
        ("phase.short.4", "Demand Prep", "Prep Demanda"),
        ("phase.short.5", "Negotiation", "Negociación"),
        ("phase.short.6", "Litigation", "Litigio"),
        ("phase.short.7", "Lawsuit Filed", "Demanda"),
        ("phase.short.8", "Discovery", "Descubrimiento"),
        ("phase.short.9", "Depositions", "Deposiciones"),
        ("phase.short.10", "Mediation", "Mediación"),
        ("phase.short.11", "Trial Prep", "Prep Juicio"),
        ("phase.short.12", "Appeal", "Apelación"),
        ("phase.short.13", "Subrogations", "Subrogaciones"),
        ("phase.short.14", "Payoff", "Liquidación"),
        ("phase.short.15", "Closing", "Cierre"),
        ("progress.of", "of", "de"),
        ("video.summary", "Summary", "Resumen"),
    ];

    let mut en = HashMap::new();
    let mut es = HashMap::new();
    for (key, english, spanish) in ENTRIES {
        en.insert(key.to_string(), english.to_string());
        es.insert(key.to_string(), spanish.to_string());
    }

    let mut tables = HashMap::new();
    tables.insert(Language::En, en);
    tables.insert(Language::Es, es);
    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_language_switch() {
        let localizer = Localizer::new(default_tables(), Language::En);

        assert_eq!(localizer.t("phase.8"), "Phase 8: Discovery");
        assert_eq!(localizer.t("progress.of"), "of");

        let old = localizer.set_language(Language::Es);
        assert_eq!(old, Language::En);
        assert_eq!(localizer.t("phase.8"), "Fase 8: Descubrimiento");
        assert_eq!(localizer.t("video.summary"), "Resumen");
    }

    #[test]
    fn test_missing_key_falls_back_to_key() {
        let localizer = Localizer::new(default_tables(), Language::En);
        assert_eq!(localizer.t("phase.16"), "phase.16");
    }

    #[test]
    fn test_language_wire_format() {
        assert_eq!(serde_json::to_value(Language::En).unwrap(), "en");
        let parsed: Language = serde_json::from_str("\"es\"").unwrap();
        assert_eq!(parsed, Language::Es);
    }
}
