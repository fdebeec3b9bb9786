//! Файл конфигурации генератора

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use docsynth_core::{AugmentationConfig, RendererConfig};
use serde::{Deserialize, Serialize};

/// Настройки отрисовки и деградации, читаемые из JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub renderer: RendererConfig,
    pub augmentation: AugmentationConfig,
}

impl GeneratorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Подстановка вероятностей из командной строки
    pub fn with_overrides(mut self, apply: Option<f64>, effect: Option<f64>) -> Self {
        if let Some(p) = apply {
            self.augmentation.apply_probability = p;
        }
        if let Some(p) = effect {
            self.augmentation.effect_probability = p;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"augmentation": {"effect_probability": 0.2}, "renderer": {"ink": {"horizontal": [30, 30, 90], "vertical": [0, 0, 0]}}}"#,
        )
        .unwrap();

        let config = GeneratorConfig::load(&path).unwrap();
        assert_eq!(config.augmentation.effect_probability, 0.2);
        assert_eq!(config.augmentation.binarization_probability, 0.1);
        assert_eq!(config.renderer.ink.horizontal, [30, 30, 90]);
        assert_eq!(config.renderer.background, [255, 255, 255]);
    }

    #[test]
    fn test_flags_override_file() {
        let config = GeneratorConfig::default().with_overrides(Some(1.0), None);
        assert_eq!(config.augmentation.apply_probability, 1.0);
        assert_eq!(config.augmentation.effect_probability, 0.7);
    }

    #[test]
    fn test_broken_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let err = GeneratorConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
