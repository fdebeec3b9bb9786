//! Модуль сборки документа
//!
//! Проходит по всем полям шаблона, для которых есть значение в записи,
//! рисует их и сводит результат в непрозрачное RGB-изображение.

use std::io::ErrorKind;
use std::path::Path;

use image::{ImageError, Rgb, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::annotation::FieldBoxSet;
use crate::compositor::{CompositorConfig, TextCompositor};
use crate::font::{FieldClass, FieldClassRules, FontSizer, SizingConfig, TextRasterizer};
use crate::{DocumentRecord, Result, SynthError};

/// Цвета чернил по классам полей
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InkPalette {
    pub horizontal: [u8; 3],
    pub vertical: [u8; 3],
}

impl Default for InkPalette {
    fn default() -> Self {
        Self {
            horizontal: [10, 10, 10],
            vertical: [0, 0, 0],
        }
    }
}

impl InkPalette {
    pub fn color_for(&self, class: FieldClass) -> Rgb<u8> {
        match class {
            FieldClass::Horizontal => Rgb(self.horizontal),
            FieldClass::Vertical => Rgb(self.vertical),
        }
    }
}

/// Полная конфигурация отрисовки
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub sizing: SizingConfig,
    pub compositor: CompositorConfig,
    pub classes: FieldClassRules,
    pub ink: InkPalette,
    /// Фон, проступающий сквозь прозрачные участки шаблона
    pub background: [u8; 3],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            sizing: SizingConfig::default(),
            compositor: CompositorConfig::default(),
            classes: FieldClassRules::default(),
            ink: InkPalette::default(),
            background: [255, 255, 255],
        }
    }
}

/// Готовый образец: изображение и использованная запись
#[derive(Debug, Clone)]
pub struct RenderedSample {
    pub image: RgbImage,
    pub record: DocumentRecord,
}

/// Сборщик документа
#[derive(Debug, Clone)]
pub struct DocumentRenderer {
    compositor: TextCompositor,
    classes: FieldClassRules,
    ink: InkPalette,
    background: Rgb<u8>,
}

impl Default for DocumentRenderer {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}

impl DocumentRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            compositor: TextCompositor::new(config.compositor, FontSizer::new(config.sizing)),
            classes: config.classes,
            ink: config.ink,
            background: Rgb(config.background),
        }
    }

    pub fn classify(&self, label: &str) -> FieldClass {
        self.classes.classify(label)
    }

    /// Отрисовка записи поверх копии шаблона.
    /// Метки, присутствующие только в одном из входов, пропускаются.
    pub fn render<R: TextRasterizer + ?Sized>(
        &self,
        template: &RgbaImage,
        boxes: &FieldBoxSet,
        record: DocumentRecord,
        rasterizer: &R,
    ) -> RenderedSample {
        let mut canvas = template.clone();
        let mut drawn = 0usize;

        for (label, fields) in boxes.iter() {
            let Some(value) = record.get(label) else {
                log::debug!("No value for annotated field '{}'", label);
                continue;
            };

            let class = self.classify(label);
            let color = self.ink.color_for(class);
            for field in fields {
                self.compositor
                    .composite(&mut canvas, rasterizer, field, class, value, color);
                drawn += 1;
            }
        }

        for label in record.keys().filter(|label| !boxes.contains(label)) {
            log::debug!("Field '{}' has no annotation on this template", label);
        }
        log::debug!("Rendered {} field boxes", drawn);

        RenderedSample {
            image: flatten(&canvas, self.background),
            record,
        }
    }
}

/// Загрузка шаблона в RGBA
pub fn load_template(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path).map_err(|e| match e {
        ImageError::IoError(io) if io.kind() == ErrorKind::NotFound => {
            SynthError::TemplateNotFound(path.to_path_buf())
        }
        other => SynthError::ImageProcessing(format!("{}: {}", path.display(), other)),
    })?;
    log::info!(
        "Loaded template {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image.to_rgba8())
}

/// Сведение прозрачности на сплошной фон
pub fn flatten(image: &RgbaImage, background: Rgb<u8>) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let a = a as u16;
        let mix = |fg: u8, bg: u8| ((fg as u16 * a + bg as u16 * (255 - a) + 127) / 255) as u8;
        Rgb([
            mix(r, background[0]),
            mix(g, background[1]),
            mix(b, background[2]),
        ])
    })
}
