//! DocSynth Core - генерация синтетических документов
//!
//! Библиотека для создания размеченных изображений документов:
//! - Загрузка разметки полей из CVAT XML (боксы и полигоны с поворотом)
//! - Подбор кегля по размерам поля
//! - Отрисовка текста с тенью, поворотом и центрированием по полю
//! - Деградация готового изображения (имитация сканера или камеры телефона)
//! - Сериализация эталонной разметки (ground truth)

pub mod geometry;
pub mod annotation;
pub mod font;
pub mod compositor;
pub mod renderer;
pub mod augmentation;
pub mod ground_truth;

pub use geometry::{FieldBox, Point};
pub use annotation::{AnnotationParser, FieldBoxSet, Primitive};
pub use font::{
    BlockRasterizer, FieldClass, FieldClassRules, FontHandle, FontPool, FontResolver, FontSizer,
    SizingConfig, TextRasterizer,
};
pub use compositor::{CompositorConfig, TextCompositor};
pub use renderer::{load_template, DocumentRenderer, InkPalette, RenderedSample, RendererConfig};
pub use augmentation::{AugmentationConfig, AugmentationPipeline, Chance, Effect, PipelineKind, Step};
pub use ground_truth::{GroundTruthFormat, MetadataEntry};

use std::collections::BTreeMap;
use std::path::PathBuf;

use image::RgbaImage;
use rand::Rng;
use thiserror::Error;

/// Значения полей одного образца: метка поля -> текст
pub type DocumentRecord = BTreeMap<String, String>;

/// Основные ошибки модуля
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("Annotation source not found: {0}")]
    AnnotationNotFound(PathBuf),

    #[error("Invalid annotation for label '{label}': {reason}")]
    InvalidAnnotation { label: String, reason: String },

    #[error("No usable TrueType font found ({searched} candidates searched)")]
    NoFontAvailable { searched: usize },

    #[error("Template image not found: {0}")]
    TemplateNotFound(PathBuf),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SynthError {
    pub(crate) fn invalid_annotation(label: &str, reason: impl Into<String>) -> Self {
        SynthError::InvalidAnnotation {
            label: label.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SynthError>;

/// Генератор образцов для одного шаблона.
///
/// Держит разметку, шаблон и шрифты на всё время сессии, для каждого
/// образца выбирает шрифт, рисует поля и с вероятностью
/// `apply_probability` пропускает результат через конвейер деградации.
pub struct DocumentSynthesizer<R: TextRasterizer = FontHandle> {
    template: RgbaImage,
    boxes: FieldBoxSet,
    fonts: FontPool<R>,
    renderer: DocumentRenderer,
    pipeline: AugmentationPipeline,
    augmentation: AugmentationConfig,
}

impl<R: TextRasterizer> DocumentSynthesizer<R> {
    /// Создание генератора с одним шрифтом
    pub fn new(
        template: RgbaImage,
        boxes: FieldBoxSet,
        rasterizer: R,
        renderer: RendererConfig,
        kind: PipelineKind,
        augmentation: AugmentationConfig,
    ) -> Result<Self> {
        Self::with_fonts(
            template,
            boxes,
            FontPool::single(rasterizer),
            renderer,
            kind,
            augmentation,
        )
    }

    /// Создание генератора с набором шрифтов; конфигурация деградации проверяется сразу
    pub fn with_fonts(
        template: RgbaImage,
        boxes: FieldBoxSet,
        fonts: FontPool<R>,
        renderer: RendererConfig,
        kind: PipelineKind,
        augmentation: AugmentationConfig,
    ) -> Result<Self> {
        let pipeline = AugmentationPipeline::for_kind(kind, &augmentation)?;
        if boxes.is_empty() {
            log::warn!("Template has no annotated fields, samples will be blank copies");
        }

        Ok(Self {
            template,
            boxes,
            fonts,
            renderer: DocumentRenderer::new(renderer),
            pipeline,
            augmentation,
        })
    }

    pub fn boxes(&self) -> &FieldBoxSet {
        &self.boxes
    }

    pub fn template(&self) -> &RgbaImage {
        &self.template
    }

    pub fn pipeline(&self) -> &AugmentationPipeline {
        &self.pipeline
    }

    pub fn fonts(&self) -> &FontPool<R> {
        &self.fonts
    }

    /// Отрисовка одного образца основным шрифтом без деградации
    pub fn render(&self, record: DocumentRecord) -> RenderedSample {
        self.render_with(record, self.fonts.primary())
    }

    /// Отрисовка указанным шрифтом без деградации
    pub fn render_with(&self, record: DocumentRecord, font: &R) -> RenderedSample {
        self.renderer.render(&self.template, &self.boxes, record, font)
    }

    /// Случайный шрифт из набора, отрисовка и, с заданной вероятностью, деградация
    pub fn synthesize<G: Rng + ?Sized>(&self, record: DocumentRecord, rng: &mut G) -> RenderedSample {
        let font = self.fonts.choose(rng);
        let mut sample = self.render_with(record, font);

        if self.augmentation.should_apply(rng) {
            log::debug!("Applying {:?} degradation pipeline", self.pipeline.kind());
            sample.image = self.pipeline.process(sample.image, rng);
        }

        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbImage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn synthesizer(augmentation: AugmentationConfig) -> DocumentSynthesizer<BlockRasterizer> {
        let boxes = AnnotationParser::new()
            .parse_str(
                r#"<annotations><image id="0" name="form.png" width="200" height="80">
                    <box label="surname" xtl="10" ytl="10" xbr="150" ybr="40"/>
                </image></annotations>"#,
            )
            .unwrap();
        let template = RgbaImage::from_pixel(200, 80, Rgba([255, 255, 255, 255]));

        DocumentSynthesizer::new(
            template,
            boxes,
            BlockRasterizer::default(),
            RendererConfig::default(),
            PipelineKind::Scan,
            augmentation,
        )
        .unwrap()
    }

    #[test]
    fn test_synthesize_without_augmentation_matches_render() {
        let synth = synthesizer(AugmentationConfig::disabled());
        let mut record = DocumentRecord::new();
        record.insert("surname".into(), "IVANOV".into());

        let mut rng = StdRng::seed_from_u64(7);
        let rendered = synth.render(record.clone());
        let synthesized = synth.synthesize(record.clone(), &mut rng);

        assert_eq!(rendered.image, synthesized.image);
        assert_eq!(synthesized.record, record);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let boxes = FieldBoxSet::default();
        let template = RgbaImage::new(10, 10);
        let config = AugmentationConfig {
            effect_probability: 1.5,
            ..AugmentationConfig::default()
        };

        let result = DocumentSynthesizer::new(
            template,
            boxes,
            BlockRasterizer::default(),
            RendererConfig::default(),
            PipelineKind::Photo,
            config,
        );
        assert!(matches!(result, Err(SynthError::InvalidConfig(_))));
    }

    #[test]
    fn test_font_chosen_per_sample() {
        let boxes = AnnotationParser::new()
            .parse_str(
                r#"<annotations><image id="0" name="form.png" width="200" height="60">
                    <box label="surname" xtl="10" ytl="10" xbr="190" ybr="50"/>
                </image></annotations>"#,
            )
            .unwrap();
        let narrow = BlockRasterizer { advance_ratio: 0.4 };
        let wide = BlockRasterizer { advance_ratio: 0.9 };
        let fonts = FontPool::new(vec![narrow, wide]).unwrap();

        let synth = DocumentSynthesizer::with_fonts(
            RgbaImage::from_pixel(200, 60, Rgba([255, 255, 255, 255])),
            boxes,
            fonts,
            RendererConfig::default(),
            PipelineKind::Scan,
            AugmentationConfig::disabled(),
        )
        .unwrap();

        let mut record = DocumentRecord::new();
        record.insert("surname".into(), "ORLOVA".into());

        let candidates: Vec<RgbImage> = synth
            .fonts()
            .fonts()
            .iter()
            .map(|font| synth.render_with(record.clone(), font).image)
            .collect();
        assert_ne!(candidates[0], candidates[1]);
        assert_eq!(synth.render(record.clone()).image, candidates[0]);

        let mut rng = StdRng::seed_from_u64(21);
        let mut used = [false; 2];
        for _ in 0..40 {
            let sample = synth.synthesize(record.clone(), &mut rng);
            let index = candidates
                .iter()
                .position(|c| *c == sample.image)
                .expect("sample drawn with a pool font");
            used[index] = true;
        }
        assert_eq!(used, [true, true]);
    }
}
