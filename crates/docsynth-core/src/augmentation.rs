//! Модуль деградации изображений
//!
//! Два конвейера искажений для готового документа:
//! - `Scan`: поворот на 90°, перекос, шум матрицы, экспозиция, бинаризация
//! - `Photo`: расфокус, смаз, сильный шум, потеря разрешения, JPEG
//!
//! Каждый шаг срабатывает независимо со своей вероятностью. Источник
//! случайности передаётся снаружи, конвейер его не инициализирует.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::filter::{gaussian_blur_f32, horizontal_filter, vertical_filter};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::noise::gaussian_noise;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Result, SynthError};

const SCAN_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Вариант конвейера
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    /// Планшетный сканер
    #[default]
    Scan,
    /// Фото с телефона
    Photo,
}

/// Конфигурация деградации
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Вероятность прогона всего конвейера для изображения
    pub apply_probability: f64,
    /// Вероятность срабатывания каждого отдельного шага
    pub effect_probability: f64,
    /// Фиксированная вероятность поворота на кратный 90° угол (скан)
    pub quarter_turn_probability: f64,
    /// Фиксированная вероятность бинаризации (скан)
    pub binarization_probability: f64,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            apply_probability: 1.0 / 3.0,
            effect_probability: 0.7,
            quarter_turn_probability: 0.7,
            binarization_probability: 0.1,
        }
    }
}

impl AugmentationConfig {
    /// Конфигурация, при которой изображение не меняется
    pub fn disabled() -> Self {
        Self {
            apply_probability: 0.0,
            effect_probability: 0.0,
            quarter_turn_probability: 0.0,
            binarization_probability: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("apply_probability", self.apply_probability),
            ("effect_probability", self.effect_probability),
            ("quarter_turn_probability", self.quarter_turn_probability),
            ("binarization_probability", self.binarization_probability),
        ];
        for (name, value) in fields {
            check_probability(name, value)?;
        }
        Ok(())
    }

    /// Бросок общей вероятности `apply_probability`
    pub fn should_apply<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen_bool(self.apply_probability.clamp(0.0, 1.0))
    }
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(SynthError::InvalidConfig(format!(
            "{name} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

/// Вероятность срабатывания шага
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Chance {
    /// Общая вероятность `effect_probability`
    PerEffect,
    /// Собственная вероятность шага
    Fixed(f64),
}

/// Направление смаза
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionDirection {
    Horizontal,
    Vertical,
}

/// Отдельное искажение с диапазонами случайных параметров
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Поворот на 0/90/180/270 градусов
    QuarterTurn,
    /// Небольшой поворот с белыми углами
    Skew { max_degrees: f32 },
    /// Аддитивный гауссов шум, дисперсия из диапазона
    SensorNoise { variance: (f64, f64) },
    /// Множители яркости и контраста
    ExposureJitter {
        brightness: (f32, f32),
        contrast: (f32, f32),
    },
    /// Жёсткий порог по яркости
    Binarize { cutoff: (u8, u8) },
    /// Гауссово размытие с нечётным ядром
    FocusBlur { kernels: Vec<u32> },
    /// Линейный смаз по горизонтали или вертикали
    MotionBlur { kernels: Vec<u32> },
    /// Уменьшение и увеличение обратно ближайшим соседом
    ResolutionLoss { factor: (f32, f32) },
    /// Перекодирование в JPEG
    JpegRecompression { quality: (u8, u8) },
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::QuarterTurn => "quarter_turn",
            Effect::Skew { .. } => "skew",
            Effect::SensorNoise { .. } => "sensor_noise",
            Effect::ExposureJitter { .. } => "exposure_jitter",
            Effect::Binarize { .. } => "binarize",
            Effect::FocusBlur { .. } => "focus_blur",
            Effect::MotionBlur { .. } => "motion_blur",
            Effect::ResolutionLoss { .. } => "resolution_loss",
            Effect::JpegRecompression { .. } => "jpeg_recompression",
        }
    }

    /// Проверка диапазонов параметров: пустой диапазон сломал бы выборку
    pub fn validate(&self) -> Result<()> {
        match self {
            Effect::QuarterTurn => Ok(()),
            Effect::Skew { max_degrees } => {
                if max_degrees.is_finite() && *max_degrees >= 0.0 {
                    Ok(())
                } else {
                    Err(self.invalid(format!("max_degrees must be >= 0, got {max_degrees}")))
                }
            }
            Effect::SensorNoise { variance } => self.check_range("variance", *variance, 0.0),
            Effect::ExposureJitter {
                brightness,
                contrast,
            } => {
                self.check_range("brightness", *brightness, 0.0)?;
                self.check_range("contrast", *contrast, 0.0)
            }
            Effect::Binarize { cutoff } => self.check_range("cutoff", *cutoff, 0),
            Effect::FocusBlur { kernels } | Effect::MotionBlur { kernels } => {
                match kernels.iter().find(|&&k| k == 0) {
                    Some(_) => Err(self.invalid("kernel sizes must be >= 1")),
                    None => Ok(()),
                }
            }
            Effect::ResolutionLoss { factor } => self.check_range("factor", *factor, 1.0),
            Effect::JpegRecompression { quality } => self.check_range("quality", *quality, 1),
        }
    }

    fn check_range<T>(&self, name: &str, (lo, hi): (T, T), min: T) -> Result<()>
    where
        T: PartialOrd + std::fmt::Display,
    {
        // Отрицание ловит и NaN
        if !(lo >= min && lo <= hi) {
            return Err(self.invalid(format!(
                "{name} range [{lo}, {hi}] must be ordered and start at >= {min}"
            )));
        }
        Ok(())
    }

    fn invalid(&self, reason: impl std::fmt::Display) -> SynthError {
        SynthError::InvalidConfig(format!("{}: {}", self.name(), reason))
    }

    /// Применение искажения со случайными параметрами
    pub fn apply<R: Rng + ?Sized>(&self, image: RgbImage, rng: &mut R) -> RgbImage {
        match self {
            Effect::QuarterTurn => quarter_turn(&image, rng.gen_range(0..4)),
            Effect::Skew { max_degrees } => {
                let angle = rng.gen_range(-max_degrees..=*max_degrees);
                skew(&image, angle, SCAN_BACKGROUND)
            }
            Effect::SensorNoise { variance } => {
                let variance = rng.gen_range(variance.0..=variance.1);
                add_sensor_noise(&image, variance, rng.gen())
            }
            Effect::ExposureJitter {
                brightness,
                contrast,
            } => {
                let brightness = rng.gen_range(brightness.0..=brightness.1);
                let contrast = rng.gen_range(contrast.0..=contrast.1);
                adjust_exposure(&image, brightness, contrast)
            }
            Effect::Binarize { cutoff } => binarize(&image, rng.gen_range(cutoff.0..=cutoff.1)),
            Effect::FocusBlur { kernels } => match pick(kernels, rng) {
                Some(kernel) => focus_blur(&image, kernel),
                None => image,
            },
            Effect::MotionBlur { kernels } => {
                let Some(kernel) = pick(kernels, rng) else {
                    return image;
                };
                let direction = if rng.gen_bool(0.5) {
                    MotionDirection::Horizontal
                } else {
                    MotionDirection::Vertical
                };
                motion_blur(&image, kernel, direction)
            }
            Effect::ResolutionLoss { factor } => {
                degrade_resolution(&image, rng.gen_range(factor.0..=factor.1))
            }
            Effect::JpegRecompression { quality } => {
                recompress_jpeg(image, rng.gen_range(quality.0..=quality.1))
            }
        }
    }
}

fn pick<R: Rng + ?Sized>(values: &[u32], rng: &mut R) -> Option<u32> {
    if values.is_empty() {
        return None;
    }
    Some(values[rng.gen_range(0..values.len())])
}

/// Шаг конвейера: искажение и его вероятность
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub effect: Effect,
    pub chance: Chance,
}

impl Step {
    pub fn per_effect(effect: Effect) -> Self {
        Self {
            effect,
            chance: Chance::PerEffect,
        }
    }

    pub fn fixed(effect: Effect, probability: f64) -> Self {
        Self {
            effect,
            chance: Chance::Fixed(probability),
        }
    }
}

/// Упорядоченный вероятностный конвейер искажений
#[derive(Debug, Clone)]
pub struct AugmentationPipeline {
    kind: PipelineKind,
    steps: Vec<Step>,
    effect_probability: f64,
}

impl AugmentationPipeline {
    /// Конвейер планшетного сканера
    pub fn scan(config: &AugmentationConfig) -> Result<Self> {
        let steps = vec![
            Step::fixed(Effect::QuarterTurn, config.quarter_turn_probability),
            Step::per_effect(Effect::Skew { max_degrees: 2.5 }),
            Step::per_effect(Effect::SensorNoise {
                variance: (2.0, 10.0),
            }),
            Step::per_effect(Effect::ExposureJitter {
                brightness: (0.8, 1.3),
                contrast: (0.8, 1.5),
            }),
            Step::fixed(
                Effect::Binarize { cutoff: (100, 200) },
                config.binarization_probability,
            ),
        ];
        Self::from_steps(PipelineKind::Scan, steps, config)
    }

    /// Конвейер съёмки телефоном
    pub fn photo(config: &AugmentationConfig) -> Result<Self> {
        let steps = vec![
            Step::per_effect(Effect::FocusBlur {
                kernels: vec![3, 5, 7],
            }),
            Step::per_effect(Effect::MotionBlur {
                kernels: vec![3, 5, 7, 9],
            }),
            Step::per_effect(Effect::SensorNoise {
                variance: (10.0, 50.0),
            }),
            Step::per_effect(Effect::ResolutionLoss { factor: (1.5, 3.0) }),
            Step::per_effect(Effect::JpegRecompression { quality: (50, 85) }),
        ];
        Self::from_steps(PipelineKind::Photo, steps, config)
    }

    pub fn for_kind(kind: PipelineKind, config: &AugmentationConfig) -> Result<Self> {
        match kind {
            PipelineKind::Scan => Self::scan(config),
            PipelineKind::Photo => Self::photo(config),
        }
    }

    /// Произвольный конвейер из списка шагов
    pub fn from_steps(kind: PipelineKind, steps: Vec<Step>, config: &AugmentationConfig) -> Result<Self> {
        config.validate()?;
        for step in &steps {
            step.effect.validate()?;
            if let Chance::Fixed(p) = step.chance {
                check_probability(step.effect.name(), p)?;
            }
        }

        Ok(Self {
            kind,
            steps,
            effect_probability: config.effect_probability,
        })
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Прогон изображения через все шаги по порядку
    pub fn process<R: Rng + ?Sized>(&self, image: RgbImage, rng: &mut R) -> RgbImage {
        let mut result = image;

        for step in &self.steps {
            let probability = match step.chance {
                Chance::PerEffect => self.effect_probability,
                Chance::Fixed(p) => p,
            };
            if rng.gen_bool(probability) {
                log::debug!("Applying {}", step.effect.name());
                result = step.effect.apply(result, rng);
            }
        }

        result
    }
}

/// Поворот на `turns` четвертей оборота против часовой стрелки
pub fn quarter_turn(image: &RgbImage, turns: u8) -> RgbImage {
    match turns % 4 {
        1 => imageops::rotate270(image),
        2 => imageops::rotate180(image),
        3 => imageops::rotate90(image),
        _ => image.clone(),
    }
}

/// Поворот на `degrees` против часовой стрелки без изменения размера
pub fn skew(image: &RgbImage, degrees: f32, fill: Rgb<u8>) -> RgbImage {
    rotate_about_center(image, (-degrees).to_radians(), Interpolation::Bilinear, fill)
}

/// Гауссов шум с нулевым средним; значения обрезаются до [0, 255]
pub fn add_sensor_noise(image: &RgbImage, variance: f64, seed: u64) -> RgbImage {
    gaussian_noise(image, 0.0, variance.max(0.0).sqrt(), seed)
}

/// Яркость как множитель, контраст относительно средней яркости кадра
pub fn adjust_exposure(image: &RgbImage, brightness: f32, contrast: f32) -> RgbImage {
    let mut result = image.clone();
    for pixel in result.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = (*channel as f32 * brightness).round().clamp(0.0, 255.0) as u8;
        }
    }

    let mean = mean_luma(&result);
    for pixel in result.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            let value = mean + (*channel as f32 - mean) * contrast;
            *channel = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    result
}

fn mean_luma(image: &RgbImage) -> f32 {
    let count = (image.width() as u64 * image.height() as u64).max(1);
    let sum: u64 = imageops::grayscale(image)
        .pixels()
        .map(|p| p.0[0] as u64)
        .sum();
    (sum as f32 / count as f32).round()
}

/// Порог по яркости: светлее `cutoff` - белый, иначе чёрный
pub fn binarize(image: &RgbImage, cutoff: u8) -> RgbImage {
    let gray = imageops::grayscale(image);
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let value = if gray.get_pixel(x, y).0[0] > cutoff { 255 } else { 0 };
        Rgb([value, value, value])
    })
}

/// Гауссово размытие с сигмой, соответствующей нечётному ядру `kernel`
pub fn focus_blur(image: &RgbImage, kernel: u32) -> RgbImage {
    let kernel = kernel.max(1) | 1;
    if kernel == 1 {
        return image.clone();
    }
    let sigma = 0.3 * ((kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    gaussian_blur_f32(image, sigma)
}

/// Усреднение вдоль линии длиной `kernel` с повтором краёв
pub fn motion_blur(image: &RgbImage, kernel: u32, direction: MotionDirection) -> RgbImage {
    if kernel <= 1 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let line = vec![1.0 / kernel as f32; kernel as usize];
    match direction {
        MotionDirection::Horizontal => horizontal_filter(image, &line),
        MotionDirection::Vertical => vertical_filter(image, &line),
    }
}

/// Уменьшение в `factor` раз и возврат к исходному размеру без сглаживания
pub fn degrade_resolution(image: &RgbImage, factor: f32) -> RgbImage {
    let (width, height) = image.dimensions();
    if factor <= 1.0 || width == 0 || height == 0 {
        return image.clone();
    }
    let small_w = ((width as f32 / factor).round() as u32).max(1);
    let small_h = ((height as f32 / factor).round() as u32).max(1);

    let small = imageops::resize(image, small_w, small_h, FilterType::Triangle);
    imageops::resize(&small, width, height, FilterType::Nearest)
}

/// Кодирование в JPEG с качеством `quality` и обратное декодирование
pub fn recompress_jpeg(image: RgbImage, quality: u8) -> RgbImage {
    match encode_decode_jpeg(&image, quality.clamp(1, 100)) {
        Ok(decoded) => decoded,
        Err(e) => {
            log::warn!("JPEG recompression skipped: {}", e);
            image
        }
    }
}

fn encode_decode_jpeg(image: &RgbImage, quality: u8) -> Result<RgbImage> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(image)?;

    let decoded = image::load_from_memory_with_format(&buffer, ImageFormat::Jpeg)?;
    Ok(decoded.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn document(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if (x / 8 + y / 8) % 3 == 0 {
                Rgb([20, 20, 20])
            } else {
                Rgb([235, 232, 225])
            }
        })
    }

    #[test]
    fn test_disabled_is_identity() {
        let config = AugmentationConfig::disabled();
        let img = document(64, 48);
        for kind in [PipelineKind::Scan, PipelineKind::Photo] {
            let pipeline = AugmentationPipeline::for_kind(kind, &config).unwrap();
            let mut rng = StdRng::seed_from_u64(1);
            assert_eq!(pipeline.process(img.clone(), &mut rng), img);
        }
    }

    #[test]
    fn test_invalid_probability_rejected() {
        let config = AugmentationConfig {
            binarization_probability: -0.1,
            ..AugmentationConfig::default()
        };
        assert!(AugmentationPipeline::scan(&config).is_err());

        let config = AugmentationConfig {
            effect_probability: f64::NAN,
            ..AugmentationConfig::default()
        };
        assert!(AugmentationPipeline::photo(&config).is_err());
    }

    #[test]
    fn test_step_order() {
        let config = AugmentationConfig::default();
        let scan: Vec<&str> = AugmentationPipeline::scan(&config)
            .unwrap()
            .steps()
            .iter()
            .map(|s| s.effect.name())
            .collect();
        assert_eq!(
            scan,
            ["quarter_turn", "skew", "sensor_noise", "exposure_jitter", "binarize"]
        );

        let photo = AugmentationPipeline::photo(&config).unwrap();
        assert_eq!(photo.steps().last().unwrap().effect.name(), "jpeg_recompression");
        assert!(photo.steps().iter().all(|s| s.chance == Chance::PerEffect));
    }

    #[test]
    fn test_same_seed_same_output() {
        let config = AugmentationConfig {
            effect_probability: 1.0,
            ..AugmentationConfig::default()
        };
        let img = document(40, 40);
        for kind in [PipelineKind::Scan, PipelineKind::Photo] {
            let pipeline = AugmentationPipeline::for_kind(kind, &config).unwrap();
            let a = pipeline.process(img.clone(), &mut StdRng::seed_from_u64(42));
            let b = pipeline.process(img.clone(), &mut StdRng::seed_from_u64(42));
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_quarter_turn_dimensions() {
        let img = document(30, 20);
        assert_eq!(quarter_turn(&img, 0).dimensions(), (30, 20));
        assert_eq!(quarter_turn(&img, 1).dimensions(), (20, 30));
        assert_eq!(quarter_turn(&img, 2).dimensions(), (30, 20));
        // 90° counter-clockwise moves the top-right corner to the top-left
        assert_eq!(quarter_turn(&img, 1).get_pixel(0, 0), img.get_pixel(29, 0));
    }

    #[test]
    fn test_skew_fills_corners_white() {
        let img = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        let skewed = skew(&img, 2.5, SCAN_BACKGROUND);
        assert_eq!(skewed.dimensions(), (100, 100));
        assert_eq!(skewed.get_pixel(0, 0), &SCAN_BACKGROUND);
        assert_eq!(skewed.get_pixel(50, 50), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_exposure_neutral_factors() {
        let img = document(16, 16);
        assert_eq!(adjust_exposure(&img, 1.0, 1.0), img);
        let bright = adjust_exposure(&RgbImage::from_pixel(4, 4, Rgb([100, 100, 100])), 1.3, 1.0);
        assert_eq!(bright.get_pixel(0, 0), &Rgb([130, 130, 130]));
    }

    #[test]
    fn test_binarize_produces_two_levels() {
        let img = RgbImage::from_fn(16, 1, |x, _| Rgb([(x * 16) as u8; 3]));
        let bin = binarize(&img, 120);
        assert!(bin.pixels().all(|p| p.0 == [0; 3] || p.0 == [255; 3]));
        assert_eq!(bin.get_pixel(7, 0), &Rgb([0, 0, 0]));
        assert_eq!(bin.get_pixel(8, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_motion_blur_direction() {
        let mut img = RgbImage::from_pixel(9, 9, Rgb([0, 0, 0]));
        img.put_pixel(4, 4, Rgb([255, 255, 255]));

        let horizontal = motion_blur(&img, 3, MotionDirection::Horizontal);
        assert!((84..=85).contains(&horizontal.get_pixel(3, 4).0[0]));
        assert!((84..=85).contains(&horizontal.get_pixel(5, 4).0[0]));
        assert_eq!(horizontal.get_pixel(4, 3), &Rgb([0, 0, 0]));

        let vertical = motion_blur(&img, 3, MotionDirection::Vertical);
        assert!((84..=85).contains(&vertical.get_pixel(4, 5).0[0]));
        assert_eq!(vertical.get_pixel(5, 4), &Rgb([0, 0, 0]));

        assert_eq!(motion_blur(&img, 1, MotionDirection::Vertical), img);
    }

    #[test]
    fn test_motion_blur_keeps_flat_image() {
        let img = RgbImage::from_pixel(12, 6, Rgb([120, 60, 200]));
        let blurred = motion_blur(&img, 9, MotionDirection::Horizontal);
        for p in blurred.pixels() {
            for (got, want) in p.0.iter().zip([120u8, 60, 200]) {
                assert!(got.abs_diff(want) <= 1, "{:?}", p);
            }
        }
    }

    #[test]
    fn test_reversed_ranges_rejected() {
        let config = AugmentationConfig::default();
        let broken = [
            Effect::Skew { max_degrees: -2.0 },
            Effect::SensorNoise { variance: (10.0, 2.0) },
            Effect::SensorNoise { variance: (f64::NAN, 2.0) },
            Effect::ExposureJitter {
                brightness: (0.8, 1.3),
                contrast: (1.5, 0.8),
            },
            Effect::Binarize { cutoff: (200, 100) },
            Effect::FocusBlur { kernels: vec![3, 0] },
            Effect::ResolutionLoss { factor: (0.5, 2.0) },
            Effect::JpegRecompression { quality: (0, 50) },
        ];
        for effect in broken {
            let result =
                AugmentationPipeline::from_steps(PipelineKind::Scan, vec![Step::per_effect(effect.clone())], &config);
            assert!(
                matches!(result, Err(SynthError::InvalidConfig(_))),
                "{} accepted",
                effect.name()
            );
        }
    }

    #[test]
    fn test_degenerate_ranges_accepted() {
        let config = AugmentationConfig {
            effect_probability: 1.0,
            ..AugmentationConfig::default()
        };
        let steps = vec![
            Step::per_effect(Effect::Skew { max_degrees: 0.0 }),
            Step::per_effect(Effect::Binarize { cutoff: (128, 128) }),
            Step::per_effect(Effect::MotionBlur { kernels: vec![] }),
        ];
        let pipeline = AugmentationPipeline::from_steps(PipelineKind::Scan, steps, &config).unwrap();
        let out = pipeline.process(document(20, 20), &mut StdRng::seed_from_u64(4));
        assert_eq!(out.dimensions(), (20, 20));
    }

    #[test]
    fn test_builtin_pipelines_are_valid() {
        let config = AugmentationConfig::default();
        for kind in [PipelineKind::Scan, PipelineKind::Photo] {
            let pipeline = AugmentationPipeline::for_kind(kind, &config).unwrap();
            assert!(pipeline.steps().iter().all(|s| s.effect.validate().is_ok()));
        }
    }

    #[test]
    fn test_resolution_loss_keeps_size() {
        let img = document(50, 30);
        assert_eq!(degrade_resolution(&img, 2.5).dimensions(), (50, 30));
        assert_eq!(degrade_resolution(&img, 1.0), img);
    }

    #[test]
    fn test_jpeg_roundtrip_keeps_size() {
        let img = document(33, 17);
        let out = recompress_jpeg(img.clone(), 60);
        assert_eq!(out.dimensions(), img.dimensions());
    }

    #[test]
    fn test_noise_clipped_and_sized() {
        let img = RgbImage::from_pixel(20, 20, Rgb([255, 255, 255]));
        let noisy = add_sensor_noise(&img, 50.0, 9);
        assert_eq!(noisy.dimensions(), (20, 20));
        assert!(noisy.pixels().any(|p| p.0[0] < 255));
    }
}
