//! Модуль шрифтов
//!
//! - Классификация полей (горизонтальные / вертикальные)
//! - Подбор кегля по размерам бокса
//! - Поиск установленного TrueType-шрифта и растеризация текста
//! - Набор шрифтов со случайным выбором на каждый образец

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geometry::FieldBox;
use crate::{Result, SynthError};

/// Класс поля
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldClass {
    /// Обычная строка вдоль бокса
    Horizontal,
    /// Текст идёт вдоль длинной стороны вертикального бокса (серия/номер)
    Vertical,
}

/// Правила классификации полей по метке
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldClassRules {
    /// Подстроки метки (без учёта регистра), делающие поле вертикальным
    pub vertical_markers: Vec<String>,
}

impl Default for FieldClassRules {
    fn default() -> Self {
        Self {
            vertical_markers: vec!["passport".to_string()],
        }
    }
}

impl FieldClassRules {
    pub fn classify(&self, label: &str) -> FieldClass {
        let label = label.to_lowercase();
        let vertical = self
            .vertical_markers
            .iter()
            .any(|marker| !marker.is_empty() && label.contains(&marker.to_lowercase()));

        if vertical {
            FieldClass::Vertical
        } else {
            FieldClass::Horizontal
        }
    }
}

/// Параметры подбора кегля
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Доля высоты бокса, занимаемая глифом (горизонтальные поля)
    pub horizontal_ratio: f32,
    /// Доля ширины бокса (вертикальные поля)
    pub vertical_ratio: f32,
    /// Минимальный кегль
    pub min_size: u32,
    /// Максимальный кегль горизонтальных полей
    pub horizontal_max: u32,
    /// Максимальный кегль вертикальных полей
    pub vertical_max: u32,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            horizontal_ratio: 0.7,
            vertical_ratio: 0.65,
            min_size: 10,
            horizontal_max: 32,
            vertical_max: 42,
        }
    }
}

/// Подбор размера шрифта под бокс
#[derive(Debug, Clone, Default)]
pub struct FontSizer {
    config: SizingConfig,
}

impl FontSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    /// Кегль в пикселях: `round(сторона * доля)` в пределах `[min, max]`
    pub fn size_for(&self, field: &FieldBox, class: FieldClass) -> u32 {
        let (dimension, ratio) = match class {
            FieldClass::Vertical => (field.width(), self.config.vertical_ratio),
            FieldClass::Horizontal => (field.height(), self.config.horizontal_ratio),
        };
        let (min, max) = self.bounds(class);

        let target = (dimension * ratio).round().max(0.0) as u32;
        target.clamp(min, max)
    }

    /// Допустимый диапазон кегля для класса
    pub fn bounds(&self, class: FieldClass) -> (u32, u32) {
        let max = match class {
            FieldClass::Vertical => self.config.vertical_max,
            FieldClass::Horizontal => self.config.horizontal_max,
        };
        let min = self.config.min_size.min(max);
        (min, max)
    }
}

/// Измерение и отрисовка строки текста на RGBA-слое
pub trait TextRasterizer {
    /// Габариты строки `(ширина, высота)` в пикселях
    fn measure(&self, text: &str, size: f32) -> (u32, u32);

    /// Отрисовка строки с левым верхним углом в `(x, y)`
    fn draw(&self, layer: &mut RgbaImage, x: i32, y: i32, size: f32, color: Rgba<u8>, text: &str);
}

impl<T: TextRasterizer + ?Sized> TextRasterizer for &T {
    fn measure(&self, text: &str, size: f32) -> (u32, u32) {
        (**self).measure(text, size)
    }

    fn draw(&self, layer: &mut RgbaImage, x: i32, y: i32, size: f32, color: Rgba<u8>, text: &str) {
        (**self).draw(layer, x, y, size, color, text)
    }
}

/// Загруженный масштабируемый шрифт. Создаётся один раз на сессию.
pub struct FontHandle {
    path: PathBuf,
    font: FontVec,
}

impl fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontHandle").field("path", &self.path).finish()
    }
}

impl FontHandle {
    /// Загрузка TTF/OTF файла
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(path, bytes)
    }

    /// Шрифт из байтов; `path` используется только для диагностики
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Result<Self> {
        let path = path.into();
        let font = FontVec::try_from_vec(bytes).map_err(|e| {
            SynthError::ImageProcessing(format!("invalid font {}: {}", path.display(), e))
        })?;
        Ok(Self { path, font })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TextRasterizer for FontHandle {
    fn measure(&self, text: &str, size: f32) -> (u32, u32) {
        text_size(PxScale::from(size), &self.font, text)
    }

    fn draw(&self, layer: &mut RgbaImage, x: i32, y: i32, size: f32, color: Rgba<u8>, text: &str) {
        draw_text_mut(layer, color, x, y, PxScale::from(size), &self.font, text);
    }
}

/// Растеризатор без шрифта: каждый непробельный символ - залитая ячейка.
///
/// Даёт предсказуемую геометрию для предпросмотра раскладки и тестов.
#[derive(Debug, Clone)]
pub struct BlockRasterizer {
    /// Ширина символа относительно кегля
    pub advance_ratio: f32,
}

impl Default for BlockRasterizer {
    fn default() -> Self {
        Self { advance_ratio: 0.6 }
    }
}

impl BlockRasterizer {
    fn advance(&self, size: f32) -> u32 {
        ((size * self.advance_ratio).round() as u32).max(1)
    }
}

impl TextRasterizer for BlockRasterizer {
    fn measure(&self, text: &str, size: f32) -> (u32, u32) {
        let chars = text.chars().count() as u32;
        (chars * self.advance(size), size.round().max(1.0) as u32)
    }

    fn draw(&self, layer: &mut RgbaImage, x: i32, y: i32, size: f32, color: Rgba<u8>, text: &str) {
        let advance = self.advance(size);
        let height = size.round().max(1.0) as u32;
        // One pixel gap between cells keeps adjacent glyphs apart
        let cell = advance.saturating_sub(1).max(1);

        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let left = x + (i as u32 * advance) as i32;
            draw_filled_rect_mut(layer, Rect::at(left, y).of_size(cell, height), color);
        }
    }
}

/// Поиск установленного шрифта по списку путей
#[derive(Debug, Clone)]
pub struct FontResolver {
    candidates: Vec<PathBuf>,
}

impl Default for FontResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FontResolver {
    /// Стандартные пути установки шрифтов (Windows, Linux, macOS)
    pub const DEFAULT_CANDIDATES: &'static [&'static str] = &[
        "C:/Windows/Fonts/arial.ttf",
        "C:/Windows/Fonts/arialbd.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "/Library/Fonts/Arial.ttf",
    ];

    pub fn new() -> Self {
        Self {
            candidates: Self::DEFAULT_CANDIDATES.iter().map(PathBuf::from).collect(),
        }
    }

    /// Резолвер только с указанными путями
    pub fn with_candidates<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            candidates: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Добавление пути с наивысшим приоритетом
    pub fn prefer(mut self, path: impl Into<PathBuf>) -> Self {
        self.candidates.insert(0, path.into());
        self
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Первый существующий и читаемый шрифт из списка
    pub fn resolve(&self) -> Result<FontHandle> {
        for path in &self.candidates {
            if !path.is_file() {
                continue;
            }
            match FontHandle::load(path) {
                Ok(handle) => {
                    log::info!("Using font {}", path.display());
                    return Ok(handle);
                }
                Err(e) => log::warn!("Skipping unusable font {}: {}", path.display(), e),
            }
        }

        Err(SynthError::NoFontAvailable {
            searched: self.candidates.len(),
        })
    }
}

/// Набор шрифтов; для каждого образца выбирается один.
///
/// Всегда содержит хотя бы один шрифт.
#[derive(Debug, Clone)]
pub struct FontPool<R = FontHandle> {
    fonts: Vec<R>,
}

impl<R> FontPool<R> {
    pub fn new(fonts: Vec<R>) -> Result<Self> {
        if fonts.is_empty() {
            return Err(SynthError::NoFontAvailable { searched: 0 });
        }
        Ok(Self { fonts })
    }

    pub fn single(font: R) -> Self {
        Self { fonts: vec![font] }
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn fonts(&self) -> &[R] {
        &self.fonts
    }

    /// Шрифт по умолчанию (первый)
    pub fn primary(&self) -> &R {
        &self.fonts[0]
    }

    /// Равновероятный выбор; при одном шрифте генератор не трогается
    pub fn choose<G: Rng + ?Sized>(&self, rng: &mut G) -> &R {
        if self.fonts.len() == 1 {
            return self.primary();
        }
        &self.fonts[rng.gen_range(0..self.fonts.len())]
    }
}

impl FontPool<FontHandle> {
    /// Все `.ttf` / `.otf` файлы каталога в порядке имён.
    /// Нечитаемые файлы пропускаются с предупреждением.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_font_file(path))
            .collect();
        paths.sort();

        let mut fonts = Vec::with_capacity(paths.len());
        for path in &paths {
            match FontHandle::load(path) {
                Ok(font) => fonts.push(font),
                Err(e) => log::warn!("Skipping unusable font {}: {}", path.display(), e),
            }
        }

        if fonts.is_empty() {
            return Err(SynthError::NoFontAvailable {
                searched: paths.len(),
            });
        }
        log::info!("Loaded {} fonts from {}", fonts.len(), dir.display());
        Ok(Self { fonts })
    }
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf"))
}
