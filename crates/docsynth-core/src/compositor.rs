//! Модуль наложения текста
//!
//! Текст рисуется на квадратном прозрачном слое, поворачивается с
//! расширением холста и вклеивается в шаблон так, чтобы центр слоя
//! совпал с центром бокса.

use image::{imageops, Rgb, Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate, Interpolation};
use serde::{Deserialize, Serialize};

use crate::font::{FieldClass, FontSizer, TextRasterizer};
use crate::geometry::{is_full_turn, rotated_extent, FieldBox, Point};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Конфигурация наложения
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Сторона слоя относительно большей стороны бокса
    pub layer_scale: f32,
    /// Смещение тени в пикселях (вправо и вниз)
    pub shadow_offset: i32,
    /// Цвет тени под основным начертанием
    pub shadow_color: [u8; 3],
    /// Дополнительный поворот вертикальных полей, градусы
    pub vertical_turn: f32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            layer_scale: 2.0,
            shadow_offset: 1,
            shadow_color: [100, 100, 100],
            vertical_turn: 90.0,
        }
    }
}

/// Отрисовщик одного поля
#[derive(Debug, Clone, Default)]
pub struct TextCompositor {
    config: CompositorConfig,
    sizer: FontSizer,
}

impl TextCompositor {
    pub fn new(config: CompositorConfig, sizer: FontSizer) -> Self {
        Self { config, sizer }
    }

    pub fn sizer(&self) -> &FontSizer {
        &self.sizer
    }

    /// Угол поворота слоя против часовой стрелки, градусы.
    ///
    /// В разметке поворот положительный по часовой стрелке, поэтому знак
    /// меняется; вертикальные поля дополнительно доворачиваются на
    /// `vertical_turn`, чтобы строка легла вдоль длинной стороны.
    pub fn applied_rotation(&self, field: &FieldBox, class: FieldClass) -> f32 {
        let angle = -field.rotation();
        match class {
            FieldClass::Vertical => angle - self.config.vertical_turn,
            FieldClass::Horizontal => angle,
        }
    }

    /// Наложение текста на `base` в месте бокса. Пустой текст пропускается.
    pub fn composite<R: TextRasterizer + ?Sized>(
        &self,
        base: &mut RgbaImage,
        rasterizer: &R,
        field: &FieldBox,
        class: FieldClass,
        text: &str,
        color: Rgb<u8>,
    ) {
        let Some(layer) = self.render_layer(rasterizer, field, class, text, color) else {
            log::debug!("Skipping empty value for '{}'", field.label());
            return;
        };

        let (x, y) = paste_centered(base, &layer, field.center());
        log::debug!(
            "'{}': {}x{} layer at ({}, {}), rotation {:.1}",
            field.label(),
            layer.width(),
            layer.height(),
            x,
            y,
            self.applied_rotation(field, class)
        );
    }

    /// Повёрнутый слой с текстом поля; `None` для пустого текста
    pub fn render_layer<R: TextRasterizer + ?Sized>(
        &self,
        rasterizer: &R,
        field: &FieldBox,
        class: FieldClass,
        text: &str,
        color: Rgb<u8>,
    ) -> Option<RgbaImage> {
        if text.trim().is_empty() {
            return None;
        }

        let size = self.sizer.size_for(field, class) as f32;
        let glyphs = self.draw_glyphs(rasterizer, text, size, color);
        let (gx, gy, gw, gh) = ink_bounds(&glyphs)?;

        let margin = 2 * (self.config.shadow_offset.unsigned_abs() + 1);
        let side = ((field.max_side() * self.config.layer_scale).ceil() as u32)
            .max(gw + margin)
            .max(gh + margin);
        // Та же чётность, что у габарита чернил: центр чернил совпадает с центром слоя
        let side = side + (side - gw) % 2;

        let mut layer = RgbaImage::from_pixel(side, side, TRANSPARENT);
        let dx = ((side - gw) / 2) as i64 - gx as i64;
        let dy = ((side - gh) / 2) as i64 - gy as i64;
        imageops::replace(&mut layer, &glyphs, dx, dy);

        Some(rotate_expanded(&layer, self.applied_rotation(field, class)))
    }

    /// Строка с тенью на черновом холсте с запасом под выносные элементы
    fn draw_glyphs<R: TextRasterizer + ?Sized>(
        &self,
        rasterizer: &R,
        text: &str,
        size: f32,
        color: Rgb<u8>,
    ) -> RgbaImage {
        let (text_w, text_h) = rasterizer.measure(text, size);
        let offset = self.config.shadow_offset;
        let pad = size.ceil() as u32 + offset.unsigned_abs();
        let mut glyphs = RgbaImage::from_pixel(text_w + 2 * pad, text_h + 2 * pad, TRANSPARENT);
        let origin = pad as i32;

        let [sr, sg, sb] = self.config.shadow_color;
        if offset != 0 {
            rasterizer.draw(
                &mut glyphs,
                origin + offset,
                origin + offset,
                size,
                Rgba([sr, sg, sb, 255]),
                text,
            );
        }
        let Rgb([r, g, b]) = color;
        rasterizer.draw(&mut glyphs, origin, origin, size, Rgba([r, g, b, 255]), text);
        glyphs
    }
}

/// Рамка непрозрачных пикселей `(x, y, ширина, высота)`; `None` для пустого холста
fn ink_bounds(image: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, p) in image.enumerate_pixels() {
        if p.0[3] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds.map(|(x0, y0, x1, y1)| (x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

/// Поворот слоя против часовой стрелки с расширением холста
pub fn rotate_expanded(layer: &RgbaImage, ccw_degrees: f32) -> RgbaImage {
    if is_full_turn(ccw_degrees) {
        return layer.clone();
    }

    let (w, h) = layer.dimensions();
    let (rw, rh) = rotated_extent(w, h, ccw_degrees);
    // Чётность как у слоя, чтобы слой встал точно посередине
    let canvas_w = rw.max(w) + (rw.max(w) - w) % 2;
    let canvas_h = rh.max(h) + (rh.max(h) - h) % 2;

    let mut canvas = RgbaImage::from_pixel(canvas_w, canvas_h, TRANSPARENT);
    imageops::replace(
        &mut canvas,
        layer,
        ((canvas_w - w) / 2) as i64,
        ((canvas_h - h) / 2) as i64,
    );

    // Центр в индексах пикселей; imageproc вращает по часовой при theta > 0
    let center = (
        (canvas_w as f32 - 1.0) / 2.0,
        (canvas_h as f32 - 1.0) / 2.0,
    );
    rotate(
        &canvas,
        center,
        (-ccw_degrees).to_radians(),
        Interpolation::Bicubic,
        TRANSPARENT,
    )
}

/// Альфа-наложение слоя центром в точку `center`; возвращает левый верхний угол
pub fn paste_centered(base: &mut RgbaImage, layer: &RgbaImage, center: Point) -> (i64, i64) {
    let x = (center.x - layer.width() as f32 / 2.0).round() as i64;
    let y = (center.y - layer.height() as f32 / 2.0).round() as i64;
    imageops::overlay(base, layer, x, y);
    (x, y)
}
