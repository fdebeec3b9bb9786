//! Геометрия полей шаблона
//!
//! Нормализованный прямоугольник поля (`FieldBox`) и вспомогательные
//! функции для расчёта габаритов повёрнутого слоя.

use serde::{Deserialize, Serialize};

use crate::{Result, SynthError};

/// Точка в пиксельных координатах шаблона
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Размеченная область шаблона, в которую вписывается значение поля.
///
/// Поворот хранится в градусах, положительное направление - по часовой
/// стрелке (как в CVAT). После создания не изменяется.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBox {
    label: String,
    top_left: Point,
    bottom_right: Point,
    rotation: f32,
}

impl FieldBox {
    /// Создание бокса по двум углам с проверкой инвариантов
    pub fn new(
        label: impl Into<String>,
        top_left: Point,
        bottom_right: Point,
        rotation: f32,
    ) -> Result<Self> {
        let label = label.into();
        let coords = [top_left.x, top_left.y, bottom_right.x, bottom_right.y];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(SynthError::invalid_annotation(&label, "non-finite coordinate"));
        }
        if !rotation.is_finite() {
            return Err(SynthError::invalid_annotation(&label, "non-finite rotation"));
        }
        if bottom_right.x <= top_left.x || bottom_right.y <= top_left.y {
            return Err(SynthError::invalid_annotation(
                &label,
                format!(
                    "zero-area box ({}, {}) - ({}, {})",
                    top_left.x, top_left.y, bottom_right.x, bottom_right.y
                ),
            ));
        }

        Ok(Self {
            label,
            top_left,
            bottom_right,
            rotation,
        })
    }

    /// Осевой ограничивающий прямоугольник набора вершин.
    /// Сам прямоугольник не поворачивается, `rotation` применяется только к тексту.
    pub fn bounding(label: impl Into<String>, points: &[Point], rotation: f32) -> Result<Self> {
        let label = label.into();
        if points.is_empty() {
            return Err(SynthError::invalid_annotation(&label, "polygon without vertices"));
        }

        let mut min = Point::new(f32::INFINITY, f32::INFINITY);
        let mut max = Point::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
        for p in points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }

        Self::new(label, min, max, rotation)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn top_left(&self) -> Point {
        self.top_left
    }

    pub fn bottom_right(&self) -> Point {
        self.bottom_right
    }

    /// Поворот в градусах, по часовой стрелке
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn width(&self) -> f32 {
        self.bottom_right.x - self.top_left.x
    }

    pub fn height(&self) -> f32 {
        self.bottom_right.y - self.top_left.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.top_left.x + self.bottom_right.x) / 2.0,
            (self.top_left.y + self.bottom_right.y) / 2.0,
        )
    }

    /// Большая из сторон бокса
    pub fn max_side(&self) -> f32 {
        self.width().max(self.height())
    }
}

/// Габариты прямоугольника `width x height` после поворота на `degrees`
pub fn rotated_extent(width: u32, height: u32, degrees: f32) -> (u32, u32) {
    let theta = degrees.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let w = width as f32;
    let h = height as f32;

    // Guard against float noise turning an exact quarter turn into +1px
    let new_w = (w * cos + h * sin - 1e-3).ceil().max(1.0) as u32;
    let new_h = (w * sin + h * cos - 1e-3).ceil().max(1.0) as u32;
    (new_w, new_h)
}

/// Приводит угол к диапазону [0, 360)
pub fn normalize_degrees(degrees: f32) -> f32 {
    degrees.rem_euclid(360.0)
}

/// Угол кратен полному обороту (с точностью до долей градуса)
pub fn is_full_turn(degrees: f32) -> bool {
    let normalized = normalize_degrees(degrees);
    normalized < 1e-3 || 360.0 - normalized < 1e-3
}
