//! Модуль загрузки разметки полей
//!
//! Читает CVAT XML (формат "CVAT for images 1.1"): прямоугольники `<box>`
//! и полигоны `<polygon>` с необязательным атрибутом `rotation`.
//! Любая фигура сразу приводится к `FieldBox`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::geometry::{FieldBox, Point};
use crate::{Result, SynthError};

const UNLABELED: &str = "<unlabeled>";

/// Исходная фигура разметки
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Прямоугольник по двум углам
    Rect {
        label: String,
        top_left: Point,
        bottom_right: Point,
        rotation: Option<f32>,
    },
    /// Полигон по списку вершин
    Polygon {
        label: String,
        points: Vec<Point>,
        rotation: Option<f32>,
    },
}

impl Primitive {
    pub fn label(&self) -> &str {
        match self {
            Primitive::Rect { label, .. } | Primitive::Polygon { label, .. } => label,
        }
    }

    /// Нормализация в `FieldBox`; отсутствующий поворот считается нулевым
    pub fn into_field_box(self) -> Result<FieldBox> {
        match self {
            Primitive::Rect {
                label,
                top_left,
                bottom_right,
                rotation,
            } => FieldBox::new(label, top_left, bottom_right, rotation.unwrap_or(0.0)),
            Primitive::Polygon {
                label,
                points,
                rotation,
            } => FieldBox::bounding(label, &points, rotation.unwrap_or(0.0)),
        }
    }
}

/// Набор полей шаблона: метка -> боксы в порядке документа
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldBoxSet {
    boxes: BTreeMap<String, Vec<FieldBox>>,
}

impl FieldBoxSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавление бокса; повторная метка дописывается в конец списка
    pub fn insert(&mut self, field: FieldBox) {
        self.boxes
            .entry(field.label().to_string())
            .or_default()
            .push(field);
    }

    pub fn get(&self, label: &str) -> Option<&[FieldBox]> {
        self.boxes.get(label).map(Vec::as_slice)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.boxes.contains_key(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.boxes.keys().map(String::as_str)
    }

    /// Обход в порядке меток
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FieldBox])> {
        self.boxes
            .iter()
            .map(|(label, boxes)| (label.as_str(), boxes.as_slice()))
    }

    /// Количество различных меток
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Общее количество боксов по всем меткам
    pub fn box_count(&self) -> usize {
        self.boxes.values().map(Vec::len).sum()
    }
}

impl FromIterator<FieldBox> for FieldBoxSet {
    fn from_iter<I: IntoIterator<Item = FieldBox>>(iter: I) -> Self {
        let mut set = FieldBoxSet::new();
        for field in iter {
            set.insert(field);
        }
        set
    }
}

/// Парсер разметки CVAT
#[derive(Debug, Clone, Default)]
pub struct AnnotationParser {
    /// Имя `<image name=...>`, из которого брать фигуры; по умолчанию первое
    image_name: Option<String>,
}

impl AnnotationParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Выбор страницы по атрибуту `name`
    pub fn with_image_name(mut self, name: impl Into<String>) -> Self {
        self.image_name = Some(name.into());
        self
    }

    /// Загрузка разметки из файла
    pub fn load(&self, path: &Path) -> Result<FieldBoxSet> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SynthError::AnnotationNotFound(path.to_path_buf()),
            _ => SynthError::Io(e),
        })?;

        let boxes = self.parse_str(&content)?;
        log::info!(
            "Loaded {} fields ({} boxes) from {}",
            boxes.len(),
            boxes.box_count(),
            path.display()
        );
        Ok(boxes)
    }

    /// Разбор разметки из строки
    pub fn parse_str(&self, xml: &str) -> Result<FieldBoxSet> {
        let boxes = self
            .primitives(xml)?
            .into_iter()
            .map(Primitive::into_field_box)
            .collect::<Result<FieldBoxSet>>()?;

        if boxes.is_empty() {
            log::warn!("Annotation document contains no boxes or polygons");
        } else {
            log::debug!("Annotated fields: {:?}", boxes.labels().collect::<Vec<_>>());
        }
        Ok(boxes)
    }

    /// Извлечение фигур выбранной страницы
    pub fn primitives(&self, xml: &str) -> Result<Vec<Primitive>> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut primitives = Vec::new();
        let mut in_target = false;
        let mut target_seen = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"image" => {
                        in_target = !target_seen && self.is_target_image(&e)?;
                        target_seen |= in_target;
                    }
                    b"box" | b"polygon" if in_target => primitives.push(read_primitive(&e)?),
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"image" => {
                        // An empty target page still counts as the chosen one
                        if !target_seen && self.is_target_image(&e)? {
                            target_seen = true;
                        }
                    }
                    b"box" | b"polygon" if in_target => primitives.push(read_primitive(&e)?),
                    _ => {}
                },
                Ok(Event::End(e)) if e.name().as_ref() == b"image" => {
                    if in_target {
                        break;
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(SynthError::invalid_annotation(
                        "<document>",
                        format!("XML error at position {}: {}", reader.buffer_position(), e),
                    ))
                }
                _ => {}
            }
        }

        if let (Some(name), false) = (&self.image_name, target_seen) {
            log::warn!("Image '{}' not found in annotation document", name);
        }

        Ok(primitives)
    }

    fn is_target_image(&self, element: &BytesStart) -> Result<bool> {
        match &self.image_name {
            None => Ok(true),
            Some(name) => {
                let attrs = attributes(element, "<image>")?;
                Ok(attrs.get("name") == Some(name))
            }
        }
    }
}

/// Чтение атрибутов элемента в словарь
fn attributes(element: &BytesStart, context: &str) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| {
            SynthError::invalid_annotation(context, format!("malformed attribute: {e}"))
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| SynthError::invalid_annotation(context, format!("bad attribute value: {e}")))?
            .into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

fn read_primitive(element: &BytesStart) -> Result<Primitive> {
    let attrs = attributes(element, UNLABELED)?;
    let label = attrs
        .get("label")
        .cloned()
        .ok_or_else(|| SynthError::invalid_annotation(UNLABELED, "missing label attribute"))?;

    let rotation = match attrs.get("rotation") {
        Some(raw) => Some(parse_number(&label, "rotation", raw)?),
        None => None,
    };

    match element.name().as_ref() {
        b"box" => {
            let coord = |name: &str| -> Result<f32> {
                let raw = attrs.get(name).ok_or_else(|| {
                    SynthError::invalid_annotation(&label, format!("missing attribute '{name}'"))
                })?;
                parse_number(&label, name, raw)
            };
            Ok(Primitive::Rect {
                top_left: Point::new(coord("xtl")?, coord("ytl")?),
                bottom_right: Point::new(coord("xbr")?, coord("ybr")?),
                rotation,
                label,
            })
        }
        _ => {
            let raw = attrs.get("points").ok_or_else(|| {
                SynthError::invalid_annotation(&label, "missing attribute 'points'")
            })?;
            let points = parse_points(&label, raw)?;
            Ok(Primitive::Polygon {
                label,
                points,
                rotation,
            })
        }
    }
}

fn parse_number(label: &str, name: &str, raw: &str) -> Result<f32> {
    let value: f32 = raw.trim().parse().map_err(|_| {
        SynthError::invalid_annotation(label, format!("'{name}' is not a number: '{raw}'"))
    })?;
    if !value.is_finite() {
        return Err(SynthError::invalid_annotation(
            label,
            format!("'{name}' is not finite: '{raw}'"),
        ));
    }
    Ok(value)
}

/// Формат CVAT: `x1,y1;x2,y2;...`
fn parse_points(label: &str, raw: &str) -> Result<Vec<Point>> {
    raw.split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (x, y) = pair.split_once(',').ok_or_else(|| {
                SynthError::invalid_annotation(label, format!("malformed vertex '{pair}'"))
            })?;
            Ok(Point::new(
                parse_number(label, "points", x)?,
                parse_number(label, "points", y)?,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<annotations>
  <version>1.1</version>
  <image id="0" name="passport.jpg" width="800" height="1100">
    <box label="surname" occluded="0" source="manual" xtl="120.5" ytl="300.0" xbr="420.0" ybr="330.0" z_order="0">
    </box>
    <box label="passport_number" source="manual" xtl="700" ytl="100" xbr="730" ybr="400" rotation="5.5"/>
    <polygon label="birthPlace" source="manual" points="100.0,500.0;300.0,495.0;302.0,530.0;98.0,533.0" z_order="0"/>
    <polygon label="birthPlace" points="100,600;300,600;300,640" rotation="-3"/>
  </image>
  <image id="1" name="second.jpg" width="10" height="10">
    <box label="ignored" xtl="0" ytl="0" xbr="5" ybr="5"/>
  </image>
</annotations>"#;

    #[test]
    fn test_parse_boxes_and_polygons() {
        let set = AnnotationParser::new().parse_str(SAMPLE).unwrap();

        assert_eq!(set.len(), 3);
        assert_eq!(set.box_count(), 4);
        assert!(!set.contains("ignored"));

        let surname = &set.get("surname").unwrap()[0];
        assert_eq!(surname.top_left(), Point::new(120.5, 300.0));
        assert_eq!(surname.rotation(), 0.0);

        let number = &set.get("passport_number").unwrap()[0];
        assert_eq!(number.rotation(), 5.5);
        assert_eq!(number.height(), 300.0);

        let places = set.get("birthPlace").unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].top_left(), Point::new(98.0, 495.0));
        assert_eq!(places[0].bottom_right(), Point::new(302.0, 533.0));
        assert_eq!(places[0].rotation(), 0.0);
        assert_eq!(places[1].rotation(), -3.0);
    }

    #[test]
    fn test_select_image_by_name() {
        let set = AnnotationParser::new()
            .with_image_name("second.jpg")
            .parse_str(SAMPLE)
            .unwrap();
        assert_eq!(set.labels().collect::<Vec<_>>(), vec!["ignored"]);
    }

    #[test]
    fn test_non_numeric_coordinate_names_label() {
        let xml = r#"<annotations><image name="a"><box label="issue_date" xtl="abc" ytl="0" xbr="10" ybr="10"/></image></annotations>"#;
        let err = AnnotationParser::new().parse_str(xml).unwrap_err();
        match err {
            SynthError::InvalidAnnotation { label, reason } => {
                assert_eq!(label, "issue_date");
                assert!(reason.contains("xtl"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_zero_area_polygon_rejected() {
        let xml = r#"<annotations><image name="a"><polygon label="flat" points="0,5;10,5;20,5"/></image></annotations>"#;
        let err = AnnotationParser::new().parse_str(xml).unwrap_err();
        assert!(matches!(err, SynthError::InvalidAnnotation { ref label, .. } if label == "flat"));
    }

    #[test]
    fn test_missing_corner_rejected() {
        let xml = r#"<annotations><image name="a"><box label="sex" xtl="0" ytl="0" xbr="10"/></image></annotations>"#;
        let err = AnnotationParser::new().parse_str(xml).unwrap_err();
        assert!(matches!(err, SynthError::InvalidAnnotation { ref label, .. } if label == "sex"));
    }

    #[test]
    fn test_empty_document() {
        let set = AnnotationParser::new()
            .parse_str("<annotations><image name=\"a\"/></annotations>")
            .unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = AnnotationParser::new()
            .load(Path::new("/definitely/not/here/annotations.xml"))
            .unwrap_err();
        assert!(matches!(err, SynthError::AnnotationNotFound(_)));
    }
}
