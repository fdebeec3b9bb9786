//! Эталонная разметка образцов
//!
//! Запись сохраняется рядом с изображением как JSON: либо как есть,
//! либо обёрнутой в `gt_parse` для моделей разбора документов (Donut).
//! Для обучающего набора собирается `metadata.jsonl`.

use std::io::Write;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DocumentRecord, Result, SynthError};

const DONUT_KEY: &str = "gt_parse";

/// Формат файла эталона
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroundTruthFormat {
    /// Плоский объект `{метка: значение}`
    #[default]
    Plain,
    /// `{"gt_parse": {метка: значение}}`
    Donut,
}

#[derive(Serialize)]
struct DonutWrapper<'a> {
    gt_parse: &'a DocumentRecord,
}

/// Сериализация записи в JSON (с отступами, кириллица без экранирования)
pub fn to_json(record: &DocumentRecord, format: GroundTruthFormat) -> Result<String> {
    let json = match format {
        GroundTruthFormat::Plain => serde_json::to_string_pretty(record)?,
        GroundTruthFormat::Donut => serde_json::to_string_pretty(&DonutWrapper { gt_parse: record })?,
    };
    Ok(json)
}

/// Разбор эталона в любом из форматов
pub fn from_json(text: &str) -> Result<DocumentRecord> {
    let value: Value = serde_json::from_str(text)?;
    let inner = match value {
        Value::Object(mut map) if map.len() == 1 && map.get(DONUT_KEY).map_or(false, Value::is_object) => {
            map.remove(DONUT_KEY).unwrap_or(Value::Null)
        }
        Value::Object(map) => Value::Object(map),
        other => {
            return Err(SynthError::InvalidConfig(format!(
                "ground truth must be a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };
    Ok(serde_json::from_value(inner)?)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Строка `metadata.jsonl`: имя файла и эталон Donut в виде JSON-строки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub file_name: String,
    pub ground_truth: String,
}

impl MetadataEntry {
    pub fn new(file_name: impl Into<String>, record: &DocumentRecord) -> Result<Self> {
        Ok(Self {
            file_name: file_name.into(),
            ground_truth: serde_json::to_string(&DonutWrapper { gt_parse: record })?,
        })
    }

    /// Запись, закодированная в `ground_truth`
    pub fn record(&self) -> Result<DocumentRecord> {
        from_json(&self.ground_truth)
    }
}

/// Запись манифеста: по одному JSON-объекту на строку
pub fn write_metadata<W: Write>(entries: &[MetadataEntry], mut writer: W) -> Result<()> {
    for entry in entries {
        serde_json::to_writer(&mut writer, entry)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
