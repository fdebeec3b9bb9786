//! Чтение записей значений полей (JSON Lines)

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use docsynth_core::DocumentRecord;
use serde_json::Value;

/// Одна запись на строку: объект `{метка: значение}`.
/// Пустые строки пропускаются, числа и логические значения приводятся к тексту.
pub fn load_records(path: &Path) -> Result<Vec<DocumentRecord>> {
    let file =
        File::open(path).with_context(|| format!("failed to open records {}", path.display()))?;
    read_records(BufReader::new(file))
        .with_context(|| format!("failed to read records {}", path.display()))
}

pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<DocumentRecord>> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("line {}: invalid JSON", index + 1))?;
        records.push(to_record(value).with_context(|| format!("line {}", index + 1))?);
    }
    Ok(records)
}

fn to_record(value: Value) -> Result<DocumentRecord> {
    let Value::Object(map) = value else {
        bail!("record must be a JSON object");
    };

    let mut record = DocumentRecord::new();
    for (label, value) in map {
        let text = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => continue,
            other => bail!("field '{}' must be a scalar, got {}", label, other),
        };
        record.insert(label, text);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_jsonl() {
        let input = "{\"surname\": \"Петрова\", \"age\": 7}\n\n{\"sex\": \"Ж\", \"note\": null}\n";
        let records = read_records(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["surname"], "Петрова");
        assert_eq!(records[0]["age"], "7");
        assert!(!records[1].contains_key("note"));
    }

    #[test]
    fn test_rejects_nested_values() {
        let err = read_records("{\"a\": [1]}".as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 1"));
    }

    #[test]
    fn test_rejects_non_object_line() {
        assert!(read_records("\"text\"".as_bytes()).is_err());
    }
}
