//! Запись образцов на диск
//!
//! Изображение и эталон сначала пишутся во временные файлы в каталоге
//! назначения и только затем переименовываются: частично записанных
//! файлов под итоговыми именами не бывает. Переименование идёт в порядке
//! PNG, затем JSON; прерывание между ними оставляет PNG без эталона.
//! Наличие `<stem>.json` означает готовую пару.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use docsynth_core::ground_truth::{self, GroundTruthFormat, MetadataEntry};
use docsynth_core::RenderedSample;
use image::ImageFormat;
use tempfile::NamedTempFile;

/// Пути записанной пары
#[derive(Debug, Clone)]
pub struct WrittenSample {
    pub image_path: PathBuf,
    pub json_path: PathBuf,
    pub metadata: MetadataEntry,
}

#[derive(Debug, Clone)]
pub struct SampleWriter {
    dir: PathBuf,
    prefix: String,
    format: GroundTruthFormat,
}

impl SampleWriter {
    pub fn new(dir: &Path, prefix: impl Into<String>, format: GroundTruthFormat) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output dir {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            prefix: prefix.into(),
            format,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Имя файла без расширения, нумерация с единицы
    pub fn file_stem(&self, number: usize) -> String {
        format!("{}_{}", self.prefix, number)
    }

    /// Запись пары `<stem>.png` + `<stem>.json`; JSON появляется последним
    pub fn write(&self, number: usize, sample: &RenderedSample) -> Result<WrittenSample> {
        let stem = self.file_stem(number);
        let image_path = self.dir.join(format!("{stem}.png"));
        let json_path = self.dir.join(format!("{stem}.json"));

        let image_tmp = self.temp_file(".png")?;
        sample
            .image
            .save_with_format(image_tmp.path(), ImageFormat::Png)
            .with_context(|| format!("failed to encode {}", image_path.display()))?;

        let json = ground_truth::to_json(&sample.record, self.format)?;
        let mut json_tmp = self.temp_file(".json")?;
        json_tmp.write_all(json.as_bytes())?;
        json_tmp.flush()?;

        image_tmp
            .persist(&image_path)
            .with_context(|| format!("failed to finalize {}", image_path.display()))?;
        json_tmp
            .persist(&json_path)
            .with_context(|| format!("failed to finalize {}", json_path.display()))?;

        let metadata = MetadataEntry::new(format!("{stem}.png"), &sample.record)?;
        Ok(WrittenSample {
            image_path,
            json_path,
            metadata,
        })
    }

    /// `metadata.jsonl` в каталоге вывода
    pub fn write_metadata(&self, entries: &[MetadataEntry]) -> Result<PathBuf> {
        let path = self.dir.join("metadata.jsonl");
        let tmp = self.temp_file(".jsonl")?;
        ground_truth::write_metadata(entries, tmp.as_file())?;
        tmp.persist(&path)
            .with_context(|| format!("failed to finalize {}", path.display()))?;
        Ok(path)
    }

    fn temp_file(&self, suffix: &str) -> Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix(".docsynth-")
            .suffix(suffix)
            .tempfile_in(&self.dir)
            .with_context(|| format!("failed to create temp file in {}", self.dir.display()))
    }
}
