//! docsynth - пакетная генерация синтетических документов
//!
//! Для каждого образца берётся очередная запись из JSONL, поля рисуются
//! на шаблоне по разметке CVAT, результат с заданной вероятностью
//! деградирует и сохраняется парой `<prefix>_<n>.png` + `<prefix>_<n>.json`.

mod config;
mod output;
mod records;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use docsynth_core::{
    load_template, AnnotationParser, DocumentSynthesizer, FontPool, FontResolver,
    GroundTruthFormat, PipelineKind,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::GeneratorConfig;
use crate::output::SampleWriter;

/// Имитируемое устройство съёмки
#[derive(Copy, Clone, Debug, ValueEnum)]
enum Pipeline {
    /// Планшетный сканер: повороты, перекос, шум, экспозиция, бинаризация
    Scan,
    /// Камера телефона: расфокус, смаз, шум, потеря разрешения, JPEG
    Photo,
}

impl From<Pipeline> for PipelineKind {
    fn from(value: Pipeline) -> Self {
        match value {
            Pipeline::Scan => PipelineKind::Scan,
            Pipeline::Photo => PipelineKind::Photo,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "docsynth",
    version,
    about = "Генерация размеченных изображений документов по шаблону"
)]
struct Args {
    /// Изображение пустого бланка
    #[arg(long)]
    template: PathBuf,

    /// Разметка полей в формате CVAT XML
    #[arg(long)]
    annotations: PathBuf,

    /// Имя изображения внутри разметки (по умолчанию первое)
    #[arg(long)]
    image_name: Option<String>,

    /// Значения полей, один JSON-объект на строку
    #[arg(long)]
    records: PathBuf,

    /// Каталог вывода
    #[arg(long, default_value = "generated")]
    out: PathBuf,

    /// Число образцов; записи используются по кругу
    #[arg(long, default_value_t = 1)]
    count: usize,

    /// Префикс имён файлов
    #[arg(long, default_value = "sample")]
    prefix: String,

    #[arg(long, value_enum, default_value_t = Pipeline::Scan)]
    pipeline: Pipeline,

    /// Вероятность деградации образца
    #[arg(long)]
    aug_prob: Option<f64>,

    /// Вероятность каждого шага деградации
    #[arg(long)]
    aug_internal_prob: Option<f64>,

    /// Дополнительный шрифт (проверяется раньше системных)
    #[arg(long = "font")]
    fonts: Vec<PathBuf>,

    /// Каталог шрифтов; для каждого образца выбирается случайный
    #[arg(long, conflicts_with = "fonts")]
    fonts_dir: Option<PathBuf>,

    /// Случайное зерно для воспроизводимости
    #[arg(long)]
    seed: Option<u64>,

    /// JSON с настройками отрисовки и деградации
    #[arg(long)]
    config: Option<PathBuf>,

    /// Эталон в обёртке `gt_parse`
    #[arg(long, default_value_t = false)]
    donut: bool,

    /// Дополнительно записать metadata.jsonl
    #[arg(long, default_value_t = false)]
    metadata: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => GeneratorConfig::load(path)?,
        None => GeneratorConfig::default(),
    }
    .with_overrides(args.aug_prob, args.aug_internal_prob);

    let fonts = match &args.fonts_dir {
        Some(dir) => FontPool::load_dir(dir)
            .with_context(|| format!("failed to load fonts from {}", dir.display()))?,
        None => {
            let resolver = args
                .fonts
                .iter()
                .rev()
                .fold(FontResolver::new(), |resolver, path| resolver.prefer(path));
            FontPool::single(resolver.resolve().context("cannot render text without a font")?)
        }
    };

    let mut parser = AnnotationParser::new();
    if let Some(name) = &args.image_name {
        parser = parser.with_image_name(name.clone());
    }
    let boxes = parser
        .load(&args.annotations)
        .with_context(|| format!("failed to load annotations {}", args.annotations.display()))?;
    log::info!(
        "Loaded {} boxes for {} labels",
        boxes.box_count(),
        boxes.len()
    );

    let template = load_template(&args.template)?;
    let records = records::load_records(&args.records)?;
    anyhow::ensure!(
        !records.is_empty(),
        "no records found in {}",
        args.records.display()
    );

    let synthesizer = DocumentSynthesizer::with_fonts(
        template,
        boxes,
        fonts,
        config.renderer,
        args.pipeline.into(),
        config.augmentation,
    )?;

    let format = if args.donut {
        GroundTruthFormat::Donut
    } else {
        GroundTruthFormat::Plain
    };
    let writer = SampleWriter::new(&args.out, args.prefix.clone(), format)?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(rand::thread_rng()).context("failed to seed StdRng")?,
    };

    log::info!(
        "Generating {} samples into {}",
        args.count,
        writer.dir().display()
    );

    let mut metadata = Vec::new();
    let mut failed = 0usize;
    for (index, record) in records.iter().cycle().take(args.count).enumerate() {
        let number = index + 1;
        let sample = synthesizer.synthesize(record.clone(), &mut rng);
        match writer.write(number, &sample) {
            Ok(written) => {
                log::info!("[{}/{}] {}", number, args.count, written.image_path.display());
                metadata.push(written.metadata);
            }
            Err(e) => {
                failed += 1;
                log::error!("Sample {} failed: {:#}", number, e);
            }
        }
    }

    if args.metadata {
        let path = writer.write_metadata(&metadata)?;
        log::info!("Wrote {}", path.display());
    }

    log::info!(
        "Done: {} written, {} failed",
        args.count - failed,
        failed
    );
    anyhow::ensure!(
        args.count == 0 || failed < args.count,
        "all {} samples failed",
        args.count
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "docsynth",
            "--template",
            "blank.png",
            "--annotations",
            "annotations.xml",
            "--records",
            "people.jsonl",
            "--pipeline",
            "photo",
            "--font",
            "a.ttf",
            "--font",
            "b.ttf",
            "--count",
            "5",
            "--donut",
        ])
        .unwrap();

        assert!(matches!(PipelineKind::from(args.pipeline), PipelineKind::Photo));
        assert_eq!(args.fonts.len(), 2);
        assert_eq!(args.count, 5);
        assert_eq!(args.prefix, "sample");
        assert!(args.donut && !args.metadata);
        assert!(args.fonts_dir.is_none());
    }

    #[test]
    fn test_fonts_dir_arg() {
        let args = Args::try_parse_from([
            "docsynth",
            "--template",
            "blank.png",
            "--annotations",
            "annotations.xml",
            "--records",
            "people.jsonl",
            "--fonts-dir",
            "fonts/handwritten",
        ])
        .unwrap();
        assert_eq!(args.fonts_dir, Some(PathBuf::from("fonts/handwritten")));
        assert!(args.fonts.is_empty());

        let both = Args::try_parse_from([
            "docsynth",
            "--template",
            "blank.png",
            "--annotations",
            "annotations.xml",
            "--records",
            "people.jsonl",
            "--font",
            "a.ttf",
            "--fonts-dir",
            "fonts",
        ]);
        assert!(both.is_err());
    }

    #[test]
    fn test_required_args() {
        assert!(Args::try_parse_from(["docsynth", "--template", "blank.png"]).is_err());
    }
}
