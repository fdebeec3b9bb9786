//! Demo: fill a synthetic form and save clean, scanned and photographed variants
//!
//! Usage: cargo run -p docsynth-core --example render_demo

use docsynth_core::{
    AnnotationParser, AugmentationConfig, AugmentationPipeline, BlockRasterizer, DocumentRecord,
    DocumentRenderer, FontResolver, PipelineKind, TextRasterizer,
};
use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;

const ANNOTATIONS: &str = r#"<annotations>
  <image id="0" name="form.png" width="640" height="400">
    <box label="surname" xtl="60" ytl="60" xbr="420" ybr="100"/>
    <box label="name" xtl="60" ytl="120" xbr="420" ybr="160"/>
    <box label="birth_date" xtl="60" ytl="180" xbr="260" ybr="220" rotation="3"/>
    <polygon label="birth_place" points="60,240;500,250;499,290;59,280"/>
    <box label="passport_number" xtl="560" ytl="40" xbr="600" ybr="360"/>
  </image>
</annotations>"#;

fn main() {
    let output_dir = Path::new("generated_demo");
    fs::create_dir_all(output_dir).unwrap();

    // Ruled blank form
    let template = RgbaImage::from_fn(640, 400, |_, y| {
        if y % 60 == 59 {
            Rgba([180, 190, 210, 255])
        } else {
            Rgba([248, 246, 240, 255])
        }
    });
    let boxes = AnnotationParser::new().parse_str(ANNOTATIONS).unwrap();

    let rasterizer: Box<dyn TextRasterizer> = match FontResolver::new().resolve() {
        Ok(font) => Box::new(font),
        Err(e) => {
            println!("{}, falling back to block glyphs", e);
            Box::new(BlockRasterizer::default())
        }
    };

    let record: DocumentRecord = [
        ("surname", "СМИРНОВА"),
        ("name", "АННА"),
        ("birth_date", "12.04.1991"),
        ("birth_place", "ГОР. ЕКАТЕРИНБУРГ"),
        ("passport_number", "6512 345678"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let sample = DocumentRenderer::default().render(&template, &boxes, record, rasterizer.as_ref());
    sample.image.save(output_dir.join("clean.png")).unwrap();

    let config = AugmentationConfig {
        effect_probability: 1.0,
        ..AugmentationConfig::default()
    };
    let mut rng = StdRng::seed_from_u64(2024);
    for kind in [PipelineKind::Scan, PipelineKind::Photo] {
        let pipeline = AugmentationPipeline::for_kind(kind, &config).unwrap();
        let degraded = pipeline.process(sample.image.clone(), &mut rng);
        let name = format!("{:?}.png", kind).to_lowercase();
        degraded.save(output_dir.join(&name)).unwrap();
        println!("Saved {}", name);
    }
}
