// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 AgroLens Contributors

//! One-page PDF damage report assembly

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::classifier::Prediction;
use crate::storage::StorageLayout;
use crate::{AgroLensError, Result};

const REPORT_TITLE: &str = "Flood Damage Report";

// US Letter, points
const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;

// Thumbnail placement matches the original report layout: 200x200 points
const THUMB_SIZE: f32 = 200.0;
const MARGIN: f32 = 72.0;

/// Format a confidence in [0,1] as a percentage with two decimals
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.2}%", confidence * 100.0)
}

/// JPEG-encoded thumbnail ready for embedding
struct Thumbnail {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

/// Re-encode the uploaded image as an RGB JPEG, downscaled for embedding
fn load_thumbnail(path: &Path) -> Result<Thumbnail> {
    let img = image::open(path)?;
    let img = if img.width() > 400 || img.height() > 400 {
        img.resize(400, 400, image::imageops::FilterType::Triangle)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut data = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut data);
    image::DynamicImage::ImageRgb8(rgb).write_to(&mut cursor, image::ImageFormat::Jpeg)?;

    Ok(Thumbnail { data, width, height })
}

/// Generate the PDF report for a stored upload.
///
/// The output path is derived from the stored name alone, so regenerating a
/// report for the same asset overwrites the previous file. A thumbnail that
/// fails to decode is replaced by an inline notice; it never fails the report.
pub fn generate_report(
    layout: &StorageLayout,
    stored_name: &str,
    prediction: &Prediction,
) -> Result<PathBuf> {
    let image_path = layout.upload_dir.join(stored_name);
    let report_path = layout.report_path(stored_name);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut operations = vec![
        text_line(MARGIN, 700.0, "F1", 24, REPORT_TITLE),
        text_line(MARGIN, 660.0, "F2", 12, &format!("Prediction: {}", prediction.label)),
        text_line(
            MARGIN,
            640.0,
            "F2",
            12,
            &format!("Confidence: {}", format_confidence(prediction.confidence)),
        ),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();

    let mut xobjects = dictionary! {};
    match load_thumbnail(&image_path) {
        Ok(thumb) => {
            let image_stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => thumb.width as i64,
                    "Height" => thumb.height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                thumb.data,
            );
            let image_id = doc.add_object(image_stream);
            xobjects.set("Im0", image_id);

            operations.extend([
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(THUMB_SIZE),
                        0.into(),
                        0.into(),
                        Object::Real(THUMB_SIZE),
                        Object::Real(MARGIN),
                        Object::Real(400.0),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ]);
        }
        Err(e) => {
            warn!("Could not embed thumbnail for {}: {}", stored_name, e);
            operations.extend(text_line(MARGIN, 600.0, "F2", 12, "Error loading image."));
        }
    }

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content
            .encode()
            .map_err(|e| AgroLensError::Pdf(format!("failed to encode content: {}", e)))?,
    ));

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => bold_id,
            "F2" => regular_id,
        },
        "XObject" => xobjects,
    });

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(&report_path)
        .map_err(|e| AgroLensError::Pdf(format!("failed to save report: {}", e)))?;

    Ok(report_path)
}

/// Operations for one line of text at absolute page coordinates
fn text_line(x: f32, y: f32, font: &str, size: i64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.into(), size.into()]),
        Operation::new("Td", vec![Object::Real(x), Object::Real(y)]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    fn temp_layout(dir: &Path) -> StorageLayout {
        let config = StorageConfig {
            static_root: dir.to_path_buf(),
            upload_dir: dir.join("uploads"),
            report_dir: dir.join("reports"),
            progress_dir: dir.join("uploads_progress"),
            history_path: dir.join("history.jsonl"),
        };
        let layout = StorageLayout::new(&config);
        layout.ensure().unwrap();
        layout
    }

    fn write_test_png(path: &Path) {
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([0, 120, 255]));
        img.save(path).unwrap();
    }

    #[test]
    fn formats_confidence_as_percentage() {
        assert_eq!(format_confidence(0.8734), "87.34%");
        assert_eq!(format_confidence(0.0), "0.00%");
        assert_eq!(format_confidence(1.0), "100.00%");
    }

    #[test]
    fn generates_report_with_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let layout = temp_layout(dir.path());
        write_test_png(&layout.upload_dir.join("abc_flood1.png"));

        let prediction = Prediction {
            label: "flood damage".to_string(),
            confidence: 0.91,
        };
        let path = generate_report(&layout, "abc_flood1.png", &prediction).unwrap();
        assert!(path.exists());
        assert_eq!(path, layout.report_dir.join("abc_flood1.png.pdf"));

        // Saved file parses back as a PDF with one page
        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn missing_image_still_produces_report() {
        let dir = tempfile::tempdir().unwrap();
        let layout = temp_layout(dir.path());

        let prediction = Prediction {
            label: "no flood damage".to_string(),
            confidence: 0.5,
        };
        let path = generate_report(&layout, "gone.png", &prediction).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn report_generation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = temp_layout(dir.path());
        write_test_png(&layout.upload_dir.join("abc_flood1.png"));

        let prediction = Prediction {
            label: "flood damage".to_string(),
            confidence: 0.75,
        };
        let first = generate_report(&layout, "abc_flood1.png", &prediction).unwrap();
        let second = generate_report(&layout, "abc_flood1.png", &prediction).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            std::fs::read_dir(&layout.report_dir).unwrap().count(),
            1
        );
    }
}
