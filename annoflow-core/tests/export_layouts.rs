//! End-to-end tests for both output layouts.

use std::cell::Cell;
use std::fs;
use std::path::Path;

use annoflow_core::image_io::encode_base64_png;
use annoflow_core::{
    export_datapoints, try_export_datapoints, AnnoflowError, Datapoint, DatapointStream,
    ExportConfig, ExportSummary,
};
use image::{DynamicImage, Rgb, RgbImage};
use serde_json::{json, Value};
use tempfile::tempdir;

fn encoded_image(shade: u8) -> String {
    let img = RgbImage::from_pixel(3, 2, Rgb([shade, 128, 255 - shade]));
    encode_base64_png(&DynamicImage::ImageRgb8(img)).unwrap()
}

fn three_datapoints() -> Vec<Datapoint> {
    ["a.jpg", "b.png", "c.tar.gz"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            Datapoint::new(*name)
                .with_location(format!("/data/{}", name))
                .with_image(encoded_image(i as u8 * 50))
                .with_annotation(json!({"category_name": "text", "image": {"file_name": "crop.png"}}))
        })
        .collect()
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn sorted_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_single_files_with_embedded_images() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("export");
    let config = ExportConfig::single_files().with_images(true);

    let summary = export_datapoints(three_datapoints(), &out, &config).unwrap();

    assert_eq!(summary.documents_written, 3);
    assert_eq!(summary.images_written, 0);
    assert_eq!(sorted_entries(&out), vec!["a.json", "b.json", "c.json"]);
    assert!(!out.join("image").exists());

    let c = read_json(&out.join("c.json"));
    assert_eq!(c["file_name"], json!("c.tar.gz"));
    assert!(c["_image"].is_string());
}

#[test]
fn test_single_files_without_images() {
    let dir = tempdir().unwrap();
    let summary = export_datapoints(three_datapoints(), dir.path(), &ExportConfig::single_files()).unwrap();

    assert_eq!(summary.documents_written, 3);
    for name in ["a.json", "b.json", "c.json"] {
        let document = read_json(&dir.path().join(name));
        assert!(document.get("_image").is_none());
    }
}

#[test]
fn test_single_files_extract_images() {
    let dir = tempdir().unwrap();
    let config = ExportConfig::single_files().with_images(false);

    let summary = export_datapoints(three_datapoints(), dir.path(), &config).unwrap();

    assert_eq!(summary.documents_written, 3);
    assert_eq!(summary.images_written, 3);
    assert_eq!(
        sorted_entries(&dir.path().join("image")),
        vec!["a.png", "b.png", "c.png"]
    );
    for base in ["a", "b", "c"] {
        let document = read_json(&dir.path().join(format!("{}.json", base)));
        assert!(document.get("_image").is_none());
        assert!(document["file_name"].as_str().unwrap().starts_with(base));
    }

    let b = image::open(dir.path().join("image/b.png")).unwrap().to_rgb8();
    assert_eq!(b.dimensions(), (3, 2));
    assert_eq!(b.get_pixel(0, 0), &Rgb([50, 128, 205]));
}

#[test]
fn test_extraction_without_save_image_is_noop() {
    let dir = tempdir().unwrap();
    let config = ExportConfig {
        save_image_in_json: false,
        ..ExportConfig::single_files()
    };

    let summary = export_datapoints(three_datapoints(), dir.path(), &config).unwrap();

    assert_eq!(summary.images_written, 0);
    assert!(dir.path().join("image").is_dir());
    assert!(sorted_entries(&dir.path().join("image")).is_empty());
}

#[test]
fn test_extraction_with_missing_payload_fails() {
    let dir = tempdir().unwrap();
    let config = ExportConfig::single_files().with_images(false);
    let datapoints = vec![
        Datapoint::new("ok.png").with_image(encoded_image(0)),
        Datapoint::new("empty.png"),
        Datapoint::new("never.png").with_image(encoded_image(1)),
    ];

    let err = export_datapoints(datapoints, dir.path(), &config).unwrap_err();

    assert!(matches!(err, AnnoflowError::MissingImage { ref file_name } if file_name == "empty.png"));
    assert!(dir.path().join("ok.json").exists());
    assert!(!dir.path().join("never.json").exists());
}

#[test]
fn test_highest_hierarchy_only() {
    let dir = tempdir().unwrap();
    let config = ExportConfig::single_files().with_highest_hierarchy_only(true);

    export_datapoints(three_datapoints(), dir.path(), &config).unwrap();

    let a = read_json(&dir.path().join("a.json"));
    assert!(a["annotations"][0]["image"].is_null());
    assert_eq!(a["annotations"][0]["category_name"], json!("text"));
}

#[test]
fn test_aggregate_layout() {
    let dir = tempdir().unwrap();
    let config = ExportConfig::jsonl("out.jsonl");

    let summary = export_datapoints(three_datapoints(), dir.path(), &config).unwrap();

    assert_eq!(summary.documents_written, 3);
    assert_eq!(summary.images_written, 0);
    assert_eq!(sorted_entries(dir.path()), vec!["out.jsonl"]);

    let text = fs::read_to_string(dir.path().join("out.jsonl")).unwrap();
    let names: Vec<String> = text
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).unwrap()["file_name"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(names, vec!["a.jpg", "b.png", "c.tar.gz"]);
}

#[test]
fn test_unbounded_run_summary_is_counters_only() {
    let dir = tempdir().unwrap();
    let records = (0..500).map(|i| Datapoint::new(format!("page_{i}.png")));

    let summary = export_datapoints(records, dir.path(), &ExportConfig::single_files()).unwrap();

    assert_eq!(
        summary,
        ExportSummary {
            documents_written: 500,
            images_written: 0,
        }
    );
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 500);
}

#[test]
fn test_aggregate_accepts_whitespace_file_name() {
    let dir = tempdir().unwrap();

    let summary = export_datapoints(three_datapoints(), dir.path(), &ExportConfig::jsonl(" ")).unwrap();

    assert_eq!(summary.documents_written, 3);
    assert!(dir.path().join(" ").is_file());
}

#[test]
fn test_aggregate_keeps_images_embedded() {
    let dir = tempdir().unwrap();
    let config = ExportConfig::jsonl("out.jsonl").with_images(false);

    export_datapoints(three_datapoints(), dir.path(), &config).unwrap();

    assert!(dir.path().join("image").is_dir());
    let first_line = fs::read_to_string(dir.path().join("out.jsonl")).unwrap();
    let first: Value = serde_json::from_str(first_line.lines().next().unwrap()).unwrap();
    assert!(first["_image"].is_string());
}

#[test]
fn test_aggregate_missing_destination() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("missing");

    let err = export_datapoints(three_datapoints(), &out, &ExportConfig::jsonl("out.jsonl")).unwrap_err();

    assert!(matches!(err, AnnoflowError::PathNotFound { .. }));
    assert!(!out.exists());
}

#[test]
fn test_missing_file_name_fails_before_any_write() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("export");
    let config = ExportConfig {
        save_image_in_json: false,
        ..ExportConfig::default()
    };
    let pulled = Cell::new(0);
    let records = three_datapoints()
        .into_iter()
        .inspect(|_| pulled.set(pulled.get() + 1));

    let err = export_datapoints(records, &out, &config).unwrap_err();

    assert!(matches!(err, AnnoflowError::Configuration { .. }));
    assert!(!out.exists());
    assert_eq!(pulled.get(), 0);
}

#[test]
fn test_max_datapoints_stops_consuming_upstream() {
    for (single_files, max) in [(true, 2), (false, 2), (true, 0), (false, 5)] {
        let dir = tempdir().unwrap();
        let mut config = if single_files {
            ExportConfig::single_files()
        } else {
            ExportConfig::jsonl("out.jsonl")
        };
        config.max_datapoints = Some(max);

        let pulled = Cell::new(0);
        let records = three_datapoints()
            .into_iter()
            .inspect(|_| pulled.set(pulled.get() + 1));

        let summary = export_datapoints(records, dir.path(), &config).unwrap();

        let expected = max.min(3);
        assert_eq!(summary.documents_written, expected);
        assert_eq!(pulled.get(), expected);
        if single_files {
            assert_eq!(sorted_entries(dir.path()).len(), expected);
        } else {
            let text = fs::read_to_string(dir.path().join("out.jsonl")).unwrap();
            assert_eq!(text.lines().count(), expected);
        }
    }
}

#[test]
fn test_upstream_error_aborts() {
    let dir = tempdir().unwrap();
    let records: Vec<annoflow_core::Result<Datapoint>> = vec![
        Ok(Datapoint::new("a.png")),
        Err(AnnoflowError::export(1, "upstream broke")),
        Ok(Datapoint::new("c.png")),
    ];

    let err = try_export_datapoints(records, dir.path(), &ExportConfig::single_files()).unwrap_err();

    assert!(matches!(err, AnnoflowError::Export { index: 1, .. }));
    assert!(dir.path().join("a.json").exists());
    assert!(!dir.path().join("c.json").exists());
}

#[test]
fn test_rerun_overwrites() {
    let dir = tempdir().unwrap();
    let config = ExportConfig::single_files();

    export_datapoints(vec![Datapoint::new("a.png").with_location("first")], dir.path(), &config).unwrap();
    export_datapoints(vec![Datapoint::new("a.png").with_location("second")], dir.path(), &config).unwrap();

    assert_eq!(read_json(&dir.path().join("a.json"))["location"], json!("second"));
}

#[test]
fn test_unicode_file_names_and_content() {
    let dir = tempdir().unwrap();
    let datapoints = vec![
        Datapoint::new("页面_1.png").with_annotation(json!({"text": "你好世界 👋"})),
        Datapoint::new("página.jpg").with_annotation(json!({"text": "مرحبا"})),
    ];

    export_datapoints(datapoints, dir.path(), &ExportConfig::single_files()).unwrap();

    let first = read_json(&dir.path().join("页面_1.json"));
    assert_eq!(first["annotations"][0]["text"], json!("你好世界 👋"));
    assert!(dir.path().join("página.json").exists());
}

#[test]
fn test_export_from_stream_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("datapoints.jsonl");
    let lines: Vec<String> = three_datapoints()
        .iter()
        .map(|dp| serde_json::to_string(dp).unwrap())
        .collect();
    fs::write(&input, lines.join("\n")).unwrap();
    let out = dir.path().join("out");

    let stream = DatapointStream::from_path(&input).unwrap();
    let config = ExportConfig::single_files().with_images(false).with_max_datapoints(2);
    let summary = try_export_datapoints(stream, &out, &config).unwrap();

    assert_eq!(summary.documents_written, 2);
    assert_eq!(sorted_entries(&out.join("image")), vec!["a.png", "b.png"]);
}
