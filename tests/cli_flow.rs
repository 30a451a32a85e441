use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use genfill::cli::{self, CliArgs};
use genfill::io::{load_image, save_png};
use image::{Rgba, RgbaImage};

fn write_settings(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("settings.cfg");
    std::fs::write(&path, "square_size=64\ncandidate_count=2\n").unwrap();
    path
}

fn write_input(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("input.png");
    save_png(&RgbaImage::from_pixel(64, 32, Rgba([30, 60, 90, 255])), &path).unwrap();
    path
}

fn args(extra: &[&str]) -> CliArgs {
    let mut argv = vec!["genfill"];
    argv.extend_from_slice(extra);
    CliArgs::try_parse_from(argv).unwrap()
}

#[test]
fn dry_run_writes_submission_and_mask() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_settings(dir.path());
    let input = write_input(dir.path());
    let out = dir.path().join("out");

    let code = cli::run(args(&[
        "--input",
        input.to_str().unwrap(),
        "--settings",
        settings.to_str().unwrap(),
        "--stroke",
        "20,10",
        "--brush-width",
        "10",
        "--rect",
        "40,0,8,4",
        "--output-dir",
        out.to_str().unwrap(),
        "--dry-run",
    ]));
    assert_eq!(code, ExitCode::SUCCESS);

    let submission = load_image(&out.join("submission.png")).unwrap();
    let mask = load_image(&out.join("mask.png")).unwrap();
    assert_eq!(submission.dimensions(), (64, 64));
    assert_eq!(mask.dimensions(), (64, 64));

    // image sits 16 rows down inside the square
    assert_eq!(*submission.get_pixel(5, 20), Rgba([30, 60, 90, 255]));
    assert_eq!(*submission.get_pixel(5, 5), Rgba([0, 0, 0, 255]));

    assert_eq!(mask.get_pixel(20, 26)[3], 0);
    assert_eq!(mask.get_pixel(42, 17)[3], 0);
    assert_eq!(mask.get_pixel(60, 40)[3], 255);
    assert_eq!(mask.get_pixel(20, 10)[3], 255);
}

#[test]
fn mock_run_writes_cropped_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_settings(dir.path());
    let input = write_input(dir.path());
    let fixtures = dir.path().join("fixtures");
    std::fs::create_dir_all(&fixtures).unwrap();
    let red = RgbaImage::from_pixel(64, 64, Rgba([255, 0, 0, 255]));
    let green = RgbaImage::from_pixel(64, 64, Rgba([0, 255, 0, 255]));
    save_png(&red, &fixtures.join("a.png")).unwrap();
    save_png(&green, &fixtures.join("b.png")).unwrap();
    let out = dir.path().join("out");

    let code = cli::run(args(&[
        "-i",
        input.to_str().unwrap(),
        "--settings",
        settings.to_str().unwrap(),
        "--stroke",
        "10,10;30,10",
        "--mock-dir",
        fixtures.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
    ]));
    assert_eq!(code, ExitCode::SUCCESS);

    let first = load_image(&out.join("candidate_0.png")).unwrap();
    let second = load_image(&out.join("candidate_1.png")).unwrap();
    assert_eq!(first.dimensions(), (64, 32));
    assert_eq!(*first.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
    assert_eq!(*second.get_pixel(63, 31), Rgba([0, 255, 0, 255]));
}

#[test]
fn empty_mock_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_settings(dir.path());
    let input = write_input(dir.path());
    let fixtures = dir.path().join("empty");
    std::fs::create_dir_all(&fixtures).unwrap();

    let code = cli::run(args(&[
        "-i",
        input.to_str().unwrap(),
        "--settings",
        settings.to_str().unwrap(),
        "--mock-dir",
        fixtures.to_str().unwrap(),
        "-o",
        dir.path().to_str().unwrap(),
    ]));
    assert_eq!(code, ExitCode::FAILURE);
    assert!(!dir.path().join("candidate_0.png").exists());
}

#[test]
fn bad_arguments_fail_before_loading() {
    let dir = tempfile::tempdir().unwrap();
    let code = cli::run(args(&[
        "-i",
        dir.path().join("missing.png").to_str().unwrap(),
        "--stroke",
        "1;2",
    ]));
    assert_eq!(code, ExitCode::FAILURE);

    let code = cli::run(args(&["-i", dir.path().join("missing.png").to_str().unwrap()]));
    assert_eq!(code, ExitCode::FAILURE);
}

#[test]
fn stroke_far_outside_the_image_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_settings(dir.path());
    let input = write_input(dir.path());
    let out = dir.path().join("out");

    let code = cli::run(args(&[
        "-i",
        input.to_str().unwrap(),
        "--settings",
        settings.to_str().unwrap(),
        "--stroke",
        "10,10;1e12,10",
        "-o",
        out.to_str().unwrap(),
        "--dry-run",
    ]));
    assert_eq!(code, ExitCode::FAILURE);
    assert!(!out.join("submission.png").exists());
}
