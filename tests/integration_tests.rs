mod common;

use assert_cmd::Command;
use common::*;
use image::{GenericImageView, ImageFormat};
use predicates::prelude::*;
use std::fs;

fn tiny_squeeze() -> Command {
    let mut cmd = Command::cargo_bin("tiny-squeeze").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    tiny_squeeze()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--preset"));
}

#[test]
fn test_missing_args() {
    tiny_squeeze().assert().failure();
}

#[test]
fn test_nonexistent_file() {
    let temp_dir = create_temp_directory();
    let input = temp_dir.path().join("nonexistent.jpg");

    tiny_squeeze()
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nonexistent.jpg"));

    assert!(!temp_dir.path().join("compressed_nonexistent.jpg").exists());
}

#[test]
fn test_invalid_format_is_usage_error() {
    let temp_dir = create_temp_directory();
    let input = temp_dir.path().join("a.png");
    write_rgb_image(&input, ImageFormat::Png, 4, 4);

    tiny_squeeze()
        .arg(&input)
        .args(["-f", "gif"])
        .assert()
        .code(2);

    assert!(!temp_dir.path().join("compressed_a.png").exists());
}

#[test]
fn test_invalid_quality() {
    let temp_dir = create_temp_directory();
    let input = temp_dir.path().join("a.png");
    write_rgb_image(&input, ImageFormat::Png, 4, 4);

    tiny_squeeze().arg(&input).args(["-q", "0"]).assert().failure();
    tiny_squeeze().arg(&input).args(["-q", "101"]).assert().failure();
}

#[test]
fn test_invalid_preset() {
    let temp_dir = create_temp_directory();
    let input = temp_dir.path().join("a.png");
    write_rgb_image(&input, ImageFormat::Png, 4, 4);

    tiny_squeeze()
        .arg(&input)
        .args(["--preset", "ultra"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ultra"));
}

#[test]
fn test_single_file_default_output() {
    let temp_dir = create_temp_directory();
    let input = temp_dir.path().join("photo.jpg");
    write_rgb_image(&input, ImageFormat::Jpeg, 32, 24);

    tiny_squeeze()
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Compression ratio"));

    let output = temp_dir.path().join("compressed_photo.jpg");
    assert_eq!(image::open(&output).unwrap().dimensions(), (32, 24));
}

#[test]
fn test_single_file_format_conversion() {
    let temp_dir = create_temp_directory();
    let input = temp_dir.path().join("logo.png");
    let output = temp_dir.path().join("logo.webp");
    write_rgba_png(&input, 16, 16);

    tiny_squeeze()
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["-f", "webp", "--preset", "quality"])
        .assert()
        .success();

    let bytes = fs::read(&output).unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::WebP);
}

#[test]
fn test_quiet_suppresses_report() {
    let temp_dir = create_temp_directory();
    let input = temp_dir.path().join("a.png");
    write_rgb_image(&input, ImageFormat::Png, 8, 8);

    tiny_squeeze()
        .arg(&input)
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert!(temp_dir.path().join("compressed_a.png").exists());
}

#[test]
fn test_declined_overwrite_exits_zero() {
    let temp_dir = create_temp_directory();
    let input = temp_dir.path().join("a.png");
    let output = temp_dir.path().join("out.png");
    write_rgb_image(&input, ImageFormat::Png, 8, 8);
    fs::write(&output, b"keep me").unwrap();

    tiny_squeeze()
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .write_stdin("yes\n")
        .assert()
        .success();

    assert_eq!(fs::read(&output).unwrap(), b"keep me");
}

#[test]
fn test_confirmed_overwrite() {
    let temp_dir = create_temp_directory();
    let input = temp_dir.path().join("a.png");
    let output = temp_dir.path().join("out.png");
    write_rgb_image(&input, ImageFormat::Png, 8, 8);
    fs::write(&output, b"replace me").unwrap();

    tiny_squeeze()
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .write_stdin("Y\n")
        .assert()
        .success();

    assert!(image::open(&output).is_ok());
}

#[test]
fn test_output_dir_ignored_in_single_mode() {
    let temp_dir = create_temp_directory();
    let input = temp_dir.path().join("a.png");
    write_rgb_image(&input, ImageFormat::Png, 8, 8);

    tiny_squeeze()
        .arg(&input)
        .arg("-d")
        .arg(temp_dir.path().join("elsewhere"))
        .assert()
        .success()
        .stderr(predicate::str::contains("--output-dir is ignored"));

    assert!(!temp_dir.path().join("elsewhere").exists());
}

#[test]
fn test_batch_empty_directory() {
    let temp_dir = create_temp_directory();

    tiny_squeeze()
        .arg(temp_dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("No image files found"))
        .stdout(predicate::str::contains("n/a"));
}

#[test]
fn test_batch_default_output_dir() {
    let temp_dir = create_temp_directory();
    create_flat_batch(temp_dir.path());

    tiny_squeeze()
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Total files: 2"));

    let out = temp_dir.path().join("compressed");
    assert!(out.join("a.png").exists());
    assert!(out.join("b.jpg").exists());
    assert!(!out.join("notes.txt").exists());
}

#[test]
fn test_batch_output_flag_ignored() {
    let temp_dir = create_temp_directory();
    create_flat_batch(temp_dir.path());

    tiny_squeeze()
        .arg(temp_dir.path())
        .arg("-o")
        .arg(temp_dir.path().join("single.png"))
        .assert()
        .success()
        .stderr(predicate::str::contains("--output is ignored"));
}

#[test]
fn test_batch_partial_failure_exits_zero() {
    let temp_dir = create_temp_directory();
    let input = temp_dir.path().join("in");
    fs::create_dir(&input).unwrap();
    write_rgb_image(&input.join("good.png"), ImageFormat::Png, 8, 8);
    fs::write(input.join("bad.jpg"), b"not a jpeg").unwrap();

    tiny_squeeze()
        .arg(&input)
        .arg("-d")
        .arg(temp_dir.path().join("out"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Failed: 1"))
        .stderr(predicate::str::contains("bad.jpg"));
}

#[test]
fn test_batch_recursive_with_format_and_jobs() {
    let temp_dir = create_temp_directory();
    let input = temp_dir.path().join("root");
    create_nested_batch(&input);
    let out = temp_dir.path().join("out");

    tiny_squeeze()
        .arg(&input)
        .arg("-d")
        .arg(&out)
        .args(["-r", "-f", "jpg", "-j", "2"])
        .assert()
        .success();

    assert!(out.join("x.jpg").exists());
    assert!(out.join("sub/y.jpg").exists());
}
