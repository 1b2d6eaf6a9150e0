//! End-to-end runs of the `grain` binary on the host device.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

const W: u32 = 256;
const H: u32 = 2;

fn grain(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_grain"))
        .args(["--backend", "host"])
        .args(args)
        .env("GRAIN_DEVICE_MEM_MB", "64")
        .env_remove("RUST_LOG")
        .output()
        .expect("run grain")
}

fn assert_ok(output: &Output) {
    assert!(
        output.status.success(),
        "grain failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Grey ramp, one code per column, opaque.
fn grey_ramp(frames: usize) -> Vec<u8> {
    let frame: Vec<u8> = (0..H)
        .flat_map(|_| (0..W).flat_map(|x| [x as u8, x as u8, x as u8, 255]))
        .collect();
    frame.repeat(frames)
}

fn rgba_args<'a>(input: &'a str, output: &'a str) -> Vec<&'a str> {
    vec![input, "-o", output, "-p", "RGBA8", "-W", "256", "-H", "2", "--colorimetry", "sRGB"]
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn assert_colour_close(a: &[u8], b: &[u8], tol: u8) {
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        if i % 4 != 3 {
            assert!(x.abs_diff(*y) <= tol, "byte {i}: {x} vs {y}");
        }
    }
}

#[test]
fn test_help_lists_subcommands() {
    let output = Command::new(env!("CARGO_BIN_EXE_grain"))
        .arg("--help")
        .output()
        .expect("run grain --help");
    assert_ok(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["info", "convert", "mono", "mix", "stamp", "blur"] {
        assert!(stdout.contains(cmd), "missing {cmd} in help output");
    }
}

#[test]
fn test_convert_rgba8_roundtrip() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.rgba");
    let output = dir.path().join("out.rgba");
    let data = grey_ramp(3);
    fs::write(&input, &data).unwrap();

    let mut args = vec!["convert"];
    args.extend(rgba_args(path_str(&input), path_str(&output)));
    assert_ok(&grain(&args));

    let out = fs::read(&output).unwrap();
    assert_colour_close(&out, &data, 1);
    assert!(out.chunks(4).all(|px| px[3] == 255));
}

#[test]
fn test_convert_through_v210() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.rgba");
    let packed = dir.path().join("mid.v210");
    let back = dir.path().join("back.rgba");
    let data = [128u8, 128, 128, 255].repeat((W * H) as usize);
    fs::write(&input, &data).unwrap();

    let mut args = vec!["convert"];
    args.extend(rgba_args(path_str(&input), path_str(&packed)));
    args.extend(["--to", "v210"]);
    assert_ok(&grain(&args));
    let v210_len = fs::metadata(&packed).unwrap().len();
    assert_eq!(v210_len, (W as u64).div_ceil(48) * 128 * H as u64);

    let output = grain(&[
        "convert",
        path_str(&packed),
        "-o",
        path_str(&back),
        "-p",
        "v210",
        "-W",
        "256",
        "-H",
        "2",
        "--colorimetry",
        "sRGB",
        "--to",
        "RGBA8",
    ]);
    assert_ok(&output);
    assert_colour_close(&fs::read(&back).unwrap(), &data, 2);
}

#[test]
fn test_mono_full_pressure_is_grey() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.rgba");
    let output = dir.path().join("out.rgba");
    fs::write(&input, [200u8, 40, 90, 255].repeat((W * H) as usize)).unwrap();

    let mut args = vec!["mono"];
    args.extend(rgba_args(path_str(&input), path_str(&output)));
    args.extend(["--pressure", "1"]);
    assert_ok(&grain(&args));

    for px in fs::read(&output).unwrap().chunks(4) {
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
    }
}

#[test]
fn test_blur_depth_zero_is_identity() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.rgba");
    let output = dir.path().join("out.rgba");
    let data = grey_ramp(1);
    fs::write(&input, &data).unwrap();

    let mut args = vec!["blur"];
    args.extend(rgba_args(path_str(&input), path_str(&output)));
    args.extend(["--depth", "0"]);
    assert_ok(&grain(&args));
    assert_colour_close(&fs::read(&output).unwrap(), &data, 1);
}

#[test]
fn test_mix_stops_at_shorter_input() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.rgba");
    let b = dir.path().join("b.rgba");
    let output = dir.path().join("out.rgba");
    let data = grey_ramp(2);
    fs::write(&a, &data).unwrap();
    fs::write(&b, [0u8, 0, 0, 255].repeat((W * H) as usize * 3)).unwrap();

    let result = grain(&[
        "mix",
        path_str(&a),
        path_str(&b),
        "-o",
        path_str(&output),
        "-p",
        "RGBA8",
        "-W",
        "256",
        "-H",
        "2",
        "--colorimetry",
        "sRGB",
        "--pressure",
        "1",
    ]);
    assert_ok(&result);
    assert_colour_close(&fs::read(&output).unwrap(), &data, 1);
}

#[test]
fn test_stamp_needs_alpha() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.rgba");
    let b = dir.path().join("b.rgba");
    let output = dir.path().join("out.rgba");
    fs::write(&a, grey_ramp(1)).unwrap();
    fs::write(&b, grey_ramp(1)).unwrap();

    let result = grain(&[
        "stamp",
        path_str(&a),
        path_str(&b),
        "-o",
        path_str(&output),
        "-p",
        "RGBA8",
        "-W",
        "256",
        "-H",
        "2",
    ]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("alpha"));
}

#[test]
fn test_partial_frame_rejected() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.rgba");
    let output = dir.path().join("out.rgba");
    let mut data = grey_ramp(1);
    data.truncate(data.len() - 4);
    fs::write(&input, &data).unwrap();

    let mut args = vec!["convert"];
    args.extend(rgba_args(path_str(&input), path_str(&output)));
    let result = grain(&args);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("not a whole number"));
}

#[test]
fn test_info_counts_frames() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.rgba");
    fs::write(&input, grey_ramp(5)).unwrap();

    let result = grain(&["info", path_str(&input), "-p", "RGBA8", "-W", "256", "-H", "2"]);
    assert_ok(&result);
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("Device:"));
    assert!(stdout.contains("256x2"));
    assert!(stdout.contains("Frames:      5"), "{stdout}");
}

#[test]
fn test_unknown_backend_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_grain"))
        .args(["--backend", "quantum", "info"])
        .output()
        .expect("run grain");
    assert!(!output.status.success());
}
