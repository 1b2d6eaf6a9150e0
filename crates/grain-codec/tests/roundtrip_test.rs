//! Decode/encode through the host device.

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use grain_codec::{Codec, Direction, v210};
use grain_core::{Colorimetry, Error, FrameDescriptor, Packing};
use grain_device::{Access, BufferPool, HostDevice, PooledBuffer, Residency};

const OWNER: &str = "codec-test";

fn pool() -> BufferPool {
    BufferPool::new(Arc::new(HostDevice::with_capacity(256 << 20)))
}

fn upload(pool: &BufferPool, bytes: &[u8]) -> PooledBuffer {
    let buf = pool
        .create_buffer(bytes.len() as u64, Access::ReadWrite, Residency::Device, OWNER)
        .unwrap();
    buf.write_from_host(bytes).unwrap();
    buf
}

fn alloc(pool: &BufferPool, len: u64) -> PooledBuffer {
    pool.create_buffer(len, Access::ReadWrite, Residency::Device, OWNER).unwrap()
}

fn pixels(buf: &PooledBuffer) -> Vec<[f32; 4]> {
    bytemuck::cast_slice(&buf.read_to_host().unwrap()).to_vec()
}

fn rgba8_roundtrip(desc: &FrameDescriptor, data: &[u8]) -> (Vec<[f32; 4]>, Vec<u8>) {
    let pool = pool();
    let codec = Codec::for_packing(desc.packing).unwrap();
    let planar_desc = codec.dest_tags(Direction::Read, desc, desc.colorimetry);
    let reader = codec.reader(&pool, desc, desc.colorimetry, OWNER).unwrap();
    let writer = codec.writer(&pool, &planar_desc, desc.colorimetry, OWNER).unwrap();

    let src = upload(&pool, data);
    let planar = alloc(&pool, planar_desc.planar_bytes());
    let out = alloc(&pool, codec.frame_bytes(desc.width, desc.height));
    reader.from_packed(&src, &planar).unwrap();
    writer.to_packed(&planar, &out).unwrap();
    (pixels(&planar), out.read_to_host().unwrap())
}

#[test]
fn test_rgba8_128_survives_roundtrip() {
    for colorimetry in [Colorimetry::Srgb, Colorimetry::Bt709, Colorimetry::Bt2020] {
        let desc = FrameDescriptor::new(Packing::Packed8_4444, 70, 3, colorimetry);
        let data = vec![128u8; 70 * 3 * 4];
        let (_, out) = rgba8_roundtrip(&desc, &data);
        for (i, v) in out.iter().enumerate() {
            if i % 4 != 3 {
                assert!(v.abs_diff(128) <= 1, "{colorimetry} byte {i} = {v}");
            }
        }
    }
}

#[test]
fn test_rgba8_every_code_roundtrips() {
    let desc = FrameDescriptor::new(Packing::Packed8_4444, 256, 1, Colorimetry::Srgb);
    let data: Vec<u8> = (0..=255u8).flat_map(|v| [v, v, v, 255]).collect();
    let (_, out) = rgba8_roundtrip(&desc, &data);
    for v in 0..256usize {
        assert!(out[v * 4].abs_diff(v as u8) <= 1, "code {v} -> {}", out[v * 4]);
    }
}

#[test]
fn test_rgba8_alpha_handling() {
    let data: Vec<u8> = [10u8, 20, 30, 51].repeat(4);

    let opaque = FrameDescriptor::new(Packing::Packed8_4444, 4, 1, Colorimetry::Srgb);
    let (planar, out) = rgba8_roundtrip(&opaque, &data);
    assert!(planar.iter().all(|p| p[3] == 1.0));
    assert_eq!(out[3], 255);

    let keyed = opaque.with_alpha(true);
    let (planar, out) = rgba8_roundtrip(&keyed, &data);
    // sRGB decode of 51/255, same curve as the colour channels.
    let expected = ((0.2f32 + 0.055) / 1.055).powf(2.4);
    assert_abs_diff_eq!(planar[0][3], expected, epsilon = 1e-4);
    assert!(out[3].abs_diff(51) <= 1, "alpha {}", out[3]);
}

#[test]
fn test_rgba8_alpha_follows_colour_curve() {
    let desc =
        FrameDescriptor::new(Packing::Packed8_4444, 1, 1, Colorimetry::Srgb).with_alpha(true);
    let (planar, out) = rgba8_roundtrip(&desc, &[51, 51, 51, 51]);
    assert_abs_diff_eq!(planar[0][3], planar[0][0], epsilon = 1e-6);
    assert!((planar[0][3] - 0.2).abs() > 0.1);
    assert!(out[3].abs_diff(51) <= 1);

    let (planar, out) = rgba8_roundtrip(&desc, &[0, 0, 0, 255]);
    assert_abs_diff_eq!(planar[0][3], 1.0, epsilon = 1e-6);
    assert_eq!(out[3], 255);
}

#[test]
fn test_rgba8_decode_is_linear() {
    let desc = FrameDescriptor::new(Packing::Packed8_4444, 1, 1, Colorimetry::Srgb);
    let (planar, _) = rgba8_roundtrip(&desc, &[255, 128, 0, 255]);
    assert_abs_diff_eq!(planar[0][0], 1.0, epsilon = 1e-4);
    assert_abs_diff_eq!(planar[0][1], 0.2158, epsilon = 1e-3);
    assert_abs_diff_eq!(planar[0][2], 0.0, epsilon = 1e-6);
}

fn planar_frame(width: u32, height: u32, px: [f32; 4]) -> Vec<u8> {
    let v = vec![px; (width * height) as usize];
    bytemuck::cast_slice(&v).to_vec()
}

#[test]
fn test_v210_flat_roundtrip() {
    let pool = pool();
    let (w, h) = (100, 4);
    let planar_desc = FrameDescriptor::planar(w, h, Colorimetry::Bt709);
    let writer = Codec::V210.writer(&pool, &planar_desc, Colorimetry::Bt709, OWNER).unwrap();
    let packed_desc = Codec::V210.dest_tags(Direction::Write, &planar_desc, Colorimetry::Bt709);
    let reader = Codec::V210.reader(&pool, &packed_desc, Colorimetry::Bt709, OWNER).unwrap();

    for colour in [[0.18, 0.18, 0.18, 1.0], [0.5, 0.2, 0.1, 1.0], [0.05, 0.3, 0.6, 1.0]] {
        let src = upload(&pool, &planar_frame(w, h, colour));
        let packed = alloc(&pool, Codec::V210.frame_bytes(w, h));
        let back = alloc(&pool, planar_desc.planar_bytes());
        writer.to_packed(&src, &packed).unwrap();
        reader.from_packed(&packed, &back).unwrap();

        for p in pixels(&back) {
            for c in 0..3 {
                assert_abs_diff_eq!(p[c], colour[c], epsilon = 0.01);
            }
            assert_eq!(p[3], 1.0);
        }
    }
}

#[test]
fn test_v210_black_and_white_codes() {
    let pool = pool();
    let (w, h) = (48, 1);
    let planar_desc = FrameDescriptor::planar(w, h, Colorimetry::Bt709);
    let writer = Codec::V210.writer(&pool, &planar_desc, Colorimetry::Bt709, OWNER).unwrap();

    let mut frame = vec![[0.0f32, 0.0, 0.0, 1.0]; 24];
    frame.extend(vec![[1.0f32, 1.0, 1.0, 1.0]; 24]);
    let src = upload(&pool, bytemuck::cast_slice(&frame));
    let packed = alloc(&pool, v210::pitch_bytes(w));
    writer.to_packed(&src, &packed).unwrap();

    let words: Vec<u32> = bytemuck::cast_slice(&packed.read_to_host().unwrap()).to_vec();
    // Pixel 0: Cb0 | Y0 << 10 | Cr0 << 20 with Y0 black, chroma neutral.
    assert_eq!((words[0] >> 10) & 0x3ff, 64);
    assert_eq!(words[0] & 0x3ff, 512);
    // Pixel 47 is white: Y5 of the last group.
    assert_eq!((words[31] >> 20) & 0x3ff, 940);
}

#[test]
fn test_v210_super_white_is_clamped() {
    let pool = pool();
    let planar_desc = FrameDescriptor::planar(6, 1, Colorimetry::Bt709);
    let writer = Codec::V210.writer(&pool, &planar_desc, Colorimetry::Bt709, OWNER).unwrap();
    let src = upload(&pool, &planar_frame(6, 1, [40.0, 40.0, 40.0, 1.0]));
    let packed = alloc(&pool, v210::pitch_bytes(6));
    writer.to_packed(&src, &packed).unwrap();
    let words: Vec<u32> = bytemuck::cast_slice(&packed.read_to_host().unwrap()).to_vec();
    for word in &words[..4] {
        for i in 0..3 {
            let code = (word >> (10 * i)) & 0x3ff;
            assert!((4..=1019).contains(&code));
        }
    }
}

#[test]
fn test_gamut_keeps_grey_neutral() {
    let pool = pool();
    let desc = FrameDescriptor::new(Packing::Packed8_4444, 2, 1, Colorimetry::Bt2020);
    let reader = Codec::Rgba8.reader(&pool, &desc, Colorimetry::Bt709, OWNER).unwrap();
    let src = upload(&pool, &[100, 100, 100, 255, 200, 200, 200, 255]);
    let dst = alloc(&pool, 2 * 16);
    reader.from_packed(&src, &dst).unwrap();
    for p in pixels(&dst) {
        assert_abs_diff_eq!(p[0], p[1], epsilon = 1e-3);
        assert_abs_diff_eq!(p[1], p[2], epsilon = 1e-3);
    }
}

#[test]
fn test_unsupported_packing_fails_before_allocation() {
    let pool = pool();
    let planar = FrameDescriptor::planar(64, 64, Colorimetry::Bt709);
    assert!(matches!(
        Codec::for_packing(planar.packing),
        Err(Error::UnsupportedFormat(_))
    ));
    assert!(matches!(
        Codec::V210.reader(&pool, &planar, Colorimetry::Bt709, OWNER),
        Err(Error::UnsupportedFormat(_))
    ));
    let v210 = FrameDescriptor::new(Packing::Packed10_422, 64, 64, Colorimetry::Bt709);
    assert!(matches!(
        Codec::Rgba8.writer(&pool, &v210, Colorimetry::Bt709, OWNER),
        Err(Error::UnsupportedFormat(_))
    ));
    assert_eq!(pool.stats().buffers, 0);
}

#[test]
fn test_short_buffers_rejected() {
    let pool = pool();
    let desc = FrameDescriptor::new(Packing::Packed8_4444, 8, 8, Colorimetry::Srgb);
    let reader = Codec::Rgba8.reader(&pool, &desc, Colorimetry::Srgb, OWNER).unwrap();
    let src = alloc(&pool, 8 * 8 * 4 - 4);
    let dst = alloc(&pool, 8 * 8 * 16);
    assert!(matches!(
        reader.from_packed(&src, &dst),
        Err(Error::InvalidArgument(_))
    ));
}
