use std::time::Instant;

use anyhow::{Result, anyhow, ensure};
use nokhwa::{Buffer, utils::FrameFormat};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use crate::types::Frame;

/// Decodes a raw camera buffer of any supported layout into an RGBA frame.
pub fn decode_frame(buffer: &Buffer, timestamp: Instant) -> Result<Frame> {
    let resolution = buffer.resolution();
    let (width, height) = (resolution.width_x, resolution.height_y);
    let data = buffer.buffer();

    let rgba = match buffer.source_frame_format() {
        FrameFormat::NV12 => nv12_to_rgba(data, width, height)?,
        FrameFormat::YUYV => yuyv_to_rgba(data, width, height)?,
        FrameFormat::MJPEG => mjpeg_to_rgba(data, width, height)?,
        FrameFormat::RAWRGB => packed_to_rgba(data, width, height, Packing::Rgb)?,
        FrameFormat::RAWBGR => packed_to_rgba(data, width, height, Packing::Bgr)?,
        FrameFormat::GRAY => packed_to_rgba(data, width, height, Packing::Gray)?,
    };

    Ok(Frame {
        rgba,
        width,
        height,
        timestamp,
    })
}

fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

fn nv12_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let y_len = pixel_count(width, height);
    let uv_len = y_len / 2;
    ensure!(
        data.len() >= y_len + uv_len,
        "NV12 buffer too small: got {}, expected {}",
        data.len(),
        y_len + uv_len
    );

    let image = YuvBiPlanarImage {
        y_plane: &data[..y_len],
        y_stride: width,
        uv_plane: &data[y_len..y_len + uv_len],
        uv_stride: width,
        width,
        height,
    };

    let mut rgba = vec![0u8; y_len * 4];
    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("NV12 to RGBA failed: {err:?}"))?;
    Ok(rgba)
}

fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected = pixel_count(width, height) * 2;
    ensure!(
        data.len() >= expected,
        "YUYV buffer too small: got {}, expected {expected}",
        data.len()
    );

    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };

    let mut rgba = vec![0u8; pixel_count(width, height) * 4];
    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("YUYV422 to RGBA failed: {err:?}"))?;
    Ok(rgba)
}

fn mjpeg_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgba = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;

    let expected = pixel_count(width, height) * 4;
    ensure!(
        rgba.len() >= expected,
        "MJPEG decode produced too few bytes: got {}, expected {expected}",
        rgba.len()
    );
    Ok(rgba)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Packing {
    Rgb,
    Bgr,
    Gray,
}

impl Packing {
    fn bytes_per_pixel(self) -> usize {
        match self {
            Packing::Rgb | Packing::Bgr => 3,
            Packing::Gray => 1,
        }
    }
}

fn packed_to_rgba(data: &[u8], width: u32, height: u32, packing: Packing) -> Result<Vec<u8>> {
    let bpp = packing.bytes_per_pixel();
    let expected = pixel_count(width, height) * bpp;
    ensure!(
        data.len() >= expected,
        "{packing:?} buffer too small: got {}, expected {expected}",
        data.len()
    );

    let mut rgba = vec![0u8; pixel_count(width, height) * 4];
    rgba.par_chunks_mut(4)
        .zip(data[..expected].par_chunks_exact(bpp))
        .for_each(|(dst, src)| {
            let [r, g, b] = match packing {
                Packing::Rgb => [src[0], src[1], src[2]],
                Packing::Bgr => [src[2], src[1], src[0]],
                Packing::Gray => [src[0]; 3],
            };
            dst.copy_from_slice(&[r, g, b, 255]);
        });
    Ok(rgba)
}
