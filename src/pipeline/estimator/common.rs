use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::{Frame, Keypoint, NUM_KEYPOINTS, Pose};

pub const INPUT_SIZE: u32 = 256;
/// The landmark head emits 33 body points plus 6 auxiliary ROI points.
pub const MODEL_LANDMARKS: usize = 39;
/// x, y, z, visibility, presence.
pub const VALUES_PER_LANDMARK: usize = 5;

#[derive(Clone, Debug)]
pub struct LetterboxInfo {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

/// Resizes the frame into a black `target_size` square keeping its aspect
/// ratio and returns an NHWC RGB tensor in [0, 1].
pub fn prepare_frame(frame: &Frame, target_size: u32) -> Result<(Array4<f32>, LetterboxInfo)> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.width == 0 || frame.height == 0 || frame.rgba.len() != expected_len {
        return Err(anyhow!(
            "frame buffer size mismatch: got {} bytes for {}x{}",
            frame.rgba.len(),
            frame.width,
            frame.height
        ));
    }

    let scale = target_size as f32 / (frame.width.max(frame.height) as f32);
    let new_w = ((frame.width as f32 * scale).round() as u32).clamp(1, target_size);
    let new_h = ((frame.height as f32 * scale).round() as u32).clamp(1, target_size);

    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst_image = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x4);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("letterbox resize failed")?;
    let resized = dst_image.into_vec();

    let side = target_size as usize;
    let pad_x = (side - new_w as usize) / 2;
    let pad_y = (side - new_h as usize) / 2;
    let mut canvas = vec![0u8; side * side * 4];
    let dst_stride = side * 4;
    let src_stride = new_w as usize * 4;
    for row in 0..(new_h as usize) {
        let dst_offset = (pad_y + row) * dst_stride + pad_x * 4;
        let src_offset = row * src_stride;
        canvas[dst_offset..dst_offset + src_stride]
            .copy_from_slice(&resized[src_offset..src_offset + src_stride]);
    }

    let normalized: Vec<f32> = canvas
        .par_chunks_exact(4)
        .flat_map_iter(|px| {
            [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ]
        })
        .collect();
    let input = Array4::<f32>::from_shape_vec((1, side, side, 3), normalized)
        .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;

    let letterbox = LetterboxInfo {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
        orig_w: frame.width,
        orig_h: frame.height,
    };

    Ok((input, letterbox))
}

pub fn sigmoid(value: f32) -> f32 {
    1.0 / (1.0 + (-value).exp())
}

/// Turns the flat landmark tensor into a pose in frame pixels. Keypoint score
/// is the landmark visibility probability.
pub fn decode_pose(flat: &[f32], letterbox: &LetterboxInfo) -> Result<Pose> {
    if flat.len() < MODEL_LANDMARKS * VALUES_PER_LANDMARK {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            flat.len(),
            MODEL_LANDMARKS * VALUES_PER_LANDMARK
        ));
    }

    let keypoints = flat
        .chunks_exact(VALUES_PER_LANDMARK)
        .take(NUM_KEYPOINTS)
        .map(|chunk| {
            let (x, y) = project_point(chunk[0], chunk[1], letterbox);
            Keypoint::new(x, y, sigmoid(chunk[3]))
        })
        .collect();

    Pose::from_keypoints(keypoints)
}

/// Picks the landmark and pose-presence tensors by size, since output order
/// differs between exports. Presence below `pose_threshold` yields no pose.
pub fn select_pose(
    outputs: &[Vec<f32>],
    pose_threshold: f32,
    letterbox: &LetterboxInfo,
) -> Result<Vec<Pose>> {
    let landmarks = outputs
        .iter()
        .find(|out| out.len() == MODEL_LANDMARKS * VALUES_PER_LANDMARK)
        .ok_or_else(|| anyhow!("model returned no landmark tensor"))?;
    let presence = outputs
        .iter()
        .find(|out| out.len() == 1)
        .map_or(0.0, |out| out[0]);

    if presence < pose_threshold {
        return Ok(Vec::new());
    }

    Ok(vec![decode_pose(landmarks, letterbox)?])
}

fn project_point(x: f32, y: f32, letterbox: &LetterboxInfo) -> (f32, f32) {
    let px = (x - letterbox.pad_x) / letterbox.scale;
    let py = (y - letterbox.pad_y) / letterbox.scale;
    (
        px.clamp(0.0, (letterbox.orig_w.saturating_sub(1)) as f32),
        py.clamp(0.0, (letterbox.orig_h.saturating_sub(1)) as f32),
    )
}
