#![allow(dead_code)]

#[path = "../src/config.rs"]
mod config;
#[path = "../src/error.rs"]
mod error;
#[path = "../src/model_download.rs"]
mod model_download;
#[path = "../src/types.rs"]
mod types;

#[path = "../src/pipeline"]
mod pipeline {
    #[path = "estimator/mod.rs"]
    pub mod estimator;
    #[path = "skeleton.rs"]
    pub mod skeleton;
}

use std::{path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};

use config::ModelConfig;
use pipeline::{
    estimator::{PoseEstimator, PoseSource},
    skeleton::{RenderConfig, RgbaCanvas, SkeletonRenderer},
};
use types::Frame;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let input_image = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("demo/person.jpg"));
    let output_image = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("demo/person_with_skeleton.png"));

    let model = ModelConfig {
        path: args
            .next()
            .map(PathBuf::from)
            .unwrap_or_else(model_download::default_pose_model_path),
        ..ModelConfig::default()
    };

    let mut image = image::open(&input_image)
        .with_context(|| format!("failed to open image {}", input_image.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();

    let mut estimator = PoseSource::new(model.clone())
        .load()
        .map_err(|err| anyhow::anyhow!(err.chain_message()))?;

    println!(
        "Running inference with model {} on {} ({width}x{height})",
        model.path.display(),
        input_image.display()
    );
    let frame = Frame {
        rgba: image.as_raw().clone(),
        width,
        height,
        timestamp: Instant::now(),
    };
    let started = Instant::now();
    let poses = estimator.estimate(&frame).context("inference failed")?;
    println!("Found {} pose(s) in {:?}", poses.len(), started.elapsed());

    let render = RenderConfig::default();
    for pose in &poses {
        println!(
            "  {} of 33 keypoints above {}",
            pose.confident_keypoints(render.confidence_threshold),
            render.confidence_threshold
        );
    }

    let mut canvas = RgbaCanvas::new(width, height);
    let stats = SkeletonRenderer::new(render).render(&poses, &mut canvas);
    composite(&mut image, &canvas.snapshot().rgba);
    println!("Drew {} points and {} segments", stats.circles, stats.segments);

    image
        .save(&output_image)
        .with_context(|| format!("failed to save {}", output_image.display()))?;
    println!("Wrote {}", output_image.display());
    Ok(())
}

/// Copies every painted overlay pixel onto the photo.
fn composite(image: &mut RgbaImage, overlay: &[u8]) {
    for (pixel, src) in image.pixels_mut().zip(overlay.chunks_exact(4)) {
        if src[3] != 0 {
            *pixel = Rgba([src[0], src[1], src[2], 255]);
        }
    }
}
