use serde::{Deserialize, Serialize};

use crate::types::{NUM_KEYPOINTS, OverlayImage, Pose};

/// Explicit anatomical connections of the BlazePose layout, each drawn once.
pub const ANATOMICAL_EDGES: &[(usize, usize)] = &[
    // face
    (8, 6),
    (6, 5),
    (5, 4),
    (4, 0),
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 7),
    // mouth
    (9, 10),
    // left arm and hand
    (11, 13),
    (13, 15),
    (15, 17),
    (15, 19),
    (15, 21),
    // right arm and hand
    (12, 14),
    (14, 16),
    (16, 18),
    (16, 20),
    (16, 22),
    // torso
    (12, 11),
    (23, 11),
    (24, 12),
    (23, 24),
    // left leg
    (23, 25),
    (25, 27),
    (27, 29),
    (27, 31),
    // right leg
    (24, 26),
    (26, 28),
    (28, 30),
    (28, 32),
];

/// Adjacency list distributed with the BlazePose model family. Unlike the
/// anatomical table it also closes the hand and foot triangles.
pub const MODEL_ADJACENCY_EDGES: &[(usize, usize)] = &[
    (0, 1),
    (0, 4),
    (1, 2),
    (2, 3),
    (3, 7),
    (4, 5),
    (5, 6),
    (6, 8),
    (9, 10),
    (11, 12),
    (11, 13),
    (11, 23),
    (12, 14),
    (14, 16),
    (12, 24),
    (13, 15),
    (15, 17),
    (16, 18),
    (16, 20),
    (15, 19),
    (15, 21),
    (16, 22),
    (17, 19),
    (18, 20),
    (23, 25),
    (23, 24),
    (24, 26),
    (25, 27),
    (26, 28),
    (27, 29),
    (28, 30),
    (27, 31),
    (28, 32),
    (29, 31),
    (30, 32),
];

const fn edges_within_layout(edges: &[(usize, usize)]) -> bool {
    let mut i = 0;
    while i < edges.len() {
        let (a, b) = edges[i];
        if a >= NUM_KEYPOINTS || b >= NUM_KEYPOINTS || a == b {
            return false;
        }
        i += 1;
    }
    true
}

const _: () = assert!(edges_within_layout(ANATOMICAL_EDGES));
const _: () = assert!(edges_within_layout(MODEL_ADJACENCY_EDGES));

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_POINT_RADIUS: i32 = 5;
pub const DEFAULT_STROKE_WIDTH: i32 = 2;
const DEFAULT_POINT_COLOR: [u8; 4] = [0x5e, 0xeb, 0x34, 255];
const DEFAULT_LINE_COLOR: [u8; 4] = [0x6a, 0xc4, 0x4f, 255];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSource {
    Anatomical,
    ModelAdjacency,
}

impl EdgeSource {
    pub fn edges(&self) -> &'static [(usize, usize)] {
        match self {
            EdgeSource::Anatomical => ANATOMICAL_EDGES,
            EdgeSource::ModelAdjacency => MODEL_ADJACENCY_EDGES,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub point_color: [u8; 4],
    pub line_color: [u8; 4],
    pub point_radius: i32,
    pub stroke_width: i32,
    pub edge_source: EdgeSource,
    pub confidence_threshold: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            point_color: DEFAULT_POINT_COLOR,
            line_color: DEFAULT_LINE_COLOR,
            point_radius: DEFAULT_POINT_RADIUS,
            stroke_width: DEFAULT_STROKE_WIDTH,
            edge_source: EdgeSource::Anatomical,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Drawing surface the renderer paints onto.
pub trait Canvas {
    fn clear(&mut self);
    fn fill_circle(&mut self, center: (f32, f32), radius: i32, color: [u8; 4]);
    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: i32, color: [u8; 4]);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub circles: usize,
    pub segments: usize,
}

#[derive(Clone, Debug)]
pub struct SkeletonRenderer {
    config: RenderConfig,
    edges: &'static [(usize, usize)],
}

impl SkeletonRenderer {
    pub fn new(config: RenderConfig) -> Self {
        let edges = config.edge_source.edges();
        Self { config, edges }
    }

    /// Clears the canvas and redraws every pose. Keypoints count only when
    /// their score is strictly above the threshold.
    pub fn render<C: Canvas + ?Sized>(&self, poses: &[Pose], canvas: &mut C) -> RenderStats {
        canvas.clear();

        let threshold = self.config.confidence_threshold;
        let mut stats = RenderStats::default();

        for pose in poses {
            for kp in &pose.keypoints {
                if kp.score > threshold {
                    canvas.fill_circle((kp.x, kp.y), self.config.point_radius, self.config.point_color);
                    stats.circles += 1;
                }
            }

            for &(a, b) in self.edges {
                let (ka, kb) = (&pose.keypoints[a], &pose.keypoints[b]);
                if ka.score > threshold && kb.score > threshold {
                    canvas.stroke_line(
                        (ka.x, ka.y),
                        (kb.x, kb.y),
                        self.config.stroke_width,
                        self.config.line_color,
                    );
                    stats.segments += 1;
                }
            }
        }

        stats
    }
}

/// RGBA8 raster; cleared to fully transparent.
#[derive(Clone, Debug)]
pub struct RgbaCanvas {
    buffer: Vec<u8>,
    width: u32,
    height: u32,
}

impl RgbaCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buffer: vec![0u8; (width as usize) * (height as usize) * 4],
            width,
            height,
        }
    }

    #[cfg(test)]
    pub fn pixels(&self) -> &[u8] {
        &self.buffer
    }

    /// Matches the raster to the frame size; contents are discarded on change.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        *self = Self::new(width, height);
    }

    pub fn snapshot(&self) -> OverlayImage {
        OverlayImage {
            rgba: self.buffer.clone(),
            width: self.width,
            height: self.height,
        }
    }

    fn put_pixel(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if x < 0 || y < 0 {
            return;
        }
        let (ux, uy) = (x as u32, y as u32);
        if ux >= self.width || uy >= self.height {
            return;
        }
        let idx = ((uy * self.width + ux) as usize) * 4;
        if idx + 3 < self.buffer.len() {
            self.buffer[idx..idx + 4].copy_from_slice(&color);
        }
    }

    /// Square brush exactly `width` pixels across; even widths lean right/down.
    fn stamp(&mut self, x: i32, y: i32, width: i32, color: [u8; 4]) {
        let (lo, hi) = (-((width - 1) / 2), width / 2);
        for oy in lo..=hi {
            for ox in lo..=hi {
                self.put_pixel(x + ox, y + oy, color);
            }
        }
    }
}

impl Canvas for RgbaCanvas {
    fn clear(&mut self) {
        self.buffer.fill(0);
    }

    fn fill_circle(&mut self, center: (f32, f32), radius: i32, color: [u8; 4]) {
        let (cx, cy) = (center.0.round() as i32, center.1.round() as i32);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.put_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: i32, color: [u8; 4]) {
        let (mut x0, mut y0) = (from.0.round() as i32, from.1.round() as i32);
        let (x1, y1) = (to.0.round() as i32, to.1.round() as i32);
        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let width = width.max(1);

        loop {
            self.stamp(x0, y0, width, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Keypoint;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Clear,
        Circle((f32, f32)),
        Line((f32, f32), (f32, f32)),
    }

    #[derive(Default)]
    struct RecordingCanvas {
        ops: Vec<Op>,
    }

    impl RecordingCanvas {
        fn lines(&self) -> Vec<&Op> {
            self.ops.iter().filter(|op| matches!(op, Op::Line(..))).collect()
        }

        fn circles(&self) -> Vec<&Op> {
            self.ops.iter().filter(|op| matches!(op, Op::Circle(..))).collect()
        }
    }

    impl Canvas for RecordingCanvas {
        fn clear(&mut self) {
            self.ops.push(Op::Clear);
        }

        fn fill_circle(&mut self, center: (f32, f32), _radius: i32, _color: [u8; 4]) {
            self.ops.push(Op::Circle(center));
        }

        fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), _width: i32, _color: [u8; 4]) {
            self.ops.push(Op::Line(from, to));
        }
    }

    fn pose_with_all_scores(score: f32) -> Pose {
        let keypoints = (0..NUM_KEYPOINTS)
            .map(|i| Keypoint::new(i as f32 * 3.0, i as f32 * 2.0, score))
            .collect();
        Pose::from_keypoints(keypoints).unwrap()
    }

    #[test]
    fn shoulders_only_draw_one_segment() {
        let mut pose = Pose::default();
        pose.keypoints[11] = Keypoint::new(10.0, 10.0, 0.9);
        pose.keypoints[12] = Keypoint::new(20.0, 20.0, 0.9);

        let renderer = SkeletonRenderer::new(RenderConfig::default());
        let mut canvas = RecordingCanvas::default();
        let stats = renderer.render(&[pose], &mut canvas);

        assert_eq!(stats, RenderStats { circles: 2, segments: 1 });
        assert_eq!(canvas.circles().len(), 2);
        assert_eq!(
            canvas.lines(),
            vec![&Op::Line((20.0, 20.0), (10.0, 10.0))]
        );
    }

    #[test]
    fn threshold_is_strict() {
        let mut pose = Pose::default();
        pose.keypoints[23] = Keypoint::new(5.0, 5.0, 0.5);
        pose.keypoints[24] = Keypoint::new(9.0, 9.0, 0.5 + f32::EPSILON);
        pose.keypoints[26] = Keypoint::new(12.0, 12.0, 0.8);

        let renderer = SkeletonRenderer::new(RenderConfig::default());
        let mut canvas = RecordingCanvas::default();
        let stats = renderer.render(&[pose], &mut canvas);

        // 23 sits exactly on the threshold: no circle, no (23, 24) hip line.
        assert_eq!(stats.circles, 2);
        assert!(!canvas.ops.contains(&Op::Circle((5.0, 5.0))));
        assert_eq!(canvas.lines(), vec![&Op::Line((9.0, 9.0), (12.0, 12.0))]);
    }

    #[test]
    fn confident_pose_draws_every_edge_once() {
        for source in [EdgeSource::Anatomical, EdgeSource::ModelAdjacency] {
            let renderer = SkeletonRenderer::new(RenderConfig {
                edge_source: source,
                ..RenderConfig::default()
            });
            let mut canvas = RecordingCanvas::default();
            let stats = renderer.render(&[pose_with_all_scores(0.99)], &mut canvas);

            assert_eq!(stats.segments, source.edges().len());
            assert_eq!(stats.circles, NUM_KEYPOINTS);
        }
        assert_eq!(ANATOMICAL_EDGES.len(), 31);
        assert_eq!(MODEL_ADJACENCY_EDGES.len(), 35);
    }

    #[test]
    fn edge_tables_have_no_reversed_duplicates() {
        for edges in [ANATOMICAL_EDGES, MODEL_ADJACENCY_EDGES] {
            for (i, &(a, b)) in edges.iter().enumerate() {
                for &(c, d) in &edges[i + 1..] {
                    assert!(
                        !((a == c && b == d) || (a == d && b == c)),
                        "edge ({a}, {b}) listed twice"
                    );
                }
            }
        }
    }

    #[test]
    fn edge_sources_differ() {
        assert!(edges_within_layout(ANATOMICAL_EDGES));
        assert!(edges_within_layout(MODEL_ADJACENCY_EDGES));
        assert!(!edges_within_layout(&[(0, NUM_KEYPOINTS)]));
        // The two tables disagree, so they are never mixed.
        assert!(MODEL_ADJACENCY_EDGES.contains(&(17, 19)));
        assert!(!ANATOMICAL_EDGES.contains(&(17, 19)));
    }

    #[test]
    fn every_render_starts_with_clear() {
        let renderer = SkeletonRenderer::new(RenderConfig::default());
        let mut canvas = RecordingCanvas::default();
        renderer.render(&[], &mut canvas);
        renderer.render(&[pose_with_all_scores(0.1)], &mut canvas);
        assert_eq!(canvas.ops, vec![Op::Clear, Op::Clear]);
    }

    #[test]
    fn multiple_poses_are_all_drawn() {
        let renderer = SkeletonRenderer::new(RenderConfig::default());
        let mut canvas = RecordingCanvas::default();
        let poses = [pose_with_all_scores(0.9), pose_with_all_scores(0.9)];
        let stats = renderer.render(&poses, &mut canvas);
        assert_eq!(stats.circles, 2 * NUM_KEYPOINTS);
        assert_eq!(stats.segments, 2 * ANATOMICAL_EDGES.len());
    }

    #[test]
    fn rendering_twice_gives_same_pixels() {
        let renderer = SkeletonRenderer::new(RenderConfig::default());
        let pose = pose_with_all_scores(0.9);
        let mut canvas = RgbaCanvas::new(128, 96);

        renderer.render(std::slice::from_ref(&pose), &mut canvas);
        let first = canvas.pixels().to_vec();
        renderer.render(std::slice::from_ref(&pose), &mut canvas);
        assert_eq!(first, canvas.pixels());
        assert!(first.iter().any(|&b| b != 0));
    }

    #[test]
    fn clear_removes_previous_skeleton() {
        let renderer = SkeletonRenderer::new(RenderConfig::default());
        let mut canvas = RgbaCanvas::new(64, 64);
        renderer.render(&[pose_with_all_scores(0.9)], &mut canvas);
        renderer.render(&[], &mut canvas);
        assert!(canvas.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn circle_pixels_use_point_color() {
        let config = RenderConfig::default();
        let mut canvas = RgbaCanvas::new(32, 32);
        canvas.fill_circle((10.0, 10.0), config.point_radius, config.point_color);

        let idx = ((10 * 32 + 10) * 4) as usize;
        assert_eq!(&canvas.pixels()[idx..idx + 4], &config.point_color);
        // (16, 10) lies outside a radius-5 disc.
        let idx = ((10 * 32 + 16) * 4) as usize;
        assert_eq!(&canvas.pixels()[idx..idx + 4], &[0, 0, 0, 0]);
    }

    #[test]
    fn drawing_outside_raster_is_clipped() {
        let mut canvas = RgbaCanvas::new(16, 16);
        canvas.fill_circle((-20.0, 300.0), 5, [255; 4]);
        canvas.stroke_line((-50.0, -50.0), (100.0, 100.0), 2, [255; 4]);
        let idx = ((8 * 16 + 8) * 4) as usize;
        assert_eq!(&canvas.pixels()[idx..idx + 4], &[255; 4]);
    }

    #[test]
    fn stroke_covers_exactly_the_configured_width() {
        let color = [9, 9, 9, 255];
        for width in 1..=4 {
            let mut canvas = RgbaCanvas::new(12, 12);
            canvas.stroke_line((1.0, 6.0), (10.0, 6.0), width, color);
            let painted = (0..12usize)
                .filter(|&y| {
                    let idx = (y * 12 + 5) * 4;
                    canvas.pixels()[idx..idx + 4] == color
                })
                .count();
            assert_eq!(painted, width as usize, "stroke width {width}");
        }
    }

    #[test]
    fn resize_discards_contents_only_on_change() {
        let mut canvas = RgbaCanvas::new(8, 8);
        canvas.fill_circle((4.0, 4.0), 1, [1, 2, 3, 4]);
        canvas.resize(8, 8);
        assert!(canvas.pixels().iter().any(|&b| b != 0));
        canvas.resize(10, 6);
        assert_eq!((canvas.width, canvas.height), (10, 6));
        assert_eq!(canvas.pixels().len(), 10 * 6 * 4);
        assert!(canvas.pixels().iter().all(|&b| b == 0));
    }
}
