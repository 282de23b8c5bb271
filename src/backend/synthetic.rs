//! Deterministic vision backend over a synthetic 3D scene.
//!
//! Features are static 3D points observed by a camera translating along a
//! straight path. Detection projects the visible features, tracking follows
//! the feature whose observation coincides with a track's marker, and
//! solving reports the ground-truth cameras and bundles together with the
//! weighted reprojection error of the current tracks.
//!
//! A feature may carry a glitch: from a given frame on, its observation is
//! shifted in image space. To the tracker this looks exactly like a jump cut.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use nalgebra::{Matrix4, Vector2, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::geometry::ClipProjection;
use crate::store::{CameraIntrinsics, CameraPose, Clip, Frame, Reconstruction, TrackDirection};

use super::{DetectParams, Placement, TrackExtent, VisionBackend};

/// Two observations closer than this (normalized units) are the same feature.
const DEFAULT_MATCH_RADIUS: f64 = 1e-6;

/// Frames observed by fewer tracks than this get no camera.
const DEFAULT_MIN_TRACKS_PER_CAMERA: usize = 6;

/// Image-space shift applied to a feature's observations from `frame` on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glitch {
    pub frame: Frame,
    pub offset: Vector2<f64>,
}

/// A static scene point.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticFeature {
    pub position: Vector3<f64>,
    /// First frame the feature can be observed on.
    pub first_frame: Frame,
    /// Last frame the feature can be observed on.
    pub last_frame: Frame,
    /// Detector response in `[0, 1]`.
    pub strength: f64,
    pub glitch: Option<Glitch>,
}

impl SyntheticFeature {
    pub fn new(position: Vector3<f64>) -> Self {
        Self {
            position,
            first_frame: Frame::MIN,
            last_frame: Frame::MAX,
            strength: 1.0,
            glitch: None,
        }
    }

    pub fn alive_between(mut self, first_frame: Frame, last_frame: Frame) -> Self {
        self.first_frame = first_frame;
        self.last_frame = last_frame;
        self
    }

    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_glitch(mut self, frame: Frame, offset: Vector2<f64>) -> Self {
        self.glitch = Some(Glitch { frame, offset });
        self
    }

    fn is_alive(&self, frame: Frame) -> bool {
        frame >= self.first_frame && frame <= self.last_frame
    }
}

/// Camera translating at constant velocity, looking down -Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPath {
    pub origin: Vector3<f64>,
    /// Translation per frame.
    pub velocity: Vector3<f64>,
}

impl CameraPath {
    /// Camera-to-world matrix at `frame`.
    pub fn matrix(&self, frame: Frame) -> Matrix4<f64> {
        Matrix4::new_translation(&(self.origin + self.velocity * frame as f64))
    }
}

/// Everything the synthetic backend observes.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    pub projection: ClipProjection,
    pub camera_path: CameraPath,
    pub features: Vec<SyntheticFeature>,
}

impl SyntheticScene {
    /// Full HD clip, 1000 px focal length, camera sliding along +X.
    pub fn new(features: Vec<SyntheticFeature>) -> Self {
        Self {
            projection: ClipProjection::new(1920, 1080, CameraIntrinsics::centered(1000.0, 1920, 1080)),
            camera_path: CameraPath {
                origin: Vector3::zeros(),
                velocity: Vector3::new(0.02, 0.0, 0.0),
            },
            features,
        }
    }

    /// Random scene over `[frame_start, frame_end]`. Some features die early
    /// and a few carry a glitch, so every health pass has work to do.
    pub fn random(seed: u64, num_features: usize, frame_start: Frame, frame_end: Frame) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut scene = Self::new(Vec::with_capacity(num_features));
        let travel = scene.camera_path.velocity.x * (frame_end - frame_start) as f64;

        for _ in 0..num_features {
            let depth = rng.gen_range(8.0..20.0);
            let x = rng.gen_range(-0.9 * depth..0.9 * depth + travel);
            let y = rng.gen_range(-0.5 * depth..0.5 * depth);
            let mut feature = SyntheticFeature::new(Vector3::new(x, y, -depth))
                .with_strength(rng.gen_range(0.1..1.0));

            if rng.gen_bool(0.3) {
                let first = rng.gen_range(frame_start..=frame_end);
                let last = first + rng.gen_range(5..40);
                feature = feature.alive_between(first, last);
            }
            if rng.gen_bool(0.05) {
                let frame = rng.gen_range(frame_start..=frame_end);
                feature = feature.with_glitch(frame, Vector2::new(0.03, -0.02));
            }
            scene.features.push(feature);
        }
        scene
    }

    /// An empty clip matching this scene's camera.
    pub fn clip(&self) -> Clip {
        Clip::new(
            self.projection.width as u32,
            self.projection.height as u32,
            self.projection.camera,
        )
    }

    /// Normalized observation of `feature` on `frame`, if it is alive and
    /// inside the image.
    pub fn observe(&self, feature: &SyntheticFeature, frame: Frame) -> Option<Vector2<f64>> {
        if !feature.is_alive(frame) {
            return None;
        }
        let px = self
            .projection
            .reproject(&feature.position, &self.camera_path.matrix(frame))?;
        let mut co = self.projection.pixels_to_marker(&px);
        if let Some(glitch) = feature.glitch.filter(|g| frame >= g.frame) {
            co += glitch.offset;
        }

        let inside = (0.0..=1.0).contains(&co.x) && (0.0..=1.0).contains(&co.y);
        inside.then_some(co)
    }

    /// Feature observed at `co` on `frame`.
    fn match_feature(&self, co: &Vector2<f64>, frame: Frame, radius: f64) -> Option<&SyntheticFeature> {
        self.features
            .iter()
            .filter_map(|f| self.observe(f, frame).map(|obs| (f, (obs - co).norm())))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(f, _)| f)
    }
}

/// Call counters, useful to assert on what the session asked for.
#[derive(Debug, Default, Clone)]
pub struct BackendStats {
    pub detect_calls: usize,
    pub track_calls: usize,
    pub solve_calls: usize,
}

/// `VisionBackend` over a [`SyntheticScene`].
pub struct SyntheticBackend {
    scene: SyntheticScene,
    match_radius: f64,
    min_tracks_per_camera: usize,
    fail_tracking_at: Option<Frame>,
    pub stats: BackendStats,
}

impl SyntheticBackend {
    pub fn new(scene: SyntheticScene) -> Self {
        Self {
            scene,
            match_radius: DEFAULT_MATCH_RADIUS,
            min_tracks_per_camera: DEFAULT_MIN_TRACKS_PER_CAMERA,
            fail_tracking_at: None,
            stats: BackendStats::default(),
        }
    }

    pub fn scene(&self) -> &SyntheticScene {
        &self.scene
    }

    pub fn with_min_tracks_per_camera(mut self, n: usize) -> Self {
        self.min_tracks_per_camera = n;
        self
    }

    /// Make the tracker report an error when asked to track from `frame`.
    pub fn fail_tracking_at(mut self, frame: Frame) -> Self {
        self.fail_tracking_at = Some(frame);
        self
    }
}

impl VisionBackend for SyntheticBackend {
    fn detect_features(&mut self, clip: &mut Clip, frame: Frame, params: &DetectParams) -> Result<()> {
        self.stats.detect_calls += 1;

        // The synthetic clip carries no annotation strokes.
        if params.placement == Placement::InsideAnnotation {
            return Ok(());
        }

        let proj = &self.scene.projection;
        let max_x = proj.width - params.margin_px;
        let max_y = proj.height / proj.camera.pixel_aspect - params.margin_px;
        let mut accepted: Vec<Vector2<f64>> = Vec::new();

        for feature in &self.scene.features {
            if feature.strength < params.threshold {
                continue;
            }
            let Some(co) = self.scene.observe(feature, frame) else {
                continue;
            };
            let px = proj.marker_to_pixels(&co, &Vector2::zeros());
            if px.x < params.margin_px || px.x > max_x || px.y < params.margin_px || px.y > max_y {
                continue;
            }
            if accepted.iter().any(|a| (a - px).norm() < params.min_distance_px) {
                continue;
            }
            accepted.push(px);

            let id = clip.tracking.new_track();
            if let Some(track) = clip.tracking.get_mut(id) {
                track.insert_marker(frame, co);
                track.selected = true;
            }
        }

        debug!("synthetic detector: {} features on frame {}", accepted.len(), frame);
        Ok(())
    }

    fn track_markers(
        &mut self,
        clip: &mut Clip,
        frame: Frame,
        direction: TrackDirection,
        extent: TrackExtent,
    ) -> Result<()> {
        self.stats.track_calls += 1;
        if self.fail_tracking_at == Some(frame) {
            bail!("tracker failed on frame {}", frame);
        }

        let ids: Vec<_> = clip
            .tracking
            .tracks()
            .filter(|t| t.selected && t.is_editable())
            .map(|t| t.id)
            .collect();

        for id in ids {
            let Some(track) = clip.tracking.get_mut(id) else {
                continue;
            };
            let mut from = frame;
            for _ in 0..extent.frames() {
                let Some(co) = track.active_marker_at(from).map(|m| m.co) else {
                    break;
                };
                let Some(feature) = self.scene.match_feature(&co, from, self.match_radius) else {
                    break;
                };
                let to = from + direction.step();
                let Some(next) = self.scene.observe(feature, to) else {
                    break;
                };
                track.insert_marker(to, next);
                from = to;
            }
        }
        Ok(())
    }

    fn solve_camera(&mut self, clip: &mut Clip) -> Result<()> {
        self.stats.solve_calls += 1;
        let projection = ClipProjection::from_clip(clip);
        let store = &mut clip.tracking;

        let mut observations: BTreeMap<Frame, usize> = BTreeMap::new();
        for track in store.tracks_mut() {
            track.bundle = track
                .span_start()
                .and_then(|start| track.marker_at(start))
                .and_then(|m| self.scene.match_feature(&m.co, m.frame, self.match_radius))
                .map(|f| f.position);
            if track.bundle.is_none() {
                continue;
            }
            for marker in track.markers().iter().filter(|m| !m.muted) {
                *observations.entry(marker.frame).or_default() += 1;
            }
        }

        let cameras: Vec<CameraPose> = observations
            .iter()
            .filter(|(_, &n)| n >= self.min_tracks_per_camera)
            .map(|(&frame, _)| CameraPose::new(frame, self.scene.camera_path.matrix(frame)))
            .collect();
        if cameras.is_empty() {
            bail!("not enough tracks to solve camera motion");
        }

        let mut error_sum = 0.0;
        let mut error_count = 0usize;
        for camera in &cameras {
            for track in store.tracks() {
                let (Some(bundle), Some(marker)) = (track.bundle, track.active_marker_at(camera.frame)) else {
                    continue;
                };
                if track.weight_at(camera.frame).unwrap_or(track.weight) <= 0.0 {
                    continue;
                }
                if let Some(px) = projection.reproject(&bundle, &camera.matrix) {
                    error_sum += (projection.marker_to_pixels(&marker.co, &track.offset) - px).norm();
                    error_count += 1;
                }
            }
        }
        let average_error = if error_count > 0 {
            error_sum / error_count as f64
        } else {
            0.0
        };

        store.reconstruction = Reconstruction::new(cameras, average_error);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> SyntheticScene {
        SyntheticScene::new(vec![
            SyntheticFeature::new(Vector3::new(0.0, 0.0, -10.0)),
            SyntheticFeature::new(Vector3::new(3.0, 2.0, -10.0)).with_strength(0.1),
            SyntheticFeature::new(Vector3::new(-3.0, -2.0, -10.0)).alive_between(0, 2),
        ])
    }

    fn params() -> DetectParams {
        DetectParams {
            threshold: 0.3,
            min_distance_px: 50.0,
            margin_px: 10.0,
            placement: Placement::WholeFrame,
        }
    }

    #[test]
    fn test_observation_moves_against_camera() {
        let scene = scene();
        let f = &scene.features[0];
        let a = scene.observe(f, 0).unwrap();
        let b = scene.observe(f, 1).unwrap();
        // 0.02 units at depth 10 with a 1000 px focal length is 2 px.
        assert!(((a.x - b.x) * 1920.0 - 2.0).abs() < 1e-9);
        assert!((a.y - b.y).abs() < 1e-12);
    }

    #[test]
    fn test_glitch_shifts_observation() {
        let feature = SyntheticFeature::new(Vector3::new(0.0, 0.0, -10.0))
            .with_glitch(5, Vector2::new(0.05, 0.0));
        let scene = SyntheticScene::new(vec![feature.clone()]);
        let before = scene.observe(&feature, 4).unwrap();
        let after = scene.observe(&feature, 5).unwrap();
        assert!((after.x - before.x - 0.05 + 2.0 / 1920.0).abs() < 1e-9);
    }

    #[test]
    fn test_detect_respects_threshold_and_lifetime() {
        let mut backend = SyntheticBackend::new(scene());
        let mut clip = backend.scene().clip();

        backend.detect_features(&mut clip, 0, &params()).unwrap();
        assert_eq!(clip.tracking.len(), 2);
        assert!(clip.tracking.tracks().all(|t| t.selected && t.marker_at(0).is_some()));

        backend.detect_features(&mut clip, 5, &params()).unwrap();
        assert_eq!(clip.tracking.len(), 3);
    }

    #[test]
    fn test_inside_annotation_detects_nothing() {
        let mut backend = SyntheticBackend::new(scene());
        let mut clip = backend.scene().clip();
        let params = DetectParams {
            placement: Placement::InsideAnnotation,
            ..params()
        };
        backend.detect_features(&mut clip, 0, &params).unwrap();
        assert!(clip.tracking.is_empty());
    }

    #[test]
    fn test_tracking_follows_feature_until_it_dies() {
        let mut backend = SyntheticBackend::new(scene());
        let mut clip = backend.scene().clip();
        backend.detect_features(&mut clip, 0, &params()).unwrap();

        backend
            .track_markers(&mut clip, 0, TrackDirection::Forward, TrackExtent::Frames(5))
            .unwrap();

        let lengths: Vec<usize> = clip.tracking.tracks().map(|t| t.num_markers()).collect();
        assert_eq!(lengths, vec![6, 3]);
    }

    #[test]
    fn test_tracking_skips_unselected_tracks() {
        let mut backend = SyntheticBackend::new(scene());
        let mut clip = backend.scene().clip();
        backend.detect_features(&mut clip, 0, &params()).unwrap();
        clip.tracking.deselect_all();

        backend
            .track_markers(&mut clip, 0, TrackDirection::Forward, TrackExtent::OneFrame)
            .unwrap();
        assert!(clip.tracking.tracks().all(|t| t.num_markers() == 1));
    }

    #[test]
    fn test_injected_tracking_failure() {
        let mut backend = SyntheticBackend::new(scene()).fail_tracking_at(3);
        let mut clip = backend.scene().clip();
        assert!(backend
            .track_markers(&mut clip, 3, TrackDirection::Forward, TrackExtent::OneFrame)
            .is_err());
    }

    #[test]
    fn test_solve_reports_exact_cameras() {
        let mut backend = SyntheticBackend::new(scene()).with_min_tracks_per_camera(1);
        let mut clip = backend.scene().clip();
        backend.detect_features(&mut clip, 0, &params()).unwrap();
        backend
            .track_markers(&mut clip, 0, TrackDirection::Forward, TrackExtent::Frames(4))
            .unwrap();

        backend.solve_camera(&mut clip).unwrap();
        let recon = &clip.tracking.reconstruction;
        assert_eq!(recon.frame_range(), Some((0, 4)));
        assert!(recon.average_error < 1e-6);
        assert!(clip.tracking.tracks().all(|t| t.bundle.is_some()));
    }

    #[test]
    fn test_solve_without_tracks_fails() {
        let mut backend = SyntheticBackend::new(scene());
        let mut clip = backend.scene().clip();
        assert!(backend.solve_camera(&mut clip).is_err());
    }

    #[test]
    fn test_random_scene_is_deterministic() {
        let a = SyntheticScene::random(7, 50, 0, 100);
        let b = SyntheticScene::random(7, 50, 0, 100);
        assert_eq!(a.features, b.features);
    }
}
