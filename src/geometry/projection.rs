//! Reprojection between world space, clip pixel space and normalized
//! marker space.
//!
//! Conventions follow the host camera: the camera looks down its local -Z
//! axis, so a visible point has negative camera-space depth. Pixel space has
//! its vertical axis scaled by `1 / pixel_aspect`, the same scaling applied
//! to observed markers, so distances in pixel space are comparable.

use nalgebra::{Matrix4, Vector2, Vector3, Vector4};

use crate::store::{CameraIntrinsics, Clip};

/// Clip dimensions plus camera intrinsics: everything needed to move
/// between normalized marker coordinates and pixels.
#[derive(Debug, Clone, Copy)]
pub struct ClipProjection {
    pub width: f64,
    pub height: f64,
    pub camera: CameraIntrinsics,
}

impl ClipProjection {
    pub fn new(width: u32, height: u32, camera: CameraIntrinsics) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
            camera,
        }
    }

    pub fn from_clip(clip: &Clip) -> Self {
        Self::new(clip.width, clip.height, clip.camera)
    }

    /// Vertical pixel scale (`1 / pixel_aspect`).
    fn aspect_y(&self) -> f64 {
        1.0 / self.camera.pixel_aspect
    }

    /// Project a world point through the inverse of `camera_matrix`.
    ///
    /// Returns `None` when the camera-space depth is exactly zero or the
    /// camera matrix cannot be inverted.
    pub fn reproject(&self, point: &Vector3<f64>, camera_matrix: &Matrix4<f64>) -> Option<Vector2<f64>> {
        let world_to_camera = camera_matrix.try_inverse()?;
        let p = world_to_camera * Vector4::new(point.x, point.y, point.z, 1.0);
        if p.z == 0.0 {
            return None;
        }

        let scale = self.camera.focal_length_px / -p.z;
        Some(Vector2::new(
            self.camera.principal.x + p.x * scale,
            self.camera.principal.y * self.aspect_y() + p.y * scale,
        ))
    }

    /// Observed marker position (plus track offset) in pixel space.
    pub fn marker_to_pixels(&self, co: &Vector2<f64>, offset: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            (co.x + offset.x) * self.width,
            (co.y + offset.y) * self.height * self.aspect_y(),
        )
    }

    /// Inverse of [`marker_to_pixels`](Self::marker_to_pixels) for a zero offset.
    pub fn pixels_to_marker(&self, px: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(px.x / self.width, px.y / (self.height * self.aspect_y()))
    }
}
