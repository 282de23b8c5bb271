//! Solver output: camera poses per frame plus the average reprojection error.

use nalgebra::{Matrix4, Vector2};

use super::types::Frame;

/// Solved camera for one frame.
///
/// `matrix` is the camera placement as delivered by the solver (camera to
/// world). Reprojection maps world points through its inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPose {
    pub frame: Frame,
    pub matrix: Matrix4<f64>,
}

impl CameraPose {
    pub fn new(frame: Frame, matrix: Matrix4<f64>) -> Self {
        Self { frame, matrix }
    }
}

/// Camera solve result. Cameras are kept in ascending frame order.
#[derive(Debug, Clone, Default)]
pub struct Reconstruction {
    cameras: Vec<CameraPose>,
    pub average_error: f64,
}

impl Reconstruction {
    /// Build a reconstruction, sorting cameras by frame.
    pub fn new(mut cameras: Vec<CameraPose>, average_error: f64) -> Self {
        cameras.sort_by_key(|c| c.frame);
        cameras.dedup_by_key(|c| c.frame);
        Self {
            cameras,
            average_error,
        }
    }

    pub fn cameras(&self) -> &[CameraPose] {
        &self.cameras
    }

    pub fn is_valid(&self) -> bool {
        !self.cameras.is_empty()
    }

    pub fn find_frame(&self, frame: Frame) -> Option<&CameraPose> {
        self.cameras
            .binary_search_by_key(&frame, |c| c.frame)
            .ok()
            .map(|idx| &self.cameras[idx])
    }

    /// First and last reconstructed frame.
    pub fn frame_range(&self) -> Option<(Frame, Frame)> {
        Some((self.cameras.first()?.frame, self.cameras.last()?.frame))
    }
}

/// Pinhole intrinsics of the tracking camera, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub focal_length_px: f64,
    pub principal: Vector2<f64>,
    /// Pixel width over pixel height.
    pub pixel_aspect: f64,
}

impl CameraIntrinsics {
    /// Intrinsics with square pixels and the principal point at the image center.
    pub fn centered(focal_length_px: f64, width: u32, height: u32) -> Self {
        Self {
            focal_length_px,
            principal: Vector2::new(width as f64 / 2.0, height as f64 / 2.0),
            pixel_aspect: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cameras_sorted_and_searchable() {
        let recon = Reconstruction::new(
            vec![
                CameraPose::new(4, Matrix4::identity()),
                CameraPose::new(1, Matrix4::identity()),
                CameraPose::new(2, Matrix4::identity()),
            ],
            0.5,
        );

        assert!(recon.is_valid());
        assert_eq!(recon.frame_range(), Some((1, 4)));
        assert!(recon.find_frame(2).is_some());
        assert!(recon.find_frame(3).is_none());
    }

    #[test]
    fn test_empty_reconstruction() {
        let recon = Reconstruction::default();
        assert!(!recon.is_valid());
        assert_eq!(recon.frame_range(), None);
    }
}
