//! Geometry utilities: reprojection and marker/pixel conversions.

pub mod projection;

pub use projection::ClipProjection;
