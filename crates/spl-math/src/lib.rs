pub mod cubic;

pub use glam::{DVec2, DVec3, DVec4, DMat3, DMat4};

pub type Point2 = DVec2;
pub type Point3 = DVec3;
pub type Vector2 = DVec2;
pub type Vector3 = DVec3;

/// A homogeneous control vertex `(x·w, y·w, z·w, w)`.
pub type HVec4 = DVec4;
