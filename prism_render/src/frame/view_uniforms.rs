/// Per-view uniform block written once per frame into the view uniform
/// buffer of the acquired swapchain image.
///
/// Layout matches a std140 block of four `mat4` followed by three `vec4`.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ViewUniforms {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub inverse_view_projection: Mat4,
    /// xyz = camera position, w = 1
    pub camera_position: Vec4,
    /// width, height, 1 / width, 1 / height
    pub viewport: Vec4,
    /// seconds, delta seconds, frame number, unused
    pub time: Vec4,
}

impl ViewUniforms {
    pub const SIZE: u64 = std::mem::size_of::<ViewUniforms>() as u64;

    pub fn new(view: Mat4, projection: Mat4, width: u32, height: u32) -> Self {
        let view_projection = projection * view;
        let camera_position = view.inverse().transform_point3(Vec3::ZERO);
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        Self {
            view,
            projection,
            view_projection,
            inverse_view_projection: view_projection.inverse(),
            camera_position: camera_position.extend(1.0),
            viewport: Vec4::new(w, h, 1.0 / w, 1.0 / h),
            time: Vec4::ZERO,
        }
    }

    pub fn with_time(mut self, seconds: f32, delta_seconds: f32, frame_number: u64) -> Self {
        self.time = Vec4::new(seconds, delta_seconds, frame_number as f32, 0.0);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl Default for ViewUniforms {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, 1, 1)
    }
}

#[cfg(test)]
#[path = "view_uniforms_tests.rs"]
mod tests;
