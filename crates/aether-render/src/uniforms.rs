//! Per-frame uniform data.

use glam::Mat4;

/// Model/view/projection matrices uploaded once per frame.
///
/// Copied verbatim into the slot's persistently mapped uniform buffer;
/// layout must match the shader's uniform block (std140-compatible: three
/// column-major mat4s).
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniforms {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl SceneUniforms {
    /// Size in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Identity transforms.
    pub fn identity() -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        }
    }

    /// Raw bytes for the uniform buffer copy.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl Default for SceneUniforms {
    fn default() -> Self {
        Self::identity()
    }
}

/// Right-handed perspective projection with the Y axis flipped for
/// Vulkan's downward clip-space Y.
pub fn vulkan_projection(fov_y_radians: f32, aspect: f32, z_near: f32, z_far: f32) -> Mat4 {
    let mut proj = Mat4::perspective_rh(fov_y_radians, aspect, z_near, z_far);
    proj.y_axis.y *= -1.0;
    proj
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_are_three_mat4s() {
        assert_eq!(SceneUniforms::SIZE, 192);
        assert_eq!(SceneUniforms::identity().as_bytes().len(), 192);
    }

    #[test]
    fn projection_flips_y() {
        let flipped = vulkan_projection(1.0, 16.0 / 9.0, 0.1, 10.0);
        let reference = Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 10.0);

        assert_eq!(flipped.y_axis.y, -reference.y_axis.y);
        assert_eq!(flipped.x_axis.x, reference.x_axis.x);
    }
}
