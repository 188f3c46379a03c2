//! GPU buffer types for the force kernel
//!
//! Layouts match the WGSL structs in [`super::shaders`]. Both are 16 bytes so
//! arrays of them satisfy storage-buffer alignment without extra padding.

use bytemuck::{Pod, Zeroable};

use crate::kernel::ForceParams;
use crate::types::Vec3;

/// Workgroup size of the force kernel (must match `@workgroup_size`)
pub const WORKGROUP_SIZE: u32 = 256;

/// Sentinel for "no displacement cap" in [`KernelUniforms::max_displacement`]
pub const NO_DISPLACEMENT_CAP: f32 = 0.0;

/// One node position, padded to a `vec4<f32>`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuPosition {
    pub position: [f32; 3],
    pub _padding: f32,
}

impl From<Vec3> for GpuPosition {
    fn from(v: Vec3) -> Self {
        Self {
            position: v.to_array(),
            _padding: 0.0,
        }
    }
}

impl From<GpuPosition> for Vec3 {
    fn from(p: GpuPosition) -> Self {
        Vec3::from(p.position)
    }
}

/// Per-run kernel parameters
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct KernelUniforms {
    pub node_count: u32,
    pub spring_constant: f32,
    pub repulsive_constant: f32,
    /// [`NO_DISPLACEMENT_CAP`] disables the cap
    pub max_displacement: f32,
}

impl KernelUniforms {
    pub fn new(node_count: u32, params: &ForceParams) -> Self {
        Self {
            node_count,
            spring_constant: params.spring_constant,
            repulsive_constant: params.repulsive_constant,
            max_displacement: params.max_displacement.unwrap_or(NO_DISPLACEMENT_CAP),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sizes() {
        assert_eq!(std::mem::size_of::<GpuPosition>(), 16);
        assert_eq!(std::mem::size_of::<KernelUniforms>(), 16);
    }

    #[test]
    fn position_conversion() {
        let p = GpuPosition::from(Vec3::new(1.0, -2.0, 3.5));
        assert_eq!(p.position, [1.0, -2.0, 3.5]);
        assert_eq!(Vec3::from(p), Vec3::new(1.0, -2.0, 3.5));
    }

    #[test]
    fn missing_cap_maps_to_sentinel() {
        let params = ForceParams {
            spring_constant: 0.15,
            repulsive_constant: 1.0,
            max_displacement: None,
        };
        assert_eq!(KernelUniforms::new(3, &params).max_displacement, NO_DISPLACEMENT_CAP);
        let capped = ForceParams {
            max_displacement: Some(2.5),
            ..params
        };
        assert_eq!(KernelUniforms::new(3, &capped).max_displacement, 2.5);
    }
}
