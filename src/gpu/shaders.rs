//! WGSL source of the force kernel
//!
//! Mirrors `kernel::node_displacement`: one invocation per node reads the
//! `positions_in` snapshot and writes only its own slot of `positions_out`.
//! WGSL gives no guarantee that NaN survives arithmetic or compares unequal
//! to itself, so coincident nodes are detected explicitly (`d == 0`) and
//! produce a zero displacement, as the CPU path does via its NaN guard.

/// Entry point name of [`FORCE_KERNEL`]
pub const FORCE_KERNEL_ENTRY: &str = "force_kernel";

/// The force kernel compute shader
pub const FORCE_KERNEL: &str = r#"
struct Params {
    node_count: u32,
    spring_constant: f32,
    repulsive_constant: f32,
    max_displacement: f32,
}

@group(0) @binding(0) var<storage, read> positions_in: array<vec4<f32>>;
@group(0) @binding(1) var<storage, read_write> positions_out: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read> edge_block_start: array<u32>;
@group(0) @binding(3) var<storage, read> edge_block_length: array<u32>;
@group(0) @binding(4) var<storage, read> edge_indices: array<u32>;
@group(0) @binding(5) var<storage, read> edge_weights: array<f32>;
@group(0) @binding(6) var<uniform> params: Params;

@compute @workgroup_size(256)
fn force_kernel(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let i = global_id.x;
    if (i >= params.node_count) {
        return;
    }

    let p_i = positions_in[i].xyz;
    var displacement = vec3<f32>(0.0, 0.0, 0.0);
    var degenerate = false;

    // Hooke's law along each edge
    let start = edge_block_start[i];
    let end = start + edge_block_length[i];
    for (var e = start; e < end; e = e + 1u) {
        let j = edge_indices[e];
        let v = p_i - positions_in[j].xyz;
        let d = length(v);
        if (d == 0.0) {
            degenerate = true;
            continue;
        }
        displacement = displacement - (v / d) * (params.spring_constant * edge_weights[e] * d);
    }

    // Coulomb's law from every other node
    for (var j = 0u; j < params.node_count; j = j + 1u) {
        if (j == i) {
            continue;
        }
        let v = p_i - positions_in[j].xyz;
        let d = length(v);
        if (d == 0.0) {
            degenerate = true;
            continue;
        }
        displacement = displacement + (v / d) * (params.repulsive_constant / (d * d));
    }

    if (degenerate) {
        displacement = vec3<f32>(0.0, 0.0, 0.0);
    }

    if (params.max_displacement > 0.0) {
        let len = length(displacement);
        if (len > params.max_displacement) {
            displacement = displacement * (params.max_displacement / len);
        }
    }

    positions_out[i] = vec4<f32>(p_i + displacement, 0.0);
}
"#;
