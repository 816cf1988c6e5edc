//! WGSL generation for the elementwise kernels.
//!
//! Each scalar operator contributes a single expression; the surrounding
//! kernel (bindings, bounds check, 2-D index) is shared by every operator of a
//! given shape.

use crate::field::operators::{wgsl_binary_expr, wgsl_unary_expr, WgslBinary, WgslUnary};

/// Header shared by every kernel: parameter block and the flattened index.
pub(crate) const PARAMS_WGSL: &str = r#"
struct Params {
    n: u32,
    aux: u32,
    flags: u32,
    value: f32,
}
"#;

/// Operand arrangement of an elementwise kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    FieldField,
    FieldScalar,
    ScalarField,
    Unary,
}

impl Shape {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Shape::FieldField => "ff",
            Shape::FieldScalar => "fs",
            Shape::ScalarField => "sf",
            Shape::Unary => "u",
        }
    }

    /// Number of storage inputs the kernel binds before its output.
    pub(crate) fn inputs(self) -> usize {
        match self {
            Shape::FieldField => 2,
            _ => 1,
        }
    }
}

fn kernel_source(shape: Shape, helpers: &str, expr: &str) -> String {
    let inputs = match shape.inputs() {
        2 => concat!(
            "@group(0) @binding(1) var<storage, read> src_a: array<f32>;\n",
            "@group(0) @binding(2) var<storage, read> src_b: array<f32>;\n",
            "@group(0) @binding(3) var<storage, read_write> dst: array<f32>;\n",
        ),
        _ => concat!(
            "@group(0) @binding(1) var<storage, read> src_a: array<f32>;\n",
            "@group(0) @binding(2) var<storage, read_write> dst: array<f32>;\n",
        ),
    };
    format!(
        r#"{params}
@group(0) @binding(0) var<uniform> params: Params;
{inputs}{helpers}
@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>) {{
    let idx = gid.x + gid.y * nwg.x * 64u;
    if (idx >= params.n) {{
        return;
    }}
    dst[idx] = {expr};
}}
"#,
        params = PARAMS_WGSL,
        inputs = inputs,
        helpers = helpers,
        expr = expr
    )
}

pub(crate) fn binary_kernel<Op: WgslBinary>(shape: Shape) -> String {
    let expr = match shape {
        Shape::FieldField => wgsl_binary_expr::<Op>("src_a[idx]", "src_b[idx]"),
        Shape::FieldScalar => wgsl_binary_expr::<Op>("src_a[idx]", "params.value"),
        Shape::ScalarField | Shape::Unary => wgsl_binary_expr::<Op>("params.value", "src_a[idx]"),
    };
    kernel_source(shape, "", &expr)
}

pub(crate) fn unary_kernel<F: WgslUnary>() -> String {
    kernel_source(Shape::Unary, F::HELPERS, &wgsl_unary_expr::<F>("src_a[idx]"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::operators::{Add, Erfc, Sqrt};

    #[test]
    fn field_field_kernel_binds_two_inputs() {
        let src = binary_kernel::<Add>(Shape::FieldField);
        assert!(src.contains("dst[idx] = (src_a[idx] + src_b[idx]);"));
        assert!(src.contains("@binding(3) var<storage, read_write> dst"));
    }

    #[test]
    fn broadcast_kernels_read_the_uniform_value() {
        assert!(binary_kernel::<Add>(Shape::FieldScalar).contains("(src_a[idx] + params.value)"));
        assert!(binary_kernel::<Add>(Shape::ScalarField).contains("(params.value + src_a[idx])"));
        assert!(unary_kernel::<Sqrt>().contains("dst[idx] = sqrt(src_a[idx]);"));
    }

    #[test]
    fn unary_kernel_carries_its_helpers() {
        let src = unary_kernel::<Erfc>();
        assert!(src.contains("fn erf_as(x: f32) -> f32"));
        assert!(src.contains("dst[idx] = (1.0 - erf_as(src_a[idx]));"));
        assert!(!unary_kernel::<Sqrt>().contains("fn erf_as"));
    }
}
