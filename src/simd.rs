//! SIMD lane-width selection and small vector helpers.
//!
//! The packing width is a compile-time property of the build: 16 lanes when
//! compiled with AVX-512, 4 lanes otherwise (SSE/AVX/NEON all carry 128-bit
//! registers). Packed data produced at one width cannot be consumed by code
//! compiled at another.

use std::simd::Simd;

#[cfg(feature = "fma")]
use std::simd::StdFloat;

/// Number of lanes in a packed batch.
#[cfg(target_feature = "avx512f")]
pub const LANES: usize = 16;
#[cfg(not(target_feature = "avx512f"))]
pub const LANES: usize = 4;

pub type F32s = Simd<f32, LANES>;
pub type I32s = Simd<i32, LANES>;
pub type MaskS = std::simd::Mask<i32, LANES>;

#[inline(always)]
fn fma<const N: usize>(a: Simd<f32, N>, b: Simd<f32, N>, c: Simd<f32, N>) -> Simd<f32, N>
{
    #[cfg(feature = "fma")]
    {
        a.mul_add(b, c)
    }
    #[cfg(not(feature = "fma"))]
    {
        a * b + c
    }
}

#[inline(always)]
pub fn dot3<const N: usize>(
    ax: Simd<f32, N>,
    ay: Simd<f32, N>,
    az: Simd<f32, N>,
    bx: Simd<f32, N>,
    by: Simd<f32, N>,
    bz: Simd<f32, N>,
) -> Simd<f32, N>
{
    let ab = fma(ay, by, ax * bx);
    fma(az, bz, ab)
}

#[inline(always)]
pub fn length_squared<const N: usize>(
    x: Simd<f32, N>,
    y: Simd<f32, N>,
    z: Simd<f32, N>,
) -> Simd<f32, N>
{
    dot3(x, y, z, x, y, z)
}

#[inline(always)]
pub fn distance_squared<const N: usize>(
    ax: Simd<f32, N>,
    ay: Simd<f32, N>,
    az: Simd<f32, N>,
    bx: Simd<f32, N>,
    by: Simd<f32, N>,
    bz: Simd<f32, N>,
) -> Simd<f32, N>
{
    length_squared(ax - bx, ay - by, az - bz)
}

/// Evaluate `n · p + w` per lane. Unit plane normals make this the signed
/// distance to the plane.
#[inline(always)]
pub fn eval_plane<const N: usize>(
    px: Simd<f32, N>,
    py: Simd<f32, N>,
    pz: Simd<f32, N>,
    plane: &[Simd<f32, N>; 4],
) -> Simd<f32, N>
{
    dot3(px, py, pz, plane[0], plane[1], plane[2]) + plane[3]
}
