//! Host-side reference computation and exact output comparison.
//!
//! The references follow the operand layout of the device operations:
//! `a` is M x K row-major, `b` holds one K-deep column of the result per
//! row, so `dst[i][j] = sum(a[i][l] * b[j][l])`.

use alloc::vec::Vec;
use half::f16;

use crate::err::NpuError;

/// Reference matmul for float16 operands with float32 accumulation, the
/// same arithmetic the MAC array performs.
pub fn matmul_reference_f32(m: usize, k: usize, n: usize, a: &[f16], b: &[f16]) -> Vec<f32> {
    assert_eq!(a.len(), m * k);
    assert_eq!(b.len(), n * k);
    let mut dst = Vec::with_capacity(m * n);
    for i in 0..m {
        for j in 0..n {
            let mut acc = 0.0f32;
            for l in 0..k {
                acc += f32::from(a[i * k + l]) * f32::from(b[j * k + l]);
            }
            dst.push(acc);
        }
    }
    dst
}

/// Reference matmul for int8 operands with int32 accumulation.
pub fn matmul_reference_i32(m: usize, k: usize, n: usize, a: &[i8], b: &[i8]) -> Vec<i32> {
    assert_eq!(a.len(), m * k);
    assert_eq!(b.len(), n * k);
    let mut dst = Vec::with_capacity(m * n);
    for i in 0..m {
        for j in 0..n {
            let mut acc = 0i32;
            for l in 0..k {
                acc += a[i * k + l] as i32 * b[j * k + l] as i32;
            }
            dst.push(acc);
        }
    }
    dst
}

/// Compares device output against the reference, element for element.
/// Mismatches are logged with both values and their raw bit patterns;
/// rounding differences are not tolerated.
pub fn compare_f32(expected: &[f32], actual: &[f32], n: usize) -> Result<(), NpuError> {
    assert_eq!(expected.len(), actual.len());
    let mut mismatches = 0;
    for (idx, (e, a)) in expected.iter().zip(actual.iter()).enumerate() {
        if e != a {
            error!(
                "mismatch at m:{} n:{} expected:{} ({:#010x}) actual:{} ({:#010x})",
                idx / n,
                idx % n,
                e,
                e.to_bits(),
                a,
                a.to_bits()
            );
            mismatches += 1;
        }
    }
    if mismatches > 0 {
        return Err(NpuError::Verification {
            mismatches,
            total: expected.len(),
        });
    }
    Ok(())
}

/// Exact comparison for int32 output.
pub fn compare_i32(expected: &[i32], actual: &[i32], n: usize) -> Result<(), NpuError> {
    assert_eq!(expected.len(), actual.len());
    let mut mismatches = 0;
    for (idx, (e, a)) in expected.iter().zip(actual.iter()).enumerate() {
        if e != a {
            error!(
                "mismatch at m:{} n:{} expected:{} ({:#010x}) actual:{} ({:#010x})",
                idx / n,
                idx % n,
                e,
                *e as u32,
                a,
                *a as u32
            );
            mismatches += 1;
        }
    }
    if mismatches > 0 {
        return Err(NpuError::Verification {
            mismatches,
            total: expected.len(),
        });
    }
    Ok(())
}
