//! Register-level bring-up toolkit for the Rockchip RK3588 NPU.
//!
//! The crate encodes the packed register command streams consumed by the
//! NPU's program sequencer, builds the task descriptors and submission
//! records of the kernel driver's ABI, tiles operands into the layouts
//! the hardware fetches, and verifies device results against host
//! references. Everything that touches the outside world -- buffer
//! allocation, the submit ioctl, flink sharing -- sits behind the
//! [`Platform`] trait, so the same encoder runs against the real DRM
//! device or a simulated one in tests.
//!
//! ```ignore
//! let npu = Npu::new(platform, HwConfig::default());
//! let mut op = npu.matmul(MatmulParams {
//!     m: 4,
//!     k: 32,
//!     n: 16,
//!     kind: MatmulKind::Float16 { narrow_output: false },
//! })?;
//! op.load_f16(&a, &b)?;
//! npu.submit(&op.submit_args(DEFAULT_TIMEOUT_MS))?;
//! let result = op.output_f32()?;
//! npu.release_matmul(op);
//! ```

#![no_std]

extern crate alloc;
#[macro_use]
extern crate log;

mod config;
mod err;
mod platform;
pub mod registers;
mod stream;
mod task;
mod tiling;
mod verify;

pub use config::{HwConfig, NpuVariant};
pub use err::NpuError;
pub use platform::{DeviceVec, DmaRegion, MemFlags, Platform};
pub use stream::{pack, unpack, CmdStream};
pub use task::{
    alu::{add_scale_for, emit_alu, out_cvt_scale_for, AluRecipe, ALU_CMD_WORDS, ALU_CUBE_ELEMS},
    matmul::{build_descriptors, emit_matmul, validate as validate_shape, MatmulBuffers, MATMUL_CMD_WORDS},
    AluAlgorithm, AluDtype, AluOp, CnaDesc, CoreDesc, DpuDesc, JobFlags, MatmulKind, MatmulOp,
    MatmulParams, NpuTask, Precision, SubcoreTask, SubmitArgs, CORE0_MASK, CORE1_MASK, CORE2_MASK,
    CORE_AUTO_MASK, DEFAULT_TIMEOUT_MS, MAX_SUBCORE_TASKS,
};
pub use tiling::{feature_offset, weight_offset};
pub use verify::{compare_f32, compare_i32, matmul_reference_f32, matmul_reference_i32};

use spin::Mutex;

/// Handle to one NPU instance.
///
/// The platform sits behind a mutex: descriptor building is pure, but
/// allocation, submission and release serialize here, so two operations
/// prepared concurrently still submit one at a time.
pub struct Npu<P: Platform> {
    config: HwConfig,
    platform: Mutex<P>,
}

impl<P: Platform> Npu<P> {
    pub fn new(platform: P, config: HwConfig) -> Self {
        Self {
            config,
            platform: Mutex::new(platform),
        }
    }

    pub fn config(&self) -> &HwConfig {
        &self.config
    }

    /// Runs `f` with exclusive access to the platform.
    pub fn with_platform<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        f(&mut *self.platform.lock())
    }

    /// Prepares a matmul operation: shape check, buffer allocation,
    /// command-stream encoding.
    pub fn matmul(&self, params: MatmulParams) -> Result<MatmulOp, NpuError> {
        MatmulOp::create(&mut *self.platform.lock(), &self.config, params)
    }

    /// Prepares an element-wise ALU operation over `len` elements.
    pub fn alu(
        &self,
        dtype: AluDtype,
        algorithm: AluAlgorithm,
        len: usize,
    ) -> Result<AluOp, NpuError> {
        AluOp::create(&mut *self.platform.lock(), dtype, algorithm, len, None)
    }

    /// Submits a prepared operation and blocks until it completes.
    pub fn submit(&self, args: &SubmitArgs) -> Result<(), NpuError> {
        debug!(
            "submitting {} task(s): flags={:?} core_mask={:#x} timeout={}ms",
            args.task_number, args.flags, args.core_mask, args.timeout_ms
        );
        let result = self.platform.lock().submit(args);
        match &result {
            Ok(()) => debug!("job completed"),
            Err(NpuError::Timeout { timeout_ms }) => {
                error!("job did not signal completion within {timeout_ms}ms");
            }
            Err(e) => error!("job failed: {e}"),
        }
        result
    }

    pub fn release_matmul(&self, op: MatmulOp) {
        op.release(&mut *self.platform.lock());
    }

    pub fn release_alu(&self, op: AluOp) {
        op.release(&mut *self.platform.lock());
    }

    /// Full float16 matmul round trip: prepare, load, submit, read back.
    /// Buffers are released on every path.
    pub fn matmul_f32(
        &self,
        m: u32,
        k: u32,
        n: u32,
        a: &[half::f16],
        b: &[half::f16],
        timeout_ms: u32,
    ) -> Result<alloc::vec::Vec<f32>, NpuError> {
        let mut op = self.matmul(MatmulParams {
            m,
            k,
            n,
            kind: MatmulKind::Float16 {
                narrow_output: false,
            },
        })?;
        let result = op
            .load_f16(a, b)
            .and_then(|_| self.submit(&op.submit_args(timeout_ms)))
            .and_then(|_| op.output_f32());
        self.release_matmul(op);
        result
    }

    /// Full int8 matmul round trip.
    pub fn matmul_i32(
        &self,
        m: u32,
        k: u32,
        n: u32,
        a: &[i8],
        b: &[i8],
        timeout_ms: u32,
    ) -> Result<alloc::vec::Vec<i32>, NpuError> {
        let mut op = self.matmul(MatmulParams {
            m,
            k,
            n,
            kind: MatmulKind::Int8,
        })?;
        let result = op
            .load_i8(a, b)
            .and_then(|_| self.submit(&op.submit_args(timeout_ms)))
            .and_then(|_| op.output_i32());
        self.release_matmul(op);
        result
    }
}
