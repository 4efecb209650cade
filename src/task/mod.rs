//! Task descriptors, submission records and the operations built on them.

use crate::registers::pc;
use crate::stream::CmdStream;

pub mod alu;
pub mod cna;
pub mod dpu;
pub mod matmul;

pub use alu::{AluAlgorithm, AluDtype, AluOp};
pub use cna::{CnaDesc, CoreDesc};
pub use dpu::DpuDesc;
pub use matmul::{MatmulKind, MatmulOp, MatmulParams};

/// Number of subcore ranges carried by a submission.
pub const MAX_SUBCORE_TASKS: usize = 5;

/// Let the driver pick a core.
pub const CORE_AUTO_MASK: u32 = 0x0;
pub const CORE0_MASK: u32 = 0x1;
pub const CORE1_MASK: u32 = 0x2;
pub const CORE2_MASK: u32 = 0x4;

/// Default submission deadline in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u32 = 6000;

bitflags::bitflags! {
    /// Submission mode flags, matching the driver's job flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct JobFlags: u32 {
        /// Feed tasks through the PC sequencer.
        const PC = 1 << 0;
        /// Block the caller until the job completes.
        const BLOCK = 1 << 1;
        /// Use the ping-pong register groups.
        const PINGPONG = 1 << 2;
        const FENCE_IN = 1 << 3;
        const FENCE_OUT = 1 << 4;
    }
}

/// Precision codes shared by the CNA, CORE and DPU register files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Precision {
    Int8 = 0x0,
    Int16 = 0x1,
    Float16 = 0x2,
    Int32 = 0x4,
    Float32 = 0x5,
}

/// One entry of the task list the sequencer walks.
///
/// Layout is the driver's task ABI; do not reorder or pad.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NpuTask {
    pub flags: u32,
    pub op_idx: u32,
    pub enable_mask: u32,
    pub int_mask: u32,
    pub int_clear: u32,
    pub int_status: u32,
    pub regcfg_amount: u32,
    pub regcfg_offset: u32,
    pub regcmd_addr: u64,
}

impl NpuTask {
    /// Builds the task entry describing a sealed command stream at
    /// `regcmd_addr`.
    pub fn for_stream(
        op_idx: u32,
        enable_mask: u32,
        int_mask: u32,
        stream: &CmdStream,
        regcmd_addr: u64,
    ) -> Self {
        Self {
            flags: 0,
            op_idx,
            enable_mask,
            int_mask,
            int_clear: pc::INT_CLEAR_ALL,
            int_status: 0,
            regcfg_amount: stream.regcfg_amount(),
            regcfg_offset: 0,
            regcmd_addr,
        }
    }
}

/// Subcore task range; slot 0 carries the live range on single-core jobs.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SubcoreTask {
    pub task_start: u32,
    pub task_number: u32,
}

/// The submission record handed to the platform, matching the driver's
/// submit ABI.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct SubmitArgs {
    pub flags: JobFlags,
    pub timeout_ms: u32,
    pub task_start: u32,
    pub task_number: u32,
    pub task_counter: u32,
    pub priority: i32,
    /// Kernel object address of the task buffer.
    pub task_obj_addr: u64,
    pub regcfg_obj_addr: u64,
    pub task_base_addr: u64,
    pub user_data: u64,
    pub core_mask: u32,
    pub fence_fd: i32,
    pub subcore_task: [SubcoreTask; MAX_SUBCORE_TASKS],
}

impl SubmitArgs {
    /// Blocking single-task submission on core 0.
    pub fn single_task(task_obj_addr: u64, timeout_ms: u32) -> Self {
        let mut subcore_task = [SubcoreTask::default(); MAX_SUBCORE_TASKS];
        subcore_task[0] = SubcoreTask {
            task_start: 0,
            task_number: 1,
        };
        // Idle cores still report their start index.
        subcore_task[1].task_start = 1;
        subcore_task[2].task_start = 2;
        Self {
            flags: JobFlags::PC | JobFlags::BLOCK | JobFlags::PINGPONG,
            timeout_ms,
            task_start: 0,
            task_number: 1,
            task_counter: 0,
            priority: 0,
            task_obj_addr,
            regcfg_obj_addr: 0,
            task_base_addr: 0,
            user_data: 0,
            core_mask: CORE0_MASK,
            fence_fd: -1,
            subcore_task,
        }
    }
}
