//! Program-sequencer (PC) registers and enable/interrupt bits.

/// Hardware version register.
pub const PC_VERSION: u16 = 0x0000;
/// Hardware version number register.
pub const PC_VERSION_NUM: u16 = 0x0004;
/// Operation-enable register; the final word of every command stream
/// writes the unit-enable mask here.
pub const PC_OPERATION_ENABLE: u16 = 0x0008;
/// Base address of the command stream in device memory.
pub const PC_BASE_ADDRESS: u16 = 0x0010;
/// Number of register-config words the sequencer should fetch.
pub const PC_REGISTER_AMOUNTS: u16 = 0x0014;
/// Interrupt mask register.
pub const PC_INTERRUPT_MASK: u16 = 0x0020;
/// Interrupt clear register.
pub const PC_INTERRUPT_CLEAR: u16 = 0x0024;
/// Interrupt status register.
pub const PC_INTERRUPT_STATUS: u16 = 0x0028;
/// Raw interrupt status register.
pub const PC_INTERRUPT_RAW_STATUS: u16 = 0x002c;
/// Task control register.
pub const PC_TASK_CON: u16 = 0x0030;
/// Base address of the task descriptor list.
pub const PC_TASK_DMA_BASE_ADDR: u16 = 0x0034;
/// Task status register.
pub const PC_TASK_STATUS: u16 = 0x003c;

/// Enables the sequencer itself.
pub const PC_ENABLE: u32 = 1 << 0;
/// Enables the MAC core.
pub const PC_ENABLE_CORE: u32 = 1 << 1;
/// Enables the convolution feature/weight fetcher.
pub const PC_ENABLE_CNA: u32 = 1 << 2;
/// Enables the post-processing unit.
pub const PC_ENABLE_DPU: u32 = 1 << 3;
/// Enables the post-processing read-DMA.
pub const PC_ENABLE_DPU_RDMA: u32 = 1 << 4;

/// Value written to acknowledge all interrupt sources.
pub const INT_CLEAR_ALL: u32 = 0x1_ffff;
/// Interrupt bits raised on DPU write-out completion.
pub const INT_MASK_DPU_DONE: u32 = 0x300;

/// Words the sequencer fetches beyond the amount declared in
/// [`PC_REGISTER_AMOUNTS`]. Streams end with this many trailing words
/// (two amount markers, a padding word, and the enable write).
pub const PC_DATA_EXTRA_AMOUNT: u32 = 4;
