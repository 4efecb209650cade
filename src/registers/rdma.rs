//! Post-processing read-DMA (DPU_RDMA) registers.
//!
//! In flying mode the DPU takes its main operand from this unit instead of
//! the MAC accumulators; the element-wise stage operand always streams
//! through the ERDMA port.

pub const RDMA_S_STATUS: u16 = 0x5000;
pub const RDMA_S_POINTER: u16 = 0x5004;
pub const RDMA_OPERATION_ENABLE: u16 = 0x5008;
pub const RDMA_DATA_CUBE_WIDTH: u16 = 0x500c;
pub const RDMA_DATA_CUBE_HEIGHT: u16 = 0x5010;
pub const RDMA_DATA_CUBE_CHANNEL: u16 = 0x5014;
/// Device address of the main (feature) operand.
pub const RDMA_SRC_BASE_ADDR: u16 = 0x5018;
pub const RDMA_BRDMA_CFG: u16 = 0x501c;
pub const RDMA_BS_BASE_ADDR: u16 = 0x5020;
pub const RDMA_NRDMA_CFG: u16 = 0x5024;
pub const RDMA_BN_BASE_ADDR: u16 = 0x5028;
/// Element-wise operand DMA: transfer mode and data size.
pub const RDMA_ERDMA_CFG: u16 = 0x502c;
/// Device address of the element-wise operand.
pub const RDMA_EW_BASE_ADDR: u16 = 0x5030;
/// Element-wise operand surface stride, in 16-byte units.
pub const RDMA_EW_SURF_STRIDE: u16 = 0x5034;
/// Flying mode, precisions, burst length, fp16-to-fp32 widening.
pub const RDMA_FEATURE_MODE_CFG: u16 = 0x5044;
pub const RDMA_SRC_DMA_CFG: u16 = 0x5048;
pub const RDMA_SURF_NOTCH: u16 = 0x504c;
pub const RDMA_PAD_CFG: u16 = 0x5050;
/// Per-sub-DMA enable and precision mirror.
pub const RDMA_WEIGHT: u16 = 0x5054;
pub const RDMA_EW_SURF_NOTCH: u16 = 0x5058;

/// ERDMA_CFG bit offsets.
pub const ERDMA_CFG_DATA_MODE: u32 = 0;
pub const ERDMA_CFG_DATA_SIZE: u32 = 1;

/// RDMA_WEIGHT per-sub-DMA enable bits.
pub const RDMA_WEIGHT_M: u32 = 1 << 0;
pub const RDMA_WEIGHT_B: u32 = 1 << 1;
pub const RDMA_WEIGHT_N: u32 = 1 << 2;
pub const RDMA_WEIGHT_E: u32 = 1 << 3;

/// FEATURE_MODE_CFG bit offsets.
pub const FEATURE_MODE_FLYING_MODE: u32 = 0;
pub const FEATURE_MODE_CONV_MODE: u32 = 1;
pub const FEATURE_MODE_IN_PRECISION: u32 = 2;
pub const FEATURE_MODE_PROC_PRECISION: u32 = 5;
pub const FEATURE_MODE_COMB_USE: u32 = 8;
pub const FEATURE_MODE_BURST_LEN: u32 = 11;
pub const FEATURE_MODE_MRDMA_DISABLE: u32 = 15;
pub const FEATURE_MODE_FP16TOFP32_EN: u32 = 16;
