//! Post-processing unit (DPU) registers.
//!
//! The DPU drains the MAC accumulators (or its read-DMA, in flying mode)
//! through the BS/BN/EW sub-stages, converts to the output precision and
//! writes the destination cube.

pub const DPU_S_STATUS: u16 = 0x4000;
pub const DPU_S_POINTER: u16 = 0x4004;
pub const DPU_OPERATION_ENABLE: u16 = 0x4008;
/// Flying mode, conversion mode, burst lengths, output mode.
pub const DPU_FEATURE_MODE_CFG: u16 = 0x400c;
/// Input, processing and output precision.
pub const DPU_DATA_FORMAT: u16 = 0x4010;
pub const DPU_OFFSET_PEND: u16 = 0x4014;
/// Device address of the output cube.
pub const DPU_DST_BASE_ADDR: u16 = 0x4020;
/// Output surface stride, in 16-byte units.
pub const DPU_DST_SURF_STRIDE: u16 = 0x4024;
pub const DPU_DATA_CUBE_WIDTH: u16 = 0x4030;
pub const DPU_DATA_CUBE_HEIGHT: u16 = 0x4034;
pub const DPU_DATA_CUBE_NOTCH_ADDR: u16 = 0x4038;
pub const DPU_DATA_CUBE_CHANNEL: u16 = 0x403c;
/// Bias/scale stage configuration.
pub const DPU_BS_CFG: u16 = 0x4040;
pub const DPU_BS_ALU_CFG: u16 = 0x4044;
pub const DPU_BS_MUL_CFG: u16 = 0x4048;
pub const DPU_BS_RELUX_CMP_VALUE: u16 = 0x404c;
/// Output-word sizing and on-demand bypass.
pub const DPU_BS_OW_CFG: u16 = 0x4050;
pub const DPU_BS_OW_OP: u16 = 0x4054;
pub const DPU_WDMA_SIZE_0: u16 = 0x4058;
pub const DPU_WDMA_SIZE_1: u16 = 0x405c;
/// Batch-norm stage configuration.
pub const DPU_BN_CFG: u16 = 0x4060;
pub const DPU_BN_ALU_CFG: u16 = 0x4064;
pub const DPU_BN_MUL_CFG: u16 = 0x4068;
pub const DPU_BN_RELUX_CMP_VALUE: u16 = 0x406c;
/// Element-wise stage configuration (see the bit offsets below).
pub const DPU_EW_CFG: u16 = 0x4070;
pub const DPU_EW_CVT_OFFSET_VALUE: u16 = 0x4074;
pub const DPU_EW_CVT_SCALE_VALUE: u16 = 0x4078;
pub const DPU_EW_RELUX_CMP_VALUE: u16 = 0x407c;
pub const DPU_OUT_CVT_OFFSET: u16 = 0x4080;
/// Output conversion scale; bit 16 enables fp32-to-fp16 narrowing.
pub const DPU_OUT_CVT_SCALE: u16 = 0x4084;
pub const DPU_OUT_CVT_SHIFT: u16 = 0x4088;
/// First of eight element-wise operand registers, 4 bytes apart.
pub const DPU_EW_OP_VALUE_0: u16 = 0x408c;
/// Per-surface address increment, in 16-byte units.
pub const DPU_SURFACE_ADD: u16 = 0x40ac;
/// Reserved; observed streams write zero here between SURFACE_ADD and the
/// LUT block.
pub const DPU_40C4: u16 = 0x40c4;
pub const DPU_LUT_ACCESS_CFG: u16 = 0x40c8;
pub const DPU_LUT_ACCESS_DATA: u16 = 0x40cc;
pub const DPU_LUT_CFG: u16 = 0x40d0;
pub const DPU_LUT_INFO: u16 = 0x40d4;
pub const DPU_LUT_LE_START: u16 = 0x40d8;
pub const DPU_LUT_LE_END: u16 = 0x40dc;
pub const DPU_LUT_LO_START: u16 = 0x40e0;
pub const DPU_LUT_LO_END: u16 = 0x40e4;
pub const DPU_LUT_LE_SLOPE_SCALE: u16 = 0x40e8;
pub const DPU_LUT_LE_SLOPE_SHIFT: u16 = 0x40ec;
pub const DPU_LUT_LO_SLOPE_SCALE: u16 = 0x40f0;
pub const DPU_LUT_LO_SLOPE_SHIFT: u16 = 0x40f4;

/// Offset of element-wise operand register `i` (0..8).
pub const fn dpu_ew_op_value(i: u16) -> u16 {
    DPU_EW_OP_VALUE_0 + i * 4
}

/// S_POINTER: enable the ping-pong pointer.
pub const DPU_S_POINTER_POINTER_PP_EN: u32 = 1 << 0;
/// S_POINTER: enable the ping-pong executer.
pub const DPU_S_POINTER_EXECUTER_PP_EN: u32 = 1 << 1;
/// S_POINTER: ping-pong pointer mode.
pub const DPU_S_POINTER_POINTER_PP_MODE: u32 = 1 << 4;

/// EW_CFG bit offsets.
pub const EW_CFG_BYPASS: u32 = 0;
pub const EW_CFG_OP_BYPASS: u32 = 1;
pub const EW_CFG_OP_SRC: u32 = 6;
pub const EW_CFG_LUT_BYPASS: u32 = 7;
pub const EW_CFG_OP_CVT_BYPASS: u32 = 8;
pub const EW_CFG_RELU_BYPASS: u32 = 9;
pub const EW_CFG_ALU_ALGO: u32 = 16;
pub const EW_CFG_EDATA_SIZE: u32 = 22;
pub const EW_CFG_DATA_MODE: u32 = 28;
pub const EW_CFG_CVT_TYPE: u32 = 30;
