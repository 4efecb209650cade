//! MAC array (CORE) registers.

pub const CORE_S_STATUS: u16 = 0x3000;
pub const CORE_S_POINTER: u16 = 0x3004;
pub const CORE_OPERATION_ENABLE: u16 = 0x3008;
pub const CORE_MAC_GATING: u16 = 0x300c;
/// Processing precision and per-channel quantity-descriptor enable.
pub const CORE_MISC_CFG: u16 = 0x3010;
/// Output cube width and height, encoded minus one.
pub const CORE_DATAOUT_SIZE_0: u16 = 0x3014;
/// Output cube channels, encoded minus one.
pub const CORE_DATAOUT_SIZE_1: u16 = 0x3018;
pub const CORE_CLIP_TRUNCATE: u16 = 0x301c;
/// Undocumented; every observed stream writes zero here before the DPU block.
pub const CORE_3030: u16 = 0x3030;
