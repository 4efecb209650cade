//! Per-variant hardware geometry.
//!
//! Every limit the descriptor builder checks against lives here, keyed by
//! the NPU variant, so nothing in the encode path hardcodes RK3588 numbers.

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NpuVariant {
    Rk3588,
}

#[derive(Debug, Clone)]
pub struct HwConfig {
    pub variant: NpuVariant,
    /// Size of one convolution-buffer bank in bytes.
    pub cbuf_bank_size: u32,
    /// Number of convolution-buffer banks.
    pub cbuf_banks: u32,
    /// Largest supported M (output rows) for a single matmul task.
    pub max_m: u32,
    /// Largest supported K (reduction depth).
    pub max_k: u32,
    /// Largest supported N (output columns).
    pub max_n: u32,
    /// Mask of cores selectable through the submit interface.
    pub core_mask: u32,
}

impl HwConfig {
    pub fn new(variant: NpuVariant) -> Self {
        match variant {
            NpuVariant::Rk3588 => Self::new_3588(),
        }
    }

    fn new_3588() -> Self {
        Self {
            variant: NpuVariant::Rk3588,
            cbuf_bank_size: 32768,
            cbuf_banks: 12,
            max_m: 384,
            max_k: 4096,
            max_n: 4096,
            core_mask: 0x7,
        }
    }

    /// Total convolution-buffer capacity in bytes.
    pub fn cbuf_size(&self) -> u32 {
        self.cbuf_bank_size * self.cbuf_banks
    }
}

impl Default for HwConfig {
    fn default() -> Self {
        Self::new(NpuVariant::Rk3588)
    }
}
