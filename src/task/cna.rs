//! Flat descriptor records for the CNA fetcher and the MAC core.
//!
//! Field names follow the register fields they are packed into; the
//! builder fills one of these per operation and the emitter turns it into
//! instruction words.

#[derive(Clone, Copy, Debug, Default)]
pub struct CnaDesc {
    pub conv_mode: u8,
    pub in_precision: u8,
    pub proc_precision: u8,
    pub kernel_groups: u8,
    pub feature_grains: u16,
    pub conv_x_stride: u8,
    pub conv_y_stride: u8,
    pub datain_width: u16,
    pub datain_height: u16,
    pub datain_channel: u16,
    pub dataout_width: u16,
    pub dataout_height: u16,
    pub dataout_atomics: u32,
    pub weight_width: u8,
    pub weight_height: u8,
    pub weight_kernels: u16,
    pub weight_bytes_per_kernel: u32,
    pub weight_bytes: u32,
    pub weight_bank: u8,
    pub data_bank: u8,
    pub data_entries: u16,
    pub data_sign: u8,
    pub cvt_type: u8,
    pub cvt_bypass: u8,
    pub cvt_scale0: u16,
    pub cvt_scale1: u16,
    pub cvt_scale2: u16,
    pub cvt_scale3: u16,
    pub fc_skip_en: u8,
    pub data_offset: u32,
    pub pad_left: u8,
    pub pad_top: u8,
    pub feature_base_addr: u32,
    pub weight_offset: u32,
    pub weight_burst_len: u8,
    pub data_burst_len: u8,
    pub line_stride: u32,
    pub surf_stride: i32,
    pub dma_width: u16,
    pub dma_height: u16,
    pub dma_channel: u16,
    pub decompress_addr0: u32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CoreDesc {
    pub proc_precision: u8,
    pub qd_en: u8,
    /// Output height, encoded minus one.
    pub dataout_height: u16,
    /// Output width, encoded minus one.
    pub dataout_width: u16,
    /// Output channels, encoded minus one.
    pub dataout_channel: u16,
}
