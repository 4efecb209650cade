//! Flat descriptor record for the DPU write-out path.

#[derive(Clone, Copy, Debug, Default)]
pub struct DpuDesc {
    pub burst_len: u8,
    pub conv_mode: u8,
    pub output_mode: u8,
    pub flying_mode: u8,
    pub out_precision: u8,
    pub in_precision: u8,
    pub proc_precision: u8,
    pub dst_base_addr: u32,
    pub dst_surf_stride: u32,
    /// Cube dimensions, encoded minus one.
    pub width: u16,
    pub height: u16,
    pub channel: u16,
    pub bs_bypass: u8,
    pub bs_alu_bypass: u8,
    pub bs_mul_bypass: u8,
    pub bs_relu_bypass: u8,
    pub bn_bypass: u8,
    pub bn_alu_bypass: u8,
    pub bn_mul_bypass: u8,
    pub bn_relu_bypass: u8,
    pub ew_bypass: u8,
    pub ew_op_bypass: u8,
    pub ew_lut_bypass: u8,
    pub ew_op_cvt_bypass: u8,
    pub ew_relu_bypass: u8,
    pub fp32tofp16_en: u8,
    pub out_cvt_scale: u16,
    pub size_e_2: u8,
    pub size_e_1: u8,
    pub size_e_0: u8,
    pub od_bypass: u8,
    pub width_wdma: u16,
    pub height_wdma: u16,
    pub channel_wdma: u16,
    pub surf_add: u32,
}
