//! Convolution feature/weight fetcher (CNA) registers.

pub const CNA_S_STATUS: u16 = 0x1000;
pub const CNA_S_POINTER: u16 = 0x1004;
pub const CNA_OPERATION_ENABLE: u16 = 0x1008;
/// Convolution mode, input and processing precision.
pub const CNA_CONV_CON1: u16 = 0x100c;
/// Feature grains and input sign handling.
pub const CNA_CONV_CON2: u16 = 0x1010;
/// Convolution strides.
pub const CNA_CONV_CON3: u16 = 0x1014;
/// Input cube width and height.
pub const CNA_DATA_SIZE0: u16 = 0x1020;
/// Input cube channels (twice, for the two fetch phases).
pub const CNA_DATA_SIZE1: u16 = 0x1024;
/// Output cube width and height as seen by the fetcher.
pub const CNA_DATA_SIZE2: u16 = 0x1028;
/// Output atomics (width * height).
pub const CNA_DATA_SIZE3: u16 = 0x102c;
/// Total weight bytes.
pub const CNA_WEIGHT_SIZE0: u16 = 0x1030;
/// Bytes per weight kernel.
pub const CNA_WEIGHT_SIZE1: u16 = 0x1034;
/// Kernel geometry and kernel count.
pub const CNA_WEIGHT_SIZE2: u16 = 0x1038;
/// Bank split between weights and feature data.
pub const CNA_CBUF_CON0: u16 = 0x103c;
/// Feature-data entry count.
pub const CNA_CBUF_CON1: u16 = 0x1040;
pub const CNA_CVT_CON0: u16 = 0x1044;
pub const CNA_CVT_CON1: u16 = 0x1048;
pub const CNA_CVT_CON2: u16 = 0x104c;
pub const CNA_CVT_CON3: u16 = 0x1050;
pub const CNA_CVT_CON4: u16 = 0x1054;
pub const CNA_FC_CON0: u16 = 0x1058;
pub const CNA_FC_CON1: u16 = 0x105c;
pub const CNA_PAD_CON0: u16 = 0x1060;
/// Device address of the input feature data.
pub const CNA_FEATURE_DATA_ADDR: u16 = 0x1064;
pub const CNA_FC_CON2: u16 = 0x1068;
/// Feature DMA cube width and height.
pub const CNA_DMA_CON0: u16 = 0x106c;
/// Feature DMA channels and burst length.
pub const CNA_DMA_CON1: u16 = 0x1070;
/// Feature DMA line and surface strides.
pub const CNA_DMA_CON2: u16 = 0x1074;
pub const CNA_FC_DATA_SIZE0: u16 = 0x1078;
pub const CNA_FC_DATA_SIZE1: u16 = 0x107c;
pub const CNA_DCOMP_CTRL: u16 = 0x1080;
pub const CNA_DCOMP_REGNUM: u16 = 0x1084;
/// Device address of the weight data (decompression source slot 0).
pub const CNA_DCOMP_ADDR0: u16 = 0x1088;
/// First of sixteen decompression amount registers, 4 bytes apart.
pub const CNA_DCOMP_AMOUNT0: u16 = 0x108c;
pub const CNA_CVT_CON5: u16 = 0x10cc;
pub const CNA_PAD_CON1: u16 = 0x10d0;

/// Offset of decompression amount register `i` (0..16).
pub const fn cna_dcomp_amount(i: u16) -> u16 {
    CNA_DCOMP_AMOUNT0 + i * 4
}
