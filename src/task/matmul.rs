//! Matrix-multiplication operation: descriptor building, command-stream
//! emission, operand tiling and output readback.
//!
//! A matmul runs the full CNA -> CORE -> DPU pipeline: the CNA fetches the
//! M x K feature matrix and the N weight kernels (each one K-deep column of
//! the second operand) into the convolution buffer, the core accumulates,
//! and the DPU converts and writes the M x N result cube.

use alloc::vec::Vec;
use half::f16;

use crate::config::HwConfig;
use crate::err::NpuError;
use crate::platform::{DeviceVec, MemFlags, Platform};
use crate::registers::{cna::*, core::*, dpu::*, pc};
use crate::stream::CmdStream;
use crate::task::{CnaDesc, CoreDesc, DpuDesc, NpuTask, Precision, SubmitArgs};
use crate::tiling::{feature_offset, weight_offset};

const DIRECT_CONVOLUTION: u8 = 0x0;

/// Words in a sealed matmul command stream.
pub const MATMUL_CMD_WORDS: usize = 108;

/// Allocation granule for the command and task buffers.
const CMD_BUF_WORDS: usize = 128;

/// Operand precision variant of a matmul.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatmulKind {
    /// int8 operands accumulated to int32.
    Int8,
    /// float16 operands accumulated to float32; `narrow_output` converts
    /// the result back to float16 on write-out.
    Float16 { narrow_output: bool },
}

impl MatmulKind {
    /// Bytes per input element.
    pub fn element_size(self) -> u32 {
        match self {
            MatmulKind::Int8 => 1,
            MatmulKind::Float16 { .. } => 2,
        }
    }

    /// Bytes per output element.
    pub fn output_size(self) -> u32 {
        match self {
            MatmulKind::Int8 => 4,
            MatmulKind::Float16 { narrow_output } => {
                if narrow_output {
                    2
                } else {
                    4
                }
            }
        }
    }

    fn in_precision(self) -> Precision {
        match self {
            MatmulKind::Int8 => Precision::Int8,
            MatmulKind::Float16 { .. } => Precision::Float16,
        }
    }

    fn out_precision(self) -> Precision {
        match self {
            MatmulKind::Int8 => Precision::Int32,
            MatmulKind::Float16 { narrow_output } => {
                if narrow_output {
                    Precision::Float16
                } else {
                    Precision::Float32
                }
            }
        }
    }

    /// Atoms per convolution-buffer entry.
    fn entry_atoms(self) -> u32 {
        match self {
            MatmulKind::Int8 => 64,
            MatmulKind::Float16 { .. } => 32,
        }
    }

    /// Kernels per weight tile group.
    pub fn kernel_group(self) -> u32 {
        match self {
            MatmulKind::Int8 => 32,
            MatmulKind::Float16 { .. } => 16,
        }
    }

    /// Channels per input feature plane.
    pub fn input_plane(self) -> u32 {
        match self {
            MatmulKind::Int8 => 16,
            MatmulKind::Float16 { .. } => 8,
        }
    }

    /// Channels per output plane, as written by the DPU.
    pub fn output_plane(self) -> u32 {
        match self.out_precision() {
            Precision::Float16 => 8,
            _ => 4,
        }
    }

    fn qd_en(self) -> u8 {
        match self {
            MatmulKind::Int8 => 0,
            MatmulKind::Float16 { .. } => 1,
        }
    }

    fn size_e(self) -> u8 {
        match self {
            MatmulKind::Int8 => 7,
            MatmulKind::Float16 { narrow_output } => {
                if narrow_output {
                    1
                } else {
                    3
                }
            }
        }
    }

    /// Surface-add multiplier applied to the destination surface stride.
    fn surf_add_mul(self) -> u32 {
        match self {
            MatmulKind::Int8 => 8,
            MatmulKind::Float16 { narrow_output } => {
                if narrow_output {
                    2
                } else {
                    4
                }
            }
        }
    }
}

/// Shape and precision of one matmul.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatmulParams {
    pub m: u32,
    pub k: u32,
    pub n: u32,
    pub kind: MatmulKind,
}

/// Device addresses of the three operand buffers, as programmed into the
/// 32-bit address registers.
#[derive(Clone, Copy, Debug)]
pub struct MatmulBuffers {
    pub input_addr: u32,
    pub weights_addr: u32,
    pub output_addr: u32,
}

/// Checks a shape against the hardware limits.
pub fn validate(params: &MatmulParams, cfg: &HwConfig) -> Result<(), NpuError> {
    let MatmulParams { m, k, n, .. } = *params;
    let reason = if m == 0 || m > cfg.max_m {
        Some("M out of range")
    } else if m != 1 && m % 4 != 0 {
        Some("M must be 1 or a multiple of 4")
    } else if k == 0 || k > cfg.max_k {
        Some("K out of range")
    } else if k % 32 != 0 {
        Some("K must be a multiple of 32")
    } else if n == 0 || n > cfg.max_n {
        Some("N out of range")
    } else if n % 16 != 0 {
        Some("N must be a multiple of 16")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(NpuError::Shape { m, k, n, reason }),
        None => Ok(()),
    }
}

/// Fills the per-unit descriptors for a matmul, including the
/// convolution-buffer bank split.
pub fn build_descriptors(
    params: &MatmulParams,
    cfg: &HwConfig,
    bufs: &MatmulBuffers,
) -> Result<(CnaDesc, CoreDesc, DpuDesc), NpuError> {
    validate(params, cfg)?;

    let MatmulParams { m, k, n, kind } = *params;
    let esz = kind.element_size();

    let mut cna = CnaDesc::default();
    let mut core = CoreDesc::default();
    let mut dpu = DpuDesc::default();

    cna.conv_mode = DIRECT_CONVOLUTION;
    cna.in_precision = kind.in_precision() as u8;
    cna.proc_precision = kind.in_precision() as u8;

    cna.kernel_groups = 0;
    cna.feature_grains = (m + 1) as u16;
    cna.conv_x_stride = 1;
    cna.conv_y_stride = 1;

    cna.datain_width = 1;
    cna.datain_height = m as u16;
    cna.datain_channel = k as u16;
    cna.dataout_width = 1;
    cna.dataout_height = m as u16;
    cna.dataout_atomics = cna.dataout_width as u32 * cna.dataout_height as u32;

    cna.weight_width = 1;
    cna.weight_height = 1;
    cna.weight_kernels = n as u16;
    cna.weight_bytes_per_kernel =
        cna.weight_width as u32 * cna.weight_height as u32 * k * esz;
    cna.weight_bytes = cna.weight_bytes_per_kernel * n;

    // Bank accounting: feature data first, weights take every bank left
    // over, and a single kernel must fit in one bank.
    let fd_bytes = cna.datain_width as u32 * m * k * esz;
    let fd_banks = fd_bytes.div_ceil(cfg.cbuf_bank_size);
    if fd_banks > cfg.cbuf_banks - 1 {
        return Err(NpuError::Capacity {
            what: "input feature data banks",
            need: fd_banks,
            avail: cfg.cbuf_banks - 1,
        });
    }
    if cna.weight_bytes_per_kernel > cfg.cbuf_bank_size {
        return Err(NpuError::Capacity {
            what: "weight kernel bytes",
            need: cna.weight_bytes_per_kernel,
            avail: cfg.cbuf_bank_size,
        });
    }
    let weight_banks = cfg.cbuf_banks - fd_banks;

    cna.weight_bank = weight_banks as u8;
    cna.data_bank = fd_banks as u8;
    cna.data_entries =
        (cna.datain_width as u32 * k).div_ceil(kind.entry_atoms()) as u16;
    cna.data_sign = 0x1;
    cna.cvt_type = 0x1;
    cna.cvt_bypass = 0x1;
    cna.cvt_scale0 = 0x1;
    cna.cvt_scale1 = 0x1;
    cna.cvt_scale2 = 0x1;
    cna.cvt_scale3 = 0x1;
    cna.fc_skip_en = 0;
    cna.data_offset = 0x0;
    cna.pad_left = 0;
    cna.pad_top = 0;
    cna.feature_base_addr = bufs.input_addr;
    cna.weight_offset = 0;
    cna.weight_burst_len = 0xf;
    cna.data_burst_len = 0xf;
    cna.line_stride = cna.datain_width as u32 * 4;
    let mut surf_stride = cna.line_stride as i32 * ((m as i32 / 4) - 1);
    if surf_stride < 0 {
        surf_stride += 1;
    }
    cna.surf_stride = surf_stride;
    cna.dma_width = cna.datain_width;
    cna.dma_height = cna.datain_height;
    cna.dma_channel = cna.datain_channel;
    cna.decompress_addr0 = bufs.weights_addr;

    core.proc_precision = kind.in_precision() as u8;
    core.qd_en = kind.qd_en();
    core.dataout_height = cna.dataout_height - 1;
    core.dataout_width = cna.dataout_width - 1;
    core.dataout_channel = cna.weight_kernels - 1;

    dpu.burst_len = 0xf;
    dpu.conv_mode = DIRECT_CONVOLUTION;
    dpu.output_mode = 0x2;
    dpu.flying_mode = 0x0;
    dpu.out_precision = kind.out_precision() as u8;
    dpu.in_precision = kind.in_precision() as u8;
    dpu.proc_precision = kind.in_precision() as u8;
    dpu.dst_base_addr = bufs.output_addr;
    dpu.dst_surf_stride = cna.dataout_height as u32 * cna.dataout_width as u32;
    dpu.width = core.dataout_width;
    dpu.height = core.dataout_height;
    dpu.channel = core.dataout_channel;
    dpu.bs_bypass = 1;
    dpu.bs_alu_bypass = 1;
    dpu.bs_mul_bypass = 1;
    dpu.bs_relu_bypass = 1;
    dpu.bn_bypass = 1;
    dpu.bn_alu_bypass = 1;
    dpu.bn_mul_bypass = 1;
    dpu.bn_relu_bypass = 1;
    dpu.ew_bypass = 1;
    dpu.ew_op_bypass = 1;
    dpu.ew_lut_bypass = 1;
    dpu.ew_op_cvt_bypass = 1;
    dpu.ew_relu_bypass = 1;
    dpu.fp32tofp16_en = matches!(
        kind,
        MatmulKind::Float16 {
            narrow_output: true
        }
    ) as u8;
    dpu.out_cvt_scale = 1;
    dpu.size_e_2 = kind.size_e();
    dpu.size_e_1 = kind.size_e();
    dpu.size_e_0 = kind.size_e();
    dpu.od_bypass = 1;
    dpu.width_wdma = core.dataout_width;
    dpu.height_wdma = core.dataout_height;
    dpu.channel_wdma = core.dataout_channel;
    dpu.surf_add = dpu.dst_surf_stride * kind.surf_add_mul();

    Ok((cna, core, dpu))
}

/// Emits the matmul register sequence into `stream` and seals it.
///
/// The order is load-bearing: the sequencer replays it as-is, and the
/// hardware expects the CNA block, the CORE block, the DPU block and the
/// trailing amount markers in exactly this arrangement.
pub fn emit_matmul(stream: &mut CmdStream, cna: &CnaDesc, core: &CoreDesc, dpu: &DpuDesc) {
    stream.emit(
        DPU_S_POINTER,
        DPU_S_POINTER_POINTER_PP_MODE | DPU_S_POINTER_EXECUTER_PP_EN | DPU_S_POINTER_POINTER_PP_EN,
    );

    let mut value = ((cna.proc_precision as u32 & 0x7) << 7)
        | ((cna.in_precision as u32 & 0x7) << 4)
        | (cna.conv_mode as u32 & 0xf);
    stream.emit(CNA_CONV_CON1, value);
    value = ((cna.kernel_groups as u32 & 0xff) << 16) | ((cna.feature_grains as u32 & 0x3ff) << 4);
    stream.emit(CNA_CONV_CON2, value);
    value = ((cna.conv_y_stride as u32 & 0x7) << 3) | (cna.conv_x_stride as u32 & 0x7);
    stream.emit(CNA_CONV_CON3, value);
    value = ((cna.datain_width as u32 & 0x7ff) << 16) | (cna.datain_height as u32 & 0x7ff);
    stream.emit(CNA_DATA_SIZE0, value);
    value = (((cna.datain_channel - 1) as u32 & 0xffff) << 16) | (cna.datain_channel as u32 & 0xffff);
    stream.emit(CNA_DATA_SIZE1, value);
    stream.emit(CNA_DATA_SIZE2, cna.dataout_width as u32 & 0x7ff);
    stream.emit(CNA_DATA_SIZE3, cna.dataout_atomics & 0x3ffff);
    stream.emit(CNA_WEIGHT_SIZE0, cna.weight_bytes);
    stream.emit(CNA_WEIGHT_SIZE1, cna.weight_bytes_per_kernel & 0x7ffff);
    value = ((cna.weight_width as u32 & 0x1f) << 24)
        | ((cna.weight_height as u32 & 0x1f) << 16)
        | (cna.weight_kernels as u32 & 0x3fff);
    stream.emit(CNA_WEIGHT_SIZE2, value);
    value = ((cna.weight_bank as u32 & 0xf) << 4) | (cna.data_bank as u32 & 0xf);
    stream.emit(CNA_CBUF_CON0, value);
    stream.emit(CNA_CBUF_CON1, cna.data_entries as u32 & 0x1fff);
    value = ((cna.data_sign as u32 & 0x1) << 3)
        | ((cna.cvt_type as u32 & 0x1) << 1)
        | (cna.cvt_bypass as u32 & 0x1);
    stream.emit(CNA_CVT_CON0, value);
    stream.emit(CNA_CVT_CON1, (cna.cvt_scale0 as u32 & 0xffff) << 16);
    stream.emit(CNA_CVT_CON2, (cna.cvt_scale1 as u32 & 0xffff) << 16);
    stream.emit(CNA_CVT_CON3, (cna.cvt_scale2 as u32 & 0xffff) << 16);
    stream.emit(CNA_CVT_CON4, (cna.cvt_scale3 as u32 & 0xffff) << 16);
    stream.emit(CNA_FC_CON0, cna.fc_skip_en as u32 & 0x1);
    stream.emit(CNA_FC_CON1, cna.data_offset & 0x1ffff);
    value = ((cna.pad_left as u32 & 0xf) << 4) | (cna.pad_top as u32 & 0xf);
    stream.emit(CNA_PAD_CON0, value);
    stream.emit(CNA_FEATURE_DATA_ADDR, cna.feature_base_addr);
    stream.emit(CNA_FC_CON2, cna.weight_offset & 0x1ffff);
    value = ((cna.weight_burst_len as u32 & 0xf) << 16) | (cna.data_burst_len as u32 & 0xf);
    stream.emit(CNA_DMA_CON0, value);
    stream.emit(CNA_DMA_CON1, cna.line_stride & 0xfff_ffff);
    stream.emit(CNA_DMA_CON2, cna.surf_stride as u32 & 0xfff_ffff);
    value = ((cna.dma_width as u32 & 0x7ff) << 16) | (cna.dma_height as u32 & 0x7ff);
    stream.emit(CNA_FC_DATA_SIZE0, value);
    stream.emit(CNA_FC_DATA_SIZE1, cna.dma_channel as u32 & 0xffff);
    stream.emit(CNA_DCOMP_CTRL, 0x0);
    stream.emit(CNA_DCOMP_REGNUM, 0x0);
    stream.emit(CNA_DCOMP_ADDR0, cna.decompress_addr0);
    for i in 0..16 {
        stream.emit(cna_dcomp_amount(i), 0x0);
    }
    stream.emit(CNA_CVT_CON5, 0x0);
    stream.emit(CNA_PAD_CON1, 0x0);

    value = ((core.proc_precision as u32 & 0x7) << 8) | (core.qd_en as u32 & 0x1);
    stream.emit(CORE_MISC_CFG, value);
    value = ((core.dataout_height as u32 & 0xffff) << 16) | (core.dataout_width as u32 & 0xffff);
    stream.emit(CORE_DATAOUT_SIZE_0, value);
    stream.emit(CORE_DATAOUT_SIZE_1, core.dataout_channel as u32 & 0xffff);
    stream.emit(CORE_CLIP_TRUNCATE, 0x0);
    stream.emit(CORE_3030, 0x0);

    value = ((dpu.burst_len as u32 & 0xf) << 5)
        | ((dpu.conv_mode as u32 & 0x3) << 3)
        | ((dpu.output_mode as u32 & 0x3) << 1)
        | (dpu.flying_mode as u32 & 0x1);
    stream.emit(DPU_FEATURE_MODE_CFG, value);
    value = ((dpu.out_precision as u32 & 0x7) << 29)
        | ((dpu.in_precision as u32 & 0x7) << 26)
        | (dpu.proc_precision as u32 & 0x7);
    stream.emit(DPU_DATA_FORMAT, value);
    stream.emit(DPU_OFFSET_PEND, 0x0);
    stream.emit(DPU_DST_BASE_ADDR, dpu.dst_base_addr);
    stream.emit(DPU_DST_SURF_STRIDE, (dpu.dst_surf_stride & 0xfff_ffff) << 4);
    stream.emit(DPU_DATA_CUBE_WIDTH, dpu.width as u32 & 0x1fff);
    stream.emit(DPU_DATA_CUBE_HEIGHT, dpu.height as u32 & 0x1fff);
    stream.emit(DPU_DATA_CUBE_NOTCH_ADDR, 0x0);
    value = ((dpu.channel as u32 & 0x1fff) << 16) | (dpu.channel as u32 & 0x1fff);
    stream.emit(DPU_DATA_CUBE_CHANNEL, value);
    value = ((dpu.bs_relu_bypass as u32 & 0x1) << 6)
        | ((dpu.bs_mul_bypass as u32 & 0x1) << 4)
        | ((dpu.bs_alu_bypass as u32 & 0x1) << 1)
        | (dpu.bs_bypass as u32 & 0x1);
    stream.emit(DPU_BS_CFG, value);
    stream.emit(DPU_BS_ALU_CFG, 0x0);
    stream.emit(DPU_BS_MUL_CFG, 0x0);
    stream.emit(DPU_BS_RELUX_CMP_VALUE, 0x0);
    value = ((dpu.size_e_2 as u32 & 0x7) << 8)
        | ((dpu.size_e_1 as u32 & 0x7) << 5)
        | ((dpu.size_e_0 as u32 & 0x7) << 2)
        | ((dpu.od_bypass as u32 & 0x1) << 1);
    stream.emit(DPU_BS_OW_CFG, value);
    stream.emit(DPU_BS_OW_OP, 0x0);
    stream.emit(DPU_WDMA_SIZE_0, dpu.channel_wdma as u32 & 0x1fff);
    value = ((dpu.height_wdma as u32 & 0x1fff) << 16) | (dpu.width_wdma as u32 & 0x1fff);
    stream.emit(DPU_WDMA_SIZE_1, value);
    value = ((dpu.bn_relu_bypass as u32 & 0x1) << 6)
        | ((dpu.bn_mul_bypass as u32 & 0x1) << 4)
        | ((dpu.bn_alu_bypass as u32 & 0x1) << 1)
        | (dpu.bn_bypass as u32 & 0x1);
    stream.emit(DPU_BN_CFG, value);
    stream.emit(DPU_BN_ALU_CFG, 0x0);
    stream.emit(DPU_BN_MUL_CFG, 0x0);
    stream.emit(DPU_BN_RELUX_CMP_VALUE, 0x0);
    value = ((dpu.ew_relu_bypass as u32 & 0x1) << EW_CFG_RELU_BYPASS)
        | ((dpu.ew_op_cvt_bypass as u32 & 0x1) << EW_CFG_OP_CVT_BYPASS)
        | ((dpu.ew_lut_bypass as u32 & 0x1) << EW_CFG_LUT_BYPASS)
        | ((dpu.ew_op_bypass as u32 & 0x1) << EW_CFG_OP_BYPASS)
        | (dpu.ew_bypass as u32 & 0x1);
    stream.emit(DPU_EW_CFG, value);
    stream.emit(DPU_EW_CVT_OFFSET_VALUE, 0x0);
    stream.emit(DPU_EW_CVT_SCALE_VALUE, 0x1);
    stream.emit(DPU_EW_RELUX_CMP_VALUE, 0x0);
    stream.emit(DPU_OUT_CVT_OFFSET, 0x0);
    value = ((dpu.fp32tofp16_en as u32 & 0x1) << 16) | (dpu.out_cvt_scale as u32 & 0xffff);
    stream.emit(DPU_OUT_CVT_SCALE, value);
    stream.emit(DPU_OUT_CVT_SHIFT, 0x0);
    for i in 0..8 {
        stream.emit(dpu_ew_op_value(i), 0x0);
    }
    stream.emit(DPU_SURFACE_ADD, (dpu.surf_add & 0xfff_ffff) << 4);
    stream.emit(DPU_40C4, 0x0);
    stream.emit(DPU_LUT_ACCESS_CFG, 0x0);
    stream.emit(DPU_LUT_ACCESS_DATA, 0x0);
    stream.emit(DPU_LUT_CFG, 0x0);
    stream.emit(DPU_LUT_INFO, 0x0);
    stream.emit(DPU_LUT_LE_START, 0x0);
    stream.emit(DPU_LUT_LE_END, 0x0);
    stream.emit(DPU_LUT_LO_START, 0x0);
    stream.emit(DPU_LUT_LO_END, 0x0);
    stream.emit(DPU_LUT_LE_SLOPE_SCALE, 0x0);
    stream.emit(DPU_LUT_LE_SLOPE_SHIFT, 0x0);
    stream.emit(DPU_LUT_LO_SLOPE_SCALE, 0x0);
    stream.emit(DPU_LUT_LO_SLOPE_SHIFT, 0x0);

    stream.begin_tail();
    stream.emit(0x0, 0x0);
    stream.emit(pc::PC_REGISTER_AMOUNTS, 0x0);
    stream.emit(0x0, 0x0);
    stream.enable(pc::PC_ENABLE_DPU | pc::PC_ENABLE_CNA | pc::PC_ENABLE);

    assert_eq!(stream.len(), MATMUL_CMD_WORDS);
}

/// A fully prepared matmul: device buffers, tiled operands, command
/// stream and task entry.
#[derive(Debug)]
pub struct MatmulOp {
    params: MatmulParams,
    regcmd: DeviceVec<u64>,
    tasks: DeviceVec<NpuTask>,
    input: DeviceVec<u8>,
    weights: DeviceVec<u8>,
    output: DeviceVec<u8>,
}

impl MatmulOp {
    /// Validates the shape, allocates the device buffers and encodes the
    /// command stream. Frees everything already allocated if a later step
    /// fails.
    pub fn create<P: Platform>(
        platform: &mut P,
        cfg: &HwConfig,
        params: MatmulParams,
    ) -> Result<Self, NpuError> {
        validate(&params, cfg)?;

        let MatmulParams { m, k, n, kind } = params;
        let esz = kind.element_size() as usize;
        let osz = kind.output_size() as usize;

        debug!("generating matmul task: M={m} K={k} N={n} kind={kind:?}");

        let flags = MemFlags::NON_CACHEABLE;
        let regcmd = DeviceVec::<u64>::zeroed(platform, CMD_BUF_WORDS, flags)?;
        let tasks = match DeviceVec::<NpuTask>::zeroed(platform, 1, flags | MemFlags::KERNEL_MAPPING)
        {
            Ok(v) => v,
            Err(e) => {
                regcmd.free(platform);
                return Err(e);
            }
        };
        let input = match DeviceVec::<u8>::zeroed(platform, m as usize * k as usize * esz, flags) {
            Ok(v) => v,
            Err(e) => {
                tasks.free(platform);
                regcmd.free(platform);
                return Err(e);
            }
        };
        let weights = match DeviceVec::<u8>::zeroed(platform, k as usize * n as usize * esz, flags)
        {
            Ok(v) => v,
            Err(e) => {
                input.free(platform);
                tasks.free(platform);
                regcmd.free(platform);
                return Err(e);
            }
        };
        let output = match DeviceVec::<u8>::zeroed(platform, m as usize * n as usize * osz, flags) {
            Ok(v) => v,
            Err(e) => {
                weights.free(platform);
                input.free(platform);
                tasks.free(platform);
                regcmd.free(platform);
                return Err(e);
            }
        };

        let mut op = Self {
            params,
            regcmd,
            tasks,
            input,
            weights,
            output,
        };
        if let Err(e) = op.encode(cfg) {
            op.release(platform);
            return Err(e);
        }
        Ok(op)
    }

    fn encode(&mut self, cfg: &HwConfig) -> Result<(), NpuError> {
        let bufs = MatmulBuffers {
            input_addr: addr32(self.input.dma_addr())?,
            weights_addr: addr32(self.weights.dma_addr())?,
            output_addr: addr32(self.output.dma_addr())?,
        };
        debug!("input feature address: {:#x}", bufs.input_addr);
        debug!("weight address: {:#x}", bufs.weights_addr);
        debug!("output address: {:#x}", bufs.output_addr);

        let (cna, core, dpu) = build_descriptors(&self.params, cfg, &bufs)?;

        let mut stream = CmdStream::with_capacity(MATMUL_CMD_WORDS);
        emit_matmul(&mut stream, &cna, &core, &dpu);
        self.regcmd.copy_from_slice(stream.words());

        let task = NpuTask::for_stream(
            0,
            pc::PC_ENABLE_DPU | pc::PC_ENABLE_CNA | pc::PC_ENABLE,
            pc::INT_MASK_DPU_DONE,
            &stream,
            self.regcmd.dma_addr(),
        );
        self.tasks.set(0, task);
        Ok(())
    }

    pub fn params(&self) -> &MatmulParams {
        &self.params
    }

    /// The task entry, as handed to the sequencer.
    pub fn task(&self) -> NpuTask {
        self.tasks.get(0)
    }

    /// The encoded command words.
    pub fn regcmd_words(&self) -> Vec<u64> {
        self.regcmd.to_vec()
    }

    /// Submission record for this operation.
    pub fn submit_args(&self, timeout_ms: u32) -> SubmitArgs {
        SubmitArgs::single_task(self.tasks.region().obj_addr, timeout_ms)
    }

    /// Tiles float16 operands into the device buffers. `a` is M x K
    /// row-major; `b` holds one K-deep column of the result per row
    /// (N x K).
    pub fn load_f16(&mut self, a: &[f16], b: &[f16]) -> Result<(), NpuError> {
        let MatmulParams { m, k, n, kind } = self.params;
        if !matches!(kind, MatmulKind::Float16 { .. }) {
            return Err(NpuError::Invalid("operands are not float16"));
        }
        check_operand_len(a.len(), m, k)?;
        check_operand_len(b.len(), n, k)?;

        let group = kind.kernel_group();
        for nn in 1..=n {
            for kk in 1..=k {
                let at = weight_offset(k, n, group, nn, kk)?;
                let v = b[((nn - 1) * k + (kk - 1)) as usize];
                put_u16(&mut self.weights, at, v.to_bits());
            }
        }
        let plane = kind.input_plane();
        for mm in 1..=m {
            for kk in 1..=k {
                let at = feature_offset(k, m, 1, plane, kk, mm, 1)?;
                let v = a[((mm - 1) * k + (kk - 1)) as usize];
                put_u16(&mut self.input, at, v.to_bits());
            }
        }
        Ok(())
    }

    /// Tiles int8 operands into the device buffers; same operand layout
    /// as [`Self::load_f16`].
    pub fn load_i8(&mut self, a: &[i8], b: &[i8]) -> Result<(), NpuError> {
        let MatmulParams { m, k, n, kind } = self.params;
        if kind != MatmulKind::Int8 {
            return Err(NpuError::Invalid("operands are not int8"));
        }
        check_operand_len(a.len(), m, k)?;
        check_operand_len(b.len(), n, k)?;

        let group = kind.kernel_group();
        for nn in 1..=n {
            for kk in 1..=k {
                let at = weight_offset(k, n, group, nn, kk)?;
                self.weights.set(at, b[((nn - 1) * k + (kk - 1)) as usize] as u8);
            }
        }
        let plane = kind.input_plane();
        for mm in 1..=m {
            for kk in 1..=k {
                let at = feature_offset(k, m, 1, plane, kk, mm, 1)?;
                self.input.set(at, a[((mm - 1) * k + (kk - 1)) as usize] as u8);
            }
        }
        Ok(())
    }

    /// Reads the float32 result cube back in M x N row-major order.
    pub fn output_f32(&self) -> Result<Vec<f32>, NpuError> {
        let MatmulParams { m, n, kind, .. } = self.params;
        if kind
            != (MatmulKind::Float16 {
                narrow_output: false,
            })
        {
            return Err(NpuError::Invalid("output is not float32"));
        }
        self.read_output_u32(m, n, kind)
            .map(|words| words.into_iter().map(f32::from_bits).collect())
    }

    /// Reads the int32 result cube back in M x N row-major order.
    pub fn output_i32(&self) -> Result<Vec<i32>, NpuError> {
        let MatmulParams { m, n, kind, .. } = self.params;
        if kind != MatmulKind::Int8 {
            return Err(NpuError::Invalid("output is not int32"));
        }
        self.read_output_u32(m, n, kind)
            .map(|words| words.into_iter().map(|w| w as i32).collect())
    }

    /// Reads the narrowed float16 result cube back in M x N row-major
    /// order.
    pub fn output_f16(&self) -> Result<Vec<f16>, NpuError> {
        let MatmulParams { m, n, kind, .. } = self.params;
        if kind
            != (MatmulKind::Float16 {
                narrow_output: true,
            })
        {
            return Err(NpuError::Invalid("output is not float16"));
        }
        let plane = kind.output_plane();
        let mut out = Vec::with_capacity((m * n) as usize);
        for mm in 1..=m {
            for nn in 1..=n {
                let at = feature_offset(n, m, 1, plane, nn, mm, 1)?;
                out.push(f16::from_bits(get_u16(&self.output, at)));
            }
        }
        Ok(out)
    }

    fn read_output_u32(&self, m: u32, n: u32, kind: MatmulKind) -> Result<Vec<u32>, NpuError> {
        let plane = kind.output_plane();
        let mut out = Vec::with_capacity((m * n) as usize);
        for mm in 1..=m {
            for nn in 1..=n {
                let at = feature_offset(n, m, 1, plane, nn, mm, 1)?;
                out.push(get_u32(&self.output, at));
            }
        }
        Ok(out)
    }

    /// Returns every buffer of this operation to the platform.
    pub fn release<P: Platform>(self, platform: &mut P) {
        self.output.free(platform);
        self.weights.free(platform);
        self.input.free(platform);
        self.tasks.free(platform);
        self.regcmd.free(platform);
    }
}

fn check_operand_len(len: usize, rows: u32, cols: u32) -> Result<(), NpuError> {
    if len != rows as usize * cols as usize {
        return Err(NpuError::Invalid("operand length does not match the shape"));
    }
    Ok(())
}

fn addr32(addr: u64) -> Result<u32, NpuError> {
    if addr > u32::MAX as u64 {
        return Err(NpuError::AddressRange { addr });
    }
    Ok(addr as u32)
}

fn put_u16(buf: &mut DeviceVec<u8>, elem: usize, bits: u16) {
    let [lo, hi] = bits.to_le_bytes();
    buf.set(elem * 2, lo);
    buf.set(elem * 2 + 1, hi);
}

fn get_u16(buf: &DeviceVec<u8>, elem: usize) -> u16 {
    u16::from_le_bytes([buf.get(elem * 2), buf.get(elem * 2 + 1)])
}

fn get_u32(buf: &DeviceVec<u8>, elem: usize) -> u32 {
    u32::from_le_bytes([
        buf.get(elem * 4),
        buf.get(elem * 4 + 1),
        buf.get(elem * 4 + 2),
        buf.get(elem * 4 + 3),
    ])
}
