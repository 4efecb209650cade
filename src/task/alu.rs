//! Element-wise ALU operations over the DPU and its read-DMA.
//!
//! Unlike the matmul path, no convolution units run here: the DPU is put
//! in flying mode, the main operand streams in through the RDMA feature
//! port and the second operand through the ERDMA element-wise port. The
//! register recipe is the reverse-engineered 65-word sequence from the
//! vendor blob, with the data cube fixed at 10 x 1 x 8 elements; only the
//! precision fields, the ALU algorithm and the buffer addresses vary.

use alloc::vec::Vec;
use half::f16;

use crate::err::NpuError;
use crate::platform::{DeviceVec, MemFlags, Platform};
use crate::registers::{dpu::*, pc, rdma::*};
use crate::stream::CmdStream;
use crate::task::{NpuTask, Precision, SubmitArgs};

/// Words in a sealed ALU command stream.
pub const ALU_CMD_WORDS: usize = 65;

/// Elements in the fixed 10 x 1 x 8 ALU data cube.
pub const ALU_CUBE_ELEMS: usize = 80;

const CMD_BUF_WORDS: usize = 128;

/// Default output conversion scale: unit scale in both halves.
const OUT_CVT_SCALE_DEFAULT: u32 = 65537;

/// ALU algorithm codes as programmed into `DPU_EW_CFG`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AluAlgorithm {
    Max = 0,
    Min = 1,
    Add = 2,
    Div = 3,
    Sub = 4,
    Abs = 5,
    Neg = 6,
    Floor = 7,
    Ceil = 8,
}

/// Operand data type of an element-wise operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluDtype {
    Int8,
    Int16,
    Float16,
}

impl AluDtype {
    pub fn element_size(self) -> usize {
        match self {
            AluDtype::Int8 => 1,
            AluDtype::Int16 | AluDtype::Float16 => 2,
        }
    }

    fn precision(self) -> Precision {
        match self {
            AluDtype::Int8 => Precision::Int8,
            AluDtype::Int16 => Precision::Int16,
            AluDtype::Float16 => Precision::Float16,
        }
    }

    /// Element-data size code for the EW and ERDMA paths.
    fn data_size_code(self) -> u32 {
        match self {
            AluDtype::Int8 => 1,
            AluDtype::Int16 | AluDtype::Float16 => 2,
        }
    }

    fn fp16_to_fp32(self) -> u32 {
        (self == AluDtype::Float16) as u32
    }
}

/// Quantization scales observed on real models, mapping an addition scale
/// to the hardware's internal scale. Empirically captured; do not rederive.
pub const ADD_SCALE_TABLE: [(f32, f32); 16] = [
    (0.090192, 299.671889248),
    (0.399250, 1326.499209406),
    (0.364902, 780.34375),
    (0.422037, 715.5625),
    (0.213016, 564.6875),
    (0.244231, 499.796875),
    (0.283416, 488.203125),
    (0.171151, 602.90625),
    (0.164588, 271.921875),
    (0.204098, 262.90625),
    (0.116532, 450.140625),
    (0.134499, 212.1953125),
    (0.220141, 368.28125),
    (0.094560, 416.421875),
    (0.093230, 305.421875),
    (0.100618, 313.671875),
];

/// Looks up the internal scale for a model's addition scale.
pub fn add_scale_for(addition_scale: f32) -> Option<f32> {
    ADD_SCALE_TABLE
        .iter()
        .find(|(key, _)| libm_fabsf(addition_scale - *key) < 1e-5)
        .map(|(_, scale)| *scale)
}

fn libm_fabsf(v: f32) -> f32 {
    if v < 0.0 {
        -v
    } else {
        v
    }
}

/// Derives the `OUT_CVT_SCALE`/`OUT_CVT_SHIFT` register values from an
/// internal addition scale.
pub fn out_cvt_scale_for(add_scale: f32) -> (u32, u32) {
    // Round to nearest; the table only holds non-negative scales.
    let bits = (add_scale + 0.5) as u32;
    let shift = 127 + 31 - 32 - (bits >> 23) + 16;
    let mut scale = (bits >> 9) & 0x7fff;
    if scale < 1 << 14 {
        scale |= 1 << 14;
    }
    (scale, shift)
}

/// Everything the emitter needs for one element-wise operation.
#[derive(Clone, Copy, Debug)]
pub struct AluRecipe {
    pub dtype: AluDtype,
    pub algorithm: AluAlgorithm,
    pub input_addr: u32,
    pub weights_addr: u32,
    pub output_addr: u32,
    pub out_cvt_scale: u32,
    pub out_cvt_shift: u32,
}

/// Emits the element-wise register sequence into `stream` and seals it.
///
/// Word order and the oddities (the double `EW_CFG` programming, the
/// duplicated `SURFACE_ADD` write, the reserved `0x40c4` write) replicate
/// the only sequence the hardware is known to accept.
pub fn emit_alu(stream: &mut CmdStream, recipe: &AluRecipe) {
    let p = recipe.dtype.precision() as u32;
    let algo = recipe.algorithm as u32;
    let edata = recipe.dtype.data_size_code();

    stream.emit(
        DPU_S_POINTER,
        DPU_S_POINTER_POINTER_PP_MODE | DPU_S_POINTER_EXECUTER_PP_EN | DPU_S_POINTER_POINTER_PP_EN,
    );
    // burst 15, direct conv, output mode 2, operand from the RDMA.
    stream.emit(DPU_FEATURE_MODE_CFG, (15 << 5) | (2 << 1) | 1);
    stream.emit(DPU_DATA_FORMAT, (p << 29) | (p << 26) | p);

    // First EW_CFG pass: everything live, operand from the ERDMA port.
    let ew_base = (1 << EW_CFG_DATA_MODE) | (edata << EW_CFG_EDATA_SIZE) | (algo << EW_CFG_ALU_ALGO);
    stream.emit(DPU_EW_CFG, ew_base);

    stream.emit(DPU_DATA_CUBE_CHANNEL, (7 << 16) | 7);
    stream.emit(DPU_BS_OW_CFG, 1 << 1);
    stream.emit(DPU_BS_OW_OP, 0);
    // All BS sub-stages bypassed.
    stream.emit(DPU_BS_CFG, (1 << 6) | (1 << 4) | (1 << 1) | 1);
    stream.emit(DPU_WDMA_SIZE_0, 7);
    stream.emit(DPU_WDMA_SIZE_1, 9);
    stream.emit(DPU_BN_CFG, (1 << 6) | (1 << 4) | (1 << 1) | 1);
    stream.emit(DPU_BN_ALU_CFG, 0);
    stream.emit(DPU_BN_MUL_CFG, 0);
    stream.emit(DPU_BN_RELUX_CMP_VALUE, 0);

    // Second EW_CFG pass: relu/lut bypassed, operand source flipped.
    stream.emit(
        DPU_EW_CFG,
        ew_base | (1 << EW_CFG_RELU_BYPASS) | (1 << EW_CFG_LUT_BYPASS) | (1 << EW_CFG_OP_SRC),
    );
    stream.emit(DPU_EW_CVT_OFFSET_VALUE, 0);
    stream.emit(DPU_EW_CVT_SCALE_VALUE, 1);
    stream.emit(DPU_EW_RELUX_CMP_VALUE, 0);
    stream.emit(DPU_OUT_CVT_OFFSET, 0);
    stream.emit(DPU_OUT_CVT_SCALE, recipe.out_cvt_scale);
    stream.emit(DPU_OUT_CVT_SHIFT, recipe.out_cvt_shift);
    for i in 0..8 {
        stream.emit(dpu_ew_op_value(i), 0);
    }
    stream.emit(DPU_SURFACE_ADD, 12 << 4);
    stream.emit(DPU_SURFACE_ADD, 12 << 4);
    stream.emit(DPU_40C4, 0);
    stream.emit(DPU_LUT_ACCESS_CFG, 0);
    stream.emit(DPU_LUT_ACCESS_DATA, 0);
    stream.emit(DPU_LUT_CFG, 0);
    stream.emit(DPU_LUT_INFO, 0);
    stream.emit(DPU_LUT_LE_START, 0);
    stream.emit(DPU_LUT_LE_END, 0);
    stream.emit(DPU_LUT_LO_START, 0);
    stream.emit(DPU_LUT_LO_END, 0);
    stream.emit(DPU_LUT_LE_SLOPE_SCALE, 0);
    stream.emit(DPU_LUT_LE_SLOPE_SHIFT, 0);
    stream.emit(DPU_LUT_LO_SLOPE_SCALE, 0);
    stream.emit(DPU_LUT_LO_SLOPE_SHIFT, 0);

    stream.emit(DPU_DST_BASE_ADDR, recipe.output_addr);
    stream.emit(RDMA_SRC_BASE_ADDR, recipe.input_addr);
    stream.emit(RDMA_EW_BASE_ADDR, recipe.weights_addr);
    stream.emit(RDMA_DATA_CUBE_WIDTH, 9);
    stream.emit(RDMA_DATA_CUBE_HEIGHT, 0);
    stream.emit(RDMA_DATA_CUBE_CHANNEL, 7);
    stream.emit(RDMA_BRDMA_CFG, 0);
    stream.emit(RDMA_NRDMA_CFG, 0);
    stream.emit(RDMA_BN_BASE_ADDR, 0);
    stream.emit(
        RDMA_ERDMA_CFG,
        (1 << ERDMA_CFG_DATA_MODE) | (edata << ERDMA_CFG_DATA_SIZE),
    );
    stream.emit(RDMA_EW_SURF_STRIDE, 12);
    stream.emit(
        RDMA_FEATURE_MODE_CFG,
        (p << FEATURE_MODE_IN_PRECISION)
            | (p << FEATURE_MODE_PROC_PRECISION)
            | (15 << FEATURE_MODE_BURST_LEN)
            | (recipe.dtype.fp16_to_fp32() << FEATURE_MODE_FP16TOFP32_EN)
            | (1 << FEATURE_MODE_FLYING_MODE),
    );
    stream.emit(RDMA_SRC_DMA_CFG, 0);
    stream.emit(RDMA_SURF_NOTCH, 2);
    stream.emit(RDMA_PAD_CFG, 0);
    stream.emit(
        RDMA_WEIGHT,
        RDMA_WEIGHT_E | RDMA_WEIGHT_N | RDMA_WEIGHT_B | RDMA_WEIGHT_M,
    );
    stream.emit(RDMA_EW_SURF_NOTCH, 2);

    stream.begin_tail();
    stream.emit_raw(0, 0, 0);
    stream.emit(pc::PC_REGISTER_AMOUNTS, 0);
    stream.emit(pc::PC_REGISTER_AMOUNTS, 0);
    stream.enable(pc::PC_ENABLE_DPU_RDMA | pc::PC_ENABLE_DPU);

    assert_eq!(stream.len(), ALU_CMD_WORDS);
}

/// A prepared element-wise operation. The result is `alg(a, b)` per
/// element, with `a` streaming through the element-wise port and `b`
/// through the feature port.
#[derive(Debug)]
pub struct AluOp {
    dtype: AluDtype,
    algorithm: AluAlgorithm,
    len: usize,
    regcmd: DeviceVec<u64>,
    tasks: DeviceVec<NpuTask>,
    input: DeviceVec<u8>,
    weights: DeviceVec<u8>,
    output: DeviceVec<u8>,
}

impl AluOp {
    /// Allocates buffers for `len` elements and encodes the command
    /// stream. `addition_scale`, when given, must be one of the observed
    /// model scales and selects the output conversion scale; otherwise the
    /// unit scale is programmed.
    pub fn create<P: Platform>(
        platform: &mut P,
        dtype: AluDtype,
        algorithm: AluAlgorithm,
        len: usize,
        addition_scale: Option<f32>,
    ) -> Result<Self, NpuError> {
        if len == 0 || len > ALU_CUBE_ELEMS {
            return Err(NpuError::Invalid("element count exceeds the ALU cube"));
        }
        let (out_cvt_scale, out_cvt_shift) = match addition_scale {
            None => (OUT_CVT_SCALE_DEFAULT, 0),
            Some(s) => {
                let scale =
                    add_scale_for(s).ok_or(NpuError::Invalid("unknown addition scale"))?;
                out_cvt_scale_for(scale)
            }
        };

        debug!("generating alu task: {algorithm:?} over {len} x {dtype:?}");

        let esz = dtype.element_size();
        let cube_bytes = ALU_CUBE_ELEMS * esz;
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
        let input = match DeviceVec::<u8>::zeroed(platform, cube_bytes, flags) {
            Ok(v) => v,
            Err(e) => {
                tasks.free(platform);
                regcmd.free(platform);
                return Err(e);
            }
        };
        let weights = match DeviceVec::<u8>::zeroed(platform, cube_bytes, flags) {
            Ok(v) => v,
            Err(e) => {
                input.free(platform);
                tasks.free(platform);
                regcmd.free(platform);
                return Err(e);
            }
        };
        let output = match DeviceVec::<u8>::zeroed(platform, cube_bytes, flags) {
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
            dtype,
            algorithm,
            len,
            regcmd,
            tasks,
            input,
            weights,
            output,
        };
        if let Err(e) = op.encode(out_cvt_scale, out_cvt_shift) {
            op.release(platform);
            return Err(e);
        }
        Ok(op)
    }

    fn encode(&mut self, out_cvt_scale: u32, out_cvt_shift: u32) -> Result<(), NpuError> {
        let recipe = AluRecipe {
            dtype: self.dtype,
            algorithm: self.algorithm,
            input_addr: addr32(self.input.dma_addr())?,
            weights_addr: addr32(self.weights.dma_addr())?,
            output_addr: addr32(self.output.dma_addr())?,
            out_cvt_scale,
            out_cvt_shift,
        };
        let mut stream = CmdStream::with_capacity(ALU_CMD_WORDS);
        emit_alu(&mut stream, &recipe);
        self.regcmd.copy_from_slice(stream.words());

        let task = NpuTask::for_stream(
            4,
            pc::PC_ENABLE_DPU_RDMA | pc::PC_ENABLE_DPU,
            pc::INT_MASK_DPU_DONE,
            &stream,
            self.regcmd.dma_addr(),
        );
        self.tasks.set(0, task);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn task(&self) -> NpuTask {
        self.tasks.get(0)
    }

    pub fn regcmd_words(&self) -> Vec<u64> {
        self.regcmd.to_vec()
    }

    pub fn submit_args(&self, timeout_ms: u32) -> SubmitArgs {
        SubmitArgs::single_task(self.tasks.region().obj_addr, timeout_ms)
    }

    pub fn load_i8(&mut self, a: &[i8], b: &[i8]) -> Result<(), NpuError> {
        self.check_load(AluDtype::Int8, a.len(), b.len())?;
        for (i, v) in a.iter().enumerate() {
            self.weights.set(i, *v as u8);
        }
        for (i, v) in b.iter().enumerate() {
            self.input.set(i, *v as u8);
        }
        Ok(())
    }

    pub fn load_i16(&mut self, a: &[i16], b: &[i16]) -> Result<(), NpuError> {
        self.check_load(AluDtype::Int16, a.len(), b.len())?;
        for (i, v) in a.iter().enumerate() {
            put_u16(&mut self.weights, i, *v as u16);
        }
        for (i, v) in b.iter().enumerate() {
            put_u16(&mut self.input, i, *v as u16);
        }
        Ok(())
    }

    pub fn load_f16(&mut self, a: &[f16], b: &[f16]) -> Result<(), NpuError> {
        self.check_load(AluDtype::Float16, a.len(), b.len())?;
        for (i, v) in a.iter().enumerate() {
            put_u16(&mut self.weights, i, v.to_bits());
        }
        for (i, v) in b.iter().enumerate() {
            put_u16(&mut self.input, i, v.to_bits());
        }
        Ok(())
    }

    pub fn output_i8(&self) -> Result<Vec<i8>, NpuError> {
        self.check_dtype(AluDtype::Int8)?;
        Ok((0..self.len).map(|i| self.output.get(i) as i8).collect())
    }

    pub fn output_i16(&self) -> Result<Vec<i16>, NpuError> {
        self.check_dtype(AluDtype::Int16)?;
        Ok((0..self.len)
            .map(|i| get_u16(&self.output, i) as i16)
            .collect())
    }

    pub fn output_f16(&self) -> Result<Vec<f16>, NpuError> {
        self.check_dtype(AluDtype::Float16)?;
        Ok((0..self.len)
            .map(|i| f16::from_bits(get_u16(&self.output, i)))
            .collect())
    }

    fn check_load(&self, dtype: AluDtype, a_len: usize, b_len: usize) -> Result<(), NpuError> {
        self.check_dtype(dtype)?;
        if a_len != self.len || b_len != self.len {
            return Err(NpuError::Invalid("operand length does not match"));
        }
        Ok(())
    }

    fn check_dtype(&self, dtype: AluDtype) -> Result<(), NpuError> {
        if self.dtype != dtype {
            return Err(NpuError::Invalid("operand type does not match"));
        }
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::unpack;

    fn recipe(dtype: AluDtype, algorithm: AluAlgorithm) -> AluRecipe {
        AluRecipe {
            dtype,
            algorithm,
            input_addr: 0x1000,
            weights_addr: 0x2000,
            output_addr: 0x3000,
            out_cvt_scale: OUT_CVT_SCALE_DEFAULT,
            out_cvt_shift: 0,
        }
    }

    #[test]
    fn stream_shape() {
        let mut stream = CmdStream::new();
        emit_alu(&mut stream, &recipe(AluDtype::Float16, AluAlgorithm::Add));
        assert_eq!(stream.len(), ALU_CMD_WORDS);
        assert_eq!(stream.regcfg_amount(), (ALU_CMD_WORDS - 4) as u32);
        assert_eq!(*stream.words().last().unwrap(), 0x0081_0000_0018_0008);
    }

    #[test]
    fn float16_feature_mode_word() {
        let mut stream = CmdStream::new();
        emit_alu(&mut stream, &recipe(AluDtype::Float16, AluAlgorithm::Add));
        let word = stream
            .words()
            .iter()
            .find(|w| unpack(**w).2 == RDMA_FEATURE_MODE_CFG)
            .copied()
            .unwrap();
        assert_eq!(word, 0x2001_0001_7849_5044);
    }

    #[test]
    fn surface_add_is_written_twice() {
        let mut stream = CmdStream::new();
        emit_alu(&mut stream, &recipe(AluDtype::Int8, AluAlgorithm::Sub));
        let count = stream
            .words()
            .iter()
            .filter(|w| unpack(**w).2 == DPU_SURFACE_ADD)
            .count();
        assert_eq!(count, 2);
    }

    #[test]
    fn algorithm_lands_in_ew_cfg() {
        let mut stream = CmdStream::new();
        emit_alu(&mut stream, &recipe(AluDtype::Int8, AluAlgorithm::Min));
        let ew_words: Vec<u32> = stream
            .words()
            .iter()
            .filter(|w| unpack(**w).2 == DPU_EW_CFG)
            .map(|w| unpack(*w).1)
            .collect();
        assert_eq!(ew_words.len(), 2);
        for value in ew_words {
            assert_eq!((value >> EW_CFG_ALU_ALGO) & 0xf, AluAlgorithm::Min as u32);
        }
    }

    #[test]
    fn add_scale_lookup() {
        assert_eq!(add_scale_for(0.090192), Some(299.671889248));
        assert_eq!(add_scale_for(0.100618), Some(313.671875));
        assert_eq!(add_scale_for(0.5), None);
    }

    #[test]
    fn out_cvt_scale_derivation() {
        // 299.671889248 rounds to 300; no exponent bits, so the scale
        // falls back to the forced high bit.
        let (scale, shift) = out_cvt_scale_for(299.671889248);
        assert_eq!(scale, 1 << 14);
        assert_eq!(shift, 142);
        let (scale, _) = out_cvt_scale_for(1326.499209406);
        assert_eq!(scale, (1326 >> 9) | (1 << 14));
    }
}
