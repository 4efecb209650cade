//! Simulated platform: allocates host memory as "device" memory, decodes
//! submitted command streams and executes them against the real buffers.
//!
//! The simulator deliberately consumes the register values, not the
//! builder's intermediate state: shapes, precisions and buffer addresses
//! are all recovered from the decoded stream, so an encoding bug shows up
//! as a wrong result or a simulated hang rather than a silently passing
//! test.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::ptr::NonNull;

use half::f16;
use rknpu_bringup::registers::{cna::*, core::*, dpu::*, pc, rdma::*};
use rknpu_bringup::{
    feature_offset, unpack, weight_offset, DmaRegion, MemFlags, NpuError, NpuTask, Platform,
    SubmitArgs,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic small-integer generator for operand data.
pub struct TestRng(u64);

impl TestRng {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    fn next(&mut self) -> u64 {
        // xorshift64
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Small non-negative integers; exactly representable in f16 and
    /// products stay exact in f32.
    pub fn small(&mut self) -> u8 {
        (self.next() % 10) as u8
    }
}

// The device's address registers are 32 bits wide, and the simulator
// dereferences register values as host pointers, so backing storage must
// live in the low 4 GiB. Ordinary heap allocations on a 64-bit host do
// not, hence anonymous mmap with MAP_32BIT.
const PROT_READ: i32 = 0x1;
const PROT_WRITE: i32 = 0x2;
const MAP_PRIVATE: i32 = 0x02;
const MAP_ANONYMOUS: i32 = 0x20;
const MAP_32BIT: i32 = 0x40;

extern "C" {
    fn mmap(
        addr: *mut core::ffi::c_void,
        len: usize,
        prot: i32,
        flags: i32,
        fd: i32,
        offset: i64,
    ) -> *mut core::ffi::c_void;
    fn munmap(addr: *mut core::ffi::c_void, len: usize) -> i32;
}

struct SimRegion {
    handle: u32,
    base: u64,
    size: usize,
    // Length of the mmap'd backing storage; page-aligned, 32-bit base.
    map_len: usize,
}

impl Drop for SimRegion {
    fn drop(&mut self) {
        unsafe { munmap(self.base as *mut core::ffi::c_void, self.map_len) };
    }
}

/// Host-memory stand-in for the DRM device.
#[derive(Default)]
pub struct SimPlatform {
    regions: Vec<SimRegion>,
    next_handle: u32,
    pub alloc_count: usize,
    pub submit_count: usize,
    /// When set, submissions fail with a timeout without executing.
    pub force_timeout: bool,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_regions(&self) -> usize {
        self.regions.len()
    }

    fn contains(&self, addr: u64) -> bool {
        self.regions
            .iter()
            .any(|r| addr >= r.base && addr < r.base + r.size as u64)
    }

    fn region_size_at(&self, addr: u64) -> Option<usize> {
        self.regions
            .iter()
            .find(|r| r.base == addr)
            .map(|r| r.size)
    }

    fn run_task(&mut self, task: &NpuTask, timeout_ms: u32) -> Result<(), NpuError> {
        assert_eq!({ task.int_clear }, pc::INT_CLEAR_ALL);
        assert!(self.contains(task.regcmd_addr), "regcmd buffer not mapped");

        // The sequencer fetches the declared amount plus the fixed tail.
        let fetched = task.regcfg_amount + pc::PC_DATA_EXTRA_AMOUNT;
        let words: Vec<u64> = (0..fetched)
            .map(|i| unsafe { ((task.regcmd_addr as *const u64).add(i as usize)).read_unaligned() })
            .collect();

        // A stream whose fetch window does not end on the enable write
        // never raises the completion interrupt.
        let (target, value, reg) = unpack(*words.last().unwrap());
        if target != 0x81 || reg != pc::PC_OPERATION_ENABLE {
            return Err(NpuError::Timeout { timeout_ms });
        }
        assert_eq!(value, { task.enable_mask }, "enable word disagrees with task");

        let mut regs: BTreeMap<u16, u32> = BTreeMap::new();
        for word in &words[..words.len() - 1] {
            let (_, value, reg) = unpack(*word);
            regs.insert(reg, value);
        }

        match { task.enable_mask } {
            m if m == (pc::PC_ENABLE | pc::PC_ENABLE_CNA | pc::PC_ENABLE_DPU) => {
                self.run_matmul(&regs)
            }
            m if m == (pc::PC_ENABLE_DPU | pc::PC_ENABLE_DPU_RDMA) => self.run_alu(&regs),
            _ => Err(NpuError::Device { code: -22 }),
        }
    }

    fn run_matmul(&mut self, regs: &BTreeMap<u16, u32>) -> Result<(), NpuError> {
        let m = regs[&CNA_DATA_SIZE0] & 0x7ff;
        let k = regs[&CNA_DATA_SIZE1] & 0xffff;
        let n = regs[&CNA_WEIGHT_SIZE2] & 0x3fff;
        let in_prec = (regs[&CNA_CONV_CON1] >> 4) & 0x7;
        let out_prec = (regs[&DPU_DATA_FORMAT] >> 29) & 0x7;
        let input = regs[&CNA_FEATURE_DATA_ADDR] as u64;
        let weights = regs[&CNA_DCOMP_ADDR0] as u64;
        let output = regs[&DPU_DST_BASE_ADDR] as u64;
        assert!(self.contains(input) && self.contains(weights) && self.contains(output));

        match in_prec {
            // float16
            2 => {
                for mm in 1..=m {
                    for nn in 1..=n {
                        let mut acc = 0.0f32;
                        for kk in 1..=k {
                            let a = feature_offset(k, m, 1, 8, kk, mm, 1).unwrap();
                            let b = weight_offset(k, n, 16, nn, kk).unwrap();
                            acc += f32::from(f16::from_bits(read_u16(input, a)))
                                * f32::from(f16::from_bits(read_u16(weights, b)));
                        }
                        match out_prec {
                            5 => {
                                let at = feature_offset(n, m, 1, 4, nn, mm, 1).unwrap();
                                write_u32(output, at, acc.to_bits());
                            }
                            2 => {
                                let at = feature_offset(n, m, 1, 8, nn, mm, 1).unwrap();
                                write_u16(output, at, f16::from_f32(acc).to_bits());
                            }
                            _ => return Err(NpuError::Device { code: -22 }),
                        }
                    }
                }
                Ok(())
            }
            // int8
            0 => {
                for mm in 1..=m {
                    for nn in 1..=n {
                        let mut acc = 0i32;
                        for kk in 1..=k {
                            let a = feature_offset(k, m, 1, 16, kk, mm, 1).unwrap();
                            let b = weight_offset(k, n, 32, nn, kk).unwrap();
                            acc += read_u8(input, a) as i8 as i32
                                * read_u8(weights, b) as i8 as i32;
                        }
                        let at = feature_offset(n, m, 1, 4, nn, mm, 1).unwrap();
                        write_u32(output, at, acc as u32);
                    }
                }
                Ok(())
            }
            _ => Err(NpuError::Device { code: -22 }),
        }
    }

    fn run_alu(&mut self, regs: &BTreeMap<u16, u32>) -> Result<(), NpuError> {
        let algo = (regs[&DPU_EW_CFG] >> EW_CFG_ALU_ALGO) & 0xf;
        let prec = (regs[&RDMA_FEATURE_MODE_CFG] >> FEATURE_MODE_IN_PRECISION) & 0x7;
        let src = regs[&RDMA_SRC_BASE_ADDR] as u64;
        let ew = regs[&RDMA_EW_BASE_ADDR] as u64;
        let dst = regs[&DPU_DST_BASE_ADDR] as u64;
        assert!(self.contains(src) && self.contains(ew) && self.contains(dst));

        let count = ((regs[&RDMA_DATA_CUBE_WIDTH] + 1)
            * (regs[&RDMA_DATA_CUBE_HEIGHT] + 1)
            * (regs[&RDMA_DATA_CUBE_CHANNEL] + 1)) as usize;
        let dst_size = self
            .region_size_at(dst)
            .expect("dst must be a region base");

        match prec {
            // int8
            0 => {
                assert!(count <= dst_size);
                for i in 0..count {
                    let a = read_u8(ew, i) as i8 as i32;
                    let b = read_u8(src, i) as i8 as i32;
                    write_u8(dst, i, alu_int(algo, a, b) as u8);
                }
                Ok(())
            }
            // int16
            1 => {
                assert!(count * 2 <= dst_size);
                for i in 0..count {
                    let a = read_u16(ew, i) as i16 as i32;
                    let b = read_u16(src, i) as i16 as i32;
                    write_u16(dst, i, alu_int(algo, a, b) as u16);
                }
                Ok(())
            }
            // float16
            2 => {
                assert!(count * 2 <= dst_size);
                for i in 0..count {
                    let a = f32::from(f16::from_bits(read_u16(ew, i)));
                    let b = f32::from(f16::from_bits(read_u16(src, i)));
                    write_u16(dst, i, f16::from_f32(alu_f32(algo, a, b)).to_bits());
                }
                Ok(())
            }
            _ => Err(NpuError::Device { code: -22 }),
        }
    }
}

fn alu_int(algo: u32, a: i32, b: i32) -> i32 {
    match algo {
        0 => a.max(b),
        1 => a.min(b),
        2 => a + b,
        3 => {
            if b == 0 {
                0
            } else {
                a / b
            }
        }
        4 => a - b,
        5 => a.abs(),
        6 => -a,
        7 | 8 => a,
        _ => panic!("unknown alu algorithm {algo}"),
    }
}

fn alu_f32(algo: u32, a: f32, b: f32) -> f32 {
    match algo {
        0 => a.max(b),
        1 => a.min(b),
        2 => a + b,
        3 => {
            if b == 0.0 {
                0.0
            } else {
                a / b
            }
        }
        4 => a - b,
        5 => a.abs(),
        6 => -a,
        7 => a.floor(),
        8 => a.ceil(),
        _ => panic!("unknown alu algorithm {algo}"),
    }
}

fn read_u8(base: u64, elem: usize) -> u8 {
    unsafe { (base as *const u8).add(elem).read() }
}

fn write_u8(base: u64, elem: usize, v: u8) {
    unsafe { (base as *mut u8).add(elem).write(v) }
}

fn read_u16(base: u64, elem: usize) -> u16 {
    unsafe { (base as *const u16).add(elem).read_unaligned() }
}

fn write_u16(base: u64, elem: usize, v: u16) {
    unsafe { (base as *mut u16).add(elem).write_unaligned(v) }
}

fn write_u32(base: u64, elem: usize, v: u32) {
    unsafe { (base as *mut u32).add(elem).write_unaligned(v) }
}

impl Platform for SimPlatform {
    fn mem_create(&mut self, size: usize, _flags: MemFlags) -> Result<DmaRegion, NpuError> {
        let size = size.max(1);
        let map_len = size.div_ceil(4096) * 4096;
        let base = unsafe {
            mmap(
                core::ptr::null_mut(),
                map_len,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS | MAP_32BIT,
                -1,
                0,
            )
        };
        if base as isize == -1 {
            return Err(NpuError::Allocation { size });
        }
        let base = base as u64;
        self.next_handle += 1;
        self.alloc_count += 1;
        let handle = self.next_handle;
        self.regions.push(SimRegion {
            handle,
            base,
            size,
            map_len,
        });
        Ok(DmaRegion {
            virt: NonNull::new(base as *mut u8).unwrap(),
            dma_addr: base,
            obj_addr: base,
            handle,
            size,
        })
    }

    fn mem_destroy(&mut self, region: DmaRegion) {
        let before = self.regions.len();
        self.regions.retain(|r| r.handle != region.handle);
        assert_eq!(before, self.regions.len() + 1, "double free or bad handle");
    }

    fn submit(&mut self, args: &SubmitArgs) -> Result<(), NpuError> {
        self.submit_count += 1;
        if self.force_timeout {
            return Err(NpuError::Timeout {
                timeout_ms: args.timeout_ms,
            });
        }
        assert!(args.task_number >= 1);
        assert!(self.contains(args.task_obj_addr), "task buffer not mapped");

        for t in 0..args.task_number {
            let at = args.task_obj_addr + (args.task_start + t) as u64 * 40;
            let task = unsafe { (at as *const NpuTask).read_unaligned() };
            self.run_task(&task, args.timeout_ms)?;
        }
        Ok(())
    }
}
