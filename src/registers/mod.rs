//! Register address map of the RK3588 NPU, as observed through the PC
//! (program sequencer) command interface.
//!
//! The sequencer consumes 64-bit instruction words of the form
//! `target << 48 | value << 16 | reg`, where `reg` is the register
//! offset inside the global 64 KiB window and `target` selects the unit
//! decoder. Unit windows are 4 KiB apart: PC at `0x0000`, CNA at `0x1000`,
//! CORE at `0x3000`, DPU at `0x4000` and DPU_RDMA at `0x5000`.

pub mod cna;
pub mod core;
pub mod dpu;
pub mod pc;
pub mod rdma;

/// Target tag routing a config write to the unit owning `reg`.
///
/// Each unit's tag is a single bit derived from the window index, plus the
/// always-set broadcast bit: PC `0x101`, CNA `0x201`, CORE `0x801`,
/// DPU `0x1001`, DPU_RDMA `0x2001`.
pub const fn unit_target(reg: u16) -> u16 {
    (1 << ((reg >> 12) + 8)) + 1
}

/// Target tag of the final operation-enable write of a command stream.
pub const TARGET_ENABLE: u16 = 0x81;
