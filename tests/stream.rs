//! Golden-word checks on the encoded command streams.

mod common;

use rknpu_bringup::{
    build_descriptors, emit_matmul, unpack, CmdStream, HwConfig, MatmulBuffers, MatmulKind,
    MatmulParams, NpuTask, MATMUL_CMD_WORDS,
};

const WIDE_F16: MatmulKind = MatmulKind::Float16 {
    narrow_output: false,
};

fn stream_for(m: u32, k: u32, n: u32, kind: MatmulKind) -> CmdStream {
    let cfg = HwConfig::default();
    let bufs = MatmulBuffers {
        input_addr: 0x10_0000,
        weights_addr: 0x20_0000,
        output_addr: 0x30_0000,
    };
    let (cna, core, dpu) =
        build_descriptors(&MatmulParams { m, k, n, kind }, &cfg, &bufs).unwrap();
    let mut stream = CmdStream::with_capacity(MATMUL_CMD_WORDS);
    emit_matmul(&mut stream, &cna, &core, &dpu);
    stream
}

#[test]
fn matmul_golden_words() {
    let stream = stream_for(4, 32, 16, WIDE_F16);
    let words = stream.words();

    // First word selects the DPU ping-pong group.
    assert_eq!(words[0], 0x1001_0000_0013_4004);
    // CORE block closes with the fixed 0x3030 write.
    assert_eq!(words[53], 0x0801_0000_0000_3030);
    // Tail: padding, amounts marker, padding, enable.
    assert_eq!(words[104], 0x0101_0000_0000_0000);
    assert_eq!(words[105], 0x0101_0000_0000_0014);
    assert_eq!(words[106], 0x0101_0000_0000_0000);
    assert_eq!(words[107], 0x0081_0000_000d_0008);
}

#[test]
fn matmul_word_count_is_shape_independent() {
    for (m, k, n) in [(1, 32, 16), (4, 32, 16), (384, 448, 16), (8, 64, 4096)] {
        for kind in [WIDE_F16, MatmulKind::Int8] {
            let stream = stream_for(m, k, n, kind);
            assert_eq!(stream.len(), MATMUL_CMD_WORDS);
            assert_eq!(stream.regcfg_amount(), (MATMUL_CMD_WORDS - 4) as u32);
        }
    }
}

#[test]
fn every_config_word_routes_to_a_known_unit() {
    let stream = stream_for(4, 32, 16, WIDE_F16);
    for word in &stream.words()[..MATMUL_CMD_WORDS - 1] {
        let (target, _, reg) = unpack(*word);
        assert_eq!(target, rknpu_bringup::registers::unit_target(reg));
    }
}

#[test]
fn addresses_land_in_the_stream() {
    let stream = stream_for(4, 32, 16, WIDE_F16);
    let value_of = |wanted: u16| {
        stream
            .words()
            .iter()
            .find_map(|w| {
                let (_, value, reg) = unpack(*w);
                (reg == wanted).then_some(value)
            })
            .unwrap()
    };
    assert_eq!(value_of(0x1064), 0x10_0000); // feature data
    assert_eq!(value_of(0x1088), 0x20_0000); // weights
    assert_eq!(value_of(0x4020), 0x30_0000); // output
}

#[test]
fn task_entry_accounts_for_the_tail() {
    let stream = stream_for(4, 32, 16, WIDE_F16);
    let task = NpuTask::for_stream(0, 0xd, 0x300, &stream, 0xdead_0000);
    assert_eq!({ task.regcfg_amount }, 104);
    assert_eq!({ task.int_clear }, 0x1ffff);
    assert_eq!({ task.regcmd_addr }, 0xdead_0000);
}
