use rsp_core::opcode::vector;
use rsp_core::state::{COP0_SEMAPHORE, COP0_SP_STATUS, SP_STATUS_BROKE, SP_STATUS_HALT};
use rsp_core::{Insn, Interpreter, RspState};
use rsp_interp::Reference;

use crate::asm::*;

fn run_with(program: &[u32], setup: impl FnOnce(&mut RspState)) -> (Box<RspState>, u32) {
    let mut state = RspState::boxed();
    state.load_imem(0, program);
    setup(&mut state);
    let n = Reference::new().run(&mut state, 10_000);
    (state, n)
}

fn run(program: &[u32]) -> (Box<RspState>, u32) {
    run_with(program, |_| {})
}

#[test]
fn test_scalar_alu() {
    let (s, n) = run(&[
        addiu(1, 0, -2),
        lui(2, 0x1234),
        ori(2, 2, 0x5678),
        subu(3, 0, 1),
        sra(4, 1, 1),
        srl(5, 1, 28),
        slt(6, 1, 0),
        sltu(7, 1, 0),
        nor(8, 0, 0),
        sltiu(9, 3, -1),
        brk(),
    ]);
    assert_eq!(s.regs.gpr[1], 0xFFFF_FFFE);
    assert_eq!(s.regs.gpr[2], 0x1234_5678);
    assert_eq!(s.regs.gpr[3], 2);
    assert_eq!(s.regs.gpr[4], 0xFFFF_FFFF);
    assert_eq!(s.regs.gpr[5], 0xF);
    assert_eq!(s.regs.gpr[6], 1);
    assert_eq!(s.regs.gpr[7], 0);
    assert_eq!(s.regs.gpr[8], 0xFFFF_FFFF);
    // sltiu compares against the sign-extended immediate
    assert_eq!(s.regs.gpr[9], 1);
    assert_eq!(n, 11);
}

#[test]
fn test_register_zero_is_hardwired() {
    let (s, _) = run(&[addiu(0, 0, 5), lui(0, 1), addu(1, 0, 0), brk()]);
    assert_eq!(s.regs.gpr[0], 0);
    assert_eq!(s.regs.gpr[1], 0);
}

#[test]
fn test_break_sets_status() {
    let (s, _) = run(&[brk()]);
    assert_eq!(s.halted, 1);
    assert_eq!(s.cop0[COP0_SP_STATUS] & (SP_STATUS_HALT | SP_STATUS_BROKE), 3);
    assert_eq!(s.pc, 4);
}

#[test]
fn test_delay_slot_runs_before_target() {
    let (s, n) = run(&[
        beq(0, 0, 2),   // 0x00 -> 0x0c
        addiu(1, 0, 1), // 0x04 delay slot
        addiu(2, 0, 1), // 0x08 skipped
        brk(),          // 0x0c
    ]);
    assert_eq!(s.regs.gpr[1], 1);
    assert_eq!(s.regs.gpr[2], 0);
    assert_eq!(n, 3);
}

#[test]
fn test_branch_not_taken_falls_through() {
    let (s, _) = run(&[bne(0, 0, 2), addiu(1, 0, 1), addiu(2, 0, 1), brk()]);
    assert_eq!(s.regs.gpr[1], 1);
    assert_eq!(s.regs.gpr[2], 1);
}

#[test]
fn test_condition_latched_before_delay_slot() {
    // the delay slot changes r1 after the branch has read it
    let (s, _) = run(&[
        addiu(1, 0, 1), // 0x00
        bgtz(1, 2),     // 0x04 -> 0x10
        addiu(1, 0, -1),
        addiu(2, 0, 1),
        brk(),
    ]);
    assert_eq!(s.regs.gpr[1], 0xFFFF_FFFF);
    assert_eq!(s.regs.gpr[2], 0);
}

#[test]
fn test_jal_and_jr_link() {
    let (s, n) = run(&[
        jal(0x10),      // 0x00
        nop(),          // 0x04
        addiu(2, 0, 7), // 0x08 return point
        brk(),          // 0x0c
        jr(31),         // 0x10
        addiu(3, 0, 1), // 0x14
    ]);
    assert_eq!(s.regs.gpr[31], 0x08);
    assert_eq!(s.regs.gpr[2], 7);
    assert_eq!(s.regs.gpr[3], 1);
    assert_eq!(n, 6);
}

#[test]
fn test_branch_in_delay_slot_ignored() {
    let (s, _) = run(&[
        j(0x10),        // 0x00
        j(0x20),        // 0x04 ignored
        nop(),
        nop(),
        brk(),          // 0x10
    ]);
    assert_eq!(s.pc, 0x14);
}

#[test]
fn test_pc_wraps_at_image_end() {
    let mut program = vec![nop(); 0x400];
    program[0] = brk();
    program[0x3FF] = addiu(1, 0, 9);
    let mut state = RspState::boxed();
    state.load_imem(0, &program);
    state.pc = 0xFFC;
    Reference::new().run(&mut state, 10);
    assert_eq!(state.regs.gpr[1], 9);
    assert_eq!(state.pc, 4);
}

#[test]
fn test_big_endian_memory() {
    let (s, _) = run_with(
        &[
            lw(1, 0x10, 0),
            lh(2, 0x10, 0),
            lhu(3, 0x10, 0),
            lb(4, 0x11, 0),
            lbu(5, 0x11, 0),
            sw(1, 0x20, 0),
            sh(1, 0x30, 0),
            sb(1, 0x40, 0),
            brk(),
        ],
        |s| s.write_u32(0x10, 0x8081_8283),
    );
    assert_eq!(s.regs.gpr[1], 0x8081_8283);
    assert_eq!(s.regs.gpr[2], 0xFFFF_8081);
    assert_eq!(s.regs.gpr[3], 0x8081);
    assert_eq!(s.regs.gpr[4], 0xFFFF_FF81);
    assert_eq!(s.regs.gpr[5], 0x81);
    assert_eq!(&s.dmem[0x20..0x24], &[0x80, 0x81, 0x82, 0x83]);
    assert_eq!(&s.dmem[0x30..0x32], &[0x82, 0x83]);
    assert_eq!(s.dmem[0x40], 0x83);
}

#[test]
fn test_misaligned_access_wraps_dmem() {
    let (s, _) = run_with(
        &[addiu(1, 0, 0xFFE), sw(2, 0, 1), lw(3, 1, 1), brk()],
        |s| s.regs.gpr[2] = 0x1122_3344,
    );
    assert_eq!(s.dmem[0xFFE], 0x11);
    assert_eq!(s.dmem[0xFFF], 0x22);
    assert_eq!(s.dmem[0], 0x33);
    assert_eq!(s.dmem[1], 0x44);
    assert_eq!(s.regs.gpr[3], 0x2233_4400);
}

#[test]
fn test_mtc0_halts() {
    let (s, n) = run(&[addiu(1, 0, 2), mtc0(1, 4), addiu(2, 0, 1), brk()]);
    assert_eq!(s.halted, 1);
    assert_ne!(s.cop0[COP0_SP_STATUS] & SP_STATUS_HALT, 0);
    assert_eq!(s.cop0[COP0_SP_STATUS] & SP_STATUS_BROKE, 0);
    assert_eq!(s.regs.gpr[2], 0);
    assert_eq!(n, 2);
}

#[test]
fn test_semaphore_read_sets() {
    let (s, _) = run(&[mfc0(1, 7), mfc0(2, 7), mtc0(0, 7), mfc0(3, 7), brk()]);
    assert_eq!(s.regs.gpr[1], 0);
    assert_eq!(s.regs.gpr[2], 1);
    assert_eq!(s.regs.gpr[3], 0);
    assert_eq!(s.cop0[COP0_SEMAPHORE], 1);
}

#[test]
fn test_budget_stops_loop() {
    let mut state = RspState::boxed();
    state.load_imem(0, &[j(0), nop()]);
    assert_eq!(Reference::new().run(&mut state, 25), 25);
    assert_eq!(state.halted, 0);
}

#[test]
fn test_unknown_word_is_nop() {
    let (s, n) = run(&[0xFFFF_FFFF, addiu(1, 0, 1), brk()]);
    assert_eq!(s.regs.gpr[1], 1);
    assert_eq!(n, 3);
}

fn fill(state: &mut RspState, reg: usize, lanes: [u16; 8]) {
    state.regs.vpr[reg] = lanes;
}

#[test]
fn test_multiply_saturates() {
    let (s, _) = run_with(&[vmulf(1, 2, 3, 0), vmudh(4, 2, 2, 0), brk()], |s| {
        fill(s, 2, [0x8000, 0x4000, 0x7FFF, 0, 1, 0xFFFF, 0x8000, 0x7FFF]);
        fill(s, 3, [0x8000, 0x4000, 0x7FFF, 5, 1, 0xFFFF, 0x7FFF, 0x8000]);
    });
    // -1 * -1 in Q15 clamps to the largest positive value
    assert_eq!(s.regs.vpr[1][0], 0x7FFF);
    assert_eq!(s.regs.vpr[1][1], 0x2000);
    assert_eq!(s.regs.vpr[1][3], 0);
    assert_eq!(s.regs.vpr[1][6], 0x8001);
    // vmudh overwrote the accumulator: 0x7FFF * 0x7FFF << 16
    assert_eq!(s.regs.acc[2], 0x3FFF_0001_0000);
    assert_eq!(s.regs.vpr[4][2], 0x7FFF);
    assert_eq!(s.regs.vpr[4][5], 1);
}

#[test]
fn test_multiply_accumulate_and_vsar() {
    let (s, _) = run_with(
        &[vmudh(1, 2, 3, 0), vmadh(1, 2, 3, 0), vsar(5, 8), vsar(6, 9), vsar(7, 10), brk()],
        |s| {
            fill(s, 2, [3; 8]);
            fill(s, 3, [0xFFFE; 8]);
        },
    );
    // 2 * (3 * -2) = -12 in the middle slice
    assert_eq!(s.regs.acc[0], -12 << 16);
    assert_eq!(s.regs.vpr[1][0], (-12i16) as u16);
    assert_eq!(s.regs.vpr[5][0], 0xFFFF);
    assert_eq!(s.regs.vpr[6][0], (-12i16) as u16);
    assert_eq!(s.regs.vpr[7][0], 0);
}

#[test]
fn test_accumulator_wraps_at_48_bits() {
    let (s, _) = run_with(&[vmadh(1, 2, 3, 0), brk()], |s| {
        fill(s, 2, [1; 8]);
        fill(s, 3, [1; 8]);
        s.regs.set_acc(0, 0x7FFF_FFFF_0000);
    });
    assert_eq!(s.regs.acc[0], -0x8000_0000_0000);
    assert_eq!(s.regs.vpr[1][0], 0x8000);
}

#[test]
fn test_add_with_carry_in() {
    let (s, _) = run_with(
        &[addiu(1, 0, 0x0003), ctc2(1, 0), vadd(4, 2, 3, 0), cfc2(5, 0), brk()],
        |s| {
            fill(s, 2, [0x7FFF, 1, 2, 3, 4, 5, 6, 7]);
            fill(s, 3, [1; 8]);
        },
    );
    assert_eq!(s.regs.vpr[4], [0x7FFF, 3, 3, 4, 5, 6, 7, 8]);
    // the low accumulator slice keeps the unclamped sum
    assert_eq!(s.regs.acc[0] & 0xFFFF, 0x8001);
    assert_eq!(s.regs.vco, 0);
    assert_eq!(s.regs.gpr[5], 0);
}

#[test]
fn test_vaddc_sets_carry() {
    let (s, _) = run_with(&[vaddc(1, 2, 3, 0), cfc2(4, 0), brk()], |s| {
        fill(s, 2, [0xFFFF, 0x8000, 0, 0, 0, 0, 0, 0xFFFF]);
        fill(s, 3, [1, 0x8000, 0, 0, 0, 0, 0, 0]);
    });
    assert_eq!(s.regs.vpr[1][0], 0);
    assert_eq!(s.regs.vpr[1][1], 0);
    assert_eq!(s.regs.vco, 0b11);
    assert_eq!(s.regs.gpr[4], 3);
}

#[test]
fn test_element_broadcast_and_logic() {
    let (s, _) = run_with(&[vand(1, 2, 3, 9), vxor(4, 2, 3, 2), brk()], |s| {
        fill(s, 2, [0xFFFF; 8]);
        fill(s, 3, [0, 0x00F0, 2, 3, 4, 5, 6, 7]);
    });
    // e=9 selects lane 1 for every lane
    assert_eq!(s.regs.vpr[1], [0x00F0; 8]);
    // e=2 pairs lanes: 0,0,2,2,...
    assert_eq!(s.regs.vpr[4][1], 0xFFFF);
    assert_eq!(s.regs.vpr[4][3], !2);
}

#[test]
fn test_compare_and_merge() {
    let (s, _) = run_with(&[vlt(1, 2, 3, 0), vmrg(4, 5, 6, 0), brk()], |s| {
        fill(s, 2, [1, 5, 0xFFFF, 0, 0, 0, 0, 0]);
        fill(s, 3, [2, 4, 0, 0, 0, 0, 0, 0]);
        fill(s, 5, [0xAAAA; 8]);
        fill(s, 6, [0x5555; 8]);
    });
    assert_eq!(s.regs.vcc & 0xFF, 0b101);
    assert_eq!(s.regs.vpr[1][0], 1);
    assert_eq!(s.regs.vpr[1][1], 4);
    assert_eq!(s.regs.vpr[4][0], 0xAAAA);
    assert_eq!(s.regs.vpr[4][1], 0x5555);
    assert_eq!(s.regs.vpr[4][2], 0xAAAA);
}

#[test]
fn test_cop2_moves() {
    let (s, _) = run_with(
        &[addiu(1, 0, 0x1234), mtc2(1, 2, 3), mfc2(3, 2, 3), mfc2(4, 2, 15), brk()],
        |s| fill(s, 2, [0xFFFF; 8]),
    );
    // byte 3 starts in the low half of lane 1
    assert_eq!(s.regs.vpr[2][1], 0xFF12);
    assert_eq!(s.regs.vpr[2][2], 0x34FF);
    assert_eq!(s.regs.gpr[3], 0x1234);
    // element 15 wraps to byte 0 for its low half
    assert_eq!(s.regs.gpr[4], 0xFFFF_FFFF);
}

#[test]
fn test_reciprocal_and_high_half() {
    let (s, _) = run_with(&[vrcp(1, 0, 2, 8), vop(vector::VRCPH, 3, 0, 2, 8), brk()], |s| {
        fill(s, 2, [1, 0, 0, 0, 0, 0, 0, 0]);
    });
    assert_eq!(s.regs.vpr[1][0], 0xC000);
    assert_eq!(s.regs.vpr[3][0], 0x7FFF);
    assert_eq!(s.regs.div_dp, 1);
    assert_eq!(s.regs.div_in, 1);
}

#[test]
fn test_quad_load_stops_at_boundary() {
    let (s, _) = run_with(&[addiu(1, 0, 0x104), lqv(2, 0, 0, 1), brk()], |s| {
        for i in 0..32 {
            s.dmem[0x100 + i] = i as u8;
        }
        fill(s, 2, [0xEEEE; 8]);
    });
    // 12 bytes up to the 16-byte boundary, the rest untouched
    assert_eq!(s.regs.vpr[2][0], 0x0405);
    assert_eq!(s.regs.vpr[2][5], 0x0E0F);
    assert_eq!(s.regs.vpr[2][6], 0xEEEE);
    assert_eq!(s.regs.vpr[2][7], 0xEEEE);
}

#[test]
fn test_vector_stores() {
    let (s, _) = run_with(
        &[addiu(1, 0, 0x200), sqv(3, 0, 0, 1), sdv(3, 8, 2, 1), ssv(3, 4, 1, 1), brk()],
        |s| fill(s, 3, [0x0001, 0x0203, 0x0405, 0x0607, 0x0809, 0x0A0B, 0x0C0D, 0x0E0F]),
    );
    let expect: Vec<u8> = (0..16).collect();
    assert_eq!(&s.dmem[0x200..0x202], &expect[..2]);
    assert_eq!(&s.dmem[0x204..0x210], &expect[4..]);
    // sdv: offset 2 * 8, bytes 8..16 of the register
    assert_eq!(&s.dmem[0x210..0x218], &expect[8..]);
    // ssv at 0x202 with element 4 writes register bytes 4 and 5
    assert_eq!(&s.dmem[0x202..0x204], &[4, 5]);
}

#[test]
fn test_interpreter_trait_executes_one_word() {
    let mut state = RspState::boxed();
    state.regs.gpr[2] = 40;
    let mut interp = Reference::new();
    interp.execute(&mut state, Insn(addiu(1, 2, 2)));
    assert_eq!(state.regs.gpr[1], 42);
    // branches are sequenced by the caller
    interp.execute(&mut state, Insn(j(0x100)));
    assert_eq!(state.pc, 0);
}
