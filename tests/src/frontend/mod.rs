//! Differential tests: every program runs on the reference
//! interpreter and on the recompiler, and the observable state must
//! match afterwards.
//!
//! Programs write each register they use as a constant exactly once,
//! before its first read. Registers seeded by the harness are never
//! targets of an immediate load, so whole-image constant folding
//! cannot see a value the interpreter does not.


use rsp_core::{CompilerConfig, RspState};
use rsp_exec::Recompiler;
use rsp_interp::Reference;

use crate::asm::*;

const CYCLES: u32 = 100_000;

pub(crate) fn prepare(program: &[u32], setup: &dyn Fn(&mut RspState)) -> Box<RspState> {
    let mut state = RspState::boxed();
    state.load_imem(0, program);
    for (i, b) in state.dmem.iter_mut().enumerate() {
        *b = (i as u8).wrapping_mul(31).wrapping_add(7);
    }
    setup(&mut state);
    state
}

pub(crate) fn assert_same_state(expected: &RspState, actual: &RspState, what: &str) {
    assert_eq!(expected.regs.gpr, actual.regs.gpr, "{what}: scalar registers");
    assert_eq!(expected.regs.vpr, actual.regs.vpr, "{what}: vector registers");
    assert_eq!(expected.regs.acc, actual.regs.acc, "{what}: accumulator");
    assert_eq!(
        (expected.regs.vco, expected.regs.vcc, expected.regs.vce),
        (actual.regs.vco, actual.regs.vcc, actual.regs.vce),
        "{what}: flags"
    );
    assert_eq!(
        (expected.regs.div_in, expected.regs.div_out, expected.regs.div_dp),
        (actual.regs.div_in, actual.regs.div_out, actual.regs.div_dp),
        "{what}: divide latches"
    );
    assert!(expected.dmem[..] == actual.dmem[..], "{what}: dmem differs");
    assert_eq!(expected.cop0, actual.cop0, "{what}: cop0");
    assert_eq!(expected.pc, actual.pc, "{what}: pc");
    assert_eq!(expected.halted, actual.halted, "{what}: halted");
}

/// Run `program` under `config` and compare against the interpreter.
fn check_with(
    program: &[u32],
    setup: &dyn Fn(&mut RspState),
    config: CompilerConfig,
    what: &str,
) -> Recompiler {
    let mut expected = prepare(program, setup);
    let executed = Reference::new().run(&mut expected, CYCLES);
    assert_eq!(expected.halted, 1, "{what}: program must halt");

    let mut rec = Recompiler::new(config).unwrap();
    let mut actual = prepare(program, setup);
    let consumed = rec.run(&mut actual, CYCLES).unwrap();

    assert_same_state(&expected, &actual, what);
    assert_eq!(executed, consumed, "{what}: cycles");
    rec
}

/// Compare under the default configuration and with every
/// instruction trapped. Returns the default-configured recompiler.
fn check(program: &[u32], setup: impl Fn(&mut RspState)) -> Recompiler {
    check_with(program, &setup, CompilerConfig::trap_only(), "trap only");
    check_with(program, &setup, CompilerConfig::default(), "default")
}

fn fill(state: &mut RspState, reg: usize, lanes: [u16; 8]) {
    state.regs.vpr[reg] = lanes;
}

/// Operands with sign boundaries and carries in every lane.
fn vector_operands(state: &mut RspState) {
    fill(state, 2, [0x7FFF, 0x8000, 0xFFFF, 0x0001, 0x1234, 0xC000, 0x0000, 0x4000]);
    fill(state, 3, [0x8000, 0x8000, 0x7FFF, 0xFFFF, 0x5678, 0x3FFF, 0x1111, 0x4000]);
    fill(state, 20, [0xAAAA, 0x5555, 0, 0xFFFF, 3, 0x8001, 0x7FFE, 9]);
    for i in 0..8 {
        state.regs.set_acc(i, (i as i64 - 4) * 0x1_2345_6789);
    }
}

// -- Scalar --

#[test]
fn test_alu_constant_and_variable_operands() {
    let program = [
        addiu(1, 0, 100),
        lui(2, 0xFFFF),
        addu(3, 1, 10),
        subu(4, 10, 1),
        and(5, 10, 2),
        or(6, 1, 11),
        xor(7, 10, 11),
        nor(8, 1, 10),
        slt(9, 10, 1),
        sltu(12, 10, 1),
        sll(13, 10, 4),
        srl(14, 10, 31),
        sra(15, 10, 3),
        sllv(16, 10, 11),
        srav(17, 10, 11),
        slti(18, 10, -1),
        sltiu(19, 1, 200),
        andi(20, 10, 0xFF),
        ori(21, 10, 0xF0F0),
        xori(22, 1, 0xFFFF),
        addiu(23, 10, -1),
        addi(24, 1, 5),
        addu(25, 1, 2),
        addu(0, 1, 10),
        sra(26, 2, 31),
        brk(),
    ];
    let rec = check(&program, |s| {
        s.regs.gpr[10] = 0x8000_0001;
        s.regs.gpr[11] = 7;
    });
    assert_eq!(rec.stats().blocks_compiled, 1);
    assert_eq!(rec.stats().insns_compiled, program.len() as u64);
}

#[test]
fn test_shift_by_register_masks_amount() {
    check(&[sllv(1, 10, 11), srav(2, 10, 11), brk()], |s| {
        s.regs.gpr[10] = 0x8000_00F0;
        s.regs.gpr[11] = 0x23;
    });
}

#[test]
fn test_loads_and_stores_at_constant_addresses() {
    let program = [
        addiu(1, 0, 0x100),
        addiu(9, 0, 0xFFE),
        lw(2, 0, 1),
        lh(3, 2, 1),
        lhu(4, 6, 1),
        lb(5, 1, 1),
        lbu(6, 3, 1),
        sw(2, 0x10, 1),
        sh(3, 0x20, 1),
        sb(5, 0x31, 1),
        // misaligned
        lw(7, 1, 1),
        sh(2, 0x43, 1),
        // wraps at the end of DMEM
        lw(8, 0, 9),
        sw(2, 0, 9),
        lhu(10, 1, 9),
        brk(),
    ];
    check(&program, |_| {});
}

#[test]
fn test_loads_and_stores_at_variable_addresses() {
    let program = [
        lw(1, 0, 20),
        sw(1, 4, 20),
        lhu(2, 0, 21),
        sh(1, 2, 21),
        lb(3, -1, 20),
        lh(4, 0, 22),
        sw(4, 8, 22),
        sb(3, 0, 21),
        brk(),
    ];
    check(&program, |s| {
        s.regs.gpr[20] = 0x203;
        s.regs.gpr[21] = 0x1FFD;
        s.regs.gpr[22] = 0x300;
    });
}

#[test]
fn test_aligned_scalar_fast_path() {
    let config = CompilerConfig {
        align_gpr: true,
        ..Default::default()
    };
    let program = [lw(1, 0, 20), sw(1, 4, 20), lhu(2, 2, 20), sh(2, 8, 20), brk()];
    check_with(&program, &|s: &mut RspState| s.regs.gpr[20] = 0x400, config, "align_gpr");
}

// -- Control flow --

#[test]
fn test_counted_loop() {
    let program = [
        addiu(2, 0, 5),   // 0x00
        addiu(1, 1, 1),   // 0x04 loop
        bne(1, 2, -2),    // 0x08 -> 0x04
        addiu(3, 3, 1),   // 0x0c delay slot
        brk(),            // 0x10
    ];
    let rec = check(&program, |_| {});
    let checksum = rsp_core::image_checksum(&prepare(&program, &|_| {}).imem);
    let table = rec.jump_table(checksum).unwrap();
    // block start plus the loop head
    assert!(table.contains(0x00) && table.contains(0x04));
    assert!(rec.stats().fixups_linked >= 1);
}

#[test]
fn test_cyclic_blocks_link() {
    let program = [
        addiu(2, 0, 3),   // 0x00
        j(0x10),          // 0x04 A -> B
        nop(),
        brk(),            // 0x0c
        addiu(1, 1, 1),   // 0x10 B
        j(0x20),          // 0x14 B -> C
        nop(),
        nop(),
        bne(1, 2, -8),    // 0x20 C -> A
        nop(),
        j(0x0c),          // 0x28
        nop(),
    ];
    let rec = check(&program, |_| {});
    let checksum = rsp_core::image_checksum(&prepare(&program, &|_| {}).imem);
    let table = rec.jump_table(checksum).unwrap();

    let entries: Vec<usize> = [0x04, 0x0c, 0x10, 0x20]
        .iter()
        .map(|&pc| table.lookup(pc).unwrap())
        .collect();
    for (i, a) in entries.iter().enumerate() {
        assert!(entries[i + 1..].iter().all(|b| b != a), "shared entry {a:#x}");
    }
    assert!(rec.stats().fixups_linked >= 3);
}

#[test]
fn test_delay_slot_writes_branch_operand() {
    let program = [
        addiu(2, 0, 10),  // 0x00
        bne(1, 2, -1),    // 0x04 -> 0x04
        addiu(1, 1, 2),   // 0x08 changes r1 after the compare
        brk(),            // 0x0c
    ];
    check(&program, |_| {});
}

#[test]
fn test_signed_branches() {
    let program = [
        blez(10, 2),      // 0x00 -> 0x0c, taken (r10 < 0)
        addiu(1, 1, 1),
        addiu(2, 2, 1),   // skipped
        bgtz(10, 2),      // 0x0c not taken
        addiu(3, 3, 1),
        bltz(10, 2),      // 0x14 -> 0x20 taken
        addiu(4, 4, 1),
        addiu(5, 5, 1),   // skipped
        bgtz(11, 2),      // 0x20 -> 0x2c taken
        nop(),
        addiu(6, 6, 1),   // skipped
        blez(0, 2),       // 0x2c -> 0x38 taken
        nop(),
        addiu(7, 7, 1),   // skipped
        brk(),            // 0x38
    ];
    check(&program, |s| {
        s.regs.gpr[10] = 0xFFFF_FFF0;
        s.regs.gpr[11] = 3;
    });
}

#[test]
fn test_link_and_return() {
    let program = [
        bgezal(0, 3),     // 0x00 -> 0x10
        nop(),
        addiu(5, 5, 1),   // 0x08 return point
        brk(),            // 0x0c
        addiu(6, 6, 2),   // 0x10
        jr(31),
        nop(),
    ];
    check(&program, |_| {});
}

#[test]
fn test_subroutine_called_twice() {
    let mut program = vec![nop(); 0x13];
    program[0x00] = jal(0x40);
    program[0x01] = addiu(4, 4, 1);
    program[0x02] = jal(0x40);
    program[0x03] = addiu(4, 4, 1);
    program[0x04] = brk();
    program[0x10] = addiu(5, 5, 3);
    program[0x11] = jr(31);
    check(&program, |_| {});
}

#[test]
fn test_jalr_to_computed_target() {
    let program = [
        addiu(8, 0, 0x14),  // 0x00
        jalr(9, 8),         // 0x04 -> 0x14, r9 = 0x0c
        addiu(1, 1, 1),     // 0x08 delay slot
        addiu(2, 2, 1),     // 0x0c return point
        brk(),              // 0x10
        addiu(3, 3, 1),     // 0x14
        jr(9),              // 0x18
        nop(),
    ];
    check(&program, |_| {});
}

#[test]
fn test_break_in_delay_slot() {
    let program = [j(0x10), brk(), addiu(1, 1, 1), addiu(2, 2, 1), brk()];
    check(&program, |_| {});
}

#[test]
fn test_branch_in_delay_slot_is_skipped() {
    let program = [
        j(0x10),            // 0x00
        j(0x18),            // 0x04 ignored
        addiu(1, 1, 1),
        addiu(2, 2, 1),
        addiu(3, 3, 1),     // 0x10
        brk(),
        addiu(4, 4, 1),     // 0x18
        brk(),
    ];
    check(&program, |_| {});
}

#[test]
fn test_execution_wraps_at_image_end() {
    let mut program = vec![nop(); 0x400];
    program[0] = brk();
    program[0x3FE] = addiu(1, 1, 1);
    program[0x3FF] = addiu(2, 2, 1);
    check(&program, |s| s.pc = 0xFF8);
}

#[test]
fn test_mtc0_halts_mid_block() {
    let program = [addiu(1, 0, 2), mtc0(1, 4), addiu(2, 2, 1), brk()];
    check(&program, |_| {});
}

#[test]
fn test_mtc0_halt_keeps_earlier_vector_writes() {
    let program = [
        addiu(1, 0, 2),
        vmudh(1, 2, 3, 0),
        mtc0(1, 4),         // halts here
        vmudh(1, 20, 20, 0),
        brk(),
    ];
    check(&program, vector_operands);
}

#[test]
fn test_mtc0_halts_in_delay_slot() {
    let program = [
        addiu(1, 0, 2),
        beq(0, 0, 2),       // 0x04 -> 0x10
        mtc0(1, 4),
        addiu(2, 2, 1),
        brk(),              // 0x10
    ];
    check(&program, |_| {});
}

#[test]
fn test_cop0_moves() {
    let program = [
        mfc0(1, 7),
        mfc0(2, 7),
        addiu(3, 0, 0x40),
        mtc0(3, 0),
        mfc0(4, 0),
        mtc0(0, 7),
        brk(),
    ];
    check(&program, |_| {});
}

// -- Vector compute --

#[test]
fn test_multiply_writes_elided() {
    let program = [
        vmulf(4, 2, 3, 0),  // overwritten in full before any read
        vmudh(1, 2, 3, 0),
        vmacf(1, 2, 3, 0),
        vsar(5, 9),
        vand(4, 2, 3, 0),
        vmudh(6, 2, 3, 0),
        brk(),
    ];
    let rec = check(&program, vector_operands);
    let stats = rec.stats();
    assert!(stats.accum_writes_elided >= 2, "{stats:?}");
    assert!(stats.dest_writes_elided >= 1, "{stats:?}");
    assert!(stats.simd_paths >= 1, "{stats:?}");
}

#[test]
fn test_multiply_forms_on_simd_and_lane_paths() {
    let program = [
        vmudl(8, 2, 3, 0),
        vmudm(9, 2, 3, 10),
        vmudn(10, 2, 3, 0),
        vmudh(11, 2, 3, 15),
        vmulf(12, 2, 3, 1),
        vmudm(13, 3, 2, 0),
        vmulu(14, 2, 3, 4),
        vmadl(15, 2, 3, 0),
        vmadm(16, 2, 3, 0),
        vmadn(17, 2, 3, 0),
        vmadh(18, 2, 3, 0),
        vmacu(19, 2, 3, 0),
        // destination doubles as the shuffled operand
        vmacf(3, 2, 3, 12),
        brk(),
    ];
    let rec = check(&program, vector_operands);
    assert!(rec.stats().simd_paths >= 5);
}

#[test]
fn test_multiply_accumulate_saturation() {
    let program = [vmadh(1, 2, 3, 0), vmadh(1, 2, 3, 0), vmadn(4, 2, 3, 0), vmacu(5, 2, 3, 8), brk()];
    check(&program, |s| {
        fill(s, 2, [0x7FFF; 8]);
        fill(s, 3, [0x7FFF, 0x8000, 0x7FFF, 0x8000, 1, 0xFFFF, 0x4000, 0xC000]);
        for i in 0..8 {
            s.regs.set_acc(i, 0x7FFF_0000_0000 - i as i64);
        }
    });
}

#[test]
fn test_add_subtract_with_and_without_carry() {
    let program = [
        addiu(1, 0, 0x00F0),
        ctc2(1, 0),
        vadd(4, 2, 3, 0),
        vaddc(5, 2, 3, 0),
        vsub(6, 2, 3, 8),
        vlt(7, 2, 3, 0),
        vadd(8, 2, 3, 0),
        vsub(9, 2, 3, 0),
        vmrg(10, 2, 20, 0),
        cfc2(11, 0),
        cfc2(12, 1),
        brk(),
    ];
    let rec = check(&program, vector_operands);
    assert!(rec.stats().simd_paths >= 1);
}

#[test]
fn test_subtract_with_borrow() {
    let program = [vsub(1, 20, 2, 0), vaddc(2, 20, 3, 0), vsub(4, 2, 20, 3), vadd(5, 4, 2, 11), brk()];
    check(&program, vector_operands);
}

#[test]
fn test_logical_ops_and_broadcast() {
    let program = [
        vand(4, 2, 3, 9),
        vor(5, 2, 3, 0),
        vxor(6, 2, 3, 5),
        vnor(7, 2, 3, 0),
        vnand(8, 2, 20, 8),
        vnxor(9, 20, 3, 2),
        // destination aliases the broadcast operand
        vxor(3, 2, 3, 14),
        brk(),
    ];
    check(&program, vector_operands);
}

#[test]
fn test_compare_clip_and_merge() {
    let program = [
        vch(4, 2, 3, 0),
        vcl(5, 2, 20, 0),
        veq(6, 2, 3, 0),
        vne(7, 2, 20, 0),
        vge(8, 20, 3, 0),
        vcr(9, 2, 3, 0),
        vmrg(10, 2, 3, 0),
        vabs(11, 2, 3, 0),
        cfc2(12, 2),
        brk(),
    ];
    check(&program, vector_operands);
}

#[test]
fn test_vmov_and_vsar() {
    let program = [
        vmov(4, 3, 2, 12),
        vmudh(5, 2, 3, 0),
        vmadm(5, 2, 3, 0),
        vsar(6, 8),
        vsar(7, 9),
        vsar(8, 10),
        vsar(9, 3),
        brk(),
    ];
    check(&program, vector_operands);
}

#[test]
fn test_reciprocal_sequence() {
    let program = [
        vrcp(4, 0, 2, 11),
        vop(rsp_core::opcode::vector::VRCPH, 4, 1, 2, 12),
        vop(rsp_core::opcode::vector::VRCPL, 4, 2, 3, 13),
        vop(rsp_core::opcode::vector::VRSQ, 5, 0, 20, 8),
        brk(),
    ];
    check(&program, vector_operands);
}

#[test]
fn test_cop2_moves() {
    let program = [
        addiu(1, 0, 0x1357),
        mtc2(1, 4, 0),
        mtc2(1, 4, 5),
        mtc2(1, 4, 15),
        mfc2(2, 2, 1),
        mfc2(3, 20, 14),
        mfc2(4, 3, 15),
        ctc2(1, 1),
        ctc2(1, 2),
        cfc2(5, 1),
        cfc2(6, 2),
        brk(),
    ];
    check(&program, vector_operands);
}

#[test]
fn test_rounding_ops_do_nothing() {
    let program = [
        vop(rsp_core::opcode::vector::VRNDP, 4, 2, 3, 0),
        vop(rsp_core::opcode::vector::VMULQ, 5, 2, 3, 0),
        vop(rsp_core::opcode::vector::VNOP, 0, 0, 0, 0),
        brk(),
    ];
    check(&program, vector_operands);
}

// -- Vector memory --

#[test]
fn test_vector_loads() {
    let program = [
        addiu(1, 0, 0x200),
        lqv(4, 0, 1, 1),
        ldv(5, 8, 1, 1),
        llv(6, 4, 3, 1),
        lsv(7, 14, 2, 1),
        lqv(8, 0, 0, 10),
        ldv(9, 3, 0, 10),
        lpv(11, 0, 1, 1),
        lqv(12, 6, 0, 1),
        brk(),
    ];
    check(&program, |s| {
        vector_operands(s);
        s.regs.gpr[10] = 0x305;
    });
}

#[test]
fn test_vector_stores() {
    let program = [
        addiu(1, 0, 0x200),
        sqv(2, 0, 1, 1),
        sdv(3, 8, 3, 1),
        slv(20, 4, 9, 1),
        ssv(2, 6, 20, 1),
        sqv(3, 0, 0, 10),
        sdv(20, 1, 0, 10),
        stv(16, 2, 4, 1),
        brk(),
    ];
    check(&program, |s| {
        vector_operands(s);
        s.regs.gpr[10] = 0x30B;
    });
}

#[test]
fn test_vector_access_wraps_dmem() {
    let program = [lqv(4, 0, 0, 10), sdv(2, 0, 0, 10), ldv(5, 0, 0, 10), brk()];
    check(&program, |s| {
        vector_operands(s);
        s.regs.gpr[10] = 0xFFC;
    });
}

#[test]
fn test_aligned_vector_fast_path() {
    let config = CompilerConfig {
        align_vector: true,
        ..Default::default()
    };
    let program = [lqv(4, 0, 0, 10), sqv(2, 0, 1, 10), ldv(5, 8, 2, 10), sdv(5, 0, 3, 10), brk()];
    check_with(
        &program,
        &|s: &mut RspState| {
            vector_operands(s);
            s.regs.gpr[10] = 0x400;
        },
        config,
        "align_vector",
    );
}

// -- Budgets --

#[test]
fn test_run_resumes_across_budgets() {
    let program = [
        addiu(2, 0, 200),  // 0x00
        addiu(1, 1, 1),    // 0x04
        vadd(4, 4, 2, 0),
        bne(1, 2, -3),     // 0x0c -> 0x04
        addiu(3, 3, 1),
        brk(),
    ];
    let setup = |s: &mut RspState| vector_operands(s);
    let mut expected = prepare(&program, &setup);
    let executed = Reference::new().run(&mut expected, CYCLES);

    let mut rec = Recompiler::new(CompilerConfig::default()).unwrap();
    let mut actual = prepare(&program, &setup);
    let mut total = 0;
    let mut runs = 0;
    while actual.halted == 0 {
        let consumed = rec.run(&mut actual, 17).unwrap();
        assert!(consumed >= 17 || actual.halted != 0);
        total += consumed;
        runs += 1;
    }
    assert!(runs > 10);
    assert_eq!(total, executed);
    assert_same_state(&expected, &actual, "resumed");
}

#[test]
fn test_budget_limits_infinite_loop() {
    let mut rec = Recompiler::new(CompilerConfig::default()).unwrap();
    let mut state = prepare(&[addiu(1, 1, 1), j(0), nop()], &|_| {});
    let consumed = rec.run(&mut state, 1000).unwrap();
    assert_eq!(state.halted, 0);
    assert!(consumed >= 1000);
    assert_eq!(state.regs.gpr[1] * 3, consumed);
}
