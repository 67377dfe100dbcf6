mod jump_table;

use rsp_core::insn::{branch_target, jump_target, select_lane};
use rsp_core::{classify, Insn, OpClass, Opcode};

use crate::asm::*;

fn decode(word: u32) -> Opcode {
    Opcode::decode(Insn(word))
}

#[test]
fn test_scalar_decoding() {
    assert_eq!(decode(addiu(1, 2, -4)), Opcode::Addiu);
    assert_eq!(decode(lui(3, 0x1234)), Opcode::Lui);
    assert_eq!(decode(subu(1, 2, 3)), Opcode::Subu);
    assert_eq!(decode(sra(1, 2, 3)), Opcode::Sra);
    assert_eq!(decode(lhu(4, 2, 5)), Opcode::Lhu);
    assert_eq!(decode(sw(4, -8, 5)), Opcode::Sw);
    assert_eq!(decode(brk()), Opcode::Break);
    // sll r0, r0, 0
    assert_eq!(decode(nop()), Opcode::Sll);
}

#[test]
fn test_branch_classification() {
    for word in [beq(1, 2, 3), bne(1, 0, -1), bltz(4, 2), bgezal(4, 2), j(0x40), jal(0x40), jr(31)] {
        assert!(decode(word).is_branch(), "{word:#010x}");
    }
    assert!(decode(bgezal(1, 1)).is_conditional_branch());
    assert!(!decode(j(0)).is_conditional_branch());
    assert!(decode(jalr(31, 4)).is_indirect());
    assert!(!decode(brk()).is_branch());
}

#[test]
fn test_cop_decoding() {
    assert_eq!(decode(mfc0(1, 4)), Opcode::Mfc0);
    assert_eq!(decode(mtc0(1, 4)), Opcode::Mtc0);
    assert_eq!(decode(mfc2(1, 2, 4)), Opcode::Mfc2);
    assert_eq!(decode(ctc2(1, 0)), Opcode::Ctc2);
    assert_eq!(decode(vmacf(1, 2, 3, 0)), Opcode::Vmacf);
    assert_eq!(decode(vmrg(1, 2, 3, 8)), Opcode::Vmrg);
    assert_eq!(decode(vsar(1, 9)), Opcode::Vsar);
    assert_eq!(decode(lqv(1, 0, 2, 3)), Opcode::Lqv);
    assert_eq!(decode(stv(8, 2, 0, 3)), Opcode::Stv);
}

#[test]
fn test_classify_keys() {
    assert_eq!(classify(Insn(addiu(1, 0, 1))), (OpClass::Main, 0x09));
    assert_eq!(classify(Insn(jr(31))), (OpClass::Special, 0x08));
    assert_eq!(classify(Insn(bltz(1, 0))), (OpClass::RegImm, 0x00));
    assert_eq!(classify(Insn(vxor(1, 2, 3, 0))), (OpClass::Vector, 0x2C));
    assert_eq!(classify(Insn(cfc2(1, 1))), (OpClass::Cop2, 0x02));
    assert_eq!(classify(Insn(sdv(1, 0, 0, 0))), (OpClass::Sc2, 0x03));
}

#[test]
fn test_unknown_encodings() {
    assert_eq!(decode(0xFFFF_FFFF), Opcode::Unknown);
    // primary opcode 0x3F is unassigned
    assert_eq!(decode(0xFC00_0000), Opcode::Unknown);
    assert_eq!(decode(vop(0x3F, 0, 0, 0, 0)), Opcode::Unknown);
}

#[test]
fn test_field_views() {
    let insn = Insn(vmudh(5, 6, 7, 9));
    assert_eq!(insn.vd(), 5);
    assert_eq!(insn.vs(), 6);
    assert_eq!(insn.vt(), 7);
    assert_eq!(insn.element(), 9);

    let insn = Insn(lqv(3, 8, -2, 4));
    assert_eq!(insn.base(), 4);
    assert_eq!(insn.vt(), 3);
    assert_eq!(insn.del(), 8);
    assert_eq!(insn.voffset(), -2);
}

#[test]
fn test_branch_targets_wrap() {
    // beq at 0xFFC with offset +1 lands past the delay slot, at 4
    assert_eq!(branch_target(0xFFC, Insn(beq(0, 0, 1))), 0x004);
    assert_eq!(branch_target(0x010, Insn(bne(1, 2, -5))), 0x000);
    assert_eq!(jump_target(Insn(j(0x1230))), 0x230);
}

#[test]
fn test_element_broadcast() {
    // e=8..15 selects a single lane
    for lane in 0..8 {
        assert_eq!(select_lane(10, lane), 2);
    }
    // quarter selectors repeat within each group of four
    assert_eq!(select_lane(5, 6), 5);
}
