use proptest::prelude::*;
use rsp_core::{Insn, RspState};
use rsp_frontend::analysis::{build_branch_labels, Image};
use rsp_frontend::reorder::{can_reorder, reorder_sub_block};
use rsp_interp::Reference;

use crate::asm::*;

/// Close a straight-line body with a jump so the body forms one
/// bounded sub-block, then BREAK at the jump target.
fn bounded(body: &[u32]) -> Vec<u32> {
    let mut words = body.to_vec();
    let target = (body.len() as u32 + 2) * 4;
    words.extend([j(target), nop(), brk()]);
    words
}

fn schedule(words: &[u32]) -> (Vec<u32>, usize) {
    let mut image = Image::from_words(words);
    let labels = build_branch_labels(&image);
    let swaps = reorder_sub_block(&mut image, &labels, 0);
    (image.range(0, words.len() as u32 * 4).to_vec(), swaps)
}

#[test]
fn test_scalar_lifted_above_vector() {
    let body = [vmudh(1, 2, 3, 0), addiu(4, 0, 1), vadd(5, 6, 7, 0), addiu(8, 0, 2)];
    let (words, swaps) = schedule(&bounded(&body));
    assert_eq!(swaps, 3);
    assert_eq!(&words[..4], &[addiu(4, 0, 1), addiu(8, 0, 2), vmudh(1, 2, 3, 0), vadd(5, 6, 7, 0)]);
}

#[test]
fn test_memory_order_kept() {
    let body = [sqv(1, 0, 0, 0), lw(4, 0, 0), vadd(5, 6, 7, 0), vadd(8, 6, 7, 0)];
    let (words, swaps) = schedule(&bounded(&body));
    assert_eq!(swaps, 0);
    assert_eq!(&words[..4], &body);
}

#[test]
fn test_short_range_untouched() {
    let body = [vmudh(1, 2, 3, 0), addiu(4, 0, 1)];
    let (_, swaps) = schedule(&bounded(&body));
    assert_eq!(swaps, 0);
}

#[test]
fn test_stops_at_nop_run() {
    let body = [vmudh(1, 2, 3, 0), nop(), nop(), nop(), addiu(4, 0, 1)];
    let (words, swaps) = schedule(&bounded(&body));
    assert_eq!(swaps, 0);
    assert_eq!(&words[..5], &body);
}

#[test]
fn test_delay_slot_start_untouched() {
    let program = [
        beq(1, 0, 6), // 0x00 -> 0x1c
        vmudh(1, 2, 3, 0),
        addiu(4, 0, 1),
        vadd(5, 6, 7, 0),
        addiu(8, 0, 2),
        j(0x1c),
        nop(),
        brk(),
    ];
    let mut image = Image::from_words(&program);
    let labels = build_branch_labels(&image);
    assert_eq!(reorder_sub_block(&mut image, &labels, 4), 0);
}

#[test]
fn test_pinned_instructions() {
    assert!(!can_reorder(Insn(beq(1, 2, 3)), Insn(addiu(4, 0, 1))));
    assert!(!can_reorder(Insn(vadd(1, 2, 3, 0)), Insn(mtc0(4, 7))));
    assert!(!can_reorder(Insn(brk()), Insn(vadd(1, 2, 3, 0))));
    assert!(!can_reorder(Insn(0xFFFF_FFFF), Insn(addiu(4, 0, 1))));
}

#[test]
fn test_vector_resource_hazards() {
    // accumulator chain
    assert!(!can_reorder(Insn(vmudh(1, 2, 3, 0)), Insn(vmacf(4, 5, 6, 0))));
    // carry produced then consumed
    assert!(!can_reorder(Insn(vaddc(1, 2, 3, 0)), Insn(vadd(4, 5, 6, 0))));
    // two divides share the latches
    assert!(!can_reorder(Insn(vrcp(1, 0, 2, 8)), Insn(vrcp(3, 1, 4, 8))));
    assert!(can_reorder(Insn(vand(1, 2, 3, 0)), Insn(addiu(4, 0, 1))));
}

fn gpr() -> impl Strategy<Value = u32> {
    1u32..8
}

fn vpr() -> impl Strategy<Value = u32> {
    0u32..8
}

fn insn_strategy() -> impl Strategy<Value = u32> {
    prop_oneof![
        (gpr(), gpr(), any::<i16>()).prop_map(|(t, s, i)| addiu(t, s, i)),
        (gpr(), gpr(), gpr()).prop_map(|(d, s, t)| xor(d, s, t)),
        (gpr(), gpr(), 0u32..32).prop_map(|(d, t, sa)| sll(d, t, sa)),
        (gpr(), 0i16..64).prop_map(|(t, o)| lw(t, o * 4, 0)),
        (gpr(), 0i16..64).prop_map(|(t, o)| sw(t, o * 4, 0)),
        (vpr(), vpr(), vpr(), 0u32..16).prop_map(|(d, s, t, e)| vmudh(d, s, t, e)),
        (vpr(), vpr(), vpr(), 0u32..16).prop_map(|(d, s, t, e)| vmacf(d, s, t, e)),
        (vpr(), vpr(), vpr()).prop_map(|(d, s, t)| vadd(d, s, t, 0)),
        (vpr(), vpr(), vpr()).prop_map(|(d, s, t)| vaddc(d, s, t, 0)),
        (vpr(), vpr(), vpr()).prop_map(|(d, s, t)| vand(d, s, t, 0)),
        (vpr(), 0i8..8).prop_map(|(t, o)| lqv(t, 0, o, 0)),
        (vpr(), 0i8..8).prop_map(|(t, o)| sqv(t, 0, o, 0)),
        (gpr(), vpr(), 0u32..8).prop_map(|(t, v, e)| mfc2(t, v, e * 2)),
    ]
}

fn seeded(words: &[u32], gprs: &[u32; 8], lanes: &[u16; 8]) -> Box<RspState> {
    let mut state = RspState::boxed();
    state.load_imem(0, words);
    for (r, &v) in gprs.iter().enumerate().skip(1) {
        state.regs.gpr[r] = v;
    }
    for r in 0..8 {
        for (l, &v) in lanes.iter().enumerate() {
            state.regs.vpr[r][l] = v.wrapping_mul(r as u16 + 1);
        }
    }
    for (i, b) in state.dmem.iter_mut().enumerate() {
        *b = (i * 7) as u8;
    }
    state
}

proptest! {
    #[test]
    fn prop_can_reorder_is_symmetric(a in insn_strategy(), b in insn_strategy()) {
        prop_assert_eq!(can_reorder(Insn(a), Insn(b)), can_reorder(Insn(b), Insn(a)));
    }

    #[test]
    fn prop_reader_never_passes_writer(t in gpr(), d in gpr(), imm in any::<i16>()) {
        prop_assert!(!can_reorder(Insn(addiu(t, 0, imm)), Insn(addu(d, t, 0))));
    }

    #[test]
    fn prop_schedule_preserves_results(
        body in prop::collection::vec(insn_strategy(), 4..24),
        gprs in prop::array::uniform8(any::<u32>()),
        lanes in prop::array::uniform8(any::<u16>()),
    ) {
        let program = bounded(&body);
        let (scheduled, _) = schedule(&program);

        let mut expected = seeded(&program, &gprs, &lanes);
        let mut actual = seeded(&scheduled, &gprs, &lanes);
        let n = Reference::new().run(&mut expected, 1000);
        let m = Reference::new().run(&mut actual, 1000);

        prop_assert_eq!(n, m);
        prop_assert_eq!(&expected.regs, &actual.regs);
        prop_assert_eq!(&expected.dmem[..], &actual.dmem[..]);
        prop_assert_eq!(expected.pc, actual.pc);
        prop_assert_eq!(expected.halted, 1);
    }
}
