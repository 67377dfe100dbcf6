//! Local list scheduling within straight-line sub-blocks.
//!
//! The pass lifts scalar instructions above the vector instructions
//! that precede them, so address arithmetic runs ahead of the vector
//! work that consumes it. Only pairs `can_reorder` approves are
//! swapped; the permuted words are written back to the image once
//! the pass is done.

use rsp_core::Insn;
use tracing::trace;

use crate::analysis::{shape, BranchLabels, Domain, Image, Shape, ShapeFlags};

/// Shortest sub-block worth scheduling, in bytes.
pub const MIN_RANGE: u32 = 0x10;
/// Longest sub-block the scheduler will touch, in bytes.
pub const MAX_RANGE: u32 = 0xA00;
/// Upper bound on bubble passes over one sub-block.
pub const MAX_PASSES: usize = 16;

fn conflicts(write: u32, read: u32, other_write: u32) -> bool {
    write & (read | other_write) != 0
}

fn hazard(a: &Shape, b: &Shape) -> bool {
    if conflicts(a.gpr_write, b.gpr_read, b.gpr_write) || b.gpr_write & a.gpr_read != 0 {
        return true;
    }
    if conflicts(a.vpr_write, b.vpr_read, b.vpr_write) || b.vpr_write & a.vpr_read != 0 {
        return true;
    }
    if a.touches_memory()
        && b.touches_memory()
        && (a.flags | b.flags).contains(ShapeFlags::STORE)
    {
        return true;
    }
    if a.acc_write.intersects(b.acc_read | b.acc_write) || b.acc_write.intersects(a.acc_read) {
        return true;
    }
    let (fr, fw) = (ShapeFlags::FLAGS_READ, ShapeFlags::FLAGS_WRITE);
    if a.flags.contains(fw) && b.flags.intersects(fr | fw) || b.flags.contains(fw) && a.flags.contains(fr)
    {
        return true;
    }
    a.flags.contains(ShapeFlags::DIVIDE) && b.flags.contains(ShapeFlags::DIVIDE)
}

/// Whether `bottom` may execute before `top`, which immediately
/// precedes it, without changing any observable result.
pub fn can_reorder(top: Insn, bottom: Insn) -> bool {
    let a = shape(top);
    let b = shape(bottom);
    let pinned = ShapeFlags::BRANCH | ShapeFlags::OPAQUE | ShapeFlags::UNKNOWN;
    if a.flags.intersects(pinned) || b.flags.intersects(pinned) {
        return false;
    }
    !hazard(&a, &b)
}

fn should_promote(top: Insn, bottom: Insn) -> bool {
    let a = shape(top);
    let b = shape(bottom);
    a.domain == Domain::Vector
        && b.domain == Domain::Scalar
        && !b.flags.contains(ShapeFlags::NOP)
        && can_reorder(top, bottom)
}

/// Length of the prefix before the first run of three no-ops.
fn live_prefix(words: &[u32]) -> usize {
    let mut run = 0;
    for (i, &w) in words.iter().enumerate() {
        if shape(Insn(w)).flags.contains(ShapeFlags::NOP) {
            run += 1;
            if run == 3 {
                return i + 1 - run;
            }
        } else {
            run = 0;
        }
    }
    words.len()
}

/// Schedule the sub-block starting at `start`. Returns the number of
/// swaps performed.
///
/// A sub-block that begins in a delay slot is left alone: the slot
/// word has to stay the one executed with its branch.
pub fn reorder_sub_block(image: &mut Image, labels: &BranchLabels, start: u32) -> usize {
    if start > 0xFF0 || image.op(start).is_branch() {
        return 0;
    }
    if start >= 4 && labels.is_branch_location(start - 4) {
        return 0;
    }
    let end = labels.sub_block_end(start);
    let len = end - start;
    if !(MIN_RANGE..=MAX_RANGE).contains(&len) {
        return 0;
    }

    let mut words = image.range(start, end).to_vec();
    let limit = live_prefix(&words);
    let mut swaps = 0;

    for _ in 0..MAX_PASSES {
        let mut changed = false;
        for i in 1..limit {
            if should_promote(Insn(words[i - 1]), Insn(words[i])) {
                words.swap(i - 1, i);
                changed = true;
                swaps += 1;
            }
        }
        if !changed {
            break;
        }
    }

    if swaps > 0 {
        trace!(start, end, swaps, "rescheduled sub-block");
        image.replace(start, &words);
    }
    swaps
}
