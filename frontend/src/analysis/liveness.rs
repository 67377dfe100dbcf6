//! Forward and backward walks over the image answering "is this
//! value ever observed". A walk that reaches something it cannot
//! follow answers "yes".

use rsp_core::insn::{branch_target, jump_target};
use rsp_core::{Insn, Opcode};
use tracing::warn;

use super::labels::BranchLabels;
use super::shape::{shape, AccSlices, Shape, ShapeFlags};
use super::Image;

/// Instructions a forward walk may visit before giving up.
const MAX_WALK: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Live,
    Dead,
    /// Nested walk reached a second conditional branch.
    HitBranch,
}

/// Per-instruction verdict of a forward walk. `Some(true)`: the
/// tracked value is observed; `Some(false)`: it is fully replaced
/// before any use; `None`: keep walking.
trait Rule: Clone {
    fn visit(&mut self, insn: Insn, shape: &Shape) -> Option<bool>;
}

#[derive(Clone)]
struct AccRule {
    pending: AccSlices,
}

impl Rule for AccRule {
    fn visit(&mut self, _insn: Insn, shape: &Shape) -> Option<bool> {
        if shape.acc_read.intersects(self.pending) {
            return Some(true);
        }
        self.pending.remove(shape.acc_write);
        self.pending.is_empty().then_some(false)
    }
}

#[derive(Clone)]
struct DestRule {
    mask: u32,
}

impl Rule for DestRule {
    fn visit(&mut self, _insn: Insn, shape: &Shape) -> Option<bool> {
        if shape.vpr_read & self.mask != 0 {
            return Some(true);
        }
        if shape.vpr_write & self.mask != 0 {
            return Some(!shape.full_vpr_write);
        }
        None
    }
}

enum Pending {
    Jump(u32),
    Conditional(u32),
    Indirect,
}

/// Walk forward starting at `pc` (inclusive).
fn walk<R: Rule>(image: &Image, mut pc: u32, mut rule: R, nested: bool) -> Outcome {
    let mut pending: Option<Pending> = None;

    for _ in 0..MAX_WALK {
        if pc >= 0x1000 {
            return Outcome::Live;
        }
        let insn = image.word(pc);
        let op = Opcode::decode(insn);
        let s = shape(insn);

        if s.flags.contains(ShapeFlags::UNKNOWN) {
            warn!(pc, word = insn.raw(), "unknown instruction in liveness walk");
            return Outcome::Live;
        }
        if s.is_branch() {
            if pending.is_some() {
                return Outcome::Live;
            }
            pending = Some(match op {
                Opcode::J | Opcode::Jal => Pending::Jump(jump_target(insn)),
                Opcode::Jr | Opcode::Jalr => Pending::Indirect,
                _ => Pending::Conditional(branch_target(pc, insn)),
            });
            pc += 4;
            continue;
        }
        // BREAK and COP0 moves may stop the core before anything
        // later runs.
        if s.flags.contains(ShapeFlags::OPAQUE) {
            return Outcome::Live;
        }
        if let Some(observed) = rule.visit(insn, &s) {
            return if observed { Outcome::Live } else { Outcome::Dead };
        }

        match pending.take() {
            None => pc += 4,
            Some(Pending::Jump(target)) => pc = target,
            Some(Pending::Indirect) => return Outcome::Live,
            Some(Pending::Conditional(_)) if nested => return Outcome::HitBranch,
            Some(Pending::Conditional(target)) => {
                let taken = walk(image, target, rule.clone(), true);
                let fallthrough = walk(image, pc + 4, rule, true);
                return if taken == Outcome::Dead && fallthrough == Outcome::Dead {
                    Outcome::Dead
                } else {
                    Outcome::Live
                };
            }
        }
    }
    Outcome::Live
}

/// Whether any of `slices` of the accumulator may be read after the
/// instruction at `pc` writes it.
pub fn will_accumulator_be_read(image: &Image, slices: AccSlices, pc: u32) -> bool {
    let rule = AccRule { pending: slices };
    walk(image, pc + 4, rule, false) != Outcome::Dead
}

/// Whether vector register `reg`, written at `pc`, is replaced in
/// full before any instruction reads it.
pub fn will_vector_dest_be_overwritten(image: &Image, reg: usize, pc: u32) -> bool {
    let rule = DestRule { mask: 1 << reg };
    walk(image, pc + 4, rule, false) == Outcome::Dead
}

/// Whether VCO may be non-zero when the instruction at `pc` runs.
///
/// Walks backward through straight-line code looking for the last
/// instruction that defines VCO. Any point where control can enter
/// from elsewhere (a label, a compiled entry, a branch or the start
/// of the image) ends the walk with "maybe".
pub fn are_flags_used(
    image: &Image,
    labels: &BranchLabels,
    pc: u32,
    is_entry: impl Fn(u32) -> bool,
) -> bool {
    if labels.is_label(pc) || is_entry(pc) {
        return true;
    }
    let mut at = pc;
    while at > 0 {
        at -= 4;
        let insn = image.word(at);
        let op = Opcode::decode(insn);
        match op {
            op if op.is_branch() => return true,
            Opcode::Vadd
            | Opcode::Vsub
            | Opcode::Vlt
            | Opcode::Veq
            | Opcode::Vne
            | Opcode::Vge
            | Opcode::Vcl
            | Opcode::Vcr => return false,
            Opcode::Vaddc | Opcode::Vsubc | Opcode::Vch => return true,
            Opcode::Ctc2 if insn.rd() & 3 == 0 => return true,
            Opcode::Unknown if insn != Insn::FILL => {
                warn!(pc = at, word = insn.raw(), "unknown instruction in flag walk");
                return true;
            }
            _ => {}
        }
        if labels.is_label(at) || is_entry(at) {
            return true;
        }
    }
    true
}

/// Whether the delay slot instruction can change the outcome of the
/// branch before it, or can stop the core while the branch is in
/// flight. Either way the branch condition has to be latched before
/// the delay slot runs.
pub fn delay_slot_affects_branch(branch: Insn, delay: Insn) -> bool {
    let b = shape(branch);
    let d = shape(delay);
    if d.flags.contains(ShapeFlags::OPAQUE) {
        return true;
    }
    // Conditional link forms write r31 before the delay slot, so a
    // condition reading r31 has to be captured first.
    let clobbers_link =
        Opcode::decode(branch).is_conditional_branch() && b.gpr_write & b.gpr_read != 0;
    d.gpr_write & b.gpr_read != 0 || clobbers_link
}
