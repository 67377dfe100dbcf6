//! Block compiler: walks the image from an entry pc and drives the
//! codegen routines through the delay-slot state machine.

use rsp_backend::Region;
use rsp_core::state::PC_MASK;
use rsp_core::{Error, Insn, Opcode, Result};
use tracing::{debug, trace, warn};

use crate::codegen::{trap, DisasContext};
use crate::dispatch::lookup;
use crate::reorder::reorder_sub_block;

/// Primary space a compilation needs before it starts.
pub const MIN_PRIMARY_SPACE: usize = 1 << 20;
/// Secondary space a compilation needs before it starts.
pub const MIN_SECONDARY_SPACE: usize = 256 << 10;

/// Position of the compiler relative to the branch structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Straight-line code.
    Normal,
    /// A branch has run its first phase; the next word is its slot.
    DelaySlotPending,
    /// Compiling the delay slot word.
    DelaySlot,
    /// Revisiting the branch word for its second phase.
    DelaySlotResolved,
    /// A conditional branch is done; continue with the fallthrough.
    SubBlockDone,
    /// Control never falls out of the emitted code.
    Finished,
}

impl BlockState {
    pub fn name(self) -> &'static str {
        match self {
            BlockState::Normal => "Normal",
            BlockState::DelaySlotPending => "DelaySlotPending",
            BlockState::DelaySlot => "DelaySlot",
            BlockState::DelaySlotResolved => "DelaySlotResolved",
            BlockState::SubBlockDone => "SubBlockDone",
            BlockState::Finished => "Finished",
        }
    }
}

/// Start a new entry at `pc` and schedule the sub-block behind it.
fn enter(ctx: &mut DisasContext<'_>, pc: u32) {
    ctx.begin_entry(pc);
    if ctx.config.reordering {
        reorder_sub_block(ctx.image, &ctx.analysis.labels, pc);
    }
}

/// Continue at `pc` after a finished sub-block: reuse an existing
/// entry or open a new one. Returns false when compilation stops.
fn continue_at(ctx: &mut DisasContext<'_>, pc: u32) -> bool {
    if pc >= 0x1000 {
        ctx.emit_exit_at(pc);
        return false;
    }
    if let Some(addr) = ctx.table.lookup(pc) {
        if ctx.emit_link(addr) {
            debug!(pc, "linked fallthrough");
            return false;
        }
    }
    debug!(pc, offset = ctx.buf.offset(), "sub-block continuation");
    enter(ctx, pc);
    true
}

fn emit_insn(ctx: &mut DisasContext<'_>, insn: Insn) -> Result<()> {
    let op = Opcode::decode(insn);
    if ctx.config.force_trap && !op.is_branch() && op != Opcode::Break {
        trap(ctx, insn);
        return Ok(());
    }
    let routine = lookup(insn).ok_or(Error::NoRoutine {
        pc: ctx.pc,
        word: insn.raw(),
    })?;
    routine(ctx, insn);
    Ok(())
}

/// Compile native code for the block starting at `start`.
///
/// The block runs until an unconditional transfer, a link into
/// already compiled code, or the end of the image. Every label and
/// every fallthrough after a conditional branch becomes an entry in
/// the jump table. Branch targets that are not compiled yet are left
/// in `ctx.fixups`.
pub fn compile_block(ctx: &mut DisasContext<'_>, start: u32) -> Result<()> {
    let start = start & PC_MASK;
    if ctx.buf.remaining_in(Region::Primary) < MIN_PRIMARY_SPACE
        || ctx.buf.remaining_in(Region::Secondary) < MIN_SECONDARY_SPACE
    {
        return Err(Error::CodeBufferFull { pc: start });
    }

    ctx.buf.set_active(Region::Primary);
    ctx.pc = start;
    ctx.state = BlockState::Normal;
    ctx.branch = None;
    let insns_before = ctx.stats.insns_compiled;
    let offset = ctx.buf.offset();
    let mut entry = start;
    enter(ctx, start);

    loop {
        let pc = ctx.pc;

        if ctx.state == BlockState::Normal && pc != entry && ctx.analysis.labels.is_label(pc) {
            if let Some(addr) = ctx.table.lookup(pc) {
                if ctx.emit_link(addr) {
                    debug!(pc, "linked label");
                    break;
                }
            }
            enter(ctx, pc);
            entry = pc;
        }

        let insn = ctx.image.word(pc);
        trace!(pc, word = insn.raw(), state = ctx.state.name(), "compile");
        let resolving = ctx.state == BlockState::DelaySlotResolved;
        if !resolving {
            ctx.charge();
            ctx.stats.insns_compiled += 1;
        }

        if resolving {
            if !Opcode::decode(insn).is_branch() {
                return Err(Error::InvalidCompilerState {
                    pc,
                    state: ctx.state.name(),
                });
            }
            emit_insn(ctx, insn)?;
        } else if insn == Insn::FILL {
            trace!(pc, "fill word");
        } else if ctx.state == BlockState::DelaySlot && Opcode::decode(insn).is_branch() {
            warn!(pc, "branch in delay slot ignored");
        } else {
            emit_insn(ctx, insn)?;
        }

        if ctx.fixups.len() > ctx.config.max_fixups {
            return Err(Error::TooManyFixups {
                pc,
                max: ctx.config.max_fixups,
            });
        }

        match ctx.state {
            BlockState::Normal => {
                ctx.pc = pc.wrapping_add(4);
                if ctx.pc >= 0x1000 {
                    ctx.emit_exit_at(ctx.pc);
                    break;
                }
            }
            BlockState::DelaySlotPending => {
                ctx.state = BlockState::DelaySlot;
                ctx.pc = pc.wrapping_add(4) & PC_MASK;
            }
            BlockState::DelaySlot => {
                ctx.state = BlockState::DelaySlotResolved;
                ctx.pc = pc.wrapping_sub(4) & PC_MASK;
            }
            BlockState::DelaySlotResolved => {
                return Err(Error::InvalidCompilerState {
                    pc,
                    state: ctx.state.name(),
                });
            }
            BlockState::SubBlockDone => {
                ctx.state = BlockState::Normal;
                ctx.pc = pc.wrapping_add(8);
                if !continue_at(ctx, ctx.pc) {
                    break;
                }
                entry = ctx.pc;
            }
            BlockState::Finished => break,
        }
    }

    ctx.stats.blocks_compiled += 1;
    debug!(
        start,
        offset,
        end = ctx.pc,
        insns = ctx.stats.insns_compiled - insns_before,
        pending_fixups = ctx.fixups.len(),
        "compiled block"
    );
    Ok(())
}
