use rsp_core::state::PC_MASK;
use rsp_core::{image_checksum, Error, Insn, Interpreter, Result, RspState};
use rsp_frontend::{compile, DisasContext, Runtime};
use tracing::{trace, warn};

use crate::Recompiler;

/// State handed to the trap trampoline through the second argument.
pub struct TrapContext {
    pub interp: Box<dyn Interpreter + Send>,
    pub executed: u64,
}

/// Called from generated code with the word in `state.trap_word`.
///
/// # Safety
/// Both pointers must be valid and unaliased for the duration of the
/// call. Generated code passes the state pointer it was entered with
/// and the boxed context owned by the recompiler.
pub(crate) unsafe extern "C" fn trap_entry(state: *mut RspState, ctx: *mut TrapContext) {
    let state = &mut *state;
    let ctx = &mut *ctx;
    ctx.executed += 1;
    ctx.interp.execute(state, Insn(state.trap_word));
}

impl Recompiler {
    /// Execute up to `cycles` instructions from `state.pc`.
    ///
    /// Returns the number of cycles consumed. The last straight-line
    /// segment may run past the budget, so the result can exceed
    /// `cycles`.
    pub fn run(&mut self, state: &mut RspState, cycles: u32) -> Result<u32> {
        if state.halted != 0 {
            return Ok(0);
        }
        state.budget = cycles.min(i32::MAX as u32) as i32;
        let slot = self
            .overlays
            .select(image_checksum(&state.imem), &state.imem, &self.config)?;

        while state.halted == 0 && state.budget > 0 {
            state.pc &= PC_MASK;
            let entry = match self.overlays.get(slot).table.lookup(state.pc) {
                Some(addr) => addr,
                None => self.compile_at(slot, state.pc)?,
            };
            trace!(pc = state.pc, budget = state.budget, "enter");
            // SAFETY: `entry` was produced by the compiler for the
            // active overlay and the buffer has not been reset since.
            unsafe { self.enter(state, entry) };
        }

        let consumed = (cycles as i64 - state.budget as i64).clamp(0, u32::MAX as i64);
        Ok(consumed as u32)
    }

    fn compile_at(&mut self, slot: usize, pc: u32) -> Result<usize> {
        match self.try_compile(slot, pc) {
            Err(Error::CodeBufferFull { .. }) => {
                warn!(pc, "code buffer full, flushing");
                self.flush_code();
                self.try_compile(slot, pc)
            }
            other => other,
        }
    }

    fn try_compile(&mut self, slot: usize, pc: u32) -> Result<usize> {
        let runtime = Runtime {
            epilogue: self.backend.epilogue_offset,
            trap_fn: trap_entry as usize as u64,
            trap_ctx: &mut *self.trap as *mut TrapContext as u64,
        };
        let overlay = self.overlays.get_mut(slot);
        // The scheduler permutes this copy; the overlay keeps the
        // image as loaded so later entries see the real word order.
        let mut image = overlay.image.clone();
        let mut ctx = DisasContext::new(
            &mut self.buf,
            &mut overlay.table,
            &mut image,
            &overlay.analysis,
            &self.config,
            runtime,
            &mut self.stats,
        );
        let result = compile(&mut ctx, pc);
        drop(ctx);
        if result.is_err() {
            overlay.table.invalidate();
        }
        result
    }

    /// Jump into generated code at `entry` and return once it exits.
    ///
    /// # Safety
    /// `entry` must be a live entry address in this recompiler's
    /// buffer.
    unsafe fn enter(&mut self, state: &mut RspState, entry: usize) {
        let prologue: unsafe extern "C" fn(*mut RspState, *const u8) =
            core::mem::transmute(self.buf.ptr_at(self.backend.prologue_offset));
        prologue(state as *mut RspState, entry as *const u8);
    }
}
