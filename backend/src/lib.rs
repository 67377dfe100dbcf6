pub mod code_buffer;
pub mod x86_64;

pub use code_buffer::{CodeBuffer, PatchHandle, Region};
pub use x86_64::X86_64CodeGen;

/// Trait for host architecture code generators.
///
/// The generated blocks only rely on this trait for the fixed entry
/// and exit glue; everything between is emitted by the frontend
/// through the architecture's emitter functions.
pub trait HostCodeGen {
    /// Emit the prologue: save callee-saved registers, load the
    /// state pointer, allocate the stack frame and jump to the block
    /// address passed as the second argument.
    fn emit_prologue(&mut self, buf: &mut CodeBuffer);

    /// Emit the epilogue: release the frame, restore callee-saved
    /// registers and return to the caller.
    fn emit_epilogue(&mut self, buf: &mut CodeBuffer);

    /// Buffer offset of the prologue.
    fn prologue_offset(&self) -> usize;

    /// Buffer offset of the shared exit path.
    fn epilogue_offset(&self) -> usize;

    /// Emit a jump to the shared exit path.
    fn emit_exit(&self, buf: &mut CodeBuffer);
}
