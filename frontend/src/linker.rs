//! Worklist linker: compiles every branch target a block leaves
//! unresolved and patches the pending jumps to it.

use std::collections::HashSet;

use rsp_backend::PatchHandle;
use rsp_core::{Error, Result};
use tracing::trace;

use crate::codegen::DisasContext;
use crate::compiler::compile_block;

/// Forward jump whose target had no native code when it was emitted.
#[derive(Debug)]
pub struct BranchFixup {
    pub target: u32,
    pub site: PatchHandle,
}

/// Compile the block at `pc` plus everything reachable through its
/// pending fixups. Returns the host address of `pc`'s entry.
pub fn compile(ctx: &mut DisasContext<'_>, pc: u32) -> Result<usize> {
    compile_block(ctx, pc)?;
    link_branches(ctx)?;
    ctx.table.lookup(pc).ok_or(Error::MissingEntry { pc })
}

/// Drain the fixup list, compiling targets on first sight.
fn link_branches(ctx: &mut DisasContext<'_>) -> Result<()> {
    let mut visited = HashSet::new();
    while let Some(fixup) = ctx.fixups.pop() {
        let BranchFixup { target, site } = fixup;
        if !ctx.table.contains(target) && visited.insert(target) {
            trace!(target, "compiling branch target");
            compile_block(ctx, target)?;
        }
        let addr = ctx.table.lookup(target).ok_or(Error::MissingEntry { pc: target })?;
        let offset = ctx
            .buf
            .offset_of_addr(addr)
            .ok_or(Error::MissingEntry { pc: target })?;
        ctx.buf.patch(site, offset);
        ctx.stats.fixups_linked += 1;
    }
    Ok(())
}
