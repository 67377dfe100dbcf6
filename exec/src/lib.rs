//! RSP execution engine.
//!
//! Drives the lookup, compile, execute cycle over the native code
//! produced by `rsp-frontend`. Compiled code is cached per instruction
//! image: each distinct image checksum gets its own jump table so
//! microcode overlays can be swapped in and out without recompiling.

pub mod exec_loop;
pub mod overlay;

pub use exec_loop::TrapContext;
pub use overlay::{Overlay, OverlayCache};

use rsp_backend::{CodeBuffer, HostCodeGen, X86_64CodeGen};
use rsp_core::{CompilerConfig, Interpreter, JumpTable, Result};
use rsp_frontend::CompileStats;
use rsp_interp::Reference;

/// Dynamic recompiler for one RSP instance.
pub struct Recompiler {
    buf: CodeBuffer,
    backend: X86_64CodeGen,
    /// Offset where block code starts (after prologue/epilogue).
    code_gen_start: usize,
    overlays: OverlayCache,
    config: CompilerConfig,
    stats: CompileStats,
    trap: Box<TrapContext>,
}

impl Recompiler {
    /// Recompiler that falls back to the reference interpreter.
    pub fn new(config: CompilerConfig) -> Result<Self> {
        Self::with_interpreter(config, Reference::new())
    }

    /// Recompiler that hands untranslated instructions to `interp`.
    pub fn with_interpreter(
        config: CompilerConfig,
        interp: impl Interpreter + Send + 'static,
    ) -> Result<Self> {
        let mut buf = CodeBuffer::with_default_size()?;
        let mut backend = X86_64CodeGen::new();
        backend.emit_prologue(&mut buf);
        backend.emit_epilogue(&mut buf);
        let code_gen_start = buf.offset();

        Ok(Self {
            buf,
            backend,
            code_gen_start,
            overlays: OverlayCache::new(config.max_images),
            config,
            stats: CompileStats::default(),
            trap: Box::new(TrapContext {
                interp: Box::new(interp),
                executed: 0,
            }),
        })
    }

    /// Drop all compiled code, jump tables and cached images.
    pub fn reset(&mut self) {
        self.buf.reset(self.code_gen_start);
        self.overlays.clear();
        self.stats = CompileStats::default();
        self.trap.executed = 0;
    }

    /// Replace the configuration. Everything compiled under the old
    /// one is discarded.
    pub fn set_config(&mut self, config: CompilerConfig) {
        self.config = config;
        self.overlays = OverlayCache::new(config.max_images);
        self.reset();
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compilation counters since the last reset.
    pub fn stats(&self) -> CompileStats {
        self.stats
    }

    /// Interpreter calls made by generated code since the last reset.
    pub fn traps_executed(&self) -> u64 {
        self.trap.executed
    }

    /// Jump table cached for the image with `checksum`.
    pub fn jump_table(&self, checksum: u32) -> Option<&JumpTable> {
        self.overlays.find(checksum).map(|o| &o.table)
    }

    /// Number of distinct images currently cached.
    pub fn image_count(&self) -> usize {
        self.overlays.len()
    }

    /// Throw away generated code but keep the cached images, so the
    /// next lookup recompiles into an empty buffer.
    fn flush_code(&mut self) {
        self.buf.reset(self.code_gen_start);
        self.overlays.invalidate_tables();
    }
}
