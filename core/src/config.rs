/// Default cap on pending branch fixups within one compilation.
pub const DEFAULT_MAX_FIXUPS: usize = 150;
/// Default number of instruction images cached at once.
pub const DEFAULT_MAX_IMAGES: usize = 32;

/// Translator feature toggles, fixed for the lifetime of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Run the local scheduler on each sub-block.
    pub reordering: bool,
    /// Fold scalar registers proven constant over the whole image.
    pub gpr_constants: bool,
    /// Skip accumulator writes that are never read.
    pub accum_liveness: bool,
    /// Skip vector destination writes that are overwritten unread.
    pub dest_liveness: bool,
    /// Skip the carry input of VADD/VSUB when VCO is provably clear.
    pub flag_analysis: bool,
    /// Assume vector loads/stores are aligned (no runtime test).
    pub align_vector: bool,
    /// Assume scalar halfword/word accesses are aligned.
    pub align_gpr: bool,
    /// Use 8-lane SSE2 sequences where they are exact.
    pub simd: bool,
    /// Route every non-control instruction through the interpreter.
    pub force_trap: bool,
    pub max_fixups: usize,
    pub max_images: usize,
}

impl CompilerConfig {
    /// Interpreter-only code generation: no fast paths, no analysis.
    pub fn trap_only() -> Self {
        Self {
            reordering: false,
            gpr_constants: false,
            accum_liveness: false,
            dest_liveness: false,
            flag_analysis: false,
            simd: false,
            force_trap: true,
            ..Self::default()
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            reordering: true,
            gpr_constants: true,
            accum_liveness: true,
            dest_liveness: true,
            flag_analysis: true,
            align_vector: false,
            align_gpr: false,
            simd: true,
            force_trap: false,
            max_fixups: DEFAULT_MAX_FIXUPS,
            max_images: DEFAULT_MAX_IMAGES,
        }
    }
}
