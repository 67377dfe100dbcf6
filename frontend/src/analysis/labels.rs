use std::collections::BTreeSet;
use std::ops::Bound::{Excluded, Included, Unbounded};

use rsp_core::insn::{branch_target, jump_target};
use rsp_core::Opcode;

use super::Image;

/// Static branch structure of an image.
///
/// `targets` holds every pc a direct branch or jump can land on;
/// `locations` holds the pc of every branch instruction, indirect
/// jumps included. Together they bound the sub-blocks the scheduler
/// may permute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchLabels {
    targets: BTreeSet<u32>,
    locations: BTreeSet<u32>,
}

impl BranchLabels {
    #[inline]
    pub fn is_label(&self, pc: u32) -> bool {
        self.targets.contains(&pc)
    }

    #[inline]
    pub fn is_branch_location(&self, pc: u32) -> bool {
        self.locations.contains(&pc)
    }

    pub fn targets(&self) -> impl Iterator<Item = u32> + '_ {
        self.targets.iter().copied()
    }

    pub fn locations(&self) -> impl Iterator<Item = u32> + '_ {
        self.locations.iter().copied()
    }

    /// End (exclusive) of the straight-line run starting at `start`:
    /// the next label after `start`, the next branch at or after it,
    /// or the last word of the image, which is never scheduled.
    pub fn sub_block_end(&self, start: u32) -> u32 {
        let label = self
            .targets
            .range((Excluded(start), Unbounded))
            .next()
            .copied();
        let branch = self
            .locations
            .range((Included(start), Unbounded))
            .next()
            .copied();
        [label, branch].into_iter().flatten().fold(0xFFC, u32::min)
    }
}

/// Collect branch targets and branch locations over the whole image.
pub fn build_branch_labels(image: &Image) -> BranchLabels {
    let mut labels = BranchLabels::default();
    for pc in (0..0x1000).step_by(4) {
        let insn = image.word(pc);
        let op = Opcode::decode(insn);
        if !op.is_branch() {
            continue;
        }
        labels.locations.insert(pc);
        match op {
            Opcode::J | Opcode::Jal => {
                labels.targets.insert(jump_target(insn));
            }
            op if op.is_conditional_branch() => {
                labels.targets.insert(branch_target(pc, insn));
            }
            _ => {}
        }
    }
    tracing::debug!(
        targets = labels.targets.len(),
        branches = labels.locations.len(),
        "built branch labels"
    );
    labels
}
