use rsp_core::state::MEM_SIZE;
use rsp_core::{CompilerConfig, Error, JumpTable, Result};
use rsp_frontend::{Analysis, Image};
use tracing::{debug, error};

/// Everything compiled for one instruction image.
pub struct Overlay {
    pub checksum: u32,
    pub table: JumpTable,
    /// Image snapshot taken when the overlay was created. Never
    /// reordered; each compilation schedules its own copy.
    pub image: Image,
    pub analysis: Analysis,
}

impl Overlay {
    fn new(checksum: u32, imem: &[u8; MEM_SIZE], config: &CompilerConfig) -> Self {
        let image = Image::from_imem(imem);
        let analysis = Analysis::new(&image, config);
        Self {
            checksum,
            table: JumpTable::new(),
            image,
            analysis,
        }
    }
}

/// Jump tables keyed by image checksum, bounded by `max`.
///
/// Tables are never evicted: generated code embeds their addresses,
/// so a full cache is an error until the next reset.
pub struct OverlayCache {
    entries: Vec<Overlay>,
    max: usize,
    active: Option<usize>,
}

impl OverlayCache {
    pub fn new(max: usize) -> Self {
        Self {
            entries: Vec::new(),
            max,
            active: None,
        }
    }

    /// Make the overlay for `checksum` active, creating it on first
    /// sight. Returns its index.
    pub fn select(
        &mut self,
        checksum: u32,
        imem: &[u8; MEM_SIZE],
        config: &CompilerConfig,
    ) -> Result<usize> {
        if let Some(i) = self.active {
            if self.entries[i].checksum == checksum {
                return Ok(i);
            }
        }
        let index = match self.entries.iter().position(|o| o.checksum == checksum) {
            Some(i) => i,
            None => {
                if self.entries.len() >= self.max {
                    error!(checksum, max = self.max, "overlay cache exhausted");
                    return Err(Error::TooManyImages {
                        checksum,
                        max: self.max,
                    });
                }
                self.entries.push(Overlay::new(checksum, imem, config));
                debug!(checksum, images = self.entries.len(), "new overlay");
                self.entries.len() - 1
            }
        };
        self.active = Some(index);
        Ok(index)
    }

    pub fn get(&self, index: usize) -> &Overlay {
        &self.entries[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Overlay {
        &mut self.entries[index]
    }

    pub fn find(&self, checksum: u32) -> Option<&Overlay> {
        self.entries.iter().find(|o| o.checksum == checksum)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every native entry but keep the images and analyses.
    pub fn invalidate_tables(&mut self) {
        for overlay in &mut self.entries {
            overlay.table.invalidate();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.active = None;
    }
}
