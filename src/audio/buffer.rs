use super::backend::AudioFrame;

/// Captured blocks of one session, in arrival order.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    blocks: Vec<AudioFrame>,
    samples: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: AudioFrame) {
        self.samples += frame.samples.len();
        self.blocks.push(frame);
    }

    /// Number of blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total interleaved samples across all blocks
    pub fn sample_count(&self) -> usize {
        self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &AudioFrame> {
        self.blocks.iter()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.samples = 0;
    }
}
