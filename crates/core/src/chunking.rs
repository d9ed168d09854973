use crate::config::ChunkingOptions;
use crate::error::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Result<Self, IngestError> {
        if size == 0 {
            return Err(IngestError::InvalidConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap >= size {
            return Err(IngestError::InvalidConfig(format!(
                "chunk overlap {overlap} must be smaller than chunk size {size}"
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn stride(&self) -> usize {
        self.size - self.overlap
    }

    /// Returns `(char_offset, window)` pairs. Windows start every `stride`
    /// characters until the offset reaches the end of the text, so the tail
    /// windows may be shorter than `size`.
    pub fn split(&self, text: &str) -> Vec<(usize, String)> {
        let chars: Vec<char> = text.chars().collect();
        let mut windows = Vec::with_capacity(chars.len().div_ceil(self.stride()));
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.size).min(chars.len());
            windows.push((start, chars[start..end].iter().collect()));
            start += self.stride();
        }

        windows
    }
}

impl TryFrom<ChunkingOptions> for Chunker {
    type Error = IngestError;

    fn try_from(value: ChunkingOptions) -> Result<Self, Self::Error> {
        Chunker::new(value.size, value.overlap)
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            size: 500,
            overlap: 50,
        }
    }
}
