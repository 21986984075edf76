//! Chunk planning.
//!
//! A plan is a pure function of `(data, chunk_size)`. The same plan drives
//! grinding and, later, reconstruction, so chunk order is the only mapping
//! from keys back to byte positions.

use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::types::{Difficulty, GrindTarget};

/// Ordered, fixed-size chunks of a byte buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Bytes per chunk
    pub chunk_size: usize,
    /// `ceil(data_len / chunk_size)`
    pub total_chunks: usize,
    /// Chunks in order; the last is zero-padded on the right
    pub chunks: Vec<Vec<u8>>,
    /// Length of the unpadded input
    pub data_len: usize,
}

impl ChunkPlan {
    /// Splits `data` into `chunk_size`-byte chunks.
    pub fn new(data: &[u8], chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ObscurityError::ValidationError("chunk size must be positive".into()));
        }

        Ok(split(data, chunk_size))
    }

    /// Grind targets in chunk order.
    pub fn targets(&self) -> Vec<GrindTarget> {
        self.chunks
            .iter()
            .enumerate()
            .map(|(i, c)| GrindTarget::new(i, c.clone()))
            .collect()
    }

    /// Bytes of zero padding on the last chunk.
    pub fn padding(&self) -> usize {
        self.total_chunks * self.chunk_size - self.data_len
    }

    /// Returns true if there is nothing to grind.
    pub fn is_empty(&self) -> bool {
        self.total_chunks == 0
    }
}

/// Plans `data` at a validated difficulty.
pub fn plan(data: &[u8], difficulty: Difficulty) -> ChunkPlan {
    split(data, difficulty.chunk_bytes())
}

fn split(data: &[u8], chunk_size: usize) -> ChunkPlan {
    let chunks: Vec<Vec<u8>> = data
        .chunks(chunk_size)
        .map(|c| {
            let mut chunk = c.to_vec();
            chunk.resize(chunk_size, 0);
            chunk
        })
        .collect();
    ChunkPlan {
        chunk_size,
        total_chunks: chunks.len(),
        chunks,
        data_len: data.len(),
    }
}
