//! Shared protocol constants for the length-prefixed dump stream
//!
//! Wire format: LENGTH (4, u32 little-endian) | PAYLOAD (LENGTH bytes, unframed)

// Header is a single little-endian u32
pub const HEADER_LEN: usize = 4;

// Native block size of the storage being dumped
pub const BLOCK_SIZE: usize = 512;

// Blocks requested per chunk read
pub const DEFAULT_CHUNK_BLOCKS: usize = 420;

// 420 * 512 = 215,040 bytes per read request
pub const DEFAULT_CHUNK_SIZE: usize = DEFAULT_CHUNK_BLOCKS * BLOCK_SIZE;

// Upper bound on blocks per read (16 MiB buffer)
pub const MAX_CHUNK_BLOCKS: usize = 32_768;

// Connection defaults used by the device firmware
pub mod defaults {
    pub const DEVICE: &str = "/dev/ttyACM0";
    pub const BAUD: u32 = 115_200;
    pub const OUTPUT: &str = "sdcard.img";
}

// Centralized timeout constants
pub mod timeouts {
    // Per-read timeout (ms); a quiet device yields a short or empty chunk after this
    pub const READ_MS: u64 = 1_000;

    // Redraw interval for the progress bar (ms)
    pub const PROGRESS_TICK_MS: u64 = 250;
}

/// Chunk size in bytes for a given number of blocks, clamped to `1..=MAX_CHUNK_BLOCKS`
pub fn chunk_size_for_blocks(blocks: usize) -> usize {
    blocks.clamp(1, MAX_CHUNK_BLOCKS) * BLOCK_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chunk_is_420_blocks() {
        assert_eq!(DEFAULT_CHUNK_SIZE, 215_040);
        assert_eq!(chunk_size_for_blocks(DEFAULT_CHUNK_BLOCKS), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn zero_blocks_still_reads_one_block() {
        assert_eq!(chunk_size_for_blocks(0), BLOCK_SIZE);
    }

    #[test]
    fn oversized_block_count_is_clamped() {
        assert_eq!(chunk_size_for_blocks(usize::MAX), MAX_CHUNK_BLOCKS * BLOCK_SIZE);
        assert_eq!(chunk_size_for_blocks(MAX_CHUNK_BLOCKS), 16 * 1024 * 1024);
    }
}
