//! Pattern (tile) row fetching.
//!
//! A pattern row is 8 pixels packed as 4bpp nibbles in a `u32`, leftmost
//! pixel in the most significant nibble, exactly as stored in VRAM.

use crate::Vram;

/// Source of pattern row data for the plane and sprite renderers.
///
/// The trait seam exists so a frontend can substitute a decoded tile cache;
/// the renderers themselves only ever ask for one row at a time.
pub trait PatternCache {
    /// Fetches a row of an 8x8 pattern. `cell_offset` is added to the tile
    /// number before masking, which is how multi-cell sprites and vertically
    /// scrolled planes address their rows.
    fn pattern_row(&self, tile_number: u16, cell_offset: u16, fine_row: u16) -> u32;

    /// Fetches a row of an 8x16 pattern (interlaced double-resolution mode).
    fn pattern_row_8x16(&self, tile_number: u16, cell_offset: u16, fine_row: u16) -> u32;
}

/// Fetches pattern rows directly out of VRAM.
#[derive(Debug, Clone, Copy)]
pub struct VramPatterns<'vram> {
    vram: &'vram Vram,
}

impl<'vram> VramPatterns<'vram> {
    #[must_use]
    pub fn new(vram: &'vram Vram) -> Self {
        Self { vram }
    }

    #[inline]
    fn read_row(&self, addr: usize) -> u32 {
        u32::from_be_bytes([
            self.vram[addr & 0xFFFF],
            self.vram[(addr + 1) & 0xFFFF],
            self.vram[(addr + 2) & 0xFFFF],
            self.vram[(addr + 3) & 0xFFFF],
        ])
    }
}

impl PatternCache for VramPatterns<'_> {
    #[inline]
    fn pattern_row(&self, tile_number: u16, cell_offset: u16, fine_row: u16) -> u32 {
        // 2048 patterns of 32 bytes each
        let pattern = tile_number.wrapping_add(cell_offset) & 0x07FF;
        let addr = usize::from(pattern) * 32 + usize::from(fine_row & 0x07) * 4;
        self.read_row(addr)
    }

    #[inline]
    fn pattern_row_8x16(&self, tile_number: u16, cell_offset: u16, fine_row: u16) -> u32 {
        // 1024 patterns of 64 bytes each
        let pattern = tile_number.wrapping_add(cell_offset) & 0x03FF;
        let addr = usize::from(pattern) * 64 + usize::from(fine_row & 0x0F) * 4;
        self.read_row(addr)
    }
}

/// Reverses the order of the 8 nibbles in a pattern row, for H-flip.
#[inline]
pub(crate) fn reverse_nibbles(row: u32) -> u32 {
    let swapped = row.swap_bytes();
    ((swapped & 0x0F0F_0F0F) << 4) | ((swapped >> 4) & 0x0F0F_0F0F)
}
