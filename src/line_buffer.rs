//! The scanline composition buffer.
//!
//! Each pixel is a 16-bit cell: the low byte is a color index into the
//! 256-entry palette (with the shadow and highlight bits folded in), and the
//! high byte carries per-pixel layer flags used while compositing.

use bincode::{Decode, Encode};

/// Horizontal padding on each side of the active display. Sprites can cross
/// the screen edges by up to 8 pixels, so the buffer is padded rather than
/// bounds-checked per pixel.
pub(crate) const LEFT_PAD: usize = 8;

/// Line buffer length in pixels: 320 active + 8 pad on each side.
pub const LINE_BUFFER_LEN: usize = 336;

// Layer flags (high byte of a line buffer cell)
pub const PRIORITY_BIT: u8 = 0x01;
pub const WINDOW_BIT: u8 = 0x02;
pub const SHADOW_OP_BIT: u8 = 0x10;
pub const SPRITE_BIT: u8 = 0x20;
pub const SHADOW_BIT: u8 = 0x40;
pub const HIGHLIGHT_BIT: u8 = 0x80;

// Word-level masks for full-cell writes. SHADOW and HIGHLIGHT also set the
// matching bit in the color byte so a plain palette lookup resolves them.
pub(crate) const PRIORITY_WORD: u16 = 0x0100;
pub(crate) const WINDOW_WORD: u16 = 0x0200;
pub(crate) const SHADOW_OP_WORD: u16 = 0x1000;
pub(crate) const SPRITE_WORD: u16 = 0x2000;
pub(crate) const SHADOW_WORD: u16 = 0x4040;
pub(crate) const HIGHLIGHT_WORD: u16 = 0x8080;

#[derive(Debug, Clone, Encode, Decode)]
pub struct LineBuffer {
    pub(crate) cells: [u16; LINE_BUFFER_LEN],
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self { cells: [0; LINE_BUFFER_LEN] }
    }

    /// Resets the buffer for a new line. With shadow/highlight enabled every
    /// pixel starts shadowed; normal-priority plane pixels inherit the flag
    /// unless something removes it.
    pub fn clear(&mut self, shadow_fill: bool) {
        let fill = if shadow_fill { SHADOW_WORD } else { 0 };
        self.cells.fill(fill);
    }

    #[inline]
    #[must_use]
    pub fn color_index(&self, idx: usize) -> u8 {
        self.cells[idx] as u8
    }

    #[inline]
    #[must_use]
    pub fn layer_flags(&self, idx: usize) -> u8 {
        (self.cells[idx] >> 8) as u8
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_fills_shadow() {
        let mut buffer = LineBuffer::new();
        buffer.cells[17] = 0xABCD;

        buffer.clear(true);
        assert!(buffer.cells.iter().all(|&cell| cell == SHADOW_WORD));
        assert_eq!(buffer.layer_flags(17), SHADOW_BIT);
        assert_eq!(buffer.color_index(17), 0x40);

        buffer.clear(false);
        assert!(buffer.cells.iter().all(|&cell| cell == 0));
    }
}
