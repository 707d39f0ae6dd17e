//! Scanline-accurate renderer for the Mega Drive VDP's Mode 5, the
//! tile/sprite display mode used by virtually all licensed software.
//!
//! This crate implements only the rendering pipeline: background plane
//! composition (Scroll A, Scroll B, and the non-scrolling window), the
//! per-scanline sprite evaluation and drawing pipeline, and the final
//! line-buffer-to-framebuffer pass. VRAM/VSRAM, the decoded pattern source,
//! the palette tables, and the output framebuffer are owned by the caller
//! and borrowed for the duration of each [`LineRenderer::render_line`] call.
//!
//! Documented hardware quirks are reproduced: the 2-cell VScroll addressing
//! bug, the left window bug, sprite masking via X=0 sprites, the sprite
//! pixel-per-line budget with its cross-line overflow carry, and the
//! shadow/highlight operator pixels.

mod config;
mod line_buffer;
mod num;
mod output;
mod patterns;
mod plane;
mod registers;
mod render;
mod sprites;
mod vscroll;

pub use config::{InterlacedRenderMode, RendererConfig};
pub use line_buffer::{
    HIGHLIGHT_BIT, LINE_BUFFER_LEN, LineBuffer, PRIORITY_BIT, SHADOW_BIT, SHADOW_OP_BIT,
    SPRITE_BIT, WINDOW_BIT,
};
pub use output::FRAME_BUFFER_LINE_WIDTH;
pub use patterns::{PatternCache, VramPatterns};
pub use registers::{
    HorizontalDisplaySize, HorizontalScrollMode, InterlacingMode, Registers, ScrollSize,
    VerticalDisplaySize, VerticalScrollMode, WindowHorizontalMode, WindowVerticalMode,
};
pub use render::{LineArgs, LineRenderer};
pub use sprites::MAX_SPRITES_PER_FRAME;
pub use vscroll::VSCROLL_BUG_H32_OFFSET;

pub const VRAM_LEN: usize = 64 * 1024;
pub const VSRAM_LEN: usize = 80;

pub type Vram = [u8; VRAM_LEN];
pub type Vsram = [u8; VSRAM_LEN];

#[inline]
pub(crate) fn read_vram_word(vram: &Vram, addr: u16) -> u16 {
    u16::from_be_bytes([vram[usize::from(addr)], vram[usize::from(addr.wrapping_add(1))]])
}
