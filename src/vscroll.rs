//! Per-column vertical scroll resolution, including the 2-cell VScroll bug.

use crate::Vsram;
use crate::config::{InterlacedRenderMode, RendererConfig};
use crate::registers::{HorizontalDisplaySize, InterlacingMode, Registers, VerticalScrollMode};

/// What real H32 hardware produces for the leftmost partially-scrolled column
/// in 2-cell vertical scroll mode. Model 1 consoles output a constant 0 here;
/// some later revisions latch other values instead.
pub const VSCROLL_BUG_H32_OFFSET: u16 = 0;

// VSRAM holds 40 words, interleaved Scroll A / Scroll B per 2-cell column
const VSRAM_WORD_LEN: i16 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScrollPlane {
    A,
    B,
}

/// Maps a scanline number to a plane row number. In interlaced
/// double-resolution mode each frame only renders half of the plane rows.
pub(crate) fn adjusted_line_number(
    interlacing_mode: InterlacingMode,
    line: u16,
    odd_frame: bool,
    render_mode: InterlacedRenderMode,
) -> u16 {
    if !interlacing_mode.is_double_resolution() {
        return line;
    }

    let field_offset = match render_mode {
        InterlacedRenderMode::EvenLines => 0,
        InterlacedRenderMode::OddLines => 1,
        InterlacedRenderMode::Flicker => u16::from(odd_frame),
    };
    2 * line + field_offset
}

#[inline]
fn read_vsram_word(vsram: &Vsram, word_idx: u16) -> u16 {
    let addr = usize::from(word_idx) * 2;
    u16::from_be_bytes([vsram[addr], vsram[addr + 1]])
}

/// Resolves the Y offset (scroll value + line number) for one 2-cell column
/// of a scroll plane.
///
/// `vsram_cell` is the VSRAM word index for the column's Scroll A entry; it
/// is negative for the leftmost partially-scrolled column, which is where the
/// VScroll bug kicks in.
pub(crate) fn plane_y_offset(
    vsram: &Vsram,
    registers: &Registers,
    config: RendererConfig,
    plane: ScrollPlane,
    vsram_cell: i16,
    adjusted_line: u16,
) -> u16 {
    let mut cell = vsram_cell;
    if registers.vertical_scroll_mode == VerticalScrollMode::TwoCell
        && !(0..VSRAM_WORD_LEN).contains(&cell)
    {
        if config.emulate_vscroll_bug {
            let scroll = match registers.horizontal_display_size {
                // H40 hardware ANDs together the last two VSRAM entries
                HorizontalDisplaySize::FortyCell => {
                    read_vsram_word(vsram, 38) & read_vsram_word(vsram, 39)
                }
                HorizontalDisplaySize::ThirtyTwoCell => VSCROLL_BUG_H32_OFFSET,
            };
            return scroll.wrapping_add(adjusted_line);
        }
        cell = 0;
    }

    let word_idx = match registers.vertical_scroll_mode {
        VerticalScrollMode::FullScreen => 0,
        VerticalScrollMode::TwoCell => (cell & !1) as u16,
    };
    let word_idx = match plane {
        ScrollPlane::A => word_idx,
        ScrollPlane::B => word_idx + 1,
    };

    read_vsram_word(vsram, word_idx).wrapping_add(adjusted_line)
}
