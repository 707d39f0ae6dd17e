//! Final line output: palette lookup and border handling.

use crate::config::RendererConfig;
use crate::line_buffer::{LEFT_PAD, LineBuffer};
use crate::registers::Registers;

/// Width of one framebuffer row in pixels. Wide enough for H40 plus the
/// horizontal borders; H32 output is centered within it.
pub const FRAME_BUFFER_LINE_WIDTH: usize = 336;

// Transparent pixels resolve to palette entry 0, which the palette provider
// aliases to the background color register. Borders use the same entry.
fn border_color<P: Copy + Default>(config: RendererConfig, palette: &[P; 256]) -> P {
    if config.border_color_emulation { palette[0] } else { P::default() }
}

/// Resolves the composed line buffer to output pixels through the palette
/// and writes one framebuffer row, including the horizontal borders.
///
/// The palette has 256 entries: the base 64 colors plus their shadowed and
/// highlighted versions at +0x40 and +0x80, so the shadow and highlight bits
/// folded into the color byte resolve with a single lookup.
pub(crate) fn flush_line<P: Copy + Default>(
    buffer: &LineBuffer,
    registers: &Registers,
    config: RendererConfig,
    palette: &[P; 256],
    frame_buffer_row: &mut [P],
) {
    let h_pixels = usize::from(registers.horizontal_display_size.active_display_pixels());
    let begin = (FRAME_BUFFER_LINE_WIDTH - h_pixels) / 2;
    let border = border_color(config, palette);

    for pixel in &mut frame_buffer_row[..begin] {
        *pixel = border;
    }
    for (i, pixel) in frame_buffer_row[begin..begin + h_pixels].iter_mut().enumerate() {
        *pixel = palette[usize::from(buffer.color_index(LEFT_PAD + i))];
    }
    for pixel in &mut frame_buffer_row[begin + h_pixels..FRAME_BUFFER_LINE_WIDTH] {
        *pixel = border;
    }

    if registers.left_column_blank {
        frame_buffer_row[begin..begin + 8].fill(border);
    }
}

/// Writes one row of border (vertical blanking area or disabled display).
pub(crate) fn render_border_line<P: Copy + Default>(
    config: RendererConfig,
    palette: &[P; 256],
    frame_buffer_row: &mut [P],
) {
    let border = border_color(config, palette);
    frame_buffer_row[..FRAME_BUFFER_LINE_WIDTH].fill(border);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::HorizontalDisplaySize;

    fn test_palette() -> [u32; 256] {
        let mut palette = [0u32; 256];
        for (i, color) in palette.iter_mut().enumerate() {
            *color = 0xFF00_0000 | i as u32;
        }
        palette
    }

    #[test]
    fn h40_output_is_centered() {
        let mut buffer = LineBuffer::new();
        buffer.clear(false);
        buffer.cells[LEFT_PAD] = 0x25;
        let mut registers = Registers::new();
        registers.horizontal_display_size = HorizontalDisplaySize::FortyCell;

        let palette = test_palette();
        let mut row = [0u32; FRAME_BUFFER_LINE_WIDTH];
        flush_line(&buffer, &registers, RendererConfig::default(), &palette, &mut row);

        assert_eq!(row[0], palette[0]);
        assert_eq!(row[7], palette[0]);
        assert_eq!(row[8], palette[0x25]);
        assert_eq!(row[9], palette[0]);
        assert_eq!(row[328], palette[0]);
    }

    #[test]
    fn h32_output_is_centered() {
        let mut buffer = LineBuffer::new();
        buffer.clear(false);
        buffer.cells[LEFT_PAD] = 0x25;
        let registers = Registers::new();

        let palette = test_palette();
        let mut row = [0u32; FRAME_BUFFER_LINE_WIDTH];
        flush_line(&buffer, &registers, RendererConfig::default(), &palette, &mut row);

        assert_eq!(row[39], palette[0]);
        assert_eq!(row[40], palette[0x25]);
        assert_eq!(row[296], palette[0]);
    }

    #[test]
    fn left_column_blank_fills_with_border() {
        let mut buffer = LineBuffer::new();
        buffer.clear(false);
        for i in 0..16 {
            buffer.cells[LEFT_PAD + i] = 0x25;
        }
        let mut registers = Registers::new();
        registers.horizontal_display_size = HorizontalDisplaySize::FortyCell;
        registers.left_column_blank = true;

        let palette = test_palette();
        let mut row = [0u32; FRAME_BUFFER_LINE_WIDTH];
        flush_line(&buffer, &registers, RendererConfig::default(), &palette, &mut row);

        for x in 8..16 {
            assert_eq!(row[x], palette[0], "pixel {x}");
        }
        for x in 16..24 {
            assert_eq!(row[x], palette[0x25], "pixel {x}");
        }
    }

    #[test]
    fn border_emulation_disabled_blanks_borders() {
        let config = RendererConfig { border_color_emulation: false, ..RendererConfig::default() };

        let palette = test_palette();
        let mut row = [0xDEAD_BEEFu32; FRAME_BUFFER_LINE_WIDTH];
        render_border_line(config, &palette, &mut row);
        assert!(row.iter().all(|&pixel| pixel == 0));
    }
}
