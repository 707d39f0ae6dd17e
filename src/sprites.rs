//! Sprite evaluation and rendering.
//!
//! Sprite evaluation runs one line ahead of rendering, the way the hardware
//! scans the attribute table during the previous line's active display. The
//! results go into a double-buffered line cache indexed by line parity, so
//! evaluating line N+1 never disturbs the cache still in use for line N.
//!
//! Y position, size, and link values come from a latched copy of the sprite
//! attribute table rather than VRAM; X position and the tile attributes are
//! read live. This split matches the hardware's internal SAT cache and is
//! required for raster effects that rewrite the SAT mid-frame.

use crate::config::{InterlacedRenderMode, RendererConfig};
use crate::line_buffer::{
    HIGHLIGHT_BIT, HIGHLIGHT_WORD, LineBuffer, PRIORITY_BIT, SHADOW_BIT, SHADOW_OP_BIT,
    SHADOW_OP_WORD, SHADOW_WORD, SPRITE_BIT, SPRITE_WORD,
};
use crate::num::GetBit;
use crate::patterns::{PatternCache, reverse_nibbles};
use crate::registers::Registers;
use crate::{Vram, read_vram_word};
use bincode::{Decode, Encode};

/// Per-line sprite cache capacity (the H40 per-line limit).
pub(crate) const SPRITE_CACHE_LEN: usize = 20;

/// Sprite attribute table capacity (the H40 per-frame limit).
pub const MAX_SPRITES_PER_FRAME: usize = 80;

/// The portion of a sprite attribute table entry that the VDP latches
/// internally: Y position, size, and link. The other fields are always read
/// out of VRAM at render time.
#[derive(Debug, Clone, Copy, Default, Encode, Decode)]
pub struct CachedSpriteData {
    pub v_position: u16,
    pub size_bits: u8,
    pub link: u8,
}

impl CachedSpriteData {
    fn latch(vram: &Vram, addr: u16) -> Self {
        Self {
            v_position: read_vram_word(vram, addr) & 0x03FF,
            size_bits: vram[usize::from(addr.wrapping_add(2))] & 0x0F,
            // Link is 7-bit; some games set the high bit by mistake
            link: vram[usize::from(addr.wrapping_add(3))] & 0x7F,
        }
    }
}

/// Copies the latched SAT fields for every sprite out of VRAM.
pub(crate) fn latch_sprite_attributes(
    sat_cache: &mut [CachedSpriteData; MAX_SPRITES_PER_FRAME],
    vram: &Vram,
    registers: &Registers,
) {
    let base_addr = registers.masked_sprite_attribute_table_addr();
    for (i, entry) in sat_cache.iter_mut().enumerate() {
        *entry = CachedSpriteData::latch(vram, base_addr.wrapping_add(8 * i as u16));
    }
}

#[derive(Debug, Clone, Copy, Default, Encode, Decode)]
struct SpriteCacheEntry {
    h_position: i16,
    v_position: i16,
    h_size_cells: u8,
    v_size_cells: u8,
    attributes: u16,
}

/// Double-buffered per-line sprite cache, indexed by line parity.
#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct SpriteLineCache {
    entries: [[SpriteCacheEntry; SPRITE_CACHE_LEN]; 2],
    counts: [u8; 2],
}

impl SpriteLineCache {
    pub(crate) fn new() -> Self {
        Self { entries: [[SpriteCacheEntry::default(); SPRITE_CACHE_LEN]; 2], counts: [0; 2] }
    }
}

/// Sprite-related status flag state, persisted across lines.
#[derive(Debug, Clone, Copy, Default, Encode, Decode)]
pub(crate) struct SpriteState {
    pub(crate) overflow: bool,
    pub(crate) collision: bool,
    /// A sprite pixel overflow on one line makes masking on the next line
    /// take effect even before any sprite with X > 0 is found.
    pub(crate) dot_overflow_on_prev_line: bool,
}

fn cache_line_and_id(
    line: i32,
    double_resolution: bool,
    odd_frame: bool,
    config: RendererConfig,
) -> (i32, usize) {
    if double_resolution {
        let line = if line < 0 {
            match config.interlaced_render_mode {
                InterlacedRenderMode::EvenLines => 0,
                InterlacedRenderMode::OddLines => 1,
                InterlacedRenderMode::Flicker => i32::from(odd_frame),
            }
        } else {
            line + 2
        };
        (line, ((line >> 1) & 1) as usize)
    } else {
        (line + 1, (line + 1) as usize & 1)
    }
}

/// Scans the sprite list and fills the line cache for the *next* line.
///
/// `line` is the current (IM2-adjusted) line number, or negative when
/// evaluating for the first line of a frame. Returns true if the per-line
/// sprite limit was hit.
pub(crate) fn update_sprite_line_cache(
    cache: &mut SpriteLineCache,
    vram: &Vram,
    registers: &Registers,
    config: RendererConfig,
    sat_cache: &[CachedSpriteData; MAX_SPRITES_PER_FRAME],
    line: i32,
    odd_frame: bool,
) -> bool {
    let double_resolution = registers.interlacing_mode.is_double_resolution();
    let h_cells = registers.horizontal_display_size.active_display_cells();

    // Per-frame traversal is always limited by SAT addressing; the per-line
    // limit is only enforced when sprite limits are enabled
    let max_sprites_frame = h_cells * 2;
    let max_sprites_line = if config.enforce_sprite_limits {
        usize::from(h_cells / 2)
    } else {
        SPRITE_CACHE_LEN
    };

    let (line, cache_id) = cache_line_and_id(line, double_resolution, odd_frame, config);

    let sat_base_addr = registers.masked_sprite_attribute_table_addr();
    let mut overflow = false;
    let mut count = 0;
    let mut link: u8 = 0;

    for _ in 0..max_sprites_frame {
        let cached = sat_cache[usize::from(link)];

        let y = if double_resolution {
            i32::from(cached.v_position & 0x3FF) - 256
        } else {
            i32::from(cached.v_position & 0x1FF) - 128
        };

        if line >= y {
            let height = if double_resolution {
                i32::from(cached.size_bits & 0x03) * 16 + 15
            } else {
                i32::from(cached.size_bits & 0x03) * 8 + 7
            };

            if line <= y + height {
                if count == max_sprites_line {
                    overflow = true;
                    break;
                }

                // X position and tile attributes are read live from VRAM
                let sprite_addr = sat_base_addr.wrapping_add(8 * u16::from(link));
                let attributes = read_vram_word(vram, sprite_addr.wrapping_add(4));
                let x = i32::from(read_vram_word(vram, sprite_addr.wrapping_add(6)) & 0x1FF) - 128;

                cache.entries[cache_id][count] = SpriteCacheEntry {
                    h_position: x as i16,
                    v_position: y as i16,
                    h_size_cells: ((cached.size_bits >> 2) & 0x03) + 1,
                    v_size_cells: (cached.size_bits & 0x03) + 1,
                    attributes,
                };
                count += 1;
            }
        }

        link = cached.link;
        if link == 0 || u16::from(link) >= max_sprites_frame {
            break;
        }
    }

    cache.counts[cache_id] = count as u8;
    overflow
}

fn fetch_sprite_pattern_row<C: PatternCache>(
    patterns: &C,
    double_resolution: bool,
    attributes: u16,
    cell_offset: u16,
    fine_row: u16,
) -> u32 {
    let fine_mask = if double_resolution { 15 } else { 7 };
    let fine_row = if attributes.bit(12) { fine_mask - fine_row } else { fine_row };

    let tile_number = attributes & 0x07FF;
    let row = if double_resolution {
        patterns.pattern_row_8x16(tile_number, cell_offset, fine_row)
    } else {
        patterns.pattern_row(tile_number, cell_offset, fine_row)
    };

    if attributes.bit(11) { reverse_nibbles(row) } else { row }
}

fn put_line_sprite(
    buffer: &mut LineBuffer,
    h_position: i32,
    pattern: u32,
    palette: u8,
    priority: bool,
    shadow_highlight: bool,
    collision: &mut bool,
) {
    if pattern == 0 {
        return;
    }

    // h_position is screen-relative and can reach -7
    let base = (h_position + 8) as usize;
    let blocking_mask = if priority { SPRITE_BIT } else { SPRITE_BIT | PRIORITY_BIT };

    let mut status: u8 = 0;
    let mut pattern = pattern;
    for i in (0..8).rev() {
        let color = (pattern & 0x0F) as u8;
        pattern >>= 4;
        if color == 0 {
            continue;
        }

        let cell = &mut buffer.cells[base + i];
        let layer = (*cell >> 8) as u8;
        if layer & blocking_mask != 0 {
            // Blocked by an earlier sprite or a high-priority plane pixel.
            // A blocked low-priority pixel still flags the cell as sprite
            // so later sprites can collide with it.
            if !priority {
                *cell |= SPRITE_WORD;
            }
            status |= layer;
            continue;
        }

        let mut pixel = color | palette;
        if shadow_highlight {
            if layer & SHADOW_OP_BIT != 0 {
                // An operator was already applied here; the pixel is masked
                status |= layer;
                continue;
            }

            // Palette 3 colors 14 and 15 are the highlight and shadow
            // operators; they modify the cell instead of drawing
            if pixel == 0x3E {
                *cell |= HIGHLIGHT_WORD | SHADOW_OP_WORD;
                continue;
            }
            if pixel == 0x3F {
                *cell |= SHADOW_WORD | SHADOW_OP_WORD;
                continue;
            }

            let mut inherited = layer
                & if priority { HIGHLIGHT_BIT } else { SHADOW_BIT | HIGHLIGHT_BIT };
            if color == 0x0E {
                // Color 14 is never shadowed
                inherited &= !SHADOW_BIT;
            }
            pixel |= inherited;
        }

        *cell = u16::from(pixel) | SPRITE_WORD;
    }

    if status & SPRITE_BIT != 0 {
        *collision = true;
    }
}

/// Draws the cached sprites for the current line into the buffer.
pub(crate) fn render_sprite_line<C: PatternCache>(
    buffer: &mut LineBuffer,
    cache: &SpriteLineCache,
    state: &mut SpriteState,
    registers: &Registers,
    config: RendererConfig,
    patterns: &C,
    adjusted_line: u16,
) {
    let double_resolution = registers.interlacing_mode.is_double_resolution();
    let shadow_highlight = registers.shadow_highlight_flag;
    let h_pixels = i32::from(registers.horizontal_display_size.active_display_pixels());

    let line = i32::from(adjusted_line);
    let cache_id = (if double_resolution { line >> 1 } else { line }) as usize & 1;
    let count = usize::from(cache.counts[cache_id]);

    let pixel_count_max = if config.enforce_sprite_limits {
        registers.horizontal_display_size.max_sprite_pixels_per_line().into()
    } else {
        u32::MAX
    };
    let mut pixel_count: u32 = 0;

    let mut found_valid_x = state.dot_overflow_on_prev_line;
    let mut sprites_masked = false;

    for sprite in &cache.entries[cache_id][..count] {
        // A sprite at X = 0 (screen -128) masks all later sprites, but only
        // once a sprite with a nonzero X has been seen
        if sprite.h_position > -128 {
            found_valid_x = true;
        } else if found_valid_x {
            sprites_masked = true;
        }

        let width = i32::from(sprite.h_size_cells) * 8;
        let mut h_pos_min = i32::from(sprite.h_position);
        let mut h_pos_max = h_pos_min + width - 1;

        // Masked sprites still consume the pixel budget
        pixel_count += width as u32;
        if pixel_count > pixel_count_max {
            h_pos_max -= (pixel_count - pixel_count_max) as i32;
            if h_pos_max < h_pos_min {
                break;
            }
        }

        if sprites_masked {
            continue;
        }

        let sprite_row = line - i32::from(sprite.v_position);
        let (mut cell_offset, fine_row) = if double_resolution {
            ((sprite_row & !15) >> 4, sprite_row & 15)
        } else {
            ((sprite_row & !7) >> 3, sprite_row & 7)
        };
        let fine_row = fine_row as u16;

        let v_size_cells = i32::from(sprite.v_size_cells);
        let attributes = sprite.attributes;
        let palette = ((attributes >> 9) & 0x30) as u8;
        let priority = attributes.bit(15);

        if attributes.bit(12) {
            cell_offset = v_size_cells - 1 - cell_offset;
        }

        if attributes.bit(11) {
            // H flip: draw patterns last-to-first, right to left
            if h_pos_min < -7 {
                h_pos_min = -7;
            }
            h_pos_max -= 7;
            while h_pos_max >= h_pixels {
                h_pos_max -= 8;
                cell_offset += v_size_cells;
            }

            while h_pos_max >= h_pos_min {
                let pattern = fetch_sprite_pattern_row(
                    patterns,
                    double_resolution,
                    attributes,
                    cell_offset as u16,
                    fine_row,
                );
                put_line_sprite(
                    buffer,
                    h_pos_max,
                    pattern,
                    palette,
                    priority,
                    shadow_highlight,
                    &mut state.collision,
                );
                h_pos_max -= 8;
                cell_offset += v_size_cells;
            }
        } else {
            if h_pos_max >= h_pixels {
                h_pos_max = h_pixels;
            }
            while h_pos_min < -7 {
                h_pos_min += 8;
                cell_offset += v_size_cells;
            }

            while h_pos_min < h_pos_max {
                let pattern = fetch_sprite_pattern_row(
                    patterns,
                    double_resolution,
                    attributes,
                    cell_offset as u16,
                    fine_row,
                );
                put_line_sprite(
                    buffer,
                    h_pos_min,
                    pattern,
                    palette,
                    priority,
                    shadow_highlight,
                    &mut state.collision,
                );
                h_pos_min += 8;
                cell_offset += v_size_cells;
            }
        }
    }

    state.dot_overflow_on_prev_line = pixel_count > pixel_count_max;
}
