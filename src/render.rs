//! The top-level scanline renderer.

use crate::config::RendererConfig;
use crate::line_buffer::LineBuffer;
use crate::output;
use crate::patterns::PatternCache;
use crate::plane::{self, PlaneArgs};
use crate::registers::Registers;
use crate::sprites::{
    self, CachedSpriteData, MAX_SPRITES_PER_FRAME, SpriteLineCache, SpriteState,
};
use crate::vscroll::{self, ScrollPlane};
use crate::{Vram, Vsram};
use bincode::{Decode, Encode};

/// Everything a single line render borrows from the caller.
#[derive(Debug, Clone, Copy)]
pub struct LineArgs<'a> {
    pub vram: &'a Vram,
    pub vsram: &'a Vsram,
    pub registers: &'a Registers,
    /// Scanline number within the active display.
    pub line: u16,
    /// Frame parity from the timing driver; only matters for interlacing.
    pub odd_frame: bool,
}

/// Scanline renderer for Mode 5.
///
/// Holds the line buffer, the latched sprite attribute table, and the
/// double-buffered sprite line cache. One instance renders one display; all
/// memory and the output framebuffer are borrowed per call through
/// [`LineArgs`].
#[derive(Debug, Clone, Encode, Decode)]
pub struct LineRenderer {
    line_buffer: LineBuffer,
    sat_cache: [CachedSpriteData; MAX_SPRITES_PER_FRAME],
    sprite_cache: SpriteLineCache,
    sprite_state: SpriteState,
    config: RendererConfig,
}

impl LineRenderer {
    #[must_use]
    pub fn new(config: RendererConfig) -> Self {
        Self {
            line_buffer: LineBuffer::new(),
            sat_cache: [CachedSpriteData::default(); MAX_SPRITES_PER_FRAME],
            sprite_cache: SpriteLineCache::new(),
            sprite_state: SpriteState::default(),
            config,
        }
    }

    /// Prepares for a new frame: resets the sprite pixel overflow carry and
    /// evaluates sprites for the first line, which the hardware does during
    /// vertical blanking.
    pub fn begin_frame(&mut self, args: &LineArgs<'_>) {
        if !args.registers.display_enabled {
            return;
        }

        self.sprite_state.dot_overflow_on_prev_line = false;
        let overflow = sprites::update_sprite_line_cache(
            &mut self.sprite_cache,
            args.vram,
            args.registers,
            self.config,
            &self.sat_cache,
            -1,
            args.odd_frame,
        );
        if overflow {
            self.sprite_state.overflow = true;
        }
    }

    /// Re-latches the Y/size/link fields of every sprite attribute table
    /// entry from VRAM.
    ///
    /// Call after VRAM writes that touch the SAT. The hardware keeps these
    /// fields in an internal cache that only SAT-addressed writes update,
    /// which is why moving the SAT base register alone does not move the
    /// latched values.
    pub fn latch_sprite_attributes(&mut self, vram: &Vram, registers: &Registers) {
        sprites::latch_sprite_attributes(&mut self.sat_cache, vram, registers);
    }

    /// Renders one scanline into `frame_buffer_row`.
    ///
    /// The row must hold at least [`FRAME_BUFFER_LINE_WIDTH`] pixels. The
    /// palette carries 256 entries: 64 base colors plus shadowed (+0x40) and
    /// highlighted (+0x80) variants, with entry 0 aliased to the background
    /// color.
    ///
    /// [`FRAME_BUFFER_LINE_WIDTH`]: crate::FRAME_BUFFER_LINE_WIDTH
    ///
    /// # Panics
    ///
    /// Panics if `frame_buffer_row` is shorter than the line width.
    pub fn render_line<P, C>(
        &mut self,
        args: &LineArgs<'_>,
        patterns: &C,
        palette: &[P; 256],
        frame_buffer_row: &mut [P],
    ) where
        P: Copy + Default,
        C: PatternCache,
    {
        assert!(frame_buffer_row.len() >= output::FRAME_BUFFER_LINE_WIDTH);

        let registers = args.registers;
        if !registers.display_enabled {
            self.line_buffer.clear(false);
            self.sprite_state.dot_overflow_on_prev_line = false;
            output::flush_line(
                &self.line_buffer,
                registers,
                self.config,
                palette,
                frame_buffer_row,
            );
            return;
        }

        self.line_buffer.clear(registers.shadow_highlight_flag);

        let adjusted_line = vscroll::adjusted_line_number(
            registers.interlacing_mode,
            args.line,
            args.odd_frame,
            self.config.interlaced_render_mode,
        );

        let plane_args = PlaneArgs {
            vram: args.vram,
            vsram: args.vsram,
            registers,
            config: self.config,
            patterns,
            line: args.line,
            adjusted_line,
        };
        plane::render_scroll_plane(
            &mut self.line_buffer,
            &plane_args,
            ScrollPlane::B,
            0,
            registers.horizontal_display_size.active_display_cells(),
        );
        plane::render_scroll_a_and_window(&mut self.line_buffer, &plane_args);

        sprites::render_sprite_line(
            &mut self.line_buffer,
            &self.sprite_cache,
            &mut self.sprite_state,
            registers,
            self.config,
            patterns,
            adjusted_line,
        );

        // Evaluate sprites for the next line
        if args.line + 1 < registers.vertical_display_size.active_scanlines() {
            let overflow = sprites::update_sprite_line_cache(
                &mut self.sprite_cache,
                args.vram,
                registers,
                self.config,
                &self.sat_cache,
                i32::from(adjusted_line),
                args.odd_frame,
            );
            if overflow {
                self.sprite_state.overflow = true;
            }
        }

        output::flush_line(&self.line_buffer, registers, self.config, palette, frame_buffer_row);
    }

    /// Renders a border row (vertical blanking area).
    pub fn render_border_line<P: Copy + Default>(
        &self,
        palette: &[P; 256],
        frame_buffer_row: &mut [P],
    ) {
        output::render_border_line(self.config, palette, frame_buffer_row);
    }

    /// Sticky sprite overflow flag (status register bit 6).
    #[must_use]
    pub fn sprite_overflow_flag(&self) -> bool {
        self.sprite_state.overflow
    }

    /// Sticky sprite collision flag (status register bit 5).
    #[must_use]
    pub fn sprite_collision_flag(&self) -> bool {
        self.sprite_state.collision
    }

    /// Clears the sticky status flags, as a status register read does.
    pub fn clear_status_flags(&mut self) {
        self.sprite_state.overflow = false;
        self.sprite_state.collision = false;
    }

    #[must_use]
    pub fn config(&self) -> RendererConfig {
        self.config
    }

    pub fn reload_config(&mut self, config: RendererConfig) {
        self.config = config;
    }
}

impl Default for LineRenderer {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}
