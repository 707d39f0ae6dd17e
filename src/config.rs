//! Emulation-accuracy options for the renderer.
//!
//! These are configuration axes rather than VDP state: they select between
//! otherwise-identical compositing code paths and are expected to change
//! rarely (typically only from an options menu).

use bincode::{Decode, Encode};
use std::fmt::{Display, Formatter};

/// How to map one logical line onto the two physical scanlines of an
/// interlaced (double-resolution) frame when rendering at half vertical
/// resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterlacedRenderMode {
    #[default]
    EvenLines,
    OddLines,
    /// Alternate between even and odd lines based on frame parity,
    /// approximating the flicker of a real interlaced display.
    Flicker,
}

impl Display for InterlacedRenderMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EvenLines => write!(f, "Even lines only"),
            Self::OddLines => write!(f, "Odd lines only"),
            Self::Flicker => write!(f, "Alternate by frame (flicker)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RendererConfig {
    /// Enforce the hardware sprite-per-line and sprite-pixel-per-line limits.
    /// Disabling removes sprite flicker in games that exploit the limits, at
    /// the cost of accuracy (some games use them for intentional masking).
    pub enforce_sprite_limits: bool,
    /// Emulate the MD1/MD2 vertical scroll addressing bug that occurs when
    /// 2-cell vertical scrolling is combined with horizontal scrolling.
    /// When disabled, invalid columns read column 0 (MD3 behavior).
    pub emulate_vscroll_bug: bool,
    /// Fill the border regions with the background color. When disabled the
    /// borders are blanked instead.
    pub border_color_emulation: bool,
    pub interlaced_render_mode: InterlacedRenderMode,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            enforce_sprite_limits: true,
            emulate_vscroll_bug: true,
            border_color_emulation: true,
            interlaced_render_mode: InterlacedRenderMode::default(),
        }
    }
}
