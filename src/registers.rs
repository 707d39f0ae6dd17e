//! VDP register state, decoded from raw register writes.
//!
//! Only the registers that affect Mode 5 rendering are decoded here; the
//! data port, DMA, and interrupt registers belong to the bus/timing layer.

use crate::num::GetBit;
use bincode::{Decode, Encode};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum VerticalScrollMode {
    #[default]
    FullScreen,
    TwoCell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum HorizontalScrollMode {
    #[default]
    FullScreen,
    Cell,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum HorizontalDisplaySize {
    #[default]
    ThirtyTwoCell,
    FortyCell,
}

impl Display for HorizontalDisplaySize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ThirtyTwoCell => write!(f, "H32 (256px)"),
            Self::FortyCell => write!(f, "H40 (320px)"),
        }
    }
}

impl HorizontalDisplaySize {
    pub const fn active_display_pixels(self) -> u16 {
        match self {
            Self::ThirtyTwoCell => 256,
            Self::FortyCell => 320,
        }
    }

    pub const fn active_display_cells(self) -> u16 {
        match self {
            Self::ThirtyTwoCell => 32,
            Self::FortyCell => 40,
        }
    }

    /// Number of SAT entries the hardware can address (also the per-frame
    /// sprite traversal limit).
    pub const fn sprite_table_len(self) -> u16 {
        match self {
            Self::ThirtyTwoCell => 64,
            Self::FortyCell => 80,
        }
    }

    pub const fn max_sprites_per_line(self) -> u16 {
        match self {
            Self::ThirtyTwoCell => 16,
            Self::FortyCell => 20,
        }
    }

    /// The sprite pixel-per-line budget equals the display width.
    pub const fn max_sprite_pixels_per_line(self) -> u16 {
        self.active_display_pixels()
    }

    /// Shift for one row of the window nametable (32 or 64 cells wide).
    pub const fn window_width_shift(self) -> u16 {
        match self {
            Self::ThirtyTwoCell => 5,
            Self::FortyCell => 6,
        }
    }

    pub const fn sprite_attribute_table_mask(self) -> u16 {
        // SAT A9 is ignored in H40 mode
        match self {
            Self::ThirtyTwoCell => !0,
            Self::FortyCell => !0x03FF,
        }
    }

    pub const fn window_nt_addr_mask(self) -> u16 {
        // Window nametable A11 is ignored in H40 mode
        match self {
            Self::ThirtyTwoCell => !0,
            Self::FortyCell => !0x0800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum VerticalDisplaySize {
    #[default]
    TwentyEightCell,
    ThirtyCell,
}

impl VerticalDisplaySize {
    pub const fn active_scanlines(self) -> u16 {
        match self {
            Self::TwentyEightCell => 224,
            Self::ThirtyCell => 240,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum InterlacingMode {
    #[default]
    Progressive,
    Interlaced,
    /// Interlaced mode 2: double vertical resolution, 8x16 cells.
    InterlacedDouble,
}

impl Display for InterlacingMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Progressive => write!(f, "Progressive"),
            Self::Interlaced => write!(f, "Interlaced"),
            Self::InterlacedDouble => write!(f, "Interlaced 2x resolution"),
        }
    }
}

impl InterlacingMode {
    pub const fn is_double_resolution(self) -> bool {
        matches!(self, Self::InterlacedDouble)
    }

    pub const fn cell_height(self) -> u16 {
        match self {
            Self::Progressive | Self::Interlaced => 8,
            Self::InterlacedDouble => 16,
        }
    }

    pub const fn cell_height_shift(self) -> u16 {
        match self {
            Self::Progressive | Self::Interlaced => 3,
            Self::InterlacedDouble => 4,
        }
    }

    pub const fn fine_row_mask(self) -> u16 {
        self.cell_height() - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum ScrollSize {
    #[default]
    ThirtyTwo,
    SixtyFour,
    OneTwentyEight,
}

impl ScrollSize {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0x00 => Self::ThirtyTwo,
            0x01 => Self::SixtyFour,
            0x03 => Self::OneTwentyEight,
            0x02 => {
                log::warn!("Prohibited scroll size set; defaulting to 32");
                Self::ThirtyTwo
            }
            _ => unreachable!("value & 0x03 is always <= 0x03"),
        }
    }

    pub const fn cell_mask(self) -> u16 {
        match self {
            Self::ThirtyTwo => 31,
            Self::SixtyFour => 63,
            Self::OneTwentyEight => 127,
        }
    }

    /// Shift for one nametable row at this plane width.
    pub const fn row_shift(self) -> u16 {
        match self {
            Self::ThirtyTwo => 5,
            Self::SixtyFour => 6,
            Self::OneTwentyEight => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum WindowHorizontalMode {
    #[default]
    LeftToCenter,
    CenterToRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum WindowVerticalMode {
    #[default]
    TopToCenter,
    CenterToBottom,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Registers {
    // Register #0: Mode set register 1
    pub left_column_blank: bool,
    // Register #1: Mode set register 2
    pub display_enabled: bool,
    pub vertical_display_size: VerticalDisplaySize,
    // Register #2: Scroll A nametable base address (bits 15-13)
    pub scroll_a_base_nt_addr: u16,
    // Register #3: Window nametable base address (bits 15-11)
    pub window_base_nt_addr: u16,
    // Register #4: Scroll B nametable base address (bits 15-13)
    pub scroll_b_base_nt_addr: u16,
    // Register #5: Sprite attribute table base address (bits 15-9)
    pub sprite_attribute_table_base_addr: u16,
    // Register #7: Background color
    pub background_palette: u8,
    pub background_color_id: u8,
    // Register #11: Mode set register 3
    pub vertical_scroll_mode: VerticalScrollMode,
    pub horizontal_scroll_mode: HorizontalScrollMode,
    // Register #12: Mode set register 4
    pub horizontal_display_size: HorizontalDisplaySize,
    pub shadow_highlight_flag: bool,
    pub interlacing_mode: InterlacingMode,
    // Register #13: Horizontal scroll table base address (bits 15-10)
    pub h_scroll_table_base_addr: u16,
    // Register #16: Scroll plane sizes
    pub vertical_scroll_size: ScrollSize,
    pub horizontal_scroll_size: ScrollSize,
    // Register #17: Window horizontal position
    pub window_horizontal_mode: WindowHorizontalMode,
    pub window_x_position: u16,
    // Register #18: Window vertical position
    pub window_vertical_mode: WindowVerticalMode,
    pub window_y_position: u16,
}

impl Registers {
    #[must_use]
    pub fn new() -> Self {
        Self {
            left_column_blank: false,
            display_enabled: false,
            vertical_display_size: VerticalDisplaySize::default(),
            scroll_a_base_nt_addr: 0,
            window_base_nt_addr: 0,
            scroll_b_base_nt_addr: 0,
            sprite_attribute_table_base_addr: 0,
            background_palette: 0,
            background_color_id: 0,
            vertical_scroll_mode: VerticalScrollMode::default(),
            horizontal_scroll_mode: HorizontalScrollMode::default(),
            horizontal_display_size: HorizontalDisplaySize::default(),
            shadow_highlight_flag: false,
            interlacing_mode: InterlacingMode::default(),
            h_scroll_table_base_addr: 0,
            vertical_scroll_size: ScrollSize::default(),
            horizontal_scroll_size: ScrollSize::default(),
            window_horizontal_mode: WindowHorizontalMode::default(),
            window_x_position: 0,
            window_vertical_mode: WindowVerticalMode::default(),
            window_y_position: 0,
        }
    }

    pub fn write_register(&mut self, register: u8, value: u8) {
        log::trace!("Wrote register #{register} with value {value:02X}");

        match register {
            0 => {
                // Register #0: Mode set register 1
                self.left_column_blank = value.bit(5);
            }
            1 => {
                // Register #1: Mode set register 2
                self.display_enabled = value.bit(6);
                self.vertical_display_size = if value.bit(3) {
                    VerticalDisplaySize::ThirtyCell
                } else {
                    VerticalDisplaySize::TwentyEightCell
                };
            }
            2 => {
                self.scroll_a_base_nt_addr = u16::from(value & 0x38) << 10;
            }
            3 => {
                self.window_base_nt_addr = u16::from(value & 0x3E) << 10;
            }
            4 => {
                self.scroll_b_base_nt_addr = u16::from(value & 0x07) << 13;
            }
            5 => {
                self.sprite_attribute_table_base_addr = u16::from(value & 0x7F) << 9;
            }
            7 => {
                self.background_palette = (value >> 4) & 0x03;
                self.background_color_id = value & 0x0F;
            }
            11 => {
                // Register #11: Mode set register 3
                self.vertical_scroll_mode = if value.bit(2) {
                    VerticalScrollMode::TwoCell
                } else {
                    VerticalScrollMode::FullScreen
                };
                self.horizontal_scroll_mode = match value & 0x03 {
                    0x00 => HorizontalScrollMode::FullScreen,
                    0x02 => HorizontalScrollMode::Cell,
                    0x03 => HorizontalScrollMode::Line,
                    0x01 => {
                        log::warn!(
                            "Prohibited horizontal scroll mode set; defaulting to full scroll"
                        );
                        HorizontalScrollMode::FullScreen
                    }
                    _ => unreachable!("value & 0x03 is always <= 0x03"),
                };
            }
            12 => {
                // Register #12: Mode set register 4
                self.horizontal_display_size = if value.bit(7) || value.bit(0) {
                    HorizontalDisplaySize::FortyCell
                } else {
                    HorizontalDisplaySize::ThirtyTwoCell
                };
                self.shadow_highlight_flag = value.bit(3);
                self.interlacing_mode = match value & 0x06 {
                    0x00 | 0x04 => InterlacingMode::Progressive,
                    0x02 => InterlacingMode::Interlaced,
                    0x06 => InterlacingMode::InterlacedDouble,
                    _ => unreachable!("value & 0x06 is always 0x00/0x02/0x04/0x06"),
                };
            }
            13 => {
                self.h_scroll_table_base_addr = u16::from(value & 0x3F) << 10;
            }
            16 => {
                self.vertical_scroll_size = ScrollSize::from_bits(value >> 4);
                self.horizontal_scroll_size = ScrollSize::from_bits(value);
            }
            17 => {
                self.window_horizontal_mode = if value.bit(7) {
                    WindowHorizontalMode::CenterToRight
                } else {
                    WindowHorizontalMode::LeftToCenter
                };
                self.window_x_position = u16::from(value & 0x1F) << 1;
            }
            18 => {
                self.window_vertical_mode = if value.bit(7) {
                    WindowVerticalMode::CenterToBottom
                } else {
                    WindowVerticalMode::TopToCenter
                };
                self.window_y_position = (value & 0x1F).into();
            }
            _ => {}
        }
    }

    pub fn masked_sprite_attribute_table_addr(&self) -> u16 {
        self.sprite_attribute_table_base_addr
            & self.horizontal_display_size.sprite_attribute_table_mask()
    }

    pub fn masked_window_nt_addr(&self) -> u16 {
        self.window_base_nt_addr & self.horizontal_display_size.window_nt_addr_mask()
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
