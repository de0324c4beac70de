//! LED feedback for Push 2 pads and buttons.
//!
//! Every illuminated control carries its device address, a palette index
//! and a transition pattern. The pattern travels in the channel nibble of
//! the status byte.

use std::fmt;
use std::sync::Arc;

use super::mapping::{ButtonId, Push2Mapping};
use crate::surface::Surface;

/// Standard palette indices. These are reserved and never reallocated.
pub mod colors {
    pub const BLACK: u8 = 0;
    pub const WHITE: u8 = 122;
    pub const LIGHT_GRAY: u8 = 123;
    pub const DARK_GRAY: u8 = 124;
    pub const BLUE: u8 = 125;
    pub const GREEN: u8 = 126;
    pub const RED: u8 = 127;
}

/// Transition pattern between the previous and the new color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LedState {
    #[default]
    NoTransition = 0,
    OneShot24th,
    OneShot16th,
    OneShot8th,
    OneShot4th,
    OneShot2th,
    Pulsing24th,
    Pulsing16th,
    Pulsing8th,
    Pulsing4th,
    Pulsing2th,
    Blinking24th,
    Blinking16th,
    Blinking8th,
    Blinking4th,
    Blinking2th,
}

/// Device-side state of one illuminated control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Led {
    /// Note number for pads, controller number for buttons.
    pub extra: u8,
    pub color_index: u8,
    pub state: LedState,
}

impl Led {
    pub const fn new(extra: u8) -> Self {
        Self {
            extra,
            color_index: colors::BLACK,
            state: LedState::NoTransition,
        }
    }

    pub fn set(&mut self, color_index: u8, state: LedState) {
        self.color_index = color_index & 0x7f;
        self.state = state;
    }

    pub fn pad_message(&self) -> Vec<u8> {
        vec![0x90 | self.state as u8, self.extra, self.color_index]
    }

    pub fn button_message(&self) -> Vec<u8> {
        vec![0xB0 | self.state as u8, self.extra, self.color_index]
    }
}

/// What a pad shows while held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhenPressed {
    Nothing,
    /// Light up in the contrast color.
    #[default]
    FlashOn,
    /// Go dark.
    FlashOff,
}

/// One of the 64 grid pads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pad {
    pub x: u8,
    pub y: u8,
    pub led: Led,
    /// Note this pad plays. `None` while the pad is inactive.
    pub filtered: Option<u8>,
    /// Color to restore after a press.
    pub perma_color: u8,
    pub when_pressed: WhenPressed,
}

impl Pad {
    /// Pad at column `x`, row `y` (row 0 nearest the player).
    pub fn new(x: u8, y: u8) -> Self {
        Self {
            x,
            y,
            led: Led::new(Push2Mapping::pad_note(y, x)),
            filtered: None,
            perma_color: colors::BLACK,
            when_pressed: WhenPressed::FlashOn,
        }
    }

    pub fn address(&self) -> u8 {
        self.led.extra
    }

    /// Back to the inactive, dark state.
    pub fn reset(&mut self) {
        self.led.set(colors::BLACK, LedState::NoTransition);
        self.perma_color = colors::BLACK;
        self.filtered = None;
        self.when_pressed = WhenPressed::FlashOn;
    }
}

/// Button action run on the driver task.
pub type Handler = Arc<dyn Fn(&mut Surface) + Send + Sync>;

/// Press, release and long-press actions of one button.
#[derive(Clone, Default)]
pub struct Behavior {
    pub on_press: Option<Handler>,
    pub on_release: Option<Handler>,
    pub on_long_press: Option<Handler>,
}

impl Behavior {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn press(f: impl Fn(&mut Surface) + Send + Sync + 'static) -> Self {
        Self {
            on_press: Some(Arc::new(f)),
            ..Self::default()
        }
    }

    pub fn on_release(mut self, f: impl Fn(&mut Surface) + Send + Sync + 'static) -> Self {
        self.on_release = Some(Arc::new(f));
        self
    }

    pub fn on_long_press(mut self, f: impl Fn(&mut Surface) + Send + Sync + 'static) -> Self {
        self.on_long_press = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior")
            .field("on_press", &self.on_press.is_some())
            .field("on_release", &self.on_release.is_some())
            .field("on_long_press", &self.on_long_press.is_some())
            .finish()
    }
}

/// A physical button and what it does.
#[derive(Debug, Clone)]
pub struct Button {
    pub id: ButtonId,
    pub led: Led,
    pub behavior: Behavior,
}

impl Button {
    pub fn new(id: ButtonId, behavior: Behavior) -> Self {
        Self {
            id,
            led: Led::new(Push2Mapping::button_cc(id)),
            behavior,
        }
    }
}
