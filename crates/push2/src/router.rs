//! Input event routing: buttons, encoders, touches and pads.
//!
//! Button presses start a long-press timer. A long press runs the
//! button's long-press action once and swallows the following release.

use padbridge_core::{Direction, GainControl, SurfaceEvent};

use crate::midi::codec::{self, DeviceReport, Event};
use crate::midi::{colors, Behavior, ButtonId, LedState, Push2Mapping, WhenPressed};
use crate::surface::{Context, Modifiers, Surface};

/// How long a button must be held to count as a long press.
pub const LONG_PRESS_MS: u64 = 500;

impl Surface {
    /// Route one decoded input event.
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Controller { number, value } => self.handle_controller(number, value),
            Event::NoteOn { note, velocity } if velocity == 0 => self.handle_note_off(note),
            Event::NoteOn { note, velocity } => self.handle_note_on(note, velocity),
            Event::NoteOff { note, .. } => self.handle_note_off(note),
            Event::Sysex { payload } => self.handle_sysex(&payload),
            // Touch strip position; nothing listens to it.
            Event::PitchBend { .. } => {}
        }
    }

    fn handle_controller(&mut self, number: u8, value: u8) {
        if value != 0 {
            // Any press cancels every pending long press.
            self.long_press.clear();
        }

        let Some(id) = Push2Mapping::button_for_cc(number) else {
            self.handle_encoder(number, value);
            return;
        };

        let pressed = value != 0;
        if pressed {
            self.held.insert(id);
            self.schedule_long_press(id);
        } else {
            self.held.remove(&id);
            self.long_press.remove(&id);
        }

        if self.consumed.remove(&id) {
            tracing::trace!("{:?} was consumed by a long press", id);
            return;
        }

        let handler = self.buttons.get(&id).and_then(|button| {
            if pressed {
                button.behavior.on_press.clone()
            } else {
                button.behavior.on_release.clone()
            }
        });

        if let Some(handler) = handler {
            handler(self);
        }
    }

    /// Long-press timer for `id` fired. Stale tickets are ignored.
    pub fn long_press_expired(&mut self, id: ButtonId, ticket: u64) {
        if self.long_press.get(&id) != Some(&ticket) {
            return;
        }
        self.long_press.remove(&id);

        if !self.held.contains(&id) {
            return;
        }

        tracing::debug!("long press on {:?}", id);
        let handler = self
            .buttons
            .get(&id)
            .and_then(|button| button.behavior.on_long_press.clone());
        if let Some(handler) = handler {
            handler(self);
        }
        self.consumed.insert(id);
    }

    fn handle_encoder(&mut self, number: u8, value: u8) {
        let delta = Push2Mapping::encoder_delta(value);

        if (Push2Mapping::ENCODER_1..=Push2Mapping::ENCODER_8).contains(&number) {
            self.notify(SurfaceEvent::StripVpot {
                index: number - Push2Mapping::ENCODER_1,
                delta,
            });
            return;
        }

        match Push2Mapping::other_encoder(number) {
            Some(1) => {
                if let Some(gain) = self.session.click_gain() {
                    nudge_gain(gain.as_ref(), delta);
                }
            }
            Some(2) => {
                if let Some(gain) = self.session.master_gain() {
                    nudge_gain(gain.as_ref(), delta);
                }
            }
            // Tempo encoder and anything unknown.
            _ => tracing::trace!("encoder cc {} ignored", number),
        }
    }

    fn handle_note_on(&mut self, note: u8, velocity: u8) {
        let touching = velocity > 64;

        if note <= Push2Mapping::STRIP_TOUCH_LAST {
            self.notify(SurfaceEvent::StripVpotTouch {
                index: note,
                touching,
            });
        } else if let Some(n) = Push2Mapping::other_encoder_touch(note) {
            self.other_vpot_touch(n, touching);
        } else if note == Push2Mapping::TOUCH_STRIP && velocity < 64 {
            self.session.transport_stop();
        }

        if note < Push2Mapping::FIRST_NON_ENCODER_NOTE {
            return;
        }

        let Some(pad) = self.pads.get(note) else {
            return;
        };

        if self.context() == Context::Cue {
            let (x, y) = (pad.x, pad.y);
            self.notify(SurfaceEvent::PadPressed { x, y });
            return;
        }

        let Some(filtered) = pad.filtered else {
            return;
        };

        let addresses = self.pads.pads_for_note(filtered).to_vec();
        for address in addresses {
            let contrast = self.contrast_color;
            if let Some(pad) = self.pads.get_mut(address) {
                match pad.when_pressed {
                    WhenPressed::FlashOn => pad.led.set(contrast, LedState::NoTransition),
                    WhenPressed::FlashOff => pad.led.set(colors::BLACK, LedState::NoTransition),
                    WhenPressed::Nothing => {}
                }
            }
            self.write_pad(address);
        }
    }

    fn handle_note_off(&mut self, note: u8) {
        // Encoder touch release arrives as a note on with low velocity.
        if note < Push2Mapping::FIRST_NON_ENCODER_NOTE {
            return;
        }

        let Some(pad) = self.pads.get(note) else {
            return;
        };

        if self.context() == Context::Cue {
            let (x, y) = (pad.x, pad.y);
            self.notify(SurfaceEvent::PadReleased { x, y });
            return;
        }

        let Some(filtered) = pad.filtered else {
            return;
        };

        let addresses = self.pads.pads_for_note(filtered).to_vec();
        for address in addresses {
            if let Some(pad) = self.pads.get_mut(address) {
                let perma = pad.perma_color;
                pad.led.set(perma, LedState::NoTransition);
            }
            self.write_pad(address);
        }
    }

    fn handle_sysex(&mut self, payload: &[u8]) {
        match codec::parse_sysex(payload) {
            Some(DeviceReport::PressureMode(mode)) => {
                tracing::debug!("device pressure mode {:?}", mode);
                self.pressure_mode = mode;
                self.notify(SurfaceEvent::PressureModeChanged(mode));
            }
            None => tracing::trace!("sysex ignored ({} bytes)", payload.len()),
        }
    }

    fn other_vpot_touch(&mut self, n: u8, touching: bool) {
        // Only the master encoder records touch automation.
        if n != 2 {
            return;
        }
        if let Some(gain) = self.session.master_gain() {
            let now = self.session.audible_sample();
            if touching {
                gain.start_touch(now);
            } else {
                gain.stop_touch(now);
            }
        }
    }

    pub fn start_shift(&mut self) {
        self.modifiers.insert(Modifiers::SHIFT);
        self.set_button(ButtonId::Shift, colors::WHITE, LedState::Blinking16th);
    }

    pub fn end_shift(&mut self) {
        if self.modifiers.contains(Modifiers::SHIFT) {
            self.modifiers.remove(Modifiers::SHIFT);
            self.long_press.remove(&ButtonId::Shift);
            self.set_button(ButtonId::Shift, colors::WHITE, LedState::OneShot24th);
        }
    }

    pub fn start_select(&mut self) {
        self.modifiers.insert(Modifiers::SELECT);
        self.set_button(ButtonId::Select, colors::WHITE, LedState::Blinking16th);
    }

    pub fn end_select(&mut self) {
        if self.modifiers.contains(Modifiers::SELECT) {
            self.modifiers.remove(Modifiers::SELECT);
            self.long_press.remove(&ButtonId::Select);
            self.set_button(ButtonId::Select, colors::WHITE, LedState::OneShot24th);
        }
    }

    fn toggle_context(&mut self, context: Context) {
        if self.context() == context {
            self.use_previous_context();
        } else {
            self.set_context(context);
        }
    }
}

fn nudge_gain(gain: &dyn GainControl, delta: i8) {
    let value = (gain.interface_value() + delta as f64 / 256.0)
        .max(gain.lower())
        .min(gain.upper());
    gain.set_interface_value(value);
}

fn strip_button(upper: bool, index: u8) -> Behavior {
    Behavior::press(move |s| s.notify(SurfaceEvent::StripButton { upper, index }))
}

fn navigate(direction: Direction) -> Behavior {
    Behavior::press(move |s| s.notify(SurfaceEvent::Navigate(direction)))
}

/// What each button does until the host rebinds it.
pub(crate) fn default_behavior(id: ButtonId) -> Behavior {
    if let Some(index) = Push2Mapping::UPPER.iter().position(|b| *b == id) {
        return strip_button(true, index as u8);
    }
    if let Some(index) = Push2Mapping::LOWER.iter().position(|b| *b == id) {
        return strip_button(false, index as u8);
    }

    match id {
        ButtonId::Play => Behavior::press(|s| {
            if s.session.transport_rolling() {
                s.session.transport_stop();
            } else {
                s.session.transport_play();
            }
        }),
        ButtonId::RecordEnable => Behavior::press(|s| s.session.toggle_record_enable()),
        ButtonId::Metronome => Behavior::press(|s| {
            let clicking = s.session.clicking();
            s.session.set_clicking(!clicking);
        }),
        ButtonId::Undo => Behavior::press(|s| {
            if s.shifted() {
                s.session.redo();
            } else {
                s.session.undo();
            }
        }),
        ButtonId::Solo => Behavior::press(|s| s.session.toggle_selection_solo())
            .on_long_press(|s| s.session.cancel_all_solo()),
        ButtonId::Stop => Behavior::press(|s| s.stop_down = true)
            .on_release(|s| s.stop_down = false)
            .on_long_press(|s| s.session.transport_stop()),
        ButtonId::OctaveUp => Behavior::press(|s| s.set_octave_shift(s.octave_shift() + 1)),
        ButtonId::OctaveDown => Behavior::press(|s| s.set_octave_shift(s.octave_shift() - 1)),
        ButtonId::Layout => Behavior::press(|s| {
            let percussive = s.percussive();
            s.set_percussive_mode(!percussive);
        }),
        ButtonId::Scale => Behavior::press(|s| s.toggle_context(Context::Scale)),
        ButtonId::Mix => Behavior::press(|s| {
            if s.context() == Context::Mix {
                s.set_context(Context::TrackMix);
            } else {
                s.set_context(Context::Mix);
            }
        }),
        ButtonId::Session => Behavior::press(|s| s.toggle_context(Context::Cue)),
        ButtonId::Shift => Behavior::press(Surface::start_shift).on_release(Surface::end_shift),
        ButtonId::Select => Behavior::press(Surface::start_select).on_release(Surface::end_select),
        ButtonId::Up => navigate(Direction::Up),
        ButtonId::Down => navigate(Direction::Down),
        ButtonId::Left => navigate(Direction::Left),
        ButtonId::Right => navigate(Direction::Right),
        ButtonId::PageLeft => navigate(Direction::PageLeft),
        ButtonId::PageRight => navigate(Direction::PageRight),
        _ => Behavior::none(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use padbridge_core::PressureMode;
    use parking_lot::Mutex;

    use super::*;
    use crate::surface::tests::{surface, writes};
    use crate::surface::Effect;

    fn cc(number: u8, value: u8) -> Event {
        Event::Controller { number, value }
    }

    fn ticket_for(effects: &[Effect], id: ButtonId) -> u64 {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::ScheduleLongPress { button, ticket } if *button == id => Some(*ticket),
                _ => None,
            })
            .unwrap()
    }

    #[derive(Default)]
    struct FakeGain {
        value: Mutex<f64>,
        touches: Mutex<Vec<(bool, u64)>>,
    }

    impl GainControl for FakeGain {
        fn interface_value(&self) -> f64 {
            *self.value.lock()
        }
        fn set_interface_value(&self, value: f64) {
            *self.value.lock() = value;
        }
        fn start_touch(&self, when: u64) {
            self.touches.lock().push((true, when));
        }
        fn stop_touch(&self, when: u64) {
            self.touches.lock().push((false, when));
        }
    }

    #[test]
    fn test_play_toggles_transport() {
        let (mut surface, session) = surface();
        surface.handle_event(cc(85, 127));
        surface.handle_event(cc(85, 0));
        surface.handle_event(cc(85, 127));
        assert_eq!(session.calls(), vec!["play", "stop"]);
    }

    #[test]
    fn test_long_press_fires_once_and_swallows_release() {
        let (mut surface, session) = surface();

        surface.handle_event(cc(61, 127));
        let ticket = ticket_for(&surface.take_effects(), ButtonId::Solo);
        assert_eq!(session.calls(), vec!["solo"]);

        surface.long_press_expired(ButtonId::Solo, ticket);
        surface.long_press_expired(ButtonId::Solo, ticket);
        assert_eq!(session.calls(), vec!["solo", "cancel_solo"]);

        // Release is consumed; the next press behaves normally.
        surface.handle_event(cc(61, 0));
        surface.handle_event(cc(61, 127));
        assert_eq!(session.calls(), vec!["solo", "cancel_solo", "solo"]);
    }

    #[test]
    fn test_any_press_cancels_pending_long_press() {
        let (mut surface, session) = surface();

        surface.handle_event(cc(29, 127));
        let ticket = ticket_for(&surface.take_effects(), ButtonId::Stop);
        assert!(surface.stop_down());

        surface.handle_event(cc(49, 127));
        surface.long_press_expired(ButtonId::Stop, ticket);
        assert!(session.calls().is_empty());

        surface.handle_event(cc(29, 0));
        assert!(!surface.stop_down());
    }

    #[test]
    fn test_release_before_timer_runs_release_handler() {
        let (mut surface, session) = surface();
        surface.handle_event(cc(29, 127));
        let ticket = ticket_for(&surface.take_effects(), ButtonId::Stop);
        surface.handle_event(cc(29, 0));
        surface.long_press_expired(ButtonId::Stop, ticket);

        assert!(!surface.stop_down());
        assert!(session.calls().is_empty());
    }

    #[test]
    fn test_shift_long_press_latches() {
        let (mut surface, session) = surface();

        surface.handle_event(cc(49, 127));
        let ticket = ticket_for(&surface.take_effects(), ButtonId::Shift);
        assert!(surface.shifted());
        assert_eq!(
            surface.button(ButtonId::Shift).unwrap().led.state,
            LedState::Blinking16th
        );

        surface.long_press_expired(ButtonId::Shift, ticket);
        surface.handle_event(cc(49, 0));
        assert!(surface.shifted());

        surface.handle_event(cc(119, 127));
        assert_eq!(session.calls(), vec!["redo"]);

        surface.handle_event(cc(49, 127));
        surface.handle_event(cc(49, 0));
        assert!(!surface.shifted());
        assert_eq!(
            surface.button(ButtonId::Shift).unwrap().led.state,
            LedState::OneShot24th
        );
    }

    #[test]
    fn test_strip_encoder_and_buttons_notify() {
        let (mut surface, _) = surface();
        surface.handle_event(cc(73, 1));
        surface.handle_event(cc(78, 127));
        surface.handle_event(cc(104, 127));
        surface.handle_event(cc(21, 127));
        surface.handle_event(cc(45, 127));

        let notes: Vec<SurfaceEvent> = surface
            .take_effects()
            .into_iter()
            .filter_map(|e| match e {
                Effect::Notify(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(
            notes,
            vec![
                SurfaceEvent::StripVpot { index: 2, delta: 1 },
                SurfaceEvent::StripVpot {
                    index: 7,
                    delta: -1
                },
                SurfaceEvent::StripButton {
                    upper: true,
                    index: 2
                },
                SurfaceEvent::StripButton {
                    upper: false,
                    index: 1
                },
                SurfaceEvent::Navigate(Direction::Right),
            ]
        );
    }

    #[test]
    fn test_master_gain_encoder_and_touch() {
        let (mut surface, session) = surface();
        let gain = Arc::new(FakeGain::default());
        *gain.value.lock() = 0.5;
        *session.master.lock() = Some(gain.clone());

        surface.handle_event(cc(79, 64));
        assert!((*gain.value.lock() - 0.25).abs() < 1e-9);

        // Clamped at the lower bound.
        for _ in 0..10 {
            surface.handle_event(cc(79, 64));
        }
        assert_eq!(*gain.value.lock(), 0.0);

        surface.handle_event(Event::NoteOn {
            note: 8,
            velocity: 127,
        });
        surface.handle_event(Event::NoteOn {
            note: 8,
            velocity: 64,
        });
        assert_eq!(*gain.touches.lock(), vec![(true, 4800), (false, 4800)]);
    }

    #[test]
    fn test_touch_strip_release_stops_transport() {
        let (mut surface, session) = surface();
        surface.handle_event(Event::NoteOn {
            note: 12,
            velocity: 10,
        });
        surface.handle_event(Event::NoteOn {
            note: 12,
            velocity: 127,
        });
        assert_eq!(session.calls(), vec!["stop"]);
    }

    #[test]
    fn test_pad_press_flashes_every_pad_with_note() {
        let (mut surface, _) = surface();
        surface.contrast_color = 90;
        // C major fourths: note 41 sits at row 0 col 3 (39) and row 1 col 0 (44).
        assert_eq!(surface.pads.pads_for_note(41), &[39, 44]);

        surface.handle_event(Event::NoteOn {
            note: 39,
            velocity: 100,
        });
        let out = writes(&surface.take_effects());
        assert_eq!(out, vec![vec![0x90, 39, 0], vec![0x90, 44, 0]]);

        surface.handle_event(Event::NoteOn {
            note: 44,
            velocity: 0,
        });
        let out = writes(&surface.take_effects());
        assert_eq!(
            out,
            vec![
                vec![0x90, 39, colors::WHITE],
                vec![0x90, 44, colors::WHITE]
            ]
        );
    }

    #[test]
    fn test_out_of_scale_pad_flashes_contrast() {
        let (mut surface, _) = surface();
        surface.contrast_color = 90;
        surface.set_pad_scale(crate::scale::ScaleConfig {
            in_key: false,
            ..Default::default()
        });
        surface.take_effects();

        // Note 37 (C#) is out of C major.
        surface.handle_event(Event::NoteOn {
            note: 37,
            velocity: 100,
        });
        assert_eq!(writes(&surface.take_effects())[0], vec![0x90, 37, 90]);
    }

    #[test]
    fn test_cue_context_reports_pad_coordinates() {
        let (mut surface, _) = surface();
        surface.set_context(Context::Cue);
        surface.take_effects();

        surface.handle_event(Event::NoteOn {
            note: 36 + 8 * 2 + 5,
            velocity: 100,
        });
        surface.handle_event(Event::NoteOff {
            note: 36 + 8 * 2 + 5,
            velocity: 0,
        });
        assert_eq!(
            surface.take_effects(),
            vec![
                Effect::Notify(SurfaceEvent::PadPressed { x: 5, y: 2 }),
                Effect::Notify(SurfaceEvent::PadReleased { x: 5, y: 2 }),
            ]
        );
    }

    #[test]
    fn test_pressure_mode_report() {
        let (mut surface, _) = surface();
        surface.handle_event(Event::Sysex {
            payload: vec![0xF0, 0x00, 0x21, 0x1D, 0x01, 0x01, 0x1F, 0x01, 0xF7],
        });
        assert_eq!(surface.pressure_mode(), PressureMode::PolyPressure);
    }

    #[test]
    fn test_octave_buttons_shift_snapshot() {
        let (mut surface, _) = surface();
        let handle = surface.snapshot_handle();
        surface.handle_event(cc(55, 127));
        surface.handle_event(cc(55, 0));
        surface.handle_event(cc(55, 127));
        assert_eq!(handle.load().octave_shift, 2);
        surface.handle_event(cc(54, 127));
        assert_eq!(handle.load().octave_shift, 1);
    }

    #[test]
    fn test_rebinding_replaces_default() {
        let (mut surface, session) = surface();
        surface.bind(
            ButtonId::Play,
            Behavior::press(|s| s.notify(SurfaceEvent::ScaleChanged)),
        );
        surface.handle_event(cc(85, 127));
        assert!(session.calls().is_empty());
        assert!(surface
            .take_effects()
            .contains(&Effect::Notify(SurfaceEvent::ScaleChanged)));
    }
}
