//! Session state to LED translation and pad-port wiring.

use std::sync::Arc;

use padbridge_core::{MidiTrack, RecordStatus, SessionNotification};

use crate::midi::{colors, ButtonId, LedState};
use crate::surface::{Surface, SHADOW_PORT_NAME};

pub fn record_led(status: RecordStatus) -> (u8, LedState) {
    match status {
        RecordStatus::Disabled => (colors::WHITE, LedState::NoTransition),
        RecordStatus::Enabled => (colors::RED, LedState::Blinking4th),
        RecordStatus::Recording => (colors::RED, LedState::OneShot24th),
    }
}

pub fn transport_led(rolling: bool) -> (u8, LedState) {
    if rolling {
        (colors::GREEN, LedState::OneShot24th)
    } else {
        (colors::WHITE, LedState::NoTransition)
    }
}

pub fn metronome_led(clicking: bool) -> (u8, LedState) {
    if clicking {
        (colors::WHITE, LedState::Blinking4th)
    } else {
        (colors::WHITE, LedState::NoTransition)
    }
}

pub fn solo_led(active: bool) -> (u8, LedState) {
    if active {
        (colors::RED, LedState::Blinking4th)
    } else {
        (colors::WHITE, LedState::NoTransition)
    }
}

impl Surface {
    pub fn handle_session_notification(&mut self, notification: SessionNotification) {
        match notification {
            SessionNotification::RecordStateChanged => {
                let (color, state) = record_led(self.session.record_status());
                self.set_button(ButtonId::RecordEnable, color, state);
            }
            SessionNotification::TransportStateChanged => {
                let rolling = self.session.transport_rolling();
                let (color, state) = transport_led(rolling);
                self.set_button(ButtonId::Play, color, state);
                if !rolling {
                    self.set_button_color(ButtonId::FixedLength, colors::BLACK);
                }
            }
            SessionNotification::TransportLooped => {}
            SessionNotification::ParameterChanged(name) => {
                if name == "clicking" {
                    let (color, state) = metronome_led(self.session.clicking());
                    self.set_button(ButtonId::Metronome, color, state);
                }
            }
            SessionNotification::SoloActiveChanged(active) => {
                let (color, state) = solo_led(active);
                self.set_button(ButtonId::Solo, color, state);
            }
            SessionNotification::SelectionChanged => self.stripable_selection_changed(),
            SessionNotification::SelectedTrackColorChanged => self.update_selection_color(),
        }
    }

    /// Follow the selection: wire the pad port to the first selected MIDI
    /// track and take on its color.
    pub fn stripable_selection_changed(&mut self) {
        let new_target = self.session.selected_midi_track();

        let same = match (&self.current_pad_target, &new_target) {
            (Some(a), Some(b)) => a.id() == b.id(),
            (None, None) => true,
            _ => false,
        };

        if !same {
            if let Some(old) = self.current_pad_target.take() {
                // Notes still sounding on the old track are not resolved here.
                if let Err(e) = old.disconnect_input(SHADOW_PORT_NAME) {
                    tracing::warn!("could not disconnect pads from track {}: {}", old.id(), e);
                }
            }

            match new_target {
                Some(track) => {
                    if let Err(e) = track.connect_input(SHADOW_PORT_NAME) {
                        tracing::warn!("could not connect pads to track {}: {}", track.id(), e);
                    }
                    tracing::info!("pads now play track {}", track.id());
                    self.apply_track_colors(&track);
                    self.current_pad_target = Some(track);
                }
                None => {
                    self.selection_color = colors::GREEN;
                    self.contrast_color = colors::GREEN;
                }
            }

            self.reset_pad_colors();
        }
    }

    /// Recompute selection and contrast colors after the target track's
    /// color changed.
    pub fn update_selection_color(&mut self) {
        let Some(track) = self.current_pad_target.clone() else {
            return;
        };
        self.apply_track_colors(&track);
        self.reset_pad_colors();
    }

    fn apply_track_colors(&mut self, track: &Arc<dyn MidiTrack>) {
        let color = track.color();
        self.selection_color = self.resolve_color(color);
        self.contrast_color = self.resolve_color(color.opposite());
    }

    pub fn pad_target(&self) -> Option<&Arc<dyn MidiTrack>> {
        self.current_pad_target.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use padbridge_core::{HostError, Rgba, TrackId};
    use parking_lot::Mutex;

    use super::*;
    use crate::midi::codec;
    use crate::surface::tests::{surface, writes};

    struct FakeTrack {
        id: TrackId,
        color: Mutex<Rgba>,
        wiring: Mutex<Vec<String>>,
    }

    impl FakeTrack {
        fn new(id: TrackId, color: Rgba) -> Arc<Self> {
            Arc::new(Self {
                id,
                color: Mutex::new(color),
                wiring: Mutex::new(Vec::new()),
            })
        }
    }

    impl MidiTrack for FakeTrack {
        fn id(&self) -> TrackId {
            self.id
        }
        fn color(&self) -> Rgba {
            *self.color.lock()
        }
        fn connect_input(&self, port_name: &str) -> Result<(), HostError> {
            self.wiring.lock().push(format!("+{}", port_name));
            Ok(())
        }
        fn disconnect_input(&self, port_name: &str) -> Result<(), HostError> {
            self.wiring.lock().push(format!("-{}", port_name));
            Ok(())
        }
    }

    #[test]
    fn test_translators() {
        assert_eq!(
            record_led(RecordStatus::Enabled),
            (colors::RED, LedState::Blinking4th)
        );
        assert_eq!(
            record_led(RecordStatus::Recording),
            (colors::RED, LedState::OneShot24th)
        );
        assert_eq!(transport_led(true), (colors::GREEN, LedState::OneShot24th));
        assert_eq!(metronome_led(true), (colors::WHITE, LedState::Blinking4th));
        assert_eq!(solo_led(false), (colors::WHITE, LedState::NoTransition));
    }

    #[test]
    fn test_transport_stop_darkens_fixed_length() {
        let (mut surface, _) = surface();
        surface.handle_session_notification(SessionNotification::TransportStateChanged);
        let out = writes(&surface.take_effects());
        assert_eq!(out, vec![vec![0xB0, 85, colors::WHITE], vec![0xB0, 90, 0]]);
    }

    #[test]
    fn test_unrelated_parameter_and_loop_ignored() {
        let (mut surface, _) = surface();
        surface.handle_session_notification(SessionNotification::TransportLooped);
        surface.handle_session_notification(SessionNotification::ParameterChanged(
            "punch-in".to_string(),
        ));
        assert!(surface.take_effects().is_empty());

        surface.handle_session_notification(SessionNotification::ParameterChanged(
            "clicking".to_string(),
        ));
        assert_eq!(
            writes(&surface.take_effects()),
            vec![vec![0xB0, 9, colors::WHITE]]
        );
    }

    #[test]
    fn test_selection_takes_track_colors() {
        let (mut surface, session) = surface();
        let track = FakeTrack::new(7, Rgba::rgb(255, 0, 0));
        *session.track.lock() = Some(track.clone());

        surface.handle_session_notification(SessionNotification::SelectionChanged);

        assert_eq!(surface.selection_color(), colors::RED);
        assert_eq!(surface.contrast_color(), 121);
        assert_eq!(*track.wiring.lock(), vec!["+Push 2 Pads".to_string()]);

        let out = writes(&surface.take_effects());
        // Cyan gets programmed into the palette before the pads repaint.
        assert_eq!(out[0], codec::palette_entry(121, 0, 255, 255, 126));
        assert_eq!(out[1], codec::palette_commit());
        assert_eq!(out.len(), 2 + 64);
        assert_eq!(surface.pad(36).unwrap().led.color_index, colors::RED);

        // Re-selecting the same track changes nothing.
        surface.stripable_selection_changed();
        assert!(surface.take_effects().is_empty());
    }

    #[test]
    fn test_selection_moves_and_clears() {
        let (mut surface, session) = surface();
        let first = FakeTrack::new(1, Rgba::rgb(0, 0, 255));
        let second = FakeTrack::new(2, Rgba::rgb(0, 255, 0));

        *session.track.lock() = Some(first.clone());
        surface.stripable_selection_changed();
        *session.track.lock() = Some(second.clone());
        surface.stripable_selection_changed();

        assert_eq!(
            *first.wiring.lock(),
            vec!["+Push 2 Pads".to_string(), "-Push 2 Pads".to_string()]
        );
        assert_eq!(surface.pad_target().unwrap().id(), 2);
        assert_eq!(surface.selection_color(), colors::GREEN);

        *session.track.lock() = None;
        surface.stripable_selection_changed();
        assert!(surface.pad_target().is_none());
        assert_eq!(surface.selection_color(), colors::GREEN);
        assert_eq!(surface.contrast_color(), colors::GREEN);
        assert_eq!(second.wiring.lock().last().unwrap(), "-Push 2 Pads");
    }

    #[test]
    fn test_track_color_change_recolors() {
        let (mut surface, session) = surface();
        let track = FakeTrack::new(3, Rgba::rgb(0, 0, 255));
        *session.track.lock() = Some(track.clone());
        surface.stripable_selection_changed();
        assert_eq!(surface.selection_color(), colors::BLUE);

        *track.color.lock() = Rgba::rgb(255, 0, 0);
        surface.handle_session_notification(SessionNotification::SelectedTrackColorChanged);
        assert_eq!(surface.selection_color(), colors::RED);
        assert_eq!(surface.pad(36).unwrap().perma_color, colors::RED);
    }
}
