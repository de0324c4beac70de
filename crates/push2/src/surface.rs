//! Driver-side surface state.
//!
//! [`Surface`] owns every pad, button and palette entry plus the scale and
//! modifier state. It never touches I/O itself: outgoing bytes, long-press
//! timers and host notifications are queued as [`Effect`]s, which the
//! module loop drains after each event.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use arc_swap::ArcSwap;
use padbridge_core::{MidiTrack, PressureMode, Rgba, Session, SurfaceEvent};

use crate::midi::codec;
use crate::midi::{colors, Behavior, Button, ButtonId, LedState, Pad, Push2Mapping, WhenPressed};
use crate::palette::ColorPalette;
use crate::pads::{PadSnapshot, PadSnapshotWriter, PadTable};
use crate::router;
use crate::scale::{PadLayout, PadNoteKind, ScaleConfig};

/// Name of the port pad notes are re-emitted on.
pub const SHADOW_PORT_NAME: &str = "Push 2 Pads";

pub const OCTAVE_SHIFT_RANGE: std::ops::RangeInclusive<i8> = -4..=4;

/// Work the surface asks its owner to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Bytes for the device output port, in order.
    Write(Vec<u8>),
    /// Start the long-press timer for a held button.
    ScheduleLongPress { button: ButtonId, ticket: u64 },
    Notify(SurfaceEvent),
}

/// Which set of controls the surface is presenting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Splash,
    Mix,
    Scale,
    TrackMix,
    /// Pads trigger cues directly; no notes reach the shadow port.
    Cue,
}

impl Context {
    pub fn name(&self) -> &'static str {
        match self {
            Context::Splash => "splash",
            Context::Mix => "mix",
            Context::Scale => "scale",
            Context::TrackMix => "track-mix",
            Context::Cue => "cue",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const SHIFT: Modifiers = Modifiers(1 << 0);
    pub const SELECT: Modifiers = Modifiers(1 << 1);

    pub fn contains(&self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Modifiers) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Modifiers) {
        self.0 &= !other.0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

pub struct Surface {
    pub(crate) session: Arc<dyn Session>,
    pub(crate) pads: PadTable,
    pub(crate) buttons: BTreeMap<ButtonId, Button>,
    palette: ColorPalette,
    snapshot: PadSnapshotWriter,

    scale: ScaleConfig,
    percussion: bool,
    pub(crate) octave_shift: i8,
    pub(crate) pressure_mode: PressureMode,

    pub(crate) selection_color: u8,
    pub(crate) contrast_color: u8,
    pub(crate) current_pad_target: Option<Arc<dyn MidiTrack>>,

    context: Context,
    previous_context: Context,

    pub(crate) modifiers: Modifiers,
    pub(crate) held: BTreeSet<ButtonId>,
    pub(crate) consumed: BTreeSet<ButtonId>,
    pub(crate) long_press: HashMap<ButtonId, u64>,
    next_ticket: u64,
    pub(crate) stop_down: bool,

    effects: Vec<Effect>,
}

impl Surface {
    pub fn new(session: Arc<dyn Session>) -> Self {
        let buttons = Push2Mapping::BUTTONS
            .iter()
            .map(|(id, _)| (*id, Button::new(*id, router::default_behavior(*id))))
            .collect();

        let mut surface = Self {
            session,
            pads: PadTable::new(),
            buttons,
            palette: ColorPalette::new(),
            snapshot: PadSnapshotWriter::new(),
            scale: ScaleConfig::default(),
            percussion: false,
            octave_shift: 0,
            pressure_mode: PressureMode::AfterTouch,
            selection_color: colors::GREEN,
            contrast_color: colors::GREEN,
            current_pad_target: None,
            context: Context::Splash,
            previous_context: Context::Splash,
            modifiers: Modifiers::default(),
            held: BTreeSet::new(),
            consumed: BTreeSet::new(),
            long_press: HashMap::new(),
            next_ticket: 0,
            stop_down: false,
            effects: Vec::new(),
        };

        // Pads know their notes before the device is ever in use.
        surface.apply_layout(&PadLayout::generate(&surface.scale));
        surface.effects.clear();
        surface
    }

    // === Effects ===

    pub fn write(&mut self, bytes: Vec<u8>) {
        self.effects.push(Effect::Write(bytes));
    }

    pub fn notify(&mut self, event: SurfaceEvent) {
        self.effects.push(Effect::Notify(event));
    }

    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Ticket for a new long-press timer on `id`, replacing any pending one.
    pub(crate) fn schedule_long_press(&mut self, id: ButtonId) {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.long_press.insert(id, ticket);
        self.effects
            .push(Effect::ScheduleLongPress { button: id, ticket });
    }

    /// Whether the long-press timer `ticket` for `id` can still fire.
    pub(crate) fn long_press_pending(&self, id: ButtonId, ticket: u64) -> bool {
        self.long_press.get(&id) == Some(&ticket)
    }

    // === Colors ===

    /// Palette index for a session color, programming the device palette
    /// the first time the color is seen.
    pub fn resolve_color(&mut self, color: Rgba) -> u8 {
        let (index, frames) = self.palette.resolve(color);
        if let Some(frames) = frames {
            for frame in frames {
                self.write(frame);
            }
        }
        index
    }

    pub fn selection_color(&self) -> u8 {
        self.selection_color
    }

    pub fn contrast_color(&self) -> u8 {
        self.contrast_color
    }

    // === Buttons ===

    pub fn button(&self, id: ButtonId) -> Option<&Button> {
        self.buttons.get(&id)
    }

    pub fn set_button(&mut self, id: ButtonId, color_index: u8, state: LedState) {
        if let Some(button) = self.buttons.get_mut(&id) {
            button.led.set(color_index, state);
            let message = button.led.button_message();
            self.write(message);
        }
    }

    pub fn set_button_color(&mut self, id: ButtonId, color_index: u8) {
        let state = self.buttons.get(&id).map(|b| b.led.state);
        if let Some(state) = state {
            self.set_button(id, color_index, state);
        }
    }

    pub fn set_button_state(&mut self, id: ButtonId, state: LedState) {
        let color = self.buttons.get(&id).map(|b| b.led.color_index);
        if let Some(color) = color {
            self.set_button(id, color, state);
        }
    }

    /// Replace what a button does.
    pub fn bind(&mut self, id: ButtonId, behavior: Behavior) {
        if let Some(button) = self.buttons.get_mut(&id) {
            button.behavior = behavior;
        }
    }

    /// Light the buttons that do something (`startup`), or darken every
    /// button.
    pub fn init_buttons(&mut self, startup: bool) {
        if startup {
            for id in Push2Mapping::LIT_AT_STARTUP {
                self.set_button(id, colors::WHITE, LedState::NoTransition);
            }
            for id in Push2Mapping::DARK_AT_STARTUP {
                self.set_button(id, colors::BLACK, LedState::OneShot24th);
            }
        } else {
            let ids: Vec<ButtonId> = self.buttons.keys().copied().collect();
            for id in ids {
                self.set_button(id, colors::BLACK, LedState::NoTransition);
            }
        }
    }

    pub fn strip_buttons_off(&mut self) {
        for id in Push2Mapping::UPPER.into_iter().chain(Push2Mapping::LOWER) {
            self.set_button(id, colors::BLACK, LedState::OneShot24th);
        }
    }

    // === Pads ===

    pub fn pad(&self, address: u8) -> Option<&Pad> {
        self.pads.get(address)
    }

    /// Note the pad at (`row`, `col`) plays, if it is active.
    pub fn pad_note(&self, row: u8, col: u8) -> Option<u8> {
        self.pads.at(row, col).and_then(|pad| pad.filtered)
    }

    pub(crate) fn write_pad(&mut self, address: u8) {
        if let Some(pad) = self.pads.get(address) {
            let message = pad.led.pad_message();
            self.write(message);
        }
    }

    pub fn all_pads_off(&mut self) {
        let mut messages = Vec::with_capacity(64);
        for pad in self.pads.iter_mut() {
            pad.led.set(colors::BLACK, LedState::NoTransition);
            messages.push(pad.led.pad_message());
        }
        for message in messages {
            self.write(message);
        }
    }

    fn set_pad_note_kind(pad: &mut Pad, kind: PadNoteKind, selection_color: u8) {
        match kind {
            PadNoteKind::RootNote => {
                pad.led.color_index = selection_color;
                pad.perma_color = selection_color;
                pad.when_pressed = WhenPressed::FlashOff;
            }
            PadNoteKind::InScaleNote => {
                pad.led.color_index = colors::WHITE;
                pad.perma_color = colors::WHITE;
                pad.when_pressed = WhenPressed::FlashOff;
            }
            PadNoteKind::OutOfScaleNote => {
                pad.led.color_index = colors::BLACK;
                pad.when_pressed = WhenPressed::FlashOn;
            }
        }
        pad.led.state = LedState::NoTransition;
    }

    /// Reset every pad, apply `layout`, write all pads and republish.
    fn apply_layout(&mut self, layout: &PadLayout) {
        self.pads.reset();

        for (row, col, note, kind) in layout.iter() {
            let address = Push2Mapping::pad_note(row as u8, col as u8);
            self.pads.assign(address, note);
            if let Some(pad) = self.pads.get_mut(address) {
                Self::set_pad_note_kind(pad, kind, self.selection_color);
            }
        }

        let messages: Vec<Vec<u8>> = self.pads.iter().map(|p| p.led.pad_message()).collect();
        for message in messages {
            self.write(message);
        }

        self.publish_snapshot();
    }

    /// Lay out a scale on the pads. Emits `ScaleChanged` when any
    /// parameter differs from the current configuration.
    pub fn set_pad_scale(&mut self, cfg: ScaleConfig) {
        let cfg = ScaleConfig {
            root: cfg.root % 12,
            octave: cfg.octave.min(10),
            ..cfg
        };

        self.apply_layout(&PadLayout::generate(&cfg));
        self.percussion = false;

        if cfg != self.scale {
            tracing::debug!("pad scale now {:?}", cfg);
            self.scale = cfg;
            self.notify(SurfaceEvent::ScaleChanged);
        }
    }

    pub fn scale(&self) -> &ScaleConfig {
        &self.scale
    }

    pub fn set_percussive_mode(&mut self, yn: bool) {
        if yn {
            self.apply_layout(&PadLayout::percussion());
            self.percussion = true;
        } else {
            self.set_pad_scale(self.scale);
        }
    }

    pub fn percussive(&self) -> bool {
        self.percussion
    }

    /// Repaint the pads for the current layout, e.g. after the selection
    /// color changed.
    pub fn reset_pad_colors(&mut self) {
        if self.percussion {
            self.apply_layout(&PadLayout::percussion());
        } else {
            self.set_pad_scale(self.scale);
        }
    }

    pub fn octave_shift(&self) -> i8 {
        self.octave_shift
    }

    pub fn set_octave_shift(&mut self, shift: i8) {
        let shift = shift.clamp(*OCTAVE_SHIFT_RANGE.start(), *OCTAVE_SHIFT_RANGE.end());
        if shift != self.octave_shift {
            self.octave_shift = shift;
            self.publish_snapshot();
        }
    }

    // === Real-time snapshot ===

    pub fn publish_snapshot(&mut self) {
        let snapshot = self
            .pads
            .snapshot(self.octave_shift, self.context == Context::Cue);
        self.snapshot.publish(snapshot);
    }

    /// Shared snapshot handle for [`crate::PadFilter`].
    pub fn snapshot_handle(&self) -> Arc<ArcSwap<PadSnapshot>> {
        self.snapshot.shared()
    }

    // === Context ===

    pub fn context(&self) -> Context {
        self.context
    }

    pub fn previous_context(&self) -> Context {
        self.previous_context
    }

    pub fn set_context(&mut self, context: Context) {
        if context == self.context {
            return;
        }

        tracing::debug!("context {} -> {}", self.context.name(), context.name());
        self.previous_context = self.context;
        self.context = context;
        self.notify(SurfaceEvent::ContextChanged(context.name()));
        self.publish_snapshot();
    }

    pub fn use_previous_context(&mut self) {
        self.set_context(self.previous_context);
    }

    // === Device setup ===

    pub fn init_touch_strip(&mut self) {
        self.write(codec::touch_strip_config(codec::touch_strip::DEFAULT));
    }

    pub fn request_pressure_mode(&mut self) {
        self.write(codec::request_pressure_mode());
    }

    pub fn set_pressure_mode(&mut self, mode: PressureMode) {
        self.write(codec::set_pressure_mode(mode));
    }

    pub fn pressure_mode(&self) -> PressureMode {
        self.pressure_mode
    }

    // === Modifiers ===

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn shifted(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }

    pub fn stop_down(&self) -> bool {
        self.stop_down
    }

    /// Forget held buttons, pending long presses and modifiers.
    pub fn clear_input_state(&mut self) {
        self.modifiers = Modifiers::default();
        self.held.clear();
        self.consumed.clear();
        self.long_press.clear();
        self.stop_down = false;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use padbridge_core::{GainControl, RecordStatus, SessionNotification, Subscription};
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    use super::*;

    /// Session double that records what the surface asked for.
    #[derive(Default)]
    pub(crate) struct FakeSession {
        pub rolling: AtomicBool,
        pub clicking: AtomicBool,
        pub calls: Mutex<Vec<&'static str>>,
        pub track: Mutex<Option<Arc<dyn MidiTrack>>>,
        pub master: Mutex<Option<Arc<dyn GainControl>>>,
        pub subscribed: AtomicUsize,
        /// Sender from the latest `subscribe`.
        pub notifier: Mutex<Option<mpsc::UnboundedSender<SessionNotification>>>,
    }

    impl FakeSession {
        fn record(&self, call: &'static str) {
            self.calls.lock().push(call);
        }

        pub fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().clone()
        }
    }

    impl Session for FakeSession {
        fn transport_rolling(&self) -> bool {
            self.rolling.load(Ordering::SeqCst)
        }
        fn transport_play(&self) {
            self.record("play");
            self.rolling.store(true, Ordering::SeqCst);
        }
        fn transport_stop(&self) {
            self.record("stop");
            self.rolling.store(false, Ordering::SeqCst);
        }
        fn record_status(&self) -> RecordStatus {
            RecordStatus::Disabled
        }
        fn toggle_record_enable(&self) {
            self.record("record");
        }
        fn clicking(&self) -> bool {
            self.clicking.load(Ordering::SeqCst)
        }
        fn set_clicking(&self, yn: bool) {
            self.clicking.store(yn, Ordering::SeqCst);
        }
        fn undo(&self) {
            self.record("undo");
        }
        fn redo(&self) {
            self.record("redo");
        }
        fn toggle_selection_solo(&self) {
            self.record("solo");
        }
        fn cancel_all_solo(&self) {
            self.record("cancel_solo");
        }
        fn master_gain(&self) -> Option<Arc<dyn GainControl>> {
            self.master.lock().clone()
        }
        fn click_gain(&self) -> Option<Arc<dyn GainControl>> {
            None
        }
        fn selected_midi_track(&self) -> Option<Arc<dyn MidiTrack>> {
            self.track.lock().clone()
        }
        fn audible_sample(&self) -> u64 {
            4800
        }
        fn subscribe(&self, tx: mpsc::UnboundedSender<SessionNotification>) -> Subscription {
            self.subscribed.fetch_add(1, Ordering::SeqCst);
            *self.notifier.lock() = Some(tx);
            Subscription::detached()
        }
    }

    pub(crate) fn surface() -> (Surface, Arc<FakeSession>) {
        let session = Arc::new(FakeSession::default());
        (Surface::new(session.clone()), session)
    }

    pub(crate) fn writes(effects: &[Effect]) -> Vec<Vec<u8>> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_new_surface_has_default_layout_and_no_output() {
        let (mut surface, _) = surface();
        assert_eq!(surface.pad_note(0, 0), Some(36));
        assert_eq!(surface.pad_note(0, 1), Some(38));
        assert!(surface.take_effects().is_empty());
        assert_eq!(surface.snapshot_handle().load().note_for(36), Some(36));
    }

    #[test]
    fn test_set_pad_scale_writes_every_pad() {
        let (mut surface, _) = surface();
        let cfg = ScaleConfig {
            root: 2,
            ..ScaleConfig::default()
        };
        surface.set_pad_scale(cfg);

        let effects = surface.take_effects();
        assert_eq!(writes(&effects).len(), 64);
        assert!(effects.contains(&Effect::Notify(SurfaceEvent::ScaleChanged)));

        // Same config again: pads rewritten, no change notification.
        surface.set_pad_scale(cfg);
        let effects = surface.take_effects();
        assert_eq!(writes(&effects).len(), 64);
        assert!(!effects.contains(&Effect::Notify(SurfaceEvent::ScaleChanged)));
    }

    #[test]
    fn test_root_pad_uses_selection_color() {
        let (mut surface, _) = surface();
        surface.selection_color = 100;
        surface.reset_pad_colors();

        let root = surface.pad(36).unwrap();
        assert_eq!(root.led.color_index, 100);
        assert_eq!(root.perma_color, 100);
        assert_eq!(root.when_pressed, WhenPressed::FlashOff);

        let in_scale = surface.pad(37).unwrap();
        assert_eq!(in_scale.led.color_index, colors::WHITE);
    }

    #[test]
    fn test_percussion_and_back() {
        let (mut surface, _) = surface();
        surface.set_percussive_mode(true);
        assert!(surface.percussive());
        assert_eq!(surface.pad_note(0, 4), Some(68));
        assert_eq!(surface.pads.pads_for_note(68), &[40]);

        surface.set_percussive_mode(false);
        assert!(!surface.percussive());
        assert_eq!(surface.pad_note(0, 4), Some(43));
    }

    #[test]
    fn test_init_buttons() {
        let (mut surface, _) = surface();
        surface.init_buttons(true);
        let effects = surface.take_effects();
        assert_eq!(writes(&effects).len(), 30 + 17);

        let note = surface.button(ButtonId::Note).unwrap();
        assert_eq!(note.led.color_index, colors::BLACK);
        let play = surface.button(ButtonId::Play).unwrap();
        assert_eq!(play.led.button_message(), vec![0xB0, 85, colors::WHITE]);

        surface.init_buttons(false);
        let effects = surface.take_effects();
        assert_eq!(writes(&effects).len(), Push2Mapping::BUTTONS.len());
        assert!(surface
            .buttons
            .values()
            .all(|b| b.led.color_index == colors::BLACK));
    }

    #[test]
    fn test_cue_context_bypasses_filter() {
        let (mut surface, _) = surface();
        let handle = surface.snapshot_handle();

        surface.set_context(Context::Cue);
        assert!(handle.load().bypass);
        assert_eq!(surface.previous_context(), Context::Splash);

        surface.use_previous_context();
        assert!(!handle.load().bypass);
        let effects = surface.take_effects();
        assert!(effects.contains(&Effect::Notify(SurfaceEvent::ContextChanged("cue"))));
    }

    #[test]
    fn test_octave_shift_is_clamped() {
        let (mut surface, _) = surface();
        surface.set_octave_shift(9);
        assert_eq!(surface.octave_shift(), 4);
        assert_eq!(surface.snapshot_handle().load().octave_shift, 4);
        surface.set_octave_shift(-9);
        assert_eq!(surface.octave_shift(), -4);
    }
}
