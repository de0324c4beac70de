//! Push2Module - Async module driving an Ableton Push 2.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use padbridge_core::{
    AsyncModule, MidiEvent, ModuleEvent, ModuleId, ModuleMessage, Session, SessionNotification,
    StateStore, Subscription, SurfaceEvent,
};
use parking_lot::Mutex;
use ringbuf::traits::Split;
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::device::{
    input_channel, ConnectionState, DeviceManager, DeviceState, InputSink, InputSource,
    MidiTransport, MidirTransport, RusbDevice, UsbAccess, INPUT_CAPACITY,
};
use crate::error::DeviceError;
use crate::filter::PadFilter;
use crate::midi::codec::MidiParser;
use crate::midi::ButtonId;
use crate::router::LONG_PRESS_MS;
use crate::state::SurfaceState;
use crate::surface::{Context, Effect, Surface, SHADOW_PORT_NAME};

/// 25 Hz
const FRAME_INTERVAL: Duration = Duration::from_millis(40);
const SCAN_INTERVAL: Duration = Duration::from_secs(1);
const SPLASH_DURATION: Duration = Duration::from_secs(2);

/// Settle time between both ports connecting and taking the USB handle.
const CONNECT_SETTLE: Duration = Duration::from_millis(100);

const SHADOW_CAPACITY: usize = 1024;

/// Consumer end of the pad port; the host drains it on its process thread.
pub type ShadowReceiver = HeapCons<MidiEvent>;

/// A named group of ports the host can show and route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub name: String,
    pub ports: Vec<String>,
}

/// Ableton Push 2 control surface.
///
/// Owns the [`Surface`] state and the device connection. All surface
/// state changes happen on the task running [`AsyncModule::run`]; only
/// the [`PadFilter`] runs elsewhere.
pub struct Push2Module {
    surface: Surface,
    device: DeviceManager,
    filter: PadFilter,
    shadow_rx: Mutex<Option<ShadowReceiver>>,

    /// Handed to the transport on initialize.
    input_sink: Option<InputSink>,
    input: InputSource,
    parser: MidiParser,

    /// Host activation. While false, connections are tracked but the
    /// device is left alone.
    active: bool,

    notify_rx: Option<mpsc::UnboundedReceiver<SessionNotification>>,
    subscription: Option<Subscription>,

    long_press_tx: mpsc::UnboundedSender<(ButtonId, u64)>,
    long_press_rx: Option<mpsc::UnboundedReceiver<(ButtonId, u64)>>,
    long_press_timers: HashMap<ButtonId, (u64, JoinHandle<()>)>,

    frame: Option<Interval>,
    splash_start: Option<Instant>,

    outbound: Option<mpsc::Sender<ModuleMessage>>,
    store: Option<StateStore<SurfaceState>>,
    status: HashMap<String, String>,
}

impl Push2Module {
    /// Create a module talking to the device through midir and rusb.
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self::build(
            session,
            |filter, shadow| -> Box<dyn MidiTransport> {
                Box::new(MidirTransport::new(filter, shadow))
            },
            Box::new(RusbDevice::new()),
        )
    }

    /// Create a module over any transport. `make_transport` receives the
    /// pad filter and the shadow port producer its input path must feed.
    pub fn build<F>(session: Arc<dyn Session>, make_transport: F, usb: Box<dyn UsbAccess>) -> Self
    where
        F: FnOnce(PadFilter, HeapProd<MidiEvent>) -> Box<dyn MidiTransport>,
    {
        let surface = Surface::new(session);
        let filter = PadFilter::new(surface.snapshot_handle());
        let (shadow_tx, shadow_rx) = HeapRb::<MidiEvent>::new(SHADOW_CAPACITY).split();
        let transport = make_transport(filter.clone(), shadow_tx);

        let (input_sink, input) = input_channel(INPUT_CAPACITY);
        let (long_press_tx, long_press_rx) = mpsc::unbounded_channel();

        Self {
            surface,
            device: DeviceManager::new(transport, usb),
            filter,
            shadow_rx: Mutex::new(Some(shadow_rx)),
            input_sink: Some(input_sink),
            input,
            parser: MidiParser::new(),
            active: true,
            notify_rx: None,
            subscription: None,
            long_press_tx,
            long_press_rx: Some(long_press_rx),
            long_press_timers: HashMap::new(),
            frame: None,
            splash_start: None,
            outbound: None,
            store: None,
            status: HashMap::new(),
        }
    }

    /// Persist state through `store`: loaded on initialize, saved on
    /// shutdown.
    pub fn with_state_store(mut self, store: StateStore<SurfaceState>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn device_state(&self) -> DeviceState {
        self.device.state()
    }

    pub fn pad_note(&self, row: u8, col: u8) -> Option<u8> {
        self.surface.pad_note(row, col)
    }

    pub fn pad_filter(&self) -> PadFilter {
        self.filter.clone()
    }

    /// Hand the shadow port's consumer to the host. Only the first call
    /// gets it.
    pub fn take_shadow_receiver(&self) -> Option<ShadowReceiver> {
        self.shadow_rx.lock().take()
    }

    pub fn bundles(&self) -> Vec<Bundle> {
        vec![Bundle {
            name: SHADOW_PORT_NAME.to_string(),
            ports: vec![SHADOW_PORT_NAME.to_string()],
        }]
    }

    pub fn get_state(&self) -> SurfaceState {
        let mut state = SurfaceState::from_scale(self.surface.scale());
        let (input, output) = self.device.port_state();
        state.input = input;
        state.output = output;
        state
    }

    pub fn set_state(&mut self, state: &SurfaceState) {
        self.device.restore_port_state(&state.input, &state.output);
        self.surface.set_pad_scale(state.scale());
        self.flush();
    }

    pub fn active(&self) -> bool {
        self.active
    }

    /// Host activation toggle. Deactivating gives the device back and
    /// keeps connection changes from taking it again.
    pub async fn set_active(&mut self, yn: bool) -> Result<(), DeviceError> {
        self.active = yn;
        if yn {
            self.device.device_acquire()?;
            if self.device.connection_state().contains(ConnectionState::BOTH) {
                self.begin_using_device();
            }
        } else {
            self.stop_using_device();
            self.device.device_release();
        }
        self.flush();
        Ok(())
    }

    /// React to a connection change between `port_a` and `port_b`.
    /// Returns false when neither is one of our ports.
    pub async fn connection_handler(&mut self, port_a: &str, port_b: &str, connected: bool) -> bool {
        let Some(direction) =
            DeviceManager::owns_port(port_a).or_else(|| DeviceManager::owns_port(port_b))
        else {
            return false;
        };

        let both = self.device.set_connected(direction, connected);

        if both && !self.active {
            tracing::debug!("Push 2 connected while inactive");
        } else if both {
            tokio::time::sleep(CONNECT_SETTLE).await;
            match self.device.device_acquire() {
                Ok(()) => self.begin_using_device(),
                Err(e) => tracing::warn!("Push 2 ports connected but device unavailable: {}", e),
            }
        } else {
            self.stop_using_device();
        }

        self.surface.notify(SurfaceEvent::ConnectionChanged(both));
        true
    }

    /// Run one hot-plug scan and feed the resulting changes through
    /// [`Self::connection_handler`].
    async fn scan_ports(&mut self) {
        for change in self.device.port_registration_handler() {
            self.connection_handler(&change.port_a, &change.port_b, change.connected)
                .await;
        }
    }

    fn begin_using_device(&mut self) {
        if self.device.in_use() {
            return;
        }
        tracing::info!("Push 2 in use");

        let mut frame = tokio::time::interval(FRAME_INTERVAL);
        frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.frame = Some(frame);

        let (tx, rx) = mpsc::unbounded_channel();
        self.subscription = Some(self.surface.session.subscribe(tx));
        self.notify_rx = Some(rx);

        self.surface.init_buttons(true);
        self.surface.init_touch_strip();
        self.surface.reset_pad_colors();

        self.surface.set_context(Context::Splash);
        self.splash_start = Some(Instant::now());

        self.surface.stripable_selection_changed();
        self.surface.request_pressure_mode();

        self.device.set_in_use(true);
    }

    fn stop_using_device(&mut self) {
        if !self.device.in_use() {
            return;
        }
        tracing::info!("Push 2 no longer in use");

        self.surface.init_buttons(false);
        self.surface.strip_buttons_off();
        self.surface.all_pads_off();

        self.frame = None;
        self.splash_start = None;
        self.subscription = None;
        self.notify_rx = None;

        self.surface.clear_input_state();
        self.device.set_in_use(false);

        // Taken again on the next connection.
        self.device.device_release();
    }

    fn handle_midi_input(&mut self, bytes: &[u8]) {
        if !self.device.in_use() {
            tracing::trace!("Ignoring {} bytes while not in use", bytes.len());
            return;
        }
        let surface = &mut self.surface;
        self.parser.feed(bytes, |event| surface.handle_event(event));
    }

    fn drain_input(&mut self) {
        let mut buf = [0u8; 256];
        loop {
            let n = self.input.read(&mut buf);
            if n == 0 {
                break;
            }
            self.handle_midi_input(&buf[..n]);
        }
    }

    fn frame_tick(&mut self) {
        if let Some(start) = self.splash_start {
            if start.elapsed() >= SPLASH_DURATION {
                self.splash_start = None;
                self.surface.set_context(Context::Mix);
            }
        }
    }

    async fn handle_module_event(&mut self, event: ModuleEvent) {
        match event {
            ModuleEvent::SetActive(yn) => {
                if let Err(e) = self.set_active(yn).await {
                    tracing::warn!("Push 2 activation failed: {}", e);
                }
            }
            ModuleEvent::PortsChanged => self.scan_ports().await,
            ModuleEvent::PortConnectionChanged {
                port_a,
                port_b,
                connected,
            } => {
                if self.device.state() != DeviceState::Teardown {
                    self.connection_handler(&port_a, &port_b, connected).await;
                }
            }
            ModuleEvent::Surface(_) | ModuleEvent::Shutdown => {}
        }
    }

    /// Carry out everything the surface queued.
    fn flush(&mut self) {
        for effect in self.surface.take_effects() {
            match effect {
                Effect::Write(bytes) => {
                    if let Err(e) = self.device.write(&bytes) {
                        tracing::trace!("Dropped {} byte frame: {}", bytes.len(), e);
                    }
                }
                Effect::ScheduleLongPress { button, ticket } => {
                    let tx = self.long_press_tx.clone();
                    let timer = tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(LONG_PRESS_MS)).await;
                        let _ = tx.send((button, ticket));
                    });
                    if let Some((_, old)) =
                        self.long_press_timers.insert(button, (ticket, timer))
                    {
                        old.abort();
                    }
                }
                Effect::Notify(event) => {
                    let Some(outbound) = self.outbound.as_ref() else {
                        continue;
                    };
                    if let Err(e) =
                        outbound.try_send(ModuleMessage::Event(ModuleEvent::Surface(event)))
                    {
                        tracing::debug!("Failed to send surface event (channel full): {}", e);
                    }
                }
            }
        }

        // Drop timers the surface has cancelled since they were started.
        let surface = &self.surface;
        self.long_press_timers.retain(|button, (ticket, timer)| {
            let live = !timer.is_finished() && surface.long_press_pending(*button, *ticket);
            if !live {
                timer.abort();
            }
            live
        });
    }

    fn save_state(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.get_state()) {
                tracing::warn!("Could not save Push 2 state: {}", e);
            }
        }
    }
}

async fn recv_or_pending<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn tick_or_pending(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[async_trait]
impl AsyncModule for Push2Module {
    fn id(&self) -> ModuleId {
        ModuleId::Push2
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!("Initializing Push 2 module");

        if let Some(store) = &self.store {
            match store.load() {
                Ok(state) => self.set_state(&state),
                Err(e) => tracing::warn!("Using default Push 2 state: {}", e),
            }
        }

        if let Some(sink) = self.input_sink.take() {
            self.device.ports_register(sink)?;
        }
        self.scan_ports().await;
        self.flush();

        self.status
            .insert("state".to_string(), "initialized".to_string());
        Ok(())
    }

    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!("Push 2 module running");
        self.status
            .insert("state".to_string(), "running".to_string());
        self.outbound = Some(tx);

        let input_ready = self.input.ready_signal();
        let mut scan = tokio::time::interval(SCAN_INTERVAL);
        scan.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(ModuleEvent::Shutdown) | None => {
                            tracing::info!("Push 2 module received shutdown");
                            break;
                        }
                        Some(event) => self.handle_module_event(event).await,
                    }
                }

                _ = input_ready.notified() => {
                    self.drain_input();
                }

                notification = recv_or_pending(&mut self.notify_rx) => {
                    match notification {
                        Some(notification) => self.surface.handle_session_notification(notification),
                        // Session went away.
                        None => self.notify_rx = None,
                    }
                }

                Some((button, ticket)) = recv_or_pending(&mut self.long_press_rx) => {
                    self.surface.long_press_expired(button, ticket);
                }

                _ = tick_or_pending(&mut self.frame) => {
                    self.frame_tick();
                }

                _ = scan.tick() => {
                    self.scan_ports().await;
                }
            }

            self.flush();
        }

        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!("Shutting down Push 2 module");

        self.device.begin_teardown();
        self.stop_using_device();
        self.flush();
        self.device.device_release();
        self.save_state();
        self.device.ports_release().await;

        self.status
            .insert("state".to_string(), "shutdown".to_string());
        Ok(())
    }

    fn status(&self) -> HashMap<String, String> {
        let mut status = self.status.clone();
        status.insert("device".to_string(), format!("{:?}", self.device.state()));
        status.insert("context".to_string(), self.surface.context().name().to_string());
        status
    }
}
