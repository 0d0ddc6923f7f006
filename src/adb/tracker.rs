//! Live view of the devices attached to the server (`host:track-devices`).

use crate::adb::protocol::{AdbRequest, ProtocolSocket};
use crate::adb::transport::{Endpoint, Interrupter, TransportFactory};
use crate::core::types::Device;
use crate::device::parse_device_list;
use crate::error::{AdbError, Result};
use log::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackerState {
    Stopped,
    Connecting,
    Subscribing,
    Tracking,
    Reconnecting,
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackerState::Stopped => "stopped",
            TrackerState::Connecting => "connecting",
            TrackerState::Subscribing => "subscribing",
            TrackerState::Tracking => "tracking",
            TrackerState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

/// Change to the device set, correlated by serial
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum DeviceEvent {
    Connected(Device),
    Changed { previous: Device, current: Device },
    Disconnected(Device),
}

impl DeviceEvent {
    pub fn serial(&self) -> &str {
        &self.device().serial
    }

    /// The device as it is after the event (as it was, for a disconnect)
    pub fn device(&self) -> &Device {
        match self {
            DeviceEvent::Connected(device) | DeviceEvent::Disconnected(device) => device,
            DeviceEvent::Changed { current, .. } => current,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DeviceEvent::Connected(_) => "connected",
            DeviceEvent::Changed { .. } => "changed",
            DeviceEvent::Disconnected(_) => "disconnected",
        }
    }
}

/// Authoritative device set keyed by serial
#[derive(Debug, Clone, Default)]
pub struct DeviceSet {
    devices: BTreeMap<String, Device>,
}

impl DeviceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, serial: &str) -> Option<&Device> {
        self.devices.get(serial)
    }

    /// Devices ordered by serial
    pub fn devices(&self) -> Vec<Device> {
        self.devices.values().cloned().collect()
    }

    /// Replace the set with `snapshot` and return what changed.
    ///
    /// Events come out as disconnects, then changes, then connects, each group
    /// ordered by serial. A repeated serial in `snapshot` keeps its last entry.
    pub fn apply(&mut self, snapshot: Vec<Device>) -> Vec<DeviceEvent> {
        let next: BTreeMap<String, Device> = snapshot
            .into_iter()
            .map(|device| (device.serial.clone(), device))
            .collect();

        let mut disconnected = Vec::new();
        let mut changed = Vec::new();
        for (serial, previous) in &self.devices {
            match next.get(serial) {
                None => disconnected.push(DeviceEvent::Disconnected(previous.clone())),
                Some(current) if current != previous => changed.push(DeviceEvent::Changed {
                    previous: previous.clone(),
                    current: current.clone(),
                }),
                Some(_) => {}
            }
        }
        let connected = next
            .iter()
            .filter(|(serial, _)| !self.devices.contains_key(*serial))
            .map(|(_, device)| DeviceEvent::Connected(device.clone()));

        let mut events = disconnected;
        events.append(&mut changed);
        events.extend(connected);

        self.devices = next;
        events
    }
}

/// Knobs for the reconnect loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSettings {
    /// Wait between failed connect/subscribe attempts
    pub reconnect_delay: Duration,
    /// Consecutive failed attempts before the restart hook runs; 0 never restarts
    pub restart_after_attempts: u32,
    /// Subscribe with `host:track-devices-l`
    pub long_format: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(1),
            restart_after_attempts: 10,
            long_format: false,
        }
    }
}

/// Called when the server keeps refusing the subscription
pub trait ServerRestartHook: Send + Sync {
    /// Returns whether the restart succeeded
    fn restart_server(&self) -> bool;
}

impl<F> ServerRestartHook for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn restart_server(&self) -> bool {
        self()
    }
}

type Listener = Box<dyn FnMut(&DeviceEvent) + Send>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared {
    stopping: Mutex<bool>,
    wake: Condvar,
    interrupter: Mutex<Option<Interrupter>>,
    snapshot: Mutex<Arc<Vec<Device>>>,
    received: AtomicBool,
    state: Mutex<TrackerState>,
    restart_count: AtomicU32,
    listeners: Mutex<Vec<Listener>>,
}

impl Shared {
    fn is_stopping(&self) -> bool {
        *lock(&self.stopping)
    }

    fn set_state(&self, state: TrackerState) {
        let mut current = lock(&self.state);
        if *current != state {
            debug!("Device tracker: {} -> {}", *current, state);
            *current = state;
        }
    }

    /// Sleep for `delay` unless stopped first; true when stopped
    fn wait(&self, delay: Duration) -> bool {
        let guard = lock(&self.stopping);
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, delay, |stopping| !*stopping)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    fn publish(&self, set: &DeviceSet, events: &[DeviceEvent]) {
        *lock(&self.snapshot) = Arc::new(set.devices());
        self.received.store(true, Ordering::SeqCst);

        let mut listeners = lock(&self.listeners);
        for event in events {
            debug!("Device {} {}", event.serial(), event.kind());
            for listener in listeners.iter_mut() {
                listener(event);
            }
        }
    }
}

/// Background subscription to device list changes.
///
/// Listeners run on the tracker thread and must not block for long. They may
/// call [`DeviceTracker::stop`] but not register further listeners.
pub struct DeviceTracker {
    shared: Arc<Shared>,
    factory: Arc<dyn TransportFactory>,
    endpoint: Endpoint,
    settings: TrackerSettings,
    restart_hook: Option<Arc<dyn ServerRestartHook>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceTracker {
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        endpoint: Endpoint,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                stopping: Mutex::new(false),
                wake: Condvar::new(),
                interrupter: Mutex::new(None),
                snapshot: Mutex::new(Arc::new(Vec::new())),
                received: AtomicBool::new(false),
                state: Mutex::new(TrackerState::Stopped),
                restart_count: AtomicU32::new(0),
                listeners: Mutex::new(Vec::new()),
            }),
            factory,
            endpoint,
            settings,
            restart_hook: None,
            handle: Mutex::new(None),
        }
    }

    pub fn with_restart_hook(mut self, hook: Arc<dyn ServerRestartHook>) -> Self {
        self.restart_hook = Some(hook);
        self
    }

    pub fn add_listener<F>(&self, listener: F)
    where
        F: FnMut(&DeviceEvent) + Send + 'static,
    {
        lock(&self.shared.listeners).push(Box::new(listener));
    }

    /// Channel fed with every event from now on
    pub fn subscribe(&self) -> mpsc::Receiver<DeviceEvent> {
        let (tx, rx) = mpsc::channel();
        self.add_listener(move |event| {
            let _ = tx.send(event.clone());
        });
        rx
    }

    /// Spawn the tracking thread. No-op while already running.
    pub fn start(&self) -> Result<()> {
        let mut handle = lock(&self.handle);
        if handle.is_some() {
            return Ok(());
        }
        *lock(&self.shared.stopping) = false;
        self.shared.received.store(false, Ordering::SeqCst);

        let worker = TrackerLoop {
            shared: Arc::clone(&self.shared),
            factory: Arc::clone(&self.factory),
            endpoint: self.endpoint.clone(),
            settings: self.settings.clone(),
            restart_hook: self.restart_hook.clone(),
        };

        info!("Starting device tracker on {}", self.endpoint);
        self.shared.set_state(TrackerState::Connecting);
        let spawned = thread::Builder::new()
            .name("adb-device-tracker".into())
            .spawn(move || worker.run())
            .map_err(AdbError::from_local)?;
        *handle = Some(spawned);
        Ok(())
    }

    /// Stop tracking and unblock the tracker thread. Safe to call repeatedly.
    pub fn stop(&self) {
        {
            let mut stopping = lock(&self.shared.stopping);
            *stopping = true;
            self.shared.wake.notify_all();
        }
        if let Some(interrupter) = lock(&self.shared.interrupter).take() {
            interrupter.interrupt();
        }

        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                debug!("Device tracker stopped from its own thread");
            } else if handle.join().is_err() {
                error!("Device tracker thread panicked");
            } else {
                info!("Device tracker stopped");
            }
        }
        self.shared.set_state(TrackerState::Stopped);
    }

    /// Last published snapshot, ordered by serial
    pub fn devices(&self) -> Arc<Vec<Device>> {
        Arc::clone(&lock(&self.shared.snapshot))
    }

    /// Distinguishes "no devices" from "no snapshot yet"
    pub fn has_received_snapshot(&self) -> bool {
        self.shared.received.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> TrackerState {
        *lock(&self.shared.state)
    }

    pub fn restart_count(&self) -> u32 {
        self.shared.restart_count.load(Ordering::SeqCst)
    }
}

impl Drop for DeviceTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

struct TrackerLoop {
    shared: Arc<Shared>,
    factory: Arc<dyn TransportFactory>,
    endpoint: Endpoint,
    settings: TrackerSettings,
    restart_hook: Option<Arc<dyn ServerRestartHook>>,
}

impl TrackerLoop {
    fn run(self) {
        let mut set = DeviceSet::new();
        let mut failed_attempts = 0u32;

        while !self.shared.is_stopping() {
            self.shared.set_state(TrackerState::Connecting);
            match self.subscribe() {
                Ok(socket) => {
                    self.shared.set_state(TrackerState::Tracking);
                    let mut snapshots = 0usize;
                    let result = self.track(socket, &mut set, &mut snapshots);
                    lock(&self.shared.interrupter).take();
                    if self.shared.is_stopping() {
                        break;
                    }
                    // A subscription that never delivered a snapshot counts as a failed attempt.
                    if snapshots > 0 {
                        failed_attempts = 0;
                    }
                    match result {
                        Err(e) => warn!("Device tracking connection lost: {}", e),
                        Ok(()) => warn!("Device tracking connection closed"),
                    }
                }
                Err(e) => {
                    lock(&self.shared.interrupter).take();
                    if self.shared.is_stopping() {
                        break;
                    }
                    warn!(
                        "Device tracker could not subscribe (attempt {}): {}",
                        failed_attempts + 1,
                        e
                    );
                }
            }

            failed_attempts += 1;
            if self.settings.restart_after_attempts > 0
                && failed_attempts >= self.settings.restart_after_attempts
            {
                self.escalate();
                failed_attempts = 0;
            }
            self.shared.set_state(TrackerState::Reconnecting);
            if self.shared.wait(self.settings.reconnect_delay) {
                break;
            }
        }

        self.shared.set_state(TrackerState::Stopped);
        debug!("Device tracker loop exited");
    }

    fn subscribe(&self) -> Result<ProtocolSocket> {
        let mut socket = ProtocolSocket::connect(self.factory.as_ref(), &self.endpoint)?;
        *lock(&self.shared.interrupter) = Some(socket.interrupter()?);
        // stop() may have run before the interrupter was registered.
        if self.shared.is_stopping() {
            let _ = socket.close();
            return Err(AdbError::Cancelled);
        }

        self.shared.set_state(TrackerState::Subscribing);
        socket.send(&AdbRequest::TrackDevices {
            long: self.settings.long_format,
        })?;
        socket.read_okay()?;
        socket.set_read_timeout(None)?;
        info!("Subscribed to device list changes");
        Ok(socket)
    }

    fn track(&self, mut socket: ProtocolSocket, set: &mut DeviceSet, snapshots: &mut usize) -> Result<()> {
        loop {
            let body = socket.read_length_prefixed_string()?;
            if self.shared.is_stopping() {
                return Ok(());
            }
            *snapshots += 1;
            let events = set.apply(parse_device_list(&body));
            trace!("Snapshot with {} devices, {} events", set.len(), events.len());
            self.shared.publish(set, &events);
        }
    }

    fn escalate(&self) {
        match &self.restart_hook {
            Some(hook) => {
                warn!("Device tracker giving up on the server, requesting a restart");
                self.shared.restart_count.fetch_add(1, Ordering::SeqCst);
                if hook.restart_server() {
                    info!("ADB server restarted");
                } else {
                    error!("ADB server restart failed");
                }
            }
            None => warn!("Device tracker cannot reach the server and has no restart hook"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DeviceState;

    fn device(serial: &str, state: DeviceState) -> Device {
        Device::new(serial, state)
    }

    #[test]
    fn test_identical_snapshot_emits_nothing() {
        let mut set = DeviceSet::new();
        let snapshot = vec![device("S1", DeviceState::Online)];
        assert_eq!(set.apply(snapshot.clone()).len(), 1);
        assert!(set.apply(snapshot).is_empty());
    }

    #[test]
    fn test_order_independent() {
        let mut a = DeviceSet::new();
        let mut b = DeviceSet::new();
        let events_a = a.apply(vec![
            device("S2", DeviceState::Online),
            device("S1", DeviceState::Online),
        ]);
        let events_b = b.apply(vec![
            device("S1", DeviceState::Online),
            device("S2", DeviceState::Online),
        ]);
        assert_eq!(events_a, events_b);
        assert_eq!(events_a[0].serial(), "S1");
    }

    #[test]
    fn test_attribute_change_is_changed_event() {
        let mut set = DeviceSet::new();
        set.apply(vec![device("S1", DeviceState::Online)]);
        let events = set.apply(vec![device("S1", DeviceState::Online).with_model("Pixel_6")]);
        assert_eq!(events.len(), 1);
        match &events[0] {
            DeviceEvent::Changed { previous, current } => {
                assert!(previous.model.is_none());
                assert_eq!(current.model.as_deref(), Some("Pixel_6"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_serial_last_wins() {
        let mut set = DeviceSet::new();
        let events = set.apply(vec![
            device("S1", DeviceState::Offline),
            device("S1", DeviceState::Online),
        ]);
        assert_eq!(events.len(), 1);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("S1").unwrap().state, DeviceState::Online);
    }

    #[test]
    fn test_event_json_shape() {
        let event = DeviceEvent::Connected(device("S1", DeviceState::Online));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "connected");
        assert_eq!(json["serial"], "S1");
    }

    #[test]
    fn test_closure_restart_hook() {
        let hook: Arc<dyn ServerRestartHook> = Arc::new(|| true);
        assert!(hook.restart_server());
    }
}
