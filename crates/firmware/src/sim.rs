//! Simulated collaborators
//!
//! Host stand-ins for everything outside the bring-up layer: a register-level
//! ES8388 model behind the `embedded-hal` I2C trait, a session that only
//! tracks state, a network that connects instantly, and a media platform
//! that records what it was asked to do. The emulator binary boots against
//! these; integration tests inspect them afterwards.

use std::io::{BufReader, Stdin, Stdout};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use platform::es8388::{self, ES8388_I2C_ADDR, REGISTER_COUNT};
use platform::{BoardVariant, CodecInitConfig, EmbeddedHalBus, ThreadSpawnParams};
use tracing::info;

use crate::config::WifiCredentials;
use crate::console::{Console, ConsoleHost};
use crate::media::{MediaPlatform, PlatformError};
use crate::network::{ConnectivityCallback, NetworkError, NetworkJoin};
use crate::session::{RealtimeSession, SessionError, SessionStatus};
use crate::tasks::{SpawnHook, TaskFactory};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Codec ───────────────────────────────────────────────────────────────────

/// ES8388 register file on a simulated I2C bus
#[derive(Debug, Clone)]
pub struct SimulatedCodec {
    address: u8,
    registers: [u8; REGISTER_COUNT],
    pointer: u8,
    transactions: usize,
    nack_registers: Vec<u8>,
    absent: bool,
}

impl Default for SimulatedCodec {
    fn default() -> Self {
        Self {
            address: ES8388_I2C_ADDR,
            registers: [0; REGISTER_COUNT],
            pointer: 0,
            transactions: 0,
            nack_registers: Vec::new(),
            absent: false,
        }
    }
}

impl SimulatedCodec {
    /// Codec at the default address with every register zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// NACK every write to `register`.
    pub fn with_nack_on(mut self, register: u8) -> Self {
        self.nack_registers.push(register);
        self
    }

    /// Nothing answers at the codec address.
    pub fn absent() -> Self {
        Self {
            absent: true,
            ..Self::default()
        }
    }

    /// Wrap in the bus adapter the orchestrator consumes.
    pub fn into_bus(self) -> EmbeddedHalBus<Self> {
        EmbeddedHalBus::new(self)
    }

    /// Current value of `register` (0 for addresses outside the map).
    pub fn register(&self, register: u8) -> u8 {
        self.registers
            .get(usize::from(register))
            .copied()
            .unwrap_or(0)
    }

    /// Whole register file
    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }

    /// Transactions addressed to the codec so far
    pub fn transactions(&self) -> usize {
        self.transactions
    }

    /// DAC unmuted and both converters powered.
    pub fn is_running(&self) -> bool {
        self.register(es8388::DACCONTROL3) == es8388::DAC_UNMUTED
            && self.register(es8388::DACPOWER) == es8388::DACPOWER_RUNNING
            && self.register(es8388::ADCPOWER) == es8388::ADCPOWER_ALL_UP
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ErrorKind> {
        let Some((&register, data)) = bytes.split_first() else {
            return Ok(());
        };
        if self.nack_registers.contains(&register) {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
        }
        self.pointer = register;
        for &value in data {
            let slot = self
                .registers
                .get_mut(usize::from(self.pointer))
                .ok_or(ErrorKind::Other)?;
            *slot = value;
            self.pointer = self.pointer.wrapping_add(1);
        }
        Ok(())
    }
}

impl ErrorType for SimulatedCodec {
    type Error = ErrorKind;
}

impl I2c for SimulatedCodec {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.absent || address != self.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        self.transactions = self.transactions.saturating_add(1);
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => self.write_bytes(*bytes)?,
                Operation::Read(buffer) => {
                    for byte in buffer.iter_mut() {
                        *byte = self.register(self.pointer);
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

// ── Session ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SessionState {
    status: SessionStatus,
    starts: usize,
    stops: usize,
    texts: Vec<String>,
}

/// Session that tracks state and logs what it would send
#[derive(Debug, Default)]
pub struct LoggingSession {
    state: Mutex<SessionState>,
}

impl LoggingSession {
    /// Idle session
    pub fn new() -> Self {
        Self::default()
    }

    /// Times `start` was called
    pub fn starts(&self) -> usize {
        lock(&self.state).starts
    }

    /// Times `stop` was called
    pub fn stops(&self) -> usize {
        lock(&self.state).stops
    }

    /// Text messages sent while connected
    pub fn texts(&self) -> Vec<String> {
        lock(&self.state).texts.clone()
    }
}

impl RealtimeSession for LoggingSession {
    fn start(&self) -> Result<(), SessionError> {
        let mut state = lock(&self.state);
        state.starts = state.starts.saturating_add(1);
        state.status = SessionStatus::Connected;
        info!("session connected");
        Ok(())
    }

    fn stop(&self) -> Result<(), SessionError> {
        let mut state = lock(&self.state);
        state.stops = state.stops.saturating_add(1);
        state.status = SessionStatus::Idle;
        info!("session closed");
        Ok(())
    }

    fn send_text(&self, text: &str) -> Result<(), SessionError> {
        let mut state = lock(&self.state);
        if state.status != SessionStatus::Connected {
            return Err(SessionError::NotRunning);
        }
        info!(text, "text sent");
        state.texts.push(text.to_owned());
        Ok(())
    }

    fn query(&self) -> SessionStatus {
        lock(&self.state).status
    }
}

// ── Network ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct NetworkState {
    callback: Option<ConnectivityCallback>,
    joined: Option<String>,
}

/// Network that connects as soon as it is asked to
#[derive(Default)]
pub struct LoopbackNetwork {
    state: Mutex<NetworkState>,
}

impl core::fmt::Debug for LoopbackNetwork {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoopbackNetwork")
            .field("joined", &lock(&self.state).joined)
            .finish_non_exhaustive()
    }
}

impl LoopbackNetwork {
    /// Not yet joined
    pub fn new() -> Self {
        Self::default()
    }

    /// SSID currently joined
    pub fn joined(&self) -> Option<String> {
        lock(&self.state).joined.clone()
    }

    /// Simulate the link dropping.
    pub fn drop_link(&self) {
        let mut state = lock(&self.state);
        state.joined = None;
        if let Some(callback) = &state.callback {
            callback(false);
        }
    }
}

impl NetworkJoin for LoopbackNetwork {
    fn join(
        &self,
        credentials: Option<&WifiCredentials>,
        on_change: ConnectivityCallback,
    ) -> Result<(), NetworkError> {
        let mut state = lock(&self.state);
        if let Some(credentials) = credentials {
            info!(ssid = %credentials.ssid, "joined network");
            state.joined = Some(credentials.ssid.clone());
            on_change(true);
        }
        state.callback = Some(on_change);
        Ok(())
    }

    fn connect(&self, ssid: &str, _password: Option<&str>) -> Result<(), NetworkError> {
        if ssid.is_empty() {
            return Err(NetworkError::EmptySsid);
        }
        let mut state = lock(&self.state);
        let NetworkState { callback, joined } = &mut *state;
        let callback = callback.as_ref().ok_or(NetworkError::NotInitialised)?;
        // Down then up; the session controller runs the resulting stop and
        // start tasks in that order.
        if joined.is_some() {
            callback(false);
        }
        info!(ssid, "joined network");
        *joined = Some(ssid.to_owned());
        callback(true);
        Ok(())
    }
}

// ── Media platform ──────────────────────────────────────────────────────────

/// Records every resolved spawn
#[derive(Debug, Default)]
pub struct RecordingHook {
    spawns: Mutex<Vec<(String, ThreadSpawnParams)>>,
}

impl RecordingHook {
    /// Spawns seen so far, in order.
    pub fn spawns(&self) -> Vec<(String, ThreadSpawnParams)> {
        lock(&self.spawns).clone()
    }

    /// Spawns of the task called `name`.
    pub fn spawns_of(&self, name: &str) -> Vec<ThreadSpawnParams> {
        lock(&self.spawns)
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, p)| *p)
            .collect()
    }
}

impl SpawnHook for RecordingHook {
    fn apply(&self, name: &str, params: &ThreadSpawnParams) {
        lock(&self.spawns).push((name.to_owned(), *params));
    }
}

/// One call into the media platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformCall {
    /// `install_default_adapter`
    InstallAdapter,
    /// `hand_off_board`
    HandOff(BoardVariant, CodecInitConfig),
    /// `build_media_system`
    BuildMediaSystem,
}

/// Media platform that records calls and can refuse the board handoff
#[derive(Debug, Default)]
pub struct RecordingPlatform {
    calls: Vec<PlatformCall>,
    hook: Arc<RecordingHook>,
    refuse_handoff: bool,
}

impl RecordingPlatform {
    /// Accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec driver refuses the board.
    pub fn refusing_handoff() -> Self {
        Self {
            refuse_handoff: true,
            ..Self::default()
        }
    }

    /// Calls so far, in order.
    pub fn calls(&self) -> &[PlatformCall] {
        &self.calls
    }

    /// The scheduling hook handed to the task factory
    pub fn hook(&self) -> &Arc<RecordingHook> {
        &self.hook
    }
}

impl MediaPlatform for RecordingPlatform {
    fn install_default_adapter(&mut self) -> Result<(), PlatformError> {
        self.calls.push(PlatformCall::InstallAdapter);
        Ok(())
    }

    fn spawn_hook(&self) -> Option<Arc<dyn SpawnHook>> {
        Some(Arc::clone(&self.hook) as Arc<dyn SpawnHook>)
    }

    fn hand_off_board(
        &mut self,
        board: BoardVariant,
        codec: CodecInitConfig,
    ) -> Result<(), PlatformError> {
        self.calls.push(PlatformCall::HandOff(board, codec));
        if self.refuse_handoff {
            return Err(PlatformError::BoardHandoff {
                board,
                reason: "codec driver rejected board".into(),
            });
        }
        Ok(())
    }

    fn build_media_system(&mut self) -> Result<(), PlatformError> {
        self.calls.push(PlatformCall::BuildMediaSystem);
        Ok(())
    }
}

// ── Console hosts ───────────────────────────────────────────────────────────

/// Keeps the console without serving a terminal
#[derive(Debug, Default)]
pub struct DetachedConsoleHost {
    console: Option<Arc<Console>>,
}

impl DetachedConsoleHost {
    /// The installed console
    pub fn console(&self) -> Option<&Arc<Console>> {
        self.console.as_ref()
    }
}

impl ConsoleHost for DetachedConsoleHost {
    fn install(&mut self, console: Arc<Console>, _tasks: &TaskFactory) -> Result<(), PlatformError> {
        self.console = Some(console);
        Ok(())
    }
}

/// Serves the console on the process's stdin and stdout
#[derive(Debug, Default)]
pub struct StdioConsoleHost;

impl ConsoleHost for StdioConsoleHost {
    fn install(&mut self, console: Arc<Console>, tasks: &TaskFactory) -> Result<(), PlatformError> {
        let input: BufReader<Stdin> = BufReader::new(std::io::stdin());
        let output: Stdout = std::io::stdout();
        // The REPL runs detached for the life of the process.
        console
            .spawn(tasks, input, output)
            .map(drop)
            .map_err(|e| PlatformError::ConsoleInstall(e.to_string()))
    }
}
