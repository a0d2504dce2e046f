//! DBGp debug engine.
//!
//! A [`Session`] lives next to the script host and is driven by it: the host
//! calls [`Session::pre_exec_line`] before each line and the session decides
//! whether to halt and serve client commands.

pub mod breakpoint;
pub mod buffer;
pub mod command;
mod control;
pub mod error;
pub mod property;
mod stream;
pub mod transport;

pub use buffer::BufferError;
pub use control::{ExitReason, RunState};
pub use error::Error;
pub use stream::{StreamKind, StreamMode};

use crate::config::EngineConfig;
use crate::debugger::breakpoint::BreakpointRegistry;
use crate::debugger::buffer::{Escaped, WireBuffer};
use crate::debugger::command::CommandName;
use crate::debugger::property::Limits;
use crate::debugger::transport::Transport;
use crate::host::{LineId, ScriptHost};
use crate::{dbgp_error, dbgp_info, weak_error};

/// Environment variable holding the IDE key announced in the init packet.
pub const IDE_KEY_ENV: &str = "DBGP_IDEKEY";
/// Environment variable holding the session cookie announced in the init packet.
pub const SESSION_ENV: &str = "DBGP_COOKIE";

/// A continuation command waiting for its response.
#[derive(Debug, Clone)]
struct Continuation {
    command: CommandName,
    transaction_id: String,
}

pub struct Session {
    config: EngineConfig,
    transport: Option<Transport>,
    response: WireBuffer,
    run_state: RunState,
    continuation: Option<Continuation>,
    continuation_depth: usize,
    current_line: Option<LineId>,
    limits: Limits,
    stdout: StreamMode,
    stderr: StreamMode,
    breakpoints: BreakpointRegistry,
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        let limits = config.limits();
        let response = WireBuffer::with_limit(config.buffer_limit);
        Self {
            config,
            transport: None,
            response,
            run_state: RunState::Starting,
            continuation: None,
            continuation_depth: 0,
            current_line: None,
            limits,
            stdout: StreamMode::Disabled,
            stderr: StreamMode::Disabled,
            breakpoints: BreakpointRegistry::default(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Connect to the client configured in [`EngineConfig`] and send the init packet.
    pub fn connect<H: ScriptHost + ?Sized>(&mut self, host: &mut H) -> Result<(), Error> {
        let transport = Transport::connect(&self.config.host, self.config.port)?;
        dbgp_info!(
            target: crate::log::PROTOCOL_TARGET,
            "connected to {}:{}",
            self.config.host,
            self.config.port
        );
        self.attach(host, transport)
    }

    /// Start a session over an established transport.
    pub fn attach<H: ScriptHost + ?Sized>(
        &mut self,
        host: &mut H,
        transport: Transport,
    ) -> Result<(), Error> {
        // breakpoints left over from a previous client
        BreakpointRegistry::clear_all(host);
        self.transport = Some(transport);
        self.run_state = RunState::Starting;

        let result = self.send_init(host);
        if let Err(e) = &result {
            dbgp_error!(target: crate::log::PROTOCOL_TARGET, "handshake failed: {e:#}");
            self.disconnect();
        }
        result
    }

    fn send_init<H: ScriptHost + ?Sized>(&mut self, host: &H) -> Result<(), Error> {
        let ide_key = std::env::var(IDE_KEY_ENV).unwrap_or_default();
        let session = std::env::var(SESSION_ENV).unwrap_or_default();
        let main_file = host.main_file().to_string_lossy().into_owned();

        self.response.clear();
        write!(
            self.response,
            "<init appid=\"{}\" ide_key=\"{}\" session=\"{}\" thread=\"{}\" parent=\"\" language=\"{}\" protocol_version=\"1.0\" fileuri=\"",
            Escaped(&self.config.app_id),
            Escaped(&ide_key),
            Escaped(&session),
            std::process::id(),
            Escaped(&self.config.language_name),
        )?;
        self.response.write_file_uri(&main_file)?;
        self.response.write(b"\"/>")?;
        self.send_response()
    }

    pub(crate) fn send_response(&mut self) -> Result<(), Error> {
        let transport = self.transport.as_mut().ok_or(Error::NotConnected)?;
        let result = transport.send_packet(self.response.as_bytes());
        self.response.clear();
        result
    }

    /// Close the connection. The session returns to `Starting` and keeps
    /// its limits, so a new client may attach later.
    pub fn disconnect(&mut self) {
        if self.transport.take().is_some() {
            dbgp_info!(target: crate::log::PROTOCOL_TARGET, "disconnected");
        }
        self.response.clear();
        self.run_state = RunState::Starting;
        self.continuation = None;
        self.current_line = None;
        self.stdout = StreamMode::Disabled;
        self.stderr = StreamMode::Disabled;
    }

    /// Tear the session down when the script ends. The pending continuation
    /// command (if any) is answered with `status="stopped"`. Calling this on
    /// a disconnected session does nothing.
    pub fn exit(&mut self, reason: ExitReason) {
        if !self.is_connected() {
            return;
        }
        if let Some(continuation) = self.continuation.take() {
            weak_error!(
                self.send_continuation_status(&continuation, "stopped", reason.into()),
                "final response:"
            );
        }
        self.disconnect();
    }

    fn send_continuation_status(
        &mut self,
        continuation: &Continuation,
        status: &str,
        reason: &str,
    ) -> Result<(), Error> {
        self.response.clear();
        write!(
            self.response,
            "<response command=\"{}\" status=\"{status}\" reason=\"{reason}\" transaction_id=\"{}\"/>",
            continuation.command,
            Escaped(&continuation.transaction_id)
        )?;
        self.send_response()
    }
}
