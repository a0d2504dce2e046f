//! Client commands.
//!
//! A received command line is split into a [`CommandName`] and [`CommandArgs`],
//! routed to the handler of its group and answered according to the handler's
//! [`Outcome`]. Handlers write their response into the session response
//! buffer; errors are turned into `<error code="N"/>` responses here.

pub mod breakpoint;
pub mod feature;
pub mod flow;
pub mod parser;
pub mod property;
pub mod source;
pub mod stack;
pub mod stream;

use crate::debugger::buffer::Escaped;
use crate::debugger::{Error, Session};
use crate::host::ScriptHost;
use crate::log::PROTOCOL_TARGET;
use crate::dbgp_warn;
pub use parser::CommandArgs;
use parser::{scan_transaction_id, split_command};
use std::str::FromStr;

/// Commands understood by the engine.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum_macros::EnumString,
    strum_macros::Display,
    strum_macros::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum CommandName {
    Status,
    Run,
    StepInto,
    StepOver,
    StepOut,
    Break,
    Stop,
    Detach,
    StackDepth,
    StackGet,
    ContextNames,
    ContextGet,
    PropertyGet,
    PropertyValue,
    PropertySet,
    BreakpointSet,
    BreakpointGet,
    BreakpointUpdate,
    BreakpointRemove,
    BreakpointList,
    FeatureGet,
    FeatureSet,
    TypemapGet,
    Source,
    Stdout,
    Stderr,
}

/// How a successfully handled command is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Response is in the session buffer.
    Responded,
    /// Nothing buffered, send a bare `<response/>` acknowledgement.
    Ack,
    /// A continuation command: the response is sent at the next halt.
    Continue,
    /// The command already answered and closed the session.
    Ended,
}

impl Session {
    /// Parse, dispatch and answer one command line.
    pub(crate) fn execute<H: ScriptHost + ?Sized>(
        &mut self,
        host: &mut H,
        line: &str,
    ) -> Result<(), Error> {
        let (name, rest) = split_command(line);
        self.response.clear();

        let (transaction_id, outcome) = match CommandArgs::parse(rest) {
            Ok(args) => {
                let outcome = self.dispatch(host, name, &args);
                (args.transaction_id, outcome)
            }
            Err(e) => (scan_transaction_id(rest), Err(e)),
        };

        match outcome {
            Ok(Outcome::Responded) => self.send_response(),
            Ok(Outcome::Ack) => {
                self.response.clear();
                write!(
                    self.response,
                    "<response command=\"{}\" transaction_id=\"{}\"/>",
                    Escaped(name),
                    Escaped(&transaction_id)
                )?;
                self.send_response()
            }
            Ok(Outcome::Continue) | Ok(Outcome::Ended) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                dbgp_warn!(target: PROTOCOL_TARGET, "command `{name}` failed: {e}");
                self.send_error(name, &transaction_id, &e)
            }
        }
    }

    fn send_error(&mut self, name: &str, transaction_id: &str, error: &Error) -> Result<(), Error> {
        self.response.clear();
        write!(
            self.response,
            "<response command=\"{}\" transaction_id=\"{}\"><error code=\"{}\"/></response>",
            Escaped(name),
            Escaped(transaction_id),
            error.code()
        )?;
        self.send_response()
    }

    fn dispatch<H: ScriptHost + ?Sized>(
        &mut self,
        host: &mut H,
        name: &str,
        args: &CommandArgs,
    ) -> Result<Outcome, Error> {
        if name.is_empty() {
            return Err(Error::Parse("empty command".to_string()));
        }
        let command = CommandName::from_str(name)
            .map_err(|_| Error::UnimplementedCommand(name.to_string()))?;

        use CommandName::*;
        match command {
            Status | Run | StepInto | StepOver | StepOut | Break | Stop | Detach => {
                flow::Handler::new(self, host).handle(command, args)
            }
            StackDepth | StackGet | ContextNames | ContextGet => {
                stack::Handler::new(self, host).handle(command, args)
            }
            PropertyGet | PropertyValue | PropertySet | TypemapGet => {
                property::Handler::new(self, host).handle(command, args)
            }
            BreakpointSet | BreakpointGet | BreakpointUpdate | BreakpointRemove
            | BreakpointList => breakpoint::Handler::new(self, host).handle(command, args),
            FeatureGet | FeatureSet => feature::Handler::new(self).handle(command, args),
            Source => source::Handler::new(self, host).handle(args),
            Stdout | Stderr => stream::Handler::new(self).handle(command, args),
        }
    }
}
