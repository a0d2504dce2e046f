use crate::debugger::{Error, Session};
use crate::host::{LineId, ScriptHost};
use crate::log::PROTOCOL_TARGET;
use crate::{dbgp_debug, dbgp_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Starting,
    Running,
    Break,
    StepInto,
    StepOver,
    StepOut,
}

impl RunState {
    /// Value of the `status` attribute.
    pub fn status(self) -> &'static str {
        match self {
            RunState::Starting => "starting",
            RunState::Break => "break",
            RunState::Running | RunState::StepInto | RunState::StepOver | RunState::StepOut => {
                "running"
            }
        }
    }

    /// Continuation commands are only accepted while halted or before the first run.
    pub fn accepts_continuation(self) -> bool {
        matches!(self, RunState::Starting | RunState::Break)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ExitReason {
    Ok,
    Error,
}

impl Session {
    /// Per-line hook, called by the host before it executes `line`.
    ///
    /// Halts on an enabled breakpoint or a finished step and serves commands
    /// until the client resumes. Otherwise a command that arrived while running
    /// is handled without halting. A returned error means the connection is
    /// gone; the session is already disconnected and the host notified.
    pub fn pre_exec_line<H: ScriptHost + ?Sized>(
        &mut self,
        host: &mut H,
        line: LineId,
    ) -> Result<(), Error> {
        if !self.is_connected() {
            return Ok(());
        }
        // an outer command loop is active, it must finish first
        if self.run_state == RunState::Break {
            return Ok(());
        }
        self.current_line = Some(line);

        let result = if self.take_breakpoint_hit(host, line) || self.step_done(host, line) {
            self.enter_break(host)
        } else {
            self.poll_commands(host)
        };
        self.check_fatal(host, result)
    }

    /// Halt right away, typically after connecting so that the client can set
    /// breakpoints before the script starts.
    pub fn break_now<H: ScriptHost + ?Sized>(&mut self, host: &mut H) -> Result<(), Error> {
        if !self.is_connected() || self.run_state == RunState::Break {
            return Ok(());
        }
        let result = self.enter_break(host);
        self.check_fatal(host, result)
    }

    /// Handle commands that arrived while the script runs, without blocking.
    /// Hosts with an event loop call this when the connection becomes readable.
    pub fn check_pending<H: ScriptHost + ?Sized>(&mut self, host: &mut H) -> Result<(), Error> {
        if !self.is_connected() || self.run_state == RunState::Break {
            return Ok(());
        }
        let result = self.poll_commands(host);
        self.check_fatal(host, result)
    }

    pub(crate) fn check_fatal<H: ScriptHost + ?Sized>(
        &mut self,
        host: &mut H,
        result: Result<(), Error>,
    ) -> Result<(), Error> {
        match result {
            Err(e) if e.is_fatal() => {
                dbgp_error!(target: PROTOCOL_TARGET, "connection lost: {e:#}");
                self.disconnect();
                host.on_fatal_error(&e);
                Err(e)
            }
            other => other,
        }
    }

    fn take_breakpoint_hit<H: ScriptHost + ?Sized>(&mut self, host: &mut H, line: LineId) -> bool {
        let Some(bp) = host.lines().get(line).and_then(|l| l.breakpoint) else {
            return false;
        };
        if !bp.is_enabled() {
            return false;
        }
        if bp.temporary {
            host.lines_mut()[line].breakpoint = None;
        }
        dbgp_debug!(target: PROTOCOL_TARGET, "breakpoint {} hit", bp.id);
        true
    }

    fn step_done<H: ScriptHost + ?Sized>(&self, host: &H, line: LineId) -> bool {
        let Some(source_line) = host.lines().get(line) else {
            return false;
        };
        if source_line.line_number == 0 || !source_line.kind.is_steppable() {
            return false;
        }
        match self.run_state {
            RunState::StepInto => true,
            RunState::StepOver => host.stack_depth() <= self.continuation_depth,
            RunState::StepOut => host.stack_depth() < self.continuation_depth,
            _ => false,
        }
    }

    fn poll_commands<H: ScriptHost + ?Sized>(&mut self, host: &mut H) -> Result<(), Error> {
        while self.run_state != RunState::Break {
            let Some(transport) = self.transport.as_mut() else {
                return Ok(());
            };
            if !transport.has_pending_command()? {
                return Ok(());
            }
            self.process_next(host)?;
        }
        // a `break` command arrived
        self.enter_break(host)
    }

    fn enter_break<H: ScriptHost + ?Sized>(&mut self, host: &mut H) -> Result<(), Error> {
        if let Some(continuation) = self.continuation.take() {
            self.send_continuation_status(&continuation, "break", "ok")?;
        }
        let hooks = host.suspend_input_hooks();
        self.run_state = RunState::Break;
        let result = self.command_loop(host);
        host.restore_input_hooks(hooks);
        result
    }

    fn command_loop<H: ScriptHost + ?Sized>(&mut self, host: &mut H) -> Result<(), Error> {
        while self.run_state == RunState::Break {
            let Some(transport) = self.transport.as_mut() else {
                break;
            };
            transport.receive_command()?;
            self.process_next(host)?;
        }
        Ok(())
    }

    /// Take one buffered command off the transport and execute it.
    fn process_next<H: ScriptHost + ?Sized>(&mut self, host: &mut H) -> Result<(), Error> {
        let transport = self.transport.as_mut().ok_or(Error::NotConnected)?;
        let len = transport.receive_command()?;
        let line = String::from_utf8_lossy(transport.command(len)).into_owned();
        transport.consume(len);
        dbgp_debug!(target: PROTOCOL_TARGET, "<- {line}");
        self.execute(host, &line)
    }

    /// Record a continuation command: its response is deferred until the next halt.
    pub(crate) fn resume<H: ScriptHost + ?Sized>(
        &mut self,
        host: &H,
        state: RunState,
        command: crate::debugger::command::CommandName,
        transaction_id: &str,
    ) -> Result<(), Error> {
        if !self.run_state.accepts_continuation() {
            return Err(Error::CommandUnavailable);
        }
        self.continuation = Some(super::Continuation {
            command,
            transaction_id: transaction_id.to_string(),
        });
        self.continuation_depth = host.stack_depth();
        self.run_state = state;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::config::EngineConfig;
    use crate::debugger::breakpoint::test::FakeSource;
    use crate::debugger::breakpoint::{Breakpoint, BreakpointState};
    use crate::debugger::command::CommandName;
    use crate::debugger::transport::test::MemoryChannel;
    use crate::debugger::transport::Transport;
    use crate::host::{
        CallStack, Context, HostControl, InputHooks, LineKind, SourceLine, SourceRegistry,
        StackEntry, StackKind, Value, Variable, VariableStore,
    };
    use std::path::PathBuf;

    pub struct FakeHost {
        pub source: FakeSource,
        pub depth: usize,
        pub suspended: usize,
        pub restored: usize,
        pub terminated: bool,
        pub fatal: bool,
    }

    impl FakeHost {
        pub fn new(lines: Vec<(u32, LineKind)>) -> Self {
            Self {
                source: FakeSource::new(lines),
                depth: 1,
                suspended: 0,
                restored: 0,
                terminated: false,
                fatal: false,
            }
        }
    }

    impl SourceRegistry for FakeHost {
        fn source_files(&self) -> &[PathBuf] {
            self.source.source_files()
        }

        fn lines(&self) -> &[SourceLine] {
            self.source.lines()
        }

        fn lines_mut(&mut self) -> &mut [SourceLine] {
            self.source.lines_mut()
        }
    }

    impl CallStack for FakeHost {
        fn call_stack(&self) -> Vec<StackEntry> {
            (0..self.depth)
                .map(|i| StackEntry {
                    kind: if i + 1 == self.depth {
                        StackKind::Thread
                    } else {
                        StackKind::UserFunction
                    },
                    line: 0,
                    description: format!("frame{i}"),
                })
                .collect()
        }
    }

    impl VariableStore for FakeHost {
        fn variables(&self, _: Context, _: usize) -> Vec<Variable> {
            vec![]
        }

        fn find_variable(&self, _: &str, _: Context, _: usize) -> Option<Variable> {
            None
        }

        fn assign_variable(&mut self, _: &str, _: Context, _: usize, _: Value) -> bool {
            false
        }
    }

    impl HostControl for FakeHost {
        fn suspend_input_hooks(&mut self) -> InputHooks {
            self.suspended += 1;
            InputHooks(3)
        }

        fn restore_input_hooks(&mut self, hooks: InputHooks) {
            assert_eq!(hooks, InputHooks(3));
            self.restored += 1;
        }

        fn request_termination(&mut self) {
            self.terminated = true;
        }

        fn on_fatal_error(&mut self, _: &Error) {
            self.fatal = true;
        }
    }

    pub fn lines() -> Vec<(u32, LineKind)> {
        vec![
            (1, LineKind::Statement),
            (2, LineKind::BlockBegin {
                function_body: false,
            }),
            (3, LineKind::Statement),
            (4, LineKind::BlockEnd {
                function_end: false,
            }),
            (5, LineKind::BlockEnd { function_end: true }),
            (0, LineKind::Statement),
        ]
    }

    pub fn attached(host: &mut FakeHost) -> (Session, MemoryChannel) {
        let channel = MemoryChannel::default();
        let mut session = Session::new(EngineConfig::default());
        session
            .attach(host, Transport::new(Box::new(channel.clone())))
            .unwrap();
        (session, channel)
    }

    #[test]
    fn test_step_rules() {
        struct TestCase {
            state: RunState,
            depth: usize,
            line: LineId,
            expected: bool,
        }
        let cases = [
            TestCase {
                state: RunState::StepInto,
                depth: 3,
                line: 0,
                expected: true,
            },
            TestCase {
                state: RunState::StepInto,
                depth: 1,
                line: 1,
                expected: false,
            },
            TestCase {
                state: RunState::StepInto,
                depth: 1,
                line: 3,
                expected: false,
            },
            TestCase {
                state: RunState::StepInto,
                depth: 1,
                line: 4,
                expected: true,
            },
            TestCase {
                state: RunState::StepInto,
                depth: 1,
                line: 5,
                expected: false,
            },
            TestCase {
                state: RunState::StepOver,
                depth: 2,
                line: 2,
                expected: true,
            },
            TestCase {
                state: RunState::StepOver,
                depth: 3,
                line: 2,
                expected: false,
            },
            TestCase {
                state: RunState::StepOut,
                depth: 2,
                line: 2,
                expected: false,
            },
            TestCase {
                state: RunState::StepOut,
                depth: 1,
                line: 2,
                expected: true,
            },
            TestCase {
                state: RunState::Running,
                depth: 1,
                line: 0,
                expected: false,
            },
        ];

        for case in cases {
            let mut host = FakeHost::new(lines());
            let mut session = Session::new(EngineConfig::default());
            session.run_state = case.state;
            session.continuation_depth = 2;
            host.depth = case.depth;
            assert_eq!(
                session.step_done(&host, case.line),
                case.expected,
                "{:?} depth {} line {}",
                case.state,
                case.depth,
                case.line
            );
        }
    }

    #[test]
    fn test_temporary_breakpoint_is_consumed() {
        let mut host = FakeHost::new(lines());
        let mut session = Session::new(EngineConfig::default());
        host.source.lines[2].breakpoint = Some(Breakpoint {
            id: 1,
            state: BreakpointState::Enabled,
            temporary: true,
        });
        host.source.lines[0].breakpoint = Some(Breakpoint {
            id: 2,
            state: BreakpointState::Disabled,
            temporary: false,
        });

        assert!(!session.take_breakpoint_hit(&mut host, 0));
        assert!(session.take_breakpoint_hit(&mut host, 2));
        assert!(host.source.lines[2].breakpoint.is_none());
        assert!(!session.take_breakpoint_hit(&mut host, 2));
    }

    #[test]
    fn test_break_then_run_defers_response() {
        let mut host = FakeHost::new(lines());
        let (mut session, channel) = attached(&mut host);
        channel.push_command("status -i 1");
        channel.push_command("step_into -i 2");

        session.break_now(&mut host).unwrap();
        assert_eq!(session.run_state(), RunState::StepInto);
        assert_eq!((host.suspended, host.restored), (1, 1));

        // next steppable line halts and answers step_into
        channel.push_command("run -i 3");
        session.pre_exec_line(&mut host, 0).unwrap();
        assert_eq!(session.run_state(), RunState::Running);

        session.exit(ExitReason::Ok);
        assert!(!session.is_connected());
        session.exit(ExitReason::Ok);

        let packets = channel.packets();
        assert!(packets[0].starts_with("<init "));
        assert_eq!(
            &packets[1..],
            &[
                "<response command=\"status\" status=\"break\" reason=\"ok\" transaction_id=\"1\"/>",
                "<response command=\"step_into\" status=\"break\" reason=\"ok\" transaction_id=\"2\"/>",
                "<response command=\"run\" status=\"stopped\" reason=\"ok\" transaction_id=\"3\"/>",
            ]
        );
    }

    #[test]
    fn test_async_break_while_running() {
        let mut host = FakeHost::new(lines());
        let (mut session, channel) = attached(&mut host);
        channel.push_command("run -i 1");
        session.break_now(&mut host).unwrap();
        assert_eq!(session.run_state(), RunState::Running);

        // nothing pending, script keeps going
        session.pre_exec_line(&mut host, 0).unwrap();

        channel.push_command("status -i 2");
        channel.push_command("step_into -i 3");
        channel.push_command("break -i 4");
        channel.push_command("stack_depth -i 5");
        channel.push_command("run -i 6");
        session.pre_exec_line(&mut host, 2).unwrap();
        assert_eq!(session.run_state(), RunState::Running);

        let packets = channel.packets();
        assert_eq!(
            &packets[1..],
            &[
                "<response command=\"status\" status=\"running\" reason=\"ok\" transaction_id=\"2\"/>",
                "<response command=\"step_into\" transaction_id=\"3\"><error code=\"5\"/></response>",
                "<response command=\"break\" success=\"1\" transaction_id=\"4\"/>",
                "<response command=\"run\" status=\"break\" reason=\"ok\" transaction_id=\"1\"/>",
                "<response command=\"stack_depth\" depth=\"1\" transaction_id=\"5\"/>",
            ]
        );
    }

    #[test]
    fn test_check_pending_serves_without_halting() {
        let mut host = FakeHost::new(lines());
        let (mut session, channel) = attached(&mut host);
        channel.push_command("run -i 1");
        session.break_now(&mut host).unwrap();

        session.check_pending(&mut host).unwrap();
        channel.push_command("breakpoint_list -i 2");
        session.check_pending(&mut host).unwrap();
        assert_eq!(session.run_state(), RunState::Running);
        assert_eq!(
            channel.packets().last().map(String::as_str),
            Some("<response command=\"breakpoint_list\" transaction_id=\"2\"></response>")
        );
    }

    #[test]
    fn test_continuation_accepted_while_starting() {
        let mut host = FakeHost::new(lines());
        let mut session = Session::new(EngineConfig::default());
        assert_eq!(session.run_state(), RunState::Starting);
        session
            .resume(&host, RunState::Running, CommandName::Run, "1")
            .unwrap();
        assert!(matches!(
            session.resume(&host, RunState::StepInto, CommandName::StepInto, "2"),
            Err(Error::CommandUnavailable)
        ));
        host.depth = 4;
        session.run_state = RunState::Break;
        session
            .resume(&host, RunState::StepOver, CommandName::StepOver, "3")
            .unwrap();
        assert_eq!(session.continuation_depth, 4);
    }

    #[test]
    fn test_lost_connection_is_fatal() {
        let mut host = FakeHost::new(lines());
        let (mut session, _channel) = attached(&mut host);
        // blocking read on an empty channel reports a closed peer
        let result = session.break_now(&mut host);
        assert!(matches!(result, Err(Error::ConnectionClosed)));
        assert!(host.fatal);
        assert!(!session.is_connected());
        assert_eq!(session.run_state(), RunState::Starting);
        assert!(session.pre_exec_line(&mut host, 0).is_ok());
    }
}
