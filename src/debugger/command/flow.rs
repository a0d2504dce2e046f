//! Execution control: `status`, `run`, `step_*`, `break`, `stop`, `detach`.

use crate::debugger::buffer::Escaped;
use crate::debugger::command::{CommandArgs, CommandName, Outcome};
use crate::debugger::{Error, ExitReason, RunState, Session};
use crate::host::ScriptHost;

pub struct Handler<'a, H: ?Sized> {
    session: &'a mut Session,
    host: &'a mut H,
}

impl<'a, H: ScriptHost + ?Sized> Handler<'a, H> {
    pub fn new(session: &'a mut Session, host: &'a mut H) -> Self {
        Self { session, host }
    }

    pub fn handle(self, command: CommandName, args: &CommandArgs) -> Result<Outcome, Error> {
        args.expect_flags("")?;
        let txn = args.transaction_id.as_str();
        match command {
            CommandName::Status => {
                write!(
                    self.session.response,
                    "<response command=\"status\" status=\"{}\" reason=\"ok\" transaction_id=\"{}\"/>",
                    self.session.run_state.status(),
                    Escaped(txn)
                )?;
                Ok(Outcome::Responded)
            }
            CommandName::Run => self.resume(RunState::Running, command, txn),
            CommandName::StepInto => self.resume(RunState::StepInto, command, txn),
            CommandName::StepOver => self.resume(RunState::StepOver, command, txn),
            CommandName::StepOut => self.resume(RunState::StepOut, command, txn),
            CommandName::Break => {
                // halts at the next line check, a running continuation is answered then
                self.session.run_state = RunState::Break;
                write!(
                    self.session.response,
                    "<response command=\"break\" success=\"1\" transaction_id=\"{}\"/>",
                    Escaped(txn)
                )?;
                Ok(Outcome::Responded)
            }
            CommandName::Stop => {
                self.host.request_termination();
                self.session.continuation = Some(crate::debugger::Continuation {
                    command,
                    transaction_id: txn.to_string(),
                });
                self.session.exit(ExitReason::Ok);
                Ok(Outcome::Ended)
            }
            CommandName::Detach => {
                if !self.session.is_connected() {
                    return Ok(Outcome::Ended);
                }
                write!(
                    self.session.response,
                    "<response command=\"detach\" status=\"stopping\" reason=\"ok\" transaction_id=\"{}\"/>",
                    Escaped(txn)
                )?;
                let sent = self.session.send_response();
                self.session.disconnect();
                sent.map(|_| Outcome::Ended)
            }
            _ => unreachable!("not an execution control command: {command}"),
        }
    }

    fn resume(self, state: RunState, command: CommandName, txn: &str) -> Result<Outcome, Error> {
        self.session.resume(self.host, state, command, txn)?;
        Ok(Outcome::Continue)
    }
}

#[cfg(test)]
mod test {
    use crate::debugger::command::test::Harness;
    use crate::debugger::RunState;

    #[test]
    fn test_stop_answers_and_terminates() {
        let mut h = Harness::new("x := 1\n").break_state();
        let resp = h.exec("stop -i 7");
        assert_eq!(
            resp,
            "<response command=\"stop\" status=\"stopped\" reason=\"ok\" transaction_id=\"7\"/>"
        );
        assert!(!h.session.is_connected());
        assert!(h.host.termination_requested());
    }

    #[test]
    fn test_detach_keeps_script_running() {
        let mut h = Harness::new("x := 1\n").break_state();
        let resp = h.exec("detach -i 8");
        assert_eq!(
            resp,
            "<response command=\"detach\" status=\"stopping\" reason=\"ok\" transaction_id=\"8\"/>"
        );
        assert!(!h.session.is_connected());
        assert_eq!(h.session.run_state(), RunState::Starting);
        assert!(!h.host.termination_requested());

        // a second detach finds the session gone and does nothing
        h.session.execute(&mut h.host, "detach -i 9").unwrap();
        assert_eq!(h.channel.packets().len(), 1);
    }

    #[test]
    fn test_continuation_rejects_extra_flags() {
        let mut h = Harness::new("x := 1\n").break_state();
        let resp = h.exec("run -i 1 -x 2");
        assert!(resp.contains("<error code=\"3\"/>"));
        assert_eq!(h.session.run_state(), RunState::Break);
    }
}
