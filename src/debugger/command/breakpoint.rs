use crate::debugger::breakpoint::{Breakpoint, BreakpointRegistry, BreakpointState};
use crate::debugger::buffer::{decode_file_uri, Escaped, WireBuffer};
use crate::debugger::command::{CommandArgs, CommandName, Outcome};
use crate::debugger::{BufferError, Error, Session};
use crate::host::{LineId, ScriptHost, SourceRegistry};
use std::path::Path;
use std::str::FromStr;

fn parse_state(state: Option<&str>) -> Result<Option<BreakpointState>, Error> {
    state
        .map(|s| BreakpointState::from_str(s).map_err(|_| Error::BreakpointState))
        .transpose()
}

fn breakpoint_id(args: &CommandArgs) -> Result<u32, Error> {
    args.number::<u32>('d')?.ok_or(Error::InvalidOptions)
}

fn write_breakpoint<H: SourceRegistry + ?Sized>(
    buf: &mut WireBuffer,
    host: &H,
    line: LineId,
    bp: Breakpoint,
) -> Result<(), BufferError> {
    let source_line = &host.lines()[line];
    let file = host
        .source_files()
        .get(source_line.file_index)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    write!(
        buf,
        "<breakpoint id=\"{}\" type=\"line\" state=\"{}\" filename=\"",
        bp.id, bp.state
    )?;
    buf.write_file_uri(&file)?;
    write!(buf, "\" lineno=\"{}\"/>", source_line.line_number)
}

pub struct Handler<'a, H: ?Sized> {
    session: &'a mut Session,
    host: &'a mut H,
}

impl<'a, H: ScriptHost + ?Sized> Handler<'a, H> {
    pub fn new(session: &'a mut Session, host: &'a mut H) -> Self {
        Self { session, host }
    }

    pub fn handle(self, command: CommandName, args: &CommandArgs) -> Result<Outcome, Error> {
        match command {
            CommandName::BreakpointSet => self.set(args),
            CommandName::BreakpointGet => {
                args.expect_flags("d")?;
                let (line, bp) = BreakpointRegistry::get(self.host, breakpoint_id(args)?)?;
                write!(
                    self.session.response,
                    "<response command=\"breakpoint_get\" transaction_id=\"{}\">",
                    Escaped(&args.transaction_id)
                )?;
                write_breakpoint(&mut self.session.response, self.host, line, bp)?;
                self.session.response.write(b"</response>")?;
                Ok(Outcome::Responded)
            }
            CommandName::BreakpointUpdate => {
                // hit value and hit condition are accepted but not supported
                args.expect_flags("dsnho")?;
                let id = breakpoint_id(args)?;
                let state = parse_state(args.get('s'))?;
                let line = args.number::<u32>('n')?;
                BreakpointRegistry::update(self.host, id, line, state)?;
                Ok(Outcome::Ack)
            }
            CommandName::BreakpointRemove => {
                args.expect_flags("d")?;
                BreakpointRegistry::remove(self.host, breakpoint_id(args)?)?;
                Ok(Outcome::Ack)
            }
            CommandName::BreakpointList => {
                args.expect_flags("")?;
                write!(
                    self.session.response,
                    "<response command=\"breakpoint_list\" transaction_id=\"{}\">",
                    Escaped(&args.transaction_id)
                )?;
                for (line, bp) in BreakpointRegistry::list(self.host) {
                    write_breakpoint(&mut self.session.response, self.host, line, bp)?;
                }
                self.session.response.write(b"</response>")?;
                Ok(Outcome::Responded)
            }
            _ => unreachable!("not a breakpoint command: {command}"),
        }
    }

    fn set(self, args: &CommandArgs) -> Result<Outcome, Error> {
        args.expect_flags("tsfnrmxho-")?;
        if args.get('t') != Some("line") {
            return Err(Error::BreakpointType);
        }
        let state = parse_state(args.get('s'))?.unwrap_or(BreakpointState::Enabled);
        let temporary = args.get('r').is_some_and(|r| r != "0");

        let file_index = match args.get('f') {
            Some(uri) => self.host.file_index(Path::new(&decode_file_uri(uri))),
            None => self.host.file_index(self.host.main_file()),
        }
        .ok_or(Error::BreakpointInvalid)?;
        let line_number = args
            .number::<u32>('n')
            .map_err(|_| Error::BreakpointInvalid)?
            .filter(|&n| n > 0)
            .ok_or(Error::BreakpointInvalid)?;

        let (_, bp) =
            self.session
                .breakpoints
                .set(self.host, file_index, line_number, state, temporary)?;
        write!(
            self.session.response,
            "<response command=\"breakpoint_set\" transaction_id=\"{}\" state=\"{}\" id=\"{}\"/>",
            Escaped(&args.transaction_id),
            bp.state,
            bp.id
        )?;
        Ok(Outcome::Responded)
    }
}

#[cfg(test)]
mod test {
    use crate::debugger::buffer::file_uri;
    use crate::debugger::command::test::Harness;

    const SCRIPT: &str = "; header comment\n\
        ; more\n\
        \n\
        ; blank above\n\
        \n\
        \n\
        a := 1\n\
        {\n\
        b := 2\n\
        }\n";

    #[test]
    fn test_set_binds_to_next_executable_line() {
        let mut h = Harness::new(SCRIPT).break_state();
        let uri = file_uri(&h.host.main_path().to_string_lossy());

        let resp = h.exec(&format!("breakpoint_set -i 1 -t line -f {uri} -n 5"));
        assert_eq!(
            resp,
            "<response command=\"breakpoint_set\" transaction_id=\"1\" state=\"enabled\" id=\"1\"/>"
        );
        let resp = h.exec("breakpoint_get -i 2 -d 1");
        assert_eq!(
            resp,
            format!("<response command=\"breakpoint_get\" transaction_id=\"2\"><breakpoint id=\"1\" type=\"line\" state=\"enabled\" filename=\"{uri}\" lineno=\"7\"/></response>")
        );

        // a plain block opener is skipped
        let resp = h.exec("breakpoint_set -i 3 -t line -n 8 -s disabled");
        assert!(resp.contains("state=\"disabled\" id=\"2\""));
        assert!(h.exec("breakpoint_get -i 4 -d 2").contains("lineno=\"9\""));
    }

    #[test]
    fn test_set_errors() {
        let mut h = Harness::new(SCRIPT).break_state();
        struct TestCase {
            command: &'static str,
            code: u32,
        }
        let cases = [
            TestCase {
                command: "breakpoint_set -i 1 -t conditional -n 7",
                code: 201,
            },
            TestCase {
                command: "breakpoint_set -i 1 -n 7",
                code: 201,
            },
            TestCase {
                command: "breakpoint_set -i 1 -t line -n 7 -s maybe",
                code: 204,
            },
            TestCase {
                command: "breakpoint_set -i 1 -t line -n 70",
                code: 202,
            },
            TestCase {
                command: "breakpoint_set -i 1 -t line -n 0",
                code: 202,
            },
            TestCase {
                command: "breakpoint_set -i 1 -t line -n 7 -f file:///no/such.ahk",
                code: 202,
            },
            TestCase {
                command: "breakpoint_get -i 1 -d 42",
                code: 205,
            },
            TestCase {
                command: "breakpoint_remove -i 1",
                code: 3,
            },
        ];
        for case in cases {
            let resp = h.exec(case.command);
            assert!(
                resp.contains(&format!("<error code=\"{}\"/>", case.code)),
                "{}: {resp}",
                case.command
            );
        }
    }

    #[test]
    fn test_update_remove_list() {
        let mut h = Harness::new(SCRIPT).break_state();
        h.exec("breakpoint_set -i 1 -t line -n 7");

        // moving to a line past the end fails and keeps the breakpoint
        let resp = h.exec("breakpoint_update -i 2 -d 1 -n 99");
        assert!(resp.contains("<error code=\"202\"/>"));
        assert!(h.exec("breakpoint_get -i 3 -d 1").contains("lineno=\"7\""));

        let resp = h.exec("breakpoint_update -i 4 -d 1 -n 9 -s disabled");
        assert_eq!(
            resp,
            "<response command=\"breakpoint_update\" transaction_id=\"4\"/>"
        );
        let resp = h.exec("breakpoint_list -i 5");
        assert!(resp.contains("state=\"disabled\""));
        assert!(resp.contains("lineno=\"9\""));

        assert_eq!(
            h.exec("breakpoint_remove -i 6 -d 1"),
            "<response command=\"breakpoint_remove\" transaction_id=\"6\"/>"
        );
        assert_eq!(
            h.exec("breakpoint_list -i 7"),
            "<response command=\"breakpoint_list\" transaction_id=\"7\"></response>"
        );
    }
}
