use crate::debugger::buffer::Escaped;
use crate::debugger::command::{CommandArgs, CommandName, Outcome};
use crate::debugger::property::PropertyWriter;
use crate::debugger::{Error, Session};
use crate::host::{Context, LineId, ScriptHost};

/// Check a `-d` stack depth against the current call stack.
pub(super) fn check_depth<H: ScriptHost + ?Sized>(host: &H, depth: usize) -> Result<(), Error> {
    if depth > 0 && depth >= host.stack_depth() {
        return Err(Error::InvalidStackDepth(depth));
    }
    Ok(())
}

/// Parse a `-c` context id.
pub(super) fn context(args: &CommandArgs) -> Result<Context, Error> {
    let id = args.number::<u8>('c').map_err(|_| Error::InvalidContext)?;
    Context::from_repr(id.unwrap_or(0)).ok_or(Error::InvalidContext)
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
        let txn = args.transaction_id.as_str();
        match command {
            CommandName::StackDepth => {
                args.expect_flags("")?;
                write!(
                    self.session.response,
                    "<response command=\"stack_depth\" depth=\"{}\" transaction_id=\"{}\"/>",
                    self.host.stack_depth(),
                    Escaped(txn)
                )?;
            }
            CommandName::StackGet => {
                args.expect_flags("d")?;
                let depth = args.number::<usize>('d')?;
                if let Some(depth) = depth {
                    check_depth(self.host, depth)?;
                }
                self.stack_get(depth, txn)?;
            }
            CommandName::ContextNames => {
                args.expect_flags("d")?;
                write!(
                    self.session.response,
                    "<response command=\"context_names\" transaction_id=\"{}\">",
                    Escaped(txn)
                )?;
                for ctx in [Context::Local, Context::Global] {
                    write!(
                        self.session.response,
                        "<context name=\"{ctx}\" id=\"{}\"/>",
                        ctx as u8
                    )?;
                }
                self.session.response.write(b"</response>")?;
            }
            CommandName::ContextGet => {
                args.expect_flags("cd")?;
                let ctx = context(args)?;
                let depth = args.number::<usize>('d')?.unwrap_or(0);
                check_depth(self.host, depth)?;

                write!(
                    self.session.response,
                    "<response command=\"context_get\" context=\"{}\" transaction_id=\"{}\">",
                    ctx as u8,
                    Escaped(txn)
                )?;
                let limits = self.session.limits;
                let mut writer = PropertyWriter::new(&mut self.session.response, limits);
                for var in self.host.variables(ctx, depth) {
                    writer.write(&var.name, &var.name, &var.value, var.facets, 0)?;
                }
                self.session.response.write(b"</response>")?;
            }
            _ => unreachable!("not a stack command: {command}"),
        }
        Ok(Outcome::Responded)
    }

    fn stack_get(self, only: Option<usize>, txn: &str) -> Result<(), Error> {
        write!(
            self.session.response,
            "<response command=\"stack_get\" transaction_id=\"{}\">",
            Escaped(txn)
        )?;
        let current = self.session.current_line;
        for (level, entry) in self.host.call_stack().into_iter().enumerate() {
            if only.is_some_and(|d| d != level) {
                continue;
            }
            // the innermost frame reports the line being executed
            let line: LineId = match (level, current) {
                (0, Some(line)) => line,
                _ => entry.line,
            };
            let Some(source_line) = self.host.lines().get(line) else {
                continue;
            };
            let file = self
                .host
                .source_files()
                .get(source_line.file_index)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();

            write!(
                self.session.response,
                "<stack level=\"{level}\" type=\"file\" filename=\""
            )?;
            self.session.response.write_file_uri(&file)?;
            write!(
                self.session.response,
                "\" lineno=\"{}\" where=\"{}\"/>",
                source_line.line_number,
                Escaped(&entry.where_text())
            )?;
        }
        self.session.response.write(b"</response>")?;
        Ok(())
    }
}
