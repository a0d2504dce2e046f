use crate::debugger::buffer::Escaped;
use crate::debugger::command::{CommandArgs, CommandName, Outcome};
use crate::debugger::{Error, Session, StreamMode};

/// `stdout` / `stderr`: choose how script output is relayed.
pub struct Handler<'a> {
    session: &'a mut Session,
}

impl<'a> Handler<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    pub fn handle(self, command: CommandName, args: &CommandArgs) -> Result<Outcome, Error> {
        args.expect_flags("c")?;
        let mode = args
            .number::<u8>('c')?
            .and_then(StreamMode::from_repr)
            .ok_or(Error::InvalidOptions)?;
        match command {
            CommandName::Stdout => self.session.stdout = mode,
            CommandName::Stderr => self.session.stderr = mode,
            _ => unreachable!("not a stream command: {command}"),
        }
        write!(
            self.session.response,
            "<response command=\"{command}\" success=\"1\" transaction_id=\"{}\"/>",
            Escaped(&args.transaction_id)
        )?;
        Ok(Outcome::Responded)
    }
}
