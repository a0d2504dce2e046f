use crate::debugger::buffer::{decode_file_uri, Escaped};
use crate::debugger::command::{CommandArgs, Outcome};
use crate::debugger::{Error, Session};
use crate::host::ScriptHost;
use itertools::Itertools;
use std::path::{Path, PathBuf};

pub struct Handler<'a, H: ?Sized> {
    session: &'a mut Session,
    host: &'a mut H,
}

impl<'a, H: ScriptHost + ?Sized> Handler<'a, H> {
    pub fn new(session: &'a mut Session, host: &'a mut H) -> Self {
        Self { session, host }
    }

    /// File shown when `-f` is absent: the one being executed, else the main script.
    fn current_file(&self) -> PathBuf {
        self.session
            .current_line
            .and_then(|line| self.host.lines().get(line))
            .and_then(|line| self.host.source_files().get(line.file_index))
            .cloned()
            .unwrap_or_else(|| self.host.main_file().to_path_buf())
    }

    pub fn handle(self, args: &CommandArgs) -> Result<Outcome, Error> {
        args.expect_flags("fbe")?;
        let begin = args.number::<usize>('b')?.unwrap_or(1).max(1);
        let end = args.number::<usize>('e')?;
        if end.is_some_and(|end| begin > end) {
            return Err(Error::InvalidOptions);
        }

        let path = match args.get('f') {
            Some(uri) => PathBuf::from(decode_file_uri(uri)),
            None => self.current_file(),
        };
        // only files that belong to the script may be read
        let file_index = self
            .host
            .file_index(&path)
            .ok_or_else(|| Error::CanNotOpenFile(path.display().to_string()))?;
        let registered: &Path = &self.host.source_files()[file_index];
        let text = std::fs::read_to_string(registered)
            .map_err(|e| Error::CanNotOpenFile(format!("{}: {e}", registered.display())))?;

        let take = end.map_or(usize::MAX, |end| end + 1 - begin);
        let selected = text.lines().skip(begin - 1).take(take).join("\n");

        write!(
            self.session.response,
            "<response command=\"source\" success=\"1\" encoding=\"base64\" transaction_id=\"{}\">",
            Escaped(&args.transaction_id)
        )?;
        self.session.response.write_base64(selected.as_bytes())?;
        self.session.response.write(b"</response>")?;
        Ok(Outcome::Responded)
    }
}
