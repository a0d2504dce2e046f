use anyhow::{anyhow, bail, Context};
use base64::Engine as _;
use dbgp_engine::config::EngineConfig;
use dbgp_engine::debugger::{ExitReason, Session};
use dbgp_engine::playground::Playground;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

/// The IDE side of a DBGp connection.
pub struct DbgpClient {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    next_txn: u32,
}

impl DbgpClient {
    pub fn accept(listener: &TcpListener) -> anyhow::Result<Self> {
        let (stream, _) = listener.accept().context("accept engine connection")?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            stream,
            reader,
            next_txn: 1,
        })
    }

    /// Read one `len NUL xml NUL` packet and return the xml without its declaration.
    pub fn read_packet(&mut self) -> anyhow::Result<String> {
        let mut len = vec![];
        self.reader.read_until(0, &mut len)?;
        if len.pop() != Some(0) {
            bail!("connection closed");
        }
        let len: usize = std::str::from_utf8(&len)?.parse()?;

        let mut body = vec![0; len + 1];
        self.reader.read_exact(&mut body)?;
        if body.pop() != Some(0) {
            bail!("packet is not NUL terminated");
        }
        let body = String::from_utf8(body)?;
        body.strip_prefix(XML_DECLARATION)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("missing xml declaration: {body}"))
    }

    /// True when the engine closed the connection.
    pub fn is_closed(&mut self) -> bool {
        let mut byte = [0; 1];
        matches!(self.reader.read(&mut byte), Ok(0))
    }

    /// Write raw bytes, several commands may be pipelined in one write.
    pub fn send_raw(&mut self, data: &[u8]) -> anyhow::Result<()> {
        self.stream.write_all(data)?;
        Ok(())
    }

    /// Send a command with a fresh transaction id, returns the id.
    pub fn send(&mut self, command: &str, args: &str) -> anyhow::Result<u32> {
        let txn = self.next_txn;
        self.next_txn += 1;
        let line = if args.is_empty() {
            format!("{command} -i {txn}\0")
        } else {
            format!("{command} -i {txn} {args}\0")
        };
        self.send_raw(line.as_bytes())?;
        Ok(txn)
    }

    /// Send a command and read the next packet.
    pub fn command(&mut self, command: &str, args: &str) -> anyhow::Result<String> {
        let txn = self.send(command, args)?;
        let packet = self.read_packet()?;
        let got = attr(&packet, "transaction_id");
        if got.as_deref() != Some(txn.to_string().as_str()) {
            bail!("expected a response to {txn}, got {packet}");
        }
        Ok(packet)
    }
}

/// Value of the first `name="..."` attribute in a packet.
pub fn attr(packet: &str, name: &str) -> Option<String> {
    let needle = format!(" {name}=\"");
    let start = packet.find(&needle)? + needle.len();
    let end = packet[start..].find('"')?;
    Some(packet[start..start + end].to_string())
}

/// Decoded text of the first base64 payload in a packet.
pub fn payload(packet: &str) -> String {
    let start = packet.find("encoding=\"base64\"").expect("base64 payload");
    let body = &packet[start..];
    let body = &body[body.find('>').expect("open tag") + 1..];
    let end = body.find('<').unwrap_or(body.len());
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&body[..end])
        .expect("valid base64");
    String::from_utf8(bytes).expect("utf-8 payload")
}

pub fn base64(text: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(text)
}

/// A playground script running under the engine in a background thread.
pub struct EngineRun {
    pub client: DbgpClient,
    pub init: String,
    handle: Option<JoinHandle<anyhow::Result<Vec<String>>>>,
    _dir: tempfile::TempDir,
}

impl EngineRun {
    /// Start the engine on `script`, accept its connection and read the init packet.
    pub fn start(script: &str) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("main.ahk");
        std::fs::write(&path, script)?;

        let listener = TcpListener::bind("127.0.0.1:0")?;
        let config = EngineConfig {
            port: listener.local_addr()?.port(),
            ..EngineConfig::default()
        };
        let handle = thread::spawn(move || run_engine(path, config));

        let mut client = DbgpClient::accept(&listener)?;
        let init = client.read_packet()?;
        Ok(Self {
            client,
            init,
            handle: Some(handle),
            _dir: dir,
        })
    }

    /// `fileuri` announced in the init packet.
    pub fn file_uri(&self) -> String {
        attr(&self.init, "fileuri").unwrap_or_default()
    }

    /// Wait for the script to finish and return what it printed locally.
    pub fn join(mut self) -> anyhow::Result<Vec<String>> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| anyhow!("engine already joined"))?;
        handle
            .join()
            .map_err(|_| anyhow!("engine thread panicked"))?
    }
}

fn run_engine(path: PathBuf, config: EngineConfig) -> anyhow::Result<Vec<String>> {
    let mut playground = Playground::load(&path)?;
    let mut session = Session::new(config);
    session.connect(&mut playground)?;
    // a dropped client lets the script run on unattached
    let _ = session.break_now(&mut playground);

    let result = playground.run(&mut session);
    session.exit(match result {
        Ok(()) => ExitReason::Ok,
        Err(_) => ExitReason::Error,
    });
    result?;
    Ok(playground.output().to_vec())
}
