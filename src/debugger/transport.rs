//! DBGp transport: NUL framed commands in, length prefixed XML packets out.

use crate::debugger::buffer::WireBuffer;
use crate::debugger::Error;
use crate::dbgp_debug;
use crate::log::PROTOCOL_TARGET;
use std::io::{self, Read, Write};
use std::net::TcpStream;

/// Prepended to every packet, counted in the advertised length.
pub const XML_DECLARATION: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

const READ_CHUNK: usize = 4096;

/// Byte stream the transport runs on.
pub trait Channel: Read + Write {
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()>;
}

impl Channel for TcpStream {
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }
}

pub struct Transport {
    channel: Box<dyn Channel>,
    inbox: WireBuffer,
    nonblocking: bool,
}

impl Transport {
    pub fn new(channel: Box<dyn Channel>) -> Self {
        Self {
            channel,
            inbox: WireBuffer::new(),
            nonblocking: false,
        }
    }

    /// Connect to a listening client.
    pub fn connect(host: &str, port: u16) -> Result<Self, Error> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true)?;
        Ok(Self::new(Box::new(stream)))
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<(), Error> {
        if self.nonblocking != nonblocking {
            self.channel.set_nonblocking(nonblocking)?;
            self.nonblocking = nonblocking;
        }
        Ok(())
    }

    fn command_end(&self) -> Option<usize> {
        self.inbox.as_bytes().iter().position(|&b| b == 0)
    }

    fn fill(&mut self) -> Result<(), Error> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = loop {
            match self.channel.read(&mut chunk) {
                Ok(0) => return Err(Error::ConnectionClosed),
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        self.inbox.write(&chunk[..n])?;
        Ok(())
    }

    /// Block until a complete command is buffered. Returns its length, the
    /// command itself is available through [`Transport::command`].
    /// Bytes after the terminating NUL stay buffered for the next call.
    pub fn receive_command(&mut self) -> Result<usize, Error> {
        self.set_nonblocking(false)?;
        loop {
            if let Some(end) = self.command_end() {
                return Ok(end);
            }
            self.fill()?;
        }
    }

    /// Check without blocking whether a complete command has arrived.
    pub fn has_pending_command(&mut self) -> Result<bool, Error> {
        if self.command_end().is_some() {
            return Ok(true);
        }
        self.set_nonblocking(true)?;
        match self.fill() {
            Ok(()) => Ok(self.command_end().is_some()),
            Err(Error::IO(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn command(&self, len: usize) -> &[u8] {
        &self.inbox.as_bytes()[..len]
    }

    /// Drop a processed command and its terminator.
    pub fn consume(&mut self, len: usize) {
        self.inbox.remove_prefix(len + 1);
    }

    /// Send one packet: `len NUL <?xml ...?>payload NUL`.
    pub fn send_packet(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.set_nonblocking(false)?;
        dbgp_debug!(target: PROTOCOL_TARGET, "-> {}", String::from_utf8_lossy(payload));

        let len = XML_DECLARATION.len() + payload.len();
        let mut packet = Vec::with_capacity(len + 12);
        packet.extend_from_slice(len.to_string().as_bytes());
        packet.push(0);
        packet.extend_from_slice(XML_DECLARATION);
        packet.extend_from_slice(payload);
        packet.push(0);
        self.channel.write_all(&packet)?;
        self.channel.flush()?;
        Ok(())
    }
}
