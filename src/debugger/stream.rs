//! Relay of script output to the client as `<stream>` packets.

use crate::debugger::buffer::WireBuffer;
use crate::debugger::{Error, Session};
use crate::dbgp_warn;
use crate::host::ScriptHost;
use crate::log::PROTOCOL_TARGET;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum_macros::FromRepr)]
#[repr(u8)]
pub enum StreamMode {
    #[default]
    Disabled = 0,
    /// Send to the client and print as usual.
    Copy = 1,
    /// Send to the client only.
    Redirect = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl Session {
    /// Relay script stdout. Returns true if the text was redirected and the
    /// host must not print it itself. A failed send is fatal: the session
    /// disconnects and the host is notified through
    /// [`HostControl::on_fatal_error`](crate::host::HostControl::on_fatal_error).
    pub fn output_stdout<H: ScriptHost + ?Sized>(&mut self, host: &mut H, text: &str) -> bool {
        self.relay(host, StreamKind::Stdout, text)
    }

    /// Relay script stderr, see [`Session::output_stdout`].
    pub fn output_stderr<H: ScriptHost + ?Sized>(&mut self, host: &mut H, text: &str) -> bool {
        self.relay(host, StreamKind::Stderr, text)
    }

    fn relay<H: ScriptHost + ?Sized>(&mut self, host: &mut H, kind: StreamKind, text: &str) -> bool {
        let mode = match kind {
            StreamKind::Stdout => self.stdout,
            StreamKind::Stderr => self.stderr,
        };
        if mode == StreamMode::Disabled || !self.is_connected() {
            return false;
        }

        // a separate buffer, output may happen while a response is being built
        let mut packet = WireBuffer::with_limit(self.config.buffer_limit);
        let written = write!(packet, "<stream type=\"{kind}\" encoding=\"base64\">")
            .and_then(|_| packet.write_base64(text.as_bytes()))
            .and_then(|_| packet.write(b"</stream>"));
        if let Err(e) = written {
            dbgp_warn!(target: PROTOCOL_TARGET, "{kind} not relayed: {e}");
            return false;
        }

        let sent = match self.transport.as_mut() {
            Some(transport) => transport.send_packet(packet.as_bytes()),
            None => Err(Error::NotConnected),
        };
        match self.check_fatal(host, sent) {
            Ok(()) => mode == StreamMode::Redirect,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod test {
    use crate::debugger::buffer::encode_base64;
    use crate::debugger::command::test::Harness;
    use crate::debugger::control::test::{attached, lines, FakeHost};
    use crate::debugger::StreamMode;

    #[test]
    fn test_stream_modes() {
        let mut h = Harness::new("x := 1\n").break_state();
        assert!(!h.session.output_stdout(&mut h.host, "quiet"));
        assert!(h.channel.packets().is_empty());

        assert_eq!(
            h.exec("stdout -i 1 -c 1"),
            "<response command=\"stdout\" success=\"1\" transaction_id=\"1\"/>"
        );
        assert!(!h.session.output_stdout(&mut h.host, "copied"));
        assert_eq!(
            h.channel.packets().pop().unwrap(),
            format!(
                "<stream type=\"stdout\" encoding=\"base64\">{}</stream>",
                encode_base64(b"copied")
            )
        );

        h.exec("stderr -i 2 -c 2");
        assert!(h.session.output_stderr(&mut h.host, "redirected"));
        assert!(h
            .channel
            .packets()
            .pop()
            .unwrap()
            .starts_with("<stream type=\"stderr\""));

        assert!(h.exec("stdout -i 3 -c 7").contains("<error code=\"3\"/>"));
    }

    #[test]
    fn test_failed_relay_is_fatal() {
        let mut host = FakeHost::new(lines());
        let (mut session, channel) = attached(&mut host);
        session.stdout = StreamMode::Redirect;
        channel.break_pipe();

        assert!(!session.output_stdout(&mut host, "hello"));
        assert!(host.fatal);
        assert!(!session.is_connected());
        // unattached output is left to the host
        assert!(!session.output_stdout(&mut host, "again"));
    }
}
