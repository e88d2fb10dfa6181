use std::io::Write;
use std::sync::Mutex;

use crate::console_args::{ConsoleArg, ConsoleArgEncoder};
use crate::SupervisorError;

/// Generic command-send primitive of the supervision layer.
pub trait CommandSink {
    fn send_command(
        &self,
        name: &str,
        args: &[ConsoleArg],
        author: &str,
    ) -> Result<(), SupervisorError>;
}

impl<T: CommandSink + ?Sized> CommandSink for &T {
    fn send_command(
        &self,
        name: &str,
        args: &[ConsoleArg],
        author: &str,
    ) -> Result<(), SupervisorError> {
        (**self).send_command(name, args, author)
    }
}

/// Writes encoded command lines to the server's stdin.
///
/// The channel goes dead on the first write error or after [`close`]; every
/// later send fails with [`SupervisorError::Transport`].
///
/// [`close`]: ConsoleChannel::close
#[derive(Debug)]
pub struct ConsoleChannel<W: Write> {
    writer: Mutex<Option<W>>,
    encoder: ConsoleArgEncoder,
    span: tracing::Span,
}

impl<W: Write> ConsoleChannel<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
            encoder: ConsoleArgEncoder::new(),
            span: tracing::Span::none(),
        }
    }

    pub fn with_encoder(mut self, encoder: ConsoleArgEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn is_open(&self) -> bool {
        self.writer.lock().map(|w| w.is_some()).unwrap_or(false)
    }

    /// Marks the channel dead and hands back the writer, if any.
    pub fn close(&self) -> Option<W> {
        self.writer.lock().ok().and_then(|mut w| w.take())
    }

    pub fn send_raw_line(&self, line: &str, author: &str) -> Result<(), SupervisorError> {
        let _enter = self.span.enter();
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| SupervisorError::Transport("console writer poisoned".to_string()))?;
        let Some(writer) = guard.as_mut() else {
            return Err(SupervisorError::Transport("server is not running".to_string()));
        };

        let res = writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .and_then(|()| writer.flush());
        if let Err(err) = res {
            tracing::warn!(error = %err, "console write failed, closing channel");
            *guard = None;
            return Err(SupervisorError::Transport(err.to_string()));
        }
        tracing::debug!(author, line, "console command sent");
        Ok(())
    }
}

impl<W: Write> CommandSink for ConsoleChannel<W> {
    fn send_command(
        &self,
        name: &str,
        args: &[ConsoleArg],
        author: &str,
    ) -> Result<(), SupervisorError> {
        let line = self.encoder.encode_command(name, args)?;
        self.send_raw_line(&line, author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convars::{apply_convars, Convar, Setter};

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_one_line_per_command() {
        let ch = ConsoleChannel::new(Vec::new());
        ch.send_command("txaReportResources", &[], "tester").unwrap();
        ch.send_command("say", &["a;b".into()], "tester").unwrap();
        let out = String::from_utf8(ch.close().unwrap()).unwrap();
        assert_eq!(out, "txaReportResources\nsay \"a\u{037e}b\"\n");
    }

    #[test]
    fn closed_channel_is_a_transport_error() {
        let ch = ConsoleChannel::new(Vec::new());
        ch.close();
        assert!(!ch.is_open());
        let err = ch.send_command("status", &[], "tester").unwrap_err();
        assert!(matches!(err, SupervisorError::Transport(_)));
    }

    #[test]
    fn write_failure_closes_channel() {
        let ch = ConsoleChannel::new(BrokenPipe);
        let err = ch.send_command("status", &[], "tester").unwrap_err();
        assert!(matches!(err, SupervisorError::Transport(_)));
        assert!(!ch.is_open());
    }

    #[test]
    fn encoding_errors_do_not_close_channel() {
        let ch = ConsoleChannel::new(Vec::new());
        let err = ch
            .send_command("x", &[ConsoleArg::Json(serde_json::Value::Null)], "tester")
            .unwrap_err();
        assert!(matches!(err, SupervisorError::Encoding(_)));
        assert!(ch.is_open());
    }

    #[test]
    fn runtime_convars_are_sent_as_set_commands() {
        let ch = ConsoleChannel::new(Vec::new());
        let convars = vec![
            Convar {
                setter: Setter::Setr,
                name: "locale".into(),
                value: "pt-BR".into(),
            },
            Convar {
                setter: Setter::Set,
                name: "increase_pool_size".into(),
                value: "\"TxdStore\" 60000".into(),
            },
        ];
        assert_eq!(apply_convars(&ch, &convars, "tester").unwrap(), 2);
        let out = String::from_utf8(ch.close().unwrap()).unwrap();
        assert_eq!(
            out,
            "setr \"locale\" \"pt-BR\"\nset \"increase_pool_size\" \"\\\"TxdStore\\\" 60000\"\n"
        );
    }
}
