use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::subscriber::DefaultGuard;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Route WARN and ERROR events on this thread into a fresh buffer until
    /// the guard drops. `#[tokio::test]` runs on one thread, so this covers
    /// everything the test awaits.
    pub fn capture() -> (Self, DefaultGuard) {
        let buffer = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_ansi(false)
            .with_max_level(Level::WARN)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (buffer, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    /// Lines containing `message`.
    pub fn lines_with(&self, message: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|l| l.contains(message))
            .map(str::to_string)
            .collect()
    }

    /// Assert exactly one `level` event with `message` was logged, carrying
    /// each of `fields` (`key=value` as formatted).
    pub fn assert_logged(&self, level: &str, message: &str, fields: &[&str]) {
        let lines = self.lines_with(message);
        assert_eq!(
            lines.len(),
            1,
            "expected one '{message}' line, got:\n{}",
            self.contents()
        );
        let line = &lines[0];
        assert!(line.contains(level), "expected {level} level in: {line}");
        for field in fields {
            assert!(line.contains(field), "expected '{field}' in: {line}");
        }
    }

    pub fn assert_not_logged(&self, message: &str) {
        let lines = self.lines_with(message);
        assert!(lines.is_empty(), "unexpected log lines: {lines:?}");
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
