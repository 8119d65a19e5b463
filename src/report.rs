//! Phase line output
//!
//! Writes one `<timestamp> <W|B> <ms>` line per phase and flushes it. The
//! first write error is logged and latched; callers stop the run on it
//! instead of burning with nobody listening.

use crate::scheduler::Phase;
use log::warn;
use std::io::{self, Write};

pub struct PhaseWriter<W> {
    out: W,
    failed: bool,
}

impl<W: Write> PhaseWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, failed: false }
    }

    /// Write and flush one phase line.
    ///
    /// Returns `false` once the stream has failed; later calls do not touch
    /// the stream again.
    pub fn write(&mut self, phase: &Phase) -> bool {
        if self.failed {
            return false;
        }
        if let Err(err) = self.write_line(phase) {
            warn!("phase output failed: {}", err);
            self.failed = true;
        }
        !self.failed
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    fn write_line(&mut self, phase: &Phase) -> io::Result<()> {
        writeln!(self.out, "{}", phase)?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::PhaseKind;
    use chrono::{TimeZone, Utc};

    /// Rejects every write like a pipe whose reader went away
    struct ClosedPipe {
        attempts: usize,
    }

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            self.attempts += 1;
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn phase(kind: PhaseKind, duration_ms: u64) -> Phase {
        Phase {
            kind,
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
            duration_ms,
        }
    }

    #[test]
    fn test_writes_one_line_per_phase() {
        let mut writer = PhaseWriter::new(Vec::new());
        assert!(writer.write(&phase(PhaseKind::Wait, 0)));
        assert!(writer.write(&phase(PhaseKind::Burn, 100)));
        assert!(!writer.failed());

        let text = String::from_utf8(writer.out).unwrap();
        assert_eq!(text, "1700000000.123 W 0\n1700000000.123 B 100\n");
    }

    #[test]
    fn test_closed_output_is_latched() {
        let mut writer = PhaseWriter::new(ClosedPipe { attempts: 0 });
        assert!(!writer.write(&phase(PhaseKind::Wait, 5)));
        assert!(writer.failed());

        assert!(!writer.write(&phase(PhaseKind::Burn, 5)));
        assert_eq!(writer.out.attempts, 1);
    }
}
