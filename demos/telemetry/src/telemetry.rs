//! Sequence-counted telemetry record.
//!
//! Producers bracket every update with two increments of a sequence counter:
//! odd means a write is in progress, even means the record is stable. The
//! consumer copies the record optimistically and retries until the counter
//! reads the same even value before and after the copy.

use core::sync::atomic::{fence, AtomicI16, AtomicU16, AtomicU32, Ordering};

#[cfg(any(test, feature = "fault-injection"))]
use core::sync::atomic::AtomicBool;

/// Downlink telemetry frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Telemetry {
    /// Tick of the last update
    pub tick: u32,
    pub temp_c: i16,
    pub vbat_mv: u16,
}

/// Shared [`Telemetry`] record with lock-free consistent reads
pub struct TelemetryCell {
    seq: AtomicU32,
    tick: AtomicU32,
    temp_c: AtomicI16,
    vbat_mv: AtomicU16,
    retries: AtomicU32,
    #[cfg(any(test, feature = "fault-injection"))]
    inject_once: AtomicBool,
}

impl TelemetryCell {
    pub const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            tick: AtomicU32::new(0),
            temp_c: AtomicI16::new(0),
            vbat_mv: AtomicU16::new(0),
            retries: AtomicU32::new(0),
            #[cfg(any(test, feature = "fault-injection"))]
            inject_once: AtomicBool::new(false),
        }
    }

    /// Update the record.
    ///
    /// `update` sees the current contents and edits them in place; the result
    /// is published as one consistent frame.
    pub fn write<F>(&self, update: F)
    where
        F: FnOnce(&mut Telemetry),
    {
        let start = self.begin_write();

        let mut frame = self.load_fields();
        update(&mut frame);
        self.tick.store(frame.tick, Ordering::Relaxed);
        self.temp_c.store(frame.temp_c, Ordering::Relaxed);
        self.vbat_mv.store(frame.vbat_mv, Ordering::Relaxed);

        self.seq.store(start.wrapping_add(2), Ordering::Release);
    }

    /// Copy a consistent frame, retrying while writers interfere
    pub fn read_snapshot(&self) -> Telemetry {
        loop {
            let s0 = self.seq.load(Ordering::Acquire);
            if s0 & 1 != 0 {
                core::hint::spin_loop();
                continue;
            }

            #[cfg(any(test, feature = "fault-injection"))]
            if self.inject_once.swap(false, Ordering::SeqCst) {
                self.write(|frame| frame.temp_c = frame.temp_c.wrapping_add(1));
            }

            let frame = self.load_fields();

            fence(Ordering::Acquire);
            let s1 = self.seq.load(Ordering::Relaxed);
            if s0 == s1 {
                return frame;
            }

            self.retries.fetch_add(1, Ordering::Relaxed);
            core::hint::spin_loop();
        }
    }

    /// Current sequence value; even when no write is in progress
    pub fn sequence(&self) -> u32 {
        self.seq.load(Ordering::Acquire)
    }

    /// Number of reads that had to be retried
    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Clear the record and the counters.
    ///
    /// Only valid while no task is reading or writing.
    pub fn reset(&self) {
        self.seq.store(0, Ordering::SeqCst);
        self.tick.store(0, Ordering::SeqCst);
        self.temp_c.store(0, Ordering::SeqCst);
        self.vbat_mv.store(0, Ordering::SeqCst);
        self.retries.store(0, Ordering::SeqCst);
        #[cfg(any(test, feature = "fault-injection"))]
        self.inject_once.store(false, Ordering::SeqCst);
    }

    /// Make the next snapshot race with one complete write (+1 °C).
    ///
    /// The write lands after the reader has sampled an even sequence and
    /// before it copies the fields, so that read is forced to retry.
    #[cfg(any(test, feature = "fault-injection"))]
    pub fn inject_interference_once(&self) {
        self.inject_once.store(true, Ordering::SeqCst);
    }

    /// Move the sequence from even to odd; returns the even value
    fn begin_write(&self) -> u32 {
        loop {
            let s = self.seq.load(Ordering::Relaxed);
            if s & 1 != 0 {
                core::hint::spin_loop();
                continue;
            }
            if self
                .seq
                .compare_exchange_weak(s, s.wrapping_add(1), Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                fence(Ordering::Release);
                return s;
            }
        }
    }

    fn load_fields(&self) -> Telemetry {
        Telemetry {
            tick: self.tick.load(Ordering::Relaxed),
            temp_c: self.temp_c.load(Ordering::Relaxed),
            vbat_mv: self.vbat_mv.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn write_publishes_and_keeps_sequence_even() {
        let cell = TelemetryCell::new();
        cell.write(|frame| {
            frame.tick = 4;
            frame.vbat_mv = 3_300;
        });
        cell.write(|frame| frame.temp_c -= 5);

        assert_eq!(cell.sequence(), 4);
        assert_eq!(
            cell.read_snapshot(),
            Telemetry {
                tick: 4,
                temp_c: -5,
                vbat_mv: 3_300,
            }
        );
        assert_eq!(cell.retries(), 0);
    }

    #[test]
    fn injected_write_forces_one_retry() {
        let cell = TelemetryCell::new();
        cell.write(|frame| frame.temp_c = 10);

        cell.inject_interference_once();
        let snap = cell.read_snapshot();

        assert_eq!(snap.temp_c, 11);
        assert_eq!(cell.retries(), 1);
        assert_eq!(cell.sequence(), 4);

        // The hook fires once only.
        assert_eq!(cell.read_snapshot().temp_c, 11);
        assert_eq!(cell.retries(), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let cell = TelemetryCell::new();
        cell.write(|frame| frame.tick = 9);
        cell.inject_interference_once();
        cell.reset();

        assert_eq!(cell.sequence(), 0);
        assert_eq!(cell.read_snapshot(), Telemetry::default());
        assert_eq!(cell.retries(), 0);
    }

    #[test]
    fn concurrent_reader_never_sees_a_torn_frame() {
        let cell = Arc::new(TelemetryCell::new());
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let cell = Arc::clone(&cell);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for n in 1..=20_000u32 {
                    cell.write(|frame| {
                        frame.tick = n;
                        frame.temp_c = (n % 1_000) as i16;
                        frame.vbat_mv = (n % 1_000) as u16;
                    });
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        while !done.load(Ordering::SeqCst) {
            let snap = cell.read_snapshot();
            assert_eq!(snap.temp_c as u16, snap.vbat_mv);
            assert_eq!((snap.tick % 1_000) as u16, snap.vbat_mv);
        }
        writer.join().unwrap();

        assert_eq!(cell.read_snapshot().tick, 20_000);
        assert_eq!(cell.sequence(), 40_000);
    }
}
