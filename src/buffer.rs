//! Fixed-capacity bulk sample buffer and its flush policy.
//!
//! Samples are stored as 4-byte little-endian records. A record is appended whole,
//! and as soon as there is no room left for another one the buffer is reported to
//! the host and emptied. The worst-case reporting latency is therefore one buffer
//! worth of samples.

/// Bytes occupied by one record.
pub const BYTES_PER_SAMPLE: usize = 4;
/// Sentinel record marking an error in the sample stream.
pub const SAMPLE_ERROR: u32 = 0x8000_0000;
/// Default buffer capacity in records.
pub const DEFAULT_SLOTS: usize = 16;

/// One flush of buffered samples pushed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BulkReport<'a> {
    /// Handle of the reporting instance.
    pub oid: u8,
    /// Wrapping message counter, reset when capture starts.
    pub sequence: u16,
    /// Concatenated little-endian records.
    pub data: &'a [u8],
    /// Overflow counter, or the last in-band error code.
    pub possible_overflows: u16,
}

/// Host transport receiving bulk reports.
pub trait BulkSink {
    /// Transmits one report. Framing is the transport's concern.
    fn report(&mut self, report: BulkReport<'_>);
}

impl<S: BulkSink + ?Sized> BulkSink for &mut S {
    fn report(&mut self, report: BulkReport<'_>) {
        (**self).report(report)
    }
}

/// Byte queue of `SLOTS` sample records.
///
/// `SLOTS` must be a power of two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer<const SLOTS: usize = DEFAULT_SLOTS> {
    data: [[u8; BYTES_PER_SAMPLE]; SLOTS],
    len: usize,
    sequence: u16,
    possible_overflows: u16,
}

impl<const SLOTS: usize> SampleBuffer<SLOTS> {
    const CAPACITY_OK: () = assert!(
        SLOTS.is_power_of_two(),
        "sample buffer capacity must be a power of two"
    );

    /// Capacity in bytes.
    pub const CAPACITY: usize = SLOTS * BYTES_PER_SAMPLE;

    /// Creates an empty buffer.
    pub const fn new() -> Self {
        let () = Self::CAPACITY_OK;
        Self {
            data: [[0; BYTES_PER_SAMPLE]; SLOTS],
            len: 0,
            sequence: 0,
            possible_overflows: 0,
        }
    }

    /// Drops buffered data and restarts the sequence and overflow counters.
    pub fn reset(&mut self) {
        self.len = 0;
        self.sequence = 0;
        self.possible_overflows = 0;
    }

    /// Unflushed bytes.
    pub fn data_count(&self) -> usize {
        self.len * BYTES_PER_SAMPLE
    }

    /// Whether no record is buffered.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sequence number the next report will carry.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Overflow counter or last error code.
    pub fn possible_overflows(&self) -> u16 {
        self.possible_overflows
    }

    /// Stores an error code in the overflow side channel.
    pub fn set_error_code(&mut self, code: u8) {
        self.possible_overflows = u16::from(code);
    }

    /// Buffered bytes, oldest first.
    pub fn as_bytes(&self) -> &[u8] {
        self.data[..self.len].as_flattened()
    }

    /// Whether another record still fits.
    pub fn has_room(&self) -> bool {
        self.len < SLOTS
    }

    /// Appends one record. A full buffer is flushed first so no record is lost.
    pub fn push(&mut self, oid: u8, record: u32, sink: &mut impl BulkSink) {
        if !self.has_room() {
            self.flush(oid, sink);
        }
        self.data[self.len] = record.to_le_bytes();
        self.len += 1;
    }

    /// Reports the buffer if no room is left for another record.
    ///
    /// Returns whether a flush happened.
    pub fn flush_if_full(&mut self, oid: u8, sink: &mut impl BulkSink) -> bool {
        if self.has_room() {
            return false;
        }
        self.flush(oid, sink);
        true
    }

    /// Reports the buffered records to the host and empties the buffer.
    pub fn flush(&mut self, oid: u8, sink: &mut impl BulkSink) {
        sink.report(BulkReport {
            oid,
            sequence: self.sequence,
            data: self.as_bytes(),
            possible_overflows: self.possible_overflows,
        });
        self.sequence = self.sequence.wrapping_add(1);
        self.len = 0;
    }
}

impl<const SLOTS: usize> Default for SampleBuffer<SLOTS> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reassembles a signed count from its little-endian record.
#[inline]
pub fn record_counts(record: [u8; BYTES_PER_SAMPLE]) -> i32 {
    i32::from_le_bytes(record)
}
