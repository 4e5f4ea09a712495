//! Counters that survive deep sleep.
//!
//! The block lives in RTC fast memory on the device. That memory keeps its
//! contents across deep sleep but holds garbage after a full power loss, so
//! the block carries a magic word and a seal over its fields. A block that
//! fails either check is treated as "no prior state".
//!
//! Binary format (little-endian, 20 bytes):
//! - magic: 4 bytes (u32)
//! - pulse_count: 4 bytes (u32)
//! - last_report_time: 4 bytes (u32, seconds)
//! - next_report_time: 4 bytes (u32, seconds)
//! - seal: 4 bytes (u32, FNV-1a of the preceding 16 bytes)

/// Marks a block written by this firmware.
pub const RETAINED_MAGIC: u32 = 0x5055_4C53;

const FNV_OFFSET: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetainedState {
    magic: u32,
    pulse_count: u32,
    last_report_time: u32,
    next_report_time: u32,
    seal: u32,
}

impl Default for RetainedState {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl RetainedState {
    /// An all-zero block, as found after power loss. Not valid until
    /// [`RetainedState::cold_start`] runs.
    pub const fn zeroed() -> Self {
        Self {
            magic: 0,
            pulse_count: 0,
            last_report_time: 0,
            next_report_time: 0,
            seal: 0,
        }
    }

    /// Returns the size of this structure in bytes (20).
    pub const fn size() -> usize {
        core::mem::size_of::<Self>()
    }

    pub fn is_valid(&self) -> bool {
        self.magic == RETAINED_MAGIC && self.seal == self.compute_seal()
    }

    /// Zero every counter and mark the block valid.
    ///
    /// This is the only place the counters are zero-initialized; it runs on a
    /// true first boot or when the block failed validation.
    pub fn cold_start(&mut self) {
        self.magic = RETAINED_MAGIC;
        self.pulse_count = 0;
        self.last_report_time = 0;
        self.next_report_time = 0;
        self.reseal();
    }

    pub const fn pulse_count(&self) -> u32 {
        self.pulse_count
    }

    pub const fn last_report_time(&self) -> u32 {
        self.last_report_time
    }

    pub const fn next_report_time(&self) -> u32 {
        self.next_report_time
    }

    /// Count one pulse. Returns the new count.
    pub fn record_pulse(&mut self) -> u32 {
        self.pulse_count = self.pulse_count.saturating_add(1);
        self.reseal();
        self.pulse_count
    }

    /// Set the next deadline from the current clock, never from the previous
    /// deadline, so a late wake does not accumulate drift.
    pub fn schedule_next(&mut self, now: u32, period_secs: u32) {
        self.next_report_time = now.saturating_add(period_secs);
        self.reseal();
    }

    /// Start a fresh reporting window at `now`.
    pub fn close_window(&mut self, now: u32, period_secs: u32) {
        self.pulse_count = 0;
        self.last_report_time = now;
        self.next_report_time = now.saturating_add(period_secs);
        self.reseal();
    }

    /// Pull a window start that lies ahead of `now` back to `now`, keeping
    /// the count. Returns whether it moved.
    ///
    /// Needed after a reset that restarted the RTC counter but kept the
    /// block, so the next rate has a real elapsed time to divide by.
    pub fn rebase_window(&mut self, now: u32) -> bool {
        if self.last_report_time <= now {
            return false;
        }
        self.last_report_time = now;
        self.reseal();
        true
    }

    /// Converts the block to a byte array.
    pub fn to_bytes(&self) -> [u8; 20] {
        let mut bytes = [0u8; 20];
        bytes[0..16].copy_from_slice(&self.field_bytes());
        bytes[16..20].copy_from_slice(&self.seal.to_le_bytes());
        bytes
    }

    /// Creates a block from a byte array. The result may be invalid.
    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        let word = |offset: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&bytes[offset..offset + 4]);
            u32::from_le_bytes(b)
        };

        Self {
            magic: word(0),
            pulse_count: word(4),
            last_report_time: word(8),
            next_report_time: word(12),
            seal: word(16),
        }
    }

    fn field_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.pulse_count.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.last_report_time.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.next_report_time.to_le_bytes());
        bytes
    }

    fn compute_seal(&self) -> u32 {
        self.field_bytes()
            .iter()
            .fold(FNV_OFFSET, |hash, &b| (hash ^ u32::from(b)).wrapping_mul(FNV_PRIME))
    }

    fn reseal(&mut self) {
        self.seal = self.compute_seal();
    }
}
