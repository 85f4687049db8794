//! Conversion frame layout and decoding.
//!
//! A frame is five slots: the status word followed by channels 1 to 4. Each channel
//! slot carries a 24-bit two's-complement sample in its three most significant bytes,
//! big-endian. In the wide format the fourth byte is padding.

/// Number of slots in a conversion frame.
pub const FRAME_SLOTS: usize = 5;

/// Largest frame in bytes, used to size transfer buffers.
pub const MAX_FRAME_LEN: usize = FRAME_SLOTS * WordWidth::Wide.slot_len();

/// Device word length, fixed by the M1 pin strapping.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WordWidth {
    /// 24-bit words, 3 bytes per slot.
    Narrow,
    /// 32-bit words, 4 bytes per slot.
    Wide,
}

impl WordWidth {
    /// Bytes per slot.
    pub const fn slot_len(self) -> usize {
        match self {
            Self::Narrow => 3,
            Self::Wide => 4,
        }
    }

    /// Bytes per conversion frame.
    pub const fn frame_len(self) -> usize {
        FRAME_SLOTS * self.slot_len()
    }
}

/// One conversion result.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleFrame {
    pub status: u16,
    pub channel1: i32,
    pub channel2: i32,
    pub channel3: i32,
    pub channel4: i32,
}

impl SampleFrame {
    /// Samples in channel order.
    pub const fn channels(&self) -> [i32; 4] {
        [self.channel1, self.channel2, self.channel3, self.channel4]
    }
}

/// Error returned when a buffer is not exactly one frame long.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameLengthError {
    pub expected: usize,
    pub actual: usize,
}

/// Decode a raw frame. `raw` must be exactly [`WordWidth::frame_len`] bytes.
pub fn decode_frame(raw: &[u8], width: WordWidth) -> Result<SampleFrame, FrameLengthError> {
    if raw.len() != width.frame_len() {
        return Err(FrameLengthError {
            expected: width.frame_len(),
            actual: raw.len(),
        });
    }

    Ok(parse(raw, width))
}

/// Decode a buffer already known to be one frame long.
pub(crate) fn parse(raw: &[u8], width: WordWidth) -> SampleFrame {
    let slot = width.slot_len();

    let channel = |index: usize| {
        let offset = index * slot;
        sign_extend_24([raw[offset], raw[offset + 1], raw[offset + 2]])
    };

    SampleFrame {
        status: u16::from_be_bytes([raw[0], raw[1]]),
        channel1: channel(1),
        channel2: channel(2),
        channel3: channel(3),
        channel4: channel(4),
    }
}

/// Sign-extend a big-endian 24-bit two's-complement value.
pub fn sign_extend_24(bytes: [u8; 3]) -> i32 {
    i32::from_be_bytes([bytes[0], bytes[1], bytes[2], 0]) >> 8
}

#[cfg(test)]
pub(crate) fn encode_frame(frame: &SampleFrame, width: WordWidth, out: &mut [u8]) {
    let slot = width.slot_len();
    out.fill(0);
    out[..2].copy_from_slice(&frame.status.to_be_bytes());
    for (index, value) in frame.channels().into_iter().enumerate() {
        let offset = (index + 1) * slot;
        out[offset..offset + 3].copy_from_slice(&value.to_be_bytes()[1..]);
    }
}
