//! Format candidates, the fallback plan, and wire-level format descriptors.

use std::fmt;

/// Sample rates tried after the requested rate, in preference order.
pub const PREFERRED_RATES: [u32; 5] = [48_000, 44_100, 96_000, 192_000, 32_000];

/// Front left | front right.
pub const SPEAKER_STEREO: u32 = 0x3;

/// One trial point in the negotiation search space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatCandidate {
    /// 32-bit IEEE float samples; 16-bit integer PCM otherwise.
    pub float: bool,
    /// Sample rate in Hz.
    pub rate: u32,
}

impl fmt::Display for FormatCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {} Hz",
            if self.float { "float" } else { "pcm" },
            self.rate
        )
    }
}

/// Ordered fallback plan over formats and rates.
///
/// Two passes, one per sample format (the requested format first), each pass
/// trying the requested rate first (when nonzero) and then [`PREFERRED_RATES`]
/// with the requested rate filtered out, so no rate is tried twice in a pass.
/// A requested rate of 0 means "unspecified" and the passes run over the
/// preference list alone.
pub struct FormatPlan {
    candidates: std::vec::IntoIter<FormatCandidate>,
}

impl FormatPlan {
    pub fn new(float_first: bool, requested_rate: u32) -> Self {
        let mut rates = Vec::with_capacity(1 + PREFERRED_RATES.len());
        if requested_rate != 0 {
            rates.push(requested_rate);
        }
        rates.extend(PREFERRED_RATES.iter().copied().filter(|&r| r != requested_rate));

        let mut candidates = Vec::with_capacity(2 * rates.len());
        for float in [float_first, !float_first] {
            for &rate in &rates {
                candidates.push(FormatCandidate { float, rate });
            }
        }
        Self {
            candidates: candidates.into_iter(),
        }
    }
}

impl Iterator for FormatPlan {
    type Item = FormatCandidate;

    fn next(&mut self) -> Option<FormatCandidate> {
        self.candidates.next()
    }
}

/// Wire-level format tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatTag {
    /// Plain PCM, 16-bit integer samples.
    Pcm,
    /// Extensible format carrying the IEEE float subformat, 32-bit samples.
    IeeeFloat,
}

/// Wire-level stream format descriptor handed to the platform on initialize.
///
/// Field values are bit-exact with the platform contract: stereo only, float
/// is 32 bits at block align 8, PCM is 16 bits at block align 4.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaveFormat {
    pub tag: FormatTag,
    pub channels: u16,
    pub sample_rate: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// Valid bits per sample (extensible formats only).
    pub valid_bits_per_sample: u16,
    /// Speaker position mask (extensible formats only).
    pub channel_mask: u32,
}

impl WaveFormat {
    /// Build the 2-channel descriptor for one candidate.
    pub fn stereo(candidate: FormatCandidate) -> Self {
        let rate = candidate.rate;
        if candidate.float {
            Self {
                tag: FormatTag::IeeeFloat,
                channels: 2,
                sample_rate: rate,
                avg_bytes_per_sec: rate * 8,
                block_align: 8,
                bits_per_sample: 32,
                valid_bits_per_sample: 32,
                channel_mask: SPEAKER_STEREO,
            }
        } else {
            Self {
                tag: FormatTag::Pcm,
                channels: 2,
                sample_rate: rate,
                avg_bytes_per_sec: rate * 4,
                block_align: 4,
                bits_per_sample: 16,
                valid_bits_per_sample: 16,
                channel_mask: 0,
            }
        }
    }

    pub fn is_float(&self) -> bool {
        self.tag == FormatTag::IeeeFloat
    }
}
