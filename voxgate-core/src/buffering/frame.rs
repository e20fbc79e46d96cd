//! Fixed-size analysis frames and the assembler that cuts them from a stream.

/// A contiguous window of mono PCM samples at a known sample rate.
///
/// Produced fresh for every tick; the estimator never holds on to one.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Returns the duration of this frame in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Returns true if the frame contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Cuts overlapping `frame_size` windows out of an arbitrarily chunked stream.
///
/// A new frame becomes available every `hop` samples once the first
/// `frame_size` samples have arrived. Frames are yielded in stream order, so
/// replaying a file produces the same frame sequence regardless of how the
/// feeder chunked it.
#[derive(Debug)]
pub struct FrameAssembler {
    frame_size: usize,
    hop: usize,
    sample_rate: u32,
    buf: Vec<f32>,
    /// Start of the next frame inside `buf`.
    cursor: usize,
}

impl FrameAssembler {
    /// `frame_size` and `hop` are clamped to at least one sample.
    pub fn new(frame_size: usize, hop: usize, sample_rate: u32) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            hop: hop.max(1),
            sample_rate,
            buf: Vec::with_capacity(frame_size * 2),
            cursor: 0,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Append newly captured samples.
    pub fn push(&mut self, samples: &[f32]) {
        self.buf.extend_from_slice(samples);
    }

    /// Pop the next complete frame, if the stream has advanced far enough.
    pub fn next_frame(&mut self) -> Option<AudioFrame> {
        let end = self.cursor + self.frame_size;
        if self.buf.len() < end {
            return None;
        }
        let frame = AudioFrame::new(self.buf[self.cursor..end].to_vec(), self.sample_rate);
        self.cursor += self.hop;

        // Compact once the consumed prefix outgrows one frame.
        if self.cursor >= self.frame_size {
            let consumed = self.cursor.min(self.buf.len());
            self.buf.drain(..consumed);
            self.cursor -= consumed;
        }
        Some(frame)
    }

    /// Number of samples buffered but not yet released as part of a frame start.
    pub fn pending(&self) -> usize {
        self.buf.len().saturating_sub(self.cursor)
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.cursor = 0;
    }
}
