use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
/// Level the envelope decays to by the end of the pulse.
const TAIL_GAIN: f32 = 0.01;

/// A single mono sine pulse with an exponential fade-out.
pub struct SineBeep {
    frequency_hz: f32,
    volume: f32,
    num_sample: usize,
    total_samples: usize,
}

impl SineBeep {
    pub fn new(frequency_hz: f32, volume: f32, length: Duration) -> Self {
        let total_samples = (length.as_secs_f32() * SAMPLE_RATE as f32) as usize;
        Self {
            frequency_hz,
            volume: volume.clamp(0.0, 1.0),
            num_sample: 0,
            total_samples,
        }
    }

    fn gain_at(&self, progress: f32) -> f32 {
        if self.volume <= TAIL_GAIN {
            return self.volume;
        }
        // volume * (tail / volume)^progress
        self.volume * (TAIL_GAIN / self.volume).powf(progress)
    }
}

impl Iterator for SineBeep {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }

        let t = self.num_sample as f32 / SAMPLE_RATE as f32;
        let progress = self.num_sample as f32 / self.total_samples as f32;
        self.num_sample += 1;

        Some((2.0 * PI * self.frequency_hz * t).sin() * self.gain_at(progress))
    }
}

impl Source for SineBeep {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.num_sample)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / SAMPLE_RATE as f32,
        ))
    }
}
