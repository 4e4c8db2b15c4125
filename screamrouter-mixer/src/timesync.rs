use std::collections::VecDeque;

/// Applies a fixed, per-sink sample-count shift used to align multiple
/// sinks sharing a listening space. Only non-negative offsets produce an
/// actual shift: a real-time stream cannot be advanced into samples that
/// have not arrived yet, so a negative `time_sync_offset_samples` is
/// treated as zero (documented as a resolved Open Question).
pub struct TimeSyncShift {
    lines: Vec<VecDeque<f32>>,
    samples: usize,
}

impl TimeSyncShift {
    pub fn new(channels: u8, offset_samples: Option<i64>) -> Self {
        let samples = offset_samples.unwrap_or(0).max(0) as usize;
        Self {
            lines: (0..channels)
                .map(|_| VecDeque::from(vec![0.0f32; samples]))
                .collect(),
            samples,
        }
    }

    pub fn process_planar(&mut self, planar: &mut [Vec<f32>]) {
        if self.samples == 0 {
            return;
        }
        for (channel, block) in planar.iter_mut().enumerate() {
            if channel >= self.lines.len() {
                break;
            }
            let line = &mut self.lines[channel];
            for sample in block.iter_mut() {
                line.push_back(*sample);
                *sample = line.pop_front().unwrap_or(0.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_offset_is_transparent() {
        let mut shift = TimeSyncShift::new(1, None);
        let mut planar = vec![vec![1.0, 2.0, 3.0]];
        shift.process_planar(&mut planar);
        assert_eq!(planar[0], vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn positive_offset_delays_by_that_many_samples() {
        let mut shift = TimeSyncShift::new(1, Some(2));
        let mut planar = vec![vec![1.0, 2.0, 3.0, 4.0]];
        shift.process_planar(&mut planar);
        assert_eq!(planar[0], vec![0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn negative_offset_is_treated_as_zero() {
        let mut shift = TimeSyncShift::new(1, Some(-5));
        let mut planar = vec![vec![1.0, 2.0, 3.0]];
        shift.process_planar(&mut planar);
        assert_eq!(planar[0], vec![1.0, 2.0, 3.0]);
    }
}
