use std::time::{Duration, Instant};

use crate::fps::FpsChoice;

const FPS_SAMPLE_COUNT: usize = 60;

/// Fixed-step frame clock for the simulation worker.
///
/// Wall time feeds an accumulator; the loop consumes it in `fixed_dt` slices
/// so entity timers always advance by exactly one tick's worth of time,
/// independent of how late the thread woke up.
pub struct TimeState {
    pub fixed_dt: f64,
    pub max_accumulator: f64,
    accumulator: f64,
    pub total_time: f64,
    pub fixed_step_count: u64,
    pub frame_count: u64,
    pub steps_this_frame: u32,
    pub real_dt: f64,
    last_instant: Instant,

    fps_samples: [f64; FPS_SAMPLE_COUNT],
    fps_sample_index: usize,
    pub smoothed_fps: f64,
}

impl TimeState {
    pub fn new(fps: FpsChoice) -> Self {
        let fixed_dt = 1.0 / fps.hz() as f64;
        Self {
            fixed_dt,
            max_accumulator: 0.25,
            accumulator: 0.0,
            total_time: 0.0,
            fixed_step_count: 0,
            frame_count: 0,
            steps_this_frame: 0,
            real_dt: 0.0,
            last_instant: Instant::now(),
            fps_samples: [fixed_dt; FPS_SAMPLE_COUNT],
            fps_sample_index: 0,
            smoothed_fps: fps.hz() as f64,
        }
    }

    pub fn begin_frame(&mut self) {
        let now = Instant::now();
        self.advance(now.duration_since(self.last_instant));
        self.last_instant = now;
    }

    /// Feed an explicit wall-clock delta. `begin_frame` uses this with the
    /// measured delta; tests call it directly.
    pub fn advance(&mut self, elapsed: Duration) {
        self.real_dt = elapsed.as_secs_f64();

        // Spiral-of-death cap
        if self.real_dt > self.max_accumulator {
            log::warn!(
                "Frame took {:.1}ms, capping accumulator to {}ms",
                self.real_dt * 1000.0,
                self.max_accumulator * 1000.0
            );
            self.real_dt = self.max_accumulator;
        }

        self.accumulator += self.real_dt;
        self.steps_this_frame = 0;
        self.frame_count += 1;

        self.fps_samples[self.fps_sample_index] = self.real_dt;
        self.fps_sample_index = (self.fps_sample_index + 1) % FPS_SAMPLE_COUNT;
        let avg_dt: f64 = self.fps_samples.iter().sum::<f64>() / FPS_SAMPLE_COUNT as f64;
        self.smoothed_fps = if avg_dt > 0.0 { 1.0 / avg_dt } else { 0.0 };
    }

    pub fn should_step(&mut self) -> bool {
        if self.accumulator >= self.fixed_dt {
            self.accumulator -= self.fixed_dt;
            self.total_time += self.fixed_dt;
            self.fixed_step_count += 1;
            self.steps_this_frame += 1;
            true
        } else {
            false
        }
    }

    /// How long the worker may sleep before the next tick is due.
    pub fn time_until_next_step(&self) -> Duration {
        let remaining = (self.fixed_dt - self.accumulator).max(0.0);
        Duration::from_secs_f64(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_fixed_dt_yields_exactly_one_step() {
        let mut time = TimeState::new(FpsChoice::Fps60);
        time.advance(Duration::from_secs_f64(1.0 / 60.0 + 1e-9));
        assert!(time.should_step());
        assert!(!time.should_step());
        assert_eq!(time.fixed_step_count, 1);
    }

    #[test]
    fn long_frame_is_capped() {
        let mut time = TimeState::new(FpsChoice::Fps30);
        time.advance(Duration::from_secs(2));
        let mut steps = 0;
        while time.should_step() {
            steps += 1;
        }
        // 0.25s cap at 30 fps
        assert_eq!(steps, 7);
    }

    #[test]
    fn time_until_next_step_shrinks_as_time_accumulates() {
        let mut time = TimeState::new(FpsChoice::Fps30);
        let before = time.time_until_next_step();
        time.advance(Duration::from_millis(10));
        assert!(time.time_until_next_step() < before);
    }
}
