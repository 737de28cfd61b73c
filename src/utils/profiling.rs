use std::time::{Duration, Instant};

/// Timing and counters gathered during one `PhysicsSystem::update` call.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhysicsProfiler {
    pub integrate_time: Duration,
    pub detection_time: Duration,
    pub solver_time: Duration,
    pub total_time: Duration,

    pub body_count: usize,
    pub substeps: u32,
    pub contact_count: usize,
    pub gpu_passes: u32,
    pub cpu_fallbacks: u32,
}

impl PhysicsProfiler {
    pub fn report(&self) {
        let total_us = self.total_time.as_micros() as f32;
        if total_us < 1.0 {
            return;
        }

        log::debug!(
            "physics: {} bodies, {} substeps, {} contacts, {} gpu passes, {} cpu fallbacks",
            self.body_count,
            self.substeps,
            self.contact_count,
            self.gpu_passes,
            self.cpu_fallbacks
        );
        log::debug!(
            "physics: total {:.2} ms | integrate {:.1}% | detect {:.1}% | solve {:.1}%",
            self.total_time.as_secs_f32() * 1000.0,
            (self.integrate_time.as_micros() as f32 / total_us) * 100.0,
            (self.detection_time.as_micros() as f32 / total_us) * 100.0,
            (self.solver_time.as_micros() as f32 / total_us) * 100.0
        );
    }
}

/// Adds the lifetime of the guard to the referenced duration.
pub struct ScopedTimer<'a> {
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(output: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            output,
        }
    }
}

impl<'a> Drop for ScopedTimer<'a> {
    fn drop(&mut self) {
        *self.output += self.start.elapsed();
    }
}
