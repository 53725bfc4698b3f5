//! Synthetic load series for exercising filters and detectors
//!
//! A [`LoadGenerator`] produces one [`LoadSample`] per iteration from a model
//! function, with noise layered on top by a [`NoiseGenerator`]. Timestamps
//! advance by a fixed time window per iteration.

/// Timestamp of the first generated sample
pub const DEFAULT_START_TIMESTAMP: f64 = 34_223_425.0;

/// Seconds between generated samples
pub const DEFAULT_TIME_WINDOW: f64 = 1.0;

/// Source of per-iteration noise
pub trait NoiseGenerator {
    fn generate(&mut self, iteration: u32) -> f64;
}

/// Generates no noise
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroNoise;

impl NoiseGenerator for ZeroNoise {
    fn generate(&mut self, _iteration: u32) -> f64 {
        0.0
    }
}

/// Deterministic noise that alternates sign every call and ramps its
/// magnitude up to `max_noise` and back. Its long-run average is zero.
#[derive(Debug, Clone)]
pub struct SymmetricNoise {
    max_noise: f64,
    step: f64,
    sign: f64,
    noise: f64,
}

impl SymmetricNoise {
    pub fn new(max_noise: f64) -> Self {
        Self {
            max_noise,
            step: max_noise / 4.0,
            sign: -1.0,
            noise: 0.0,
        }
    }
}

impl NoiseGenerator for SymmetricNoise {
    fn generate(&mut self, iteration: u32) -> f64 {
        self.sign = -self.sign;
        if iteration % 2 == 0 {
            self.noise += self.step;
            if self.noise.abs() >= self.max_noise {
                self.step = -self.step;
            }
        }
        self.noise * self.sign
    }
}

/// One generated sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSample {
    /// Clean model value
    pub value: f64,
    pub noise: f64,
    pub timestamp: f64,
}

impl LoadSample {
    /// Model value with noise applied
    pub fn noisy(&self) -> f64 {
        self.value + self.noise
    }
}

/// Iterates a model function over `iteration..=iterations`
pub struct LoadGenerator<F, N> {
    model: F,
    noise: N,
    iteration: u32,
    iterations: u32,
    exhausted: bool,
    timestamp: f64,
    /// Offset added to every model value from now on
    pub modifier: f64,
}

impl<F, N> LoadGenerator<F, N>
where
    F: Fn(f64) -> f64,
    N: NoiseGenerator,
{
    pub fn new(model: F, noise: N, iterations: u32) -> Self {
        Self {
            model,
            noise,
            iteration: 0,
            iterations,
            exhausted: false,
            timestamp: DEFAULT_START_TIMESTAMP,
            modifier: 0.0,
        }
    }

    pub fn starting_at(mut self, iteration: u32) -> Self {
        self.iteration = iteration;
        self
    }

    /// Index of the next sample to be generated
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn next_sample(&mut self) -> Option<LoadSample> {
        if self.exhausted || self.iteration > self.iterations {
            return None;
        }

        let sample = LoadSample {
            value: self.modifier + (self.model)(self.iteration as f64),
            noise: self.noise.generate(self.iteration),
            timestamp: self.timestamp,
        };

        match self.iteration.checked_add(1) {
            Some(next) => self.iteration = next,
            None => self.exhausted = true,
        }
        self.timestamp += DEFAULT_TIME_WINDOW;
        Some(sample)
    }
}

impl<F, N> Iterator for LoadGenerator<F, N>
where
    F: Fn(f64) -> f64,
    N: NoiseGenerator,
{
    type Item = LoadSample;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_sample()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_inclusive_range() {
        let samples: Vec<_> = LoadGenerator::new(|i: f64| i, ZeroNoise, 4).collect();
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[4].value, 4.0);
        assert_eq!(samples[1].timestamp - samples[0].timestamp, DEFAULT_TIME_WINDOW);
    }

    #[test]
    fn test_starting_iteration_and_modifier() {
        let mut generator = LoadGenerator::new(|i: f64| i * 2.0, ZeroNoise, 5).starting_at(3);
        generator.modifier = 10.0;
        let first = generator.next_sample().unwrap();
        assert_eq!(first.value, 16.0);
        assert_eq!(generator.iteration(), 4);
    }

    #[test]
    fn test_last_representable_iteration_ends_the_series() {
        let mut generator =
            LoadGenerator::new(|_: f64| 1.0, ZeroNoise, u32::MAX).starting_at(u32::MAX - 1);
        assert!(generator.next_sample().is_some());
        assert!(generator.next_sample().is_some());
        assert!(generator.next_sample().is_none());
        assert!(generator.next_sample().is_none());
    }

    #[test]
    fn test_symmetric_noise_is_bounded_and_balanced() {
        let mut noise = SymmetricNoise::new(2.0);
        let values: Vec<f64> = (0..400).map(|i| noise.generate(i)).collect();
        assert!(values.iter().all(|v| v.abs() <= 2.0 + 1e-9));
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        assert!(mean.abs() < 0.1, "mean was {}", mean);
    }
}
