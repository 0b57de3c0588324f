pub use super::*;

/// The losses and durations of every iteration so far.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LossHistory {
    pub durations: Vec<Duration>,
    /// Absent in pretraining
    pub image: Vec<f64>,
    pub regularization: Vec<f64>,
}

/// The averages over the latest iterations of a [`LossHistory`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LossSummary {
    pub duration: Duration,
    pub image: f64,
    pub regularization: f64,
}

impl LossHistory {
    pub fn record(
        &mut self,
        phase: TrainingPhase,
        losses: LossValues,
        duration: Duration,
    ) -> &mut Self {
        if phase != TrainingPhase::Pretrain {
            self.image.push(losses.image);
        }
        self.regularization.push(losses.regularization);
        self.durations.push(duration);
        self
    }

    /// Averaging the latest `window` entries of each record.
    pub fn summary(
        &self,
        window: usize,
    ) -> LossSummary {
        fn latest<T>(
            values: &[T],
            window: usize,
        ) -> &[T] {
            &values[values.len().saturating_sub(window)..]
        }
        fn mean(values: &[f64]) -> f64 {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        }

        let durations = latest(&self.durations, window);
        let duration = if durations.is_empty() {
            Duration::ZERO
        } else {
            durations.iter().sum::<Duration>() / durations.len() as u32
        };

        LossSummary {
            duration,
            image: mean(latest(&self.image, window)),
            regularization: mean(latest(&self.regularization, window)),
        }
    }
}

/// Formatting a duration like `1 h 02 m 03 s`.
pub fn duration_to_text(duration: Duration) -> String {
    let seconds = duration.as_secs();
    let (hours, minutes, seconds) = (seconds / 3600, seconds / 60 % 60, seconds % 60);

    match (hours, minutes) {
        (0, 0) => format!("{seconds} s"),
        (0, _) => format!("{minutes} m {seconds:02} s"),
        _ => format!("{hours} h {minutes:02} m {seconds:02} s"),
    }
}
