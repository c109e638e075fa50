use tracing::info;

/// Receiver of the combined progress value.
///
/// Called on every aggregated update; implementations do their own
/// throttling.
pub trait ProgressSink: Send + Sync {
    fn update_progress(&self, fraction: f32, label: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(f32, &str) + Send + Sync,
{
    fn update_progress(&self, fraction: f32, label: &str) {
        self(fraction, label)
    }
}

/// Logs progress at whole-percent steps
#[derive(Debug, Default)]
pub struct TracingProgressSink {
    last_percent: std::sync::atomic::AtomicU32,
}

impl TracingProgressSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for TracingProgressSink {
    fn update_progress(&self, fraction: f32, label: &str) {
        use std::sync::atomic::Ordering;

        let percent = (fraction.clamp(0.0, 1.0) * 100.0).round() as u32;
        if self.last_percent.swap(percent, Ordering::Relaxed) != percent {
            info!("{}: {}%", label, percent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closures_are_sinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let sink: Box<dyn ProgressSink> = Box::new(move |fraction: f32, label: &str| {
            recorder.lock().unwrap().push((fraction, label.to_string()));
        });

        sink.update_progress(0.5, "Exporting");
        assert_eq!(seen.lock().unwrap().as_slice(), &[(0.5, "Exporting".to_string())]);
    }
}
