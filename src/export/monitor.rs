use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::export::registry::JobId;
use crate::export::session::{ExportSession, ExportStatus};
use crate::media::AssetId;

/// Events the monitor reports back to the coordinator
#[derive(Debug)]
pub enum ExportUpdate {
    Progress {
        job: JobId,
        asset: AssetId,
        fraction: f64,
    },
    Finished(ExportFinished),
}

/// Terminal snapshot of a session
#[derive(Debug)]
pub struct ExportFinished {
    pub job: JobId,
    pub asset: AssetId,
    pub status: ExportStatus,
    pub output: Option<PathBuf>,
    pub error: Option<String>,
}

/// Polling settings
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,

    /// Progress polling stops once a reading goes above this
    pub stop_threshold: f64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            stop_threshold: 0.99,
        }
    }
}

/// Watch one session until it reaches a terminal state.
///
/// Progress is sampled on a fixed timer and only positive readings are
/// reported. The timer is dropped once a reading exceeds the stop threshold;
/// the terminal status is still picked up from the status channel.
pub fn spawn_monitor<E>(
    job: JobId,
    asset: AssetId,
    session: Arc<dyn ExportSession>,
    settings: PollSettings,
    events: UnboundedSender<E>,
) -> tokio::task::JoinHandle<()>
where
    E: From<ExportUpdate> + Send + 'static,
{
    tokio::spawn(async move {
        let mut status_rx = session.subscribe();
        let mut ticker = tokio::time::interval(settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polling = true;

        let status = loop {
            let current = *status_rx.borrow_and_update();
            if current.is_terminal() {
                break current;
            }

            tokio::select! {
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        // Sender gone without a terminal state
                        let last = *status_rx.borrow();
                        break if last.is_terminal() { last } else { ExportStatus::Failed };
                    }
                }
                _ = ticker.tick(), if polling => {
                    let fraction = session.progress() as f64;
                    if fraction > 0.0 {
                        let _ = events.send(
                            ExportUpdate::Progress {
                                job,
                                asset: asset.clone(),
                                fraction,
                            }
                            .into(),
                        );
                    }
                    if fraction > settings.stop_threshold {
                        debug!("{} passed {:.2}, progress polling stopped", job, settings.stop_threshold);
                        polling = false;
                    }
                }
            }
        };

        debug!("{} finished with status {}", job, status);
        let _ = events.send(
            ExportUpdate::Finished(ExportFinished {
                job,
                asset,
                status,
                output: session.output_path(),
                error: session.error(),
            })
            .into(),
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::registry::ExportRegistry;
    use crate::export::session::SessionState;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_reports_progress_then_terminal() {
        let state = Arc::new(SessionState::new());
        let job = ExportRegistry::new().reserve_id();
        let (tx, mut rx) = mpsc::unbounded_channel::<ExportUpdate>();

        let settings = PollSettings {
            interval: Duration::from_millis(5),
            ..PollSettings::default()
        };
        let handle = spawn_monitor(job, AssetId::from("a"), state.clone(), settings, tx);

        state.transition(ExportStatus::Running);
        state.set_progress(0.4);

        // Wait for at least one progress sample
        loop {
            match rx.recv().await {
                Some(ExportUpdate::Progress { fraction, .. }) => {
                    assert!(fraction > 0.0);
                    break;
                }
                Some(other) => panic!("unexpected update {:?}", other),
                None => panic!("monitor stopped early"),
            }
        }

        state.complete(PathBuf::from("/tmp/done.mp4"));
        handle.await.unwrap();

        let mut finished = None;
        while let Ok(update) = rx.try_recv() {
            if let ExportUpdate::Finished(f) = update {
                finished = Some(f);
            }
        }
        let finished = finished.expect("terminal update");
        assert_eq!(finished.status, ExportStatus::Completed);
        assert_eq!(finished.output, Some(PathBuf::from("/tmp/done.mp4")));
    }

    #[tokio::test]
    async fn test_polling_stops_past_threshold() {
        let state = Arc::new(SessionState::new());
        let job = ExportRegistry::new().reserve_id();
        let (tx, mut rx) = mpsc::unbounded_channel::<ExportUpdate>();

        let settings = PollSettings {
            interval: Duration::from_millis(2),
            ..PollSettings::default()
        };
        let handle = spawn_monitor(job, AssetId::from("a"), state.clone(), settings, tx);

        state.transition(ExportStatus::Running);
        state.set_progress(0.995);
        match rx.recv().await {
            Some(ExportUpdate::Progress { fraction, .. }) => assert!(fraction > 0.99),
            other => panic!("expected a progress sample, got {:?}", other),
        }

        // Several intervals with a different reading: nothing is sampled
        tokio::time::sleep(Duration::from_millis(20)).await;
        state.set_progress(0.999);
        tokio::time::sleep(Duration::from_millis(20)).await;
        state.complete(PathBuf::from("/tmp/done.mp4"));
        handle.await.unwrap();

        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        assert_eq!(updates.len(), 1, "only the terminal update after the threshold: {:?}", updates);
        assert!(matches!(
            &updates[0],
            ExportUpdate::Finished(ExportFinished { status: ExportStatus::Completed, .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_progress_is_not_reported() {
        let state = Arc::new(SessionState::new());
        let job = ExportRegistry::new().reserve_id();
        let (tx, mut rx) = mpsc::unbounded_channel::<ExportUpdate>();

        let settings = PollSettings {
            interval: Duration::from_millis(2),
            ..PollSettings::default()
        };
        let handle = spawn_monitor(job, AssetId::from("a"), state.clone(), settings, tx);

        tokio::time::sleep(Duration::from_millis(20)).await;
        state.transition(ExportStatus::Cancelled);
        handle.await.unwrap();

        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        assert_eq!(updates.len(), 1);
        assert!(matches!(
            &updates[0],
            ExportUpdate::Finished(ExportFinished { status: ExportStatus::Cancelled, .. })
        ));
    }
}
