//! `ChangeSource`: watches the store's backing paths and drives the
//! coordinator's reload with a debounce window, grounded on the watcher/
//! debounce-loop split other reference implementations in this space use —
//! a raw `notify` watcher feeding a channel, bridged into an async debounce
//! loop rather than pulled in via a debouncing wrapper crate (keeps the
//! dependency surface to what the teacher's stack already covers).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use codegraph_storage::ChunkReader;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::SearchConfig;
use crate::coordinator::SearcherCoordinator;
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, SearchError};

pub struct ChangeSource<R: ChunkReader + 'static, E: EmbeddingProvider + 'static> {
    coordinator: Arc<SearcherCoordinator<R, E>>,
    debounce_interval: Duration,
}

impl<R, E> ChangeSource<R, E>
where
    R: ChunkReader + 'static,
    E: EmbeddingProvider + 'static,
{
    pub fn new(coordinator: Arc<SearcherCoordinator<R, E>>, config: &SearchConfig) -> Self {
        Self {
            coordinator,
            debounce_interval: config.debounce_interval,
        }
    }

    /// Runs until `cancel` fires. On any watched-path write/create event,
    /// (re)starts a `debounce_interval` timer; when it elapses with no
    /// further events, triggers exactly one `coordinator.reload`. A burst of
    /// events arriving mid-reload coalesces into at most one follow-up
    /// reload, since only one reload can be in flight — the coordinator's
    /// own mutex serializes it.
    pub async fn watch(&self, paths: &[PathBuf], cancel: CancellationToken) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

        let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(|e| SearchError::backend(format!("watcher init failed: {e}")))?;

        for path in paths {
            watcher
                .watch(path, RecursiveMode::Recursive)
                .map_err(|e| SearchError::backend(format!("watch failed for {}: {e}", path.display())))?;
        }

        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("change source: cancelled, stopping watch loop");
                    break;
                }

                maybe_event = rx.recv() => {
                    match maybe_event {
                        None => {
                            warn!("change source: watcher channel closed, stopping watch loop");
                            break;
                        }
                        Some(Err(e)) => {
                            warn!("change source: watcher reported an error: {e}");
                        }
                        Some(Ok(event)) if is_relevant(&event) => {
                            deadline = Some(Instant::now() + self.debounce_interval);
                        }
                        Some(Ok(_)) => {}
                    }
                }

                _ = wait_for(deadline), if deadline.is_some() => {
                    deadline = None;
                    let reload_cancel = CancellationToken::new();
                    if let Err(err) = self.coordinator.reload(&reload_cancel).await {
                        warn!("change source: reload failed: {err}");
                    }
                }
            }
        }

        drop(watcher);
        Ok(())
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

fn is_relevant(event: &Event) -> bool {
    use notify::EventKind;
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
