use std::{
    sync::{mpsc::Receiver, Arc, LazyLock},
    thread::JoinHandle,
    time::Duration,
};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use nu_ansi_term::Color::Red;
use stash_events::StashEvent;

use crate::utils::Colored;

/// Shared MultiProgress instance so log output can pause the bars.
static MULTI: LazyLock<Arc<MultiProgress>> = LazyLock::new(|| Arc::new(MultiProgress::new()));

/// Pause progress display, run the closure, then resume.
pub fn suspend<F: FnOnce()>(f: F) {
    MULTI.suspend(f);
}

/// Owns the thread rendering events from a [`stash_events::ChannelSink`].
///
/// Call [`finish`](ProgressGuard::finish) after dropping every context holding the sender,
/// otherwise the thread keeps waiting for events.
pub struct ProgressGuard {
    handle: Option<JoinHandle<()>>,
}

impl ProgressGuard {
    pub fn finish(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

fn batch_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {wide_bar:.cyan/dim} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━─")
}

fn batch_message(failed: u32) -> String {
    if failed > 0 {
        format!("{}", Colored(Red, format!("({failed} failed)")))
    } else {
        String::new()
    }
}

pub fn spawn_event_handler(receiver: Receiver<StashEvent>) -> ProgressGuard {
    let handle = std::thread::spawn(move || {
        let mut batch: Option<ProgressBar> = None;

        while let Ok(event) = receiver.recv() {
            if let StashEvent::BatchProgress {
                completed,
                total,
                failed,
            } = event
            {
                let pb = batch.get_or_insert_with(|| {
                    let pb = MULTI.add(ProgressBar::new(total as u64));
                    pb.set_style(batch_style());
                    pb.enable_steady_tick(Duration::from_millis(100));
                    pb
                });
                pb.set_position(completed as u64);
                pb.set_message(batch_message(failed));
            }
        }

        if let Some(pb) = batch {
            pb.finish_and_clear();
        }
    });

    ProgressGuard {
        handle: Some(handle),
    }
}
