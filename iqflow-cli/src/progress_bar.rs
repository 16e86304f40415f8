//! Indicatif bar driven by the pipeline's [`ProgressCallback`]: a bounded bar
//! when the source has a known frame count (file inputs), a spinner
//! otherwise (live SDR capture has no length to count down to).

use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};

use iqflow_core::progress::{ProgressCallback, ProgressSnapshot};

const BAR_TEMPLATE: &str = "{spinner} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({per_sec})";
const SPINNER_TEMPLATE: &str = "{spinner} [{elapsed_precise}] {pos} frames written ({per_sec})";

pub fn callback() -> ProgressCallback {
    let bar: Arc<Mutex<Option<ProgressBar>>> = Arc::new(Mutex::new(None));
    Arc::new(move |snapshot: ProgressSnapshot| {
        let mut slot = bar.lock().unwrap();
        let bar = slot.get_or_insert_with(|| new_bar(snapshot.total_frames));
        bar.set_position(snapshot.current_frames);
        if snapshot.total_frames.is_none() {
            bar.tick();
        }
    })
}

fn new_bar(total_frames: Option<u64>) -> ProgressBar {
    match total_frames {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(ProgressStyle::with_template(BAR_TEMPLATE).unwrap().progress_chars("#>-"));
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(ProgressStyle::with_template(SPINNER_TEMPLATE).unwrap());
            bar
        }
    }
}
