use std::sync::Arc;
use std::thread;

use crate::api::WatchMetrics;
use crate::data::ViewService;

/// Fires one impression per item activation. Failures are logged and
/// dropped: view accounting must never block or surface into navigation.
pub struct ViewRecorder {
    service: Arc<dyn ViewService>,
    last_activation: Option<u64>,
}

impl ViewRecorder {
    pub fn new(service: Arc<dyn ViewService>) -> Self {
        Self {
            service,
            last_activation: None,
        }
    }

    /// `activation` is a monotone token minted by the feed controller for
    /// each activation, so returning to an item records a fresh view while a
    /// re-run of the same activation's effects records nothing.
    pub fn record(&mut self, activation: u64, item_id: &str) {
        if self.last_activation == Some(activation) {
            return;
        }
        self.last_activation = Some(activation);

        let service = self.service.clone();
        let item = item_id.to_string();
        thread::spawn(move || {
            let metrics = WatchMetrics::default();
            if let Err(err) = service.record_view(&item, &metrics) {
                log::warn!("failed to record view for {item}: {err:#}");
            }
        });
    }
}
