//=========================================================================
// JSON Resource
//=========================================================================
//
// Fetches and parses JSON documents (level maps, configuration blobs)
// on a worker thread.
//
//=========================================================================

//=== Standard Library Imports ============================================

use std::sync::Arc;
use std::thread;

//=== External Dependencies ===============================================

use log::{debug, warn};
use serde_json::Value;

//=== Internal Dependencies ===============================================

use super::{
    Fetcher, LoadSignal, LoaderContext, Payload, Resource, ResourceData, ResourceFactory,
    ResourceSignal, SignalSender,
};

//=== JsonResource ========================================================

/// One JSON document load. The parsed value is written into the live
/// payload before the completion signal is sent.
pub struct JsonResource {
    url: String,
    data: ResourceData,
    fetcher: Arc<dyn Fetcher>,
}

impl JsonResource {
    pub fn new(url: impl Into<String>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { url: url.into(), data: ResourceData::new(), fetcher }
    }
}

impl Resource for JsonResource {
    fn url(&self) -> &str {
        &self.url
    }

    fn data(&self) -> ResourceData {
        self.data.clone()
    }

    fn start(&mut self, signals: SignalSender) {
        let url = self.url.clone();
        let data = self.data.clone();
        let fetcher = Arc::clone(&self.fetcher);

        thread::spawn(move || {
            let signal = match parse(fetcher.as_ref(), &url) {
                Ok(value) => {
                    debug!(target: "resource", "parsed json {}", url);
                    *data.write() = Payload::Json(value);
                    LoadSignal::Loaded
                }
                Err(reason) => {
                    warn!(target: "resource", "json {} failed: {}", url, reason);
                    LoadSignal::Failed(reason)
                }
            };
            let _ = signals.send(ResourceSignal { url, signal });
        });
    }

    fn check_status(&mut self) -> Option<LoadSignal> {
        self.data.is_populated().then_some(LoadSignal::Loaded)
    }

    fn on_timeout(&mut self) -> LoadSignal {
        if self.data.is_populated() {
            LoadSignal::Loaded
        } else {
            LoadSignal::TimedOut
        }
    }
}

//--- Parse Helper --------------------------------------------------------

fn parse(fetcher: &dyn Fetcher, url: &str) -> Result<Value, String> {
    let bytes = fetcher.fetch(url).map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

//=== JsonFactory =========================================================

/// Claims JSON documents, including `.map` level files.
pub struct JsonFactory;

impl ResourceFactory for JsonFactory {
    fn extensions(&self) -> &[&str] {
        &["json", "map"]
    }

    fn create(&self, url: &str, context: &LoaderContext) -> Box<dyn Resource> {
        Box::new(JsonResource::new(url, context.fetcher()))
    }
}

//=== Tests ===============================================================
