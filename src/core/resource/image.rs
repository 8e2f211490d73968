//=========================================================================
// Image Resource
//=========================================================================
//
// Fetches and decodes raster images (PNG, JPEG, GIF, BMP) into RGBA8 on
// a worker thread.
//
//=========================================================================

//=== Standard Library Imports ============================================

use std::sync::Arc;
use std::thread;

//=== External Dependencies ===============================================

use image::RgbaImage;
use log::{debug, warn};

//=== Internal Dependencies ===============================================

use super::{
    Fetcher, LoadSignal, LoaderContext, Payload, Resource, ResourceData, ResourceFactory,
    ResourceSignal, SignalSender,
};

//=== ImageResource =======================================================

/// One raster image load.
///
/// The pixels are written into the live payload before the completion
/// signal is sent, so a `Loaded` signal always means the image is
/// there. The polling hooks consult the payload, which lets an image
/// that finished while the loader was stalled still resolve as loaded.
pub struct ImageResource {
    url: String,
    data: ResourceData,
    fetcher: Arc<dyn Fetcher>,
}

impl ImageResource {
    pub fn new(url: impl Into<String>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { url: url.into(), data: ResourceData::new(), fetcher }
    }
}

impl Resource for ImageResource {
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
            let signal = match decode(fetcher.as_ref(), &url) {
                Ok(pixels) => {
                    debug!(
                        target: "resource",
                        "decoded image {} ({}x{})",
                        url,
                        pixels.width(),
                        pixels.height()
                    );
                    *data.write() = Payload::Image(pixels);
                    LoadSignal::Loaded
                }
                Err(reason) => {
                    warn!(target: "resource", "image {} failed: {}", url, reason);
                    LoadSignal::Failed(reason)
                }
            };
            // The loader may already have moved on; a dead channel is fine.
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

//--- Decode Helper -------------------------------------------------------

fn decode(fetcher: &dyn Fetcher, url: &str) -> Result<RgbaImage, String> {
    let bytes = fetcher.fetch(url).map_err(|e| e.to_string())?;
    let decoded = image::load_from_memory(&bytes).map_err(|e| e.to_string())?;
    Ok(decoded.to_rgba8())
}

//=== ImageFactory ========================================================

/// Claims the raster formats the engine decodes.
pub struct ImageFactory;

impl ResourceFactory for ImageFactory {
    fn extensions(&self) -> &[&str] {
        &["png", "jpeg", "jpg", "gif", "bmp"]
    }

    fn create(&self, url: &str, context: &LoaderContext) -> Box<dyn Resource> {
        Box::new(ImageResource::new(url, context.fetcher()))
    }
}

//=== Tests ===============================================================
