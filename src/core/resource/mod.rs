//=========================================================================
// Resource Capability
//=========================================================================
//
// A resource performs one asynchronous fetch-and-decode for one URL and
// reports the outcome over a signal channel. The loader owns the status
// of every entry; a resource only ever *reports*.
//
// Flow:
//
// ```text
//   factory.create(url) ──> Resource::start(sender) ──> worker thread
//                                                            │
//        loader applies <── LoadSignal sent <── payload written in place
// ```
//
//=========================================================================

//=== Standard Library Imports ============================================

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

//=== External Dependencies ===============================================

use ::image::RgbaImage;
use crossbeam_channel::{Receiver, Sender};
use serde_json::Value;

//=== Module Declarations =================================================

mod fetch;
mod image;
mod json;

//=== Public API ==========================================================

pub use fetch::{FetchError, Fetcher, FsFetcher, MemoryFetcher};
pub use json::{JsonFactory, JsonResource};
// The submodule shadows the image crate here, hence the `self::` path.
pub use self::image::{ImageFactory, ImageResource};

//=== LoadSignal ==========================================================

/// Terminal outcome reported for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSignal {
    /// The payload is populated and usable.
    Loaded,
    /// The fetch or decode failed.
    Failed(String),
    /// The resource gave up waiting.
    TimedOut,
}

//=== Signal Channel ======================================================

/// One completion report routed back to the loader.
#[derive(Debug, Clone)]
pub struct ResourceSignal {
    /// Resolved URL of the reporting resource.
    pub url: String,
    pub signal: LoadSignal,
}

/// Sending half handed to `Resource::start`. Clone freely; workers hold
/// one each.
pub type SignalSender = Sender<ResourceSignal>;

/// Receiving half, drained by the loader's pump.
pub(crate) type SignalReceiver = Receiver<ResourceSignal>;

//=== Payload =============================================================

/// The decoded content of a resource.
///
/// Stays `Empty` until the owning resource finishes, then is replaced
/// wholesale. Holders of a [`ResourceData`] handle observe the change
/// the next time they look.
#[derive(Debug, Clone)]
pub enum Payload {
    Empty,
    Image(RgbaImage),
    Json(Value),
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_image(&self) -> Option<&RgbaImage> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

//=== ResourceData ========================================================

/// Shared live handle to a resource payload.
///
/// Clones are cheap and all refer to the same cell. The worker thread
/// populates the cell once; everyone else reads.
#[derive(Debug, Clone)]
pub struct ResourceData {
    payload: Arc<RwLock<Payload>>,
}

impl ResourceData {
    pub fn new() -> Self {
        Self { payload: Arc::new(RwLock::new(Payload::Empty)) }
    }

    /// Read access to the payload.
    ///
    /// A poisoned lock is recovered: payloads are replaced wholesale,
    /// never partially written, so the content is always coherent.
    pub fn read(&self) -> RwLockReadGuard<'_, Payload> {
        self.payload.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Write access to the payload, for resource workers.
    pub fn write(&self) -> RwLockWriteGuard<'_, Payload> {
        self.payload.write().unwrap_or_else(|e| e.into_inner())
    }

    /// True once a payload has been written.
    pub fn is_populated(&self) -> bool {
        !self.read().is_empty()
    }
}

impl Default for ResourceData {
    fn default() -> Self {
        Self::new()
    }
}

//=== Resource Trait ======================================================

/// One asynchronous load for one URL.
///
/// `start` kicks the work off and must return without blocking; the
/// outcome arrives later through the signal channel. The polling hooks
/// cover resources whose completion can also (or only) be observed by
/// looking: `check_status` runs on the loader's status sweeps and
/// `on_timeout` gets a last word before the loader records a stall.
pub trait Resource: Send {
    /// The resolved URL this resource loads.
    fn url(&self) -> &str;

    /// The live payload handle.
    fn data(&self) -> ResourceData;

    /// Begins the asynchronous operation. Called at most once, from the
    /// loader's driving thread.
    fn start(&mut self, signals: SignalSender);

    /// Self-reported completion, polled on status sweeps. `None` means
    /// no news.
    fn check_status(&mut self) -> Option<LoadSignal> {
        None
    }

    /// Final verdict when the loader gives up on a stalled batch.
    fn on_timeout(&mut self) -> LoadSignal {
        LoadSignal::TimedOut
    }
}

//=== LoaderContext =======================================================

/// Shared services handed to resource factories.
#[derive(Clone)]
pub struct LoaderContext {
    fetcher: Arc<dyn Fetcher>,
}

impl LoaderContext {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// The byte fetcher shared by every resource of one loader.
    pub fn fetcher(&self) -> Arc<dyn Fetcher> {
        Arc::clone(&self.fetcher)
    }
}

//=== ResourceFactory =====================================================

/// Creates resources for the file extensions it claims.
///
/// Factories are consulted newest first, so registering a factory for
/// an already-claimed extension overrides the earlier registration.
pub trait ResourceFactory: Send {
    /// Extensions this factory handles, lowercase, without the dot.
    fn extensions(&self) -> &[&str];

    /// Builds a resource for a resolved URL.
    fn create(&self, url: &str, context: &LoaderContext) -> Box<dyn Resource>;
}

//=== Tests ===============================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct InertResource {
        url: String,
        data: ResourceData,
    }

    impl Resource for InertResource {
        fn url(&self) -> &str {
            &self.url
        }
        fn data(&self) -> ResourceData {
            self.data.clone()
        }
        fn start(&mut self, _signals: SignalSender) {}
    }

    #[test]
    fn payload_accessors_match_variants() {
        assert!(Payload::Empty.is_empty());
        assert!(Payload::Empty.as_json().is_none());

        let json = Payload::Json(serde_json::json!({ "hp": 3 }));
        assert!(!json.is_empty());
        assert_eq!(json.as_json().unwrap()["hp"], 3);
        assert!(json.as_image().is_none());

        let bytes = Payload::Bytes(vec![1, 2, 3]);
        assert_eq!(bytes.as_bytes().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn data_handles_share_one_cell() {
        let data = ResourceData::new();
        let handle = data.clone();
        assert!(!handle.is_populated());

        *data.write() = Payload::Bytes(vec![7]);
        assert!(handle.is_populated());
        assert_eq!(handle.read().as_bytes().unwrap(), &[7]);
    }

    #[test]
    fn poisoned_payload_is_recovered() {
        let data = ResourceData::new();
        let poisoner = data.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.write();
            panic!("poison");
        })
        .join();

        // The cell stays readable and writable afterwards.
        assert!(!data.is_populated());
        *data.write() = Payload::Bytes(vec![1]);
        assert!(data.is_populated());
    }

    #[test]
    fn resource_hook_defaults_are_quiet() {
        let mut resource = InertResource { url: "a.bin".into(), data: ResourceData::new() };
        assert_eq!(resource.url(), "a.bin");
        assert_eq!(resource.check_status(), None);
        assert_eq!(resource.on_timeout(), LoadSignal::TimedOut);
    }
}
