pub mod dedup;
pub mod events;
pub mod fetcher;
pub mod normalize;
pub mod pipeline;
pub mod synthesize;
pub mod verify;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use events::{LogNotifier, RefbackEvent, RefbackNotifier};
pub use fetcher::HttpFetcher;
pub use pipeline::{PageView, RefbackOutcome, RefbackReceiver, RefbackWorker};
