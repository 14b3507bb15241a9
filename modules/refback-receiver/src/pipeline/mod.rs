pub mod receiver;
pub mod stages;
pub mod traits;
pub mod worker;

pub use receiver::{PageView, RefbackReceiver};
pub use stages::{process_signal, Draft, RefbackOutcome, VerifiedSource};
pub use traits::{
    CommentFilter, CommentStore, FetchError, FetchedDocument, Fetcher, PostResolver,
};
pub use worker::RefbackWorker;
