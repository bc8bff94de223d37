//! Ouro History - append-only, hash-chained log of cycle frames
//!
//! Each outer-loop iteration produces exactly one `Frame`. Frames are
//! chained by SHA-256: `frame[i].parent_hash == frame[i-1].content_hash`,
//! and the content hash is recomputable by any reader from the frame's own
//! fields. The log never removes or edits a frame.

pub mod audit;
pub mod frame;
pub mod log;
pub mod novelty;
pub mod store;

pub use frame::{Frame, SelectedDesire};
pub use log::{CircularPatternReport, FrameLog};
pub use novelty::{NoveltyMetric, UniqueTokenNovelty};
pub use store::{FrameStore, JsonlStore, MemoryStore};
