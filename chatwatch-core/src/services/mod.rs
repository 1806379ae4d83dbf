pub mod ingestion_pipeline;
pub mod scroll_gate;
pub mod watch_list;

pub use ingestion_pipeline::IngestionPipeline;
pub use scroll_gate::{ScrollGate, ScrollTransition};
pub use watch_list::WatchListIndex;
