//! Copy job orchestration
// (c) 2024 Ross Younger

mod job;
pub use job::{CopyJob, CopySummary, OnEmpty, RemoteSpec, TransferOutcome, DEFAULT_BATCH_SIZE};

mod mapping;
pub use mapping::{map_remote_path, normalize_target, plan_directories, MappedFile};

mod main_loop;
pub use main_loop::run;
