pub mod checkpoint;
pub mod metrics;
pub mod run_name;
pub mod thread;
pub mod trainer;

pub use metrics::{EpochMetrics, MetricsLogger};
pub use run_name::unique_run_dir;
pub use thread::{TrainerEvent, TrainerHandle, TrainerThread};
pub use trainer::{train, TrainOutcome, TrainingJob};
