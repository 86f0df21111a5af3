pub mod drift;
pub mod helpers;
pub mod intent;
pub mod reasoning;
pub mod recovery;
pub mod summary;
pub mod task_analysis;

pub use drift::{band_for_score, DriftBand, DriftChecker, DriftResult};
pub use intent::{Intent, IntentExtractor};
pub use reasoning::{ReasoningExtract, ReasoningExtractor};
pub use recovery::{RecoveryChecker, RecoveryVerdict};
pub use summary::SummaryGenerator;
pub use task_analysis::{TaskAction, TaskAnalysis, TaskAnalyzer, TaskType};
