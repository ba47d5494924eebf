pub mod comparator;
pub mod engine;
pub mod identity;
pub mod scanner;
pub mod slots;

pub use comparator::{
    Classification, CopyReason, CopyTarget, GameComparator, PlannedCopy, ReconcileSummary,
    ReconciledGame, SyncPlan,
};
pub use engine::{CopyFailurePolicy, SyncConfig, SyncEngine};
pub use identity::{DiscHeader, DiscIdentityReader};
pub use scanner::{GameScanner, ScanConfig, ScanIssue, ScanOutcome};
pub use slots::{parse_slot, slot_folder_name, SlotAllocator};
