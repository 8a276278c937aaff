pub mod apply;
pub mod diff;
pub mod engine;
pub mod manifest;
pub mod paths;
pub mod scan;
pub mod snapshot;

pub use apply::{SyncReport, apply};
pub use diff::{Action, Plan, diff, plan};
pub use engine::{
    SyncError, SyncOptions, close_store, rebuild_manifest, update, update_with_params,
};
pub use manifest::{MANIFEST_NAME, ManifestError, load_manifest, save_manifest};
pub use scan::{scan_local, scan_remote};
pub use snapshot::{ChangeDetection, FileMeta, Snapshot};
