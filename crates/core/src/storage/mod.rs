pub mod snapshot;
pub mod table;

pub use snapshot::{timestamp_token, RawPayload, SnapshotKey, SnapshotStore, SnapshotWrite};
pub use table::CsvTable;
pub(crate) use table::opt_cell;
