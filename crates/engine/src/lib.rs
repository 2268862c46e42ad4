//! Bookkeeping engine for travel groups and business projects.
//!
//! Records live in a remote document store. The engine mirrors both
//! collections, composes them into a filtered view, aggregates it for the
//! dashboard and funnels every write through a single gateway.

pub use error::{EngineError, StoreError};
pub use export::{ExportRow, export_rows, file_name, write_csv};
pub use form::FormState;
pub use gateway::{
    Collections, DEFAULT_BUSINESS_COLLECTION, DEFAULT_TRAVEL_COLLECTION, EntryGateway, Saved,
    build_payload,
};
pub use mirror::{LiveMirror, Mirror, MirrorEvent};
pub use money::{MoneyCents, format_bps, margin_bps};
pub use records::{BusinessProject, DataItem, EntityKind, GroupStatus, TravelGroup, normalize};
pub use report::{Report, SourceState};
pub use session::{Session, SessionBuilder};
pub use stats::{
    CHART_LIMIT, ChartPoint, StatusBucket, StatusHistogram, Stats, UNKNOWN_LABEL, chart_series,
    compute_stats, status_histogram,
};
pub use sync_status::{SyncStatus, SyncTracker};
pub use view::{MonthFilter, Selection, ViewMode, available_months, compose};

mod error;
mod export;
mod form;
mod gateway;
mod mirror;
mod money;
mod records;
mod report;
mod session;
mod stats;
pub mod store;
mod sync_status;
mod view;

pub type ResultEngine<T> = Result<T, EngineError>;
