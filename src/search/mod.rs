pub mod aggregator;
pub mod filters;
pub mod providers;
pub mod query;
pub mod session;
pub mod types;

pub use aggregator::{SearchAggregator, SearchSnapshot, SourceState, SourceStatus};
pub use filters::{LabelStatus, SearchFilters, SortOrder, SupplementQuery};
pub use providers::{DrugSource, FdaClient, LabelClient, SearchError, SupplementSource};
pub use query::normalize;
pub use session::SearchSession;
