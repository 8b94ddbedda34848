mod filter;
mod finding;
mod summary;

pub use filter::{Comparison, FSBP_STANDARD_ID, FindingFilter, StringCondition, retain_standard};
pub use finding::{AggregatorDetail, Finding, Page, StandardSubscription};
pub use summary::{CheckOutcome, PagedTotal, RunSummary};
