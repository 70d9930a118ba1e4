//! Pure computations over cached collections.
//!
//! Nothing here is persisted except `JobFilters`; everything else is
//! recomputed from the current cache contents on every read.

pub mod attendance;
pub mod facets;
pub mod filters;
pub mod geo;
pub mod lateness;
pub mod schedule;
pub mod skills;
