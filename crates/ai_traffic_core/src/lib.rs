pub mod aggregate;
pub mod classify;
pub mod domain;
pub mod ports;

pub use aggregate::{PageCount, SourceCount, TrafficSummary, TrendInsights, TrendPoint};
pub use classify::{classify, Classification};
pub use domain::{
    normalize_domain, NewVisit, TimeWindow, User, VisitEvent, VisitType, Website,
};
pub use ports::{StoreError, StoreResult, TrafficStore};
