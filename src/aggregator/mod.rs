/// Recurring-error grouping, ranking and sampling
pub mod recurring;

pub use recurring::{
    aggregate, truncate_message, ErrorGroup, GroupKey, RecurringErrorAggregator, RecurringErrors,
};
