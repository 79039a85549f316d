//! Workflow history: events and paging

pub mod event;

pub use event::{
    ActivityTaskScheduledAttributes, ContinuedAsNewAttributes, EventAttributes, EventType,
    HistoryEvent, SignalExternalInitiatedAttributes, StartChildWorkflowInitiatedAttributes,
    WorkflowExecutionStartedAttributes,
};

/// One page of history returned by a [`crate::client::HistoryIterator`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryPage {
    pub events: Vec<HistoryEvent>,
    /// Empty when there are no further pages
    pub next_page_token: Vec<u8>,
}
