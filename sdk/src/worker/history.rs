//! Reading a decision task's history as replay batches.
//!
//! A batch is every event up to and including the next decision-task-started
//! event that was followed by a completed decision task. Scheduled, timed-out
//! and failed decision task events never reach the workflow, and neither does
//! a started event whose task later timed out or failed.

use std::collections::VecDeque;

use cadenza_core::{EventType, HistoryEvent, HistoryIterator, WorkflowTask};
use tracing::debug;

use crate::error::{CadenzaError, Result};

pub(crate) struct TaskHistory {
    loaded: VecDeque<HistoryEvent>,
    next_page_token: Vec<u8>,
    iterator: Option<Box<dyn HistoryIterator>>,
    /// Started event id of the task; zero when unknown
    window_end: i64,
    next_event_id: Option<i64>,
    last_event_id: i64,
}

impl TaskHistory {
    pub fn new(task: &WorkflowTask, iterator: Option<Box<dyn HistoryIterator>>) -> Self {
        Self {
            loaded: task.history.iter().cloned().collect(),
            next_page_token: task.next_page_token.clone(),
            iterator,
            window_end: task.started_event_id,
            next_event_id: None,
            last_event_id: 0,
        }
    }

    /// Id of the last event read so far; zero before the first
    pub fn last_event_id(&self) -> i64 {
        self.last_event_id
    }

    fn window_complete(&self) -> bool {
        self.window_end > 0 && self.last_event_id >= self.window_end
    }

    /// Fetch pages until an event is available or the window is exhausted
    async fn fill(&mut self) -> Result<()> {
        while self.loaded.is_empty() && !self.next_page_token.is_empty() && !self.window_complete() {
            let Some(iterator) = self.iterator.as_mut() else {
                return Err(CadenzaError::InvalidTask(
                    "history has more pages but no history iterator was provided".to_string(),
                ));
            };
            let page = iterator.next_page(&self.next_page_token).await?;
            debug!(
                events = page.events.len(),
                more = !page.next_page_token.is_empty(),
                "Fetched history page"
            );
            self.loaded.extend(page.events);
            self.next_page_token = page.next_page_token;
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<HistoryEvent>> {
        self.fill().await?;
        let Some(event) = self.loaded.pop_front() else {
            return Ok(None);
        };
        if let Some(expected) = self.next_event_id {
            if event.event_id != expected {
                return Err(CadenzaError::MissingHistoryEvents {
                    expected,
                    received: event.event_id,
                });
            }
        }
        self.next_event_id = Some(event.event_id + 1);
        self.last_event_id = event.event_id;
        Ok(Some(event))
    }

    async fn peek_event_type(&mut self) -> Result<Option<EventType>> {
        self.fill().await?;
        Ok(self.loaded.front().map(|e| e.event_type()))
    }

    /// Next replay batch, or `None` once history is exhausted
    pub async fn next_batch(&mut self) -> Result<Option<Vec<HistoryEvent>>> {
        let mut batch = Vec::new();
        while let Some(event) = self.next_event().await? {
            match event.event_type() {
                EventType::DecisionTaskScheduled
                | EventType::DecisionTaskTimedOut
                | EventType::DecisionTaskFailed => {}
                EventType::DecisionTaskStarted => {
                    let next = self.peek_event_type().await?;
                    if matches!(
                        next,
                        Some(EventType::DecisionTaskTimedOut) | Some(EventType::DecisionTaskFailed)
                    ) {
                        continue;
                    }
                    batch.push(event);
                    return Ok(Some(batch));
                }
                _ => batch.push(event),
            }
        }
        Ok((!batch.is_empty()).then_some(batch))
    }
}
