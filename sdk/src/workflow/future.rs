//! Workflow future types
//!
//! Each future reads its result slot in the run's shared environment. The
//! replay driver fills slots from history events and re-polls the program,
//! so these futures never register wakers.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;

use super::context::WorkflowContext;
use crate::error::WorkflowError;

/// Futures for operations the program can abandon.
///
/// Cancelling resolves the future with [`WorkflowError::Canceled`]. If the
/// decision already reached the service, a cancel request is sent with the
/// next decision task completion.
pub trait CancellableFuture: Future {
    fn cancel(&self);
}

/// Result of a scheduled activity
#[derive(Debug)]
pub struct ActivityFuture {
    ctx: WorkflowContext,
    activity_id: String,
}

impl ActivityFuture {
    pub(crate) fn new(ctx: WorkflowContext, activity_id: String) -> Self {
        Self { ctx, activity_id }
    }

    pub fn activity_id(&self) -> &str {
        &self.activity_id
    }
}

impl Future for ActivityFuture {
    type Output = Result<Value, WorkflowError>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self
            .ctx
            .with_env(|env| env.take_activity_result(&self.activity_id))
        {
            Some(result) => Poll::Ready(result),
            None => Poll::Pending,
        }
    }
}

impl CancellableFuture for ActivityFuture {
    fn cancel(&self) {
        self.ctx.request_cancel_activity(&self.activity_id);
    }
}

/// Durable timer
#[derive(Debug)]
pub struct TimerFuture {
    ctx: WorkflowContext,
    timer_id: String,
}

impl TimerFuture {
    pub(crate) fn new(ctx: WorkflowContext, timer_id: String) -> Self {
        Self { ctx, timer_id }
    }

    pub fn timer_id(&self) -> &str {
        &self.timer_id
    }
}

impl Future for TimerFuture {
    type Output = Result<(), WorkflowError>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.ctx.with_env(|env| env.take_timer_result(&self.timer_id)) {
            Some(result) => Poll::Ready(result),
            None => Poll::Pending,
        }
    }
}

impl CancellableFuture for TimerFuture {
    fn cancel(&self) {
        self.ctx.cancel_timer(&self.timer_id);
    }
}

/// Receiving end of one named signal
#[derive(Debug, Clone)]
pub struct SignalChannel {
    ctx: WorkflowContext,
    name: String,
}

impl SignalChannel {
    pub(crate) fn new(ctx: WorkflowContext, name: &str) -> Self {
        Self {
            ctx,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the next signal delivered on this channel
    pub fn recv(&self) -> SignalFuture {
        SignalFuture {
            channel: self.clone(),
        }
    }

    /// Next already-delivered signal, if any
    pub fn try_recv(&self) -> Option<Result<Value, WorkflowError>> {
        self.ctx.with_env(|env| env.take_signal(&self.name))
    }
}

#[derive(Debug)]
pub struct SignalFuture {
    channel: SignalChannel,
}

impl Future for SignalFuture {
    type Output = Result<Value, WorkflowError>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let name = &self.channel.name;
        let received = self.channel.ctx.with_env(|env| {
            let received = env.take_signal(name);
            if received.is_none() {
                env.awaited_signals.insert(name.clone());
            }
            received
        });
        match received {
            Some(result) => Poll::Ready(result),
            None => Poll::Pending,
        }
    }
}
