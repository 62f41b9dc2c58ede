// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Async invocation interceptors
//!
//! Interceptors carry caller-side contextual state across the execution
//! handoff of one invocation.  For every logical call the client creates
//! one fresh interceptor per registered factory and drives the triad:
//!
//! 1. `prepare_context` – on the submitting task, in factory order,
//!    before the invocation is handed off;
//! 2. `apply_context`   – on the executing task, in **reverse** factory
//!    order, immediately before the transport call (the most recently
//!    registered context ends up innermost);
//! 3. `remove_context`  – once the call completes or faults, in factory
//!    order, unconditionally for every interceptor.
//!
//! The three phases of one invocation never run concurrently with each
//! other; the set itself is invocation-scoped and never shared between
//! concurrent calls.

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;

use crate::client::{ClientError, InvocationError};
use crate::trace_fmt;

/// A component propagating contextual state across the execution handoff
/// of a single invocation.
pub trait AsyncInvocationInterceptor: fmt::Debug + Send {
    /// Capture caller-side context.  Runs on the submitting task before
    /// the invocation is handed off.
    fn prepare_context(&mut self) -> Result<(), ClientError>;

    /// Re-establish the captured context.  Runs on the executing task
    /// immediately before the transport call.
    fn apply_context(&mut self) -> Result<(), ClientError>;

    /// Tear the context down.  Runs once the call completes or faults.
    fn remove_context(&mut self) -> Result<(), ClientError>;
}

/// Creates one fresh [`AsyncInvocationInterceptor`] per logical invocation.
pub trait AsyncInterceptorFactory: fmt::Debug + Send + Sync {
    /// Create an interceptor for one invocation.
    fn new_interceptor(&self) -> Box<dyn AsyncInvocationInterceptor>;
}

/// Per-client holder of the registered interceptor factories.
#[derive(Debug, Clone, Default)]
pub struct AsyncInterceptorSupport {
    factories: Vec<Arc<dyn AsyncInterceptorFactory>>,
}

impl AsyncInterceptorSupport {
    /// Install the given factories.  An empty list yields a no-op support
    /// whose prepared sets do nothing.
    pub fn register(factories: Vec<Arc<dyn AsyncInterceptorFactory>>) -> Self {
        Self { factories }
    }

    /// Whether any factory is registered.
    pub fn is_noop(&self) -> bool {
        self.factories.is_empty()
    }

    /// Instantiate and prepare one interceptor per factory, in factory
    /// order, on the calling task.
    ///
    /// A prepare failure propagates immediately and aborts the
    /// invocation; interceptors that already prepared are not unwound.
    /// Guaranteed cleanup starts once the set reaches the apply phase.
    pub fn prepare(&self) -> Result<InterceptorSet, ClientError> {
        let mut interceptors: Vec<Box<dyn AsyncInvocationInterceptor>> =
            Vec::with_capacity(self.factories.len());
        for factory in &self.factories {
            interceptors.push(factory.new_interceptor());
        }

        for (index, interceptor) in interceptors.iter_mut().enumerate() {
            trace_fmt!("AsyncInterceptorSupport", "prepare_context #{index}");
            interceptor.prepare_context()?;
        }

        Ok(InterceptorSet { interceptors })
    }
}

/// Invocation-scoped interceptor array.
///
/// Created by [`AsyncInterceptorSupport::prepare`] and consumed exactly
/// once; the set moves through the apply and remove phases with the
/// invocation it belongs to.
#[derive(Debug, Default)]
pub struct InterceptorSet {
    interceptors: Vec<Box<dyn AsyncInvocationInterceptor>>,
}

impl InterceptorSet {
    /// A set with no interceptors.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of interceptors in the set.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Whether the set holds no interceptors.
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Re-establish contexts in reverse factory order.
    ///
    /// An apply failure propagates immediately and aborts the call.
    pub fn apply(&mut self) -> Result<(), ClientError> {
        for (index, interceptor) in self.interceptors.iter_mut().enumerate().rev() {
            trace_fmt!("AsyncInterceptorSupport", "apply_context #{index}");
            interceptor.apply_context()?;
        }
        Ok(())
    }

    /// Tear down after a successful call.
    ///
    /// Every interceptor's `remove_context` runs, in factory order, even
    /// if an earlier one faults.  The first fault becomes the reported
    /// primary error and later faults are recorded as suppressed.
    pub fn remove_on_success(mut self) -> Result<(), InvocationError> {
        let mut report: Option<InvocationError> = None;

        for interceptor in self.interceptors.iter_mut() {
            if let Err(e) = interceptor.remove_context() {
                match report {
                    Some(ref mut report) => report.suppress(e),
                    None => report = Some(InvocationError::new(e)),
                }
            }
        }

        match report {
            None => Ok(()),
            Some(report) => Err(report),
        }
    }

    /// Tear down after a faulted call.
    ///
    /// Every interceptor's `remove_context` runs, in factory order; the
    /// original fault stays primary and every removal fault is recorded
    /// as suppressed.
    pub fn remove_on_fault(mut self, fault: ClientError) -> InvocationError {
        let mut report = InvocationError::new(fault);

        for interceptor in self.interceptors.iter_mut() {
            if let Err(e) = interceptor.remove_context() {
                report.suppress(e);
            }
        }

        report
    }
}
