// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Response exception mapping
//!
//! After every received response the client runs an [`ExceptionMapperStage`].
//! Each registered [`ResponseExceptionMapper`] may claim the response and
//! turn it into an application-level error; among all produced candidates
//! the one with the numerically **lowest** priority is raised.  If no
//! mapper claims the response it passes through unchanged.
//!
//! A [`DefaultExceptionMapper`] is registered on every client unless
//! disabled (see [`DISABLE_DEFAULT_MAPPER`]); it converts any non-2xx/3xx
//! response into a generic [`HttpError`] at the lowest possible priority,
//! so any more specific mapper overrides it.


use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use thiserror::Error;

use crate::client::{BoxError, ClientError, ClientResponse};
use crate::config::Config;
use crate::debug_fmt;

/// Configuration key disabling the default exception mapper.
///
/// Checked on the client's local properties first, then on the external
/// configuration; the mapper is enabled when neither source has the key.
pub const DISABLE_DEFAULT_MAPPER: &str = "client.disable_default_mapper";

/// A component converting an HTTP response into an application-level error.
pub trait ResponseExceptionMapper: fmt::Debug + Send + Sync {
    /// Whether this mapper claims responses with the given status and headers.
    fn handles(&self, status: u16, headers: &HeaderMap) -> bool;

    /// Convert a claimed response into an error.  Returning `None`
    /// declines the response after all.
    fn to_error(&self, response: &ClientResponse) -> Option<BoxError>;

    /// Candidate priority.  The numerically lowest priority wins.
    fn priority(&self) -> i32;

    /// Mapper name, for log output.
    fn name(&self) -> &str;
}

#[derive(Debug)]
struct MapperEntry {
    mapper: Arc<dyn ResponseExceptionMapper>,
    rank: i32,
}

/// The response-to-error stage of the invocation pipeline.
#[derive(Debug, Default)]
pub struct ExceptionMapperStage {
    mappers: Vec<MapperEntry>,
}

impl ExceptionMapperStage {
    /// Create an empty stage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapper at the given rank.  Ranks only establish a stable
    /// iteration order (descending); selection among candidates is by each
    /// mapper's own priority.
    pub fn register(&mut self, mapper: Arc<dyn ResponseExceptionMapper>, rank: i32) {
        self.mappers.push(MapperEntry { mapper, rank });
        self.mappers.sort_by(|a, b| b.rank.cmp(&a.rank));
    }

    /// Number of registered mappers.
    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    /// Whether any mapper is registered.
    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    /// Evaluate the response against every registered mapper.
    ///
    /// Collects an error candidate from each mapper that claims the
    /// response, then raises the candidate with the lowest priority as
    /// [`ClientError::Mapped`].  Which of two equal-priority candidates
    /// wins is unspecified.  Responses nobody claims pass through.
    pub fn apply(&self, response: ClientResponse) -> Result<ClientResponse, ClientError> {
        let mut selected: Option<(BoxError, i32)> = None;

        for entry in &self.mappers {
            if !entry.mapper.handles(response.status, &response.headers) {
                continue;
            }
            if let Some(error) = entry.mapper.to_error(&response) {
                let priority = entry.mapper.priority();
                debug_fmt!(
                    "ExceptionMapperStage",
                    "mapper '{}' produced a candidate at priority {}",
                    entry.mapper.name(),
                    priority
                );
                let replace = match selected.as_ref() {
                    Some((_, best)) => priority < *best,
                    None => true,
                };
                if replace {
                    selected = Some((error, priority));
                }
            }
        }

        match selected {
            Some((error, _)) => Err(ClientError::Mapped(error)),
            None => Ok(response),
        }
    }
}

/// Generic HTTP error raised for otherwise-unmapped non-success responses.
#[derive(Error, Debug)]
#[error("HTTP error: status {status}")]
pub struct HttpError {
    /// The response status code.
    pub status: u16,
    /// The buffered response body.
    pub body: Bytes,
}

/// Catch-all mapper registered on every client unless disabled.
///
/// Claims any response outside the 2xx/3xx range at `i32::MAX` priority so
/// that every more specific mapper overrides it.
#[derive(Debug, Default)]
pub struct DefaultExceptionMapper;

impl ResponseExceptionMapper for DefaultExceptionMapper {
    fn handles(&self, status: u16, _headers: &HeaderMap) -> bool {
        !(200..400).contains(&status)
    }

    fn to_error(&self, response: &ClientResponse) -> Option<BoxError> {
        Some(Box::new(HttpError {
            status: response.status,
            body: response.body.clone(),
        }))
    }

    fn priority(&self) -> i32 {
        i32::MAX
    }

    fn name(&self) -> &str {
        "default"
    }
}

/// Resolve the default-mapper disable flag: client-local property first,
/// external configuration second, enabled otherwise.  Lookup failures are
/// recovered as "not disabled".
pub(crate) fn default_mapper_disabled(
    properties: &HashMap<String, serde_json::Value>,
    config: Option<&Config>,
) -> bool {
    if let Some(value) = properties.get(DISABLE_DEFAULT_MAPPER) {
        return value.as_bool().unwrap_or(false);
    }

    match config {
        Some(config) => match config.get::<bool>(DISABLE_DEFAULT_MAPPER) {
            Ok(Some(value)) => value,
            Ok(None) => false,
            Err(e) => {
                debug_fmt!(
                    "ExceptionMapperStage",
                    "config lookup for '{}' failed, keeping default mapper: {}",
                    DISABLE_DEFAULT_MAPPER,
                    e
                );
                false
            }
        },
        None => false,
    }
}
