// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tracing skip-map resolution
//!
//! An external tracing subsystem can be told not to create spans for
//! specific endpoints.  At build time the client resolves, per declared
//! method, an effective traced flag by merging configuration overrides
//! with the model's declarations, and collects the endpoints whose
//! tracing is disabled into a [`SkipTracingMap`].
//!
//! Resolution order per method (first match wins):
//!
//! 1. config `{interface}/{method}/Traced/value`
//! 2. the method's own traced declaration
//! 3. config `{interface}/Traced/value`
//! 4. the interface's traced declaration
//! 5. default: traced
//!
//! Path overrides follow the same precedence independently, at both
//! granularities, under `.../Path/value` keys.  A missing or failing
//! configuration source is never an error; resolution falls back to the
//! declarations alone.


use std::collections::HashMap;

use crate::client::HttpMethod;
use crate::config::Config;
use crate::model::InterfaceModel;
use crate::{debug_fmt, info_fmt, trace_fmt};

/// Annotation segment of traced override keys.
const TRACED: &str = "Traced";
/// Annotation segment of path override keys.
const PATH: &str = "Path";

/// Endpoints an external tracing subsystem should skip, keyed by endpoint
/// path and valued by the HTTP verb served there.
///
/// Built once per client at build time; immutable and read on every
/// request thereafter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkipTracingMap {
    endpoints: HashMap<String, HttpMethod>,
}

impl SkipTracingMap {
    /// Whether tracing should be skipped for the given endpoint and verb.
    pub fn is_skipped(&self, path: &str, method: HttpMethod) -> bool {
        self.endpoints.get(path) == Some(&method)
    }

    /// Iterate over the skipped endpoints.
    pub fn iter(&self) -> impl Iterator<Item = (&str, HttpMethod)> {
        self.endpoints
            .iter()
            .map(|(path, method)| (path.as_str(), *method))
    }

    /// Number of skipped endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether no endpoint is skipped.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Resolve the skip map for an interface.
///
/// Pure: reads the model, the base path and (optionally) the external
/// configuration, and never fails; configuration trouble degrades to
/// declaration-only resolution.
pub fn resolve_skip_tracing(
    model: &InterfaceModel,
    base_path: &str,
    config: Option<&Config>,
) -> SkipTracingMap {
    if config.is_none() {
        info_fmt!(
            "SkipTracing",
            "no configuration available, resolving '{}' from declarations only",
            model.name()
        );
    }

    let class_path = lookup_string(config, &format!("{}/{}/value", model.name(), PATH))
        .unwrap_or_else(|| model.path().to_string());

    let mut map = SkipTracingMap::default();

    for method in model.methods() {
        let Some(verb) = method.verb() else {
            trace_fmt!(
                "SkipTracing",
                "method '{}' declares no HTTP verb, excluded",
                method.name()
            );
            continue;
        };

        if resolve_traced(model, method.name(), method.traced(), config) {
            continue;
        }

        let method_path = lookup_string(
            config,
            &format!("{}/{}/{}/value", model.name(), method.name(), PATH),
        )
        .unwrap_or_else(|| method.path().to_string());

        let endpoint = format!("{base_path}{class_path}{method_path}");
        debug_fmt!(
            "SkipTracing",
            "adding endpoint {}:{} to skip map",
            endpoint,
            verb
        );
        map.endpoints.insert(endpoint, verb);
    }

    map
}

/// Effective traced flag for one method.
fn resolve_traced(
    model: &InterfaceModel,
    method_name: &str,
    method_traced: Option<bool>,
    config: Option<&Config>,
) -> bool {
    if let Some(value) = lookup_bool(
        config,
        &format!("{}/{}/{}/value", model.name(), method_name, TRACED),
    ) {
        return value;
    }
    if let Some(value) = method_traced {
        return value;
    }
    if let Some(value) = lookup_bool(config, &format!("{}/{}/value", model.name(), TRACED)) {
        return value;
    }
    if let Some(value) = model.traced() {
        return value;
    }
    true
}

fn lookup_bool(config: Option<&Config>, key: &str) -> Option<bool> {
    let config = config?;
    match config.get::<bool>(key) {
        Ok(value) => value,
        Err(e) => {
            info_fmt!(
                "SkipTracing",
                "config lookup for '{}' failed, treating as absent: {}",
                key,
                e
            );
            None
        }
    }
}

fn lookup_string(config: Option<&Config>, key: &str) -> Option<String> {
    let config = config?;
    match config.get::<String>(key) {
        Ok(value) => value,
        Err(e) => {
            info_fmt!(
                "SkipTracing",
                "config lookup for '{}' failed, treating as absent: {}",
                key,
                e
            );
            None
        }
    }
}
