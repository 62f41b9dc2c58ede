// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared helpers for Vixen integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use vixen::{
    AsyncInterceptorFactory, AsyncInvocationInterceptor, ClientError, Config, ConfigError,
    ConfigProvider, HttpMethod, InterfaceModel, MethodModel,
};

/// Initialize logging once for tests that want log output.
#[allow(dead_code)]
pub fn init_test_logging() {
    vixen::logging::init(Some(log::LevelFilter::Debug));
}

/// Map-backed configuration provider for tests.
#[derive(Debug, Default)]
pub struct TestConfigProvider {
    values: HashMap<String, Value>,
}

impl TestConfigProvider {
    #[allow(dead_code)]
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    #[allow(dead_code)]
    pub fn into_config(self) -> Config {
        Config::builder().with_provider(self).build()
    }
}

impl ConfigProvider for TestConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn provider_name(&self) -> &str {
        "test"
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.values.get(key).cloned())
    }
}

pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Interceptor that records its phases, optionally failing on removal.
#[derive(Debug)]
pub struct RecordingInterceptor {
    name: &'static str,
    fail_on_remove: bool,
    events: EventLog,
}

impl AsyncInvocationInterceptor for RecordingInterceptor {
    fn prepare_context(&mut self) -> Result<(), ClientError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("prepare:{}", self.name));
        Ok(())
    }

    fn apply_context(&mut self) -> Result<(), ClientError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("apply:{}", self.name));
        Ok(())
    }

    fn remove_context(&mut self) -> Result<(), ClientError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("remove:{}", self.name));
        if self.fail_on_remove {
            return Err(ClientError::Interceptor(format!(
                "{} fails on remove",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct RecordingFactory {
    name: &'static str,
    fail_on_remove: bool,
    events: EventLog,
}

impl RecordingFactory {
    #[allow(dead_code)]
    pub fn new(name: &'static str, events: &EventLog) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail_on_remove: false,
            events: events.clone(),
        })
    }

    #[allow(dead_code)]
    pub fn failing_on_remove(name: &'static str, events: &EventLog) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail_on_remove: true,
            events: events.clone(),
        })
    }
}

impl AsyncInterceptorFactory for RecordingFactory {
    fn new_interceptor(&self) -> Box<dyn AsyncInvocationInterceptor> {
        Box::new(RecordingInterceptor {
            name: self.name,
            fail_on_remove: self.fail_on_remove,
            events: self.events.clone(),
        })
    }
}

/// The `com.acme.Users` interface used across the integration tests.
#[allow(dead_code)]
pub fn users_model() -> InterfaceModel {
    InterfaceModel::builder("com.acme.Users")
        .path("/users")
        .method(
            MethodModel::builder("getUser")
                .verb(HttpMethod::Get)
                .path("/{id}")
                .path_param("id")
                .query_param("verbose")
                .header_param("x-tenant")
                .produces("application/json")
                .build(),
        )
        .method(
            MethodModel::builder("createUser")
                .verb(HttpMethod::Post)
                .body_param()
                .consumes("application/json")
                .produces("application/json")
                .build(),
        )
        .build()
        .unwrap()
}
