// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vixen - a declarative, model-driven Rust REST client library
//!
//! Vixen turns a once-declared interface model into a typed HTTP client.
//! Instead of scanning annotations or generating proxies at runtime, you
//! register each remote operation explicitly - verb, path template,
//! parameter bindings - and invoke it by name through a single staged
//! pipeline.
//!
//! # Core Principles
//!
//! - **Declarative**: describe the remote interface once, invoke it many times
//! - **Staged**: every call runs the same composition - async-context
//!   interceptors around the transport call, exception mapping on the response
//! - **Configurable**: layered configuration providers override model
//!   declarations without touching code
//! - **Explicit**: per-invocation context objects instead of thread-local
//!   state, an explicit primary-plus-suppressed error report instead of
//!   exception chaining
//!
//! # Configuration System
//!
//! Vixen's configuration system is built for flexibility and extensibility:
//!
//! - **Multiple Configuration Sources**: Load configuration from files
//!   (JSON, TOML, YAML) and environment variables.
//! - **Layered Configuration**: Create a hierarchy of configuration
//!   providers with well-defined priorities.
//! - **Type Safety**: Parse configuration values into the appropriate Rust types.
//! - **Extensibility**: Implement the `ConfigProvider` trait to create
//!   custom configuration sources.
//!
//! # Exception Mapping
//!
//! Register [`ResponseExceptionMapper`]s to convert HTTP responses into
//! application-level errors; among all mappers claiming a response the one
//! with the numerically lowest priority wins.  A catch-all mapper converts
//! any non-2xx/3xx response into an [`HttpError`] unless disabled.
//!
//! # Async Interceptors
//!
//! Implement [`AsyncInvocationInterceptor`] to carry contextual state
//! across the execution handoff of a call:
//!
//! ```rust
//! use vixen::{AsyncInterceptorFactory, AsyncInvocationInterceptor, ClientError};
//!
//! #[derive(Debug)]
//! struct TenantInterceptor {
//!     tenant: Option<String>,
//! }
//!
//! impl AsyncInvocationInterceptor for TenantInterceptor {
//!     fn prepare_context(&mut self) -> Result<(), ClientError> {
//!         self.tenant = Some("acme-corp".to_string());
//!         Ok(())
//!     }
//!
//!     fn apply_context(&mut self) -> Result<(), ClientError> {
//!         // re-establish the captured tenant on the executing task
//!         Ok(())
//!     }
//!
//!     fn remove_context(&mut self) -> Result<(), ClientError> {
//!         self.tenant = None;
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct TenantFactory;
//!
//! impl AsyncInterceptorFactory for TenantFactory {
//!     fn new_interceptor(&self) -> Box<dyn AsyncInvocationInterceptor> {
//!         Box::new(TenantInterceptor { tenant: None })
//!     }
//! }
//! ```

// Module declarations
pub mod client;
pub mod config;
pub mod interceptor;
pub mod logging;
pub mod mapper;
pub mod model;
pub mod trace;

// Re-export key types at the crate root for convenience
pub use client::{
    BoxError, ClientError, ClientRequest, ClientResponse, HttpMethod, HttpTransport,
    InvocationContext, InvocationError, ReqwestTransport,
};
pub use config::{
    Config, ConfigBuilder, ConfigError, ConfigProvider, ConfigProviderExt, EnvConfigProvider,
    FileConfigProvider,
};
pub use interceptor::{
    AsyncInterceptorFactory, AsyncInterceptorSupport, AsyncInvocationInterceptor, InterceptorSet,
};
pub use mapper::{
    DISABLE_DEFAULT_MAPPER, DefaultExceptionMapper, ExceptionMapperStage, HttpError,
    ResponseExceptionMapper,
};
pub use model::{
    DetachedInvocation, InterfaceModel, InterfaceModelBuilder, InvocationArgs, MethodModel,
    MethodModelBuilder, ParamBinding, RestClient, RestClientBuilder,
};
pub use trace::{SkipTracingMap, resolve_skip_tracing};
