// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interface models & the rest client
//!
//! A remote HTTP interface is described once, declaratively, as an
//! [`InterfaceModel`]: an interface-level path plus one [`MethodModel`]
//! per operation (verb, path template, parameter bindings).  The model is
//! validated and frozen when the client is built; every invocation then
//! resolves a method by name, composes the request from the declared
//! bindings, and drives the staged pipeline – interceptor prepare/apply
//! around the transport call, exception mapping on the response, and
//! interceptor removal bound to call completion.
//!
//! ```rust,no_run
//! use vixen::{HttpMethod, InterfaceModel, InvocationArgs, MethodModel, RestClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let model = InterfaceModel::builder("com.acme.Users")
//!     .path("/users")
//!     .method(
//!         MethodModel::builder("getUser")
//!             .verb(HttpMethod::Get)
//!             .path("/{id}")
//!             .path_param("id")
//!             .produces("application/json")
//!             .build(),
//!     )
//!     .build()?;
//!
//! let client = RestClient::builder()
//!     .base_uri("https://api.acme.test")
//!     .build(model)?;
//!
//! let user = client
//!     .invoke("getUser", InvocationArgs::new().path_param("id", "42"))
//!     .await?;
//! # Ok(())
//! # }
//! ```


use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::client::{
    ClientError, ClientRequest, ClientResponse, HttpMethod, HttpTransport, InvocationContext,
    InvocationError, ReqwestTransport,
};
use crate::config::Config;
use crate::interceptor::{AsyncInterceptorFactory, AsyncInterceptorSupport, InterceptorSet};
use crate::mapper::{
    DefaultExceptionMapper, ExceptionMapperStage, ResponseExceptionMapper, default_mapper_disabled,
};
use crate::trace::{SkipTracingMap, resolve_skip_tracing};
use crate::debug_fmt;

/// How one declared parameter binds into the composed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamBinding {
    /// Substitutes a `{name}` segment of the path template.
    Path(String),
    /// Appends a query parameter.
    Query(String),
    /// Sets a request header.
    Header(String),
    /// Becomes the request body.
    Body,
}

/// Per-method metadata: verb, path template and parameter bindings.
///
/// Immutable once built.  Methods declared without a verb are carried in
/// the model but excluded from dispatch and from the tracing skip map.
#[derive(Debug, Clone)]
pub struct MethodModel {
    name: String,
    verb: Option<HttpMethod>,
    path: String,
    params: Vec<ParamBinding>,
    traced: Option<bool>,
    produces: Option<String>,
    consumes: Option<String>,
    template_params: Vec<String>,
}

impl MethodModel {
    /// Start declaring a method with the given name.
    pub fn builder(name: impl Into<String>) -> MethodModelBuilder {
        MethodModelBuilder {
            name: name.into(),
            verb: None,
            path: String::new(),
            params: Vec::new(),
            traced: None,
            produces: None,
            consumes: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn verb(&self) -> Option<HttpMethod> {
        self.verb
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &[ParamBinding] {
        &self.params
    }

    /// Explicit traced declaration, if any.
    pub fn traced(&self) -> Option<bool> {
        self.traced
    }

    pub fn produces(&self) -> Option<&str> {
        self.produces.as_deref()
    }

    pub fn consumes(&self) -> Option<&str> {
        self.consumes.as_deref()
    }

    /// Names of the `{...}` segments in the path template.
    pub fn template_params(&self) -> &[String] {
        &self.template_params
    }
}

/// Builder for [`MethodModel`].
#[derive(Debug)]
pub struct MethodModelBuilder {
    name: String,
    verb: Option<HttpMethod>,
    path: String,
    params: Vec<ParamBinding>,
    traced: Option<bool>,
    produces: Option<String>,
    consumes: Option<String>,
}

impl MethodModelBuilder {
    /// Set the HTTP verb.
    pub fn verb(mut self, verb: HttpMethod) -> Self {
        self.verb = Some(verb);
        self
    }

    /// Set the method-level path template, e.g. `/{id}`.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Declare a path parameter substituting a template segment.
    pub fn path_param(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamBinding::Path(name.into()));
        self
    }

    /// Declare a query parameter.
    pub fn query_param(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamBinding::Query(name.into()));
        self
    }

    /// Declare a header parameter.
    pub fn header_param(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamBinding::Header(name.into()));
        self
    }

    /// Declare that the method accepts a request body.
    pub fn body_param(mut self) -> Self {
        self.params.push(ParamBinding::Body);
        self
    }

    /// Explicitly enable or disable tracing for this method.
    pub fn traced(mut self, traced: bool) -> Self {
        self.traced = Some(traced);
        self
    }

    /// Media type expected in responses; becomes the default `Accept`.
    pub fn produces(mut self, media_type: impl Into<String>) -> Self {
        self.produces = Some(media_type.into());
        self
    }

    /// Media type of the request body; becomes the default `Content-Type`.
    pub fn consumes(mut self, media_type: impl Into<String>) -> Self {
        self.consumes = Some(media_type.into());
        self
    }

    /// Freeze the declaration.  Shape validation happens when the owning
    /// interface is built.
    pub fn build(self) -> MethodModel {
        let template_params = template_params(&self.path);
        MethodModel {
            name: self.name,
            verb: self.verb,
            path: self.path,
            params: self.params,
            traced: self.traced,
            produces: self.produces,
            consumes: self.consumes,
            template_params,
        }
    }
}

/// Extract `{...}` segment names from a path template.
fn template_params(path: &str) -> Vec<String> {
    let re = Regex::new(r"\{([^/{}]+)\}").expect("template segment pattern is valid");
    re.captures_iter(path)
        .map(|captures| captures[1].to_string())
        .collect()
}

/// Immutable model of one remote HTTP interface.
#[derive(Debug, Clone)]
pub struct InterfaceModel {
    name: String,
    path: String,
    traced: Option<bool>,
    methods: Vec<MethodModel>,
}

impl InterfaceModel {
    /// Start declaring an interface with the given canonical name.
    ///
    /// The name identifies the interface in configuration override keys,
    /// e.g. `com.acme.Users/getUser/Traced/value`.
    pub fn builder(name: impl Into<String>) -> InterfaceModelBuilder {
        InterfaceModelBuilder {
            name: name.into(),
            path: String::new(),
            traced: None,
            methods: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Explicit interface-level traced declaration, if any.
    pub fn traced(&self) -> Option<bool> {
        self.traced
    }

    /// All declared methods, in declaration order.
    pub fn methods(&self) -> &[MethodModel] {
        &self.methods
    }

    /// Look up a method by name.
    pub fn method(&self, name: &str) -> Option<&MethodModel> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Builder for [`InterfaceModel`].
#[derive(Debug)]
pub struct InterfaceModelBuilder {
    name: String,
    path: String,
    traced: Option<bool>,
    methods: Vec<MethodModel>,
}

impl InterfaceModelBuilder {
    /// Set the interface-level path prefix, e.g. `/users`.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Explicitly enable or disable tracing for the whole interface.
    pub fn traced(mut self, traced: bool) -> Self {
        self.traced = Some(traced);
        self
    }

    /// Add a declared method.
    pub fn method(mut self, method: MethodModel) -> Self {
        self.methods.push(method);
        self
    }

    /// Validate the interface shape and freeze the model.
    ///
    /// Rejected shapes: duplicate method names, duplicate (verb, path
    /// template) pairs, more than one body binding per method, path
    /// bindings that name no template segment, and template segments with
    /// no path binding.
    pub fn build(self) -> Result<InterfaceModel, ClientError> {
        let mut seen_names: HashSet<&str> = HashSet::new();
        let mut seen_templates: HashSet<(HttpMethod, &str)> = HashSet::new();

        for method in &self.methods {
            if !seen_names.insert(method.name.as_str()) {
                return Err(ClientError::Definition(format!(
                    "interface '{}' declares method '{}' more than once",
                    self.name, method.name
                )));
            }

            if let Some(verb) = method.verb {
                if !seen_templates.insert((verb, method.path.as_str())) {
                    return Err(ClientError::Definition(format!(
                        "interface '{}' declares duplicate path template '{} {}'",
                        self.name, verb, method.path
                    )));
                }
            }

            let body_bindings = method
                .params
                .iter()
                .filter(|b| matches!(b, ParamBinding::Body))
                .count();
            if body_bindings > 1 {
                return Err(ClientError::Definition(format!(
                    "method '{}' declares more than one body parameter",
                    method.name
                )));
            }

            for binding in &method.params {
                if let ParamBinding::Path(name) = binding {
                    if !method.template_params.contains(name) {
                        return Err(ClientError::Definition(format!(
                            "method '{}' binds path parameter '{}' that appears in no template",
                            method.name, name
                        )));
                    }
                }
            }

            for segment in &method.template_params {
                let bound = method
                    .params
                    .iter()
                    .any(|b| matches!(b, ParamBinding::Path(name) if name == segment));
                if !bound {
                    return Err(ClientError::Definition(format!(
                        "method '{}' template segment '{{{}}}' has no path binding",
                        method.name, segment
                    )));
                }
            }
        }

        Ok(InterfaceModel {
            name: self.name,
            path: self.path,
            traced: self.traced,
            methods: self.methods,
        })
    }
}

/// Arguments for one invocation, keyed by the declared binding names.
#[derive(Debug, Clone, Default)]
pub struct InvocationArgs {
    path: HashMap<String, String>,
    query: HashMap<String, String>,
    headers: HashMap<String, String>,
    body: Option<Bytes>,
}

impl InvocationArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply a value for a declared path parameter.
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(name.into(), value.into());
        self
    }

    /// Supply a value for a declared query parameter.
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Supply a value for a declared header parameter.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Supply a raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Supply a JSON request body.
    pub fn json_body<T: Serialize>(self, value: &T) -> Result<Self, ClientError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| ClientError::Other(format!("failed to encode request body: {e}")))?;
        Ok(self.body(bytes))
    }
}

/// Builder for [`RestClient`].
#[derive(Debug, Default)]
pub struct RestClientBuilder {
    base_uri: Option<String>,
    config: Option<Config>,
    properties: HashMap<String, serde_json::Value>,
    mappers: Vec<(Arc<dyn ResponseExceptionMapper>, i32)>,
    interceptor_factories: Vec<Arc<dyn AsyncInterceptorFactory>>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl RestClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URI every composed request is resolved against.
    /// Required; building without one is a definition error.
    pub fn base_uri(mut self, uri: impl Into<String>) -> Self {
        self.base_uri = Some(uri.into());
        self
    }

    /// Attach an external configuration.  Optional: without one the
    /// client resolves everything from declarations and defaults.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a client-local property.  Properties take precedence over the
    /// external configuration for the keys the client itself consumes.
    pub fn property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Register a response exception mapper at the given rank.
    pub fn register_mapper(
        mut self,
        mapper: Arc<dyn ResponseExceptionMapper>,
        rank: i32,
    ) -> Self {
        self.mappers.push((mapper, rank));
        self
    }

    /// Register an async interceptor factory.  Factory registration order
    /// is the prepare/remove order of each invocation's interceptors.
    pub fn register_interceptor_factory(
        mut self,
        factory: Arc<dyn AsyncInterceptorFactory>,
    ) -> Self {
        self.interceptor_factories.push(factory);
        self
    }

    /// Substitute the outbound transport.  Defaults to [`ReqwestTransport`].
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validate the wiring and build the client.
    pub fn build(self, model: InterfaceModel) -> Result<RestClient, ClientError> {
        let base_uri = self
            .base_uri
            .ok_or_else(|| ClientError::Definition("base URI is required".to_string()))?;
        let base_url = reqwest::Url::parse(&base_uri)
            .map_err(|e| ClientError::Definition(format!("invalid base URI [{base_uri}]: {e}")))?;

        let mut mapper_stage = ExceptionMapperStage::new();
        if !default_mapper_disabled(&self.properties, self.config.as_ref()) {
            mapper_stage.register(Arc::new(DefaultExceptionMapper), 0);
        }
        for (mapper, rank) in self.mappers {
            mapper_stage.register(mapper, rank);
        }

        let base_path = match base_url.path() {
            "/" => "",
            path => path,
        };
        let skip_tracing = resolve_skip_tracing(&model, base_path, self.config.as_ref());

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(
                self.config.as_ref().unwrap_or(&Config::default()),
            )?),
        };

        let interceptors = AsyncInterceptorSupport::register(self.interceptor_factories);

        debug_fmt!(
            "RestClient",
            "built client for '{}' against {} ({} methods, {} skipped endpoints)",
            model.name(),
            base_uri,
            model.methods().len(),
            skip_tracing.len()
        );

        Ok(RestClient {
            inner: Arc::new(ClientInner {
                model,
                base: base_uri.trim_end_matches('/').to_string(),
                transport,
                mapper_stage,
                interceptors,
                skip_tracing,
            }),
        })
    }
}

#[derive(Debug)]
struct ClientInner {
    model: InterfaceModel,
    base: String,
    transport: Arc<dyn HttpTransport>,
    mapper_stage: ExceptionMapperStage,
    interceptors: AsyncInterceptorSupport,
    skip_tracing: SkipTracingMap,
}

/// A built rest client: one immutable interface model plus the staged
/// invocation pipeline.  Cheap to clone; clones share the model.
#[derive(Debug, Clone)]
pub struct RestClient {
    inner: Arc<ClientInner>,
}

impl RestClient {
    /// Start building a client.
    pub fn builder() -> RestClientBuilder {
        RestClientBuilder::new()
    }

    /// The interface model this client dispatches against.
    pub fn model(&self) -> &InterfaceModel {
        &self.inner.model
    }

    /// Endpoints an external tracing subsystem should not create spans
    /// for, resolved at build time.
    pub fn skip_tracing(&self) -> &SkipTracingMap {
        &self.inner.skip_tracing
    }

    /// Invoke a declared method and await its response.
    pub async fn invoke(
        &self,
        method: &str,
        args: InvocationArgs,
    ) -> Result<ClientResponse, InvocationError> {
        let request = self.compose_request(method, &args)?;
        let set = self.inner.interceptors.prepare()?;
        Self::execute(Arc::clone(&self.inner), request, set).await
    }

    /// Invoke a declared method and decode the response body as JSON.
    pub async fn invoke_json<T: DeserializeOwned>(
        &self,
        method: &str,
        args: InvocationArgs,
    ) -> Result<T, InvocationError> {
        let response = self.invoke(method, args).await?;
        response.json().map_err(InvocationError::from)
    }

    /// Hand the invocation to the runtime and return a handle.
    ///
    /// Context preparation still happens on the calling task, before the
    /// handoff.  The spawned invocation runs to completion even if the
    /// handle is dropped, so interceptor cleanup is bound to call
    /// completion rather than to caller attention.
    pub fn invoke_detached(
        &self,
        method: &str,
        args: InvocationArgs,
    ) -> Result<DetachedInvocation, ClientError> {
        let request = self.compose_request(method, &args)?;
        let set = self.inner.interceptors.prepare()?;
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { Self::execute(inner, request, set).await });
        Ok(DetachedInvocation { handle })
    }

    /// Drive the executor-side phases: apply, transport call, exception
    /// mapping, removal.
    async fn execute(
        inner: Arc<ClientInner>,
        request: ClientRequest,
        mut set: InterceptorSet,
    ) -> Result<ClientResponse, InvocationError> {
        if let Err(e) = set.apply() {
            // Cleanup is guaranteed only from apply-success onward.
            return Err(InvocationError::new(e));
        }

        let invocation_id = request.context.invocation_id;
        let method = request.method;
        let url = request.url.clone();
        let started = Instant::now();

        let result = match inner.transport.send(request).await {
            Ok(response) => inner.mapper_stage.apply(response),
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => {
                set.remove_on_success()?;
                log::debug!(
                    "[timing] [{}] {} {} -> {} total={:?}",
                    invocation_id,
                    method,
                    url,
                    response.status,
                    started.elapsed()
                );
                Ok(response)
            }
            Err(fault) => Err(set.remove_on_fault(fault)),
        }
    }

    /// Resolve the method model and compose the outbound request from the
    /// declared bindings and the supplied arguments.
    fn compose_request(
        &self,
        method_name: &str,
        args: &InvocationArgs,
    ) -> Result<ClientRequest, ClientError> {
        let model = &self.inner.model;
        let method = model.method(method_name).ok_or_else(|| {
            ClientError::Definition(format!(
                "interface '{}' declares no method '{}'",
                model.name(),
                method_name
            ))
        })?;
        let verb = method.verb().ok_or_else(|| {
            ClientError::Definition(format!("method '{method_name}' declares no HTTP verb"))
        })?;

        // Substitute the path template.
        let mut path = format!("{}{}", model.path(), method.path());
        for segment in method.template_params() {
            let value = args.path.get(segment).ok_or_else(|| {
                ClientError::Definition(format!(
                    "missing path parameter '{segment}' for method '{method_name}'"
                ))
            })?;
            path = path.replace(&format!("{{{segment}}}"), value);
        }
        for name in args.path.keys() {
            if !method.template_params().contains(name) {
                return Err(ClientError::Definition(format!(
                    "method '{method_name}' declares no path parameter '{name}'"
                )));
            }
        }

        // Bind query, header and body arguments against the declaration.
        let mut query = Vec::new();
        let mut headers = HeaderMap::new();
        let mut body = None;

        for binding in method.params() {
            match binding {
                ParamBinding::Path(_) => {}
                ParamBinding::Query(name) => {
                    if let Some(value) = args.query.get(name) {
                        query.push((name.clone(), value.clone()));
                    }
                }
                ParamBinding::Header(name) => {
                    if let Some(value) = args.headers.get(name) {
                        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                            ClientError::Definition(format!("invalid header name '{name}': {e}"))
                        })?;
                        let header_value = HeaderValue::from_str(value).map_err(|e| {
                            ClientError::Definition(format!("invalid value for header '{name}': {e}"))
                        })?;
                        headers.insert(header_name, header_value);
                    }
                }
                ParamBinding::Body => {
                    body = args.body.clone();
                }
            }
        }

        for name in args.query.keys() {
            let declared = method
                .params()
                .iter()
                .any(|b| matches!(b, ParamBinding::Query(n) if n == name));
            if !declared {
                return Err(ClientError::Definition(format!(
                    "method '{method_name}' declares no query parameter '{name}'"
                )));
            }
        }
        for name in args.headers.keys() {
            let declared = method
                .params()
                .iter()
                .any(|b| matches!(b, ParamBinding::Header(n) if n == name));
            if !declared {
                return Err(ClientError::Definition(format!(
                    "method '{method_name}' declares no header parameter '{name}'"
                )));
            }
        }
        if args.body.is_some() && body.is_none() {
            return Err(ClientError::Definition(format!(
                "method '{method_name}' declares no body parameter"
            )));
        }

        // Content negotiation defaults from the declaration.
        if let Some(produces) = method.produces() {
            if !headers.contains_key(ACCEPT) {
                headers.insert(
                    ACCEPT,
                    HeaderValue::from_str(produces).map_err(|e| {
                        ClientError::Definition(format!("invalid media type '{produces}': {e}"))
                    })?,
                );
            }
        }
        if body.is_some() {
            if let Some(consumes) = method.consumes() {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(
                        CONTENT_TYPE,
                        HeaderValue::from_str(consumes).map_err(|e| {
                            ClientError::Definition(format!("invalid media type '{consumes}': {e}"))
                        })?,
                    );
                }
            }
        }

        Ok(ClientRequest {
            method: verb,
            url: format!("{}{}", self.inner.base, path),
            headers,
            query,
            body,
            context: InvocationContext::new(),
        })
    }
}

/// Handle to an invocation running on the runtime.
#[derive(Debug)]
pub struct DetachedInvocation {
    handle: tokio::task::JoinHandle<Result<ClientResponse, InvocationError>>,
}

impl DetachedInvocation {
    /// Wait for the invocation to finish.
    pub async fn join(self) -> Result<ClientResponse, InvocationError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(InvocationError::new(ClientError::Other(format!(
                "invocation task failed: {e}"
            )))),
        }
    }

    /// Whether the invocation has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
