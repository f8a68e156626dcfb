//! Host-facing operations
//!
//! The host names an operation by `(resource, operation)` strings. Those are
//! parsed into [`Resource`] / [`Operation`] and looked up in a dispatch table
//! that is checked for completeness when the [`Dispatcher`] is built.

pub mod chat;
pub mod image;
pub mod vision;

use crate::ai::{ClientConfig, ModelScopeClient, ModelScopeService};
use crate::models::{BinaryData, Config};
use crate::poller::PollSettings;
use crate::response::ErrorRecord;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use tokio::time::Instant;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Llm,
    Vision,
    Image,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Llm, Resource::Vision, Resource::Image];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Vision => "vision",
            Self::Image => "image",
        }
    }
}

impl FromStr for Resource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("Unknown resource: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ChatCompletion,
    VisionChat,
    TextToImage,
}

impl Operation {
    pub const ALL: [Operation; 3] = [
        Operation::ChatCompletion,
        Operation::VisionChat,
        Operation::TextToImage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatCompletion => "chatCompletion",
            Self::VisionChat => "visionChat",
            Self::TextToImage => "textToImage",
        }
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|o| o.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("Unknown operation: {}", s)))
    }
}

/// One host item: which operation to run, its parameter bag and attachments.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub resource: Resource,
    pub operation: Operation,
    pub parameters: Value,
    pub binary: HashMap<String, BinaryData>,
}

impl Invocation {
    pub fn new(resource: Resource, operation: Operation, parameters: Value) -> Self {
        Self {
            resource,
            operation,
            parameters,
            binary: HashMap::new(),
        }
    }

    /// Builds an invocation from the host's wire names.
    pub fn parse(resource: &str, operation: &str, parameters: Value) -> Result<Self> {
        Ok(Self::new(resource.parse()?, operation.parse()?, parameters))
    }

    pub fn with_binary(mut self, property: impl Into<String>, data: BinaryData) -> Self {
        self.binary.insert(property.into(), data);
        self
    }

    pub(crate) fn parameters<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.parameters.clone()).map_err(|e| {
            Error::Validation(format!(
                "Invalid parameters for {}/{}: {}",
                self.resource.as_str(),
                self.operation.as_str(),
                e
            ))
        })
    }
}

/// Borrowed view handed to every handler.
pub struct OperationContext<'a> {
    pub service: &'a dyn ModelScopeService,
    pub poll_settings: PollSettings,
}

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;
pub type Handler = for<'a> fn(&'a OperationContext<'a>, &'a Invocation) -> HandlerFuture<'a>;

const OPERATIONS: &[(Resource, Operation, Handler)] = &[
    (Resource::Llm, Operation::ChatCompletion, chat::execute as Handler),
    (Resource::Vision, Operation::VisionChat, vision::execute as Handler),
    (Resource::Image, Operation::TextToImage, image::execute as Handler),
];

fn build_table(
    entries: &[(Resource, Operation, Handler)],
) -> Result<HashMap<(Resource, Operation), Handler>> {
    let mut table = HashMap::new();
    for (resource, operation, handler) in entries {
        if resource.as_str().parse::<Resource>()? != *resource
            || operation.as_str().parse::<Operation>()? != *operation
        {
            return Err(Error::Config(format!(
                "Operation key {}/{} does not round-trip",
                resource.as_str(),
                operation.as_str()
            )));
        }
        if table.insert((*resource, *operation), *handler).is_some() {
            return Err(Error::Config(format!(
                "Duplicate operation {}/{}",
                resource.as_str(),
                operation.as_str()
            )));
        }
    }

    for resource in Resource::ALL {
        if !table.keys().any(|(r, _)| *r == resource) {
            return Err(Error::Config(format!(
                "Resource {} has no operations",
                resource.as_str()
            )));
        }
    }
    for operation in Operation::ALL {
        if !table.keys().any(|(_, o)| *o == operation) {
            return Err(Error::Config(format!(
                "Operation {} is not bound to any resource",
                operation.as_str()
            )));
        }
    }

    Ok(table)
}

/// Routes invocations to their handlers against one shared API client.
pub struct Dispatcher {
    service: Box<dyn ModelScopeService>,
    poll_settings: PollSettings,
    table: HashMap<(Resource, Operation), Handler>,
}

impl Dispatcher {
    pub fn new(service: Box<dyn ModelScopeService>, poll_settings: PollSettings) -> Result<Self> {
        Ok(Self {
            service,
            poll_settings,
            table: build_table(OPERATIONS)?,
        })
    }

    /// Builds the HTTP client from configuration; a blank token fails here.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client_config = ClientConfig::new(config.api_token.clone())?
            .with_base_url(config.base_url.clone())
            .with_request_timeout(config.request_timeout);
        let client = ModelScopeClient::new(client_config)?;
        let poll_settings = PollSettings::default().with_budget_mode(config.poll_budget);
        Self::new(Box::new(client), poll_settings)
    }

    pub fn supports(&self, resource: Resource, operation: Operation) -> bool {
        self.table.contains_key(&(resource, operation))
    }

    pub async fn execute(&self, item: &Invocation) -> Result<Value> {
        let handler = self
            .table
            .get(&(item.resource, item.operation))
            .ok_or_else(|| {
                Error::Validation(format!(
                    "Operation {} is not available for resource {}",
                    item.operation.as_str(),
                    item.resource.as_str()
                ))
            })?;

        let context = OperationContext {
            service: self.service.as_ref(),
            poll_settings: self.poll_settings,
        };

        let started = Instant::now();
        match handler(&context, item).await {
            Ok(value) => {
                info!(
                    "{}/{} finished in {}ms",
                    item.resource.as_str(),
                    item.operation.as_str(),
                    started.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(e) => {
                error!(
                    "{}/{} failed after {}s: {}",
                    item.resource.as_str(),
                    item.operation.as_str(),
                    started.elapsed().as_secs(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Runs items one after another.
    ///
    /// With `continue_on_fail` a failing item yields an [`ErrorRecord`] and the
    /// batch carries on; otherwise the first error is returned.
    pub async fn execute_all(
        &self,
        items: &[Invocation],
        continue_on_fail: bool,
    ) -> Result<Vec<Value>> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let started = Instant::now();
            match self.execute(item).await {
                Ok(value) => results.push(value),
                Err(e) if continue_on_fail => {
                    results.push(serde_json::to_value(ErrorRecord::new(&e, started.elapsed()))?)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }
}

/// Dispatcher over a mock the test keeps a handle to.
#[cfg(test)]
pub(crate) fn shared_mock(
    client: crate::ai::MockModelScopeClient,
    poll_settings: PollSettings,
) -> (std::sync::Arc<crate::ai::MockModelScopeClient>, Dispatcher) {
    let client = std::sync::Arc::new(client);
    let dispatcher = Dispatcher::new(Box::new(std::sync::Arc::clone(&client)), poll_settings)
        .expect("dispatch table is valid");
    (client, dispatcher)
}

/// First `max` characters of `text`, for log lines.
pub(crate) fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max).collect::<String>())
    }
}
