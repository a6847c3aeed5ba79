//! Workflow vocabulary: pure data consumed by the validator and compiler
//!
//! These structs are the boundary with the declarative workflow format:
//! the DSL parser produces them, [`validate`](super::validate) checks
//! them, and [`compile`](super::compile) lowers them into a net. All of
//! them can equally be built in code with the `with_*` constructors.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::action::{TaskAction, TaskInput};
use crate::net::{ActionError, Capacity};

/// Kinds of shared resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Semaphore,
    Pool,
    Quota,
}

/// A shared resource with a fixed number of permits.
///
/// Compiles to a bounded place seeded with `capacity` permit tokens;
/// tasks that require the resource consume and immediately return them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub kind: ResourceKind,
    pub capacity: usize,
}

impl Resource {
    pub fn new(id: impl Into<String>, kind: ResourceKind, capacity: usize) -> Self {
        Self {
            id: id.into(),
            kind,
            capacity,
        }
    }
}

/// Shared mutable workflow state, held by at most one task at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub id: String,
    #[serde(default = "default_context_capacity")]
    pub capacity: usize,
}

fn default_context_capacity() -> usize {
    1
}

impl Context {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capacity: default_context_capacity(),
        }
    }
}

/// Delivery order tag for a channel.
///
/// Recorded in the model; the compiler currently materializes every
/// channel as FIFO.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrdering {
    #[default]
    Fifo,
    Lifo,
    Priority,
}

/// A data flow channel between tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub capacity: Capacity,
    #[serde(default)]
    pub ordering: ChannelOrdering,
}

impl Channel {
    pub fn new(id: impl Into<String>, capacity: Capacity) -> Self {
        Self {
            id: id.into(),
            capacity,
            ordering: ChannelOrdering::Fifo,
        }
    }

    pub fn with_ordering(mut self, ordering: ChannelOrdering) -> Self {
        self.ordering = ordering;
        self
    }
}

/// A unit of work.
///
/// Compiles to one transition wired to its channels, required resources,
/// declared context, and a synthesized completion place.
#[derive(Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,

    /// Task kind tag ("http", "llm", "shell", ...); opaque to the engine.
    pub kind: String,

    /// Single input channel.
    #[serde(default)]
    pub input: Option<String>,

    /// Single output channel.
    #[serde(default)]
    pub output: Option<String>,

    /// Additional input channels.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Additional output channels.
    #[serde(default)]
    pub outputs: Vec<String>,

    /// Resource requirements: resource id → permit count.
    #[serde(default)]
    pub requires: BTreeMap<String, usize>,

    /// Declared context id.
    #[serde(default)]
    pub context: Option<String>,

    /// Opaque task configuration, passed through untouched.
    #[serde(default)]
    pub config: Value,

    /// The task body. Absent means pure token routing.
    #[serde(skip)]
    pub action: Option<TaskAction>,
}

impl Task {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            input: None,
            output: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            requires: BTreeMap::new(),
            context: None,
            config: Value::Null,
            action: None,
        }
    }

    /// Set the single input channel.
    pub fn with_input(mut self, channel: impl Into<String>) -> Self {
        self.input = Some(channel.into());
        self
    }

    /// Set the single output channel.
    pub fn with_output(mut self, channel: impl Into<String>) -> Self {
        self.output = Some(channel.into());
        self
    }

    /// Add input channels beyond the single input.
    pub fn with_inputs<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(channels.into_iter().map(Into::into));
        self
    }

    /// Add output channels beyond the single output.
    pub fn with_outputs<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs.extend(channels.into_iter().map(Into::into));
        self
    }

    /// Require `count` permits of a resource for every firing.
    pub fn with_resource(mut self, resource: impl Into<String>, count: usize) -> Self {
        self.requires.insert(resource.into(), count);
        self
    }

    /// Declare the shared context this task reads and writes.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attach opaque configuration.
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Attach the task body.
    ///
    /// # Example
    ///
    /// ```
    /// use petriflow::workflow::Task;
    ///
    /// let task = Task::new("fetch", "http").with_action(|_cancel, input| async move {
    ///     Ok(input.payload)
    /// });
    /// ```
    pub fn with_action<F, Fut>(mut self, action: F) -> Self
    where
        F: Fn(CancellationToken, TaskInput) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Option<Value>, ActionError>> + Send + 'static,
    {
        self.action = Some(std::sync::Arc::new(move |cancel, input| {
            Box::pin(action(cancel, input))
        }));
        self
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("requires", &self.requires)
            .field("context", &self.context)
            .field("config", &self.config)
            .field("action", &self.action.is_some())
            .finish()
    }
}

/// Control-flow gateway kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    /// Wait for every referenced task before proceeding.
    Barrier,
    /// Fan-out; expressed by task output lists, no net structure.
    Split,
    /// Fan-in; expressed by task input lists, no net structure.
    Merge,
}

/// A control-flow gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gateway {
    pub id: String,
    pub kind: GatewayKind,

    /// Task ids this gateway waits for.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Alias for `inputs`, used when `inputs` is empty.
    #[serde(default)]
    pub wait_for: Vec<String>,

    /// Task ids to trigger; recorded, not materialized.
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl Gateway {
    pub fn new(id: impl Into<String>, kind: GatewayKind) -> Self {
        Self {
            id: id.into(),
            kind,
            inputs: Vec::new(),
            wait_for: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// A barrier waiting on the given tasks.
    pub fn barrier<I, S>(id: impl Into<String>, wait_for: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut gateway = Self::new(id, GatewayKind::Barrier);
        gateway.wait_for = wait_for.into_iter().map(Into::into).collect();
        gateway
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(inputs.into_iter().map(Into::into));
        self
    }

    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs.extend(outputs.into_iter().map(Into::into));
        self
    }
}

/// A high-level workflow definition: the immutable input to validation
/// and compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub contexts: Vec<Context>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub gateways: Vec<Gateway>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.contexts.push(context);
        self
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_gateway(mut self, gateway: Gateway) -> Self {
        self.gateways.push(gateway);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_context_capacity_defaults_to_one() {
        let context = Context::new("workflow_ctx");
        assert_eq!(context.capacity, 1);

        let parsed: Context = serde_json::from_value(json!({"id": "ctx"})).unwrap();
        assert_eq!(parsed.capacity, 1);
    }

    #[test]
    fn test_task_builders() {
        let task = Task::new("fetch", "http")
            .with_input("pending")
            .with_output("completed")
            .with_resource("api_tokens", 1)
            .with_context("workflow_ctx")
            .with_config(json!({"url": "https://example.com"}));

        assert_eq!(task.input.as_deref(), Some("pending"));
        assert_eq!(task.output.as_deref(), Some("completed"));
        assert_eq!(task.requires.get("api_tokens"), Some(&1));
        assert_eq!(task.context.as_deref(), Some("workflow_ctx"));
        assert!(task.action.is_none());
    }

    #[test]
    fn test_workflow_serde_skips_actions() {
        let workflow = Workflow::new("demo").with_task(
            Task::new("noop", "shell").with_action(|_cancel, _input| async move { Ok(None) }),
        );

        let value = serde_json::to_value(&workflow).unwrap();
        let parsed: Workflow = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.tasks.len(), 1);
        assert!(parsed.tasks[0].action.is_none());
    }

    #[test]
    fn test_gateway_barrier_constructor() {
        let gateway = Gateway::barrier("sync", ["pa", "pb", "pc"]);
        assert_eq!(gateway.kind, GatewayKind::Barrier);
        assert_eq!(gateway.wait_for, vec!["pa", "pb", "pc"]);
        assert!(gateway.inputs.is_empty());
    }
}
