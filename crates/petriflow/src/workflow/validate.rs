//! Structural validation of workflows before compilation

use std::collections::HashSet;

use thiserror::Error;

use super::model::{GatewayKind, Workflow};

/// Structural defects detected before compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// An identifier is empty
    #[error("{section} id cannot be empty")]
    EmptyId { section: &'static str },

    /// An identifier repeats within its section
    #[error("duplicate {section} id: {id}")]
    DuplicateId { section: &'static str, id: String },

    /// An identifier is already taken by another section
    ///
    /// Resource, context, and channel ids share the place namespace and
    /// must be mutually disjoint.
    #[error("{section} id {id} conflicts with a {other} id")]
    IdCollision {
        section: &'static str,
        other: &'static str,
        id: String,
    },

    /// A task references an input channel that does not exist
    #[error("task {task} references missing input channel {channel}")]
    MissingInputChannel { task: String, channel: String },

    /// A task references an output channel that does not exist
    #[error("task {task} references missing output channel {channel}")]
    MissingOutputChannel { task: String, channel: String },

    /// A task requires a resource that does not exist
    #[error("task {task} requires missing resource {resource}")]
    MissingResource { task: String, resource: String },

    /// A task declares a context that does not exist
    #[error("task {task} references missing context {context}")]
    MissingContext { task: String, context: String },

    /// A gateway wait list contains an empty entry
    #[error("gateway {gateway} has an empty input/wait_for entry")]
    EmptyWaitEntry { gateway: String },

    /// A gateway waits for a task that does not exist
    #[error("gateway {gateway} references missing task {task}")]
    MissingTask { gateway: String, task: String },

    /// A gateway id would shadow a task's transition
    #[error("gateway id {gateway} collides with a task id")]
    GatewayTaskClash { gateway: String },

    /// A barrier has nothing to wait for
    #[error("barrier {gateway} has nothing to wait for")]
    EmptyBarrier { gateway: String },
}

/// Check a workflow's structural invariants, failing at the first
/// violation. Validation never mutates the workflow; run it before
/// [`compile`](super::compile).
pub fn validate(workflow: &Workflow) -> Result<(), ValidationError> {
    let mut resource_ids = HashSet::new();
    for resource in &workflow.resources {
        if resource.id.is_empty() {
            return Err(ValidationError::EmptyId {
                section: "resource",
            });
        }
        if !resource_ids.insert(resource.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                section: "resource",
                id: resource.id.clone(),
            });
        }
    }

    let mut channel_ids = HashSet::new();
    for channel in &workflow.channels {
        if channel.id.is_empty() {
            return Err(ValidationError::EmptyId { section: "channel" });
        }
        if !channel_ids.insert(channel.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                section: "channel",
                id: channel.id.clone(),
            });
        }
        if resource_ids.contains(channel.id.as_str()) {
            return Err(ValidationError::IdCollision {
                section: "channel",
                other: "resource",
                id: channel.id.clone(),
            });
        }
    }

    let mut context_ids = HashSet::new();
    for context in &workflow.contexts {
        if context.id.is_empty() {
            return Err(ValidationError::EmptyId { section: "context" });
        }
        if !context_ids.insert(context.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                section: "context",
                id: context.id.clone(),
            });
        }
        if resource_ids.contains(context.id.as_str()) {
            return Err(ValidationError::IdCollision {
                section: "context",
                other: "resource",
                id: context.id.clone(),
            });
        }
        if channel_ids.contains(context.id.as_str()) {
            return Err(ValidationError::IdCollision {
                section: "context",
                other: "channel",
                id: context.id.clone(),
            });
        }
    }

    let mut task_ids = HashSet::new();
    for task in &workflow.tasks {
        if task.id.is_empty() {
            return Err(ValidationError::EmptyId { section: "task" });
        }
        if !task_ids.insert(task.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                section: "task",
                id: task.id.clone(),
            });
        }

        let input_channels = task.input.iter().chain(task.inputs.iter());
        for channel in input_channels {
            if !channel_ids.contains(channel.as_str()) {
                return Err(ValidationError::MissingInputChannel {
                    task: task.id.clone(),
                    channel: channel.clone(),
                });
            }
        }
        let output_channels = task.output.iter().chain(task.outputs.iter());
        for channel in output_channels {
            if !channel_ids.contains(channel.as_str()) {
                return Err(ValidationError::MissingOutputChannel {
                    task: task.id.clone(),
                    channel: channel.clone(),
                });
            }
        }
        for resource in task.requires.keys() {
            if !resource_ids.contains(resource.as_str()) {
                return Err(ValidationError::MissingResource {
                    task: task.id.clone(),
                    resource: resource.clone(),
                });
            }
        }
        if let Some(context) = &task.context {
            if !context_ids.contains(context.as_str()) {
                return Err(ValidationError::MissingContext {
                    task: task.id.clone(),
                    context: context.clone(),
                });
            }
        }
    }

    let mut gateway_ids = HashSet::new();
    for gateway in &workflow.gateways {
        if gateway.id.is_empty() {
            return Err(ValidationError::EmptyId { section: "gateway" });
        }
        if !gateway_ids.insert(gateway.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                section: "gateway",
                id: gateway.id.clone(),
            });
        }
        // Gateways compile to transitions in the same namespace as tasks.
        if task_ids.contains(gateway.id.as_str()) {
            return Err(ValidationError::GatewayTaskClash {
                gateway: gateway.id.clone(),
            });
        }

        for wait in gateway.inputs.iter().chain(gateway.wait_for.iter()) {
            if wait.is_empty() {
                return Err(ValidationError::EmptyWaitEntry {
                    gateway: gateway.id.clone(),
                });
            }
            if !task_ids.contains(wait.as_str()) {
                return Err(ValidationError::MissingTask {
                    gateway: gateway.id.clone(),
                    task: wait.clone(),
                });
            }
        }

        if gateway.kind == GatewayKind::Barrier
            && gateway.inputs.is_empty()
            && gateway.wait_for.is_empty()
        {
            return Err(ValidationError::EmptyBarrier {
                gateway: gateway.id.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Capacity;
    use crate::workflow::{Channel, Context, Gateway, Resource, ResourceKind, Task};

    fn resource(id: &str) -> Resource {
        Resource::new(id, ResourceKind::Semaphore, 1)
    }

    #[test]
    fn test_valid_workflow_passes() {
        let workflow = Workflow::new("ok")
            .with_resource(resource("api_tokens"))
            .with_context(Context::new("ctx"))
            .with_channel(Channel::new("pending", Capacity::Unbounded))
            .with_task(
                Task::new("fetch", "http")
                    .with_input("pending")
                    .with_resource("api_tokens", 1)
                    .with_context("ctx"),
            )
            .with_gateway(Gateway::barrier("sync", ["fetch"]));

        assert!(validate(&workflow).is_ok());
    }

    #[test]
    fn test_empty_and_duplicate_ids() {
        let workflow = Workflow::new("bad").with_resource(resource(""));
        assert_eq!(
            validate(&workflow),
            Err(ValidationError::EmptyId {
                section: "resource"
            })
        );

        let workflow = Workflow::new("bad")
            .with_resource(resource("api"))
            .with_resource(resource("api"));
        assert_eq!(
            validate(&workflow),
            Err(ValidationError::DuplicateId {
                section: "resource",
                id: "api".to_string()
            })
        );
    }

    #[test]
    fn test_cross_section_collisions() {
        let workflow = Workflow::new("bad")
            .with_resource(resource("shared"))
            .with_channel(Channel::new("shared", Capacity::Unbounded));
        assert_eq!(
            validate(&workflow),
            Err(ValidationError::IdCollision {
                section: "channel",
                other: "resource",
                id: "shared".to_string()
            })
        );

        let workflow = Workflow::new("bad")
            .with_channel(Channel::new("shared", Capacity::Unbounded))
            .with_context(Context::new("shared"));
        assert_eq!(
            validate(&workflow),
            Err(ValidationError::IdCollision {
                section: "context",
                other: "channel",
                id: "shared".to_string()
            })
        );
    }

    #[test]
    fn test_dangling_task_references() {
        let workflow =
            Workflow::new("bad").with_task(Task::new("fetch", "http").with_input("nowhere"));
        assert_eq!(
            validate(&workflow),
            Err(ValidationError::MissingInputChannel {
                task: "fetch".to_string(),
                channel: "nowhere".to_string()
            })
        );

        let workflow =
            Workflow::new("bad").with_task(Task::new("fetch", "http").with_resource("gone", 1));
        assert_eq!(
            validate(&workflow),
            Err(ValidationError::MissingResource {
                task: "fetch".to_string(),
                resource: "gone".to_string()
            })
        );

        let workflow =
            Workflow::new("bad").with_task(Task::new("fetch", "http").with_context("gone"));
        assert_eq!(
            validate(&workflow),
            Err(ValidationError::MissingContext {
                task: "fetch".to_string(),
                context: "gone".to_string()
            })
        );
    }

    #[test]
    fn test_gateway_checks() {
        let workflow = Workflow::new("bad").with_gateway(Gateway::barrier("sync", ["ghost"]));
        assert_eq!(
            validate(&workflow),
            Err(ValidationError::MissingTask {
                gateway: "sync".to_string(),
                task: "ghost".to_string()
            })
        );

        let workflow = Workflow::new("bad")
            .with_task(Task::new("sync", "noop"))
            .with_gateway(Gateway::barrier("sync", ["sync"]));
        assert_eq!(
            validate(&workflow),
            Err(ValidationError::GatewayTaskClash {
                gateway: "sync".to_string()
            })
        );

        let workflow =
            Workflow::new("bad").with_gateway(Gateway::barrier("sync", Vec::<String>::new()));
        assert_eq!(
            validate(&workflow),
            Err(ValidationError::EmptyBarrier {
                gateway: "sync".to_string()
            })
        );
    }
}
