//! Compilation of workflows into executable Petri nets

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::action::adapt_task_action;
use super::model::{ChannelOrdering, Gateway, GatewayKind, Task, Workflow};
use crate::net::{Capacity, ContextHandle, PetriNet, Place, Token, Transition};

/// References that cannot be resolved while building the net.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A barrier waits for a task with no completion place
    #[error("gateway {gateway} waits for task {task} which has no completion place")]
    MissingDonePlace { gateway: String, task: String },

    /// A task references a place that was never created
    ///
    /// Only reachable when compiling a workflow that skipped
    /// [`validate`](super::validate).
    #[error("task {task} references unknown place {place}")]
    UnknownPlace { task: String, place: String },
}

/// Translate a workflow into a Petri net seeded with resource and context
/// tokens.
///
/// Channel places are never seeded; the caller provides initial tokens
/// via [`PetriNet::seed_place`]. Run [`validate`](super::validate)
/// first: compilation resolves references but does not re-check
/// structural invariants.
pub fn compile(workflow: &Workflow) -> Result<PetriNet, CompileError> {
    let net = PetriNet::new(&workflow.name);

    // Resource places, seeded with capacity permits tagged by resource id.
    for resource in &workflow.resources {
        let permits = (0..resource.capacity)
            .map(|i| Token::resource(format!("{}-token-{}", resource.id, i), &resource.id))
            .collect();
        let place = Place::with_tokens(
            &resource.id,
            &resource.id,
            Capacity::Bounded(resource.capacity),
            permits,
        );
        net.add_place(Arc::new(place));
        debug!(resource = %resource.id, capacity = resource.capacity, "compiled resource place");
    }

    // Context places, each seeded with a single token carrying an empty
    // mapping.
    for context in &workflow.contexts {
        let token = Token::context(format!("{}-token", context.id), ContextHandle::new());
        let place = Place::with_tokens(
            &context.id,
            &context.id,
            Capacity::Bounded(context.capacity),
            vec![token],
        );
        net.add_place(Arc::new(place));
        debug!(context = %context.id, "compiled context place");
    }

    // Channel places, always empty at compile time.
    for channel in &workflow.channels {
        if channel.ordering != ChannelOrdering::Fifo {
            warn!(
                channel = %channel.id,
                ordering = ?channel.ordering,
                "non-fifo channel ordering compiled as fifo"
            );
        }
        let place = Place::new(&channel.id, &channel.id, channel.capacity);
        net.add_place(Arc::new(place));
    }

    for task in &workflow.tasks {
        compile_task(&net, task)?;
    }

    for gateway in &workflow.gateways {
        match gateway.kind {
            GatewayKind::Barrier => compile_barrier(&net, gateway)?,
            // Fan-in and fan-out are already expressed by task input and
            // output lists; no net structure is emitted.
            GatewayKind::Split | GatewayKind::Merge => {
                debug!(gateway = %gateway.id, kind = ?gateway.kind, "gateway needs no net structure");
            }
        }
    }

    Ok(net)
}

/// One transition per task, wired to its context, channels, resources,
/// and a synthesized completion place.
fn compile_task(net: &PetriNet, task: &Task) -> Result<(), CompileError> {
    let mut transition = Transition::new(&task.id, &task.id);

    // Context binding: consumed and re-emitted every firing.
    if let Some(context_id) = &task.context {
        let place = lookup(net, &task.id, context_id)?;
        transition.add_input_arc(&place, 1);
        transition.add_output_arc(&place, 1);
    }

    if let Some(channel) = &task.input {
        let place = lookup(net, &task.id, channel)?;
        transition.add_input_arc(&place, 1);
    }
    for channel in &task.inputs {
        let place = lookup(net, &task.id, channel)?;
        transition.add_input_arc(&place, 1);
    }

    // Resources are consumed and immediately returned.
    for (resource_id, count) in &task.requires {
        let place = lookup(net, &task.id, resource_id)?;
        transition.add_input_arc(&place, *count);
        transition.add_output_arc(&place, *count);
    }

    if let Some(channel) = &task.output {
        let place = lookup(net, &task.id, channel)?;
        transition.add_output_arc(&place, 1);
    }
    for channel in &task.outputs {
        let place = lookup(net, &task.id, channel)?;
        transition.add_output_arc(&place, 1);
    }

    // Completion signal feeding barrier gateways.
    let done = Arc::new(Place::new(
        format!("{}_done", task.id),
        format!("{} done", task.id),
        Capacity::Unbounded,
    ));
    net.add_place(done.clone());
    transition.add_output_arc(&done, 1);

    if let Some(action) = &task.action {
        transition.set_action(adapt_task_action(&task.id, action.clone()));
    }

    debug!(task = %task.id, "compiled task transition");
    net.add_transition(transition);
    Ok(())
}

/// One transition consuming a done token per awaited task, producing into
/// a capacity-1 completion place.
fn compile_barrier(net: &PetriNet, gateway: &Gateway) -> Result<(), CompileError> {
    let waits = if gateway.inputs.is_empty() {
        &gateway.wait_for
    } else {
        &gateway.inputs
    };

    let mut transition = Transition::new(&gateway.id, &gateway.id);
    for task_id in waits {
        let done_id = format!("{task_id}_done");
        let place = net
            .place(&done_id)
            .ok_or_else(|| CompileError::MissingDonePlace {
                gateway: gateway.id.clone(),
                task: task_id.clone(),
            })?;
        transition.add_input_arc(&place, 1);
    }

    let complete = Arc::new(Place::new(
        format!("{}_complete", gateway.id),
        format!("{} complete", gateway.id),
        Capacity::Bounded(1),
    ));
    net.add_place(complete.clone());
    transition.add_output_arc(&complete, 1);

    debug!(gateway = %gateway.id, waits = waits.len(), "compiled barrier");
    net.add_transition(transition);
    Ok(())
}

fn lookup(net: &PetriNet, task: &str, place_id: &str) -> Result<Arc<Place>, CompileError> {
    net.place(place_id).ok_or_else(|| CompileError::UnknownPlace {
        task: task.to_string(),
        place: place_id.to_string(),
    })
}
