//! # petriflow
//!
//! A workflow execution engine whose semantic foundation is a
//! place/transition Petri net. Workflows are authored in a declarative
//! form (resources, shared contexts, data channels, tasks, control-flow
//! gateways) and compiled into a low-level net whose concurrent firings
//! drive the runtime.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     workflow::Workflow                       │
//! │  (resources, contexts, channels, tasks, gateways)           │
//! └─────────────────────────────────────────────────────────────┘
//!                    │ validate → compile
//!                    ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       net::PetriNet                          │
//! │  (places seeded with permits and context tokens,            │
//! │   one transition per task and barrier)                      │
//! └─────────────────────────────────────────────────────────────┘
//!                    │ run / run_continuous
//!                    ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        scheduler                             │
//! │  (snapshot enabled transitions, fire them concurrently,     │
//! │   repeat to quiescence)                                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The net's structure is the synchronization: bounded places give
//! backpressure, permit tokens give rate limiting, a capacity-1 context
//! place serializes shared state, and barrier transitions join parallel
//! branches, with no semaphores or condition variables in workflow code.
//!
//! ## Example
//!
//! ```
//! use petriflow::prelude::*;
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let workflow = Workflow::new("crawler")
//!     .with_resource(Resource::new("api_tokens", ResourceKind::Semaphore, 3))
//!     .with_channel(Channel::new("pending", Capacity::Unbounded))
//!     .with_channel(Channel::new("completed", Capacity::Unbounded))
//!     .with_task(
//!         Task::new("fetch", "http")
//!             .with_input("pending")
//!             .with_output("completed")
//!             .with_resource("api_tokens", 1)
//!             .with_action(|_cancel, input| async move { Ok(input.payload) }),
//!     );
//!
//! validate(&workflow)?;
//! let net = compile(&workflow)?;
//!
//! net.seed_place("pending", vec![Token::data("req-0", json!({"url": "/0"}))])
//!     .await?;
//! net.run(CancellationToken::new()).await?;
//!
//! assert_eq!(net.snapshot().await["completed"], 1);
//! # Ok(())
//! # }
//! ```

pub mod net;
pub mod workflow;

/// Prelude for common imports
pub mod prelude {
    pub use crate::net::{
        Capacity, ContextHandle, NetError, PetriNet, Place, RunConfig, Token, TokenPayload,
        Transition,
    };
    pub use crate::workflow::{
        compile, validate, Channel, ChannelOrdering, CompileError, Context, Gateway, GatewayKind,
        Resource, ResourceKind, Task, TaskInput, ValidationError, Workflow,
    };
}

// Re-export key types at crate root
pub use net::{
    ActionError, Capacity, ContextHandle, NetError, PetriNet, Place, RunConfig, Token,
    TokenPayload, Transition,
};
pub use workflow::{
    compile, validate, Channel, ChannelOrdering, CompileError, Context, Gateway, GatewayKind,
    Resource, ResourceKind, Task, TaskAction, TaskInput, ValidationError, Workflow,
};
