//! Net registry and the two driver loops

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::NetError;
use super::place::Place;
use super::token::Token;
use super::transition::Transition;

/// Tuning knobs for the bounded fixpoint driver.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use petriflow::net::RunConfig;
///
/// let config = RunConfig::default()
///     .with_max_iterations(50)
///     .with_iteration_delay(Duration::ZERO);
/// ```
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Iteration bound; exhausting it fails with
    /// [`NetError::IterationLimit`]. Workloads that legitimately fire
    /// more often should use the continuous driver instead.
    pub max_iterations: usize,

    /// Settle delay between iterations. Diagnostic only; not required by
    /// the semantics.
    pub iteration_delay: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            iteration_delay: Duration::from_millis(10),
        }
    }
}

impl RunConfig {
    /// Set the iteration bound.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the settle delay between iterations.
    pub fn with_iteration_delay(mut self, delay: Duration) -> Self {
        self.iteration_delay = delay;
        self
    }
}

/// Registry of places and transitions plus the driver loops.
///
/// All state is reachable from the net handle; concurrent nets are
/// independent. Registry iteration order carries no semantics; the
/// enabled-set snapshot need not be deterministic across runs.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use tokio_util::sync::CancellationToken;
/// # use petriflow::net::{Capacity, PetriNet, Place, Transition};
/// # async fn example() -> Result<(), petriflow::net::NetError> {
/// let net = PetriNet::new("demo");
/// let queue = Arc::new(Place::new("queue", "Queue", Capacity::Bounded(5)));
/// net.add_place(queue.clone());
///
/// let mut consume = Transition::new("consume", "Consume");
/// consume.add_input_arc(&queue, 1);
/// net.add_transition(consume);
///
/// net.run(CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PetriNet {
    name: String,
    places: RwLock<HashMap<String, Arc<Place>>>,
    transitions: RwLock<HashMap<String, Arc<Transition>>>,
}

impl PetriNet {
    /// Create an empty net.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            places: RwLock::new(HashMap::new()),
            transitions: RwLock::new(HashMap::new()),
        }
    }

    /// The net's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a place.
    pub fn add_place(&self, place: Arc<Place>) {
        self.places.write().insert(place.id().to_string(), place);
    }

    /// Register a transition.
    pub fn add_transition(&self, transition: Transition) {
        self.transitions
            .write()
            .insert(transition.id().to_string(), Arc::new(transition));
    }

    /// Look up a place by id.
    pub fn place(&self, id: &str) -> Option<Arc<Place>> {
        self.places.read().get(id).cloned()
    }

    /// Look up a transition by id.
    pub fn transition(&self, id: &str) -> Option<Arc<Transition>> {
        self.transitions.read().get(id).cloned()
    }

    /// Number of registered places.
    pub fn place_count(&self) -> usize {
        self.places.read().len()
    }

    /// Number of registered transitions.
    pub fn transition_count(&self) -> usize {
        self.transitions.read().len()
    }

    /// Deposit tokens directly into a place, for test harnesses and
    /// external producers.
    pub async fn seed_place(&self, place_id: &str, tokens: Vec<Token>) -> Result<(), NetError> {
        let place = self
            .place(place_id)
            .ok_or_else(|| NetError::UnknownPlace(place_id.to_string()))?;
        place.add_tokens(tokens).await
    }

    /// Per-place token counts under the current marking.
    pub async fn snapshot(&self) -> HashMap<String, usize> {
        let places: Vec<Arc<Place>> = self.places.read().values().cloned().collect();
        let mut marking = HashMap::with_capacity(places.len());
        for place in places {
            marking.insert(place.id().to_string(), place.token_count().await);
        }
        marking
    }

    /// Drive the net to quiescence with the default [`RunConfig`].
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), NetError> {
        self.run_with_config(cancel, RunConfig::default()).await
    }

    /// Drive the net to quiescence: repeatedly snapshot the enabled
    /// transitions, fire each at its enablement multiplicity (a
    /// transition whose marking supports k concurrent firings is
    /// launched k times), and await the whole wave before the next
    /// iteration.
    ///
    /// A firing that appeared enabled may lose the race for shared tokens
    /// to another firing in the same iteration; that `NotReady` outcome
    /// is absorbed. The first action failure or cancellation aborts the
    /// run; committed firings stay committed.
    pub async fn run_with_config(
        &self,
        cancel: CancellationToken,
        config: RunConfig,
    ) -> Result<(), NetError> {
        info!(net = %self.name, "starting bounded run");

        for iteration in 0..config.max_iterations {
            if cancel.is_cancelled() {
                return Err(NetError::Cancelled);
            }

            let transitions: Vec<Arc<Transition>> =
                self.transitions.read().values().cloned().collect();

            let mut firings = Vec::new();
            for transition in transitions {
                let multiplicity = transition.enabled_multiplicity().await;
                for _ in 0..multiplicity {
                    let transition = transition.clone();
                    let cancel = cancel.clone();
                    let name = transition.name().to_string();
                    let handle = tokio::spawn(async move { transition.fire(cancel).await });
                    firings.push((name, handle));
                }
            }

            if firings.is_empty() {
                info!(net = %self.name, iterations = iteration, "quiescent");
                return Ok(());
            }

            for (name, handle) in firings {
                match handle.await {
                    Ok(Ok(())) => debug!(transition = %name, "fired"),
                    // Lost the race for shared tokens this round.
                    Ok(Err(NetError::NotReady)) => {}
                    Ok(Err(err)) => return Err(err),
                    Err(join_err) => {
                        return Err(NetError::ActionFailed {
                            transition: name,
                            source: Box::new(join_err),
                        })
                    }
                }
            }

            if !config.iteration_delay.is_zero() {
                tokio::time::sleep(config.iteration_delay).await;
            }
        }

        Err(NetError::IterationLimit(config.max_iterations))
    }

    /// Single-threaded polling driver: find one enabled transition, fire
    /// it, repeat; sleep for `poll_interval` when nothing is enabled.
    ///
    /// Exits only on cancellation. Firing failures are logged and do not
    /// stop the loop.
    pub async fn run_continuous(
        &self,
        cancel: CancellationToken,
        poll_interval: Duration,
    ) -> Result<(), NetError> {
        info!(net = %self.name, "starting continuous run");

        loop {
            if cancel.is_cancelled() {
                info!(net = %self.name, "continuous run stopped");
                return Err(NetError::Cancelled);
            }

            let transitions: Vec<Arc<Transition>> =
                self.transitions.read().values().cloned().collect();

            let mut fired = false;
            for transition in transitions {
                if !transition.is_enabled().await {
                    continue;
                }
                match transition.fire(cancel.clone()).await {
                    Ok(()) => {
                        debug!(transition = %transition.name(), "fired");
                        fired = true;
                        break;
                    }
                    Err(NetError::NotReady) => continue,
                    Err(err) => {
                        warn!(transition = %transition.name(), error = %err, "firing failed");
                        break;
                    }
                }
            }

            if !fired {
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}
