//! Transitions and the atomic firing algorithm

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use futures::future::BoxFuture;
use tokio::sync::MutexGuard;
use tokio_util::sync::CancellationToken;

use super::arc::Arc;
use super::error::{ActionError, NetError};
use super::place::{Capacity, Place, TokenStore};
use super::token::Token;

/// Predicate over the consumed token tuple.
///
/// A `false` result is transient non-enablement, not an error: the firing
/// restores the consumed tokens and reports [`NetError::NotReady`].
pub type Guard = Box<dyn Fn(&[Token]) -> bool + Send + Sync>;

/// Async action invoked with the consumed token tuple.
///
/// The action must not touch places directly; its only effect on the net
/// is the returned token sequence. It receives the driver's cancellation
/// token and is expected to either honor it promptly or finish its
/// current effect. Actions run with no place locks held, so independent
/// firings overlap, including several firings of the same transition.
pub type Action = Box<
    dyn Fn(CancellationToken, Vec<Token>) -> BoxFuture<'static, Result<Vec<Token>, ActionError>>
        + Send
        + Sync,
>;

/// An action unit whose firing atomically consumes tokens from input
/// places, optionally runs a user action, and deposits tokens into output
/// places.
///
/// A firing has two locked phases around the (unlocked) action: a
/// consume phase (availability and capacity checks, input removal,
/// guard, output-slot reservation) and a produce phase (reservation
/// release and token distribution). Each phase holds the token stores of
/// every touched place, acquired in id order, so phases of concurrent
/// firings never interleave and cannot deadlock. A failed guard or
/// action restores the
/// pre-fire marking exactly. Places appearing in both arc lists (the
/// resource permit and shared-context shapes) receive back exactly the
/// token identities consumed from them.
pub struct Transition {
    id: String,
    name: String,
    input_arcs: Vec<Arc>,
    output_arcs: Vec<Arc>,
    guard: Option<Guard>,
    action: Option<Action>,
}

impl Transition {
    /// Create a transition with no arcs, guard, or action.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input_arcs: Vec::new(),
            output_arcs: Vec::new(),
            guard: None,
            action: None,
        }
    }

    /// Unique identifier within the owning net.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name, used in error reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Input arcs in declaration order.
    pub fn input_arcs(&self) -> &[Arc] {
        &self.input_arcs
    }

    /// Output arcs in declaration order.
    pub fn output_arcs(&self) -> &[Arc] {
        &self.output_arcs
    }

    /// Add an input arc (place → transition).
    pub fn add_input_arc(&mut self, place: &std::sync::Arc<Place>, weight: usize) {
        self.input_arcs.push(Arc::new(place.clone(), weight));
    }

    /// Add an output arc (transition → place).
    pub fn add_output_arc(&mut self, place: &std::sync::Arc<Place>, weight: usize) {
        self.output_arcs.push(Arc::new(place.clone(), weight));
    }

    /// Install a guard predicate over the consumed tuple.
    pub fn set_guard<F>(&mut self, guard: F)
    where
        F: Fn(&[Token]) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Box::new(guard));
    }

    /// Install an action invoked with clones of the consumed tuple in
    /// input-arc order.
    pub fn set_action<F, Fut>(&mut self, action: F)
    where
        F: Fn(CancellationToken, Vec<Token>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Vec<Token>, ActionError>> + Send + 'static,
    {
        self.action = Some(Box::new(move |cancel, tokens| {
            Box::pin(action(cancel, tokens))
        }));
    }

    /// How many concurrent firings the current marking can support.
    ///
    /// Bounded by input supply (token count over summed weight, per input
    /// place) and by the spare capacity of bounded output places under the
    /// firing's net production. Guards are not consulted; a guard
    /// rejection surfaces as [`NetError::NotReady`] when the firing is
    /// attempted. A transition with no constraining arcs (no inputs, no
    /// bounded net production) reports 1.
    ///
    /// Advisory: counts are sampled place by place, and a concurrent
    /// firing may invalidate the answer before this transition actually
    /// fires; drivers absorb that race as [`NetError::NotReady`].
    pub async fn enabled_multiplicity(&self) -> usize {
        let input_need = summed_weights(&self.input_arcs);
        let output_need = summed_weights(&self.output_arcs);

        let mut places: HashMap<&str, &std::sync::Arc<Place>> = HashMap::new();
        for arc in self.input_arcs.iter().chain(self.output_arcs.iter()) {
            places.insert(arc.place().id(), arc.place());
        }

        let mut multiplicity = usize::MAX;
        for (id, need) in &input_need {
            let count = places[id].token_count().await;
            multiplicity = multiplicity.min(count / *need);
        }
        for (id, produced) in &output_need {
            let consumed = input_need.get(id).copied().unwrap_or(0);
            // Net production ≤ 0 never blocks on capacity.
            if *produced <= consumed {
                continue;
            }
            if let Capacity::Bounded(limit) = places[id].capacity() {
                let store = places[id].lock().await;
                let slack = limit.saturating_sub(store.tokens.len() + store.reserved);
                multiplicity = multiplicity.min(slack / (*produced - consumed));
            }
        }

        if multiplicity == usize::MAX {
            1
        } else {
            multiplicity
        }
    }

    /// Advisory enablement check under the current marking: input supply
    /// and output capacity satisfy the arc weights for at least one
    /// firing.
    pub async fn is_enabled(&self) -> bool {
        self.enabled_multiplicity().await > 0
    }

    /// Atomically fire this transition.
    ///
    /// Insufficient input, missing output capacity, and guard rejection
    /// all surface as [`NetError::NotReady`] with the pre-fire marking
    /// intact; an action failure restores the marking and reports
    /// [`NetError::ActionFailed`] naming this transition.
    pub async fn fire(&self, cancel: CancellationToken) -> Result<(), NetError> {
        if cancel.is_cancelled() {
            return Err(NetError::Cancelled);
        }

        let touched = self.touched_places();
        let index: HashMap<&str, usize> = touched
            .iter()
            .enumerate()
            .map(|(position, place)| (place.id(), position))
            .collect();
        let input_need = summed_weights(&self.input_arcs);
        let output_need = summed_weights(&self.output_arcs);

        // Consume phase, under the full lock set.
        let (tuple, consumed) = {
            let mut stores = lock_all(&touched).await;

            // Input availability per place.
            for (id, need) in &input_need {
                if stores[index[id]].tokens.len() < *need {
                    return Err(NetError::NotReady);
                }
            }

            // Post-fire occupancy for output places, net of tokens
            // consumed from the same place before outputs land, plus
            // slots reserved by other in-flight firings.
            for (id, produced) in &output_need {
                let consumed_weight = input_need.get(id).copied().unwrap_or(0);
                let store = &stores[index[id]];
                let occupancy = store.tokens.len() + store.reserved - consumed_weight + *produced;
                if !touched[index[id]].capacity().can_hold(occupancy) {
                    return Err(NetError::NotReady);
                }
            }

            // Remove inputs from each head in input-arc declaration order.
            let mut tuple: Vec<Token> = Vec::new();
            let mut consumed: HashMap<&str, VecDeque<Token>> = HashMap::new();
            for arc in &self.input_arcs {
                let store = &mut stores[index[arc.place().id()]];
                for _ in 0..arc.weight() {
                    let token = store
                        .tokens
                        .pop_front()
                        .expect("availability checked under lock");
                    tuple.push(token.clone());
                    consumed.entry(arc.place().id()).or_default().push_back(token);
                }
            }

            // Guard failure is transient non-enablement, not an error.
            if let Some(guard) = &self.guard {
                if !guard(&tuple) {
                    restore(&mut stores, &index, consumed);
                    return Err(NetError::NotReady);
                }
            }

            // Reserve output slots so concurrent firings and direct
            // deposits cannot overfill a bounded place while the action
            // runs unlocked.
            for (id, produced) in &output_need {
                stores[index[id]].reserved += *produced;
            }

            (tuple, consumed)
        };

        // The action runs with no locks held and sees clones of the
        // consumed tuple; the originals stay behind for restore and
        // pass-through routing.
        let mut returned: Vec<Token> = Vec::new();
        if let Some(action) = &self.action {
            match action(cancel, tuple).await {
                Ok(tokens) => returned = tokens,
                Err(source) => {
                    let mut stores = lock_all(&touched).await;
                    for (id, produced) in &output_need {
                        stores[index[id]].reserved -= *produced;
                    }
                    restore(&mut stores, &index, consumed);
                    return Err(NetError::ActionFailed {
                        transition: self.name.clone(),
                        source,
                    });
                }
            }
        }

        // Produce phase, under the full lock set again.
        let mut stores = lock_all(&touched).await;
        for (id, produced) in &output_need {
            stores[index[id]].reserved -= *produced;
        }

        // Pass-through places (both consumed-from and produced-to) get the
        // same token identities back.
        let pass_through: HashSet<&str> = output_need
            .keys()
            .copied()
            .filter(|id| input_need.contains_key(id))
            .collect();

        // Identities owed back to a pass-through place must not be placed
        // a second time when the action also echoes them in its return
        // list.
        let mut routed: HashSet<String> = HashSet::new();
        for id in &pass_through {
            if let (Some(tokens), Some(produced)) = (consumed.get(id), output_need.get(id)) {
                for token in tokens.iter().take(*produced) {
                    routed.insert(token.id().to_string());
                }
            }
        }

        // Fill sequence for the remaining (non-pass-through) output arcs.
        let mut consumed = consumed;
        let mut fill: VecDeque<Token> = if self.action.is_some() {
            returned
                .into_iter()
                .filter(|token| !routed.contains(token.id()))
                .collect()
        } else {
            // Without an action, consumed tokens pass through in
            // input-arc order.
            let mut sequence = VecDeque::new();
            for arc in &self.input_arcs {
                if pass_through.contains(arc.place().id()) {
                    continue;
                }
                if let Some(tokens) = consumed.get_mut(arc.place().id()) {
                    for _ in 0..arc.weight() {
                        match tokens.pop_front() {
                            Some(token) => sequence.push_back(token),
                            None => break,
                        }
                    }
                }
            }
            sequence
        };

        // Distribute in output-arc order, synthesizing stable-prefixed
        // fill tokens on deficit; surplus tokens are discarded.
        let mut generated = 0usize;
        for arc in &self.output_arcs {
            let id = arc.place().id();
            for _ in 0..arc.weight() {
                let token = if pass_through.contains(id) {
                    consumed.get_mut(id).and_then(|tokens| tokens.pop_front())
                } else {
                    fill.pop_front()
                };
                let token = match token {
                    Some(token) => token,
                    None => {
                        let token =
                            Token::synthetic(format!("{}-gen-{}", self.id, generated), "generated");
                        generated += 1;
                        token
                    }
                };
                stores[index[id]].tokens.push_back(token);
            }
        }

        // Release place locks in reverse acquisition order.
        while stores.pop().is_some() {}

        Ok(())
    }

    /// Unique touched places in id order; the total order prevents cyclic
    /// wait between concurrent firings.
    fn touched_places(&self) -> Vec<std::sync::Arc<Place>> {
        let mut touched: Vec<std::sync::Arc<Place>> = Vec::new();
        for arc in self.input_arcs.iter().chain(self.output_arcs.iter()) {
            if !touched.iter().any(|place| place.id() == arc.place().id()) {
                touched.push(arc.place().clone());
            }
        }
        touched.sort_by(|a, b| a.id().cmp(b.id()));
        touched
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("input_arcs", &self.input_arcs.len())
            .field("output_arcs", &self.output_arcs.len())
            .field("guard", &self.guard.is_some())
            .field("action", &self.action.is_some())
            .finish()
    }
}

/// Per-place weight sums across duplicate arcs.
fn summed_weights(arcs: &[Arc]) -> HashMap<&str, usize> {
    let mut weights = HashMap::new();
    for arc in arcs {
        *weights.entry(arc.place().id()).or_insert(0) += arc.weight();
    }
    weights
}

/// Acquire the token stores of `places` in slice (id) order.
async fn lock_all<'a>(places: &'a [std::sync::Arc<Place>]) -> Vec<MutexGuard<'a, TokenStore>> {
    let mut stores = Vec::with_capacity(places.len());
    for place in places {
        stores.push(place.lock().await);
    }
    stores
}

/// Push consumed tokens back onto the heads of their source places,
/// preserving their original order and identities.
fn restore<'a>(
    stores: &mut [MutexGuard<'a, TokenStore>],
    index: &HashMap<&str, usize>,
    consumed: HashMap<&str, VecDeque<Token>>,
) {
    for (id, tokens) in consumed {
        let store = &mut stores[index[id]];
        for token in tokens.into_iter().rev() {
            store.tokens.push_front(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc as SharedArc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn place(id: &str, capacity: Capacity) -> SharedArc<Place> {
        SharedArc::new(Place::new(id, id, capacity))
    }

    fn data(id: &str) -> Token {
        Token::data(id, json!(id))
    }

    #[tokio::test]
    async fn test_fire_moves_token_between_places() {
        let a = place("a", Capacity::Unbounded);
        let b = place("b", Capacity::Unbounded);
        a.add_tokens(vec![data("t0")]).await.unwrap();

        let mut transition = Transition::new("t", "t");
        transition.add_input_arc(&a, 1);
        transition.add_output_arc(&b, 1);

        transition.fire(CancellationToken::new()).await.unwrap();
        assert_eq!(a.token_count().await, 0);
        // Without an action the consumed token passes through unchanged.
        assert_eq!(b.token_ids().await, vec!["t0"]);
    }

    #[tokio::test]
    async fn test_duplicate_input_arcs_accumulate_weight() {
        let a = place("a", Capacity::Unbounded);
        let b = place("b", Capacity::Unbounded);
        a.add_tokens(vec![data("t0")]).await.unwrap();

        let mut transition = Transition::new("t", "t");
        transition.add_input_arc(&a, 1);
        transition.add_input_arc(&a, 1);
        transition.add_output_arc(&b, 1);

        // One token cannot satisfy a summed weight of two.
        assert!(!transition.is_enabled().await);
        let err = transition.fire(CancellationToken::new()).await.unwrap_err();
        assert!(err.is_not_ready());

        a.add_tokens(vec![data("t1")]).await.unwrap();
        assert!(transition.is_enabled().await);
        transition.fire(CancellationToken::new()).await.unwrap();
        assert_eq!(a.token_count().await, 0);
    }

    #[tokio::test]
    async fn test_pass_through_place_keeps_token_identities() {
        let api = place("api", Capacity::Bounded(2));
        let jobs = place("jobs", Capacity::Unbounded);
        let done = place("done", Capacity::Unbounded);
        api.add_tokens(vec![
            Token::resource("tA", "api"),
            Token::resource("tB", "api"),
        ])
        .await
        .unwrap();
        jobs.add_tokens(vec![data("j0")]).await.unwrap();

        let mut transition = Transition::new("t", "t");
        transition.add_input_arc(&api, 1);
        transition.add_input_arc(&jobs, 1);
        transition.add_output_arc(&api, 1);
        transition.add_output_arc(&done, 1);
        transition.set_action(|_cancel, _tokens| async move {
            Ok(vec![Token::data("result-0", json!("success"))])
        });

        transition.fire(CancellationToken::new()).await.unwrap();

        // The consumed permit tA returns to api; the action token lands in
        // done.
        let mut ids = api.token_ids().await;
        ids.sort();
        assert_eq!(ids, vec!["tA", "tB"]);
        assert_eq!(done.token_ids().await, vec!["result-0"]);
    }

    #[tokio::test]
    async fn test_echoed_permit_in_action_return_is_not_placed_twice() {
        let api = place("api", Capacity::Bounded(1));
        let out = place("out", Capacity::Unbounded);
        api.add_tokens(vec![Token::resource("tA", "api")])
            .await
            .unwrap();

        let mut transition = Transition::new("t", "t");
        transition.add_input_arc(&api, 1);
        transition.add_output_arc(&api, 1);
        transition.add_output_arc(&out, 1);
        transition.set_action(|_cancel, tokens| async move {
            // Echo the permit back alongside the result, as hand-built
            // actions may do.
            let mut output = tokens;
            output.push(Token::data("result", json!("ok")));
            Ok(output)
        });

        transition.fire(CancellationToken::new()).await.unwrap();
        assert_eq!(api.token_ids().await, vec!["tA"]);
        assert_eq!(out.token_ids().await, vec!["result"]);
    }

    #[tokio::test]
    async fn test_guard_rejection_restores_marking() {
        let a = place("a", Capacity::Unbounded);
        let b = place("b", Capacity::Unbounded);
        a.add_tokens(vec![data("t0"), data("t1")]).await.unwrap();

        let mut transition = Transition::new("t", "t");
        transition.add_input_arc(&a, 2);
        transition.add_output_arc(&b, 1);
        transition.set_guard(|_tokens| false);

        let err = transition.fire(CancellationToken::new()).await.unwrap_err();
        assert!(err.is_not_ready());
        // Same tokens, same head order.
        assert_eq!(a.token_ids().await, vec!["t0", "t1"]);
        assert_eq!(b.token_count().await, 0);
    }

    #[tokio::test]
    async fn test_action_failure_restores_marking_and_names_transition() {
        let a = place("a", Capacity::Unbounded);
        let b = place("b", Capacity::Unbounded);
        a.add_tokens(vec![data("t0")]).await.unwrap();

        let mut transition = Transition::new("t", "flaky step");
        transition.add_input_arc(&a, 1);
        transition.add_output_arc(&b, 1);
        transition.set_action(|_cancel, _tokens| async move {
            Err::<Vec<Token>, _>("backend unavailable".into())
        });

        let err = transition.fire(CancellationToken::new()).await.unwrap_err();
        match err {
            NetError::ActionFailed { transition, .. } => assert_eq!(transition, "flaky step"),
            other => panic!("expected ActionFailed, got {other:?}"),
        }
        assert_eq!(a.token_ids().await, vec!["t0"]);
        assert_eq!(b.token_count().await, 0);
        // The reservation must be rolled back too.
        assert!(b.can_accept(1).await);
    }

    #[tokio::test]
    async fn test_deficit_fills_with_generated_tokens() {
        let a = place("a", Capacity::Unbounded);
        let b = place("b", Capacity::Unbounded);
        let c = place("c", Capacity::Unbounded);
        a.add_tokens(vec![data("t0")]).await.unwrap();

        let mut transition = Transition::new("t", "t");
        transition.add_input_arc(&a, 1);
        transition.add_output_arc(&b, 1);
        transition.add_output_arc(&c, 1);

        transition.fire(CancellationToken::new()).await.unwrap();
        assert_eq!(b.token_ids().await, vec!["t0"]);
        assert_eq!(c.token_ids().await, vec!["t-gen-0"]);
    }

    #[tokio::test]
    async fn test_surplus_action_tokens_are_discarded() {
        let a = place("a", Capacity::Unbounded);
        let b = place("b", Capacity::Unbounded);
        a.add_tokens(vec![data("t0")]).await.unwrap();

        let mut transition = Transition::new("t", "t");
        transition.add_input_arc(&a, 1);
        transition.add_output_arc(&b, 1);
        transition.set_action(|_cancel, _tokens| async move {
            Ok(vec![data("r0"), data("r1"), data("r2")])
        });

        transition.fire(CancellationToken::new()).await.unwrap();
        assert_eq!(b.token_ids().await, vec!["r0"]);
    }

    #[tokio::test]
    async fn test_full_bounded_output_is_not_ready() {
        let a = place("a", Capacity::Unbounded);
        let b = place("b", Capacity::Bounded(1));
        a.add_tokens(vec![data("t0")]).await.unwrap();
        b.add_tokens(vec![data("old")]).await.unwrap();

        let mut transition = Transition::new("t", "t");
        transition.add_input_arc(&a, 1);
        transition.add_output_arc(&b, 1);

        assert!(!transition.is_enabled().await);
        let err = transition.fire(CancellationToken::new()).await.unwrap_err();
        assert!(err.is_not_ready());
        assert_eq!(a.token_count().await, 1);
    }

    #[tokio::test]
    async fn test_pass_through_does_not_block_on_own_capacity() {
        // A full bounded place that is both consumed-from and produced-to
        // must not spuriously fail the capacity check.
        let api = place("api", Capacity::Bounded(1));
        let out = place("out", Capacity::Unbounded);
        api.add_tokens(vec![Token::resource("tA", "api")])
            .await
            .unwrap();

        let mut transition = Transition::new("t", "t");
        transition.add_input_arc(&api, 1);
        transition.add_output_arc(&api, 1);
        transition.add_output_arc(&out, 1);

        assert!(transition.is_enabled().await);
        transition.fire(CancellationToken::new()).await.unwrap();
        assert_eq!(api.token_ids().await, vec!["tA"]);
        assert_eq!(out.token_count().await, 1);
    }

    #[tokio::test]
    async fn test_zero_input_transition_is_enabled_until_sink_fills() {
        let sink = place("sink", Capacity::Bounded(1));
        let mut transition = Transition::new("t", "t");
        transition.add_output_arc(&sink, 1);

        assert!(transition.is_enabled().await);
        transition.fire(CancellationToken::new()).await.unwrap();
        assert!(!transition.is_enabled().await);
    }

    #[tokio::test]
    async fn test_enabled_multiplicity_tracks_supply_and_capacity() {
        let api = place("api", Capacity::Bounded(3));
        let pending = place("pending", Capacity::Unbounded);
        let done = place("done", Capacity::Unbounded);
        api.add_tokens(vec![
            Token::resource("p0", "api"),
            Token::resource("p1", "api"),
            Token::resource("p2", "api"),
        ])
        .await
        .unwrap();
        pending
            .add_tokens((0..10).map(|i| data(&format!("req-{i}"))).collect())
            .await
            .unwrap();

        let mut transition = Transition::new("call", "call");
        transition.add_input_arc(&api, 1);
        transition.add_input_arc(&pending, 1);
        transition.add_output_arc(&api, 1);
        transition.add_output_arc(&done, 1);

        // Three permits bound the parallelism despite ten pending jobs.
        assert_eq!(transition.enabled_multiplicity().await, 3);

        let sink = place("sink", Capacity::Bounded(2));
        let mut emit = Transition::new("emit", "emit");
        emit.add_output_arc(&sink, 1);
        assert_eq!(emit.enabled_multiplicity().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_self_firings_share_the_marking() {
        // Two permits, four jobs: two firings can run their actions at the
        // same time without corrupting the marking.
        let api = place("api", Capacity::Bounded(2));
        let jobs = place("jobs", Capacity::Unbounded);
        let out = place("out", Capacity::Unbounded);
        api.add_tokens(vec![
            Token::resource("p0", "api"),
            Token::resource("p1", "api"),
        ])
        .await
        .unwrap();
        jobs.add_tokens((0..2).map(|i| data(&format!("j{i}"))).collect())
            .await
            .unwrap();

        let mut transition = Transition::new("t", "t");
        transition.add_input_arc(&api, 1);
        transition.add_input_arc(&jobs, 1);
        transition.add_output_arc(&api, 1);
        transition.add_output_arc(&out, 1);
        transition.set_action(|_cancel, tokens| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let job = tokens
                .iter()
                .find_map(|token| token.as_data())
                .and_then(|value| value.as_str())
                .unwrap_or("?")
                .to_string();
            Ok(vec![Token::data(format!("done-{job}"), json!(job))])
        });

        let transition = SharedArc::new(transition);
        let (first, second) = tokio::join!(
            transition.fire(CancellationToken::new()),
            transition.fire(CancellationToken::new())
        );
        first.unwrap();
        second.unwrap();

        let mut permits = api.token_ids().await;
        permits.sort();
        assert_eq!(permits, vec!["p0", "p1"]);
        assert_eq!(out.token_count().await, 2);
        assert_eq!(jobs.token_count().await, 0);
    }

    #[tokio::test]
    async fn test_in_flight_firing_reserves_output_capacity() {
        let a = place("a", Capacity::Unbounded);
        let sink = place("sink", Capacity::Bounded(1));
        a.add_tokens(vec![data("t0")]).await.unwrap();

        let mut transition = Transition::new("t", "t");
        transition.add_input_arc(&a, 1);
        transition.add_output_arc(&sink, 1);
        transition.set_action(|_cancel, _tokens| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(vec![data("r0")])
        });

        let transition = SharedArc::new(transition);
        let firing = {
            let transition = transition.clone();
            tokio::spawn(async move { transition.fire(CancellationToken::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        // While the action runs, the output slot is spoken for.
        assert!(!sink.can_accept(1).await);
        assert!(sink.add_tokens(vec![data("intruder")]).await.is_err());

        firing.await.unwrap().unwrap();
        assert_eq!(sink.token_ids().await, vec!["r0"]);
    }

    #[tokio::test]
    async fn test_cancelled_fire_consumes_nothing() {
        let a = place("a", Capacity::Unbounded);
        let b = place("b", Capacity::Unbounded);
        a.add_tokens(vec![data("t0")]).await.unwrap();

        let mut transition = Transition::new("t", "t");
        transition.add_input_arc(&a, 1);
        transition.add_output_arc(&b, 1);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = transition.fire(cancel).await.unwrap_err();
        assert!(matches!(err, NetError::Cancelled));
        assert_eq!(a.token_count().await, 1);
    }
}
