use std::collections::BTreeMap;
use std::ops::Range;

use chrono::Duration;
use cohort_config::RunConfig;
use cohort_core::{CollaborationEvent, Resource, ResourceId, ResourcePair, Timestamp, WorkEvent};
use tracing::debug;

use crate::tie::duration_minutes;
use crate::{GraphError, GraphState, TieStrengthModel};

/// The ordered sequence of snapshots one run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalGraph {
    snapshots: Vec<GraphState>,
}

impl TemporalGraph {
    pub fn new(snapshots: Vec<GraphState>) -> Self {
        Self { snapshots }
    }

    pub fn snapshots(&self) -> &[GraphState] {
        &self.snapshots
    }

    pub fn snapshots_mut(&mut self) -> &mut [GraphState] {
        &mut self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consecutive snapshot pairs, oldest first.
    pub fn transitions(&self) -> impl Iterator<Item = (&GraphState, &GraphState)> {
        self.snapshots.windows(2).map(|pair| (&pair[0], &pair[1]))
    }

    pub fn max_edge_weight(&self) -> f64 {
        self.snapshots
            .iter()
            .map(GraphState::max_edge_weight)
            .fold(0.0, f64::max)
    }
}

/// First instant each resource appears in the activity logs: the earlier of
/// its first work event and its first collaboration event. Every resource
/// in the roster must have one; a resource with no activity at all cannot
/// ever enter the network and the run is aborted.
pub fn first_appearances(
    resources: &[Resource],
    collaboration_events: &[CollaborationEvent],
    work_events: &[WorkEvent],
) -> Result<BTreeMap<ResourceId, Timestamp>, GraphError> {
    let mut first = BTreeMap::<ResourceId, Timestamp>::new();
    let mut note = |resource: ResourceId, timestamp: Timestamp| {
        first
            .entry(resource)
            .and_modify(|existing| {
                if timestamp < *existing {
                    *existing = timestamp;
                }
            })
            .or_insert(timestamp);
    };

    for event in work_events {
        note(event.resource, event.timestamp);
    }
    for event in collaboration_events {
        note(event.pair.first(), event.timestamp);
        note(event.pair.second(), event.timestamp);
    }

    for resource in resources {
        if !first.contains_key(&resource.id) {
            return Err(GraphError::MissingAppearance {
                resource: resource.id,
            });
        }
    }

    Ok(first)
}

/// Event-stepped snapshot production. Rather than sampling on a fixed grid,
/// the scheduler jumps to the next instant at which the network actually
/// changes: a collaboration event, a resource pop-up, or a forecast edge
/// expiry. The ledger remembers, per edge, the last interaction and the
/// weight at that instant, because decay always runs from the last event
/// rather than from the previous snapshot.
pub struct SnapshotScheduler {
    model: TieStrengthModel,
    events: Vec<CollaborationEvent>,
    arrivals: BTreeMap<ResourceId, Timestamp>,
    last_event_on_edge: BTreeMap<ResourcePair, (Timestamp, f64)>,
    removal_forecast: BTreeMap<ResourcePair, Timestamp>,
    slice: Duration,
    emit_slice_snapshots: bool,
}

impl SnapshotScheduler {
    pub fn from_config(
        config: &RunConfig,
        resources: &[Resource],
        mut collaboration_events: Vec<CollaborationEvent>,
        work_events: &[WorkEvent],
    ) -> Result<Self, GraphError> {
        let model = TieStrengthModel::from_config(&config.tie)?;
        collaboration_events.sort_by_key(|event| (event.timestamp, event.pair));
        let arrivals = first_appearances(resources, &collaboration_events, work_events)?;

        Ok(Self {
            model,
            events: collaboration_events,
            arrivals,
            last_event_on_edge: BTreeMap::new(),
            removal_forecast: BTreeMap::new(),
            slice: duration_minutes(config.time_slice_minutes),
            emit_slice_snapshots: config.emit_slice_snapshots,
        })
    }

    pub fn model(&self) -> &TieStrengthModel {
        &self.model
    }

    /// Simulate from `begin` to `end` and return every materialized
    /// snapshot. Without the slice-snapshot option, stretches with no event
    /// advance the clock without recording state.
    pub fn run(&mut self, begin: Timestamp, end: Timestamp) -> Result<TemporalGraph, GraphError> {
        let mut snapshots = Vec::new();
        let mut graph = GraphState::new(begin);
        let mut current = begin;

        while current < end {
            let bound = (current + self.slice).min(end);
            match self.next_change_time(current, bound) {
                Some(next) => {
                    let snapshot = self.advance(&graph, next)?;
                    debug!(
                        timestamp = %next,
                        nodes = snapshot.node_count(),
                        edges = snapshot.edge_count(),
                        "materialized snapshot"
                    );
                    graph = snapshot.clone();
                    snapshots.push(snapshot);
                    current = next;
                }
                None if self.emit_slice_snapshots => {
                    let snapshot = self.advance(&graph, bound)?;
                    graph = snapshot.clone();
                    snapshots.push(snapshot);
                    current = bound;
                }
                None => {
                    current = bound;
                }
            }
        }

        Ok(TemporalGraph::new(snapshots))
    }

    /// Earliest instant in `(after, until]` at which the network changes:
    /// the next collaboration event, resource pop-up, or forecast edge
    /// removal. Coincident events are all handled in the same snapshot.
    fn next_change_time(&self, after: Timestamp, until: Timestamp) -> Option<Timestamp> {
        let candidates = [
            self.next_interaction(after, until),
            self.next_arrival(after, until),
            self.next_forecast_removal(after, until),
        ];
        candidates.into_iter().flatten().min()
    }

    fn next_interaction(&self, after: Timestamp, until: Timestamp) -> Option<Timestamp> {
        let index = self.events.partition_point(|event| event.timestamp <= after);
        self.events
            .get(index)
            .map(|event| event.timestamp)
            .filter(|timestamp| *timestamp <= until)
    }

    fn next_arrival(&self, after: Timestamp, until: Timestamp) -> Option<Timestamp> {
        self.arrivals
            .values()
            .copied()
            .filter(|timestamp| *timestamp > after && *timestamp <= until)
            .min()
    }

    fn next_forecast_removal(&self, after: Timestamp, until: Timestamp) -> Option<Timestamp> {
        self.removal_forecast
            .values()
            .copied()
            .filter(|timestamp| *timestamp > after && *timestamp <= until)
            .min()
    }

    /// Build the snapshot at `timestamp` from its predecessor: decay every
    /// edge from its last event, drop expired ones, add resources popping
    /// up at this instant, then apply the interactions happening exactly
    /// now and reschedule the expiry of every touched edge.
    fn advance(
        &mut self,
        previous: &GraphState,
        timestamp: Timestamp,
    ) -> Result<GraphState, GraphError> {
        let mut graph = previous.clone();
        graph.set_timestamp(timestamp);

        let removed = self.decay_edges(&mut graph, timestamp)?;
        for pair in removed {
            self.removal_forecast.remove(&pair);
        }

        for resource in self.arrivals_at(timestamp) {
            graph.add_node(resource);
        }

        let range = self.interactions_at(timestamp);
        for event in &self.events[range.clone()] {
            for resource in [event.pair.first(), event.pair.second()] {
                if !graph.contains_node(resource) {
                    return Err(GraphError::MissingNode {
                        resource,
                        at: timestamp,
                    });
                }
            }

            let weight = match graph.edge_weight(event.pair) {
                Some(current) => self.model.reinforce(current),
                None => self.model.reinforce(0.0),
            };
            graph.set_edge_weight(event.pair, weight);
            self.last_event_on_edge.insert(event.pair, (timestamp, weight));
        }

        for event in &self.events[range] {
            let weight = graph
                .edge_weight(event.pair)
                .ok_or(GraphError::MissingEdge {
                    pair: event.pair,
                    at: timestamp,
                })?;
            self.removal_forecast
                .insert(event.pair, self.model.predicted_expiry(weight, timestamp));
        }

        Ok(graph)
    }

    /// Decay every edge of `graph` from its last-event ledger entry to
    /// `timestamp`. The cutoff is strict: an edge sitting exactly at the
    /// threshold survives, because a coincident interaction reinforces from
    /// that weight instead of starting over from zero.
    fn decay_edges(
        &mut self,
        graph: &mut GraphState,
        timestamp: Timestamp,
    ) -> Result<Vec<ResourcePair>, GraphError> {
        let mut expired = Vec::new();
        let pairs: Vec<ResourcePair> = graph.edges().map(|(pair, _)| pair).collect();

        for pair in pairs {
            let (last_timestamp, last_weight) = self
                .last_event_on_edge
                .get(&pair)
                .copied()
                .ok_or(GraphError::MissingEdge {
                    pair,
                    at: timestamp,
                })?;
            let steps = self.model.steps_between(last_timestamp, timestamp);
            let weight = self.model.decay_weight(last_weight, steps);
            graph.set_edge_weight(pair, weight);

            if weight < self.model.cutoff_threshold() {
                graph.remove_edge(pair);
                self.last_event_on_edge.remove(&pair);
                expired.push(pair);
            }
        }

        Ok(expired)
    }

    fn arrivals_at(&self, timestamp: Timestamp) -> Vec<ResourceId> {
        self.arrivals
            .iter()
            .filter(|(_, arrival)| **arrival == timestamp)
            .map(|(resource, _)| *resource)
            .collect()
    }

    fn interactions_at(&self, timestamp: Timestamp) -> Range<usize> {
        let start = self.events.partition_point(|event| event.timestamp < timestamp);
        let end = self.events.partition_point(|event| event.timestamp <= timestamp);
        start..end
    }
}
