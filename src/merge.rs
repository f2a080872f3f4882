//! Queue-ID chain merging for transfer-log aggregates.
//!
//! When a message is handed from one queue to another (content filter
//! re-injection, for instance), the first queue logs a relay line ending in
//! `(... queued as <NEXT>)`. Each such relation links two aggregates; chains
//! of links collapse into one aggregate carrying the identity of the last
//! queue, with a separator line marking every handoff.

use crate::family::{LineFormat, TransferFormat};
use crate::message::MessageAggregate;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

/// Line inserted between the lines of two merged queues.
pub const HANDOFF_SEPARATOR: &str = "---------- queue handoff ----------";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error("queue {from} hands off to {to}, but their message IDs differ ({from_id} vs {to_id})")]
    ConsistencyViolation {
        from: String,
        to: String,
        from_id: String,
        to_id: String,
    },
}

#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub messages: Vec<MessageAggregate>,
    /// Links that were not merged because the two sides disagree
    pub violations: Vec<MergeError>,
}

/// A relay line found in an aggregate's own lines.
#[derive(Debug, Clone)]
struct Relay {
    position: usize,
    key: String,
    time: Option<DateTime<Utc>>,
}

pub struct ChainMerger<'a> {
    format: &'a TransferFormat,
}

impl<'a> ChainMerger<'a> {
    pub fn new(format: &'a TransferFormat) -> Self {
        Self { format }
    }

    /// Relay lines logged under the aggregate's own queue ID, in line order.
    ///
    /// Lines carried over from earlier queues of an already merged chain
    /// belong to a different key and are never reconsidered.
    fn relays(&self, aggregate: &MessageAggregate) -> Vec<Relay> {
        let Some(own) = aggregate.secondary_key.as_deref() else {
            return Vec::new();
        };
        aggregate
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| self.format.secondary_key(line) == Some(own))
            .filter_map(|(position, line)| {
                let key = self.format.requeue_key(line, own)?;
                Some(Relay {
                    position,
                    key,
                    time: self.format.timestamp(line).ok().flatten(),
                })
            })
            .collect()
    }

    /// Record `related_key` and `relay_time` on every aggregate that hands
    /// its message to another queue, and remove the relay line that exposed
    /// the handoff.
    ///
    /// A relay to a queue present in `aggregates` wins over earlier relays to
    /// queues outside it, so a remote delivery logged first does not hide the
    /// handoff to a local content filter. Aggregates whose relation is
    /// already recorded are left alone.
    pub fn detect_relations(&self, aggregates: &mut [MessageAggregate]) {
        let known: HashSet<String> = aggregates
            .iter()
            .filter_map(|m| m.secondary_key.clone())
            .collect();

        for aggregate in aggregates.iter_mut() {
            if aggregate.related_key.is_some() {
                continue;
            }
            let relays = self.relays(aggregate);
            let Some(relay) = relays
                .iter()
                .find(|relay| known.contains(&relay.key))
                .or_else(|| relays.first())
            else {
                continue;
            };

            debug!(
                id = aggregate.id,
                from = aggregate.secondary_key.as_deref().unwrap_or("-"),
                to = %relay.key,
                "Detected queue handoff"
            );
            aggregate.lines.remove(relay.position);
            aggregate.related_key = Some(relay.key.clone());
            aggregate.relay_time = relay.time;
        }
    }

    /// Merge every handoff chain in `aggregates`.
    ///
    /// The result does not depend on the order of the input, and merging an
    /// already merged collection returns it unchanged.
    pub fn merge(&self, aggregates: Vec<MessageAggregate>) -> MergeOutcome {
        let mut nodes = dedupe_by_key(aggregates);
        self.detect_relations(&mut nodes);

        let slot_of: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .filter_map(|(slot, m)| m.secondary_key.as_deref().map(|k| (k, slot)))
            .collect();

        let mut violations = Vec::new();

        // Candidate links, grouped by target
        let mut claims: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (slot, node) in nodes.iter().enumerate() {
            let Some(&target) = node.related_key.as_deref().and_then(|k| slot_of.get(k)) else {
                continue;
            };
            if target == slot {
                continue;
            }
            let later = &nodes[target];
            if node.external_id != later.external_id {
                let violation = MergeError::ConsistencyViolation {
                    from: node.secondary_key.clone().unwrap_or_default(),
                    to: later.secondary_key.clone().unwrap_or_default(),
                    from_id: node.external_id.clone(),
                    to_id: later.external_id.clone(),
                };
                warn!(error = %violation, "Not merging queue handoff");
                violations.push(violation);
                continue;
            }
            claims.entry(target).or_default().push(slot);
        }

        // One predecessor per target: the earliest relay wins
        let mut next: HashMap<usize, usize> = HashMap::new();
        let mut prev: HashMap<usize, usize> = HashMap::new();
        for (target, mut claimants) in claims {
            claimants.sort_by(|&a, &b| {
                let (a, b) = (&nodes[a], &nodes[b]);
                (a.relay_time.is_none(), a.relay_time, &a.secondary_key)
                    .cmp(&(b.relay_time.is_none(), b.relay_time, &b.secondary_key))
            });
            let winner = claimants[0];
            for &loser in &claimants[1..] {
                warn!(
                    queue = nodes[loser].secondary_key.as_deref().unwrap_or("-"),
                    target = nodes[target].secondary_key.as_deref().unwrap_or("-"),
                    "Several queues hand off to the same queue, keeping the earliest"
                );
            }
            next.insert(winner, target);
            prev.insert(target, winner);
        }

        let mut visited = HashSet::new();
        let mut chains: Vec<Vec<usize>> = Vec::new();
        for root in 0..nodes.len() {
            if prev.contains_key(&root) {
                continue;
            }
            let mut chain = vec![root];
            visited.insert(root);
            let mut at = root;
            while let Some(&after) = next.get(&at) {
                if !visited.insert(after) {
                    break;
                }
                chain.push(after);
                at = after;
            }
            chains.push(chain);
        }

        // Whatever is left sits on a handoff cycle
        for slot in 0..nodes.len() {
            if visited.insert(slot) {
                warn!(
                    queue = nodes[slot].secondary_key.as_deref().unwrap_or("-"),
                    "Queue handoff cycle, keeping queue unmerged"
                );
                chains.push(vec![slot]);
            }
        }

        let mut owned: Vec<Option<MessageAggregate>> = nodes.into_iter().map(Some).collect();
        let mut messages: Vec<MessageAggregate> = chains
            .into_iter()
            .map(|chain| {
                let links: Vec<MessageAggregate> =
                    chain.iter().filter_map(|&slot| owned[slot].take()).collect();
                self.join(links)
            })
            .collect();

        messages.sort_by(|a, b| {
            let a_seen = a.first_seen();
            let b_seen = b.first_seen();
            (a_seen.is_none(), a_seen, &a.secondary_key, a.id)
                .cmp(&(b_seen.is_none(), b_seen, &b.secondary_key, b.id))
        });

        MergeOutcome {
            messages,
            violations,
        }
    }

    /// Concatenate one chain, earliest queue first.
    fn join(&self, mut links: Vec<MessageAggregate>) -> MessageAggregate {
        if links.len() == 1 {
            return links.remove(0);
        }

        let mut keys = Vec::new();
        let mut lines = Vec::new();
        let mut files = Vec::new();
        let mut start: Option<DateTime<Utc>> = None;
        let mut end: Option<DateTime<Utc>> = None;
        let last = links.len() - 1;

        for (n, link) in links.iter_mut().enumerate() {
            if n > 0 {
                lines.push(HANDOFF_SEPARATOR.to_string());
            }
            lines.append(&mut link.lines);

            if link.merged_keys.is_empty() {
                keys.extend(link.secondary_key.clone());
            } else {
                keys.append(&mut link.merged_keys);
            }
            files.append(&mut link.source_files);
            start = earliest(start, link.window_start);
            end = latest(end, link.window_end);
        }

        let mut merged = links.remove(last);
        merged.lines = lines;
        merged.merged_keys = keys;
        merged.source_files = Vec::new();
        for file in &files {
            merged.add_source_file(file);
        }
        merged.window_start = start;
        merged.window_end = end;

        debug!(
            id = merged.id,
            keys = ?merged.merged_keys,
            lines = merged.lines.len(),
            "Merged queue handoff chain"
        );
        merged
    }
}

/// Keep one aggregate per secondary key: the lowest ID, with the source
/// files of all duplicates.
fn dedupe_by_key(mut aggregates: Vec<MessageAggregate>) -> Vec<MessageAggregate> {
    aggregates.sort_by_key(|m| m.id);

    let mut kept: Vec<MessageAggregate> = Vec::with_capacity(aggregates.len());
    let mut slot_of: HashMap<String, usize> = HashMap::new();
    for aggregate in aggregates {
        let Some(key) = aggregate.secondary_key.clone() else {
            kept.push(aggregate);
            continue;
        };
        match slot_of.get(&key) {
            Some(&slot) => {
                debug!(key = %key, dropped = aggregate.id, kept = kept[slot].id, "Duplicate queue aggregate");
                for file in &aggregate.source_files {
                    kept[slot].add_source_file(file);
                }
            }
            None => {
                slot_of.insert(key, kept.len());
                kept.push(aggregate);
            }
        }
    }
    kept
}

fn earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn latest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
