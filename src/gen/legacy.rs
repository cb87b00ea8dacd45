//! The LEGACY randomized greedy sampler.
//!
//! LEGACY builds one panel at a time. At every step it looks for the
//! most urgent feature value — the one with the largest deficit ratio
//! `(min − selected) / remaining` — and adds a uniformly random pool
//! member holding that value, then prunes the pool: members of a filled
//! feature value and housemates of the pick are discarded. A single
//! attempt can paint itself into a corner in several ways, in which case
//! the whole panel is restarted.
//!
//! The sampler works on an immutable [`Instance`] plus a small
//! per-attempt scratch structure holding the `selected`/`remaining`
//! counters and the live-agent set; restarting an attempt just rebuilds
//! the scratch.


use rand::Rng;

use super::{Error, Panel, Result};
use crate::instance::{AgentId, FeatureRef, Instance};

/// Attempt budget used by callers that do not want to tune it. A single
/// attempt is cheap, and instances where LEGACY is this unlucky without
/// being infeasible are pathological.
pub const DEFAULT_MAX_ATTEMPTS: usize = 100_000;

/// Reusable sampler for one instance.
#[derive(Debug, Clone)]
pub struct Sampler<'a> {
    instance: &'a Instance,
}

/// Why a single attempt had to be abandoned. Attempt failures are local:
/// the caller restarts until its budget runs out.
#[derive(Debug, Clone)]
struct AttemptFailed(String);

struct Scratch<'a> {
    instance: &'a Instance,
    selected: Vec<Vec<usize>>,
    remaining: Vec<Vec<usize>>,
    alive: Vec<bool>,
    alive_count: usize,
}

impl<'a> Sampler<'a> {
    pub fn new(instance: &'a Instance) -> Self {
        Sampler { instance }
    }

    /// Draws panels until one succeeds, restarting on attempt failures.
    /// Gives up with [`Error::Selection`] after `max_attempts` failed
    /// attempts.
    pub fn draw_until<R: Rng>(&self, rng: &mut R, max_attempts: usize) -> Result<Panel> {
        let mut last_failure = String::from("no attempt was made");
        for _ in 0..max_attempts {
            match self.draw(rng) {
                Ok(panel) => return Ok(panel),
                Err(AttemptFailed(msg)) => last_failure = msg,
            }
        }
        Err(Error::Selection(format!(
            "LEGACY could not draw a feasible panel within {} attempts (last failure: {})",
            max_attempts, last_failure
        )))
    }

    /// One attempt at drawing a panel.
    fn draw<R: Rng>(&self, rng: &mut R) -> std::result::Result<Panel, AttemptFailed> {
        let instance = self.instance;
        let mut scratch = Scratch::new(instance)?;
        let mut panel = Panel::new();

        for count in 0..instance.panel_size() {
            let fv = scratch.most_constrained_value()?;
            let pick = rng.gen_range(0..scratch.remaining_of(fv));
            let id = scratch.nth_alive_holder(fv, pick);

            panel.insert(id);
            scratch.select(id)?;

            if instance.household_mode() {
                let housemates: Vec<AgentId> = instance
                    .housemates(id)
                    .filter(|&mate| scratch.alive[mate])
                    .collect();
                for mate in housemates {
                    scratch.delete(mate)?;
                }
            }

            // if a feature value of the pick just filled up, nobody else
            // holding it may be selected anymore
            for (c, &v) in instance.agent(id).features.iter().enumerate() {
                if scratch.selected[c][v] == instance.feature_value((c, v)).max {
                    scratch.delete_all_holders((c, v))?;
                }
            }

            if count + 1 < instance.panel_size() && scratch.alive_count == 0 {
                return Err(AttemptFailed("we have run out of people".into()));
            }
        }

        scratch.check_minimums()?;

        Ok(panel)
    }
}

impl<'a> Scratch<'a> {
    fn new(instance: &'a Instance) -> std::result::Result<Self, AttemptFailed> {
        let selected = instance
            .categories()
            .iter()
            .map(|category| vec![0; category.values.len()])
            .collect();
        let remaining = instance
            .categories()
            .iter()
            .enumerate()
            .map(|(c, category)| {
                (0..category.values.len())
                    .map(|v| instance.holders((c, v)).len())
                    .collect()
            })
            .collect();

        let mut scratch = Scratch {
            instance,
            selected,
            remaining,
            alive: vec![true; instance.pool_size()],
            alive_count: instance.pool_size(),
        };

        // nobody holding a zero-max value may ever be selected
        for fv in instance.feature_refs() {
            if instance.feature_value(fv).max == 0 && scratch.remaining_of(fv) > 0 {
                scratch.delete_all_holders(fv)?;
            }
        }

        Ok(scratch)
    }

    fn remaining_of(&self, (c, v): FeatureRef) -> usize {
        self.remaining[c][v]
    }

    /// The feature value with the largest deficit ratio. Ties are broken
    /// by first-seen order over categories and values.
    fn most_constrained_value(&self) -> std::result::Result<FeatureRef, AttemptFailed> {
        let mut best_ratio = -100.0;
        let mut best: Option<FeatureRef> = None;

        for fv in self.instance.feature_refs() {
            let quota = self.instance.feature_value(fv);
            let selected = self.selected[fv.0][fv.1];
            let remaining = self.remaining[fv.0][fv.1];

            // if there are fewer left than we still need, we are in
            // trouble
            if selected < quota.min && remaining < quota.min - selected {
                return Err(AttemptFailed(format!(
                    "no one (or not enough) left holding {}",
                    self.instance.feature_name(fv)
                )));
            }

            // if none remain, it must be because the value filled up and
            // its holders were discarded; if max = 0, we do not want any
            if remaining != 0 && quota.max != 0 {
                let ratio =
                    (quota.min as f64 - selected as f64) / remaining as f64;
                if ratio > 1.0 {
                    return Err(AttemptFailed(format!(
                        "deficit ratio above 1 for {}",
                        self.instance.feature_name(fv)
                    )));
                }
                if ratio > best_ratio {
                    best_ratio = ratio;
                    best = Some(fv);
                }
            }
        }

        best.ok_or_else(|| AttemptFailed("we have run out of people".into()))
    }

    /// The `n`-th (0-based) live agent holding the given value.
    fn nth_alive_holder(&self, fv: FeatureRef, n: usize) -> AgentId {
        self.instance
            .holders(fv)
            .iter()
            .copied()
            .filter(|&id| self.alive[id])
            .nth(n)
            .expect("remaining counter matches the number of live holders")
    }

    /// Removes an agent that was picked for the panel, updating the
    /// `selected` and `remaining` counters of all its feature values.
    fn select(&mut self, id: AgentId) -> std::result::Result<(), AttemptFailed> {
        self.remove(id, true)
    }

    /// Removes an agent from the pool without selecting it (housemates,
    /// holders of filled values).
    fn delete(&mut self, id: AgentId) -> std::result::Result<(), AttemptFailed> {
        self.remove(id, false)
    }

    fn remove(&mut self, id: AgentId, selected: bool) -> std::result::Result<(), AttemptFailed> {
        let features: Vec<(usize, usize)> = self
            .instance
            .agent(id)
            .features
            .iter()
            .copied()
            .enumerate()
            .collect();
        for (c, v) in features {
            if selected {
                self.selected[c][v] += 1;
            }
            self.remaining[c][v] -= 1;
            let quota = self.instance.feature_value((c, v));
            if self.remaining[c][v] == 0 && self.selected[c][v] < quota.min {
                return Err(AttemptFailed(format!(
                    "no one left holding {}",
                    self.instance.feature_name((c, v))
                )));
            }
        }
        self.alive[id] = false;
        self.alive_count -= 1;
        Ok(())
    }

    fn delete_all_holders(&mut self, fv: FeatureRef) -> std::result::Result<(), AttemptFailed> {
        let to_delete: Vec<AgentId> = self
            .instance
            .holders(fv)
            .iter()
            .copied()
            .filter(|&id| self.alive[id])
            .collect();
        for id in to_delete {
            self.delete(id)?;
        }
        Ok(())
    }

    fn check_minimums(&self) -> std::result::Result<(), AttemptFailed> {
        for fv in self.instance.feature_refs() {
            if self.selected[fv.0][fv.1] < self.instance.feature_value(fv).min {
                return Err(AttemptFailed(format!(
                    "failed to reach the minimum for {}",
                    self.instance.feature_name(fv)
                )));
            }
        }
        Ok(())
    }
}
