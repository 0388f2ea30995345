// reacts to one link failure: finds every demand the link carried, searches
// replacement paths in several randomized rounds and commits the best round

use std::time::Instant;

use rand::seq::SliceRandom;
use tracing::{debug, info};

use super::error::Result;
use super::search::PathSearch;
use super::session::Session;
use super::topology::Network;
use super::transaction::Transaction;
use super::{DemandId, LinkId, Path};

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct Reassignment {
    pub demand:DemandId,
    pub path:Path
}

#[derive(Clone,Debug,Default,PartialEq,Eq)]
pub struct RestorationReport {
    pub failed_link:LinkId,
    // ordered by demand
    pub changes:Vec<Reassignment>,
    // demands this failure cost, ordered by demand
    pub abandoned:Vec<DemandId>,
    pub rounds:usize,
    // round whose candidate was committed, 0 when no round ran
    pub best_round:usize
}

// what a round would commit, demand and new path in the order they were found
type Candidate = Vec<(DemandId,Path)>;

struct BestRound {
    round:usize,
    score:f64,
    candidate:Candidate
}

// a later round only takes over with a strictly higher score
fn offer(best:&mut Option<BestRound>,round:usize,score:f64,candidate:Candidate) -> bool {
    if best.as_ref().is_some_and(|b| score <= b.score) {
        return false;
    }
    *best = Some(BestRound {round,score,candidate});
    true
}

// inputs of selective abandonment, fixed for all rounds of one failure
#[derive(Clone,Copy,Debug)]
struct Abandonment {
    enabled:bool,
    average_density:f64,
    density_factor:f64
}

pub struct Dispatcher {
    search:PathSearch
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {search:PathSearch::new()}
    }

    pub fn handle_failure(&mut self,network:&mut Network,session:&mut Session,link:LinkId) -> Result<RestorationReport> {
        network.fail_link(link)?;
        session.record_failure();

        // most valuable first, ties keep slot order
        let mut affected = network.link(link)?.spectrum().holders();
        affected.retain(|d| !network.demands()[*d].abandoned);
        affected.sort_by(|a,b| network.demands()[*b].value.cmp(&network.demands()[*a].value));
        let affected_len = affected.len();

        let mut abandoned = Vec::new();
        let active = self.prune(network, &affected, &mut abandoned)?;

        let config = session.config();
        let abandonment = Abandonment {
            enabled:session.abandonment_enabled() && session.recovery_ratio() < config.recovery_ratio,
            average_density:network.average_value_density(),
            density_factor:config.density_factor
        };
        let score_weight = config.score_weight;
        let min_rounds = config.rounds.min_rounds();
        let budget = session.round_budget();

        let started = Instant::now();
        let mut order = active.clone();
        let mut best:Option<BestRound> = None;
        let mut rounds = 0;
        while !active.is_empty()
            && (rounds < min_rounds || budget.is_some_and(|b| started.elapsed() < b))
        {
            network.shuffle_adjacency(session.rng());
            if rounds > 0 {
                order.shuffle(session.rng());
            }
            let candidate = self.run_round(network, &order, abandonment)?;
            let score = score(network, &candidate, score_weight);
            debug!(link,round = rounds,restored = candidate.len(),score,"round finished");
            offer(&mut best, rounds, score, candidate);
            rounds += 1;
        }
        let (best_round,best) = best.map(|b| (b.round,b.candidate)).unwrap_or_default();

        let dropped:Vec<DemandId> = active.iter()
            .filter(|d| !best.iter().any(|(b,_)| b == *d))
            .copied().collect();
        let mut tx = Transaction::begin(network);
        for (demand,path) in best.iter() {
            let current = tx.network().demand(*demand)?.path.clone();
            tx.occupy(*demand, path, &current)?;
            tx.release(*demand, &current, path)?;
        }
        for demand in dropped.iter() {
            let current = tx.network().demand(*demand)?.path.clone();
            tx.release(*demand, &current, &[])?;
        }
        tx.commit();
        for (demand,path) in best.iter() {
            network.set_path(*demand, path.clone())?;
        }
        for demand in dropped {
            network.abandon(demand)?;
            abandoned.push(demand);
        }
        // a fault here is a bug in the bookkeeping above, the run has to stop
        network.check_integrity()?;

        session.record_outcome(best.len(), affected_len);
        info!(
            link,
            affected = affected_len,
            restored = best.len(),
            abandoned = abandoned.len(),
            rounds,
            best_round,
            "failure handled"
        );

        let mut changes:Vec<Reassignment> = best.into_iter()
            .map(|(demand,path)| Reassignment {demand,path})
            .collect();
        changes.sort_by_key(|c| c.demand);
        abandoned.sort();
        Ok(RestorationReport {failed_link:link,changes,abandoned,rounds,best_round})
    }

    // drops every affected demand that has no path even on an otherwise empty
    // spectrum of its own, they would only hold resources other demands could use
    fn prune(&mut self,network:&mut Network,affected:&[DemandId],abandoned:&mut Vec<DemandId>) -> Result<Vec<DemandId>> {
        let mut active = Vec::with_capacity(affected.len());
        for &demand in affected {
            let mut tx = Transaction::begin(network);
            let current = tx.network().demand(demand)?.path.clone();
            tx.release(demand, &current, &[])?;
            if self.search.find(tx.network(), demand)?.is_some() {
                tx.rollback()?;
                active.push(demand);
                continue;
            }
            tx.commit();
            network.abandon(demand)?;
            abandoned.push(demand);
            debug!(demand,"no path left, abandoned");
        }
        Ok(active)
    }

    // tentatively reroutes every demand in order, rolled back before returning
    fn run_round(&mut self,network:&mut Network,order:&[DemandId],abandonment:Abandonment) -> Result<Candidate> {
        let mut tx = Transaction::begin(network);
        let mut candidate = Vec::with_capacity(order.len());
        for &demand in order {
            let current = tx.network().demand(demand)?.path.clone();
            // the demand may reuse its own slots, but only while searching
            let savepoint = tx.savepoint();
            tx.release(demand, &current, &[])?;
            let found = self.search.find(tx.network(), demand)?;
            tx.rollback_to(savepoint)?;
            if let Some(path) = found {
                tx.occupy(demand, &path, &current)?;
                candidate.push((demand,path));
            }
        }

        if abandonment.enabled {
            let threshold = abandonment.density_factor*abandonment.average_density;
            let mut kept = Vec::with_capacity(candidate.len());
            for (demand,path) in candidate {
                let record = tx.network().demand(demand)?;
                if path.len() > record.path.len() {
                    let extra = path.len() - record.path.len();
                    let density = record.value as f64 / (record.width*extra) as f64;
                    if density < threshold {
                        let current = record.path.clone();
                        tx.release(demand, &path, &current)?;
                        debug!(demand,density,threshold,"detour not worth its slots");
                        continue;
                    }
                }
                kept.push((demand,path));
            }
            candidate = kept;
        }
        tx.rollback()?;
        Ok(candidate)
    }
}

// restored value dominates, shorter paths break ties
fn score(network:&Network,candidate:&[(DemandId,Path)],weight:f64) -> f64 {
    let demands = network.demands();
    let value:u64 = candidate.iter().map(|(d,_)| demands[*d].value).sum();
    let brevity:f64 = candidate.iter()
        .map(|(d,p)| demands[*d].value as f64 / p.len().max(1) as f64)
        .sum();
    value as f64*weight + brevity + 1.0
}
