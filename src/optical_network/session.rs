use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use crate::config::{RestorationConfig, RoundPolicy};

use super::dispatcher::{Dispatcher, RestorationReport};
use super::error::Result;
use super::topology::Network;
use super::LinkId;

// running counters of the scenario in progress
#[derive(Clone,Copy,Debug,Default,PartialEq,Eq)]
pub struct ScenarioStats {
    pub failures:usize,
    // demands given a new path
    pub recovered:usize,
    // demands hit by a failure, restorable or not
    pub affected:usize
}

// everything the dispatcher needs besides the network: randomness, clock, counters
pub struct Session {
    config:RestorationConfig,
    rng:StdRng,
    started:Instant,
    handled_failures:usize,
    scenario:ScenarioStats,
    previous_scenario_len:Option<usize>
}

impl Session {
    pub fn new(config:RestorationConfig) -> Self {
        Self {
            rng:StdRng::seed_from_u64(config.seed),
            config,
            started:Instant::now(),
            handled_failures:0,
            scenario:ScenarioStats::default(),
            previous_scenario_len:None
        }
    }
    pub fn config(&self) -> &RestorationConfig {
        &self.config
    }
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
    pub fn stats(&self) -> ScenarioStats {
        self.scenario
    }
    pub fn handled_failures(&self) -> usize {
        self.handled_failures
    }

    pub fn begin_scenario(&mut self) {
        self.scenario = ScenarioStats::default();
    }
    pub fn end_scenario(&mut self) -> ScenarioStats {
        self.previous_scenario_len = Some(self.scenario.failures);
        self.scenario
    }
    pub(crate) fn record_failure(&mut self) {
        self.handled_failures += 1;
        self.scenario.failures += 1;
    }
    pub(crate) fn record_outcome(&mut self,recovered:usize,affected:usize) {
        self.scenario.recovered += recovered;
        self.scenario.affected += affected;
    }

    // share of affected demands the scenario restored so far
    pub fn recovery_ratio(&self) -> f64 {
        self.scenario.recovered.max(1) as f64 / self.scenario.affected.max(1) as f64
    }

    // scenarios are assumed to be as long as the previous one,
    // the last protected_tail failures of a scenario never drop a restorable demand
    pub fn abandonment_enabled(&self) -> bool {
        match self.previous_scenario_len {
            Some(len) => self.scenario.failures < len.saturating_sub(self.config.protected_tail),
            None => true
        }
    }

    // wall clock time the failure being handled may spend on extra rounds
    pub fn round_budget(&self) -> Option<Duration> {
        let RoundPolicy::Deadline {budget,..} = self.config.rounds else {
            return None;
        };
        let remaining = budget
            .saturating_sub(self.config.deadline_margin)
            .saturating_sub(self.started.elapsed());
        let failures_left = self.config.expected_failures
            .saturating_sub(self.handled_failures)
            .saturating_add(1)
            .max(1);
        let nanos = remaining.as_nanos()/failures_left as u128;
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct ScenarioOutcome {
    pub failures:usize,
    pub retained_value:u64,
    pub total_value:u64
}

impl ScenarioOutcome {
    // 10000 when every demand survived the scenario
    pub fn score(&self) -> f64 {
        if self.total_value == 0 {
            return 10000.0;
        }
        10000.0*self.retained_value as f64/self.total_value as f64
    }
}

// drives independent failure scenarios against one network
pub struct Controller {
    network:Network,
    dispatcher:Dispatcher,
    session:Session
}

impl Controller {
    pub fn new(network:Network,config:RestorationConfig) -> Self {
        Self {
            network,
            dispatcher:Dispatcher::new(),
            session:Session::new(config)
        }
    }
    pub fn network(&self) -> &Network {
        &self.network
    }
    pub fn session(&self) -> &Session {
        &self.session
    }

    // every scenario starts from the pre-failure assignment
    pub fn begin_scenario(&mut self) -> Result<()> {
        self.network.reset()?;
        self.session.begin_scenario();
        Ok(())
    }
    pub fn fail_link(&mut self,link:LinkId) -> Result<RestorationReport> {
        self.dispatcher.handle_failure(&mut self.network, &mut self.session, link)
    }
    pub fn end_scenario(&mut self) -> ScenarioOutcome {
        let stats = self.session.end_scenario();
        let outcome = ScenarioOutcome {
            failures:stats.failures,
            retained_value:self.network.retained_value(),
            total_value:self.network.total_value()
        };
        info!(
            failures = outcome.failures,
            recovered = stats.recovered,
            affected = stats.affected,
            score = outcome.score(),
            "scenario finished"
        );
        outcome
    }

    pub fn run_scenario<I:IntoIterator<Item = LinkId>>(&mut self,failures:I) -> Result<(Vec<RestorationReport>,ScenarioOutcome)> {
        self.begin_scenario()?;
        let mut reports = Vec::new();
        for link in failures {
            reports.push(self.fail_link(link)?);
        }
        Ok((reports,self.end_scenario()))
    }
}
