use std::str::FromStr;
use std::time::Duration;

use lazy_static::lazy_static;
use thiserror::Error;

// slots per link of the networks the loader reads
pub const DEFAULT_SLOT_COUNT:usize = 40;

//free parameters, that can be tweaked
lazy_static! {
    static ref default_seed:u64 = 666;
    static ref default_min_rounds:usize = 1;
    // expected number of failures over a whole session, used to split a time budget
    static ref default_expected_failures:usize = 6000;
    // failures at the end of a scenario that always try to restore everything
    static ref default_protected_tail:usize = 5;
    // a detour is dropped below density_factor times the average value density...
    static ref default_density_factor:f64 = 5.0;
    // ...while the scenario restored less than this share of its affected demands
    static ref default_recovery_ratio:f64 = 0.8;
    // restored value always outweighs the path length term of a score
    static ref default_score_weight:f64 = 1e9;
    // kept back from a time budget, rounds overrun it slightly
    static ref default_deadline_margin:Duration = Duration::from_secs(1);
}

#[derive(Error,Debug,Clone,PartialEq,Eq)]
pub enum ConfigError {
    #[error("Environment variable {name} is {value:?}, which is not a valid {expected}")]
    Invalid{name:String,value:String,expected:&'static str},
    #[error("{name} must be at least {min}, got {value}")]
    TooSmall{name:&'static str,min:usize,value:usize}
}

type Result<T> = std::result::Result<T,ConfigError>;

// how many search rounds one failure gets
#[derive(Clone,Copy,Debug,PartialEq)]
pub enum RoundPolicy {
    // exactly this many rounds
    Bounded{rounds:usize},
    // the session wide budget is split over the failures still expected,
    // at least min_rounds rounds always run
    Deadline{budget:Duration,min_rounds:usize}
}

impl RoundPolicy {
    pub fn min_rounds(&self) -> usize {
        match self {
            RoundPolicy::Bounded {rounds} => *rounds,
            RoundPolicy::Deadline {min_rounds,..} => *min_rounds
        }
    }
}

#[derive(Clone,Debug,PartialEq)]
pub struct RestorationConfig {
    pub slot_count:usize,
    pub seed:u64,
    pub rounds:RoundPolicy,
    pub expected_failures:usize,
    pub protected_tail:usize,
    pub density_factor:f64,
    pub recovery_ratio:f64,
    pub score_weight:f64,
    pub deadline_margin:Duration
}

impl Default for RestorationConfig {
    fn default() -> Self {
        Self {
            slot_count:DEFAULT_SLOT_COUNT,
            seed:*default_seed,
            rounds:RoundPolicy::Bounded {rounds:*default_min_rounds},
            expected_failures:*default_expected_failures,
            protected_tail:*default_protected_tail,
            density_factor:*default_density_factor,
            recovery_ratio:*default_recovery_ratio,
            score_weight:*default_score_weight,
            deadline_margin:*default_deadline_margin
        }
    }
}

fn parse<T:FromStr>(name:&str,value:&str,expected:&'static str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name:name.to_string(),
        value:value.to_string(),
        expected
    })
}

impl RestorationConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    // RESTORE_* variables override the defaults, everything else is ignored
    pub fn from_vars<I,K,V>(vars:I) -> Result<Self>
        where I:IntoIterator<Item = (K,V)>,K:AsRef<str>,V:AsRef<str>
    {
        let mut config = Self::default();
        let mut rounds = None;
        let mut budget = None;
        for (name,value) in vars {
            let (name,value) = (name.as_ref(),value.as_ref());
            match name {
                "RESTORE_SLOTS" => config.slot_count = parse(name, value, "slot count")?,
                "RESTORE_SEED" => config.seed = parse(name, value, "seed")?,
                "RESTORE_MIN_ROUNDS" => rounds = Some(parse(name, value, "round count")?),
                "RESTORE_BUDGET_MS" => budget = Some(Duration::from_millis(parse(name, value, "millisecond count")?)),
                "RESTORE_EXPECTED_FAILURES" => config.expected_failures = parse(name, value, "failure count")?,
                "RESTORE_PROTECTED_TAIL" => config.protected_tail = parse(name, value, "failure count")?,
                "RESTORE_DENSITY_FACTOR" => config.density_factor = parse(name, value, "factor")?,
                "RESTORE_RECOVERY_RATIO" => config.recovery_ratio = parse(name, value, "ratio")?,
                _ => {}
            }
        }
        let rounds = rounds.unwrap_or(*default_min_rounds);
        config.rounds = match budget {
            Some(budget) => RoundPolicy::Deadline {budget,min_rounds:rounds},
            None => RoundPolicy::Bounded {rounds}
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.slot_count == 0 {
            return Err(ConfigError::TooSmall {name:"slot count",min:1,value:self.slot_count})
        }
        if self.rounds.min_rounds() == 0 {
            return Err(ConfigError::TooSmall {name:"round count",min:1,value:0})
        }
        Ok(())
    }
}
