use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use spectrum_restore::io::{read_failure, read_network, read_scenario_count, write_report, TokenReader};
use spectrum_restore::{Controller, RestorationConfig};

fn run() -> Result<(),Box<dyn std::error::Error>> {
    let config = RestorationConfig::from_env()?;
    let mut tokens = TokenReader::new(io::stdin().lock());
    let network = read_network(&mut tokens, config.slot_count)?;
    info!(
        nodes = network.nodes().len(),
        links = network.links().len(),
        demands = network.demands().len(),
        "network loaded"
    );
    let links_len = network.links().len();
    let mut controller = Controller::new(network, config);
    let scenarios = read_scenario_count(&mut tokens)?;
    let mut out = BufWriter::new(io::stdout().lock());
    let mut score = 0.0;
    for _ in 0..scenarios {
        controller.begin_scenario()?;
        while let Some(link) = read_failure(&mut tokens, links_len)? {
            let report = controller.fail_link(link)?;
            write_report(&mut out, &report)?;
            // the next failure is only sent once this answer arrived
            out.flush()?;
        }
        score += controller.end_scenario().score();
    }
    info!(scenarios,score,"session finished");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
