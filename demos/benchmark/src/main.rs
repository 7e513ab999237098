//! Times entity creation and reset against one registry.
//!
//! `roster-benchmark-demo [scenario] [create_count] [reset_count]`
//! Prompts for a scenario on stdin when none is given.

use std::{
    env,
    io::{self, BufRead, Write},
    process::ExitCode,
    time::{Duration, Instant},
};

use log::{error, info};
use roster::{EntityHandle, EntityRegistry, RegistryError};

const DEFAULT_RESET_COUNT: usize = 50_000;

#[derive(Clone, Copy, Debug)]
enum Scenario {
    /// One `create_one` / `reset_one` call per entity
    Sequential,
    /// One `create_many` call, then one `reset_many` call
    Batch,
}

impl Scenario {
    const ALL: [Scenario; 2] = [Scenario::Sequential, Scenario::Batch];

    fn name(&self) -> &'static str {
        match self {
            Scenario::Sequential => "sequential",
            Scenario::Batch => "batch",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.name() == name.trim().to_lowercase())
    }

    // sequential inserts shift the whole store each time, so it gets a smaller default
    fn default_create_count(&self) -> usize {
        match self {
            Scenario::Sequential => 50_000,
            Scenario::Batch => 676_000,
        }
    }
}

struct BenchmarkConfig {
    scenario: Scenario,
    create_count: usize,
    reset_count: usize,
}

impl BenchmarkConfig {
    fn from_args(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
        let scenario = match args.next() {
            Some(name) => Scenario::from_name(&name)
                .ok_or_else(|| format!("Unknown scenario {:?}", name))?,
            None => prompt_scenario().map_err(|err| err.to_string())?,
        };
        let create_count = parse_count(args.next(), scenario.default_create_count())?;
        let reset_count = parse_count(args.next(), DEFAULT_RESET_COUNT)?.min(create_count);

        Ok(Self {
            scenario,
            create_count,
            reset_count,
        })
    }
}

fn parse_count(arg: Option<String>, default: usize) -> Result<usize, String> {
    match arg {
        Some(text) => text
            .replace('_', "")
            .parse()
            .map_err(|_| format!("Expected a count, got {:?}", text)),
        None => Ok(default),
    }
}

fn prompt_scenario() -> io::Result<Scenario> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    writeln!(stdout, "Which benchmark do you want to run?")?;
    for scenario in Scenario::ALL {
        writeln!(stdout, "{}", scenario.name())?;
    }

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no scenario chosen"));
        }
        if let Some(scenario) = Scenario::from_name(&line) {
            return Ok(scenario);
        }
        writeln!(stdout, "Please enter a benchmark name listed above.")?;
    }
}

fn report(title: &str, count: usize, elapsed: Duration) {
    let seconds = elapsed.as_secs_f64();
    let rate = if seconds > 0.0 {
        (count as f64 / seconds).floor()
    } else {
        f64::INFINITY
    };
    info!(
        "{} {} entities in ~{:.2} seconds (~{}/sec)",
        title, count, seconds, rate
    );
}

fn run(config: &BenchmarkConfig) -> Result<(), RegistryError> {
    info!("** {} benchmark **", config.scenario.name());

    let start = Instant::now();
    let mut registry: EntityRegistry = EntityRegistry::new();
    info!("Init: {:.3} seconds", start.elapsed().as_secs_f64());

    info!("Generating {} entities...", config.create_count);
    let start = Instant::now();
    match config.scenario {
        Scenario::Sequential => {
            for _ in 0..config.create_count {
                registry.create_one()?;
            }
        }
        Scenario::Batch => {
            registry.create_many(config.create_count)?;
        }
    }
    report("Generated", registry.count(), start.elapsed());

    let targets: Vec<EntityHandle> = registry
        .iter()
        .take(config.reset_count)
        .map(|entity| entity.handle())
        .collect();
    info!("Resetting {} entities...", targets.len());
    let start = Instant::now();
    match config.scenario {
        Scenario::Sequential => {
            for handle in &targets {
                registry.reset_one(*handle)?;
            }
        }
        Scenario::Batch => {
            registry.reset_many(targets.iter().copied())?;
        }
    }
    report("Reset", targets.len(), start.elapsed());

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match BenchmarkConfig::from_args(env::args().skip(1)) {
        Ok(config) => config,
        Err(reason) => {
            error!("{}", reason);
            return ExitCode::FAILURE;
        }
    };

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Benchmark failed: {}", err);
            ExitCode::FAILURE
        }
    }
}
