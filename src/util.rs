use std::fs;

use clap::ArgMatches;
use serde_json::Value;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::color::{Graph, GraphSnapshot};
use crate::config::EngineConfig;
use crate::dimacs;
use crate::error::ColoringError;
use crate::search::local_search::RecolorRecord;
use crate::session::SessionOutcome;
use crate::session::protocol::{Algorithm, RunOptions, StartRequest};

/** command line parameters shared by the executables */
#[derive(Debug, Clone)]
pub struct Params {
    pub instance: String,
    pub graph: GraphSnapshot,
    pub nb_colors: usize,
    /// attempt cap (Las Vegas) or number of iterations (Monte Carlo)
    pub attempts: Option<u64>,
    pub seed: Option<u64>,
    pub config: EngineConfig,
    pub perf_file: Option<String>,
    pub sol_file: Option<String>,
    pub verbose: bool,
}

fn parse_value<T: std::str::FromStr>(main_args:&ArgMatches, name:&str) -> Result<Option<T>, ColoringError> {
    match main_args.value_of(name) {
        None => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(|_|
            ColoringError::InvalidConfiguration(format!("unable to parse --{} ({})", name, s))
        ),
    }
}

/** reads command line input: instance, colors, attempts, seed and export files */
pub fn read_params(main_args:&ArgMatches) -> Result<Params, ColoringError> {
    let instance = main_args.value_of("instance")
        .ok_or_else(|| ColoringError::InvalidConfiguration("missing instance".to_string()))?;
    let instance_type = main_args.value_of("type").unwrap_or("dimacs");
    let nb_colors = parse_value::<usize>(main_args, "colors")?.unwrap_or(3);
    let attempts = parse_value::<u64>(main_args, "attempts")?;
    let seed = parse_value::<u64>(main_args, "seed")?;
    let config = match main_args.value_of("config") {
        None => EngineConfig::default(),
        Some(filename) => EngineConfig::from_file(filename)?,
    };
    // read value of the solution filename
    let sol_file = main_args.value_of("solution").map(|e| {
        println!("printing solutions in: {}", e);
        e.to_string()
    });
    // read value of the performance logs filename
    let perf_file = main_args.value_of("perf").map(|e| {
        println!("printing perfs in: {}\n", e);
        e.to_string()
    });
    let graph = read_graph(instance, instance_type)?;
    println!("{}:", instance);
    Graph::from_snapshot(graph.clone())?.display_statistics();
    println!("=======================");
    Ok(Params {
        instance: instance.to_string(),
        graph,
        nb_colors,
        attempts,
        seed,
        config,
        perf_file,
        sol_file,
        verbose: main_args.is_present("verbose"),
    })
}

impl Params {
    /// request running the given algorithm on the instance
    pub fn start_request(&self, algorithm:Algorithm) -> StartRequest {
        let (max_attempts, iterations) = match algorithm {
            Algorithm::MonteCarlo => (None, self.attempts),
            _ => (self.attempts, None),
        };
        StartRequest {
            algorithm,
            graph_snapshot: self.graph.clone(),
            options: RunOptions {
                number_of_colors: self.nb_colors,
                max_attempts,
                iterations,
                seed: self.seed,
            },
        }
    }
}

/// reads a graph snapshot: "dimacs" (.col) or "json" ({nodes, edges})
pub fn read_graph(filename:&str, instance_type:&str) -> Result<GraphSnapshot, ColoringError> {
    match instance_type {
        "dimacs" => dimacs::snapshot_from_file(filename),
        "json" => Ok(serde_json::from_str(&fs::read_to_string(filename)?)?),
        _ => Err(ColoringError::InvalidConfiguration(format!("instance type unknown {}", instance_type))),
    }
}

/// installs the log subscriber (DEBUG if verbose, INFO otherwise)
pub fn init_logging(verbose:bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("log subscriber already installed");
    }
}

/// exports search results to files
pub fn export_results(
    graph:&Graph,
    stats:&Value,
    perf_file:Option<&str>,
    sol_file:Option<&str>,
) -> Result<(), ColoringError> {
    if let Some(filename) = perf_file {
        fs::write(filename, serde_json::to_string(stats)?)?;
    }
    if let Some(filename) = sol_file {
        fs::write(filename, serde_json::to_string_pretty(&graph.snapshot())?)?;
    }
    Ok(())
}

/** prints the outcome of a run, commits the coloring found and exports the
results (with the recolors of a local search run). Fails if the run did not complete. */
pub fn export_outcome(
    params:&Params,
    algorithm:Algorithm,
    outcome:Option<SessionOutcome>,
    recolors:&[RecolorRecord],
) -> Result<(), ColoringError> {
    let complete = match outcome {
        Some(SessionOutcome::Completed(c)) => c,
        Some(SessionOutcome::Failed(message)) => return Err(ColoringError::ExecutionFault(message)),
        Some(SessionOutcome::Cancelled) | None => {
            return Err(ColoringError::ExecutionFault("run cancelled".to_string()))
        }
    };
    println!("=======================");
    println!(
        "{:?} took {:.3} seconds. attempts: {}, conflicts: {}, success rate: {:.4}",
        algorithm, complete.stats.time_ms as f64 / 1000., complete.stats.attempts,
        complete.stats.conflicts, complete.stats.success_rate
    );
    let mut graph = Graph::from_snapshot(params.graph.clone())?;
    graph.apply_coloring(&complete.colors)?;
    let stats = serde_json::json!({
        "inst_name": params.instance,
        "algorithm": algorithm,
        "nb_colors": params.nb_colors,
        "stats": complete.stats,
        "conflict_edges": complete.conflict_edges,
        "local": complete.local,
        "recolors": recolors,
    });
    export_results(&graph, &stats, params.perf_file.as_deref(), params.sol_file.as_deref())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::tests::graph;
    use clap::{App, Arg};

    fn app() -> App<'static, 'static> {
        App::new("test")
            .arg(Arg::with_name("instance").required(true).index(1))
            .arg(Arg::with_name("type").long("type").takes_value(true))
            .arg(Arg::with_name("colors").long("colors").takes_value(true))
            .arg(Arg::with_name("attempts").long("attempts").takes_value(true))
            .arg(Arg::with_name("seed").long("seed").takes_value(true))
    }

    fn dimacs_file(name:&str) -> String {
        let path = std::env::temp_dir().join(name);
        fs::write(&path, "p edge 3 2\ne 1 2\ne 2 3\n").unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_read_params() {
        let file = dimacs_file("util_read_params.col");
        let matches = app().get_matches_from(vec!["test", file.as_str(), "--colors", "4", "--attempts", "30"]);
        let params = read_params(&matches).unwrap();
        assert_eq!(params.nb_colors, 4);
        assert_eq!(params.graph.nodes.len(), 3);
        let request = params.start_request(Algorithm::MonteCarlo);
        assert_eq!(request.options.iterations, Some(30));
        assert_eq!(request.options.max_attempts, None);
        let request = params.start_request(Algorithm::LasVegas);
        assert_eq!(request.options.max_attempts, Some(30));
    }

    #[test]
    fn test_invalid_params() {
        let file = dimacs_file("util_invalid_params.col");
        let matches = app().get_matches_from(vec!["test", file.as_str(), "--colors", "many"]);
        assert!(matches!(read_params(&matches), Err(ColoringError::InvalidConfiguration(_))));
        assert!(matches!(read_graph(&file, "xml"), Err(ColoringError::InvalidConfiguration(_))));
        assert!(matches!(read_graph("/nonexistent/instance.col", "dimacs"), Err(ColoringError::Io(_))));
    }

    #[test]
    fn test_export_results() {
        let g = graph(2, &[(1,2)]);
        let perf = std::env::temp_dir().join("util_export_perf.json");
        let sol = std::env::temp_dir().join("util_export_sol.json");
        let stats = serde_json::json!({"attempts": 3});
        export_results(&g, &stats, perf.to_str(), sol.to_str()).unwrap();
        let read:Value = serde_json::from_str(&fs::read_to_string(&perf).unwrap()).unwrap();
        assert_eq!(read["attempts"], 3);
        let snapshot:GraphSnapshot = serde_json::from_str(&fs::read_to_string(&sol).unwrap()).unwrap();
        assert_eq!(snapshot, g.snapshot());
    }
}
