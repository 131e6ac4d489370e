use std::time::Instant;

use clap::{App, load_yaml};
use fastrand::Rng;
use serde_json::json;

use graph_coloring_engine::color::Graph;
use graph_coloring_engine::layout::force_directed_layout;
use graph_coloring_engine::util::{read_params, init_logging, export_results};


/** places the nodes of an instance with a force-directed layout */
pub fn main() -> anyhow::Result<()> {
    // parse arguments
    let yaml = load_yaml!("force_layout.yml");
    let main_args = App::from_yaml(yaml).get_matches();
    let params = read_params(&main_args)?;
    init_logging(params.verbose);

    // layout
    let mut graph = Graph::from_snapshot(params.graph.clone())?;
    let rng = match params.seed {
        Some(seed) => Rng::with_seed(seed),
        None => Rng::new(),
    };
    let t_start = Instant::now();
    let layout = force_directed_layout(&graph, &params.config.layout, &rng);
    let duration = t_start.elapsed().as_secs_f32();
    println!(
        "layout took {:.3} seconds. iterations: {}, last max displacement: {:.6}",
        duration, layout.iterations, layout.max_displacement
    );
    graph.apply_positions(&layout.positions);
    let stats = json!({
        "inst_name": params.instance,
        "iterations": layout.iterations,
        "max_displacement": layout.max_displacement,
        "time_searched": duration,
    });

    // export results
    export_results(&graph, &stats, params.perf_file.as_deref(), params.sol_file.as_deref())?;
    Ok(())
}
