use clap::{App, load_yaml};
use tokio::runtime::Runtime;

use graph_coloring_engine::session::ExecutionSession;
use graph_coloring_engine::session::protocol::Algorithm;
use graph_coloring_engine::util::{read_params, init_logging, export_outcome};


/** estimates the best coloring of an instance with a fixed number of random trials */
pub fn main() -> anyhow::Result<()> {
    // parse arguments
    let yaml = load_yaml!("montecarlo.yml");
    let main_args = App::from_yaml(yaml).get_matches();
    let params = read_params(&main_args)?;
    init_logging(params.verbose);

    // solve it
    let runtime = Runtime::new()?;
    let outcome = runtime.block_on(async {
        let mut session = ExecutionSession::new(params.config.session.clone());
        session.subscribe(|s| println!(
            "it: {:<15} conflicts: {:<10} mean: {:<10.3} progress: {:.3}",
            s.attempts, s.conflicts, s.mean_conflicts, s.progress
        ));
        session.start_background(params.start_request(Algorithm::MonteCarlo)).await?;
        anyhow::Ok(session.wait().await)
    })?;

    // export results
    export_outcome(&params, Algorithm::MonteCarlo, outcome, &[])?;
    Ok(())
}
