use clap::{App, load_yaml};
use tokio::runtime::Runtime;

use graph_coloring_engine::session::ExecutionSession;
use graph_coloring_engine::session::driver::{ImmediateTicks, IntervalTicks};
use graph_coloring_engine::session::protocol::Algorithm;
use graph_coloring_engine::util::{read_params, init_logging, export_outcome};


/** improves a coloring with a greedy local search, one recoloring per tick */
pub fn main() -> anyhow::Result<()> {
    // parse arguments
    let yaml = load_yaml!("local_search.yml");
    let main_args = App::from_yaml(yaml).get_matches();
    let params = read_params(&main_args)?;
    init_logging(params.verbose);

    // solve it
    let runtime = Runtime::new()?;
    let (outcome, recolors) = runtime.block_on(async {
        let mut session = ExecutionSession::new(params.config.session.clone());
        session.subscribe(|s| {
            if let Some(local) = &s.local {
                println!(
                    "it: {:<15} conflicts: {:<10} pass: {:<6} recolored: {}",
                    s.attempts, s.conflicts, local.pass_number, local.recolored_count
                );
            }
        });
        let mut driver = session.start_paced(params.start_request(Algorithm::LocalSearch)).await?;
        let outcome = if main_args.is_present("immediate") {
            driver.run(&mut ImmediateTicks).await
        } else {
            driver.run(&mut IntervalTicks::new(params.config.session.pacing_interval())).await
        };
        anyhow::Ok((Some(outcome), session.recolors()))
    })?;

    // export results
    export_outcome(&params, Algorithm::LocalSearch, outcome, &recolors)?;
    Ok(())
}
