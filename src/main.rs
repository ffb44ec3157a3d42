use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use aa_sipp::{load_job_file, ConflictAuditor, PriorityScheduler};

/// Any-angle safe-interval multi-agent path planner.
#[derive(Parser)]
#[command(name = "aa-sipp", version)]
struct Cli {
    /// Planning job XML: map, agents, dynamic obstacles, options.
    job: PathBuf,

    /// Re-check the produced paths by sampling and report residual
    /// conflicts.
    #[arg(long)]
    audit: bool,

    /// Sampling resolution for --audit, in time units.
    #[arg(long, default_value_t = 0.1)]
    audit_resolution: f64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let job = match load_job_file(&cli.job) {
        Ok(job) => job,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut scheduler = PriorityScheduler::new(job.config.clone());
    let result = scheduler.plan(&job.map, &job.task, &job.obstacles);

    println!(
        "pathfound={} agents={}/{} tries={} pathlength={:.4} makespan={:.4} time={:.4}s",
        result.pathfound,
        result.agents_solved,
        result.agents,
        result.tries,
        result.pathlength,
        result.makespan,
        result.runtime.as_secs_f64(),
    );
    if let Some(failure) = result.failure {
        println!("failure: {failure:?}");
    }
    for (agent, plan) in job.task.agents().iter().zip(&result.plans) {
        println!(
            "  agent {}: pathfound={} length={:.4} nodes={} steps={} time={:.6}s",
            agent.id,
            plan.pathfound,
            plan.pathlength,
            plan.nodes_created,
            plan.steps,
            plan.runtime.as_secs_f64(),
        );
    }

    if cli.audit {
        let auditor = ConflictAuditor::with_resolution(cli.audit_resolution);
        let conflicts = auditor.audit(&job.task, &result);
        println!("conflicts: {}", conflicts.len());
        for c in &conflicts {
            println!(
                "  agents {} and {} at ({:.2}, {:.2}) t={:.2}",
                c.agents.0, c.agents.1, c.i, c.j, c.time
            );
        }
    }

    if result.pathfound {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
