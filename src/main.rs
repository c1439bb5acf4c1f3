use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;

use firmflow::cli;
use firmflow::cli::commands::{Cli, Commands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli_args = Cli::parse();
    let json_output = cli_args.json;
    let firm_flag = cli_args.firm.clone();
    let actor = cli_args.actor.clone();

    let exit_code = match cli_args.command {
        Commands::Init => cli::init::run(json_output),
        Commands::Firm(cmd) => cli::firm::run(cmd, json_output),
        Commands::Client(cmd) => cli::client::run(cmd, json_output, firm_flag.as_deref()),
        Commands::Template(cmd) => {
            cli::template::run(cmd, json_output, firm_flag.as_deref(), &actor)
        }
        Commands::Project(cmd) => cli::project::run(cmd, json_output, firm_flag.as_deref(), &actor),
        Commands::Task(cmd) => cli::task::run(cmd, json_output, firm_flag.as_deref(), &actor),
        Commands::Recurring(cmd) => {
            cli::recurring::run(cmd, json_output, firm_flag.as_deref(), &actor)
        }
        Commands::Activity { limit } => cli::activity::run(limit, json_output, firm_flag.as_deref()),
    };

    process::exit(exit_code);
}
