use clap::Parser;
use treegrid::cli::commands::{Cli, Commands};
use treegrid::cli::handlers;

fn main() {
    let cli = Cli::parse();

    match cli.command {
        None => {
            // No subcommand → launch TUI (it sets up its own file logging)
            if let Err(e) = treegrid::tui::run(cli.workspace_dir.as_deref()) {
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Init(args)) => {
            treegrid::logging::init_stderr();
            // Init is handled before workspace discovery
            let result = handlers::start_dir(cli.workspace_dir.as_deref())
                .and_then(|dir| handlers::cmd_init(args, &dir));
            if let Err(e) = result {
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
        }
        Some(_) => {
            treegrid::logging::init_stderr();
            if let Err(e) = handlers::dispatch(cli) {
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
