use std::process;

use clap::Parser;

use netra_config::cli::{self, Cli};
use netra_config::config::{init_logging, IsolatedEnvironment};

fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let env = IsolatedEnvironment::global();

    if let Err(e) = init_logging(env.as_ref()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match cli::execute_command(&cli, env) {
        Ok(status) => process::exit(cli::exit_code(status)),
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            process::exit(1);
        }
    }
}
