mod analysis;
mod commands;
mod config;
mod db;
mod error;
mod models;

use clap::Parser;
use commands::Cli;
use config::Config;
use db::Database;
use log::{error, info};
use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(2);
        }
    };

    // Initialize database
    let database = match Database::new(&config).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            process::exit(1);
        }
    };
    info!("Connected to {}", config.database_url);

    match commands::handle_command(&database, &config, cli.command).await {
        Ok(output) => println!("{}", output),
        Err(why) => {
            error!("Command failed: {}", why);
            process::exit(1);
        }
    }
}
