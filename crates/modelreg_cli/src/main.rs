//! CLI smoke entry point.
//!
//! Connects with the default model registry declaration and prints the
//! bound type map as sorted `name=id` lines.

use modelreg_core::{connect, model_registry_spec, ConnectorConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("modelreg_core ping={}", modelreg_core::ping());
    println!("modelreg_core version={}", modelreg_core::core_version());

    let config = match std::env::args().nth(1) {
        Some(path) => match ConnectorConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => ConnectorConfig::default(),
    };

    let connection = match connect(&config, &model_registry_spec()) {
        Ok(connection) => connection,
        Err(err) => {
            log::error!("event=cli_connect module=cli status=error error={err}");
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut types: Vec<(String, i32)> = connection.repos.type_map().into_iter().collect();
    types.sort();
    for (name, id) in types {
        println!("{name}={id}");
    }
    ExitCode::SUCCESS
}
