use std::{env, env::VarError};

/// There's no real CLI for the server, so any argument prints the help and the current environment.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 11] = [
        "RUST_LOG",
        "DGP_HOST",
        "DGP_PORT",
        "DGP_DATABASE_URL",
        "DGP_PAYMENT_ADDRESS",
        "DGP_CURRENCY_LABEL",
        "DGP_COLLABORATOR_TIMEOUT_MS",
        "DGP_STOCK_REFRESH_SECS",
        "DGP_NOTIFY_URL",
        "DGP_OPERATOR_SESSION",
        "DGP_HMAC_CHECKS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
