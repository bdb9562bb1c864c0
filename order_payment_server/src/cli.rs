use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
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
    const DISPLAY_ENVS: [&str; 15] = [
        "RUST_LOG",
        "OPG_HOST",
        "OPG_PORT",
        "OPG_DATABASE_URL",
        "OPG_USE_X_FORWARDED_FOR",
        "OPG_USE_FORWARDED",
        "OPG_CURRENCY",
        "OPG_SHIPPING_FEE",
        "OPG_FREE_SHIPPING_THRESHOLD",
        "OPG_TAX_RATE_BPS",
        "OPG_GATEWAY_TIMEOUT_SECS",
        "OPG_MAX_SAVE_RETRIES",
        "OPG_REFUND_RETRY_INTERVAL_SECS",
        "OPG_RAZORPAY_KEY_ID",
        "OPG_RAZORPAY_API_URL",
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
