use anchorscope::handlers::*;
use anchorscope_core::print_banner;
use colored::Colorize;
use commands::command_argument_builder;
use tracing_subscriber::EnvFilter;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Logs go to stderr so `request` output stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Show banner unless --quiet flag is set, or the output is JSON
    let json_output = matches!(chosen_command.subcommand(), Some(("request", _)));
    if !quiet && !json_output {
        print_banner();
    }

    let config_dir = resolve_config_dir(
        chosen_command
            .get_one::<String>("data-dir")
            .map(String::as_str)
            .unwrap_or(DEFAULT_CONFIG_DIR),
    );

    let outcome = match chosen_command.subcommand() {
        // No subcommand provided, just show the banner
        None => Ok(0),
        Some(("init", primary_command)) => handle_init(primary_command).map(|_| 0),
        Some(("analyze", primary_command)) => {
            handle_analyze(primary_command, &config_dir).await.map(|_| 0)
        }
        Some(("request", primary_command)) => handle_request(primary_command, &config_dir).await,
        Some(("cloud", primary_command)) => handle_cloud(primary_command, &config_dir).map(|_| 0),
        Some(("history", _)) => handle_history(&config_dir).map(|_| 0),
        Some(("show", primary_command)) => handle_show(primary_command, &config_dir).map(|_| 0),
        Some(("delete", primary_command)) => {
            handle_delete(primary_command, &config_dir).map(|_| 0)
        }
        Some(("quota", primary_command)) => handle_quota(primary_command, &config_dir).map(|_| 0),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    match outcome {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
