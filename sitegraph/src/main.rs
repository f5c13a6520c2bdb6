use colored::Colorize;
use commands::command_argument_builder;
use sitegraph::handlers::{
    handle_analyze, handle_diff, handle_export, handle_init, handle_issues_list,
    handle_issues_resolve, handle_snapshot_list, handle_snapshot_show,
};
use sitegraph_core::print_banner;
use tracing::Level;

mod commands;

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    init_logging(chosen_command.get_count("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        None => return,
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("analyze", primary_command)) => handle_analyze(primary_command),
        Some(("export", primary_command)) => handle_export(primary_command),
        Some(("snapshot", primary_command)) => match primary_command.subcommand() {
            Some(("list", secondary_command)) => handle_snapshot_list(secondary_command),
            Some(("show", secondary_command)) => handle_snapshot_show(secondary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        Some(("diff", primary_command)) => handle_diff(primary_command),
        Some(("issues", primary_command)) => match primary_command.subcommand() {
            Some(("list", secondary_command)) => handle_issues_list(secondary_command),
            Some(("resolve", secondary_command)) => handle_issues_resolve(secondary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
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
