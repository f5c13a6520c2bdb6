use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;

const DEFAULT_DATA_DIR: &str = "~/.config/sitegraph/";
const DEFAULT_PROJECT: &str = "default";

fn project_arg() -> clap::Arg {
    arg!(-p --"project" <NAME>)
        .required(false)
        .help("Project the snapshots belong to")
        .default_value(DEFAULT_PROJECT)
}

fn data_dir_arg() -> clap::Arg {
    arg!(--"data-dir" <PATH>)
        .required(false)
        .help("Directory holding the sitegraph database")
        .default_value(DEFAULT_DATA_DIR)
}

fn output_arg() -> clap::Arg {
    arg!(-o --"output" <PATH>)
        .required(false)
        .help("Write to a file instead of the screen")
        .value_parser(clap::value_parser!(PathBuf))
}

fn report_format_arg() -> clap::Arg {
    arg!(-f --"format" <FORMAT>)
        .required(false)
        .help("Report format: text, json")
        .value_parser(["text", "json"])
        .default_value("text")
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitegraph")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitegraph")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Increase log verbosity (-v info, -vv debug)")
                .required(false)
                .action(clap::ArgAction::Count)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the sitegraph database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the sitegraph database")
                        .default_value(DEFAULT_DATA_DIR),
                )
                .arg(
                    arg!(-f - -"force")
                        .help("Overwrite any existing database at the specified location.")
                        .required(false),
                ),
        )
        .subcommand(
            command!("analyze")
                .about(
                    "Build the link graph from crawl data, compute metrics and issues, and \
                store a snapshot.",
                )
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(true)
                        .help("Crawl data JSON produced by the crawler")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Analysis configuration JSON (thresholds, equity iterations)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(project_arg())
                .arg(data_dir_arg())
                .arg(
                    arg!(--"no-snapshot")
                        .required(false)
                        .help("Report only; do not store a snapshot")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(report_format_arg())
                .arg(output_arg())
                .arg(
                    arg!(--"include-sitemap")
                        .required(false)
                        .help("Include a page list in the text report")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("export")
                .about("Export a stored snapshot as SVG, Mermaid, sitemap XML/HTML or PDF data")
                .arg(
                    arg!(-F --"format" <FORMAT>)
                        .required(true)
                        .help("Export format")
                        .value_parser([
                            "svg",
                            "mermaid",
                            "sitemap-xml",
                            "sitemap-html",
                            "pdf-data",
                        ]),
                )
                .arg(
                    arg!(--"options" <PATH>)
                        .required(false)
                        .help("JSON file with options for the chosen format")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-s --"snapshot" <ID>)
                        .required(false)
                        .help("Snapshot to export (default: latest for the project)"),
                )
                .arg(project_arg())
                .arg(data_dir_arg())
                .arg(
                    arg!(--"exclude-errors")
                        .required(false)
                        .help("Leave out failed pages and broken links")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"exclude-external")
                        .required(false)
                        .help("Leave out links to other sites")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-cache")
                        .required(false)
                        .help("Render even if a cached export exists")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(output_arg()),
        )
        .subcommand(
            command!("snapshot")
                .about("Inspect stored snapshots")
                .subcommand_required(true)
                .subcommand(
                    command!("list")
                        .about("List the snapshots of a project")
                        .arg(project_arg())
                        .arg(data_dir_arg()),
                )
                .subcommand(
                    command!("show")
                        .about("Show the metadata of a snapshot")
                        .arg(arg!(<ID>).required(true).help("Snapshot id"))
                        .arg(data_dir_arg()),
                ),
        )
        .subcommand(
            command!("diff")
                .about("Compare two snapshots (default: the two most recent of the project)")
                .arg(arg!(--"base" <ID>).required(false).help("Older snapshot"))
                .arg(arg!(--"target" <ID>).required(false).help("Newer snapshot"))
                .arg(project_arg())
                .arg(data_dir_arg())
                .arg(report_format_arg())
                .arg(output_arg()),
        )
        .subcommand(
            command!("issues")
                .about("List and resolve issues")
                .subcommand_required(true)
                .subcommand(
                    command!("list")
                        .about("List issues of the latest snapshot")
                        .arg(project_arg())
                        .arg(data_dir_arg())
                        .arg(
                            arg!(--"all")
                                .required(false)
                                .help("Include resolved issues")
                                .action(clap::ArgAction::SetTrue),
                        ),
                )
                .subcommand(
                    command!("resolve")
                        .about("Mark an issue resolved; it stays resolved in later analyses")
                        .arg(
                            arg!(<FINGERPRINT>)
                                .required(true)
                                .help("Issue fingerprint as shown by `issues list`"),
                        )
                        .arg(project_arg())
                        .arg(data_dir_arg()),
                ),
        )
}
