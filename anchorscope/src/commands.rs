use crate::CLAP_STYLING;
use anchorscope::handlers::DEFAULT_CONFIG_DIR;
use clap::{arg, command};

fn caller_arg() -> clap::Arg {
    arg!(--"caller" <ID>)
        .required(false)
        .help("Identity the daily analysis quota is counted against")
        .default_value("cli")
}

fn format_arg() -> clap::Arg {
    arg!(-f --"format" <FORMAT>)
        .required(false)
        .help("Report format: text, json, csv, markdown")
        .value_parser(["text", "json", "csv", "markdown"])
        .default_value("text")
}

fn output_arg() -> clap::Arg {
    arg!(-o --"output" <PATH>)
        .required(false)
        .help("Save report to file (default: display to screen)")
        .value_parser(clap::value_parser!(std::path::PathBuf))
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("anchorscope")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("anchorscope")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-d --"data-dir" <PATH>)
                .required(false)
                .global(true)
                .help("Directory holding the anchorscope database")
                .default_value(DEFAULT_CONFIG_DIR),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the anchorscope database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the anchorscope database")
                        .default_value(DEFAULT_CONFIG_DIR),
                )
                .arg(
                    arg!(-f - -"force")
                        .help(
                            "Forces the overwriting of any existing database at the specified \
                        location.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            command!("analyze")
                .about(
                    "Crawl a site's pages and report how its internal links are worded. Prompts \
                when no sitemap is found or the page list needs narrowing.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The site to analyze"),
                )
                .arg(
                    arg!(--"sitemap" <URL>)
                        .required(false)
                        .help("Use this sitemap instead of looking for one")
                        .conflicts_with("urls-file"),
                )
                .arg(
                    arg!(--"urls-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of page URLs to crawl")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("sitemap"),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("The number of pages fetched concurrently.")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("8"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-page request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("15"),
                )
                .arg(caller_arg())
                .arg(
                    arg!(--"fold-case")
                        .required(false)
                        .help("Group anchor texts that differ only in case")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"keep-empty")
                        .required(false)
                        .help("Keep links with no text, labelled by their URL")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(format_arg())
                .arg(output_arg())
                .arg(
                    arg!(--"no-save")
                        .required(false)
                        .help("Do not store the analysis in the database")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-prompt")
                        .required(false)
                        .help("Fail instead of asking for a sitemap or page list")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("request")
                .about(
                    "Run one JSON analysis request and print the JSON response. The exit code \
                reflects the response status.",
                )
                .arg(
                    arg!([FILE])
                        .required(false)
                        .help("Request file, or - for stdin (default)"),
                )
                .arg(caller_arg()),
        )
        .subcommand(
            command!("cloud")
                .about("Show the anchor text word cloud for a saved analysis or JSON file")
                .arg(
                    arg!(<SOURCE>)
                        .required(true)
                        .help("Analysis id (or unique prefix), or path to a JSON result"),
                )
                .arg(
                    arg!(-m --"min-count" <N>)
                        .required(false)
                        .help("Only show anchors used at least N times")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1"),
                )
                .arg(
                    arg!(--"filter" <TEXT>)
                        .required(false)
                        .help("Only show anchors containing this text"),
                )
                .arg(
                    arg!(--"width" <PX>)
                        .required(false)
                        .help("Canvas width in pixels for --print")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("800"),
                )
                .arg(
                    arg!(--"print")
                        .required(false)
                        .help("Print the layout as JSON instead of opening the viewer")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(command!("history").about("List saved analyses"))
        .subcommand(
            command!("show")
                .about("Print the report for a saved analysis")
                .arg(
                    arg!(<ID>)
                        .required(true)
                        .help("Analysis id (or unique prefix), or path to a JSON result"),
                )
                .arg(format_arg())
                .arg(output_arg()),
        )
        .subcommand(
            command!("delete")
                .about("Delete a saved analysis")
                .arg(
                    arg!(<ID>)
                        .required(true)
                        .help("Analysis id (or unique prefix)"),
                ),
        )
        .subcommand(
            command!("quota")
                .about("Show how many analyses are left today")
                .arg(caller_arg()),
        )
}
