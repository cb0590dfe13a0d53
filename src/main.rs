use clap::Parser;

mod capture;
mod cmd;
mod config;
mod rfc;
mod utils;

use cmd::InvokeArgs;

/// invokerfm - call one SAP remote function module over RFC
///
/// Connection (one of):
///   --connection sap.cfg [--dest NAME]        INI file, section chosen by its `dest` key
///   -u USER -p PASS -t HOST -c CLIENT [-s 00] [-P PORT] [-r ROUTER]
///
/// Function:
///   -f NAME            function module to call (required)
///   -i import.json     call parameters (JSON/YAML object)
///   -e export.json     {"capture": ["PARAM", "TABLE[FIELD]"]}
///   -d                 print parameter metadata instead of calling
///
/// Global flags / env:
///   -v / -vv        Increase verbosity
///   -q / --quiet    Errors only
///   --json          Machine-readable output on stdout, logs on stderr
///   NO_COLOR        Disable ANSI colors
///
/// Examples:
///   invokerfm -u DEVELOPER -p secret -t 10.0.0.5 -c 001 -f RFC_SYSTEM_INFO
///   invokerfm --connection sap.cfg --dest DEV -f RFC_READ_TABLE -i in.json -e out.json
///   invokerfm --connection sap.cfg -f BAPI_USER_GET_DETAIL -d
///
/// Exit codes: 0 success, 1 error, 130 interrupted.
#[derive(Parser, Debug)]
#[command(
    name = "invokerfm",
    version,
    author,
    about = "invokerfm - SAP Remote Function Module Executor",
    verbatim_doc_comment
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long)]
    quiet: bool,

    /// Do not print the banner
    #[arg(long)]
    no_banner: bool,

    #[command(flatten)]
    invoke: InvokeArgs,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging; JSON mode keeps stdout for the payload
    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level, cli.invoke.json);
    log_debug!("log level: {}", level.as_str());

    if !(cli.no_banner || cli.quiet || cli.invoke.json) {
        let style = cmd::format::StyleOptions::detect();
        println!("{}", cmd::format::banner(&style));
    }

    let outcome = cmd::execute_invoke(cli.invoke);
    std::process::exit(outcome.exit_code());
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
