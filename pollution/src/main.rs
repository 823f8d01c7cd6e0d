//! Find the test that pollutes shared state and breaks another test.

use clap::{Arg, ArgAction, ArgGroup, Command};
use commonware_pollution::{
    bisect,
    config::Config,
    engine::command,
    format::{self, format_command},
    fuzz, interruptible, load_tests, testid, Source, TestId,
};
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, info};

/// Returns the version of the crate.
pub const fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Flag for verbose output
const VERBOSE_FLAG: &str = "verbose";

/// Flag for fuzz mode
const FUZZ_FLAG: &str = "fuzz";

/// Flag for the configuration file
const CONFIG_FLAG: &str = "config";

/// Flag overriding the shuffle seed
const SEED_FLAG: &str = "seed";

/// Arguments passed through to the test engine
const ENGINE_ARGS: &str = "engine-args";

/// Resolves once the process is asked to stop (never, if the handler cannot be installed).
async fn shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error=?e, "failed to listen for interrupts");
        std::future::pending::<()>().await;
    }
}

/// Entrypoint for the detect-test-pollution CLI
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Define application
    let matches = Command::new(format::PROGRAM)
        .version(crate_version())
        .about("Find the test that pollutes shared state and breaks another test.")
        .arg(
            Arg::new(VERBOSE_FLAG)
                .short('v')
                .long(VERBOSE_FLAG)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(FUZZ_FLAG)
                .long(FUZZ_FLAG)
                .help("Repeatedly shuffle the test suite searching for failures")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(format::FAILING_TEST_FLAG)
                .long(format::FAILING_TEST_FLAG)
                .help("Identifier of the failing test (e.g. `tests/my_test.py::test_name_here`)")
                .value_parser(clap::value_parser!(String)),
        )
        .group(
            ArgGroup::new("mode")
                .args([FUZZ_FLAG, format::FAILING_TEST_FLAG])
                .required(true),
        )
        .arg(
            Arg::new(format::TESTS_FLAG)
                .long(format::TESTS_FLAG)
                .help("Where tests will be discovered from (often `tests/`)")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new(format::TESTIDS_FILE_FLAG)
                .long(format::TESTIDS_FILE_FLAG)
                .help("Pre-discovered test identifiers (one per line)")
                .value_parser(clap::value_parser!(String)),
        )
        .group(
            ArgGroup::new("source")
                .args([format::TESTS_FLAG, format::TESTIDS_FILE_FLAG])
                .required(true),
        )
        .arg(
            Arg::new(CONFIG_FLAG)
                .long(CONFIG_FLAG)
                .help("Path to YAML config file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(SEED_FLAG)
                .long(SEED_FLAG)
                .help("Seed used to shuffle the test suite while fuzzing")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ENGINE_ARGS)
                .help("Extra arguments passed to every invocation of the test engine")
                .num_args(0..)
                .last(true)
                .allow_hyphen_values(true)
                .value_parser(clap::value_parser!(String)),
        )
        .get_matches();

    // Create logger
    let level = if matches.get_flag(VERBOSE_FLAG) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = match matches.get_one::<PathBuf>(CONFIG_FLAG) {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!(error=?e, path=?path, "failed to load config");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };
    if let Some(seed) = matches.get_one::<u64>(SEED_FLAG) {
        config.seed = *seed;
    }

    // Parse test source (paths must be UTF-8 to be rendered back into a command)
    let source = match Source::from_args(
        matches.get_one::<String>(format::TESTS_FLAG).map(String::as_str),
        matches.get_one::<String>(format::TESTIDS_FILE_FLAG).map(String::as_str),
    ) {
        Ok(source) => source,
        Err(e) => {
            error!(error=?e, "invalid arguments");
            return ExitCode::FAILURE;
        }
    };
    let extra = matches
        .get_many::<String>(ENGINE_ARGS)
        .map(|args| args.cloned().collect())
        .unwrap_or_default();
    let engine = command::Command::new(config.engine.clone(), extra);

    // Discover all tests
    let tests = match load_tests(&engine, &source).await {
        Ok(tests) => tests,
        Err(e) => {
            error!(error=?e, "failed to load tests");
            return ExitCode::FAILURE;
        }
    };
    let scope = testid::common_path(&tests);

    // Search
    if matches.get_flag(FUZZ_FLAG) {
        let result = interruptible(
            fuzz::search(&engine, &scope, &tests, &config),
            shutdown(),
        )
        .await;
        match result {
            Ok(pollution) => {
                let cmd = format_command(&pollution.target, &source);
                info!(test = %pollution.target, attempts = pollution.attempts, "found failing test");
                println!("try `{cmd}`!");
            }
            Err(e) => {
                error!(error=?e, "failed to find a failing test");
            }
        }
        // Fuzzing never identifies a culprit by itself
        return ExitCode::FAILURE;
    }

    let Some(target) = matches.get_one::<String>(format::FAILING_TEST_FLAG) else {
        error!("no failing test provided");
        return ExitCode::FAILURE;
    };
    let target = TestId::from(target.as_str());
    let result = interruptible(
        bisect::find_culprit(&engine, &scope, &target, &tests),
        shutdown(),
    )
    .await;
    match result {
        Ok(bisection) => {
            println!("the polluting test is: {}", bisection.culprit);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error=?e, test = %target, "failed to find polluting test");
            ExitCode::FAILURE
        }
    }
}
