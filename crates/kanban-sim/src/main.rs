use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use kanban_sync::harness::{run_scenarios, ScenarioConfig, ScenarioKind};
use kanban_sync::SyncConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const SCENARIO_NAMES: [&str; 5] = [
    "optimistic-toggle",
    "failed-toggle",
    "delete-invalidates",
    "board-switch",
    "rapid-toggles",
];

fn scenario_by_name(name: &str) -> Option<ScenarioKind> {
    SCENARIO_NAMES
        .iter()
        .position(|candidate| *candidate == name)
        .map(|index| ScenarioKind::ALL[index])
}

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file")
}

fn cli() -> Command {
    Command::new("kanban-sim")
        .version(kanban_sync::VERSION)
        .about("Kanban Sync scenario simulator")
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Replay reference flows against an in-memory board server")
                .arg(config_arg())
                .arg(
                    Arg::new("latency-ms")
                        .long("latency-ms")
                        .default_value("50")
                        .value_parser(value_parser!(u64))
                        .help("Latency of every remote call"),
                )
                .arg(
                    Arg::new("toggles")
                        .long("toggles")
                        .default_value("5")
                        .value_parser(value_parser!(u32))
                        .help("Toggles fired at one subtask in the rapid-toggle flow"),
                )
                .arg(
                    Arg::new("ttl-ms")
                        .long("ttl-ms")
                        .value_parser(value_parser!(u64))
                        .help("Notification display time, overrides the config file"),
                )
                .arg(
                    Arg::new("scenario")
                        .long("scenario")
                        .action(ArgAction::Append)
                        .value_parser(SCENARIO_NAMES)
                        .help("Run only this flow (repeatable)"),
                ),
        )
        .subcommand(Command::new("scenarios").about("List the reference flows"))
        .subcommand(
            Command::new("config")
                .about("Print the effective configuration")
                .arg(config_arg()),
        )
}

fn load_config(args: &ArgMatches) -> anyhow::Result<SyncConfig> {
    match args.get_one::<PathBuf>("config") {
        Some(path) => SyncConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(SyncConfig::default()),
    }
}

fn init_tracing(config: &SyncConfig, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("invalid log filter")?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("installing subscriber: {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    let json_logs = matches.get_flag("json-logs");

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let mut sync = load_config(args)?;
            if let Some(ttl) = args.get_one::<u64>("ttl-ms") {
                sync = sync.with_notification_ttl(Duration::from_millis(*ttl));
            }
            sync.validate()?;
            init_tracing(&sync, json_logs)?;

            let latency = args.get_one::<u64>("latency-ms").copied().unwrap_or(50);
            let rapid_toggles = args.get_one::<u32>("toggles").copied().unwrap_or(5);
            let kinds: Vec<ScenarioKind> = match args.get_many::<String>("scenario") {
                Some(names) => names.filter_map(|name| scenario_by_name(name)).collect(),
                None => ScenarioKind::ALL.to_vec(),
            };

            let config = ScenarioConfig {
                latency: Duration::from_millis(latency),
                rapid_toggles,
                sync,
            };
            tracing::info!(scenarios = kinds.len(), latency_ms = latency, "running scenarios");

            let report = run_scenarios(config, &kinds).await;
            println!("{}", report.generate_text());

            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("scenarios", _)) => {
            for (name, kind) in SCENARIO_NAMES.iter().zip(ScenarioKind::ALL) {
                println!("{name:<20} {kind}");
            }
        }
        Some(("config", args)) => {
            let config = load_config(args)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        _ => {
            cli().print_help()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn scenario_names_cover_every_flow() {
        let kinds: Vec<_> = SCENARIO_NAMES
            .iter()
            .filter_map(|name| scenario_by_name(name))
            .collect();
        assert_eq!(kinds, ScenarioKind::ALL.to_vec());
        assert_eq!(scenario_by_name("unknown"), None);
    }

    #[test]
    fn simulate_parses_repeated_scenarios() {
        let matches = cli()
            .try_get_matches_from([
                "kanban-sim",
                "simulate",
                "--scenario",
                "board-switch",
                "--scenario",
                "rapid-toggles",
                "--toggles",
                "7",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        let names: Vec<&String> = args.get_many::<String>("scenario").unwrap().collect();
        assert_eq!(names, ["board-switch", "rapid-toggles"]);
        assert_eq!(args.get_one::<u32>("toggles"), Some(&7));
    }
}
