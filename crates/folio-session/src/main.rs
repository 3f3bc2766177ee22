use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use folio_document::DocumentKind;
use folio_session::harness::{run_scenario, ScenarioConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Command::new("folio")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Folio multi-document edit/publish engine")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("demo")
                .about("Run an edit/publish scenario against the in-memory store")
                .arg(
                    Arg::new("questions")
                        .long("questions")
                        .default_value("2")
                        .value_parser(value_parser!(usize))
                        .help("Questions seeded into the store"),
                )
                .arg(
                    Arg::new("virtuals")
                        .long("virtuals")
                        .default_value("1")
                        .value_parser(value_parser!(usize))
                        .help("Virtual question drafts created during the session"),
                )
                .arg(
                    Arg::new("edits")
                        .long("edits")
                        .default_value("1")
                        .value_parser(value_parser!(usize))
                        .help("Description edits applied to each loaded document"),
                )
                .arg(
                    Arg::new("inject-save-failure")
                        .long("inject-save-failure")
                        .action(ArgAction::SetTrue)
                        .help("Fail the first batch-save and verify the retry converges"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Validate a JSON content file against a document kind")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Path to the JSON content file"),
                )
                .arg(
                    Arg::new("kind")
                        .long("kind")
                        .default_value("question")
                        .help("Document kind to validate against"),
                ),
        );

    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("demo", args)) => {
            let existing_questions = *args.get_one::<usize>("questions").unwrap();
            let virtual_questions = *args.get_one::<usize>("virtuals").unwrap();
            let edits_per_document = *args.get_one::<usize>("edits").unwrap();
            let inject_save_failure = args.get_flag("inject-save-failure");

            println!("Running publish scenario...");
            println!("Questions: {}", existing_questions);
            println!("Virtuals: {}", virtual_questions);
            println!("Edits: {}", edits_per_document);
            println!("Inject Save Failure: {}", inject_save_failure);
            println!();

            let config = ScenarioConfig {
                existing_questions,
                virtual_questions,
                edits_per_document,
                inject_save_failure,
            };
            let report = run_scenario(config).await;

            println!("{}", report.generate_text());

            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("check", args)) => {
            let path = args.get_one::<PathBuf>("file").unwrap();
            let kind: DocumentKind = args
                .get_one::<String>("kind")
                .unwrap()
                .parse()
                .context("unsupported --kind")?;

            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let content: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?;

            match folio_schema::validate(kind, &content) {
                Ok(()) => println!("{}: valid {} content", path.display(), kind),
                Err(err) => {
                    println!("{}: {}", path.display(), err);
                    std::process::exit(1);
                }
            }
        }
        _ => {}
    }

    Ok(())
}
