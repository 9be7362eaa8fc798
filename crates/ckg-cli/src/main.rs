use std::path::PathBuf;

use anyhow::{Context, Result};
use ckg_case::{count_negative, CaseSet};
use ckg_core::prelude::*;
use ckg_retrieval::{Evidence, Tier};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod settings;

use settings::Settings;

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .short('c')
        .default_value("ckg.json")
        .value_parser(value_parser!(PathBuf))
        .help("Settings file (JSON, or TOML by extension)")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

fn cli() -> Command {
    Command::new("ckg")
        .version(ckg_core::VERSION)
        .about("Synthesize static-analysis checkers from labeled test cases")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("info")
                .help("Log filter used when RUST_LOG is unset"),
        )
        .subcommand(
            Command::new("synthesize")
                .about("Bootstrap and augment a checker until every case passes")
                .arg(config_arg())
                .arg(json_arg())
                .arg(
                    Arg::new("max-rounds")
                        .long("max-rounds")
                        .value_parser(value_parser!(u32))
                        .help("Override the outer round budget per anchor"),
                )
                .arg(
                    Arg::new("report")
                        .long("report")
                        .value_parser(value_parser!(PathBuf))
                        .help("Also write the run report as JSON to this file"),
                ),
        )
        .subcommand(
            Command::new("steps")
                .about("Decompose one case into checking steps and show retrieved evidence")
                .arg(config_arg())
                .arg(json_arg())
                .arg(
                    Arg::new("case")
                        .long("case")
                        .required(true)
                        .help("Case description (id)"),
                ),
        )
        .subcommand(
            Command::new("retrieve")
                .about("Resolve a single checking step against the catalogs")
                .arg(config_arg())
                .arg(json_arg())
                .arg(Arg::new("step").required(true).help("Natural-language step"))
                .arg(
                    Arg::new("kind")
                        .long("kind")
                        .action(ArgAction::Append)
                        .help("AST node kind whose API class may be searched"),
                ),
        )
        .subcommand(
            Command::new("cases")
                .about("List the rule's cases")
                .arg(config_arg())
                .arg(json_arg()),
        )
}

fn init_tracing(matches: &ArgMatches) {
    let level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if matches.get_flag("log-json") {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_settings(args: &ArgMatches) -> Result<Settings> {
    let path = args
        .get_one::<PathBuf>("config")
        .context("missing --config")?;
    Settings::load(path)
}

fn load_cases(rule: &Rule) -> Result<CaseSet> {
    CaseSet::load(&rule.case_set_path)
        .with_context(|| format!("failed to load cases {}", rule.case_set_path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn synthesize(args: &ArgMatches) -> Result<bool> {
    let mut settings = load_settings(args)?;
    if let Some(rounds) = args.get_one::<u32>("max-rounds") {
        settings.synthesis = settings.synthesis.with_max_outer_rounds(*rounds);
    }
    let mut rule = settings.rule()?;
    let cases = load_cases(&rule)?;
    let caps = settings.capabilities(&rule)?;
    let controller = SynthesisController::new(settings.synthesis.clone(), caps, settings.retrieval()?);
    let mut driver = AugmentationDriver::new(controller);

    let report = driver
        .run(&mut rule, &cases)
        .await
        .with_context(|| format!("synthesis of '{}' failed", rule.name))?;

    if let Some(path) = args.get_one::<PathBuf>("report") {
        let text = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write report {}", path.display()))?;
    }

    if args.get_flag("json") {
        print_json(&report)?;
    } else {
        print_report(&report, &rule);
    }
    Ok(report.outcome != RunOutcome::BootstrapFailed)
}

fn print_report(report: &RunReport, rule: &Rule) {
    println!("Run {} for {}", report.run_id, report.rule);
    println!("  Outcome: {:?}", report.outcome);
    println!("  Accepted checkers: {}", report.history.len());
    if let Some(last) = report.final_artifact() {
        println!(
            "  Passed cases: {} (checker {})",
            last.passed_cases.len(),
            last.digest.short()
        );
        println!("  Checker: {}", rule.checker_path.display());
    }
    if !report.skipped.is_empty() {
        let skipped: Vec<&str> = report.skipped.iter().map(|id| id.as_str()).collect();
        println!("  Skipped: {}", skipped.join(", "));
    }
    let stats = &report.stats;
    println!(
        "  Oracle calls: {} ({} rejected, {} failed)",
        stats.oracle_calls, stats.rejected_responses, stats.oracle_failures
    );
    println!(
        "  Failures: {} syntax, {} compile, {} test; {} repairs",
        stats.syntax_failures, stats.compile_failures, stats.test_failures, stats.repairs
    );
    println!(
        "  Tokens: {} prompt, {} completion",
        stats.prompt_tokens, stats.completion_tokens
    );
    println!("  Elapsed: {:.1}s", report.elapsed.as_secs_f64());
}

async fn steps(args: &ArgMatches) -> Result<()> {
    let settings = load_settings(args)?;
    let rule = settings.rule()?;
    let cases = load_cases(&rule)?;
    let id = args.get_one::<String>("case").context("missing --case")?;
    let case = cases
        .get(id)
        .with_context(|| format!("no case '{}' in {}", id, rule.case_set_path.display()))?;

    let caps = settings.capabilities(&rule)?;
    let mut controller = SynthesisController::new(settings.synthesis.clone(), caps, settings.retrieval()?);
    let ast = controller.analyze_case(case).await?;
    let steps = controller.decompose(&rule.description, case).await?;
    let evidence = Evidence::gather(controller.retrieval(), &steps, &ast.node_kinds)?;

    if args.get_flag("json") {
        return print_json(&serde_json::json!({
            "case": id,
            "node_kinds": ast.node_kinds,
            "steps": steps,
            "evidence": evidence,
        }));
    }
    for (i, step) in steps.iter().enumerate() {
        println!("{}. {}", i + 1, step);
    }
    println!();
    println!("{}", evidence.render());
    if !evidence.gaps.is_empty() {
        println!("Unmatched steps: {}", evidence.gaps.len());
    }
    Ok(())
}

fn retrieve(args: &ArgMatches) -> Result<()> {
    let settings = load_settings(args)?;
    let mut index = settings.retrieval()?;
    let step = args.get_one::<String>("step").context("missing step")?;
    let kinds: Vec<String> = args
        .get_many::<String>("kind")
        .map(|k| k.cloned().collect())
        .unwrap_or_default();
    index.register_kinds(&kinds)?;
    let resolution = index.resolve(step, &kinds)?;

    if args.get_flag("json") {
        return print_json(&resolution);
    }
    match resolution.tier {
        Tier::None => println!("No match"),
        tier => {
            for hit in &resolution.hits {
                println!(
                    "[{:?} {:.3}] {}: {}",
                    tier,
                    hit.similarity,
                    hit.entry.operation_name,
                    hit.entry.implementation_fragment.trim()
                );
            }
        }
    }
    Ok(())
}

fn cases(args: &ArgMatches) -> Result<()> {
    let settings = load_settings(args)?;
    let rule = settings.rule()?;
    let cases = load_cases(&rule)?;

    if args.get_flag("json") {
        return print_json(&cases);
    }
    println!(
        "{}: {} cases ({} negative)",
        rule.name,
        cases.len(),
        count_negative(cases.cases())
    );
    for case in cases.iter() {
        let label = if case.is_negative() { "negative" } else { "positive" };
        println!("  {:<8} {}", label, case.id());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(&matches);

    match matches.subcommand() {
        Some(("synthesize", args)) => {
            let ok = synthesize(args).await?;
            if !ok {
                std::process::exit(1);
            }
        }
        Some(("steps", args)) => steps(args).await?,
        Some(("retrieve", args)) => retrieve(args)?,
        Some(("cases", args)) => cases(args)?,
        _ => unreachable!("clap enforces a subcommand"),
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
    fn retrieve_collects_kinds() {
        let matches = cli()
            .try_get_matches_from([
                "ckg", "retrieve", "check literal", "--kind", "NumericLiteral", "--kind", "FieldDeclaration",
            ])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "retrieve");
        let kinds: Vec<&String> = args.get_many::<String>("kind").unwrap().collect();
        assert_eq!(kinds.len(), 2);
        assert_eq!(
            args.get_one::<PathBuf>("config").unwrap(),
            &PathBuf::from("ckg.json")
        );
    }
}
