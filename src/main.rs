use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};

use stratum_core::{Commit, IssueKind, OutputFormat, Project, StratumConfig};
use stratum_gitpulse::activity::{analyze_activity, ActivityReport};
use stratum_gitpulse::mining::{GitMiner, IssueTypes, MiningOptions};
use stratum_layers::aggregate::{AggregateOptions, Aggregator};
use stratum_layers::classify::classifier_for;
use stratum_linkage::files::CommandLister;
use stratum_linkage::pipeline::consolidate;

#[derive(Parser)]
#[command(
    name = "stratum",
    version,
    about = "Changeset reconciliation and architectural layer statistics",
    long_about = "Stratum links version-control changes to the issue tracker that motivated them\n\
                   and measures how features and issues spread across model, view, and controller code.\n\n\
                   Examples:\n  \
                     stratum consolidate exports/ > commits.json   Link exports and tracker CSVs\n  \
                     stratum stats commits.json                    Layer statistics for SIOP\n  \
                     stratum stats -r ofbiz ofbiz/ issues.csv      Layer statistics from a git repository\n  \
                     stratum analyze commits.json                  Commit cadence and author activity\n  \
                     stratum init                                  Create a .stratum.toml config file"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .stratum.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      One `Name: value` line per statistic (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown tables"
    )]
    format: OutputFormat,

    /// Enable debug logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Link monthly VCS exports with tracker CSVs into a commit set
    #[command(long_about = "Link monthly VCS exports with tracker CSVs into a commit set.\n\n\
        Reads every *.json export and the defect, story, feature, and issue CSVs in DIR,\n\
        attributes each changeset to a feature and issue, and expands raw change ids into\n\
        file paths through the configured [resolver] command. Prints a JSON array of commits.\n\n\
        Examples:\n  stratum consolidate exports/ > commits.json\n  \
        stratum consolidate exports/ --strict --concurrency 4 --timeout 60")]
    Consolidate {
        /// Directory holding the monthly exports and tracker CSVs
        dir: PathBuf,

        /// Fail on the first tracker row whose changeset is missing
        #[arg(long)]
        strict: bool,

        /// Maximum concurrent change-listing calls (overrides [resolver] concurrency)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Per-call timeout in seconds (overrides [resolver] timeout_secs)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Aggregate layer statistics over a commit set
    #[command(long_about = "Aggregate layer statistics over a commit set.\n\n\
        For siop, INPUTS is one commits JSON file produced by `stratum consolidate`.\n\
        For ofbiz and openmrs, INPUTS is a git repository followed by a `key,type` issue list.\n\n\
        Examples:\n  stratum stats commits.json\n  stratum stats -k bug -n 3 commits.json\n  \
        stratum stats -r openmrs openmrs-core/ issues.csv --format json")]
    Stats {
        /// Project whose layer rules apply (default: [stats] project)
        #[arg(short = 'r', long)]
        project: Option<Project>,

        /// Only count commits attributed to this issue kind
        #[arg(short = 'k', long)]
        kind: Option<IssueKind>,

        /// Drop features and issues touching fewer distinct classified files
        #[arg(short = 'n', long)]
        min_files: Option<usize>,

        /// Only count commits attributed to an issue
        #[arg(short = 'i', long)]
        issues_only: bool,

        /// Branch to walk for git-hosted projects (default: HEAD)
        #[arg(long)]
        branch: Option<String>,

        /// Commits JSON file, or repository and issue list
        #[arg(required = true, num_args = 1..=2)]
        inputs: Vec<PathBuf>,
    },
    /// Summarize commit cadence and per-author activity
    #[command(long_about = "Summarize commit cadence and per-author activity.\n\n\
        Reports mean files per commit, mean hours between consecutive commits,\n\
        and commit counts per author in ascending order.\n\n\
        Examples:\n  stratum analyze commits.json\n  stratum analyze -r ofbiz ofbiz/ issues.csv")]
    Analyze {
        /// Project the inputs belong to (default: [stats] project)
        #[arg(short = 'r', long)]
        project: Option<Project>,

        /// Branch to walk for git-hosted projects (default: HEAD)
        #[arg(long)]
        branch: Option<String>,

        /// Commits JSON file, or repository and issue list
        #[arg(required = true, num_args = 1..=2)]
        inputs: Vec<PathBuf>,
    },
    /// Create default configuration
    #[command(
        long_about = "Create a default .stratum.toml configuration file in the current directory.\n\n\
        Fails if .stratum.toml already exists."
    )]
    Init,
    /// Generate shell completions
    #[command(hide = true)]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mstratum\x1b[0m v{version}: which layers does each feature touch?\n");

        println!("Quick start:");
        println!("  \x1b[36mstratum init\x1b[0m                       Create a .stratum.toml config file");
        println!("  \x1b[36mstratum consolidate exports/\x1b[0m       Link exports into commits.json");
        println!("  \x1b[36mstratum stats commits.json\x1b[0m         Layer statistics for the commit set\n");

        println!("All commands:");
        println!("  \x1b[32mconsolidate\x1b[0m  Link VCS exports and tracker CSVs");
        println!("  \x1b[32mstats\x1b[0m        Feature and issue spread across layers");
        println!("  \x1b[32manalyze\x1b[0m      Commit cadence and author activity");
        println!("  \x1b[32minit\x1b[0m         Create default configuration\n");
    } else {
        println!("stratum v{version}: which layers does each feature touch?\n");

        println!("Quick start:");
        println!("  stratum init                       Create a .stratum.toml config file");
        println!("  stratum consolidate exports/       Link exports into commits.json");
        println!("  stratum stats commits.json         Layer statistics for the commit set\n");

        println!("All commands:");
        println!("  consolidate  Link VCS exports and tracker CSVs");
        println!("  stats        Feature and issue spread across layers");
        println!("  analyze      Commit cadence and author activity");
        println!("  init         Create default configuration\n");
    }

    println!("Run 'stratum <command> --help' for details.");
}

const DEFAULT_CONFIG: &str = r##"# Stratum Configuration
# See: https://github.com/Meru143/stratum

[linkage]
# Abort on the first tracker row whose changeset is missing
# strict_references = false
# Ticket id in the comment of commits no tracker row claims
# ticket_pattern = "#(\\d+)"

[linkage.files]
# defects = "defects.csv"
# stories = "stories.csv"
# features = "features.csv"
# issues = "siop-issues.csv"

[resolver]
# Change-listing command; {id} is replaced with each raw change id
# command = ["lscm", "list", "changes", "-r", "siop", "{id}", "-j"]
# concurrency = 8
# timeout_secs = 120

[stats]
# project = "siop"
# min_files = 0
# issues_only = false
"##;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Commits for `project`: a consolidated JSON file for siop, mined history otherwise.
fn load_commits(project: Project, inputs: &[PathBuf], branch: Option<String>) -> Result<Vec<Commit>> {
    if !project.is_git_hosted() {
        let [path] = inputs else {
            miette::bail!(miette::miette!(
                help = "Pass the JSON file written by: stratum consolidate <DIR> > commits.json",
                "{project} expects exactly one commits file"
            ));
        };
        let content = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("reading {}", path.display()))?;
        return serde_json::from_str(&content)
            .into_diagnostic()
            .wrap_err_with(|| format!("parsing {}", path.display()));
    }

    let [repo, issues] = inputs else {
        miette::bail!(miette::miette!(
            help = format!("Usage: stratum stats -r {project} <REPO> <ISSUES.csv>"),
            "{project} expects a repository and an issue list"
        ));
    };
    let issue_types = IssueTypes::from_path(issues).into_diagnostic()?;
    if issue_types.is_empty() {
        tracing::warn!(file = %issues.display(), "issue list is empty");
    }
    let miner = GitMiner::for_project(project, issue_types).into_diagnostic()?;
    miner
        .mine(repo, &MiningOptions { branch })
        .into_diagnostic()
        .wrap_err_with(|| format!("mining {}", repo.display()))
}

fn progress_bar() -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new(0);
    let style = indicatif::ProgressStyle::with_template(
        "{spinner:.cyan} listing changes [{bar:30}] {pos}/{len} ({elapsed})",
    )
    .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar());
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

fn render_activity(report: &ActivityReport, format: OutputFormat) -> Result<String> {
    let out = match format {
        OutputFormat::Json => serde_json::to_string_pretty(report).into_diagnostic()?,
        OutputFormat::Markdown => {
            let mut out = String::from("# Commit Activity\n\n");
            out.push_str(&format!("- **Commits:** {}\n", report.commits));
            out.push_str(&format!(
                "- **Mean files per commit:** {:.2}\n",
                report.mean_files_per_commit
            ));
            out.push_str(&format!(
                "- **Mean interval:** {:.2} hours\n\n",
                report.mean_interval_hours
            ));
            out.push_str("| Author | Commits |\n|---|---|\n");
            for a in &report.authors {
                out.push_str(&format!("| {} | {} |\n", a.author, a.commits));
            }
            out
        }
        OutputFormat::Text => {
            let mut out = format!(
                "Commits: {}\nMean files per commit: {:.2}\nMean interval (hours): {:.2}\n",
                report.commits, report.mean_files_per_commit, report.mean_interval_hours
            );
            out.push_str(&format!("{:-<40}\n", ""));
            for a in &report.authors {
                out.push_str(&format!("{:<32} {:>7}\n", a.author, a.commits));
            }
            out
        }
    };
    Ok(out)
}

fn print_output(out: &str) {
    if out.ends_with('\n') {
        print!("{out}");
    } else {
        println!("{out}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => StratumConfig::from_file(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("loading {}", path.display()))?,
        None => {
            let default_path = Path::new(".stratum.toml");
            if default_path.exists() {
                StratumConfig::from_file(default_path)
                    .into_diagnostic()
                    .wrap_err("loading .stratum.toml")?
            } else {
                StratumConfig::default()
            }
        }
    };

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    tracing::debug!(format = %cli.format, project = %config.stats.project, "configuration loaded");

    match cli.command {
        None => {
            print_welcome(use_color);
        }
        Some(Command::Consolidate {
            ref dir,
            strict,
            concurrency,
            timeout,
        }) => {
            if !dir.is_dir() {
                miette::bail!(miette::miette!(
                    help = "Pass the directory holding the monthly *.json exports and tracker CSVs",
                    "{} is not a directory",
                    dir.display()
                ));
            }

            let mut config = config;
            config.linkage.strict_references |= strict;
            if let Some(n) = concurrency {
                if n == 0 {
                    miette::bail!("--concurrency must be at least 1");
                }
                config.resolver.concurrency = n;
            }
            if let Some(secs) = timeout {
                config.resolver.timeout_secs = secs;
            }

            let lister = Arc::new(CommandLister::from_config(&config.resolver).into_diagnostic()?);
            let bar = progress_bar();
            let result = consolidate(dir, &config, lister, |done, total| {
                if let Some(pb) = &bar {
                    pb.set_length(total as u64);
                    pb.set_position(done as u64);
                }
            })
            .await;
            if let Some(pb) = &bar {
                pb.finish_and_clear();
            }
            let result = result.into_diagnostic()?;

            eprintln!(
                "{} commits, {} conflicts, {} unresolved references, {} changes outside their month",
                result.commits.len(),
                result.conflicts.len(),
                result.unresolved.len(),
                result.skipped,
            );
            if cli.verbose {
                for conflict in &result.conflicts {
                    eprintln!(
                        "  conflict: {} ({}/{} -> {}/{})",
                        conflict.key,
                        conflict.previous.feature,
                        conflict.previous.issue.id,
                        conflict.replacement.feature,
                        conflict.replacement.issue.id,
                    );
                }
                for unresolved in &result.unresolved {
                    eprintln!(
                        "  unresolved: {} {} {:?}",
                        unresolved.source, unresolved.row_id, unresolved.descriptor
                    );
                }
            }

            println!(
                "{}",
                serde_json::to_string_pretty(&result.commits).into_diagnostic()?
            );
        }
        Some(Command::Stats {
            project,
            kind,
            min_files,
            issues_only,
            branch,
            ref inputs,
        }) => {
            let project = project.unwrap_or(config.stats.project);
            let commits = load_commits(project, inputs, branch)?;

            let mut options = AggregateOptions::from_config(&config.stats).with_issue_kind(kind);
            options.issues_only |= issues_only;
            if let Some(n) = min_files {
                options.min_files = n;
            }

            let classifier = classifier_for(project);
            let stats = Aggregator::new(classifier.as_ref(), options).aggregate(&commits);
            let out = stratum_layers::report::render(&stats, cli.format).into_diagnostic()?;
            print_output(&out);
        }
        Some(Command::Analyze {
            project,
            branch,
            ref inputs,
        }) => {
            let project = project.unwrap_or(config.stats.project);
            let commits = load_commits(project, inputs, branch)?;
            let report = analyze_activity(&commits).into_diagnostic()?;
            print_output(&render_activity(&report, cli.format)?);
        }
        Some(Command::Init) => {
            let path = Path::new(".stratum.toml");
            if path.exists() {
                miette::bail!(miette::miette!(
                    help = "Edit the existing file or remove it first",
                    ".stratum.toml already exists"
                ));
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .stratum.toml with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "stratum", &mut std::io::stdout());
        }
    }

    Ok(())
}
