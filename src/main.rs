use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rewrite_kit::config::{builtin, builtin_names, load_tool_from_path, RuleConfig};
use rewrite_kit::{
    run_check, run_rewrite, AtomicWriter, Check, CheckReport, Codemod, ExtensionFilter,
    RunOptions, RunReport, Tool, ToolKind, EXIT_CLEAN,
};
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser)]
#[command(name = "rewrite-kit")]
#[command(about = "Pattern-driven codemods and line checks", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report `use crate::` imports that reach through more than two modules
    DeepImports(ScanArgs),

    /// Remove the generated-file banner from the top of files
    StripHeader {
        #[command(flatten)]
        args: RewriteArgs,

        /// Read the banner to remove from this file instead of the built-in one
        #[arg(long)]
        header_file: Option<PathBuf>,
    },

    /// Replace hard-coded PAGE_SIZE/PAGE_SHIFT/PAGE_MASK with PageUtil equivalents
    PageConstants(RewriteArgs),

    /// Replace the hard-coded MAX_ARRAY_LENGTH with PageUtil::MAX_ARRAY_LENGTH
    ArrayLength(RewriteArgs),

    /// Run a rule file (check or rewrite, depending on its contents)
    Run {
        /// Path to the TOML rule file
        #[arg(short, long)]
        rules: PathBuf,

        #[command(flatten)]
        args: RewriteArgs,
    },

    /// List built-in tools
    List,
}

#[derive(Args)]
struct ScanArgs {
    /// Files or directories to process
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Only process files with these extensions, comma-separated or repeated
    /// (defaults depend on the tool)
    #[arg(short, long, value_delimiter = ',', action = clap::ArgAction::Append)]
    extensions: Option<Vec<String>>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct RewriteArgs {
    #[command(flatten)]
    scan: ScanArgs,

    /// Dry run - show what would be changed without modifying files
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show unified diff of changes
    #[arg(short, long)]
    diff: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let code = match cli.command {
        Commands::DeepImports(args) => {
            let tool = builtin_tool("deep-imports", |_| Ok(()))?;
            cmd_tool(&tool, args, false, false)?
        }
        Commands::StripHeader { args, header_file } => {
            let tool = builtin_tool("strip-header", |config| {
                if let (Some(path), Some(header)) = (&header_file, config.header.as_mut()) {
                    header.text = fs::read_to_string(path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                }
                Ok(())
            })?;
            cmd_tool(&tool, args.scan, args.dry_run, args.diff)?
        }
        Commands::PageConstants(args) => {
            let tool = builtin_tool("page-constants", |_| Ok(()))?;
            cmd_tool(&tool, args.scan, args.dry_run, args.diff)?
        }
        Commands::ArrayLength(args) => {
            let tool = builtin_tool("array-length", |_| Ok(()))?;
            cmd_tool(&tool, args.scan, args.dry_run, args.diff)?
        }
        Commands::Run { rules, args } => {
            let tool = load_tool_from_path(&rules)?;
            cmd_tool(&tool, args.scan, args.dry_run, args.diff)?
        }
        Commands::List => cmd_list()?,
    };

    if code != EXIT_CLEAN {
        std::process::exit(code);
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Helper: Load a built-in tool, letting the caller adjust its config first.
fn builtin_tool(
    name: &str,
    adjust: impl FnOnce(&mut RuleConfig) -> Result<()>,
) -> Result<Tool> {
    let mut config = builtin(name)
        .ok_or_else(|| anyhow::anyhow!("unknown built-in tool: {name}"))??;
    adjust(&mut config)?;
    config.validate()?;
    Ok(Tool::from_config(&config)?)
}

fn cmd_tool(tool: &Tool, scan: ScanArgs, dry_run: bool, show_diff: bool) -> Result<i32> {
    let extensions = match &scan.extensions {
        Some(list) => ExtensionFilter::new(list),
        None => ExtensionFilter::new(&tool.meta.extensions),
    };
    let options = RunOptions::new(scan.paths)
        .extensions(extensions)
        .dry_run(dry_run);

    match &tool.kind {
        ToolKind::Check(check) => cmd_check(check, &options, scan.json),
        ToolKind::Rewrite(codemod) => cmd_rewrite(codemod, &options, scan.json, show_diff),
    }
}

fn cmd_check(check: &Check, options: &RunOptions, json: bool) -> Result<i32> {
    let report = run_check(check, options);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report.exit_code());
    }

    print_skipped(&report.skipped);
    for finding in &report.findings {
        println!(
            "{}:{}: {}",
            finding.file.display(),
            finding.line,
            finding.text
        );
    }
    if !report.findings.is_empty() {
        eprintln!("{} {}", "hint:".yellow().bold(), report.hint);
    }
    print_check_summary(&report);

    Ok(report.exit_code())
}

fn cmd_rewrite(
    codemod: &Codemod,
    options: &RunOptions,
    json: bool,
    show_diff: bool,
) -> Result<i32> {
    let report = run_rewrite(codemod, options, &AtomicWriter);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report.exit_code());
    }

    print_skipped(&report.skipped);
    for change in &report.changed {
        for record in &change.records {
            println!("{record}");
        }
        if show_diff {
            display_diff(&change.file, &change.before, &change.after);
        }
    }
    for failure in &report.failed {
        eprintln!(
            "{} {}: {}",
            "✗".red(),
            failure.path.display(),
            failure.reason
        );
    }
    print_rewrite_summary(&report);

    Ok(report.exit_code())
}

fn cmd_list() -> Result<i32> {
    for name in builtin_names() {
        let tool = builtin_tool(name, |_| Ok(()))?;
        let extensions = if tool.meta.extensions.is_empty() {
            "*".to_string()
        } else {
            tool.meta.extensions.join(",")
        };
        println!(
            "{:<16} {:<8} [{}] {}",
            name.bold(),
            tool.mode().cyan(),
            extensions,
            tool.meta.description.as_deref().unwrap_or_default().dimmed()
        );
    }
    Ok(EXIT_CLEAN)
}

fn print_skipped(skipped: &[rewrite_kit::Diagnostic]) {
    for skip in skipped {
        eprintln!(
            "{} {}: {}",
            "skipping".yellow(),
            skip.path.display(),
            skip.reason
        );
    }
}

fn print_check_summary(report: &CheckReport) {
    let summary = format!(
        "Scanned {} file(s); {} violation(s) in {} file(s).",
        report.scanned,
        report.findings.len(),
        report.files_with_findings()
    );
    if report.findings.is_empty() {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.red());
    }
}

fn print_rewrite_summary(report: &RunReport) {
    let verb = if report.dry_run { "would change" } else { "changed" };
    let mut summary = format!(
        "Scanned {} file(s); {} file(s) {}",
        report.scanned,
        report.changed.len(),
        verb
    );
    if !report.failed.is_empty() {
        summary.push_str(&format!("; {} failed", report.failed.len()));
    }
    summary.push('.');

    if report.failed.is_empty() {
        println!("{}", summary.bold());
    } else {
        println!("{}", summary.red());
    }
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!("{}", format!("--- {} (original)", file.display()).dimmed());
    println!("{}", format!("+++ {} (rewritten)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for group in diff.grouped_ops(3) {
        for op in group {
            for change in diff.iter_changes(&op) {
                let line = match change.tag() {
                    ChangeTag::Delete => format!("-{}", change).red(),
                    ChangeTag::Insert => format!("+{}", change).green(),
                    ChangeTag::Equal => format!(" {}", change).normal(),
                };
                print!("{}", line);
                if change.missing_newline() {
                    println!();
                }
            }
        }
    }
}
