use std::io;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::EffectiveConfig;
use crate::core::{DatasetPayload, Filter, GateAction, Policy, RiskItem};
use crate::engine::{Checked, Engine, EngineOptions, Presentation};
use crate::logs::{JsonlSink, NullSink, TelemetrySink};
use crate::schedule::LatestSlot;
use crate::store::Store;
use crate::ui::UiConfig;
use crate::upstream::{ResponseFileSummarizer, SummarizeOptions};

#[derive(Debug, Parser)]
#[command(
    name = "riskgate",
    version,
    about = "Validate, autofix and gate security-scan datasets, then consolidate the risks a summarizer reports"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Overrides the stored and configured validation policy.
    #[arg(long, global = true)]
    pub policy: Option<Policy>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate a dataset file or every JSON dataset under a directory.
    Validate(ValidateArgs),
    /// Write an autofixed copy of a dataset.
    Fix(FixArgs),
    /// Consolidate and filter the risks in a saved summarizer response.
    Risks(RisksArgs),
    /// Gate a dataset, then present the risks from a summarizer response.
    Run(RunArgs),
    /// Re-validate a dataset whenever it changes.
    Watch(WatchArgs),
    Policy(PolicyArgs),
    Cache(CacheArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    pub path: PathBuf,
    #[arg(long)]
    pub include: Vec<String>,
    #[arg(long)]
    pub exclude: Vec<String>,
    #[arg(long)]
    pub request_id: Option<String>,
}

#[derive(Debug, Args)]
pub struct FixArgs {
    pub file: PathBuf,
    /// Write without asking.
    #[arg(long)]
    pub yes: bool,
    /// Destination (default: `<name>.fixed.json` next to the input).
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RisksArgs {
    pub response: PathBuf,
    /// `severity=HIGH`, `port=8080`, `country=germany`. Repeats are ANDed.
    #[arg(long)]
    pub filter: Vec<Filter>,
    /// Order by severity, most severe first.
    #[arg(long)]
    pub rank: bool,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(required_unless_present = "use_cached", conflicts_with = "use_cached")]
    pub dataset: Option<PathBuf>,
    /// Run the cached fixed copy instead of a file, if it has not expired.
    #[arg(long)]
    pub use_cached: bool,
    #[arg(long)]
    pub response: PathBuf,
    /// Accept autofixes without asking.
    #[arg(long)]
    pub yes: bool,
    #[arg(long)]
    pub filter: Vec<Filter>,
    #[arg(long)]
    pub rank: bool,
    #[arg(long = "rewrite-with-ai")]
    pub rewrite_with_ai: bool,
    #[arg(long)]
    pub style: Option<String>,
    #[arg(long)]
    pub language: Option<String>,
    #[arg(long)]
    pub request_id: Option<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub command: PolicyCommand,
}

#[derive(Debug, Subcommand)]
pub enum PolicyCommand {
    Show,
    Set {
        #[arg(value_name = "POLICY")]
        value: Policy,
    },
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    Show {
        /// Print the cached dataset itself.
        #[arg(long)]
        payload: bool,
    },
    Clear,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

struct RunContext {
    json: bool,
    ui: UiConfig,
    cfg: EffectiveConfig,
    home_dir: PathBuf,
    policy: Policy,
    engine: Engine,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let stdin_is_tty = io::stdin().is_terminal();
    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = crate::config::effective_home_dir()?;

    let env_config_path = std::env::var_os("RISKGATE_CONFIG").map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;

    let ui = UiConfig {
        color: stdout_is_tty && cfg.ui.color && !cli.no_color,
        stdin_is_tty,
        stdout_is_tty,
        stderr_is_tty,
        max_table_rows: cfg.ui.max_table_rows,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "riskgate", &mut out);
            return Ok(());
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    write_json(&cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui.quiet {
                eprintln!("config: use `riskgate config --show`");
            }
            return Ok(());
        }
        Commands::Policy(args) => return cmd_policy(args, cli.policy, cli.json, &cfg, &home_dir),
        Commands::Cache(args) => return cmd_cache(args, cli.json, &ui, &home_dir),
        _ => {}
    }

    let stored = Store::in_home(&home_dir)?.policy();
    let (policy, source) = resolve_policy(cli.policy, stored, cfg.validation.policy);
    tracing::debug!(policy = %policy, source, "policy resolved");

    let engine = build_engine(&cfg, &home_dir);
    let ctx = RunContext {
        json: cli.json,
        ui,
        cfg,
        home_dir,
        policy,
        engine,
    };

    match cli.command {
        Commands::Validate(args) => cmd_validate(&ctx, args),
        Commands::Fix(args) => cmd_fix(&ctx, args),
        Commands::Risks(args) => cmd_risks(&ctx, args),
        Commands::Run(args) => cmd_run(&ctx, args),
        Commands::Watch(args) => cmd_watch(&ctx, args),
        Commands::Policy(_) | Commands::Cache(_) | Commands::Completion(_) | Commands::Config(_) => {
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "riskgate=debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RISKGATE_LOG").unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// `--policy` beats the stored value, which beats config.
fn resolve_policy(
    flag: Option<Policy>,
    stored: Option<Policy>,
    configured: Policy,
) -> (Policy, &'static str) {
    if let Some(p) = flag {
        return (p, "flag");
    }
    if let Some(p) = stored {
        return (p, "store");
    }
    (configured, "config")
}

fn build_engine(cfg: &EffectiveConfig, home_dir: &Path) -> Engine {
    let sink: Arc<dyn TelemetrySink + Send + Sync> = if cfg.telemetry.enabled {
        Arc::new(JsonlSink::in_home(home_dir))
    } else {
        Arc::new(NullSink)
    };
    Engine::new(
        EngineOptions {
            limits: cfg.limits(),
            save_fixed_copy: cfg.autofix.save_fixed_copy,
            fixed_ttl: Duration::from_secs(cfg.autofix.ttl_secs),
            store_path: Some(crate::store::default_store_path(home_dir)),
        },
        sink,
    )
}

#[derive(Serialize)]
struct FileReport<'a> {
    path: String,
    #[serde(flatten)]
    checked: &'a Checked,
}

fn cmd_validate(ctx: &RunContext, args: ValidateArgs) -> Result<()> {
    crate::scan::validate_globs(&args.include).map_err(crate::exit::invalid_args_err)?;
    crate::scan::validate_globs(&args.exclude).map_err(crate::exit::invalid_args_err)?;
    let scan = crate::scan::find_datasets(&args.path, &args.include, &args.exclude)
        .map_err(crate::exit::invalid_args_err)?;
    if scan.files.is_empty() {
        return Err(crate::exit::invalid_args(format!(
            "no dataset files found under {}",
            args.path.display()
        )));
    }

    let pb = if scan.files.len() > 1 && ctx.ui.stderr_is_tty && !ctx.ui.quiet && !ctx.json {
        let pb = indicatif::ProgressBar::new(scan.files.len() as u64);
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let mut checked_files = Vec::with_capacity(scan.files.len());
    for file in &scan.files {
        if let Some(pb) = &pb {
            pb.set_message(display_path(file, &ctx.home_dir));
        }
        let bytes = read_input(file)?;
        let checked = ctx
            .engine
            .check_bytes(&bytes, ctx.policy, args.request_id.as_deref());
        checked_files.push((file, checked));
        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if ctx.json {
        if let [(_, checked)] = checked_files.as_slice() {
            write_json(checked)?;
        } else {
            let reports: Vec<FileReport<'_>> = checked_files
                .iter()
                .map(|(path, checked)| FileReport {
                    path: display_path(path, &ctx.home_dir),
                    checked,
                })
                .collect();
            write_json(&reports)?;
        }
    } else {
        for (i, (path, checked)) in checked_files.iter().enumerate() {
            if i > 0 && !ctx.ui.quiet {
                println!();
            }
            crate::ui::print_checked(&display_path(path, &ctx.home_dir), checked, &ctx.ui);
        }
        if scan.error_count > 0 && !ctx.ui.quiet {
            eprintln!("note: {} unreadable entr(ies) skipped", scan.error_count);
        }
    }

    let blocked = checked_files
        .iter()
        .filter(|(_, c)| c.decision.action == GateAction::Block)
        .count();
    if blocked > 0 {
        return Err(crate::exit::blocked(format!(
            "{blocked} of {} dataset(s) blocked under policy {}",
            checked_files.len(),
            ctx.policy
        )));
    }
    Ok(())
}

#[derive(Serialize)]
struct FixReport<'a> {
    #[serde(flatten)]
    checked: &'a Checked,
    #[serde(skip_serializing_if = "Option::is_none")]
    written: Option<String>,
}

fn cmd_fix(ctx: &RunContext, args: FixArgs) -> Result<()> {
    if ctx.policy == Policy::Off {
        return Err(crate::exit::invalid_args(
            "autofix does not run under policy off; pass --policy lenient or strict",
        ));
    }
    let bytes = read_input(&args.file)?;
    let checked = ctx.engine.check_bytes(&bytes, ctx.policy, None);
    let label = display_path(&args.file, &ctx.home_dir);

    if !checked.result.fatal_errors.is_empty() {
        if ctx.json {
            write_json(&FixReport {
                checked: &checked,
                written: None,
            })?;
        } else {
            crate::ui::print_checked(&label, &checked, &ctx.ui);
        }
        return Err(crate::exit::blocked(checked.decision.message.clone()));
    }

    let fixed = checked
        .result
        .fixed
        .as_ref()
        .filter(|_| checked.result.autofix_applied);
    let Some(fixed) = fixed else {
        if ctx.json {
            write_json(&FixReport {
                checked: &checked,
                written: None,
            })?;
        } else if !ctx.ui.quiet {
            println!("{label}: nothing to fix");
        }
        return Ok(());
    };

    let out_path = args.out.unwrap_or_else(|| fixed_copy_path(&args.file));
    if !ctx.json {
        crate::ui::print_checked(&label, &checked, &ctx.ui);
    }

    let confirmed = args.yes
        || (!ctx.json
            && ctx.ui.stdin_is_tty
            && ctx.ui.stdout_is_tty
            && confirm_exact(
                &format!(
                    "Write fixed copy to {}? Type 'yes' to continue: ",
                    out_path.display()
                ),
                "yes",
            )?);
    if !confirmed {
        if ctx.json {
            write_json(&FixReport {
                checked: &checked,
                written: None,
            })?;
        } else if !ctx.ui.quiet {
            eprintln!("Not written. Re-run with --yes to write {}", out_path.display());
        }
        return Ok(());
    }

    let mut buf = serde_json::to_vec_pretty(fixed).context("failed to encode fixed copy")?;
    buf.push(b'\n');
    std::fs::write(&out_path, buf)
        .with_context(|| format!("failed to write fixed copy: {}", out_path.display()))?;

    let run = crate::logs::AutofixRun {
        finished_at: OffsetDateTime::now_utc(),
        policy: ctx.policy,
        shape: fixed.shape(),
        items: fixed.len(),
        source: &args.file,
        output: Some(&out_path),
        fixed_fields: &checked.result.telemetry,
    };
    if let Err(err) = crate::logs::write_autofix_log(&ctx.home_dir, &run) {
        tracing::warn!(error = %err, "failed to write autofix log");
    }

    let written = display_path(&out_path, &ctx.home_dir);
    if ctx.json {
        write_json(&FixReport {
            checked: &checked,
            written: Some(written),
        })?;
    } else if !ctx.ui.quiet {
        println!("Wrote fixed copy: {written}");
    }
    Ok(())
}

fn cmd_risks(ctx: &RunContext, args: RisksArgs) -> Result<()> {
    let summarizer = ResponseFileSummarizer::new(&args.response);
    let payload = DatasetPayload::Hosts(Vec::new());
    let presentation = ctx.engine.present(
        &summarizer,
        &payload,
        &SummarizeOptions::default(),
        &args.filter,
    );
    show_presentation(ctx, presentation, args.rank)
}

#[derive(Serialize)]
struct RunReport<'a> {
    checked: &'a Checked,
    presentation: &'a Presentation,
}

fn cmd_run(ctx: &RunContext, args: RunArgs) -> Result<()> {
    let (bytes, label) = match &args.dataset {
        Some(path) => (read_input(path)?, display_path(path, &ctx.home_dir)),
        None => (cached_input(&ctx.home_dir)?, "cached fixed copy".to_string()),
    };
    let checked = ctx
        .engine
        .check_bytes(&bytes, ctx.policy, args.request_id.as_deref());

    if !ctx.json {
        crate::ui::print_checked(&label, &checked, &ctx.ui);
    }

    if checked.decision.action == GateAction::Block {
        if ctx.json {
            write_json(&checked)?;
        }
        return Err(crate::exit::blocked(checked.decision.message.clone()));
    }

    let confirmed = args.yes
        || !checked.decision.action.requires_confirmation()
        || (!ctx.json
            && ctx.ui.stdin_is_tty
            && ctx.ui.stdout_is_tty
            && confirm_exact("Apply autofixes and continue? Type 'yes': ", "yes")?);
    let Some(payload) = checked.payload_to_submit(confirmed) else {
        if ctx.json {
            write_json(&checked)?;
        }
        return Err(crate::exit::blocked(
            "autofixes need confirmation; re-run with --yes",
        ));
    };

    let options = SummarizeOptions {
        rewrite_with_ai: args.rewrite_with_ai,
        style: args.style,
        language: args.language,
    };
    let summarizer = ResponseFileSummarizer::new(&args.response);
    let mut presentation = ctx
        .engine
        .present(&summarizer, payload, &options, &args.filter);
    if args.rank {
        rank_in_place(&mut presentation);
    }

    if ctx.json {
        write_json(&RunReport {
            checked: &checked,
            presentation: &presentation,
        })?;
    } else {
        if !ctx.ui.quiet {
            println!();
        }
        print_presentation(ctx, &presentation);
    }
    Ok(())
}

fn show_presentation(ctx: &RunContext, mut presentation: Presentation, rank: bool) -> Result<()> {
    if rank {
        rank_in_place(&mut presentation);
    }
    if ctx.json {
        write_json(&presentation)?;
    } else {
        print_presentation(ctx, &presentation);
    }
    Ok(())
}

fn print_presentation(ctx: &RunContext, presentation: &Presentation) {
    if let Some(notice) = &presentation.notice
        && ctx.ui.quiet
    {
        eprintln!("{notice}");
    }
    crate::ui::print_presentation(presentation, &ctx.ui);
}

fn rank_in_place(presentation: &mut Presentation) {
    let mut refs: Vec<&RiskItem> = presentation.risks.iter().collect();
    crate::filter::rank_by_severity(&mut refs);
    let ranked: Vec<RiskItem> = refs.into_iter().cloned().collect();
    presentation.risks = ranked;
}

fn cmd_watch(ctx: &RunContext, args: WatchArgs) -> Result<()> {
    if !args.file.is_file() {
        return Err(crate::exit::invalid_args(format!(
            "not a file: {}",
            args.file.display()
        )));
    }
    let debounce = Duration::from_millis(ctx.cfg.watch.debounce_ms);
    let mut watcher = crate::watch::FileWatcher::new(debounce)
        .context("failed to start file watcher")?;
    watcher
        .watch_file(&args.file)
        .with_context(|| format!("failed to watch {}", args.file.display()))?;

    let slot: Arc<LatestSlot<String>> = Arc::new(LatestSlot::new());
    let renderer = {
        let slot = Arc::clone(&slot);
        std::thread::spawn(move || {
            loop {
                match slot.wait_take(Duration::from_millis(500)) {
                    Some(frame) => print!("{frame}"),
                    None if slot.is_closed() => break,
                    None => {}
                }
            }
        })
    };

    let label = display_path(&args.file, &ctx.home_dir);
    let mut run = 0u64;
    loop {
        run += 1;
        slot.post(render_watch_frame(ctx, &args.file, &label, run));
        if !watcher.wait_for_change() {
            break;
        }
    }

    slot.close();
    let _ = renderer.join();
    Ok(())
}

fn render_watch_frame(ctx: &RunContext, file: &Path, label: &str, run: u64) -> String {
    let mut buf: Vec<u8> = Vec::new();
    let stamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string());
    match read_input(file) {
        Ok(bytes) => {
            let checked = ctx.engine.check_bytes(&bytes, ctx.policy, None);
            if ctx.json {
                if let Ok(line) = serde_json::to_string(&checked) {
                    buf.extend_from_slice(line.as_bytes());
                    buf.push(b'\n');
                }
            } else {
                use std::io::Write;
                let _ = writeln!(buf, "--- run {run} at {stamp} ---");
                crate::ui::write_checked(&mut buf, label, &checked, &ctx.ui);
                let _ = writeln!(buf);
            }
        }
        Err(err) => {
            use std::io::Write;
            let _ = writeln!(buf, "--- run {run} at {stamp} ---");
            let _ = writeln!(buf, "{label}: {err:#}");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[derive(Serialize)]
struct PolicyReport {
    policy: Policy,
    source: &'static str,
}

fn cmd_policy(
    args: PolicyArgs,
    flag: Option<Policy>,
    json: bool,
    cfg: &EffectiveConfig,
    home_dir: &Path,
) -> Result<()> {
    let mut store = Store::in_home(home_dir)?;
    match args.command {
        PolicyCommand::Show => {
            let (policy, source) = resolve_policy(flag, store.policy(), cfg.validation.policy);
            if json {
                write_json(&PolicyReport { policy, source })?;
            } else {
                println!("{policy} ({source})");
            }
        }
        PolicyCommand::Set { value: policy } => {
            store.set_policy(policy)?;
            if json {
                write_json(&PolicyReport {
                    policy,
                    source: "store",
                })?;
            } else {
                println!("policy set to {policy}");
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct CacheReport {
    shape: String,
    items: usize,
    saved_at: String,
    expires_at: String,
}

fn cmd_cache(args: CacheArgs, json: bool, ui: &UiConfig, home_dir: &Path) -> Result<()> {
    let mut store = Store::in_home(home_dir)?;
    match args.command {
        CacheCommand::Show { payload: true } => {
            let copy = store.fixed(OffsetDateTime::now_utc())?;
            match copy {
                Some(copy) => write_json(&copy.payload)?,
                None if json => write_json(&serde_json::Value::Null)?,
                None => eprintln!("no fixed copy cached"),
            }
        }
        CacheCommand::Show { payload: false } => {
            let report = store
                .fixed(OffsetDateTime::now_utc())?
                .map(|copy| CacheReport {
                    shape: copy.payload.shape().to_string(),
                    items: copy.payload.len(),
                    saved_at: format_ms(copy.saved_at),
                    expires_at: format_ms(copy.expires_at),
                });
            if json {
                write_json(&report)?;
            } else {
                match report {
                    Some(r) => println!(
                        "fixed copy: {} {} item(s), saved {}, expires {}",
                        r.shape, r.items, r.saved_at, r.expires_at
                    ),
                    None => println!("no fixed copy cached"),
                }
            }
        }
        CacheCommand::Clear => {
            let cleared = store.clear_fixed()?;
            if json {
                write_json(&serde_json::json!({ "cleared": cleared }))?;
            } else if !ui.quiet {
                println!(
                    "{}",
                    if cleared {
                        "fixed copy cleared"
                    } else {
                        "nothing to clear"
                    }
                );
            }
        }
    }
    Ok(())
}

fn format_ms(ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| ms.to_string())
}

/// Raw bytes; decoding is the engine's job so bad encodings become findings.
fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

/// The unexpired fixed copy, re-encoded for another pass through the engine.
fn cached_input(home_dir: &Path) -> Result<Vec<u8>> {
    let mut store = Store::in_home(home_dir)?;
    let Some(copy) = store.fixed(OffsetDateTime::now_utc())? else {
        return Err(crate::exit::invalid_args(
            "no fixed copy cached (or it expired); run `riskgate fix` first",
        ));
    };
    serde_json::to_vec(&copy.payload).context("failed to encode cached fixed copy")
}

fn fixed_copy_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    input.with_file_name(format!("{stem}.fixed.json"))
}

fn display_path(path: &Path, home_dir: &Path) -> String {
    path.strip_prefix(home_dir)
        .map(|p| format!("~/{}", p.display()))
        .unwrap_or_else(|_| path.display().to_string())
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn confirm_exact(prompt: &str, expected: &str) -> Result<bool> {
    use std::io::{BufRead, Write};

    let mut stderr = std::io::stderr().lock();
    write!(stderr, "{prompt}")?;
    stderr.flush()?;

    let mut input = String::new();
    let mut stdin = std::io::stdin().lock();
    let n = stdin.read_line(&mut input)?;
    if n == 0 {
        return Ok(false);
    }
    Ok(input.trim() == expected)
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (expected bash|zsh|fish)"
        ))),
    }
}
