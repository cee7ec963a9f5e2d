//! Subcommand arguments and execution.

use breach_core::{Alphabet, InvocationBudget};
use breach_oracle::{Oracle, OracleConfig, WasmOracle};
use breach_search::config::DEFAULT_ALPHABET;
use breach_search::verifier::DEFAULT_SEED;
use breach_search::{
    CandidateSpace, Driver, ExhaustiveEnumerator, KnownPlaintextVerifier, PlaintextChecks,
    RunConfig, RunReport, xor_repeating,
};
use clap::Args;
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Where the oracle lives and how it is laid out
#[derive(Args, Debug, Clone, Default)]
pub struct OracleArgs {
    /// Oracle WebAssembly module
    #[arg(short, long)]
    pub module: Option<PathBuf>,
    /// JSON oracle configuration; individual flags override it
    #[arg(long)]
    pub oracle_config: Option<PathBuf>,
    /// Exported memory holding the input region
    #[arg(long)]
    pub memory_export: Option<String>,
    /// Exported entry point
    #[arg(long)]
    pub entry: Option<String>,
    /// Module name of the probe import
    #[arg(long)]
    pub import_module: Option<String>,
    /// Field name of the probe import
    #[arg(long)]
    pub import_name: Option<String>,
    /// Offset of the input region
    #[arg(long)]
    pub input_offset: Option<usize>,
    /// Size of the input region, terminator included
    #[arg(long)]
    pub capacity: Option<usize>,
    /// Fuel per invocation
    #[arg(long)]
    pub fuel: Option<u64>,
}

impl OracleArgs {
    /// Configuration file, then flag overrides
    pub fn config(&self) -> Result<OracleConfig> {
        let mut config = match &self.oracle_config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .wrap_err_with(|| format!("reading oracle config {}", path.display()))?;
                OracleConfig::from_json(&text)
                    .wrap_err_with(|| format!("parsing oracle config {}", path.display()))?
            }
            None => OracleConfig::new(),
        };
        if let Some(name) = &self.memory_export {
            config = config.with_memory_export(name.as_str());
        }
        if let Some(name) = &self.entry {
            config = config.with_entry_export(name.as_str());
        }
        if self.import_module.is_some() || self.import_name.is_some() {
            let module = self
                .import_module
                .clone()
                .unwrap_or_else(|| config.import_module.clone());
            let name = self
                .import_name
                .clone()
                .unwrap_or_else(|| config.import_name.clone());
            config = config.with_import(module, name);
        }
        if self.input_offset.is_some() || self.capacity.is_some() {
            let offset = self.input_offset.unwrap_or(config.input_offset);
            let capacity = self.capacity.unwrap_or(config.capacity);
            config = config.with_input_region(offset, capacity);
        }
        if self.fuel.is_some() {
            config = config.with_fuel_per_call(self.fuel);
        }
        Ok(config)
    }

    /// Load the module with `config`
    pub fn load(&self, config: OracleConfig) -> Result<WasmOracle> {
        let path = self
            .module
            .as_ref()
            .ok_or_else(|| eyre!("--module is required for this command"))?;
        let oracle = WasmOracle::from_file(path, config)
            .wrap_err_with(|| format!("loading oracle {}", path.display()))?;
        Ok(oracle)
    }
}

fn parse_alphabet(spec: &str) -> std::result::Result<Alphabet, String> {
    Alphabet::parse(spec).map_err(|e| e.to_string())
}

fn parse_offset(value: &str) -> std::result::Result<usize, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("{value:?}: {e}"))
}

fn parse_u32(value: &str) -> std::result::Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("{value:?}: {e}"))
}

/// `breach pin`
#[derive(Args, Debug, Clone)]
pub struct PinArgs {
    /// Number of digits
    #[arg(long, default_value_t = 4)]
    pub width: usize,
    /// Universe index to start from
    #[arg(long, default_value_t = 0)]
    pub resume_from: u64,
    /// Maximum invocations
    #[arg(long)]
    pub budget: Option<u64>,
    #[command(flatten)]
    pub oracle: OracleArgs,
}

/// `breach brute`
#[derive(Args, Debug, Clone)]
pub struct BruteArgs {
    /// Known prefix; repeat to try several in order
    #[arg(long = "prefix", default_value = "L3m0nCTF{")]
    pub prefixes: Vec<String>,
    /// Fixed suffix
    #[arg(long, default_value = "}")]
    pub suffix: String,
    /// Body symbols, `a-z` ranges allowed
    #[arg(long, default_value = "a-z0-9_", value_parser = parse_alphabet)]
    pub alphabet: Alphabet,
    /// Shortest body
    #[arg(long, default_value_t = 1)]
    pub min_len: usize,
    /// Longest body
    #[arg(long, default_value_t = 3)]
    pub max_len: usize,
    /// Position of the `--prefix` to resume at; earlier prefixes are skipped
    #[arg(long, default_value_t = 0)]
    pub resume_prefix: usize,
    /// Universe index to start from within the `--resume-prefix` universe
    #[arg(long, default_value_t = 0)]
    pub resume_from: u64,
    /// Maximum invocations across all prefixes
    #[arg(long)]
    pub budget: Option<u64>,
    #[command(flatten)]
    pub oracle: OracleArgs,
}

/// `breach greedy`
#[derive(Args, Debug, Clone)]
pub struct GreedyArgs {
    /// Known prefix; repeat to try several in order
    #[arg(long = "prefix", default_value = "L3m0nCTF{")]
    pub prefixes: Vec<String>,
    /// Extension symbols, `a-z` ranges allowed
    #[arg(long, default_value = DEFAULT_ALPHABET, value_parser = parse_alphabet)]
    pub alphabet: Alphabet,
    /// Longest reconstructed prefix
    #[arg(long, default_value_t = 60)]
    pub max_len: usize,
    /// Symbol that ends the secret
    #[arg(long, default_value_t = '}')]
    pub terminator: char,
    /// Keep extending past the terminator
    #[arg(long)]
    pub no_terminator: bool,
    /// Maximum invocations across all prefixes
    #[arg(long)]
    pub budget: Option<u64>,
    #[command(flatten)]
    pub oracle: OracleArgs,
}

/// `breach verify`
#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Candidate text
    #[arg(long, conflicts_with_all = ["ciphertext", "key"], required_unless_present = "ciphertext")]
    pub candidate: Option<String>,
    /// Hex ciphertext, decrypted with `--key`
    #[arg(long, requires = "key")]
    pub ciphertext: Option<String>,
    /// Hex repeating XOR key
    #[arg(long, requires = "ciphertext")]
    pub key: Option<String>,
    /// Required length
    #[arg(long, default_value_t = 40)]
    pub length: usize,
    /// Required prefix
    #[arg(long, default_value = "L3m0nCTF{")]
    pub prefix: String,
    /// Required suffix
    #[arg(long, default_value = "}")]
    pub suffix: String,
    /// Checksum seed, decimal or 0x-hex
    #[arg(long, default_value_t = DEFAULT_SEED, value_parser = parse_u32)]
    pub seed: u32,
    /// Checksum bits compared
    #[arg(long, default_value_t = 16)]
    pub bits: u32,
    /// Expected checksum, decimal or 0x-hex
    #[arg(long, default_value = "0xD9CE", value_parser = parse_u32)]
    pub expected: u32,
    #[command(flatten)]
    pub oracle: OracleArgs,
}

/// `breach probe`
#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// Candidate to evaluate once
    #[arg(long)]
    pub input: String,
    /// Bytes to dump afterwards, cut short at the end of memory
    #[arg(long, default_value_t = 64)]
    pub dump: usize,
    /// Dump start offset, decimal or 0x-hex; defaults to the input region
    #[arg(long, value_parser = parse_offset)]
    pub offset: Option<usize>,
    #[command(flatten)]
    pub oracle: OracleArgs,
}

/// A single diagnostic evaluation
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    /// Evaluated input
    pub input: String,
    /// Entry point verdict
    pub verdict: bool,
    /// Probe calls during the invocation
    pub signal: u64,
    /// Probe arguments in call order
    pub probe_args: Vec<i32>,
    /// Offset of the dumped window
    pub offset: usize,
    /// Dumped bytes, hex encoded
    pub region: String,
    /// Module fingerprint
    pub fingerprint: Option<String>,
    /// Dumped bytes
    #[serde(skip)]
    pub window: Vec<u8>,
}

/// Result of one command
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Output {
    /// Search runs in order
    Runs(Vec<RunReport>),
    /// A probe evaluation
    Probe(ProbeReport),
}

impl Output {
    /// Whether the command confirmed what it looked for
    pub fn succeeded(&self) -> bool {
        match self {
            Self::Runs(reports) => reports.iter().any(RunReport::is_success),
            Self::Probe(report) => report.verdict,
        }
    }
}

/// Shared execution settings
#[derive(Debug, Clone, Copy)]
pub struct Context {
    /// Draw progress bars
    pub progress: bool,
}

impl Context {
    fn bar(&self, total: Option<u64>) -> Result<ProgressBar> {
        if !self.progress {
            return Ok(ProgressBar::hidden());
        }
        let bar = match total {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(ProgressStyle::with_template(
                    "{spinner} {wide_bar} {pos}/{len} {msg}",
                )?);
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(ProgressStyle::with_template("{spinner} {pos} invocations {msg}")?);
                bar
            }
        };
        Ok(bar)
    }
}

fn driver(oracle: WasmOracle, budget: InvocationBudget, bar: &ProgressBar) -> Driver<WasmOracle> {
    let bar = bar.clone();
    Driver::new(oracle)
        .with_budget(budget)
        .with_progress(move |_, candidate| {
            bar.inc(1);
            bar.set_message(String::from_utf8_lossy(candidate).into_owned());
        })
}

fn bounded(total: u64, budget: Option<u64>) -> u64 {
    budget.map_or(total, |limit| total.min(limit))
}

/// Enumerate numeric PINs
pub fn pin(ctx: Context, args: &PinArgs) -> Result<Output> {
    let oracle = args.oracle.load(args.oracle.config()?)?;
    let space = CandidateSpace::pins(args.width)?;
    info!(width = args.width, universe = space.len(), "enumerating pins");
    let remaining = space.len().saturating_sub(args.resume_from);
    let bar = ctx.bar(Some(bounded(remaining, args.budget)))?;
    let mut driver = driver(oracle, InvocationBudget::from_limit(args.budget), &bar);
    let report = driver.run(&mut ExhaustiveEnumerator::resume(space, args.resume_from))?;
    bar.finish_and_clear();
    Ok(Output::Runs(vec![report]))
}

/// Enumerate wrapped bodies for each prefix
pub fn brute(ctx: Context, args: &BruteArgs) -> Result<Output> {
    let config = RunConfig::new()
        .with_prefixes(args.prefixes.iter().cloned())
        .with_suffix(args.suffix.as_str())
        .with_alphabet(args.alphabet.clone())
        .with_lengths(args.min_len, args.max_len)
        .with_resume(args.resume_prefix, args.resume_from)
        .with_budget(args.budget);
    let enumerators = config.enumerators()?;
    let oracle = args.oracle.load(args.oracle.config()?)?;

    let total = enumerators
        .iter()
        .map(|e| e.total().saturating_sub(e.cursor()))
        .fold(0u64, u64::saturating_add);
    let bar = ctx.bar(Some(bounded(total, args.budget)))?;
    let mut driver = driver(oracle, config.invocation_budget(), &bar);
    let reports = driver.run_each(enumerators)?;
    bar.finish_and_clear();
    Ok(Output::Runs(reports))
}

/// Greedy extension for each prefix
pub fn greedy(ctx: Context, args: &GreedyArgs) -> Result<Output> {
    let terminator = (!args.no_terminator).then_some(args.terminator);
    let config = RunConfig::new()
        .with_prefixes(args.prefixes.iter().cloned())
        .with_alphabet(args.alphabet.clone())
        .with_lengths(0, args.max_len)
        .with_terminator(terminator)
        .with_budget(args.budget);
    let extenders = config.extenders()?;
    let oracle = args.oracle.load(args.oracle.config()?)?;

    let bar = ctx.bar(args.budget)?;
    let mut driver = driver(oracle, config.invocation_budget(), &bar);
    let reports = driver.run_each(extenders)?;
    bar.finish_and_clear();
    Ok(Output::Runs(reports))
}

/// Known-plaintext verification, oracle-confirmed when a module is given
pub fn verify(args: &VerifyArgs) -> Result<Output> {
    let candidate = match (&args.candidate, &args.ciphertext, &args.key) {
        (Some(text), _, _) => text.clone().into_bytes(),
        (None, Some(ciphertext), Some(key)) => {
            let ciphertext = hex::decode(ciphertext).wrap_err("decoding --ciphertext")?;
            let key = hex::decode(key).wrap_err("decoding --key")?;
            xor_repeating(&ciphertext, &key)?
        }
        _ => return Err(eyre!("pass --candidate, or --ciphertext with --key")),
    };

    let checks = PlaintextChecks::new()
        .with_length(args.length)
        .with_affixes(args.prefix.as_str(), args.suffix.as_str())
        .with_checksum(args.seed, args.bits, args.expected);
    checks.validate()?;
    let verifier = KnownPlaintextVerifier::new(candidate, checks);

    let report = if args.oracle.module.is_some() {
        let oracle = args.oracle.load(args.oracle.config()?)?;
        let mut verifier = verifier.with_oracle_confirmation(true);
        Driver::new(oracle).run(&mut verifier)?
    } else {
        verifier.run_offline()
    };
    Ok(Output::Runs(vec![report]))
}

/// One evaluation with a memory dump
pub fn probe(args: &ProbeArgs) -> Result<Output> {
    let config = args.oracle.config()?.with_probe_recording(true);
    let mut oracle = args.oracle.load(config)?;
    let evaluation = oracle.evaluate(args.input.as_bytes())?;
    let offset = args.offset.unwrap_or(oracle.region().offset);
    let available = oracle.memory_size().saturating_sub(offset);
    if args.dump > available {
        warn!(
            requested = args.dump,
            available,
            "dump runs past the end of memory, truncating"
        );
    }
    let window = oracle
        .peek(offset, args.dump.min(available))
        .wrap_err_with(|| format!("dumping memory at 0x{offset:X}"))?;
    Ok(Output::Probe(ProbeReport {
        input: args.input.clone(),
        verdict: evaluation.verdict,
        signal: evaluation.signal,
        probe_args: oracle.probe_calls().map(<[i32]>::to_vec).unwrap_or_default(),
        offset,
        region: hex::encode(&window),
        fingerprint: oracle.fingerprint(),
        window,
    }))
}
