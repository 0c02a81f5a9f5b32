use std::fs;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use itertools::izip;
use log::{error, info};

use duoshare::network::{self, CommInfo, Config};
use duoshare::party::error::{MpcError, MpcResult};
use duoshare::party::Party;
use duoshare::rng::SecureRng;
use duoshare::share::additive::AdditiveSharing;
use duoshare::share::boolean::BooleanSharing;

/// Both parties derive identical dealer material from this seed, playing the
/// trusted dealer for themselves. Test runs only; real deployments load
/// pre-distributed shares instead.
const DEALER_SEED: u64 = 6;

#[derive(Parser)]
#[command(about = "Two-party secret-sharing protocol runner")]
struct Cli {
    /// Party index: 0 listens, 1 connects.
    party_id: usize,
    /// Execution mode.
    #[arg(value_enum)]
    exec_mode: ExecMode,
    /// TCP port of party 0.
    #[arg(short, long)]
    port: Option<u16>,
    /// Address of party 0.
    #[arg(short, long)]
    server: Option<Ipv4Addr>,
    /// Function to run; defaults to every registered function.
    #[arg(short, long)]
    name: Option<String>,
    /// Scenario variant forwarded to the selected function.
    #[arg(short = 'm', long = "mode", default_value_t = 0)]
    function_mode: u32,
    /// Write the result summary to this file.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Repetitions in bench mode.
    #[arg(short, long, default_value_t = 1)]
    iteration: usize,
    /// TOML file with the host and port of party 0.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExecMode {
    Test,
    Bench,
}

struct RunCtx {
    variant: u32,
}

type TestFn = fn(&mut Party, &RunCtx) -> MpcResult<Vec<String>>;

/// Name-to-handler registry; both parties must select the same subset.
fn test_registry() -> Vec<(&'static str, TestFn)> {
    vec![
        ("reconst", test_reconst),
        ("mult", test_mult),
        ("mult-vec", test_mult_vec),
        ("and", test_and),
        ("or", test_or),
    ]
}

fn check_equal(name: &str, expected: u32, actual: u32) -> String {
    let verdict = if expected == actual { "[VALID]" } else { "[INVALID]" };
    let line = format!(
        "[{}] equality check: ({}, {}) -> {}",
        name, expected, actual, verdict
    );
    println!("{}", line);
    line
}

fn check_vector(name: &str, expected: &[u32], actual: &[u32]) -> String {
    let verdict = if expected == actual { "[VALID]" } else { "[INVALID]" };
    let line = format!("[{}] {} elements -> {}", name, expected.len(), verdict);
    println!("{}", line);
    line
}

fn test_reconst(party: &mut Party, _ctx: &RunCtx) -> MpcResult<Vec<String>> {
    let engine = AdditiveSharing::new(32)?;
    let mut dealer = SecureRng::seed_from_u64(DEALER_SEED);
    let secret = dealer.rand64() as u32;
    let (s_0, s_1) = engine.share(&mut dealer, secret);
    let own = if party.id() == 0 { s_0 } else { s_1 };
    let opened = engine.reconst(party, own)?;
    Ok(vec![check_equal("reconst", secret, opened)])
}

fn test_mult(party: &mut Party, _ctx: &RunCtx) -> MpcResult<Vec<String>> {
    let engine = AdditiveSharing::new(32)?;
    let mut dealer = SecureRng::seed_from_u64(DEALER_SEED);
    let u = dealer.rand64() as u32;
    let v = dealer.rand64() as u32;
    let (u_0, u_1) = engine.share(&mut dealer, u);
    let (v_0, v_1) = engine.share(&mut dealer, v);
    let triples = engine.generate_triples(&mut dealer, 1);
    let (mut t_0, mut t_1) = engine.share_triples(&mut dealer, &triples);
    let (us, vs, t) = if party.id() == 0 {
        (u_0, v_0, t_0.remove(0))
    } else {
        (u_1, v_1, t_1.remove(0))
    };
    let z = engine.mul(party, t, us, vs)?;
    let opened = engine.reconst(party, z)?;
    Ok(vec![check_equal("mult", u.wrapping_mul(v), opened)])
}

fn test_mult_vec(party: &mut Party, ctx: &RunCtx) -> MpcResult<Vec<String>> {
    let n = 64usize << ctx.variant.min(8);
    let engine = AdditiveSharing::new(32)?;
    let mut dealer = SecureRng::seed_from_u64(DEALER_SEED);
    let x_clear: Vec<u32> = (0..n).map(|_| dealer.rand64() as u32).collect();
    let y_clear: Vec<u32> = (0..n).map(|_| dealer.rand64() as u32).collect();
    let (x_0, x_1) = engine.share_vec(&mut dealer, &x_clear);
    let (y_0, y_1) = engine.share_vec(&mut dealer, &y_clear);
    let triples = engine.generate_triples(&mut dealer, n);
    let (t_0, t_1) = engine.share_triples(&mut dealer, &triples);
    let (x, y, t) = if party.id() == 0 {
        (x_0, y_0, t_0)
    } else {
        (x_1, y_1, t_1)
    };
    let z = engine.mul_vec(party, t, &x, &y)?;
    let opened = engine.reconst_vec(party, &z)?;
    let expected: Vec<u32> = izip!(&x_clear, &y_clear)
        .map(|(x, y)| x.wrapping_mul(*y))
        .collect();
    Ok(vec![check_vector("mult-vec", &expected, &opened)])
}

fn test_and(party: &mut Party, _ctx: &RunCtx) -> MpcResult<Vec<String>> {
    let engine = BooleanSharing::new();
    let mut dealer = SecureRng::seed_from_u64(DEALER_SEED);
    let mut lines = Vec::new();
    for x in [0u32, 1] {
        for y in [0u32, 1] {
            let (x_0, x_1) = engine.share(&mut dealer, x);
            let (y_0, y_1) = engine.share(&mut dealer, y);
            let triples = engine.generate_triples(&mut dealer, 1);
            let (mut t_0, mut t_1) = engine.share_triples(&mut dealer, &triples);
            let (xs, ys, t) = if party.id() == 0 {
                (x_0, y_0, t_0.remove(0))
            } else {
                (x_1, y_1, t_1.remove(0))
            };
            let z = engine.and(party, t, xs, ys)?;
            let opened = engine.reconst(party, z)?;
            lines.push(check_equal(&format!("and({},{})", x, y), x & y, opened));
        }
    }
    Ok(lines)
}

fn test_or(party: &mut Party, _ctx: &RunCtx) -> MpcResult<Vec<String>> {
    let engine = BooleanSharing::new();
    let mut dealer = SecureRng::seed_from_u64(DEALER_SEED);
    let mut lines = Vec::new();
    for x in [0u32, 1] {
        for y in [0u32, 1] {
            let (x_0, x_1) = engine.share(&mut dealer, x);
            let (y_0, y_1) = engine.share(&mut dealer, y);
            let triples = engine.generate_triples(&mut dealer, 1);
            let (mut t_0, mut t_1) = engine.share_triples(&mut dealer, &triples);
            let (xs, ys, t) = if party.id() == 0 {
                (x_0, y_0, t_0.remove(0))
            } else {
                (x_1, y_1, t_1.remove(0))
            };
            let z = engine.or(party, t, xs, ys)?;
            let opened = engine.reconst(party, z)?;
            lines.push(check_equal(&format!("or({},{})", x, y), x | y, opened));
        }
    }
    Ok(lines)
}

fn run_tests(party: &mut Party, cli: &Cli) -> MpcResult<Vec<String>> {
    let registry = test_registry();
    let ctx = RunCtx {
        variant: cli.function_mode,
    };
    let selected: Vec<(&'static str, TestFn)> = match &cli.name {
        None => registry,
        Some(name) => {
            let picked: Vec<_> = registry
                .iter()
                .filter(|(n, _)| *n == name.as_str())
                .cloned()
                .collect();
            if picked.is_empty() {
                let names: Vec<&str> = registry.iter().map(|(n, _)| *n).collect();
                info!("available functions: [{}]", names.join(", "));
                return Err(MpcError::InvalidParameter(format!(
                    "unknown function name '{}'",
                    name
                )));
            }
            picked
        }
    };
    let mut lines = Vec::new();
    for (name, func) in selected {
        info!("running '{}'", name);
        lines.extend(func(party, &ctx)?);
    }
    Ok(lines)
}

fn run_bench(party: &mut Party, iterations: usize) -> MpcResult<Vec<String>> {
    const N: usize = 1 << 14;
    let engine = AdditiveSharing::new(32)?;
    let mut dealer = SecureRng::seed_from_u64(DEALER_SEED);
    let x_clear: Vec<u32> = (0..N).map(|_| dealer.rand64() as u32).collect();
    let y_clear: Vec<u32> = (0..N).map(|_| dealer.rand64() as u32).collect();
    let (x_0, x_1) = engine.share_vec(&mut dealer, &x_clear);
    let (y_0, y_1) = engine.share_vec(&mut dealer, &y_clear);
    let (x, y) = if party.id() == 0 { (x_0, y_0) } else { (x_1, y_1) };

    // dealer material for every iteration up front, outside the timer
    let mut triple_shares = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let triples = engine.generate_triples(&mut dealer, N);
        let (t_0, t_1) = engine.share_triples(&mut dealer, &triples);
        triple_shares.push(if party.id() == 0 { t_0 } else { t_1 });
    }

    party.clear_total_bytes_sent();
    let start = Instant::now();
    for t in triple_shares {
        engine.mul_vec(party, t, &x, &y)?;
    }
    let elapsed = start.elapsed();
    let stats = party.comm_stats();
    let line = format!(
        "[bench] {} x {}-element vector multiplication: {:.3} ms, {} bytes sent, {} rounds",
        iterations,
        N,
        elapsed.as_secs_f64() * 1e3,
        stats.bytes_sent,
        stats.rounds
    );
    println!("{}", line);
    Ok(vec![line])
}

fn main() -> ExitCode {
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    let cli = Cli::parse();
    if cli.party_id > 1 {
        error!("invalid party id {}; it must be 0 or 1", cli.party_id);
        return ExitCode::FAILURE;
    }

    let mut host = network::DEFAULT_HOST;
    let mut port = network::DEFAULT_PORT;
    if let Some(path) = &cli.config {
        match Config::from_file(path) {
            Ok(config) => {
                host = config.host;
                port = config.port;
            }
            Err(err) => {
                error!("cannot load {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        }
    }
    if let Some(server) = cli.server {
        host = server;
    }
    if let Some(p) = cli.port {
        port = p;
    }

    let mut party = match Party::new(CommInfo::new(cli.party_id, host, port)) {
        Ok(party) => party,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = party.start() {
        error!("transport setup failed: {}", err);
        return ExitCode::FAILURE;
    }
    info!("party {} connected", party.id());

    let result = match cli.exec_mode {
        ExecMode::Test => run_tests(&mut party, &cli),
        ExecMode::Bench => run_bench(&mut party, cli.iteration),
    };

    let code = match result {
        Ok(lines) => {
            if let Some(path) = &cli.output {
                if let Err(err) = fs::write(path, lines.join("\n") + "\n") {
                    error!("cannot write {}: {}", path.display(), err);
                    return ExitCode::FAILURE;
                }
                info!("result summary saved to {}", path.display());
            }
            if lines.iter().any(|line| line.contains("[INVALID]")) {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            error!("protocol run failed: {}", err);
            ExitCode::FAILURE
        }
    };

    let _ = party.end();
    let stats = party.comm_stats();
    info!(
        "session closed: {} bytes sent, {} bytes received, {} rounds",
        stats.bytes_sent, stats.bytes_received, stats.rounds
    );
    code
}
