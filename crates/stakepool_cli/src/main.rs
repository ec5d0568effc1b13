//! stakepool CLI: define pools, stake, claim, and export/verify state snapshots.

use clap::{Args, Parser, Subcommand};
use stakepool::clock::{format_timestamp, parse_timestamp};
use stakepool::{
    AccountId, AssetId, Clock, Engine, ManualClock, PoolConfig, PoolParams, PoolsFile, Snapshot,
    StateStore, SystemClock, Vault,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Every command runs at one frozen instant.
type CliEngine = Engine<ManualClock, Vault>;

fn main() -> CliResult {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();
    let cli = Cli::parse();
    let now = cli.at.unwrap_or_else(|| SystemClock.now());
    let store = StateStore::open(&cli.db)?;
    match cli.command {
        Command::Init(args) => run_init(&store, now, args),
        Command::CreatePool(args) => run_create_pool(&store, now, args),
        Command::UpdatePool(args) => run_update_pool(&store, now, args),
        Command::Fund(args) => run_fund(&store, now, args),
        Command::FundRewards(args) => run_fund_rewards(&store, now, args),
        Command::Stake(args) => run_stake(&store, now, args),
        Command::Unstake(args) => run_unstake(&store, now, args),
        Command::Claim(args) => run_claim(&store, now, args),
        Command::ClaimAll(args) => run_claim_all(&store, now, args),
        Command::Payout(args) => run_payout(&store, now, args),
        Command::CanUnstake(args) => run_can_unstake(&store, now, args),
        Command::ShowPool(args) => run_show_pool(&store, now, args),
        Command::ShowPosition(args) => run_show_position(&store, now, args),
        Command::Stats(args) => run_stats(&store, now, args),
        Command::History(args) => run_history(&store, args),
        Command::Export(args) => run_export(&store, args),
        Command::Verify(args) => run_verify(args),
    }
}

#[derive(Parser)]
#[command(name = "stakepool")]
#[command(author = "gorusys <goru.connector@outlook.com>")]
#[command(about = "Multi-pool staking ledger with linear time-based rewards")]
struct Cli {
    /// SQLite database holding state snapshots.
    #[arg(long, global = true, default_value = "./data/stakepool.sqlite")]
    db: PathBuf,
    /// Evaluate at this time (Unix seconds or RFC3339) instead of now.
    #[arg(long, global = true, value_parser = parse_time_arg)]
    at: Option<i64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create every pool listed in a pools file.
    Init(InitArgs),
    /// Create one pool starting now.
    CreatePool(CreatePoolArgs),
    /// Replace the mutable parameters of a pool.
    UpdatePool(UpdatePoolArgs),
    /// Credit an account's external balance of an asset.
    Fund(FundArgs),
    /// Credit the engine's reserve of an asset.
    FundRewards(FundRewardsArgs),
    Stake(AmountArgs),
    Unstake(AmountArgs),
    Claim(PositionArgs),
    /// Claim from every pool.
    ClaimAll(AccountArgs),
    /// Reward claimable now.
    Payout(PositionArgs),
    CanUnstake(PositionArgs),
    ShowPool(PoolArgs),
    ShowPosition(ShowPositionArgs),
    /// Per-pool statistics; all pools when no id is given.
    Stats(StatsArgs),
    /// List stored snapshots, newest first.
    History(HistoryArgs),
    /// Write a stored snapshot (the latest by default) and its hash to disk.
    Export(ExportArgs),
    /// Check an exported snapshot against its `.sha256` file.
    Verify(VerifyArgs),
}

#[derive(Parser)]
struct InitArgs {
    /// Pools file; defaults to STAKEPOOL_CONFIG_PATH, ./config/pools.json, ./pools.json.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ParamsArgs {
    #[arg(long)]
    reward_rate: u64,
    #[arg(long)]
    reward_asset: String,
    #[arg(long, default_value_t = 86_400)]
    reward_interval: u64,
    #[arg(long, default_value_t = 0)]
    lock_period: u64,
    /// Unix seconds or RFC3339.
    #[arg(long, value_parser = parse_time_arg)]
    end_time: i64,
}

impl ParamsArgs {
    fn into_params(self) -> PoolParams {
        PoolParams {
            reward_rate: self.reward_rate,
            reward_asset: AssetId::from(self.reward_asset),
            reward_interval: self.reward_interval,
            lock_period: self.lock_period,
            end_time: self.end_time,
        }
    }
}

#[derive(Parser)]
struct CreatePoolArgs {
    #[arg(long)]
    stake_asset: String,
    #[command(flatten)]
    params: ParamsArgs,
}

#[derive(Parser)]
struct UpdatePoolArgs {
    #[arg(long)]
    pool: usize,
    #[command(flatten)]
    params: ParamsArgs,
}

#[derive(Parser)]
struct FundArgs {
    #[arg(long)]
    asset: String,
    #[arg(long)]
    account: String,
    #[arg(long)]
    amount: u64,
}

#[derive(Parser)]
struct FundRewardsArgs {
    #[arg(long)]
    asset: String,
    #[arg(long)]
    amount: u64,
}

#[derive(Parser)]
struct AmountArgs {
    #[arg(long)]
    pool: usize,
    #[arg(long)]
    account: String,
    #[arg(long)]
    amount: u64,
}

#[derive(Parser)]
struct PositionArgs {
    #[arg(long)]
    pool: usize,
    #[arg(long)]
    account: String,
}

#[derive(Parser)]
struct AccountArgs {
    #[arg(long)]
    account: String,
}

#[derive(Parser)]
struct PoolArgs {
    #[arg(long)]
    pool: usize,
}

#[derive(Parser)]
struct ShowPositionArgs {
    #[arg(long)]
    account: String,
    /// Only this pool; every pool the account holds a position in otherwise.
    #[arg(long)]
    pool: Option<usize>,
}

#[derive(Parser)]
struct StatsArgs {
    #[arg(long)]
    pool: Option<usize>,
}

#[derive(Parser)]
struct HistoryArgs {
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

#[derive(Parser)]
struct ExportArgs {
    #[arg(long, default_value = "./data/snapshot.json")]
    out: PathBuf,
    /// Export the snapshot with this hash instead of the latest.
    #[arg(long)]
    state_hash: Option<String>,
}

#[derive(Parser)]
struct VerifyArgs {
    #[arg(long)]
    snapshot: PathBuf,
}

fn parse_time_arg(s: &str) -> Result<i64, String> {
    parse_timestamp(s).map_err(|e| e.to_string())
}

/// Engine over the newest stored snapshot, or an empty one for a fresh database.
fn load_engine(store: &StateStore, now: i64) -> CliResult<CliEngine> {
    let clock = ManualClock::new(now);
    let Some(snapshot) = store.load_latest()? else {
        return Ok(Engine::new(clock, Vault::default()));
    };
    let result = snapshot.verify(None)?;
    if !result.is_ok() {
        return Err(format!(
            "stored snapshot {} failed verification (inconsistent pools: {:?})",
            snapshot.state_hash, result.inconsistent_pools
        )
        .into());
    }
    Ok(Engine::with_state(snapshot.state, clock, snapshot.vault))
}

/// Engine for a command that commits; refuses an `--at` earlier than the last commit.
fn load_engine_for_update(store: &StateStore, now: i64) -> CliResult<CliEngine> {
    let engine = load_engine(store, now)?;
    engine.ensure_clock_monotonic()?;
    Ok(engine)
}

fn save_engine(store: &StateStore, engine: CliEngine) -> CliResult {
    let (state, vault) = engine.into_parts();
    let snapshot = Snapshot::new(state, vault)?;
    let id = store.save(&snapshot)?;
    info!(id, state_hash = %snapshot.state_hash, "snapshot saved");
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_init(store: &StateStore, now: i64, args: InitArgs) -> CliResult {
    let file = match args.config {
        Some(path) => PoolsFile::load_from_path(&path)?,
        None => PoolsFile::load()?,
    };
    let mut engine = load_engine_for_update(store, now)?;
    for config in file.pools {
        let id = engine.create_pool(config)?;
        println!("pool {}", id);
    }
    save_engine(store, engine)?;
    Ok(())
}

fn run_create_pool(store: &StateStore, now: i64, args: CreatePoolArgs) -> CliResult {
    let mut engine = load_engine_for_update(store, now)?;
    let id = engine.create_pool(PoolConfig {
        stake_asset: AssetId::from(args.stake_asset),
        params: args.params.into_params(),
    })?;
    println!("pool {}", id);
    save_engine(store, engine)?;
    Ok(())
}

fn run_update_pool(store: &StateStore, now: i64, args: UpdatePoolArgs) -> CliResult {
    let mut engine = load_engine_for_update(store, now)?;
    engine.update_pool(args.pool, args.params.into_params())?;
    print_json(engine.pool(args.pool)?)?;
    save_engine(store, engine)?;
    Ok(())
}

fn run_fund(store: &StateStore, now: i64, args: FundArgs) -> CliResult {
    let mut engine = load_engine_for_update(store, now)?;
    let asset = AssetId::from(args.asset);
    let account = AccountId::from(args.account);
    engine.custody_mut().deposit(&asset, &account, args.amount)?;
    println!(
        "{}\t{}\t{}",
        account,
        asset,
        engine.custody().balance(&asset, &account)
    );
    save_engine(store, engine)?;
    Ok(())
}

fn run_fund_rewards(store: &StateStore, now: i64, args: FundRewardsArgs) -> CliResult {
    let mut engine = load_engine_for_update(store, now)?;
    let asset = AssetId::from(args.asset);
    engine.custody_mut().fund_reserve(&asset, args.amount)?;
    println!("reserve\t{}\t{}", asset, engine.custody().reserve(&asset));
    save_engine(store, engine)?;
    Ok(())
}

fn run_stake(store: &StateStore, now: i64, args: AmountArgs) -> CliResult {
    let mut engine = load_engine_for_update(store, now)?;
    let receipt = engine.stake(args.pool, &AccountId::from(args.account), args.amount)?;
    print_json(&receipt)?;
    save_engine(store, engine)?;
    Ok(())
}

fn run_unstake(store: &StateStore, now: i64, args: AmountArgs) -> CliResult {
    let mut engine = load_engine_for_update(store, now)?;
    let receipt = engine.unstake(args.pool, &AccountId::from(args.account), args.amount)?;
    print_json(&receipt)?;
    save_engine(store, engine)?;
    Ok(())
}

fn run_claim(store: &StateStore, now: i64, args: PositionArgs) -> CliResult {
    let mut engine = load_engine_for_update(store, now)?;
    let amount = engine.claim(args.pool, &AccountId::from(args.account))?;
    println!("{}", amount);
    save_engine(store, engine)?;
    Ok(())
}

fn run_claim_all(store: &StateStore, now: i64, args: AccountArgs) -> CliResult {
    let mut engine = load_engine_for_update(store, now)?;
    let report = engine.claim_all(&AccountId::from(args.account));
    for claim in &report.settled {
        println!("pool {}\tclaimed {}", claim.pool_id, claim.amount);
    }
    for failure in &report.failed {
        eprintln!("pool {}\tfailed: {}", failure.pool_id, failure.error);
    }
    println!("total\t{}", report.total_claimed());
    save_engine(store, engine)?;
    if !report.is_complete() {
        warn!(failed = report.failed.len(), "claim-all incomplete");
    }
    Ok(())
}

fn run_payout(store: &StateStore, now: i64, args: PositionArgs) -> CliResult {
    let engine = load_engine(store, now)?;
    println!("{}", engine.payout(args.pool, &AccountId::from(args.account))?);
    Ok(())
}

fn run_can_unstake(store: &StateStore, now: i64, args: PositionArgs) -> CliResult {
    let engine = load_engine(store, now)?;
    let account = AccountId::from(args.account);
    let unlocked = engine.can_unstake(args.pool, &account)?;
    match engine.position(args.pool, &account) {
        Some(position) if !unlocked => {
            let lock = engine.pool(args.pool)?.lock_period;
            println!("false\tunlocks at {}", format_timestamp(position.unlock_time(lock)));
        }
        _ => println!("{}", unlocked),
    }
    Ok(())
}

fn run_show_pool(store: &StateStore, now: i64, args: PoolArgs) -> CliResult {
    let engine = load_engine(store, now)?;
    print_json(engine.pool(args.pool)?)
}

fn run_show_position(store: &StateStore, now: i64, args: ShowPositionArgs) -> CliResult {
    let engine = load_engine(store, now)?;
    let account = AccountId::from(args.account);
    match args.pool {
        Some(pool_id) => {
            engine.pool(pool_id)?;
            match engine.position(pool_id, &account) {
                Some(position) => print_json(position)?,
                None => println!("no position"),
            }
        }
        None => {
            let positions: Vec<_> = engine
                .positions_of(&account)
                .map(|(pool_id, position)| {
                    serde_json::json!({ "pool_id": pool_id, "position": position })
                })
                .collect();
            print_json(&positions)?;
        }
    }
    Ok(())
}

fn run_stats(store: &StateStore, now: i64, args: StatsArgs) -> CliResult {
    let engine = load_engine(store, now)?;
    match args.pool {
        Some(pool_id) => print_json(&engine.pool_stats(pool_id)?),
        None => {
            let stats = (0..engine.state().registry.len())
                .map(|pool_id| engine.pool_stats(pool_id))
                .collect::<Result<Vec<_>, _>>()?;
            print_json(&stats)
        }
    }
}

fn sha256_path(snapshot: &Path) -> PathBuf {
    snapshot
        .parent()
        .unwrap_or(Path::new("."))
        .join(format!(
            "{}.sha256",
            snapshot.file_stem().unwrap_or_default().to_string_lossy()
        ))
}

fn run_history(store: &StateStore, args: HistoryArgs) -> CliResult {
    for entry in store.history(args.limit)? {
        println!(
            "{}\t{}\t{}",
            entry.id,
            entry.state_hash,
            format_timestamp(entry.created_utc)
        );
    }
    Ok(())
}

fn run_export(store: &StateStore, args: ExportArgs) -> CliResult {
    let snapshot = match &args.state_hash {
        Some(hash) => store
            .load_by_hash(hash)?
            .ok_or_else(|| format!("no stored snapshot with hash {hash}"))?,
        None => store
            .load_latest()?
            .ok_or("database holds no snapshot yet")?,
    };
    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let hash_path = sha256_path(&args.out);
    std::fs::write(&args.out, serde_json::to_string_pretty(&snapshot)?)?;
    std::fs::write(&hash_path, format!("{}\n", snapshot.state_hash))?;
    info!(out = ?args.out, ?hash_path, "export complete");
    println!("{}", snapshot.state_hash);
    Ok(())
}

fn run_verify(args: VerifyArgs) -> CliResult {
    let json = std::fs::read_to_string(&args.snapshot)?;
    let snapshot = Snapshot::from_json(&json)?;
    let expected = std::fs::read_to_string(sha256_path(&args.snapshot))
        .ok()
        .map(|s| s.trim().to_string());
    let result = snapshot.verify(expected.as_deref())?;
    if result.is_ok() {
        println!("OK\t{}", result.state_hash);
    } else {
        eprintln!(
            "MISMATCH\tcomputed={}\texpected={:?}\tinconsistent_pools={:?}",
            result.state_hash, result.expected_hash, result.inconsistent_pools
        );
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakepool::StakingError;

    const T0: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;

    fn seeded_store() -> StateStore {
        let store = StateStore::open_in_memory().unwrap();
        let alice = AccountId::new("alice");
        let mut engine = load_engine_for_update(&store, T0).unwrap();
        engine
            .custody_mut()
            .deposit(&AssetId::new("STK"), &alice, 1_000)
            .unwrap();
        engine
            .create_pool(PoolConfig {
                stake_asset: AssetId::new("STK"),
                params: PoolParams {
                    reward_rate: 100,
                    reward_asset: AssetId::new("RWD"),
                    reward_interval: 86_400,
                    lock_period: 0,
                    end_time: T0 + 10 * DAY,
                },
            })
            .unwrap();
        save_engine(&store, engine).unwrap();

        let mut engine = load_engine_for_update(&store, T0 + 9 * DAY).unwrap();
        engine.stake(0, &alice, 50).unwrap();
        save_engine(&store, engine).unwrap();
        store
    }

    #[test]
    fn backdated_update_is_refused() {
        let store = seeded_store();
        let err = load_engine_for_update(&store, T0)
            .err()
            .and_then(|e| e.downcast::<StakingError>().ok())
            .map(|e| *e);
        assert_eq!(
            err,
            Some(StakingError::ClockRegression {
                recorded: T0 + 9 * DAY,
                now: T0
            })
        );

        // Read-only commands may still look back.
        let engine = load_engine(&store, T0).unwrap();
        assert!(engine.position(0, &AccountId::new("alice")).is_some());
        assert!(load_engine_for_update(&store, T0 + 9 * DAY).is_ok());
    }

    #[test]
    fn history_lists_every_save_newest_first() {
        let store = seeded_store();
        let history = store.history(10).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].id > history[1].id);

        let oldest = store
            .load_by_hash(&history[1].state_hash)
            .unwrap()
            .unwrap();
        assert!(oldest.state.ledger.get(0, &AccountId::new("alice")).is_none());
        assert_eq!(oldest.state.last_commit_time, Some(T0));
    }
}
