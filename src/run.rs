/// Command dispatch for the `swapengine` binary
use crate::arguments::{Cli, Command, ConfigAction, SwapArgs};
use crate::config::{
    self, AmmRouterConfig, Config, PoolConfig, TokenConfig, MAINNET_WETH, UNISWAP_V2_ROUTER,
};
use crate::logger::{self, LogTag};
use crate::rpc::{ChainClient, HttpRpcClient, SimulatedChain};
use crate::swaps::{SwapEngine, SwapMode, SwapResult};
use crate::tokens::{format_amount, parse_address, to_raw_units, wei_to_gwei, Token};
use crate::wallet::{check_token_balance, WalletSigner};
use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use ethers::types::{Address, U256};
use rand::Rng;
use std::path::Path;
use std::sync::Arc;

pub async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(crate::paths::get_config_path);

    match &cli.command {
        Command::Config { action } => return run_config(action, config_path.as_path()),
        Command::Demo => return run_demo(cli.dry_run).await,
        _ => {}
    }

    let mut config = config::load_config_from_path(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if cli.dry_run {
        config.swaps.dry_run = true;
    }

    let chain: Arc<dyn ChainClient> = Arc::new(HttpRpcClient::from_config(&config.network)?);
    let signer = match WalletSigner::from_private_key(&config.wallet.private_key, config.network.chain_id) {
        Ok(signer) => Some(signer),
        Err(e) if needs_wallet(&cli.command) => return Err(e).context("wallet.private_key"),
        Err(_) => None,
    };
    let engine = SwapEngine::from_config(config, chain, signer)?;

    match &cli.command {
        Command::Balance { token, owner } => balance(&engine, token, owner.as_deref()).await,
        Command::Quote(args) => quote(&engine, args).await,
        Command::Compare(args) => compare(&engine, args).await,
        Command::Simulate(args) => simulate(&engine, args).await,
        Command::Swap(args) => {
            let request = build_request(&engine, args).await?;
            print_result(&engine, &engine.swap(&request).await?);
            Ok(())
        }
        Command::Buy {
            token,
            amount,
            slippage_bps,
        } => {
            print_result(&engine, &engine.buy(token, amount, *slippage_bps).await?);
            Ok(())
        }
        Command::Sell {
            token,
            percent,
            slippage_bps,
        } => {
            print_result(&engine, &engine.sell(token, *percent, *slippage_bps).await?);
            Ok(())
        }
        Command::Config { .. } | Command::Demo => Ok(()),
    }
}

fn needs_wallet(command: &Command) -> bool {
    matches!(
        command,
        Command::Swap(_) | Command::Buy { .. } | Command::Sell { .. }
    )
}

fn run_config(action: &ConfigAction, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Init { force } => {
            config::write_default_config(path, *force)?;
            println!("{} {}", "Wrote default config to".green(), path.display());
        }
        ConfigAction::Show => {
            let config = config::load_config_from_path(path)?;
            println!("{}", config::to_toml(&config)?);
        }
        ConfigAction::Validate => {
            config::load_config_from_path(path)
                .with_context(|| format!("{} is invalid", path.display()))?;
            println!("{} {}", "Config OK:".green(), path.display());
        }
    }
    Ok(())
}

async fn build_request(engine: &SwapEngine, args: &SwapArgs) -> Result<crate::swaps::QuoteRequest> {
    let mode = if args.exact_out {
        SwapMode::ExactOut
    } else {
        SwapMode::ExactIn
    };
    Ok(engine
        .build_request(&args.from, &args.to, &args.amount, args.slippage_bps, mode)
        .await?)
}

async fn balance(engine: &SwapEngine, token: &str, owner: Option<&str>) -> Result<()> {
    let owner = match owner {
        Some(owner) => parse_address(owner)?,
        None => engine
            .wallet_address()
            .context("pass --owner or set wallet.private_key")?,
    };
    let token = engine.resolve_token(token).await?;
    let line = check_token_balance(engine.chain().as_ref(), &token, owner).await?;
    println!("{:?}: {}", owner, line.bold());
    Ok(())
}

async fn quote(engine: &SwapEngine, args: &SwapArgs) -> Result<()> {
    let request = build_request(engine, args).await?;
    let (selection, plan) = engine.plan(&request).await?;
    let best = &selection.best;
    println!("{}", "Best route".bold());
    println!("  {}", plan.describe());
    println!(
        "  in  {}",
        format_amount(plan.input_amount(), request.input.decimals, &request.input.symbol)
    );
    println!(
        "  out {}",
        format_amount(plan.output_amount(), request.output.decimals, &request.output.symbol)
    );
    println!(
        "  min {}  (slippage {} bps)",
        format_amount(plan.min_output()?, request.output.decimals, &request.output.symbol),
        request.slippage_bps
    );
    println!(
        "  gas {} @ {:.2} gwei, impact {:.3}%",
        plan.gas_estimate(),
        wei_to_gwei(selection.gas_price),
        plan.price_impact_pct()
    );
    if plan.is_split() {
        println!(
            "  best single route: {} ({})",
            best.quote.route_plan, best.quote.router_name
        );
    }
    println!(
        "  {} candidates, {} rejected",
        selection.candidates.len(),
        selection.rejected.len()
    );
    Ok(())
}

async fn compare(engine: &SwapEngine, args: &SwapArgs) -> Result<()> {
    let request = build_request(engine, args).await?;
    let selection = engine.quote(&request).await?;
    let scored = match request.swap_mode {
        SwapMode::ExactIn => &request.output,
        SwapMode::ExactOut => &request.input,
    };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header([
        "Router", "Input", "Output", "Net of gas", "Gas", "Impact", "Route",
    ]);
    for (rank, candidate) in selection.candidates.iter().enumerate() {
        let quote = &candidate.quote;
        let marker = if rank == 0 { " *" } else { "" };
        table.add_row([
            format!("{}{}", quote.router_name, marker),
            format_amount(quote.input_amount, quote.input.decimals, &quote.input.symbol),
            format_amount(quote.output_amount, quote.output.decimals, &quote.output.symbol),
            match candidate.gas_cost_in_token {
                Some(_) => format_amount(candidate.net_amount, scored.decimals, &scored.symbol),
                None => "n/a".to_string(),
            },
            quote.gas_estimate.to_string(),
            format!("{:.3}%", quote.price_impact_pct),
            quote.route_plan.clone(),
        ]);
    }
    for (router, reason) in &selection.rejected {
        table.add_row([
            router.clone(),
            "-".to_string(),
            "-".to_string(),
            "-".to_string(),
            "-".to_string(),
            "-".to_string(),
            reason.clone(),
        ]);
    }
    println!("{}", table);
    Ok(())
}

async fn simulate(engine: &SwapEngine, args: &SwapArgs) -> Result<()> {
    let request = build_request(engine, args).await?;
    let report = engine.simulate(&request).await?;
    println!("{}", "Simulation".bold());
    for line in report.lines() {
        if line.starts_with("Warning") {
            println!("  {}", line.yellow());
        } else {
            println!("  {}", line);
        }
    }
    Ok(())
}

fn print_result(engine: &SwapEngine, result: &SwapResult) {
    let native = engine.native_token();
    let header = if result.dry_run {
        "DRY RUN".yellow().bold()
    } else {
        "SWAP OK".green().bold()
    };
    println!("{} {}", header, result.summary());
    println!(
        "  minimum {}  gas {}",
        format_amount(result.min_output, result.output.decimals, &result.output.symbol),
        format_amount(result.gas_cost_wei, native.decimals, &native.symbol)
    );
    for tx in &result.transactions {
        println!(
            "  {:<28} nonce {:<4} {:?}{}",
            tx.label,
            tx.nonce,
            tx.hash,
            if tx.broadcast { "" } else { " (not sent)" }
        );
    }
}

// =============================================================================
// DEMO
// =============================================================================

const DEMO_USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
const DEMO_SUSHI_ROUTER: &str = "0xd9e1cE17f2641f24aE83637ab66a2cca9C378B9F";

fn demo_pool(pair: Address, weth: Address, usdc: Address, weth_reserve: U256, usdc_reserve: U256) -> PoolConfig {
    PoolConfig {
        address: format!("{:?}", pair),
        token0: format!("{:?}", weth),
        token1: format!("{:?}", usdc),
        reserve0: weth_reserve.to_string(),
        reserve1: usdc_reserve.to_string(),
    }
}

/// Balance check, buy 0.01 ETH of USDC, sell half of it, all on an in-memory
/// chain with two V2 routers and a fresh random wallet
async fn run_demo(dry_run: bool) -> Result<()> {
    let weth = parse_address(MAINNET_WETH)?;
    let usdc = parse_address(DEMO_USDC)?;
    let uni_router = parse_address(UNISWAP_V2_ROUTER)?;
    let sushi_router = parse_address(DEMO_SUSHI_ROUTER)?;
    let uni_pair = Address::from_low_u64_be(0x1001);
    let sushi_pair = Address::from_low_u64_be(0x1002);

    let eth = |n: u64| U256::from(n) * U256::exp10(18);
    let usd = |n: u64| U256::from(n) * U256::exp10(6);

    let chain = Arc::new(SimulatedChain::new(1));
    chain.add_token(weth, "WETH", 18);
    chain.add_token(usdc, "USDC", 6);
    chain.add_pair(uni_pair, weth, usdc, eth(1_000), usd(2_000_000));
    chain.add_pair(sushi_pair, weth, usdc, eth(400), usd(800_000));
    chain.add_router(uni_router, weth, 30, &[uni_pair]);
    chain.add_router(sushi_router, weth, 30, &[sushi_pair]);

    let signer = WalletSigner::random(1);
    let owner = signer.address();
    let starting_eth = rand::thread_rng().gen_range(1..=5u64);
    chain.set_native_balance(owner, eth(starting_eth));

    let mut config = Config::default();
    config.tokens = vec![TokenConfig {
        address: DEMO_USDC.to_string(),
        symbol: "USDC".to_string(),
        decimals: 6,
    }];
    let mut uniswap = AmmRouterConfig::default();
    uniswap.pools = vec![demo_pool(uni_pair, weth, usdc, eth(1_000), usd(2_000_000))];
    let mut sushiswap = AmmRouterConfig::default();
    sushiswap.id = "sushiswap".to_string();
    sushiswap.name = "SushiSwap".to_string();
    sushiswap.router_address = DEMO_SUSHI_ROUTER.to_string();
    sushiswap.priority = 1;
    sushiswap.pools = vec![demo_pool(sushi_pair, weth, usdc, eth(400), usd(800_000))];
    config.routers.amm = vec![uniswap, sushiswap];
    config.swaps.dry_run = dry_run;
    config.swaps.retry_delay_secs = 0;

    logger::info(
        LogTag::System,
        &format!("Demo wallet {:?} funded with {} ETH", owner, starting_eth),
    );

    let client: Arc<dyn ChainClient> = chain.clone();
    let engine = SwapEngine::from_config(config, client, Some(signer))?;
    let native = engine.native_token();
    let usdc_token = Token::new(usdc, "USDC", 6);

    print_demo_balances(&engine, owner, &native, &usdc_token).await?;

    println!("\n{}", "Buying 0.01 ETH of USDC".bold());
    print_result(&engine, &engine.buy("USDC", "0.01", None).await?);
    print_demo_balances(&engine, owner, &native, &usdc_token).await?;

    if dry_run {
        logger::info(LogTag::System, "Dry run: nothing was bought, skipping the sell step");
    } else {
        println!("\n{}", "Selling 50% of USDC".bold());
        print_result(&engine, &engine.sell("USDC", 50.0, None).await?);
        print_demo_balances(&engine, owner, &native, &usdc_token).await?;
    }

    let stats = engine.stats().await;
    println!(
        "\n{} {} swaps, {} dry runs, {:.0}% success, avg {:.1}ms",
        "Stats:".bold(),
        stats.total_swaps,
        stats.dry_runs,
        stats.success_rate(),
        stats.average_swap_time_ms
    );
    println!(
        "{} {} transactions on the simulated chain",
        "Chain:".bold(),
        chain.sent_transactions().len()
    );
    let dust = to_raw_units("0.000001", 18)?;
    if chain.native_balance_of(owner) < dust {
        logger::warning(LogTag::Wallet, "Demo wallet ran out of ETH");
    }
    Ok(())
}

async fn print_demo_balances(engine: &SwapEngine, owner: Address, native: &Token, usdc: &Token) -> Result<()> {
    let chain = engine.chain().as_ref();
    println!(
        "Balances: {} | {}",
        check_token_balance(chain, native, owner).await?,
        check_token_balance(chain, usdc, owner).await?
    );
    Ok(())
}
