use alloy::network::EthereumWallet;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pmt::bridge::Confirmation;
use pmt::royalty::Beneficiary;
use pmt::token::{format_amount, parse_amount};
use pmt::{AppConfig, Dapp, PmtError};

const USAGE: &str = "\
usage: pmt <command> [args]

token:
  status                                  account, network, balance and allowances
  faucet                                  mint test tokens to the account
  transfer <to> <amount>
  approve <escrow|cashback|royalty|0x..> <amount>

escrow:
  escrow-create <provider> <amount>       approves automatically when needed
  escrow-ship <order-id>
  escrow-confirm <order-id>
  escrow-refund <order-id>
  escrow-dispute <order-id>
  escrow-get <order-id>

cashback:
  cashback-pay <recipient> <amount>       approves automatically when needed
  cashback-redeem <points>
  cashback-info

royalties:
  royalty-set <work-id> <address:bps>...
  royalty-distribute <work-id> <amount>   approves automatically when needed
  royalty-preview <work-id> <amount>

environment:
  PRIVATE_KEY, RPC_URL, CHAIN_ID, PAYMENT_TOKEN_ADDRESS, ESCROW_PAYMENT_ADDRESS,
  CASHBACK_REWARDS_ADDRESS, ROYALTY_DISTRIBUTOR_ADDRESS,
  AUTO_APPROVE_BUFFER_PERCENT, AUTO_APPROVE_POLL_MS, AUTO_APPROVE_TIMEOUT_SECS";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,alloy=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args[0] == "help" || args[0] == "--help" {
        println!("{USAGE}");
        return;
    }

    if let Err(e) = run(&args).await {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}

fn connect(config: &AppConfig) -> Result<(DynProvider, Option<Address>), PmtError> {
    let url: alloy::transports::http::reqwest::Url = config
        .chain
        .rpc_url
        .parse()
        .map_err(|e| PmtError::ConfigError(format!("invalid RPC_URL: {e}")))?;

    match &config.private_key {
        Some(key) => {
            let signer: PrivateKeySigner = key
                .parse()
                .map_err(|e| PmtError::ConfigError(format!("invalid PRIVATE_KEY: {e}")))?;
            let account = signer.address();
            let provider = ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer))
                .connect_http(url)
                .erased();
            Ok((provider, Some(account)))
        }
        None => {
            tracing::warn!("PRIVATE_KEY not set; only read-only commands will work");
            Ok((ProviderBuilder::new().connect_http(url).erased(), None))
        }
    }
}

async fn run(args: &[String]) -> Result<(), PmtError> {
    let config = AppConfig::from_env()?;
    let (provider, account) = connect(&config)?;
    let decimals = config.chain.token_decimals;
    let dapp = Dapp::new(provider, account, config.chain.clone(), config.auto_approve.clone());

    let command = args[0].as_str();
    let rest = &args[1..];

    match command {
        "status" => status(&dapp).await,
        "faucet" => report(&dapp, dapp.faucet().await?),
        "transfer" => {
            let to = parse_address(arg(rest, 0, "to")?)?;
            let amount = parse_amount(arg(rest, 1, "amount")?, decimals)?;
            report(&dapp, dapp.transfer(to, amount).await?)
        }
        "approve" => {
            let spender = resolve_spender(&dapp, arg(rest, 0, "spender")?)?;
            let amount = parse_amount(arg(rest, 1, "amount")?, decimals)?;
            report(&dapp, dapp.approve(spender, amount).await?)
        }
        "escrow-create" => {
            let seller = parse_address(arg(rest, 0, "provider")?)?;
            let amount = parse_amount(arg(rest, 1, "amount")?, decimals)?;
            let confirmation = dapp.create_order(seller, amount).await?;
            let order_id = dapp.order_counter().await?;
            println!("latest order id: {order_id}");
            report(&dapp, confirmation)
        }
        "escrow-ship" => report(&dapp, dapp.mark_as_shipped(order_id(rest)?).await?),
        "escrow-confirm" => report(&dapp, dapp.confirm_delivery(order_id(rest)?).await?),
        "escrow-refund" => report(&dapp, dapp.request_refund(order_id(rest)?).await?),
        "escrow-dispute" => report(&dapp, dapp.dispute_order(order_id(rest)?).await?),
        "escrow-get" => {
            let order = dapp.order(order_id(rest)?).await?;
            if !order.exists() {
                return Err(PmtError::InvalidInput(format!(
                    "order {} not found",
                    order.order_id
                )));
            }
            print_json(&order)
        }
        "cashback-pay" => {
            let recipient = parse_address(arg(rest, 0, "recipient")?)?;
            let amount = parse_amount(arg(rest, 1, "amount")?, decimals)?;
            report(&dapp, dapp.pay_with_cashback(amount, recipient).await?)
        }
        "cashback-redeem" => {
            let raw = arg(rest, 0, "points")?;
            let points: U256 = raw
                .parse()
                .map_err(|e| PmtError::InvalidAmount(format!("invalid points {raw}: {e}")))?;
            report(&dapp, dapp.redeem_points(points).await?)
        }
        "cashback-info" => {
            #[derive(Serialize)]
            #[serde(rename_all = "camelCase")]
            struct CashbackInfo {
                points: U256,
                reward_config: pmt::cashback::RewardConfig,
            }
            print_json(&CashbackInfo {
                points: dapp.points().await?,
                reward_config: dapp.reward_config().await?,
            })
        }
        "royalty-set" => {
            let work_id = arg(rest, 0, "work-id")?;
            let beneficiaries = rest[1..]
                .iter()
                .map(|raw| parse_beneficiary(raw))
                .collect::<Result<Vec<_>, _>>()?;
            report(&dapp, dapp.set_beneficiaries(work_id, &beneficiaries).await?)
        }
        "royalty-distribute" => {
            let work_id = arg(rest, 0, "work-id")?;
            let amount = parse_amount(arg(rest, 1, "amount")?, decimals)?;
            report(&dapp, dapp.distribute_royalties(work_id, amount).await?)
        }
        "royalty-preview" => {
            let work_id = arg(rest, 0, "work-id")?;
            let amount = parse_amount(arg(rest, 1, "amount")?, decimals)?;
            for payout in dapp.preview_distribution(work_id, amount).await? {
                println!(
                    "{}  {}",
                    payout.recipient,
                    format_amount(payout.amount, decimals)
                );
            }
            Ok(())
        }
        other => Err(PmtError::InvalidInput(format!(
            "unknown command `{other}` (run `pmt help`)"
        ))),
    }
}

async fn status<P: Provider>(dapp: &Dapp<P>) -> Result<(), PmtError> {
    let chain = dapp.chain();
    let decimals = chain.token_decimals;
    let network = dapp.network_status().await?;

    println!("Network:  chain {} (expected {})", network.current_chain_id, network.expected_chain_id);
    if network.is_wrong(dapp.account().is_some()) {
        println!("WARNING: wallet is on the wrong network; switch to chain {}", chain.chain_id);
    }

    let Some(account) = dapp.account() else {
        println!("Account:  not connected (set PRIVATE_KEY)");
        return Ok(());
    };
    println!("Account:  {account}");
    println!("Balance:  {}", format_amount(dapp.balance().await?, decimals));

    let spenders = [
        ("escrow", Some(chain.escrow)),
        ("cashback", chain.cashback),
        ("royalty", chain.royalty),
    ];
    for (label, spender) in spenders {
        if let Some(spender) = spender {
            let allowance = dapp.allowance(spender).await?;
            println!("Allowance ({label}): {}", format_amount(allowance, decimals));
        }
    }
    Ok(())
}

fn report<P: Provider>(dapp: &Dapp<P>, confirmation: Confirmation) -> Result<(), PmtError> {
    println!("Confirmed: {}", confirmation.tx_hash);
    if let Some(block) = confirmation.block_number {
        println!("  block:   {block}");
    }
    println!("  {}", dapp.tx_url(&confirmation.tx_hash));
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), PmtError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str, PmtError> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| PmtError::InvalidInput(format!("missing argument <{name}>")))
}

fn parse_address(raw: &str) -> Result<Address, PmtError> {
    raw.parse()
        .map_err(|e| PmtError::InvalidInput(format!("invalid address {raw}: {e}")))
}

fn order_id(args: &[String]) -> Result<U256, PmtError> {
    let raw = arg(args, 0, "order-id")?;
    raw.parse()
        .map_err(|e| PmtError::InvalidInput(format!("invalid order id {raw}: {e}")))
}

fn parse_beneficiary(raw: &str) -> Result<Beneficiary, PmtError> {
    let (address, bps) = raw
        .split_once(':')
        .ok_or_else(|| PmtError::InvalidInput(format!("expected <address:bps>, got {raw}")))?;
    Ok(Beneficiary {
        address: parse_address(address)?,
        share_bps: bps
            .parse()
            .map_err(|e| PmtError::InvalidInput(format!("invalid share {bps}: {e}")))?,
    })
}

fn resolve_spender<P: Provider>(dapp: &Dapp<P>, raw: &str) -> Result<Address, PmtError> {
    let chain = dapp.chain();
    let missing = |name: &str| PmtError::ConfigError(format!("{name} is not configured"));
    match raw {
        "escrow" => Ok(chain.escrow),
        "cashback" => chain.cashback.ok_or_else(|| missing("CASHBACK_REWARDS_ADDRESS")),
        "royalty" => chain.royalty.ok_or_else(|| missing("ROYALTY_DISTRIBUTOR_ADDRESS")),
        other => parse_address(other),
    }
}
