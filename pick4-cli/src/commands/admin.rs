use super::{caller_or_admin, Session};
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use pick4_core::{Address, Amount, LotteryConfig, OracleConfig, RequestId};
use pick4_lottery::{
    Delivery, LotteryError, OracleClient, RandomnessOracle, Result, Settlement,
};

pub async fn init(
    session: &Session<'_>,
    admin: Address,
    price: Amount,
    cut: u8,
    vrf: bool,
) -> Result<()> {
    if session.store().exists(session.name()).await? {
        return Err(LotteryError::internal(format!(
            "Lottery '{}' already exists",
            session.name()
        )));
    }

    let mut config = LotteryConfig::new(price, cut);
    if vrf {
        config = config.with_oracle(OracleConfig::vrf());
    }

    let (lottery, provider) = pick4_lottery::create_lottery(admin, config)?;
    session.save(&lottery).await?;

    println!("Lottery '{}' created.", session.name());
    println!("  Admin: {}", lottery.admin());
    println!("  Entry price: {}", lottery.config().entry_price);
    println!("  Platform cut: {}%", lottery.config().platform_cut_percent);
    println!("  Oracle: {}", lottery.oracle().kind());

    if let Some(provider) = provider {
        session.store().save_provider_key(session.name(), &provider).await?;
        println!("  Provider public key: {}", provider.public_key_hex());
        println!();
        println!("Fund the oracle before drawing: pick4 fund-oracle <amount>");
    }

    Ok(())
}

pub async fn deposit(session: &Session<'_>, address: Address, amount: Amount) -> Result<()> {
    let mut lottery = session.load().await?;
    lottery.deposit(&address, amount)?;
    session.save(&lottery).await?;

    println!(
        "Deposited {} to {}, balance {}",
        amount,
        address,
        lottery.balance_of(&address)
    );
    Ok(())
}

pub async fn fund_oracle(session: &Session<'_>, amount: Amount) -> Result<()> {
    let mut lottery = session.load().await?;
    lottery.fund_oracle(amount)?;
    session.save(&lottery).await?;

    println!("Oracle fee balance: {}", lottery.oracle_fee_balance());
    Ok(())
}

pub async fn start(session: &Session<'_>, caller: Option<Address>) -> Result<()> {
    let mut lottery = session.load().await?;
    let caller = caller_or_admin(caller, &lottery);

    let round_id = lottery.start_round(&caller)?;
    session.save(&lottery).await?;

    println!("Round {} is open for bets.", round_id);
    Ok(())
}

pub async fn draw(session: &Session<'_>, caller: Option<Address>, seed: Option<u64>) -> Result<()> {
    let mut lottery = session.load().await?;
    let caller = caller_or_admin(caller, &lottery);
    let seed = seed.unwrap_or_else(rand::random);

    let request_id = lottery.request_draw(&caller, seed)?;
    session.save(&lottery).await?;

    println!("Draw requested with seed {}.", seed);
    println!("  Request: {}", request_id);
    println!();
    println!("Deliver it with: pick4 fulfill {}", request_id);
    Ok(())
}

/// Act as the oracle: deliver randomness for a pending request.
///
/// The mock oracle echoes `--value`, or the request's seed when omitted. The
/// VRF oracle gets its answer from the stored provider key.
pub async fn fulfill(
    session: &Session<'_>,
    request_id: RequestId,
    value: Option<u128>,
) -> Result<()> {
    let mut lottery = session.load().await?;

    let delivery = match lottery.oracle() {
        OracleClient::Mock(oracle) => {
            let value = match value {
                Some(value) => value,
                None => oracle
                    .request(&request_id)
                    .map(|request| request.seed as u128)
                    .ok_or_else(|| LotteryError::UnknownOrFulfilledRequest(request_id.clone()))?,
            };
            Delivery::Value(value)
        }
        OracleClient::Vrf(oracle) => {
            if value.is_some() {
                tracing::warn!("--value is ignored, the VRF provider answers this request");
            }
            let provider = session
                .store()
                .load_provider(session.name())
                .await?
                .ok_or_else(|| LotteryError::internal("No provider key stored for this lottery"))?;
            let request = oracle
                .request(&request_id)
                .ok_or_else(|| LotteryError::UnknownOrFulfilledRequest(request_id.clone()))?;
            Delivery::Proof(provider.respond(request))
        }
    };

    let settlement = lottery.fulfill_randomness(&request_id, &delivery)?;
    session.save(&lottery).await?;

    print_settlement(&settlement);
    Ok(())
}

pub async fn withdraw(
    session: &Session<'_>,
    caller: Option<Address>,
    recipient: Address,
    yes: bool,
) -> Result<()> {
    let mut lottery = session.load().await?;
    let caller = caller_or_admin(caller, &lottery);

    if !yes {
        let confirm = Confirm::new()
            .with_prompt(format!(
                "Withdraw the retained balance of {} to {}?",
                lottery.get_balance(),
                recipient
            ))
            .default(false)
            .interact()
            .map_err(|e| LotteryError::internal(e.to_string()))?;

        if !confirm {
            println!("Withdrawal cancelled.");
            return Ok(());
        }
    }

    let amount = lottery.withdraw(&caller, &recipient)?;
    session.save(&lottery).await?;

    println!("Withdrew {} to {}.", amount, recipient);
    Ok(())
}

fn print_settlement(settlement: &Settlement) {
    println!(
        "Round {} closed, drawn digits {}.",
        settlement.round_id, settlement.drawn
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Total stake", "Platform cut", "Winners", "Prize each", "Retained"]);
    table.add_row(vec![
        settlement.total_stake.to_string(),
        settlement.platform_cut.to_string(),
        settlement.winner_count.to_string(),
        settlement.individual_prize.to_string(),
        settlement.retained.to_string(),
    ]);
    println!("{}", table);

    for credit in &settlement.credits {
        println!("  {} won {}", credit.player, credit.amount);
    }
}
