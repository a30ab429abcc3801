use super::Session;
use comfy_table::{presets::UTF8_FULL, Table};
use pick4_core::Address;
use pick4_lottery::{Result, Storage};

pub async fn status(session: &Session<'_>) -> Result<()> {
    let lottery = session.load().await?;
    let config = lottery.config();

    println!("Lottery '{}'", session.name());
    println!("  Admin: {}", lottery.admin());
    println!("  Entry price: {}", config.entry_price);
    println!("  Platform cut: {}%", config.platform_cut_percent);
    println!(
        "  Oracle: {} (fee balance {})",
        lottery.oracle().kind(),
        lottery.oracle_fee_balance()
    );
    println!();

    let round_id = lottery.current_round_id();
    if round_id == 0 {
        println!("No rounds yet. Open one with: pick4 start");
    } else {
        let round = lottery.round(round_id)?;
        println!("Round {}: {}", round.id, round.state);
        println!("  Stake: {}", round.total_stake);
        println!("  Bets: {}", lottery.bets_for_round(round_id).len());
        if let Some(drawn) = round.drawn {
            println!("  Drawn: {}", drawn);
        } else if let Some(request) = &round.draw_request {
            println!("  Awaiting randomness for request {}", request.short());
        }
    }

    println!();
    println!("Retained balance: {}", lottery.get_balance());
    println!("Pool balance: {}", lottery.pool_balance());
    Ok(())
}

pub async fn rounds(session: &Session<'_>, json: bool) -> Result<()> {
    let lottery = session.load().await?;
    let rounds: Vec<_> = lottery.ledger().rounds().collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rounds)?);
        return Ok(());
    }

    if rounds.is_empty() {
        println!("No rounds found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Round", "State", "Stake", "Bets", "Drawn", "Winners", "Prize each", "Retained",
    ]);

    for round in rounds {
        let settlement = round.settlement.as_ref();
        table.add_row(vec![
            round.id.to_string(),
            round.state.to_string(),
            round.total_stake.to_string(),
            lottery.bets_for_round(round.id).len().to_string(),
            round.drawn.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
            settlement
                .map(|s| s.winner_count.to_string())
                .unwrap_or_else(|| "-".to_string()),
            settlement
                .map(|s| s.individual_prize.to_string())
                .unwrap_or_else(|| "-".to_string()),
            settlement
                .map(|s| s.retained.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!("{}", table);
    Ok(())
}

/// A player's balance, or the retained balance when no address is given.
pub async fn balance(session: &Session<'_>, address: Option<Address>) -> Result<()> {
    let lottery = session.load().await?;

    match address {
        Some(address) => println!("{}: {}", address, lottery.balance_of(&address)),
        None => println!("Retained balance: {}", lottery.get_balance()),
    }
    Ok(())
}

pub async fn pending(session: &Session<'_>) -> Result<()> {
    let lottery = session.load().await?;
    let requests = lottery.pending_requests();

    if requests.is_empty() {
        println!("No pending randomness requests.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Request", "Round", "Seed", "Closes round"]);

    for request in requests {
        let closes = lottery
            .round(request.round_id)
            .map(|round| round.draw_request.as_ref() == Some(&request.request_id))
            .unwrap_or(false);
        table.add_row(vec![
            request.request_id.to_string(),
            request.round_id.to_string(),
            request.seed.to_string(),
            (if closes { "yes" } else { "superseded" }).to_string(),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub async fn list(storage: &Storage) -> Result<()> {
    let records = pick4_lottery::LotteryStore::new(storage).list().await?;

    if records.is_empty() {
        println!("No lotteries found.");
        println!("Create one with: pick4 init --admin <address>");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Name", "Admin", "Oracle", "Round", "Open", "Retained", "Updated"]);

    for record in records {
        table.add_row(vec![
            record.name,
            record.admin.to_string(),
            format!("{:?}", record.config.oracle.kind).to_lowercase(),
            record.current_round_id.to_string(),
            (if record.open_round.is_some() { "yes" } else { "no" }).to_string(),
            record.retained.to_string(),
            record.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }

    println!("{}", table);
    Ok(())
}
