use super::Session;
use pick4_core::{Address, Amount};
use pick4_lottery::Result;

/// Buy a guess on the open round, paying out of the player's balance.
pub async fn bet(
    session: &Session<'_>,
    player: Address,
    digits: [u8; 4],
    amount: Option<Amount>,
) -> Result<()> {
    let mut lottery = session.load().await?;
    let paid = amount.unwrap_or(lottery.config().entry_price);

    let index = lottery.place_bet(&player, digits, paid)?;
    session.save(&lottery).await?;

    let round_id = lottery.current_round_id();
    println!(
        "Bet #{} by {} on round {}: {}{}{}{}",
        index, player, round_id, digits[0], digits[1], digits[2], digits[3]
    );
    println!(
        "  Round stake: {}, your balance: {}",
        lottery.total_stake(round_id)?,
        lottery.balance_of(&player)
    );
    Ok(())
}
