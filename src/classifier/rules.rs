/// Fee-event classification rules
///
/// Pure decision ladder over one parsed transaction plus the known vault and
/// creator-wallet addresses. First match wins - the order encodes a priority,
/// not a set of independent rules.
use super::amounts::coerce_amount;
use super::types::*;
use crate::constants::{description_mentions_swap, is_burn_address, is_swap_router_program};

/// Classify one transaction into zero-or-one fee event
///
/// Returns `None` for failed transactions, transactions without a relevant
/// native transfer, and creator-funded vault top-ups. Never fails: malformed
/// amounts degrade to zero through the safe coercion.
pub fn classify(
    tx: &ParsedTransaction,
    vault_address: &str,
    creator_wallet: &str,
    token_mint: &str,
) -> Option<ClassifiedEvent> {
    // Failed transactions carry no fee semantics
    if tx.transaction_error.is_some() {
        return None;
    }

    // Inflow to the vault from anyone but the creator is a fee collection.
    // The creator funding their own vault is excluded.
    if let Some(inflow) = tx
        .native_transfers
        .iter()
        .find(|t| t.to_user_account == vault_address && t.from_user_account != creator_wallet)
    {
        return Some(make_event(tx, FeeEventType::Collect, coerce_amount(&inflow.amount), None));
    }

    // Everything below concerns funds leaving the vault
    let outflow = tx
        .native_transfers
        .iter()
        .find(|t| t.from_user_account == vault_address)?;
    let outflow_amount = coerce_amount(&outflow.amount);

    let swap_detected = has_swap_pattern(tx);

    // Swap pattern plus burn evidence on the tracked mint: fees were converted
    // and destroyed
    if swap_detected {
        if let Some(burned) = find_burn_evidence(tx, token_mint) {
            return Some(make_event(tx, FeeEventType::Burn, outflow_amount, Some(burned)));
        }
    }

    // Outflow straight to the creator wallet
    if outflow.to_user_account == creator_wallet {
        return Some(make_event(tx, FeeEventType::Withdraw, outflow_amount, None));
    }

    // Second burn path: swap pattern with a transfer into a burn address,
    // evaluated independently of the mint/instruction evidence above
    if swap_detected {
        if let Some(burned) = find_burn_sink_transfer(tx) {
            return Some(make_event(tx, FeeEventType::Burn, outflow_amount, Some(burned)));
        }
    }

    // Unexplained vault outflow is treated as an extraction, not dropped
    Some(make_event(tx, FeeEventType::Withdraw, outflow_amount, None))
}

/// Apply the classifier over an ordered sequence, dropping unclassifiable
/// transactions and preserving input order
pub fn classify_batch(
    txs: &[ParsedTransaction],
    vault_address: &str,
    creator_wallet: &str,
    token_mint: &str,
) -> Vec<ClassifiedEvent> {
    txs.iter()
        .filter_map(|tx| classify(tx, vault_address, creator_wallet, token_mint))
        .collect()
}

// =============================================================================
// SWAP PATTERN DETECTION
// =============================================================================

/// A swap pattern is a known router program invocation or a description
/// mentioning a known router
fn has_swap_pattern(tx: &ParsedTransaction) -> bool {
    if tx
        .instructions
        .iter()
        .any(|ix| is_swap_router_program(&ix.program_id))
    {
        return true;
    }

    tx.description
        .as_deref()
        .map(description_mentions_swap)
        .unwrap_or(false)
}

// =============================================================================
// BURN EVIDENCE
// =============================================================================

/// Burned mint and amount extracted from whichever evidence matched
struct BurnedToken {
    mint: String,
    amount: u64,
}

/// Burn evidence tied to the tracked mint: a burn instruction on it, a
/// transfer of it to a burn address, or an explicit burn-amount annotation
fn find_burn_evidence(tx: &ParsedTransaction, token_mint: &str) -> Option<BurnedToken> {
    // Burn instruction naming the tracked mint
    if let Some(ix) = tx.instructions.iter().find(|ix| {
        ix.instruction_name
            .as_deref()
            .map(|name| name.eq_ignore_ascii_case("burn"))
            .unwrap_or(false)
            && ix.mint.as_deref() == Some(token_mint)
    }) {
        return Some(BurnedToken {
            mint: token_mint.to_string(),
            amount: coerce_amount(&ix.amount),
        });
    }

    // Tracked mint sent to a burn address
    if let Some(transfer) = tx
        .token_transfers
        .iter()
        .find(|t| t.mint == token_mint && is_burn_address(&t.to_user_account))
    {
        return Some(BurnedToken {
            mint: transfer.mint.clone(),
            amount: coerce_amount(&transfer.token_amount),
        });
    }

    // Explicit burn-amount annotation from the upstream parser
    if let Some(burn) = tx.events.as_ref().and_then(|e| e.burn.as_ref()) {
        return Some(BurnedToken {
            mint: burn.mint.clone(),
            amount: coerce_amount(&burn.amount),
        });
    }

    None
}

/// Any token transfer landing on a burn address, regardless of mint.
/// Kept separate from `find_burn_evidence` - the two paths qualify slightly
/// different transactions near the boundary and are both load-bearing.
fn find_burn_sink_transfer(tx: &ParsedTransaction) -> Option<BurnedToken> {
    tx.token_transfers
        .iter()
        .find(|t| is_burn_address(&t.to_user_account))
        .map(|t| BurnedToken {
            mint: t.mint.clone(),
            amount: coerce_amount(&t.token_amount),
        })
}

// =============================================================================
// EVENT CONSTRUCTION
// =============================================================================

fn make_event(
    tx: &ParsedTransaction,
    event_type: FeeEventType,
    amount_lamports: u64,
    burned: Option<BurnedToken>,
) -> ClassifiedEvent {
    ClassifiedEvent {
        event_type,
        amount_lamports,
        signature: tx.signature.clone(),
        slot: tx.slot,
        block_time: ClassifiedEvent::block_time_from_unix(tx.timestamp),
        burned_token_mint: burned.as_ref().map(|b| b.mint.clone()),
        burned_token_amount: burned.as_ref().map(|b| b.amount),
        recovered: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{INCINERATOR_ADDRESS, JUPITER_V6_PROGRAM_ID};
    use serde_json::json;

    const VAULT: &str = "Vau1t111111111111111111111111111111111111111";
    const WALLET: &str = "Crea1or1111111111111111111111111111111111111";
    const MINT: &str = "Mint1111111111111111111111111111111111111111";
    const OTHER: &str = "0ther111111111111111111111111111111111111111";

    fn native(from: &str, to: &str, amount: serde_json::Value) -> NativeTransfer {
        NativeTransfer {
            from_user_account: from.to_string(),
            to_user_account: to.to_string(),
            amount,
        }
    }

    fn base_tx(signature: &str) -> ParsedTransaction {
        ParsedTransaction {
            signature: signature.to_string(),
            slot: 1000,
            timestamp: Some(1_700_000_000),
            ..Default::default()
        }
    }

    #[test]
    fn test_failed_transaction_produces_no_event() {
        let mut tx = base_tx("sig-failed");
        tx.transaction_error = Some(json!({"InstructionError": [0, "Custom"]}));
        tx.native_transfers = vec![native(OTHER, VAULT, json!(1_000_000))];
        assert!(classify(&tx, VAULT, WALLET, MINT).is_none());
    }

    #[test]
    fn test_vault_inflow_is_collect() {
        let mut tx = base_tx("sig-collect");
        tx.native_transfers = vec![native(OTHER, VAULT, json!(1_000_000_000u64))];
        let event = classify(&tx, VAULT, WALLET, MINT).unwrap();
        assert_eq!(event.event_type, FeeEventType::Collect);
        assert_eq!(event.amount_lamports, 1_000_000_000);
        assert!(event.burned_token_mint.is_none());
    }

    #[test]
    fn test_creator_funding_vault_is_not_collect() {
        let mut tx = base_tx("sig-topup");
        tx.native_transfers = vec![native(WALLET, VAULT, json!(5_000_000))];
        assert!(classify(&tx, VAULT, WALLET, MINT).is_none());
    }

    #[test]
    fn test_no_relevant_transfer_produces_no_event() {
        let mut tx = base_tx("sig-unrelated");
        tx.native_transfers = vec![native(OTHER, WALLET, json!(123))];
        assert!(classify(&tx, VAULT, WALLET, MINT).is_none());
    }

    #[test]
    fn test_vault_outflow_to_creator_is_withdraw() {
        let mut tx = base_tx("sig-withdraw");
        tx.native_transfers = vec![native(VAULT, WALLET, json!(900_000_000u64))];
        let event = classify(&tx, VAULT, WALLET, MINT).unwrap();
        assert_eq!(event.event_type, FeeEventType::Withdraw);
        assert_eq!(event.amount_lamports, 900_000_000);
    }

    #[test]
    fn test_swap_with_burn_annotation_is_burn() {
        let mut tx = base_tx("sig-burn-annotated");
        tx.native_transfers = vec![native(VAULT, OTHER, json!(2_000_000_000u64))];
        tx.instructions = vec![InstructionInfo {
            program_id: JUPITER_V6_PROGRAM_ID.to_string(),
            ..Default::default()
        }];
        tx.events = Some(TransactionEvents {
            burn: Some(BurnAnnotation {
                mint: MINT.to_string(),
                amount: json!(50_000),
            }),
        });
        let event = classify(&tx, VAULT, WALLET, MINT).unwrap();
        assert_eq!(event.event_type, FeeEventType::Burn);
        assert_eq!(event.amount_lamports, 2_000_000_000);
        assert_eq!(event.burned_token_mint.as_deref(), Some(MINT));
        assert_eq!(event.burned_token_amount, Some(50_000));
    }

    #[test]
    fn test_swap_with_incinerator_transfer_of_tracked_mint_is_burn() {
        let mut tx = base_tx("sig-burn-incinerator");
        tx.native_transfers = vec![native(VAULT, OTHER, json!(1_500_000_000u64))];
        tx.description = Some("Swapped SOL for tokens via Jupiter".to_string());
        tx.token_transfers = vec![TokenTransfer {
            from_user_account: WALLET.to_string(),
            to_user_account: INCINERATOR_ADDRESS.to_string(),
            mint: MINT.to_string(),
            token_amount: json!("75000"),
        }];
        let event = classify(&tx, VAULT, WALLET, MINT).unwrap();
        assert_eq!(event.event_type, FeeEventType::Burn);
        assert_eq!(event.burned_token_amount, Some(75_000));
    }

    #[test]
    fn test_swap_outflow_to_creator_without_burn_evidence_is_withdraw() {
        // Swap markers alone do not make a burn
        let mut tx = base_tx("sig-swap-withdraw");
        tx.native_transfers = vec![native(VAULT, WALLET, json!(300_000_000u64))];
        tx.instructions = vec![InstructionInfo {
            program_id: JUPITER_V6_PROGRAM_ID.to_string(),
            ..Default::default()
        }];
        let event = classify(&tx, VAULT, WALLET, MINT).unwrap();
        assert_eq!(event.event_type, FeeEventType::Withdraw);
    }

    #[test]
    fn test_second_burn_path_matches_untracked_mint_sink_transfer() {
        // Step-six path: the transfer into the burn sink is a different mint,
        // so the tracked-mint evidence check does not fire
        let mut tx = base_tx("sig-burn-other-mint");
        tx.native_transfers = vec![native(VAULT, OTHER, json!(400_000_000u64))];
        tx.description = Some("pump swap".to_string());
        tx.token_transfers = vec![TokenTransfer {
            from_user_account: OTHER.to_string(),
            to_user_account: INCINERATOR_ADDRESS.to_string(),
            mint: "An0therMint111111111111111111111111111111111".to_string(),
            token_amount: json!(10),
        }];
        let event = classify(&tx, VAULT, WALLET, MINT).unwrap();
        assert_eq!(event.event_type, FeeEventType::Burn);
        assert_eq!(
            event.burned_token_mint.as_deref(),
            Some("An0therMint111111111111111111111111111111111")
        );
    }

    #[test]
    fn test_unexplained_vault_outflow_defaults_to_withdraw() {
        let mut tx = base_tx("sig-unknown-outflow");
        tx.native_transfers = vec![native(VAULT, OTHER, json!(250_000_000u64))];
        let event = classify(&tx, VAULT, WALLET, MINT).unwrap();
        assert_eq!(event.event_type, FeeEventType::Withdraw);
        assert_eq!(event.amount_lamports, 250_000_000);
    }

    #[test]
    fn test_malformed_amount_degrades_to_zero() {
        let mut tx = base_tx("sig-malformed");
        tx.native_transfers = vec![native(OTHER, VAULT, json!("not-a-number"))];
        let event = classify(&tx, VAULT, WALLET, MINT).unwrap();
        assert_eq!(event.event_type, FeeEventType::Collect);
        assert_eq!(event.amount_lamports, 0);
    }

    #[test]
    fn test_missing_block_time_degrades_to_epoch_zero() {
        let mut tx = base_tx("sig-no-time");
        tx.timestamp = None;
        tx.native_transfers = vec![native(OTHER, VAULT, json!(1))];
        let event = classify(&tx, VAULT, WALLET, MINT).unwrap();
        assert_eq!(event.block_time.timestamp(), 0);
    }

    #[test]
    fn test_batch_preserves_order_and_drops_none() {
        let mut collect = base_tx("sig-1");
        collect.native_transfers = vec![native(OTHER, VAULT, json!(100))];
        let mut failed = base_tx("sig-2");
        failed.transaction_error = Some(json!("err"));
        let mut withdraw = base_tx("sig-3");
        withdraw.native_transfers = vec![native(VAULT, WALLET, json!(60))];

        let events = classify_batch(&[collect, failed, withdraw], VAULT, WALLET, MINT);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].signature, "sig-1");
        assert_eq!(events[1].signature, "sig-3");
    }
}
