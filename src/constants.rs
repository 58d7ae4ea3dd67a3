/// Program IDs and well-known addresses for fee-event classification
///
/// Swap-router detection needs the program IDs of the aggregators and DEXes
/// that creators route through when converting collected fees into their own
/// token before burning it.

// =============================================================================
// SWAP ROUTER PROGRAM IDS
// =============================================================================

/// Jupiter - main DEX aggregator program
pub const JUPITER_V6_PROGRAM_ID: &str = "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4";
pub const JUPITER_V4_PROGRAM_ID: &str = "JUP4Fb2cqiRUcaTHdrPC8h2gNsA2ETXiPDD33WcGuJB";

/// Raydium DEX variants
pub const RAYDIUM_CPMM_PROGRAM_ID: &str = "CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C";
pub const RAYDIUM_LEGACY_AMM_PROGRAM_ID: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";

/// PumpFun variants
pub const PUMP_FUN_AMM_PROGRAM_ID: &str = "pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA";
pub const PUMP_FUN_LEGACY_PROGRAM_ID: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

/// All program IDs treated as swap-router evidence during classification
pub const SWAP_ROUTER_PROGRAM_IDS: &[&str] = &[
    JUPITER_V6_PROGRAM_ID,
    JUPITER_V4_PROGRAM_ID,
    RAYDIUM_CPMM_PROGRAM_ID,
    RAYDIUM_LEGACY_AMM_PROGRAM_ID,
    PUMP_FUN_AMM_PROGRAM_ID,
    PUMP_FUN_LEGACY_PROGRAM_ID,
];

/// Keywords in a transaction description that indicate a swap router was used
pub const SWAP_DESCRIPTION_KEYWORDS: &[&str] = &["jupiter", "raydium", "swap", "pump"];

// =============================================================================
// BURN ADDRESSES
// =============================================================================

/// The Solana incinerator - tokens sent here are unspendable
pub const INCINERATOR_ADDRESS: &str = "1nc1nerator11111111111111111111111111111111";

/// System-program address used as a burn sink by some tooling
pub const SYSTEM_BURN_ADDRESS: &str = "11111111111111111111111111111111";

/// Addresses treated as token-burn destinations
pub const BURN_ADDRESSES: &[&str] = &[INCINERATOR_ADDRESS, SYSTEM_BURN_ADDRESS];

// =============================================================================
// FEE VAULT DERIVATION
// =============================================================================

/// PumpFun program owning the per-creator fee vault PDAs
pub const PUMP_FEE_PROGRAM_ID: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

/// Seed prefix for the creator fee vault PDA
pub const FEE_VAULT_SEED: &[u8] = b"creator-vault";

// =============================================================================
// DETECTION FUNCTIONS
// =============================================================================

/// Check if a program ID belongs to a known swap router
pub fn is_swap_router_program(program_id: &str) -> bool {
    SWAP_ROUTER_PROGRAM_IDS.contains(&program_id)
}

/// Check if an address is a recognized burn destination
pub fn is_burn_address(address: &str) -> bool {
    BURN_ADDRESSES.contains(&address)
}

/// Check if a human-readable description mentions a known swap router
pub fn description_mentions_swap(description: &str) -> bool {
    let lower = description.to_lowercase();
    SWAP_DESCRIPTION_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_router_detection() {
        assert!(is_swap_router_program(JUPITER_V6_PROGRAM_ID));
        assert!(is_swap_router_program(PUMP_FUN_AMM_PROGRAM_ID));
        assert!(!is_swap_router_program("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"));
    }

    #[test]
    fn test_description_keywords() {
        assert!(description_mentions_swap("Swapped 1 SOL via Jupiter"));
        assert!(description_mentions_swap("RAYDIUM route"));
        assert!(!description_mentions_swap("Transferred 1 SOL to wallet"));
    }
}
