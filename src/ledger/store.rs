/// Persistent store behind the ledger and chain manager
///
/// `FeeStore` is the seam between the core and the relational store: sqlite
/// in production, an in-memory fake in tests. Each write is atomic and
/// independent; event inserts dedup on signature via the unique constraint.
use crate::badges::{self, BadgeTier};
use crate::chain::PohRecord;
use crate::classifier::{ClassifiedEvent, EventStats, FeeEventType};
use crate::logger::{self, LogTag};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

// =============================================================================
// TOKEN ACCOUNT
// =============================================================================

/// Aggregate root - one per tracked mint, recomputed from the event log
#[derive(Debug, Clone, PartialEq)]
pub struct TokenAccount {
    pub mint: String,
    pub creator_wallet: String,
    pub vault_address: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub total_collected: u64,
    pub total_burned: u64,
    pub total_withdrawn: u64,
    pub total_held: u64,
    pub burn_percentage: f64,
    pub badge_tier: BadgeTier,
    pub updated_at: DateTime<Utc>,
}

impl TokenAccount {
    pub fn new(mint: &str, creator_wallet: &str, vault_address: Option<&str>) -> Self {
        Self {
            mint: mint.to_string(),
            creator_wallet: creator_wallet.to_string(),
            vault_address: vault_address.map(|v| v.to_string()),
            name: None,
            symbol: None,
            total_collected: 0,
            total_burned: 0,
            total_withdrawn: 0,
            total_held: 0,
            burn_percentage: 0.0,
            badge_tier: badges::tier(0.0),
            updated_at: Utc::now(),
        }
    }
}

// =============================================================================
// STORE TRAIT
// =============================================================================

pub trait FeeStore: Send + Sync {
    /// Create the token row on first sight; keeps existing aggregates
    fn upsert_token(&self, mint: &str, creator_wallet: &str, vault: Option<&str>) -> Result<()>;

    /// Attach fetched metadata to the token row
    fn set_token_metadata(&self, mint: &str, name: Option<&str>, symbol: Option<&str>)
        -> Result<()>;

    /// Insert an event unless its signature is already present.
    /// Returns true when a new row landed, false on duplicate.
    fn insert_event_if_new(&self, mint: &str, event: &ClassifiedEvent) -> Result<bool>;

    /// Whether any event with this signature is already persisted
    fn has_event(&self, signature: &str) -> Result<bool>;

    /// All persisted events for a token, in insertion order
    fn events_for_token(&self, mint: &str) -> Result<Vec<ClassifiedEvent>>;

    /// Per-type sums and counts over the persisted events of a token
    fn sum_events_by_type(&self, mint: &str) -> Result<EventStats>;

    /// Persist recomputed aggregates onto the token row
    fn save_aggregates(&self, account: &TokenAccount) -> Result<()>;

    fn load_token(&self, mint: &str) -> Result<Option<TokenAccount>>;

    /// Insert a chain record unless (mint, sequence) already exists
    fn insert_poh_record_if_new(&self, record: &PohRecord) -> Result<bool>;

    /// All chain records for a mint ordered by sequence
    fn poh_records(&self, mint: &str) -> Result<Vec<PohRecord>>;

    /// Last (sequence, hash) of a mint's chain, if any
    fn poh_tail(&self, mint: &str) -> Result<Option<(u64, String)>>;
}

// =============================================================================
// SQLITE STORE
// =============================================================================

/// Sqlite-backed store used in production
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and initialize the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create data directory {:?}", parent))?;
            }
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {:?}", path.as_ref()))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set journal mode")?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("Failed to set synchronous mode")?;
        conn.busy_timeout(std::time::Duration::from_millis(30_000))
            .context("Failed to set busy timeout")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;

        logger::log(
            LogTag::Database,
            "READY",
            &format!("Fee database initialized at {:?}", path.as_ref()),
        );

        Ok(store)
    }

    /// In-memory sqlite database, used by on-disk-free tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS tokens (
                mint            TEXT PRIMARY KEY,
                creator_wallet  TEXT NOT NULL,
                vault_address   TEXT,
                name            TEXT,
                symbol          TEXT,
                total_collected INTEGER NOT NULL DEFAULT 0,
                total_burned    INTEGER NOT NULL DEFAULT 0,
                total_withdrawn INTEGER NOT NULL DEFAULT 0,
                total_held      INTEGER NOT NULL DEFAULT 0,
                burn_percentage REAL    NOT NULL DEFAULT 0,
                badge_tier      TEXT    NOT NULL DEFAULT 'arsonist',
                updated_at      TEXT    NOT NULL
            )",
            [],
        )
        .context("Failed to create tokens table")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                signature           TEXT PRIMARY KEY,
                mint                TEXT NOT NULL,
                event_type          TEXT NOT NULL,
                amount_lamports     INTEGER NOT NULL,
                slot                INTEGER NOT NULL,
                block_time          TEXT NOT NULL,
                burned_token_mint   TEXT,
                burned_token_amount INTEGER,
                recovered           INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )
        .context("Failed to create events table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_mint ON events(mint)",
            [],
        )
        .context("Failed to create events mint index")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS poh_records (
                token_mint      TEXT NOT NULL,
                sequence        INTEGER NOT NULL,
                hash            TEXT NOT NULL,
                prev_hash       TEXT NOT NULL,
                timestamp       TEXT NOT NULL,
                slot            INTEGER NOT NULL,
                event_type      TEXT NOT NULL,
                vault_label     TEXT NOT NULL,
                amount_lamports INTEGER NOT NULL,
                signature       TEXT NOT NULL,
                PRIMARY KEY (token_mint, sequence)
            )",
            [],
        )
        .context("Failed to create poh_records table")?;

        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Database connection mutex poisoned"))
    }
}

impl FeeStore for SqliteStore {
    fn upsert_token(&self, mint: &str, creator_wallet: &str, vault: Option<&str>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tokens (mint, creator_wallet, vault_address, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(mint) DO UPDATE SET
                creator_wallet = excluded.creator_wallet,
                vault_address = excluded.vault_address",
            params![mint, creator_wallet, vault, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn set_token_metadata(
        &self,
        mint: &str,
        name: Option<&str>,
        symbol: Option<&str>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE tokens SET name = COALESCE(?2, name), symbol = COALESCE(?3, symbol)
             WHERE mint = ?1",
            params![mint, name, symbol],
        )?;
        Ok(())
    }

    fn insert_event_if_new(&self, mint: &str, event: &ClassifiedEvent) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO events
                (signature, mint, event_type, amount_lamports, slot, block_time,
                 burned_token_mint, burned_token_amount, recovered)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.signature,
                mint,
                event.event_type.as_str(),
                event.amount_lamports as i64,
                event.slot as i64,
                event.block_time.to_rfc3339(),
                event.burned_token_mint,
                event.burned_token_amount.map(|a| a as i64),
                event.recovered as i64,
            ],
        )?;
        Ok(changed > 0)
    }

    fn has_event(&self, signature: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM events WHERE signature = ?1",
            params![signature],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn events_for_token(&self, mint: &str) -> Result<Vec<ClassifiedEvent>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT signature, event_type, amount_lamports, slot, block_time,
                    burned_token_mint, burned_token_amount, recovered
             FROM events WHERE mint = ?1 ORDER BY rowid",
        )?;

        let rows = stmt.query_map(params![mint], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<i64>>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (signature, type_str, amount, slot, block_time, burned_mint, burned_amount, recovered) =
                row?;
            let event_type = FeeEventType::from_str(&type_str)
                .ok_or_else(|| anyhow!("Unknown event type '{}' in events table", type_str))?;
            let block_time = DateTime::parse_from_rfc3339(&block_time)
                .map_err(|e| anyhow!("Bad block_time in events table: {}", e))?
                .with_timezone(&Utc);
            events.push(ClassifiedEvent {
                event_type,
                amount_lamports: amount as u64,
                signature,
                slot: slot as u64,
                block_time,
                burned_token_mint: burned_mint,
                burned_token_amount: burned_amount.map(|a| a as u64),
                recovered: recovered != 0,
            });
        }
        Ok(events)
    }

    fn sum_events_by_type(&self, mint: &str) -> Result<EventStats> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT event_type, COUNT(*), COALESCE(SUM(amount_lamports), 0)
             FROM events WHERE mint = ?1 GROUP BY event_type",
        )?;

        let rows = stmt.query_map(params![mint], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut stats = EventStats::default();
        for row in rows {
            let (type_str, count, total) = row?;
            match FeeEventType::from_str(&type_str) {
                Some(FeeEventType::Collect) => {
                    stats.collect_count = count as u64;
                    stats.collect_total = total as u64;
                }
                Some(FeeEventType::Withdraw) => {
                    stats.withdraw_count = count as u64;
                    stats.withdraw_total = total as u64;
                }
                Some(FeeEventType::Burn) => {
                    stats.burn_count = count as u64;
                    stats.burn_total = total as u64;
                }
                None => return Err(anyhow!("Unknown event type '{}' in events table", type_str)),
            }
        }
        Ok(stats)
    }

    fn save_aggregates(&self, account: &TokenAccount) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE tokens SET
                total_collected = ?2,
                total_burned = ?3,
                total_withdrawn = ?4,
                total_held = ?5,
                burn_percentage = ?6,
                badge_tier = ?7,
                updated_at = ?8
             WHERE mint = ?1",
            params![
                account.mint,
                account.total_collected as i64,
                account.total_burned as i64,
                account.total_withdrawn as i64,
                account.total_held as i64,
                account.burn_percentage,
                account.badge_tier.as_str(),
                account.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn load_token(&self, mint: &str) -> Result<Option<TokenAccount>> {
        let conn = self.lock()?;
        let account = conn
            .query_row(
                "SELECT mint, creator_wallet, vault_address, name, symbol,
                        total_collected, total_burned, total_withdrawn, total_held,
                        burn_percentage, badge_tier, updated_at
                 FROM tokens WHERE mint = ?1",
                params![mint],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, i64>(7)?,
                        row.get::<_, i64>(8)?,
                        row.get::<_, f64>(9)?,
                        row.get::<_, String>(10)?,
                        row.get::<_, String>(11)?,
                    ))
                },
            )
            .optional()?;

        match account {
            None => Ok(None),
            Some((
                mint,
                creator_wallet,
                vault_address,
                name,
                symbol,
                collected,
                burned,
                withdrawn,
                held,
                burn_percentage,
                _tier_str,
                updated_at,
            )) => {
                let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                    .map_err(|e| anyhow!("Bad updated_at in tokens table: {}", e))?
                    .with_timezone(&Utc);
                Ok(Some(TokenAccount {
                    mint,
                    creator_wallet,
                    vault_address,
                    name,
                    symbol,
                    total_collected: collected as u64,
                    total_burned: burned as u64,
                    total_withdrawn: withdrawn as u64,
                    total_held: held as u64,
                    burn_percentage,
                    badge_tier: badges::tier(burn_percentage),
                    updated_at,
                }))
            }
        }
    }

    fn insert_poh_record_if_new(&self, record: &PohRecord) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO poh_records
                (token_mint, sequence, hash, prev_hash, timestamp, slot,
                 event_type, vault_label, amount_lamports, signature)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.token_mint,
                record.sequence as i64,
                record.hash,
                record.prev_hash,
                record.timestamp.to_rfc3339(),
                record.slot as i64,
                record.event_type.as_str(),
                record.vault_label,
                record.amount_lamports as i64,
                record.signature,
            ],
        )?;
        Ok(changed > 0)
    }

    fn poh_records(&self, mint: &str) -> Result<Vec<PohRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT sequence, hash, prev_hash, timestamp, slot, event_type,
                    vault_label, amount_lamports, signature
             FROM poh_records WHERE token_mint = ?1 ORDER BY sequence",
        )?;

        let rows = stmt.query_map(params![mint], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, i64>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (sequence, hash, prev_hash, timestamp, slot, type_str, vault_label, amount, signature) =
                row?;
            let event_type = FeeEventType::from_str(&type_str)
                .ok_or_else(|| anyhow!("Unknown event type '{}' in poh_records", type_str))?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| anyhow!("Bad timestamp in poh_records: {}", e))?
                .with_timezone(&Utc);
            records.push(PohRecord {
                sequence: sequence as u64,
                hash,
                prev_hash,
                timestamp,
                slot: slot as u64,
                event_type,
                vault_label,
                token_mint: mint.to_string(),
                amount_lamports: amount as u64,
                signature,
            });
        }
        Ok(records)
    }

    fn poh_tail(&self, mint: &str) -> Result<Option<(u64, String)>> {
        let conn = self.lock()?;
        let tail = conn
            .query_row(
                "SELECT sequence, hash FROM poh_records
                 WHERE token_mint = ?1 ORDER BY sequence DESC LIMIT 1",
                params![mint],
                |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(tail)
    }
}
