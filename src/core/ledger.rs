//! Mock balance ledger and the swap engine.
//!
//! Balances live in memory and are written through a [`BalanceStore`] on
//! every mutation. Mutations (swaps and `set_balance`) take a single async
//! writer lock, so concurrent swaps queue up instead of racing on the
//! read-modify-write. Reads only take a short synchronous lock and never wait
//! behind a swap in flight.

use crate::core::amount;
use crate::core::price::PriceSnapshot;
use crate::core::swap::{self, Leg, SwapError, SwapResult};
use crate::core::token::{TokenSymbol, TokenUniverse};
use crate::store::{BalanceRecord, BalanceSnapshot, BalanceStore};
use anyhow::{Context, Result, anyhow};
use num_bigint::BigUint;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balance {
    pub magnitude: BigUint,
    pub decimals: u32,
}

impl Balance {
    /// Full-precision major units.
    pub fn major(&self) -> String {
        amount::to_major_units(&self.magnitude, self.decimals)
    }

    fn leg(&self) -> Leg {
        Leg {
            magnitude: self.magnitude.clone(),
            decimals: self.decimals,
        }
    }
}

type Balances = HashMap<TokenSymbol, Balance>;

fn seed_balances(universe: &TokenUniverse) -> Balances {
    universe
        .iter()
        .map(|token| {
            // seeds are checked when the universe is built
            let magnitude = amount::to_minor_units(&token.seed_balance, token.decimals)
                .unwrap_or_default();
            (
                token.symbol,
                Balance {
                    magnitude,
                    decimals: token.decimals,
                },
            )
        })
        .collect()
}

fn to_snapshot(balances: &Balances) -> BalanceSnapshot {
    balances
        .iter()
        .map(|(symbol, balance)| {
            (
                *symbol,
                BalanceRecord {
                    balance: balance.magnitude.to_string(),
                    decimals: balance.decimals,
                },
            )
        })
        .collect()
}

/// Raises `is_swapping` for as long as it lives.
struct SwappingFlag<'a>(&'a AtomicBool);

impl<'a> SwappingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        SwappingFlag(flag)
    }
}

impl Drop for SwappingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Ledger {
    universe: Arc<TokenUniverse>,
    store: Arc<dyn BalanceStore>,
    balances: RwLock<Balances>,
    writer: Mutex<()>,
    is_swapping: AtomicBool,
    has_hydrated: AtomicBool,
    settlement_delay: Duration,
}

impl Ledger {
    /// A ledger holding the universe's seed balances. Call [`Ledger::hydrate`]
    /// to pick up persisted balances.
    pub fn new(universe: Arc<TokenUniverse>, store: Arc<dyn BalanceStore>) -> Self {
        let balances = seed_balances(&universe);
        Self {
            universe,
            store,
            balances: RwLock::new(balances),
            writer: Mutex::new(()),
            is_swapping: AtomicBool::new(false),
            has_hydrated: AtomicBool::new(false),
            settlement_delay: Duration::ZERO,
        }
    }

    /// Simulated settlement latency applied to every swap.
    pub fn with_settlement_delay(mut self, delay: Duration) -> Self {
        self.settlement_delay = delay;
        self
    }

    fn read_balances(&self) -> RwLockReadGuard<'_, Balances> {
        self.balances.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_balances(&self) -> RwLockWriteGuard<'_, Balances> {
        self.balances.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads persisted balances over the seeds.
    ///
    /// Only configured tokens are kept, and decimals always come from the
    /// token table.
    pub async fn hydrate(&self) -> Result<()> {
        let _writer = self.writer.lock().await;
        self.load_persisted().await
    }

    /// Callers hold the writer lock.
    async fn load_persisted(&self) -> Result<()> {
        let persisted = self
            .store
            .load()
            .await
            .context("Failed to load persisted balances")?;

        let mut balances = seed_balances(&self.universe);
        match persisted {
            Some(records) => {
                for (symbol, record) in records {
                    let Some(balance) = balances.get_mut(&symbol) else {
                        warn!("Dropping persisted balance for unconfigured token {}", symbol);
                        continue;
                    };
                    if record.decimals != balance.decimals {
                        warn!(
                            "Persisted {} balance uses {} decimals, expected {}; keeping seed",
                            symbol, record.decimals, balance.decimals
                        );
                        continue;
                    }
                    match BigUint::from_str(&record.balance) {
                        Ok(magnitude) => balance.magnitude = magnitude,
                        Err(e) => warn!(
                            "Ignoring malformed persisted {} balance '{}': {}",
                            symbol, record.balance, e
                        ),
                    }
                }
            }
            None => debug!("No persisted balances, using seeds"),
        }

        *self.write_balances() = balances;
        self.has_hydrated.store(true, Ordering::SeqCst);
        info!("Ledger hydrated");
        Ok(())
    }

    pub fn has_hydrated(&self) -> bool {
        self.has_hydrated.load(Ordering::SeqCst)
    }

    pub fn is_swapping(&self) -> bool {
        self.is_swapping.load(Ordering::SeqCst)
    }

    /// Major-unit balance, `"0"` for tokens outside the universe.
    pub fn get_balance(&self, symbol: TokenSymbol) -> String {
        self.read_balances()
            .get(&symbol)
            .map_or_else(|| "0".to_string(), Balance::major)
    }

    pub fn balance(&self, symbol: TokenSymbol) -> Option<Balance> {
        self.read_balances().get(&symbol).cloned()
    }

    /// All balances in token table order.
    pub fn balances(&self) -> Vec<(TokenSymbol, Balance)> {
        let balances = self.read_balances();
        self.universe
            .symbols()
            .into_iter()
            .filter_map(|symbol| balances.get(&symbol).map(|b| (symbol, b.clone())))
            .collect()
    }

    /// Replaces the minor-unit magnitude of one token and persists it.
    ///
    /// Like [`Ledger::swap`], loads persisted balances first if the ledger was
    /// never hydrated.
    pub async fn set_balance(&self, symbol: TokenSymbol, magnitude: &str) -> Result<()> {
        let magnitude = BigUint::from_str(magnitude.trim())
            .with_context(|| format!("Invalid {symbol} balance: '{magnitude}'"))?;

        let _writer = self.writer.lock().await;
        if !self.has_hydrated() {
            self.load_persisted().await?;
        }
        let mut next = self.read_balances().clone();
        let balance = next
            .get_mut(&symbol)
            .ok_or_else(|| anyhow!("Token does not exist: {}", symbol))?;
        balance.magnitude = magnitude;

        self.persist_and_commit(next).await
    }

    async fn persist_and_commit(&self, next: Balances) -> Result<()> {
        self.store
            .save(&to_snapshot(&next))
            .await
            .context("Failed to persist balances")?;
        *self.write_balances() = next;
        Ok(())
    }

    /// Sells `sell_amount` (major units) of `sell` for `buy` at the snapshot's
    /// prices. Either both balances change or neither does. An unhydrated
    /// ledger loads persisted balances before validating.
    pub async fn swap(
        &self,
        sell: TokenSymbol,
        buy: TokenSymbol,
        sell_amount: &str,
        prices: &PriceSnapshot,
    ) -> SwapResult {
        match self.try_swap(sell, buy, sell_amount, prices).await {
            Ok(result) => result,
            Err(e) => {
                info!(%sell, %buy, sell_amount, reason = %e, "Swap rejected");
                SwapResult::from(e)
            }
        }
    }

    async fn try_swap(
        &self,
        sell: TokenSymbol,
        buy: TokenSymbol,
        sell_amount: &str,
        prices: &PriceSnapshot,
    ) -> Result<SwapResult, SwapError> {
        let _writer = self.writer.lock().await;
        if !self.has_hydrated() {
            self.load_persisted().await.map_err(|e| {
                error!(error = ?e, "Balances could not be loaded before swap");
                SwapError::BalancesUnavailable
            })?;
        }
        let current = self.read_balances().clone();

        let (Some(sell_balance), Some(buy_balance)) = (current.get(&sell), current.get(&buy))
        else {
            return Err(SwapError::UnknownToken);
        };
        if sell == buy {
            return Err(SwapError::SameToken);
        }
        if !amount::is_positive(sell_amount) {
            return Err(SwapError::InvalidAmount);
        }

        let (Some(sell_price), Some(buy_price)) = (
            prices.get(sell).filter(|p| p.is_available()),
            prices.get(buy).filter(|p| p.is_available()),
        ) else {
            return Err(SwapError::PricesUnavailable);
        };

        match amount::covers(&sell_balance.magnitude, sell_balance.decimals, sell_amount) {
            Some(true) => {}
            Some(false) => return Err(SwapError::InsufficientBalance),
            None => return Err(SwapError::InvalidAmount),
        }

        let _swapping = SwappingFlag::raise(&self.is_swapping);
        if !self.settlement_delay.is_zero() {
            tokio::time::sleep(self.settlement_delay).await;
        }

        let plan = swap::plan(
            &sell_balance.leg(),
            &buy_balance.leg(),
            sell_amount,
            sell_price.price_usd,
            buy_price.price_usd,
        )?;

        let mut next = current.clone();
        if let Some(balance) = next.get_mut(&sell) {
            balance.magnitude = plan.new_sell_balance;
        }
        if let Some(balance) = next.get_mut(&buy) {
            balance.magnitude = plan.new_buy_balance;
        }

        self.persist_and_commit(next).await.map_err(|e| {
            error!(error = ?e, "Swap computed but balances could not be saved");
            SwapError::Persistence
        })?;

        let sold = amount::to_major_units(&plan.sell_minor, sell_balance.decimals);
        let bought = amount::to_major_units(&plan.buy_minor, buy_balance.decimals);
        info!(%sell, %buy, %sold, %bought, "Swap settled");

        Ok(SwapResult::succeeded(sold, bought))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::{TokenInfo, default_tokens};
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    fn universe(seeds: &[(TokenSymbol, &str)]) -> Arc<TokenUniverse> {
        let tokens: Vec<TokenInfo> = default_tokens()
            .into_iter()
            .map(|mut token| {
                if let Some((_, seed)) = seeds.iter().find(|(s, _)| *s == token.symbol) {
                    token.seed_balance = seed.to_string();
                }
                token
            })
            .collect();
        Arc::new(TokenUniverse::new(tokens).unwrap())
    }

    fn prices() -> PriceSnapshot {
        PriceSnapshot::new()
            .with_price(TokenSymbol::Usdt, Decimal::new(100, 2))
            .with_price(TokenSymbol::Usdc, Decimal::new(100, 2))
            .with_price(TokenSymbol::Eth, Decimal::new(200000, 2))
            .with_price(TokenSymbol::Wbtc, Decimal::from(60000))
    }

    async fn ledger_with(store: Arc<dyn BalanceStore>) -> Ledger {
        let ledger = Ledger::new(universe(&[]), store);
        ledger.hydrate().await.unwrap();
        ledger
    }

    async fn default_ledger() -> Ledger {
        ledger_with(Arc::new(MemoryStore::new())).await
    }

    #[tokio::test]
    async fn test_seed_balances() {
        let ledger = default_ledger().await;
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "1000");
        assert_eq!(ledger.get_balance(TokenSymbol::Usdc), "1000");
        assert_eq!(ledger.get_balance(TokenSymbol::Eth), "2");
        assert_eq!(ledger.get_balance(TokenSymbol::Wbtc), "0.01");
        assert_eq!(
            ledger.balance(TokenSymbol::Wbtc).unwrap().magnitude,
            BigUint::from(10_000_000_000_000_000u64)
        );
    }

    #[tokio::test]
    async fn test_unknown_symbol_reads_zero() {
        let tokens = vec![default_tokens().remove(0)];
        let universe = Arc::new(TokenUniverse::new(tokens).unwrap());
        let ledger = Ledger::new(universe, Arc::new(MemoryStore::new()));

        assert_eq!(ledger.get_balance(TokenSymbol::Usdc), "1000");
        assert_eq!(ledger.get_balance(TokenSymbol::Eth), "0");
        assert_eq!(ledger.balances().len(), 1);
    }

    #[tokio::test]
    async fn test_swap_usdt_for_eth() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger_with(store.clone()).await;

        let result = ledger
            .swap(TokenSymbol::Usdt, TokenSymbol::Eth, "100", &prices())
            .await;

        assert!(result.success, "{result:?}");
        assert_eq!(result.counter_amount, "0.05");
        assert_eq!(result.sell_amount, "100");
        assert_eq!(result.message, None);
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "900");
        assert_eq!(ledger.get_balance(TokenSymbol::Eth), "2.05");

        // the mutation was persisted
        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved[&TokenSymbol::Usdt].balance, "900000000");
        assert_eq!(saved[&TokenSymbol::Eth].balance, "2050000000000000000");
    }

    #[tokio::test]
    async fn test_insufficient_balance_leaves_balances() {
        let ledger = default_ledger().await;

        let result = ledger
            .swap(TokenSymbol::Usdt, TokenSymbol::Eth, "2000", &prices())
            .await;

        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("Insufficient balance"));
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "1000");
        assert_eq!(ledger.get_balance(TokenSymbol::Eth), "2");
    }

    #[tokio::test]
    async fn test_balance_check_uses_requested_precision() {
        let ledger = default_ledger().await;

        // finer than usdt's 6 decimals but still above the balance
        let result = ledger
            .swap(TokenSymbol::Usdt, TokenSymbol::Eth, "1000.0000001", &prices())
            .await;
        assert_eq!(result.message.as_deref(), Some("Insufficient balance"));

        let result = ledger
            .swap(TokenSymbol::Usdt, TokenSymbol::Eth, "1000", &prices())
            .await;
        assert!(result.success);
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "0");
        assert_eq!(ledger.get_balance(TokenSymbol::Eth), "2.5");
    }

    #[tokio::test]
    async fn test_missing_price_is_rejected() {
        let ledger = default_ledger().await;
        let prices = PriceSnapshot::new().with_price(TokenSymbol::Usdt, Decimal::ONE);

        let result = ledger
            .swap(TokenSymbol::Usdt, TokenSymbol::Eth, "10", &prices)
            .await;

        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("Cannot get token prices"));
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "1000");
    }

    #[tokio::test]
    async fn test_zero_sentinel_price_is_rejected() {
        let ledger = default_ledger().await;
        let prices = prices().with_price(TokenSymbol::Eth, Decimal::ZERO);

        let result = ledger
            .swap(TokenSymbol::Usdt, TokenSymbol::Eth, "10", &prices)
            .await;

        assert_eq!(result.message.as_deref(), Some("Cannot get token prices"));
        assert_eq!(ledger.get_balance(TokenSymbol::Eth), "2");
    }

    #[tokio::test]
    async fn test_same_token_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger_with(store.clone()).await;

        let result = ledger
            .swap(TokenSymbol::Usdt, TokenSymbol::Usdt, "10", &prices())
            .await;

        assert_eq!(result.message.as_deref(), Some("Cannot swap the same token"));
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "1000");
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_amounts_are_rejected() {
        let ledger = default_ledger().await;
        for amount in ["0", "-5", "", "ten", "0.0000001"] {
            let result = ledger
                .swap(TokenSymbol::Usdt, TokenSymbol::Eth, amount, &prices())
                .await;
            assert_eq!(
                result.message.as_deref(),
                Some("Invalid sell amount"),
                "amount {amount:?}"
            );
        }
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "1000");
    }

    #[tokio::test]
    async fn test_unknown_token_is_rejected() {
        let tokens = vec![default_tokens().remove(1)];
        let universe = Arc::new(TokenUniverse::new(tokens).unwrap());
        let ledger = Ledger::new(universe, Arc::new(MemoryStore::new()));

        let result = ledger
            .swap(TokenSymbol::Usdt, TokenSymbol::Eth, "10", &prices())
            .await;
        assert_eq!(result.message.as_deref(), Some("Token does not exist"));
    }

    #[tokio::test]
    async fn test_buy_amount_truncates_toward_zero() {
        let ledger = default_ledger().await;
        let prices = prices().with_price(TokenSymbol::Usdc, Decimal::from(3));

        // 1 usdt at $1 buys 0.333333 usdc at $3, never 0.333334
        let result = ledger
            .swap(TokenSymbol::Usdt, TokenSymbol::Usdc, "1", &prices)
            .await;
        assert_eq!(result.counter_amount, "0.333333");
        assert_eq!(ledger.get_balance(TokenSymbol::Usdc), "1000.333333");
    }

    #[tokio::test]
    async fn test_sell_amount_is_bounded_to_token_decimals() {
        let ledger = default_ledger().await;

        let result = ledger
            .swap(TokenSymbol::Usdt, TokenSymbol::Usdc, "1.1234567", &prices())
            .await;
        assert!(result.success);
        assert_eq!(result.sell_amount, "1.123456");
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "998.876544");
    }

    struct FailingStore;

    #[async_trait]
    impl BalanceStore for FailingStore {
        async fn load(&self) -> Result<Option<BalanceSnapshot>> {
            Ok(None)
        }

        async fn save(&self, _snapshot: &BalanceSnapshot) -> Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    #[tokio::test]
    async fn test_persist_failure_commits_nothing() {
        let ledger = ledger_with(Arc::new(FailingStore)).await;

        let result = ledger
            .swap(TokenSymbol::Usdt, TokenSymbol::Eth, "100", &prices())
            .await;

        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("Failed to save balances"));
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "1000");
        assert_eq!(ledger.get_balance(TokenSymbol::Eth), "2");
        assert!(!ledger.is_swapping());

        assert!(ledger.set_balance(TokenSymbol::Usdt, "1").await.is_err());
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "1000");
    }

    #[tokio::test]
    async fn test_hydrate_restores_persisted_balances() {
        let mut snapshot = BalanceSnapshot::new();
        snapshot.insert(
            TokenSymbol::Usdt,
            BalanceRecord {
                balance: "900000000".to_string(),
                decimals: 6,
            },
        );
        snapshot.insert(
            TokenSymbol::Eth,
            BalanceRecord {
                balance: "not a number".to_string(),
                decimals: 18,
            },
        );
        snapshot.insert(
            TokenSymbol::Usdc,
            BalanceRecord {
                balance: "5".to_string(),
                decimals: 2,
            },
        );
        let store = Arc::new(MemoryStore::with_snapshot(&snapshot).unwrap());

        let ledger = Ledger::new(universe(&[]), store);
        assert!(!ledger.has_hydrated());
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "1000");

        ledger.hydrate().await.unwrap();

        assert!(ledger.has_hydrated());
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "900");
        // malformed or mis-scaled entries keep their seeds
        assert_eq!(ledger.get_balance(TokenSymbol::Eth), "2");
        assert_eq!(ledger.get_balance(TokenSymbol::Usdc), "1000");
    }

    #[tokio::test]
    async fn test_set_balance() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger_with(store.clone()).await;

        ledger
            .set_balance(TokenSymbol::Eth, "1500000000000000000")
            .await
            .unwrap();
        assert_eq!(ledger.get_balance(TokenSymbol::Eth), "1.5");
        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved[&TokenSymbol::Eth].balance, "1500000000000000000");

        assert!(ledger.set_balance(TokenSymbol::Eth, "-1").await.is_err());
        assert!(ledger.set_balance(TokenSymbol::Eth, "1.5").await.is_err());
        assert_eq!(ledger.get_balance(TokenSymbol::Eth), "1.5");
    }

    #[tokio::test]
    async fn test_is_swapping_during_settlement() {
        let ledger = Arc::new(
            Ledger::new(universe(&[]), Arc::new(MemoryStore::new()))
                .with_settlement_delay(Duration::from_millis(150)),
        );
        assert!(!ledger.is_swapping());

        let task = {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                ledger
                    .swap(TokenSymbol::Usdt, TokenSymbol::Eth, "100", &prices())
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(ledger.is_swapping());
        // reads do not wait for the swap
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "1000");

        let result = task.await.unwrap();
        assert!(result.success);
        assert!(!ledger.is_swapping());
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "900");
    }

    #[tokio::test]
    async fn test_concurrent_swaps_are_serialized() {
        let ledger = Arc::new(
            Ledger::new(
                universe(&[(TokenSymbol::Usdt, "150")]),
                Arc::new(MemoryStore::new()),
            )
            .with_settlement_delay(Duration::from_millis(20)),
        );

        let swaps = (0..2).map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                ledger
                    .swap(TokenSymbol::Usdt, TokenSymbol::Eth, "100", &prices())
                    .await
            })
        });
        let results: Vec<SwapResult> = futures::future::join_all(swaps)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let succeeded = results.iter().filter(|r| r.success).count();
        assert_eq!(succeeded, 1);
        let failed = results.iter().find(|r| !r.success).unwrap();
        assert_eq!(failed.message.as_deref(), Some("Insufficient balance"));
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "50");
        assert_eq!(ledger.get_balance(TokenSymbol::Eth), "2.05");
    }

    #[tokio::test]
    async fn test_round_trip_swap_never_gains_value() {
        let ledger = default_ledger().await;
        let prices = prices().with_price(TokenSymbol::Eth, Decimal::new(300_001, 2));

        let first = ledger
            .swap(TokenSymbol::Usdt, TokenSymbol::Eth, "100", &prices)
            .await;
        assert!(first.success);
        let back = ledger
            .swap(TokenSymbol::Eth, TokenSymbol::Usdt, &first.counter_amount, &prices)
            .await;
        assert!(back.success);

        let usdt = ledger.balance(TokenSymbol::Usdt).unwrap().magnitude;
        assert!(usdt <= BigUint::from(1_000_000_000u64));
        assert_eq!(ledger.get_balance(TokenSymbol::Eth), "2");
    }

    fn stored_usdt(balance: &str) -> Arc<MemoryStore> {
        let mut snapshot = BalanceSnapshot::new();
        snapshot.insert(
            TokenSymbol::Usdt,
            BalanceRecord {
                balance: balance.to_string(),
                decimals: 6,
            },
        );
        Arc::new(MemoryStore::with_snapshot(&snapshot).unwrap())
    }

    #[tokio::test]
    async fn test_swap_loads_persisted_balances_first() {
        // 50 usdt on disk, seed says 1000
        let store = stored_usdt("50000000");
        let ledger = Ledger::new(universe(&[]), store.clone());

        let result = ledger
            .swap(TokenSymbol::Usdt, TokenSymbol::Eth, "100", &prices())
            .await;

        assert_eq!(result.message.as_deref(), Some("Insufficient balance"));
        assert!(ledger.has_hydrated());
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "50");
        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved[&TokenSymbol::Usdt].balance, "50000000");

        let result = ledger
            .swap(TokenSymbol::Usdt, TokenSymbol::Eth, "40", &prices())
            .await;
        assert!(result.success);
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "10");
    }

    #[tokio::test]
    async fn test_set_balance_keeps_other_persisted_balances() {
        let store = stored_usdt("50000000");
        let ledger = Ledger::new(universe(&[]), store.clone());

        ledger
            .set_balance(TokenSymbol::Eth, "1000000000000000000")
            .await
            .unwrap();

        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved[&TokenSymbol::Usdt].balance, "50000000");
        assert_eq!(saved[&TokenSymbol::Eth].balance, "1000000000000000000");
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "50");
    }

    struct UnreadableStore;

    #[async_trait]
    impl BalanceStore for UnreadableStore {
        async fn load(&self) -> Result<Option<BalanceSnapshot>> {
            Err(anyhow!("permission denied"))
        }

        async fn save(&self, _snapshot: &BalanceSnapshot) -> Result<()> {
            panic!("nothing may be saved before balances are loaded");
        }
    }

    #[tokio::test]
    async fn test_unreadable_store_blocks_mutations() {
        let ledger = Ledger::new(universe(&[]), Arc::new(UnreadableStore));

        let result = ledger
            .swap(TokenSymbol::Usdt, TokenSymbol::Eth, "100", &prices())
            .await;
        assert_eq!(result.message.as_deref(), Some("Failed to load balances"));
        assert!(ledger.set_balance(TokenSymbol::Usdt, "1").await.is_err());
        assert!(!ledger.has_hydrated());
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "1000");
    }

    #[tokio::test]
    async fn test_hydrate_skips_unknown_stored_tokens() {
        let store = Arc::new(MemoryStore::with_blob(
            br#"{"usdt": {"balance": "50000000", "decimals": 6},
                "dai": {"balance": "5000000000000000000", "decimals": 18}}"#,
        ));
        let ledger = Ledger::new(universe(&[]), store);

        ledger.hydrate().await.unwrap();

        assert!(ledger.has_hydrated());
        assert_eq!(ledger.get_balance(TokenSymbol::Usdt), "50");
        assert_eq!(ledger.get_balance(TokenSymbol::Eth), "2");
    }
}
