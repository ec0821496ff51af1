use crate::core::price::{PriceProvider, PriceSnapshot, TokenPrice};
use crate::core::token::{TokenSymbol, TokenUniverse};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Latest USD price per token, refreshed from a [`PriceProvider`].
///
/// Clones share the same snapshot.
#[derive(Clone)]
pub struct PriceCache {
    provider: Arc<dyn PriceProvider>,
    universe: Arc<TokenUniverse>,
    inner: Arc<RwLock<PriceSnapshot>>,
    revision: Arc<watch::Sender<u64>>,
}

impl PriceCache {
    pub fn new(provider: Arc<dyn PriceProvider>, universe: Arc<TokenUniverse>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            provider,
            universe,
            inner: Arc::new(RwLock::new(PriceSnapshot::new())),
            revision: Arc::new(revision),
        }
    }

    pub async fn get(&self, symbol: TokenSymbol) -> Option<TokenPrice> {
        let snapshot = self.inner.read().await;
        let price = snapshot.get(symbol).cloned();
        if price.is_some() {
            debug!("Price cache HIT for {}", symbol);
        } else {
            debug!("Price cache MISS for {}", symbol);
        }
        price
    }

    pub async fn snapshot(&self) -> PriceSnapshot {
        self.inner.read().await.clone()
    }

    /// Receiver that changes after every completed refresh.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Fetches `symbols` concurrently and swaps the results in.
    ///
    /// A failed fetch stores a zero price for that token only.
    pub async fn refresh(&self, symbols: &[TokenSymbol]) {
        let fetches = symbols.iter().filter_map(|symbol| {
            let token = self.universe.get(*symbol);
            if token.is_none() {
                warn!("Skipping price refresh for unconfigured token {}", symbol);
            }
            token
        });

        let fetches = fetches.map(|token| async move {
            let price = match self.provider.fetch_price(token).await {
                Ok(price) => {
                    debug!(symbol = %token.symbol, %price, "Fetched price");
                    TokenPrice::new(price)
                }
                Err(e) => {
                    warn!(symbol = %token.symbol, error = %e, "Price fetch failed, using zero price");
                    TokenPrice::unavailable()
                }
            };
            (token.symbol, price)
        });

        let fresh = join_all(fetches).await;
        let refreshed = fresh.len();

        let mut snapshot = self.inner.write().await;
        let mut next = snapshot.clone();
        for (symbol, price) in fresh {
            next.insert(symbol, price);
        }
        *snapshot = next;
        drop(snapshot);

        self.revision.send_modify(|rev| *rev += 1);
        info!("Refreshed {} token prices", refreshed);
    }

    pub async fn refresh_all(&self) {
        let symbols = self.universe.symbols();
        self.refresh(&symbols).await;
    }

    /// Starts a background task that refreshes every `interval` and shortly
    /// after [`RefreshHandle::nudge`] calls settle for `debounce`.
    pub fn spawn_refresher(&self, interval: Duration, debounce: Duration) -> RefreshHandle {
        let cache = self.clone();
        let nudge = Arc::new(Notify::new());
        let signal = Arc::clone(&nudge);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("Periodic price refresh");
                    }
                    _ = signal.notified() => {
                        // every nudge restarts the quiet period
                        loop {
                            tokio::select! {
                                _ = tokio::time::sleep(debounce) => break,
                                _ = signal.notified() => continue,
                            }
                        }
                        debug!("On-demand price refresh");
                        ticker.reset();
                    }
                }
                cache.refresh_all().await;
            }
        });

        RefreshHandle { nudge, task }
    }
}

/// Controls a refresher task. Dropping the handle stops the task.
pub struct RefreshHandle {
    nudge: Arc<Notify>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Asks for a refresh soon, e.g. while the user is typing an amount.
    pub fn nudge(&self) {
        self.nudge.notify_one();
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
