// Price oracle
//
// The ledger only ever asks two questions: the lowest and the highest price it
// should honor for a token right now. Anything that can answer them can drive
// the ledger. `PriceFeed` is the in-memory implementation used by the simulator
// and tests: it keeps recent answers per token and reports the min/max over a
// small sample window, widened by a per-token spread.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::fixed::Price;
use crate::types::{Timestamp, TokenId};

/// Errors that can occur when reading a price
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("no price for {0}")]
    NoPrice(TokenId),

    #[error("price for {token} is {age}s old, limit {max_age}s")]
    Stale { token: TokenId, age: u64, max_age: u64 },

    #[error("spread of {bps} bps for {token} is not representable")]
    InvalidSpread { token: TokenId, bps: u32 },
}

/// The min/max contract the ledger depends on.
pub trait PriceOracle {
    /// Price favoring the pool when the caller is selling to it.
    fn min_price(&self, token: TokenId) -> Result<Price, OracleError>;

    /// Price favoring the pool when the caller is buying from it.
    fn max_price(&self, token: TokenId) -> Result<Price, OracleError>;

    /// Called whenever the ledger clock moves. Feeds that check staleness use it.
    fn sync_time(&mut self, _now: Timestamp) {}
}

/// A single answer for a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub price: Price,
    pub timestamp: Timestamp,
}

/// Configuration for price sampling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFeedConfig {
    /// How many of the latest answers min/max look at
    pub sample_space: usize,
    /// Maximum age in seconds before the latest answer is rejected. 0 disables the check
    pub max_staleness_secs: u64,
    /// Answers kept per token
    pub max_history: usize,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            sample_space: 3,
            max_staleness_secs: 0,
            max_history: 32,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TokenFeed {
    history: VecDeque<PriceUpdate>,
    spread_bps: u32,
}

/// In-memory feed keyed by token.
#[derive(Debug, Clone, Default)]
pub struct PriceFeed {
    config: PriceFeedConfig,
    feeds: HashMap<TokenId, TokenFeed>,
    now: Timestamp,
}

impl PriceFeed {
    pub fn new(config: PriceFeedConfig) -> Self {
        Self {
            config,
            feeds: HashMap::new(),
            now: Timestamp::default(),
        }
    }

    /// Append an answer. min/max look at the last `sample_space` of these.
    pub fn submit_price(&mut self, token: TokenId, price: Price) {
        let now = self.now;
        let max_history = self.config.max_history.max(1);
        let feed = self.feeds.entry(token).or_default();
        feed.history.push_back(PriceUpdate { price, timestamp: now });
        while feed.history.len() > max_history {
            feed.history.pop_front();
        }
    }

    /// Replace all history with a single answer so min == max.
    pub fn set_price(&mut self, token: TokenId, price: Price) {
        let feed = self.feeds.entry(token).or_default();
        feed.history.clear();
        self.submit_price(token, price);
    }

    /// Replace history so the token reads `min` on the low side and `max` on the high side.
    pub fn set_price_range(&mut self, token: TokenId, min: Price, max: Price) {
        self.set_price(token, min);
        self.submit_price(token, max);
    }

    pub fn set_spread_bps(&mut self, token: TokenId, bps: u32) {
        self.feeds.entry(token).or_default().spread_bps = bps;
    }

    pub fn latest(&self, token: TokenId) -> Option<PriceUpdate> {
        self.feeds.get(&token).and_then(|f| f.history.back().copied())
    }

    fn sample(&self, token: TokenId) -> Result<(&TokenFeed, Vec<Price>), OracleError> {
        let feed = self.feeds.get(&token).ok_or(OracleError::NoPrice(token))?;
        let latest = feed.history.back().ok_or(OracleError::NoPrice(token))?;

        if self.config.max_staleness_secs > 0 {
            let age = latest.timestamp.saturating_elapsed(self.now);
            if age > self.config.max_staleness_secs {
                return Err(OracleError::Stale {
                    token,
                    age,
                    max_age: self.config.max_staleness_secs,
                });
            }
        }

        let take = self.config.sample_space.max(1);
        let prices: Vec<Price> = feed
            .history
            .iter()
            .rev()
            .take(take)
            .map(|u| u.price)
            .filter(|p| !p.is_zero())
            .collect();
        if prices.is_empty() {
            return Err(OracleError::NoPrice(token));
        }
        Ok((feed, prices))
    }
}

impl PriceOracle for PriceFeed {
    fn min_price(&self, token: TokenId) -> Result<Price, OracleError> {
        let (feed, prices) = self.sample(token)?;
        let low = prices.iter().min().copied().ok_or(OracleError::NoPrice(token))?;
        if feed.spread_bps == 0 {
            return Ok(low);
        }
        low.spread(feed.spread_bps, false)
            .map_err(|_| OracleError::InvalidSpread { token, bps: feed.spread_bps })
    }

    fn max_price(&self, token: TokenId) -> Result<Price, OracleError> {
        let (feed, prices) = self.sample(token)?;
        let high = prices.iter().max().copied().ok_or(OracleError::NoPrice(token))?;
        if feed.spread_bps == 0 {
            return Ok(high);
        }
        high.spread(feed.spread_bps, true)
            .map_err(|_| OracleError::InvalidSpread { token, bps: feed.spread_bps })
    }

    fn sync_time(&mut self, now: Timestamp) {
        self.now = now;
    }
}

/// Fixed prices, handy when a test wants to pin min and max directly.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    prices: HashMap<TokenId, (Price, Price)>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, token: TokenId, min: Price, max: Price) {
        self.prices.insert(token, (min, max));
    }

    pub fn set_dollars(&mut self, token: TokenId, dollars: u64) {
        let p = Price::from_dollars(dollars);
        self.set(token, p, p);
    }
}

impl PriceOracle for StaticOracle {
    fn min_price(&self, token: TokenId) -> Result<Price, OracleError> {
        self.prices.get(&token).map(|p| p.0).ok_or(OracleError::NoPrice(token))
    }

    fn max_price(&self, token: TokenId) -> Result<Price, OracleError> {
        self.prices.get(&token).map(|p| p.1).ok_or(OracleError::NoPrice(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BTC: TokenId = TokenId(1);

    #[test]
    fn test_min_max_over_sample() {
        let mut feed = PriceFeed::new(PriceFeedConfig::default());
        feed.submit_price(BTC, Price::from_dollars(40_000));
        feed.submit_price(BTC, Price::from_dollars(41_000));
        feed.submit_price(BTC, Price::from_dollars(40_500));
        assert_eq!(feed.min_price(BTC).unwrap(), Price::from_dollars(40_000));
        assert_eq!(feed.max_price(BTC).unwrap(), Price::from_dollars(41_000));

        // oldest answer falls out of the 3-wide window
        feed.submit_price(BTC, Price::from_dollars(40_700));
        assert_eq!(feed.min_price(BTC).unwrap(), Price::from_dollars(40_500));
    }

    #[test]
    fn test_range_and_reset() {
        let mut feed = PriceFeed::new(PriceFeedConfig::default());
        feed.set_price_range(BTC, Price::from_dollars(45_100), Price::from_dollars(47_100));
        assert_eq!(feed.min_price(BTC).unwrap(), Price::from_dollars(45_100));
        assert_eq!(feed.max_price(BTC).unwrap(), Price::from_dollars(47_100));
        feed.set_price(BTC, Price::from_dollars(1));
        assert_eq!(feed.max_price(BTC).unwrap(), Price::from_dollars(1));
    }

    #[test]
    fn test_spread() {
        let mut feed = PriceFeed::new(PriceFeedConfig::default());
        feed.set_price(BTC, Price::from_dollars(1_000));
        feed.set_spread_bps(BTC, 100);
        assert_eq!(feed.min_price(BTC).unwrap(), Price::from_dollars(990));
        assert_eq!(feed.max_price(BTC).unwrap(), Price::from_dollars(1_010));
    }

    #[test]
    fn test_staleness() {
        let mut feed = PriceFeed::new(PriceFeedConfig {
            max_staleness_secs: 60,
            ..PriceFeedConfig::default()
        });
        feed.sync_time(Timestamp::from_secs(100));
        feed.set_price(BTC, Price::from_dollars(1_000));
        feed.sync_time(Timestamp::from_secs(160));
        assert!(feed.min_price(BTC).is_ok());
        feed.sync_time(Timestamp::from_secs(161));
        assert!(matches!(feed.min_price(BTC), Err(OracleError::Stale { .. })));
    }

    #[test]
    fn test_unknown_token() {
        let feed = PriceFeed::default();
        assert_eq!(feed.min_price(BTC), Err(OracleError::NoPrice(BTC)));
    }
}
