//! Core type definitions for the warp engine

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::errors::InputError;

/// Token, pool or account identifier (20 bytes, hex-encoded with `0x` prefix)
///
/// The derived `Ord` compares the raw bytes, which is the same ordering pools
/// use to decide which constituent is `token0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    /// Build an address whose low 8 bytes hold `n` (big-endian). Handy for
    /// fixtures.
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Short form for log lines (first 4 bytes)
    pub fn short(&self) -> String {
        format!("0x{}", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(stripped).map_err(|e| InputError::InvalidAddress {
            address: s.to_string(),
            reason: e.to_string(),
        })?;
        let bytes: [u8; 20] = raw.try_into().map_err(|v: Vec<u8>| InputError::InvalidAddress {
            address: s.to_string(),
            reason: format!("expected 20 bytes, got {}", v.len()),
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Sentinel identifier for the chain's native asset at every entry point
pub const NATIVE_ASSET: Address = Address::ZERO;

/// Token amount in base units
pub type Amount = u128;

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Ordered sequence of tokens describing a multi-hop swap.
///
/// Empty means "no swap, the leg token is the source token". Otherwise it
/// must hold at least two tokens: the leg source first, the leg destination
/// last.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route(pub Vec<Address>);

impl Route {
    pub fn new(tokens: Vec<Address>) -> Self {
        Self(tokens)
    }

    /// The empty route
    pub fn identity() -> Self {
        Self(Vec::new())
    }

    pub fn is_identity(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn source(&self) -> Option<&Address> {
        self.0.first()
    }

    pub fn destination(&self) -> Option<&Address> {
        self.0.last()
    }

    /// Number of pools crossed
    pub fn hops(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn tokens(&self) -> &[Address] {
        &self.0
    }

    pub fn reversed(&self) -> Self {
        Self(self.0.iter().rev().copied().collect())
    }
}

impl From<Vec<Address>> for Route {
    fn from(tokens: Vec<Address>) -> Self {
        Self(tokens)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "[identity]");
        }
        let parts: Vec<String> = self.0.iter().map(|a| a.short()).collect();
        write!(f, "[{}]", parts.join(" -> "))
    }
}

/// Explicit routes for the two legs of a pool, keyed by canonical position.
///
/// For zap-in each route runs from the source token to the named
/// constituent; for zap-out it runs from the constituent to the output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LegRoutes {
    pub token0: Route,
    pub token1: Route,
}

impl LegRoutes {
    pub fn new(token0: Route, token1: Route) -> Self {
        Self { token0, token1 }
    }

    pub fn get(&self, leg: Leg) -> &Route {
        match leg {
            Leg::Token0 => &self.token0,
            Leg::Token1 => &self.token1,
        }
    }
}

/// Which constituent of a pool a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    Token0,
    Token1,
}

impl Leg {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token0 => "token0",
            Self::Token1 => "token1",
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Slippage tolerance as a whole percentage in [0, 100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct SlippageTolerance(u8);

impl SlippageTolerance {
    pub const ZERO: SlippageTolerance = SlippageTolerance(0);

    pub fn new(percent: u8) -> Result<Self, InputError> {
        if percent >= 100 {
            return Err(InputError::SlippageOutOfRange { percent });
        }
        Ok(Self(percent))
    }

    pub fn percent(&self) -> u8 {
        self.0
    }
}

impl<'de> Deserialize<'de> for SlippageTolerance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let percent = u8::deserialize(deserializer)?;
        Self::new(percent).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<u8> for SlippageTolerance {
    type Error = InputError;

    fn try_from(percent: u8) -> Result<Self, Self::Error> {
        Self::new(percent)
    }
}

impl fmt::Display for SlippageTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Per-call context: who is calling, the native value attached, and the
/// deadline forwarded to every router call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    pub caller: Address,
    #[serde(default)]
    pub attached_value: Amount,
    pub deadline: Timestamp,
}

impl CallContext {
    pub fn new(caller: Address, deadline: Timestamp) -> Self {
        Self {
            caller,
            attached_value: 0,
            deadline,
        }
    }

    pub fn with_value(mut self, value: Amount) -> Self {
        self.attached_value = value;
        self
    }
}

/// Pool state read from the pool view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolReserves {
    pub reserve0: Amount,
    pub reserve1: Amount,
    pub total_supply: Amount,
}

/// The two constituents of a pool in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolTokens {
    pub token0: Address,
    pub token1: Address,
}

impl PoolTokens {
    pub fn get(&self, leg: Leg) -> Address {
        match leg {
            Leg::Token0 => self.token0,
            Leg::Token1 => self.token1,
        }
    }

    /// Which leg `token` is, if it is a constituent at all
    pub fn leg_of(&self, token: &Address) -> Option<Leg> {
        if *token == self.token0 {
            Some(Leg::Token0)
        } else if *token == self.token1 {
            Some(Leg::Token1)
        } else {
            None
        }
    }

    pub fn contains(&self, token: &Address) -> bool {
        self.leg_of(token).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip_display() {
        let addr: Address = "0x98878b06940ae243284ca214f92bb71a2b032b8a".parse().unwrap();
        assert_eq!(addr.to_string(), "0x98878b06940ae243284ca214f92bb71a2b032b8a");
        assert_eq!(addr.short(), "0x98878b06");
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        let err = "0x1234".parse::<Address>().unwrap_err();
        assert!(matches!(err, InputError::InvalidAddress { .. }));
        assert!("0xzz".parse::<Address>().is_err());
    }

    #[test]
    fn test_address_order_is_bytewise() {
        let low = Address::from_low_u64(1);
        let high = Address::from_low_u64(256);
        assert!(low < high);
        assert!(NATIVE_ASSET < low);
    }

    #[test]
    fn test_address_serde_as_hex() {
        let addr = Address::from_low_u64(0xabcd);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x000000000000000000000000000000000000abcd\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_route_accessors() {
        let a = Address::from_low_u64(1);
        let b = Address::from_low_u64(2);
        let c = Address::from_low_u64(3);
        let route = Route::new(vec![a, b, c]);
        assert_eq!(route.source(), Some(&a));
        assert_eq!(route.destination(), Some(&c));
        assert_eq!(route.hops(), 2);
        assert_eq!(route.reversed().tokens(), &[c, b, a]);
        assert!(Route::identity().is_identity());
        assert_eq!(Route::identity().hops(), 0);
    }

    #[test]
    fn test_slippage_bounds() {
        assert!(SlippageTolerance::new(0).is_ok());
        assert!(SlippageTolerance::new(99).is_ok());
        assert!(matches!(
            SlippageTolerance::new(100),
            Err(InputError::SlippageOutOfRange { percent: 100 })
        ));
        assert!(serde_json::from_str::<SlippageTolerance>("150").is_err());
        assert_eq!(serde_json::from_str::<SlippageTolerance>("5").unwrap().percent(), 5);
    }

    #[test]
    fn test_pool_tokens_leg_of() {
        let tokens = PoolTokens {
            token0: Address::from_low_u64(1),
            token1: Address::from_low_u64(2),
        };
        assert_eq!(tokens.leg_of(&Address::from_low_u64(1)), Some(Leg::Token0));
        assert_eq!(tokens.leg_of(&Address::from_low_u64(2)), Some(Leg::Token1));
        assert_eq!(tokens.leg_of(&Address::from_low_u64(3)), None);
    }
}
