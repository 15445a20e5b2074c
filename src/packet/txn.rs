use std::fmt;
use std::str::FromStr;

/// Status of a transaction as carried by the `Txn-Status` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TxnStatus {
    /// More responses will follow.
    Open,
    /// Intermediate response of a streamed transaction.
    Continue,
    /// Final response; the transaction is over.
    #[default]
    Complete,
}

impl TxnStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TxnStatus::Open => "open",
            TxnStatus::Continue => "continue",
            TxnStatus::Complete => "complete",
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, TxnStatus::Complete)
    }
}

impl fmt::Display for TxnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a `Txn-Status` value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transaction status '{0}'")]
pub struct UnknownTxnStatus(pub String);

impl FromStr for TxnStatus {
    type Err = UnknownTxnStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("open") {
            Ok(TxnStatus::Open)
        } else if s.eq_ignore_ascii_case("continue") {
            Ok(TxnStatus::Continue)
        } else if s.eq_ignore_ascii_case("complete") {
            Ok(TxnStatus::Complete)
        } else {
            Err(UnknownTxnStatus(s.to_string()))
        }
    }
}

/// What the client accepts for a transaction, from the `Txn-Accept` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxnAccept {
    /// Only a single, complete response.
    Single,
    /// Streamed responses are fine.
    #[default]
    Multi,
}

impl TxnAccept {
    /// Interpret a raw header value. Anything other than `single` allows
    /// streaming.
    #[must_use]
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("single") => TxnAccept::Single,
            _ => TxnAccept::Multi,
        }
    }
}
