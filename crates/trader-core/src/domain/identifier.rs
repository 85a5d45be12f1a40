//! 시장/종목 식별자.
//!
//! 입력은 공백 제거 후 대문자로 정규화됩니다. 영숫자와 `.`, `-`, `:` 만 허용합니다
//! (예: `BRK.B`, `X:BTCUSD`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

fn normalize(kind: &'static str, raw: &str) -> Result<String> {
    let value = raw.trim().to_uppercase();
    if value.is_empty() {
        return Err(ValidationError::EmptyIdentifier { kind });
    }
    let valid = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':'));
    if !valid {
        return Err(ValidationError::InvalidIdentifier { kind, value });
    }
    Ok(value)
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// 검증 후 생성.
            pub fn new(raw: impl AsRef<str>) -> Result<Self> {
                normalize($kind, raw.as_ref()).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

identifier!(
    /// 시장 식별자 (예: `STOCKS`, `XNAS`).
    Market,
    "market"
);

identifier!(
    /// 종목 심볼 (예: `AAPL`).
    Ticker,
    "ticker"
);
