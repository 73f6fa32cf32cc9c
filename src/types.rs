//! Shared value types: timestamps, identifiers and the two permission axes
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

/// UTC instant stored as nanoseconds since the epoch.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct TimeStamp(DateTime<Utc>);

impl TimeStamp {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        min: u32,
        sec: u32,
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(TimeStamp)
    }
}

impl Default for TimeStamp {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> minicbor::Encode<C> for TimeStamp {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

impl serde::Serialize for TimeStamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339())
    }
}

// newtype wrappers over bech32 encoded uuid7 strings. Each kind gets its own
// human readable prefix so ids can't be mixed up when read back from a log.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $hrp:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const HRP: &'static str = $hrp;

            /// Mint a fresh identifier.
            pub fn generate() -> anyhow::Result<Self> {
                crate::utils::new_uuid_to_bech32(Self::HRP).map(Self)
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
            pub fn as_bytes(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl<C> minicbor::Encode<C> for $name {
            fn encode<W: minicbor::encode::Write>(
                &self,
                e: &mut minicbor::Encoder<W>,
                _: &mut C,
            ) -> Result<(), minicbor::encode::Error<W::Error>> {
                e.str(&self.0)?.ok()
            }
        }

        impl<'b, C> minicbor::Decode<'b, C> for $name {
            fn decode(
                d: &mut minicbor::Decoder<'b>,
                _: &mut C,
            ) -> Result<Self, minicbor::decode::Error> {
                Ok(Self(d.str()?.to_owned()))
            }
        }
    };
}

string_id!(
    /// Identifier of a user account.
    UserId,
    "user_"
);
string_id!(
    /// Identifier of a catalog product.
    ProductId,
    "prod_"
);
string_id!(
    /// Identifier of a stock row.
    StockId,
    "stock_"
);
string_id!(
    /// Identifier of an order or listing ledger entry.
    EntryId,
    "entry_"
);

/// What a permission acts upon.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    minicbor::Encode,
    minicbor::Decode,
    serde::Serialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Resource {
    #[n(0)]
    Product,
    #[n(1)]
    User,
}

/// The action performed on a [`Resource`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    minicbor::Encode,
    minicbor::Decode,
    serde::Serialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    #[n(0)]
    View,
    #[n(1)]
    Create,
    #[n(2)]
    Update,
    #[n(3)]
    Delete,
    #[n(4)]
    Buy,
    #[n(5)]
    Sell,
}

impl Resource {
    pub const ALL: [Resource; 2] = [Resource::Product, Resource::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Product => "PRODUCT",
            Resource::User => "USER",
        }
    }
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::View,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
        Operation::Buy,
        Operation::Sell,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::View => "VIEW",
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Buy => "BUY",
            Operation::Sell => "SELL",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("unknown resource '{s}'"))
    }
}

impl FromStr for Operation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|o| o.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("unknown operation '{s}'"))
    }
}
