use std::fmt;
use std::str::FromStr;

/// How a request reaches an entity.
///
/// `Private` requires an authenticated identity and scopes every read and
/// write to records owned by that identity. `Public` applies only role and
/// custom hook checks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    #[default]
    Public,
    Private,
}

impl AccessMode {
    #[must_use]
    pub fn is_private(self) -> bool {
        matches!(self, AccessMode::Private)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Public => write!(f, "public"),
            AccessMode::Private => write!(f, "private"),
        }
    }
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(AccessMode::Public),
            "private" => Ok(AccessMode::Private),
            other => Err(format!("unknown access mode: {other}")),
        }
    }
}
