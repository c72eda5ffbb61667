//! Backend syntax strategy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::query::SqlValue;

/// Everything that differs between backends when rendering a statement.
pub trait Dialect: Send + Sync + fmt::Debug {
    fn kind(&self) -> DialectKind;

    fn quote_identifier(&self, ident: &str) -> String;

    /// Placeholder for the parameter at 0-based `index` in the bind list.
    fn placeholder(&self, index: usize) -> String;

    /// Render the pagination clause. `bind` registers a value and returns its
    /// placeholder; each dialect binds in the order its clause reads.
    fn pagination_clause(
        &self,
        skip: i64,
        take: i64,
        bind: &mut dyn FnMut(SqlValue) -> String,
    ) -> String;

    /// Statement appended to an insert to return the generated id in the same
    /// round trip; `None` when the driver reports it natively.
    fn last_insert_id_clause(&self) -> Option<&'static str>;

    /// Column key under which `COUNT(*)` comes back.
    fn count_key(&self) -> &'static str;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MsSql;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MySql;

impl Dialect for MsSql {
    fn kind(&self) -> DialectKind {
        DialectKind::MsSql
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@value{index}")
    }

    fn pagination_clause(
        &self,
        skip: i64,
        take: i64,
        bind: &mut dyn FnMut(SqlValue) -> String,
    ) -> String {
        let skip = bind(SqlValue::Int(skip));
        let take = bind(SqlValue::Int(take));
        format!("OFFSET {skip} ROWS FETCH NEXT {take} ROWS ONLY")
    }

    fn last_insert_id_clause(&self) -> Option<&'static str> {
        Some("SELECT SCOPE_IDENTITY() AS id")
    }

    fn count_key(&self) -> &'static str {
        ""
    }
}

impl Dialect for MySql {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_owned()
    }

    fn pagination_clause(
        &self,
        skip: i64,
        take: i64,
        bind: &mut dyn FnMut(SqlValue) -> String,
    ) -> String {
        let take = bind(SqlValue::Int(take));
        let skip = bind(SqlValue::Int(skip));
        format!("LIMIT {take} OFFSET {skip}")
    }

    fn last_insert_id_clause(&self) -> Option<&'static str> {
        None
    }

    fn count_key(&self) -> &'static str {
        "count"
    }
}

/// Configured backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    MsSql,
    MySql,
}

static MSSQL: MsSql = MsSql;
static MYSQL: MySql = MySql;

impl DialectKind {
    #[must_use]
    pub fn dialect(self) -> &'static dyn Dialect {
        match self {
            DialectKind::MsSql => &MSSQL,
            DialectKind::MySql => &MYSQL,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DialectKind::MsSql => "mssql",
            DialectKind::MySql => "mysql",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mssql" => Ok(DialectKind::MsSql),
            "mysql" => Ok(DialectKind::MySql),
            other => Err(format!("unknown SQL engine '{other}'")),
        }
    }
}
