#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
pub mod builtins;
pub mod errors;
pub mod join;
pub mod parser;
pub mod schema;

pub use errors::{QueryError, SchemaError};
pub use join::Join;
pub use parser::{decode_component, parse, parse_encoded};
pub use schema::{
    Action, CreateRequirement, EntityDef, EntityHooks, EntitySchema, FieldSchema, FieldType,
    ForeignKey, Record, Schema, SchemaBuilder, table_name,
};

pub mod ast {
    use std::fmt;

    /// Literal bound on the right-hand side of a comparison.
    #[derive(Clone, Debug, PartialEq)]
    pub enum Value {
        Int(i64),
        Float(f64),
        Text(String),
    }

    impl Value {
        /// The `null` keyword, matched case-insensitively. Compiles to
        /// `IS NULL` / `IS NOT NULL` instead of a bound parameter.
        #[must_use]
        pub fn is_null_literal(&self) -> bool {
            matches!(self, Value::Text(s) if s.eq_ignore_ascii_case("null"))
        }
    }

    impl fmt::Display for Value {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Value::Int(i) => write!(f, "{i}"),
                Value::Float(x) => write!(f, "{x}"),
                Value::Text(s) => write!(f, "{s}"),
            }
        }
    }

    impl From<i64> for Value {
        fn from(v: i64) -> Self {
            Value::Int(v)
        }
    }

    impl From<&str> for Value {
        fn from(v: &str) -> Self {
            Value::Text(v.to_owned())
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum CompareOperator {
        Eq,
        Ne,
        Le,
        Ge,
        Lt,
        Gt,
        /// Substring match (`~`).
        Contains,
    }

    impl CompareOperator {
        /// Scan order used when splitting a comparison. Multi-character
        /// tokens come before their single-character substrings.
        pub const PARSE_ORDER: [CompareOperator; 7] = [
            CompareOperator::Contains,
            CompareOperator::Ne,
            CompareOperator::Le,
            CompareOperator::Ge,
            CompareOperator::Lt,
            CompareOperator::Gt,
            CompareOperator::Eq,
        ];

        #[must_use]
        pub const fn token(self) -> &'static str {
            match self {
                CompareOperator::Eq => "=",
                CompareOperator::Ne => "<>",
                CompareOperator::Le => "<=",
                CompareOperator::Ge => ">=",
                CompareOperator::Lt => "<",
                CompareOperator::Gt => ">",
                CompareOperator::Contains => "~",
            }
        }
    }

    impl fmt::Display for CompareOperator {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.token())
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum LogicalOperator {
        And,
        Or,
    }

    impl LogicalOperator {
        #[must_use]
        pub const fn separator(self) -> &'static str {
            match self {
                LogicalOperator::And => " AND ",
                LogicalOperator::Or => " OR ",
            }
        }
    }

    /// `entity.field <op> value`. `entity` is `None` only for the
    /// always-true literal `1=1`.
    #[derive(Clone, Debug, PartialEq)]
    pub struct Leaf {
        pub entity: Option<String>,
        pub field: String,
        pub op: CompareOperator,
        pub value: Value,
    }

    impl Leaf {
        #[must_use]
        pub fn is_true_literal(&self) -> bool {
            self.field == "1" && matches!(&self.value, Value::Text(v) if v == "1")
        }

        /// Whether compiling this leaf binds a parameter.
        #[must_use]
        pub fn binds_value(&self) -> bool {
            if self.is_true_literal() {
                return false;
            }
            self.op == CompareOperator::Contains || !self.value.is_null_literal()
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    pub enum Condition {
        Leaf(Leaf),
        /// A compound with no children is always true.
        Compound {
            op: LogicalOperator,
            children: Vec<Condition>,
        },
    }

    impl Condition {
        pub fn leaf(
            entity: impl Into<String>,
            field: impl Into<String>,
            op: CompareOperator,
            value: impl Into<Value>,
        ) -> Self {
            Condition::Leaf(Leaf {
                entity: Some(entity.into()),
                field: field.into(),
                op,
                value: value.into(),
            })
        }

        /// `AND(1=1)`, the result of parsing an empty string.
        #[must_use]
        pub fn always_true() -> Self {
            Condition::and(vec![Condition::Leaf(Leaf {
                entity: None,
                field: "1".to_owned(),
                op: CompareOperator::Eq,
                value: Value::Text("1".to_owned()),
            })])
        }

        #[must_use]
        pub fn and(children: Vec<Condition>) -> Self {
            Condition::Compound {
                op: LogicalOperator::And,
                children,
            }
        }

        #[must_use]
        pub fn or(children: Vec<Condition>) -> Self {
            Condition::Compound {
                op: LogicalOperator::Or,
                children,
            }
        }

        /// `self AND other`.
        #[must_use]
        pub fn and_also(self, other: Condition) -> Self {
            Condition::and(vec![self, other])
        }

        /// First value bound to `key` anywhere in the tree.
        #[must_use]
        pub fn get_value(&self, key: &str) -> Option<&Value> {
            match self {
                Condition::Leaf(leaf) => (leaf.field == key).then_some(&leaf.value),
                Condition::Compound { children, .. } => {
                    children.iter().find_map(|c| c.get_value(key))
                }
            }
        }

        /// Every value bound to `key`, depth-first.
        #[must_use]
        pub fn values_for(&self, key: &str) -> Vec<&Value> {
            match self {
                Condition::Leaf(leaf) if leaf.field == key => vec![&leaf.value],
                Condition::Leaf(_) => Vec::new(),
                Condition::Compound { children, .. } => {
                    children.iter().flat_map(|c| c.values_for(key)).collect()
                }
            }
        }

        /// Number of parameters the compiled form binds.
        #[must_use]
        pub fn bound_value_count(&self) -> usize {
            match self {
                Condition::Leaf(leaf) => usize::from(leaf.binds_value()),
                Condition::Compound { children, .. } => {
                    children.iter().map(Condition::bound_value_count).sum()
                }
            }
        }
    }
}

/// Sort direction for the single order-by column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SortDir {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderKey {
    pub field: String,
    pub dir: SortDir,
}

impl OrderKey {
    /// Parse a URL-encoded order-by token. A leading `~` means descending;
    /// an empty token orders by `id`.
    ///
    /// # Errors
    /// Returns `QueryError::InvalidOrderBy` if the token does not decode or
    /// names a field outside the entity.
    pub fn parse(entity: &EntitySchema, raw: &str) -> Result<Self, QueryError> {
        let decoded = decode_component(raw)?;
        let (dir, name) = match decoded.strip_prefix('~') {
            Some(rest) => (SortDir::Desc, rest),
            None => (SortDir::Asc, decoded.as_str()),
        };
        let name = if name.is_empty() { "id" } else { name };
        if entity.field(name).is_none() {
            return Err(QueryError::InvalidOrderBy(name.to_owned()));
        }
        Ok(OrderKey {
            field: name.to_owned(),
            dir,
        })
    }
}
