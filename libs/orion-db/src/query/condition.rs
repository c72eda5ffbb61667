use orion_query::ast::{CompareOperator, Condition, Leaf};
use orion_query::table_name;

use crate::dialect::Dialect;
use crate::query::{SqlQuery, SqlValue};

/// Statement under construction. Text and parameters grow together, so a
/// placeholder's number always matches its position in the final text.
pub(super) struct Emitter {
    dialect: &'static dyn Dialect,
    params: Vec<SqlValue>,
}

impl Emitter {
    pub(super) fn new(dialect: &'static dyn Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    pub(super) fn bind(&mut self, value: SqlValue) -> String {
        let placeholder = self.dialect.placeholder(self.params.len());
        self.params.push(value);
        placeholder
    }

    pub(super) fn quote(&self, ident: &str) -> String {
        self.dialect.quote_identifier(ident)
    }

    pub(super) fn column(&self, table: &str, field: &str) -> String {
        format!("{}.{}", self.quote(table), self.quote(field))
    }

    pub(super) fn pagination(&mut self, skip: i64, take: i64) -> String {
        let dialect = self.dialect;
        dialect.pagination_clause(skip, take, &mut |v| self.bind(v))
    }

    pub(super) fn finish(self, sql: String) -> SqlQuery {
        SqlQuery {
            sql,
            params: self.params,
        }
    }

    /// Compile a condition tree to a WHERE expression, binding leaf values
    /// depth-first, left to right.
    pub(super) fn condition(&mut self, node: &Condition) -> String {
        match node {
            Condition::Leaf(leaf) => self.leaf(leaf),
            Condition::Compound { children, .. } if children.is_empty() => "1=1".to_owned(),
            Condition::Compound { op, children } => {
                let parts: Vec<String> = children.iter().map(|c| self.condition(c)).collect();
                format!("({})", parts.join(op.separator()))
            }
        }
    }

    fn leaf(&mut self, leaf: &Leaf) -> String {
        if leaf.is_true_literal() {
            return "1=1".to_owned();
        }

        let column = match &leaf.entity {
            Some(entity) => self.column(&table_name(entity), &leaf.field),
            None => self.quote(&leaf.field),
        };

        if leaf.op == CompareOperator::Contains {
            let placeholder = self.bind(SqlValue::Text(format!("%{}%", leaf.value)));
            return format!("{column} LIKE {placeholder}");
        }

        if leaf.value.is_null_literal() {
            return if leaf.op == CompareOperator::Eq {
                format!("{column} IS NULL")
            } else {
                format!("{column} IS NOT NULL")
            };
        }

        let placeholder = self.bind(SqlValue::from(&leaf.value));
        format!("{column} {} {placeholder}", leaf.op)
    }
}
