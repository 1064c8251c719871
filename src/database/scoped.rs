use sqlx::{Encode, Postgres, QueryBuilder, Type};

use crate::tenant::ActiveTenant;

/// SQL builder whose first predicate is always `tenant_id = $1`.
///
/// There is no constructor without an [`ActiveTenant`], so a tenant-scoped
/// statement built here cannot forget the tenant filter.
pub struct ScopedQuery<'args> {
    builder: QueryBuilder<'args, Postgres>,
}

impl<'args> ScopedQuery<'args> {
    pub fn select(columns: &str, table: &str, tenant: &ActiveTenant) -> Self {
        let mut builder = QueryBuilder::new(format!("SELECT {} FROM {} WHERE tenant_id = ", columns, table));
        builder.push_bind(tenant.id().get());
        Self { builder }
    }

    pub fn and_eq<T>(mut self, column: &str, value: T) -> Self
    where
        T: 'args + Encode<'args, Postgres> + Send + Type<Postgres>,
    {
        self.builder.push(format!(" AND {} = ", column));
        self.builder.push_bind(value);
        self
    }

    /// Adds the predicate only when a value is present
    pub fn and_eq_opt<T>(self, column: &str, value: Option<T>) -> Self
    where
        T: 'args + Encode<'args, Postgres> + Send + Type<Postgres>,
    {
        match value {
            Some(value) => self.and_eq(column, value),
            None => self,
        }
    }

    pub fn and_between<T>(mut self, column: &str, from: T, to: T) -> Self
    where
        T: 'args + Encode<'args, Postgres> + Send + Type<Postgres>,
    {
        self.builder.push(format!(" AND {} BETWEEN ", column));
        self.builder.push_bind(from);
        self.builder.push(" AND ");
        self.builder.push_bind(to);
        self
    }

    pub fn order_by(mut self, clause: &str) -> Self {
        self.builder.push(format!(" ORDER BY {}", clause));
        self
    }

    pub fn limit(mut self, limit: Option<i64>) -> Self {
        if let Some(limit) = limit.filter(|l| *l > 0) {
            self.builder.push(" LIMIT ");
            self.builder.push_bind(limit);
        }
        self
    }

    pub fn sql(&self) -> &str {
        self.builder.sql()
    }

    pub fn builder_mut(&mut self) -> &mut QueryBuilder<'args, Postgres> {
        &mut self.builder
    }
}
