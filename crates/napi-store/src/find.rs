use sqlx::PgConnection;
use sqlx::Row;

use crate::error::{StoreError, StoreResult};
use crate::kv::Stored;

/// An abstract LDAP-equivalent predicate over a bucket's indexed fields
/// (§4.B). Only equality, null checks, a numeric range, and conjunction/
/// disjunction are needed by any NAPI query in §6, so that is all this
/// supports; a field not present in the bucket's schema is a caller bug,
/// not something this type guards against (the orchestrator is expected to
/// only reference indexed fields, per §6's "field-equality filters map to
/// indexed fields only").
///
/// Every generated column is compared in its text form so one filter
/// implementation works uniformly across the uuid/bool/integer/numeric
/// columns a schema can declare, rather than threading a type tag through
/// `Filter` itself. Callers pass the comparison value pre-stringified (a
/// uuid's dashed form, `"true"`/`"false"`, a decimal integer).
#[derive(Debug, Clone)]
pub enum Filter {
    Eq(&'static str, String),
    IsNull(&'static str),
    NotNull(&'static str),
    /// Inclusive numeric range, used by the allocator's oldest-freed scan
    /// (§4.D step 3) to keep the candidate search within a network's
    /// provision range. Bounds are decimal strings (addresses can exceed
    /// `i64`'s range for IPv6), compared against the column's `numeric`
    /// cast.
    Between(&'static str, String, String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &'static str, value: impl ToString) -> Self {
        Filter::Eq(field, value.to_string())
    }

    fn to_sql(&self, binds: &mut Vec<String>) -> String {
        match self {
            Filter::Eq(field, value) => {
                binds.push(value.clone());
                format!("\"{field}\"::text = ${}", binds.len())
            }
            Filter::IsNull(field) => format!("\"{field}\" IS NULL"),
            Filter::NotNull(field) => format!("\"{field}\" IS NOT NULL"),
            Filter::Between(field, lo, hi) => {
                binds.push(lo.clone());
                let lo_idx = binds.len();
                binds.push(hi.clone());
                let hi_idx = binds.len();
                format!("\"{field}\"::numeric BETWEEN ${lo_idx}::numeric AND ${hi_idx}::numeric")
            }
            Filter::And(clauses) => join_clauses(clauses, binds, "AND"),
            Filter::Or(clauses) => join_clauses(clauses, binds, "OR"),
        }
    }
}

fn join_clauses(clauses: &[Filter], binds: &mut Vec<String>, op: &str) -> String {
    if clauses.is_empty() {
        return "TRUE".to_string();
    }
    let rendered: Vec<String> = clauses.iter().map(|c| c.to_sql(binds)).collect();
    format!("({})", rendered.join(&format!(" {op} ")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct FindOptions {
    pub sort: Option<(&'static str, SortOrder)>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            sort: None,
            limit: 1000,
            offset: 0,
        }
    }
}

/// `find(bucket, filter, {sort?, limit?, offset?})` from §4.B. Runs inside
/// whatever connection the caller passes, so a `find` issued from within a
/// transaction observes that transaction's snapshot — satisfying the
/// "consistent with operations completed before the call" guarantee of
/// §4.B without any extra bookkeeping here.
pub async fn find(
    conn: &mut PgConnection,
    bucket: &str,
    filter: &Filter,
    options: &FindOptions,
) -> StoreResult<Vec<Stored>> {
    let table = format!("\"{}\"", bucket.replace('"', "\"\""));
    let mut binds = Vec::new();
    let where_clause = filter.to_sql(&mut binds);

    let mut query = format!("SELECT value, etag FROM {table} WHERE {where_clause}");
    if let Some((field, order)) = options.sort {
        let direction = match order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        query.push_str(&format!(" ORDER BY \"{field}\" {direction}"));
    }
    query.push_str(&format!(" LIMIT {} OFFSET {}", options.limit, options.offset));

    let mut q = sqlx::query(&query);
    for bind in &binds {
        q = q.bind(bind);
    }

    let rows = q
        .fetch_all(conn)
        .await
        .map_err(|e| StoreError::query(&query, e))?;

    Ok(rows
        .into_iter()
        .map(|row| Stored {
            value: row.get("value"),
            etag: row.get("etag"),
        })
        .collect())
}

/// `find`'s total-match count, ignoring `limit`/`offset` — used by listing
/// endpoints that report a count alongside a page (§4.H).
pub async fn count(conn: &mut PgConnection, bucket: &str, filter: &Filter) -> StoreResult<i64> {
    let table = format!("\"{}\"", bucket.replace('"', "\"\""));
    let mut binds = Vec::new();
    let where_clause = filter.to_sql(&mut binds);
    let query = format!("SELECT count(*) FROM {table} WHERE {where_clause}");

    let mut q = sqlx::query_scalar(&query);
    for bind in &binds {
        q = q.bind(bind);
    }

    q.fetch_one(conn)
        .await
        .map_err(|e| StoreError::query(&query, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_filter_renders_placeholder() {
        let mut binds = Vec::new();
        let sql = Filter::eq("name", "external").to_sql(&mut binds);
        assert_eq!(sql, "\"name\"::text = $1");
        assert_eq!(binds.len(), 1);
    }

    #[test]
    fn and_filter_joins_clauses() {
        let mut binds = Vec::new();
        let filter = Filter::And(vec![Filter::eq("family", "ipv4"), Filter::eq("reserved", false)]);
        let sql = filter.to_sql(&mut binds);
        assert_eq!(sql, "(\"family\"::text = $1 AND \"reserved\"::text = $2)");
    }

    #[test]
    fn empty_and_is_unconditionally_true() {
        let mut binds = Vec::new();
        assert_eq!(Filter::And(vec![]).to_sql(&mut binds), "TRUE");
    }

    #[test]
    fn is_null_renders_without_a_bind() {
        let mut binds = Vec::new();
        assert_eq!(
            Filter::IsNull("belongs_to_uuid").to_sql(&mut binds),
            "\"belongs_to_uuid\" IS NULL"
        );
        assert!(binds.is_empty());
    }

    #[test]
    fn between_binds_both_bounds() {
        let mut binds = Vec::new();
        let sql = Filter::Between("addr_num", "10".to_string(), "20".to_string()).to_sql(&mut binds);
        assert_eq!(
            sql,
            "\"addr_num\"::numeric BETWEEN $1::numeric AND $2::numeric"
        );
        assert_eq!(binds.len(), 2);
    }
}
