//! PostgreSQL backend.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::types::{Oid, PgInterval, PgMoney};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow, PgValueFormat, PgValueRef, Postgres};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use super::{float_cell, CatalogColumn, Cell, QueryRows, SqlStore, StoreError};
use crate::core::DatabaseConfig;

const CATALOG_QUERY: &str = "SELECT table_name::text, column_name::text, data_type::text \
     FROM information_schema.columns \
     WHERE table_schema = $1 \
     ORDER BY table_name, ordinal_position";

/// PostgreSQL store backed by a bounded connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    schema: String,
}

impl PgStore {
    /// Build a pool that opens connections on first use.
    pub fn connect_lazy(url: &str, config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy(url)?;

        Ok(Self::from_pool(pool, &config.schema))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, schema: &str) -> Self {
        Self { pool, schema: schema.to_string() }
    }

    /// Get the database pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SqlStore for PgStore {
    async fn catalog(&self) -> Result<Vec<CatalogColumn>, StoreError> {
        let mut conn = self.pool.acquire().await?;

        let rows: Vec<(String, String, String)> = sqlx::query_as(CATALOG_QUERY)
            .bind(&self.schema)
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(table, column, data_type)| CatalogColumn { table, column, data_type })
            .collect())
    }

    async fn run_query(&self, sql: &str) -> Result<QueryRows, StoreError> {
        let mut conn = self.pool.acquire().await?;

        // Generated queries are one-offs; keep them out of the statement cache.
        let rows = sqlx::query(sql).persistent(false).fetch_all(&mut *conn).await?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rows = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| decode_cell(row, i)).collect())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QueryRows { columns, rows })
    }

    fn dialect(&self) -> &'static str {
        "PostgreSQL"
    }
}

/// Decode one cell into a JSON value based on its Postgres type.
///
/// A value whose typed decode fails (NUMERIC `NaN`, out-of-range decimals)
/// falls back to its raw wire form, so a successful query never turns into
/// an execution failure here.
fn decode_cell(row: &PgRow, index: usize) -> Result<Cell, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();

    match decode_typed(row, index, &type_name) {
        Ok(Some(cell)) => Ok(cell),
        Ok(None) => Ok(decode_raw(&raw, &type_name)),
        Err(e) => {
            tracing::debug!(error = %e, type_name = %type_name, "typed decode failed");
            Ok(decode_raw(&raw, &type_name))
        }
    }
}

fn decode_typed(row: &PgRow, index: usize, type_name: &str) -> Result<Option<Cell>, sqlx::Error> {
    let cell = match type_name {
        "BOOL" => Value::Bool(row.try_get::<bool, _>(index)?),
        "INT2" => Value::from(row.try_get::<i16, _>(index)?),
        "INT4" => Value::from(row.try_get::<i32, _>(index)?),
        "INT8" => Value::from(row.try_get::<i64, _>(index)?),
        "OID" => Value::from(row.try_get::<Oid, _>(index)?.0),
        "FLOAT4" => float_cell(f64::from(row.try_get::<f32, _>(index)?)),
        "FLOAT8" => float_cell(row.try_get::<f64, _>(index)?),
        "NUMERIC" => Value::String(row.try_get::<Decimal, _>(index)?.to_string()),
        "MONEY" => Value::String(row.try_get::<PgMoney, _>(index)?.to_decimal(2).to_string()),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
            Value::String(row.try_get::<String, _>(index)?)
        }
        "DATE" => Value::String(row.try_get::<NaiveDate, _>(index)?.to_string()),
        "TIME" => Value::String(row.try_get::<NaiveTime, _>(index)?.to_string()),
        "TIMESTAMP" => Value::String(row.try_get::<NaiveDateTime, _>(index)?.to_string()),
        "TIMESTAMPTZ" => Value::String(row.try_get::<DateTime<Utc>, _>(index)?.to_rfc3339()),
        "INTERVAL" => Value::String(format_interval(&row.try_get::<PgInterval, _>(index)?)),
        "UUID" => Value::String(row.try_get::<uuid::Uuid, _>(index)?.to_string()),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index)?,
        "_TEXT" | "_VARCHAR" | "_BPCHAR" | "_NAME" => array_cell(row, index, Value::String)?,
        "_BOOL" => array_cell(row, index, Value::Bool)?,
        "_INT2" => array_cell(row, index, |v: i16| Value::from(v))?,
        "_INT4" => array_cell(row, index, |v: i32| Value::from(v))?,
        "_INT8" => array_cell(row, index, |v: i64| Value::from(v))?,
        "_FLOAT8" => array_cell(row, index, float_cell)?,
        "_NUMERIC" => array_cell(row, index, |v: Decimal| Value::String(v.to_string()))?,
        "_UUID" => array_cell(row, index, |v: uuid::Uuid| Value::String(v.to_string()))?,
        _ => return Ok(None),
    };

    Ok(Some(cell))
}

/// Decode a one-dimensional array, keeping NULL elements.
fn array_cell<T>(row: &PgRow, index: usize, cell: impl Fn(T) -> Cell) -> Result<Cell, sqlx::Error>
where
    for<'r> Vec<Option<T>>: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    let items: Vec<Option<T>> = row.try_get(index)?;
    Ok(Value::Array(items.into_iter().map(|item| item.map_or(Value::Null, &cell)).collect()))
}

/// Render a value from its wire bytes when no typed decode applies.
fn decode_raw(raw: &PgValueRef<'_>, type_name: &str) -> Cell {
    let decoded = match raw.format() {
        PgValueFormat::Text => raw.as_str().ok().map(str::to_string),
        PgValueFormat::Binary => raw.as_bytes().ok().and_then(|bytes| match type_name {
            "NUMERIC" => numeric_to_string(bytes),
            "INET" | "CIDR" => inet_to_string(bytes),
            _ => std::str::from_utf8(bytes)
                .ok()
                .filter(|s| !s.chars().any(char::is_control))
                .map(str::to_string),
        }),
    };

    decoded.map_or_else(|| Value::String(format!("<{}>", type_name.to_lowercase())), Value::String)
}

/// Format a binary NUMERIC: base-10000 digit groups behind an 8-byte header.
fn numeric_to_string(bytes: &[u8]) -> Option<String> {
    let read = |at: usize| bytes.get(at..at + 2).map(|b| u16::from_be_bytes([b[0], b[1]]));

    let ndigits = usize::from(read(0)?);
    let weight = i32::from(i16::from_be_bytes(read(2)?.to_be_bytes()));
    let sign = read(4)?;
    let dscale = usize::from(read(6)?);

    match sign {
        0xC000 => return Some("NaN".to_string()),
        0xD000 => return Some("Infinity".to_string()),
        0xF000 => return Some("-Infinity".to_string()),
        _ => {}
    }

    let groups: Vec<u16> = (0..ndigits).map(|i| read(8 + 2 * i)).collect::<Option<_>>()?;
    // Group i carries weight `weight - i`; positions outside the stored digits are zero.
    let group = |i: i32| usize::try_from(i).ok().and_then(|i| groups.get(i).copied()).unwrap_or(0);

    let mut out = String::new();
    if sign == 0x4000 {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&group(0).to_string());
        for i in 1..=weight {
            out.push_str(&format!("{:04}", group(i)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::new();
        let mut i = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", group(i)));
            i += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Some(out)
}

/// Format a binary INET/CIDR: family, prefix bits, cidr flag, length, address.
fn inet_to_string(bytes: &[u8]) -> Option<String> {
    let [family, bits, is_cidr, len] = <[u8; 4]>::try_from(bytes.get(..4)?).ok()?;
    let addr = bytes.get(4..4 + usize::from(len))?;

    let (ip, max_bits) = match family {
        2 => (IpAddr::from(<[u8; 4]>::try_from(addr).ok()?), 32),
        3 => (IpAddr::from(<[u8; 16]>::try_from(addr).ok()?), 128),
        _ => return None,
    };

    if bits == max_bits && is_cidr == 0 {
        Some(ip.to_string())
    } else {
        Some(format!("{}/{}", ip, bits))
    }
}

/// Render an interval the way `psql` does, e.g. `1 year 2 mons 3 days 04:05:06`.
fn format_interval(interval: &PgInterval) -> String {
    let mut parts = Vec::new();

    let (years, months) = (interval.months / 12, interval.months % 12);
    for (value, unit) in [(years, "year"), (months, "mon"), (interval.days, "day")] {
        if value != 0 {
            let plural = if value.abs() == 1 { "" } else { "s" };
            parts.push(format!("{} {}{}", value, unit, plural));
        }
    }

    let micros = interval.microseconds;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let micros = micros.unsigned_abs();
        let secs = micros / 1_000_000;
        let mut time =
            format!("{}{:02}:{:02}:{:02}", sign, secs / 3600, (secs / 60) % 60, secs % 60);
        let fraction = micros % 1_000_000;
        if fraction != 0 {
            time.push_str(format!(".{:06}", fraction).trim_end_matches('0'));
        }
        parts.push(time);
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> Option<PgStore> {
        let url = std::env::var("QUARRY_TEST_DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new().max_connections(2).connect(&url).await.ok()?;
        Some(PgStore::from_pool(pool, "public"))
    }

    #[tokio::test]
    async fn test_connect_lazy_does_not_touch_network() {
        let config = DatabaseConfig::default();
        let store = PgStore::connect_lazy("postgres://nobody@127.0.0.1:1/none", &config);
        assert!(store.is_ok());
    }

    fn numeric_bytes(weight: i16, sign: u16, dscale: u16, groups: &[u16]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&u16::try_from(groups.len()).unwrap().to_be_bytes());
        bytes.extend_from_slice(&weight.to_be_bytes());
        bytes.extend_from_slice(&sign.to_be_bytes());
        bytes.extend_from_slice(&dscale.to_be_bytes());
        for group in groups {
            bytes.extend_from_slice(&group.to_be_bytes());
        }
        bytes
    }

    #[test]
    fn test_numeric_to_string() {
        let value = numeric_bytes(1, 0, 3, &[1, 2345, 6780]);
        assert_eq!(numeric_to_string(&value).unwrap(), "12345.678");
        assert_eq!(numeric_to_string(&numeric_bytes(-1, 0x4000, 4, &[1])).unwrap(), "-0.0001");
        assert_eq!(numeric_to_string(&numeric_bytes(-2, 0, 8, &[1])).unwrap(), "0.00000001");
        assert_eq!(numeric_to_string(&numeric_bytes(0, 0, 2, &[])).unwrap(), "0.00");
        assert_eq!(
            numeric_to_string(&numeric_bytes(10, 0, 0, &[1])).unwrap(),
            format!("1{}", "0".repeat(40))
        );
    }

    #[test]
    fn test_numeric_special_values() {
        assert_eq!(numeric_to_string(&numeric_bytes(0, 0xC000, 0, &[])).unwrap(), "NaN");
        assert_eq!(numeric_to_string(&numeric_bytes(0, 0xD000, 0, &[])).unwrap(), "Infinity");
        assert_eq!(numeric_to_string(&numeric_bytes(0, 0xF000, 0, &[])).unwrap(), "-Infinity");
        assert!(numeric_to_string(&[0, 1]).is_none());
    }

    #[test]
    fn test_inet_to_string() {
        assert_eq!(inet_to_string(&[2, 32, 0, 4, 192, 168, 0, 1]).unwrap(), "192.168.0.1");
        assert_eq!(inet_to_string(&[2, 8, 1, 4, 10, 0, 0, 0]).unwrap(), "10.0.0.0/8");

        let mut v6 = vec![3, 128, 0, 16];
        v6.extend_from_slice(&[0; 15]);
        v6.push(1);
        assert_eq!(inet_to_string(&v6).unwrap(), "::1");
        assert!(inet_to_string(&[9, 0, 0, 0]).is_none());
    }

    #[test]
    fn test_format_interval() {
        let interval = PgInterval { months: 14, days: 3, microseconds: 14_706_000_000 };
        assert_eq!(format_interval(&interval), "1 year 2 mons 3 days 04:05:06");

        let zero = PgInterval { months: 0, days: 0, microseconds: 0 };
        assert_eq!(format_interval(&zero), "00:00:00");

        let fractional = PgInterval { months: 0, days: 1, microseconds: 1_500_000 };
        assert_eq!(format_interval(&fractional), "1 day 00:00:01.5");
    }

    #[tokio::test]
    #[ignore] // Requires QUARRY_TEST_DATABASE_URL
    async fn test_decode_arrays_and_fallbacks() {
        let store = test_store().await.expect("QUARRY_TEST_DATABASE_URL must point at Postgres");
        let result = store
            .run_query(
                "SELECT ARRAY['a', 'b', NULL]::text[] AS names, ARRAY[1, 2]::int4[] AS ids, \
                 ARRAY[1.5, 2]::numeric[] AS amounts, 'NaN'::numeric AS nan, \
                 1e40::numeric AS huge, '1 year 2 mons 3 days 04:05:06'::interval AS span, \
                 12.34::money AS price, '192.168.0.1'::inet AS host, '10.0.0.0/8'::cidr AS net, \
                 26::oid AS oid",
            )
            .await
            .unwrap();

        assert_eq!(
            result.rows,
            vec![vec![
                serde_json::json!(["a", "b", null]),
                serde_json::json!([1, 2]),
                serde_json::json!(["1.5", "2"]),
                serde_json::json!("NaN"),
                serde_json::json!(format!("1{}", "0".repeat(40))),
                serde_json::json!("1 year 2 mons 3 days 04:05:06"),
                serde_json::json!("12.34"),
                serde_json::json!("192.168.0.1"),
                serde_json::json!("10.0.0.0/8"),
                serde_json::json!(26),
            ]]
        );
    }

    #[tokio::test]
    #[ignore] // Requires QUARRY_TEST_DATABASE_URL
    async fn test_decode_common_types() {
        let store = test_store().await.expect("QUARRY_TEST_DATABASE_URL must point at Postgres");
        let result = store
            .run_query(
                "SELECT 1::int4 AS a, 2.50::numeric AS b, 'x'::text AS c, NULL::int8 AS d, \
                 true AS e, '2024-03-01'::date AS f",
            )
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["a", "b", "c", "d", "e", "f"]);
        assert_eq!(
            result.rows,
            vec![vec![
                serde_json::json!(1),
                serde_json::json!("2.50"),
                serde_json::json!("x"),
                Value::Null,
                serde_json::json!(true),
                serde_json::json!("2024-03-01"),
            ]]
        );
    }
}
