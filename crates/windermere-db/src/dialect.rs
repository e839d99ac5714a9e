//! SQL dialect differences.
//!
//! The schema is written once in a driver-neutral template form; everything
//! a specific driver family needs differently (unicode column types,
//! placeholder style, connection pragmas) is expanded here.

use regex::Regex;

use crate::error::StorageError;

/// The supported driver families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
    MySql,
}

impl Dialect {
    /// Determine the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Result<Self, StorageError> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            _ => Err(StorageError::UnsupportedDriver(url.to_string())),
        }
    }

    /// Expand the driver-neutral type templates in a DDL script.
    ///
    /// Types that need a unicode-specific variant are written as
    /// `{{NVARCHAR}}` / `{{NTEXT}}` in the schema. The default expansion
    /// just removes the braces; the MySQL family drops the `N` prefix, and
    /// PostgreSQL additionally knows neither `VARCHAR`'s `N` variants nor
    /// `TINYINT`.
    #[must_use]
    pub fn expand_ddl(&self, schema: &str) -> String {
        let remove_curlies = |schema: &str| {
            let re = Regex::new(r"\{\{(.*?)\}\}").expect("hard coded regex");
            re.replace_all(schema, "$1").into_owned()
        };
        let strip_n_prefix = |schema: &str| {
            let re = Regex::new(r"\{\{N(.*?)\}\}").expect("hard coded regex");
            remove_curlies(&re.replace_all(schema, "$1"))
        };
        match self {
            Dialect::Sqlite => remove_curlies(schema),
            Dialect::MySql => strip_n_prefix(schema),
            Dialect::Postgres => strip_n_prefix(schema).replace("TINYINT", "SMALLINT"),
        }
    }

    /// Rewrite `?` placeholders into the driver's native style.
    ///
    /// The queries in this crate are written with `?`; PostgreSQL wants
    /// numbered `$n` parameters. None of our SQL contains a literal `?`.
    #[must_use]
    pub fn rebind(&self, sql: &str) -> String {
        match self {
            Dialect::Sqlite | Dialect::MySql => sql.to_string(),
            Dialect::Postgres => {
                let mut out = String::with_capacity(sql.len() + 8);
                let mut n = 0;
                for ch in sql.chars() {
                    if ch == '?' {
                        n += 1;
                        out.push('$');
                        out.push_str(&n.to_string());
                    } else {
                        out.push(ch);
                    }
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_from_url() {
        assert_eq!(Dialect::from_url("sqlite::memory:").unwrap(), Dialect::Sqlite);
        assert_eq!(
            Dialect::from_url("postgres://localhost/w").unwrap(),
            Dialect::Postgres
        );
        assert_eq!(
            Dialect::from_url("mysql://localhost/w").unwrap(),
            Dialect::MySql
        );
        assert!(Dialect::from_url("mssql://localhost/w").is_err());
    }

    #[test]
    fn ddl_expansion_per_dialect() {
        let ddl = "CREATE TABLE t (a {{NVARCHAR}}(255), b {{NTEXT}}, c TINYINT);";
        assert_eq!(
            Dialect::Sqlite.expand_ddl(ddl),
            "CREATE TABLE t (a NVARCHAR(255), b NTEXT, c TINYINT);"
        );
        assert_eq!(
            Dialect::MySql.expand_ddl(ddl),
            "CREATE TABLE t (a VARCHAR(255), b TEXT, c TINYINT);"
        );
        assert_eq!(
            Dialect::Postgres.expand_ddl(ddl),
            "CREATE TABLE t (a VARCHAR(255), b TEXT, c SMALLINT);"
        );
    }

    #[test]
    fn placeholder_rebinding() {
        let sql = "SELECT 1 FROM t WHERE a = ? AND b = ?";
        assert_eq!(Dialect::Sqlite.rebind(sql), sql);
        assert_eq!(
            Dialect::Postgres.rebind(sql),
            "SELECT 1 FROM t WHERE a = $1 AND b = $2"
        );
    }
}
