use crate::models::DbEngine;

/// Ordered table of engine identities and the error fragments each one
/// leaks. Declaration order is the tie-break when a body matches more
/// than one engine; `Generic` sits last so it only catches responses
/// with SQL-error indicators that name no specific engine.
pub struct SignatureTable {
    entries: Vec<(DbEngine, Vec<&'static str>)>,
}

impl SignatureTable {
    pub fn builtin() -> Self {
        SignatureTable {
            entries: vec![
                (DbEngine::MySql, vec!["mysql", "sql syntax", "mysql_fetch"]),
                (
                    DbEngine::PostgreSql,
                    vec!["postgresql", "pg_query", "pg_exec"],
                ),
                (DbEngine::Sqlite, vec!["sqlite", "sqlite3"]),
                (
                    DbEngine::Mssql,
                    vec!["sql server", "microsoft ole db", "odbc"],
                ),
                (DbEngine::Oracle, vec!["oracle", "ora-", "oci_"]),
                (
                    DbEngine::Generic,
                    vec![
                        "unclosed quotation",
                        "quoted string not properly terminated",
                        "syntax error",
                    ],
                ),
            ],
        }
    }

    /// Constructs a table from caller-supplied entries, kept in the
    /// given order.
    pub fn from_entries(entries: Vec<(DbEngine, Vec<&'static str>)>) -> Self {
        SignatureTable { entries }
    }

    /// Case-insensitive substring scan. Returns the first matching engine
    /// in table order along with the fragment that matched.
    pub fn match_body(&self, body: &str) -> Option<(DbEngine, &'static str)> {
        let lower = body.to_lowercase();
        for (engine, fragments) in &self.entries {
            for fragment in fragments {
                if lower.contains(fragment) {
                    return Some((*engine, fragment));
                }
            }
        }
        None
    }
}

impl Default for SignatureTable {
    fn default() -> Self {
        Self::builtin()
    }
}
