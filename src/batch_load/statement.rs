/// SQL flavour of the target database.
/// Decides how column identifiers are quoted in the insert statement.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Dialect {
    ClickHouse,
    DuckDb,
}

impl Dialect {
    /// Quote a single identifier for this dialect
    pub fn quote_identifier(&self, ident: &str) -> String {
        match self {
            Dialect::ClickHouse => {
                let mut quoted = String::with_capacity(ident.len() + 2);
                quoted.push('`');
                for c in ident.chars() {
                    if c == '`' || c == '\\' {
                        quoted.push('\\');
                    }
                    quoted.push(c);
                }
                quoted.push('`');
                quoted
            }
            Dialect::DuckDb => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::ClickHouse => write!(f, "ClickHouse"),
            Dialect::DuckDb => write!(f, "DuckDB"),
        }
    }
}

// Build the insert statement from the header row.
// The table name is kept verbatim so `db.table` still works; each column is quoted on its own.
pub fn build_insert_statement(dialect: Dialect, table: &str, headers: &[String]) -> String {
    let column_list = headers
        .iter()
        .map(|header| dialect.quote_identifier(header))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} ({}) VALUES", table, column_list)
}
