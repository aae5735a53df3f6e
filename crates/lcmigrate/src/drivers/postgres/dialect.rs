//! PostgreSQL syntax rules.

use crate::core::traits::{Dialect, PlaceholderStyle};

/// PostgreSQL: double-quoted identifiers, `$N` placeholders, sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "pgsql"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Positional
    }

    // replica role skips FK triggers for this session only.
    fn disable_fk_checks_sql(&self) -> &'static str {
        "SET session_replication_role = replica"
    }

    fn enable_fk_checks_sql(&self) -> &'static str {
        "SET session_replication_role = DEFAULT"
    }

    fn supports_sequences(&self) -> bool {
        true
    }

    fn default_fk_action(&self) -> &'static str {
        "NO ACTION"
    }

    fn supports_drop_cascade(&self) -> bool {
        true
    }

    /// `setval` takes a regclass, which case-folds unquoted text, so the
    /// name is quoted as an identifier inside the literal.
    fn set_sequence_value_sql(&self, sequence: &str, value: i64) -> Option<String> {
        Some(format!(
            "SELECT setval({}, {}, true)",
            self.quote_literal(&self.quote_ident(sequence)),
            value
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_doubles_quotes() {
        assert_eq!(PostgresDialect.quote_ident("users"), "\"users\"");
        assert_eq!(PostgresDialect.quote_ident("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_placeholders_count_up() {
        assert_eq!(PostgresDialect.param_placeholder(1), "$1");
        assert_eq!(PostgresDialect.param_placeholder(12), "$12");
        assert_eq!(PostgresDialect.placeholder_style(), PlaceholderStyle::Positional);
    }

    #[test]
    fn test_fk_toggles_and_actions() {
        assert_eq!(
            PostgresDialect.disable_fk_checks_sql(),
            "SET session_replication_role = replica"
        );
        assert_eq!(
            PostgresDialect.enable_fk_checks_sql(),
            "SET session_replication_role = DEFAULT"
        );
        assert_eq!(PostgresDialect.default_fk_action(), "NO ACTION");
        assert!(PostgresDialect.supports_drop_cascade());
    }

    #[test]
    fn test_setval_quotes_sequence_name() {
        assert_eq!(
            PostgresDialect.set_sequence_value_sql("users_id_seq", 42).unwrap(),
            "SELECT setval('\"users_id_seq\"', 42, true)"
        );
        assert_eq!(
            PostgresDialect.set_sequence_value_sql("Ticket_Seq", 7).unwrap(),
            "SELECT setval('\"Ticket_Seq\"', 7, true)"
        );
        assert_eq!(
            PostgresDialect.set_sequence_value_sql("o'seq", 1).unwrap(),
            "SELECT setval('\"o''seq\"', 1, true)"
        );
    }

    #[test]
    fn test_page_query_without_columns() {
        assert_eq!(
            PostgresDialect.build_page_query("users", &[], 0, 0),
            "SELECT * FROM \"users\" LIMIT 0 OFFSET 0"
        );
    }
}
