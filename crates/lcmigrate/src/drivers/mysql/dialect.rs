//! MySQL/MariaDB syntax rules.

use crate::core::traits::{Dialect, PlaceholderStyle};

/// MySQL and MariaDB: backtick identifiers, `?` placeholders, no sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Question
    }

    fn disable_fk_checks_sql(&self) -> &'static str {
        "SET FOREIGN_KEY_CHECKS = 0"
    }

    fn enable_fk_checks_sql(&self) -> &'static str {
        "SET FOREIGN_KEY_CHECKS = 1"
    }

    fn supports_sequences(&self) -> bool {
        false
    }

    fn default_fk_action(&self) -> &'static str {
        "RESTRICT"
    }

    // DROP TABLE ... CASCADE parses but does nothing.
    fn supports_drop_cascade(&self) -> bool {
        false
    }

    fn set_sequence_value_sql(&self, _sequence: &str, _value: i64) -> Option<String> {
        None
    }
}
