//! Transaction strategy selection
//!
//! Most migrations run all of their statements and the ledger insert in one
//! transaction. A few DDL forms are rejected by the database inside a
//! transaction block; such a statement has to be the only statement of its
//! migration and runs on its own.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{MigrateError, MigrateResult};

static CONCURRENT_INDEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^CREATE (UNIQUE )?INDEX CONCURRENTLY\s")
        .expect("valid concurrent index pattern")
});

/// How the statements of one migration are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStrategy {
    /// All statements and the ledger insert commit or roll back together
    Atomic,
    /// One statement runs outside any transaction; the ledger insert follows
    /// as a separate best-effort write
    SingleNonTransactional,
}

/// Whether the database refuses to run `statement` inside a transaction.
///
/// Leading blank and `--` comment lines are ignored. Recognized forms are
/// `CREATE [UNIQUE] INDEX CONCURRENTLY` and `ALTER TYPE ... ADD ...`.
pub fn cannot_run_in_transaction(statement: &str) -> bool {
    let upper = statement.to_uppercase();
    let body = upper
        .trim()
        .lines()
        .skip_while(|line| {
            let line = line.trim();
            line.is_empty() || line.starts_with("--")
        })
        .collect::<Vec<_>>()
        .join("\n");
    let query = body.trim();

    CONCURRENT_INDEX.is_match(query)
        || (query.starts_with("ALTER TYPE ") && query.contains(" ADD "))
}

/// Choose the execution strategy for one migration's statements.
///
/// Fails with [`MigrateError::AmbiguousNonTransactionalMix`] when a
/// non-transactional statement is paired with any other statement; nothing
/// has been executed at that point.
pub fn classify<S: AsRef<str>>(statements: &[S]) -> MigrateResult<TransactionStrategy> {
    let offending = statements
        .iter()
        .map(AsRef::as_ref)
        .find(|stmt| cannot_run_in_transaction(stmt));

    match offending {
        None => Ok(TransactionStrategy::Atomic),
        Some(_) if statements.len() == 1 => Ok(TransactionStrategy::SingleNonTransactional),
        Some(stmt) => Err(MigrateError::AmbiguousNonTransactionalMix {
            statement: stmt.trim().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cannot_run_in_transaction() {
        let cases = [
            ("SELECT 1", false),
            ("-- SELECT 1\n\tINSERT INTO foo", false),
            (
                "\n     \n\ncreate index concurrently idx_name on accounts(foo)\n-- \n\n",
                true,
            ),
            (
                "\n\t-- create index concurrently idx_name on accounts(foo)\n\tselect 1\n\t-- create index concurrently idx_name on accounts(foo)\n\t",
                false,
            ),
            (
                "        -- select 1\n\t-- select 1\n\tcreate index concurrently idx_name on accounts(foo)\n\t",
                true,
            ),
            ("create index idx_name on accounts(foo)", false),
            ("create unique index concurrently idx_name on accounts(foo)", true),
            ("alter type language add value if not exists", true),
            ("alter type language rename to foo", false),
            ("-- +goose Up\nCREATE INDEX CONCURRENTLY idx ON t(c);\n", true),
            ("-- only a comment\n--\n", false),
        ];

        for (statement, expected) in cases {
            assert_eq!(
                cannot_run_in_transaction(statement),
                expected,
                "statement: {:?}",
                statement
            );
        }
    }

    #[test]
    fn test_classify_single_concurrent_index() {
        let strategy = classify(&["CREATE INDEX CONCURRENTLY idx ON t(c)"]).unwrap();
        assert_eq!(strategy, TransactionStrategy::SingleNonTransactional);
    }

    #[test]
    fn test_classify_rejects_mixed_statements() {
        let result = classify(&["CREATE INDEX CONCURRENTLY idx ON t(c)", "SELECT 1"]);
        match result {
            Err(MigrateError::AmbiguousNonTransactionalMix { statement }) => {
                assert_eq!(statement, "CREATE INDEX CONCURRENTLY idx ON t(c)");
            }
            other => panic!("expected ambiguous mix, got {:?}", other),
        }

        // order doesn't matter
        assert!(matches!(
            classify(&["SELECT 1", "ALTER TYPE mood ADD VALUE 'meh'"]),
            Err(MigrateError::AmbiguousNonTransactionalMix { .. })
        ));
    }

    #[test]
    fn test_classify_plain_statements_are_atomic() {
        assert_eq!(classify(&["CREATE INDEX idx ON t(c)"]).unwrap(), TransactionStrategy::Atomic);
        assert_eq!(
            classify(&["CREATE TABLE t (c int);", "INSERT INTO t VALUES (1);"]).unwrap(),
            TransactionStrategy::Atomic
        );
        assert_eq!(classify::<String>(&[]).unwrap(), TransactionStrategy::Atomic);
    }
}
