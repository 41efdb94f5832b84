//! Ordering of collected migrations for one run direction

use super::definitions::{Migration, MigrationDirection};

/// Sort `migrations` for `direction` and link each one to its neighbours.
///
/// `Up` sorts ascending, `Down` descending. After sorting, `previous` and
/// `next` point at the adjacent versions in that order; the ends keep
/// `None`.
pub fn order(mut migrations: Vec<Migration>, direction: MigrationDirection) -> Vec<Migration> {
    match direction {
        MigrationDirection::Up => migrations.sort_by_key(|m| m.version),
        MigrationDirection::Down => migrations.sort_by_key(|m| std::cmp::Reverse(m.version)),
    }

    for i in 0..migrations.len() {
        migrations[i].previous = None;
        migrations[i].next = None;
        if i > 0 {
            let version = migrations[i].version;
            migrations[i].previous = Some(migrations[i - 1].version);
            migrations[i - 1].next = Some(version);
        }
    }

    migrations
}
