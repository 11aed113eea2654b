//! Subscription persistence.
//!
//! The store keeps `(user_id, location)` pairs plus an admin roster in
//! SQLite. Locations are normalized to lowercase on the way in, which is
//! what makes the fan-out's case-insensitive matching line up with what
//! users typed. Calls are blocking; the poll loop treats the store as a
//! synchronous collaborator.

use crate::error::Result;
use log::debug;
use rusqlite::{params, Connection};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub trait SubscriptionStore: Send + Sync {
    /// Adds a subscription; returns false when it already existed.
    fn add_subscription(&self, user_id: i64, location: &str) -> Result<bool>;
    /// Removes a subscription; returns false when it did not exist.
    fn remove_subscription(&self, user_id: i64, location: &str) -> Result<bool>;
    fn user_subscriptions(&self, user_id: i64) -> Result<HashSet<String>>;
    /// Full mapping of every subscriber to their location filters.
    fn all_subscriptions(&self) -> Result<HashMap<i64, HashSet<String>>>;
    /// Distinct user ids with at least one subscription.
    fn all_users(&self) -> Result<Vec<i64>>;
    fn add_admin(&self, user_id: i64) -> Result<()>;
    fn is_admin(&self, user_id: i64) -> Result<bool>;
}

pub struct SqliteSubscriptionStore {
    conn: Mutex<Connection>,
}

impl SqliteSubscriptionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| crate::error::BotError::Store(e.to_string()))?;
            }
        }
        let store = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        store.init_tables()?;
        debug!("Subscription store ready at {}", path.display());
        Ok(store)
    }

    /// Private throwaway database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> Result<()> {
        self.lock().execute_batch(
            "CREATE TABLE IF NOT EXISTS subscriptions (
                user_id INTEGER,
                location TEXT,
                PRIMARY KEY (user_id, location)
            );
            CREATE TABLE IF NOT EXISTS admins (
                user_id INTEGER PRIMARY KEY
            );",
        )?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SubscriptionStore for SqliteSubscriptionStore {
    fn add_subscription(&self, user_id: i64, location: &str) -> Result<bool> {
        let inserted = self.lock().execute(
            "INSERT OR IGNORE INTO subscriptions (user_id, location) VALUES (?1, ?2)",
            params![user_id, location.to_lowercase()],
        )?;
        Ok(inserted > 0)
    }

    fn remove_subscription(&self, user_id: i64, location: &str) -> Result<bool> {
        let deleted = self.lock().execute(
            "DELETE FROM subscriptions WHERE user_id = ?1 AND location = ?2",
            params![user_id, location.to_lowercase()],
        )?;
        Ok(deleted > 0)
    }

    fn user_subscriptions(&self, user_id: i64) -> Result<HashSet<String>> {
        let conn = self.lock();
        let mut statement =
            conn.prepare("SELECT location FROM subscriptions WHERE user_id = ?1")?;
        let rows = statement.query_map(params![user_id], |row| row.get::<_, String>(0))?;
        let mut locations = HashSet::new();
        for row in rows {
            locations.insert(row?);
        }
        Ok(locations)
    }

    fn all_subscriptions(&self) -> Result<HashMap<i64, HashSet<String>>> {
        let conn = self.lock();
        let mut statement = conn.prepare("SELECT user_id, location FROM subscriptions")?;
        let rows = statement.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut subscriptions: HashMap<i64, HashSet<String>> = HashMap::new();
        for row in rows {
            let (user_id, location) = row?;
            subscriptions.entry(user_id).or_default().insert(location);
        }
        Ok(subscriptions)
    }

    fn all_users(&self) -> Result<Vec<i64>> {
        let conn = self.lock();
        let mut statement =
            conn.prepare("SELECT DISTINCT user_id FROM subscriptions ORDER BY user_id")?;
        let rows = statement.query_map([], |row| row.get::<_, i64>(0))?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    fn add_admin(&self, user_id: i64) -> Result<()> {
        self.lock().execute(
            "INSERT OR IGNORE INTO admins (user_id) VALUES (?1)",
            params![user_id],
        )?;
        Ok(())
    }

    fn is_admin(&self, user_id: i64) -> Result<bool> {
        let conn = self.lock();
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM admins WHERE user_id = ?1)",
            params![user_id],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_is_idempotent_and_lowercases() {
        let store = SqliteSubscriptionStore::open_in_memory().unwrap();
        assert!(store.add_subscription(1, "Haifa").unwrap());
        assert!(!store.add_subscription(1, "haifa").unwrap());
        let locations = store.user_subscriptions(1).unwrap();
        assert_eq!(locations, HashSet::from(["haifa".to_string()]));
    }

    #[test]
    fn remove_reports_whether_anything_was_deleted() {
        let store = SqliteSubscriptionStore::open_in_memory().unwrap();
        store.add_subscription(1, "haifa").unwrap();
        assert!(store.remove_subscription(1, "HAIFA").unwrap());
        assert!(!store.remove_subscription(1, "haifa").unwrap());
        assert!(store.user_subscriptions(1).unwrap().is_empty());
    }

    #[test]
    fn all_subscriptions_groups_by_user() {
        let store = SqliteSubscriptionStore::open_in_memory().unwrap();
        store.add_subscription(1, "haifa").unwrap();
        store.add_subscription(1, "all").unwrap();
        store.add_subscription(2, "tel aviv").unwrap();
        let all = store.all_subscriptions().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(
            all[&1],
            HashSet::from(["haifa".to_string(), "all".to_string()])
        );
        assert_eq!(all[&2], HashSet::from(["tel aviv".to_string()]));
        assert_eq!(store.all_users().unwrap(), vec![1, 2]);
    }

    #[test]
    fn admin_roster() {
        let store = SqliteSubscriptionStore::open_in_memory().unwrap();
        assert!(!store.is_admin(7).unwrap());
        store.add_admin(7).unwrap();
        store.add_admin(7).unwrap();
        assert!(store.is_admin(7).unwrap());
        assert!(!store.is_admin(8).unwrap());
    }
}
