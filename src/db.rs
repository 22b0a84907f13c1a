use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::models::{Holding, NewHolding, ProfileUpdate, User};

#[derive(Clone)]
pub struct DatabasePool(pub Arc<Mutex<rusqlite::Connection>>);

const USER_COLUMNS: &str =
    "id, username, email, local_currency, deleted_at, created_at, updated_at";

const HOLDING_COLUMNS: &str = "user_stock_id, user_id, stock_code, quantity, purchase_price, \
     purchase_date, created_at, updated_at";

impl DatabasePool {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open(path)?)
    }

    /// A private database that lives as long as the pool.
    pub fn in_memory() -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, rusqlite::Error> {
        // Initialize schema for users
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                local_currency TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            )",
            [],
        )?;

        // Initialize schema for holdings
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users_stocks (
                user_stock_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                stock_code TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                purchase_price TEXT NOT NULL,
                purchase_date TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )",
            [],
        )?;

        Ok(Self(Arc::new(Mutex::new(conn))))
    }

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        local_currency: &str,
    ) -> Result<User, rusqlite::Error> {
        let conn = self.0.lock().await;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO users (username, email, local_currency, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![username, email, local_currency, now],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
            [id],
            user_from_row,
        )
    }

    /// Fetch a live (not soft-deleted) user.
    pub async fn find_user(&self, id: i64) -> Result<Option<User>, rusqlite::Error> {
        let conn = self.0.lock().await;
        select_live_user(&conn, id)
    }

    /// Whether any user, deleted ones included, already holds the username or
    /// email. `exclude` skips the user making the change.
    pub async fn identity_taken(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        exclude: Option<i64>,
    ) -> Result<bool, rusqlite::Error> {
        let conn = self.0.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users
             WHERE (username = ?1 OR email = ?2) AND (?3 IS NULL OR id != ?3)",
            params![username, email, exclude],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub async fn update_user(
        &self,
        id: i64,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, rusqlite::Error> {
        let conn = self.0.lock().await;
        let changed = conn.execute(
            "UPDATE users SET
                 username = COALESCE(?1, username),
                 email = COALESCE(?2, email),
                 local_currency = COALESCE(?3, local_currency),
                 updated_at = ?4
             WHERE id = ?5 AND deleted_at IS NULL",
            params![
                update.username,
                update.email,
                update.local_currency,
                Utc::now(),
                id
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        select_live_user(&conn, id)
    }

    /// Marks the user deleted. Returns false when no live user matched.
    pub async fn soft_delete_user(&self, id: i64) -> Result<bool, rusqlite::Error> {
        let conn = self.0.lock().await;
        let changed = conn.execute(
            "UPDATE users SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            params![Utc::now(), id],
        )?;
        Ok(changed > 0)
    }

    /// All holdings of a user, newest first.
    pub async fn list_holdings(&self, user_id: i64) -> Result<Vec<Holding>, rusqlite::Error> {
        let conn = self.0.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users_stocks WHERE user_id = ?
             ORDER BY created_at DESC, user_stock_id DESC",
            HOLDING_COLUMNS
        ))?;
        let holdings = stmt
            .query_map([user_id], holding_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(holdings)
    }

    /// Record a purchase. A missing purchase date means today.
    pub async fn create_holding(
        &self,
        user_id: i64,
        holding: &NewHolding,
    ) -> Result<Holding, rusqlite::Error> {
        let conn = self.0.lock().await;
        let now = Utc::now();
        let purchase_date = holding.purchase_date.unwrap_or_else(|| now.date_naive());
        conn.execute(
            "INSERT INTO users_stocks
                 (user_id, stock_code, quantity, purchase_price, purchase_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                user_id,
                holding.stock_code,
                holding.quantity,
                holding.purchase_price.to_string(),
                purchase_date,
                now
            ],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!(
                "SELECT {} FROM users_stocks WHERE user_stock_id = ?",
                HOLDING_COLUMNS
            ),
            [id],
            holding_from_row,
        )
    }

    /// Deletes a holding only if it belongs to `user_id`.
    pub async fn delete_holding(&self, id: i64, user_id: i64) -> Result<bool, rusqlite::Error> {
        let conn = self.0.lock().await;
        let changed = conn.execute(
            "DELETE FROM users_stocks WHERE user_stock_id = ? AND user_id = ?",
            [id, user_id],
        )?;
        Ok(changed > 0)
    }
}

fn select_live_user(conn: &Connection, id: i64) -> Result<Option<User>, rusqlite::Error> {
    conn.query_row(
        &format!(
            "SELECT {} FROM users WHERE id = ? AND deleted_at IS NULL",
            USER_COLUMNS
        ),
        [id],
        user_from_row,
    )
    .optional()
}

fn user_from_row(row: &Row<'_>) -> Result<User, rusqlite::Error> {
    let deleted_at: Option<String> = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        local_currency: row.get(3)?,
        deleted: deleted_at.is_some(),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn holding_from_row(row: &Row<'_>) -> Result<Holding, rusqlite::Error> {
    let price: String = row.get(4)?;
    let purchase_price = Decimal::from_str(&price)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    Ok(Holding {
        id: row.get(0)?,
        user_id: row.get(1)?,
        stock_code: row.get(2)?,
        quantity: row.get(3)?,
        purchase_price,
        purchase_date: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn purchase(code: &str, quantity: i64, price: Decimal) -> NewHolding {
        NewHolding {
            stock_code: code.to_string(),
            quantity,
            purchase_price: price,
            purchase_date: NaiveDate::from_ymd_opt(2024, 3, 1),
        }
    }

    #[tokio::test]
    async fn holdings_round_trip_exact_prices() {
        let pool = DatabasePool::in_memory().unwrap();
        let user = pool.create_user("jane", "jane@example.com", "INR").await.unwrap();

        let created = pool
            .create_holding(user.id, &purchase("AAPL", 10, dec!(150.25)))
            .await
            .unwrap();
        assert_eq!(created.purchase_price, dec!(150.25));
        assert_eq!(created.purchase_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        let listed = pool.list_holdings(user.id).await.unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn holdings_are_listed_newest_first() {
        let pool = DatabasePool::in_memory().unwrap();
        let user = pool.create_user("jane", "jane@example.com", "INR").await.unwrap();

        let first = pool
            .create_holding(user.id, &purchase("AAPL", 1, dec!(1)))
            .await
            .unwrap();
        let second = pool
            .create_holding(user.id, &purchase("MSFT", 1, dec!(1)))
            .await
            .unwrap();

        let ids: Vec<i64> = pool
            .list_holdings(user.id)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn delete_requires_ownership() {
        let pool = DatabasePool::in_memory().unwrap();
        let owner = pool.create_user("owner", "owner@example.com", "USD").await.unwrap();
        let other = pool.create_user("other", "other@example.com", "USD").await.unwrap();
        let holding = pool
            .create_holding(owner.id, &purchase("TSLA", 3, dec!(200)))
            .await
            .unwrap();

        assert!(!pool.delete_holding(holding.id, other.id).await.unwrap());
        assert!(pool.delete_holding(holding.id, owner.id).await.unwrap());
        assert!(pool.list_holdings(owner.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn soft_deleted_users_disappear_but_keep_their_identity() {
        let pool = DatabasePool::in_memory().unwrap();
        let user = pool.create_user("jane", "jane@example.com", "USD").await.unwrap();
        assert!(!user.deleted);

        assert!(pool.soft_delete_user(user.id).await.unwrap());
        assert!(!pool.soft_delete_user(user.id).await.unwrap());
        assert_eq!(pool.find_user(user.id).await.unwrap(), None);
        assert!(pool
            .identity_taken(Some("jane"), None, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn identity_check_can_exclude_the_caller() {
        let pool = DatabasePool::in_memory().unwrap();
        let user = pool.create_user("jane", "jane@example.com", "USD").await.unwrap();

        assert!(!pool
            .identity_taken(Some("jane"), Some("jane@example.com"), Some(user.id))
            .await
            .unwrap());
        assert!(pool
            .identity_taken(None, Some("jane@example.com"), None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn update_only_touches_given_fields() {
        let pool = DatabasePool::in_memory().unwrap();
        let user = pool.create_user("jane", "jane@example.com", "USD").await.unwrap();

        let update = ProfileUpdate {
            local_currency: Some("EUR".to_string()),
            ..Default::default()
        };
        let updated = pool.update_user(user.id, &update).await.unwrap().unwrap();
        assert_eq!(updated.local_currency, "EUR");
        assert_eq!(updated.username, "jane");
        assert_eq!(pool.update_user(999, &update).await.unwrap(), None);
    }
}
