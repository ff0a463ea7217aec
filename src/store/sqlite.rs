//! SQLite Store
//!
//! One `rusqlite::Connection` behind a mutex. Every call runs on the
//! blocking pool so a slow statement never stalls a connection task.
//! Timestamps are stored as unix milliseconds.

use crate::store::error::{StoreError, StoreResult};
use crate::store::types::{
    from_millis, Account, AccountId, Category, Comment, DirectMessage, Identity, NewAccount,
    NewComment, NewDirectMessage, NewPost, OnlineUser, Post, SessionRecord,
};
use crate::store::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        user_ID INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        username TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        age INTEGER NOT NULL,
        gender TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sessions (
        session_ID INTEGER PRIMARY KEY AUTOINCREMENT,
        token TEXT NOT NULL UNIQUE,
        user_ID INTEGER NOT NULL UNIQUE REFERENCES users(user_ID) ON DELETE CASCADE,
        created_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);

    CREATE TABLE IF NOT EXISTS categories (
        category_ID INTEGER PRIMARY KEY AUTOINCREMENT,
        category TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS posts (
        post_ID INTEGER PRIMARY KEY AUTOINCREMENT,
        user_ID INTEGER NOT NULL REFERENCES users(user_ID),
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS post_categories (
        post_ID INTEGER NOT NULL REFERENCES posts(post_ID) ON DELETE CASCADE,
        category_ID INTEGER NOT NULL REFERENCES categories(category_ID),
        PRIMARY KEY (post_ID, category_ID)
    );

    CREATE TABLE IF NOT EXISTS comments (
        comment_ID INTEGER PRIMARY KEY AUTOINCREMENT,
        post_ID INTEGER NOT NULL REFERENCES posts(post_ID) ON DELETE CASCADE,
        user_ID INTEGER NOT NULL REFERENCES users(user_ID),
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS private_messages (
        message_ID INTEGER PRIMARY KEY AUTOINCREMENT,
        sender TEXT NOT NULL,
        receiver TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
";

/// SQLite-backed [`Store`]
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|e| {
                StoreError::Lock(format!("Failed to acquire connection lock: {}", e))
            })?;
            f(&mut guard)
        })
        .await?
    }
}

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        session_id: row.get(0)?,
        account_id: row.get(1)?,
        token: row.get(2)?,
        created_at: from_millis(row.get(3)?),
        expires_at: from_millis(row.get(4)?),
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn find_account(&self, identifier: &str) -> StoreResult<Option<Account>> {
        let identifier = identifier.to_lowercase();
        self.with_conn(move |conn| {
            let account = conn
                .query_row(
                    "SELECT user_ID, username, email, password FROM users
                     WHERE LOWER(email) = ?1 OR LOWER(username) = ?1
                     LIMIT 1",
                    params![identifier],
                    |row| {
                        Ok(Account {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            email: row.get(2)?,
                            password_hash: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(account)
        })
        .await
    }

    async fn account_exists(&self, email: &str, username: &str) -> StoreResult<bool> {
        let email = email.to_lowercase();
        let username = username.to_lowercase();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE LOWER(email) = ?1 OR LOWER(username) = ?2",
                params![email, username],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    async fn insert_account(&self, account: NewAccount) -> StoreResult<Account> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO users (email, first_name, last_name, username, password, age, gender, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    account.email,
                    account.first_name,
                    account.last_name,
                    account.username,
                    account.password_hash,
                    account.age,
                    account.gender,
                    account.created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| match e.sqlite_error_code() {
                Some(rusqlite::ErrorCode::ConstraintViolation) => StoreError::AccountExists,
                _ => StoreError::Database(e),
            })?;

            Ok(Account {
                id: conn.last_insert_rowid(),
                username: account.username,
                email: account.email,
                password_hash: account.password_hash,
            })
        })
        .await
    }

    async fn list_usernames(&self) -> StoreResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT username FROM users ORDER BY user_ID")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(names)
        })
        .await
    }

    async fn insert_post(&self, post: NewPost) -> StoreResult<i64> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO posts (user_ID, title, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    post.author,
                    post.title,
                    post.content,
                    post.created_at.timestamp_millis()
                ],
            )?;
            let post_id = tx.last_insert_rowid();

            for name in &post.categories {
                let category_id: Option<i64> = tx
                    .query_row(
                        "SELECT category_ID FROM categories WHERE LOWER(category) = LOWER(?1)",
                        params![name],
                        |row| row.get(0),
                    )
                    .optional()?;
                let category_id =
                    category_id.ok_or_else(|| StoreError::UnknownCategory(name.clone()))?;

                tx.execute(
                    "INSERT OR IGNORE INTO post_categories (post_ID, category_ID) VALUES (?1, ?2)",
                    params![post_id, category_id],
                )?;
            }

            // Dropping an uncommitted transaction rolls it back, so any early
            // return above leaves no post row behind.
            tx.commit()?;
            Ok(post_id)
        })
        .await
    }

    async fn list_posts(&self) -> StoreResult<Vec<Post>> {
        self.with_conn(|conn| {
            let mut tags: HashMap<i64, Vec<String>> = HashMap::new();
            {
                let mut stmt = conn.prepare_cached(
                    "SELECT pc.post_ID, c.category
                     FROM post_categories AS pc
                     INNER JOIN categories AS c ON pc.category_ID = c.category_ID
                     ORDER BY pc.post_ID, c.category",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })?;
                for row in rows {
                    let (post_id, category) = row?;
                    tags.entry(post_id).or_default().push(category);
                }
            }

            let mut stmt = conn.prepare_cached(
                "SELECT p.post_ID, u.username, p.title, p.content, p.created_at
                 FROM posts AS p
                 INNER JOIN users AS u ON p.user_ID = u.user_ID
                 ORDER BY p.post_ID",
            )?;
            let posts = stmt
                .query_map([], |row| {
                    let post_id: i64 = row.get(0)?;
                    Ok(Post {
                        post_id,
                        username: row.get(1)?,
                        title: row.get(2)?,
                        content: row.get(3)?,
                        categories: Vec::new(),
                        post_category: String::new(),
                        created_at: from_millis(row.get(4)?),
                    })
                })?
                .map(|row| {
                    row.map(|mut post| {
                        post.categories = tags.remove(&post.post_id).unwrap_or_default();
                        post.post_category = post.categories.join(" ");
                        post
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(posts)
        })
        .await
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT category_ID, category FROM categories ORDER BY category_ID",
            )?;
            let categories = stmt
                .query_map([], |row| {
                    Ok(Category {
                        category_id: row.get(0)?,
                        category: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(categories)
        })
        .await
    }

    async fn ensure_categories(&self, names: &[String]) -> StoreResult<()> {
        let names = names.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare_cached("INSERT OR IGNORE INTO categories (category) VALUES (?1)")?;
                for name in &names {
                    stmt.execute(params![name])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<i64> {
        self.with_conn(move |conn| {
            let exists = conn
                .query_row(
                    "SELECT 1 FROM posts WHERE post_ID = ?1",
                    params![comment.post_id],
                    |_| Ok(()),
                )
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::PostNotFound(comment.post_id));
            }

            conn.execute(
                "INSERT INTO comments (post_ID, user_ID, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    comment.post_id,
                    comment.author,
                    comment.content,
                    comment.created_at.timestamp_millis()
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn list_comments(&self) -> StoreResult<Vec<Comment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT com.comment_ID, u.username, com.content, com.post_ID
                 FROM comments AS com
                 INNER JOIN users AS u ON com.user_ID = u.user_ID
                 ORDER BY com.comment_ID",
            )?;
            let comments = stmt
                .query_map([], |row| {
                    Ok(Comment {
                        comment_id: row.get(0)?,
                        username: row.get(1)?,
                        content: row.get(2)?,
                        post_id: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(comments)
        })
        .await
    }

    async fn insert_message(&self, message: NewDirectMessage) -> StoreResult<i64> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO private_messages (sender, receiver, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    message.sender,
                    message.receiver,
                    message.content,
                    message.created_at.timestamp_millis()
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn list_messages(&self) -> StoreResult<Vec<DirectMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT message_ID, sender, receiver, content, created_at
                 FROM private_messages
                 ORDER BY created_at ASC, message_ID ASC",
            )?;
            let messages = stmt
                .query_map([], |row| {
                    Ok(DirectMessage {
                        id: row.get(0)?,
                        sender: row.get(1)?,
                        receiver: row.get(2)?,
                        content: row.get(3)?,
                        created_at: from_millis(row.get(4)?),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(messages)
        })
        .await
    }

    async fn list_online_users(&self, now: DateTime<Utc>) -> StoreResult<Vec<OnlineUser>> {
        let now = now.timestamp_millis();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT u.user_ID, u.username
                 FROM users AS u
                 INNER JOIN sessions AS s ON u.user_ID = s.user_ID
                 WHERE s.expires_at > ?1
                 ORDER BY u.username",
            )?;
            let users = stmt
                .query_map(params![now], |row| {
                    Ok(OnlineUser {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
        .await
    }

    async fn active_session(
        &self,
        account: AccountId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<SessionRecord>> {
        let now = now.timestamp_millis();
        self.with_conn(move |conn| {
            let session = conn
                .query_row(
                    "SELECT session_ID, user_ID, token, created_at, expires_at
                     FROM sessions WHERE user_ID = ?1 AND expires_at > ?2",
                    params![account, now],
                    session_from_row,
                )
                .optional()?;
            Ok(session)
        })
        .await
    }

    async fn session_by_token(
        &self,
        token: &str,
    ) -> StoreResult<Option<(SessionRecord, Identity)>> {
        let token = token.to_string();
        self.with_conn(move |conn| {
            let found = conn
                .query_row(
                    "SELECT s.session_ID, s.user_ID, s.token, s.created_at, s.expires_at, u.username
                     FROM sessions AS s
                     INNER JOIN users AS u ON s.user_ID = u.user_ID
                     WHERE s.token = ?1",
                    params![token],
                    |row| {
                        let session = session_from_row(row)?;
                        let identity = Identity {
                            account_id: session.account_id,
                            username: row.get(5)?,
                        };
                        Ok((session, identity))
                    },
                )
                .optional()?;
            Ok(found)
        })
        .await
    }

    async fn insert_session(
        &self,
        account: AccountId,
        token: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<SessionRecord> {
        let token = token.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sessions (token, user_ID, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_ID) DO UPDATE SET
                     token = excluded.token,
                     created_at = excluded.created_at,
                     expires_at = excluded.expires_at",
                params![
                    token,
                    account,
                    created_at.timestamp_millis(),
                    expires_at.timestamp_millis()
                ],
            )?;

            let session = conn.query_row(
                "SELECT session_ID, user_ID, token, created_at, expires_at
                 FROM sessions WHERE user_ID = ?1",
                params![account],
                session_from_row,
            )?;
            Ok(session)
        })
        .await
    }

    async fn refresh_session(
        &self,
        session_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let token = token.to_string();
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE sessions SET token = ?1, expires_at = ?2 WHERE session_ID = ?3",
                params![token, expires_at.timestamp_millis(), session_id],
            )?;
            Ok(updated > 0)
        })
        .await
    }

    async fn delete_sessions(&self, account: AccountId) -> StoreResult<usize> {
        self.with_conn(move |conn| {
            let deleted =
                conn.execute("DELETE FROM sessions WHERE user_ID = ?1", params![account])?;
            Ok(deleted)
        })
        .await
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let now = now.timestamp_millis();
        self.with_conn(move |conn| {
            let deleted =
                conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
            Ok(deleted)
        })
        .await
    }
}
