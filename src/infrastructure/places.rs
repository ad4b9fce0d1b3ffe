//! Local SQLite places database.
//!
//! Stores the bookmark tree and browsing history. Bookmarks are kept as
//! an adjacency list with dense per-folder positions; deleting a folder
//! cascades to its whole subtree.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::application::{BookmarkStorage, HistoryStorage};
use crate::domain::{
    AppError, BookmarkNode, BookmarkNodeType, PageObservation, Result, VisitInfo, VisitType,
    MENU_ROOT_GUID, MOBILE_ROOT_GUID, ROOT_GUID, TOOLBAR_ROOT_GUID, UNFILED_ROOT_GUID,
};

/// Built-in folders, in storage order under the root.
const BUILT_IN_FOLDERS: [(&str, &str); 4] = [
    (MENU_ROOT_GUID, "menu"),
    (TOOLBAR_ROOT_GUID, "toolbar"),
    (UNFILED_ROOT_GUID, "unfiled"),
    (MOBILE_ROOT_GUID, "mobile"),
];

const NODE_COLUMNS: &str = "guid, parent_guid, node_type, position, title, url";

/// Places repository using SQLite.
pub struct PlacesDb {
    conn: Mutex<Connection>,
}

impl PlacesDb {
    /// Opens or creates the places database.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or schema creation fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create storage directory", e))?;
        }

        let conn = Connection::open(path).map_err(AppError::database)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(AppError::database)?;

        tracing::debug!(path = %path.display(), "Opened places database");
        Self::with_connection(conn)
    }

    /// Opens a throwaway database in memory.
    ///
    /// # Errors
    /// Returns error if schema creation fails.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory().map_err(AppError::database)?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(AppError::database)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema and the built-in folders.
    fn init_schema(&self) -> Result<()> {
        let mut conn = self.conn.lock();
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS bookmarks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guid TEXT UNIQUE NOT NULL,
                parent_guid TEXT REFERENCES bookmarks(guid) ON DELETE CASCADE,
                node_type INTEGER NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                title TEXT,
                url TEXT,
                date_added INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS visits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                visit_time INTEGER NOT NULL,
                visit_type INTEGER NOT NULL
            );

            -- Latest observed metadata per page
            CREATE TABLE IF NOT EXISTS pages (
                url TEXT PRIMARY KEY,
                title TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_bookmarks_parent
                ON bookmarks(parent_guid, position);
            CREATE INDEX IF NOT EXISTS idx_bookmarks_url
                ON bookmarks(url);
            CREATE INDEX IF NOT EXISTS idx_visits_url
                ON visits(url);
            CREATE INDEX IF NOT EXISTS idx_visits_time
                ON visits(visit_time DESC);
            ",
        )
        .map_err(AppError::database)?;

        let now = Utc::now().timestamp_millis();
        let tx = conn.transaction().map_err(AppError::database)?;
        tx.execute(
            "INSERT OR IGNORE INTO bookmarks (guid, parent_guid, node_type, position, title, date_added)
             VALUES (?1, NULL, ?2, 0, '', ?3)",
            params![ROOT_GUID, u8::from(BookmarkNodeType::Folder), now],
        )
        .map_err(AppError::database)?;
        for (position, (guid, title)) in BUILT_IN_FOLDERS.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO bookmarks (guid, parent_guid, node_type, position, title, date_added)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    guid,
                    ROOT_GUID,
                    u8::from(BookmarkNodeType::Folder),
                    position,
                    title,
                    now
                ],
            )
            .map_err(AppError::database)?;
        }
        tx.commit().map_err(AppError::database)?;

        Ok(())
    }

    /// Convert a row to a node without children.
    fn row_to_node(row: &Row) -> rusqlite::Result<BookmarkNode> {
        let node_type = BookmarkNodeType::try_from(row.get::<_, u8>(2)?)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Integer, e.into()))?;
        Ok(BookmarkNode {
            node_type,
            guid: row.get(0)?,
            parent_guid: row.get(1)?,
            position: row.get(3)?,
            title: row.get(4)?,
            url: row.get(5)?,
            children: None,
        })
    }

    fn load_node(conn: &Connection, guid: &str) -> Result<Option<BookmarkNode>> {
        let node = conn
            .query_row(
                &format!("SELECT {NODE_COLUMNS} FROM bookmarks WHERE guid = ?1"),
                [guid],
                Self::row_to_node,
            )
            .optional()
            .map_err(AppError::database)?;

        node.map(|mut node| -> Result<BookmarkNode> {
            if node.is_folder() {
                node.children = Some(Self::load_children(conn, &node.guid)?);
            }
            Ok(node)
        })
        .transpose()
    }

    fn load_children(conn: &Connection, parent: &str) -> Result<Vec<BookmarkNode>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {NODE_COLUMNS} FROM bookmarks WHERE parent_guid = ?1 ORDER BY position, id"
            ))
            .map_err(AppError::database)?;
        let children = stmt
            .query_map([parent], Self::row_to_node)
            .map_err(AppError::database)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(AppError::database)?;

        children
            .into_iter()
            .map(|mut child| -> Result<BookmarkNode> {
                if child.is_folder() {
                    child.children = Some(Self::load_children(conn, &child.guid)?);
                }
                Ok(child)
            })
            .collect()
    }

    fn insert_bookmark(
        &self,
        parent_guid: &str,
        url: &str,
        title: &str,
        position: Option<u32>,
    ) -> Result<String> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(AppError::database)?;

        let parent_type: Option<u8> = tx
            .query_row(
                "SELECT node_type FROM bookmarks WHERE guid = ?1",
                [parent_guid],
                |row| row.get(0),
            )
            .optional()
            .map_err(AppError::database)?;
        if parent_type != Some(u8::from(BookmarkNodeType::Folder)) {
            return Err(AppError::InvalidData {
                message: format!("Parent is not a bookmark folder: {parent_guid}"),
            });
        }

        let count: u32 = tx
            .query_row(
                "SELECT COUNT(*) FROM bookmarks WHERE parent_guid = ?1",
                [parent_guid],
                |row| row.get(0),
            )
            .map_err(AppError::database)?;
        let position = position.map_or(count, |p| p.min(count));

        tx.execute(
            "UPDATE bookmarks SET position = position + 1 WHERE parent_guid = ?1 AND position >= ?2",
            params![parent_guid, position],
        )
        .map_err(AppError::database)?;

        let guid = new_guid();
        tx.execute(
            "INSERT INTO bookmarks (guid, parent_guid, node_type, position, title, url, date_added)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &guid,
                parent_guid,
                u8::from(BookmarkNodeType::Item),
                position,
                title,
                url,
                Utc::now().timestamp_millis()
            ],
        )
        .map_err(AppError::database)?;
        tx.commit().map_err(AppError::database)?;

        Ok(guid)
    }

    fn remove_node(&self, guid: &str) -> Result<bool> {
        if guid == ROOT_GUID || BUILT_IN_FOLDERS.iter().any(|(root, _)| *root == guid) {
            return Err(AppError::ProtectedNode {
                guid: guid.to_string(),
            });
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(AppError::database)?;

        let placement: Option<(Option<String>, u32)> = tx
            .query_row(
                "SELECT parent_guid, position FROM bookmarks WHERE guid = ?1",
                [guid],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(AppError::database)?;
        let Some((parent, position)) = placement else {
            return Ok(false);
        };

        tx.execute("DELETE FROM bookmarks WHERE guid = ?1", [guid])
            .map_err(AppError::database)?;
        tx.execute(
            "UPDATE bookmarks SET position = position - 1 WHERE parent_guid = ?1 AND position > ?2",
            params![parent, position],
        )
        .map_err(AppError::database)?;
        tx.commit().map_err(AppError::database)?;

        Ok(true)
    }

    fn bookmarks_with_url(&self, url: &str) -> Result<Vec<BookmarkNode>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {NODE_COLUMNS} FROM bookmarks WHERE url = ?1 ORDER BY id"
            ))
            .map_err(AppError::database)?;
        let nodes = stmt
            .query_map([url], Self::row_to_node)
            .map_err(AppError::database)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(AppError::database)?;
        Ok(nodes)
    }

    fn visited_urls(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT url FROM visits GROUP BY url ORDER BY MAX(visit_time) DESC, url")
            .map_err(AppError::database)?;
        let urls = stmt
            .query_map([], |row| row.get(0))
            .map_err(AppError::database)?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(AppError::database)?;
        Ok(urls)
    }

    fn detailed_visits(&self, start: i64, exclude_types: &[VisitType]) -> Result<Vec<VisitInfo>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                r"
            SELECT v.url, p.title, v.visit_time, v.visit_type
            FROM visits v
            LEFT JOIN pages p ON p.url = v.url
            WHERE v.visit_time >= ?1
            ORDER BY v.visit_time DESC, v.id DESC
            ",
            )
            .map_err(AppError::database)?;

        let visits = stmt
            .query_map([start], |row| {
                let visit_type = VisitType::try_from(row.get::<_, u8>(3)?).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(3, Type::Integer, e.into())
                })?;
                Ok(VisitInfo {
                    url: row.get(0)?,
                    title: row.get(1)?,
                    visit_time: row.get(2)?,
                    visit_type,
                })
            })
            .map_err(AppError::database)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(AppError::database)?;

        Ok(visits
            .into_iter()
            .filter(|v| !exclude_types.contains(&v.visit_type))
            .collect())
    }

    fn insert_visit(&self, url: &str, visit_type: VisitType) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO visits (url, visit_time, visit_type) VALUES (?1, ?2, ?3)",
                params![url, Utc::now().timestamp_millis(), u8::from(visit_type)],
            )
            .map_err(AppError::database)?;
        Ok(())
    }

    fn upsert_page(&self, url: &str, observation: &PageObservation) -> Result<()> {
        self.conn
            .lock()
            .execute(
                r"
            INSERT INTO pages (url, title) VALUES (?1, ?2)
            ON CONFLICT(url) DO UPDATE SET
                title = COALESCE(excluded.title, title)
            ",
                params![url, &observation.title],
            )
            .map_err(AppError::database)?;
        Ok(())
    }

    /// Run a delete statement and report how many rows went.
    fn delete_where(&self, sql: &str, params: impl rusqlite::Params) -> Result<usize> {
        let removed = self
            .conn
            .lock()
            .execute(sql, params)
            .map_err(AppError::database)?;
        tracing::debug!(removed, "History rows deleted");
        Ok(removed)
    }

    fn has_visits(&self, url: &str) -> Result<bool> {
        self.conn
            .lock()
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM visits WHERE url = ?1)",
                [url],
                |row| row.get(0),
            )
            .map_err(AppError::database)
    }
}

/// New 12-character GUID in the places alphabet.
fn new_guid() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

#[async_trait]
impl BookmarkStorage for PlacesDb {
    async fn get_tree(&self, guid: &str) -> Result<Option<BookmarkNode>> {
        Self::load_node(&self.conn.lock(), guid)
    }

    async fn add_item(
        &self,
        parent_guid: &str,
        url: &str,
        title: &str,
        position: Option<u32>,
    ) -> Result<String> {
        self.insert_bookmark(parent_guid, url, title, position)
    }

    async fn delete_node(&self, guid: &str) -> Result<bool> {
        self.remove_node(guid)
    }

    async fn get_bookmarks_with_url(&self, url: &str) -> Result<Vec<BookmarkNode>> {
        self.bookmarks_with_url(url)
    }
}

#[async_trait]
impl HistoryStorage for PlacesDb {
    async fn get_visited(&self) -> Result<Vec<String>> {
        self.visited_urls()
    }

    async fn get_detailed_visits(
        &self,
        start: i64,
        exclude_types: &[VisitType],
    ) -> Result<Vec<VisitInfo>> {
        self.detailed_visits(start, exclude_types)
    }

    async fn record_visit(&self, url: &str, visit_type: VisitType) -> Result<()> {
        self.insert_visit(url, visit_type)
    }

    async fn record_observation(&self, url: &str, observation: &PageObservation) -> Result<()> {
        self.upsert_page(url, observation)
    }

    async fn delete_visit(&self, url: &str, timestamp: i64) -> Result<()> {
        self.delete_where(
            "DELETE FROM visits WHERE url = ?1 AND visit_time = ?2",
            params![url, timestamp],
        )?;
        Ok(())
    }

    async fn delete_visits_for(&self, url: &str) -> Result<()> {
        self.delete_where("DELETE FROM visits WHERE url = ?1", [url])?;
        self.delete_where("DELETE FROM pages WHERE url = ?1", [url])?;
        Ok(())
    }

    async fn delete_everything(&self) -> Result<()> {
        self.delete_where("DELETE FROM visits", [])?;
        self.delete_where("DELETE FROM pages", [])?;
        Ok(())
    }

    async fn delete_visits_since(&self, since: i64) -> Result<()> {
        self.delete_where("DELETE FROM visits WHERE visit_time >= ?1", [since])?;
        Ok(())
    }

    async fn delete_visits_between(&self, start: i64, end: i64) -> Result<()> {
        self.delete_where(
            "DELETE FROM visits WHERE visit_time >= ?1 AND visit_time <= ?2",
            params![start, end],
        )?;
        Ok(())
    }

    async fn get_visited_for(&self, urls: &[String]) -> Result<Vec<bool>> {
        urls.iter().map(|url| self.has_visits(url)).collect()
    }
}
