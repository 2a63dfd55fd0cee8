use crate::sqlite_column;
use crate::sqlite_persistence::{
    open_versioned_db, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};
use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};
use std::{
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::{debug, warn};

use super::song_models::{NewSong, PageRequest, Song, SongFilter, SongStatus};
use super::song_store::SongStore;

/// V 0
const SONG_TABLE_V_0: Table = Table {
    name: "song",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Text,
            is_primary_key = true,
            non_null = true,
            is_unique = true
        ),
        sqlite_column!("artist", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("lyrics", &SqlType::Text),
        sqlite_column!("summary", &SqlType::Text),
        sqlite_column!(
            "countries",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'[]'")
        ),
        sqlite_column!(
            "status",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'pending'")
        ),
        sqlite_column!("message", &SqlType::Text),
        sqlite_column!("task_id", &SqlType::Text),
        // Owner id in the user db, no cross-db foreign key.
        sqlite_column!("created_by", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "modified",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[&["created_by", "artist", "title"]],
    indices: &[
        ("idx_song_created_by", "created_by"),
        ("idx_song_status", "status"),
    ],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[SONG_TABLE_V_0],
    migration: None,
}];

const SONG_COLUMNS: &str =
    "id, artist, title, lyrics, summary, countries, status, message, task_id, created_by, created, modified";

fn song_from_row(row: &Row) -> rusqlite::Result<Song> {
    let id: String = row.get(0)?;
    let raw_countries: String = row.get(5)?;
    let countries = serde_json::from_str(&raw_countries).unwrap_or_else(|err| {
        warn!("Song {} has malformed countries {:?}: {}", id, raw_countries, err);
        vec![]
    });
    Ok(Song {
        id,
        artist: row.get(1)?,
        title: row.get(2)?,
        lyrics: row.get(3)?,
        summary: row.get(4)?,
        countries,
        status: SongStatus::parse(&row.get::<_, String>(6)?),
        message: row.get(7)?,
        task_id: row.get(8)?,
        created_by: row.get(9)?,
        created: row.get::<_, Option<i64>>(10)?.unwrap_or_default(),
        modified: row.get::<_, Option<i64>>(11)?.unwrap_or_default(),
    })
}

fn filter_to_where_clause(filter: &SongFilter) -> (String, Vec<Value>) {
    let mut conditions: Vec<&str> = vec![];
    let mut values: Vec<Value> = vec![];

    if let Some(owner) = filter.owner {
        conditions.push("created_by = ?");
        values.push(Value::Integer(owner as i64));
    }
    if let Some(artist) = filter.artist.as_ref().filter(|s| !s.is_empty()) {
        conditions.push("lower(artist) = lower(?)");
        values.push(Value::Text(artist.clone()));
    }
    if let Some(title) = filter.title.as_ref().filter(|s| !s.is_empty()) {
        conditions.push("lower(title) = lower(?)");
        values.push(Value::Text(title.clone()));
    }
    if let Some(status) = filter.status {
        conditions.push("status = ?");
        values.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(search) = filter.search.as_ref().filter(|s| !s.trim().is_empty()) {
        conditions.push("(artist LIKE ? OR title LIKE ?)");
        let pattern = format!("%{}%", search.trim());
        values.push(Value::Text(pattern.clone()));
        values.push(Value::Text(pattern));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", conditions.join(" AND ")), values)
    }
}

#[derive(Clone)]
pub struct SqliteSongStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSongStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned_db(db_path, VERSIONED_SCHEMAS)?;
        Ok(SqliteSongStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn execute_on_song(&self, song_id: &str, sql: &str, values: Vec<Value>) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn
            .execute(sql, params_from_iter(values))
            .with_context(|| format!("Failed to update song {}", song_id))?;
        Ok(updated > 0)
    }
}

impl SongStore for SqliteSongStore {
    fn create_song(&self, new_song: &NewSong) -> Result<Song> {
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (id, artist, title, created_by) VALUES (?1, ?2, ?3, ?4)",
                SONG_TABLE_V_0.name
            ),
            params![id, new_song.artist, new_song.title, new_song.created_by],
        )
        .with_context(|| {
            format!(
                "Failed to create song {} - {}",
                new_song.artist, new_song.title
            )
        })?;
        conn.query_row(
            &format!(
                "SELECT {} FROM {} WHERE id = ?1",
                SONG_COLUMNS, SONG_TABLE_V_0.name
            ),
            params![id],
            song_from_row,
        )
        .context("Failed to read back created song")
    }

    fn get_song(&self, song_id: &str) -> Result<Option<Song>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE id = ?1",
                    SONG_COLUMNS, SONG_TABLE_V_0.name
                ),
                params![song_id],
                song_from_row,
            )
            .optional()?)
    }

    fn find_song(&self, owner: usize, artist: &str, title: &str) -> Result<Option<Song>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE created_by = ?1 AND lower(artist) = lower(?2) AND lower(title) = lower(?3) LIMIT 1",
                    SONG_COLUMNS, SONG_TABLE_V_0.name
                ),
                params![owner, artist, title],
                song_from_row,
            )
            .optional()?)
    }

    fn list_songs(&self, filter: &SongFilter, page: PageRequest) -> Result<(usize, Vec<Song>)> {
        let (where_clause, values) = filter_to_where_clause(filter);
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} {}",
                SONG_TABLE_V_0.name, where_clause
            ),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let mut page_values = values;
        page_values.push(Value::Integer(page.limit as i64));
        page_values.push(Value::Integer(page.offset as i64));
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} {} ORDER BY created DESC, rowid DESC LIMIT ? OFFSET ?",
            SONG_COLUMNS, SONG_TABLE_V_0.name, where_clause
        ))?;
        let songs = stmt
            .query_map(params_from_iter(page_values), song_from_row)?
            .collect::<Result<Vec<Song>, _>>()?;
        debug!(
            "list_songs() matched {} songs, returning {}",
            count,
            songs.len()
        );
        Ok((count as usize, songs))
    }

    fn update_status(
        &self,
        song_id: &str,
        status: SongStatus,
        message: Option<&str>,
    ) -> Result<bool> {
        self.execute_on_song(
            song_id,
            &format!(
                "UPDATE {} SET status = ?1, message = ?2, modified = {} WHERE id = ?3",
                SONG_TABLE_V_0.name, DEFAULT_TIMESTAMP
            ),
            vec![
                Value::Text(status.as_str().to_string()),
                message.map_or(Value::Null, |m| Value::Text(m.to_string())),
                Value::Text(song_id.to_string()),
            ],
        )
    }

    fn set_task_id(&self, song_id: &str, task_id: &str) -> Result<bool> {
        self.execute_on_song(
            song_id,
            &format!(
                "UPDATE {} SET task_id = ?1, modified = {} WHERE id = ?2",
                SONG_TABLE_V_0.name, DEFAULT_TIMESTAMP
            ),
            vec![
                Value::Text(task_id.to_string()),
                Value::Text(song_id.to_string()),
            ],
        )
    }

    fn set_lyrics(&self, song_id: &str, lyrics: &str) -> Result<bool> {
        self.execute_on_song(
            song_id,
            &format!(
                "UPDATE {} SET lyrics = ?1, modified = {} WHERE id = ?2",
                SONG_TABLE_V_0.name, DEFAULT_TIMESTAMP
            ),
            vec![
                Value::Text(lyrics.to_string()),
                Value::Text(song_id.to_string()),
            ],
        )
    }

    fn complete_analysis(
        &self,
        song_id: &str,
        summary: &str,
        countries: &[String],
    ) -> Result<bool> {
        let countries_json = serde_json::to_string(countries)?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let updated = tx.execute(
            &format!(
                "UPDATE {} SET summary = ?1, countries = ?2, modified = {} WHERE id = ?3",
                SONG_TABLE_V_0.name, DEFAULT_TIMESTAMP
            ),
            params![summary, countries_json, song_id],
        )?;
        if updated == 0 {
            return Ok(false);
        }
        tx.execute(
            &format!(
                "UPDATE {} SET status = ?1, message = NULL WHERE id = ?2",
                SONG_TABLE_V_0.name
            ),
            params![SongStatus::Completed.as_str(), song_id],
        )?;
        tx.commit()
            .with_context(|| format!("Failed to commit analysis of song {}", song_id))?;
        Ok(true)
    }

    fn reset_for_reanalysis(&self, song_id: &str) -> Result<bool> {
        self.update_status(song_id, SongStatus::Pending, None)
    }

    fn delete_song(&self, song_id: &str) -> Result<bool> {
        self.execute_on_song(
            song_id,
            &format!("DELETE FROM {} WHERE id = ?1", SONG_TABLE_V_0.name),
            vec![Value::Text(song_id.to_string())],
        )
    }

    fn delete_songs_by_owner(&self, owner: usize) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn
            .execute(
                &format!("DELETE FROM {} WHERE created_by = ?1", SONG_TABLE_V_0.name),
                params![owner],
            )
            .with_context(|| format!("Failed to delete songs of user {}", owner))?;
        Ok(deleted)
    }
}
