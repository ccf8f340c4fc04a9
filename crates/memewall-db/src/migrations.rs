//! Admin-triggered data migrations for retrofitting legacy rows into the
//! current layout. Each job commits in batches of at most
//! [`MIGRATION_BATCH_SIZE`](crate::MIGRATION_BATCH_SIZE) row updates, so an
//! aborted run keeps its committed batches and can be resumed.
//!
//! Type backfill, type repair and the vote-field backfill are idempotent:
//! re-running either no-ops or re-derives identical values. The chunk
//! migration and the numeric renumbering are one-shot; renumbering in
//! particular discards the existing chunk layout on every run.

use anyhow::Result;
use rusqlite::params;
use tracing::info;

use memewall_types::models::FileType;

use crate::feed::{create_chunk, get_or_create_active_chunk};
use crate::{Database, MIGRATION_BATCH_SIZE, now_rfc3339};

impl Database {
    /// Fill in `file_type` where missing, inferred from the file URL's
    /// extension.
    pub fn backfill_types(&self) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let mut total = 0;
            loop {
                let tx = conn.unchecked_transaction()?;
                let rows: Vec<(String, String)> = {
                    let mut stmt = tx.prepare(
                        "SELECT id, file_url FROM memes WHERE file_type IS NULL \
                         ORDER BY id LIMIT ?1",
                    )?;
                    stmt.query_map([MIGRATION_BATCH_SIZE as i64], |r| Ok((r.get(0)?, r.get(1)?)))?
                        .collect::<std::result::Result<_, _>>()?
                };
                if rows.is_empty() {
                    break;
                }
                for (id, file_url) in &rows {
                    tx.execute(
                        "UPDATE memes SET file_type = ?1 WHERE id = ?2",
                        params![FileType::from_url(file_url).as_str(), id],
                    )?;
                }
                total += rows.len();
                tx.commit()?;
            }
            info!("Type backfill complete, {} rows updated", total);
            Ok(total)
        })
    }

    /// Recompute the inferred type for every meme and overwrite rows that
    /// disagree. Returns the number of corrections.
    pub fn repair_types(&self) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let mut total = 0;
            let mut last_id = String::new();
            loop {
                let tx = conn.unchecked_transaction()?;
                let rows: Vec<(String, String, Option<String>)> = {
                    let mut stmt = tx.prepare(
                        "SELECT id, file_url, file_type FROM memes WHERE id > ?1 \
                         ORDER BY id LIMIT ?2",
                    )?;
                    stmt.query_map(params![last_id, MIGRATION_BATCH_SIZE as i64], |r| {
                        Ok((r.get(0)?, r.get(1)?, r.get(2)?))
                    })?
                    .collect::<std::result::Result<_, _>>()?
                };
                let Some((batch_last, _, _)) = rows.last() else {
                    break;
                };
                last_id = batch_last.clone();

                for (id, file_url, stored) in &rows {
                    let correct = FileType::from_url(file_url);
                    if stored.as_deref() != Some(correct.as_str()) {
                        tx.execute(
                            "UPDATE memes SET file_type = ?1 WHERE id = ?2",
                            params![correct.as_str(), id],
                        )?;
                        total += 1;
                    }
                }
                tx.commit()?;
            }
            info!("Type repair complete, {} rows corrected", total);
            Ok(total)
        })
    }

    /// Walk all memes by creation time and assign unchunked rows into the
    /// open chunk, rolling to a fresh chunk at the capacity boundary. Chunk
    /// counters are persisted at every batch commit.
    pub fn migrate_to_chunks(&self) -> Result<usize> {
        let capacity = self.chunk_capacity();
        self.with_conn_mut(|conn| {
            let unassigned: Vec<String> = {
                let mut stmt = conn.prepare(
                    "SELECT id FROM memes WHERE chunk_id IS NULL OR position IS NULL \
                     ORDER BY created_at ASC, id ASC",
                )?;
                stmt.query_map([], |r| r.get(0))?
                    .collect::<std::result::Result<_, _>>()?
            };
            if unassigned.is_empty() {
                info!("Chunk migration: nothing to do");
                return Ok(0);
            }

            let mut migrated = 0;
            for batch in unassigned.chunks(MIGRATION_BATCH_SIZE) {
                let tx = conn.unchecked_transaction()?;

                // Re-read fill state each batch: the previous commit is the
                // source of truth if an earlier run was interrupted.
                let mut chunk = get_or_create_active_chunk(&tx)?;
                let mut count = chunk.item_count;

                for id in batch {
                    if count >= capacity {
                        tx.execute(
                            "UPDATE chunks SET item_count = ?1, is_full = 1, end_timestamp = ?2 \
                             WHERE id = ?3",
                            params![count, now_rfc3339(), chunk.id],
                        )?;
                        chunk = create_chunk(&tx)?;
                        count = 0;
                    }
                    tx.execute(
                        "UPDATE memes SET chunk_id = ?1, position = ?2 WHERE id = ?3",
                        params![chunk.id, count, id],
                    )?;
                    count += 1;
                }

                let is_full = count >= capacity;
                tx.execute(
                    "UPDATE chunks SET item_count = ?1, is_full = ?2, \
                     end_timestamp = CASE WHEN ?2 THEN ?3 ELSE end_timestamp END WHERE id = ?4",
                    params![count, is_full, now_rfc3339(), chunk.id],
                )?;

                tx.commit()?;
                migrated += batch.len();
            }

            info!("Chunk migration complete, {} memes assigned", migrated);
            Ok(migrated)
        })
    }

    /// Collapse the whole feed into a single chunk "1", positions assigned by
    /// ascending creation time, and drop the superseded chunk rows so the
    /// chunk-count sum stays equal to the number of memes. Destructive if
    /// re-run while the allocator is writing; intended as a one-shot.
    pub fn renumber_chunks(&self) -> Result<usize> {
        let capacity = self.chunk_capacity();
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let now = now_rfc3339();

            tx.execute("DELETE FROM chunks", [])?;
            tx.execute(
                "INSERT INTO chunks (id, item_count, is_full, start_timestamp, end_timestamp) \
                 VALUES ('1', 0, 0, ?1, NULL)",
                [&now],
            )?;

            let ids: Vec<String> = {
                let mut stmt =
                    tx.prepare("SELECT id FROM memes ORDER BY created_at ASC, id ASC")?;
                stmt.query_map([], |r| r.get(0))?
                    .collect::<std::result::Result<_, _>>()?
            };

            for (position, id) in ids.iter().enumerate() {
                tx.execute(
                    "UPDATE memes SET chunk_id = '1', position = ?1 WHERE id = ?2",
                    params![position as i64, id],
                )?;
            }

            let count = ids.len() as i64;
            let is_full = count >= capacity;
            tx.execute(
                "UPDATE chunks SET item_count = ?1, is_full = ?2, \
                 end_timestamp = CASE WHEN ?2 THEN ?3 ELSE NULL END WHERE id = '1'",
                params![count, is_full, now],
            )?;

            tx.commit()?;
            info!("Numeric renumbering complete, {} memes in chunk 1", ids.len());
            Ok(ids.len())
        })
    }

    /// Derive `net_votes`/`total_votes` from the raw counters for every meme.
    pub fn backfill_vote_fields(&self) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let mut total = 0;
            let mut last_id = String::new();
            loop {
                let tx = conn.unchecked_transaction()?;
                let ids: Vec<String> = {
                    let mut stmt = tx.prepare(
                        "SELECT id FROM memes WHERE id > ?1 ORDER BY id LIMIT ?2",
                    )?;
                    stmt.query_map(params![last_id, MIGRATION_BATCH_SIZE as i64], |r| r.get(0))?
                        .collect::<std::result::Result<_, _>>()?
                };
                let Some(batch_last) = ids.last() else {
                    break;
                };
                last_id = batch_last.clone();

                for id in &ids {
                    tx.execute(
                        "UPDATE memes SET net_votes = upvotes - downvotes, \
                         total_votes = upvotes + downvotes WHERE id = ?1",
                        [id],
                    )?;
                }
                total += ids.len();
                tx.commit()?;
            }
            info!("Vote-field backfill complete, {} rows updated", total);
            Ok(total)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::open_test_db;

    /// Insert a row the way the pre-chunk, pre-type schema left them: no
    /// file_type, no chunk assignment, no derived vote fields.
    fn legacy_meme(db: &Database, id: &str, file_url: &str, created_at: &str) {
        db.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO memes (id, file_url, created_at) VALUES (?1, ?2, ?3)",
                params![id, file_url, created_at],
            )?;
            Ok(())
        })
        .expect("insert legacy meme");
    }

    fn file_type_of(db: &Database, id: &str) -> Option<String> {
        db.with_conn(|conn| {
            let t = conn.query_row("SELECT file_type FROM memes WHERE id = ?1", [id], |r| r.get(0))?;
            Ok(t)
        })
        .unwrap()
    }

    fn placement_of(db: &Database, id: &str) -> (Option<String>, Option<i64>) {
        db.with_conn(|conn| {
            let row = conn.query_row(
                "SELECT chunk_id, position FROM memes WHERE id = ?1",
                [id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?;
            Ok(row)
        })
        .unwrap()
    }

    #[test]
    fn backfill_only_touches_missing_types() {
        let db = open_test_db(1000);
        legacy_meme(&db, "a", "https://cdn.test/a.png", "2024-01-01T00:00:00.000Z");
        legacy_meme(&db, "b", "https://cdn.test/b.mp4", "2024-01-01T00:00:01.000Z");
        legacy_meme(&db, "c", "https://cdn.test/c.webm", "2024-01-01T00:00:02.000Z");
        // Wrong on purpose: backfill must leave it alone.
        db.with_conn_mut(|conn| {
            conn.execute("UPDATE memes SET file_type = 'image' WHERE id = 'c'", [])?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.backfill_types().unwrap(), 2);
        assert_eq!(file_type_of(&db, "a").as_deref(), Some("image"));
        assert_eq!(file_type_of(&db, "b").as_deref(), Some("video"));
        assert_eq!(file_type_of(&db, "c").as_deref(), Some("image"));

        assert_eq!(db.backfill_types().unwrap(), 0);
    }

    #[test]
    fn repair_overwrites_disagreeing_types() {
        let db = open_test_db(1000);
        legacy_meme(&db, "a", "https://cdn.test/a.png", "2024-01-01T00:00:00.000Z");
        legacy_meme(&db, "b", "https://cdn.test/b.ogg", "2024-01-01T00:00:01.000Z");
        db.with_conn_mut(|conn| {
            conn.execute("UPDATE memes SET file_type = 'image' WHERE id = 'b'", [])?;
            conn.execute("UPDATE memes SET file_type = 'image' WHERE id = 'a'", [])?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.repair_types().unwrap(), 1);
        assert_eq!(file_type_of(&db, "b").as_deref(), Some("video"));

        assert_eq!(db.repair_types().unwrap(), 0);
    }

    #[test]
    fn chunk_migration_assigns_in_creation_order() {
        let db = open_test_db(2);
        for (i, id) in ["m0", "m1", "m2", "m3", "m4"].iter().enumerate() {
            legacy_meme(
                &db,
                id,
                &format!("https://cdn.test/{id}.png"),
                &format!("2024-01-01T00:00:0{i}.000Z"),
            );
        }

        assert_eq!(db.migrate_to_chunks().unwrap(), 5);

        assert_eq!(placement_of(&db, "m0"), (Some("1".into()), Some(0)));
        assert_eq!(placement_of(&db, "m1"), (Some("1".into()), Some(1)));
        assert_eq!(placement_of(&db, "m2"), (Some("2".into()), Some(0)));
        assert_eq!(placement_of(&db, "m3"), (Some("2".into()), Some(1)));
        assert_eq!(placement_of(&db, "m4"), (Some("3".into()), Some(0)));

        let (full_count, total_count): (i64, i64) = db
            .with_conn(|conn| {
                let full = conn.query_row(
                    "SELECT COUNT(*) FROM chunks WHERE is_full = 1",
                    [],
                    |r| r.get(0),
                )?;
                let total = conn.query_row(
                    "SELECT COALESCE(SUM(item_count), 0) FROM chunks",
                    [],
                    |r| r.get(0),
                )?;
                Ok((full, total))
            })
            .unwrap();
        assert_eq!(full_count, 2);
        assert_eq!(total_count, 5);

        // Everything is assigned now, a second run finds nothing.
        assert_eq!(db.migrate_to_chunks().unwrap(), 0);
    }

    #[test]
    fn renumbering_collapses_into_chunk_one() {
        let db = open_test_db(2);
        // Let the allocator spread five memes over three chunks first.
        use crate::feed::NewMeme;
        for i in 0..5 {
            db.create_meme(&NewMeme {
                title: Some(format!("m{i}")),
                file_url: format!("https://cdn.test/m{i}.png"),
                thumbnail_url: None,
                media: None,
                author_id: None,
            })
            .unwrap();
        }

        assert_eq!(db.renumber_chunks().unwrap(), 5);

        let (chunk_rows, item_count, is_full): (i64, i64, bool) = db
            .with_conn(|conn| {
                let rows = conn.query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0))?;
                let (count, full) = conn.query_row(
                    "SELECT item_count, is_full FROM chunks WHERE id = '1'",
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )?;
                Ok((rows, count, full))
            })
            .unwrap();
        assert_eq!(chunk_rows, 1);
        assert_eq!(item_count, 5);
        assert!(is_full);

        let positions: Vec<i64> = db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT position FROM memes WHERE chunk_id = '1' \
                     ORDER BY created_at ASC, id ASC",
                )?;
                let rows = stmt
                    .query_map([], |r| r.get(0))?
                    .collect::<std::result::Result<Vec<i64>, _>>()?;
                Ok(rows)
            })
            .unwrap();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn vote_backfill_derives_from_raw_counters() {
        let db = open_test_db(1000);
        legacy_meme(&db, "a", "https://cdn.test/a.png", "2024-01-01T00:00:00.000Z");
        db.with_conn_mut(|conn| {
            conn.execute("UPDATE memes SET upvotes = 7, downvotes = 3 WHERE id = 'a'", [])?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.backfill_vote_fields().unwrap(), 1);

        let (net, total): (i64, i64) = db
            .with_conn(|conn| {
                let row = conn.query_row(
                    "SELECT net_votes, total_votes FROM memes WHERE id = 'a'",
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )?;
                Ok(row)
            })
            .unwrap();
        assert_eq!(net, 4);
        assert_eq!(total, 10);

        // Re-running re-derives the same values.
        assert_eq!(db.backfill_vote_fields().unwrap(), 1);
    }
}
