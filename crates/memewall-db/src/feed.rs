//! Chunked feed index: chunk allocation, pagination and prev/next
//! adjacency over an append-only, vote-sortable meme sequence.
//!
//! Memes are partitioned into fixed-capacity chunks with 0-based positions.
//! Listing never counts the collection: the total comes from summing chunk
//! counters, and deep pages are reached by cursor emulation rather than
//! native OFFSET.

use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use memewall_types::models::{FileType, MediaInfo, SortOrder, TypeFilter};

use crate::models::{ChunkRow, MEME_COLUMNS, MemeRow, chunk_from_row, meme_from_row};
use crate::{Database, PAGE_SIZE, now_rfc3339};

/// The chunk the paginator lists. The numeric-renumbering migration collapsed
/// the feed into chunk "1", and the allocator keeps appending there until it
/// fills; adjacency still walks the full chunk list for anything older.
pub const LISTED_CHUNK_ID: &str = "1";

/// Input for a new meme. The file type is inferred from the URL when the
/// client sends no media info.
pub struct NewMeme {
    pub title: Option<String>,
    pub file_url: String,
    pub thumbnail_url: Option<String>,
    pub media: Option<MediaInfo>,
    pub author_id: Option<String>,
}

pub struct CreatedMeme {
    pub id: String,
    pub chunk_id: String,
    pub position: i64,
}

pub struct FeedPageRows {
    pub memes: Vec<MemeRow>,
    pub total: i64,
    pub has_more: bool,
}

impl Database {
    /// Create a meme: chunk assignment, position, chunk counter and the
    /// total-memes counter all commit in one transaction. A failure leaves
    /// none of the writes applied.
    pub fn create_meme(&self, new: &NewMeme) -> Result<CreatedMeme> {
        let capacity = self.chunk_capacity();
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let chunk = get_or_create_active_chunk(&tx)?;
            let position = next_position(&tx, &chunk.id)?;
            let id = Uuid::new_v4().to_string();
            let now = now_rfc3339();

            let file_type = new
                .media
                .as_ref()
                .map(|m| m.file_type())
                .unwrap_or_else(|| FileType::from_url(&new.file_url));

            let (width, height, duration, poster_url) = match &new.media {
                Some(MediaInfo::Image { width, height }) => {
                    (Some(*width as i64), Some(*height as i64), None, None)
                }
                Some(MediaInfo::Video { width, height, duration, poster_url }) => (
                    Some(*width as i64),
                    Some(*height as i64),
                    Some(*duration),
                    Some(poster_url.clone()),
                ),
                None => (None, None, None, None),
            };

            tx.execute(
                "INSERT INTO memes (id, title, file_url, thumbnail_url, file_type, width, height, \
                 duration, poster_url, author_id, chunk_id, position, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    id,
                    new.title,
                    new.file_url,
                    new.thumbnail_url,
                    file_type.as_str(),
                    width,
                    height,
                    duration,
                    poster_url,
                    new.author_id,
                    chunk.id,
                    position,
                    now,
                ],
            )?;

            let new_count = chunk.item_count + 1;
            let is_full = new_count >= capacity;
            tx.execute(
                "UPDATE chunks SET item_count = ?1, is_full = ?2, \
                 end_timestamp = CASE WHEN ?2 THEN ?3 ELSE end_timestamp END \
                 WHERE id = ?4",
                params![new_count, is_full, now, chunk.id],
            )?;

            tx.execute(
                "UPDATE stats SET value = value + 1 WHERE key = 'total_memes'",
                [],
            )?;

            tx.commit()?;
            Ok(CreatedMeme { id, chunk_id: chunk.id, position })
        })
    }

    /// One feed page. `page` is 1-based; out-of-range pages come back empty,
    /// redirecting to a canonical page is the caller's job.
    pub fn list_page(&self, page: u32, sort: SortOrder, filter: TypeFilter) -> Result<FeedPageRows> {
        self.with_conn(|conn| {
            let total: i64 =
                conn.query_row("SELECT COALESCE(SUM(item_count), 0) FROM chunks", [], |r| r.get(0))?;

            if page == 0 {
                return Ok(FeedPageRows { memes: Vec::new(), total, has_more: total > 0 });
            }

            let memes = match sort {
                SortOrder::New => page_by_position(conn, page, filter)?,
                SortOrder::Top => page_by_upvotes(conn, page)?,
                SortOrder::Random => page_by_created(conn, page, filter)?,
            };

            let has_more = (page as i64) * PAGE_SIZE < total;
            Ok(FeedPageRows { memes, total, has_more })
        })
    }

    pub fn get_meme(&self, id: &str) -> Result<Option<MemeRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {MEME_COLUMNS} FROM memes WHERE id = ?1"),
                    [id],
                    meme_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Detail-page routing by chunk and position.
    pub fn get_by_chunk_position(&self, chunk_id: &str, position: i64) -> Result<Option<MemeRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {MEME_COLUMNS} FROM memes WHERE chunk_id = ?1 AND position = ?2 LIMIT 1"
                    ),
                    params![chunk_id, position],
                    meme_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Current value of the denormalized total-memes counter.
    pub fn total_memes(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT value FROM stats WHERE key = 'total_memes'",
                [],
                |r| r.get(0),
            )?;
            Ok(n)
        })
    }

    /// Delete a meme together with its votes, decrementing both the
    /// total-memes counter and its chunk's item count in one transaction.
    /// Returns false when the meme does not exist.
    pub fn delete_meme(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let chunk_id: Option<Option<String>> = tx
                .query_row("SELECT chunk_id FROM memes WHERE id = ?1", [id], |r| r.get(0))
                .optional()?;
            let Some(chunk_id) = chunk_id else {
                return Ok(false);
            };

            tx.execute("DELETE FROM votes WHERE meme_id = ?1", [id])?;
            tx.execute("DELETE FROM memes WHERE id = ?1", [id])?;
            tx.execute("UPDATE stats SET value = value - 1 WHERE key = 'total_memes'", [])?;
            if let Some(chunk_id) = chunk_id {
                // is_full stays set: a full chunk never reopens for appends,
                // so freed positions are never reused.
                tx.execute(
                    "UPDATE chunks SET item_count = item_count - 1 WHERE id = ?1",
                    [&chunk_id],
                )?;
            }

            tx.commit()?;
            Ok(true)
        })
    }

    /// Immediate neighbours of a meme in the given ordering, as
    /// `(prev, next)`. For sort = new, "prev" is the neighbour at the
    /// next-greater position (newer) and "next" the one at the next-lesser
    /// position (older), matching the newest-first feed.
    ///
    /// Errors never escape navigation: callers treat a failure as
    /// `(None, None)`.
    pub fn get_adjacent(
        &self,
        id: &str,
        sort: SortOrder,
        filter: TypeFilter,
    ) -> Result<(Option<MemeRow>, Option<MemeRow>)> {
        let Some(current) = self.get_meme(id)? else {
            return Ok((None, None));
        };

        match sort {
            SortOrder::New => self.adjacent_by_position(&current),
            // Every vote-based sort navigates by upvotes, matching the feed's
            // top ordering.
            SortOrder::Top | SortOrder::Random => self.adjacent_by_upvotes(&current, filter),
        }
    }

    fn adjacent_by_position(
        &self,
        current: &MemeRow,
    ) -> Result<(Option<MemeRow>, Option<MemeRow>)> {
        let (Some(chunk_id), Some(position)) = (current.chunk_id.as_deref(), current.position)
        else {
            // Unmigrated meme: it has no place in the chunk ordering yet.
            return Ok((None, None));
        };

        self.with_conn(|conn| {
            let mut prev = conn
                .query_row(
                    &format!(
                        "SELECT {MEME_COLUMNS} FROM memes \
                         WHERE chunk_id = ?1 AND position > ?2 \
                         ORDER BY position ASC LIMIT 1"
                    ),
                    params![chunk_id, position],
                    meme_from_row,
                )
                .optional()?;
            let mut next = conn
                .query_row(
                    &format!(
                        "SELECT {MEME_COLUMNS} FROM memes \
                         WHERE chunk_id = ?1 AND position < ?2 \
                         ORDER BY position DESC LIMIT 1"
                    ),
                    params![chunk_id, position],
                    meme_from_row,
                )
                .optional()?;

            // Chunk boundary: probe the adjacent chunk in newest-first chunk
            // order for its boundary item.
            if prev.is_none() || next.is_none() {
                let chunk_ids = list_chunk_ids(conn)?;
                if let Some(idx) = chunk_ids.iter().position(|c| c == chunk_id) {
                    if prev.is_none() && idx > 0 {
                        prev = boundary_meme(conn, &chunk_ids[idx - 1], BoundaryEnd::Lowest)?;
                    }
                    if next.is_none() && idx + 1 < chunk_ids.len() {
                        next = boundary_meme(conn, &chunk_ids[idx + 1], BoundaryEnd::Highest)?;
                    }
                }
            }

            Ok((prev, next))
        })
    }

    fn adjacent_by_upvotes(
        &self,
        current: &MemeRow,
        filter: TypeFilter,
    ) -> Result<(Option<MemeRow>, Option<MemeRow>)> {
        let type_predicate = match filter.as_file_type() {
            Some(_) => " AND file_type = ?3",
            None => "",
        };

        self.with_conn(|conn| {
            // Display order is upvotes DESC with id ASC tie-break. "prev" is
            // the nearest item displayed before the current one, "next" the
            // nearest displayed after; the tie-break keeps navigation
            // loop-free at equal vote counts.
            let run = |vote_cmp: &str, id_cmp: &str, order: &str| -> Result<Option<MemeRow>> {
                let sql = format!(
                    "SELECT {MEME_COLUMNS} FROM memes \
                     WHERE (upvotes {vote_cmp} ?1 OR (upvotes = ?1 AND id {id_cmp} ?2)){type_predicate} \
                     ORDER BY {order} LIMIT 1"
                );
                let row = match filter.as_file_type() {
                    Some(ft) => conn
                        .query_row(
                            &sql,
                            params![current.upvotes, current.id, ft.as_str()],
                            meme_from_row,
                        )
                        .optional()?,
                    None => conn
                        .query_row(&sql, params![current.upvotes, current.id], meme_from_row)
                        .optional()?,
                };
                Ok(row)
            };

            let prev = run(">", "<", "upvotes ASC, id DESC")?;
            let next = run("<", ">", "upvotes DESC, id ASC")?;
            Ok((prev, next))
        })
    }
}

// ── Chunk allocator internals ───────────────────────────────────────────

/// Open chunk with the most recent start, created on demand. Chunk ids are
/// sequential numeric strings; legacy non-numeric ids sort as 0 in the MAX.
pub(crate) fn get_or_create_active_chunk(conn: &Connection) -> Result<ChunkRow> {
    // Numeric id as tie-break: chunk timestamps have millisecond resolution.
    let existing = conn
        .query_row(
            "SELECT id, item_count, is_full, start_timestamp, end_timestamp FROM chunks \
             WHERE is_full = 0 \
             ORDER BY start_timestamp DESC, CAST(id AS INTEGER) DESC LIMIT 1",
            [],
            chunk_from_row,
        )
        .optional()?;

    if let Some(chunk) = existing {
        return Ok(chunk);
    }

    create_chunk(conn)
}

pub(crate) fn create_chunk(conn: &Connection) -> Result<ChunkRow> {
    let next_id: i64 = conn.query_row(
        "SELECT COALESCE(MAX(CAST(id AS INTEGER)), 0) + 1 FROM chunks",
        [],
        |r| r.get(0),
    )?;
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO chunks (id, item_count, is_full, start_timestamp, end_timestamp) \
         VALUES (?1, 0, 0, ?2, NULL)",
        params![next_id.to_string(), now],
    )?;
    Ok(ChunkRow {
        id: next_id.to_string(),
        item_count: 0,
        is_full: false,
        start_timestamp: now,
        end_timestamp: None,
    })
}

/// Next position in a chunk. MAX(position)+1 rather than the chunk counter:
/// deletions may shrink the counter, but positions must stay unique.
pub(crate) fn next_position(conn: &Connection, chunk_id: &str) -> Result<i64> {
    let pos: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM memes WHERE chunk_id = ?1",
        [chunk_id],
        |r| r.get(0),
    )?;
    Ok(pos)
}

fn list_chunk_ids(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM chunks ORDER BY start_timestamp DESC, CAST(id AS INTEGER) DESC",
    )?;
    let ids = stmt
        .query_map([], |r| r.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

enum BoundaryEnd {
    Lowest,
    Highest,
}

fn boundary_meme(conn: &Connection, chunk_id: &str, end: BoundaryEnd) -> Result<Option<MemeRow>> {
    let order = match end {
        BoundaryEnd::Lowest => "position ASC",
        BoundaryEnd::Highest => "position DESC",
    };
    let row = conn
        .query_row(
            &format!(
                "SELECT {MEME_COLUMNS} FROM memes WHERE chunk_id = ?1 ORDER BY {order} LIMIT 1"
            ),
            [chunk_id],
            meme_from_row,
        )
        .optional()?;
    Ok(row)
}

// ── Paginator internals ─────────────────────────────────────────────────

fn page_by_position(conn: &Connection, page: u32, filter: TypeFilter) -> Result<Vec<MemeRow>> {
    let mut base = format!(
        "SELECT {MEME_COLUMNS} FROM memes WHERE chunk_id = '{LISTED_CHUNK_ID}'"
    );
    let mut args: Vec<Value> = Vec::new();
    if let Some(ft) = filter.as_file_type() {
        base.push_str(" AND file_type = ?");
        args.push(Value::from(ft.as_str().to_string()));
    }

    let cursor = if page > 1 {
        // Offset emulation: refetch the preceding pages in the same order and
        // start strictly after the last row seen. O(page) work by design.
        let prefetch = (page as i64 - 1) * PAGE_SIZE;
        let sql = format!("{base} ORDER BY position DESC LIMIT {prefetch}");
        let rows = query_memes(conn, &sql, args.clone())?;
        if (rows.len() as i64) < prefetch {
            return Ok(Vec::new());
        }
        match rows.last().and_then(|m| m.position) {
            Some(pos) => Some(pos),
            None => return Ok(Vec::new()),
        }
    } else {
        None
    };

    let sql = match cursor {
        Some(pos) => {
            args.push(Value::from(pos));
            format!("{base} AND position < ? ORDER BY position DESC LIMIT {PAGE_SIZE}")
        }
        None => format!("{base} ORDER BY position DESC LIMIT {PAGE_SIZE}"),
    };
    query_memes(conn, &sql, args)
}

/// Top sort ranks by raw upvotes over the listed chunk. The type filter does
/// not apply here, matching the feed's historical behavior.
fn page_by_upvotes(conn: &Connection, page: u32) -> Result<Vec<MemeRow>> {
    let base = format!(
        "SELECT {MEME_COLUMNS} FROM memes WHERE chunk_id = '{LISTED_CHUNK_ID}'"
    );
    let order = "upvotes DESC, id ASC";

    let cursor = if page > 1 {
        let prefetch = (page as i64 - 1) * PAGE_SIZE;
        let sql = format!("{base} ORDER BY {order} LIMIT {prefetch}");
        let rows = query_memes(conn, &sql, Vec::new())?;
        if (rows.len() as i64) < prefetch {
            return Ok(Vec::new());
        }
        rows.last().map(|m| (m.upvotes, m.id.clone()))
    } else {
        None
    };

    match cursor {
        Some((upvotes, id)) => {
            let sql = format!(
                "{base} AND (upvotes < ?1 OR (upvotes = ?1 AND id > ?2)) \
                 ORDER BY {order} LIMIT {PAGE_SIZE}"
            );
            query_memes(conn, &sql, vec![Value::from(upvotes), Value::from(id)])
        }
        None => {
            let sql = format!("{base} ORDER BY {order} LIMIT {PAGE_SIZE}");
            query_memes(conn, &sql, Vec::new())
        }
    }
}

/// "Random" sort: deterministic created-at ascending. A placeholder ordering,
/// kept stable so page math still works.
fn page_by_created(conn: &Connection, page: u32, filter: TypeFilter) -> Result<Vec<MemeRow>> {
    let mut base = format!(
        "SELECT {MEME_COLUMNS} FROM memes WHERE chunk_id = '{LISTED_CHUNK_ID}'"
    );
    let mut args: Vec<Value> = Vec::new();
    if let Some(ft) = filter.as_file_type() {
        base.push_str(" AND file_type = ?");
        args.push(Value::from(ft.as_str().to_string()));
    }
    let order = "created_at ASC, id ASC";

    let cursor = if page > 1 {
        let prefetch = (page as i64 - 1) * PAGE_SIZE;
        let sql = format!("{base} ORDER BY {order} LIMIT {prefetch}");
        let rows = query_memes(conn, &sql, args.clone())?;
        if (rows.len() as i64) < prefetch {
            return Ok(Vec::new());
        }
        rows.last().map(|m| (m.created_at.clone(), m.id.clone()))
    } else {
        None
    };

    match cursor {
        Some((created_at, id)) => {
            let n = args.len();
            let sql = format!(
                "{base} AND (created_at > ?{c} OR (created_at = ?{c} AND id > ?{i})) \
                 ORDER BY {order} LIMIT {PAGE_SIZE}",
                c = n + 1,
                i = n + 2,
            );
            args.push(Value::from(created_at));
            args.push(Value::from(id));
            query_memes(conn, &sql, args)
        }
        None => {
            let sql = format!("{base} ORDER BY {order} LIMIT {PAGE_SIZE}");
            query_memes(conn, &sql, args)
        }
    }
}

fn query_memes(conn: &Connection, sql: &str, args: Vec<Value>) -> Result<Vec<MemeRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(args), meme_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::open_test_db;
    use memewall_types::models::{MediaInfo, SortOrder, TypeFilter};

    fn image(db: &Database, name: &str) -> CreatedMeme {
        db.create_meme(&NewMeme {
            title: Some(name.into()),
            file_url: format!("https://cdn.test/{name}.png"),
            thumbnail_url: None,
            media: Some(MediaInfo::Image { width: 320, height: 240 }),
            author_id: None,
        })
        .expect("create meme")
    }

    fn video(db: &Database, name: &str) -> CreatedMeme {
        db.create_meme(&NewMeme {
            title: Some(name.into()),
            file_url: format!("https://cdn.test/{name}.mp4"),
            thumbnail_url: None,
            media: Some(MediaInfo::Video {
                width: 640,
                height: 360,
                duration: 8.0,
                poster_url: format!("https://cdn.test/{name}.jpg"),
            }),
            author_id: None,
        })
        .expect("create meme")
    }

    fn chunk(db: &Database, id: &str) -> ChunkRow {
        db.with_conn(|conn| {
            let row = conn.query_row(
                "SELECT id, item_count, is_full, start_timestamp, end_timestamp \
                 FROM chunks WHERE id = ?1",
                [id],
                chunk_from_row,
            )?;
            Ok(row)
        })
        .expect("chunk row")
    }

    #[test]
    fn fills_chunk_and_rolls_to_next_at_capacity() {
        let db = open_test_db(3);

        let first: Vec<CreatedMeme> = (0..3).map(|i| image(&db, &format!("m{i}"))).collect();
        for (i, created) in first.iter().enumerate() {
            assert_eq!(created.chunk_id, "1");
            assert_eq!(created.position, i as i64);
        }

        let c1 = chunk(&db, "1");
        assert_eq!(c1.item_count, 3);
        assert!(c1.is_full);
        assert!(c1.end_timestamp.is_some());

        let overflow = image(&db, "m3");
        assert_eq!(overflow.chunk_id, "2");
        assert_eq!(overflow.position, 0);

        let c2 = chunk(&db, "2");
        assert_eq!(c2.item_count, 1);
        assert!(!c2.is_full);
        assert!(c2.end_timestamp.is_none());
    }

    #[test]
    fn positions_are_unique_and_contiguous() {
        let db = open_test_db(5);
        for i in 0..5 {
            image(&db, &format!("m{i}"));
        }

        let positions: Vec<i64> = db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT position FROM memes WHERE chunk_id = '1' ORDER BY position",
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
    fn pages_cover_every_meme_exactly_once() {
        let db = open_test_db(1000);
        for i in 0..30 {
            image(&db, &format!("m{i:02}"));
        }

        let mut seen = Vec::new();
        for page in 1..=3 {
            let rows = db.list_page(page, SortOrder::New, TypeFilter::All).unwrap();
            assert_eq!(rows.total, 30);
            assert_eq!(rows.has_more, page < 3);
            for m in rows.memes {
                seen.push(m.id);
            }
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 30);

        let beyond = db.list_page(4, SortOrder::New, TypeFilter::All).unwrap();
        assert!(beyond.memes.is_empty());
        assert!(!beyond.has_more);
    }

    #[test]
    fn vote_and_created_pages_are_exhaustive_with_ties() {
        let db = open_test_db(1000);
        let created: Vec<CreatedMeme> = (0..30).map(|i| image(&db, &format!("m{i:02}"))).collect();

        // Heavy duplication so the tie-breaking cursor does real work: only
        // three distinct vote counts across 30 rows.
        db.with_conn_mut(|conn| {
            for (i, m) in created.iter().enumerate() {
                conn.execute(
                    "UPDATE memes SET upvotes = ?1 WHERE id = ?2",
                    params![(i % 3) as i64, m.id],
                )?;
            }
            Ok(())
        })
        .unwrap();

        for sort in [SortOrder::Top, SortOrder::Random] {
            let mut seen = Vec::new();
            let mut ordered = Vec::new();
            for page in 1..=3 {
                let rows = db.list_page(page, sort, TypeFilter::All).unwrap();
                assert_eq!(rows.memes.len(), 12usize.min(30 - seen.len()));
                assert_eq!(rows.has_more, page < 3);
                for m in rows.memes {
                    ordered.push((m.upvotes, m.created_at.clone(), m.id.clone()));
                    seen.push(m.id);
                }
            }
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), 30, "every meme exactly once under {sort:?}");

            // Order must be globally consistent across page boundaries, not
            // just within a page.
            for pair in ordered.windows(2) {
                let (up_a, created_a, id_a) = &pair[0];
                let (up_b, created_b, id_b) = &pair[1];
                match sort {
                    SortOrder::Top => {
                        assert!(
                            up_a > up_b || (up_a == up_b && id_a < id_b),
                            "top order broken: ({up_a}, {id_a}) before ({up_b}, {id_b})"
                        );
                    }
                    _ => {
                        assert!(
                            created_a < created_b || (created_a == created_b && id_a < id_b),
                            "created order broken: ({created_a}, {id_a}) before ({created_b}, {id_b})"
                        );
                    }
                }
            }
        }

        let beyond = db.list_page(4, SortOrder::Top, TypeFilter::All).unwrap();
        assert!(beyond.memes.is_empty());
    }

    #[test]
    fn new_sort_is_newest_first() {
        let db = open_test_db(1000);
        for i in 0..3 {
            image(&db, &format!("m{i}"));
        }

        let rows = db.list_page(1, SortOrder::New, TypeFilter::All).unwrap();
        let titles: Vec<Option<String>> = rows.memes.into_iter().map(|m| m.title).collect();
        assert_eq!(
            titles,
            vec![Some("m2".into()), Some("m1".into()), Some("m0".into())]
        );
    }

    #[test]
    fn type_filter_narrows_new_sort() {
        let db = open_test_db(1000);
        image(&db, "pic0");
        video(&db, "clip0");
        image(&db, "pic1");
        video(&db, "clip1");

        let rows = db.list_page(1, SortOrder::New, TypeFilter::Video).unwrap();
        assert_eq!(rows.memes.len(), 2);
        for m in &rows.memes {
            assert_eq!(m.file_type.as_deref(), Some("video"));
        }
        // The total stays global: it comes from chunk counters, not from the
        // filtered result set.
        assert_eq!(rows.total, 4);
    }

    #[test]
    fn top_sort_ranks_by_raw_upvotes() {
        let db = open_test_db(1000);
        let a = image(&db, "a");
        let b = image(&db, "b");
        let c = image(&db, "c");

        db.with_conn_mut(|conn| {
            conn.execute("UPDATE memes SET upvotes = 5 WHERE id = ?1", [&b.id])?;
            conn.execute("UPDATE memes SET upvotes = 2 WHERE id = ?1", [&c.id])?;
            conn.execute("UPDATE memes SET upvotes = 1, net_votes = -3 WHERE id = ?1", [&a.id])?;
            Ok(())
        })
        .unwrap();

        let rows = db.list_page(1, SortOrder::Top, TypeFilter::All).unwrap();
        let ids: Vec<String> = rows.memes.into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![b.id, c.id, a.id]);
    }

    #[test]
    fn adjacency_within_a_chunk_is_symmetric() {
        let db = open_test_db(1000);
        let a = image(&db, "a");
        let b = image(&db, "b");
        let c = image(&db, "c");

        // Feed order is c, b, a. prev of b is the newer c, next is the older a.
        let (prev, next) = db.get_adjacent(&b.id, SortOrder::New, TypeFilter::All).unwrap();
        assert_eq!(prev.map(|m| m.id), Some(c.id.clone()));
        assert_eq!(next.as_ref().map(|m| m.id.clone()), Some(a.id.clone()));

        // getAdjacent(b).next == a implies getAdjacent(a).prev == b
        let (prev_of_a, next_of_a) =
            db.get_adjacent(&a.id, SortOrder::New, TypeFilter::All).unwrap();
        assert_eq!(prev_of_a.map(|m| m.id), Some(b.id.clone()));
        assert!(next_of_a.is_none());

        let (prev_of_c, next_of_c) =
            db.get_adjacent(&c.id, SortOrder::New, TypeFilter::All).unwrap();
        assert!(prev_of_c.is_none());
        assert_eq!(next_of_c.map(|m| m.id), Some(b.id));
    }

    #[test]
    fn adjacency_crosses_chunk_boundaries() {
        let db = open_test_db(2);
        let m1 = image(&db, "m1");
        let m2 = image(&db, "m2");
        let m3 = image(&db, "m3"); // alone in chunk "2"
        assert_eq!(m3.chunk_id, "2");

        // m2 sits at the top of full chunk "1"; its prev lives in chunk "2".
        let (prev, next) = db.get_adjacent(&m2.id, SortOrder::New, TypeFilter::All).unwrap();
        assert_eq!(prev.map(|m| m.id), Some(m3.id.clone()));
        assert_eq!(next.map(|m| m.id), Some(m1.id.clone()));

        // m3 is the newest item overall; its next is the boundary item of
        // chunk "1".
        let (prev, next) = db.get_adjacent(&m3.id, SortOrder::New, TypeFilter::All).unwrap();
        assert!(prev.is_none());
        assert_eq!(next.map(|m| m.id), Some(m2.id.clone()));

        // m1 is the oldest item overall.
        let (prev, next) = db.get_adjacent(&m1.id, SortOrder::New, TypeFilter::All).unwrap();
        assert_eq!(prev.map(|m| m.id), Some(m2.id));
        assert!(next.is_none());
    }

    #[test]
    fn adjacency_by_votes_walks_vote_order() {
        let db = open_test_db(1000);
        let a = image(&db, "a");
        let b = image(&db, "b");
        let c = image(&db, "c");

        db.with_conn_mut(|conn| {
            conn.execute("UPDATE memes SET upvotes = 9 WHERE id = ?1", [&a.id])?;
            conn.execute("UPDATE memes SET upvotes = 4 WHERE id = ?1", [&b.id])?;
            conn.execute("UPDATE memes SET upvotes = 1 WHERE id = ?1", [&c.id])?;
            Ok(())
        })
        .unwrap();

        let (prev, next) = db.get_adjacent(&b.id, SortOrder::Top, TypeFilter::All).unwrap();
        assert_eq!(prev.map(|m| m.id), Some(a.id));
        assert_eq!(next.map(|m| m.id), Some(c.id));
    }

    #[test]
    fn adjacency_of_unknown_meme_is_empty() {
        let db = open_test_db(1000);
        image(&db, "only");
        let (prev, next) = db
            .get_adjacent("no-such-id", SortOrder::New, TypeFilter::All)
            .unwrap();
        assert!(prev.is_none());
        assert!(next.is_none());
    }

    #[test]
    fn delete_decrements_counters() {
        let db = open_test_db(1000);
        let a = image(&db, "a");
        image(&db, "b");
        assert_eq!(db.total_memes().unwrap(), 2);

        assert!(db.delete_meme(&a.id).unwrap());
        assert_eq!(db.total_memes().unwrap(), 1);
        assert!(db.get_meme(&a.id).unwrap().is_none());

        let rows = db.list_page(1, SortOrder::New, TypeFilter::All).unwrap();
        assert_eq!(rows.total, 1);
        assert_eq!(rows.memes.len(), 1);

        assert!(!db.delete_meme(&a.id).unwrap());
    }

    #[test]
    fn lookup_by_chunk_and_position() {
        let db = open_test_db(1000);
        image(&db, "first");
        let second = image(&db, "second");

        let found = db.get_by_chunk_position("1", 1).unwrap().expect("meme at 1/1");
        assert_eq!(found.id, second.id);
        assert!(db.get_by_chunk_position("1", 5).unwrap().is_none());
    }
}
