use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running schema migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                role        TEXT NOT NULL DEFAULT 'user',
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            -- file_type, chunk_id, position, net_votes and total_votes are
            -- nullable: legacy rows lack them until the corresponding data
            -- migration has run.
            CREATE TABLE memes (
                id              TEXT PRIMARY KEY,
                title           TEXT,
                file_url        TEXT NOT NULL,
                thumbnail_url   TEXT,
                file_type       TEXT,
                width           INTEGER,
                height          INTEGER,
                duration        REAL,
                poster_url      TEXT,
                author_id       TEXT REFERENCES users(id),
                chunk_id        TEXT,
                position        INTEGER,
                upvotes         INTEGER NOT NULL DEFAULT 0,
                downvotes       INTEGER NOT NULL DEFAULT 0,
                net_votes       INTEGER,
                total_votes     INTEGER,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_memes_chunk_position
                ON memes(chunk_id, position);
            CREATE INDEX idx_memes_upvotes
                ON memes(upvotes);
            CREATE INDEX idx_memes_created
                ON memes(created_at);

            CREATE TABLE chunks (
                id              TEXT PRIMARY KEY,
                item_count      INTEGER NOT NULL DEFAULT 0,
                is_full         INTEGER NOT NULL DEFAULT 0,
                start_timestamp TEXT NOT NULL,
                end_timestamp   TEXT
            );

            CREATE TABLE votes (
                id          TEXT PRIMARY KEY,
                meme_id     TEXT NOT NULL REFERENCES memes(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                vote_type   TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(meme_id, user_id)
            );

            CREATE INDEX idx_votes_meme
                ON votes(meme_id);

            -- Denormalized counters, maintained with atomic increments inside
            -- the same transaction as the write they account for.
            CREATE TABLE stats (
                key     TEXT PRIMARY KEY,
                value   INTEGER NOT NULL DEFAULT 0
            );

            INSERT INTO stats (key, value) VALUES ('total_memes', 0);

            INSERT INTO schema_version (version) VALUES (1);
            "
        )?;
    }

    Ok(())
}
