//! Vote aggregation: one vote row per (user, meme) pair plus denormalized
//! counters on the meme, kept consistent with atomic increments inside a
//! single transaction per transition.

use anyhow::Result;
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use memewall_types::models::VoteKind;

use crate::models::VoteRow;
use crate::{Database, now_rfc3339};

/// Counter state after a vote transition. `user_vote` is the caller's vote
/// going forward; `None` means the vote was toggled off.
pub struct VoteOutcome {
    pub upvotes: i64,
    pub downvotes: i64,
    pub net_votes: i64,
    pub total_votes: i64,
    pub user_vote: Option<VoteKind>,
}

impl Database {
    pub fn get_vote(&self, meme_id: &str, user_id: &str) -> Result<Option<VoteRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, meme_id, user_id, vote_type, created_at FROM votes \
                     WHERE meme_id = ?1 AND user_id = ?2",
                    params![meme_id, user_id],
                    |row| {
                        Ok(VoteRow {
                            id: row.get(0)?,
                            meme_id: row.get(1)?,
                            user_id: row.get(2)?,
                            vote_type: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Apply one step of the per-(user, meme) vote state machine:
    ///
    /// - no vote + vote        -> vote recorded, counter +1
    /// - same vote again       -> vote removed (toggle off), counter -1
    /// - opposite vote         -> vote switched, both counters move, net
    ///   swings by 2, total unchanged
    ///
    /// Counters move via atomic increments, never read-modify-write, so
    /// concurrent votes from different users cannot lose updates. Returns
    /// `None` when the meme does not exist; no write happens in that case.
    pub fn cast_vote(
        &self,
        meme_id: &str,
        user_id: &str,
        kind: VoteKind,
    ) -> Result<Option<VoteOutcome>> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let exists: Option<i64> = tx
                .query_row("SELECT 1 FROM memes WHERE id = ?1", [meme_id], |r| r.get(0))
                .optional()?;
            if exists.is_none() {
                return Ok(None);
            }

            let existing: Option<(String, String)> = tx
                .query_row(
                    "SELECT id, vote_type FROM votes WHERE meme_id = ?1 AND user_id = ?2",
                    params![meme_id, user_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let now = now_rfc3339();

            let user_vote = match existing {
                Some((vote_id, vote_type)) if VoteKind::parse(&vote_type) == Some(kind) => {
                    // Toggle off
                    tx.execute("DELETE FROM votes WHERE id = ?1", [&vote_id])?;
                    let sql = match kind {
                        VoteKind::Upvote => {
                            "UPDATE memes SET upvotes = upvotes - 1, \
                             net_votes = COALESCE(net_votes, 0) - 1, \
                             total_votes = COALESCE(total_votes, 0) - 1 WHERE id = ?1"
                        }
                        VoteKind::Downvote => {
                            "UPDATE memes SET downvotes = downvotes - 1, \
                             net_votes = COALESCE(net_votes, 0) + 1, \
                             total_votes = COALESCE(total_votes, 0) - 1 WHERE id = ?1"
                        }
                    };
                    tx.execute(sql, [meme_id])?;
                    None
                }
                Some((vote_id, _)) => {
                    // Switch: net swings by 2, total stays put.
                    tx.execute(
                        "UPDATE votes SET vote_type = ?1, created_at = ?2 WHERE id = ?3",
                        params![kind.as_str(), now, vote_id],
                    )?;
                    let sql = match kind {
                        VoteKind::Upvote => {
                            "UPDATE memes SET upvotes = upvotes + 1, downvotes = downvotes - 1, \
                             net_votes = COALESCE(net_votes, 0) + 2 WHERE id = ?1"
                        }
                        VoteKind::Downvote => {
                            "UPDATE memes SET downvotes = downvotes + 1, upvotes = upvotes - 1, \
                             net_votes = COALESCE(net_votes, 0) - 2 WHERE id = ?1"
                        }
                    };
                    tx.execute(sql, [meme_id])?;
                    Some(kind)
                }
                None => {
                    tx.execute(
                        "INSERT INTO votes (id, meme_id, user_id, vote_type, created_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![Uuid::new_v4().to_string(), meme_id, user_id, kind.as_str(), now],
                    )?;
                    let sql = match kind {
                        VoteKind::Upvote => {
                            "UPDATE memes SET upvotes = upvotes + 1, \
                             net_votes = COALESCE(net_votes, 0) + 1, \
                             total_votes = COALESCE(total_votes, 0) + 1 WHERE id = ?1"
                        }
                        VoteKind::Downvote => {
                            "UPDATE memes SET downvotes = downvotes + 1, \
                             net_votes = COALESCE(net_votes, 0) - 1, \
                             total_votes = COALESCE(total_votes, 0) + 1 WHERE id = ?1"
                        }
                    };
                    tx.execute(sql, [meme_id])?;
                    Some(kind)
                }
            };

            let (upvotes, downvotes, net_votes, total_votes) = tx.query_row(
                "SELECT upvotes, downvotes, COALESCE(net_votes, upvotes - downvotes), \
                 COALESCE(total_votes, upvotes + downvotes) FROM memes WHERE id = ?1",
                [meme_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

            tx.commit()?;
            Ok(Some(VoteOutcome {
                upvotes,
                downvotes,
                net_votes,
                total_votes,
                user_vote,
            }))
        })
    }
}
