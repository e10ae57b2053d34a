// src/authors.rs
//! # Author Registry
//! Reconciles author metadata carried by questions against stored author records.
//!
//! Invariant: `question_count` equals the number of stored questions attributed to
//! the author. The registry only keeps it if every committed question is counted
//! exactly once, so the store tells it whether a question is new
//! ([`Attribution::NewQuestion`]) or a rewrite of one already counted
//! ([`Attribution::Existing`]).
//!
//! Read-modify-write on an author runs under one async mutex, so two records by the
//! same author can never race on the increment.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::PersistenceError;
use crate::model::{Author, AuthorOutcome, Question, UNKNOWN_AUTHOR};
use crate::store::{AuthorFilter, Collection};

/// Author metadata as seen on one question.
#[derive(Debug, Clone, Copy)]
pub struct AuthorSighting<'a> {
    pub author_name: &'a str,
    pub profile_url: &'a str,
    pub reputation: u64,
    pub publication_date: DateTime<Utc>,
}

impl<'a> AuthorSighting<'a> {
    pub fn from_question(q: &'a Question) -> Self {
        Self {
            author_name: &q.author_name,
            profile_url: &q.author_profile_url,
            reputation: q.author_reputation,
            publication_date: q.publication_date,
        }
    }
}

/// Whether the question behind a sighting is already counted for this author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribution {
    NewQuestion,
    Existing,
}

pub struct AuthorRegistry {
    authors: Arc<dyn Collection<Author>>,
    write_lock: Mutex<()>,
}

impl AuthorRegistry {
    pub fn new(authors: Arc<dyn Collection<Author>>) -> Self {
        Self {
            authors,
            write_lock: Mutex::new(()),
        }
    }

    /// Reconcile a sighting for a newly stored question.
    pub async fn reconcile(&self, sighting: &AuthorSighting<'_>) -> Result<AuthorOutcome, PersistenceError> {
        self.reconcile_with(sighting, Attribution::NewQuestion).await
    }

    /// Reconcile a sighting; `question_count` grows only for [`Attribution::NewQuestion`].
    pub async fn reconcile_with(
        &self,
        sighting: &AuthorSighting<'_>,
        attribution: Attribution,
    ) -> Result<AuthorOutcome, PersistenceError> {
        let name = sighting.author_name;
        if name.trim().is_empty() || name == UNKNOWN_AUTHOR {
            return Ok(AuthorOutcome::Skipped);
        }

        let _guard = self.write_lock.lock().await;
        let key = name.to_string();

        let Some(mut author) = self.authors.get(&key).await? else {
            if attribution == Attribution::Existing {
                warn!(target: "authors", author = name, "existing question had no author record; recreating");
            }
            let author = Author {
                author_name: key.clone(),
                profile_url: sighting.profile_url.to_string(),
                reputation: sighting.reputation,
                question_count: 1,
                first_seen: sighting.publication_date,
                last_seen: sighting.publication_date,
            };
            self.authors.upsert(key, author).await?;
            debug!(target: "authors", author = name, "new author");
            return Ok(AuthorOutcome::New);
        };

        if attribution == Attribution::NewQuestion {
            author.question_count += 1;
        }
        author.first_seen = author.first_seen.min(sighting.publication_date);
        author.last_seen = author.last_seen.max(sighting.publication_date);
        if !sighting.profile_url.is_empty() {
            author.profile_url = sighting.profile_url.to_string();
        }

        let outcome = if author.reputation != sighting.reputation {
            debug!(
                target: "authors",
                author = name,
                from = author.reputation,
                to = sighting.reputation,
                "reputation changed"
            );
            author.reputation = sighting.reputation;
            AuthorOutcome::Updated
        } else {
            AuthorOutcome::Unchanged
        };

        self.authors.upsert(key, author).await?;
        Ok(outcome)
    }

    /// Drop one question from an author's count (the question moved to another
    /// author, or its write was rolled back).
    pub async fn release(&self, author_name: &str) -> Result<(), PersistenceError> {
        self.adjust_count(author_name, |n| n.saturating_sub(1)).await
    }

    /// Give back a question taken by [`release`](Self::release) when the move did not happen.
    pub async fn restore(&self, author_name: &str) -> Result<(), PersistenceError> {
        self.adjust_count(author_name, |n| n + 1).await
    }

    async fn adjust_count(&self, author_name: &str, f: impl FnOnce(u64) -> u64) -> Result<(), PersistenceError> {
        if author_name == UNKNOWN_AUTHOR {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let key = author_name.to_string();
        if let Some(mut author) = self.authors.get(&key).await? {
            author.question_count = f(author.question_count);
            self.authors.upsert(key, author).await?;
        }
        Ok(())
    }

    pub async fn get(&self, author_name: &str) -> Result<Option<Author>, PersistenceError> {
        self.authors.get(&author_name.to_string()).await
    }

    /// Stored records for `names`, most questions first.
    pub async fn find(&self, names: &BTreeSet<String>) -> Result<Vec<Author>, PersistenceError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        self.authors.find(&AuthorFilter::Names(names.clone())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCollection;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, 12, 0, 0).unwrap()
    }

    fn sighting(name: &str, rep: u64, d: u32) -> AuthorSighting<'_> {
        AuthorSighting {
            author_name: name,
            profile_url: "",
            reputation: rep,
            publication_date: day(d),
        }
    }

    fn registry() -> (Arc<MemoryCollection<Author>>, AuthorRegistry) {
        let coll = Arc::new(MemoryCollection::new());
        (coll.clone(), AuthorRegistry::new(coll))
    }

    #[tokio::test]
    async fn first_sighting_creates_author() {
        let (_c, reg) = registry();
        let out = reg.reconcile(&sighting("ana", 10, 6)).await.unwrap();
        assert_eq!(out, AuthorOutcome::New);
        let a = reg.get("ana").await.unwrap().unwrap();
        assert_eq!(a.question_count, 1);
        assert_eq!(a.first_seen, day(6));
        assert_eq!(a.last_seen, day(6));
    }

    #[tokio::test]
    async fn later_sightings_widen_window_and_track_reputation() {
        let (_c, reg) = registry();
        reg.reconcile(&sighting("ana", 10, 6)).await.unwrap();
        assert_eq!(reg.reconcile(&sighting("ana", 10, 3)).await.unwrap(), AuthorOutcome::Unchanged);
        assert_eq!(reg.reconcile(&sighting("ana", 15, 9)).await.unwrap(), AuthorOutcome::Updated);

        let a = reg.get("ana").await.unwrap().unwrap();
        assert_eq!(a.question_count, 3);
        assert_eq!(a.first_seen, day(3));
        assert_eq!(a.last_seen, day(9));
        assert_eq!(a.reputation, 15);
    }

    #[tokio::test]
    async fn existing_attribution_does_not_count_again() {
        let (_c, reg) = registry();
        reg.reconcile(&sighting("ana", 10, 6)).await.unwrap();
        let out = reg
            .reconcile_with(&sighting("ana", 11, 6), Attribution::Existing)
            .await
            .unwrap();
        assert_eq!(out, AuthorOutcome::Updated);
        assert_eq!(reg.get("ana").await.unwrap().unwrap().question_count, 1);
    }

    #[tokio::test]
    async fn unknown_author_is_skipped() {
        let (c, reg) = registry();
        let out = reg.reconcile(&sighting(UNKNOWN_AUTHOR, 0, 1)).await.unwrap();
        assert_eq!(out, AuthorOutcome::Skipped);
        assert!(c.is_empty());
    }

    #[tokio::test]
    async fn concurrent_reconciles_keep_count_exact() {
        let (_c, reg) = registry();
        let reg = Arc::new(reg);
        let mut handles = Vec::new();
        for i in 0..16u32 {
            let reg = reg.clone();
            handles.push(tokio::spawn(async move {
                reg.reconcile(&sighting("bo", 1, 1 + i % 20)).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(reg.get("bo").await.unwrap().unwrap().question_count, 16);
    }

    #[tokio::test]
    async fn release_decrements_without_underflow() {
        let (_c, reg) = registry();
        reg.reconcile(&sighting("ana", 1, 1)).await.unwrap();
        reg.release("ana").await.unwrap();
        reg.release("ana").await.unwrap();
        assert_eq!(reg.get("ana").await.unwrap().unwrap().question_count, 0);
    }

    #[tokio::test]
    async fn restore_undoes_release() {
        let (_c, reg) = registry();
        reg.reconcile(&sighting("ana", 1, 1)).await.unwrap();
        reg.reconcile(&sighting("ana", 1, 2)).await.unwrap();
        reg.release("ana").await.unwrap();
        reg.restore("ana").await.unwrap();
        reg.restore(UNKNOWN_AUTHOR).await.unwrap();
        assert_eq!(reg.get("ana").await.unwrap().unwrap().question_count, 2);
    }
}
