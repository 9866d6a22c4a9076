//! Companion suggestion pipeline
//!
//! On every profile create or update, recompute the user's suggestion set:
//! fetch candidates sharing the grief type, score them, keep positive scores
//! in descending order and overwrite `users/{userId}/suggestions/companions`.
//!
//! Idempotent: the output depends only on the current profiles, and the set
//! is replaced wholesale, so redelivery rewrites the same result.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::db::schemas::{
    ProfileDoc, SuggestionEntry, SuggestionSetDoc, COMPANION_SUGGESTIONS_ID, PROFILE_COLLECTION,
    SUGGESTION_SUB_COLLECTION, USER_COLLECTION,
};
use crate::db::{DocPath, DocumentStore, Query};
use crate::events::{ChangeKind, EventContext, EventHandler, HandlerOutcome};
use crate::matching::scorer::{compatibility_score, is_eligible};
use crate::types::{HearthError, Result};

/// Limits applied by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingConfig {
    /// Candidates fetched per recompute, not counting the user's own profile
    pub candidate_limit: usize,
    /// Suggestions kept after ranking
    pub max_suggestions: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 10,
            max_suggestions: 5,
        }
    }
}

/// Path of a user's companion suggestion set
pub fn suggestions_path(user_id: &str) -> DocPath {
    DocPath::new(USER_COLLECTION, user_id).child(SUGGESTION_SUB_COLLECTION, COMPANION_SUGGESTIONS_ID)
}

pub struct SuggestionPipeline {
    store: Arc<dyn DocumentStore>,
    config: MatchingConfig,
}

impl SuggestionPipeline {
    pub fn new(store: Arc<dyn DocumentStore>, config: MatchingConfig) -> Self {
        Self { store, config }
    }

    /// Rank candidates for one user
    ///
    /// Returns every positive-scoring candidate, best first, before the
    /// suggestion cap is applied. Ties keep candidate order.
    pub async fn rank_candidates(
        &self,
        user_id: &str,
        profile: &ProfileDoc,
    ) -> Result<Vec<SuggestionEntry>> {
        let Some(grief_type) = profile.grief_type.as_deref().filter(|t| !t.is_empty()) else {
            return Ok(Vec::new());
        };

        // One extra so the user's own profile doesn't take a candidate slot
        let query = Query::new()
            .where_eq("griefType", json!(grief_type))
            .where_eq("allowMatching", json!(true))
            .limit(self.config.candidate_limit + 1);
        let docs = self.store.query(PROFILE_COLLECTION, &query).await?;

        let mut ranked = Vec::new();
        for doc in docs.iter().filter(|d| d.id() != user_id).take(self.config.candidate_limit) {
            let candidate: ProfileDoc = match doc.decode() {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!(candidate = doc.id(), "Skipping unreadable profile: {}", e);
                    continue;
                }
            };

            if !is_eligible(user_id, doc.id(), &candidate) {
                continue;
            }

            let score = compatibility_score(profile, &candidate);
            if score == 0 {
                continue;
            }

            ranked.push(SuggestionEntry {
                user_id: doc.id().to_string(),
                display_name: candidate.display_name,
                grief_stage: candidate.grief_stage,
                grief_type: candidate.grief_type,
                bio: candidate.bio,
                profile_image_url: candidate.profile_image_url,
                compatibility_score: score,
            });
        }

        // Stable sort keeps candidate order for equal scores
        ranked.sort_by(|a, b| b.compatibility_score.cmp(&a.compatibility_score));
        Ok(ranked)
    }

    /// Recompute and overwrite a user's suggestion set
    pub async fn recompute(&self, user_id: &str, profile: &ProfileDoc) -> Result<SuggestionSetDoc> {
        let mut suggestions = self.rank_candidates(user_id, profile).await?;
        info!(
            "Generated {} companion suggestions for user {}",
            suggestions.len(),
            user_id
        );
        suggestions.truncate(self.config.max_suggestions);

        let set = SuggestionSetDoc {
            suggestions,
            last_updated: Utc::now().timestamp_millis(),
        };
        let data = serde_json::to_value(&set)?;
        self.store.set(&suggestions_path(user_id), data).await?;
        Ok(set)
    }
}

#[async_trait]
impl EventHandler for SuggestionPipeline {
    fn name(&self) -> &'static str {
        "suggest_companions"
    }

    async fn handle(&self, ctx: &EventContext) -> Result<HandlerOutcome> {
        let after = match (ctx.kind, &ctx.after) {
            (ChangeKind::Delete, _) | (_, None) => {
                return Ok(HandlerOutcome::skipped("profile deleted"))
            }
            (_, Some(after)) => after,
        };

        let user_id = ctx.params.require("userId")?;
        let profile: ProfileDoc = serde_json::from_value(after.clone())
            .map_err(|e| HearthError::InvalidDocument(format!("{}: {}", ctx.path, e)))?;

        self.recompute(user_id, &profile).await?;
        Ok(HandlerOutcome::Applied)
    }
}
