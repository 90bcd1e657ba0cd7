// SPDX-License-Identifier: MIT

//! Gemini-backed batch classifier: prompt construction and strict
//! response parsing. Nothing partially typed leaves this module; a
//! response either yields one verdict per input item or the batch fails.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{BatchClassifier, Category, Severity, Verdict, MAX_BATCH_SIZE};
use crate::db::ContentItem;
use crate::error::ClassificationErrorKind;
use crate::gemini::GeminiClient;
use crate::{Result, VetterError};

/// Classifies content batches with Gemini
pub struct GeminiClassifier {
    client: GeminiClient,
    /// Character cap applied to item text in the prompt only
    prompt_text_cap: usize,
}

/// One entry of the model's JSON response, before validation
#[derive(Debug, Deserialize)]
struct RawVerdict {
    /// 1-based position of the item in the submitted batch
    index: usize,
    severity: String,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    reason: String,
}

impl GeminiClassifier {
    pub fn new(client: GeminiClient, prompt_text_cap: usize) -> Self {
        Self {
            client,
            prompt_text_cap,
        }
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Build the audit prompt for one batch. Items are numbered by
    /// position so the response correlates back regardless of ids.
    fn build_prompt(&self, items: &[ContentItem]) -> String {
        let kind = items[0].collection.as_str();

        let mut listing = String::new();
        for (i, item) in items.iter().enumerate() {
            let text: String = item.text.chars().take(self.prompt_text_cap).collect();
            listing.push_str(&format!("{}: {}\n", i + 1, text));
        }

        format!(
            "You are auditing a social-media profile to identify content that might be \
inappropriate for a professional/public profile (job hunting, etc.).\n\
\n\
Analyze each numbered {kind} below for:\n\
1. POLITICAL - Political opinions, endorsements, or partisan content\n\
2. CONTROVERSIAL - Religion, divisive social issues, heated debates\n\
3. NSFW - Adult/sexual content, suggestive material, or references\n\
4. PROFANITY - Vulgar language, swearing\n\
5. PERSONAL - Oversharing personal information\n\
6. UNPROFESSIONAL - Unprofessional tone, rants, complaints\n\
7. OFFENSIVE - Potentially offensive jokes, sarcasm that could be misunderstood\n\
\n\
Respond with a JSON array containing exactly one object per numbered item, in order:\n\
{{\"index\": <number>, \"severity\": \"high|medium|low|none\", \
\"categories\": [\"category\", ...], \"reason\": \"brief explanation\"}}\n\
\n\
Use severity \"none\" with an empty categories array for items with no issues. \
Only flag items that are genuinely concerning. Be practical - mild opinions are OK, \
but strong political statements or controversial topics should be flagged.\n\
\n\
Items to analyze:\n{listing}"
        )
    }

    /// Parse the model's response into exactly one verdict per input
    /// item, in input order. Any deviation fails the whole batch.
    fn parse_response(&self, response: &str, items: &[ContentItem]) -> Result<Vec<Verdict>> {
        let json_text = extract_json(response);

        let raw: Vec<RawVerdict> = serde_json::from_str(json_text.trim()).map_err(|e| {
            VetterError::classification(
                ClassificationErrorKind::Malformed,
                format!("Response is not a verdict array: {}", e),
            )
        })?;

        if raw.len() != items.len() {
            return Err(VetterError::classification(
                ClassificationErrorKind::Malformed,
                format!("Expected {} verdicts, got {}", items.len(), raw.len()),
            ));
        }

        let mut slots: Vec<Option<RawVerdict>> = (0..items.len()).map(|_| None).collect();
        for entry in raw {
            if entry.index == 0 || entry.index > items.len() {
                return Err(VetterError::classification(
                    ClassificationErrorKind::Malformed,
                    format!("Verdict index {} out of range", entry.index),
                ));
            }
            let slot = &mut slots[entry.index - 1];
            if slot.is_some() {
                return Err(VetterError::classification(
                    ClassificationErrorKind::Malformed,
                    format!("Duplicate verdict for index {}", entry.index),
                ));
            }
            *slot = Some(entry);
        }

        let mut verdicts = Vec::with_capacity(items.len());
        for (item, slot) in items.iter().zip(slots) {
            // Every slot is filled: counts matched and no index was duplicated
            let entry = slot.expect("verdict slot filled");

            let severity: Severity = entry.severity.parse()?;
            let categories = entry
                .categories
                .iter()
                .map(|c| c.parse::<Category>())
                .collect::<Result<Vec<_>>>()?;

            if severity == Severity::None && !categories.is_empty() {
                return Err(VetterError::classification(
                    ClassificationErrorKind::Malformed,
                    format!("Item {} has severity none with categories", item.id),
                ));
            }

            verdicts.push(Verdict {
                item_id: item.id.clone(),
                collection: item.collection,
                severity,
                categories,
                reason: entry.reason,
                text_snapshot: item.text.clone(),
                created_at: item.created_at,
            });
        }

        Ok(verdicts)
    }
}

#[async_trait]
impl BatchClassifier for GeminiClassifier {
    async fn classify_batch(&self, items: &[ContentItem]) -> Result<Vec<Verdict>> {
        assert!(
            !items.is_empty() && items.len() <= MAX_BATCH_SIZE,
            "batch size out of bounds"
        );

        let prompt = self.build_prompt(items);
        debug!(
            "Classifying batch of {} {} items",
            items.len(),
            items[0].collection
        );

        let response = self.client.generate(&prompt).await?;
        self.parse_response(&response, items)
    }
}

/// Strip markdown code fences the model sometimes wraps JSON in
fn extract_json(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        return rest.split("```").next().unwrap_or(rest);
    }
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        return rest.split("```").next().unwrap_or(rest);
    }
    text
}
