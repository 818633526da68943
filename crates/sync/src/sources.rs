//! Source record types and chunk composition
//!
//! One variant per source type, one composition rule per variant. Each
//! composition is pure text folding with no retrieval logic: the summary
//! view is what gets matched against, the full view is what generation
//! receives.

use crate::errors::{Result, SyncError};
use serde::{Deserialize, Serialize};
use supportkb_common::db::models::ChunkType;
use uuid::Uuid;

/// A business source record, as handed over by the crawler, the product
/// extractor, the Q&A generator, or manual authoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceRecord {
    Page {
        page_id: Uuid,
        title: String,
        cleaned_text: String,
        url: String,
    },
    Product {
        product_id: Uuid,
        title: String,
        price: f64,
        currency: String,
        brand: Option<String>,
        features: Vec<String>,
        description: String,
    },
    Qa {
        qa_id: Uuid,
        question: String,
        answer: String,
    },
    Note {
        note_id: Uuid,
        title: String,
        body: String,
    },
}

/// Composed text views plus metadata for one source record
#[derive(Debug, Clone)]
pub struct ComposedChunk {
    pub title: String,
    pub summary_text: String,
    pub full_text: String,
    pub metadata: serde_json::Value,
}

impl SourceRecord {
    pub fn chunk_type(&self) -> ChunkType {
        match self {
            SourceRecord::Page { .. } => ChunkType::Page,
            SourceRecord::Product { .. } => ChunkType::Product,
            SourceRecord::Qa { .. } => ChunkType::Faq,
            SourceRecord::Note { .. } => ChunkType::Manual,
        }
    }

    /// Identifier of the owning source record
    pub fn source_id(&self) -> Uuid {
        match self {
            SourceRecord::Page { page_id, .. } => *page_id,
            SourceRecord::Product { product_id, .. } => *product_id,
            SourceRecord::Qa { qa_id, .. } => *qa_id,
            SourceRecord::Note { note_id, .. } => *note_id,
        }
    }

    /// Compose the two text views and the metadata bag
    pub fn compose(&self) -> Result<ComposedChunk> {
        match self {
            SourceRecord::Page {
                title,
                cleaned_text,
                url,
                ..
            } => {
                if cleaned_text.trim().is_empty() {
                    return Err(SyncError::InvalidSource(format!(
                        "page '{}' has no text content",
                        title
                    )));
                }
                Ok(ComposedChunk {
                    title: title.clone(),
                    summary_text: format!("{}\n{}", title, summarize(cleaned_text, 60)),
                    full_text: format!("{}\n\n{}", title, cleaned_text.trim()),
                    metadata: serde_json::json!({ "url": url }),
                })
            }
            SourceRecord::Product {
                title,
                price,
                currency,
                brand,
                features,
                description,
                ..
            } => {
                let price_line = format!("Price: {} {}", format_price(*price), currency);
                let mut parts = vec![title.clone(), price_line];
                if let Some(brand) = brand {
                    parts.push(format!("Brand: {}", brand));
                }
                if !features.is_empty() {
                    parts.push(format!("Features: {}", features.join(", ")));
                }
                let summary_text = parts.join(". ");

                let mut full = parts;
                if !description.trim().is_empty() {
                    full.push(description.trim().to_string());
                }

                Ok(ComposedChunk {
                    title: title.clone(),
                    summary_text,
                    full_text: full.join("\n"),
                    metadata: serde_json::json!({
                        "price": price,
                        "currency": currency,
                        "brand": brand,
                    }),
                })
            }
            SourceRecord::Qa {
                question, answer, ..
            } => {
                if question.trim().is_empty() || answer.trim().is_empty() {
                    return Err(SyncError::InvalidSource(
                        "Q&A pair needs both question and answer".to_string(),
                    ));
                }
                Ok(ComposedChunk {
                    title: question.trim().to_string(),
                    summary_text: question.trim().to_string(),
                    full_text: format!("Q: {}\nA: {}", question.trim(), answer.trim()),
                    metadata: serde_json::json!({}),
                })
            }
            SourceRecord::Note { title, body, .. } => {
                if body.trim().is_empty() {
                    return Err(SyncError::InvalidSource(format!(
                        "note '{}' has an empty body",
                        title
                    )));
                }
                Ok(ComposedChunk {
                    title: title.clone(),
                    summary_text: format!("{}\n{}", title, summarize(body, 60)),
                    full_text: format!("{}\n\n{}", title, body.trim()),
                    metadata: serde_json::json!({}),
                })
            }
        }
    }
}

/// First `max_words` words of a text, used as the summary view for
/// long-form sources.
fn summarize(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a price without a trailing ".0" for whole amounts
fn format_price(price: f64) -> String {
    if price.fract() == 0.0 {
        format!("{}", price as i64)
    } else {
        format!("{:.2}", price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_composition_folds_attributes() {
        let record = SourceRecord::Product {
            product_id: Uuid::new_v4(),
            title: "Nano Press".to_string(),
            price: 8_249_000.0,
            currency: "IDR".to_string(),
            brand: Some("BrewLab".to_string()),
            features: vec!["portable".to_string(), "manual pump".to_string()],
            description: "A compact espresso maker.".to_string(),
        };

        let composed = record.compose().unwrap();
        assert_eq!(composed.title, "Nano Press");
        assert!(composed.summary_text.contains("Price: 8249000 IDR"));
        assert!(composed.summary_text.contains("Brand: BrewLab"));
        assert!(composed.full_text.contains("portable, manual pump"));
        assert!(composed.full_text.contains("compact espresso maker"));
        assert_eq!(composed.metadata["currency"], "IDR");
    }

    #[test]
    fn test_qa_composition() {
        let record = SourceRecord::Qa {
            qa_id: Uuid::new_v4(),
            question: "Do you ship internationally?".to_string(),
            answer: "Yes, to most countries.".to_string(),
        };

        let composed = record.compose().unwrap();
        assert_eq!(composed.summary_text, "Do you ship internationally?");
        assert!(composed.full_text.starts_with("Q: Do you ship"));
        assert!(composed.full_text.contains("A: Yes"));
    }

    #[test]
    fn test_page_summary_is_truncated() {
        let record = SourceRecord::Page {
            page_id: Uuid::new_v4(),
            title: "About us".to_string(),
            cleaned_text: "word ".repeat(500),
            url: "https://example.com/about".to_string(),
        };

        let composed = record.compose().unwrap();
        assert!(composed.summary_text.split_whitespace().count() <= 61);
        assert!(composed.full_text.split_whitespace().count() > 400);
    }

    #[test]
    fn test_empty_page_is_rejected() {
        let record = SourceRecord::Page {
            page_id: Uuid::new_v4(),
            title: "Empty".to_string(),
            cleaned_text: "   ".to_string(),
            url: "https://example.com".to_string(),
        };

        assert!(matches!(
            record.compose(),
            Err(SyncError::InvalidSource(_))
        ));
    }

    #[test]
    fn test_chunk_type_mapping() {
        let note = SourceRecord::Note {
            note_id: Uuid::new_v4(),
            title: "t".to_string(),
            body: "b".to_string(),
        };
        assert_eq!(note.chunk_type(), ChunkType::Manual);
    }

    #[test]
    fn test_fractional_price_keeps_cents() {
        assert_eq!(format_price(19.99), "19.99");
        assert_eq!(format_price(8_249_000.0), "8249000");
    }
}
