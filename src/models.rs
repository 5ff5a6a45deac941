//! Data model for the research agent: reference game records, per-query
//! retrieval evidence, the reasoner's verdicts, and the persisted
//! conversation log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A video game entry from the local knowledge base.
///
/// The on-disk JSON files use capitalized field names (the format the game
/// dataset ships in), so every field carries an alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Platform")]
    pub platform: String,
    #[serde(alias = "Genre")]
    pub genre: String,
    #[serde(alias = "Publisher")]
    pub publisher: String,
    #[serde(alias = "Description")]
    pub description: String,
    #[serde(alias = "YearOfRelease")]
    pub year_of_release: i32,
}

impl GameRecord {
    /// Flatten the record into one text blob for embedding and for prompt
    /// context.
    pub fn searchable_content(&self) -> String {
        format!(
            "{} ({}, {}). Genre: {}. Publisher: {}. {}",
            self.name,
            self.platform,
            self.year_of_release,
            self.genre,
            self.publisher,
            self.description
        )
    }
}

/// One local retrieval candidate with its relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordHit {
    pub record: GameRecord,
    pub score: f32,
}

/// One web search snippet with its source URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebHit {
    pub title: String,
    pub url: String,
    pub content: String,
    pub score: f32,
}

/// The reasoner's judgment of whether local evidence suffices.
///
/// Field names on the wire follow the judge prompt contract (`useful`,
/// `description`); the aliases let the verdict deserialize straight from
/// the model's JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationVerdict {
    #[serde(alias = "useful")]
    pub sufficient: bool,
    pub confidence: f32,
    #[serde(alias = "description", default)]
    pub rationale: String,
}

impl EvaluationVerdict {
    /// Verdict used when the store returned nothing or the judge was
    /// unreachable: forces the web fallback without a reasoner round trip.
    pub fn insufficient(rationale: impl Into<String>) -> Self {
        Self {
            sufficient: false,
            confidence: 0.0,
            rationale: rationale.into(),
        }
    }
}

/// Structured output of the reasoner's compose step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Composition {
    pub answer: String,
    pub confidence: f32,
    #[serde(default)]
    pub citations: Vec<String>,
}

/// Which evidence source(s) contributed to an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMethod {
    VectorDb,
    WebSearch,
    Combined,
}

impl RetrievalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMethod::VectorDb => "vector_db",
            RetrievalMethod::WebSearch => "web_search",
            RetrievalMethod::Combined => "combined",
        }
    }
}

/// The agent's final answer for one query. Immutable once constructed.
/// The clock reading lives on the [`ConversationTurn`] that records it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub answer: String,
    pub confidence: f32,
    pub sources: Vec<String>,
    pub retrieval_method: RetrievalMethod,
}

/// One completed query/answer exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub query: String,
    pub response: AgentResponse,
    pub timestamp: DateTime<Utc>,
}

/// Append-only conversation log plus derived counters, flushed to disk
/// after every turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub session_id: String,
    pub turns: Vec<ConversationTurn>,
    pub turn_count: u64,
    pub last_method: Option<RetrievalMethod>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            turns: Vec::new(),
            turn_count: 0,
            last_method: None,
        }
    }

    /// Append one completed turn and update the derived counters.
    pub fn record_turn(&mut self, query: String, response: AgentResponse) {
        self.turn_count += 1;
        self.last_method = Some(response.retrieval_method);
        self.turns.push(ConversationTurn {
            query,
            response,
            timestamp: Utc::now(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop the in-memory history but keep the session identity.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.turn_count = 0;
        self.last_method = None;
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_record_accepts_dataset_field_names() {
        let json = r#"{
            "Name": "Gran Turismo",
            "Platform": "PlayStation 1",
            "Genre": "Racing",
            "Publisher": "Sony Computer Entertainment",
            "Description": "A realistic racing simulator.",
            "YearOfRelease": 1997
        }"#;
        let game: GameRecord = serde_json::from_str(json).unwrap();
        assert_eq!(game.name, "Gran Turismo");
        assert_eq!(game.year_of_release, 1997);
        assert!(game.searchable_content().contains("Racing"));
    }

    #[test]
    fn verdict_accepts_judge_field_names() {
        let json = r#"{"useful": true, "confidence": 0.9, "description": "covers the question"}"#;
        let verdict: EvaluationVerdict = serde_json::from_str(json).unwrap();
        assert!(verdict.sufficient);
        assert_eq!(verdict.rationale, "covers the question");
    }

    #[test]
    fn record_turn_updates_counters() {
        let mut state = ConversationState::new();
        assert!(state.is_empty());

        let response = AgentResponse {
            answer: "1999".to_string(),
            confidence: 0.9,
            sources: vec!["local".to_string()],
            retrieval_method: RetrievalMethod::VectorDb,
        };
        state.record_turn("when".to_string(), response);

        assert_eq!(state.turn_count, 1);
        assert_eq!(state.turns.len(), 1);
        assert_eq!(state.last_method, Some(RetrievalMethod::VectorDb));
        // the timestamp is stamped onto the turn, not the response
        assert!(state.turns[0].timestamp <= Utc::now());

        state.clear();
        assert!(state.is_empty());
        assert_eq!(state.turn_count, 0);
        assert_eq!(state.last_method, None);
    }

    #[test]
    fn retrieval_method_serializes_snake_case() {
        let s = serde_json::to_string(&RetrievalMethod::WebSearch).unwrap();
        assert_eq!(s, "\"web_search\"");
    }
}
