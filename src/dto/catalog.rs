use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::session::QuestionSummary,
    state::session::{Question, QuestionId},
};

/// Identifier as found in exported sheets: text, an integer or a float such as `3.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionIdInput {
    Text(String),
    Number(i64),
    Float(f64),
}

impl QuestionIdInput {
    fn normalized(self) -> Option<String> {
        match self {
            QuestionIdInput::Text(text) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            QuestionIdInput::Number(number) => Some(number.to_string()),
            QuestionIdInput::Float(number) if !number.is_finite() => None,
            QuestionIdInput::Float(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
                Some(format!("{number:.0}"))
            }
            QuestionIdInput::Float(number) => Some(number.to_string()),
        }
    }
}

/// One catalog row supplied by the presenter.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    /// String or number; a random identifier is assigned when absent.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub id: Option<QuestionIdInput>,
    #[validate(length(min = 1, max = 200))]
    pub term: String,
    #[serde(default)]
    pub book: String,
    /// Also accepted as `category`, the key older exports use.
    #[serde(default, alias = "category")]
    pub chapter_category: String,
    #[serde(default)]
    pub keywords: String,
}

impl From<QuestionInput> for Question {
    fn from(input: QuestionInput) -> Self {
        let id = input
            .id
            .and_then(QuestionIdInput::normalized)
            .map(QuestionId::new)
            .unwrap_or_else(QuestionId::random);
        Self {
            id,
            term: input.term.trim().to_string(),
            book: input.book.trim().to_string(),
            chapter_category: input.chapter_category.trim().to_string(),
            keywords: input.keywords.trim().to_string(),
        }
    }
}

/// Full replacement of the question catalog.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CatalogImportRequest {
    #[validate(length(min = 1), nested)]
    pub questions: Vec<QuestionInput>,
}

/// Outcome of a catalog import.
#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogImportResponse {
    /// Number of questions now in the catalog.
    pub imported: usize,
}

/// Catalog listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogResponse {
    pub questions: Vec<QuestionSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_missing_ids_are_normalised() {
        let request: CatalogImportRequest = serde_json::from_str(
            r#"{ "questions": [
                { "id": 12, "term": "鄭成功", "book": "台灣史" },
                { "id": " a-7 ", "term": "甲午戰爭" },
                { "term": " 馬關條約 ", "chapterCategory": "東亞史" }
            ] }"#,
        )
        .unwrap();
        assert!(request.validate().is_ok());

        let questions: Vec<Question> = request.questions.into_iter().map(Into::into).collect();
        assert_eq!(questions[0].id.as_str(), "12");
        assert_eq!(questions[1].id.as_str(), "a-7");
        assert!(!questions[2].id.as_str().is_empty());
        assert_eq!(questions[2].term, "馬關條約");
        assert_eq!(questions[2].chapter_category, "東亞史");
    }

    #[test]
    fn float_ids_from_spreadsheets_are_accepted() {
        let request: CatalogImportRequest = serde_json::from_str(
            r#"{ "questions": [
                { "id": 0.5372, "term": "鄭成功", "book": "台灣史" },
                { "id": 3.0, "term": "牡丹社事件", "book": "台灣史" }
            ] }"#,
        )
        .unwrap();
        assert!(request.validate().is_ok());

        let questions: Vec<Question> = request.questions.into_iter().map(Into::into).collect();
        assert_eq!(questions[0].id.as_str(), "0.5372");
        assert_eq!(questions[1].id.as_str(), "3");
    }

    #[test]
    fn legacy_category_key_fills_the_chapter() {
        let request: CatalogImportRequest = serde_json::from_str(
            r#"{ "questions": [ { "id": 1, "term": "甲午戰爭", "category": "東亞史" } ] }"#,
        )
        .unwrap();
        let question = Question::from(request.questions[0].clone());
        assert_eq!(question.chapter_category, "東亞史");
    }

    #[test]
    fn empty_import_and_blank_terms_fail_validation() {
        let empty: CatalogImportRequest = serde_json::from_str(r#"{ "questions": [] }"#).unwrap();
        assert!(empty.validate().is_err());

        let blank: CatalogImportRequest =
            serde_json::from_str(r#"{ "questions": [ { "term": "" } ] }"#).unwrap();
        assert!(blank.validate().is_err());
    }
}
