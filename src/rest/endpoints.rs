use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde_json::{json, Value};

use super::{ApiError, AppState, Traced};
use crate::catalog::ResourceKind;
use crate::extract::ScriptureOptions;
use crate::handlers::health;
use crate::protocol::{AcademyParams, AnnotationParams, LanguagesParams, ScriptureParams, WordParams};
use crate::resolver::OrgSelector;
use crate::trace::SpanCollector;

fn params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Split a comma-separated list parameter.
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(health::report(&state.fetcher, state.started.elapsed()))
}

pub async fn fetch_scripture(
    State(state): State<AppState>,
    query: Result<Query<ScriptureParams>, QueryRejection>,
) -> Traced {
    let trace = SpanCollector::new();
    let body = scripture(&state, query, &trace).await;
    Traced::new(trace, body)
}

async fn scripture(
    state: &AppState,
    query: Result<Query<ScriptureParams>, QueryRejection>,
    trace: &SpanCollector,
) -> Result<Value, ApiError> {
    let p = params(query)?;
    let organizations = OrgSelector::parse(p.organization.as_deref());
    let variants = split_list(p.resource.as_deref());
    let options = ScriptureOptions {
        include_verse_numbers: p.include_verse_numbers.unwrap_or(true),
    };

    let scripture = state
        .fetcher
        .fetch_scripture(&p.reference, &p.language, &organizations, &variants, options, trace)
        .await?;

    Ok(json!({
        "reference": p.reference,
        "language": p.language,
        "scripture": scripture,
    }))
}

pub async fn translation_notes(
    State(state): State<AppState>,
    query: Result<Query<AnnotationParams>, QueryRejection>,
) -> Traced {
    let trace = SpanCollector::new();
    let body = annotations(&state, query, ResourceKind::Notes, "notes", &trace).await;
    Traced::new(trace, body)
}

pub async fn translation_questions(
    State(state): State<AppState>,
    query: Result<Query<AnnotationParams>, QueryRejection>,
) -> Traced {
    let trace = SpanCollector::new();
    let body = annotations(&state, query, ResourceKind::Questions, "questions", &trace).await;
    Traced::new(trace, body)
}

pub async fn translation_word_links(
    State(state): State<AppState>,
    query: Result<Query<AnnotationParams>, QueryRejection>,
) -> Traced {
    let trace = SpanCollector::new();
    let body = annotations(&state, query, ResourceKind::WordLinks, "links", &trace).await;
    Traced::new(trace, body)
}

async fn annotations(
    state: &AppState,
    query: Result<Query<AnnotationParams>, QueryRejection>,
    kind: ResourceKind,
    field: &str,
    trace: &SpanCollector,
) -> Result<Value, ApiError> {
    let p = params(query)?;
    let organizations = OrgSelector::parse(p.organization.as_deref());
    let rows = state
        .fetcher
        .fetch_annotations(
            &p.reference,
            &p.language,
            &organizations,
            kind,
            p.include_intro.unwrap_or(true),
            trace,
        )
        .await?;

    let mut body = json!({
        "reference": p.reference,
        "language": p.language,
    });
    body[field] = json!(rows);
    Ok(body)
}

pub async fn translation_word(
    State(state): State<AppState>,
    query: Result<Query<WordParams>, QueryRejection>,
) -> Traced {
    let trace = SpanCollector::new();
    let body = word(&state, query, &trace).await;
    Traced::new(trace, body)
}

async fn word(
    state: &AppState,
    query: Result<Query<WordParams>, QueryRejection>,
    trace: &SpanCollector,
) -> Result<Value, ApiError> {
    let p = params(query)?;
    let organizations = OrgSelector::parse(p.organization.as_deref());
    let fetcher = &state.fetcher;

    if let Some(identifier) = non_empty(&p.rc_link).or(non_empty(&p.path)) {
        let article = fetcher
            .fetch_markdown(&p.language, &organizations, ResourceKind::Words, Some(identifier), trace)
            .await?;
        return Ok(json!({ "article": article }));
    }

    let words = if let Some(term) = non_empty(&p.term) {
        fetcher
            .fetch_word(term, non_empty(&p.category), &p.language, &organizations, trace)
            .await?
    } else if let Some(reference) = non_empty(&p.reference) {
        fetcher
            .fetch_words_for_reference(reference, &p.language, &organizations, trace)
            .await?
    } else {
        return Err(ApiError::BadRequest(
            "one of term, reference, path or rcLink is required".to_string(),
        ));
    };
    Ok(json!({ "words": words }))
}

pub async fn translation_academy(
    State(state): State<AppState>,
    query: Result<Query<AcademyParams>, QueryRejection>,
) -> Traced {
    let trace = SpanCollector::new();
    let body = academy(&state, query, &trace).await;
    Traced::new(trace, body)
}

async fn academy(
    state: &AppState,
    query: Result<Query<AcademyParams>, QueryRejection>,
    trace: &SpanCollector,
) -> Result<Value, ApiError> {
    let p = params(query)?;
    let organizations = OrgSelector::parse(p.organization.as_deref());
    let identifier = non_empty(&p.rc_link)
        .or(non_empty(&p.path))
        .or(non_empty(&p.module_id));

    let article = state
        .fetcher
        .fetch_markdown(&p.language, &organizations, ResourceKind::Academy, identifier, trace)
        .await?;
    Ok(json!({ "article": article }))
}

pub async fn list_languages(
    State(state): State<AppState>,
    query: Result<Query<LanguagesParams>, QueryRejection>,
) -> Traced {
    let trace = SpanCollector::new();
    let body = languages(&state, query, &trace).await;
    Traced::new(trace, body)
}

async fn languages(
    state: &AppState,
    query: Result<Query<LanguagesParams>, QueryRejection>,
    trace: &SpanCollector,
) -> Result<Value, ApiError> {
    let p = params(query)?;
    let languages = state
        .fetcher
        .list_languages(non_empty(&p.organization), trace)
        .await?;
    Ok(json!({ "languages": languages }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_parameters_split_on_commas() {
        assert_eq!(split_list(Some("ult, ust,,")), vec!["ult", "ust"]);
        assert!(split_list(None).is_empty());
        assert!(split_list(Some(" ")).is_empty());
    }
}
