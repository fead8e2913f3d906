//! Tool registry: names, descriptions, input schemas and the REST endpoint
//! each tool is served by.

use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// REST endpoint answering this tool; `None` for tools handled inline.
    pub path: Option<&'static str>,
}

pub const TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "fetch_scripture",
        description: "Fetch Bible text for a reference from one or more translations",
        path: Some("/api/fetch-scripture"),
    },
    ToolSpec {
        name: "fetch_translation_notes",
        description: "Fetch translation notes for a reference, including introductions",
        path: Some("/api/translation-notes"),
    },
    ToolSpec {
        name: "fetch_translation_questions",
        description: "Fetch comprehension questions for a reference",
        path: Some("/api/translation-questions"),
    },
    ToolSpec {
        name: "fetch_translation_word_links",
        description: "Fetch links from a reference's words to dictionary articles",
        path: Some("/api/fetch-translation-word-links"),
    },
    ToolSpec {
        name: "fetch_translation_word",
        description: "Fetch dictionary articles by term, path, RC link, or for every word linked from a reference",
        path: Some("/api/fetch-translation-word"),
    },
    ToolSpec {
        name: "fetch_translation_academy",
        description: "Fetch a translation training module by id, path or RC link; without one, the table of contents",
        path: Some("/api/fetch-translation-academy"),
    },
    ToolSpec {
        name: "list_languages",
        description: "List languages the content catalog publishes resources in",
        path: Some("/api/list-languages"),
    },
    ToolSpec {
        name: "health",
        description: "Report server status and archive cache usage",
        path: None,
    },
];

pub fn find(name: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|tool| tool.name == name)
}

fn string(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn boolean(description: &str) -> Value {
    json!({ "type": "boolean", "description": description })
}

fn string_or_list(description: &str) -> Value {
    json!({
        "description": description,
        "anyOf": [
            { "type": "string" },
            { "type": "array", "items": { "type": "string" } }
        ]
    })
}

fn language() -> Value {
    json!({
        "type": "string",
        "description": "Language code, e.g. en or es-419",
        "default": "en"
    })
}

fn organization() -> Value {
    string_or_list("Publishing organization, a comma-separated list, or a list; omitted means all")
}

impl ToolSpec {
    pub fn input_schema(&self) -> Value {
        match self.name {
            "fetch_scripture" => json!({
                "type": "object",
                "required": ["reference"],
                "properties": {
                    "reference": string("Bible reference, e.g. John 3:16 or Genesis 1:1-3"),
                    "language": language(),
                    "organization": organization(),
                    "resource": string_or_list("Translation variants, e.g. ult or [ult, ust]"),
                    "includeVerseNumbers": boolean("Prefix each verse with its number (default true)")
                }
            }),
            "fetch_translation_notes"
            | "fetch_translation_questions"
            | "fetch_translation_word_links" => json!({
                "type": "object",
                "required": ["reference"],
                "properties": {
                    "reference": string("Bible reference, e.g. Titus 1:1"),
                    "language": language(),
                    "organization": organization(),
                    "includeIntro": boolean("Include book and chapter introductions (default true)")
                }
            }),
            "fetch_translation_word" => json!({
                "type": "object",
                "anyOf": [
                    { "required": ["term"] },
                    { "required": ["reference"] },
                    { "required": ["path"] },
                    { "required": ["rcLink"] }
                ],
                "properties": {
                    "term": string("Dictionary term, e.g. god"),
                    "category": {
                        "type": "string",
                        "enum": ["kt", "names", "other"],
                        "description": "Limit the term search to one category"
                    },
                    "reference": string("Return every article linked from this reference"),
                    "path": string("Article path, e.g. bible/kt/god.md"),
                    "rcLink": string("RC link, e.g. rc://*/tw/dict/bible/kt/god"),
                    "language": language(),
                    "organization": organization()
                }
            }),
            "fetch_translation_academy" => json!({
                "type": "object",
                "properties": {
                    "moduleId": string("Module id, e.g. figs-metaphor"),
                    "path": string("Module path, e.g. translate/figs-metaphor"),
                    "rcLink": string("RC link, e.g. rc://*/ta/man/translate/figs-metaphor"),
                    "language": language(),
                    "organization": organization()
                }
            }),
            "list_languages" => json!({
                "type": "object",
                "properties": {
                    "organization": string("Only languages published by this organization")
                }
            }),
            _ => json!({
                "type": "object",
                "properties": {}
            }),
        }
    }
}

/// The `tools/list` payload.
pub fn list() -> Value {
    let tools: Vec<Value> = TOOLS
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": tool.input_schema(),
            })
        })
        .collect();
    json!({ "tools": tools })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::validate_value;

    #[test]
    fn every_tool_has_an_object_schema() {
        for tool in TOOLS {
            assert_eq!(tool.input_schema()["type"], "object", "{}", tool.name);
        }
        assert!(find("fetch_scripture").is_some());
        assert!(find("fetch_everything").is_none());
    }

    #[test]
    fn schemas_accept_lists_and_reject_wrong_types() {
        let scripture = find("fetch_scripture").unwrap().input_schema();
        assert!(validate_value(
            &scripture,
            &json!({ "reference": "John 3:16", "organization": ["A", "B"], "resource": "ult,ust" })
        )
        .is_ok());
        assert!(validate_value(&scripture, &json!({ "reference": 316 })).is_err());
        assert!(validate_value(&scripture, &json!({ "language": "en" })).is_err());

        let word = find("fetch_translation_word").unwrap().input_schema();
        assert!(validate_value(&word, &json!({ "term": "god" })).is_ok());
        assert!(validate_value(&word, &json!({ "category": "kt" })).is_err());
        assert!(validate_value(&word, &json!({ "term": "god", "category": "misc" })).is_err());
    }
}
