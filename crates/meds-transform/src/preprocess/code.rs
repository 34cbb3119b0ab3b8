//! Code transforms: deterministic rewrites of the `code` column.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use meds_common::{format_float, parse_f64, parse_i64};
use meds_ingest::read_lookup_table;
use meds_model::{EventTable, MedsError, Result};

use crate::matching::CodeMatcher;

const HIERARCHY_SEPARATOR: &str = "//";
const ICD_PREFIX: &str = "DIAGNOSIS//ICD//";

/// Keeps the first two `//` segments: `MEDICAL//A//1` becomes `MEDICAL//A`.
pub fn truncate_code(code: &str) -> String {
    let mut parts = code.splitn(3, HIERARCHY_SEPARATOR);
    match (parts.next(), parts.next()) {
        (Some(first), Some(second)) => format!("{first}{HIERARCHY_SEPARATOR}{second}"),
        _ => code.to_string(),
    }
}

/// Extracts the lookup id from a structured code.
///
/// ICD diagnoses (`DIAGNOSIS//ICD//10//E7800`) carry the id in the fourth
/// segment, everything else (`LAB//51237//mg/dL`) in the second. Codes that
/// do not fit either shape are returned whole.
pub fn extract_code_id(code: &str) -> &str {
    let parts: Vec<&str> = code.split(HIERARCHY_SEPARATOR).collect();
    if parts.len() < 2 {
        return code;
    }
    if code.starts_with(ICD_PREFIX) {
        return if parts.len() >= 4 { parts[3] } else { code };
    }
    parts[1]
}

/// How lookup keys and extracted ids are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    #[default]
    String,
    Int,
    Float,
}

impl KeyType {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "string" | "str" | "utf8" => Ok(Self::String),
            "int" | "int64" | "integer" => Ok(Self::Int),
            "float" | "float64" => Ok(Self::Float),
            other => Err(MedsError::config(format!("unsupported key_type '{other}'"))),
        }
    }

    /// Canonical key text, `None` when the value does not parse as this type.
    pub fn normalize(self, value: &str) -> Option<String> {
        match self {
            Self::String => Some(value.trim().to_string()),
            Self::Int => parse_i64(value).map(|v| v.to_string()),
            Self::Float => parse_f64(value).map(format_float),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A `{column}` placeholder template; `{{` and `}}` escape braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        name.push(inner);
                    }
                    if !closed || name.trim().is_empty() {
                        return Err(MedsError::config(format!(
                            "malformed placeholder in template '{source}'"
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(name.trim().to_string()));
                }
                '}' => {
                    return Err(MedsError::config(format!(
                        "unmatched '}}' in template '{source}'"
                    )));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, row: &BTreeMap<String, String>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => {
                    if let Some(value) = row.get(name) {
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Replaces matched codes with a rendered description from a lookup CSV.
#[derive(Debug, Clone)]
pub struct CodeEnrichment {
    matcher: CodeMatcher,
    lookup_file: PathBuf,
    template: Template,
    code_column: String,
    key_type: KeyType,
    additional_filters: BTreeMap<String, String>,
    cache: Option<HashMap<String, String>>,
}

impl CodeEnrichment {
    pub fn new(
        matcher: CodeMatcher,
        lookup_file: impl Into<PathBuf>,
        template: Template,
        code_column: impl Into<String>,
        key_type: KeyType,
        additional_filters: BTreeMap<String, String>,
    ) -> Self {
        Self {
            matcher,
            lookup_file: lookup_file.into(),
            template,
            code_column: code_column.into(),
            key_type,
            additional_filters,
            cache: None,
        }
    }

    pub fn lookup_file(&self) -> &std::path::Path {
        &self.lookup_file
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.is_some()
    }

    /// Loads the lookup table and renders every row into the cache.
    ///
    /// The first row for a key wins.
    pub fn load(&mut self) -> Result<()> {
        let table = read_lookup_table(&self.lookup_file)?;
        table.require_column(&self.code_column)?;
        for field in self.template.fields() {
            if !table.has_column(field) {
                return Err(MedsError::config(format!(
                    "template '{}' references column '{field}' which is not in {}; available columns: {}",
                    self.template.as_str(),
                    self.lookup_file.display(),
                    table.headers.join(", ")
                )));
            }
        }
        for column in self.additional_filters.keys() {
            table.require_column(column)?;
        }

        let mut cache = HashMap::new();
        for row in &table.rows {
            let passes = self
                .additional_filters
                .iter()
                .all(|(column, expected)| row.get(column).is_some_and(|v| v == expected));
            if !passes {
                continue;
            }
            let Some(key) = row
                .get(&self.code_column)
                .and_then(|raw| self.key_type.normalize(raw))
            else {
                continue;
            };
            cache
                .entry(key)
                .or_insert_with(|| self.template.render(row));
        }
        tracing::info!(
            lookup = %self.lookup_file.display(),
            rows = table.len(),
            entries = cache.len(),
            "built enrichment cache"
        );
        self.cache = Some(cache);
        Ok(())
    }

    /// Enriched code, or the original when the id is not in the lookup.
    pub fn enrich(&self, code: &str) -> Result<String> {
        let cache = self
            .cache
            .as_ref()
            .ok_or_else(|| MedsError::not_fitted("code_enrichment"))?;
        let enriched = self
            .key_type
            .normalize(extract_code_id(code))
            .and_then(|id| cache.get(&id))
            .cloned()
            .unwrap_or_else(|| code.to_string());
        Ok(enriched)
    }
}

#[derive(Debug, Clone)]
pub enum CodeTransform {
    Truncation(CodeMatcher),
    Enrichment(CodeEnrichment),
}

impl CodeTransform {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Truncation(_) => "code_truncation",
            Self::Enrichment(_) => "code_enrichment",
        }
    }

    pub fn matcher(&self) -> &CodeMatcher {
        match self {
            Self::Truncation(matcher) => matcher,
            Self::Enrichment(enrichment) => &enrichment.matcher,
        }
    }

    /// Loads external resources; a no-op for pure rewrites.
    pub fn prepare(&mut self) -> Result<()> {
        match self {
            Self::Truncation(_) => Ok(()),
            Self::Enrichment(enrichment) => enrichment.load(),
        }
    }

    pub fn is_ready(&self) -> bool {
        match self {
            Self::Truncation(_) => true,
            Self::Enrichment(enrichment) => enrichment.is_loaded(),
        }
    }

    pub fn transform_code(&self, code: &str) -> Result<String> {
        match self {
            Self::Truncation(_) => Ok(truncate_code(code)),
            Self::Enrichment(enrichment) => enrichment.enrich(code),
        }
    }

    pub fn encode(&self, table: &mut EventTable) -> Result<()> {
        if !self.is_ready() {
            return Err(MedsError::not_fitted(self.name()));
        }
        let matcher = self.matcher();
        for event in table.events_mut() {
            if matcher.matches(&event.code) {
                event.code = self.transform_code(&event.code)?;
            }
        }
        Ok(())
    }
}
