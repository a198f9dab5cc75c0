use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::{DescriptorFormat, ProposalOptions, RetryPolicy, StrategyKind};
use crate::error::AppError;
use crate::models::file_descriptor::FileDescriptor;
use crate::models::mapping::{DirectoryProposal, FileMapping, MappingTarget};
use crate::scope_path::{clean_relative, normalize_relative};
use crate::services::model_service::{send_with_retry, ChatMessage, CompletionRequest, ModelClient};

const SUMMARY_EXAMPLE_COUNT: usize = 10;
const ANALYSIS_TEMPERATURE: f32 = 0.2;
const MAPPING_TEMPERATURE: f32 = 0.1;

const SYSTEM_PROMPT: &str = "You reorganize directories of files into a clean, practical \
directory structure. You follow the output schema exactly and never invent files.";

// ---------------------------------------------------------------------------
// Proposal types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Proposal {
    pub mapping: FileMapping,
    /// Allowed destination directories, when the strategy established one.
    pub vocabulary: Option<DirectoryProposal>,
    pub analysis: Option<String>,
    pub warnings: Vec<String>,
}

pub struct ProposalContext<'a> {
    pub client: &'a dyn ModelClient,
    pub options: &'a ProposalOptions,
    pub retry: RetryPolicy,
}

impl ProposalContext<'_> {
    pub async fn send_request(&self, request: CompletionRequest) -> Result<String, AppError> {
        send_with_retry(self.client, &request, self.retry).await
    }
}

#[async_trait]
pub trait ProposalStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn propose(
        &self,
        ctx: &ProposalContext<'_>,
        descriptors: &[FileDescriptor],
    ) -> Result<Proposal, AppError>;
}

/// Picks the strategy configured at startup. `existing_directories` is the
/// per-file fallback vocabulary when no explicit directory list was given.
pub fn strategy_for(
    options: &ProposalOptions,
    existing_directories: Vec<String>,
) -> Box<dyn ProposalStrategy> {
    match options.strategy {
        StrategyKind::SingleStage => Box::new(SingleStageStrategy {
            analyze_first: options.analyze_first,
        }),
        StrategyKind::TwoStage => Box::new(TwoStageStrategy),
        StrategyKind::PerFile => {
            let raw = if options.directories.is_empty() {
                existing_directories
            } else {
                options.directories.clone()
            };
            Box::new(PerFileStrategy::new(raw, options.max_depth))
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptor serialization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingPurpose {
    /// Taxonomy and analysis requests; an aggregate summary is acceptable.
    Taxonomy,
    /// Mapping requests; every path must stay visible.
    Mapping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListing {
    pub text: String,
    pub summarized: bool,
}

#[derive(Serialize)]
struct VerboseDescriptor<'a> {
    path: &'a str,
    size: u64,
    #[serde(rename = "type")]
    file_type: &'a str,
    last_modified: Option<&'a str>,
    content_sample: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_summary: Option<&'a str>,
}

pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

pub fn serialize_descriptors(
    descriptors: &[FileDescriptor],
    format: DescriptorFormat,
) -> Result<String, AppError> {
    match format {
        DescriptorFormat::Verbose => {
            let payload = descriptors
                .iter()
                .map(|d| VerboseDescriptor {
                    path: &d.path,
                    size: d.size_bytes,
                    file_type: d.extension.as_deref().unwrap_or(""),
                    last_modified: d.last_modified.as_deref(),
                    content_sample: d.content_sample.as_deref(),
                    content_summary: d.content_summary.as_deref(),
                })
                .collect::<Vec<_>>();
            Ok(serde_json::to_string_pretty(&payload)?)
        }
        DescriptorFormat::Compact => Ok(descriptors
            .iter()
            .map(compact_line)
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

fn compact_line(descriptor: &FileDescriptor) -> String {
    let modified = descriptor
        .last_modified
        .as_deref()
        .and_then(|m| m.get(..10))
        .unwrap_or("-");
    match descriptor.content_sample.as_deref() {
        Some(sample) => format!("{} | {modified} | {sample}", descriptor.path),
        None => format!("{} | {modified}", descriptor.path),
    }
}

fn first_segment(relative: &str) -> Option<&str> {
    let mut parts = relative.split('/').filter(|segment| !segment.is_empty());
    let first = parts.next()?;
    parts.next().map(|_| first)
}

pub fn build_tree_summary(descriptors: &[FileDescriptor]) -> Value {
    let mut top_level_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut extension_counts: BTreeMap<String, usize> = BTreeMap::new();

    for descriptor in descriptors {
        let top = first_segment(&descriptor.path)
            .unwrap_or("(root)")
            .to_string();
        *top_level_counts.entry(top).or_default() += 1;

        let ext = descriptor
            .extension
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("(none)")
            .to_lowercase();
        *extension_counts.entry(ext).or_default() += 1;
    }

    let examples = descriptors
        .iter()
        .take(SUMMARY_EXAMPLE_COUNT)
        .map(compact_line)
        .collect::<Vec<_>>();

    serde_json::json!({
        "total_files": descriptors.len(),
        "top_level_counts": top_level_counts,
        "extension_counts": extension_counts,
        "examples": examples,
    })
}

/// Serializes descriptors in the configured format, shrinking the listing when
/// it exceeds the token budget.
pub fn render_listing(
    descriptors: &[FileDescriptor],
    options: &ProposalOptions,
    purpose: ListingPurpose,
) -> Result<FileListing, AppError> {
    let full = serialize_descriptors(descriptors, options.format)?;
    if estimate_tokens(&full) <= options.token_budget {
        return Ok(FileListing {
            text: full,
            summarized: false,
        });
    }

    if options.format == DescriptorFormat::Verbose {
        let compact = serialize_descriptors(descriptors, DescriptorFormat::Compact)?;
        if estimate_tokens(&compact) <= options.token_budget {
            debug!("Descriptor listing over budget, using compact form");
            return Ok(FileListing {
                text: compact,
                summarized: false,
            });
        }
    }

    match purpose {
        ListingPurpose::Taxonomy => {
            info!(
                files = descriptors.len(),
                budget = options.token_budget,
                "Descriptor listing over budget, sending aggregate summary"
            );
            Ok(FileListing {
                text: serde_json::to_string_pretty(&build_tree_summary(descriptors))?,
                summarized: true,
            })
        }
        ListingPurpose::Mapping => {
            warn!(
                files = descriptors.len(),
                budget = options.token_budget,
                "Descriptor listing over budget, sending paths only"
            );
            Ok(FileListing {
                text: descriptors
                    .iter()
                    .map(|d| d.path.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
                summarized: false,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

fn listing_section(listing: &FileListing) -> String {
    if listing.summarized {
        format!(
            "The file list is too large to include in full. Aggregate summary JSON \
(counts per extension and top-level directory, plus example entries):\n{}",
            listing.text
        )
    } else {
        format!("Files (relative to the root):\n{}", listing.text)
    }
}

fn guidance_section(options: &ProposalOptions) -> String {
    match options.guidance.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => format!("\nAdditional guidelines:\n{text}\n"),
        _ => String::new(),
    }
}

pub fn format_vocabulary(vocabulary: &DirectoryProposal) -> String {
    vocabulary
        .directories
        .iter()
        .map(|d| format!("- /{d}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_analysis_prompt(listing: &FileListing, options: &ProposalOptions) -> String {
    format!(
        "Analyze the files below and suggest a logical structure that would improve organization.\n\
\n\
{listing}\n\
{guidance}\n\
Provide a concise analysis with:\n\
1. A short summary of the collection (key types and patterns).\n\
2. The core groups or categories you identified.\n\
3. A suggested directory structure with minimal justification.\n\
\n\
Constraints:\n\
- Keep the structure practical (at most {max_depth} levels deep).\n\
- Maintain original filenames.\n\
- Be concise.",
        listing = listing_section(listing),
        guidance = guidance_section(options),
        max_depth = options.max_depth,
    )
}

pub fn build_mapping_prompt(
    listing: &FileListing,
    options: &ProposalOptions,
    analysis: Option<&str>,
) -> String {
    let analysis_section = analysis
        .map(|a| format!("Previous analysis:\n{a}\n\n"))
        .unwrap_or_default();
    format!(
        "Create a file mapping that reorganizes the files below.\n\
\n\
{analysis_section}{listing}\n\
{guidance}\n\
Rules:\n\
1. Every original file must appear exactly once as a key.\n\
2. Keep original filenames; only the directories change.\n\
3. Do not nest deeper than {max_depth} directory levels.\n\
4. Paths are relative to the same root as the original files.\n\
5. Return ONLY a JSON object whose keys are original paths and whose values are new paths:\n\
{{\n\
  \"old/path/file.txt\": \"new/structured/path/file.txt\",\n\
  \"random_name.py\": \"code/utilities/random_name.py\"\n\
}}",
        listing = listing_section(listing),
        guidance = guidance_section(options),
        max_depth = options.max_depth,
    )
}

pub fn build_directory_prompt(listing: &FileListing, options: &ProposalOptions) -> String {
    format!(
        "Propose a directory structure for the files below.\n\
\n\
{listing}\n\
{guidance}\n\
Rules:\n\
1. Group files by purpose, domain or type; choose descriptive directory names.\n\
2. Directories are relative to the root and at most {max_depth} levels deep.\n\
3. List every directory that should receive files; parents are implied.\n\
4. Return ONLY a JSON object with this schema:\n\
{{\n\
  \"directories\": [\"documents/finance\", \"images/vacations\", \"code\"]\n\
}}",
        listing = listing_section(listing),
        guidance = guidance_section(options),
        max_depth = options.max_depth,
    )
}

pub fn build_directory_mapping_prompt(
    listing: &FileListing,
    vocabulary: &DirectoryProposal,
    options: &ProposalOptions,
) -> String {
    format!(
        "Assign each file below to one of the available directories.\n\
\n\
Available directories:\n\
{directories}\n\
\n\
{listing}\n\
{guidance}\n\
Rules:\n\
1. Every original file must appear exactly once as a key.\n\
2. Values MUST be exactly one of the available directories.\n\
3. Files keep their original filenames.\n\
4. Return ONLY a JSON object mapping original paths to directories:\n\
{{\n\
  \"old/path/report.pdf\": \"/documents/finance\",\n\
  \"IMG_0042.jpg\": \"/images/vacations\"\n\
}}",
        directories = format_vocabulary(vocabulary),
        listing = listing_section(listing),
        guidance = guidance_section(options),
    )
}

pub fn build_file_prompt(
    descriptor: &FileDescriptor,
    vocabulary: &DirectoryProposal,
    options: &ProposalOptions,
) -> Result<String, AppError> {
    let file = serialize_descriptors(std::slice::from_ref(descriptor), DescriptorFormat::Verbose)?;
    Ok(format!(
        "Map the file below to the most appropriate directory based on its name, type and content \
(and its content summary when present).\n\
\n\
File information:\n\
{file}\n\
\n\
Available directories:\n\
{directories}\n\
{guidance}\n\
Return ONLY a JSON object with this schema:\n\
{{\n\
  \"target_directory\": \"/best/directory/from/the/list\"\n\
}}\n\
target_directory MUST be one of the available directories.",
        directories = format_vocabulary(vocabulary),
        guidance = guidance_section(options),
    ))
}

/// Prompt for the single repair pass over files the first response left out.
pub fn build_repair_prompt(
    mapping: &FileMapping,
    vocabulary: &[String],
    missing: &[FileDescriptor],
    options: &ProposalOptions,
) -> Result<String, AppError> {
    let current = serde_json::to_string_pretty(&mapping.entries)?;
    let missing_listing = serialize_descriptors(missing, DescriptorFormat::Compact)?;
    let directories = vocabulary
        .iter()
        .map(|d| format!("- /{d}"))
        .collect::<Vec<_>>()
        .join("\n");
    let (value_rule, example) = match mapping.target {
        MappingTarget::FullPath => (
            "Values are new file paths that keep the original filename and place the file \
in one of the established directories.",
            "{\n  \"missing/file.txt\": \"documents/file.txt\"\n}",
        ),
        MappingTarget::Directory => (
            "Values MUST be exactly one of the established directories.",
            "{\n  \"missing/file.txt\": \"/documents\"\n}",
        ),
    };
    Ok(format!(
        "A previous reorganization proposal left some files unmapped.\n\
\n\
Current mapping:\n\
{current}\n\
\n\
Established directories:\n\
{directories}\n\
\n\
Files missing from the mapping:\n\
{missing_listing}\n\
{guidance}\n\
Rules:\n\
1. Map ONLY the missing files; every one of them must appear as a key.\n\
2. {value_rule}\n\
3. Return ONLY a JSON object mapping each missing path to its destination:\n\
{example}",
        guidance = guidance_section(options),
    ))
}

pub fn model_messages(prompt: String) -> Vec<ChatMessage> {
    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)]
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

pub fn extract_json_payload(text: &str) -> Option<String> {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + "```json".len()..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let rest = &trimmed[start + 3..];
        if let Some(newline) = rest.find('\n') {
            let body = &rest[newline + 1..];
            if let Some(end) = body.find("```") {
                return Some(body[..end].trim().to_string());
            }
        }
    }

    let first = trimmed.find('{')?;
    let last = trimmed.rfind('}')?;
    if first <= last {
        return Some(trimmed[first..=last].to_string());
    }

    None
}

pub fn parse_json_object(text: &str) -> Result<Map<String, Value>, AppError> {
    let payload = extract_json_payload(text).ok_or_else(|| {
        AppError::Malformed("response did not contain a JSON object".to_string())
    })?;
    match serde_json::from_str::<Value>(&payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(AppError::Malformed(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(AppError::Malformed(format!("invalid JSON: {e}"))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Root-relative directory as written by the model; `/` and `""` mean the root.
fn normalize_directory(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "/" || trimmed == "." || trimmed == "./" {
        return Some(String::new());
    }
    normalize_relative(trimmed)
}

#[derive(Debug, Clone)]
pub struct ParsedMapping {
    pub mapping: FileMapping,
    pub rejected: Vec<String>,
}

/// Paths of the collected files, used to match model keys exactly.
pub fn known_paths(descriptors: &[FileDescriptor]) -> BTreeSet<String> {
    descriptors.iter().map(|d| d.path.clone()).collect()
}

/// A key naming a collected file is taken verbatim; anything else goes
/// through normalization.
fn resolve_source_key(raw: &str, known: &BTreeSet<String>) -> Option<String> {
    if known.contains(raw) {
        return Some(raw.to_string());
    }
    normalize_relative(raw)
}

/// Keeps the destination as written when it still ends in the source file
/// name, so names with padding or backslashes survive.
fn resolve_destination_path(raw: &str, source: &str) -> Option<String> {
    let file_name = source.rsplit('/').next().unwrap_or(source);
    if let Some(exact) = clean_relative(raw) {
        if exact.rsplit('/').next() == Some(file_name) {
            return Some(exact);
        }
    }
    normalize_relative(raw)
}

/// Parses `{original_path: destination}`. Entries that escape the root or
/// fall outside `vocabulary` are rejected with a warning rather than kept.
pub fn parse_mapping_response(
    text: &str,
    target: MappingTarget,
    vocabulary: Option<&DirectoryProposal>,
    known: &BTreeSet<String>,
) -> Result<ParsedMapping, AppError> {
    let mut object = parse_json_object(text)?;
    if object.len() == 1 {
        if let Some(Value::Object(inner)) = object.get("mapping") {
            object = inner.clone();
        }
    }

    let mut mapping = FileMapping::new(target);
    let mut rejected = Vec::new();
    for (raw_key, raw_value) in object {
        let Value::String(raw_value) = raw_value else {
            return Err(AppError::Malformed(format!(
                "destination for '{raw_key}' is {}, expected a string",
                json_kind(&raw_value)
            )));
        };
        let Some(key) = resolve_source_key(&raw_key, known) else {
            rejected.push(format!("invalid source path '{raw_key}'"));
            continue;
        };

        let destination = match target {
            MappingTarget::FullPath => resolve_destination_path(&raw_value, &key),
            MappingTarget::Directory => normalize_directory(&raw_value),
        };
        let Some(destination) = destination else {
            rejected.push(format!("destination for '{key}' escapes the root: '{raw_value}'"));
            continue;
        };

        if let (MappingTarget::Directory, Some(vocabulary)) = (target, vocabulary) {
            if !vocabulary.contains(&destination) {
                rejected.push(format!(
                    "destination for '{key}' is not an allowed directory: '{raw_value}'"
                ));
                continue;
            }
        }

        mapping.insert(key, destination);
    }

    for reason in &rejected {
        warn!(reason = %reason, "Rejected mapping entry");
    }
    Ok(ParsedMapping { mapping, rejected })
}

pub fn parse_directory_list(
    text: &str,
    max_depth: usize,
) -> Result<(DirectoryProposal, Vec<String>), AppError> {
    let object = parse_json_object(text)?;
    let Some(Value::Array(values)) = object.get("directories") else {
        return Err(AppError::Malformed(
            "response missing 'directories' array".to_string(),
        ));
    };
    let raw = values
        .iter()
        .map(|v| {
            v.as_str().map(ToOwned::to_owned).ok_or_else(|| {
                AppError::Malformed("'directories' contains a non-string value".to_string())
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let (proposal, rejected) = DirectoryProposal::from_raw(raw, max_depth);
    if proposal.is_empty() {
        return Err(AppError::Malformed(
            "response proposed no usable directories".to_string(),
        ));
    }
    let rejected = rejected
        .into_iter()
        .map(|d| format!("rejected proposed directory '{d}'"))
        .collect();
    Ok((proposal, rejected))
}

/// Parses a per-file answer. `Ok(None)` means the model picked a directory
/// outside the vocabulary.
pub fn parse_target_directory(
    text: &str,
    vocabulary: &DirectoryProposal,
) -> Result<Option<String>, AppError> {
    let object = parse_json_object(text)?;
    let Some(Value::String(raw)) = object.get("target_directory") else {
        return Err(AppError::Malformed(
            "response missing 'target_directory' field".to_string(),
        ));
    };
    Ok(normalize_directory(raw).filter(|dir| vocabulary.contains(dir)))
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

pub struct SingleStageStrategy {
    pub analyze_first: bool,
}

#[async_trait]
impl ProposalStrategy for SingleStageStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SingleStage
    }

    async fn propose(
        &self,
        ctx: &ProposalContext<'_>,
        descriptors: &[FileDescriptor],
    ) -> Result<Proposal, AppError> {
        let analysis = if self.analyze_first {
            let listing = render_listing(descriptors, ctx.options, ListingPurpose::Taxonomy)?;
            let prompt = build_analysis_prompt(&listing, ctx.options);
            let text = ctx
                .send_request(CompletionRequest::text(
                    "analysis",
                    model_messages(prompt),
                    ANALYSIS_TEMPERATURE,
                ))
                .await?;
            Some(text.trim().to_string())
        } else {
            None
        };

        let listing = render_listing(descriptors, ctx.options, ListingPurpose::Mapping)?;
        let prompt = build_mapping_prompt(&listing, ctx.options, analysis.as_deref());
        let text = ctx
            .send_request(CompletionRequest::json(
                "mapping",
                model_messages(prompt),
                MAPPING_TEMPERATURE,
            ))
            .await?;
        let parsed =
            parse_mapping_response(&text, MappingTarget::FullPath, None, &known_paths(descriptors))?;
        let warnings = flag_renamed_files(descriptors, &parsed.mapping, parsed.rejected);

        Ok(Proposal {
            mapping: parsed.mapping,
            vocabulary: None,
            analysis,
            warnings,
        })
    }
}

fn flag_renamed_files(
    descriptors: &[FileDescriptor],
    mapping: &FileMapping,
    mut warnings: Vec<String>,
) -> Vec<String> {
    for descriptor in descriptors {
        let Some(destination) = mapping.entries.get(&descriptor.path) else {
            continue;
        };
        let new_name = destination.rsplit('/').next().unwrap_or(destination);
        if descriptor.file_name() != new_name {
            warnings.push(format!(
                "'{}' is renamed to '{new_name}' by the proposal",
                descriptor.path
            ));
        }
    }
    warnings
}

pub struct TwoStageStrategy;

#[async_trait]
impl ProposalStrategy for TwoStageStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TwoStage
    }

    async fn propose(
        &self,
        ctx: &ProposalContext<'_>,
        descriptors: &[FileDescriptor],
    ) -> Result<Proposal, AppError> {
        let listing = render_listing(descriptors, ctx.options, ListingPurpose::Taxonomy)?;
        let text = ctx
            .send_request(CompletionRequest::json(
                "directories",
                model_messages(build_directory_prompt(&listing, ctx.options)),
                ANALYSIS_TEMPERATURE,
            ))
            .await?;
        let (vocabulary, mut warnings) = parse_directory_list(&text, ctx.options.max_depth)?;
        info!(directories = vocabulary.len(), "Directory proposal received");

        let listing = render_listing(descriptors, ctx.options, ListingPurpose::Mapping)?;
        let text = ctx
            .send_request(CompletionRequest::json(
                "mapping",
                model_messages(build_directory_mapping_prompt(
                    &listing,
                    &vocabulary,
                    ctx.options,
                )),
                MAPPING_TEMPERATURE,
            ))
            .await?;
        let parsed = parse_mapping_response(
            &text,
            MappingTarget::Directory,
            Some(&vocabulary),
            &known_paths(descriptors),
        )?;
        warnings.extend(parsed.rejected);

        Ok(Proposal {
            mapping: parsed.mapping,
            vocabulary: Some(vocabulary),
            analysis: None,
            warnings,
        })
    }
}

pub struct PerFileStrategy {
    vocabulary: DirectoryProposal,
}

impl PerFileStrategy {
    pub fn new(directories: Vec<String>, max_depth: usize) -> Self {
        let mut raw = Vec::with_capacity(directories.len());
        let mut include_root = directories.is_empty();
        for dir in directories {
            if normalize_directory(&dir).is_some_and(|d| d.is_empty()) {
                include_root = true;
            } else {
                raw.push(dir);
            }
        }
        let (mut vocabulary, rejected) = DirectoryProposal::from_raw(raw, max_depth);
        for dir in rejected {
            warn!(directory = %dir, "Ignoring unusable directory in per-file vocabulary");
        }
        if include_root {
            vocabulary.directories.insert(0, String::new());
        }
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &DirectoryProposal {
        &self.vocabulary
    }
}

#[async_trait]
impl ProposalStrategy for PerFileStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PerFile
    }

    async fn propose(
        &self,
        ctx: &ProposalContext<'_>,
        descriptors: &[FileDescriptor],
    ) -> Result<Proposal, AppError> {
        let mut mapping = FileMapping::new(MappingTarget::Directory);
        let mut warnings = Vec::new();

        for descriptor in descriptors {
            let prompt = build_file_prompt(descriptor, &self.vocabulary, ctx.options)?;
            let request = CompletionRequest::json("file", model_messages(prompt), MAPPING_TEMPERATURE);
            let outcome = match ctx.send_request(request).await {
                Ok(text) => parse_target_directory(&text, &self.vocabulary),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(Some(directory)) => mapping.insert(descriptor.path.clone(), directory),
                Ok(None) => warnings.push(format!(
                    "'{}' was mapped outside the allowed directories",
                    descriptor.path
                )),
                // Any failure only costs this file; the repair pass picks it up.
                Err(err) => warnings.push(format!("'{}': {err}", descriptor.path)),
            }
        }

        for warning in &warnings {
            warn!(warning = %warning, "Per-file mapping left a file unmapped");
        }
        Ok(Proposal {
            mapping,
            vocabulary: Some(self.vocabulary.clone()),
            analysis: None,
            warnings,
        })
    }
}

/// Descriptors whose paths are in `paths`, in collection order.
pub fn descriptors_for(descriptors: &[FileDescriptor], paths: &BTreeSet<String>) -> Vec<FileDescriptor> {
    descriptors
        .iter()
        .filter(|d| paths.contains(&d.path))
        .cloned()
        .collect()
}
