use std::path::Path;

use tracing::{debug, info, warn};

use crate::models::file_descriptor::FileDescriptor;
use crate::services::collector_service::read_text_excerpt;
use crate::services::model_service::{ChatMessage, CompletionRequest};
use crate::services::proposal_service::ProposalContext;

/// Characters of file text sent with each summary request.
const SUMMARY_INPUT_CHARS: usize = 1024;
const SUMMARY_TEMPERATURE: f32 = 0.2;

const SUMMARY_SYSTEM_PROMPT: &str = "You write concise, factual summaries of file contents. \
Summarize in 1-2 sentences, keep only the key information and never speculate.";

pub fn build_summary_prompt(descriptor: &FileDescriptor, text: &str) -> String {
    format!(
        "Summarize the content of '{path}' in 1-2 sentences. Focus on what the file is about.\n\
\n\
Content:\n\
{text}",
        path = descriptor.path,
    )
}

/// Fills `content_summary` for every text file under `root`, one request per
/// file. Files that cannot be summarized keep `None`; each failure becomes a
/// warning and never stops the pass.
pub async fn summarize_descriptors(
    ctx: &ProposalContext<'_>,
    root: &Path,
    descriptors: &mut [FileDescriptor],
) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut summarized = 0usize;

    for descriptor in descriptors.iter_mut() {
        if descriptor.content_sample.is_none() {
            continue;
        }
        let path = descriptor
            .path
            .split('/')
            .fold(root.to_path_buf(), |acc, segment| acc.join(segment));
        let Some(text) = read_text_excerpt(&path, SUMMARY_INPUT_CHARS) else {
            debug!(path = %descriptor.path, "No readable text to summarize");
            continue;
        };

        let request = CompletionRequest::text(
            "summary",
            vec![
                ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
                ChatMessage::user(build_summary_prompt(descriptor, &text)),
            ],
            SUMMARY_TEMPERATURE,
        );
        match ctx.send_request(request).await {
            Ok(summary) if !summary.trim().is_empty() => {
                descriptor.content_summary = Some(summary.trim().to_string());
                summarized += 1;
            }
            Ok(_) => warnings.push(format!("'{}': empty summary", descriptor.path)),
            Err(err) => warnings.push(format!("'{}': could not summarize: {err}", descriptor.path)),
        }
    }

    for warning in &warnings {
        warn!(warning = %warning, "Summary pass skipped a file");
    }
    info!(summarized, failed = warnings.len(), "Summarized file contents");
    warnings
}
