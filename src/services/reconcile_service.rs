use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::config::UnmappedPolicy;
use crate::error::AppError;
use crate::models::file_descriptor::FileDescriptor;
use crate::models::mapping::{FileMapping, MappingTarget};
use crate::services::model_service::CompletionRequest;
use crate::services::proposal_service::{
    build_repair_prompt, descriptors_for, known_paths, model_messages, parse_mapping_response,
    Proposal, ProposalContext,
};

const REPAIR_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub mapping: FileMapping,
    /// Files that stay where they are under [`UnmappedPolicy::LeaveInPlace`].
    pub left_in_place: Vec<String>,
    /// Files the repair request supplied.
    pub repaired: usize,
    /// Keys the model returned that match no collected file.
    pub dropped_unknown: Vec<String>,
}

/// Makes the mapping cover every descriptor. A complete mapping returns
/// without a model call; otherwise exactly one repair request is sent for
/// the missing files.
pub async fn reconcile(
    ctx: &ProposalContext<'_>,
    descriptors: &[FileDescriptor],
    proposal: Proposal,
    policy: UnmappedPolicy,
) -> Result<Reconciled, AppError> {
    let Proposal {
        mut mapping,
        vocabulary,
        ..
    } = proposal;

    let dropped_unknown = mapping.retain_known(descriptors);
    for key in &dropped_unknown {
        warn!(path = %key, "Dropping mapping entry for a file that was not collected");
    }

    let missing = mapping.missing_paths(descriptors);
    if missing.is_empty() {
        return Ok(Reconciled {
            mapping,
            left_in_place: Vec::new(),
            repaired: 0,
            dropped_unknown,
        });
    }

    info!(missing = missing.len(), "Requesting mappings for missing files");
    let established = match &vocabulary {
        Some(vocabulary) => vocabulary.directories.clone(),
        None => mapping.destination_directories(),
    };
    let prompt = build_repair_prompt(
        &mapping,
        &established,
        &descriptors_for(descriptors, &missing),
        ctx.options,
    )?;
    let request = CompletionRequest::json("repair", model_messages(prompt), REPAIR_TEMPERATURE);
    let text = ctx.send_request(request).await?;

    let constraint = match mapping.target {
        MappingTarget::Directory => vocabulary.as_ref(),
        MappingTarget::FullPath => None,
    };
    let mut repair =
        parse_mapping_response(&text, mapping.target, constraint, &known_paths(descriptors))?.mapping;
    repair.entries.retain(|key, _| {
        let wanted = missing.contains(key);
        if !wanted {
            warn!(path = %key, "Ignoring repair entry for a file that was not missing");
        }
        wanted
    });
    let repaired = repair.len();
    mapping.merge(repair);

    let still_missing: BTreeSet<String> = mapping.missing_paths(descriptors);
    apply_policy(mapping, descriptors, still_missing, policy, repaired, dropped_unknown)
}

/// Checks a replayed mapping without any model call. Gaps go straight to
/// `policy`.
pub fn reconcile_offline(
    descriptors: &[FileDescriptor],
    mut mapping: FileMapping,
    policy: UnmappedPolicy,
) -> Result<Reconciled, AppError> {
    let dropped_unknown = mapping.retain_known(descriptors);
    for key in &dropped_unknown {
        warn!(path = %key, "Dropping saved entry for a file that was not collected");
    }
    let missing = mapping.missing_paths(descriptors);
    apply_policy(mapping, descriptors, missing, policy, 0, dropped_unknown)
}

fn apply_policy(
    mut mapping: FileMapping,
    descriptors: &[FileDescriptor],
    still_missing: BTreeSet<String>,
    policy: UnmappedPolicy,
    repaired: usize,
    dropped_unknown: Vec<String>,
) -> Result<Reconciled, AppError> {
    if still_missing.is_empty() {
        return Ok(Reconciled {
            mapping,
            left_in_place: Vec::new(),
            repaired,
            dropped_unknown,
        });
    }

    match policy {
        UnmappedPolicy::FailFast => Err(AppError::IncompleteMapping(
            still_missing.into_iter().collect(),
        )),
        UnmappedPolicy::LeaveInPlace => {
            for descriptor in descriptors.iter().filter(|d| still_missing.contains(&d.path)) {
                let destination = match mapping.target {
                    MappingTarget::FullPath => descriptor.path.clone(),
                    MappingTarget::Directory => descriptor.parent_relative().to_string(),
                };
                warn!(path = %descriptor.path, "Leaving unmapped file in place");
                mapping.insert(descriptor.path.clone(), destination);
            }
            Ok(Reconciled {
                mapping,
                left_in_place: still_missing.into_iter().collect(),
                repaired,
                dropped_unknown,
            })
        }
    }
}
