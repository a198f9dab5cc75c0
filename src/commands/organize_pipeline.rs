use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{OrganizerConfig, StrategyKind};
use crate::error::AppError;
use crate::models::file_descriptor::FileDescriptor;
use crate::models::mapping::{FileMapping, ResolvedMapping};
use crate::models::report::{CleanupOutcome, MoveOutcome, ValidationReport};
use crate::safety::validate_root;
use crate::services::model_service::ModelClient;
use crate::services::proposal_service::{strategy_for, Proposal, ProposalContext};
use crate::services::reconcile_service::Reconciled;
use crate::services::{
    checkpoint_service, cleanup_service, collector_service, conflict_service, move_service,
    reconcile_service, summary_service,
};

// ---------------------------------------------------------------------------
// Pipeline results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Applied,
    /// The directory holds no files to organize.
    NothingToOrganize,
    /// Every file already sits at its proposed destination.
    NoChanges,
    Declined,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub status: PipelineStatus,
    pub mapping: Option<FileMapping>,
    pub moves: Option<MoveOutcome>,
    pub cleanup: Option<CleanupOutcome>,
}

impl PipelineOutcome {
    fn finished(run_id: Uuid, status: PipelineStatus, mapping: Option<FileMapping>) -> Self {
        Self {
            run_id,
            status,
            mapping,
            moves: None,
            cleanup: None,
        }
    }
}

/// Everything shown to the user before the moves are applied.
pub struct Preview<'a> {
    pub root: &'a Path,
    pub mapping: &'a FileMapping,
    pub report: &'a ValidationReport,
    pub warnings: &'a [String],
    pub left_in_place: &'a [String],
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

pub async fn stage_propose(
    config: &OrganizerConfig,
    ctx: &ProposalContext<'_>,
    descriptors: &[FileDescriptor],
) -> Result<Proposal, AppError> {
    let existing = if config.proposal.strategy == StrategyKind::PerFile
        && config.proposal.directories.is_empty()
    {
        collector_service::list_directories(&config.root)?
    } else {
        Vec::new()
    };
    let strategy = strategy_for(&config.proposal, existing);
    info!(strategy = ?strategy.kind(), files = descriptors.len(), "Requesting proposal");
    strategy.propose(ctx, descriptors).await
}

/// Loads a saved proposal. The model is never consulted, so an incomplete
/// file is handled by the unmapped policy alone.
pub fn stage_replay(
    config: &OrganizerConfig,
    path: &Path,
    descriptors: &[FileDescriptor],
) -> Result<Reconciled, AppError> {
    let mapping = checkpoint_service::read_checkpoint(path)?;
    reconcile_service::reconcile_offline(descriptors, mapping, config.unmapped)
}

pub fn stage_analyze(
    root: &Path,
    mapping: &FileMapping,
    descriptors: &[FileDescriptor],
) -> (ResolvedMapping, ValidationReport) {
    let resolved = mapping.resolve(root);
    let missing: BTreeSet<String> = mapping.missing_paths(descriptors);
    let report = conflict_service::analyze(&resolved, &missing);
    (resolved, report)
}

pub fn stage_apply(
    config: &OrganizerConfig,
    resolved: &ResolvedMapping,
) -> Result<(MoveOutcome, Option<CleanupOutcome>), AppError> {
    let moves = move_service::apply_moves(resolved)?;
    let cleanup = match (config.cleanup, config.sweep_tree) {
        (false, _) => None,
        (true, false) => Some(cleanup_service::cleanup_after_moves(&config.root, resolved)),
        (true, true) => Some(cleanup_service::cleanup_tree(&config.root)),
    };
    Ok((moves, cleanup))
}

/// Drops checkpoint files that live inside the root so a run never tries to
/// organize its own plan.
fn exclude_checkpoint_files(config: &OrganizerConfig, descriptors: &mut Vec<FileDescriptor>) {
    let own: BTreeSet<String> = [config.checkpoint.as_deref(), config.from_checkpoint.as_deref()]
        .into_iter()
        .flatten()
        .filter_map(|path| checkpoint_service::relative_to_root(&config.root, path))
        .collect();
    if own.is_empty() {
        return;
    }
    descriptors.retain(|d| {
        let keep = !own.contains(&d.path);
        if !keep {
            debug!(path = %d.path, "Skipping checkpoint file inside the root");
        }
        keep
    });
}

fn is_identity(mapping: &FileMapping) -> bool {
    mapping
        .to_relative_paths()
        .iter()
        .all(|(original, destination)| original == destination)
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs collect, summarize, propose, reconcile, analyze, confirm, move and
/// cleanup.
/// `confirm` sees the preview and decides whether the moves go ahead.
pub async fn run_pipeline<F>(
    config: &OrganizerConfig,
    client: &dyn ModelClient,
    confirm: F,
) -> Result<PipelineOutcome, AppError>
where
    F: FnOnce(&Preview<'_>) -> Result<bool, AppError>,
{
    let run_id = Uuid::new_v4();
    let span = info_span!("organize", run_id = %run_id, root = %config.root.display());
    run_stages(run_id, config, client, confirm)
        .instrument(span)
        .await
}

async fn run_stages<F>(
    run_id: Uuid,
    config: &OrganizerConfig,
    client: &dyn ModelClient,
    confirm: F,
) -> Result<PipelineOutcome, AppError>
where
    F: FnOnce(&Preview<'_>) -> Result<bool, AppError>,
{
    validate_root(&config.root)?;

    // Stage 1: Collect
    let mut descriptors =
        collector_service::collect_descriptors(&config.root, config.max_scan_depth)?;
    exclude_checkpoint_files(config, &mut descriptors);
    if descriptors.is_empty() {
        info!("No files to organize");
        return Ok(PipelineOutcome::finished(
            run_id,
            PipelineStatus::NothingToOrganize,
            None,
        ));
    }

    let ctx = ProposalContext {
        client,
        options: &config.proposal,
        retry: config.retry,
    };
    let (reconciled, warnings) = match config.from_checkpoint.as_deref() {
        Some(path) => (stage_replay(config, path, &descriptors)?, Vec::new()),
        None => {
            // Stage 2: Summarize (optional)
            let mut warnings = Vec::new();
            if config.proposal.summarize {
                warnings = summary_service::summarize_descriptors(
                    &ctx,
                    &config.root,
                    &mut descriptors,
                )
                .await;
            }

            // Stage 3: Propose
            let proposal = stage_propose(config, &ctx, &descriptors).await?;
            warnings.extend(proposal.warnings.iter().cloned());

            // Stage 4: Reconcile
            let reconciled =
                reconcile_service::reconcile(&ctx, &descriptors, proposal, config.unmapped)
                    .await?;
            if let Some(path) = config.checkpoint.as_deref() {
                checkpoint_service::write_checkpoint(path, &reconciled.mapping)?;
            }
            (reconciled, warnings)
        }
    };
    let mapping = reconciled.mapping;

    if is_identity(&mapping) {
        info!("Proposal leaves every file in place");
        return Ok(PipelineOutcome::finished(
            run_id,
            PipelineStatus::NoChanges,
            Some(mapping),
        ));
    }

    // Stage 5: Analyze
    let (resolved, report) = stage_analyze(&config.root, &mapping, &descriptors);
    if report.has_issues() {
        warn!(
            conflicts = report.destination_conflicts.len(),
            missing_sources = report.sources_missing_on_disk.len(),
            existing_destinations = report.destinations_already_exist.len(),
            "Proposal has validation issues"
        );
    }
    conflict_service::ensure_no_conflicts(&report)?;

    // Stage 6: Confirm
    let preview = Preview {
        root: &config.root,
        mapping: &mapping,
        report: &report,
        warnings: &warnings,
        left_in_place: &reconciled.left_in_place,
    };
    if !confirm(&preview)? {
        info!("Moves declined");
        return Ok(PipelineOutcome::finished(
            run_id,
            PipelineStatus::Declined,
            Some(mapping),
        ));
    }

    // Stage 7: Move and clean up
    let (moves, cleanup) = stage_apply(config, &resolved)?;
    Ok(PipelineOutcome {
        run_id,
        status: PipelineStatus::Applied,
        mapping: Some(mapping),
        moves: Some(moves),
        cleanup,
    })
}
