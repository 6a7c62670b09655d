use std::sync::Arc;

use paceload_core::{
    Backend as _, EventSink, OperationKind, Orchestrator, PlanOverrides, ProfileTable, RunPlan,
    StandardWorkload, TracingSink, WorkloadParams,
};
use paceload_http::{HttpBackend, HttpBackendOptions};

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::logging;
use crate::output;
use crate::run_error::RunError;
use crate::run_support::{ProfilesFile, classify_core_error, load_definition};

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    logging::init(args.verbose, args.log_file.as_deref()).map_err(RunError::RuntimeError)?;
    let out = output::formatter(args.output);

    let def = load_definition(&args.definition)
        .await
        .map_err(RunError::InvalidInput)?;
    let plan = RunPlan::resolve(&def, plan_overrides(&args))
        .map_err(|e| classify_core_error("invalid test definition", e))?;

    let backend = HttpBackend::new(HttpBackendOptions {
        request_timeout: args.request_timeout,
        ..HttpBackendOptions::default()
    });

    let profiles = ProfileTable::load(backend.profile_kind(), &ProfilesFile::new(&args.profiles))
        .map_err(|e| classify_core_error("failed to load profiles", e))?;
    if profiles.is_empty() {
        return Err(RunError::SetupError(anyhow::anyhow!(
            "no `{}` profiles in {}",
            profiles.kind(),
            args.profiles.display()
        )));
    }
    tracing::debug!(kind = profiles.kind(), count = profiles.len(), "profiles loaded");

    let workload = StandardWorkload::new(backend, WorkloadParams::from_definition(&def))
        .map_err(|e| classify_core_error("failed to build workload", e))?;

    let sink: Arc<dyn EventSink> = Arc::new(TracingSink);
    let mut orchestrator = Orchestrator::new(plan, profiles, workload, sink)
        .map_err(|e| classify_core_error("invalid operation selection", e))?;

    out.print_header(
        &args.definition,
        orchestrator.plan(),
        &orchestrator.operation_names(),
    );
    if let Some(progress) = out.progress() {
        orchestrator = orchestrator.with_progress(progress);
    }

    let plan = orchestrator.plan().clone();
    let report = orchestrator.run().await;

    out.print_summary(&plan, &report)
        .map_err(RunError::RuntimeError)?;

    Ok(ExitCode::Success)
}

pub fn list_operations() {
    for name in OperationKind::names() {
        println!("{name}");
    }
}

fn plan_overrides(args: &RunArgs) -> PlanOverrides {
    PlanOverrides {
        users: args.users,
        duration: args.duration,
        operations: (!args.operations.is_empty()).then(|| args.operations.clone()),
    }
}
