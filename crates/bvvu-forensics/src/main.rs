mod bootstrap;
mod report;

use anyhow::{Context, Result};
use forensics_core::settings::{AnalysisRequest, Settings};
use forensics_core::ForensicsError;
use forensics_data::analysis::{analyze_continuity, analyze_flakiness};

fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("BVVU forensics v{} starting", env!("CARGO_PKG_VERSION"));

    let json = settings.format == "json";
    let rendered = match settings.resolve() {
        AnalysisRequest::Continuity(request) => {
            tracing::info!(
                "Checking {} for categories {:?}",
                request.dir.display(),
                request.categories
            );
            let outcome = analyze_continuity(&request)
                .inspect_err(log_failure)
                .with_context(|| format!("cannot analyse {}", request.dir.display()))?;
            if json {
                report::render_json(&outcome)?
            } else {
                report::render_continuity_text(&outcome)
            }
        }
        AnalysisRequest::Flakiness(request) => {
            tracing::info!(
                "Reading status log {} ({} configured tags)",
                request.status_log.display(),
                request.tags.len()
            );
            let outcome = analyze_flakiness(&request)
                .inspect_err(log_failure)
                .with_context(|| format!("cannot analyse {}", request.status_log.display()))?;
            if json {
                report::render_json(&outcome)?
            } else {
                report::render_flakiness_text(&outcome)
            }
        }
    };

    println!("{}", rendered.trim_end());
    Ok(())
}

fn log_failure(e: &ForensicsError) {
    if e.is_source_failure() {
        tracing::error!("Source is unusable: {}", e);
    } else {
        tracing::error!("Analysis failed: {}", e);
    }
}
