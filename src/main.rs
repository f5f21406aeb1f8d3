//! ML Rescorer - command line entry point
//!
//! Rescores one ranked window read from a request file against an index
//! snapshot and prints the reordered hits as JSON.
//!
//! Usage: `ml-rescorer <request.json> <index.json> [config.toml]`

use anyhow::{Context, Result};
use ml_rescorer::{
    config::{AppConfig, LoggingConfig, ModelFormat, ModelsConfig},
    models::{LinearEvaluator, ModelEvaluator, ModelRegistry},
    Candidate, InMemoryIndex, RescoreContext, RescoreMetrics, RescoreRequest, RescoringEngine,
};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Request file: rescoring parameters plus the ranked hits
#[derive(Debug, Deserialize)]
struct RequestFile {
    #[serde(flatten)]
    request: RescoreRequest,
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    doc: u32,
    score: f32,
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(format!("ml_rescorer={}", logging.level))
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.pretty().init(),
    }
    Ok(())
}

fn evaluator_for(models: &ModelsConfig) -> Result<Box<dyn ModelEvaluator>> {
    match models.format {
        ModelFormat::Linear => Ok(Box::new(LinearEvaluator)),
        #[cfg(feature = "onnx")]
        ModelFormat::Onnx => Ok(Box::new(ml_rescorer::models::OnnxEvaluator::with_threads(
            models.onnx_threads,
        ))),
        #[cfg(not(feature = "onnx"))]
        ModelFormat::Onnx => anyhow::bail!("ONNX support is not compiled in (enable the `onnx` feature)"),
    }
}

fn read_request(path: &Path) -> Result<RequestFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request from {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse request from {:?}", path))
}

fn run(config: AppConfig, request_path: &Path, index_path: &Path) -> Result<()> {
    let registry = Arc::new(ModelRegistry::new(
        &config.models.models_dir,
        evaluator_for(&config.models)?,
    ));
    let metrics = Arc::new(RescoreMetrics::new());
    let engine = RescoringEngine::new(registry, &config.models.model_name)
        .with_strategy(config.rescore.access_strategy)
        .with_metrics(Arc::clone(&metrics));

    let request = read_request(request_path)?;
    let index = InMemoryIndex::from_json_file(index_path)?;
    let context = RescoreContext::from_request(&request.request, config.rescore.window_size)?;
    info!(
        features = %context.fields,
        window_size = context.window_size,
        hits = request.hits.len(),
        "Rescoring request"
    );

    let window: Vec<Candidate> = request
        .hits
        .iter()
        .map(|hit| Candidate::new(hit.doc, hit.score))
        .collect();

    let rescored = engine.rescore(window, &context, index.segments(), &index)?;
    println!("{}", serde_json::to_string_pretty(&rescored)?);

    metrics.print_summary();
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        anyhow::bail!("usage: {} <request.json> <index.json> [config.toml]", args[0]);
    }

    let config = match args.get(3) {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    init_logging(&config.logging)?;
    info!(
        models_dir = %config.models.models_dir,
        model = %config.models.model_name,
        format = ?config.models.format,
        "Starting ML rescorer"
    );

    if let Err(e) = run(config, Path::new(&args[1]), Path::new(&args[2])) {
        error!(error = %e, "Rescoring failed");
        return Err(e);
    }
    Ok(())
}
