//! The worker side of the process protocol.

use calib_params::SENTINEL_COST;
use calib_supervisor::WorkerRequest;
use tracing::{error, info};

use crate::backend::{EvaluationBackend, InProcessBackend, Sample};
use crate::config::CalibrationConfig;
use crate::error::EvalResult;

/// Evaluate one worker request in this process.
///
/// The request header overrides the configured roots and variant. Any
/// failure, including configuration problems, yields [`SENTINEL_COST`] so
/// the worker can always write a cost.
#[must_use]
pub fn evaluate_request(config: &CalibrationConfig, request: &WorkerRequest) -> f64 {
    match try_evaluate(config, request) {
        Ok(cost) => cost,
        Err(e) => {
            error!(error = %e, "Worker evaluation failed");
            SENTINEL_COST
        }
    }
}

fn try_evaluate(config: &CalibrationConfig, request: &WorkerRequest) -> EvalResult<f64> {
    let config = config.clone().with_header(&request.header);
    let space = config.parameter_space()?;
    let physical = space
        .denormalize_all(&request.parameters)
        .map_err(crate::error::ConfigError::from)?;
    let properties = space.property_map_physical(&physical);

    let mut backend = InProcessBackend::from_config(&config)?;
    let sample = Sample {
        iteration: 1,
        normalized: &request.parameters,
        physical: &physical,
        properties: &properties,
    };
    match backend.evaluate(&sample) {
        Ok(cost) if cost.is_finite() => {
            info!(cost, variant = %config.variant, "Worker evaluation done");
            Ok(cost)
        }
        Ok(cost) => {
            error!(cost, "Non-finite cost");
            Ok(SENTINEL_COST)
        }
        Err(failure) => {
            error!(stage = %failure.stage, reason = %failure.reason, "Worker evaluation failed");
            Ok(SENTINEL_COST)
        }
    }
}
