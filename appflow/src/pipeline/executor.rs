//! Sequential pipeline execution.

use super::Pipeline;
use crate::context::{FunctionContext, PipelineContext, KEY_PIPELINE_ID};
use crate::core::{FunctionOutput, Payload, RunOutcome};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, Instrument};

impl Pipeline {
    /// Runs every function in order against one payload.
    ///
    /// Each function receives the previous function's result. The first
    /// `Stop` ends the run as [`RunOutcome::FilteredOut`], the first `Fail`
    /// as [`RunOutcome::Failed`]; later functions are not invoked. There are
    /// no retries at this layer.
    ///
    /// `ctx` should come from [`Pipeline::context`] so stateful functions
    /// reach this pipeline's state store.
    pub async fn execute(&self, ctx: Arc<PipelineContext>, data: Payload) -> RunOutcome {
        let span = ctx.span().clone();
        self.execute_inner(ctx, data).instrument(span).await
    }

    async fn execute_inner(&self, ctx: Arc<PipelineContext>, data: Payload) -> RunOutcome {
        let start = Instant::now();
        ctx.add_value(KEY_PIPELINE_ID, self.id().to_string());

        debug!(
            pipeline_id = %self.id(),
            correlation_id = %ctx.correlation_id(),
            functions = self.len(),
            "processing message"
        );
        ctx.try_emit_event(
            "pipeline.started",
            Some(serde_json::json!({
                "pipeline_id": self.id(),
                "functions": self.len(),
            })),
        );

        let mut current = data;
        for (position, (function, key)) in self.steps().enumerate() {
            let name = function.name();
            let function_ctx = FunctionContext::new(Arc::clone(&ctx), self.id(), name, key.clone());

            ctx.try_emit_event(
                "function.started",
                Some(serde_json::json!({
                    "pipeline_id": self.id(),
                    "function": name,
                    "position": position,
                })),
            );
            let function_start = Instant::now();
            let output = function.execute(&function_ctx, current).await;
            let duration_ms = function_start.elapsed().as_secs_f64() * 1000.0;

            match output {
                FunctionOutput::Proceed(next) => {
                    ctx.try_emit_event(
                        "function.completed",
                        Some(serde_json::json!({
                            "pipeline_id": self.id(),
                            "function": name,
                            "position": position,
                            "duration_ms": duration_ms,
                        })),
                    );
                    current = next;
                }
                FunctionOutput::Stop => {
                    debug!(
                        pipeline_id = %self.id(),
                        function = %name,
                        position,
                        "pipeline stopped without error"
                    );
                    ctx.try_emit_event(
                        "function.filtered",
                        Some(serde_json::json!({
                            "pipeline_id": self.id(),
                            "function": name,
                            "position": position,
                        })),
                    );
                    self.emit_finished(&ctx, "filtered_out", start);
                    return RunOutcome::FilteredOut;
                }
                FunctionOutput::Fail(err) => {
                    error!(
                        pipeline_id = %self.id(),
                        function = %name,
                        position,
                        correlation_id = %ctx.correlation_id(),
                        error = %err,
                        "pipeline function failed"
                    );
                    ctx.try_emit_event(
                        "function.failed",
                        Some(serde_json::json!({
                            "pipeline_id": self.id(),
                            "function": name,
                            "position": position,
                            "error": err.message,
                            "duration_ms": duration_ms,
                        })),
                    );
                    self.emit_finished(&ctx, "failed", start);
                    return RunOutcome::Failed(err.into());
                }
            }
        }

        self.emit_finished(&ctx, "completed", start);
        RunOutcome::Completed(current)
    }

    fn emit_finished(&self, ctx: &PipelineContext, status: &str, start: Instant) {
        ctx.try_emit_event(
            "pipeline.completed",
            Some(serde_json::json!({
                "pipeline_id": self.id(),
                "status": status,
                "duration_ms": start.elapsed().as_secs_f64() * 1000.0,
            })),
        );
    }
}
