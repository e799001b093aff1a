//! Tests for the run and function contexts.

#[cfg(test)]
mod tests {
    use crate::context::{
        FunctionContext, FunctionKey, FunctionStateStore, PipelineContext, CONTENT_TYPE_JSON,
        KEY_DEVICE_NAME, KEY_RECEIVED_TOPIC,
    };
    use crate::events::{CollectingEventSink, EventSink};
    use std::sync::Arc;

    #[test]
    fn test_correlation_id_generated_when_absent() {
        let ctx = PipelineContext::new(None);
        assert_eq!(ctx.correlation_id().len(), 36);

        let blank = PipelineContext::new(Some("  ".to_string()));
        assert_eq!(blank.correlation_id().len(), 36);
    }

    #[test]
    fn test_correlation_id_propagated() {
        let ctx = PipelineContext::new(Some("corr-1".to_string()));
        assert_eq!(ctx.correlation_id(), "corr-1");
    }

    #[test]
    fn test_input_content_type_defaults_to_json() {
        let ctx = PipelineContext::new(None);
        assert_eq!(ctx.input_content_type(), CONTENT_TYPE_JSON);
        let ctx = PipelineContext::new(None).with_input_content_type("text/plain");
        assert_eq!(ctx.input_content_type(), "text/plain");
    }

    #[test]
    fn test_response_data_slot() {
        let ctx = PipelineContext::new(None);
        assert!(ctx.response_data().is_none());
        ctx.set_response_data("first");
        ctx.set_response_data(b"second".to_vec());
        assert_eq!(ctx.response_data(), Some(b"second".to_vec()));
    }

    #[test]
    fn test_response_content_type_clear() {
        let ctx = PipelineContext::new(None);
        ctx.set_response_content_type("text/plain");
        assert_eq!(ctx.response_content_type().as_deref(), Some("text/plain"));
        ctx.set_response_content_type("");
        assert!(ctx.response_content_type().is_none());
    }

    #[test]
    fn test_values_and_apply() {
        let ctx = PipelineContext::new(None)
            .with_value(KEY_DEVICE_NAME, "dev")
            .with_value(KEY_RECEIVED_TOPIC, "edgex/events/dev");
        ctx.add_value("Extra", "x");
        assert_eq!(ctx.get_value("extra").as_deref(), Some("x"));
        assert_eq!(ctx.apply_values("out/{devicename}/{extra}").unwrap(), "out/dev/x");
        ctx.remove_value("extra");
        assert!(ctx.apply_values("{extra}").is_err());
        assert_eq!(ctx.values().len(), 2);
    }

    #[test]
    fn test_function_state_shared_through_store() {
        let store = Arc::new(FunctionStateStore::new());
        let key = FunctionKey::new("p", 0, "Batch");

        let first = PipelineContext::new(None).with_state_store(Arc::clone(&store));
        first.set_function_state(&key, 5u32);

        let second = PipelineContext::new(None).with_state_store(Arc::clone(&store));
        assert_eq!(second.get_function_state::<u32>(&key), Some(5));

        let isolated = PipelineContext::new(None);
        assert_eq!(isolated.get_function_state::<u32>(&key), None);
    }

    #[test]
    fn test_function_context_state_and_error() {
        let ctx = Arc::new(PipelineContext::new(Some("c".into())));
        let fctx = FunctionContext::new(ctx, "p1", "Batch", FunctionKey::new("p1", 2, "Batch"));
        let count = fctx
            .with_state(|n: &mut u32| {
                *n += 1;
                *n
            })
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(fctx.correlation_id(), "c");

        let err = fctx.error("boom");
        assert_eq!(err.function, "Batch");
        assert_eq!(err.pipeline_id, "p1");
    }

    #[test]
    fn test_emit_event_adds_correlation_id() {
        let sink = Arc::new(CollectingEventSink::new());
        let ctx = PipelineContext::new(Some("corr".into()))
            .with_event_sink(Arc::clone(&sink) as Arc<dyn EventSink>);
        ctx.try_emit_event("function.started", Some(serde_json::json!({"function": "f"})));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "function.started");
        assert_eq!(events[0].1.as_ref().unwrap()["correlation_id"], "corr");
    }
}
