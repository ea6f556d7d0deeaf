//! Executor tests: data threading, scopes, branches, loops and per-node errors.
mod common;
use async_trait::async_trait;
use blockflow::ast::{LegacyCondition, Node, NodeKind, OperatorKind, ValueExpr};
use blockflow::data::{Scope, VariableStore};
use blockflow::error::ProviderError;
use blockflow::evaluator::Sentiment;
use blockflow::executor::FlowExecutor;
use blockflow::model::{ModelBackend, ModelCaller, ModelCallerConfig, ModelRequest, ModelResponse, ProviderRegistry};
use common::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[cfg(test)]
mod sequence_tests {
    use super::*;

    #[tokio::test]
    async fn test_data_threads_through_sequence() {
        let flow = vec![n_start(), n_text("t", "hello"), n_output("o")];
        let run = offline_executor().run(&flow).await;

        assert_eq!(run.results.get("start").unwrap().output, "Start flow");
        assert_eq!(run.results.get("t").unwrap().output, "hello");
        assert_eq!(run.results.get("o").unwrap().output, "hello");
        assert_eq!(run.data, "hello");
        assert_eq!(run.results.len(), 3);
    }

    #[tokio::test]
    async fn test_text_input_overwrites_data() {
        let flow = vec![n_start(), n_text("a", "first"), n_text("b", "second"), n_output("o")];
        let run = offline_executor().run(&flow).await;
        assert_eq!(run.results.get("o").unwrap().output, "second");
    }

    #[tokio::test]
    async fn test_set_and_get_variable() {
        let flow = vec![
            n_start(),
            n_text("t", "hello"),
            n_set("set", "greeting", "{{input}} world"),
            n_text("t2", "other"),
            n_get("get", "greeting"),
            n_output("o"),
        ];
        let run = offline_executor().run(&flow).await;

        assert_eq!(
            run.results.get("set").unwrap().output,
            "Set variable \"greeting\" = \"hello world\""
        );
        assert_eq!(
            run.results.get("get").unwrap().output,
            "Retrieved variable \"greeting\" = \"hello world\""
        );
        assert_eq!(run.results.get("o").unwrap().output, "hello world");
        assert_eq!(run.variables.get("greeting"), Some("hello world"));
    }

    #[tokio::test]
    async fn test_set_variable_leaves_data_untouched() {
        let flow = vec![n_start(), n_text("t", "keep"), n_set("set", "x", "1"), n_output("o")];
        let run = offline_executor().run(&flow).await;
        assert_eq!(run.results.get("o").unwrap().output, "keep");
    }

    #[tokio::test]
    async fn test_operator_node_stringifies_result() {
        let flow = vec![
            n_start(),
            n_set("set", "a", "10"),
            Node::Operator {
                id: "div".into(),
                operator: OperatorKind::Divide,
                inputs: vec![ValueExpr::Variable("a".into()), ValueExpr::literal("2")],
            },
            n_output("o"),
        ];
        let run = offline_executor().run(&flow).await;
        assert_eq!(run.results.get("div").unwrap().output, "5");
        assert_eq!(run.results.get("o").unwrap().output, "5");
    }

    #[tokio::test]
    async fn test_variable_input_evaluates_expression() {
        let flow = vec![
            n_start(),
            n_text("t", "abc"),
            Node::VariableInput {
                id: "v".into(),
                expression: ValueExpr::Operation {
                    operator: OperatorKind::Concatenate,
                    operands: vec![ValueExpr::literal("{{input}}"), ValueExpr::literal("!")],
                },
            },
            n_output("o"),
        ];
        let run = offline_executor().run(&flow).await;
        assert_eq!(run.results.get("o").unwrap().output, "abc!");
    }

    #[tokio::test]
    async fn test_run_with_initial_scope() {
        let variables: VariableStore = [("name", "Ada")].into_iter().collect();
        let flow = vec![n_start(), n_get("g", "name"), n_output("o")];
        let run = offline_executor()
            .run_with_scope(&flow, Scope::new("seed", variables))
            .await;
        assert_eq!(run.results.get("o").unwrap().output, "Ada");
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_provider_keeps_previous_data() {
        let flow = vec![
            n_start(),
            n_text("t", "hi"),
            n_model("m", "nope", "Translate {{input}}"),
            n_output("o"),
        ];
        let run = offline_executor().run(&flow).await;

        let model = run.results.get("m").unwrap();
        assert_eq!(
            model.output,
            "Error in LLM Processing block: Unknown model provider 'nope'"
        );
        assert_eq!(model.kind, NodeKind::Model);
        assert!(model.model.is_none());
        assert_eq!(run.results.get("o").unwrap().output, "hi");
    }

    #[tokio::test]
    async fn test_missing_variable_is_node_local() {
        let flow = vec![n_start(), n_text("t", "still here"), n_get("g", "ghost"), n_output("o")];
        let run = offline_executor().run(&flow).await;

        assert_eq!(
            run.results.get("g").unwrap().output,
            "Error in Get Variable block: Variable \"ghost\" not found"
        );
        assert_eq!(run.results.get("o").unwrap().output, "still here");
    }

    #[tokio::test]
    async fn test_operator_error_is_reported() {
        let flow = vec![
            n_start(),
            n_text("t", "kept"),
            Node::Operator {
                id: "div".into(),
                operator: OperatorKind::Divide,
                inputs: vec![ValueExpr::literal("10"), ValueExpr::literal("0")],
            },
            n_output("o"),
        ];
        let run = offline_executor().run(&flow).await;
        assert_eq!(
            run.results.get("div").unwrap().output,
            "Error in Operator block: Division by zero"
        );
        assert_eq!(run.results.get("o").unwrap().output, "kept");
    }

    #[tokio::test]
    async fn test_empty_prompt_is_a_validation_error() {
        let flow = vec![n_start(), n_model("m", "fake", "  "), n_output("o")];
        let run = executor_with(FakeBackend::echo()).run(&flow).await;
        assert_eq!(
            run.results.get("m").unwrap().output,
            "Error in LLM Processing block: No prompt provided"
        );
    }

    #[tokio::test]
    async fn test_invalid_variable_name_at_run_time() {
        let flow = vec![n_start(), n_set("set", "bad name", "x"), n_output("o")];
        let run = offline_executor().run(&flow).await;
        assert_eq!(
            run.results.get("set").unwrap().output,
            "Error in Set Variable block: Invalid variable name \"bad name\""
        );
        assert!(run.variables.is_empty());
    }

    #[tokio::test]
    async fn test_errors_inside_arm_stay_in_arm() {
        let flow = vec![
            n_start(),
            n_text("t", "outer"),
            n_branch("if", "true", vec![n_get("g", "ghost"), n_output("inner")], vec![]),
        ];
        let run = offline_executor().run(&flow).await;
        assert!(run.results.get("g").unwrap().output.starts_with("Error in Get Variable block"));
        assert_eq!(run.results.get("inner").unwrap().output, "outer");
        assert_eq!(
            run.results.get("if").unwrap().output,
            "Condition: TRUE → Executed THEN branch\nResult: outer"
        );
    }
}

#[cfg(test)]
mod model_tests {
    use super::*;

    #[tokio::test]
    async fn test_model_output_becomes_data() {
        let backend = FakeBackend::echo();
        let flow = vec![
            n_start(),
            n_text("t", "hi"),
            n_set("set", "lang", "French"),
            n_model("m", "fake", "Say {{input}} in {{getVar(\"lang\")}}"),
            n_output("o"),
        ];
        let run = executor_with(backend.clone()).run(&flow).await;

        let model = run.results.get("m").unwrap();
        assert_eq!(model.output, "echo: Say hi in French");
        assert_eq!(model.model.as_deref(), Some("fake-model"));
        assert_eq!(model.tokens, Some(12));
        assert!(model.latency_ms.is_some());
        assert_eq!(run.results.get("o").unwrap().output, "echo: Say hi in French");
        assert_eq!(backend.prompts(), vec!["Say hi in French".to_string()]);
    }

    /// Fails with a 503 a fixed number of times before succeeding.
    struct FlakyBackend {
        failures: usize,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl ModelBackend for FlakyBackend {
        fn id(&self) -> &str {
            "flaky"
        }

        async fn complete(&self, _request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(ProviderError::Api {
                    status: 503,
                    message: "overloaded".into(),
                });
            }
            Ok(ModelResponse {
                text: "recovered".into(),
                token_count: 3,
            })
        }
    }

    fn caller_for(backend: Arc<dyn ModelBackend>, retries: u32, timeout: Duration) -> ModelCaller {
        ModelCaller::new(ProviderRegistry::new().with_backend("fake", "fake-model", backend)).with_config(
            ModelCallerConfig::new()
                .with_request_timeout(timeout)
                .with_max_retries(retries)
                .with_initial_backoff(Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let backend = Arc::new(FlakyBackend {
            failures: 2,
            attempts: AtomicUsize::new(0),
        });
        let executor = FlowExecutor::new(caller_for(backend.clone(), 2, Duration::from_secs(5)));
        let flow = vec![n_start(), n_model("m", "fake", "go"), n_output("o")];
        let run = executor.run(&flow).await;

        assert_eq!(run.results.get("o").unwrap().output, "recovered");
        assert_eq!(backend.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let backend = Arc::new(FlakyBackend {
            failures: 10,
            attempts: AtomicUsize::new(0),
        });
        let executor = FlowExecutor::new(caller_for(backend.clone(), 1, Duration::from_secs(5)));
        let flow = vec![n_start(), n_model("m", "fake", "go"), n_output("o")];
        let run = executor.run(&flow).await;

        assert_eq!(
            run.results.get("m").unwrap().output,
            "Error in LLM Processing block: Provider API error (503): overloaded"
        );
        assert_eq!(backend.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let backend: Arc<dyn ModelBackend> = Arc::new(FailingBackend(ProviderError::Api {
            status: 401,
            message: "bad key".into(),
        }));
        let executor = FlowExecutor::new(caller_for(backend, 3, Duration::from_secs(5)));
        let flow = vec![n_start(), n_text("t", "kept"), n_model("m", "fake", "go"), n_output("o")];
        let run = executor.run(&flow).await;

        assert!(run.results.get("m").unwrap().output.contains("(401): bad key"));
        assert_eq!(run.results.get("o").unwrap().output, "kept");
    }

    struct SlowBackend;

    #[async_trait]
    impl ModelBackend for SlowBackend {
        fn id(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ModelResponse {
                text: "too late".into(),
                token_count: 1,
            })
        }
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let executor = FlowExecutor::new(caller_for(Arc::new(SlowBackend), 0, Duration::from_millis(20)));
        let flow = vec![n_start(), n_model("m", "fake", "go"), n_output("o")];
        let run = executor.run(&flow).await;
        assert_eq!(
            run.results.get("m").unwrap().output,
            "Error in LLM Processing block: Request timed out after 20ms"
        );
    }
}

#[cfg(test)]
mod branch_tests {
    use super::*;

    #[tokio::test]
    async fn test_branch_writes_propagate_forward() {
        let flow = vec![
            n_start(),
            n_set("x1", "x", "1"),
            n_branch("if", "true", vec![n_set("x2", "x", "2")], vec![]),
            n_output("o"),
        ];
        let run = offline_executor().run(&flow).await;
        assert_eq!(run.variables.get("x"), Some("2"));
    }

    #[tokio::test]
    async fn test_arm_data_is_merged_back() {
        let flow = vec![
            n_start(),
            n_text("t", "before"),
            n_branch("if", "false", vec![], vec![n_text("e", "after")]),
            n_output("o"),
        ];
        let run = offline_executor().run(&flow).await;
        assert_eq!(
            run.results.get("if").unwrap().output,
            "Condition: FALSE → Executed ELSE branch\nResult: after"
        );
        assert_eq!(run.results.get("o").unwrap().output, "after");
    }

    #[tokio::test]
    async fn test_empty_arm_leaves_data_unchanged() {
        let flow = vec![
            n_start(),
            n_text("t", "same"),
            n_branch("if", "false", vec![n_text("never", "x")], vec![]),
            n_output("o"),
        ];
        let run = offline_executor().run(&flow).await;
        assert_eq!(
            run.results.get("if").unwrap().output,
            "Condition: FALSE → ELSE branch (empty)"
        );
        assert!(run.results.get("never").is_none());
        assert_eq!(run.results.get("o").unwrap().output, "same");
    }

    #[tokio::test]
    async fn test_branch_reports_model_metrics() {
        let flow = vec![
            n_start(),
            n_text("t", "hi"),
            n_branch(
                "if",
                "true",
                vec![n_model("m", "fake", "{{input}}"), n_output("inner")],
                vec![],
            ),
        ];
        let run = executor_with(FakeBackend::replying("bonjour")).run(&flow).await;

        let branch = run.results.get("if").unwrap();
        assert_eq!(branch.output, "Condition: TRUE → Executed THEN branch\nResult: bonjour");
        assert_eq!(branch.model.as_deref(), Some("fake-model"));
        assert_eq!(branch.tokens, Some(12));
        assert_eq!(branch.latency_ms, run.results.get("m").unwrap().latency_ms);
    }

    #[tokio::test]
    async fn test_branch_metrics_skip_failed_model() {
        let flow = vec![
            n_start(),
            n_text("t", "hi"),
            n_branch(
                "if",
                "true",
                vec![
                    n_model("m1", "ghost", "{{input}}"),
                    n_model("m2", "fake", "{{input}}"),
                    n_output("inner"),
                ],
                vec![],
            ),
        ];
        let run = executor_with(FakeBackend::replying("ok")).run(&flow).await;

        let failed = run.results.get("m1").unwrap();
        assert_eq!(failed.kind, NodeKind::Model);
        assert!(failed.model.is_none());

        let branch = run.results.get("if").unwrap();
        assert_eq!(branch.model.as_deref(), Some("fake-model"));
        assert_eq!(branch.tokens, Some(12));
        assert_eq!(branch.latency_ms, run.results.get("m2").unwrap().latency_ms);
    }

    #[tokio::test]
    async fn test_branch_record_precedes_arm_records() {
        let flow = vec![
            n_start(),
            n_branch("if", "true", vec![n_text("a", "x"), n_output("b")], vec![]),
        ];
        let run = offline_executor().run(&flow).await;
        let ids: Vec<&str> = run.results.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["start", "if", "a", "b"]);
    }

    #[tokio::test]
    async fn test_condition_error_is_reported_on_branch() {
        let flow = vec![
            n_start(),
            n_text("t", "kept"),
            Node::Branch {
                id: "if".into(),
                condition: blockflow::ast::Condition::Expression(ValueExpr::Variable("ghost".into())),
                then_branch: vec![n_text("a", "x")],
                else_branch: vec![],
            },
            n_output("o"),
        ];
        let run = offline_executor().run(&flow).await;
        assert_eq!(
            run.results.get("if").unwrap().output,
            "Error in If/Then/Else block: Condition could not be evaluated: Variable \"ghost\" not found"
        );
        assert_eq!(run.results.get("o").unwrap().output, "kept");
    }

    #[tokio::test]
    async fn test_sentiment_branch_uses_classifier() {
        let flow = vec![
            n_start(),
            n_text("t", "What a wonderful day"),
            n_legacy_branch(
                "if",
                LegacyCondition::AiSentiment,
                "positive",
                vec![n_text("yes", "happy")],
                vec![n_text("no", "sad")],
            ),
            n_output("o"),
        ];

        let executor = offline_executor().with_classifier(Arc::new(FakeClassifier(Ok(Sentiment::Positive))));
        let run = executor.run(&flow).await;
        assert_eq!(run.results.get("o").unwrap().output, "happy");

        // No classifier: the condition is false.
        let run = offline_executor().run(&flow).await;
        assert_eq!(run.results.get("o").unwrap().output, "sad");
    }
}

#[cfg(test)]
mod loop_tests {
    use super::*;

    fn increment(id: &str) -> Node {
        Node::SetVariable {
            id: id.into(),
            name: "count".into(),
            value: ValueExpr::Operation {
                operator: OperatorKind::Add,
                operands: vec![ValueExpr::Variable("count".into()), ValueExpr::literal("1")],
            },
        }
    }

    #[tokio::test]
    async fn test_loop_carries_variables_across_iterations() {
        let flow = vec![
            n_start(),
            n_text("t", "a\nb\nc"),
            n_set("init", "count", "0"),
            Node::ForEachLine {
                id: "loop".into(),
                body: vec![increment("inc")],
            },
            n_output("o"),
        ];
        let run = offline_executor().run(&flow).await;
        assert_eq!(run.variables.get("count"), Some("3"));
    }

    #[tokio::test]
    async fn test_empty_body_passes_lines_through() {
        let flow = vec![
            n_start(),
            n_text("t", "one\n\n  \ntwo"),
            Node::ForEachLine {
                id: "loop".into(),
                body: vec![],
            },
            n_output("o"),
        ];
        let run = offline_executor().run(&flow).await;
        assert_eq!(run.results.get("loop").unwrap().output, "Processed 2 lines:\none\ntwo");
        assert_eq!(run.results.get("o").unwrap().output, "one\ntwo");
    }

    #[tokio::test]
    async fn test_body_sees_each_line() {
        let flow = vec![
            n_start(),
            n_text("t", "cat\ndog"),
            Node::ForEachLine {
                id: "loop".into(),
                body: vec![n_model("m", "fake", "Describe {{line}}")],
            },
            n_output("o"),
        ];
        let backend = FakeBackend::echo();
        let run = executor_with(backend.clone()).run(&flow).await;

        assert_eq!(backend.prompts(), vec!["Describe cat", "Describe dog"]);
        assert_eq!(
            run.results.get("o").unwrap().output,
            "echo: Describe cat\necho: Describe dog"
        );
        // The body node keeps the result of its last iteration.
        assert_eq!(run.results.get("m").unwrap().output, "echo: Describe dog");
    }

    #[tokio::test]
    async fn test_body_input_is_whole_loop_input() {
        let flow = vec![
            n_start(),
            n_text("t", "cat\ndog"),
            Node::ForEachLine {
                id: "loop".into(),
                body: vec![n_model("m", "fake", "{{input}} | {{line}}")],
            },
            n_output("o"),
        ];
        let backend = FakeBackend::replying("seen");
        executor_with(backend.clone()).run(&flow).await;

        assert_eq!(backend.prompts(), vec!["cat\ndog | cat", "cat\ndog | dog"]);
    }

    #[tokio::test]
    async fn test_empty_input_skips_loop() {
        let flow = vec![
            n_start(),
            Node::ForEachLine {
                id: "loop".into(),
                body: vec![increment("inc")],
            },
            n_output("o"),
        ];
        let run = offline_executor().run(&flow).await;
        assert_eq!(
            run.results.get("loop").unwrap().output,
            "No data to process (empty input)"
        );
        assert!(run.results.get("inc").is_none());
    }
}
