//! Flow Executor: a recursive tree walker over an extracted flow.
//!
//! Each node runs against a [`Scope`] holding the current data value and the
//! variable store. Branch arms and loop bodies run on a copy of the scope which
//! the caller adopts afterwards. A failing node records its error as its output
//! and the sequence carries on with the last good scope.

use crate::ast::{Condition, Node, NodeKind, OperatorKind, ValueExpr, collect_ids};
use crate::data::{Scope, VariableStore};
use crate::error::ExecutionError;
use crate::evaluator::{self, ExpressionEngine, SentimentClassifier, evaluate_condition};
use crate::model::{ModelCall, ModelCaller, ModelOptions};
use crate::template;
use ahash::AHashMap;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

const TARGET: &str = "blockflow::executor";

/// The record produced for one executed node.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub output: String,
    pub kind: NodeKind,
    pub model: Option<String>,
    pub tokens: Option<u64>,
    pub latency_ms: Option<u64>,
}

impl ExecutionResult {
    pub fn new(kind: NodeKind, output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            kind,
            model: None,
            tokens: None,
            latency_ms: None,
        }
    }

    fn with_call(mut self, call: &ModelCall) -> Self {
        self.model = Some(call.model.clone());
        self.tokens = Some(call.token_count);
        self.latency_ms = Some(call.latency_ms);
        self
    }

    fn with_metrics_from(mut self, other: &ExecutionResult) -> Self {
        self.model = other.model.clone();
        self.tokens = other.tokens;
        self.latency_ms = other.latency_ms;
        self
    }
}

/// Node id → result, iterated in the order nodes first reported.
///
/// A node that runs several times (inside a loop) keeps its first position and
/// holds the result of its latest run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunResults {
    order: Vec<String>,
    results: AHashMap<String, ExecutionResult>,
}

impl RunResults {
    pub fn insert(&mut self, id: &str, result: ExecutionResult) {
        if self.results.insert(id.to_string(), result).is_none() {
            self.order.push(id.to_string());
        }
    }

    pub fn get(&self, id: &str) -> Option<&ExecutionResult> {
        self.results.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExecutionResult)> {
        self.order
            .iter()
            .filter_map(|id| self.results.get(id).map(|result| (id.as_str(), result)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// The outcome of running a whole flow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowRun {
    pub results: RunResults,
    /// The current data value after the last node.
    pub data: String,
    pub variables: VariableStore,
}

/// Runs extracted flows, delegating model calls and sentiment checks.
#[derive(Clone)]
pub struct FlowExecutor {
    caller: ModelCaller,
    classifier: Option<Arc<dyn SentimentClassifier>>,
}

impl FlowExecutor {
    pub fn new(caller: ModelCaller) -> Self {
        Self {
            caller,
            classifier: None,
        }
    }

    /// Enables the `ai_sentiment` condition. Without a classifier it evaluates to false.
    pub fn with_classifier(mut self, classifier: Arc<dyn SentimentClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn caller(&self) -> &ModelCaller {
        &self.caller
    }

    /// Runs a flow from an empty scope.
    pub async fn run(&self, nodes: &[Node]) -> FlowRun {
        self.run_with_scope(nodes, Scope::default()).await
    }

    /// Runs a flow starting from the given data and variables.
    pub async fn run_with_scope(&self, nodes: &[Node], scope: Scope) -> FlowRun {
        let span = info_span!(target: TARGET, "flow_run", nodes = nodes.len());
        async move {
            let mut results = RunResults::default();
            let scope = self.run_sequence(nodes, scope, None, &mut results).await;
            info!(target: TARGET, results = results.len(), "Flow finished");
            FlowRun {
                results,
                data: scope.data,
                variables: scope.variables,
            }
        }
        .instrument(span)
        .await
    }

    fn run_sequence<'s>(
        &'s self,
        nodes: &'s [Node],
        scope: Scope,
        line: Option<&'s str>,
        results: &'s mut RunResults,
    ) -> BoxFuture<'s, Scope> {
        async move {
            let mut scope = scope;
            for node in nodes {
                debug!(target: TARGET, id = node.id(), kind = %node.kind(), "Executing node");
                match self.execute_node(node, &scope, line, results).await {
                    Ok(next) => scope = next,
                    Err(err) => {
                        warn!(target: TARGET, id = node.id(), error = %err, "Node failed");
                        results.insert(node.id(), ExecutionResult::new(node.kind(), err.to_string()));
                    }
                }
            }
            scope
        }
        .boxed()
    }

    /// Executes one node, records its result and returns the scope the next node sees.
    async fn execute_node(
        &self,
        node: &Node,
        scope: &Scope,
        line: Option<&str>,
        results: &mut RunResults,
    ) -> Result<Scope, ExecutionError> {
        let kind = node.kind();
        let engine = ExpressionEngine::new(&scope.data, &scope.variables, line);

        let (result, next) = match node {
            Node::Start { .. } => (ExecutionResult::new(kind, "Start flow"), scope.clone()),

            Node::TextInput { value, .. } => (
                ExecutionResult::new(kind, value.as_str()),
                Scope::new(value.as_str(), scope.variables.clone()),
            ),

            Node::VariableInput { expression, .. } => {
                let value = engine
                    .evaluate_to_string(expression)
                    .map_err(|e| ExecutionError::from_expression(kind, e))?;
                (
                    ExecutionResult::new(kind, value.as_str()),
                    Scope::new(value, scope.variables.clone()),
                )
            }

            Node::Model {
                provider,
                prompt_template,
                temperature,
                max_tokens,
                top_p,
                ..
            } => {
                if prompt_template.trim().is_empty() {
                    return Err(ExecutionError::Validation {
                        kind,
                        message: "No prompt provided".into(),
                    });
                }
                if provider.trim().is_empty() {
                    return Err(ExecutionError::Validation {
                        kind,
                        message: "No model selected".into(),
                    });
                }
                let prompt = template::substitute(prompt_template, &scope.data, &scope.variables, line);
                let options = ModelOptions {
                    temperature: *temperature,
                    max_tokens: *max_tokens,
                    top_p: *top_p,
                };
                let call = self
                    .caller
                    .call(&prompt, provider, options)
                    .await
                    .map_err(|source| ExecutionError::Model { kind, source })?;
                (
                    ExecutionResult::new(kind, call.text.as_str()).with_call(&call),
                    Scope::new(call.text, scope.variables.clone()),
                )
            }

            Node::Output { .. } => (ExecutionResult::new(kind, scope.data.as_str()), scope.clone()),

            Node::Branch {
                id,
                condition,
                then_branch,
                else_branch,
            } => {
                return self
                    .execute_branch(id, condition, then_branch, else_branch, scope, line, results)
                    .await;
            }

            Node::ForEachLine { id, body } => {
                return self.execute_loop(id, body, scope, results).await;
            }

            Node::SetVariable { name, value, .. } => {
                let value = engine
                    .evaluate_to_string(value)
                    .map_err(|e| ExecutionError::from_expression(kind, e))?;
                let mut variables = scope.variables.clone();
                variables
                    .set(name.trim(), value.as_str())
                    .map_err(|e| ExecutionError::InvalidVariableName { kind, name: e.0 })?;
                (
                    ExecutionResult::new(kind, format!("Set variable \"{}\" = \"{}\"", name.trim(), value)),
                    Scope::new(scope.data.as_str(), variables),
                )
            }

            Node::GetVariable { name, .. } | Node::VariableReporter { name, .. } => {
                let value = scope.variables.get(name).ok_or_else(|| ExecutionError::MissingVariable {
                    kind,
                    name: name.clone(),
                })?;
                (
                    ExecutionResult::new(kind, format!("Retrieved variable \"{}\" = \"{}\"", name, value)),
                    Scope::new(value, scope.variables.clone()),
                )
            }

            Node::Operator {
                operator, inputs, ..
            } => {
                let value = self.execute_operator(*operator, inputs, &engine)?;
                (
                    ExecutionResult::new(kind, value.as_str()),
                    Scope::new(value, scope.variables.clone()),
                )
            }
        };

        results.insert(node.id(), result);
        Ok(next)
    }

    fn execute_operator(
        &self,
        operator: OperatorKind,
        inputs: &[ValueExpr],
        engine: &ExpressionEngine<'_>,
    ) -> Result<String, ExecutionError> {
        let kind = NodeKind::Operator;
        let operands = inputs
            .iter()
            .map(|input| engine.evaluate_to_string(input))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ExecutionError::from_expression(kind, e))?;
        let value = evaluator::evaluate(operator, &operands)
            .map_err(|source| ExecutionError::Operator { kind, source })?;
        Ok(value.to_string())
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_branch(
        &self,
        id: &str,
        condition: &Condition,
        then_branch: &[Node],
        else_branch: &[Node],
        scope: &Scope,
        line: Option<&str>,
        results: &mut RunResults,
    ) -> Result<Scope, ExecutionError> {
        let kind = NodeKind::Branch;
        let taken = evaluate_condition(
            condition,
            &scope.data,
            &scope.variables,
            line,
            self.classifier.as_deref(),
        )
        .await
        .map_err(|source| ExecutionError::Condition { kind, source })?;

        let (arm, arm_name) = if taken {
            (then_branch, "THEN")
        } else {
            (else_branch, "ELSE")
        };
        let verdict = if taken { "TRUE" } else { "FALSE" };
        debug!(target: TARGET, id, condition = %condition, taken, "Branch evaluated");

        if arm.is_empty() {
            results.insert(
                id,
                ExecutionResult::new(kind, format!("Condition: {} → {} branch (empty)", verdict, arm_name)),
            );
            return Ok(scope.clone());
        }

        // Reserve the branch's slot so its record precedes the arm's records.
        results.insert(id, ExecutionResult::new(kind, ""));
        let after = self.run_sequence(arm, scope.clone(), line, results).await;

        let mut result = ExecutionResult::new(
            kind,
            format!(
                "Condition: {} → Executed {} branch\nResult: {}",
                verdict, arm_name, after.data
            ),
        );
        let mut arm_ids = Vec::new();
        collect_ids(arm, &mut arm_ids);
        if let Some(model) = arm_ids
            .iter()
            .filter_map(|arm_id| results.get(arm_id))
            .find(|record| record.kind == NodeKind::Model && record.model.is_some())
        {
            result = result.with_metrics_from(model);
        }
        results.insert(id, result);
        Ok(after)
    }

    async fn execute_loop(
        &self,
        id: &str,
        body: &[Node],
        scope: &Scope,
        results: &mut RunResults,
    ) -> Result<Scope, ExecutionError> {
        let kind = NodeKind::ForEachLine;
        if scope.data.trim().is_empty() {
            results.insert(id, ExecutionResult::new(kind, "No data to process (empty input)"));
            return Ok(scope.clone());
        }

        let lines: Vec<&str> = scope
            .data
            .split('\n')
            .filter(|line| !line.trim().is_empty())
            .collect();

        results.insert(id, ExecutionResult::new(kind, ""));
        let mut variables = scope.variables.clone();
        let mut outputs = Vec::with_capacity(lines.len());
        // Each iteration sees the whole input as data and the line as `{{line}}`.
        for line in &lines {
            if body.is_empty() {
                outputs.push(line.to_string());
                continue;
            }
            let iteration = Scope::new(scope.data.as_str(), variables);
            let after = self.run_sequence(body, iteration, Some(*line), results).await;
            outputs.push(after.data);
            variables = after.variables;
        }

        let joined = outputs.join("\n");
        debug!(target: TARGET, id, lines = lines.len(), "Loop finished");
        results.insert(
            id,
            ExecutionResult::new(kind, format!("Processed {} lines:\n{}", lines.len(), joined)),
        );
        Ok(Scope::new(joined, variables))
    }
}
