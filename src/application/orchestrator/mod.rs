//! The state machine driver.
//!
//! Every user input or tool result runs under the session's distributed
//! lock and produces a deterministic sequence of events. The three public
//! operations are the only lock holders; a `tool` action never blocks the
//! orchestrator, because tool completion re-enters `process_tool_result`
//! under a fresh lock acquisition.

mod executor;

pub use executor::{RetryPolicy, ToolRegistry};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::domain::flow::{
    evaluate, resolve, resolve_template_string, render_value, Action, FlowConfig, TemplateEnv,
    Transition,
};
use crate::domain::foundation::{set_path, SessionId, Timestamp, ToolCallId};
use crate::domain::session::{SessionEvent, SessionState, ToolCallRecord, ToolResultRecord};
use crate::ports::{ClassifierError, IntentClassifier, SessionStore, StoreError};
use serde_json::{Map, Value};

/// Pause before the apologetic `say` of a soft re-prompt.
const REPROMPT_APOLOGY_DELAY: Duration = Duration::from_millis(1_000);

/// Additional pause before the state's `ask` is repeated.
const REPROMPT_ASK_DELAY: Duration = Duration::from_millis(500);

const REPROMPT_TEXT: &str = "I didn't quite understand that. Let me ask again:";

/// Errors surfaced by orchestrator operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error("Unknown state: {0}")]
    UnknownState(String),
}

/// The conversational FSM driver.
///
/// Holds only the tool registry and its collaborator ports; all session
/// state lives in the store.
pub struct Orchestrator {
    store: Arc<dyn SessionStore>,
    classifier: Arc<dyn IntentClassifier>,
    tools: Arc<ToolRegistry>,
    retry: RetryPolicy,
    reprompt_delays: (Duration, Duration),
}

impl Orchestrator {
    /// Creates an orchestrator over the given ports.
    pub fn new(
        store: Arc<dyn SessionStore>,
        classifier: Arc<dyn IntentClassifier>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            store,
            classifier,
            tools,
            retry: RetryPolicy::default(),
            reprompt_delays: (REPROMPT_APOLOGY_DELAY, REPROMPT_ASK_DELAY),
        }
    }

    /// Overrides the tool retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the soft re-prompt pacing (mainly for tests).
    pub fn with_reprompt_delays(mut self, apology: Duration, ask: Duration) -> Self {
        self.reprompt_delays = (apology, ask);
        self
    }

    /// The session store this orchestrator drives.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Creates a session bound to an already validated flow and executes
    /// the start state's `onEnter`.
    pub async fn create_session(
        self: &Arc<Self>,
        flow: FlowConfig,
        session_id: Option<SessionId>,
    ) -> Result<SessionId, EngineError> {
        let session_id = session_id.unwrap_or_default();
        let state = SessionState::new(session_id, flow.start.clone());
        self.store.create_session(&state, &flow).await?;

        let start = flow.start.clone();
        self.with_lock(&session_id, || async {
            self.enter_state(&session_id, &flow, &start).await
        })
        .await?;
        Ok(session_id)
    }

    /// Classifies user text and advances the FSM.
    pub async fn process_user_input(
        self: &Arc<Self>,
        session_id: &SessionId,
        text: &str,
    ) -> Result<(), EngineError> {
        self.with_lock(session_id, || async {
            self.step_user_input(session_id, text).await
        })
        .await
    }

    /// Feeds a tool result back into the FSM.
    pub async fn process_tool_result(
        self: &Arc<Self>,
        session_id: &SessionId,
        tool_call_id: ToolCallId,
        result: Value,
    ) -> Result<(), EngineError> {
        self.with_lock(session_id, || async {
            self.step_tool_result(session_id, tool_call_id, result.clone())
                .await
        })
        .await
    }

    /// Runs one operation under the session lock, failing fast when the
    /// lock is held. Lock scopes never nest on the same session.
    async fn with_lock<T, F, Fut>(
        &self,
        session_id: &SessionId,
        operation: F,
    ) -> Result<T, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let nonce = self.store.acquire_lock(session_id).await?;
        let result = operation().await;
        if let Err(e) = self.store.release_lock(session_id, &nonce).await {
            tracing::warn!(%session_id, error = %e, "Failed to release session lock");
        }
        result
    }

    // ============================================
    // FSM steps (callers hold the session lock)
    // ============================================

    async fn step_user_input(
        self: &Arc<Self>,
        session_id: &SessionId,
        text: &str,
    ) -> Result<(), EngineError> {
        let flow = self.store.load_flow(session_id).await?;
        let state = self.store.load_state(session_id).await?;

        let classification = self
            .classifier
            .classify(text, &flow.intents, &state.context)
            .await?;
        tracing::debug!(
            %session_id,
            intent = %classification.name,
            confidence = classification.confidence,
            "Classified user input"
        );
        let state = self.store.store_intent(session_id, &classification).await?;

        let current = flow
            .state(&state.current_state)
            .ok_or_else(|| EngineError::UnknownState(state.current_state.clone()))?;

        for transition in &current.transitions {
            let Some(matcher) = &transition.on_intent else {
                continue;
            };
            if !matcher.matches(&classification.name) {
                continue;
            }
            // Guards see the context before this transition's assignments.
            if let Some(when) = &transition.when {
                if !evaluate(when, &state.context, None) {
                    continue;
                }
            }
            return self
                .execute_transition(session_id, &flow, &state, transition, None)
                .await;
        }

        self.store
            .emit(
                session_id,
                SessionEvent::IntentUnhandled {
                    intent: classification.name.clone(),
                    confidence: classification.confidence,
                    current_state: state.current_state.clone(),
                },
            )
            .await?;
        self.schedule_reprompt(*session_id);
        Ok(())
    }

    async fn step_tool_result(
        self: &Arc<Self>,
        session_id: &SessionId,
        tool_call_id: ToolCallId,
        result: Value,
    ) -> Result<(), EngineError> {
        let flow = self.store.load_flow(session_id).await?;
        let record = ToolResultRecord {
            call_id: tool_call_id,
            result,
            timestamp: Timestamp::now(),
        };
        let state = self.store.store_tool_result(session_id, &record).await?;

        let Some(call) = state
            .last_tool_call
            .as_ref()
            .filter(|call| call.id == tool_call_id)
        else {
            tracing::warn!(
                %session_id,
                %tool_call_id,
                "Tool result does not answer the most recent call; not advancing"
            );
            return Ok(());
        };
        let tool_name = call.name.clone();

        let current = flow
            .state(&state.current_state)
            .ok_or_else(|| EngineError::UnknownState(state.current_state.clone()))?;

        for transition in &current.transitions {
            let Some(on_tool_result) = &transition.on_tool_result else {
                continue;
            };
            if *on_tool_result != tool_name {
                continue;
            }
            if let Some(when) = &transition.when {
                if !evaluate(when, &state.context, Some(&record.result)) {
                    continue;
                }
            }
            return self
                .execute_transition(session_id, &flow, &state, transition, Some(&record.result))
                .await;
        }

        tracing::debug!(%session_id, tool = %tool_name, "No transition matched tool result");
        Ok(())
    }

    /// Executes a matched transition: assignments, then branch or direct
    /// target.
    ///
    /// `fresh_tool_result` is bound as the `tool` environment when the
    /// trigger was a tool result; intent triggers fall back to the last
    /// stored result.
    async fn execute_transition(
        self: &Arc<Self>,
        session_id: &SessionId,
        flow: &FlowConfig,
        state: &SessionState,
        transition: &Transition,
        fresh_tool_result: Option<&Value>,
    ) -> Result<(), EngineError> {
        let slots = state.last_intent.as_ref().map(|intent| &intent.slots);
        let stored_result = state.last_tool_result.as_ref().map(|r| &r.result);
        let tool = fresh_tool_result.or(stored_result);

        let mut context = state.context.clone();
        if let Some(assign) = &transition.assign {
            let env = TemplateEnv {
                ctx: Some(&state.context),
                slot: slots,
                tool,
            };
            let mut patch = Value::Object(Map::new());
            for (path, template) in assign {
                set_path(&mut patch, path, resolve(template, &env));
            }
            let updated = self.store.update_context(session_id, &patch).await?;
            context = updated.context;
        }

        // Branch wins when both `branch` and `to` are present; its guards
        // see the post-assign context.
        let target = if let Some(branches) = &transition.branch {
            branches
                .iter()
                .find(|branch| evaluate(&branch.when, &context, tool))
                .map(|branch| branch.to.as_str())
        } else {
            transition.to.as_deref()
        };

        match target {
            Some(next) => self.enter_state(session_id, flow, next).await,
            None => {
                tracing::debug!(%session_id, "No branch matched; staying in current state");
                Ok(())
            }
        }
    }

    /// Moves the FSM to `next` and executes the target state's `onEnter`
    /// actions in declaration order.
    async fn enter_state(
        self: &Arc<Self>,
        session_id: &SessionId,
        flow: &FlowConfig,
        next: &str,
    ) -> Result<(), EngineError> {
        let target = flow
            .state(next)
            .ok_or_else(|| EngineError::UnknownState(next.to_string()))?;

        let state = self.store.transition_to_state(session_id, next).await?;

        for action in &target.on_enter {
            let env = TemplateEnv {
                ctx: Some(&state.context),
                slot: state.last_intent.as_ref().map(|intent| &intent.slots),
                tool: state.last_tool_result.as_ref().map(|r| &r.result),
            };
            match action {
                Action::Say { text } => {
                    let text = render_value(&resolve_template_string(text, &env));
                    self.store
                        .emit(session_id, SessionEvent::Say { text })
                        .await?;
                }
                Action::Ask { text } => {
                    let text = render_value(&resolve_template_string(text, &env));
                    self.store
                        .emit(session_id, SessionEvent::Ask { text })
                        .await?;
                }
                Action::Transfer { target } => {
                    let target = render_value(&resolve_template_string(target, &env));
                    self.store
                        .emit(session_id, SessionEvent::Transfer { target })
                        .await?;
                }
                Action::Hangup => {
                    self.store.emit(session_id, SessionEvent::Hangup).await?;
                }
                Action::Tool { name, args } => {
                    self.dispatch_tool(session_id, flow, &state, name, args)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Emits `tool.call` and hands the execution to a background task.
    ///
    /// The lock is held only for the emission and the handoff; the worker
    /// completes through `process_tool_result` under a fresh acquisition.
    async fn dispatch_tool(
        self: &Arc<Self>,
        session_id: &SessionId,
        flow: &FlowConfig,
        state: &SessionState,
        name: &str,
        args_template: &Value,
    ) -> Result<(), EngineError> {
        let env = TemplateEnv::with_ctx_and_tool(
            &state.context,
            state.last_tool_result.as_ref().map(|r| &r.result),
        );
        let args = resolve(args_template, &env);

        let record = ToolCallRecord {
            id: ToolCallId::new(),
            name: name.to_string(),
            args: args.clone(),
            timestamp: Timestamp::now(),
        };
        self.store.store_tool_call(session_id, &record).await?;

        executor::spawn_tool_task(
            Arc::clone(self),
            *session_id,
            record,
            flow.tool_timeout(name),
            self.retry.clone(),
        );
        Ok(())
    }

    /// Schedules the soft re-prompt after an unhandled intent.
    ///
    /// Pacing is UX shaping, not correctness; the task tolerates the
    /// session disappearing between schedule and fire.
    fn schedule_reprompt(self: &Arc<Self>, session_id: SessionId) {
        let orchestrator = Arc::clone(self);
        let (apology_delay, ask_delay) = self.reprompt_delays;

        tokio::spawn(async move {
            tokio::time::sleep(apology_delay).await;
            if !orchestrator.session_alive(&session_id).await {
                return;
            }
            if let Err(e) = orchestrator
                .store
                .emit(
                    &session_id,
                    SessionEvent::Say {
                        text: REPROMPT_TEXT.to_string(),
                    },
                )
                .await
            {
                tracing::debug!(%session_id, error = %e, "Re-prompt apology skipped");
                return;
            }

            tokio::time::sleep(ask_delay).await;
            let loaded = tokio::try_join!(
                orchestrator.store.load_flow(&session_id),
                orchestrator.store.load_state(&session_id)
            );
            let Ok((flow, state)) = loaded else {
                return;
            };
            let Some(ask) = flow
                .state(&state.current_state)
                .and_then(|def| def.ask_action())
            else {
                return;
            };
            if let Action::Ask { text } = ask {
                let env = TemplateEnv {
                    ctx: Some(&state.context),
                    slot: state.last_intent.as_ref().map(|intent| &intent.slots),
                    tool: state.last_tool_result.as_ref().map(|r| &r.result),
                };
                let text = render_value(&resolve_template_string(text, &env));
                if let Err(e) = orchestrator
                    .store
                    .emit(&session_id, SessionEvent::Ask { text })
                    .await
                {
                    tracing::debug!(%session_id, error = %e, "Re-prompt ask skipped");
                }
            }
        });
    }

    async fn session_alive(&self, session_id: &SessionId) -> bool {
        self.store
            .session_exists(session_id)
            .await
            .unwrap_or(false)
    }
}
