use std::time::Duration;

use crate::agent::client::{AgentClient, RunStatus, ToolCall, ToolOutput};
use crate::error::{AppError, Result};
use crate::models::order::{NewOrder, OrderLedger};

/// Arguments `add_order_row` requires before a row can be written
const REQUIRED_ORDER_PARAMS: [&str; 7] = [
    "first_name",
    "last_name",
    "address",
    "phone",
    "product",
    "price",
    "quantity",
];

/// Wait out any run still occupying the thread.
///
/// The agent API rejects new messages while a run is active, so before
/// touching a thread we poll lingering runs with exponential backoff
/// (2^attempt seconds). A run that outlives every attempt is logged and
/// left alone.
pub async fn wait_for_active_runs(client: &AgentClient, thread_id: &str) -> Result<()> {
    let runs = client.list_runs(thread_id).await?;

    for run in runs {
        if !run.status.is_active() {
            continue;
        }

        let max_attempts = client.config.max_backoff_attempts;
        let mut settled = false;

        for attempt in 0..max_attempts {
            tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
            let current = client.retrieve_run(thread_id, &run.id).await?;
            if current.status.is_terminal() {
                settled = true;
                break;
            }
        }

        if !settled {
            tracing::warn!(
                "Run {} still active after {} attempts",
                run.id,
                max_attempts
            );
        }
    }

    Ok(())
}

/// Create a run and poll it to completion, dispatching tool calls.
///
/// Polls on the configured fixed interval. `requires_action` dispatches
/// each requested tool call against the order ledger and submits the
/// outputs; `completed` returns the newest assistant message; every other
/// terminal state is surfaced as an agent error.
pub async fn run_to_completion(
    client: &AgentClient,
    ledger: &OrderLedger,
    thread_id: &str,
) -> Result<String> {
    let created = client.create_run(thread_id).await?;
    let run_id = created.id;

    loop {
        let mut run = client.retrieve_run(thread_id, &run_id).await?;

        match run.status {
            RunStatus::RequiresAction => {
                let action = run.required_action.take().ok_or_else(|| AppError::Agent {
                    status: 502,
                    message: format!("run {} requires action but lists no tool calls", run_id),
                })?;

                let mut outputs = Vec::new();
                for call in &action.submit_tool_outputs.tool_calls {
                    outputs.push(handle_tool_call(ledger, call)?);
                }

                client
                    .submit_tool_outputs(thread_id, &run_id, &outputs)
                    .await?;
            }
            RunStatus::Completed => break,
            RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired => {
                let message = run
                    .last_error
                    .map(|e| e.message)
                    .unwrap_or_else(|| format!("run ended with status {:?}", run.status));
                return Err(AppError::Agent {
                    status: 502,
                    message,
                });
            }
            status => {
                tracing::debug!("Run {} status: {:?}", run_id, status);
                tokio::time::sleep(client.config.poll_interval).await;
            }
        }
    }

    // Fetch messages after the run has completed; the reply is the newest
    // assistant message.
    let messages = client.list_messages(thread_id).await?;
    messages
        .iter()
        .find(|m| m.role == "assistant")
        .and_then(|m| m.text())
        .map(String::from)
        .ok_or_else(|| AppError::NotFound("assistant reply".to_string()))
}

/// Dispatch one tool call requested by the agent.
///
/// Only `add_order_row` is known. The updated ledger, serialized as JSON,
/// is returned to the agent as the tool output.
pub fn handle_tool_call(ledger: &OrderLedger, call: &ToolCall) -> Result<ToolOutput> {
    if call.function.name != "add_order_row" {
        return Err(AppError::InvalidInput(format!(
            "Unknown function: {}",
            call.function.name
        )));
    }

    let args: serde_json::Value = serde_json::from_str(&call.function.arguments)?;

    let missing: Vec<&str> = REQUIRED_ORDER_PARAMS
        .iter()
        .filter(|key| args.get(**key).map_or(true, |v| v.is_null()))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "Missing required parameters: {}",
            missing.join(", ")
        )));
    }

    let order: NewOrder = serde_json::from_value(args)?;
    let rows = ledger.append(order)?;

    Ok(ToolOutput {
        tool_call_id: call.id.clone(),
        output: serde_json::to_string(&rows)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::client::FunctionCall;

    fn call_with(arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            function: FunctionCall {
                name: "add_order_row".to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    #[test]
    fn test_dispatch_appends_order() {
        let dir = assert_fs::TempDir::new().unwrap();
        let ledger = OrderLedger::new(dir.path().join("orders.json"));

        let call = call_with(
            r#"{"first_name":"Sara","last_name":"Ahmadi","address":"12 Vali Asr",
                "phone":"0912000000","product":"red shoe","price":"250000","quantity":"1"}"#,
        );

        let output = handle_tool_call(&ledger, &call).unwrap();
        assert_eq!(output.tool_call_id, "call_1");
        assert!(output.output.contains("red shoe"));

        let rows = ledger.load().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, "1");
    }

    #[test]
    fn test_dispatch_reports_missing_params() {
        let dir = assert_fs::TempDir::new().unwrap();
        let ledger = OrderLedger::new(dir.path().join("orders.json"));

        let call = call_with(r#"{"first_name":"Sara","last_name":"Ahmadi"}"#);
        let err = handle_tool_call(&ledger, &call).unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Missing required parameters"));
        assert!(message.contains("address"));
        assert!(message.contains("quantity"));
        // Nothing was written
        assert!(ledger.load().unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_rejects_unknown_function() {
        let dir = assert_fs::TempDir::new().unwrap();
        let ledger = OrderLedger::new(dir.path().join("orders.json"));

        let call = ToolCall {
            id: "call_2".to_string(),
            function: FunctionCall {
                name: "delete_all_orders".to_string(),
                arguments: "{}".to_string(),
            },
        };

        let err = handle_tool_call(&ledger, &call).unwrap_err();
        assert!(err.to_string().contains("Unknown function"));
    }
}
