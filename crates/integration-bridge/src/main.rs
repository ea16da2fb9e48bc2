//! Integration bridge - feeds JSON-lines events through the rule engine

use anyhow::Context;
use rule_engine::{ActionSink, Dispatcher, IntegrationEvent, JsonLinesSink};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Outcome of handling one input line
#[derive(Debug, PartialEq, Eq)]
enum LineOutcome {
    Blank,
    Malformed,
    Dispatched,
    NoRule,
    Failed,
}

/// Decode one line and dispatch the event it carries
fn handle_line<S: ActionSink>(dispatcher: &Dispatcher<S>, line: &str) -> LineOutcome {
    let line = line.trim();
    if line.is_empty() {
        return LineOutcome::Blank;
    }

    let event: IntegrationEvent = match serde_json::from_str(line) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Skipping malformed event: {}", e);
            return LineOutcome::Malformed;
        }
    };

    match dispatcher.dispatch(&event) {
        Ok(Some(_)) => LineOutcome::Dispatched,
        Ok(None) => LineOutcome::NoRule,
        Err(_) => LineOutcome::Failed,
    }
}

/// Dispatch every event from `input`, stopping at the first delivery failure
async fn run<S, R>(dispatcher: &Dispatcher<S>, input: R) -> anyhow::Result<()>
where
    S: ActionSink,
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await.context("Failed to read event")? {
        line_no += 1;
        if handle_line(dispatcher, &line) == LineOutcome::Failed {
            anyhow::bail!("Action delivery failed for event on line {line_no}, stopping");
        }
    }

    Ok(())
}

/// Open the event input: the file named by `BRIDGE_EVENTS_FILE`, or stdin
async fn open_input() -> anyhow::Result<Box<dyn AsyncBufRead + Unpin>> {
    match std::env::var("BRIDGE_EVENTS_FILE") {
        Ok(path) => {
            tracing::info!("Reading events from {}", path);
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open events file {path}"))?;
            Ok(Box::new(BufReader::new(file)))
        }
        Err(_) => {
            tracing::info!("Reading events from stdin");
            Ok(Box::new(BufReader::new(tokio::io::stdin())))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only actions
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "integration_bridge=info,rule_engine=info".into()),
        )
        .init();

    tracing::info!("Starting integration bridge v{}", env!("CARGO_PKG_VERSION"));

    let dispatcher = Dispatcher::new(JsonLinesSink::new(std::io::stdout()));
    let result = run(&dispatcher, open_input().await?).await;

    let stats = dispatcher.stats();
    tracing::info!(
        "Processed {} events: {} dispatched, {} without rule, {} failed",
        stats.received,
        stats.matched,
        stats.no_rule,
        stats.failed
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rule_engine::{AutomationAction, CommandType, IntegrationError};

    struct OfflineExecutor;

    impl ActionSink for OfflineExecutor {
        fn send(&self, _action: &AutomationAction) -> Result<(), IntegrationError> {
            Err(IntegrationError::Sink("executor offline".to_string()))
        }
    }

    const MOTION: &str =
        r#"{"eventId":"m-1","type":"MOTION","sourceId":"sensor-1","timestamp":"2024-05-01T18:30:00Z"}"#;
    const DOORBELL: &str =
        r#"{"eventId":"d-1","type":"DOORBELL","sourceId":"doorbell-1","timestamp":"2024-05-01T18:31:00Z"}"#;

    #[test]
    fn test_handle_line_outcomes() {
        let dispatcher = Dispatcher::new(JsonLinesSink::new(Vec::new()));

        assert_eq!(handle_line(&dispatcher, "   "), LineOutcome::Blank);
        assert_eq!(handle_line(&dispatcher, "{not json"), LineOutcome::Malformed);
        assert_eq!(
            handle_line(&dispatcher, r#"{"eventId":"1","type":"MOTION"}"#),
            LineOutcome::Malformed
        );
        assert_eq!(
            handle_line(
                &dispatcher,
                r#"{"eventId":"2","type":"GENERIC","sourceId":"hook","timestamp":"2024-05-01T18:30:00Z"}"#
            ),
            LineOutcome::NoRule
        );
        assert_eq!(
            handle_line(
                &dispatcher,
                r#"{"eventId":"3","type":"DOORBELL","sourceId":"doorbell-1","timestamp":"2024-05-01T18:30:00Z"}"#
            ),
            LineOutcome::Dispatched
        );

        let stats = dispatcher.stats();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.matched, 1);

        let output = String::from_utf8(dispatcher.into_sink().into_inner()).unwrap();
        let action: AutomationAction = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(action.command_type, CommandType::SetBrightness);
        assert_eq!(action.brightness_override(), Some(255));
    }

    #[tokio::test]
    async fn test_reads_events_from_buffered_input() {
        let input = concat!(
            r#"{"eventId":"a","type":"ALEXA","sourceId":"alexa-skill","timestamp":"2024-05-01T18:30:00Z","payload":{"intent":"TurnOn"}}"#,
            "\n",
            r#"{"eventId":"b","type":"SPRINKLER","sourceId":"garden","timestamp":"2024-05-01T18:31:00Z"}"#,
            "\n"
        );
        let dispatcher = Dispatcher::new(JsonLinesSink::new(Vec::new()));
        let mut lines = BufReader::new(input.as_bytes()).lines();

        let mut outcomes = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            outcomes.push(handle_line(&dispatcher, &line));
        }

        assert_eq!(outcomes, vec![LineOutcome::Dispatched, LineOutcome::NoRule]);
    }

    #[test]
    fn test_handle_line_reports_failed_delivery() {
        let dispatcher = Dispatcher::new(OfflineExecutor);

        assert_eq!(handle_line(&dispatcher, MOTION), LineOutcome::Failed);
        assert_eq!(dispatcher.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_first_failed_delivery() {
        let dispatcher = Dispatcher::new(OfflineExecutor);
        let input = format!("{MOTION}\n{DOORBELL}\n");

        let err = run(&dispatcher, BufReader::new(input.as_bytes()))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("line 1"), "unexpected error: {err}");
        let stats = dispatcher.stats();
        assert_eq!(stats.received, 1);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_run_succeeds_when_all_actions_delivered() {
        let dispatcher = Dispatcher::new(JsonLinesSink::new(Vec::new()));
        let input = format!("{MOTION}\n\n{{broken\n{DOORBELL}\n");

        run(&dispatcher, BufReader::new(input.as_bytes()))
            .await
            .unwrap();

        assert_eq!(dispatcher.stats().matched, 2);
        let output = String::from_utf8(dispatcher.into_sink().into_inner()).unwrap();
        assert_eq!(output.lines().count(), 2);
    }
}
