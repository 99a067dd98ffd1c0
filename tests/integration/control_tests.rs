use super::*;
use restock_watcher::control::{Command, Flow};
use restock_watcher::models::{Availability, TargetState};
use tokio::sync::mpsc;
use tokio_test::assert_ok;

fn joined(lines: &[String]) -> String {
    lines.join("\n")
}

#[tokio::test]
async fn test_start_alerts_runs_initial_pass_once() -> anyhow::Result<()> {
    let app = create_test_app(&[("tcg", &["booster-box"])])?;
    let target = app.target(0, 0);
    app.fetcher.script(&target.url, vec![in_stock_page("$10.00")]);

    let reply = app.control.execute(&Command::StartAlerts).await;
    let output = joined(&reply.lines);
    assert!(output.contains("✅ Alerts enabled"));
    assert!(output.contains("alerts sent 1"));
    assert_eq!(reply.flow, Flow::Continue);

    let again = app.control.execute(&Command::StartAlerts).await;
    assert!(joined(&again.lines).contains("already enabled"));
    assert_eq!(app.notifier.count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_check_stock_reports_without_side_effects() -> anyhow::Result<()> {
    let app = create_test_app(&[("tcg", &["booster-box", "elite-trainer-box"])])?;
    let in_stock = app.target(0, 0);
    let sold_out = app.target(0, 1);
    app.fetcher.script(&in_stock.url, vec![in_stock_page("$249.95")]);
    app.fetcher.script(&sold_out.url, vec![out_of_stock_page()]);

    let reply = app.control.execute(&Command::CheckStock).await;

    assert_eq!(
        reply.lines,
        vec![
            "✅ [tcg] Booster Box: IN STOCK ($249.95)".to_string(),
            "❌ [tcg] Elite Trainer Box: OUT OF STOCK".to_string(),
        ]
    );
    assert_eq!(app.notifier.count(), 0);
    assert!(app.states.snapshot().await.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_test_webhook_reports_per_group() -> anyhow::Result<()> {
    let app = create_test_app(&[("tcg", &["booster-box"]), ("figures", &["statue"])])?;

    let reply = app.control.execute(&Command::TestWebhook).await;

    assert_eq!(
        reply.lines,
        vec![
            "✅ [tcg] test message sent".to_string(),
            "✅ [figures] test message sent".to_string(),
        ]
    );
    assert_eq!(app.notifier.count_kind(&EventKind::Test), 2);

    Ok(())
}

#[tokio::test]
async fn test_send_alert_list_reports_failures() -> anyhow::Result<()> {
    let app = create_test_app(&[("tcg", &["booster-box", "elite-trainer-box"])])?;
    app.notifier.set_failing(true);

    let reply = app.control.execute(&Command::SendAlertList).await;

    assert_eq!(
        reply.lines,
        vec![
            "❌ [tcg] product list failed: Delivery failed with status 500: internal error"
                .to_string()
        ]
    );

    let sent = app.notifier.sent();
    assert_eq!(sent[0].event.kind, EventKind::Summary);
    assert_eq!(sent[0].event.lines.len(), 2);
    assert!(sent[0].event.lines[0].starts_with("[Booster Box]("));

    Ok(())
}

#[tokio::test]
async fn test_status_shows_flags_phase_and_states() -> anyhow::Result<()> {
    let app = create_test_app(&[("tcg", &["booster-box", "elite-trainer-box"])])?;
    app.states.set(&app.target(0, 0), Availability::InStock).await;
    app.control.execute(&Command::StopOutOfStock).await;

    let reply = app.control.execute(&Command::Status).await;

    assert_eq!(
        reply.lines,
        vec![
            "Alerts: off".to_string(),
            "Out-of-stock alerts: muted".to_string(),
            "Scheduler: idle".to_string(),
            "[tcg]".to_string(),
            "  Booster Box: IN STOCK".to_string(),
            "  Elite Trainer Box: NOT CHECKED YET".to_string(),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_list_shows_groups_and_targets() -> anyhow::Result<()> {
    let app = create_test_app(&[("tcg", &["booster-box"]), ("figures", &["statue"])])?;

    let reply = app.control.execute(&Command::List).await;

    assert_eq!(
        reply.lines,
        vec![
            "[tcg] 1 products".to_string(),
            format!("  Booster Box - {}", product_url("booster-box")),
            "[figures] 1 products".to_string(),
            format!("  Statue - {}", product_url("statue")),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_oos_toggles_warn_when_unchanged() -> anyhow::Result<()> {
    let app = create_test_app(&[("tcg", &["booster-box"])])?;

    let first = app.control.execute(&Command::StopOutOfStock).await;
    assert_eq!(first.lines, vec!["🔕 Out-of-stock alerts muted".to_string()]);
    let repeated = app.control.execute(&Command::StopOutOfStock).await;
    assert!(joined(&repeated.lines).contains("already muted"));
    assert!(app.flags.suppress_out_of_stock());

    let resumed = app.control.execute(&Command::StartOutOfStock).await;
    assert_eq!(resumed.lines, vec!["🔔 Out-of-stock alerts unmuted".to_string()]);
    let repeated = app.control.execute(&Command::StartOutOfStock).await;
    assert!(joined(&repeated.lines).contains("already on"));
    assert!(!app.flags.suppress_out_of_stock());

    Ok(())
}

#[tokio::test]
async fn test_command_loop_until_quit() -> anyhow::Result<()> {
    let app = create_test_app(&[("tcg", &["booster-box"])])?;
    let (tx, rx) = mpsc::channel(8);

    for line in ["help", "", "   ", "buy_everything", "QUIT", "status"] {
        tx.send(line.to_string()).await?;
    }

    let mut out = Vec::new();
    assert_ok!(app.control.run(rx, &mut out).await);
    let output = String::from_utf8(out)?;

    assert!(output.starts_with("🔔 Restock Watcher watching 1 products in 1 groups"));
    assert!(output.contains("Unknown command 'buy_everything'"));
    assert!(output.contains("👋 Stopping monitor"));
    // Nothing after quit is processed
    assert!(!output.contains("Alerts: off"));

    Ok(())
}

#[tokio::test]
async fn test_command_loop_ends_when_input_closes() -> anyhow::Result<()> {
    let app = create_test_app(&[("tcg", &["booster-box"])])?;
    let (tx, rx) = mpsc::channel(8);

    tx.send("stop_oos".to_string()).await?;
    drop(tx);

    let mut out = Vec::new();
    assert_ok!(app.control.run(rx, &mut out).await);

    let output = String::from_utf8(out)?;
    assert!(output.contains("Out-of-stock alerts muted"));
    assert!(app.flags.suppress_out_of_stock());
    assert_eq!(app.states.get(&app.target(0, 0)).await, TargetState::NeverObserved);

    Ok(())
}
