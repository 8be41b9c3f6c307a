//! Command handlers. Each one drives the dashboard and prints plain text.

use std::path::Path;

use anyhow::{Context, bail};
use emailace_api::EmailRecord;
use emailace_core::{
    Dashboard, DerivedMetrics, DraftPhase, DraftReplySession, FilterSortParams, InboxCounts,
    QueryState, ReplyWorkflow, SortKey, Subscription, project,
};
use tracing::info;

use crate::settings::{Settings, save_settings};

pub async fn health(dashboard: &Dashboard) -> anyhow::Result<()> {
    let status = dashboard
        .health()
        .settled()
        .await
        .state()
        .map(Clone::clone);
    let status = ready(status).context("backend health check failed")?;
    println!(
        "{} at {} (database {})",
        status.status,
        status.timestamp.format("%Y-%m-%d %H:%M:%S"),
        if status.database_connected {
            "connected"
        } else {
            "disconnected"
        }
    );
    Ok(())
}

pub async fn inbox(
    dashboard: &Dashboard,
    search: String,
    sort: SortKey,
    server_search: bool,
    watch: bool,
) -> anyhow::Result<()> {
    if server_search {
        if search.is_empty() {
            bail!("--server-search needs --search <TEXT>");
        }
        let mut results = dashboard.search(&search);
        let params = FilterSortParams::new("", sort);
        loop {
            let snapshot = results.settled().await;
            let rows = snapshot.state().map(|emails| project(emails, &params));
            print_rows(&ready(rows)?);
            if watch {
                print_age(&results);
            }
            if !watch || !wait_for_change(results.changed()).await {
                return Ok(());
            }
        }
    }

    let mut view = dashboard.inbox(FilterSortParams::new(search, sort));
    loop {
        print_rows(&ready(view.settled().await)?);
        if watch {
            print_age(view.subscription());
        }
        if !watch || !wait_for_change(view.changed()).await {
            return Ok(());
        }
    }
}

pub async fn show(dashboard: &Dashboard, id: i64) -> anyhow::Result<()> {
    let email = fetch_email(dashboard, id).await?;

    println!("#{} {}", email.id, email.subject);
    println!("From:      {}", email.sender);
    println!("Date:      {}", email.timestamp.format("%Y-%m-%d %H:%M"));
    println!(
        "Triage:    {} / {} / {}{}",
        email.priority,
        email.sentiment,
        email.status,
        if email.is_urgent { " (urgent)" } else { "" }
    );
    if let Some(summary) = &email.summary {
        println!("Summary:   {summary}");
    }
    match email.parsed_entities() {
        Ok(Some(entities)) if !entities.is_empty() => {
            println!("Entities:");
            for (kind, value) in &entities {
                println!("  {kind}: {}", value.values().collect::<Vec<_>>().join(", "));
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("email {id} has unreadable entities: {e}"),
    }
    println!();
    println!("{}", email.body);
    if let Some(draft) = email.draft_reply.as_deref().filter(|d| !d.trim().is_empty()) {
        println!();
        println!("--- stored draft ---");
        println!("{draft}");
    }
    Ok(())
}

pub async fn analytics(dashboard: &Dashboard, watch: bool) -> anyhow::Result<()> {
    let mut view = dashboard.analytics_view();
    loop {
        print_metrics(&ready(view.settled().await)?);
        if !watch || !wait_for_change(view.changed()).await {
            return Ok(());
        }
    }
}

pub async fn reply(
    dashboard: &Dashboard,
    id: i64,
    prompt: Option<String>,
    text: Option<String>,
    send: bool,
) -> anyhow::Result<()> {
    let email = fetch_email(dashboard, id).await?;
    let has_stored_draft = email
        .draft_reply
        .as_deref()
        .is_some_and(|d| !d.trim().is_empty());

    let workflow = if prompt.is_some() || (text.is_none() && !has_stored_draft) {
        let workflow = dashboard.reply(id);
        workflow.generate(prompt).await?;
        workflow
    } else {
        dashboard.reply_to(&email)
    };

    let workflow = match text {
        Some(text) if workflow.phase() == DraftPhase::NoDraft => {
            ReplyWorkflow::new(dashboard.clone(), DraftReplySession::with_draft(id, text))
        }
        Some(text) => {
            workflow.edit(text)?;
            workflow
        }
        None => workflow,
    };

    let session = workflow.session();
    if let Some(draft) = session.classification() {
        println!("Re-classified as {} / {}: {}", draft.priority, draft.sentiment, draft.summary);
    }
    println!("--- reply to #{id} ---");
    println!("{}", session.buffer());

    if send {
        workflow.send().await?;
        info!("reply to {id} sent");
        println!("--- sent ---");
    }
    Ok(())
}

pub async fn archive(dashboard: &Dashboard, id: i64) -> anyhow::Result<()> {
    let message = dashboard
        .archive(id)
        .await
        .with_context(|| format!("archiving email {id}"))?;
    println!("{}", message.message);
    Ok(())
}

pub async fn sync(dashboard: &Dashboard) -> anyhow::Result<()> {
    let report = dashboard.sync().await.context("syncing mail")?;
    println!("{} ({} new)", report.message, report.synced_count);
    Ok(())
}

pub async fn settings(settings: &Settings, path: &Path, save: bool) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    if save {
        save_settings(path, settings).await?;
        println!("saved to {}", path.display());
    }
    Ok(())
}

async fn fetch_email(dashboard: &Dashboard, id: i64) -> anyhow::Result<EmailRecord> {
    let snapshot = dashboard.email(id).settled().await;
    ready(snapshot.state().map(Clone::clone)).with_context(|| format!("loading email {id}"))
}

fn ready<T>(state: QueryState<T>) -> anyhow::Result<T> {
    match state {
        QueryState::Ready(value) => Ok(value),
        QueryState::Failed(error) => Err(error.into()),
        QueryState::Loading => bail!("no data yet"),
    }
}

/// Waits for `changed` or Ctrl-C. Returns false when it is time to stop.
async fn wait_for_change<T>(changed: impl Future<Output = Option<T>>) -> bool {
    tokio::select! {
        result = changed => result.is_some(),
        _ = tokio::signal::ctrl_c() => false,
    }
}

fn print_rows(emails: &[EmailRecord]) {
    if emails.is_empty() {
        println!("(no emails)");
        return;
    }
    for email in emails {
        println!(
            "{:>5}  {:<16}  {:<6}  {:<8}  {:<8}  {:<28}  {}",
            email.id,
            email.timestamp.format("%Y-%m-%d %H:%M"),
            email.priority,
            email.status,
            email.sentiment,
            email.sender,
            email.subject
        );
    }
    let counts = InboxCounts::of(emails);
    println!(
        "{} emails, {} pending, {} urgent",
        emails.len(),
        counts.pending,
        counts.urgent
    );
}

fn print_age<T: Send + Sync + 'static>(subscription: &Subscription<T>) {
    if let Some(age) = subscription.age() {
        println!("(updated {}s ago, watching)", age.num_seconds());
    }
}

fn print_metrics(metrics: &DerivedMetrics) {
    println!("Total:      {}", metrics.total);
    println!(
        "Resolved:   {} ({})",
        metrics.resolution_rate.part(),
        metrics.resolution_rate
    );
    println!(
        "Pending:    {} ({})",
        metrics.pending_rate.part(),
        metrics.pending_rate
    );
    println!(
        "Urgent:     {} ({})",
        metrics.urgent_rate.part(),
        metrics.urgent_rate
    );
    println!("Sentiment:");
    for share in &metrics.sentiment {
        println!("  {:<10} {:>5} ({})", share.label, share.count, share.ratio);
    }
    println!("Priority:");
    for share in &metrics.priority {
        println!("  {:<10} {:>5} ({})", share.label, share.count, share.ratio);
    }
}
