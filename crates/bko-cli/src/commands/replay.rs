//! `bko replay` / `bko status`: run an attempt feed through the engine.
//!
//! The feed is the desk's stand-in for a live sourcing backend: each action
//! carries the granted quantity that backend reported. Failures name the
//! offending feed action by index so a broken feed is fixable by hand.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;

use bko_audit::{DeskAuditWriter, DeskEventKind};
use bko_config::{load_layered, report_unknown_keys, DeskConfig, UnknownKeyPolicy};
use bko_fulfilment::{
    DocumentId, FulfilmentDesk, LineId, LineItem, OrderId, SourcingAttempt, WebOrder,
};
use bko_schemas::{
    AttemptFeedFile, AttemptRecordedPayload, DocumentOpenedPayload, FeedAction,
    ManualClosurePayload, OrderBookFile, OrderStatusChangedPayload,
};

/// Per-order slice of the replay report.
#[derive(Debug, Serialize)]
struct OrderReport {
    order_id: String,
    customer: String,
    aggregate_status: String,
    lines: Vec<LineReport>,
}

#[derive(Debug, Serialize)]
struct LineReport {
    line_id: String,
    status: String,
    qty_requested: u32,
    qty_fulfilled: u32,
    qty_pending: u32,
    retry_count: u32,
    active: bool,
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    actions_applied: usize,
    audit_events_written: u64,
    orders: Vec<OrderReport>,
}

pub fn run(
    orders_path: &str,
    feed_path: &str,
    audit_path: Option<&str>,
    config_paths: &[String],
    json: bool,
) -> Result<()> {
    let mut desk = load_order_book(orders_path)?;
    let feed = load_feed(feed_path)?;

    let desk_config = load_desk_config(config_paths)?;
    let mut audit = match (audit_path, &desk_config) {
        // An explicit --audit path wins over the configured sink.
        (Some(p), _) => Some(DeskAuditWriter::new(p, true)?),
        (None, Some(cfg)) => Some(DeskAuditWriter::new(&cfg.audit.path, cfg.audit.hash_chain)?),
        (None, None) => None,
    };

    let applied = apply_feed(&mut desk, &feed, audit.as_mut())?;
    let events_written = audit.as_ref().map(|w| w.seq()).unwrap_or(0);

    let report = build_report(&desk, applied, events_written);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text_report(&report);
    }
    Ok(())
}

pub fn run_status_only(orders_path: &str, feed_path: &str) -> Result<()> {
    let mut desk = load_order_book(orders_path)?;
    let feed = load_feed(feed_path)?;
    apply_feed(&mut desk, &feed, None)?;

    for order in desk.orders() {
        let status = bko_fulfilment::compute_aggregate_status(order);
        println!("{} {}", order.id, status.as_str());
    }
    Ok(())
}

fn load_desk_config(config_paths: &[String]) -> Result<Option<DeskConfig>> {
    if config_paths.is_empty() {
        return Ok(None);
    }
    let refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = load_layered(&refs)?;
    report_unknown_keys(&loaded.config_json, UnknownKeyPolicy::Warn)?;

    let cfg = DeskConfig::from_value(&loaded.config_json)?;
    tracing::info!(
        desk_id = %cfg.desk.desk_id,
        config_hash = %loaded.config_hash,
        "desk config loaded"
    );
    Ok(Some(cfg))
}

/// Load the order book and seed a fresh desk with it.
pub fn load_order_book(path: &str) -> Result<FulfilmentDesk> {
    let raw = fs::read_to_string(path).with_context(|| format!("read order book {path}"))?;
    let book: OrderBookFile =
        serde_json::from_str(&raw).with_context(|| format!("parse order book {path}"))?;

    let mut desk = FulfilmentDesk::new();
    for record in book.orders {
        let items: Vec<LineItem> = record
            .lines
            .iter()
            .map(|l| {
                LineItem::new(
                    LineId::new(l.line_id.clone()),
                    l.sku.clone(),
                    l.product_name.clone(),
                    l.qty_requested,
                )
            })
            .collect();
        desk.insert_order(WebOrder::new(
            OrderId::new(record.id),
            record.customer,
            record.created_at,
            items,
        ));
    }
    Ok(desk)
}

fn load_feed(path: &str) -> Result<AttemptFeedFile> {
    let raw = fs::read_to_string(path).with_context(|| format!("read attempt feed {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parse attempt feed {path}"))
}

/// Apply every feed action in order. Desk refusals abort the replay with
/// the action index; the audit log (when enabled) mirrors each applied
/// action plus order-level status changes.
pub fn apply_feed(
    desk: &mut FulfilmentDesk,
    feed: &AttemptFeedFile,
    mut audit: Option<&mut DeskAuditWriter>,
) -> Result<usize> {
    for (idx, action) in feed.actions.iter().enumerate() {
        apply_action(desk, action, audit.as_deref_mut())
            .with_context(|| format!("feed action #{idx} failed"))?;
    }
    Ok(feed.actions.len())
}

fn apply_action(
    desk: &mut FulfilmentDesk,
    action: &FeedAction,
    audit: Option<&mut DeskAuditWriter>,
) -> Result<()> {
    match action {
        FeedAction::OpenDocument {
            order_id,
            line_id,
            channel,
            stage,
            document_id,
        } => {
            let oid = OrderId::new(order_id.clone());
            let snapshot = desk.open_sourcing_document(
                &oid,
                &LineId::new(line_id.clone()),
                *channel,
                *stage,
                DocumentId::new(document_id.clone()),
            )?;

            if let Some(writer) = audit {
                let payload = DocumentOpenedPayload {
                    order_id: order_id.clone(),
                    line_id: line_id.clone(),
                    channel: *channel,
                    stage: *stage,
                    document_id: document_id.clone(),
                    status_after: snapshot.status.as_str().to_string(),
                };
                writer.append(DeskEventKind::DocumentOpened, serde_json::to_value(&payload)?)?;
            }
        }

        FeedAction::Attempt {
            order_id,
            line_id,
            channel,
            qty_requested,
            qty_granted,
            document_id,
        } => {
            if qty_granted > qty_requested {
                anyhow::bail!(
                    "attempt on {line_id} grants {qty_granted} but requested {qty_requested}"
                );
            }

            let oid = OrderId::new(order_id.clone());
            let before = desk.aggregate_status(&oid)?;

            let attempt = SourcingAttempt::new(
                LineId::new(line_id.clone()),
                *channel,
                *qty_requested,
                *qty_granted,
                document_id.clone().map(DocumentId::new),
            );
            let snapshot = desk.record_sourcing_attempt(&oid, attempt)?;
            let after = desk.aggregate_status(&oid)?;

            if let Some(writer) = audit {
                let payload = AttemptRecordedPayload {
                    order_id: order_id.clone(),
                    line_id: line_id.clone(),
                    channel: *channel,
                    qty_requested: *qty_requested,
                    qty_granted: *qty_granted,
                    document_id: document_id.clone(),
                    status_after: snapshot.status.as_str().to_string(),
                    spawned_line_id: snapshot
                        .superseded_by
                        .as_ref()
                        .map(|id| id.as_str().to_string()),
                };
                writer.append(DeskEventKind::AttemptRecorded, serde_json::to_value(&payload)?)?;

                if before != after {
                    let change = OrderStatusChangedPayload {
                        order_id: order_id.clone(),
                        from: before.as_str().to_string(),
                        to: after.as_str().to_string(),
                    };
                    writer.append(
                        DeskEventKind::OrderStatusChanged,
                        serde_json::to_value(&change)?,
                    )?;
                }
            }
        }

        FeedAction::Close {
            order_id,
            line_id,
            reason,
        } => {
            let oid = OrderId::new(order_id.clone());
            desk.manual_closure(&oid, &LineId::new(line_id.clone()), reason)?;

            if let Some(writer) = audit {
                let payload = ManualClosurePayload {
                    order_id: order_id.clone(),
                    line_id: line_id.clone(),
                    reason: reason.clone(),
                };
                writer.append(DeskEventKind::ManualClosure, serde_json::to_value(&payload)?)?;
            }
        }
    }
    Ok(())
}

fn build_report(desk: &FulfilmentDesk, applied: usize, events_written: u64) -> ReplayReport {
    let orders = desk
        .orders()
        .map(|order| OrderReport {
            order_id: order.id.as_str().to_string(),
            customer: order.customer.clone(),
            aggregate_status: bko_fulfilment::compute_aggregate_status(order)
                .as_str()
                .to_string(),
            lines: order.line_items.iter().map(line_report).collect(),
        })
        .collect();

    ReplayReport {
        actions_applied: applied,
        audit_events_written: events_written,
        orders,
    }
}

fn line_report(li: &LineItem) -> LineReport {
    LineReport {
        line_id: li.line_id.as_str().to_string(),
        status: li.status.as_str().to_string(),
        qty_requested: li.qty_requested,
        qty_fulfilled: li.qty_fulfilled,
        qty_pending: li.qty_pending(),
        retry_count: li.retry_count,
        active: li.is_active(),
    }
}

fn print_text_report(report: &ReplayReport) {
    println!(
        "applied {} feed action(s), {} audit event(s) written",
        report.actions_applied, report.audit_events_written
    );
    for order in &report.orders {
        println!(
            "{} ({}) -> {}",
            order.order_id, order.customer, order.aggregate_status
        );
        for line in &order.lines {
            let marker = if line.active { " " } else { "*" };
            println!(
                "  {}{} {} fulfilled {}/{} pending {} retries {}",
                marker,
                line.line_id,
                line.status,
                line.qty_fulfilled,
                line.qty_requested,
                line.qty_pending,
                line.retry_count
            );
        }
    }
}
