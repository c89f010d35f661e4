//! Order and desk fixtures shared by scenario tests.

use chrono::{TimeZone, Utc};

use bko_fulfilment::{FulfilmentDesk, LineId, LineItem, OrderId, WebOrder};

/// Fixed creation instant so fixture-built orders are comparable across
/// runs.
pub fn fixture_instant() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 3, 9, 30, 0).unwrap()
}

/// Build a web order from `(line_id, qty_requested)` pairs.
pub fn order_with_lines(order_id: &str, customer: &str, lines: &[(&str, u32)]) -> WebOrder {
    let items = lines
        .iter()
        .map(|(id, qty)| LineItem::new(LineId::new(*id), format!("SKU-{id}"), format!("Product {id}"), *qty))
        .collect();
    WebOrder::new(OrderId::new(order_id), customer, fixture_instant(), items)
}

/// A desk pre-loaded with the given orders.
pub fn desk_with(orders: Vec<WebOrder>) -> FulfilmentDesk {
    let mut desk = FulfilmentDesk::new();
    for order in orders {
        desk.insert_order(order);
    }
    desk
}

