use crate::types::notification::{NotificationPayload, NotificationType};

/// `(label, callback_data)`, mirroring the pack's `Button` alias. Callback
/// data is an opaque string routed by prefix on the receiving side
/// (spec.md §6 "Chat channel boundary"): `home:`, `hunt:`, `positions:`,
/// `position:`, `withdraw:`, `settings:`, `help:`.
pub type Button = (String, String);
pub type ButtonRow = Vec<Button>;

/// Zero-width braille space, padded into the divider line purely to widen
/// the Telegram message bubble so the panel doesn't wrap narrow.
const BRAILLE_PAD: &str = "\u{2800}\u{2800}\u{2800}\u{2800}\u{2800}\u{2800}\u{2800}\u{2800}\u{2800}\u{2800}\u{2800}\u{2800}\u{2800}\u{2800}\u{2800}\u{2800}\u{2800}\u{2800}\u{2800}\u{2800}";

/// A rendered panel: the HTML body and the keyboard rows to attach
/// alongside it. Never emoji in button labels (spec.md §6).
pub struct Panel {
    pub html: String,
    pub keyboard: Vec<ButtonRow>,
}

/// Escapes the five HTML metacharacters Telegram's HTML parse mode cares
/// about. Mandatory on any user- or chain-sourced string (mint, symbol,
/// tx hash) before it lands in a panel body.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn header(title: &str) -> String {
    format!("<b>{}</b>\n{}{BRAILLE_PAD}\n", escape_html(title), "\u{2500}".repeat(18))
}

fn line(label: &str, value: impl std::fmt::Display) -> String {
    format!("{label}: <code>{}</code>\n", escape_html(&value.to_string()))
}

fn back_row() -> ButtonRow {
    vec![("Back".to_string(), "home:".to_string())]
}

/// Renders a notification's `(type, payload)` into a panel, grounded on
/// `tg_bot/user_menu/strategies/screen.rs`'s header+keyboard pattern
/// (there Markdown, here HTML per spec.md §6).
pub fn render(notif_type: NotificationType, payload: &NotificationPayload) -> Panel {
    match notif_type {
        NotificationType::BuyConfirmed => render_buy_confirmed(payload),
        NotificationType::BuyFailed => render_buy_failed(payload),
        NotificationType::TpHit => render_trigger("Take-profit hit", payload),
        NotificationType::SlHit => render_trigger("Stop-loss hit", payload),
        NotificationType::TrailingStopHit => render_trigger("Trailing stop hit", payload),
        NotificationType::PositionClosed => render_position_closed(payload),
        NotificationType::ExecutionFailed => render_execution_failed(payload),
        NotificationType::HuntSkipped => render_hunt_skipped(payload),
    }
}

fn render_buy_confirmed(payload: &NotificationPayload) -> Panel {
    let mut html = header("Buy confirmed");
    if let Some(symbol) = &payload.token_symbol {
        html.push_str(&line("Token", symbol));
    }
    if let Some(amount_sol) = payload.amount_sol {
        html.push_str(&line("Spent", format!("{amount_sol:.4} SOL")));
    }
    if let Some(tokens) = payload.token_amount {
        html.push_str(&line("Received", format!("{tokens:.4}")));
    }
    if let Some(tx) = &payload.tx_hash {
        html.push_str(&line("Tx", tx));
    }
    let mut keyboard = vec![];
    if let Some(position_id) = payload.position_id {
        keyboard.push(vec![("Position".to_string(), format!("position:{position_id}"))]);
    }
    keyboard.push(back_row());
    Panel { html, keyboard }
}

fn render_buy_failed(payload: &NotificationPayload) -> Panel {
    let mut html = header("Buy failed");
    if let Some(symbol) = &payload.token_symbol {
        html.push_str(&line("Token", symbol));
    }
    if let Some(reason) = &payload.reason {
        html.push_str(&line("Reason", reason));
    }
    Panel { html, keyboard: vec![back_row()] }
}

fn render_trigger(title: &str, payload: &NotificationPayload) -> Panel {
    let mut html = header(title);
    if let Some(symbol) = &payload.token_symbol {
        html.push_str(&line("Token", symbol));
    }
    if let Some(sol) = payload.sol_received {
        html.push_str(&line("Received", format!("{sol:.4} SOL")));
    }
    if let Some(pnl) = payload.pnl_percent {
        html.push_str(&line("PnL", format!("{pnl:+.2}%")));
    }
    let mut keyboard = vec![];
    if let Some(position_id) = payload.position_id {
        keyboard.push(vec![("Position".to_string(), format!("position:{position_id}"))]);
    }
    keyboard.push(back_row());
    Panel { html, keyboard }
}

fn render_position_closed(payload: &NotificationPayload) -> Panel {
    let mut html = header("Position closed");
    if let Some(symbol) = &payload.token_symbol {
        html.push_str(&line("Token", symbol));
    }
    if let Some(sol) = payload.sol_received {
        html.push_str(&line("Received", format!("{sol:.4} SOL")));
    }
    if let Some(pnl) = payload.pnl_percent {
        html.push_str(&line("PnL", format!("{pnl:+.2}%")));
    }
    Panel { html, keyboard: vec![vec![("Positions".to_string(), "positions:".to_string())], back_row()] }
}

fn render_execution_failed(payload: &NotificationPayload) -> Panel {
    let mut html = header("Execution failed");
    if let Some(symbol) = &payload.token_symbol {
        html.push_str(&line("Token", symbol));
    }
    if let Some(trigger) = &payload.trigger {
        html.push_str(&line("Trigger", trigger));
    }
    if let Some(reason) = &payload.reason {
        html.push_str(&line("Reason", reason));
    }
    Panel { html, keyboard: vec![back_row()] }
}

fn render_hunt_skipped(payload: &NotificationPayload) -> Panel {
    let mut html = header("Hunt skipped");
    if let Some(symbol) = &payload.token_symbol {
        html.push_str(&line("Token", symbol));
    }
    if let Some(needed) = payload.needed_sol {
        html.push_str(&line("Needed", format!("{needed:.4} SOL")));
    }
    if let Some(have) = payload.have_sol {
        html.push_str(&line("Have", format!("{have:.4} SOL")));
    }
    if let Some(reason) = &payload.reason {
        html.push_str(&line("Reason", reason));
    }
    Panel { html, keyboard: vec![vec![("Hunt".to_string(), "hunt:".to_string())], back_row()] }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_all_html_metacharacters() {
        assert_eq!(escape_html(r#"<b>"quoted" & 'tagged'</b>"#), "&lt;b&gt;&quot;quoted&quot; &amp; &#39;tagged&#39;&lt;/b&gt;");
    }

    #[test]
    fn tp_hit_panel_has_position_button_when_position_id_present() {
        let position_id = uuid::Uuid::new_v4();
        let payload = NotificationPayload {
            token_symbol: Some("PUMP".to_string()),
            sol_received: Some(1.5),
            pnl_percent: Some(42.0),
            position_id: Some(position_id),
            ..Default::default()
        };
        let panel = render(NotificationType::TpHit, &payload);
        assert!(panel.html.contains("PUMP"));
        assert!(panel.keyboard.iter().flatten().any(|(_, cb)| cb == &format!("position:{position_id}")));
    }

    #[test]
    fn buy_failed_panel_escapes_reason() {
        let payload = NotificationPayload {
            reason: Some("<script>".to_string()),
            ..Default::default()
        };
        let panel = render(NotificationType::BuyFailed, &payload);
        assert!(!panel.html.contains("<script>"));
        assert!(panel.html.contains("&lt;script&gt;"));
    }
}
