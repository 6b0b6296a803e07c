// ABOUTME: Post-stream repair that guarantees a non-empty, closed-off final answer.
// ABOUTME: Forwards agent chunks as typed events and appends a localized conclusion when needed.

use crate::stream::StreamEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Phrases that promise work the stream never delivered.
const DANGLING_MARKERS: &[&str] = &[
    "讓我查",
    "讓我幫您",
    "為了更全面比較",
    "請稍等",
    "我來幫你查",
    "let me check",
    "let me verify",
    "i'll check",
    "analyzing",
];

const TERMINAL_PUNCTUATION: &[char] = &['。', '.', '!', '！', '?', '？'];

fn is_ja(locale: &str) -> bool {
    locale.starts_with("ja")
}

fn is_zh(locale: &str) -> bool {
    locale.starts_with("zh")
}

/// Closing line appended to incomplete answers; `empty` selects the variant for no answer at all.
pub fn localized_conclusion(locale: &str, route_query: bool, empty: bool) -> &'static str {
    if is_ja(locale) {
        return match (empty, route_query) {
            (true, _) => "最終結論: 現在の条件で最適な経路を提示できます。出発地・到着地を確認して続けます。",
            (false, true) => "\n\n最終結論: 推奨ルートと非推奨ルートの理由を明確化しました。必要なら直通便との比較を追加します。",
            (false, false) => "\n\n最終結論: 以上が現在の最適な案内です。",
        };
    }
    if is_zh(locale) {
        return match (empty, route_query) {
            (true, _) => "最終結論：我可以依照目前條件給出可執行建議，請提供出發與目的地。",
            (false, true) => "\n\n最終結論：已提供推薦與不推薦路線的原因。若需要，我可以再列出直達與轉乘的逐項比較。",
            (false, false) => "\n\n最終結論：以上為目前最佳建議。",
        };
    }
    match (empty, route_query) {
        (true, _) => "Final conclusion: I can provide an actionable plan once origin and destination are confirmed.",
        (false, true) => "\n\nFinal conclusion: I included both recommended and not-recommended route reasons. I can add a direct-vs-transfer comparison if needed.",
        (false, false) => "\n\nFinal conclusion: This is the best recommendation under current conditions.",
    }
}

/// True when the trimmed answer ends with a colon, lacks terminal punctuation,
/// or contains a dangling "let me check" style phrase.
pub fn needs_conclusion(text: &str) -> bool {
    let text = text.trim();
    if text.ends_with(':') || text.ends_with('：') {
        return true;
    }
    let lower = text.to_lowercase();
    if DANGLING_MARKERS.iter().any(|m| lower.contains(m)) {
        return true;
    }
    !text.ends_with(TERMINAL_PUNCTUATION)
}

/// The text to append to a finished answer, if any.
pub fn completion_appendix(text: &str, locale: &str, route_query: bool) -> Option<&'static str> {
    if text.trim().is_empty() {
        Some(localized_conclusion(locale, route_query, true))
    } else if needs_conclusion(text) {
        Some(localized_conclusion(locale, route_query, false))
    } else {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuardOutcome {
    /// Full answer text including any appended conclusion
    pub text: String,
    pub appended: bool,
    /// The stream stopped early because the request was cancelled or the client left.
    pub cancelled: bool,
}

/// Forwards every agent chunk to `out` and repairs the answer once the agent closes its stream.
///
/// Prefixed trace chunks are forwarded as typed events and excluded from the
/// answer text. On cancellation nothing further is sent.
pub async fn stream_with_completion_guard(
    mut agent_rx: mpsc::Receiver<String>,
    out: &mpsc::Sender<StreamEvent>,
    locale: &str,
    route_query: bool,
    cancel: &CancellationToken,
) -> GuardOutcome {
    let mut outcome = GuardOutcome::default();

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => {
                outcome.cancelled = true;
                return outcome;
            }
            chunk = agent_rx.recv() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let event = StreamEvent::from_agent_chunk(&chunk);
        if let Some(text) = event.text() {
            outcome.text.push_str(text);
        }
        if out.send(event).await.is_err() {
            outcome.cancelled = true;
            return outcome;
        }
    }

    if let Some(appendix) = completion_appendix(&outcome.text, locale, route_query) {
        debug!(empty = outcome.text.trim().is_empty(), "Appending completion conclusion");
        outcome.text.push_str(appendix);
        outcome.appended = true;
        if out.send(StreamEvent::content(appendix)).await.is_err() {
            outcome.cancelled = true;
        }
    }
    outcome
}
