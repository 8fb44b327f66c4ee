use std::borrow::Cow;

/// Clip backend output for terminal display. Keeps at most `max_chars`
/// characters, cutting on the last line boundary inside the window when one
/// exists, and reports how much was dropped.
pub fn clip_for_display(s: &str, max_chars: usize) -> Cow<'_, str> {
    let total = s.chars().count();
    if total <= max_chars {
        return Cow::Borrowed(s);
    }

    let window: String = s.chars().take(max_chars).collect();
    let kept = match window.rfind('\n') {
        Some(pos) if pos > 0 => &window[..pos],
        _ => window.as_str(),
    };
    let shown = kept.chars().count();
    Cow::Owned(format!(
        "{kept}\n[... {} more characters not shown]",
        total - shown
    ))
}
