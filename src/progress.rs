//! Progress indicators for the console.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Spinner for a long-running step
///
/// Hidden when `visible` is false (quiet mode or no terminal).
pub fn spinner(msg: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Remove the spinner line
pub fn finish_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}

/// Print `f`'s output above the spinner without tearing it
pub fn above<R>(pb: &ProgressBar, f: impl FnOnce() -> R) -> R {
    pb.suspend(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_spinner() {
        let pb = spinner("Listing", false);
        assert!(pb.is_hidden());
        assert_eq!(above(&pb, || 7), 7);
        finish_clear(&pb);
        assert!(pb.is_finished());
    }
}
