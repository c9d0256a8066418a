//! Flattening of exception cause chains into a single text block.

use std::collections::HashSet;
use std::fmt::Write;

use crate::record::ThrowableChain;

pub const CAUSED_BY: &str = "Caused by: ";
pub const CYCLE_MARKER: &str = "[Cyclic chain of throwables detected]";

/// Render `chain` as text, one stack element per line.
///
/// Lines are joined with `separator`. A cause that points back at an
/// already rendered frame ends the walk with [`CYCLE_MARKER`].
///
/// Returns `None` only when there is no throwable at all; an empty chain
/// counts as none.
pub fn flatten(chain: Option<&ThrowableChain>, separator: &str) -> Option<String> {
    let chain = chain?;
    let mut current = Some(chain.root()?);
    let mut out = String::new();
    let mut visited = HashSet::new();
    let mut first = true;

    while let Some(id) = current {
        let Some(frame) = chain.get(id) else { break };

        if first {
            first = false;
        } else {
            out.push_str(separator);
            out.push_str(CAUSED_BY);
        }

        if !visited.insert(id) {
            out.push_str(CYCLE_MARKER);
            break;
        }

        out.push_str(&frame.class_name);
        out.push_str(": ");
        out.push_str(frame.message.as_deref().unwrap_or("null"));

        for element in &frame.stack_elements {
            out.push_str(separator);
            out.push('\t');
            out.push_str(element);
        }

        if frame.common_frames_elided > 0 {
            out.push_str(separator);
            // Writing into a String cannot fail.
            let _ = write!(out, "\t<{} common frame(s) omitted>", frame.common_frames_elided);
        }

        current = frame.cause;
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ThrowableFrame;

    #[test]
    fn absent_throwable_yields_none() {
        assert_eq!(flatten(None, "\n"), None);
    }

    #[test]
    fn single_frame_with_stack() {
        let mut chain = ThrowableChain::new();
        chain.push(
            ThrowableFrame::new("java.lang.IllegalStateException", Some("bad state".into()))
                .with_stack(["a.B.c(B.java:1)", "a.B.main(B.java:9)"]),
        );

        let text = flatten(Some(&chain), "\n").unwrap();
        assert_eq!(
            text,
            "java.lang.IllegalStateException: bad state\n\ta.B.c(B.java:1)\n\ta.B.main(B.java:9)"
        );
    }

    #[test]
    fn causes_are_joined_and_elided_frames_marked() {
        let mut chain = ThrowableChain::new();
        let outer = chain.push(ThrowableFrame::new("Wrapper", Some("wrapping".into())).with_stack(["w()"]));
        let inner = chain.push(
            ThrowableFrame::new("Inner", None)
                .with_stack(["i()"])
                .with_common_frames(3),
        );
        chain.set_cause(outer, Some(inner));

        let text = flatten(Some(&chain), "|").unwrap();
        assert_eq!(
            text,
            "Wrapper: wrapping|\tw()|Caused by: Inner: null|\ti()|\t<3 common frame(s) omitted>"
        );
    }

    #[test]
    fn cycle_terminates_with_single_marker() {
        let mut chain = ThrowableChain::new();
        let a = chain.push(ThrowableFrame::new("A", Some("a".into())));
        let b = chain.push(ThrowableFrame::new("B", Some("b".into())));
        chain.set_cause(a, Some(b));
        chain.set_cause(b, Some(a));

        let text = flatten(Some(&chain), "\n").unwrap();
        assert_eq!(text, "A: a\nCaused by: B: b\nCaused by: [Cyclic chain of throwables detected]");
        assert_eq!(text.matches(CYCLE_MARKER).count(), 1);
    }

    #[test]
    fn self_cause_is_a_cycle() {
        let mut chain = ThrowableChain::new();
        let a = chain.push(ThrowableFrame::new("A", Some("loop".into())));
        chain.set_cause(a, Some(a));

        let text = flatten(Some(&chain), "\n").unwrap();
        assert!(text.ends_with(CYCLE_MARKER));
    }

    #[test]
    fn empty_chain_yields_none() {
        let chain = ThrowableChain::new();
        assert_eq!(flatten(Some(&chain), "\n"), None);
    }
}
