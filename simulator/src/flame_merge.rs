use itertools::Itertools;
use prelude::flame::{self, Span};
use std::fs::File;
use std::io;
use std::mem;

/// Writes the spans recorded by every thread as one flame graph.
///
/// Each control cycle records the same span tree, so spans sharing a name and depth are summed
/// into a single span before writing. The graph then shows where a cycle spends its time overall.
pub fn write_flame(path: &str) -> io::Result<()> {
    let spans: Vec<Span> = flame::threads()
        .into_iter()
        .flat_map(|thread| thread.spans)
        .collect();
    if spans.is_empty() {
        return Ok(());
    }
    flame::dump_html_custom(&mut File::create(path)?, &merge_spans(spans))
}

fn merge_spans(mut spans: Vec<Span>) -> Vec<Span> {
    spans.sort_by(|a, b| (&a.name, a.depth).cmp(&(&b.name, b.depth)));
    spans
        .into_iter()
        .coalesce(|mut a, b| {
            if a.name == b.name && a.depth == b.depth {
                a.delta += b.delta;
                a.children.extend(b.children);
                Ok(a)
            } else {
                Err((a, b))
            }
        })
        .map(|mut span| {
            span.children = merge_spans(mem::replace(&mut span.children, Vec::new()));
            span
        })
        .collect()
}
