pub mod counter;
pub mod export;
pub mod histogram;
pub mod registry;

pub use counter::{Counter, CounterVec};
pub use histogram::{HistogramSeries, HistogramVec, DEFAULT_BUCKETS};
pub use registry::MetricsRegistry;

/// Writes `{name="value",...}` for one series, optionally appending the
/// histogram `le` label. Writes nothing when there are no labels at all.
pub(crate) fn write_labels(
    out: &mut String,
    names: &[&str],
    values: &[String],
    le: Option<&str>,
) {
    if names.is_empty() && le.is_none() {
        return;
    }

    out.push('{');
    let mut first = true;
    for (name, value) in names.iter().zip(values) {
        if !first {
            out.push(',');
        }
        first = false;
        out.push_str(name);
        out.push_str("=\"");
        escape_label_value(out, value);
        out.push('"');
    }
    if let Some(le) = le {
        if !first {
            out.push(',');
        }
        out.push_str("le=\"");
        out.push_str(le);
        out.push('"');
    }
    out.push('}');
}

fn escape_label_value(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
}
