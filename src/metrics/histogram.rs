use std::collections::BTreeMap;
use std::fmt::Write;

use parking_lot::Mutex;

use super::write_labels;

/// Fixed latency buckets in seconds (upper bounds, inclusive).
pub const DEFAULT_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Per-series state. `buckets[i]` counts observations `<= DEFAULT_BUCKETS[i]`,
/// so the array is cumulative by construction.
#[derive(Debug, Clone, Default)]
pub struct HistogramSeries {
    pub buckets: [u64; DEFAULT_BUCKETS.len()],
    pub sum: f64,
    pub count: u64,
}

impl HistogramSeries {
    fn observe(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        for (bucket, &bound) in self.buckets.iter_mut().zip(DEFAULT_BUCKETS.iter()) {
            if value <= bound {
                *bucket += 1;
            }
        }
    }
}

/// Histogram family keyed by label values. One lock per family: an
/// observation touches buckets, sum and count together.
pub struct HistogramVec {
    name: &'static str,
    help: &'static str,
    label_names: &'static [&'static str],
    series: Mutex<BTreeMap<Vec<String>, HistogramSeries>>,
}

impl HistogramVec {
    pub fn new(
        name: &'static str,
        help: &'static str,
        label_names: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            help,
            label_names,
            series: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn observe(&self, label_values: &[&str], value: f64) {
        debug_assert_eq!(label_values.len(), self.label_names.len());
        let key: Vec<String> = label_values.iter().map(|v| (*v).to_owned()).collect();
        self.series.lock().entry(key).or_default().observe(value);
    }

    /// Copy of one series, if it has been observed at least once.
    pub fn series(&self, label_values: &[&str]) -> Option<HistogramSeries> {
        let key: Vec<String> = label_values.iter().map(|v| (*v).to_owned()).collect();
        self.series.lock().get(&key).cloned()
    }

    pub fn render(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.name, self.help);
        let _ = writeln!(out, "# TYPE {} histogram", self.name);

        let series = self.series.lock();
        for (values, s) in series.iter() {
            for (count, bound) in s.buckets.iter().zip(DEFAULT_BUCKETS.iter()) {
                let le = format!("{bound:?}");
                let _ = write!(out, "{}_bucket", self.name);
                write_labels(out, self.label_names, values, Some(&le));
                let _ = writeln!(out, " {count}");
            }
            let _ = write!(out, "{}_bucket", self.name);
            write_labels(out, self.label_names, values, Some("+Inf"));
            let _ = writeln!(out, " {}", s.count);

            let _ = write!(out, "{}_sum", self.name);
            write_labels(out, self.label_names, values, None);
            let _ = writeln!(out, " {}", s.sum);

            let _ = write!(out, "{}_count", self.name);
            write_labels(out, self.label_names, values, None);
            let _ = writeln!(out, " {}", s.count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_are_cumulative() {
        let h = HistogramVec::new("lat", "Latency", &["endpoint"]);
        h.observe(&["/a"], 0.003);
        h.observe(&["/a"], 0.2);
        h.observe(&["/a"], 42.0);

        let s = h.series(&["/a"]).unwrap();
        assert_eq!(s.count, 3);
        assert!((s.sum - 42.203).abs() < 1e-9);
        assert_eq!(s.buckets[0], 1); // <= 0.005
        assert_eq!(s.buckets[5], 2); // <= 0.25
        assert_eq!(s.buckets[10], 2); // <= 10, the 42s sample only lands in +Inf
        assert!(s.buckets.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn boundary_value_lands_in_its_bucket() {
        let h = HistogramVec::new("lat", "Latency", &["endpoint"]);
        h.observe(&["/a"], 0.1);
        let s = h.series(&["/a"]).unwrap();
        assert_eq!(s.buckets[3], 0); // <= 0.05
        assert_eq!(s.buckets[4], 1); // <= 0.1
    }

    #[test]
    fn render_includes_inf_sum_and_count() {
        let h = HistogramVec::new("lat", "Latency", &["endpoint"]);
        h.observe(&["/hora"], 0.5);

        let mut out = String::new();
        h.render(&mut out);

        assert!(out.starts_with("# HELP lat Latency\n# TYPE lat histogram\n"));
        assert!(out.contains("lat_bucket{endpoint=\"/hora\",le=\"0.25\"} 0\n"));
        assert!(out.contains("lat_bucket{endpoint=\"/hora\",le=\"0.5\"} 1\n"));
        assert!(out.contains("lat_bucket{endpoint=\"/hora\",le=\"10.0\"} 1\n"));
        assert!(out.contains("lat_bucket{endpoint=\"/hora\",le=\"+Inf\"} 1\n"));
        assert!(out.contains("lat_sum{endpoint=\"/hora\"} 0.5\n"));
        assert!(out.contains("lat_count{endpoint=\"/hora\"} 1\n"));
    }

    #[test]
    fn unobserved_series_is_absent() {
        let h = HistogramVec::new("lat", "Latency", &["endpoint"]);
        assert!(h.series(&["/never"]).is_none());
    }
}
