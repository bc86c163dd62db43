//! Prometheus text exposition format.
//!
//! Renders a [`SampleSet`] into the text format (version 0.0.4) served
//! on the metrics endpoint.

use crate::collector::{Sample, SampleSet};
use crate::registry::{MetricDescriptor, UP};

/// `Content-Type` of the rendered exposition.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const BUILD_INFO_NAME: &str = "zookeeper_exporter_build_info";
const BUILD_INFO_HELP: &str =
    "A metric with a constant '1' value labeled by version from which zookeeper_exporter was built.";

/// Render one scrape.
///
/// Families appear in the order their first sample was read from the
/// reply, each with a single `# HELP`/`# TYPE` header. `zk_up` and the
/// build info gauge close the document.
pub fn render_prometheus(set: &SampleSet) -> String {
    let mut families: Vec<(&'static MetricDescriptor, Vec<&Sample>)> = Vec::new();
    for sample in set.samples() {
        match families
            .iter_mut()
            .find(|(d, _)| std::ptr::eq(*d, sample.descriptor))
        {
            Some((_, samples)) => samples.push(sample),
            None => families.push((sample.descriptor, vec![sample])),
        }
    }

    let mut out = String::new();
    for (descriptor, samples) in &families {
        push_header(&mut out, descriptor.name, descriptor.help, descriptor.value_type.as_str());
        for s in samples {
            push_sample(&mut out, descriptor.name, descriptor.label_names, &s.label_values, s.value);
        }
    }

    push_header(&mut out, UP.name, UP.help, UP.value_type.as_str());
    push_sample(&mut out, UP.name, &[], &[], if set.up() { 1.0 } else { 0.0 });

    push_header(&mut out, BUILD_INFO_NAME, BUILD_INFO_HELP, "gauge");
    push_sample(
        &mut out,
        BUILD_INFO_NAME,
        &["version"],
        &[env!("CARGO_PKG_VERSION").to_string()],
        1.0,
    );

    out
}

fn push_header(out: &mut String, name: &str, help: &str, kind: &str) {
    out.push_str(&format!("# HELP {name} {}\n", escape_help(help)));
    out.push_str(&format!("# TYPE {name} {kind}\n"));
}

fn push_sample(out: &mut String, name: &str, label_names: &[&str], label_values: &[String], value: f64) {
    out.push_str(name);
    if !label_names.is_empty() {
        let labels: Vec<String> = label_names
            .iter()
            .zip(label_values)
            .map(|(n, v)| format!("{n}=\"{}\"", escape_label_value(v)))
            .collect();
        out.push_str(&format!("{{{}}}", labels.join(",")));
    }
    out.push_str(&format!(" {}\n", format_value(value)));
}

fn escape_help(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}
