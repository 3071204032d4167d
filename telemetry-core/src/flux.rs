//! Rendering of typed query specs into Flux.
//!
//! This is the only place Flux text is produced. Identifiers that come from
//! callers (device ids) only ever appear inside escaped string literals.

use std::fmt::Write as _;

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::store::{AggFn, QuerySpec};

/// Render `spec` against the concrete bucket name.
pub fn render(spec: &QuerySpec, bucket: &str) -> String {
    let mut flux = String::new();

    if let Some(tz) = spec.timezone {
        let _ = writeln!(flux, "import \"timezone\"");
        let _ = writeln!(
            flux,
            "option location = timezone.location(name: {})",
            string_literal(tz.name())
        );
        flux.push('\n');
    }

    let _ = write!(flux, "from(bucket: {})", string_literal(bucket));
    match spec.range.stop {
        Some(stop) => {
            let _ = write!(
                flux,
                "\n  |> range(start: {}, stop: {})",
                time_literal(spec.range.start),
                time_literal(stop)
            );
        }
        None => {
            let _ = write!(flux, "\n  |> range(start: {})", time_literal(spec.range.start));
        }
    }

    let _ = write!(
        flux,
        "\n  |> filter(fn: (r) => r._measurement == {} and r._field == {})",
        string_literal(&spec.measurement),
        string_literal(&spec.field)
    );

    if let Some(tag) = &spec.tag_filter {
        let _ = write!(
            flux,
            "\n  |> filter(fn: (r) => r[{}] == {})",
            string_literal(&tag.key),
            string_literal(&tag.value)
        );
    }

    match (spec.window, spec.agg) {
        (Some(every), agg) => {
            let _ = write!(
                flux,
                "\n  |> aggregateWindow(every: {}, fn: {}, createEmpty: false, timeSrc: \"_start\")",
                duration_literal(every),
                agg.unwrap_or(AggFn::Last).as_str()
            );
        }
        (None, Some(agg)) => {
            let _ = write!(flux, "\n  |> {}()", agg.as_str());
        }
        (None, None) => {}
    }

    flux
}

/// Flux query listing the distinct values of `tag` in `bucket`.
pub fn render_tag_values(bucket: &str, tag: &str) -> String {
    format!(
        "import \"influxdata/influxdb/schema\"\n\nschema.tagValues(bucket: {}, tag: {})",
        string_literal(bucket),
        string_literal(tag)
    )
}

/// Quote `s` as a Flux string literal.
pub fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn time_literal(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Largest whole unit that divides `d` exactly.
pub fn duration_literal(d: Duration) -> String {
    let secs = d.num_seconds().max(1);
    if secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs % 3_600 == 0 {
        format!("{}h", secs / 3_600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BucketRef, TagFilter, TimeRange};
    use chrono::TimeZone;

    fn spec() -> QuerySpec {
        QuerySpec {
            bucket: BucketRef::Raw,
            measurement: "environment".into(),
            field: "current".into(),
            tag_filter: None,
            range: TimeRange {
                start: Utc.with_ymd_and_hms(2025, 1, 31, 3, 0, 0).unwrap(),
                stop: None,
            },
            window: None,
            agg: Some(AggFn::Last),
            timezone: None,
        }
    }

    #[test]
    fn latest_renders_last_selector() {
        let flux = render(&spec(), "SCT013");
        assert_eq!(
            flux,
            "from(bucket: \"SCT013\")\n  |> range(start: 2025-01-31T03:00:00Z)\n  |> filter(fn: (r) => r._measurement == \"environment\" and r._field == \"current\")\n  |> last()"
        );
    }

    #[test]
    fn windowed_spec_sets_location_and_time_source() {
        let mut s = spec();
        s.window = Some(Duration::days(1));
        s.timezone = Some(chrono_tz::America::Sao_Paulo);
        let flux = render(&s, "SCT013_longterm");
        assert!(flux.starts_with(
            "import \"timezone\"\noption location = timezone.location(name: \"America/Sao_Paulo\")\n\n"
        ));
        assert!(flux.contains(
            "aggregateWindow(every: 1d, fn: last, createEmpty: false, timeSrc: \"_start\")"
        ));
    }

    #[test]
    fn device_filter_cannot_break_out_of_literal() {
        let mut s = spec();
        s.tag_filter = Some(TagFilter {
            key: "device".into(),
            value: "x\") |> drop(columns: [\"_value\"]) //".into(),
        });
        let flux = render(&s, "b");
        assert!(flux.contains(r#"r["device"] == "x\") |> drop(columns: [\"_value\"]) //""#));
    }

    #[test]
    fn interpolation_is_escaped() {
        assert_eq!(string_literal("a${b}"), r#""a\${b}""#);
        assert_eq!(string_literal("$5"), r#""$5""#);
    }

    #[test]
    fn durations_use_largest_exact_unit() {
        assert_eq!(duration_literal(Duration::seconds(10)), "10s");
        assert_eq!(duration_literal(Duration::minutes(5)), "5m");
        assert_eq!(duration_literal(Duration::minutes(90)), "90m");
        assert_eq!(duration_literal(Duration::hours(2)), "2h");
        assert_eq!(duration_literal(Duration::days(1)), "1d");
    }

    #[test]
    fn tag_values_query() {
        assert_eq!(
            render_tag_values("SCT013", "device"),
            "import \"influxdata/influxdb/schema\"\n\nschema.tagValues(bucket: \"SCT013\", tag: \"device\")"
        );
    }
}
