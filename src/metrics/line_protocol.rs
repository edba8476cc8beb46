//! Line-protocol rendering of a counter snapshot.
//!
//! Output is one `measurement,tag=value,... field=value` line per metric
//! dimension, newline-joined with no trailing newline. Dimension order is
//! fixed: requests, system, users, purchases, auth, latency.

use std::fmt::Write;

use super::counters::{CounterSnapshot, HttpVerb};
use super::system::SystemSample;

/// Render a full reporting payload. Pure and deterministic.
pub fn encode(snapshot: &CounterSnapshot, system: &SystemSample, source: &str) -> String {
    let src = escape_tag(source);
    let mut out = String::with_capacity(1024);

    http_lines(&mut out, snapshot, &src);
    system_lines(&mut out, system, &src);
    user_lines(&mut out, snapshot, &src);
    purchase_lines(&mut out, snapshot, &src);
    auth_lines(&mut out, snapshot, &src);
    latency_lines(&mut out, snapshot, &src);

    // drop the final '\n'
    out.pop();
    out
}

/// Escape a tag value: commas, equals signs and spaces get a backslash.
fn escape_tag(v: &str) -> String {
    let mut s = String::with_capacity(v.len());
    for c in v.chars() {
        if matches!(c, ',' | '=' | ' ') {
            s.push('\\');
        }
        s.push(c);
    }
    s
}

fn http_lines(out: &mut String, snap: &CounterSnapshot, src: &str) {
    for verb in HttpVerb::ALL {
        let _ = writeln!(
            out,
            "request,source={src},method={} total={}",
            verb.as_str(),
            snap.requests.get(verb)
        );
    }
    let _ = writeln!(
        out,
        "request,source={src},method=all total={}",
        snap.requests.total()
    );
}

fn system_lines(out: &mut String, system: &SystemSample, src: &str) {
    let _ = writeln!(
        out,
        "system,source={src},type=cpu percent={:.2}",
        system.cpu_percent
    );
    let _ = writeln!(
        out,
        "system,source={src},type=memory percent={:.2}",
        system.memory_percent
    );
}

fn user_lines(out: &mut String, snap: &CounterSnapshot, src: &str) {
    let _ = writeln!(out, "user,source={src} total={}", snap.auth.users_registered);
}

fn purchase_lines(out: &mut String, snap: &CounterSnapshot, src: &str) {
    let b = &snap.business;
    // `{}` on f64 is the shortest exact round-trip form
    let _ = writeln!(out, "revenue,source={src} total={}", b.revenue);
    let _ = writeln!(out, "pizza,source={src},status=success total={}", b.pizzas_sold);
    let _ = writeln!(out, "pizza,source={src},status=failure total={}", b.pizza_failures);
}

fn auth_lines(out: &mut String, snap: &CounterSnapshot, src: &str) {
    let _ = writeln!(out, "auth,source={src},status=success total={}", snap.auth.successful);
    let _ = writeln!(out, "auth,source={src},status=failure total={}", snap.auth.failed);
}

fn latency_lines(out: &mut String, snap: &CounterSnapshot, src: &str) {
    let l = &snap.latency;
    let _ = writeln!(out, "latency,source={src},type=factory total={}", l.factory_millis);
    let _ = writeln!(out, "latency,source={src},type=service total={}", l.service_millis);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::counters::{AuthOutcome, CounterSet, LatencyKind};

    fn sample() -> SystemSample {
        SystemSample {
            cpu_percent: 12.3456,
            memory_percent: 50.0,
        }
    }

    fn populated() -> CounterSnapshot {
        let c = CounterSet::new();
        for _ in 0..3 {
            c.increment_method(HttpVerb::Get);
        }
        c.increment_method(HttpVerb::Put);
        c.increment_method(HttpVerb::Post);
        c.increment_method(HttpVerb::Post);
        c.increment_method(HttpVerb::Delete);
        c.increment_auth(AuthOutcome::Success);
        c.increment_auth(AuthOutcome::Failure);
        c.add_users(4);
        c.add_pizzas_sold(3);
        c.add_pizzas_sold(2);
        c.add_creation_failure();
        c.add_revenue(0.0068);
        c.record_latency(LatencyKind::Factory, 250);
        c.record_latency(LatencyKind::Service, 40);
        c.snapshot()
    }

    #[test]
    fn full_payload_layout() {
        let text = encode(&populated(), &sample(), "jwt-pizza-service");
        let expected = "\
request,source=jwt-pizza-service,method=get total=3
request,source=jwt-pizza-service,method=put total=1
request,source=jwt-pizza-service,method=post total=2
request,source=jwt-pizza-service,method=delete total=1
request,source=jwt-pizza-service,method=all total=7
system,source=jwt-pizza-service,type=cpu percent=12.35
system,source=jwt-pizza-service,type=memory percent=50.00
user,source=jwt-pizza-service total=4
revenue,source=jwt-pizza-service total=0.0068
pizza,source=jwt-pizza-service,status=success total=5
pizza,source=jwt-pizza-service,status=failure total=1
auth,source=jwt-pizza-service,status=success total=1
auth,source=jwt-pizza-service,status=failure total=1
latency,source=jwt-pizza-service,type=factory total=250
latency,source=jwt-pizza-service,type=service total=40";
        assert_eq!(text, expected);
    }

    #[test]
    fn identical_snapshots_encode_identically() {
        let snap = populated();
        let a = encode(&snap, &sample(), "src");
        let b = encode(&snap.clone(), &sample(), "src");
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn all_line_matches_sum_of_verbs() {
        let snap = populated();
        let text = encode(&snap, &sample(), "src");

        let total_of = |line: &str| -> u64 {
            line.rsplit_once("total=").unwrap().1.parse().unwrap()
        };
        let per_verb: u64 = text
            .lines()
            .filter(|l| l.starts_with("request,") && !l.contains("method=all"))
            .map(total_of)
            .sum();
        let all = text
            .lines()
            .find(|l| l.contains("method=all"))
            .map(total_of)
            .unwrap();
        assert_eq!(all, per_verb);
        assert_eq!(all, snap.requests.total());
    }

    #[test]
    fn empty_snapshot_renders_zeroes() {
        let text = encode(&CounterSnapshot::default(), &SystemSample::default(), "src");
        assert_eq!(text.lines().count(), 15);
        assert!(text.contains("revenue,source=src total=0\n"));
        assert!(text.contains("system,source=src,type=cpu percent=0.00"));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn source_tag_is_escaped() {
        let text = encode(&CounterSnapshot::default(), &sample(), "pizza svc,eu=1");
        assert!(text.starts_with("request,source=pizza\\ svc\\,eu\\=1,method=get total=0"));
    }
}
